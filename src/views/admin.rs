use crate::{
    fallback::FallbackConfig,
    normalize::{
        amount_of,
        integer_of,
        timestamp_or_now,
    },
    payload::RawStatusPayload,
    views::treasury::{
        TreasuryBalances,
        TreasuryConfig,
        derive_treasury_balances,
        derive_treasury_config,
    },
};
use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminGasConfig {
    pub max_gas_fee: u64,
    pub min_balance: u64,
    pub updated_at: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminVrfConfig {
    pub max_gas_price: String,
    pub max_gas_limit: String,
    pub callback_gas_price: String,
    pub callback_gas_limit: String,
    pub requested_rng_count: u32,
    pub client_seed: u64,
    pub last_configured_at: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientWhitelistSnapshot {
    pub max_gas_price: String,
    pub max_gas_limit: String,
    pub min_balance_limit: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerWhitelistSnapshot {
    pub callback_gas_price: String,
    pub callback_gas_limit: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminWhitelistConfig {
    pub client_configured: bool,
    pub consumer_configured: bool,
    pub client: Option<ClientWhitelistSnapshot>,
    pub consumer: Option<ConsumerWhitelistSnapshot>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminTreasury {
    pub config: TreasuryConfig,
    pub balances: TreasuryBalances,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminConfig {
    pub gas: AdminGasConfig,
    pub vrf: AdminVrfConfig,
    pub whitelist: AdminWhitelistConfig,
    pub treasury: AdminTreasury,
}

/// Server-calculated figures a gas config update has to match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ExpectedGasFigures {
    pub max_gas_fee: Option<u128>,
    pub min_balance: Option<u128>,
}

pub(crate) fn expected_gas_figures(payload: &RawStatusPayload) -> ExpectedGasFigures {
    ExpectedGasFigures {
        max_gas_fee: integer_of(payload.calculation("per_request_fee")),
        min_balance: integer_of(payload.deposit("min_balance"))
            .or_else(|| integer_of(payload.calculation("min_balance"))),
    }
}

/// Verification gas to forward to `configure-vrf-gas`, if the monitor knows it.
pub(crate) fn verification_gas(payload: &RawStatusPayload) -> Option<String> {
    [
        payload.calculation("verification_gas_value"),
        payload.calculation("verification_gas"),
        payload.contract_details("verification_gas_value"),
    ]
    .into_iter()
    .find_map(amount_of)
}

fn first_amount(candidates: [&Value; 2]) -> Option<String> {
    candidates.into_iter().find_map(amount_of)
}

/// Whole block from the fallback when the payload carries neither figure;
/// otherwise each missing figure is taken from the fallback.
fn derive_gas_config(
    payload: &RawStatusPayload,
    fallback: &AdminGasConfig,
    now: DateTime<Utc>,
) -> AdminGasConfig {
    let expected = expected_gas_figures(payload);
    if expected.max_gas_fee.is_none() && expected.min_balance.is_none() {
        return fallback.clone();
    }
    AdminGasConfig {
        max_gas_fee: narrow_gas_figure("max_gas_fee", expected.max_gas_fee, fallback.max_gas_fee),
        min_balance: narrow_gas_figure("min_balance", expected.min_balance, fallback.min_balance),
        updated_at: timestamp_or_now(&payload.timestamp, now),
    }
}

fn narrow_gas_figure(field: &str, value: Option<u128>, default: u64) -> u64 {
    let Some(raw) = value else {
        return default;
    };
    u64::try_from(raw).unwrap_or_else(|_| {
        tracing::warn!(
            field,
            raw = %raw,
            fallback = default,
            "gas figure exceeds u64, reporting fallback value"
        );
        default
    })
}

fn derive_vrf_config(
    payload: &RawStatusPayload,
    fallback: &AdminVrfConfig,
    now: DateTime<Utc>,
) -> AdminVrfConfig {
    let max_gas_price = first_amount([
        payload.deposit("max_gas_price"),
        payload.calculation("max_gas_price"),
    ]);
    let max_gas_limit = first_amount([
        payload.deposit("max_gas_limit"),
        payload.calculation("max_gas_limit"),
    ]);
    let callback_gas_price = amount_of(payload.contract_details("callback_gas_price"));
    let callback_gas_limit = amount_of(payload.contract_details("callback_gas_limit"));

    if max_gas_price.is_none()
        && max_gas_limit.is_none()
        && callback_gas_price.is_none()
        && callback_gas_limit.is_none()
    {
        return fallback.clone();
    }
    AdminVrfConfig {
        max_gas_price: max_gas_price.unwrap_or_else(|| fallback.max_gas_price.clone()),
        max_gas_limit: max_gas_limit.unwrap_or_else(|| fallback.max_gas_limit.clone()),
        callback_gas_price: callback_gas_price
            .unwrap_or_else(|| fallback.callback_gas_price.clone()),
        callback_gas_limit: callback_gas_limit
            .unwrap_or_else(|| fallback.callback_gas_limit.clone()),
        // the monitor does not report request parameters
        requested_rng_count: fallback.requested_rng_count,
        client_seed: fallback.client_seed,
        last_configured_at: timestamp_or_now(&payload.timestamp, now),
    }
}

pub fn derive_admin_config(
    payload: &RawStatusPayload,
    fallback: &FallbackConfig,
    now: DateTime<Utc>,
) -> AdminConfig {
    AdminConfig {
        gas: derive_gas_config(payload, &fallback.gas, now),
        vrf: derive_vrf_config(payload, &fallback.vrf, now),
        whitelist: fallback.whitelist.clone(),
        treasury: AdminTreasury {
            config: derive_treasury_config(payload, fallback, now),
            balances: derive_treasury_balances(payload, fallback, now),
        },
    }
}
