use crate::{
    fallback::FallbackConfig,
    normalize::{
        amount_of,
        first_record,
        format_timestamp,
        normalize_timestamp,
        to_array,
        trimmed_string_of,
    },
    payload::RawStatusPayload,
    views::lottery::{
        LotterySummary,
        parse_lotteries,
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

/// Share of each ticket sale routed to each pool, in basis points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryDistribution {
    pub jackpot: u32,
    pub prize: u32,
    pub treasury: u32,
    pub marketing: u32,
}

impl TreasuryDistribution {
    pub fn total(&self) -> u64 {
        [self.jackpot, self.prize, self.treasury, self.marketing]
            .iter()
            .map(|bps| u64::from(*bps))
            .sum()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryConfig {
    pub ticket_price_supra: String,
    pub sales_enabled: bool,
    pub treasury_address: String,
    pub distribution_bp: TreasuryDistribution,
    pub updated_at: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryBalances {
    pub jackpot_supra: String,
    pub prize_supra: String,
    pub treasury_supra: String,
    pub marketing_supra: String,
    pub updated_at: String,
}

/// Distribution of the lowest-id lottery, as long as all three remote parts
/// are present. Marketing is not tracked on chain.
fn remote_distribution(primary: Option<&LotterySummary>) -> Option<TreasuryDistribution> {
    let config = primary?.treasury.config.as_ref()?;
    Some(TreasuryDistribution {
        jackpot: config.jackpot_bp?,
        prize: config.prize_bp?,
        treasury: config.operations_bp?,
        marketing: 0,
    })
}

/// Payload timestamp when the payload carries at least one lottery.
fn realtime_timestamp(
    payload: &RawStatusPayload,
    has_lotteries: bool,
    fallback: &str,
    now: DateTime<Utc>,
) -> String {
    if !has_lotteries {
        return fallback.to_string();
    }
    normalize_timestamp(&payload.timestamp).unwrap_or_else(|| format_timestamp(now))
}

pub fn derive_treasury_config(
    payload: &RawStatusPayload,
    fallback: &FallbackConfig,
    now: DateTime<Utc>,
) -> TreasuryConfig {
    let defaults = &fallback.treasury_config;
    let lotteries = parse_lotteries(payload.lottery_entries());
    let primary = lotteries.first();

    let ticket_price_supra = primary
        .and_then(|lottery| lottery.factory.as_ref())
        .and_then(|factory| factory.blueprint.as_ref())
        .and_then(|blueprint| blueprint.ticket_price_supra.clone())
        .unwrap_or_else(|| defaults.ticket_price_supra.clone());
    let treasury_address = to_array(payload.treasury("recipients"))
        .first()
        .and_then(|recipient| match first_record(recipient) {
            Some(record) => record.get("address").and_then(trimmed_string_of),
            None => trimmed_string_of(recipient),
        })
        .unwrap_or_else(|| defaults.treasury_address.clone());

    TreasuryConfig {
        ticket_price_supra,
        sales_enabled: defaults.sales_enabled,
        treasury_address,
        distribution_bp: remote_distribution(primary).unwrap_or(defaults.distribution_bp),
        updated_at: realtime_timestamp(payload, primary.is_some(), &defaults.updated_at, now),
    }
}

pub fn derive_treasury_balances(
    payload: &RawStatusPayload,
    fallback: &FallbackConfig,
    now: DateTime<Utc>,
) -> TreasuryBalances {
    let defaults = &fallback.treasury_balances;
    let lotteries = parse_lotteries(payload.lottery_entries());
    let pool = lotteries
        .first()
        .and_then(|lottery| lottery.treasury.pool.as_ref());

    TreasuryBalances {
        jackpot_supra: amount_of(payload.treasury("jackpot_balance"))
            .unwrap_or_else(|| defaults.jackpot_supra.clone()),
        prize_supra: pool
            .and_then(|pool| pool.prize_supra.clone())
            .unwrap_or_else(|| defaults.prize_supra.clone()),
        treasury_supra: pool
            .and_then(|pool| pool.operations_supra.clone())
            .unwrap_or_else(|| defaults.treasury_supra.clone()),
        marketing_supra: defaults.marketing_supra.clone(),
        updated_at: realtime_timestamp(
            payload,
            !lotteries.is_empty(),
            &defaults.updated_at,
            now,
        ),
    }
}
