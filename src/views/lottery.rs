use crate::{
    normalize::{
        JsonRecord,
        amount_of,
        as_record,
        bool_of,
        field,
        first_record,
        string_array,
        string_of,
        timestamp_or_now,
        to_array,
        trimmed_string_of,
        u32_of,
        u64_of,
    },
    payload::RawStatusPayload,
    views::vrf::{
        VrfStatus,
        derive_vrf_status,
    },
};
use chrono::{
    DateTime,
    Utc,
};
use itertools::Itertools;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LotteryStatus {
    pub timestamp: String,
    pub profile: Option<String>,
    pub calculation: Option<JsonRecord>,
    pub addresses: Addresses,
    pub hub: HubStatus,
    pub lotteries: Vec<LotterySummary>,
    pub deposit: DepositStatus,
    pub treasury: TreasuryStatus,
    pub vrf: VrfStatus,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Addresses {
    pub lottery: Option<String>,
    pub hub: Option<String>,
    pub factory: Option<String>,
    pub deposit: Option<String>,
    pub client: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStatus {
    pub lottery_count: Option<u64>,
    pub next_lottery_id: Option<u64>,
    pub callback_sender: Option<String>,
    pub configured_lottery_ids: Vec<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LotterySummary {
    pub id: u64,
    pub registration: Option<LotteryRegistration>,
    pub factory: Option<LotteryFactorySummary>,
    pub instance: Option<LotteryFactorySummary>,
    pub stats: Option<LotteryStats>,
    pub round: LotteryRound,
    pub treasury: LotteryTreasury,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LotteryRegistration {
    pub owner: Option<String>,
    pub lottery_address: Option<String>,
    pub metadata_hex: Option<String>,
    pub active: bool,
}

/// Shared by the factory record and the deployed instance record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LotteryFactorySummary {
    pub owner: Option<String>,
    pub lottery_address: Option<String>,
    pub blueprint: Option<LotteryBlueprint>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LotteryBlueprint {
    pub ticket_price_supra: Option<String>,
    pub jackpot_share_bps: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LotteryStats {
    pub tickets_sold: Option<u64>,
    pub jackpot_accumulated_supra: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LotteryRound {
    pub snapshot: Option<RoundSnapshot>,
    pub pending_request_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundSnapshot {
    pub ticket_count: Option<u64>,
    pub draw_scheduled: Option<bool>,
    pub has_pending_request: Option<bool>,
    pub next_ticket_id: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LotteryTreasury {
    pub config: Option<LotteryTreasuryConfig>,
    pub pool: Option<LotteryPool>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LotteryTreasuryConfig {
    pub jackpot_bp: Option<u32>,
    pub prize_bp: Option<u32>,
    pub operations_bp: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LotteryPool {
    pub prize_supra: Option<String>,
    pub operations_supra: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositStatus {
    pub balance: Option<String>,
    pub min_balance: Option<String>,
    pub min_balance_reached: Option<bool>,
    pub subscription_info: JsonRecord,
    pub contract_details: JsonRecord,
    pub whitelisted_contracts: Vec<String>,
    pub max_gas_price: Option<String>,
    pub max_gas_limit: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryStatus {
    pub jackpot_balance: Option<String>,
    pub token_balance: Option<String>,
    pub total_supply: Option<String>,
    pub metadata: JsonRecord,
}

impl LotterySummary {
    /// Entries without a numeric `lottery_id` are not lotteries.
    fn from_value(value: &Value) -> Option<Self> {
        let record = as_record(value)?;
        let id = record.get("lottery_id").and_then(u64_of)?;
        Some(Self {
            id,
            registration: record
                .get("registration")
                .and_then(as_record)
                .map(LotteryRegistration::from_record),
            factory: record
                .get("factory")
                .and_then(as_record)
                .map(LotteryFactorySummary::from_record),
            instance: record
                .get("instance")
                .and_then(as_record)
                .map(LotteryFactorySummary::from_record),
            stats: record
                .get("stats")
                .and_then(as_record)
                .map(LotteryStats::from_record),
            round: record
                .get("round")
                .and_then(as_record)
                .map(LotteryRound::from_record)
                .unwrap_or_default(),
            treasury: record
                .get("treasury")
                .and_then(as_record)
                .map(LotteryTreasury::from_record)
                .unwrap_or_default(),
        })
    }
}

impl LotteryRegistration {
    fn from_record(record: &JsonRecord) -> Self {
        Self {
            owner: string_at(record, "owner"),
            lottery_address: string_at(record, "lottery"),
            metadata_hex: string_at(record, "metadata"),
            active: record.get("active").and_then(bool_of).unwrap_or(false),
        }
    }
}

impl LotteryFactorySummary {
    fn from_record(record: &JsonRecord) -> Self {
        Self {
            owner: string_at(record, "owner"),
            lottery_address: string_at(record, "lottery"),
            blueprint: record
                .get("blueprint")
                .and_then(as_record)
                .map(|blueprint| LotteryBlueprint {
                    ticket_price_supra: amount_at(blueprint, "ticket_price"),
                    jackpot_share_bps: blueprint.get("jackpot_share_bps").and_then(u32_of),
                }),
        }
    }
}

impl LotteryStats {
    fn from_record(record: &JsonRecord) -> Self {
        Self {
            tickets_sold: record.get("tickets_sold").and_then(u64_of),
            jackpot_accumulated_supra: amount_at(record, "jackpot_accumulated"),
        }
    }
}

impl LotteryRound {
    fn from_record(record: &JsonRecord) -> Self {
        Self {
            snapshot: record
                .get("snapshot")
                .and_then(as_record)
                .map(|snapshot| RoundSnapshot {
                    ticket_count: snapshot.get("ticket_count").and_then(u64_of),
                    draw_scheduled: snapshot.get("draw_scheduled").and_then(bool_of),
                    has_pending_request: snapshot
                        .get("has_pending_request")
                        .and_then(bool_of),
                    next_ticket_id: snapshot.get("next_ticket_id").and_then(u64_of),
                }),
            pending_request_id: record
                .get("pending_request_id")
                .and_then(trimmed_string_of),
        }
    }
}

impl LotteryTreasury {
    fn from_record(record: &JsonRecord) -> Self {
        Self {
            config: record
                .get("config")
                .and_then(as_record)
                .map(|config| LotteryTreasuryConfig {
                    jackpot_bp: config.get("jackpot_bps").and_then(u32_of),
                    prize_bp: config.get("prize_bps").and_then(u32_of),
                    operations_bp: config.get("operations_bps").and_then(u32_of),
                }),
            pool: record
                .get("pool")
                .and_then(as_record)
                .map(|pool| LotteryPool {
                    prize_supra: amount_at(pool, "prize_balance"),
                    operations_supra: amount_at(pool, "operations_balance"),
                }),
        }
    }
}

fn string_at(record: &JsonRecord, key: &str) -> Option<String> {
    record.get(key).and_then(string_of)
}

fn amount_at(record: &JsonRecord, key: &str) -> Option<String> {
    record.get(key).and_then(amount_of)
}

/// Lottery entries with a numeric id, ordered by id.
pub fn parse_lotteries(entries: &[Value]) -> Vec<LotterySummary> {
    entries
        .iter()
        .filter_map(LotterySummary::from_value)
        .sorted_by_key(|lottery| lottery.id)
        .collect()
}

fn parse_addresses(value: &Value) -> Addresses {
    Addresses {
        lottery: string_of(field(value, "lottery")),
        hub: string_of(field(value, "hub")),
        factory: string_of(field(value, "factory")),
        deposit: string_of(field(value, "deposit")),
        client: string_of(field(value, "client")),
    }
}

fn parse_hub(value: &Value) -> HubStatus {
    HubStatus {
        lottery_count: u64_of(field(value, "lottery_count")),
        next_lottery_id: u64_of(field(value, "next_lottery_id")),
        callback_sender: string_of(field(value, "callback_sender")),
        configured_lottery_ids: to_array(field(value, "configured_lottery_ids"))
            .iter()
            .filter_map(u64_of)
            .collect(),
    }
}

fn parse_deposit(payload: &RawStatusPayload) -> DepositStatus {
    DepositStatus {
        balance: amount_of(payload.deposit("balance")),
        min_balance: amount_of(payload.deposit("min_balance")),
        min_balance_reached: bool_of(payload.deposit("min_balance_reached")),
        subscription_info: as_record(payload.deposit("subscription_info"))
            .cloned()
            .unwrap_or_default(),
        contract_details: first_record(payload.deposit("contract_details"))
            .cloned()
            .unwrap_or_default(),
        whitelisted_contracts: string_array(payload.deposit("whitelisted_contracts")),
        max_gas_price: amount_of(payload.deposit("max_gas_price")),
        max_gas_limit: amount_of(payload.deposit("max_gas_limit")),
    }
}

fn parse_treasury(payload: &RawStatusPayload) -> TreasuryStatus {
    let token_balance = match payload.treasury("token_balance") {
        Value::Null => payload.treasury("balance"),
        present => present,
    };
    TreasuryStatus {
        jackpot_balance: amount_of(payload.treasury("jackpot_balance")),
        token_balance: amount_of(token_balance),
        total_supply: amount_of(payload.treasury("total_supply")),
        metadata: as_record(payload.treasury("metadata"))
            .cloned()
            .unwrap_or_default(),
    }
}

pub fn derive_lottery_status(payload: &RawStatusPayload, now: DateTime<Utc>) -> LotteryStatus {
    let lotteries = parse_lotteries(payload.lottery_entries());
    let vrf = derive_vrf_status(payload, &lotteries);
    LotteryStatus {
        timestamp: timestamp_or_now(&payload.timestamp, now),
        profile: string_of(&payload.profile),
        calculation: as_record(&payload.calculation).cloned(),
        addresses: parse_addresses(&payload.addresses),
        hub: parse_hub(&payload.hub),
        lotteries,
        deposit: parse_deposit(payload),
        treasury: parse_treasury(payload),
        vrf,
    }
}

#[allow(non_snake_case)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-04-12T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn sample_payload() -> RawStatusPayload {
        RawStatusPayload::from_value(
            "/status",
            json!({
                "timestamp": "2024-04-12T09:30:00+00:00",
                "profile": "testnet",
                "calculation": { "per_request_fee": 1500 },
                "addresses": { "lottery": "0xlot", "hub": "0xhub", "client": 7 },
                "hub": {
                    "lottery_count": "2",
                    "next_lottery_id": 3,
                    "callback_sender": "0xcb",
                    "configured_lottery_ids": [2, "1", "x"]
                },
                "lotteries": [
                    { "lottery_id": "2", "round": { "pending_request_id": " 77 " } },
                    { "lottery_id": "not-a-number" },
                    "garbage",
                    {
                        "lottery_id": 1,
                        "registration": { "owner": "0xo", "lottery": "0xl", "active": "yes" },
                        "factory": { "owner": "0xf", "blueprint": {
                            "ticket_price": "1000000", "jackpot_share_bps": 5000 } },
                        "stats": { "tickets_sold": 12, "jackpot_accumulated": "900" },
                        "round": { "snapshot": {
                            "ticket_count": 12, "draw_scheduled": false,
                            "has_pending_request": 0, "next_ticket_id": 13 } },
                        "treasury": { "pool": { "prize_balance": "10", "operations_balance": 20 } }
                    }
                ],
                "deposit": {
                    "balance": "5000",
                    "min_balance": 4000,
                    "min_balance_reached": true,
                    "subscription_info": { "subscription_id": 99, "last_request_time": 1712910000 },
                    "contract_details": [{ "callback_gas_limit": "150000" }],
                    "whitelisted_contracts": ["0xaaa", "", "0xbbb"]
                },
                "treasury": { "balance": "321", "metadata": { "symbol": "SUPRA" } }
            }),
        )
        .unwrap()
    }

    #[test]
    fn derive_lottery_status__maps_sections_field_by_field() {
        // when
        let status = derive_lottery_status(&sample_payload(), now());

        // then
        assert_eq!(status.timestamp, "2024-04-12T09:30:00.000Z");
        assert_eq!(status.profile.as_deref(), Some("testnet"));
        assert_eq!(status.addresses.client.as_deref(), Some("7"));
        assert_eq!(status.addresses.factory, None);
        assert_eq!(status.hub.lottery_count, Some(2));
        assert_eq!(status.hub.configured_lottery_ids, vec![2, 1]);
        assert_eq!(status.deposit.min_balance.as_deref(), Some("4000"));
        assert_eq!(status.deposit.whitelisted_contracts, vec!["0xaaa", "0xbbb"]);
        assert_eq!(
            status.deposit.contract_details.get("callback_gas_limit"),
            Some(&json!("150000"))
        );
        assert_eq!(status.treasury.token_balance.as_deref(), Some("321"));
        assert_eq!(status.treasury.jackpot_balance, None);
    }

    #[test]
    fn derive_lottery_status__drops_entries_without_id_and_sorts() {
        // when
        let status = derive_lottery_status(&sample_payload(), now());

        // then
        let ids: Vec<u64> = status.lotteries.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![1, 2]);
        let first = &status.lotteries[0];
        assert!(first.registration.as_ref().unwrap().active);
        assert_eq!(
            first.factory.as_ref().unwrap().blueprint.as_ref().unwrap().ticket_price_supra,
            Some("1000000".to_string())
        );
        assert_eq!(
            first.round.snapshot.as_ref().unwrap().has_pending_request,
            Some(false)
        );
        assert_eq!(
            first.treasury.pool.as_ref().unwrap().operations_supra.as_deref(),
            Some("20")
        );
        assert_eq!(status.lotteries[1].round.pending_request_id.as_deref(), Some("77"));
    }

    #[test]
    fn derive_lottery_status__vrf_uses_first_pending_round() {
        // when
        let status = derive_lottery_status(&sample_payload(), now());

        // then
        assert_eq!(status.vrf.subscription_id.as_deref(), Some("99"));
        assert_eq!(status.vrf.pending_request_id.as_deref(), Some("77"));
        assert_eq!(
            status.vrf.last_request_time.as_deref(),
            Some("2024-04-12T08:20:00.000Z")
        );
        assert_eq!(status.vrf.last_fulfillment_time, None);
    }

    #[test]
    fn derive_lottery_status__missing_timestamp_uses_now() {
        // given
        let payload = RawStatusPayload::default();

        // when
        let status = derive_lottery_status(&payload, now());

        // then
        assert_eq!(status.timestamp, "2024-04-12T12:00:00.000Z");
        assert!(status.lotteries.is_empty());
        assert_eq!(status.calculation, None);
    }
}
