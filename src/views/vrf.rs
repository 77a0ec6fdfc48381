use crate::{
    normalize::{
        JsonRecord,
        as_record,
        clamp_vrf_limit,
        field,
        normalize_timestamp,
        string_of,
        to_array,
        trimmed_string_of,
        u64_of,
    },
    payload::RawStatusPayload,
    transport::ApiRequest,
    views::lottery::LotterySummary,
};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VrfStatus {
    pub subscription_id: Option<String>,
    pub pending_request_id: Option<String>,
    pub last_request_time: Option<String>,
    pub last_fulfillment_time: Option<String>,
}

/// `lotteries` must already be sorted; the first pending round wins.
pub fn derive_vrf_status(payload: &RawStatusPayload, lotteries: &[LotterySummary]) -> VrfStatus {
    VrfStatus {
        subscription_id: string_of(payload.subscription("subscription_id")),
        pending_request_id: lotteries
            .iter()
            .find_map(|lottery| lottery.round.pending_request_id.clone()),
        last_request_time: normalize_timestamp(payload.subscription("last_request_time")),
        last_fulfillment_time: normalize_timestamp(
            payload.subscription("last_fulfillment_time"),
        ),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VrfLog {
    pub lottery_id: u64,
    pub limit: u32,
    pub round: VrfRoundLog,
    pub hub: VrfHubLog,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VrfRoundLog {
    pub snapshot: Option<JsonRecord>,
    pub pending_request_id: Option<String>,
    pub requests: Vec<JsonRecord>,
    pub fulfillments: Vec<JsonRecord>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VrfHubLog {
    pub requests: Vec<JsonRecord>,
    pub fulfillments: Vec<JsonRecord>,
}

/// Request for the log of `lottery_id` together with the limit actually sent.
pub fn vrf_log_request(lottery_id: u64, limit: Option<i64>) -> (ApiRequest, u32) {
    let limit = clamp_vrf_limit(limit);
    let request = ApiRequest::get([
        "lotteries".to_string(),
        lottery_id.to_string(),
        "vrf-log".to_string(),
    ])
    .with_query("limit", limit);
    (request, limit)
}

/// Keeps the remote order, truncated to `limit`. Non-object events are
/// wrapped as `{ "value": event }`.
fn events(value: &Value, limit: u32) -> Vec<JsonRecord> {
    to_array(value)
        .iter()
        .take(limit as usize)
        .map(|event| match event {
            Value::Object(record) => record.clone(),
            other => JsonRecord::from_iter([("value".to_string(), other.clone())]),
        })
        .collect()
}

pub fn derive_vrf_log(body: &Value, requested_lottery_id: u64, limit: u32) -> VrfLog {
    let round = field(body, "round");
    let hub = field(body, "hub");
    VrfLog {
        lottery_id: u64_of(field(body, "lottery_id")).unwrap_or(requested_lottery_id),
        limit,
        round: match as_record(round) {
            Some(_) => VrfRoundLog {
                snapshot: as_record(field(round, "snapshot")).cloned(),
                pending_request_id: trimmed_string_of(field(round, "pending_request_id")),
                requests: events(field(round, "requests"), limit),
                fulfillments: events(field(round, "fulfillments"), limit),
            },
            None => VrfRoundLog::default(),
        },
        hub: VrfHubLog {
            requests: events(field(hub, "requests"), limit),
            fulfillments: events(field(hub, "fulfillments"), limit),
        },
    }
}

#[allow(non_snake_case)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn vrf_log_request__clamps_oversized_limit() {
        // when
        let (request, limit) = vrf_log_request(4, Some(9999));

        // then
        assert_eq!(limit, 500);
        assert_eq!(request.path(), "/lotteries/4/vrf-log");
        assert_eq!(request.query_value("limit"), Some("500"));
    }

    #[test]
    fn vrf_log_request__non_positive_limit_uses_default() {
        let (request, limit) = vrf_log_request(4, Some(0));
        assert_eq!(limit, 25);
        assert_eq!(request.query_value("limit"), Some("25"));
    }

    #[test]
    fn derive_vrf_log__truncates_and_keeps_remote_order() {
        // given
        let body = json!({
            "lottery_id": 4,
            "round": {
                "snapshot": { "ticket_count": 3 },
                "pending_request_id": 12,
                "requests": [{ "nonce": 3 }, { "nonce": 1 }, { "nonce": 2 }],
                "fulfillments": ["raw", { "nonce": 1 }]
            },
            "hub": { "requests": { "vec": [{ "id": "a" }, { "id": "b" }] } }
        });

        // when
        let log = derive_vrf_log(&body, 99, 2);

        // then
        assert_eq!(log.lottery_id, 4);
        assert_eq!(log.limit, 2);
        assert_eq!(log.round.pending_request_id.as_deref(), Some("12"));
        assert_eq!(
            log.round.requests,
            vec![
                json!({ "nonce": 3 }).as_object().unwrap().clone(),
                json!({ "nonce": 1 }).as_object().unwrap().clone(),
            ]
        );
        assert_eq!(
            Value::Object(log.round.fulfillments[0].clone()),
            json!({ "value": "raw" })
        );
        assert_eq!(log.hub.requests.len(), 2);
        assert!(log.hub.fulfillments.is_empty());
    }

    #[test]
    fn derive_vrf_log__empty_body_is_well_formed() {
        // when
        let log = derive_vrf_log(&json!({}), 7, 25);

        // then
        assert_eq!(log.lottery_id, 7);
        assert_eq!(log.round, VrfRoundLog::default());
        assert!(log.hub.requests.is_empty());
        let rendered = serde_json::to_value(&log).unwrap();
        assert_eq!(rendered["round"]["pendingRequestId"], Value::Null);
        assert_eq!(rendered["lotteryId"], json!(7));
    }
}
