use crate::{
    fallback::FallbackConfig,
    normalize::{
        normalize_timestamp,
        string_array,
        string_of,
    },
    payload::RawStatusPayload,
};
use serde::{
    Deserialize,
    Serialize,
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhitelistStatus {
    pub account: Option<String>,
    pub profile: Option<String>,
    pub is_whitelisted: bool,
    pub checked_at: Option<String>,
}

/// The first whitelisted contract is the account of interest. Without one the
/// fallback account and flag are reported together.
pub fn derive_whitelist_status(
    payload: &RawStatusPayload,
    fallback: &FallbackConfig,
) -> WhitelistStatus {
    let defaults = &fallback.whitelist_status;
    let remote_account = string_array(payload.deposit("whitelisted_contracts"))
        .into_iter()
        .next();
    let (account, is_whitelisted) = match remote_account {
        Some(account) => (Some(account), true),
        None => (defaults.account.clone(), defaults.is_whitelisted),
    };
    WhitelistStatus {
        account,
        profile: string_of(&payload.profile).or_else(|| defaults.profile.clone()),
        is_whitelisted,
        checked_at: normalize_timestamp(&payload.timestamp)
            .or_else(|| defaults.checked_at.clone()),
    }
}

#[allow(non_snake_case)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn derive_whitelist_status__uses_first_whitelisted_contract() {
        // given
        let payload = RawStatusPayload::from_value(
            "/status",
            json!({
                "timestamp": "2024-04-12T08:00:00Z",
                "deposit": { "whitelisted_contracts": ["0xc1", "0xc2"] }
            }),
        )
        .unwrap();
        let fallback = FallbackConfig {
            whitelist_status: WhitelistStatus {
                account: Some("0xfallback".to_string()),
                profile: Some("mock".to_string()),
                is_whitelisted: false,
                checked_at: None,
            },
            ..FallbackConfig::default()
        };

        // when
        let status = derive_whitelist_status(&payload, &fallback);

        // then
        assert_eq!(
            status,
            WhitelistStatus {
                account: Some("0xc1".to_string()),
                profile: Some("mock".to_string()),
                is_whitelisted: true,
                checked_at: Some("2024-04-12T08:00:00.000Z".to_string()),
            }
        );
    }

    #[test]
    fn derive_whitelist_status__no_remote_contract_keeps_fallback_account() {
        // given
        let payload = RawStatusPayload::from_value("/status", json!({ "profile": "testnet" }))
            .unwrap();
        let fallback = FallbackConfig::default();

        // when
        let status = derive_whitelist_status(&payload, &fallback);

        // then
        assert_eq!(status.account, fallback.whitelist_status.account);
        assert_eq!(status.is_whitelisted, fallback.whitelist_status.is_whitelisted);
        assert_eq!(status.profile.as_deref(), Some("testnet"));
        assert_eq!(status.checked_at, fallback.whitelist_status.checked_at);
    }
}
