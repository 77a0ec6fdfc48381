use crate::{
    Result,
    error::{
        Error,
        ValidationError,
    },
    views::{
        admin::{
            AdminGasConfig,
            AdminVrfConfig,
            AdminWhitelistConfig,
        },
        treasury::{
            TreasuryBalances,
            TreasuryConfig,
            TreasuryDistribution,
        },
        whitelist::WhitelistStatus,
    },
};
use serde::Deserialize;
use std::path::Path;

pub const FALLBACK_UPDATED_AT: &str = "2024-01-01T00:00:00.000Z";

/// Values a deriver uses for any field the live payload does not carry.
///
/// Read-only once constructed. Hosts that ship their own defaults can load
/// them from JSON; any section left out keeps the built-in value.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FallbackConfig {
    pub whitelist_status: WhitelistStatus,
    pub gas: AdminGasConfig,
    pub vrf: AdminVrfConfig,
    pub whitelist: AdminWhitelistConfig,
    pub treasury_config: TreasuryConfig,
    pub treasury_balances: TreasuryBalances,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            whitelist_status: WhitelistStatus::default(),
            gas: AdminGasConfig {
                max_gas_fee: 30_000,
                min_balance: 600_000,
                updated_at: FALLBACK_UPDATED_AT.to_string(),
            },
            vrf: AdminVrfConfig {
                max_gas_price: "1000".to_string(),
                max_gas_limit: "500000".to_string(),
                callback_gas_price: "1000".to_string(),
                callback_gas_limit: "150000".to_string(),
                requested_rng_count: 1,
                client_seed: 0,
                last_configured_at: FALLBACK_UPDATED_AT.to_string(),
            },
            whitelist: AdminWhitelistConfig::default(),
            treasury_config: TreasuryConfig {
                ticket_price_supra: "10".to_string(),
                sales_enabled: true,
                treasury_address: "0x0".to_string(),
                distribution_bp: TreasuryDistribution {
                    jackpot: 5000,
                    prize: 2500,
                    treasury: 2000,
                    marketing: 500,
                },
                updated_at: FALLBACK_UPDATED_AT.to_string(),
            },
            treasury_balances: TreasuryBalances {
                jackpot_supra: "0".to_string(),
                prize_supra: "0".to_string(),
                treasury_supra: "0".to_string(),
                marketing_supra: "0".to_string(),
                updated_at: FALLBACK_UPDATED_AT.to_string(),
            },
        }
    }
}

impl FallbackConfig {
    pub fn from_json(source: &str, raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::malformed(source, e))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::invalid("fallback_path", format!("cannot read {source}: {e}"))
        })?;
        let config = Self::from_json(&source, &raw)?;
        tracing::info!("loaded fallback config from {source}");
        Ok(config)
    }
}

#[allow(non_snake_case)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default__distribution_is_complete() {
        let fallback = FallbackConfig::default();
        assert_eq!(fallback.treasury_config.distribution_bp.total(), 10_000);
    }

    #[test]
    fn from_json__missing_sections_keep_defaults() {
        // given
        let raw = r#"{
            "gas": { "maxGasFee": 10, "minBalance": 20, "updatedAt": "2024-01-01T00:00:00.000Z" },
            "whitelistStatus": { "account": "0xabc", "profile": null, "isWhitelisted": true, "checkedAt": null }
        }"#;

        // when
        let fallback = FallbackConfig::from_json("inline", raw).unwrap();

        // then
        assert_eq!(fallback.gas.max_gas_fee, 10);
        assert_eq!(fallback.gas.min_balance, 20);
        assert!(fallback.whitelist_status.is_whitelisted);
        assert_eq!(fallback.vrf, FallbackConfig::default().vrf);
    }

    #[test]
    fn from_path__missing_file_is_invalid_input() {
        // given
        let path = std::env::temp_dir().join("supra-status-client-no-such-fallback.json");

        // when
        let err = FallbackConfig::from_path(&path).unwrap_err();

        // then
        assert!(matches!(
            err,
            Error::Validation(ValidationError::InvalidInput { field: "fallback_path", .. })
        ));
        assert!(err.to_string().contains("supra-status-client-no-such-fallback.json"));
    }

    #[test]
    fn from_json__rejects_malformed_input() {
        let err = FallbackConfig::from_json("inline", "{ nope").unwrap_err();
        assert!(matches!(err, Error::MalformedPayload { .. }));
    }
}
