use crate::{
    error::ValidationError,
    normalize::{
        JsonRecord,
        as_record,
        normalize_timestamp,
        timestamp_or_now,
    },
    transport::ApiRequest,
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

pub const NO_AVATAR: &str = "none";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarInfo {
    pub kind: String,
    pub value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProfile {
    pub address: String,
    pub nickname: Option<String>,
    pub avatar: AvatarInfo,
    pub telegram: Option<String>,
    pub twitter: Option<String>,
    pub settings: JsonRecord,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct AccountProfileDto {
    address: String,
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    avatar_kind: Option<String>,
    #[serde(default)]
    avatar_value: Option<String>,
    #[serde(default)]
    telegram: Option<String>,
    #[serde(default)]
    twitter: Option<String>,
    #[serde(default)]
    settings: Value,
    #[serde(default)]
    created_at: Value,
    #[serde(default)]
    updated_at: Value,
}

/// `updated_at` falls back to `created_at`, which falls back to `now`.
pub fn derive_account_profile(dto: AccountProfileDto, now: DateTime<Utc>) -> AccountProfile {
    let created_at = timestamp_or_now(&dto.created_at, now);
    let updated_at = normalize_timestamp(&dto.updated_at).unwrap_or_else(|| created_at.clone());
    AccountProfile {
        address: dto.address,
        nickname: dto.nickname,
        avatar: AvatarInfo {
            kind: dto
                .avatar_kind
                .filter(|kind| !kind.is_empty())
                .unwrap_or_else(|| NO_AVATAR.to_string()),
            value: dto.avatar_value,
        },
        telegram: dto.telegram,
        twitter: dto.twitter,
        settings: as_record(&dto.settings).cloned().unwrap_or_default(),
        created_at,
        updated_at,
    }
}

/// Partial profile update. The outer `Option` says whether a field is sent at
/// all; `Some(None)` clears it.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AccountProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<Option<AvatarInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<Option<JsonRecord>>,
}

fn account_segments(address: &str) -> Result<[String; 2], ValidationError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(ValidationError::invalid("address", "must not be empty"));
    }
    Ok(["accounts".to_string(), address.to_string()])
}

/// `None` for a blank address; there is nothing to look up.
pub fn account_profile_request(address: &str) -> Option<ApiRequest> {
    account_segments(address).ok().map(|segments| ApiRequest::get(segments))
}

pub fn upsert_account_profile_request(
    address: &str,
    update: &AccountProfileUpdate,
) -> Result<ApiRequest, ValidationError> {
    let segments = account_segments(address)?;
    let body = serde_json::to_value(update)
        .map_err(|e| ValidationError::invalid("profile", e.to_string()))?;
    Ok(ApiRequest::put(segments, body))
}
