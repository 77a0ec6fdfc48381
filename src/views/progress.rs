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

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistTask {
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub day_index: u32,
    pub reward_kind: Option<String>,
    pub reward_value: Option<JsonRecord>,
    pub metadata: Option<JsonRecord>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistEntry {
    pub task: ChecklistTask,
    pub completed: bool,
    pub completed_at: Option<String>,
    pub reward_claimed: bool,
    pub metadata: Option<JsonRecord>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistStatus {
    pub address: String,
    pub tasks: Vec<ChecklistEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub code: String,
    pub title: String,
    pub description: String,
    pub points: u32,
    pub metadata: Option<JsonRecord>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementProgress {
    pub achievement: Achievement,
    pub unlocked: bool,
    pub unlocked_at: Option<String>,
    pub progress_value: u32,
    pub metadata: Option<JsonRecord>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementStatus {
    pub address: String,
    pub achievements: Vec<AchievementProgress>,
}

#[derive(Debug, Deserialize)]
struct ChecklistTaskDto {
    code: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    day_index: Option<u32>,
    #[serde(default)]
    reward_kind: Option<String>,
    #[serde(default)]
    reward_value: Value,
    #[serde(default)]
    metadata: Value,
    #[serde(default)]
    is_active: Option<bool>,
    #[serde(default)]
    created_at: Value,
    #[serde(default)]
    updated_at: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChecklistEntryDto {
    task: ChecklistTaskDto,
    completed: bool,
    #[serde(default)]
    completed_at: Value,
    #[serde(default)]
    reward_claimed: Option<bool>,
    #[serde(default)]
    metadata: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChecklistStatusDto {
    address: String,
    #[serde(default)]
    tasks: Vec<ChecklistEntryDto>,
}

#[derive(Debug, Deserialize)]
struct AchievementDto {
    code: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    points: Option<u32>,
    #[serde(default)]
    metadata: Value,
    #[serde(default)]
    is_active: Option<bool>,
    #[serde(default)]
    created_at: Value,
    #[serde(default)]
    updated_at: Value,
}

#[derive(Debug, Deserialize)]
pub struct AchievementProgressDto {
    achievement: AchievementDto,
    unlocked: bool,
    #[serde(default)]
    unlocked_at: Value,
    #[serde(default)]
    progress_value: Option<u32>,
    #[serde(default)]
    metadata: Value,
}

#[derive(Debug, Deserialize)]
pub struct AchievementStatusDto {
    address: String,
    #[serde(default)]
    achievements: Vec<AchievementProgressDto>,
}

fn record(value: &Value) -> Option<JsonRecord> {
    as_record(value).cloned()
}

fn created_and_updated(created: &Value, updated: &Value, now: DateTime<Utc>) -> (String, String) {
    let created_at = timestamp_or_now(created, now);
    let updated_at = normalize_timestamp(updated).unwrap_or_else(|| created_at.clone());
    (created_at, updated_at)
}

fn derive_checklist_task(dto: ChecklistTaskDto, now: DateTime<Utc>) -> ChecklistTask {
    let (created_at, updated_at) = created_and_updated(&dto.created_at, &dto.updated_at, now);
    ChecklistTask {
        code: dto.code,
        title: dto.title,
        description: dto.description,
        day_index: dto.day_index.unwrap_or(0),
        reward_kind: dto.reward_kind,
        reward_value: record(&dto.reward_value),
        metadata: record(&dto.metadata),
        is_active: dto.is_active.unwrap_or(true),
        created_at,
        updated_at,
    }
}

pub fn derive_checklist_entry(dto: ChecklistEntryDto, now: DateTime<Utc>) -> ChecklistEntry {
    ChecklistEntry {
        task: derive_checklist_task(dto.task, now),
        completed: dto.completed,
        completed_at: normalize_timestamp(&dto.completed_at),
        reward_claimed: dto.reward_claimed.unwrap_or(false),
        metadata: record(&dto.metadata),
    }
}

pub fn derive_checklist_status(dto: ChecklistStatusDto, now: DateTime<Utc>) -> ChecklistStatus {
    ChecklistStatus {
        address: dto.address,
        tasks: dto
            .tasks
            .into_iter()
            .map(|entry| derive_checklist_entry(entry, now))
            .collect(),
    }
}

fn derive_achievement(dto: AchievementDto, now: DateTime<Utc>) -> Achievement {
    let (created_at, updated_at) = created_and_updated(&dto.created_at, &dto.updated_at, now);
    Achievement {
        code: dto.code,
        title: dto.title,
        description: dto.description,
        points: dto.points.unwrap_or(0),
        metadata: record(&dto.metadata),
        is_active: dto.is_active.unwrap_or(true),
        created_at,
        updated_at,
    }
}

pub fn derive_achievement_progress(
    dto: AchievementProgressDto,
    now: DateTime<Utc>,
) -> AchievementProgress {
    AchievementProgress {
        achievement: derive_achievement(dto.achievement, now),
        unlocked: dto.unlocked,
        unlocked_at: normalize_timestamp(&dto.unlocked_at),
        progress_value: dto.progress_value.unwrap_or(0),
        metadata: record(&dto.metadata),
    }
}

pub fn derive_achievement_status(
    dto: AchievementStatusDto,
    now: DateTime<Utc>,
) -> AchievementStatus {
    AchievementStatus {
        address: dto.address,
        achievements: dto
            .achievements
            .into_iter()
            .map(|entry| derive_achievement_progress(entry, now))
            .collect(),
    }
}

/// Body for marking a checklist task complete; unset fields are not sent.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ChecklistComplete {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Option<JsonRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward_claimed: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AchievementUnlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_value: Option<Option<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Option<JsonRecord>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressKind {
    Checklist,
    Achievements,
}

impl ProgressKind {
    fn segment(self) -> &'static str {
        match self {
            ProgressKind::Checklist => "checklist",
            ProgressKind::Achievements => "achievements",
        }
    }

    fn action(self) -> &'static str {
        match self {
            ProgressKind::Checklist => "complete",
            ProgressKind::Achievements => "unlock",
        }
    }
}

/// Trimmed address, or `None` when blank.
pub fn progress_address(address: &str) -> Option<&str> {
    Some(address.trim()).filter(|address| !address.is_empty())
}

pub fn progress_request(address: &str, kind: ProgressKind) -> ApiRequest {
    ApiRequest::get(["progress", address.trim(), kind.segment()])
}

pub fn progress_action_request(
    address: &str,
    code: &str,
    kind: ProgressKind,
    body: Value,
) -> Result<ApiRequest, ValidationError> {
    let (address, code) = (address.trim(), code.trim());
    if address.is_empty() || code.is_empty() {
        return Err(ValidationError::invalid(
            "progress",
            "address and code are required",
        ));
    }
    Ok(ApiRequest::post(
        ["progress", address, kind.segment(), code, kind.action()],
        body,
    ))
}
