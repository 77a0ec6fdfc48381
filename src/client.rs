use crate::{
    Result,
    cache::{
        Clock,
        StatusCache,
        SystemClock,
    },
    commands::{
        ClientWhitelistRecord,
        CommandInfo,
        CommandOrchestrator,
        ConsumerWhitelistRecord,
        GasConfigUpdate,
        MutationResult,
        VrfConfigUpdate,
    },
    config::ClientConfig,
    error::{
        Error,
        ValidationError,
    },
    fallback::FallbackConfig,
    normalize::to_array,
    payload::RawStatusPayload,
    transport::{
        ApiRequest,
        HttpTransport,
        Transport,
        request_json,
        request_optional_json,
        request_url,
    },
    views::{
        account::{
            AccountProfile,
            AccountProfileDto,
            AccountProfileUpdate,
            account_profile_request,
            derive_account_profile,
            upsert_account_profile_request,
        },
        admin::{
            AdminConfig,
            derive_admin_config,
        },
        chat::{
            Announcement,
            AnnouncementDto,
            ChatMessage,
            ChatMessageDto,
            PostAnnouncement,
            PostChatMessage,
            announcements_request,
            chat_messages_request,
            derive_announcement,
            derive_chat_message,
        },
        lottery::{
            LotteryStatus,
            derive_lottery_status,
        },
        progress::{
            AchievementProgress,
            AchievementProgressDto,
            AchievementStatus,
            AchievementStatusDto,
            AchievementUnlock,
            ChecklistComplete,
            ChecklistEntry,
            ChecklistEntryDto,
            ChecklistStatus,
            ChecklistStatusDto,
            ProgressKind,
            derive_achievement_progress,
            derive_achievement_status,
            derive_checklist_entry,
            derive_checklist_status,
            progress_action_request,
            progress_address,
            progress_request,
        },
        treasury::{
            TreasuryBalances,
            TreasuryConfig,
            TreasuryDistribution,
            derive_treasury_balances,
            derive_treasury_config,
        },
        vrf::{
            VrfLog,
            derive_vrf_log,
            vrf_log_request,
        },
        whitelist::{
            WhitelistStatus,
            derive_whitelist_status,
        },
    },
};
use serde::{
    Serialize,
    de::DeserializeOwned,
};
use serde_json::Value;
use std::{
    fmt,
    sync::Arc,
    time::Duration,
};

/// Entry point for hosts: status reads go through the shared cache, writes
/// through the command orchestrator.
pub struct SupraClient<T, C = SystemClock> {
    transport: Arc<T>,
    cache: StatusCache<T, C>,
    fallback: Arc<FallbackConfig>,
    orchestrator: CommandOrchestrator<T, C>,
}

impl<T, C> Clone for SupraClient<T, C> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            cache: self.cache.clone(),
            fallback: self.fallback.clone(),
            orchestrator: self.orchestrator.clone(),
        }
    }
}

impl SupraClient<HttpTransport> {
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::with_timeout(&config.base_url, config.request_timeout)?;
        tracing::info!("supra client using {transport}");
        Ok(Self::new(transport, SystemClock, config.status_ttl))
    }
}

impl<T: Transport, C: Clock> SupraClient<T, C> {
    pub fn new(transport: T, clock: C, status_ttl: Duration) -> Self {
        let transport = Arc::new(transport);
        let cache = StatusCache::new(transport.clone(), Arc::new(clock), status_ttl);
        let orchestrator = CommandOrchestrator::new(transport.clone(), cache.clone());
        Self {
            transport,
            cache,
            fallback: Arc::new(FallbackConfig::default()),
            orchestrator,
        }
    }

    pub fn with_fallback(mut self, fallback: FallbackConfig) -> Self {
        self.fallback = Arc::new(fallback);
        self
    }

    pub fn fallback(&self) -> &FallbackConfig {
        &self.fallback
    }

    pub fn cache(&self) -> &StatusCache<T, C> {
        &self.cache
    }

    pub async fn status(&self) -> Result<Arc<RawStatusPayload>> {
        self.cache.get_status().await
    }

    pub async fn refresh_status(&self) -> Result<Arc<RawStatusPayload>> {
        self.cache.refresh_status().await
    }

    pub fn invalidate_status(&self) {
        self.cache.invalidate();
    }

    pub async fn lottery_status(&self) -> Result<LotteryStatus> {
        let payload = self.status().await?;
        Ok(derive_lottery_status(&payload, self.cache.now()))
    }

    pub async fn whitelist_status(&self) -> Result<WhitelistStatus> {
        let payload = self.status().await?;
        Ok(derive_whitelist_status(&payload, &self.fallback))
    }

    pub async fn treasury_config(&self) -> Result<TreasuryConfig> {
        let payload = self.status().await?;
        Ok(derive_treasury_config(&payload, &self.fallback, self.cache.now()))
    }

    pub async fn treasury_balances(&self) -> Result<TreasuryBalances> {
        let payload = self.status().await?;
        Ok(derive_treasury_balances(&payload, &self.fallback, self.cache.now()))
    }

    pub async fn admin_config(&self) -> Result<AdminConfig> {
        let payload = self.status().await?;
        Ok(derive_admin_config(&payload, &self.fallback, self.cache.now()))
    }

    /// `limit` is clamped before it is sent; see [`crate::normalize::clamp_vrf_limit`].
    pub async fn vrf_log(&self, lottery_id: u64, limit: Option<i64>) -> Result<VrfLog> {
        let (request, limit) = vrf_log_request(lottery_id, limit);
        let body: Value = request_json(self.transport.as_ref(), request).await?;
        Ok(derive_vrf_log(&body, lottery_id, limit))
    }

    pub async fn chat_messages(
        &self,
        room: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<ChatMessage>> {
        let now = self.cache.now();
        let messages: Vec<ChatMessageDto> =
            self.fetch_list(chat_messages_request(room, limit)).await?;
        Ok(messages
            .into_iter()
            .map(|dto| derive_chat_message(dto, now))
            .collect())
    }

    pub async fn post_chat_message(&self, message: &PostChatMessage) -> Result<ChatMessage> {
        let request = message.to_request()?;
        let dto: ChatMessageDto = request_json(self.transport.as_ref(), request).await?;
        Ok(derive_chat_message(dto, self.cache.now()))
    }

    pub async fn announcements(
        &self,
        limit: Option<u32>,
        lottery_id: Option<&str>,
    ) -> Result<Vec<Announcement>> {
        let now = self.cache.now();
        let announcements: Vec<AnnouncementDto> = self
            .fetch_list(announcements_request(limit, lottery_id))
            .await?;
        Ok(announcements
            .into_iter()
            .map(|dto| derive_announcement(dto, now))
            .collect())
    }

    pub async fn post_announcement(
        &self,
        announcement: &PostAnnouncement,
    ) -> Result<Announcement> {
        let request = announcement.to_request()?;
        let dto: AnnouncementDto = request_json(self.transport.as_ref(), request).await?;
        Ok(derive_announcement(dto, self.cache.now()))
    }

    /// `None` for a blank address or an unknown account.
    pub async fn account_profile(&self, address: &str) -> Result<Option<AccountProfile>> {
        let Some(request) = account_profile_request(address) else {
            return Ok(None);
        };
        let dto: Option<AccountProfileDto> =
            request_optional_json(self.transport.as_ref(), request).await?;
        Ok(dto.map(|dto| derive_account_profile(dto, self.cache.now())))
    }

    pub async fn upsert_account_profile(
        &self,
        address: &str,
        update: &AccountProfileUpdate,
    ) -> Result<AccountProfile> {
        let request = upsert_account_profile_request(address, update)?;
        let dto: AccountProfileDto = request_json(self.transport.as_ref(), request).await?;
        Ok(derive_account_profile(dto, self.cache.now()))
    }

    pub async fn checklist(&self, address: &str) -> Result<ChecklistStatus> {
        let Some(address) = progress_address(address) else {
            return Ok(ChecklistStatus::default());
        };
        let request = progress_request(address, ProgressKind::Checklist);
        let dto: Option<ChecklistStatusDto> =
            request_optional_json(self.transport.as_ref(), request).await?;
        Ok(match dto {
            Some(dto) => derive_checklist_status(dto, self.cache.now()),
            None => ChecklistStatus {
                address: address.to_lowercase(),
                tasks: Vec::new(),
            },
        })
    }

    pub async fn complete_checklist_task(
        &self,
        address: &str,
        code: &str,
        body: &ChecklistComplete,
    ) -> Result<ChecklistEntry> {
        let request = progress_action_request(
            address,
            code,
            ProgressKind::Checklist,
            to_body("checklist", body)?,
        )?;
        let dto: ChecklistEntryDto = request_json(self.transport.as_ref(), request).await?;
        Ok(derive_checklist_entry(dto, self.cache.now()))
    }

    pub async fn achievements(&self, address: &str) -> Result<AchievementStatus> {
        let Some(address) = progress_address(address) else {
            return Ok(AchievementStatus::default());
        };
        let request = progress_request(address, ProgressKind::Achievements);
        let dto: Option<AchievementStatusDto> =
            request_optional_json(self.transport.as_ref(), request).await?;
        Ok(match dto {
            Some(dto) => derive_achievement_status(dto, self.cache.now()),
            None => AchievementStatus {
                address: address.to_lowercase(),
                achievements: Vec::new(),
            },
        })
    }

    pub async fn unlock_achievement(
        &self,
        address: &str,
        code: &str,
        body: &AchievementUnlock,
    ) -> Result<AchievementProgress> {
        let request = progress_action_request(
            address,
            code,
            ProgressKind::Achievements,
            to_body("achievement", body)?,
        )?;
        let dto: AchievementProgressDto = request_json(self.transport.as_ref(), request).await?;
        Ok(derive_achievement_progress(dto, self.cache.now()))
    }

    pub async fn list_commands(&self) -> Result<Vec<CommandInfo>> {
        self.orchestrator.list_commands().await
    }

    pub async fn update_gas_config(&self, input: GasConfigUpdate) -> Result<MutationResult> {
        self.orchestrator.update_gas_config(input).await
    }

    pub async fn update_vrf_config(&self, input: VrfConfigUpdate) -> Result<MutationResult> {
        self.orchestrator.update_vrf_config(input).await
    }

    pub async fn update_treasury_distribution(
        &self,
        input: TreasuryDistribution,
    ) -> Result<MutationResult> {
        self.orchestrator.update_treasury_distribution(input).await
    }

    pub async fn record_client_whitelist(
        &self,
        input: ClientWhitelistRecord,
    ) -> Result<MutationResult> {
        self.orchestrator.record_client_whitelist(input).await
    }

    pub async fn record_consumer_whitelist(
        &self,
        input: ConsumerWhitelistRecord,
    ) -> Result<MutationResult> {
        self.orchestrator.record_consumer_whitelist(input).await
    }

    /// Decodes a list endpoint; a bare array and a single-key wrapper object
    /// are both accepted.
    async fn fetch_list<D: DeserializeOwned>(&self, request: ApiRequest) -> Result<Vec<D>> {
        let url = request_url(self.transport.as_ref(), &request);
        let body: Value = request_json(self.transport.as_ref(), request).await?;
        to_array(&body)
            .iter()
            .map(|item| serde_json::from_value(item.clone()).map_err(|e| Error::malformed(&url, e)))
            .collect()
    }
}

fn to_body(field: &'static str, body: &impl Serialize) -> Result<Value, ValidationError> {
    serde_json::to_value(body).map_err(|e| ValidationError::invalid(field, e.to_string()))
}

impl<T: Transport + fmt::Display, C> fmt::Display for SupraClient<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SupraClient({})", self.transport)
    }
}
