//! Typed views derived from the status payload and the auxiliary endpoints.
//!
//! Derivers are pure: they take the raw payload (or a decoded wire body), the
//! locally-held fallback and the current time, and never touch the network.

pub mod account;
pub mod admin;
pub mod chat;
pub mod lottery;
pub mod progress;
pub mod treasury;
pub mod vrf;
pub mod whitelist;

pub use account::{
    AccountProfile,
    AccountProfileUpdate,
    AvatarInfo,
};
pub use admin::{
    AdminConfig,
    AdminGasConfig,
    AdminVrfConfig,
    AdminWhitelistConfig,
};
pub use chat::{
    Announcement,
    ChatMessage,
    PostAnnouncement,
    PostChatMessage,
};
pub use lottery::{
    LotteryStatus,
    LotterySummary,
};
pub use progress::{
    AchievementProgress,
    AchievementStatus,
    AchievementUnlock,
    ChecklistComplete,
    ChecklistEntry,
    ChecklistStatus,
};
pub use treasury::{
    TreasuryBalances,
    TreasuryConfig,
    TreasuryDistribution,
};
pub use vrf::{
    VrfLog,
    VrfStatus,
};
pub use whitelist::WhitelistStatus;
