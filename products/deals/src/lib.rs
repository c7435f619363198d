//! Deal intake engine: classify mail threads with an LLM, staff the deal
//! from the current roster, and plan its milestones and tasks.
//!
//! External services are reached only through the [`MailSource`],
//! [`LlmClient`] and [`Notifier`] traits; callers construct the
//! implementations once and hand them to [`DealIntake`].

pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod intake;
pub mod llm;
pub mod mail;
pub mod milestones;
pub mod notify;
pub mod scoring;
pub mod stage;
pub mod tasks;
pub mod workload;

pub use config::IntakeConfig;
pub use error::{IntakeError, IntakeResult};
pub use extract::{ExtractedDeal, ExtractionOutcome, extract_deal_info};
pub use intake::{DealIntake, IntakeStats};
pub use llm::{ChatRequest, LlmClient, LlmConfig, LlmError, OpenAiClient};
pub use mail::{GmailClient, GmailConfig, MailError, MailSource, ParsedEmail};
pub use milestones::{create_milestones_at, create_milestones_for_deal};
pub use notify::{DbNotifier, NewNotification, Notifier, NotifyError};
pub use scoring::{TeamAssignment, assign_team};
pub use stage::{StageAdvance, advance_deal_stage};
pub use tasks::create_tasks_from_milestone;
pub use workload::{get_active_deals_count, get_user_workload};
