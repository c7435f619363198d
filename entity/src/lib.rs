pub mod deal_ai_contexts;
pub mod deals;
pub mod email_deals;
pub mod intake_jobs;
pub mod milestones;
pub mod notifications;
pub mod personality_profiles;
pub mod tasks;
pub mod users;
