use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

use crate::llm::LlmError;
use crate::mail::MailError;

/// Engine failures surfaced to callers of the intake and planning entry
/// points.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("database error: {0}")]
    Db(#[from] DbErr),
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("deal {0} not found")]
    DealNotFound(Uuid),
    #[error("milestone {0} not found")]
    MilestoneNotFound(Uuid),
}

pub type IntakeResult<T> = Result<T, IntakeError>;
