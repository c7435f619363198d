use async_trait::async_trait;
use chrono::Utc;
use entity::notifications;
use sea_orm::{ActiveValue::Set, DatabaseConnection, DbErr, EntityTrait};
use thiserror::Error;
use uuid::Uuid;

pub const DEAL_ASSIGNMENT_KIND: &str = "deal_assignment";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub link: Option<String>,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification store error: {0}")]
    Store(#[from] DbErr),
    #[error("notification rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: NewNotification) -> Result<(), NotifyError>;
}

/// In-app notifier backed by the `notifications` table.
#[derive(Clone)]
pub struct DbNotifier {
    db: DatabaseConnection,
}

impl DbNotifier {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Notifier for DbNotifier {
    async fn notify(&self, notification: NewNotification) -> Result<(), NotifyError> {
        let row = notifications::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(notification.user_id),
            title: Set(notification.title),
            message: Set(notification.message),
            kind: Set(notification.kind),
            link: Set(notification.link),
            is_read: Set(false),
            created_at: Set(Utc::now().into()),
        };
        notifications::Entity::insert(row)
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }
}
