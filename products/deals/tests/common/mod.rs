#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use entity::deals::{self, DealStatus, DealType, PodTeamMember, Stage, pod_team_json};
use entity::personality_profiles::{self, ExperienceLevel};
use entity::tasks::{self, Priority};
use entity::users::{self, AccountStatus};
use migration::{Migrator, MigratorTrait};
use products_deals::{
    ChatRequest, LlmClient, LlmError, MailError, MailSource, NewNotification, Notifier,
    NotifyError, ParsedEmail,
};
use sea_orm::{ActiveValue::Set, ConnectionTrait, Database, DatabaseConnection, EntityTrait};
use serde_json::json;
use uuid::Uuid;

pub async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

pub async fn seed_user(db: &DatabaseConnection, name: &str) -> users::Model {
    seed_user_with_status(db, name, AccountStatus::Active).await
}

pub async fn seed_user_with_status(
    db: &DatabaseConnection,
    name: &str,
    status: AccountStatus,
) -> users::Model {
    let now = Utc::now().into();
    let model = users::Model {
        id: Uuid::new_v4(),
        email: format!("{}@bank.test", name.to_lowercase().replace(' ', ".")),
        name: name.to_string(),
        phone: None,
        status,
        created_at: now,
        updated_at: now,
    };
    users::Entity::insert(users::ActiveModel {
        id: Set(model.id),
        email: Set(model.email.clone()),
        name: Set(model.name.clone()),
        phone: Set(None),
        status: Set(model.status),
        created_at: Set(now),
        updated_at: Set(now),
    })
    .exec_without_returning(db)
    .await
    .unwrap();
    // Creation order is the scoring tie-break; keep stamps distinct.
    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    model
}

pub async fn seed_profile(
    db: &DatabaseConnection,
    user_id: Uuid,
    deal_types: &[&str],
    sectors: &[&str],
    level: Option<ExperienceLevel>,
) {
    let now = Utc::now().into();
    personality_profiles::Entity::insert(personality_profiles::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        preferred_deal_types: Set(json!(deal_types)),
        preferred_sectors: Set(json!(sectors)),
        workload_capacity: Set(None),
        experience_level: Set(level),
        leadership_style: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    })
    .exec_without_returning(db)
    .await
    .unwrap();
}

/// Standalone tasks for a user, not tied to any deal.
pub async fn seed_tasks(db: &DatabaseConnection, user_id: Uuid, count: usize, status: tasks::Status) {
    for i in 0..count {
        let now = Utc::now().into();
        tasks::Entity::insert(tasks::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(format!("Existing task {i}")),
            description: Set(None),
            deal_id: Set(None),
            deal_stage: Set(None),
            milestone_id: Set(None),
            assigned_to: Set(Some(user_id)),
            priority: Set(Priority::Medium),
            due_date: Set(None),
            status: Set(status),
            task_type: Set("general".into()),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .exec_without_returning(db)
        .await
        .unwrap();
    }
}

pub async fn seed_deal(
    db: &DatabaseConnection,
    name: &str,
    lead: &str,
    pod_team: &[PodTeamMember],
    status: DealStatus,
) -> Uuid {
    let id = Uuid::new_v4();
    let now = Utc::now().into();
    deals::Entity::insert(deals::ActiveModel {
        id: Set(id),
        name: Set(name.to_string()),
        deal_type: Set(DealType::MergersAcquisitions),
        stage: Set(Stage::Origination),
        value: Set(25.0),
        client: Set("Acme".into()),
        sector: Set("Technology".into()),
        lead: Set(lead.to_string()),
        description: Set(None),
        pod_team: Set(pod_team_json(pod_team)),
        progress: Set(10),
        status: Set(status),
        created_at: Set(now),
        updated_at: Set(now),
    })
    .exec_without_returning(db)
    .await
    .unwrap();
    id
}

pub fn member(user: &users::Model, role: deals::PodRole) -> PodTeamMember {
    PodTeamMember {
        user_id: Some(user.id),
        name: user.name.clone(),
        role,
        email: Some(user.email.clone()),
        phone: None,
    }
}

pub fn email(id: &str, thread: &str, subject: &str, body: &str) -> ParsedEmail {
    ParsedEmail {
        id: id.to_string(),
        thread_id: thread.to_string(),
        from: "Jane Doe <jane@acme.test>".to_string(),
        subject: subject.to_string(),
        date: "Mon, 6 Oct 2025 09:30:00 +0000".to_string(),
        received_at: Some(Utc::now()),
        body: body.to_string(),
        snippet: body.chars().take(40).collect(),
        attachments: vec![],
    }
}

pub fn accepted(name: &str, confidence: u8) -> String {
    json!({
        "isDeal": true,
        "confidence": confidence,
        "name": name,
        "dealType": "M&A",
        "client": "Acme Corp",
        "sector": "Technology",
        "estimatedValue": 120,
        "description": "Sale of a majority stake.",
        "contactName": "Jane Doe",
        "contactEmail": "jane@acme.test"
    })
    .to_string()
}

pub struct FakeMail {
    emails: Vec<ParsedEmail>,
}

impl FakeMail {
    pub fn new(emails: Vec<ParsedEmail>) -> Self {
        Self { emails }
    }
}

#[async_trait]
impl MailSource for FakeMail {
    async fn scan_deal_folder(&self, _folder: &str) -> Result<Vec<ParsedEmail>, MailError> {
        Ok(self.emails.clone())
    }
}

pub struct BrokenMail;

#[async_trait]
impl MailSource for BrokenMail {
    async fn scan_deal_folder(&self, folder: &str) -> Result<Vec<ParsedEmail>, MailError> {
        Err(MailError::FolderNotFound(folder.to_string()))
    }
}

/// Answers extraction requests by matching a key against the prompt and
/// every other request with a fixed summary.
pub struct ScriptedLlm {
    rules: Vec<(String, String)>,
    pub calls: Mutex<HashMap<&'static str, usize>>,
}

pub const SUMMARY: &str = "Client wants to explore a sale. Timing is Q1.";

impl ScriptedLlm {
    pub fn new(rules: &[(&str, String)]) -> Self {
        Self {
            rules: rules
                .iter()
                .map(|(key, response)| (key.to_string(), response.clone()))
                .collect(),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn count(&self, kind: &'static str) -> usize {
        self.calls.lock().unwrap().get(kind).copied().unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError> {
        let kind = if request.json_response { "extract" } else { "summary" };
        *self.calls.lock().unwrap().entry(kind).or_default() += 1;
        if !request.json_response {
            return Ok(SUMMARY.to_string());
        }
        Ok(self
            .rules
            .iter()
            .find(|(key, _)| request.user.contains(key.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| json!({"isDeal": false, "confidence": 5}).to_string()))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

pub struct DownLlm;

#[async_trait]
impl LlmClient for DownLlm {
    async fn complete(&self, _request: ChatRequest) -> Result<String, LlmError> {
        Err(LlmError::Api {
            status: 503,
            message: "upstream unavailable".into(),
        })
    }

    fn model_name(&self) -> &str {
        "down"
    }
}

/// Runs `sql` against the store the first time an extraction prompt
/// contains `trigger`, then answers like `inner`.
pub struct SabotagingLlm {
    pub inner: ScriptedLlm,
    pub db: DatabaseConnection,
    pub trigger: String,
    pub sql: String,
}

#[async_trait]
impl LlmClient for SabotagingLlm {
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError> {
        if request.json_response && request.user.contains(self.trigger.as_str()) {
            self.db.execute_unprepared(&self.sql).await.unwrap();
        }
        self.inner.complete(request).await
    }

    fn model_name(&self) -> &str {
        "sabotaging"
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub fail: bool,
    pub sent: Mutex<Vec<NewNotification>>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<NewNotification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: NewNotification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification);
        if self.fail {
            return Err(NotifyError::Rejected("inbox full".into()));
        }
        Ok(())
    }
}
