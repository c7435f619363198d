//! Folder intake: turn unprocessed mail threads into staffed deals.
//!
//! Each thread is claimed through its `intake_jobs` row before any work
//! happens, and every completed sub-step is appended to that row. The
//! thread's `email_deals` row is written once, with its final status.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use entity::deals::{self, DealStatus, PodRole, Stage, pod_team_json};
use entity::{email_deals, intake_jobs};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveEnum, ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter,
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::IntakeConfig;
use crate::context::attach_email_context;
use crate::error::{IntakeError, IntakeResult};
use crate::extract::{ExtractedDeal, ExtractionOutcome, classify_thread};
use crate::llm::LlmClient;
use crate::mail::{MailSource, MailThread, group_by_thread};
use crate::milestones::create_milestones_at;
use crate::notify::{DEAL_ASSIGNMENT_KIND, NewNotification, Notifier};
use crate::scoring::assign_team;
use crate::stage::stage_progress;
use crate::tasks::create_tasks_for;

pub const STEP_TEAM_ASSIGNED: &str = "team_assigned";
pub const STEP_DEAL_CREATED: &str = "deal_created";
pub const STEP_MILESTONES_CREATED: &str = "milestones_created";
pub const STEP_TASKS_CREATED: &str = "tasks_created";
pub const STEP_CONTEXT_ATTACHED: &str = "context_attached";
pub const STEP_TEAM_NOTIFIED: &str = "team_notified";
/// Reported when the thread's intake job could not be inserted.
pub const STEP_THREAD_CLAIMED: &str = "thread_claimed";
/// Reported as the failed step when the final `email_deals` write fails.
pub const STEP_OUTCOME_RECORDED: &str = "outcome_recorded";

/// Counters for one pass. `processed` counts threads this pass claimed and
/// finished (created, ignored or errored); `skipped` counts threads already
/// recorded or claimed by another pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IntakeStats {
    pub processed: u32,
    pub created: u32,
    pub ignored: u32,
    pub skipped: u32,
    pub errors: u32,
}

enum ThreadOutcome {
    Created,
    Ignored,
    Skipped,
    Failed,
}

/// Intake job bookkeeping for the thread being processed.
struct JobProgress {
    id: Uuid,
    current: &'static str,
    steps: Vec<&'static str>,
    deal_id: Option<Uuid>,
}

impl JobProgress {
    fn steps_json(&self) -> Value {
        json!(self.steps)
    }
}

pub struct DealIntake {
    db: DatabaseConnection,
    mail: Arc<dyn MailSource>,
    llm: Arc<dyn LlmClient>,
    notifier: Arc<dyn Notifier>,
    config: IntakeConfig,
}

impl DealIntake {
    pub fn new(
        db: DatabaseConnection,
        mail: Arc<dyn MailSource>,
        llm: Arc<dyn LlmClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            db,
            mail,
            llm,
            notifier,
            config: IntakeConfig::default(),
        }
    }

    pub fn with_config(mut self, config: IntakeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    /// Run one pass over `folder`. Only a failed folder scan is returned as
    /// an error; per-thread failures are recorded and counted.
    #[instrument(name = "deals.process_email_folder", skip(self))]
    pub async fn process_email_folder(&self, folder: &str) -> IntakeResult<IntakeStats> {
        let emails = self.mail.scan_deal_folder(folder).await?;
        let threads = group_by_thread(emails);
        let mut stats = IntakeStats::default();

        for thread in &threads {
            match self.process_thread(folder, thread).await {
                ThreadOutcome::Created => {
                    stats.processed += 1;
                    stats.created += 1;
                }
                ThreadOutcome::Ignored => {
                    stats.processed += 1;
                    stats.ignored += 1;
                }
                ThreadOutcome::Failed => {
                    stats.processed += 1;
                    stats.errors += 1;
                }
                ThreadOutcome::Skipped => stats.skipped += 1,
            }
        }

        info!(
            threads = threads.len(),
            processed = stats.processed,
            created = stats.created,
            ignored = stats.ignored,
            skipped = stats.skipped,
            errors = stats.errors,
            "intake pass finished"
        );
        Ok(stats)
    }

    #[instrument(name = "deals.process_thread", skip_all, fields(thread = %thread.thread_id))]
    async fn process_thread(&self, folder: &str, thread: &MailThread) -> ThreadOutcome {
        let job_id = match self.claim_thread(folder, thread).await {
            Ok(Some(job_id)) => job_id,
            Ok(None) => return ThreadOutcome::Skipped,
            Err(err) => {
                error!(error = %err, "could not claim thread");
                self.record_claim_failure(thread, &err.to_string()).await;
                return ThreadOutcome::Failed;
            }
        };

        let outcome = match classify_thread(self.llm.as_ref(), &thread.messages, &self.config).await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "deal extraction failed");
                ExtractionOutcome::Malformed(format!("extraction failed: {err}"))
            }
        };

        let deal = match outcome {
            ExtractionOutcome::Accepted(deal) => deal,
            other => {
                let reason = other.ignore_reason();
                let extracted = match other {
                    ExtractionOutcome::Rejected { confidence } => {
                        Some(json!({ "isDeal": false, "confidence": confidence }))
                    }
                    _ => None,
                };
                return match self
                    .finish_thread(
                        thread,
                        job_id,
                        email_deals::Status::Ignored,
                        None,
                        extracted.clone(),
                        reason,
                    )
                    .await
                {
                    Ok(()) => ThreadOutcome::Ignored,
                    Err(err) => {
                        error!(error = %err, "could not record ignored thread");
                        let job = JobProgress {
                            id: job_id,
                            current: STEP_OUTCOME_RECORDED,
                            steps: Vec::new(),
                            deal_id: None,
                        };
                        self.record_failure(thread, &job, extracted, &err.to_string())
                            .await;
                        ThreadOutcome::Failed
                    }
                };
            }
        };

        let mut job = JobProgress {
            id: job_id,
            current: STEP_TEAM_ASSIGNED,
            steps: Vec::new(),
            deal_id: None,
        };
        let result = self.create_deal(thread, &deal, &mut job).await;
        let result = match result {
            Ok(deal_id) => {
                job.current = STEP_OUTCOME_RECORDED;
                self.finish_thread(
                    thread,
                    job.id,
                    email_deals::Status::Processed,
                    Some(deal_id),
                    Some(deal.snapshot()),
                    None,
                )
                .await
                .map_err(IntakeError::from)
            }
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => ThreadOutcome::Created,
            Err(err) => {
                error!(step = job.current, error = %err, "thread intake failed");
                self.record_failure(thread, &job, Some(deal.snapshot()), &err.to_string())
                    .await;
                ThreadOutcome::Failed
            }
        }
    }

    /// Insert the thread's intake job. `None` means the thread is already
    /// recorded or another pass holds it.
    async fn claim_thread(&self, folder: &str, thread: &MailThread) -> Result<Option<Uuid>, DbErr> {
        let recorded = email_deals::Entity::find()
            .filter(email_deals::Column::ThreadId.eq(thread.thread_id.as_str()))
            .one(&self.db)
            .await?;
        if recorded.is_some() {
            return Ok(None);
        }

        let job_id = Uuid::new_v4();
        let job = intake_jobs::ActiveModel {
            id: Set(job_id),
            thread_id: Set(thread.thread_id.clone()),
            folder: Set(folder.to_string()),
            status: Set(intake_jobs::JobStatus::Running),
            steps: Set(json!([])),
            deal_id: Set(None),
            failed_step: Set(None),
            last_error: Set(None),
            started_at: Set(Utc::now().into()),
            finished_at: Set(None),
        };
        let inserted = intake_jobs::Entity::insert(job)
            .on_conflict(
                OnConflict::column(intake_jobs::Column::ThreadId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok((inserted > 0).then_some(job_id))
    }

    async fn create_deal(
        &self,
        thread: &MailThread,
        extracted: &ExtractedDeal,
        job: &mut JobProgress,
    ) -> IntakeResult<Uuid> {
        let now = Utc::now();

        job.current = STEP_TEAM_ASSIGNED;
        let team = assign_team(
            &self.db,
            extracted.deal_type.as_str(),
            &extracted.sector,
            Stage::Origination,
        )
        .await?;
        let pod_team = team.pod_team();
        self.complete_step(job).await?;

        job.current = STEP_DEAL_CREATED;
        let deal_id = Uuid::new_v4();
        let stamp: DateTimeWithTimeZone = now.into();
        let deal = deals::ActiveModel {
            id: Set(deal_id),
            name: Set(extracted.name.clone()),
            deal_type: Set(extracted.deal_type),
            stage: Set(Stage::Origination),
            value: Set(extracted.estimated_value),
            client: Set(extracted.client.clone()),
            sector: Set(extracted.sector.clone()),
            lead: Set(team.lead.name.clone()),
            description: Set(extracted.description.clone()),
            pod_team: Set(pod_team_json(&pod_team)),
            progress: Set(stage_progress(Stage::Origination)),
            status: Set(DealStatus::Active),
            created_at: Set(stamp),
            updated_at: Set(stamp),
        };
        deals::Entity::insert(deal)
            .exec_without_returning(&self.db)
            .await?;
        job.deal_id = Some(deal_id);
        self.complete_step(job).await?;

        job.current = STEP_MILESTONES_CREATED;
        let batch = create_milestones_at(&self.db, deal_id, Stage::Origination, now).await?;
        self.complete_step(job).await?;

        job.current = STEP_TASKS_CREATED;
        for milestone in &batch {
            create_tasks_for(&self.db, milestone, deal_id, &pod_team, now).await?;
        }
        self.complete_step(job).await?;

        job.current = STEP_CONTEXT_ATTACHED;
        for email in &thread.messages {
            attach_email_context(&self.db, self.llm.as_ref(), deal_id, email, &self.config)
                .await?;
        }
        self.complete_step(job).await?;

        job.current = STEP_TEAM_NOTIFIED;
        self.notify_team(deal_id, &extracted.name, &pod_team).await;
        self.complete_step(job).await?;

        Ok(deal_id)
    }

    /// Fire-and-forget: failures are logged and never retried.
    async fn notify_team(&self, deal_id: Uuid, deal_name: &str, pod_team: &[deals::PodTeamMember]) {
        for member in pod_team {
            let Some(user_id) = member.user_id else {
                continue;
            };
            let notification = NewNotification {
                user_id,
                title: "New deal assignment".to_string(),
                message: format!(
                    "You have been assigned to {deal_name} as {}.",
                    role_label(member.role)
                ),
                kind: DEAL_ASSIGNMENT_KIND.to_string(),
                link: Some(format!("/deals/{deal_id}")),
            };
            if let Err(err) = self.notifier.notify(notification).await {
                warn!(user = %user_id, error = %err, "deal assignment notification failed");
            }
        }
    }

    async fn complete_step(&self, job: &mut JobProgress) -> Result<(), DbErr> {
        job.steps.push(job.current);
        intake_jobs::Entity::update_many()
            .col_expr(intake_jobs::Column::Steps, Expr::value(job.steps_json()))
            .col_expr(intake_jobs::Column::DealId, Expr::value(job.deal_id))
            .filter(intake_jobs::Column::Id.eq(job.id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn finish_thread(
        &self,
        thread: &MailThread,
        job_id: Uuid,
        status: email_deals::Status,
        deal_id: Option<Uuid>,
        extracted: Option<Value>,
        notes: Option<String>,
    ) -> Result<(), DbErr> {
        self.insert_email_deal(thread, status, deal_id, extracted, notes)
            .await?;
        let now: DateTime<Utc> = Utc::now();
        intake_jobs::Entity::update_many()
            .col_expr(
                intake_jobs::Column::Status,
                Expr::value(intake_jobs::JobStatus::Completed.to_value()),
            )
            .col_expr(
                intake_jobs::Column::FinishedAt,
                Expr::value(Some(DateTimeWithTimeZone::from(now))),
            )
            .filter(intake_jobs::Column::Id.eq(job_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Best effort: write the `error` row and mark the job failed. Each write
    /// is attempted even when the other fails.
    async fn record_failure(
        &self,
        thread: &MailThread,
        job: &JobProgress,
        extracted: Option<Value>,
        message: &str,
    ) {
        if let Err(err) = self
            .insert_email_deal(
                thread,
                email_deals::Status::Error,
                job.deal_id,
                extracted,
                Some(format!("{} failed: {message}", job.current)),
            )
            .await
        {
            error!(error = %err, "could not record failed thread");
        }

        let now: DateTime<Utc> = Utc::now();
        let marked = intake_jobs::Entity::update_many()
            .col_expr(
                intake_jobs::Column::Status,
                Expr::value(intake_jobs::JobStatus::Failed.to_value()),
            )
            .col_expr(
                intake_jobs::Column::FailedStep,
                Expr::value(Some(job.current.to_string())),
            )
            .col_expr(
                intake_jobs::Column::LastError,
                Expr::value(Some(message.to_string())),
            )
            .col_expr(
                intake_jobs::Column::FinishedAt,
                Expr::value(Some(DateTimeWithTimeZone::from(now))),
            )
            .filter(intake_jobs::Column::Id.eq(job.id))
            .exec(&self.db)
            .await;
        if let Err(err) = marked {
            error!(error = %err, "could not mark intake job failed");
        }
    }

    /// No job row exists when the claim itself fails, so only the `error`
    /// row is attempted.
    async fn record_claim_failure(&self, thread: &MailThread, message: &str) {
        if let Err(err) = self
            .insert_email_deal(
                thread,
                email_deals::Status::Error,
                None,
                None,
                Some(format!("{STEP_THREAD_CLAIMED} failed: {message}")),
            )
            .await
        {
            error!(error = %err, "could not record unclaimed thread");
        }
    }

    async fn insert_email_deal(
        &self,
        thread: &MailThread,
        status: email_deals::Status,
        deal_id: Option<Uuid>,
        extracted: Option<Value>,
        notes: Option<String>,
    ) -> Result<(), DbErr> {
        let first = thread
            .first()
            .ok_or_else(|| DbErr::Custom(format!("thread {} has no messages", thread.thread_id)))?;
        let row = email_deals::ActiveModel {
            id: Set(Uuid::new_v4()),
            email_id: Set(first.id.clone()),
            thread_id: Set(thread.thread_id.clone()),
            subject: Set(first.subject.clone()),
            sender: Set(first.from.clone()),
            received_at: Set(first.received_at.map(Into::into)),
            extracted_data: Set(extracted),
            deal_id: Set(deal_id),
            status: Set(status),
            processing_notes: Set(notes),
            created_at: Set(Utc::now().into()),
        };
        email_deals::Entity::insert(row)
            .on_conflict(
                OnConflict::column(email_deals::Column::ThreadId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }
}

fn role_label(role: PodRole) -> &'static str {
    match role {
        PodRole::Lead => "Lead",
        PodRole::Associate => "Associate",
        PodRole::Analyst => "Analyst",
    }
}
