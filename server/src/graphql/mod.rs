use std::sync::Arc;

use async_graphql::{
    Context, EmptySubscription, Enum, ErrorExtensions, ID, Object, Schema, SimpleObject,
};
use chrono::{DateTime, Utc};
use entity::deals::{self, PodRole, PodTeamMember, Stage};
use entity::{email_deals, milestones, tasks};
use platform_api::ApiError;
use platform_db::DbPool;
use products_deals::{DealIntake, IntakeError, IntakeStats, TeamAssignment};
use sea_orm::{ColumnTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

pub type SchemaType = Schema<QueryRoot, MutationRoot, EmptySubscription>;

const DEFAULT_PAGE: u64 = 50;
const MAX_PAGE: u64 = 200;

/// Shared resolver data. `intake` is absent when mail or LLM credentials
/// are not configured.
#[derive(Clone)]
pub struct GraphqlData {
    pub pool: DbPool,
    pub intake: Option<Arc<DealIntake>>,
    pub default_folder: String,
}

pub fn build_schema(data: GraphqlData) -> SchemaType {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(data)
        .finish()
}

type GqlResult<T> = async_graphql::Result<T>;

fn api(err: ApiError) -> async_graphql::Error {
    err.extend()
}

fn db_error(err: DbErr) -> async_graphql::Error {
    api(ApiError::internal(err.into()))
}

fn intake_error(err: IntakeError) -> async_graphql::Error {
    let mapped = match err {
        IntakeError::DealNotFound(_) => ApiError::NotFound("deal"),
        IntakeError::MilestoneNotFound(_) => ApiError::NotFound("milestone"),
        IntakeError::Mail(err) => ApiError::Unavailable(err.to_string()),
        IntakeError::Llm(err) => ApiError::Unavailable(err.to_string()),
        other => ApiError::internal(other.into()),
    };
    api(mapped)
}

fn data<'a>(ctx: &Context<'a>) -> GqlResult<&'a GraphqlData> {
    ctx.data::<GraphqlData>()
        .map_err(|_| api(ApiError::internal(anyhow::anyhow!("missing resolver data"))))
}

fn parse_id(id: &ID, what: &str) -> GqlResult<Uuid> {
    Uuid::parse_str(id.as_str()).map_err(|_| api(ApiError::invalid(format!("invalid {what} id"))))
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum DealStage {
    Origination,
    Structuring,
    Diligence,
    Legal,
    Close,
}

impl From<DealStage> for Stage {
    fn from(value: DealStage) -> Self {
        match value {
            DealStage::Origination => Stage::Origination,
            DealStage::Structuring => Stage::Structuring,
            DealStage::Diligence => Stage::Diligence,
            DealStage::Legal => Stage::Legal,
            DealStage::Close => Stage::Close,
        }
    }
}

impl From<Stage> for DealStage {
    fn from(value: Stage) -> Self {
        match value {
            Stage::Origination => DealStage::Origination,
            Stage::Structuring => DealStage::Structuring,
            Stage::Diligence => DealStage::Diligence,
            Stage::Legal => DealStage::Legal,
            Stage::Close => DealStage::Close,
        }
    }
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum EmailDealStatus {
    Processed,
    Ignored,
    Error,
}

impl From<EmailDealStatus> for email_deals::Status {
    fn from(value: EmailDealStatus) -> Self {
        match value {
            EmailDealStatus::Processed => email_deals::Status::Processed,
            EmailDealStatus::Ignored => email_deals::Status::Ignored,
            EmailDealStatus::Error => email_deals::Status::Error,
        }
    }
}

impl From<email_deals::Status> for EmailDealStatus {
    fn from(value: email_deals::Status) -> Self {
        match value {
            email_deals::Status::Processed => EmailDealStatus::Processed,
            email_deals::Status::Ignored => EmailDealStatus::Ignored,
            email_deals::Status::Error => EmailDealStatus::Error,
        }
    }
}

#[derive(Clone, Debug, SimpleObject, Serialize)]
pub struct HealthPayload {
    pub ok: bool,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct PodMember {
    pub user_id: Option<ID>,
    pub name: String,
    pub role: String,
    pub email: Option<String>,
}

impl From<PodTeamMember> for PodMember {
    fn from(member: PodTeamMember) -> Self {
        Self {
            user_id: member.user_id.map(|id| ID(id.to_string())),
            name: member.name,
            role: match member.role {
                PodRole::Lead => "Lead",
                PodRole::Associate => "Associate",
                PodRole::Analyst => "Analyst",
            }
            .to_string(),
            email: member.email,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct DealNode {
    pub id: ID,
    pub name: String,
    pub deal_type: String,
    pub stage: DealStage,
    pub value: f64,
    pub client: String,
    pub sector: String,
    pub lead: String,
    pub description: Option<String>,
    pub pod_team: Vec<PodMember>,
    pub progress: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<deals::Model> for DealNode {
    fn from(deal: deals::Model) -> Self {
        let pod_team = deal.pod_team().into_iter().map(PodMember::from).collect();
        let status = match deal.status {
            deals::DealStatus::Active => "Active",
            deals::DealStatus::OnHold => "On Hold",
            deals::DealStatus::Closed => "Closed",
            deals::DealStatus::Archived => "Archived",
        };
        Self {
            id: ID(deal.id.to_string()),
            name: deal.name,
            deal_type: deal.deal_type.as_str().to_string(),
            stage: deal.stage.into(),
            value: deal.value,
            client: deal.client,
            sector: deal.sector,
            lead: deal.lead,
            description: deal.description,
            pod_team,
            progress: deal.progress,
            status: status.to_string(),
            created_at: deal.created_at.with_timezone(&Utc),
            updated_at: deal.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct MilestoneNode {
    pub id: ID,
    pub title: String,
    pub description: Option<String>,
    pub stage: DealStage,
    pub order: i32,
    pub status: String,
    pub due_date: Option<DateTime<Utc>>,
}

impl From<milestones::Model> for MilestoneNode {
    fn from(m: milestones::Model) -> Self {
        let status = match m.status {
            milestones::MilestoneStatus::Pending => "pending",
            milestones::MilestoneStatus::InProgress => "in_progress",
            milestones::MilestoneStatus::Completed => "completed",
        };
        Self {
            id: ID(m.id.to_string()),
            title: m.title,
            description: m.description,
            stage: m.stage.into(),
            order: m.sort_order,
            status: status.to_string(),
            due_date: m.due_date.map(|d| d.with_timezone(&Utc)),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct TaskNode {
    pub id: ID,
    pub title: String,
    pub description: Option<String>,
    pub milestone_id: Option<ID>,
    pub assigned_to: Option<ID>,
    pub priority: String,
    pub status: String,
    pub task_type: String,
    pub due_date: Option<DateTime<Utc>>,
}

impl From<tasks::Model> for TaskNode {
    fn from(t: tasks::Model) -> Self {
        let priority = match t.priority {
            tasks::Priority::Low => "Low",
            tasks::Priority::Medium => "Medium",
            tasks::Priority::High => "High",
        };
        let status = match t.status {
            tasks::Status::Pending => "Pending",
            tasks::Status::InProgress => "In Progress",
            tasks::Status::Completed => "Completed",
        };
        Self {
            id: ID(t.id.to_string()),
            title: t.title,
            description: t.description,
            milestone_id: t.milestone_id.map(|id| ID(id.to_string())),
            assigned_to: t.assigned_to.map(|id| ID(id.to_string())),
            priority: priority.to_string(),
            status: status.to_string(),
            task_type: t.task_type,
            due_date: t.due_date.map(|d| d.with_timezone(&Utc)),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct EmailDealNode {
    pub id: ID,
    pub thread_id: String,
    pub subject: String,
    pub sender: String,
    pub status: EmailDealStatus,
    pub deal_id: Option<ID>,
    pub processing_notes: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<email_deals::Model> for EmailDealNode {
    fn from(row: email_deals::Model) -> Self {
        Self {
            id: ID(row.id.to_string()),
            thread_id: row.thread_id,
            subject: row.subject,
            sender: row.sender,
            status: row.status.into(),
            deal_id: row.deal_id.map(|id| ID(id.to_string())),
            processing_notes: row.processing_notes,
            received_at: row.received_at.map(|d| d.with_timezone(&Utc)),
            created_at: row.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct TeamSuggestion {
    pub lead: PodMember,
    pub members: Vec<PodMember>,
}

impl From<TeamAssignment> for TeamSuggestion {
    fn from(team: TeamAssignment) -> Self {
        Self {
            lead: team.lead.into(),
            members: team.members.into_iter().map(PodMember::from).collect(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct IntakeStatsPayload {
    pub processed: u32,
    pub created: u32,
    pub ignored: u32,
    pub skipped: u32,
    pub errors: u32,
}

impl From<IntakeStats> for IntakeStatsPayload {
    fn from(stats: IntakeStats) -> Self {
        Self {
            processed: stats.processed,
            created: stats.created,
            ignored: stats.ignored,
            skipped: stats.skipped,
            errors: stats.errors,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct StageAdvancePayload {
    pub deal: DealNode,
    pub milestones: Vec<MilestoneNode>,
    pub tasks_created: i32,
}

#[derive(Default)]
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    #[instrument(name = "graphql.health", skip_all)]
    async fn health(&self) -> GqlResult<HealthPayload> {
        Ok(HealthPayload { ok: true })
    }

    #[instrument(name = "graphql.version", skip_all)]
    async fn version(&self) -> GqlResult<String> {
        Ok(env!("CARGO_PKG_VERSION").to_string())
    }

    /// Intake records, newest first.
    #[instrument(name = "graphql.email_deals", skip(self, ctx))]
    async fn email_deals(
        &self,
        ctx: &Context<'_>,
        status: Option<EmailDealStatus>,
        first: Option<i32>,
    ) -> GqlResult<Vec<EmailDealNode>> {
        let data = data(ctx)?;
        let limit = match first {
            Some(n) if n < 1 => return Err(api(ApiError::invalid("first must be positive"))),
            Some(n) => (n as u64).min(MAX_PAGE),
            None => DEFAULT_PAGE,
        };
        let mut query = email_deals::Entity::find();
        if let Some(status) = status {
            query = query.filter(email_deals::Column::Status.eq(email_deals::Status::from(status)));
        }
        let rows = query
            .order_by_desc(email_deals::Column::CreatedAt)
            .limit(limit)
            .all(&data.pool)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(EmailDealNode::from).collect())
    }

    #[instrument(name = "graphql.deal", skip(self, ctx))]
    async fn deal(&self, ctx: &Context<'_>, id: ID) -> GqlResult<Option<DealNode>> {
        let data = data(ctx)?;
        let deal_id = parse_id(&id, "deal")?;
        let deal = deals::Entity::find_by_id(deal_id)
            .one(&data.pool)
            .await
            .map_err(db_error)?;
        Ok(deal.map(DealNode::from))
    }

    #[instrument(name = "graphql.deal_milestones", skip(self, ctx))]
    async fn deal_milestones(&self, ctx: &Context<'_>, deal_id: ID) -> GqlResult<Vec<MilestoneNode>> {
        let data = data(ctx)?;
        let deal_id = parse_id(&deal_id, "deal")?;
        let rows = milestones::Entity::find()
            .filter(milestones::Column::DealId.eq(deal_id))
            .order_by_asc(milestones::Column::CreatedAt)
            .order_by_asc(milestones::Column::SortOrder)
            .all(&data.pool)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(MilestoneNode::from).collect())
    }

    #[instrument(name = "graphql.deal_tasks", skip(self, ctx))]
    async fn deal_tasks(&self, ctx: &Context<'_>, deal_id: ID) -> GqlResult<Vec<TaskNode>> {
        let data = data(ctx)?;
        let deal_id = parse_id(&deal_id, "deal")?;
        let rows = tasks::Entity::find()
            .filter(tasks::Column::DealId.eq(deal_id))
            .order_by_asc(tasks::Column::DueDate)
            .all(&data.pool)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(TaskNode::from).collect())
    }

    /// Who would staff a deal of this type and sector right now.
    #[instrument(name = "graphql.team_suggestion", skip(self, ctx))]
    async fn team_suggestion(
        &self,
        ctx: &Context<'_>,
        deal_type: String,
        sector: String,
    ) -> GqlResult<TeamSuggestion> {
        let data = data(ctx)?;
        let team = products_deals::assign_team(&data.pool, &deal_type, &sector, Stage::Origination)
            .await
            .map_err(db_error)?;
        Ok(team.into())
    }
}

#[derive(Default)]
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Run one intake pass. Defaults to the configured folder.
    #[instrument(name = "graphql.process_email_folder", skip(self, ctx))]
    async fn process_email_folder(
        &self,
        ctx: &Context<'_>,
        folder: Option<String>,
    ) -> GqlResult<IntakeStatsPayload> {
        let data = data(ctx)?;
        let intake = data
            .intake
            .as_ref()
            .ok_or_else(|| api(ApiError::Unavailable("deal intake is not configured".into())))?;
        let folder = folder
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| data.default_folder.clone());
        let stats = intake
            .process_email_folder(&folder)
            .await
            .map_err(intake_error)?;
        Ok(stats.into())
    }

    #[instrument(name = "graphql.advance_deal_stage", skip(self, ctx))]
    async fn advance_deal_stage(
        &self,
        ctx: &Context<'_>,
        deal_id: ID,
        stage: DealStage,
    ) -> GqlResult<StageAdvancePayload> {
        let data = data(ctx)?;
        let deal_id = parse_id(&deal_id, "deal")?;
        let advance = products_deals::advance_deal_stage(&data.pool, deal_id, stage.into())
            .await
            .map_err(intake_error)?;
        Ok(StageAdvancePayload {
            tasks_created: advance.tasks.len() as i32,
            deal: advance.deal.into(),
            milestones: advance
                .milestones
                .into_iter()
                .map(MilestoneNode::from)
                .collect(),
        })
    }
}
