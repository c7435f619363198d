use chrono::{DateTime, Duration, Utc};
use entity::deals::Stage;
use entity::milestones::{self, MilestoneStatus};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{ActiveValue::Set, ConnectionTrait, DbErr, EntityTrait};
use tracing::instrument;
use uuid::Uuid;

/// Days between consecutive milestone due dates.
pub const MILESTONE_SPACING_DAYS: i64 = 7;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MilestoneTemplate {
    pub title: &'static str,
    pub description: &'static str,
}

const fn template(title: &'static str, description: &'static str) -> MilestoneTemplate {
    MilestoneTemplate { title, description }
}

const ORIGINATION: [MilestoneTemplate; 4] = [
    template(
        "Initial Client Meeting",
        "Meet the client to understand objectives, timing and constraints.",
    ),
    template(
        "Preliminary Information Request",
        "Collect financials, ownership details and key business information.",
    ),
    template(
        "Market Assessment",
        "Size the market and map comparable transactions and likely counterparties.",
    ),
    template(
        "Engagement Letter",
        "Agree scope, fees and terms of the mandate with the client.",
    ),
];

const STRUCTURING: [MilestoneTemplate; 4] = [
    template(
        "Financial Model Development",
        "Build the operating model and projections supporting the transaction.",
    ),
    template(
        "Valuation Analysis",
        "Triangulate value using trading comparables, precedents and DCF.",
    ),
    template(
        "Deal Structure Proposal",
        "Propose the transaction structure, consideration mix and key terms.",
    ),
    template(
        "Marketing Materials Preparation",
        "Prepare the teaser, information memorandum and management presentation.",
    ),
];

const DILIGENCE: [MilestoneTemplate; 4] = [
    template(
        "Due Diligence Kickoff",
        "Agree the diligence plan, workstreams and advisers with all parties.",
    ),
    template(
        "Data Room Document Review",
        "Review data room documents and log open questions.",
    ),
    template(
        "Management Meeting",
        "Run management sessions with counterparties and capture follow-ups.",
    ),
    template(
        "Diligence Findings Report",
        "Summarize diligence findings and their impact on value and terms.",
    ),
];

const LEGAL: [MilestoneTemplate; 4] = [
    template(
        "Term Sheet Negotiation",
        "Negotiate the term sheet and resolve headline commercial points.",
    ),
    template(
        "Definitive Agreement Documents",
        "Draft and negotiate the definitive transaction documents.",
    ),
    template(
        "Regulatory Review",
        "Identify and file required regulatory and antitrust approvals.",
    ),
    template(
        "Signing Preparation",
        "Finalize signing versions, disclosure schedules and authorizations.",
    ),
];

const CLOSE: [MilestoneTemplate; 4] = [
    template(
        "Closing Checklist",
        "Track conditions precedent and closing deliverables to completion.",
    ),
    template(
        "Funds Flow Valuation Check",
        "Reconcile the funds flow memorandum against the agreed valuation.",
    ),
    template(
        "Closing Meeting",
        "Coordinate signatures, releases and the closing call.",
    ),
    template(
        "Post-Closing Integration",
        "Hand over to the client and track post-closing obligations.",
    ),
];

/// The ordered milestone batch for a stage.
pub fn stage_milestones(stage: Stage) -> &'static [MilestoneTemplate] {
    match stage {
        Stage::Origination => &ORIGINATION,
        Stage::Structuring => &STRUCTURING,
        Stage::Diligence => &DILIGENCE,
        Stage::Legal => &LEGAL,
        Stage::Close => &CLOSE,
    }
}

/// Due date of the milestone at `position` in its batch.
pub fn milestone_due(now: DateTime<Utc>, position: usize) -> DateTime<Utc> {
    now + Duration::days(MILESTONE_SPACING_DAYS * (position as i64 + 1))
}

pub async fn create_milestones_for_deal<C>(
    db: &C,
    deal_id: Uuid,
    stage: Stage,
) -> Result<Vec<milestones::Model>, DbErr>
where
    C: ConnectionTrait,
{
    create_milestones_at(db, deal_id, stage, Utc::now()).await
}

/// Insert the stage's milestone batch with due dates counted from `now`.
#[instrument(name = "deals.create_milestones", skip(db, now), fields(stage = stage.as_str()))]
pub async fn create_milestones_at<C>(
    db: &C,
    deal_id: Uuid,
    stage: Stage,
    now: DateTime<Utc>,
) -> Result<Vec<milestones::Model>, DbErr>
where
    C: ConnectionTrait,
{
    let created_at: DateTimeWithTimeZone = now.into();
    let batch: Vec<milestones::Model> = stage_milestones(stage)
        .iter()
        .enumerate()
        .map(|(position, template)| milestones::Model {
            id: Uuid::new_v4(),
            deal_id,
            title: template.title.to_string(),
            description: Some(template.description.to_string()),
            stage,
            sort_order: position as i32,
            status: MilestoneStatus::Pending,
            due_date: Some(milestone_due(now, position).into()),
            created_at,
        })
        .collect();

    milestones::Entity::insert_many(batch.iter().map(new_row))
        .exec_without_returning(db)
        .await?;
    Ok(batch)
}

fn new_row(model: &milestones::Model) -> milestones::ActiveModel {
    milestones::ActiveModel {
        id: Set(model.id),
        deal_id: Set(model.deal_id),
        title: Set(model.title.clone()),
        description: Set(model.description.clone()),
        stage: Set(model.stage),
        sort_order: Set(model.sort_order),
        status: Set(model.status),
        due_date: Set(model.due_date),
        created_at: Set(model.created_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_stage_has_four_distinct_milestones() {
        for stage in Stage::ALL {
            let batch = stage_milestones(stage);
            assert_eq!(batch.len(), 4, "{}", stage.as_str());
            let mut titles: Vec<_> = batch.iter().map(|m| m.title).collect();
            titles.dedup();
            assert_eq!(titles.len(), 4);
        }
        assert_eq!(stage_milestones(Stage::Origination)[0].title, "Initial Client Meeting");
        assert_eq!(stage_milestones(Stage::Origination)[3].title, "Engagement Letter");
    }

    #[test]
    fn due_dates_step_by_a_week() {
        let now = Utc::now();
        assert_eq!(milestone_due(now, 0) - now, Duration::days(7));
        assert_eq!(milestone_due(now, 3) - now, Duration::days(28));
    }
}
