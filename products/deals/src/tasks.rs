//! Expand a milestone into template tasks distributed across the pod team.

use chrono::{DateTime, Duration, Utc};
use entity::deals::PodTeamMember;
use entity::milestones;
use entity::tasks::{self, Priority, Status};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{ActiveValue::Set, ConnectionTrait, EntityTrait};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::error::{IntakeError, IntakeResult};
use crate::workload::get_user_workload;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskTemplate {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub task_type: &'static str,
}

fn task(title: &str, description: &str, priority: Priority, task_type: &'static str) -> TaskTemplate {
    TaskTemplate {
        title: title.to_string(),
        description: description.to_string(),
        priority,
        task_type,
    }
}

/// Templates for a milestone, chosen by keywords in its title. The first
/// matching group wins.
pub fn templates_for(milestone_title: &str) -> Vec<TaskTemplate> {
    let has = |needle: &str| milestone_title.contains(needle);

    if has("Meeting") {
        vec![
            task(
                "Prepare meeting agenda",
                "Draft the agenda and circulate it to attendees.",
                Priority::High,
                "meeting_prep",
            ),
            task(
                "Compile background research",
                "Pull company profile, recent news and relevant comparables.",
                Priority::Medium,
                "research",
            ),
            task(
                "Schedule meeting",
                "Confirm attendees, time and logistics.",
                Priority::Medium,
                "scheduling",
            ),
            task(
                "Circulate meeting notes",
                "Write up notes and action items after the meeting.",
                Priority::Low,
                "follow_up",
            ),
        ]
    } else if has("Financial Model") || has("Valuation") {
        vec![
            task(
                "Gather historical financials",
                "Collect at least three years of audited statements and current trading.",
                Priority::High,
                "data_collection",
            ),
            task(
                "Build financial model",
                "Build the projection model with base, upside and downside cases.",
                Priority::High,
                "analysis",
            ),
            task(
                "Run valuation scenarios",
                "Run comparables, precedents and DCF sensitivities.",
                Priority::Medium,
                "analysis",
            ),
            task(
                "Review model with deal lead",
                "Walk the lead through assumptions and outputs.",
                Priority::Medium,
                "review",
            ),
        ]
    } else if has("Document") || has("Materials") {
        vec![
            task(
                "Draft documents",
                "Prepare first drafts of the required documents.",
                Priority::High,
                "drafting",
            ),
            task(
                "Internal review of drafts",
                "Collect and resolve comments from the deal team.",
                Priority::Medium,
                "review",
            ),
            task(
                "Finalize and distribute",
                "Produce final versions and send them to the relevant parties.",
                Priority::Medium,
                "delivery",
            ),
        ]
    } else if has("Due Diligence") || has("Diligence") {
        vec![
            task(
                "Prepare diligence request list",
                "List the information and documents needed from the counterparty.",
                Priority::High,
                "diligence",
            ),
            task(
                "Review data room",
                "Review uploaded materials and flag gaps.",
                Priority::High,
                "diligence",
            ),
            task(
                "Track open diligence items",
                "Keep the issues list current and chase outstanding answers.",
                Priority::Medium,
                "tracking",
            ),
            task(
                "Summarize diligence findings",
                "Write up key findings and red flags for the lead.",
                Priority::Medium,
                "reporting",
            ),
        ]
    } else {
        vec![
            task(
                &format!("Complete {milestone_title}"),
                &format!("Complete the work required for {milestone_title}."),
                Priority::Medium,
                "general",
            ),
            task(
                &format!("Review {milestone_title}"),
                &format!("Review the output of {milestone_title} before sign-off."),
                Priority::Low,
                "review",
            ),
        ]
    }
}

/// Days before the milestone due date that task `index` of `count` is due.
pub fn task_lead_days(count: usize, index: usize) -> i64 {
    (count.saturating_sub(index) / 2) as i64
}

/// Registered pod team members ordered by ascending live workload. Members
/// without a user id cannot hold tasks and are dropped.
pub async fn members_by_workload<C>(db: &C, pod_team: &[PodTeamMember]) -> IntakeResult<Vec<Uuid>>
where
    C: ConnectionTrait,
{
    let mut loads = Vec::with_capacity(pod_team.len());
    for user_id in pod_team.iter().filter_map(|member| member.user_id) {
        if loads.iter().any(|(id, _)| *id == user_id) {
            continue;
        }
        loads.push((user_id, get_user_workload(db, user_id).await?));
    }
    loads.sort_by_key(|(_, load)| *load);
    Ok(loads.into_iter().map(|(id, _)| id).collect())
}

pub async fn create_tasks_from_milestone<C>(
    db: &C,
    milestone_id: Uuid,
    deal_id: Uuid,
    pod_team: &[PodTeamMember],
) -> IntakeResult<Vec<tasks::Model>>
where
    C: ConnectionTrait,
{
    let milestone = milestones::Entity::find_by_id(milestone_id)
        .one(db)
        .await?
        .ok_or(IntakeError::MilestoneNotFound(milestone_id))?;
    create_tasks_for(db, &milestone, deal_id, pod_team, Utc::now()).await
}

/// Insert the milestone's template tasks. Task `i` goes to the `i mod n`th
/// least-loaded member; the order is fixed before the first assignment.
#[instrument(
    name = "deals.create_tasks",
    skip_all,
    fields(milestone = %milestone.id, title = %milestone.title)
)]
pub async fn create_tasks_for<C>(
    db: &C,
    milestone: &milestones::Model,
    deal_id: Uuid,
    pod_team: &[PodTeamMember],
    now: DateTime<Utc>,
) -> IntakeResult<Vec<tasks::Model>>
where
    C: ConnectionTrait,
{
    let assignees = members_by_workload(db, pod_team).await?;
    if assignees.is_empty() {
        warn!("pod team has no registered users; tasks left unassigned");
    }

    let templates = templates_for(&milestone.title);
    let base: DateTime<Utc> = milestone
        .due_date
        .map(|due| due.with_timezone(&Utc))
        .unwrap_or(now);
    let stamp: DateTimeWithTimeZone = now.into();
    let count = templates.len();

    let created: Vec<tasks::Model> = templates
        .into_iter()
        .enumerate()
        .map(|(index, template)| tasks::Model {
            id: Uuid::new_v4(),
            title: template.title,
            description: Some(template.description),
            deal_id: Some(deal_id),
            deal_stage: Some(milestone.stage),
            milestone_id: Some(milestone.id),
            assigned_to: (!assignees.is_empty()).then(|| assignees[index % assignees.len()]),
            priority: template.priority,
            due_date: Some((base - Duration::days(task_lead_days(count, index))).into()),
            status: Status::Pending,
            task_type: template.task_type.to_string(),
            created_at: stamp,
            updated_at: stamp,
        })
        .collect();

    tasks::Entity::insert_many(created.iter().map(new_row))
        .exec_without_returning(db)
        .await?;
    Ok(created)
}

fn new_row(model: &tasks::Model) -> tasks::ActiveModel {
    tasks::ActiveModel {
        id: Set(model.id),
        title: Set(model.title.clone()),
        description: Set(model.description.clone()),
        deal_id: Set(model.deal_id),
        deal_stage: Set(model.deal_stage),
        milestone_id: Set(model.milestone_id),
        assigned_to: Set(model.assigned_to),
        priority: Set(model.priority),
        due_date: Set(model.due_date),
        status: Set(model.status),
        task_type: Set(model.task_type.clone()),
        created_at: Set(model.created_at),
        updated_at: Set(model.updated_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_groups_match_in_order() {
        assert_eq!(templates_for("Initial Client Meeting").len(), 4);
        assert_eq!(templates_for("Initial Client Meeting")[0].task_type, "meeting_prep");
        assert_eq!(templates_for("Valuation Analysis")[1].title, "Build financial model");
        assert_eq!(templates_for("Data Room Document Review").len(), 3);
        assert_eq!(templates_for("Due Diligence Kickoff")[0].task_type, "diligence");
        // "Meeting" is checked before "Diligence".
        assert_eq!(templates_for("Management Meeting")[0].task_type, "meeting_prep");
    }

    #[test]
    fn unmatched_titles_get_the_generic_pair() {
        let generic = templates_for("Engagement Letter");
        assert_eq!(generic.len(), 2);
        assert_eq!(generic[0].title, "Complete Engagement Letter");
        assert_eq!(generic[1].title, "Review Engagement Letter");
    }

    #[test]
    fn later_tasks_fall_closer_to_the_milestone() {
        let leads: Vec<i64> = (0..4).map(|i| task_lead_days(4, i)).collect();
        assert_eq!(leads, vec![2, 1, 1, 0]);
        assert_eq!(task_lead_days(3, 0), 1);
        assert_eq!(task_lead_days(3, 2), 0);
    }
}
