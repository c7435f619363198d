use chrono::Utc;
use entity::deals::{self, Stage};
use entity::{milestones, tasks};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, DatabaseConnection, EntityTrait, TransactionTrait,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{IntakeError, IntakeResult};
use crate::milestones::create_milestones_at;
use crate::tasks::create_tasks_for;

/// Completion percentage recorded when a deal enters `stage`.
pub fn stage_progress(stage: Stage) -> i32 {
    match stage {
        Stage::Origination => 10,
        Stage::Structuring => 30,
        Stage::Diligence => 55,
        Stage::Legal => 75,
        Stage::Close => 90,
    }
}

#[derive(Clone, Debug)]
pub struct StageAdvance {
    pub deal: deals::Model,
    pub milestones: Vec<milestones::Model>,
    pub tasks: Vec<tasks::Model>,
}

/// Move a deal to `stage` and plan the stage's milestones and tasks in one
/// transaction. Re-entering the current stage writes nothing.
#[instrument(name = "deals.advance_stage", skip(db), fields(stage = stage.as_str()))]
pub async fn advance_deal_stage(
    db: &DatabaseConnection,
    deal_id: Uuid,
    stage: Stage,
) -> IntakeResult<StageAdvance> {
    let txn = db.begin().await?;
    let existing = deals::Entity::find_by_id(deal_id)
        .one(&txn)
        .await?
        .ok_or(IntakeError::DealNotFound(deal_id))?;

    if existing.stage == stage {
        txn.commit().await?;
        return Ok(StageAdvance {
            deal: existing,
            milestones: Vec::new(),
            tasks: Vec::new(),
        });
    }

    let now = Utc::now();
    let from = existing.stage;
    let pod_team = existing.pod_team();
    let mut active: deals::ActiveModel = existing.into();
    active.stage = Set(stage);
    active.progress = Set(stage_progress(stage));
    active.updated_at = Set(now.into());
    let deal = active.update(&txn).await?;

    let batch = create_milestones_at(&txn, deal_id, stage, now).await?;
    let mut planned = Vec::new();
    for milestone in &batch {
        planned.extend(create_tasks_for(&txn, milestone, deal_id, &pod_team, now).await?);
    }
    txn.commit().await?;

    info!(
        from = from.as_str(),
        milestones = batch.len(),
        tasks = planned.len(),
        "deal stage advanced"
    );
    Ok(StageAdvance {
        deal,
        milestones: batch,
        tasks: planned,
    })
}
