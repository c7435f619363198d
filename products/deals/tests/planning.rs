mod common;

use chrono::{Duration, TimeZone, Utc};
use common::*;
use entity::deals::{self, DealStatus, PodRole, PodTeamMember, Stage};
use entity::{milestones, tasks};
use products_deals::milestones::create_milestones_at;
use products_deals::tasks::create_tasks_for;
use products_deals::{
    IntakeError, advance_deal_stage, create_milestones_for_deal, create_tasks_from_milestone,
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

#[tokio::test]
async fn origination_batch_has_four_weekly_milestones() {
    let db = setup_db().await;
    let deal_id = seed_deal(&db, "Atlas", "Uma", &[], DealStatus::Active).await;
    let now = Utc.with_ymd_and_hms(2025, 10, 6, 12, 0, 0).unwrap();

    let created = create_milestones_at(&db, deal_id, Stage::Origination, now)
        .await
        .unwrap();
    assert_eq!(created.len(), 4);

    let stored = milestones::Entity::find()
        .filter(milestones::Column::DealId.eq(deal_id))
        .order_by_asc(milestones::Column::SortOrder)
        .all(&db)
        .await
        .unwrap();
    assert_eq!(stored.len(), 4);
    for (i, milestone) in stored.iter().enumerate() {
        assert_eq!(milestone.sort_order, i as i32);
        assert_eq!(milestone.stage, Stage::Origination);
        assert_eq!(milestone.status, milestones::MilestoneStatus::Pending);
        let due = milestone.due_date.unwrap().with_timezone(&Utc);
        assert_eq!(due - now, Duration::days(7 * (i as i64 + 1)));
    }
    assert_eq!(stored[0].title, "Initial Client Meeting");
}

#[tokio::test]
async fn default_clock_batch_is_counted_from_now() {
    let db = setup_db().await;
    let deal_id = seed_deal(&db, "Atlas", "Uma", &[], DealStatus::Active).await;
    let before = Utc::now();
    let created = create_milestones_for_deal(&db, deal_id, Stage::Legal)
        .await
        .unwrap();
    let first_due = created[0].due_date.unwrap().with_timezone(&Utc);
    assert!(first_due - before >= Duration::days(7));
    assert!(first_due - before < Duration::days(7) + Duration::minutes(1));
    assert_eq!(created[0].title, "Term Sheet Negotiation");
}

#[tokio::test]
async fn two_person_team_splits_four_tasks_evenly() {
    let db = setup_db().await;
    let busy = seed_user(&db, "Busy Bee").await;
    let free = seed_user(&db, "Free Fox").await;
    seed_tasks(&db, busy.id, 3, tasks::Status::Pending).await;
    let team = vec![member(&busy, PodRole::Lead), member(&free, PodRole::Associate)];
    let deal_id = seed_deal(&db, "Atlas", &busy.name, &team, DealStatus::Active).await;
    let now = Utc::now();
    let batch = create_milestones_at(&db, deal_id, Stage::Origination, now)
        .await
        .unwrap();

    let meeting = &batch[0];
    let created = create_tasks_for(&db, meeting, deal_id, &team, now).await.unwrap();
    assert_eq!(created.len(), 4);

    // Least loaded first, then alternate.
    let assignees: Vec<_> = created.iter().map(|t| t.assigned_to.unwrap()).collect();
    assert_eq!(assignees, vec![free.id, busy.id, free.id, busy.id]);

    let base = meeting.due_date.unwrap().with_timezone(&Utc);
    let offsets: Vec<i64> = created
        .iter()
        .map(|t| (base - t.due_date.unwrap().with_timezone(&Utc)).num_days())
        .collect();
    assert_eq!(offsets, vec![2, 1, 1, 0]);
    assert!(created.iter().all(|t| t.status == tasks::Status::Pending));
    assert!(created.iter().all(|t| t.milestone_id == Some(meeting.id)));
    assert!(created.iter().all(|t| t.deal_stage == Some(Stage::Origination)));
}

#[tokio::test]
async fn tied_workloads_still_split_evenly() {
    let db = setup_db().await;
    let a = seed_user(&db, "Ann").await;
    let b = seed_user(&db, "Bob").await;
    let team = vec![member(&a, PodRole::Lead), member(&b, PodRole::Analyst)];
    let deal_id = seed_deal(&db, "Atlas", &a.name, &team, DealStatus::Active).await;
    let batch = create_milestones_for_deal(&db, deal_id, Stage::Structuring)
        .await
        .unwrap();

    let created = create_tasks_from_milestone(&db, batch[0].id, deal_id, &team)
        .await
        .unwrap();
    let to_a = created.iter().filter(|t| t.assigned_to == Some(a.id)).count();
    let to_b = created.iter().filter(|t| t.assigned_to == Some(b.id)).count();
    assert_eq!((to_a, to_b), (2, 2));
    assert_eq!(
        tasks::Entity::find()
            .filter(tasks::Column::MilestoneId.eq(batch[0].id))
            .count(&db)
            .await
            .unwrap(),
        4
    );
}

#[tokio::test]
async fn contacts_without_accounts_leave_tasks_unassigned() {
    let db = setup_db().await;
    let team = vec![PodTeamMember {
        user_id: None,
        name: "External Counsel".into(),
        role: PodRole::Lead,
        email: None,
        phone: None,
    }];
    let deal_id = seed_deal(&db, "Atlas", "External Counsel", &team, DealStatus::Active).await;
    let batch = create_milestones_for_deal(&db, deal_id, Stage::Origination)
        .await
        .unwrap();
    let created = create_tasks_from_milestone(&db, batch[3].id, deal_id, &team)
        .await
        .unwrap();
    assert_eq!(created.len(), 2);
    assert!(created.iter().all(|t| t.assigned_to.is_none()));
}

#[tokio::test]
async fn unknown_milestone_is_reported() {
    let db = setup_db().await;
    let missing = Uuid::new_v4();
    let err = create_tasks_from_milestone(&db, missing, Uuid::new_v4(), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, IntakeError::MilestoneNotFound(id) if id == missing));
}

#[tokio::test]
async fn advancing_a_stage_plans_the_next_batch() {
    let db = setup_db().await;
    let lead = seed_user(&db, "Lead Lee").await;
    let team = vec![member(&lead, PodRole::Lead)];
    let deal_id = seed_deal(&db, "Atlas", &lead.name, &team, DealStatus::Active).await;

    let advance = advance_deal_stage(&db, deal_id, Stage::Diligence).await.unwrap();
    assert_eq!(advance.deal.stage, Stage::Diligence);
    assert_eq!(advance.deal.progress, 55);
    assert_eq!(advance.milestones.len(), 4);
    assert!(advance.milestones.iter().all(|m| m.stage == Stage::Diligence));
    assert!(!advance.tasks.is_empty());
    assert!(advance.tasks.iter().all(|t| t.assigned_to == Some(lead.id)));

    let stored = deals::Entity::find_by_id(deal_id).one(&db).await.unwrap().unwrap();
    assert_eq!(stored.stage, Stage::Diligence);
    assert_eq!(
        tasks::Entity::find()
            .filter(tasks::Column::DealId.eq(deal_id))
            .count(&db)
            .await
            .unwrap(),
        advance.tasks.len() as u64
    );
}

#[tokio::test]
async fn re_entering_the_current_stage_writes_nothing() {
    let db = setup_db().await;
    let deal_id = seed_deal(&db, "Atlas", "Uma", &[], DealStatus::Active).await;
    let advance = advance_deal_stage(&db, deal_id, Stage::Origination).await.unwrap();
    assert!(advance.milestones.is_empty());
    assert!(advance.tasks.is_empty());
    assert_eq!(milestones::Entity::find().count(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn advancing_an_unknown_deal_fails() {
    let db = setup_db().await;
    let err = advance_deal_stage(&db, Uuid::new_v4(), Stage::Close)
        .await
        .unwrap_err();
    assert!(matches!(err, IntakeError::DealNotFound(_)));
}
