mod common;

use common::*;
use entity::deals::{DealStatus, PodRole, Stage};
use entity::personality_profiles::ExperienceLevel;
use entity::tasks;
use entity::users::AccountStatus;
use products_deals::{assign_team, get_active_deals_count, get_user_workload};
use uuid::Uuid;

#[tokio::test]
async fn workload_counts_only_open_tasks() {
    let db = setup_db().await;
    let user = seed_user(&db, "Ada").await;
    seed_tasks(&db, user.id, 2, tasks::Status::Pending).await;
    seed_tasks(&db, user.id, 1, tasks::Status::InProgress).await;
    seed_tasks(&db, user.id, 4, tasks::Status::Completed).await;

    assert_eq!(get_user_workload(&db, user.id).await.unwrap(), 3);
    assert_eq!(get_user_workload(&db, Uuid::new_v4()).await.unwrap(), 0);
}

#[tokio::test]
async fn active_deals_match_lead_name_or_team_membership() {
    let db = setup_db().await;
    let ada = seed_user(&db, "Ada").await;
    let bob = seed_user(&db, "Bob").await;

    seed_deal(&db, "Led by Ada", &ada.name, &[], DealStatus::Active).await;
    seed_deal(
        &db,
        "Staffed with Ada",
        &bob.name,
        &[member(&bob, PodRole::Lead), member(&ada, PodRole::Associate)],
        DealStatus::Active,
    )
    .await;
    seed_deal(&db, "Closed", &ada.name, &[member(&ada, PodRole::Lead)], DealStatus::Closed).await;

    assert_eq!(get_active_deals_count(&db, ada.id).await.unwrap(), 2);
    assert_eq!(get_active_deals_count(&db, bob.id).await.unwrap(), 1);
    assert_eq!(get_active_deals_count(&db, Uuid::new_v4()).await.unwrap(), 0);
}

#[tokio::test]
async fn senior_specialist_leads_a_matching_deal() {
    let db = setup_db().await;
    let u1 = seed_user(&db, "U1").await;
    let u2 = seed_user(&db, "U2").await;
    let u3 = seed_user(&db, "U3").await;
    seed_profile(&db, u1.id, &["M&A"], &["Technology"], Some(ExperienceLevel::Senior)).await;
    seed_profile(&db, u2.id, &[], &[], Some(ExperienceLevel::Junior)).await;
    seed_tasks(&db, u2.id, 5, tasks::Status::Pending).await;
    seed_deal(&db, "D1", &u2.name, &[], DealStatus::Active).await;
    seed_deal(&db, "D2", &u2.name, &[], DealStatus::Active).await;

    let team = assign_team(&db, "M&A", "Technology", Stage::Origination)
        .await
        .unwrap();
    assert_eq!(team.lead.user_id, Some(u1.id));
    assert_eq!(team.lead.role, PodRole::Lead);
    let members: Vec<_> = team.members.iter().map(|m| (m.user_id, m.role)).collect();
    assert_eq!(
        members,
        vec![(Some(u3.id), PodRole::Associate), (Some(u2.id), PodRole::Analyst)]
    );
}

#[tokio::test]
async fn inactive_users_are_never_staffed() {
    let db = setup_db().await;
    let gone = seed_user_with_status(&db, "Gone", AccountStatus::Inactive).await;
    seed_profile(&db, gone.id, &["M&A"], &["Technology"], Some(ExperienceLevel::Expert)).await;
    let here = seed_user(&db, "Here").await;

    let team = assign_team(&db, "M&A", "Technology", Stage::Origination)
        .await
        .unwrap();
    assert_eq!(team.lead.user_id, Some(here.id));
    assert!(team.members.is_empty());
}
