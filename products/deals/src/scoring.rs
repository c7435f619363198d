//! Team scoring: rank active users for a deal and pick its pod team.
//!
//! The ranking itself is a pure function over a [`Candidate`] snapshot so it
//! can be exercised without a store; [`assign_team`] loads that snapshot.

use std::collections::HashMap;

use entity::deals::{self, PodRole, PodTeamMember, Stage};
use entity::{personality_profiles, users};
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::workload::get_user_workload;

pub const BASE_SCORE: i64 = 100;
pub const WORKLOAD_PENALTY: i64 = 10;
pub const ACTIVE_DEAL_PENALTY: i64 = 15;
pub const DEAL_TYPE_BONUS: i64 = 20;
pub const SECTOR_BONUS: i64 = 15;
pub const CAPACITY_PENALTY: i64 = 50;
pub const SENIORITY_BONUS: i64 = 10;

pub const UNASSIGNED_LEAD: &str = "Unassigned";
const MEMBER_SLOTS: usize = 2;

#[derive(Clone, Debug)]
pub struct Candidate {
    pub user: users::Model,
    pub profile: Option<personality_profiles::Model>,
    pub workload: u64,
    pub active_deals: u64,
}

#[derive(Clone, Debug)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TeamAssignment {
    pub lead: PodTeamMember,
    pub members: Vec<PodTeamMember>,
}

impl TeamAssignment {
    /// Lead first, then members, as stored on the deal.
    pub fn pod_team(&self) -> Vec<PodTeamMember> {
        let mut team = Vec::with_capacity(self.members.len() + 1);
        team.push(self.lead.clone());
        team.extend(self.members.iter().cloned());
        team
    }
}

pub fn score_candidate(candidate: &Candidate, deal_type: &str, sector: &str) -> i64 {
    let workload = i64::try_from(candidate.workload).unwrap_or(i64::MAX / 100);
    let active = i64::try_from(candidate.active_deals).unwrap_or(i64::MAX / 100);
    let mut score = BASE_SCORE - WORKLOAD_PENALTY * workload - ACTIVE_DEAL_PENALTY * active;

    if let Some(profile) = &candidate.profile {
        if profile.prefers_deal_type(deal_type) {
            score += DEAL_TYPE_BONUS;
        }
        if profile.prefers_sector(sector) {
            score += SECTOR_BONUS;
        }
        if active >= i64::from(profile.capacity()) {
            score -= CAPACITY_PENALTY;
        }
        if profile.is_senior() {
            score += SENIORITY_BONUS;
        }
    }
    score
}

/// Highest score first. The sort is stable, so equal scores keep the order
/// candidates were loaded in.
pub fn rank_candidates(
    candidates: Vec<Candidate>,
    deal_type: &str,
    sector: &str,
) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .map(|candidate| {
            let score = score_candidate(&candidate, deal_type, sector);
            ScoredCandidate { candidate, score }
        })
        .collect();
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored
}

pub fn select_team(ranked: &[ScoredCandidate]) -> TeamAssignment {
    let Some(top) = ranked.first() else {
        return TeamAssignment {
            lead: PodTeamMember {
                user_id: None,
                name: UNASSIGNED_LEAD.to_string(),
                role: PodRole::Lead,
                email: None,
                phone: None,
            },
            members: Vec::new(),
        };
    };

    let lead = ranked
        .iter()
        .find(|scored| {
            scored
                .candidate
                .profile
                .as_ref()
                .is_some_and(|p| p.is_senior() || p.has_leadership_style())
        })
        .unwrap_or(top);

    let members = ranked
        .iter()
        .filter(|scored| scored.candidate.user.id != lead.candidate.user.id)
        .take(MEMBER_SLOTS)
        .map(|scored| {
            let junior = scored
                .candidate
                .profile
                .as_ref()
                .is_some_and(|p| p.is_junior());
            let role = if junior {
                PodRole::Analyst
            } else {
                PodRole::Associate
            };
            member_snapshot(&scored.candidate.user, role)
        })
        .collect();

    TeamAssignment {
        lead: member_snapshot(&lead.candidate.user, PodRole::Lead),
        members,
    }
}

fn member_snapshot(user: &users::Model, role: PodRole) -> PodTeamMember {
    PodTeamMember {
        user_id: Some(user.id),
        name: user.name.clone(),
        role,
        email: Some(user.email.clone()),
        phone: user.phone.clone(),
    }
}

/// Load every active user with live load figures, in creation order.
pub async fn load_candidates<C>(db: &C) -> Result<Vec<Candidate>, DbErr>
where
    C: ConnectionTrait,
{
    let active_users = users::Entity::find()
        .filter(users::Column::Status.eq(users::AccountStatus::Active))
        .order_by_asc(users::Column::CreatedAt)
        .order_by_asc(users::Column::Id)
        .all(db)
        .await?;
    let mut profiles: HashMap<Uuid, personality_profiles::Model> =
        personality_profiles::Entity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|profile| (profile.user_id, profile))
            .collect();
    let active_deals = deals::Entity::find()
        .filter(deals::Column::Status.eq(deals::DealStatus::Active))
        .all(db)
        .await?;

    let mut candidates = Vec::with_capacity(active_users.len());
    for user in active_users {
        let workload = get_user_workload(db, user.id).await?;
        let active = active_deals
            .iter()
            .filter(|deal| deal.involves(user.id, &user.name))
            .count() as u64;
        candidates.push(Candidate {
            profile: profiles.remove(&user.id),
            user,
            workload,
            active_deals: active,
        });
    }
    Ok(candidates)
}

/// Score the current roster for a deal and return its pod team.
#[instrument(name = "deals.assign_team", skip(db), fields(stage = stage.as_str()))]
pub async fn assign_team<C>(
    db: &C,
    deal_type: &str,
    sector: &str,
    stage: Stage,
) -> Result<TeamAssignment, DbErr>
where
    C: ConnectionTrait,
{
    let candidates = load_candidates(db).await?;
    let ranked = rank_candidates(candidates, deal_type, sector);
    for scored in &ranked {
        debug!(user = %scored.candidate.user.name, score = scored.score, "scored candidate");
    }
    Ok(select_team(&ranked))
}
