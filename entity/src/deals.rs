use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "deals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub deal_type: DealType,
    pub stage: Stage,
    pub value: f64,
    pub client: String,
    pub sector: String,
    pub lead: String,
    pub description: Option<String>,
    pub pod_team: Json,
    pub progress: i32,
    pub status: DealStatus,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Decodes the embedded pod team. Malformed entries yield an empty team.
    pub fn pod_team(&self) -> Vec<PodTeamMember> {
        serde_json::from_value(self.pod_team.clone()).unwrap_or_default()
    }

    pub fn involves(&self, user_id: Uuid, display_name: &str) -> bool {
        self.lead == display_name
            || self
                .pod_team()
                .iter()
                .any(|member| member.user_id == Some(user_id))
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::milestones::Entity")]
    Milestones,
    #[sea_orm(has_many = "super::tasks::Entity")]
    Tasks,
    #[sea_orm(has_many = "super::deal_ai_contexts::Entity")]
    AiContexts,
}

impl Related<super::milestones::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Milestones.def()
    }
}

impl Related<super::tasks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tasks.def()
    }
}

impl Related<super::deal_ai_contexts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AiContexts.def()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Hash)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
pub enum DealType {
    #[sea_orm(string_value = "M&A")]
    MergersAcquisitions,
    #[sea_orm(string_value = "Capital Raising")]
    CapitalRaising,
    #[sea_orm(string_value = "Asset Management")]
    AssetManagement,
    #[sea_orm(string_value = "Opportunity")]
    Opportunity,
}

impl DealType {
    pub fn as_str(self) -> &'static str {
        match self {
            DealType::MergersAcquisitions => "M&A",
            DealType::CapitalRaising => "Capital Raising",
            DealType::AssetManagement => "Asset Management",
            DealType::Opportunity => "Opportunity",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "M&A" => Some(DealType::MergersAcquisitions),
            "Capital Raising" => Some(DealType::CapitalRaising),
            "Asset Management" => Some(DealType::AssetManagement),
            "Opportunity" => Some(DealType::Opportunity),
            _ => None,
        }
    }
}

/// Deal lifecycle phases, in order.
#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Hash)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
pub enum Stage {
    #[sea_orm(string_value = "Origination")]
    Origination,
    #[sea_orm(string_value = "Structuring")]
    Structuring,
    #[sea_orm(string_value = "Diligence")]
    Diligence,
    #[sea_orm(string_value = "Legal")]
    Legal,
    #[sea_orm(string_value = "Close")]
    Close,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Origination,
        Stage::Structuring,
        Stage::Diligence,
        Stage::Legal,
        Stage::Close,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Origination => "Origination",
            Stage::Structuring => "Structuring",
            Stage::Diligence => "Diligence",
            Stage::Legal => "Legal",
            Stage::Close => "Close",
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
pub enum DealStatus {
    #[sea_orm(string_value = "Active")]
    Active,
    #[sea_orm(string_value = "On Hold")]
    OnHold,
    #[sea_orm(string_value = "Closed")]
    Closed,
    #[sea_orm(string_value = "Archived")]
    Archived,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodRole {
    Lead,
    Associate,
    Analyst,
}

/// Staffing snapshot embedded in `deals.pod_team`. `user_id` is empty for
/// contacts without an account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodTeamMember {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub name: String,
    pub role: PodRole,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

pub fn pod_team_json(team: &[PodTeamMember]) -> Json {
    serde_json::to_value(team).unwrap_or_else(|_| Json::Array(Vec::new()))
}

impl ActiveModelBehavior for ActiveModel {}
