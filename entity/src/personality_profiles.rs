use sea_orm::entity::prelude::*;

/// Used when a profile leaves `workload_capacity` empty.
pub const DEFAULT_WORKLOAD_CAPACITY: i32 = 5;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "personality_profiles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub user_id: Uuid,
    pub preferred_deal_types: Json,
    pub preferred_sectors: Json,
    pub workload_capacity: Option<i32>,
    pub experience_level: Option<ExperienceLevel>,
    pub leadership_style: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn prefers_deal_type(&self, deal_type: &str) -> bool {
        json_contains(&self.preferred_deal_types, deal_type)
    }

    pub fn prefers_sector(&self, sector: &str) -> bool {
        json_contains(&self.preferred_sectors, sector)
    }

    pub fn capacity(&self) -> i32 {
        self.workload_capacity.unwrap_or(DEFAULT_WORKLOAD_CAPACITY)
    }

    pub fn is_senior(&self) -> bool {
        matches!(
            self.experience_level,
            Some(ExperienceLevel::Senior) | Some(ExperienceLevel::Expert)
        )
    }

    pub fn is_junior(&self) -> bool {
        self.experience_level == Some(ExperienceLevel::Junior)
    }

    pub fn has_leadership_style(&self) -> bool {
        self.leadership_style
            .as_deref()
            .is_some_and(|style| !style.trim().is_empty())
    }
}

fn json_contains(list: &Json, needle: &str) -> bool {
    list.as_array()
        .is_some_and(|items| items.iter().any(|item| item.as_str() == Some(needle)))
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
pub enum ExperienceLevel {
    #[sea_orm(string_value = "junior")]
    Junior,
    #[sea_orm(string_value = "mid")]
    Mid,
    #[sea_orm(string_value = "senior")]
    Senior,
    #[sea_orm(string_value = "expert")]
    Expert,
}

impl ActiveModelBehavior for ActiveModel {}
