use sea_orm_migration::prelude::*;

#[derive(DeriveIden, Copy, Clone)]
enum Users {
    Table,
    Id,
    Email,
    Name,
    Phone,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden, Copy, Clone)]
enum PersonalityProfiles {
    Table,
    Id,
    UserId,
    PreferredDealTypes,
    PreferredSectors,
    WorkloadCapacity,
    ExperienceLevel,
    LeadershipStyle,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden, Copy, Clone)]
enum Deals {
    Table,
    Id,
    Name,
    DealType,
    Stage,
    Value,
    Client,
    Sector,
    Lead,
    Description,
    PodTeam,
    Progress,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden, Copy, Clone)]
enum Milestones {
    Table,
    Id,
    DealId,
    Title,
    Description,
    Stage,
    SortOrder,
    Status,
    DueDate,
    CreatedAt,
}

#[derive(DeriveIden, Copy, Clone)]
enum Tasks {
    Table,
    Id,
    Title,
    Description,
    DealId,
    DealStage,
    MilestoneId,
    AssignedTo,
    Priority,
    DueDate,
    Status,
    Type,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden, Copy, Clone)]
enum Notifications {
    Table,
    Id,
    UserId,
    Title,
    Message,
    Type,
    Link,
    IsRead,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(&mut uuid_pk(Users::Id))
                    .col(ColumnDef::new(Users::Email).string_len(320).not_null().unique_key())
                    .col(ColumnDef::new(Users::Name).string_len(256).not_null())
                    .col(ColumnDef::new(Users::Phone).string_len(64))
                    .col(
                        ColumnDef::new(Users::Status)
                            .string_len(16)
                            .not_null()
                            .default("active"),
                    )
                    .col(&mut timestamp_with_default(Users::CreatedAt))
                    .col(&mut timestamp_with_default(Users::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PersonalityProfiles::Table)
                    .if_not_exists()
                    .col(&mut uuid_pk(PersonalityProfiles::Id))
                    .col(
                        ColumnDef::new(PersonalityProfiles::UserId)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(PersonalityProfiles::PreferredDealTypes)
                            .json()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PersonalityProfiles::PreferredSectors)
                            .json()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PersonalityProfiles::WorkloadCapacity).integer())
                    .col(ColumnDef::new(PersonalityProfiles::ExperienceLevel).string_len(16))
                    .col(ColumnDef::new(PersonalityProfiles::LeadershipStyle).string_len(128))
                    .col(&mut timestamp_with_default(PersonalityProfiles::CreatedAt))
                    .col(&mut timestamp_with_default(PersonalityProfiles::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_profile_user")
                            .from(PersonalityProfiles::Table, PersonalityProfiles::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Deals::Table)
                    .if_not_exists()
                    .col(&mut uuid_pk(Deals::Id))
                    .col(ColumnDef::new(Deals::Name).string_len(256).not_null())
                    .col(ColumnDef::new(Deals::DealType).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Deals::Stage)
                            .string_len(16)
                            .not_null()
                            .default("Origination"),
                    )
                    .col(ColumnDef::new(Deals::Value).double().not_null().default(0.0))
                    .col(ColumnDef::new(Deals::Client).string_len(256).not_null())
                    .col(ColumnDef::new(Deals::Sector).string_len(128).not_null())
                    .col(ColumnDef::new(Deals::Lead).string_len(256).not_null())
                    .col(ColumnDef::new(Deals::Description).text())
                    .col(ColumnDef::new(Deals::PodTeam).json().not_null())
                    .col(ColumnDef::new(Deals::Progress).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Deals::Status)
                            .string_len(16)
                            .not_null()
                            .default("Active"),
                    )
                    .col(&mut timestamp_with_default(Deals::CreatedAt))
                    .col(&mut timestamp_with_default(Deals::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_deals_status")
                    .table(Deals::Table)
                    .col(Deals::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Milestones::Table)
                    .if_not_exists()
                    .col(&mut uuid_pk(Milestones::Id))
                    .col(ColumnDef::new(Milestones::DealId).uuid().not_null())
                    .col(ColumnDef::new(Milestones::Title).string_len(256).not_null())
                    .col(ColumnDef::new(Milestones::Description).text())
                    .col(ColumnDef::new(Milestones::Stage).string_len(16).not_null())
                    .col(ColumnDef::new(Milestones::SortOrder).integer().not_null())
                    .col(
                        ColumnDef::new(Milestones::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Milestones::DueDate).timestamp_with_time_zone())
                    .col(&mut timestamp_with_default(Milestones::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_milestone_deal")
                            .from(Milestones::Table, Milestones::DealId)
                            .to(Deals::Table, Deals::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_milestones_deal_stage")
                    .table(Milestones::Table)
                    .col(Milestones::DealId)
                    .col(Milestones::Stage)
                    .col(Milestones::SortOrder)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tasks::Table)
                    .if_not_exists()
                    .col(&mut uuid_pk(Tasks::Id))
                    .col(ColumnDef::new(Tasks::Title).string_len(512).not_null())
                    .col(ColumnDef::new(Tasks::Description).text())
                    .col(ColumnDef::new(Tasks::DealId).uuid())
                    .col(ColumnDef::new(Tasks::DealStage).string_len(16))
                    .col(ColumnDef::new(Tasks::MilestoneId).uuid())
                    .col(ColumnDef::new(Tasks::AssignedTo).uuid())
                    .col(
                        ColumnDef::new(Tasks::Priority)
                            .string_len(16)
                            .not_null()
                            .default("Medium"),
                    )
                    .col(ColumnDef::new(Tasks::DueDate).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Tasks::Status)
                            .string_len(16)
                            .not_null()
                            .default("Pending"),
                    )
                    .col(ColumnDef::new(Tasks::Type).string_len(64).not_null())
                    .col(&mut timestamp_with_default(Tasks::CreatedAt))
                    .col(&mut timestamp_with_default(Tasks::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_deal")
                            .from(Tasks::Table, Tasks::DealId)
                            .to(Deals::Table, Deals::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_milestone")
                            .from(Tasks::Table, Tasks::MilestoneId)
                            .to(Milestones::Table, Milestones::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_assignee")
                            .from(Tasks::Table, Tasks::AssignedTo)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tasks_assignee_status")
                    .table(Tasks::Table)
                    .col(Tasks::AssignedTo)
                    .col(Tasks::Status)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tasks_deal")
                    .table(Tasks::Table)
                    .col(Tasks::DealId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Notifications::Table)
                    .if_not_exists()
                    .col(&mut uuid_pk(Notifications::Id))
                    .col(ColumnDef::new(Notifications::UserId).uuid().not_null())
                    .col(ColumnDef::new(Notifications::Title).string_len(256).not_null())
                    .col(ColumnDef::new(Notifications::Message).text().not_null())
                    .col(ColumnDef::new(Notifications::Type).string_len(64).not_null())
                    .col(ColumnDef::new(Notifications::Link).string_len(512))
                    .col(
                        ColumnDef::new(Notifications::IsRead)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(&mut timestamp_with_default(Notifications::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_user")
                            .from(Notifications::Table, Notifications::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_notifications_user")
                    .table(Notifications::Table)
                    .col(Notifications::UserId)
                    .col(Notifications::IsRead)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notifications::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tasks::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Milestones::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Deals::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(PersonalityProfiles::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).if_exists().to_owned())
            .await
    }
}

pub(crate) fn uuid_pk<C: Iden + 'static>(col: C) -> ColumnDef {
    let mut column = ColumnDef::new(col);
    column.uuid().not_null().primary_key();
    column
}

pub(crate) fn timestamp_with_default<C: Iden + 'static>(col: C) -> ColumnDef {
    let mut column = ColumnDef::new(col);
    column
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::current_timestamp());
    column
}
