use sea_orm_migration::prelude::*;

use crate::m20261016_000001_core::{timestamp_with_default, uuid_pk};

#[derive(DeriveIden, Copy, Clone)]
enum EmailDeals {
    Table,
    Id,
    EmailId,
    ThreadId,
    Subject,
    Sender,
    ReceivedAt,
    ExtractedData,
    DealId,
    Status,
    ProcessingNotes,
    CreatedAt,
}

#[derive(DeriveIden, Copy, Clone)]
enum DealAiContexts {
    Table,
    Id,
    DealId,
    ContextType,
    Content,
    Summary,
    SourceId,
    ProcessedAt,
}

#[derive(DeriveIden, Copy, Clone)]
enum IntakeJobs {
    Table,
    Id,
    ThreadId,
    Folder,
    Status,
    Steps,
    DealId,
    FailedStep,
    LastError,
    StartedAt,
    FinishedAt,
}

#[derive(DeriveIden, Copy, Clone)]
enum Deals {
    Table,
    Id,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EmailDeals::Table)
                    .if_not_exists()
                    .col(&mut uuid_pk(EmailDeals::Id))
                    .col(ColumnDef::new(EmailDeals::EmailId).string_len(128).not_null())
                    .col(ColumnDef::new(EmailDeals::ThreadId).string_len(128).not_null())
                    .col(ColumnDef::new(EmailDeals::Subject).string_len(1024).not_null())
                    .col(ColumnDef::new(EmailDeals::Sender).string_len(512).not_null())
                    .col(ColumnDef::new(EmailDeals::ReceivedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(EmailDeals::ExtractedData).json())
                    .col(ColumnDef::new(EmailDeals::DealId).uuid())
                    .col(ColumnDef::new(EmailDeals::Status).string_len(16).not_null())
                    .col(ColumnDef::new(EmailDeals::ProcessingNotes).text())
                    .col(&mut timestamp_with_default(EmailDeals::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_email_deal_deal")
                            .from(EmailDeals::Table, EmailDeals::DealId)
                            .to(Deals::Table, Deals::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Thread uniqueness is what makes concurrent intake passes safe.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_email_deals_thread")
                    .table(EmailDeals::Table)
                    .col(EmailDeals::ThreadId)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_email_deals_status")
                    .table(EmailDeals::Table)
                    .col(EmailDeals::Status)
                    .col(EmailDeals::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DealAiContexts::Table)
                    .if_not_exists()
                    .col(&mut uuid_pk(DealAiContexts::Id))
                    .col(ColumnDef::new(DealAiContexts::DealId).uuid().not_null())
                    .col(
                        ColumnDef::new(DealAiContexts::ContextType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(DealAiContexts::Content).text().not_null())
                    .col(ColumnDef::new(DealAiContexts::Summary).text())
                    .col(ColumnDef::new(DealAiContexts::SourceId).string_len(128))
                    .col(&mut timestamp_with_default(DealAiContexts::ProcessedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ai_context_deal")
                            .from(DealAiContexts::Table, DealAiContexts::DealId)
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
                    .name("idx_ai_contexts_deal")
                    .table(DealAiContexts::Table)
                    .col(DealAiContexts::DealId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(IntakeJobs::Table)
                    .if_not_exists()
                    .col(&mut uuid_pk(IntakeJobs::Id))
                    .col(ColumnDef::new(IntakeJobs::ThreadId).string_len(128).not_null())
                    .col(ColumnDef::new(IntakeJobs::Folder).string_len(256).not_null())
                    .col(
                        ColumnDef::new(IntakeJobs::Status)
                            .string_len(16)
                            .not_null()
                            .default("running"),
                    )
                    .col(ColumnDef::new(IntakeJobs::Steps).json().not_null())
                    .col(ColumnDef::new(IntakeJobs::DealId).uuid())
                    .col(ColumnDef::new(IntakeJobs::FailedStep).string_len(32))
                    .col(ColumnDef::new(IntakeJobs::LastError).text())
                    .col(&mut timestamp_with_default(IntakeJobs::StartedAt))
                    .col(ColumnDef::new(IntakeJobs::FinishedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_intake_jobs_thread")
                    .table(IntakeJobs::Table)
                    .col(IntakeJobs::ThreadId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(IntakeJobs::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DealAiContexts::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EmailDeals::Table).if_exists().to_owned())
            .await
    }
}
