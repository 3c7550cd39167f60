use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EmailLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmailLogs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EmailLogs::RecipientEmail)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EmailLogs::RecipientName).string().null())
                    .col(ColumnDef::new(EmailLogs::EmailType).string().not_null())
                    .col(ColumnDef::new(EmailLogs::Subject).string().not_null())
                    .col(ColumnDef::new(EmailLogs::Status).string().not_null())
                    .col(ColumnDef::new(EmailLogs::StatusDetails).text().null())
                    .col(
                        ColumnDef::new(EmailLogs::ProviderMessageId)
                            .string()
                            .null(),
                    )
                    // Weak reference on purpose: logs must survive user deletion
                    .col(ColumnDef::new(EmailLogs::UserId).integer().null())
                    .col(
                        ColumnDef::new(EmailLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(EmailLogs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Webhook events join on the provider message id; this lookup is on
        // the hot path and must be an indexed equality match.
        manager
            .create_index(
                Index::create()
                    .name("idx_email_logs_provider_message_id")
                    .table(EmailLogs::Table)
                    .col(EmailLogs::ProviderMessageId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_logs_status")
                    .table(EmailLogs::Table)
                    .col(EmailLogs::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_logs_email_type")
                    .table(EmailLogs::Table)
                    .col(EmailLogs::EmailType)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_logs_recipient_email")
                    .table(EmailLogs::Table)
                    .col(EmailLogs::RecipientEmail)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_logs_created_at")
                    .table(EmailLogs::Table)
                    .col(EmailLogs::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_email_logs_created_at")
                    .table(EmailLogs::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_email_logs_recipient_email")
                    .table(EmailLogs::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_email_logs_email_type")
                    .table(EmailLogs::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_email_logs_status")
                    .table(EmailLogs::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_email_logs_provider_message_id")
                    .table(EmailLogs::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(EmailLogs::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum EmailLogs {
    Table,
    Id,
    RecipientEmail,
    RecipientName,
    EmailType,
    Subject,
    Status,
    StatusDetails,
    ProviderMessageId,
    UserId,
    CreatedAt,
    UpdatedAt,
}
