use sea_orm_migration::{
    prelude::*,
    schema::{
        boolean, date, double, integer, string, string_len, string_null, text, timestamp,
        timestamp_null, uuid, uuid_null,
    },
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Document::Table)
                    .if_not_exists()
                    .col(uuid(Document::Id).primary_key())
                    .col(uuid(Document::UserId))
                    .col(string(Document::Title))
                    .col(timestamp(Document::ExpiresAt))
                    .col(timestamp(Document::CreatedAt).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-document-expires_at")
                    .table(Document::Table)
                    .col(Document::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Notification::Table)
                    .if_not_exists()
                    .col(uuid(Notification::Id).primary_key())
                    .col(uuid(Notification::UserId))
                    .col(string(Notification::Type))
                    .col(text(Notification::Message))
                    .col(boolean(Notification::IsRead).default(false))
                    .col(string_null(Notification::Link))
                    .col(timestamp(Notification::CreatedAt).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        // Reminder jobs look notifications up by (user, link) before inserting
        manager
            .create_index(
                Index::create()
                    .name("idx-notification-user_id-link")
                    .table(Notification::Table)
                    .col(Notification::UserId)
                    .col(Notification::Link)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Consultation::Table)
                    .if_not_exists()
                    .col(uuid(Consultation::Id).primary_key())
                    .col(uuid(Consultation::BuyerId))
                    .col(uuid(Consultation::ProviderId))
                    .col(string(Consultation::Topic))
                    .col(timestamp(Consultation::StartsAt))
                    .col(string_len(Consultation::Status, 16).default("pending"))
                    .col(timestamp(Consultation::CreatedAt).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-consultation-status-starts_at")
                    .table(Consultation::Table)
                    .col(Consultation::Status)
                    .col(Consultation::StartsAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Company::Table)
                    .if_not_exists()
                    .col(uuid(Company::Id).primary_key())
                    .col(string(Company::Name))
                    .col(string_null(Company::Industry))
                    .col(string_null(Company::Country))
                    .col(boolean(Company::IsVerified).default(false))
                    .col(boolean(Company::IsActive).default(true))
                    .col(double(Company::Rating).default(0.0))
                    .col(integer(Company::TrustScore).default(0))
                    .col(timestamp(Company::CreatedAt).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Spotlight::Table)
                    .if_not_exists()
                    .col(uuid(Spotlight::Id).primary_key())
                    .col(date(Spotlight::Date))
                    .col(integer(Spotlight::Position))
                    .col(uuid(Spotlight::CompanyId))
                    .col(text(Spotlight::Blurb))
                    .col(timestamp(Spotlight::CreatedAt).default(Expr::current_timestamp()))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-spotlight-company_id")
                            .from(Spotlight::Table, Spotlight::CompanyId)
                            .to(Company::Table, Company::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-spotlight-date-position")
                    .table(Spotlight::Table)
                    .col(Spotlight::Date)
                    .col(Spotlight::Position)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ConversationParticipant::Table)
                    .if_not_exists()
                    .col(uuid(ConversationParticipant::ConversationId))
                    .col(uuid(ConversationParticipant::UserId))
                    .primary_key(
                        Index::create()
                            .col(ConversationParticipant::ConversationId)
                            .col(ConversationParticipant::UserId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Message::Table)
                    .if_not_exists()
                    .col(uuid(Message::Id).primary_key())
                    .col(uuid(Message::ConversationId))
                    .col(uuid(Message::SenderId))
                    .col(text(Message::Content))
                    .col(boolean(Message::IsRead).default(false))
                    .col(timestamp(Message::CreatedAt).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-message-conversation_id-created_at")
                    .table(Message::Table)
                    .col(Message::ConversationId)
                    .col(Message::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ScheduledMessage::Table)
                    .if_not_exists()
                    .col(uuid(ScheduledMessage::Id).primary_key())
                    .col(uuid(ScheduledMessage::ConversationId))
                    .col(uuid(ScheduledMessage::SenderId))
                    .col(text(ScheduledMessage::Content))
                    .col(timestamp(ScheduledMessage::DueAt))
                    .col(string_len(ScheduledMessage::Status, 16).default("pending"))
                    .col(integer(ScheduledMessage::Attempts).default(0))
                    .col(string_null(ScheduledMessage::LastError))
                    .col(uuid_null(ScheduledMessage::MessageId))
                    .col(timestamp_null(ScheduledMessage::SentAt))
                    .col(timestamp(ScheduledMessage::CreatedAt).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-scheduled_message-status-due_at")
                    .table(ScheduledMessage::Table)
                    .col(ScheduledMessage::Status)
                    .col(ScheduledMessage::DueAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ScheduledMessage::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Message::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ConversationParticipant::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Spotlight::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Company::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Consultation::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Notification::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Document::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Document {
    Table,
    Id,
    UserId,
    Title,
    ExpiresAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Notification {
    Table,
    Id,
    UserId,
    Type,
    Message,
    IsRead,
    Link,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Consultation {
    Table,
    Id,
    BuyerId,
    ProviderId,
    Topic,
    StartsAt,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Company {
    Table,
    Id,
    Name,
    Industry,
    Country,
    IsVerified,
    IsActive,
    Rating,
    TrustScore,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Spotlight {
    Table,
    Id,
    Date,
    Position,
    CompanyId,
    Blurb,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ConversationParticipant {
    Table,
    ConversationId,
    UserId,
}

#[derive(DeriveIden)]
enum Message {
    Table,
    Id,
    ConversationId,
    SenderId,
    Content,
    IsRead,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ScheduledMessage {
    Table,
    Id,
    ConversationId,
    SenderId,
    Content,
    DueAt,
    Status,
    Attempts,
    LastError,
    MessageId,
    SentAt,
    CreatedAt,
}
