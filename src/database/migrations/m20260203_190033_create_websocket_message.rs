use sea_orm::DatabaseBackend;
use sea_orm_migration::{
    prelude::*,
    schema::{json_binary, timestamp, uuid},
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WebsocketMessage::Table)
                    .if_not_exists()
                    .col(uuid(WebsocketMessage::Id).primary_key())
                    .col(json_binary(WebsocketMessage::RecipientCriteria))
                    .col(json_binary(WebsocketMessage::Payload))
                    .col(timestamp(WebsocketMessage::CreatedAt).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        // Cross-instance fan-out only exists on PostgreSQL; other backends deliver in-process
        if manager.get_database_backend() != DatabaseBackend::Postgres {
            return Ok(());
        }

        let connection = manager.get_connection();
        connection
            .execute_unprepared(
                r"
                CREATE OR REPLACE FUNCTION notify_websocket_message()
                RETURNS TRIGGER AS $$
                BEGIN
                    PERFORM pg_notify('websocket_new_message', NEW.id::text);
                    RETURN NEW;
                END;
                $$ LANGUAGE plpgsql;
                ",
            )
            .await?;

        connection
            .execute_unprepared(
                r"
                CREATE TRIGGER websocket_message_notify
                    AFTER INSERT ON websocket_message
                    FOR EACH ROW
                    EXECUTE FUNCTION notify_websocket_message();
                ",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        if manager.get_database_backend() == DatabaseBackend::Postgres {
            let connection = manager.get_connection();
            connection
                .execute_unprepared(
                    "DROP TRIGGER IF EXISTS websocket_message_notify ON websocket_message",
                )
                .await?;
            connection
                .execute_unprepared("DROP FUNCTION IF EXISTS notify_websocket_message()")
                .await?;
        }

        manager
            .drop_table(Table::drop().table(WebsocketMessage::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum WebsocketMessage {
    Table,
    Id,
    RecipientCriteria,
    Payload,
    CreatedAt,
}
