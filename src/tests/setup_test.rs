use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tracing::debug;

use crate::{
    app::App, boot::read_config, database::connect, database::migrations::Migrator,
    environment::Environment, router::router,
};

static TRACING_INITIALIZED: std::sync::Once = std::sync::Once::new();

fn init_tracing() {
    TRACING_INITIALIZED.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let _ = tracing_subscriber::registry()
            .with(EnvFilter::from_default_env())
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}

/// Boots the app against a fresh in-memory SQLite database.
///
/// Every call gets its own database, so tests can run in parallel without
/// sharing rows. On SQLite real-time events go straight to `app.relay`.
///
/// # Panics
///
/// Panics if the test configuration, migrations or server setup fail.
pub async fn setup_test() -> TestUtils {
    init_tracing();

    let environment = Environment::Test;
    let config = read_config(&environment).expect("Failed to read test configuration");

    let db = connect(&config.database)
        .await
        .expect("Failed to connect to the test database");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    debug!("Test database migrated");

    let app = App::new(config, environment, db.clone()).expect("Failed to build the app");
    let server =
        axum_test::TestServer::new(router(app.clone())).expect("Failed to create test server");

    TestUtils { server, db, app }
}

pub struct TestUtils {
    pub server: axum_test::TestServer,
    pub db: DatabaseConnection,
    /// The state the server runs with; its relay receives local events
    pub app: App,
}
