use std::{net::SocketAddr, process};

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::{
    api::health_checks::ok,
    app::App,
    config::Config,
    database::setup_database,
    environment::Environment,
    jobs::supervisor::{job_supervisor, verify_configuration},
    notifiers,
    router::router,
    websocket::listener::start_listener,
};

pub async fn handle_serve_command(environment: Environment, config: Config) {
    let port = config.server.port;

    let job_registry = notifiers::job_registry();
    let job_schedule = notifiers::job_schedule(&config.schedule);
    if let Err(e) = verify_configuration(&config.jobs.workers, &job_registry, &job_schedule) {
        error!("❌ Invalid job configuration: {}", e);
        process::exit(1);
    }

    // Answer liveness probes while migrations run
    let liveness_server_task = tokio::spawn(start_liveness_server(port));

    let (db, migration_receiver) = match setup_database(&config.database).await {
        Ok(setup) => setup,
        Err(e) => {
            error!("❌ Could not connect to the database: {}", e);
            process::exit(1);
        }
    };

    match migration_receiver.await {
        Ok(Ok(())) => info!("✅ Database is ready!"),
        Ok(Err(e)) => {
            error!("❌ Database setup failed: {}", e);
            process::exit(1);
        }
        Err(_) => {
            error!("❌ Database setup channel closed unexpectedly");
            process::exit(1);
        }
    }

    let app = match App::new(config.clone(), environment, db.clone()) {
        Ok(app) => app,
        Err(e) => {
            error!("❌ Could not set up the copywriter: {}", e);
            process::exit(1);
        }
    };

    tokio::spawn(job_supervisor(
        config.jobs,
        app.clone(),
        job_registry,
        job_schedule,
    ));

    tokio::spawn(start_listener(db, app.relay.clone()));

    liveness_server_task.abort();
    let _ = liveness_server_task.await;

    info!("🌍 Running in {} environment", environment);
    if let Err(e) = start_server(router(app), port).await {
        error!("❌ Server error: {}", e);
        process::exit(1);
    }
}

async fn start_liveness_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    let migration_router = Router::new().route("/liveness", get(ok));
    axum::serve(listener, migration_router).await
}

async fn start_server(router: Router, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!("🌐 Server starting on http://{}", addr);
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}
