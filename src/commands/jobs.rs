use std::process;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::{
    app::App,
    cli::JobsAction,
    config::Config,
    database::connect,
    environment::Environment,
    job_queue::insert_job,
    jobs::{job_registry::JobRegistry, outcome::JobOutcome, scheduled_job::ScheduledJob},
    notifiers,
};

pub async fn handle_jobs_command(config: Config, environment: Environment, action: JobsAction) {
    let registry = notifiers::job_registry();
    let schedule = notifiers::job_schedule(&config.schedule);

    match action {
        JobsAction::List => print_jobs(&registry, &schedule),
        JobsAction::Run { name, at } => {
            ensure_registered(&registry, &name);
            let app = build_app(config, environment).await;
            let outcome = registry.execute(&app, &name, &job_arguments(at)).await;
            print_outcome(&name, &outcome);
            if !matches!(outcome, JobOutcome::Completed(_)) {
                process::exit(1);
            }
        }
        JobsAction::Enqueue { name } => {
            ensure_registered(&registry, &name);
            let app = build_app(config, environment).await;
            match insert_job(&app.db, &name, json!({})).await {
                Ok(job) => println!("📥 Queued {name} as job {}", job.id),
                Err(e) => {
                    eprintln!("❌ Failed to queue {name}: {e}");
                    process::exit(1);
                }
            }
        }
    }
}

/// Arguments understood by every notifier job
pub fn job_arguments(at: Option<DateTime<Utc>>) -> serde_json::Value {
    at.map_or_else(|| json!({}), |at| json!({ "as_of": at }))
}

fn print_jobs(registry: &JobRegistry, schedule: &[ScheduledJob]) {
    println!("📋 Registered jobs:");
    for name in registry.job_names() {
        let cron = schedule
            .iter()
            .find(|scheduled| scheduled.job_name == name)
            .map_or("not scheduled", |scheduled| scheduled.cron_expression.as_str());
        println!("  {name:<24} {cron}");
    }
}

fn print_outcome(name: &str, outcome: &JobOutcome) {
    match outcome {
        JobOutcome::Completed(report) => {
            println!("✅ {name} completed");
            match serde_json::to_string_pretty(report) {
                Ok(report) => println!("{report}"),
                Err(_) => println!("{report}"),
            }
        }
        other => eprintln!("❌ {name} {other}"),
    }
}

fn ensure_registered(registry: &JobRegistry, name: &str) {
    if !registry.contains(name) {
        eprintln!(
            "❌ Unknown job '{name}'. Registered jobs: {}",
            registry.job_names().join(", ")
        );
        process::exit(1);
    }
}

async fn build_app(config: Config, environment: Environment) -> App {
    let db = match connect(&config.database).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("❌ Could not connect to the database: {e}");
            process::exit(1);
        }
    };

    match App::new(config, environment, db) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("❌ Could not set up the copywriter: {e}");
            process::exit(1);
        }
    }
}
