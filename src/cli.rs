use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the server, job workers and chat relay (default)
    Serve,
    /// Database migration commands
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Inspect and run notification jobs
    Jobs {
        #[command(subcommand)]
        action: JobsAction,
    },
    /// Print a JWT for a user id (development only)
    IssueToken { user_id: Uuid },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum MigrateAction {
    /// Run migrations up
    Up {
        /// Number of migrations to run (default: all)
        #[arg(short, long)]
        steps: Option<u32>,
    },
    /// Run migrations down
    Down {
        /// Number of migrations to rollback (default: 1)
        #[arg(short, long, default_value = "1")]
        steps: u32,
    },
    /// Show migration status
    Status,
    /// Drop all tables and run every migration again
    Fresh,
}

#[derive(Subcommand)]
pub enum JobsAction {
    /// List registered jobs with their cron expressions
    List,
    /// Execute a job in this process and print its report
    Run {
        name: String,
        /// Evaluate as if it were this instant (RFC 3339)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Queue a run for the worker pools of a running server
    Enqueue { name: String },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_jobs_run_parses_an_instant() {
        let cli = Cli::parse_from([
            "marketplace-notifier",
            "jobs",
            "run",
            "document_expiry",
            "--at",
            "2026-03-02T09:00:00Z",
        ]);

        match cli.command {
            Some(Commands::Jobs {
                action: JobsAction::Run { name, at },
            }) => {
                assert_eq!(name, "document_expiry");
                assert_eq!(
                    at.map(|at| at.to_rfc3339()).as_deref(),
                    Some("2026-03-02T09:00:00+00:00")
                );
            }
            _ => panic!("expected jobs run"),
        }
    }
}
