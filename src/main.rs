//! One-shot migration that builds the email → principal lookup table.
//!
//! Usage:
//!   PRINCIPALS_TABLE=Principals EMAIL_INDEX_TABLE=PrincipalsByEmail \
//!     cargo run --bin migrate-email-index
//!
//! Add --dry-run to validate and report without writing the lookup table.
//! Invalid principals are listed in invalid-users.csv (see INVALID_USERS_CSV).

use aws_config::BehaviorVersion;
use principal_email_index::config::MigrationConfig;
use principal_email_index::orchestrator::{self, Outcome};
use principal_email_index::storage::DynamoStore;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match MigrationConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Refusing to start");
            std::process::exit(e.exit_code());
        }
    };

    let mode = if config.dry_run { "DRY RUN" } else { "LIVE" };
    info!(
        principals_table = %config.principals_table,
        email_index_table = %config.email_index_table,
        report = %config.report_path.display(),
        mode,
        "Starting email index migration"
    );

    let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let dynamodb_client = aws_sdk_dynamodb::Client::new(&aws_config);
    let store = DynamoStore::new(dynamodb_client, config.principals_table.clone());

    let started = Instant::now();
    let code = match orchestrator::run(&store, &config).await {
        Ok(outcome) => {
            let summary = outcome.summary();
            let elapsed_ms = started.elapsed().as_millis();
            match outcome {
                Outcome::Migrated(_) => info!(
                    entries = summary.entries_migrated,
                    batches = summary.batches,
                    elapsed_ms,
                    "Migration complete"
                ),
                Outcome::DryRun(_) => info!(
                    users = summary.users_validated,
                    elapsed_ms,
                    "Dry run complete; validation passed"
                ),
                Outcome::ValidationFailed(_) => error!(
                    violations = summary.violations,
                    report = %config.report_path.display(),
                    elapsed_ms,
                    "Validation failed; nothing was migrated"
                ),
            }
            outcome.exit_code()
        }
        Err(e) => {
            let code = e.exit_code();
            error!(
                error = %format!("{:#}", anyhow::Error::new(e)),
                elapsed_ms = started.elapsed().as_millis(),
                "Migration failed"
            );
            code
        }
    };

    std::process::exit(code);
}
