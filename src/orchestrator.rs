//! Sequences one migration run:
//!
//! ```text
//! Init -> Scanning -> CheckingUniqueness -> Aborted
//!                                        -> Migrating -> Done | Failed
//!         Scanning -> Failed
//! ```
//!
//! The report file is finalized on every path once it has been created, so
//! rows collected before a failure are never lost.

use crate::config::MigrationConfig;
use crate::error::MigrationError;
use crate::migrator::{BatchMigrator, batches_needed};
use crate::reporter::ErrorReporter;
use crate::storage::{PRINCIPAL_FIELDS, PrincipalStore};
use crate::uniqueness::{check_uniqueness, migration_targets};
use crate::validator::{ValidationState, validate_page};
use std::fmt;
use tokio::io::AsyncWrite;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Scanning,
    CheckingUniqueness,
    Aborted,
    Migrating,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Scanning => "scanning",
            Self::CheckingUniqueness => "checking-uniqueness",
            Self::Aborted => "aborted",
            Self::Migrating => "migrating",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub principals_scanned: usize,
    pub users_validated: usize,
    pub violations: usize,
    pub entries_migrated: usize,
    pub batches: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every unique email was written (possibly none).
    Migrated(RunSummary),
    /// Validation passed; writes were skipped on request.
    DryRun(RunSummary),
    /// At least one missing, invalid or duplicate email. Nothing was written.
    ValidationFailed(RunSummary),
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Migrated(_) | Self::DryRun(_) => 0,
            Self::ValidationFailed(_) => 1,
        }
    }

    pub fn summary(&self) -> &RunSummary {
        match self {
            Self::Migrated(s) | Self::DryRun(s) | Self::ValidationFailed(s) => s,
        }
    }
}

fn enter(phase: Phase) {
    info!(%phase, "Entering phase");
}

/// Run the whole migration against `store`, writing diagnostics to
/// `config.report_path`.
pub async fn run<S: PrincipalStore>(
    store: &S,
    config: &MigrationConfig,
) -> Result<Outcome, MigrationError> {
    enter(Phase::Init);
    let reporter = ErrorReporter::create(&config.report_path)
        .await
        .map_err(MigrationError::Report)?;

    run_with_reporter(store, config, reporter).await
}

/// Run against an already opened reporter, finalizing it before returning.
pub async fn run_with_reporter<S, W>(
    store: &S,
    config: &MigrationConfig,
    mut reporter: ErrorReporter<W>,
) -> Result<Outcome, MigrationError>
where
    S: PrincipalStore,
    W: AsyncWrite + Unpin,
{
    let result = pipeline(store, config, &mut reporter).await;
    let rows = reporter.rows_written();

    match (result, reporter.finalize().await) {
        (Ok(outcome), Ok(_)) => {
            info!(rows, "Report finalized");
            Ok(outcome)
        }
        (Ok(_), Err(e)) => {
            enter(Phase::Failed);
            Err(MigrationError::Report(e))
        }
        (Err(e), finalized) => {
            enter(Phase::Failed);
            if let Err(flush_err) = finalized {
                error!(error = %flush_err, "Failed to finalize report after earlier failure");
            }
            Err(e)
        }
    }
}

async fn pipeline<S, W>(
    store: &S,
    config: &MigrationConfig,
    reporter: &mut ErrorReporter<W>,
) -> Result<Outcome, MigrationError>
where
    S: PrincipalStore,
    W: AsyncWrite + Unpin,
{
    let mut state = ValidationState::new();

    enter(Phase::Scanning);
    scan_and_validate(store, config, &mut state, reporter).await?;
    info!(
        principals = state.principals_scanned,
        users = state.users_validated,
        emails = state.index.len(),
        "Scan complete"
    );

    enter(Phase::CheckingUniqueness);
    let unique = check_uniqueness(&state.index, reporter)
        .await
        .map_err(MigrationError::Report)?;

    let mut summary = RunSummary {
        principals_scanned: state.principals_scanned,
        users_validated: state.users_validated,
        violations: reporter.rows_written(),
        ..RunSummary::default()
    };

    if !state.emails_valid || !unique {
        enter(Phase::Aborted);
        info!(
            emails_valid = state.emails_valid,
            emails_unique = unique,
            violations = summary.violations,
            "Validation failed; fix the reported principals and re-run"
        );
        return Ok(Outcome::ValidationFailed(summary));
    }

    let targets = migration_targets(&state.index);
    drop(state);

    if config.dry_run {
        info!(
            entries = targets.len(),
            batches = batches_needed(targets.len(), config.chunk_size),
            "Dry run: skipping email index writes"
        );
        return Ok(Outcome::DryRun(summary));
    }

    enter(Phase::Migrating);
    let stats = BatchMigrator::new(store, config.email_index_table.clone(), config.chunk_size)
        .migrate(targets)
        .await?;
    summary.entries_migrated = stats.entries_written;
    summary.batches = stats.batches;

    enter(Phase::Done);
    Ok(Outcome::Migrated(summary))
}

/// Page through every principal, validating each page before asking for the
/// next one.
async fn scan_and_validate<S, W>(
    store: &S,
    config: &MigrationConfig,
    state: &mut ValidationState,
    reporter: &mut ErrorReporter<W>,
) -> Result<(), MigrationError>
where
    S: PrincipalStore,
    W: AsyncWrite + Unpin,
{
    let mut cursor = None;
    let mut page_number = 0;

    loop {
        page_number += 1;
        let page = store
            .scan_principals(PRINCIPAL_FIELDS, config.scan_page_size, cursor)
            .await
            .map_err(|source| MigrationError::Scan {
                page: page_number,
                source,
            })?;

        validate_page(&page.principals, state, reporter)
            .await
            .map_err(MigrationError::Report)?;
        debug!(
            page = page_number,
            records = page.principals.len(),
            "Processed page"
        );

        match page.next {
            Some(next) => cursor = Some(next),
            None => return Ok(()),
        }
    }
}
