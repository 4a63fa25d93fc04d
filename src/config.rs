use crate::error::MigrationError;
use crate::migrator::DEFAULT_CHUNK_SIZE;
use crate::storage::dynamo::MAX_TRANSACTION_ITEMS;
use std::env;
use std::path::PathBuf;

const DEFAULT_PRINCIPALS_TABLE: &str = "Principals";
const DEFAULT_EMAIL_INDEX_TABLE: &str = "PrincipalsByEmail";
const DEFAULT_SCAN_PAGE_SIZE: usize = 500;
const DEFAULT_REPORT_PATH: &str = "invalid-users.csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    pub principals_table: String,
    pub email_index_table: String,
    pub scan_page_size: usize,
    pub chunk_size: usize,
    pub report_path: PathBuf,
    pub dry_run: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            principals_table: DEFAULT_PRINCIPALS_TABLE.to_string(),
            email_index_table: DEFAULT_EMAIL_INDEX_TABLE.to_string(),
            scan_page_size: DEFAULT_SCAN_PAGE_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            report_path: PathBuf::from(DEFAULT_REPORT_PATH),
            dry_run: false,
        }
    }
}

impl MigrationConfig {
    /// Read configuration from the process environment and command line.
    pub fn from_env() -> Result<Self, MigrationError> {
        let args: Vec<String> = env::args().skip(1).collect();
        Self::from_lookup(|key| env::var(key).ok(), &args)
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        args: &[String],
    ) -> Result<Self, MigrationError> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let scan_page_size = match var("SCAN_PAGE_SIZE") {
            Some(raw) => parse_count("SCAN_PAGE_SIZE", &raw)?,
            None => defaults.scan_page_size,
        };
        if scan_page_size == 0 {
            return Err(MigrationError::Config(
                "SCAN_PAGE_SIZE must be greater than 0".to_string(),
            ));
        }

        let chunk_size = match var("MIGRATION_CHUNK_SIZE") {
            Some(raw) => parse_count("MIGRATION_CHUNK_SIZE", &raw)?,
            None => defaults.chunk_size,
        };
        if !(1..=MAX_TRANSACTION_ITEMS).contains(&chunk_size) {
            return Err(MigrationError::Config(format!(
                "MIGRATION_CHUNK_SIZE must be between 1 and {MAX_TRANSACTION_ITEMS}"
            )));
        }

        let mut dry_run = false;
        for arg in args {
            match arg.as_str() {
                "--dry-run" => dry_run = true,
                other => {
                    return Err(MigrationError::Config(format!(
                        "unrecognized argument: {other}"
                    )));
                }
            }
        }

        Ok(Self {
            principals_table: var("PRINCIPALS_TABLE").unwrap_or(defaults.principals_table),
            email_index_table: var("EMAIL_INDEX_TABLE").unwrap_or(defaults.email_index_table),
            scan_page_size,
            chunk_size,
            report_path: var("INVALID_USERS_CSV")
                .map(PathBuf::from)
                .unwrap_or(defaults.report_path),
            dry_run,
        })
    }
}

fn parse_count(key: &str, raw: &str) -> Result<usize, MigrationError> {
    raw.parse()
        .map_err(|_| MigrationError::Config(format!("{key} must be a valid number")))
}
