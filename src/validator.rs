//! Per-page validation of user principals.
//!
//! Every user principal either becomes a diagnostic row (missing or
//! syntactically invalid email) or is appended to the [`EmailIndex`] under its
//! email. Uniqueness is not checked here; that needs the whole scan.

use crate::reporter::ErrorReporter;
use crate::types::{Claimant, ErrorRecord, Principal, PrincipalKind, Violation};
use anyhow::Result;
use email_address::EmailAddress;
use std::collections::BTreeMap;
use tokio::io::AsyncWrite;
use tracing::debug;

/// Email → claimants in scan order. Keys are used exactly as stored.
///
/// This grows with the number of distinct user emails in the dataset and is
/// held in memory for the whole run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EmailIndex {
    entries: BTreeMap<String, Vec<Claimant>>,
}

impl EmailIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, email: &str, claimant: Claimant) {
        self.entries
            .entry(email.to_string())
            .or_default()
            .push(claimant);
    }

    pub fn get(&self, email: &str) -> Option<&[Claimant]> {
        self.entries.get(email).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Claimant])> {
        self.entries
            .iter()
            .map(|(email, claimants)| (email.as_str(), claimants.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// State owned by one run and threaded through the validation phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationState {
    pub index: EmailIndex,
    pub emails_valid: bool,
    pub principals_scanned: usize,
    pub users_validated: usize,
}

impl Default for ValidationState {
    fn default() -> Self {
        Self {
            index: EmailIndex::new(),
            emails_valid: true,
            principals_scanned: 0,
            users_validated: 0,
        }
    }
}

impl ValidationState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Validate one page of principals into `state`.
///
/// Only a reporter write failure is returned as an error.
pub async fn validate_page<W: AsyncWrite + Unpin>(
    page: &[Principal],
    state: &mut ValidationState,
    reporter: &mut ErrorReporter<W>,
) -> Result<()> {
    state.principals_scanned += page.len();

    for principal in page {
        if principal.kind() != PrincipalKind::User {
            continue;
        }
        state.users_validated += 1;

        let email = match principal.email.as_deref() {
            Some(email) if !email.is_empty() => email,
            _ => {
                state.emails_valid = false;
                reporter
                    .report(&diagnostic(principal, Violation::MissingEmail))
                    .await?;
                continue;
            }
        };

        if !EmailAddress::is_valid(email) {
            state.emails_valid = false;
            reporter
                .report(&diagnostic(principal, Violation::InvalidEmail))
                .await?;
            continue;
        }

        state.index.insert(
            email,
            Claimant {
                id: principal.principal_id.clone(),
                display_name: principal.display_name.clone(),
            },
        );
    }

    debug!(
        page_size = page.len(),
        indexed_emails = state.index.len(),
        "Validated page"
    );
    Ok(())
}

fn diagnostic(principal: &Principal, violation: Violation) -> ErrorRecord {
    ErrorRecord {
        principal_id: principal.principal_id.clone(),
        display_name: principal.display_name.clone(),
        email: principal.email.clone().unwrap_or_default(),
        message: violation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(pages: &[Vec<Principal>]) -> (ValidationState, String) {
        let mut state = ValidationState::new();
        let mut reporter = ErrorReporter::new(Vec::new()).await.unwrap();
        for page in pages {
            validate_page(page, &mut state, &mut reporter).await.unwrap();
        }
        let csv = String::from_utf8(reporter.finalize().await.unwrap()).unwrap();
        (state, csv)
    }

    fn rows(csv: &str) -> Vec<&str> {
        csv.lines().skip(1).collect()
    }

    #[tokio::test]
    async fn valid_users_are_indexed() {
        let (state, csv) = run(&[vec![
            Principal::new("u:t:1", "Alice", Some("alice@example.com")),
            Principal::new("u:t:2", "Bob", Some("bob@example.com")),
        ]])
        .await;

        assert!(state.emails_valid);
        assert_eq!(state.index.len(), 2);
        assert_eq!(state.users_validated, 2);
        assert!(rows(&csv).is_empty());
    }

    #[tokio::test]
    async fn missing_email_reported_once_and_invalidates() {
        let (state, csv) = run(&[vec![
            Principal::new("u:t:1", "Alice", None),
            Principal::new("u:t:2", "Bob", Some("")),
        ]])
        .await;

        assert!(!state.emails_valid);
        assert!(state.index.is_empty());
        assert_eq!(
            rows(&csv),
            vec![
                "u:t:1,Alice,,missing email address",
                "u:t:2,Bob,,missing email address"
            ]
        );
    }

    #[tokio::test]
    async fn invalid_email_reported() {
        let (state, csv) = run(&[vec![Principal::new(
            "u:t:1",
            "Alice",
            Some("not-an-email"),
        )]])
        .await;

        assert!(!state.emails_valid);
        assert!(state.index.is_empty());
        assert_eq!(
            rows(&csv),
            vec!["u:t:1,Alice,not-an-email,invalid email address"]
        );
    }

    #[tokio::test]
    async fn groups_and_other_kinds_are_skipped() {
        let (state, csv) = run(&[vec![
            Principal::new("g:t:staff", "Staff", None),
            Principal::new("x:t:odd", "Odd", Some("not-an-email")),
        ]])
        .await;

        assert!(state.emails_valid);
        assert_eq!(state.principals_scanned, 2);
        assert_eq!(state.users_validated, 0);
        assert!(rows(&csv).is_empty());
    }

    #[tokio::test]
    async fn claimants_accumulate_across_pages_in_scan_order() {
        let (state, _) = run(&[
            vec![Principal::new("u:t:1", "One", Some("a@x.com"))],
            vec![Principal::new("u:t:3", "Three", Some("a@x.com"))],
            vec![Principal::new("u:t:2", "Two", Some("a@x.com"))],
        ])
        .await;

        let ids: Vec<&str> = state
            .index
            .get("a@x.com")
            .unwrap()
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids, vec!["u:t:1", "u:t:3", "u:t:2"]);
        assert!(state.emails_valid);
    }

    #[tokio::test]
    async fn email_keys_are_case_sensitive() {
        let (state, _) = run(&[vec![
            Principal::new("u:t:1", "One", Some("A@x.com")),
            Principal::new("u:t:2", "Two", Some("a@x.com")),
        ]])
        .await;
        assert_eq!(state.index.len(), 2);
    }
}
