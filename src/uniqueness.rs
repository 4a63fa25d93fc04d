//! Post-scan uniqueness check over the fully populated [`EmailIndex`].

use crate::reporter::ErrorReporter;
use crate::types::{EmailMapping, ErrorRecord, Violation};
use crate::validator::EmailIndex;
use anyhow::Result;
use tokio::io::AsyncWrite;

const CLAIMANT_SEPARATOR: &str = " - ";

/// Report every email that is not claimed by exactly one identity.
///
/// One aggregated row per offending email, listing all claimants. Visits the
/// whole index before returning. Returns `true` when every email is unique.
pub async fn check_uniqueness<W: AsyncWrite + Unpin>(
    index: &EmailIndex,
    reporter: &mut ErrorReporter<W>,
) -> Result<bool> {
    let mut unique = true;

    for (email, claimants) in index.iter() {
        if claimants.len() == 1 {
            continue;
        }
        unique = false;

        let ids: Vec<&str> = claimants.iter().map(|c| c.id.as_str()).collect();
        let names: Vec<&str> = claimants.iter().map(|c| c.display_name.as_str()).collect();
        reporter
            .report(&ErrorRecord {
                principal_id: ids.join(CLAIMANT_SEPARATOR),
                display_name: names.join(CLAIMANT_SEPARATOR),
                email: email.to_string(),
                message: Violation::DuplicateEmail,
            })
            .await?;
    }

    Ok(unique)
}

/// One mapping per email with exactly one claimant.
pub fn migration_targets(index: &EmailIndex) -> Vec<EmailMapping> {
    index
        .iter()
        .filter_map(|(email, claimants)| match claimants {
            [only] => Some(EmailMapping {
                email: email.to_string(),
                principal_id: only.id.clone(),
            }),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Claimant;

    fn claimant(id: &str, name: &str) -> Claimant {
        Claimant {
            id: id.to_string(),
            display_name: name.to_string(),
        }
    }

    async fn check(index: &EmailIndex) -> (bool, Vec<String>) {
        let mut reporter = ErrorReporter::new(Vec::new()).await.unwrap();
        let unique = check_uniqueness(index, &mut reporter).await.unwrap();
        let csv = String::from_utf8(reporter.finalize().await.unwrap()).unwrap();
        (unique, csv.lines().skip(1).map(str::to_string).collect())
    }

    #[tokio::test]
    async fn unique_index_passes_without_rows() {
        let mut index = EmailIndex::new();
        index.insert("a@x.com", claimant("u:t:1", "A"));
        index.insert("b@x.com", claimant("u:t:2", "B"));

        let (unique, rows) = check(&index).await;
        assert!(unique);
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn duplicates_aggregate_into_one_row_per_email() {
        let mut index = EmailIndex::new();
        index.insert("a@x.com", claimant("u:t:1", "One"));
        index.insert("a@x.com", claimant("u:t:2", "Two"));
        index.insert("a@x.com", claimant("u:t:3", "Three"));
        index.insert("b@x.com", claimant("u:t:4", "Four"));
        index.insert("c@x.com", claimant("u:t:5", "Five"));
        index.insert("c@x.com", claimant("u:t:6", "Six"));

        let (unique, rows) = check(&index).await;
        assert!(!unique);
        assert_eq!(
            rows,
            vec![
                "u:t:1 - u:t:2 - u:t:3,One - Two - Three,a@x.com,duplicate email addresses detected",
                "u:t:5 - u:t:6,Five - Six,c@x.com,duplicate email addresses detected",
            ]
        );
    }

    #[tokio::test]
    async fn repeated_check_yields_same_rows() {
        let mut index = EmailIndex::new();
        index.insert("a@x.com", claimant("u:t:1", "One"));
        index.insert("a@x.com", claimant("u:t:2", "Two"));

        let first = check(&index).await;
        let second = check(&index).await;
        assert_eq!(first, second);
    }

    #[test]
    fn targets_exclude_shared_emails() {
        let mut index = EmailIndex::new();
        index.insert("a@x.com", claimant("u:t:1", "One"));
        index.insert("a@x.com", claimant("u:t:2", "Two"));
        index.insert("b@x.com", claimant("u:t:3", "Three"));

        assert_eq!(
            migration_targets(&index),
            vec![EmailMapping {
                email: "b@x.com".to_string(),
                principal_id: "u:t:3".to_string(),
            }]
        );
    }
}
