//! Chunked writes of the email → principal mapping.
//!
//! Chunks are written strictly one after another; a chunk is only issued once
//! the previous one has committed. A failed chunk stops the migration. Chunks
//! already committed stay committed.

use crate::error::MigrationError;
use crate::storage::{PrincipalStore, UpsertOp};
use crate::types::EmailMapping;
use tracing::info;

pub const DEFAULT_CHUNK_SIZE: usize = 30;
pub const EMAIL_KEY_COLUMN: &str = "email";
pub const PRINCIPAL_ID_COLUMN: &str = "principalId";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStats {
    pub entries_written: usize,
    pub batches: usize,
}

pub struct BatchMigrator<'a, S: PrincipalStore> {
    store: &'a S,
    table: String,
    chunk_size: usize,
}

impl<'a, S: PrincipalStore> BatchMigrator<'a, S> {
    pub fn new(store: &'a S, table: String, chunk_size: usize) -> Self {
        Self {
            store,
            table,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Write `mapping`, consuming it chunk by chunk.
    pub async fn migrate(
        &self,
        mapping: Vec<EmailMapping>,
    ) -> Result<MigrationStats, MigrationError> {
        let total = mapping.len();
        let mut pending = mapping.into_iter();
        let mut stats = MigrationStats::default();

        loop {
            let ops: Vec<UpsertOp> = pending
                .by_ref()
                .take(self.chunk_size)
                .map(|entry| self.upsert_for(entry))
                .collect();
            if ops.is_empty() {
                break;
            }

            let chunk = stats.batches + 1;
            self.store
                .batch_upsert(&ops)
                .await
                .map_err(|source| MigrationError::Batch { chunk, source })?;

            stats.batches = chunk;
            stats.entries_written += ops.len();
            info!(
                chunk,
                written = stats.entries_written,
                total,
                "Committed email index chunk"
            );
        }

        Ok(stats)
    }

    fn upsert_for(&self, entry: EmailMapping) -> UpsertOp {
        UpsertOp {
            table: self.table.clone(),
            key_column: EMAIL_KEY_COLUMN.to_string(),
            key_value: entry.email,
            columns: vec![(PRINCIPAL_ID_COLUMN.to_string(), entry.principal_id)],
        }
    }
}

/// Number of batch requests needed for `entries` rows.
pub fn batches_needed(entries: usize, chunk_size: usize) -> usize {
    entries.div_ceil(chunk_size.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_utils::InMemoryStore;

    fn mappings(n: usize) -> Vec<EmailMapping> {
        (0..n)
            .map(|i| EmailMapping {
                email: format!("user{i}@example.com"),
                principal_id: format!("u:t:{i}"),
            })
            .collect()
    }

    #[tokio::test]
    async fn thirty_one_entries_take_two_batches() {
        let store = InMemoryStore::new();
        let migrator =
            BatchMigrator::new(&store, "PrincipalsByEmail".to_string(), DEFAULT_CHUNK_SIZE);

        let stats = migrator.migrate(mappings(31)).await.unwrap();

        assert_eq!(
            stats,
            MigrationStats {
                entries_written: 31,
                batches: 2
            }
        );
        assert_eq!(store.batch_sizes(), vec![30, 1]);
        assert_eq!(store.row_count(), 31);
    }

    #[tokio::test]
    async fn rows_keyed_by_email_with_principal_payload() {
        let store = InMemoryStore::new();
        let migrator = BatchMigrator::new(&store, "PrincipalsByEmail".to_string(), 30);

        migrator.migrate(mappings(1)).await.unwrap();

        assert_eq!(
            store.row("PrincipalsByEmail", "user0@example.com"),
            Some(vec![("principalId".to_string(), "u:t:0".to_string())])
        );
        let batches = store.batches.lock().unwrap();
        assert_eq!(batches[0][0].key_column, "email");
    }

    #[tokio::test]
    async fn empty_mapping_issues_no_batches() {
        let store = InMemoryStore::new();
        let migrator = BatchMigrator::new(&store, "PrincipalsByEmail".to_string(), 30);

        let stats = migrator.migrate(Vec::new()).await.unwrap();

        assert_eq!(stats, MigrationStats::default());
        assert!(store.batch_sizes().is_empty());
    }

    #[tokio::test]
    async fn failed_chunk_stops_and_keeps_earlier_chunks() {
        let store = InMemoryStore::new().failing_batch(2);
        let migrator = BatchMigrator::new(&store, "PrincipalsByEmail".to_string(), 10);

        let err = migrator.migrate(mappings(35)).await.unwrap_err();

        assert!(matches!(err, MigrationError::Batch { chunk: 2, .. }));
        // third and fourth chunks never attempted
        assert_eq!(store.batch_sizes(), vec![10, 10]);
        assert_eq!(store.row_count(), 10);
    }

    #[test]
    fn batches_needed_rounds_up() {
        assert_eq!(batches_needed(0, 30), 0);
        assert_eq!(batches_needed(30, 30), 1);
        assert_eq!(batches_needed(31, 30), 2);
        assert_eq!(batches_needed(90, 30), 3);
    }
}
