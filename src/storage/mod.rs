use crate::types::Principal;
use anyhow::Result;

pub mod dynamo;
pub use dynamo::DynamoStore;

/// Fields the validator needs from each principal.
pub const PRINCIPAL_FIELDS: &[&str] = &["principalId", "displayName", "email"];

// ============================================================================
// Store trait
// ============================================================================

/// One bounded page of a full-table scan. `next` is `None` on the last page.
#[derive(Debug)]
pub struct PrincipalPage<C> {
    pub principals: Vec<Principal>,
    pub next: Option<C>,
}

/// Insert-or-update of a single row, keyed by one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOp {
    pub table: String,
    pub key_column: String,
    pub key_value: String,
    pub columns: Vec<(String, String)>,
}

#[allow(async_fn_in_trait)]
pub trait PrincipalStore: Send + Sync {
    /// Opaque position to resume a scan from.
    type Cursor: Send;

    /// Fetch the page after `cursor` (the first page when `None`), reading
    /// only `fields` and at most `page_size` records.
    async fn scan_principals(
        &self,
        fields: &[&str],
        page_size: usize,
        cursor: Option<Self::Cursor>,
    ) -> Result<PrincipalPage<Self::Cursor>>;

    /// Apply every op in one atomic request. Either all rows land or the
    /// whole batch fails.
    async fn batch_upsert(&self, ops: &[UpsertOp]) -> Result<()>;
}

// ============================================================================
// Test utilities — InMemoryStore for in-crate tests
// ============================================================================
