use super::{PrincipalPage, PrincipalStore, UpsertOp};
use crate::types::Principal;
use anyhow::{Context, Result};
use aws_sdk_dynamodb::{
    Client,
    types::{AttributeValue, Put, TransactWriteItem},
};
use std::collections::HashMap;

/// DynamoDB caps `TransactWriteItems` at this many operations.
pub const MAX_TRANSACTION_ITEMS: usize = 100;

// ============================================================================
// DynamoStore — DynamoDB-backed PrincipalStore implementation
// ============================================================================

pub struct DynamoStore {
    client: Client,
    principals_table: String,
}

impl DynamoStore {
    pub fn new(client: Client, principals_table: String) -> Self {
        Self {
            client,
            principals_table,
        }
    }
}

impl PrincipalStore for DynamoStore {
    type Cursor = HashMap<String, AttributeValue>;

    async fn scan_principals(
        &self,
        fields: &[&str],
        page_size: usize,
        cursor: Option<Self::Cursor>,
    ) -> Result<PrincipalPage<Self::Cursor>> {
        let (projection, names) = projection(fields);
        let limit = i32::try_from(page_size).context("Scan page size out of range")?;

        let output = self
            .client
            .scan()
            .table_name(&self.principals_table)
            .projection_expression(projection)
            .set_expression_attribute_names(Some(names))
            .limit(limit)
            .set_exclusive_start_key(cursor)
            .send()
            .await
            .context("Failed to scan principals")?;

        let principals = output
            .items
            .unwrap_or_default()
            .into_iter()
            .map(principal_from_item)
            .collect::<Result<Vec<_>>>()?;

        Ok(PrincipalPage {
            principals,
            next: output.last_evaluated_key.filter(|key| !key.is_empty()),
        })
    }

    async fn batch_upsert(&self, ops: &[UpsertOp]) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }
        anyhow::ensure!(
            ops.len() <= MAX_TRANSACTION_ITEMS,
            "Batch of {} exceeds the {} item transaction limit",
            ops.len(),
            MAX_TRANSACTION_ITEMS
        );

        let items = ops
            .iter()
            .map(transact_put)
            .collect::<Result<Vec<_>>>()?;

        self.client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await
            .context("Failed to write email index batch")?;

        Ok(())
    }
}

// ============================================================================
// Serialization helpers
// ============================================================================

/// Alias every field through `#fN` so reserved words are safe in the
/// projection.
fn projection(fields: &[&str]) -> (String, HashMap<String, String>) {
    let names: HashMap<String, String> = fields
        .iter()
        .enumerate()
        .map(|(i, field)| (format!("#f{i}"), field.to_string()))
        .collect();
    let expression = (0..fields.len())
        .map(|i| format!("#f{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    (expression, names)
}

fn transact_put(op: &UpsertOp) -> Result<TransactWriteItem> {
    let mut item = HashMap::from([(
        op.key_column.clone(),
        AttributeValue::S(op.key_value.clone()),
    )]);
    for (column, value) in &op.columns {
        item.insert(column.clone(), AttributeValue::S(value.clone()));
    }

    let put = Put::builder()
        .table_name(&op.table)
        .set_item(Some(item))
        .build()
        .context("Failed to build put request")?;

    Ok(TransactWriteItem::builder().put(put).build())
}

pub(crate) fn principal_from_item(item: HashMap<String, AttributeValue>) -> Result<Principal> {
    let principal_id = item
        .get("principalId")
        .and_then(|v| v.as_s().ok())
        .ok_or_else(|| anyhow::anyhow!("Missing principalId field"))?
        .to_string();

    let display_name = item
        .get("displayName")
        .and_then(|v| v.as_s().ok())
        .cloned()
        .unwrap_or_default();

    let email = item.get("email").and_then(|v| v.as_s().ok()).cloned();

    Ok(Principal {
        principal_id,
        display_name,
        email,
    })
}

// ============================================================================
// Tests — DynamoDB serialization helpers (no network required)
// ============================================================================
