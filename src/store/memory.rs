//! In-memory store and lookup tables.
//!
//! # Design Decisions
//! - Writes are staged in the transaction and applied under one lock on
//!   commit, so a batch is all-or-nothing for readers too
//! - Stock rows must exist before a batch adds to them
//! - Shipment codes are unique, like the relational schema's key

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::pipeline::error::{LookupError, PersistenceError};
use crate::pipeline::record::{EnrichedRecord, LookupResult, Row, ITEM_ID, QUANTITY, SHIPMENT_CODE};
use crate::pipeline::{BatchStore, BatchTransaction, LookupService};

#[derive(Debug, Default)]
struct Tables {
    stock_levels: HashMap<i64, i64>,
    shipments: Vec<EnrichedRecord>,
}

/// Transactional store kept in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a stock row.
    pub fn with_stock(self, item_id: i64, quantity: i64) -> Self {
        self.lock().stock_levels.insert(item_id, quantity);
        self
    }

    pub fn stock_level(&self, item_id: i64) -> Option<i64> {
        self.lock().stock_levels.get(&item_id).copied()
    }

    /// Committed shipments in insertion order.
    pub fn shipments(&self) -> Vec<EnrichedRecord> {
        self.lock().shipments.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl BatchStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn BatchTransaction>, PersistenceError> {
        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            stock_deltas: Vec::new(),
            shipments: Vec::new(),
            staged_codes: HashSet::new(),
        }))
    }
}

struct MemoryTransaction {
    store: MemoryStore,
    stock_deltas: Vec<(i64, i64)>,
    shipments: Vec<EnrichedRecord>,
    staged_codes: HashSet<String>,
}

fn require_i64(record: &EnrichedRecord, key: &str) -> Result<i64, PersistenceError> {
    record
        .get_i64(key)
        .ok_or_else(|| PersistenceError::MissingField(key.to_string()))
}

#[async_trait]
impl BatchTransaction for MemoryTransaction {
    async fn update_stock_level(&mut self, record: &EnrichedRecord) -> Result<(), PersistenceError> {
        let item_id = require_i64(record, ITEM_ID)?;
        let quantity = require_i64(record, QUANTITY)?;

        if !self.store.lock().stock_levels.contains_key(&item_id) {
            return Err(PersistenceError::MissingRow {
                table: "stock_level",
                key: format!("item_id {}", item_id),
            });
        }
        self.stock_deltas.push((item_id, quantity));
        Ok(())
    }

    async fn insert_shipment(&mut self, record: &EnrichedRecord) -> Result<(), PersistenceError> {
        let code = record
            .get_str(SHIPMENT_CODE)
            .ok_or_else(|| PersistenceError::MissingField(SHIPMENT_CODE.to_string()))?
            .to_string();

        let committed = self
            .store
            .lock()
            .shipments
            .iter()
            .any(|s| s.get_str(SHIPMENT_CODE) == Some(code.as_str()));
        if committed || !self.staged_codes.insert(code.clone()) {
            return Err(PersistenceError::Constraint(format!("duplicate shipment code '{}'", code)));
        }
        self.shipments.push(record.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), PersistenceError> {
        let MemoryTransaction {
            store,
            stock_deltas,
            shipments,
            ..
        } = *self;
        let mut tables = store.lock();
        for (item_id, quantity) in stock_deltas {
            *tables.stock_levels.entry(item_id).or_insert(0) += quantity;
        }
        tables.shipments.extend(shipments);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), PersistenceError> {
        Ok(())
    }
}

/// Supplier and item tables keyed by code.
#[derive(Debug, Clone, Default)]
pub struct MemoryLookups {
    suppliers: HashMap<String, Vec<Row>>,
    items: HashMap<String, Vec<Row>>,
    failing: HashSet<String>,
    supplier_latency: Duration,
    item_latency: Duration,
}

impl MemoryLookups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_supplier(mut self, code: &str, id: i64) -> Self {
        self.suppliers.insert(code.to_string(), vec![id_row("supplierId", id)]);
        self
    }

    pub fn with_item(mut self, code: &str, id: i64) -> Self {
        self.items.insert(code.to_string(), vec![id_row(ITEM_ID, id)]);
        self
    }

    /// Answer `code` in the supplier table with arbitrary rows.
    pub fn with_supplier_rows(mut self, code: &str, rows: Vec<Row>) -> Self {
        self.suppliers.insert(code.to_string(), rows);
        self
    }

    /// Answer `code` in the item table with arbitrary rows.
    pub fn with_item_rows(mut self, code: &str, rows: Vec<Row>) -> Self {
        self.items.insert(code.to_string(), rows);
        self
    }

    /// Make lookups of `code` (supplier or item) fail.
    pub fn failing(mut self, code: &str) -> Self {
        self.failing.insert(code.to_string());
        self
    }

    /// Delay every lookup, to observe concurrency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.supplier_latency = latency;
        self.item_latency = latency;
        self
    }

    /// Delay supplier lookups only.
    pub fn with_supplier_latency(mut self, latency: Duration) -> Self {
        self.supplier_latency = latency;
        self
    }

    /// Delay item lookups only.
    pub fn with_item_latency(mut self, latency: Duration) -> Self {
        self.item_latency = latency;
        self
    }

    async fn find(
        &self,
        lookup: &'static str,
        table: &HashMap<String, Vec<Row>>,
        latency: Duration,
        code: &str,
    ) -> Result<LookupResult, LookupError> {
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.failing.contains(code) {
            return Err(LookupError::new(lookup, code, "lookup table unavailable"));
        }
        Ok(table.get(code).cloned().map(LookupResult::new).unwrap_or_default())
    }
}

fn id_row(column: &str, id: i64) -> Row {
    Row::from([(column.to_string(), Value::from(id))])
}

#[async_trait]
impl LookupService for MemoryLookups {
    async fn lookup_supplier(&self, supplier_code: &str) -> Result<LookupResult, LookupError> {
        self.find("supplier", &self.suppliers, self.supplier_latency, supplier_code).await
    }

    async fn lookup_item(&self, item_code: &str) -> Result<LookupResult, LookupError> {
        self.find("item", &self.items, self.item_latency, item_code).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(code: &str, item_id: i64, quantity: i64) -> EnrichedRecord {
        EnrichedRecord::from(Row::from([
            (SHIPMENT_CODE.to_string(), json!(code)),
            (ITEM_ID.to_string(), json!(item_id)),
            (QUANTITY.to_string(), json!(quantity)),
        ]))
    }

    #[tokio::test]
    async fn test_writes_invisible_until_commit() {
        let store = MemoryStore::new().with_stock(1, 10);
        let mut tx = store.begin().await.unwrap();

        tx.update_stock_level(&record("SH-1", 1, 5)).await.unwrap();
        tx.insert_shipment(&record("SH-1", 1, 5)).await.unwrap();
        assert_eq!(store.stock_level(1), Some(10));
        assert!(store.shipments().is_empty());

        tx.commit().await.unwrap();
        assert_eq!(store.stock_level(1), Some(15));
        assert_eq!(store.shipments().len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_discards() {
        let store = MemoryStore::new().with_stock(1, 10);
        let mut tx = store.begin().await.unwrap();
        tx.update_stock_level(&record("SH-1", 1, 5)).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.stock_level(1), Some(10));
    }

    #[tokio::test]
    async fn test_missing_stock_row_fails() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let err = tx.update_stock_level(&record("SH-1", 7, 1)).await.unwrap_err();
        assert!(matches!(err, PersistenceError::MissingRow { .. }));

        let mut incomplete = record("SH-2", 7, 1);
        incomplete.insert(ITEM_ID, Value::Null);
        let err = tx.update_stock_level(&incomplete).await.unwrap_err();
        assert!(matches!(err, PersistenceError::MissingField(ref f) if f == ITEM_ID));
    }

    #[tokio::test]
    async fn test_unknown_code_is_empty_result() {
        let lookups = MemoryLookups::new().with_supplier("SUP-1", 3);

        assert!(lookups.lookup_supplier("SUP-404").await.unwrap().is_empty());
        let found = lookups.lookup_supplier("SUP-1").await.unwrap();
        assert_eq!(found.rows()[0]["supplierId"], json!(3));
    }
}
