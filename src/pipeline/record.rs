//! Batch record types.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// One lookup row: column name → value.
pub type Row = BTreeMap<String, Value>;

pub const SHIPMENT_CODE: &str = "shipmentCode";
pub const SUPPLIER_CODE: &str = "supplierCode";
pub const ITEM_CODE: &str = "itemCode";
pub const QUANTITY: &str = "quantity";
pub const SHIPMENT_DATE: &str = "shipmentDate";
pub const SUPPLIER_ID: &str = "supplierId";
pub const ITEM_ID: &str = "itemId";

/// One parsed line of a batch file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub shipment_code: String,
    pub supplier_code: String,
    pub item_code: String,
    pub quantity: u32,
    pub shipment_date: NaiveDate,
}

impl SourceRecord {
    /// The record as a field map, before any lookup result is merged in.
    pub fn base(&self) -> EnrichedRecord {
        let mut record = EnrichedRecord::default();
        record.insert(SHIPMENT_CODE, Value::from(self.shipment_code.as_str()));
        record.insert(SUPPLIER_CODE, Value::from(self.supplier_code.as_str()));
        record.insert(ITEM_CODE, Value::from(self.item_code.as_str()));
        record.insert(QUANTITY, Value::from(self.quantity));
        record.insert(
            SHIPMENT_DATE,
            Value::from(self.shipment_date.format("%Y-%m-%d").to_string()),
        );
        record
    }
}

/// A record extended with lookup results, ready to persist.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EnrichedRecord {
    fields: Row,
}

impl EnrichedRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Set `key`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    pub fn fields(&self) -> &Row {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }
}

impl From<Row> for EnrichedRecord {
    fn from(fields: Row) -> Self {
        Self { fields }
    }
}

/// Rows returned by one lookup, in the order the lookup produced them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupResult {
    rows: Vec<Row>,
}

impl LookupResult {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The unparsed content of one batch file.
#[derive(Debug, Clone)]
pub struct RawBatch {
    pub name: String,
    pub content: String,
}

impl RawBatch {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Summary of a committed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub name: String,
    pub records: usize,
}
