//! PostgreSQL store and lookups.
//!
//! # Responsibilities
//! - Run the configured lookup statements and turn rows into JSON maps
//! - Run the configured write statements inside one transaction per batch
//!
//! # Design Decisions
//! - Statements name the record keys they bind, in placeholder order, so
//!   the SQL can change without touching code
//! - Lookups read reference data through the pool, outside the batch
//!   transaction
//! - An update that touches no row fails the batch

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow, Postgres};
use sqlx::query::Query;
use sqlx::{Column, Row as _, Transaction, TypeInfo};

use crate::config::{DatabaseConfig, SqlStatement, StatementsConfig};
use crate::pipeline::error::{LookupError, PersistenceError};
use crate::pipeline::record::{EnrichedRecord, LookupResult, Row, ITEM_CODE, ITEM_ID, SUPPLIER_CODE};
use crate::pipeline::{BatchStore, BatchTransaction, LookupService};

/// Open a connection pool.
pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(url)
        .await?;
    tracing::info!(max_connections = config.max_connections, "Database pool ready");
    Ok(pool)
}

fn bind_statement<'q>(
    statement: &'q SqlStatement,
    values: &Row,
) -> Result<Query<'q, Postgres, PgArguments>, PersistenceError> {
    let mut query = sqlx::query(&statement.sql);
    for param in &statement.params {
        let value = values
            .get(param)
            .ok_or_else(|| PersistenceError::MissingField(param.clone()))?;
        query = bind_value(query, value);
    }
    Ok(query)
}

fn bind_value<'q>(query: Query<'q, Postgres, PgArguments>, value: &Value) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

fn row_to_json(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .map(|column| {
            let value = column_value(row, column.ordinal(), column.type_info().name());
            (column.name().to_string(), value)
        })
        .collect()
}

fn column_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    let value = match type_name {
        "INT2" => row.try_get::<Option<i16>, _>(index).map(|v| v.map(Value::from)),
        "INT4" => row.try_get::<Option<i32>, _>(index).map(|v| v.map(Value::from)),
        "INT8" => row.try_get::<Option<i64>, _>(index).map(|v| v.map(Value::from)),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)
            .map(|v| v.map(|f| Value::from(f64::from(f)))),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index).map(|v| v.map(Value::from)),
        "BOOL" => row.try_get::<Option<bool>, _>(index).map(|v| v.map(Value::from)),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)
            .map(|v| v.map(|d| Value::from(d.to_string()))),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)
            .map(|v| v.map(|t| Value::from(t.to_string()))),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
            .map(|v| v.map(|t| Value::from(t.to_rfc3339()))),
        _ => row.try_get::<Option<String>, _>(index).map(|v| v.map(Value::from)),
    };

    match value {
        Ok(Some(value)) => value,
        Ok(None) => Value::Null,
        Err(e) => {
            tracing::warn!(column = index, type_name, error = %e, "Unsupported column value, using null");
            Value::Null
        }
    }
}

/// Batch writes against PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    update_stock_level: SqlStatement,
    insert_shipment: SqlStatement,
}

impl PgStore {
    pub fn new(pool: PgPool, statements: &StatementsConfig) -> Self {
        Self {
            pool,
            update_stock_level: statements.update_stock_level.clone(),
            insert_shipment: statements.insert_shipment.clone(),
        }
    }
}

#[async_trait]
impl BatchStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn BatchTransaction>, PersistenceError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction {
            tx,
            update_stock_level: self.update_stock_level.clone(),
            insert_shipment: self.insert_shipment.clone(),
        }))
    }
}

struct PgTransaction {
    tx: Transaction<'static, Postgres>,
    update_stock_level: SqlStatement,
    insert_shipment: SqlStatement,
}

#[async_trait]
impl BatchTransaction for PgTransaction {
    async fn update_stock_level(&mut self, record: &EnrichedRecord) -> Result<(), PersistenceError> {
        let result = bind_statement(&self.update_stock_level, record.fields())?
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            let item = record.get(ITEM_ID).map(Value::to_string).unwrap_or_default();
            return Err(PersistenceError::MissingRow {
                table: "stock_level",
                key: format!("item_id {}", item),
            });
        }
        Ok(())
    }

    async fn insert_shipment(&mut self, record: &EnrichedRecord) -> Result<(), PersistenceError> {
        let result = bind_statement(&self.insert_shipment, record.fields())?
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(PersistenceError::Constraint("shipment insert affected no rows".to_string()));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), PersistenceError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), PersistenceError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// Supplier and item lookups against PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgLookups {
    pool: PgPool,
    select_supplier: SqlStatement,
    select_item: SqlStatement,
}

impl PgLookups {
    pub fn new(pool: PgPool, statements: &StatementsConfig) -> Self {
        Self {
            pool,
            select_supplier: statements.select_supplier.clone(),
            select_item: statements.select_item.clone(),
        }
    }

    async fn fetch(
        &self,
        lookup: &'static str,
        statement: &SqlStatement,
        key: &str,
        code: &str,
    ) -> Result<LookupResult, LookupError> {
        let values = Row::from([(key.to_string(), Value::from(code))]);
        let query = bind_statement(statement, &values).map_err(|e| LookupError::new(lookup, code, e))?;
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| LookupError::new(lookup, code, e))?;
        Ok(LookupResult::new(rows.iter().map(row_to_json).collect()))
    }
}

#[async_trait]
impl LookupService for PgLookups {
    async fn lookup_supplier(&self, supplier_code: &str) -> Result<LookupResult, LookupError> {
        self.fetch("supplier", &self.select_supplier, SUPPLIER_CODE, supplier_code)
            .await
    }

    async fn lookup_item(&self, item_code: &str) -> Result<LookupResult, LookupError> {
        self.fetch("item", &self.select_item, ITEM_CODE, item_code).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bind_requires_every_param() {
        let statements = StatementsConfig::default();
        let record = Row::from([("quantity".to_string(), json!(3))]);

        let result = bind_statement(&statements.update_stock_level, &record);
        assert!(matches!(result, Err(PersistenceError::MissingField(ref f)) if f == "itemId"));
    }

    #[test]
    fn test_bind_accepts_complete_record() {
        let statements = StatementsConfig::default();
        let record = Row::from([
            ("shipmentCode".to_string(), json!("SH-1")),
            ("supplierId".to_string(), json!(1)),
            ("itemId".to_string(), json!(2)),
            ("quantity".to_string(), json!(3)),
            ("shipmentDate".to_string(), json!("2024-01-02")),
            ("unused".to_string(), json!({"nested": true})),
        ]);

        assert!(bind_statement(&statements.insert_shipment, &record).is_ok());
    }
}
