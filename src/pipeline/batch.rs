//! Transactional batch processing.
//!
//! # Data Flow
//! ```text
//! RawBatch
//!     → BatchStore::begin()
//!     → parse_records()
//!     → per record, in file order:
//!         EnrichmentFanout::enrich → update_stock_level → insert_shipment
//!     → commit()   (all records)
//!     └ rollback() (first failure, nothing from this batch remains)
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::observability::metrics;
use crate::pipeline::error::{PersistenceError, PipelineError};
use crate::pipeline::fanout::EnrichmentFanout;
use crate::pipeline::parser::{parse_records, ParserOptions};
use crate::pipeline::record::{BatchReport, EnrichedRecord, RawBatch};

/// Opens one transaction per batch.
#[async_trait]
pub trait BatchStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn BatchTransaction>, PersistenceError>;
}

/// Writes of one batch. Nothing is visible to other readers before `commit`.
#[async_trait]
pub trait BatchTransaction: Send {
    async fn update_stock_level(&mut self, record: &EnrichedRecord) -> Result<(), PersistenceError>;

    async fn insert_shipment(&mut self, record: &EnrichedRecord) -> Result<(), PersistenceError>;

    async fn commit(self: Box<Self>) -> Result<(), PersistenceError>;

    async fn rollback(self: Box<Self>) -> Result<(), PersistenceError>;
}

#[derive(Clone)]
pub struct BatchPipeline {
    fanout: EnrichmentFanout,
    store: Arc<dyn BatchStore>,
    parser: ParserOptions,
}

impl BatchPipeline {
    pub fn new(fanout: EnrichmentFanout, store: Arc<dyn BatchStore>, parser: ParserOptions) -> Self {
        Self { fanout, store, parser }
    }

    /// Persist every record of `batch`, or none of them.
    pub async fn process_batch(&self, batch: &RawBatch) -> Result<BatchReport, PipelineError> {
        let batch_id = Uuid::new_v4();
        tracing::info!(batch_id = %batch_id, name = %batch.name, "Processing batch");

        let mut tx = self
            .store
            .begin()
            .await
            .map_err(|e| PipelineError::persistence("begin", e))?;

        match self.write_records(tx.as_mut(), batch).await {
            Ok(records) => {
                tx.commit().await.map_err(|e| {
                    metrics::record_batch("failed", 0);
                    PipelineError::persistence("commit", e)
                })?;
                metrics::record_batch("committed", records);
                tracing::info!(batch_id = %batch_id, name = %batch.name, records, "Batch committed");
                Ok(BatchReport {
                    batch_id,
                    name: batch.name.clone(),
                    records,
                })
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::error!(batch_id = %batch_id, error = %rollback, "Rollback failed");
                }
                metrics::record_batch("rolled_back", 0);
                tracing::warn!(batch_id = %batch_id, name = %batch.name, error = %e, "Batch rolled back");
                Err(e)
            }
        }
    }

    async fn write_records(&self, tx: &mut dyn BatchTransaction, batch: &RawBatch) -> Result<usize, PipelineError> {
        let records = parse_records(&batch.content, &self.parser)?;

        for record in &records {
            let enriched = self.fanout.enrich(record).await?;
            tx.update_stock_level(&enriched)
                .await
                .map_err(|e| PipelineError::persistence(record.shipment_code.as_str(), e))?;
            tx.insert_shipment(&enriched)
                .await
                .map_err(|e| PipelineError::persistence(record.shipment_code.as_str(), e))?;
            tracing::debug!(shipment = %record.shipment_code, "Record persisted");
        }
        Ok(records.len())
    }
}
