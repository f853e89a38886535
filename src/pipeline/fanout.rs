//! Parallel lookups per record.
//!
//! # Design Decisions
//! - Both lookups are keyed by the record's original codes, never by each
//!   other's results, so they can run concurrently
//! - Nothing is merged unless both lookups succeed

use std::sync::Arc;

use async_trait::async_trait;

use crate::pipeline::error::{LookupError, PipelineError};
use crate::pipeline::merger::AggregationMerger;
use crate::pipeline::record::{EnrichedRecord, LookupResult, SourceRecord};

/// Reference data the pipeline enriches records with.
#[async_trait]
pub trait LookupService: Send + Sync {
    async fn lookup_supplier(&self, supplier_code: &str) -> Result<LookupResult, LookupError>;

    async fn lookup_item(&self, item_code: &str) -> Result<LookupResult, LookupError>;
}

#[derive(Clone)]
pub struct EnrichmentFanout {
    lookups: Arc<dyn LookupService>,
}

impl EnrichmentFanout {
    pub fn new(lookups: Arc<dyn LookupService>) -> Self {
        Self { lookups }
    }

    pub async fn enrich(&self, record: &SourceRecord) -> Result<EnrichedRecord, PipelineError> {
        let (supplier, item) = tokio::try_join!(
            self.lookups.lookup_supplier(&record.supplier_code),
            self.lookups.lookup_item(&record.item_code),
        )
        .map_err(|source| PipelineError::EnrichmentFailure {
            shipment: record.shipment_code.clone(),
            source,
        })?;

        tracing::trace!(
            shipment = %record.shipment_code,
            supplier_rows = supplier.rows().len(),
            item_rows = item.rows().len(),
            "Lookups completed"
        );
        Ok(AggregationMerger::merge(record.base(), &[supplier, item]))
    }
}
