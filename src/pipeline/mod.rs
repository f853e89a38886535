//! Transactional batch-enrichment pipeline.
//!
//! # Data Flow
//! ```text
//! source.rs (inbox file → RawBatch)
//!     → batch.rs (one transaction per batch)
//!         → parser.rs (lines → SourceRecord)
//!         → fanout.rs (supplier + item lookups, concurrently)
//!         → merger.rs (base ← supplier rows ← item rows)
//!         → BatchTransaction (update stock level, insert shipment)
//!     → commit, or roll back everything
//! ```
//!
//! # Design Decisions
//! - Records are written strictly in file order; only lookups run in parallel
//! - No retries here: a failed batch is reported and its file set aside
//! - Lookup and store backends sit behind traits (`store` module)

pub mod batch;
pub mod error;
pub mod fanout;
pub mod merger;
pub mod parser;
pub mod record;
pub mod source;

pub use batch::{BatchPipeline, BatchStore, BatchTransaction};
pub use error::{LookupError, ParseError, PersistenceError, PipelineError};
pub use fanout::{EnrichmentFanout, LookupService};
pub use merger::AggregationMerger;
pub use parser::{parse_records, ParserOptions};
pub use record::{BatchReport, EnrichedRecord, LookupResult, RawBatch, Row, SourceRecord};
pub use source::{DirectorySource, DrainSummary};
