//! Ingestion Pipeline
//!
//! Turns raw upstream rows into persisted samples, refreshes the
//! latest-value cache and fans the batch out to live subscribers.

mod pipeline;
mod resolver;
mod transform;

pub use pipeline::{BatchSink, IngestError, IngestReport, IngestionPipeline};
pub use resolver::SubjectResolver;
pub use transform::{transform, transform_batch, TransformSkip, TransformedBatch};
