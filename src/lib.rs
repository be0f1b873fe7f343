//! VALD line-list ingestion: fetch a raw dump, isolate and type its data
//! rows, split the compound species field, and persist both views in a
//! columnar store.

pub mod common;
pub mod observability;
pub mod pipeline;

// Re-export the types consumers and integration tests reach for.
pub use common::config::IngestConfig;
pub use common::error::{IngestError, Result};
pub use common::types::{
    ParsedLineRecord, ParsedLineTable, RawLineRecord, RawLineTable, PARSED_COLUMNS, RAW_COLUMNS,
};
pub use pipeline::ingestion::{fetch_source, FetchedPayload};
pub use pipeline::processing::vald::{extract_raw_table, ValdReader, VALD_URL};
pub use pipeline::storage::{LineStore, PARSED_TABLE, RAW_TABLE};
