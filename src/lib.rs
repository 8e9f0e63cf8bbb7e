// Clippy allows for the whole crate
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

//! gfstream: lazy, schema-aware streams of genomic features.
//!
//! A [`FeatureStream`] is a named list of fields plus a pull-based sequence
//! of records. Operators consume streams and return new lazy streams:
//! field projections, sorting, and interval algebra (fusion of overlapping
//! features, cobbling into disjoint fragments, per-base unrolling).
//!
//! # Features
//!
//! - **Streaming**: fusion, cobble and unroll hold O(1) or O(overlap) state
//! - **Schema-aware**: fields are addressed by name and resolved once
//! - **Order-preserving**: interval operators give back the caller's field order
//!
//! # Example
//!
//! ```rust
//! use gfstream::{rec, FeatureStream};
//! use gfstream::commands::FusionCommand;
//!
//! let stream = FeatureStream::from_rows(
//!     &["chr", "start", "end", "name"],
//!     vec![rec!["chr1", 10, 15, "A"], rec!["chr1", 13, 18, "B"]],
//! )
//! .unwrap();
//! let fused = FusionCommand::new().run(stream).unwrap();
//! assert_eq!(fused.collect_records().unwrap(), vec![rec!["chr1", 10, 18, "A|B"]]);
//! ```

pub mod bed;
pub mod commands;
pub mod config;
pub mod error;
pub mod genome;
pub mod record;
pub mod schema;
pub mod stream;
pub mod validation;

// Re-export commonly used types
pub use bed::{read_stream, BedReader, BedWriter};
pub use error::{FeatureError, Result};
pub use record::{Record, Value};
pub use schema::Schema;
pub use stream::{FeatureStream, MemorySource, RecordSource};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bed::{parse_stream, read_stream, BedReader, BedWriter};
    pub use crate::commands::{
        AggregateRegistry, Aggregation, CobbleCommand, FusionCommand, Ordered, SortCommand,
        UnrollCommand,
    };
    pub use crate::error::{FeatureError, Result};
    pub use crate::genome::{ChromTable, Genome};
    pub use crate::record::{Record, Value};
    pub use crate::schema::Schema;
    pub use crate::stream::FeatureStream;
}
