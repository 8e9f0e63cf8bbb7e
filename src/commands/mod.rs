//! Stream operators.

pub mod aggregate;
pub mod cobble;
pub mod fusion;
pub mod ordered;
pub mod projection;
pub mod shuffle;
pub mod sort;
pub mod unroll;

pub use crate::validation::{verify_sorted, OrderValidator};
pub use aggregate::{AggregateRegistry, Aggregation};
pub use cobble::{cobble, CobbleCommand};
pub use fusion::{fusion, FusionCommand};
pub use ordered::{Ordered, StreamTransform};
pub use projection::{
    add_name_field, apply, concat_fields, copy, duplicate, map_chromosomes, reorder,
    score_threshold, select, split_field, Predicate, Selection, SplitMode,
};
pub use shuffle::{shuffled, ShuffleCommand};
pub use sort::{sorted_stream, SortCommand};
pub use unroll::{unroll, Region, Regions, UnrollCommand};
