//! Shared data structures for plate digitization
//!
//! - `metadata`: header field values, ordered field maps, export field schema
//! - `annotation`: plate identity, boxes, annotation records and cache states

mod annotation;
mod metadata;

pub use annotation::*;
pub use metadata::*;
