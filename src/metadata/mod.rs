//! Metadata derivation
//!
//! Operators enter a handful of fields per object (OBJECT, DATE-OBS, UT) and
//! the plate's OBSERVAT. The engine resolves the object once against the
//! catalog, then runs a fixed table of updaters; each one fires only when all
//! of its inputs are present and writes its outputs back into the same map,
//! where later updaters can pick them up.

mod engine;
mod updaters;

pub use engine::{run_updaters, DeriveOutcome, MetadataEngine};
pub use updaters::{ComputeFn, FieldUpdater, UpdateOutcome, UpdaterContext, UPDATERS};
