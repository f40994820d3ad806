//! Annotation -> artifact export.
//!
//! - `validation`: gates that must all pass before anything is written
//! - `geometry`: canonical orientation and box clipping
//! - `raster`: 8/16-bit grayscale rasters (rotate, crop, invert, PNG)
//! - `fits`: header keys and the primary HDU writer (fitsio)
//! - `provenance`: the plain-text note next to each crop
//! - `pipeline`: validate, stage, swap and promote

pub mod fits;
pub mod geometry;
pub mod pipeline;
pub mod provenance;
pub mod raster;
pub mod validation;

pub use fits::{build_header, write_fits, CardValue, FitsHeader, FitsWriteError, HeaderCard};
pub use geometry::{canonical_orientation, clip_box, Orientation, PixelRect};
pub use pipeline::{export_plate, validate_request, ExportOptions, ExportReport, ExportRequest};
pub use provenance::provenance_note;
pub use raster::PlateRaster;
pub use validation::{object_label, validate_batch, IdentityFields};
