//! Validate -> stage -> swap -> promote.
//!
//! Artifacts for a plate are written into a hidden staging directory under
//! the output root. Only when every object has been written is the live
//! `<output root>/<plate file name>` directory replaced, and only after that
//! is the cache record saved and promoted. Any failure or cancellation before
//! the swap drops the staging directory and leaves the previous export and
//! the cache as they were. The swap is the commit point: once it starts, the
//! token is no longer consulted.
//!
//! Directories are keyed by the whole plate file name, the same key the
//! cache and the plate locks use, so `B12.tif` and `B12.png` never share an
//! export. Artifact names inside use the stem (`B12_Sirius.fits`).

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::fits::{build_header, write_fits};
use super::geometry::{clip_box, Orientation};
use super::provenance::provenance_note;
use super::raster::PlateRaster;
use super::validation::{object_label, validate_batch, IdentityFields};
use crate::error::ExportError;
use crate::storage::record_store::sync_dir;
use crate::storage::AnnotationCache;
use crate::types::{Annotation, FieldSpec, PlateId, PlateMetadata, PlateRecord};

/// Everything needed to export one plate.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub plate: PlateId,
    /// Path of the plate scan.
    pub plate_path: PathBuf,
    pub plate_metadata: PlateMetadata,
    pub annotations: Vec<Annotation>,
    pub schema: Vec<FieldSpec>,
    pub invert: bool,
}

/// Workspace-level export settings.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub output_root: PathBuf,
    pub identifier_field: String,
    pub suffix_field: String,
    pub provenance_footer: String,
}

impl ExportOptions {
    pub fn identity(&self) -> IdentityFields<'_> {
        IdentityFields {
            identifier: &self.identifier_field,
            suffix: &self.suffix_field,
        }
    }
}

/// What a successful export produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub plate: PlateId,
    pub output_dir: PathBuf,
    pub objects: usize,
    /// File names inside `output_dir`, in write order.
    pub artifacts: Vec<String>,
    pub rotated: bool,
}

/// Run the validation gates for a request.
pub fn validate_request(request: &ExportRequest, options: &ExportOptions) -> Result<(), ExportError> {
    let issues = validate_batch(
        &request.annotations,
        &request.plate_metadata,
        &request.schema,
        options.identity(),
    );
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ExportError::Validation(issues))
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), ExportError> {
    if cancel.is_cancelled() {
        Err(ExportError::Cancelled)
    } else {
        Ok(())
    }
}

fn sync_file(path: &Path) -> std::io::Result<()> {
    fs::File::open(path)?.sync_all()
}

/// Export a plate. Blocking; run it off the async executor.
pub fn export_plate(
    request: &ExportRequest,
    options: &ExportOptions,
    cache: &AnnotationCache,
    cancel: &CancellationToken,
) -> Result<ExportReport, ExportError> {
    validate_request(request, options)?;
    check_cancelled(cancel)?;

    let stem = request.plate.stem().to_string();
    let dir_name = request.plate.as_str();
    info!(plate = %request.plate, objects = request.annotations.len(), "export started");

    let raster = PlateRaster::open(&request.plate_path).map_err(|e| {
        ExportError::image(format!("reading plate {}", request.plate_path.display()), e)
    })?;
    let (raster, orientation) = raster.into_canonical();

    fs::create_dir_all(&options.output_root).map_err(|e| {
        ExportError::io(format!("creating output root {}", options.output_root.display()), e)
    })?;
    recover_interrupted_swap(&options.output_root, dir_name);

    let staging = tempfile::Builder::new()
        .prefix(&format!(".{dir_name}.staging-"))
        .tempdir_in(&options.output_root)
        .map_err(|e| ExportError::io("creating staging directory", e))?;

    let artifacts = stage_artifacts(request, options, &raster, staging.path(), &stem, cancel)?;

    check_cancelled(cancel)?;
    let live = options.output_root.join(dir_name);
    swap_into_place(staging, &live)?;

    let record = PlateRecord::new(
        request.plate.clone(),
        request.plate_metadata.clone(),
        request.annotations.clone(),
    );
    cache.save(&request.plate, &record)?;
    cache.promote(&request.plate)?;

    info!(
        plate = %request.plate,
        objects = request.annotations.len(),
        dir = %live.display(),
        "export finished"
    );
    Ok(ExportReport {
        plate: request.plate.clone(),
        output_dir: live,
        objects: request.annotations.len(),
        artifacts,
        rotated: orientation == Orientation::RotateClockwise,
    })
}

/// Write the plate copy and every object's artifacts into `staging`.
fn stage_artifacts(
    request: &ExportRequest,
    options: &ExportOptions,
    raster: &PlateRaster,
    staging: &Path,
    stem: &str,
    cancel: &CancellationToken,
) -> Result<Vec<String>, ExportError> {
    let mut artifacts = Vec::with_capacity(request.annotations.len() * 3 + 1);

    let original = staging.join(request.plate.as_str());
    if fs::hard_link(&request.plate_path, &original).is_err() {
        fs::copy(&request.plate_path, &original)
            .map_err(|e| ExportError::io(format!("copying plate {}", request.plate_path.display()), e))?;
    }
    artifacts.push(request.plate.as_str().to_string());

    let (width, height) = raster.dimensions();
    let identity = options.identity();

    for annotation in &request.annotations {
        check_cancelled(cancel)?;

        let rect = clip_box(&annotation.bbox, width, height);
        let mut crop = raster.crop(rect);
        if request.invert {
            crop.invert();
        }

        let (identifier, suffix) = identity.key_of(&annotation.metadata);
        let base = format!("{stem}_{}", object_label(&identifier, &suffix));

        let png = format!("{base}.png");
        let png_path = staging.join(&png);
        crop.save_png(&png_path)
            .map_err(|e| ExportError::image(format!("writing {png}"), e))?;
        sync_file(&png_path).map_err(|e| ExportError::io(format!("syncing {png}"), e))?;

        let fits = format!("{base}.fits");
        let header = build_header(&request.schema, &request.plate_metadata, &annotation.metadata);
        write_fits(&staging.join(&fits), &crop, &header)
            .map_err(|e| ExportError::fits(format!("writing {fits}"), e))?;

        let txt = format!("{base}.txt");
        let note = provenance_note(
            &request.plate_metadata,
            &annotation.metadata,
            &options.identifier_field,
            &options.provenance_footer,
        );
        let txt_path = staging.join(&txt);
        fs::write(&txt_path, note).map_err(|e| ExportError::io(format!("writing {txt}"), e))?;
        sync_file(&txt_path).map_err(|e| ExportError::io(format!("syncing {txt}"), e))?;

        debug!(plate = %request.plate, object = %base, x = rect.x, y = rect.y, w = rect.width, h = rect.height, "object staged");
        artifacts.extend([png, fits, txt]);
    }

    sync_dir(staging).map_err(|e| ExportError::io("syncing staging directory", e))?;
    Ok(artifacts)
}

fn previous_path(live: &Path) -> PathBuf {
    let name = live
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    live.with_file_name(format!(".{name}.previous"))
}

/// Restore or discard what a crash in the middle of a swap left behind.
fn recover_interrupted_swap(output_root: &Path, dir_name: &str) {
    let live = output_root.join(dir_name);
    let previous = previous_path(&live);
    if !previous.exists() {
        return;
    }
    let outcome = if live.exists() {
        fs::remove_dir_all(&previous)
    } else {
        fs::rename(&previous, &live)
    };
    if let Err(e) = outcome {
        warn!(dir = %previous.display(), error = %e, "could not clean up interrupted export swap");
    }
}

#[cfg(unix)]
fn make_shareable(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_shareable(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Replace `live` with the staged directory. On failure the previous
/// export is put back.
fn swap_into_place(staging: TempDir, live: &Path) -> Result<(), ExportError> {
    let root = live.parent().unwrap_or_else(|| Path::new("."));
    let previous = previous_path(live);

    make_shareable(staging.path()).map_err(|e| ExportError::io("setting export permissions", e))?;

    let had_live = live.exists();
    if had_live {
        fs::rename(live, &previous)
            .map_err(|e| ExportError::io(format!("moving aside {}", live.display()), e))?;
    }

    let staged = staging.keep();
    if let Err(e) = fs::rename(&staged, live) {
        if had_live {
            if let Err(restore) = fs::rename(&previous, live) {
                warn!(dir = %live.display(), error = %restore, "failed to restore previous export");
            }
        }
        if let Err(cleanup) = fs::remove_dir_all(&staged) {
            warn!(dir = %staged.display(), error = %cleanup, "failed to remove staging directory");
        }
        return Err(ExportError::io(format!("installing {}", live.display()), e));
    }

    if had_live {
        if let Err(e) = fs::remove_dir_all(&previous) {
            warn!(dir = %previous.display(), error = %e, "failed to remove previous export");
        }
    }
    sync_dir(root).map_err(|e| ExportError::io(format!("syncing {}", root.display()), e))
}
