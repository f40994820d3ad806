//! End-to-end export tests: validation gates, artifacts on disk, staged
//! replacement of earlier exports and cache promotion.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fitsio::compat::fitsfile::FitsFile;
use fitsio::compat::images::ReadImage;
use image::{GrayImage, Luma};
use tokio_util::sync::CancellationToken;

use plate_digitizer::config::{defaults, DigitizerConfig};
use plate_digitizer::error::{Error, ExportError, ValidationRule};
use plate_digitizer::export::{export_plate, ExportOptions, ExportRequest};
use plate_digitizer::lookup::StaticCatalog;
use plate_digitizer::storage::AnnotationCache;
use plate_digitizer::{
    Annotation, AnnotationState, BoundingBox, ObservationMetadata, PlateId, PlateMetadata, PlateService,
};

// ============================================================================
// Fixtures
// ============================================================================

struct Workspace {
    _dir: tempfile::TempDir,
    root: PathBuf,
    cache: AnnotationCache,
    options: ExportOptions,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let cache = AnnotationCache::open(&root.join("cache"), &["png".to_string()]).unwrap();
        let options = ExportOptions {
            output_root: root.join("output"),
            identifier_field: "OBJECT".to_string(),
            suffix_field: "SUFFIX".to_string(),
            provenance_footer: "Plate recovery project.".to_string(),
        };
        Self {
            _dir: dir,
            root,
            cache,
            options,
        }
    }

    /// Write a gradient plate, pixel value x + 5y.
    fn plate(&self, name: &str, width: u32, height: u32) -> PathBuf {
        let path = self.root.join(name);
        GrayImage::from_fn(width, height, |x, y| Luma([(x + 5 * y) as u8]))
            .save(&path)
            .unwrap();
        path
    }

    fn request(&self, plate_path: &Path, annotations: Vec<Annotation>) -> ExportRequest {
        ExportRequest {
            plate: PlateId::parse(&plate_path.to_string_lossy()).unwrap(),
            plate_path: plate_path.to_path_buf(),
            plate_metadata: plate_metadata(),
            annotations,
            schema: defaults::legacy_schema(),
            invert: false,
        }
    }

    fn export(&self, request: &ExportRequest) -> Result<plate_digitizer::export::ExportReport, ExportError> {
        export_plate(request, &self.options, &self.cache, &CancellationToken::new())
    }

    fn output_entries(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.options.output_root) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

fn plate_metadata() -> PlateMetadata {
    [
        ("OBSERVAT", "oalp: La Plata"),
        ("PLATE-N", "B-1021"),
        ("SCANNER", "Epson Expression 10000XL"),
    ]
    .into_iter()
    .collect()
}

fn object(name: &str, x: f64, y: f64, w: f64, h: f64) -> Annotation {
    let metadata: ObservationMetadata = [("OBJECT", name), ("DATE-OBS", "1962-11-03")].into_iter().collect();
    Annotation {
        bbox: BoundingBox::new(x, y, w, h),
        metadata,
    }
}

fn sorted_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn fits_text(path: &Path, key: &str) -> String {
    let fptr = FitsFile::open(path).unwrap();
    let hdu = fptr.hdu(0).unwrap();
    hdu.read_key::<String>(&fptr, key).unwrap().trim_end().to_string()
}

fn fits_int(path: &Path, key: &str) -> i64 {
    let fptr = FitsFile::open(path).unwrap();
    let hdu = fptr.hdu(0).unwrap();
    hdu.read_key::<i64>(&fptr, key).unwrap()
}

fn fits_pixels(path: &Path) -> Vec<f64> {
    let fptr = FitsFile::open(path).unwrap();
    let hdu = fptr.hdu(0).unwrap();
    f64::read_image(&fptr, &hdu).unwrap()
}

// ============================================================================
// Happy path
// ============================================================================

#[test]
fn test_two_boxes_produce_two_of_each_artifact_and_save_the_cache() {
    let ws = Workspace::new();
    let plate_path = ws.plate("plate_1.png", 40, 30);
    let request = ws.request(
        &plate_path,
        vec![object("Sirius", 2.0, 2.0, 10.0, 8.0), object("Vega", 20.0, 10.0, 8.0, 8.0)],
    );

    let report = ws.export(&request).unwrap();
    assert_eq!(report.objects, 2);
    assert!(!report.rotated);
    assert_eq!(report.output_dir, ws.options.output_root.join("plate_1.png"));

    assert_eq!(
        sorted_files(&report.output_dir),
        [
            "plate_1.png",
            "plate_1_Sirius.fits",
            "plate_1_Sirius.png",
            "plate_1_Sirius.txt",
            "plate_1_Vega.fits",
            "plate_1_Vega.png",
            "plate_1_Vega.txt",
        ]
    );
    // Nothing but the live directory is left in the output root.
    assert_eq!(ws.output_entries(), ["plate_1.png"]);

    let crop = image::open(report.output_dir.join("plate_1_Sirius.png")).unwrap().to_luma8();
    assert_eq!(crop.dimensions(), (10, 8));
    assert_eq!(crop.get_pixel(0, 0).0[0], 2 + 5 * 2);

    let fits = report.output_dir.join("plate_1_Sirius.fits");
    assert_eq!(fits_int(&fits, "BITPIX"), 8);
    assert_eq!(fits_int(&fits, "NAXIS1"), 10);
    assert_eq!(fits_int(&fits, "NAXIS2"), 8);
    assert_eq!(fits_text(&fits, "OBJECT"), "Sirius");
    assert_eq!(fits_text(&fits, "PLATE-N"), "B-1021");
    let pixels = fits_pixels(&fits);
    assert_eq!(pixels.len(), 80);
    assert_eq!(pixels[0], f64::from(2 + 5 * 2));

    let note = fs::read_to_string(report.output_dir.join("plate_1_Vega.txt")).unwrap();
    assert!(note.contains("B-1021"));
    assert!(note.contains("Vega"));
    assert!(note.trim_end().ends_with("Plate recovery project."));

    let entry = ws.cache.load(&request.plate).unwrap();
    assert_eq!(entry.state, AnnotationState::Saved);
    assert_eq!(entry.record.unwrap().annotations.len(), 2);
    let working = ws.cache.record_path(AnnotationState::Working, &request.plate).unwrap();
    assert!(!working.exists());
}

#[test]
fn test_suffix_disambiguates_repeated_identifier() {
    let ws = Workspace::new();
    let plate_path = ws.plate("plate_2.png", 40, 30);
    let mut second = object("Sirius", 20.0, 10.0, 8.0, 8.0);
    second.metadata.set("SUFFIX", "b");
    let request = ws.request(&plate_path, vec![object("Sirius", 0.0, 0.0, 5.0, 5.0), second]);

    let report = ws.export(&request).unwrap();
    let files = sorted_files(&report.output_dir);
    assert!(files.contains(&"plate_2_Sirius.fits".to_string()));
    assert!(files.contains(&"plate_2_Sirius_b.fits".to_string()));
}

#[test]
fn test_re_export_after_edit_removes_stale_artifacts() {
    let ws = Workspace::new();
    let plate_path = ws.plate("plate_3.png", 40, 30);
    ws.export(&ws.request(
        &plate_path,
        vec![object("Sirius", 2.0, 2.0, 10.0, 8.0), object("Vega", 20.0, 10.0, 8.0, 8.0)],
    ))
    .unwrap();

    let report = ws
        .export(&ws.request(
            &plate_path,
            vec![object("Sirius", 2.0, 2.0, 10.0, 8.0), object("Rigel", 20.0, 10.0, 8.0, 8.0)],
        ))
        .unwrap();

    let files = sorted_files(&report.output_dir);
    assert!(files.iter().any(|f| f.starts_with("plate_3_Rigel")));
    assert!(!files.iter().any(|f| f.starts_with("plate_3_Vega")), "{files:?}");
    assert_eq!(ws.output_entries(), ["plate_3.png"]);
}

#[test]
fn test_portrait_plate_is_rotated_and_boxes_use_rotated_frame() {
    let ws = Workspace::new();
    let plate_path = ws.plate("tall.png", 30, 40);
    let mut request = ws.request(&plate_path, vec![object("Sirius", 0.0, 0.0, 100.0, 100.0)]);
    request.invert = true;

    let report = ws.export(&request).unwrap();
    assert!(report.rotated);

    let crop = image::open(report.output_dir.join("tall_Sirius.png")).unwrap().to_luma8();
    assert_eq!(crop.dimensions(), (40, 30));
    // Clockwise rotation puts the source's bottom-left pixel (0, 39) at the
    // top-left; it is then inverted.
    assert_eq!(crop.get_pixel(0, 0).0[0], 255 - (5 * 39) as u8);
}

#[test]
fn test_plates_sharing_a_stem_keep_separate_exports() {
    let ws = Workspace::new();
    let png = ws.plate("B12.png", 40, 30);
    let tif = ws.plate("B12.tif", 40, 30);

    let png_request = ws.request(&png, vec![object("Sirius", 2.0, 2.0, 10.0, 8.0)]);
    let tif_request = ws.request(&tif, vec![object("Vega", 2.0, 2.0, 10.0, 8.0)]);
    let png_report = ws.export(&png_request).unwrap();
    let tif_report = ws.export(&tif_request).unwrap();

    assert_eq!(ws.output_entries(), ["B12.png", "B12.tif"]);
    assert_eq!(
        sorted_files(&png_report.output_dir),
        ["B12.png", "B12_Sirius.fits", "B12_Sirius.png", "B12_Sirius.txt"]
    );
    assert_eq!(
        sorted_files(&tif_report.output_dir),
        ["B12.tif", "B12_Vega.fits", "B12_Vega.png", "B12_Vega.txt"]
    );
    assert_eq!(ws.cache.load(&png_request.plate).unwrap().state, AnnotationState::Saved);
    assert_eq!(ws.cache.load(&tif_request.plate).unwrap().state, AnnotationState::Saved);
}

// ============================================================================
// Validation gates
// ============================================================================

#[test]
fn test_duplicate_identifiers_write_nothing() {
    let ws = Workspace::new();
    let plate_path = ws.plate("plate_4.png", 40, 30);
    let request = ws.request(
        &plate_path,
        vec![object("Sirius", 0.0, 0.0, 5.0, 5.0), object("Sirius", 10.0, 10.0, 5.0, 5.0)],
    );

    let err = ws.export(&request).unwrap_err();
    let issues = err.issues().unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].rule, ValidationRule::DuplicateIdentifier);
    assert!(issues[0].subject.contains("#1 and #2"));

    assert!(ws.output_entries().is_empty());
    assert_eq!(ws.cache.load(&request.plate).unwrap().state, AnnotationState::None);
}

#[test]
fn test_non_ascii_fields_are_reported_by_name() {
    let ws = Workspace::new();
    let plate_path = ws.plate("plate_5.png", 40, 30);
    let mut request = ws.request(&plate_path, vec![object("Sirius", 0.0, 0.0, 5.0, 5.0)]);
    request.plate_metadata.set("OBSERVER", "Pérez");
    request.annotations[0].metadata.set("IMAGETYP", "Objeto ñ");

    let err = ws.export(&request).unwrap_err();
    let subjects: Vec<_> = err.issues().unwrap().iter().map(|i| i.subject.as_str()).collect();
    assert_eq!(subjects, ["plate field OBSERVER", "object #1 field IMAGETYP"]);
    assert!(ws.output_entries().is_empty());
}

#[test]
fn test_missing_identifier_and_illegal_characters_are_collected_together() {
    let ws = Workspace::new();
    let plate_path = ws.plate("plate_6.png", 40, 30);
    let mut nameless = object("", 0.0, 0.0, 5.0, 5.0);
    nameless.metadata.remove("OBJECT");
    let request = ws.request(&plate_path, vec![nameless, object("HD 1/2", 5.0, 5.0, 5.0, 5.0)]);

    let err = ws.export(&request).unwrap_err();
    let rules: Vec<_> = err.issues().unwrap().iter().map(|i| i.rule).collect();
    assert_eq!(rules, [ValidationRule::MissingIdentifier, ValidationRule::IllegalCharacter]);
}

// ============================================================================
// Cancellation
// ============================================================================

#[test]
fn test_cancelled_export_keeps_previous_export_and_working_record() {
    let ws = Workspace::new();
    let plate_path = ws.plate("plate_7.png", 40, 30);
    let first = ws.request(&plate_path, vec![object("Sirius", 2.0, 2.0, 10.0, 8.0)]);
    ws.export(&first).unwrap();

    let edited = ws.request(&plate_path, vec![object("Vega", 2.0, 2.0, 10.0, 8.0)]);
    let record = plate_digitizer::PlateRecord::new(
        edited.plate.clone(),
        edited.plate_metadata.clone(),
        edited.annotations.clone(),
    );
    ws.cache.save(&edited.plate, &record).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = export_plate(&edited, &ws.options, &ws.cache, &cancel).unwrap_err();
    assert!(matches!(err, ExportError::Cancelled));

    let live = ws.options.output_root.join("plate_7.png");
    assert!(live.join("plate_7_Sirius.png").exists());
    assert!(!live.join("plate_7_Vega.png").exists());
    assert_eq!(ws.output_entries(), ["plate_7.png"]);

    let entry = ws.cache.load(&edited.plate).unwrap();
    assert_eq!(entry.state, AnnotationState::Working);
    assert_eq!(entry.record.unwrap().annotations[0].metadata.text("OBJECT").as_deref(), Some("Vega"));
}

// ============================================================================
// Through the service
// ============================================================================

fn service(root: &Path) -> PlateService {
    PlateService::new(DigitizerConfig::for_workspace(root), Arc::new(StaticCatalog::new())).unwrap()
}

#[tokio::test]
async fn test_export_from_cache_promotes_working_record() {
    let ws = Workspace::new();
    let plate_path = ws.plate("plate_8.png", 40, 30);
    let svc = service(&ws.root);
    let plate = PlateId::parse("plate_8.png").unwrap();

    svc.save_annotations(&plate, plate_metadata(), vec![object("Sirius", 2.0, 2.0, 10.0, 8.0)])
        .await
        .unwrap();
    let report = svc
        .export_from_cache(&plate_path, None, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.objects, 1);
    assert!(report.output_dir.join("plate_8_Sirius.fits").exists());
    assert_eq!(svc.load_annotations(&plate).await.unwrap().state, AnnotationState::Saved);

    // A saved record cannot be exported from the cache again.
    let err = svc
        .export_from_cache(&plate_path, None, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cache(_)));
}

#[tokio::test]
async fn test_service_export_reports_validation_issues() {
    let ws = Workspace::new();
    let plate_path = ws.plate("plate_9.png", 40, 30);
    let svc = service(&ws.root);

    let request = svc.export_request(&plate_path, plate_metadata(), Vec::new(), None).unwrap();
    let err = svc.export_plate(request, CancellationToken::new()).await.unwrap_err();
    match err {
        Error::Export(export) => assert_eq!(export.issues().unwrap()[0].rule, ValidationRule::EmptyBatch),
        other => panic!("expected export error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_concurrent_exports_of_one_plate_do_not_interleave() {
    let ws = Workspace::new();
    let plate_path = ws.plate("plate_10.png", 40, 30);
    let svc = service(&ws.root);

    let first = svc
        .export_request(&plate_path, plate_metadata(), vec![object("Sirius", 2.0, 2.0, 10.0, 8.0)], None)
        .unwrap();
    let second = svc
        .export_request(&plate_path, plate_metadata(), vec![object("Vega", 20.0, 10.0, 8.0, 8.0)], None)
        .unwrap();
    let (a, b) = tokio::join!(
        svc.export_plate(first, CancellationToken::new()),
        svc.export_plate(second, CancellationToken::new()),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.output_dir, b.output_dir);

    // Exactly one complete batch is live, and nothing staged is left over.
    let output_root = a.output_dir.parent().unwrap().to_path_buf();
    let leftovers: Vec<_> = fs::read_dir(&output_root)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(leftovers, ["plate_10.png"]);

    let files = sorted_files(&a.output_dir);
    let sirius = files.iter().filter(|f| f.starts_with("plate_10_Sirius")).count();
    let vega = files.iter().filter(|f| f.starts_with("plate_10_Vega")).count();
    assert!(matches!((sirius, vega), (3, 0) | (0, 3)), "{files:?}");

    let plate = PlateId::parse("plate_10.png").unwrap();
    let saved = svc.load_annotations(&plate).await.unwrap();
    assert_eq!(saved.state, AnnotationState::Saved);
    let saved_object = saved.record.unwrap().annotations[0].metadata.text("OBJECT").unwrap();
    assert!(files.iter().any(|f| f == &format!("plate_10_{saved_object}.fits")), "{files:?}");
}

#[tokio::test]
async fn test_concurrent_exports_of_different_plates_run_independently() {
    let ws = Workspace::new();
    let png = ws.plate("B13.png", 40, 30);
    let tif = ws.plate("B13.tif", 40, 30);
    let svc = service(&ws.root);

    let png_request = svc
        .export_request(&png, plate_metadata(), vec![object("Sirius", 2.0, 2.0, 10.0, 8.0)], None)
        .unwrap();
    let tif_request = svc
        .export_request(&tif, plate_metadata(), vec![object("Vega", 2.0, 2.0, 10.0, 8.0)], None)
        .unwrap();
    let (png_report, tif_report) = tokio::join!(
        svc.export_plate(png_request, CancellationToken::new()),
        svc.export_plate(tif_request, CancellationToken::new()),
    );
    let (png_report, tif_report) = (png_report.unwrap(), tif_report.unwrap());

    assert_ne!(png_report.output_dir, tif_report.output_dir);
    assert!(png_report.output_dir.join("B13_Sirius.fits").exists());
    assert!(tif_report.output_dir.join("B13_Vega.fits").exists());
    assert!(!png_report.output_dir.join("B13_Vega.fits").exists());
}
