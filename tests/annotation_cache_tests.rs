//! Working/saved cache lifecycle against a real directory.

use std::fs;
use std::path::Path;

use plate_digitizer::error::CacheError;
use plate_digitizer::storage::{AnnotationCache, JsonRecordStore};
use plate_digitizer::{Annotation, AnnotationState, BoundingBox, PlateId, PlateListing, PlateRecord};

fn cache(root: &Path) -> AnnotationCache {
    AnnotationCache::open(&root.join("cache"), &["tif".to_string(), "png".to_string()]).unwrap()
}

fn record(plate: &PlateId, objects: &[&str]) -> PlateRecord {
    let annotations = objects
        .iter()
        .enumerate()
        .map(|(i, name)| Annotation {
            bbox: BoundingBox::new(10.0 * i as f64, 0.0, 8.0, 8.0),
            metadata: [("OBJECT", *name)].into_iter().collect(),
        })
        .collect();
    PlateRecord::new(plate.clone(), [("PLATE-N", "A-17")].into_iter().collect(), annotations)
}

#[test]
fn test_save_then_load_returns_the_working_record() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache(dir.path());
    let plate = PlateId::parse("/scans/A17.tif").unwrap();
    let saved = record(&plate, &["Sirius", "Vega"]);

    cache.save(&plate, &saved).unwrap();
    let entry = cache.load(&plate).unwrap();
    assert_eq!(entry.state, AnnotationState::Working);
    assert_eq!(entry.record, Some(saved));
}

#[test]
fn test_promote_moves_working_to_saved() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache(dir.path());
    let plate = PlateId::parse("A17.tif").unwrap();
    cache.save(&plate, &record(&plate, &["Sirius"])).unwrap();

    cache.promote(&plate).unwrap();

    let entry = cache.load(&plate).unwrap();
    assert_eq!(entry.state, AnnotationState::Saved);
    assert!(!cache.record_path(AnnotationState::Working, &plate).unwrap().exists());
    assert!(cache.record_path(AnnotationState::Saved, &plate).unwrap().exists());
}

#[test]
fn test_promote_without_working_record_fails() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache(dir.path());
    let plate = PlateId::parse("A17.tif").unwrap();
    let err = cache.promote(&plate).unwrap_err();
    assert!(matches!(err, CacheError::NoWorkingRecord(p) if p == plate));
}

#[test]
fn test_delete_only_touches_the_working_record() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache(dir.path());
    let plate = PlateId::parse("A17.tif").unwrap();
    cache.save(&plate, &record(&plate, &["Sirius"])).unwrap();
    cache.promote(&plate).unwrap();

    assert!(!cache.delete(&plate).unwrap());
    assert_eq!(cache.load(&plate).unwrap().state, AnnotationState::Saved);
}

#[test]
fn test_record_file_keeps_body_layout() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache(dir.path());
    let plate = PlateId::parse("A17.tif").unwrap();
    cache.save(&plate, &record(&plate, &["Sirius"])).unwrap();

    let path = cache.record_path(AnnotationState::Working, &plate).unwrap();
    let store = JsonRecordStore::open(&path).unwrap();
    let body = store.get("body").unwrap();
    assert_eq!(body["plate"], "A17.tif");
    assert_eq!(body["annotations"][0]["box"]["w"], 8.0);
    assert_eq!(body["annotations"][0]["metadata"]["OBJECT"], "Sirius");
}

#[test]
fn test_corrupt_record_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache(dir.path());
    let plate = PlateId::parse("A17.tif").unwrap();
    let path = cache.record_path(AnnotationState::Working, &plate).unwrap();
    fs::write(&path, "{ not json").unwrap();

    assert!(matches!(cache.load(&plate), Err(CacheError::Corrupt { .. })));
}

#[test]
fn test_listing_reports_state_and_counts() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache(dir.path());
    let plates = dir.path().join("plates");
    fs::create_dir_all(&plates).unwrap();
    for name in ["c.TIF", "a.tif", "b.png", "notes.txt"] {
        fs::write(plates.join(name), b"").unwrap();
    }

    let a = PlateId::parse("a.tif").unwrap();
    cache.save(&a, &record(&a, &["Sirius", "Vega", "Rigel"])).unwrap();
    let b = PlateId::parse("b.png").unwrap();
    cache.save(&b, &record(&b, &["Sirius"])).unwrap();
    cache.promote(&b).unwrap();

    let listing = cache.list(&plates).unwrap();
    let plate = |s: &str| PlateId::parse(s).unwrap();
    assert_eq!(
        listing,
        [
            PlateListing { plate: plate("a.tif"), state: AnnotationState::Working, objects: Some(3) },
            PlateListing { plate: plate("b.png"), state: AnnotationState::Saved, objects: None },
            PlateListing { plate: plate("c.TIF"), state: AnnotationState::None, objects: None },
        ]
    );
}
