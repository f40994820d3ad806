//! Human-readable provenance note written next to each exported object.

use crate::types::{ObservationMetadata, PlateMetadata};

/// Build the note for one object. Blank fields read as "unknown".
pub fn provenance_note(
    plate: &PlateMetadata,
    object: &ObservationMetadata,
    identifier_field: &str,
    footer: &str,
) -> String {
    let plate_part = plate
        .text("PLATE-N")
        .map_or_else(|| "without identification".to_string(), |p| format!("identified as {p}"));
    let object_part = object
        .text(identifier_field)
        .map_or_else(|| "an unknown astronomical source".to_string(), |o| format!("the astronomical source {o}"));
    let date_part = object
        .text("DATE-OBS")
        .map_or_else(|| "on an unknown date".to_string(), |d| format!("on {d}"));
    let site_part = plate
        .text("OBSERVAT")
        .map_or_else(|| "an unknown observatory".to_string(), |s| format!("the observatory {s}"));

    let equipment: Vec<String> = ["DIGITALI", "SCANNER"]
        .iter()
        .filter_map(|key| plate.text(key))
        .collect();
    let equipment_part = if equipment.is_empty() {
        "Digitized with unrecorded equipment.".to_string()
    } else {
        format!("Digitized with {}.", equipment.join(", "))
    };

    let mut note = format!(
        "FITS file of the spectrographic plate {plate_part}, containing {object_part} \
         observed {date_part} from {site_part}. {equipment_part}"
    );
    if !footer.trim().is_empty() {
        note.push(' ');
        note.push_str(footer.trim());
    }
    note.push('\n');
    note
}
