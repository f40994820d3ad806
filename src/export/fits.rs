//! FITS output for exported objects.
//!
//! One primary HDU per object: the crop as the data array (BITPIX 8 for
//! 8-bit plates, BITPIX 32 for 16-bit ones) followed by the schema fields as
//! header keys in schema order.

use std::fs::File;
use std::path::Path;

use fitsio::compat::fitsfile::FitsFile;
use fitsio::compat::images::{ImageDescription, ImageType, WriteImage};
use thiserror::Error;
use tracing::{debug, warn};

use super::raster::PlateRaster;
use crate::types::{FieldSpec, FieldValue, ObservationMetadata, PlateMetadata};

/// Characters that fit between the quotes of a single string card.
const MAX_STRING_VALUE: usize = 68;

/// Keys the image HDU owns. Schema fields with these names are not written.
const STRUCTURAL_KEYS: &[&str] = &["SIMPLE", "BITPIX", "NAXIS", "NAXIS1", "NAXIS2", "EXTEND", "BZERO", "BSCALE", "END"];

#[derive(Error, Debug)]
pub enum FitsWriteError {
    #[error("FITS I/O error: {0}")]
    Fits(#[from] fitsio::compat::errors::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CardValue {
    Text(String),
    Integer(i64),
    Real(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderCard {
    pub key: String,
    pub value: CardValue,
}

/// Ordered header keys for one object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitsHeader {
    cards: Vec<HeaderCard>,
}

impl FitsHeader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: &str, value: CardValue) {
        self.cards.push(HeaderCard {
            key: key.to_string(),
            value,
        });
    }

    pub fn cards(&self) -> &[HeaderCard] {
        &self.cards
    }

    pub fn get(&self, key: &str) -> Option<&CardValue> {
        self.cards.iter().find(|c| c.key == key).map(|c| &c.value)
    }
}

fn card_value(value: Option<&FieldValue>, numeric: bool) -> CardValue {
    match value {
        None => CardValue::Text(String::new()),
        Some(FieldValue::Integer(v)) => CardValue::Integer(*v),
        Some(FieldValue::Real(v)) if v.is_finite() => CardValue::Real(*v),
        Some(FieldValue::Real(v)) => CardValue::Text(v.to_string()),
        Some(FieldValue::Text(s)) => {
            let trimmed = s.trim();
            if !numeric || trimmed.is_empty() {
                return CardValue::Text(s.clone());
            }
            if let Ok(v) = trimmed.parse::<i64>() {
                CardValue::Integer(v)
            } else {
                match trimmed.parse::<f64>() {
                    Ok(v) if v.is_finite() => CardValue::Real(v),
                    _ => CardValue::Text(s.clone()),
                }
            }
        }
    }
}

/// Header for one object: schema order, plate values for global fields,
/// object values for the rest, empty strings for missing values.
pub fn build_header(schema: &[FieldSpec], plate: &PlateMetadata, object: &ObservationMetadata) -> FitsHeader {
    let mut header = FitsHeader::new();
    for spec in schema {
        let source = if spec.global { plate } else { object };
        header.push(&spec.key, card_value(source.get(&spec.key), spec.numeric));
    }
    header
}

/// Break `text` into chunks of at most `max_len` characters without cutting
/// words; whitespace runs collapse to one space. Words longer than `max_len`
/// are hard-split.
pub fn split_text_smart(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word;
        while word.chars().count() > max_len {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let cut = word.char_indices().nth(max_len).map_or(word.len(), |(i, _)| i);
            chunks.push(word[..cut].to_string());
            word = &word[cut..];
        }
        if word.is_empty() {
            continue;
        }
        let sep = usize::from(!current.is_empty());
        if current.chars().count() + sep + word.chars().count() > max_len {
            chunks.push(std::mem::take(&mut current));
        } else if sep == 1 {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// String value as it fits on one card. Longer text is cut at the last
/// word boundary that fits; quotes count twice once escaped.
pub fn card_text(key: &str, text: &str) -> String {
    let budget = MAX_STRING_VALUE.saturating_sub(text.matches('\'').count());
    if text.chars().count() <= budget {
        return text.to_string();
    }
    let clipped = split_text_smart(text, budget).into_iter().next().unwrap_or_default();
    warn!(key, kept = clipped.len(), dropped = text.len() - clipped.len(), "header value clipped to one card");
    clipped
}

/// Write (or overwrite) a FITS file holding `raster` and `header`.
pub fn write_fits(path: &Path, raster: &PlateRaster, header: &FitsHeader) -> Result<(), FitsWriteError> {
    let (width, height) = raster.dimensions();
    let data_type = match raster {
        PlateRaster::Gray8(_) => ImageType::UnsignedByte,
        PlateRaster::Gray16(_) => ImageType::Long,
    };
    let image_description = ImageDescription {
        data_type,
        dimensions: vec![width as usize, height as usize],
    };

    let mut fptr = FitsFile::create(path).overwrite().open()?;
    let hdu = fptr.create_image("PRIMARY", &image_description)?;

    match raster {
        PlateRaster::Gray8(img) => {
            let data: Vec<u8> = img.as_raw().clone();
            u8::write_image(&mut fptr, &hdu, &data)?;
        }
        PlateRaster::Gray16(img) => {
            let data: Vec<i32> = img.as_raw().iter().map(|&v| i32::from(v)).collect();
            i32::write_image(&mut fptr, &hdu, &data)?;
        }
    }

    for card in header.cards() {
        if STRUCTURAL_KEYS.contains(&card.key.as_str()) {
            debug!(key = %card.key, "schema key reserved by the image HDU, skipped");
            continue;
        }
        match &card.value {
            CardValue::Text(text) => hdu.write_key(&mut fptr, &card.key, &card_text(&card.key, text))?,
            CardValue::Integer(v) => hdu.write_key(&mut fptr, &card.key, v)?,
            CardValue::Real(v) => hdu.write_key(&mut fptr, &card.key, v)?,
        }
    }
    drop(fptr);

    File::open(path)?.sync_all()?;
    Ok(())
}
