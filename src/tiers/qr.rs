//! QR tier: decode a structured payload embedded in the document image
//!
//! Cheapest tier after the cache. Remitos printed by the newer template
//! carry their row data as JSON inside a QR code; when that decodes, no
//! OCR or remote call is needed at all.

use super::document_data_from_json;
use crate::types::{DocType, DocumentData};
use tracing::debug;

/// Decodes a structured payload out of document bytes
///
/// Any failure (no code found, undecodable code, non-JSON content, empty
/// payload) is a tier failure: the pipeline falls through to the next tier.
pub trait QrDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8], doc_type: DocType) -> Result<DocumentData, String>;
}

/// QR decoder over raster images
#[derive(Default)]
pub struct ImageQrDecoder;

impl ImageQrDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl QrDecoder for ImageQrDecoder {
    fn decode(&self, bytes: &[u8], doc_type: DocType) -> Result<DocumentData, String> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| format!("Not a decodable image: {}", e))?;

        let mut prepared = rqrr::PreparedImage::prepare(img.to_luma8());
        let grids = prepared.detect_grids();
        if grids.is_empty() {
            return Err("No QR code found in image".to_string());
        }
        debug!("[QrDecoder] Found {} QR grid(s)", grids.len());

        // First decodable grid wins
        let mut last_error = String::new();
        for grid in &grids {
            match grid.decode() {
                Ok((_meta, content)) => {
                    let data = document_data_from_json(&content, doc_type)?;
                    if data.is_empty() {
                        return Err("QR payload contained no rows".to_string());
                    }
                    return Ok(data);
                }
                Err(e) => {
                    last_error = format!("QR decode failed: {}", e);
                }
            }
        }

        Err(last_error)
    }
}
