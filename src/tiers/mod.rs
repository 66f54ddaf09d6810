//! Analysis tiers: QR decode, local text extraction, remote AI
//!
//! Tiers share one wire shape for structured payloads so a QR code printed
//! on a remito and a remote model response decode through the same path.

pub mod ocr;
pub mod qr;
pub mod remote;

use crate::parser::item_type_for;
use crate::types::{ControlRow, DocType, DocumentData, ItemType, TransactionItem};
use serde::Deserialize;

#[derive(Deserialize)]
struct RawItem {
    name: String,
    quantity: i64,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

#[derive(Deserialize)]
struct RawTransaction {
    #[serde(default)]
    destination: Option<String>,
    #[serde(default)]
    items: Vec<RawItem>,
}

#[derive(Deserialize)]
struct RawControlRow {
    date: String,
    quantity: i64,
    #[serde(default)]
    destination: String,
    #[serde(default)]
    model: String,
}

#[derive(Deserialize)]
struct RawControl {
    #[serde(default)]
    rows: Vec<RawControlRow>,
}

/// Decode a structured JSON payload (QR content or remote response) into
/// [`DocumentData`] for the given document type
///
/// Accepts both the wrapped form (`{"items": [...]}` / `{"rows": [...]}`)
/// and a bare array.
pub(crate) fn document_data_from_json(json: &str, doc_type: DocType) -> Result<DocumentData, String> {
    match doc_type {
        DocType::Income | DocType::Outcome => {
            let raw: RawTransaction = serde_json::from_str(json)
                .or_else(|_| {
                    serde_json::from_str::<Vec<RawItem>>(json).map(|items| RawTransaction {
                        destination: None,
                        items,
                    })
                })
                .map_err(|e| format!("Payload is not a transaction document: {}", e))?;

            let items = raw
                .items
                .into_iter()
                .filter_map(|item| {
                    let name = item.name.trim().to_string();
                    if name.is_empty() {
                        return None;
                    }
                    let item_type = match &item.kind {
                        Some(kind) if kind.to_lowercase().contains("chapa") => ItemType::Chapa,
                        Some(_) => ItemType::Modulo,
                        None => item_type_for(&name),
                    };
                    Some(TransactionItem {
                        name,
                        quantity: item.quantity.unsigned_abs().min(u32::MAX as u64) as u32,
                        item_type,
                    })
                })
                .collect();

            Ok(DocumentData::Transaction {
                destination: raw.destination.filter(|d| !d.trim().is_empty()),
                items,
            })
        }
        DocType::Control => {
            let raw: RawControl = serde_json::from_str(json)
                .or_else(|_| {
                    serde_json::from_str::<Vec<RawControlRow>>(json)
                        .map(|rows| RawControl { rows })
                })
                .map_err(|e| format!("Payload is not a control sheet: {}", e))?;

            let rows = raw
                .rows
                .into_iter()
                .map(|row| ControlRow {
                    date: row.date,
                    quantity: row.quantity.unsigned_abs().min(u32::MAX as u64) as u32,
                    destination: row.destination,
                    model: row.model,
                })
                .collect();

            Ok(DocumentData::Control { rows })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_transaction_payload() {
        let json = r#"{"destination": "Obra Norte",
                       "items": [{"name": "Chapa T101", "quantity": 4},
                                 {"name": "Modulo Hex", "quantity": -3, "type": "MODULO"}]}"#;
        let data = document_data_from_json(json, DocType::Income).unwrap();
        match data {
            DocumentData::Transaction { destination, items } => {
                assert_eq!(destination.as_deref(), Some("Obra Norte"));
                assert_eq!(items.len(), 2);
                assert_eq!(items[0].item_type, ItemType::Chapa);
                assert_eq!(items[1].quantity, 3);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_bare_array_transaction_payload() {
        let json = r#"[{"name": "Modulo Base", "quantity": 2}]"#;
        let data = document_data_from_json(json, DocType::Outcome).unwrap();
        assert!(!data.is_empty());
    }

    #[test]
    fn test_control_payload() {
        let json = r#"{"rows": [{"date": "12/05/2024", "quantity": 8,
                                 "destination": "Municipalidad de Las Heras",
                                 "model": "LM 200"}]}"#;
        let data = document_data_from_json(json, DocType::Control).unwrap();
        match data {
            DocumentData::Control { rows } => {
                assert_eq!(rows[0].model, "LM 200");
                assert_eq!(rows[0].quantity, 8);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_items_with_blank_names_dropped() {
        let json = r#"{"items": [{"name": "  ", "quantity": 4}]}"#;
        let data = document_data_from_json(json, DocType::Income).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn test_garbage_payload_rejected() {
        assert!(document_data_from_json("not json", DocType::Income).is_err());
        assert!(document_data_from_json("\"just a string\"", DocType::Control).is_err());
    }
}
