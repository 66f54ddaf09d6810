//! Heuristic parsing of OCR text into structured rows
//!
//! Two modes, both line-oriented and lossy by design: unqualified lines are
//! skipped and an all-empty result is valid. The parser never errors.
//!
//! ## Transaction mode (INCOME / OUTCOME)
//! A destination line is any line matching the destination keywords
//! (`destino`, `señor(es)`, `sr.`). Every other line yields an item when its
//! last integer token parses as a quantity (absolute value) and the cleaned
//! remainder is at least 3 characters long.
//!
//! ## Control-sheet mode (CONTROL)
//! A line qualifies only when it carries both a date token and a trailing
//! integer. The remainder splits into destination/model by, in order:
//! a literal `" - "`, a run of two or more spaces, or (with >= 3 words and a
//! 3+ letter run) last-two-words-are-the-model. Rows with no derivable
//! destination carry forward the last destination seen, in file order.

use crate::types::{ControlRow, DocType, DocumentData, ItemType, TransactionItem};
use once_cell::sync::Lazy;
use regex::Regex;

static DESTINATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(destino|señor(es)?|sr\.)").unwrap());

static INTEGER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-?\d+").unwrap());

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,2}/\d{1,2}(?:/\d{2,4})?\b").unwrap());

static TRAILING_INT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*$").unwrap());

static MULTI_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

static LETTER_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{L}{3,}").unwrap());

/// Minimum cleaned item-name length; shorter names are OCR noise
const MIN_NAME_LEN: usize = 3;

/// Classify an item name; CHAPA when the name mentions "chapa", MODULO otherwise
pub fn item_type_for(name: &str) -> ItemType {
    if name.to_lowercase().contains("chapa") {
        ItemType::Chapa
    } else {
        ItemType::Modulo
    }
}

/// Parse OCR text with the mode matching the document type
pub fn parse_for(doc_type: DocType, text: &str) -> DocumentData {
    match doc_type {
        DocType::Income | DocType::Outcome => parse_transaction_text(text),
        DocType::Control => parse_control_text(text),
    }
}

/// Transaction mode: destination line + item lines
pub fn parse_transaction_text(text: &str) -> DocumentData {
    let mut destination: Option<String> = None;
    let mut items = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(m) = DESTINATION_RE.find(line) {
            if destination.is_none() {
                let rest = strip_noise(&line[m.end()..]);
                if !rest.is_empty() {
                    destination = Some(rest);
                }
            }
            continue;
        }

        // Last integer token is the quantity; the cleaned rest is the name
        let Some(m) = INTEGER_RE.find_iter(line).last() else {
            continue;
        };
        let Ok(value) = m.as_str().parse::<i64>() else {
            continue;
        };
        let quantity = value.unsigned_abs().min(u32::MAX as u64) as u32;

        let name = strip_noise(&format!("{}{}", &line[..m.start()], &line[m.end()..]));
        if name.chars().count() < MIN_NAME_LEN {
            continue;
        }

        let item_type = item_type_for(&name);
        items.push(TransactionItem {
            name,
            quantity,
            item_type,
        });
    }

    DocumentData::Transaction { destination, items }
}

/// Control-sheet mode: date + trailing quantity qualify a row
pub fn parse_control_text(text: &str) -> DocumentData {
    let mut rows = Vec::new();
    let mut last_destination: Option<String> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some(date_m) = DATE_RE.find(line) else {
            continue;
        };
        let Some(int_caps) = TRAILING_INT_RE.captures(line) else {
            continue;
        };
        let Some(int_m) = int_caps.get(1) else {
            continue;
        };
        // A trailing integer inside the date token is not a quantity
        if int_m.start() < date_m.end() {
            continue;
        }
        let Ok(quantity) = int_m.as_str().parse::<u32>() else {
            continue;
        };

        // Strip the quantity first (it sits after the date), then the date
        let without_int = &line[..int_m.start()];
        let remainder = format!(
            "{}{}",
            &without_int[..date_m.start()],
            &without_int[date_m.end()..]
        );
        let remainder = remainder.trim();

        let (dest, model) = split_destination_model(remainder);

        let destination = match dest {
            Some(d) => {
                last_destination = Some(d.clone());
                d
            }
            None => last_destination.clone().unwrap_or_default(),
        };

        rows.push(ControlRow {
            date: date_m.as_str().to_string(),
            quantity,
            destination,
            model,
        });
    }

    DocumentData::Control { rows }
}

/// Split a control-row remainder into (destination, model)
///
/// Priority: `" - "` separator, then a 2+ space run, then the
/// last-two-words-are-the-model heuristic.
fn split_destination_model(remainder: &str) -> (Option<String>, String) {
    if let Some(idx) = remainder.find(" - ") {
        return (
            non_empty(collapse(&remainder[..idx])),
            collapse(&remainder[idx + 3..]),
        );
    }

    if let Some(m) = MULTI_SPACE_RE.find(remainder) {
        return (
            non_empty(collapse(&remainder[..m.start()])),
            collapse(&remainder[m.end()..]),
        );
    }

    let words: Vec<&str> = remainder.split_whitespace().collect();
    if words.len() >= 3 && LETTER_RUN_RE.is_match(remainder) {
        let model = words[words.len() - 2..].join(" ");
        let dest = words[..words.len() - 2].join(" ");
        return (non_empty(dest), model);
    }

    (None, collapse(remainder))
}

/// Replace non-alphanumeric noise with spaces and collapse runs
fn strip_noise(s: &str) -> String {
    let replaced: String = s
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    collapse(&replaced)
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transaction_items(text: &str) -> Vec<TransactionItem> {
        match parse_transaction_text(text) {
            DocumentData::Transaction { items, .. } => items,
            _ => unreachable!(),
        }
    }

    fn control_rows(text: &str) -> Vec<ControlRow> {
        match parse_control_text(text) {
            DocumentData::Control { rows } => rows,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_transaction_basic_items() {
        let items = transaction_items("Chapa MRZ 15\nModulo Hex -3");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Chapa MRZ");
        assert_eq!(items[0].quantity, 15);
        assert_eq!(items[0].item_type, ItemType::Chapa);
        assert_eq!(items[1].name, "Modulo Hex");
        assert_eq!(items[1].quantity, 3); // absolute value
        assert_eq!(items[1].item_type, ItemType::Modulo);
    }

    #[test]
    fn test_transaction_destination_line() {
        let data = parse_transaction_text("Destino: Obra Central\nChapa Lisa 4");
        match data {
            DocumentData::Transaction { destination, items } => {
                assert_eq!(destination.as_deref(), Some("Obra Central"));
                assert_eq!(items.len(), 1);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_transaction_senores_is_destination_not_item() {
        let items = transaction_items("Señores: Deposito Norte 9\nModulo Base 2");
        // The señores line must not become an item even though it ends in 9
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Modulo Base");
    }

    #[test]
    fn test_transaction_discards_short_names() {
        let items = transaction_items("ab 5\nxy 3\nModulo Chico 1");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Modulo Chico");
    }

    #[test]
    fn test_transaction_strips_noise() {
        let items = transaction_items("** Chapa Acanalada!! (rota) 7 **");
        assert_eq!(items.len(), 1);
        // 7 is the last integer; asterisks and punctuation are stripped
        assert_eq!(items[0].name, "Chapa Acanalada rota");
        assert_eq!(items[0].quantity, 7);
        assert_eq!(items[0].item_type, ItemType::Chapa);
    }

    #[test]
    fn test_transaction_lines_without_numbers_skipped() {
        let items = transaction_items("encabezado de remito\nsin cantidad aqui");
        assert!(items.is_empty());
    }

    #[test]
    fn test_transaction_empty_input_is_valid() {
        let data = parse_transaction_text("");
        assert!(data.is_empty());
    }

    #[test]
    fn test_control_scenario_line() {
        let rows = control_rows("Municipalidad de Las Heras  12/05/2024  LM 200  8");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, "12/05/2024");
        assert_eq!(rows[0].quantity, 8);
        assert_eq!(rows[0].destination, "Municipalidad de Las Heras");
        assert_eq!(rows[0].model, "LM 200");
    }

    #[test]
    fn test_control_dash_separator_takes_priority() {
        let rows = control_rows("Barrio Procrear - LM 150 3/4 12");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].destination, "Barrio Procrear");
        assert_eq!(rows[0].model, "LM 150");
        assert_eq!(rows[0].date, "3/4");
        assert_eq!(rows[0].quantity, 12);
    }

    #[test]
    fn test_control_last_two_words_heuristic() {
        let rows = control_rows("Cooperativa El Hornero LM 200 01/02/24 5");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].destination, "Cooperativa El Hornero");
        assert_eq!(rows[0].model, "LM 200");
    }

    #[test]
    fn test_control_carries_forward_destination() {
        let text = "Municipalidad de Las Heras  12/05/2024  LM 200  8\n1/6/2024 LM100 4";
        let rows = control_rows(text);
        assert_eq!(rows.len(), 2);
        // Second line has no derivable destination; inherits the first one
        assert_eq!(rows[1].destination, "Municipalidad de Las Heras");
        assert_eq!(rows[1].model, "LM100");
        assert_eq!(rows[1].quantity, 4);
    }

    #[test]
    fn test_control_requires_date_and_trailing_integer() {
        // No date
        assert!(control_rows("Municipalidad de Las Heras  LM 200  8").is_empty());
        // No trailing integer (line ends with the date)
        assert!(control_rows("Municipalidad de Las Heras  LM 200  12/05/2024").is_empty());
    }

    #[test]
    fn test_control_date_without_year() {
        let rows = control_rows("Obrador Sur  3/11  LM 150  6");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, "3/11");
        assert_eq!(rows[0].quantity, 6);
    }

    #[test]
    fn test_parse_for_dispatch() {
        assert!(matches!(
            parse_for(DocType::Income, "Chapa T 2"),
            DocumentData::Transaction { .. }
        ));
        assert!(matches!(
            parse_for(DocType::Control, ""),
            DocumentData::Control { .. }
        ));
    }
}
