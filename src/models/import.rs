use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use serde_json::{Map, Value};

use crate::dates::parse_date_value;
use crate::models::batch::{normalize_price, recompute, BatchStatus, ReturnEntry};

/// Marker note on the single return synthesized for rows that already carry
/// cumulative totals.
pub const IMPORT_NOTE: &str = "IMPORTED FROM SPREADSHEET";

/// A fully normalized batch ready to insert, produced from one untrusted
/// spreadsheet row. Carries a zero-or-one-element ledger.
#[derive(Debug, Clone)]
pub struct NewBatch {
    pub collection_name: String,
    pub workshop: String,
    pub ref_code: String,
    pub price: f64,
    pub fabric_type: String,
    pub quantity_sent: i32,
    pub date_sent: NaiveDate,
    pub date_expected: NaiveDate,
    pub status: BatchStatus,
    pub total_received: i32,
    pub total_waste: i32,
    pub returns: Vec<ReturnEntry>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RowError {
    pub reason: String,
}

impl RowError {
    fn missing(field: &str) -> Self {
        RowError {
            reason: format!("missing required field '{field}'"),
        }
    }
}

/// Collapses arbitrary header spellings onto canonical keys: trim, lower-case,
/// strip underscores and whitespace ("Qtd Enviada", "qtd_enviada" and
/// "QtdEnviada" all resolve to "qtdenviada").
pub fn normalize_keys(row: &Map<String, Value>) -> HashMap<String, Value> {
    row.iter()
        .map(|(key, value)| {
            let clean: String = key
                .trim()
                .chars()
                .filter(|c| !c.is_whitespace() && *c != '_')
                .collect::<String>()
                .to_lowercase();
            (clean, value.clone())
        })
        .collect()
}

/// Normalizes one external row into a valid batch record, or an explicit
/// per-row failure. Never panics on malformed cells; every optional field
/// has a default.
pub fn reconcile_row(row: &Map<String, Value>) -> Result<NewBatch, RowError> {
    let row = normalize_keys(row);

    let collection_name = required_text(&row, "colecao")?;
    let workshop = required_text(&row, "oficina")?;
    let ref_code = required_text(&row, "ref")?;

    let date_sent = parse_date_value(row.get("datasaida"));
    let date_expected = parse_date_value(row.get("previsaoentrada"));

    let quantity_sent = int_field(&row, "qtdenviada");
    let total_received = int_field(&row, "totalrecebido");
    let total_waste = int_field(&row, "totalperda");

    // Prior receipts collapse into a single historical return dated at the
    // last recorded delivery.
    let mut returns = Vec::new();
    if total_received > 0 || total_waste > 0 {
        returns.push(ReturnEntry {
            id: format!("import-{}", Utc::now().timestamp_millis()),
            quantity: total_received,
            waste: total_waste,
            date: parse_date_value(row.get("dataultimaentrega")),
            notes: IMPORT_NOTE.to_string(),
        });
    }

    // An explicit status naming one of the three persisted states wins;
    // anything else is derived from the row's own quantities.
    let status = row
        .get("status")
        .and_then(Value::as_str)
        .and_then(BatchStatus::parse_loose)
        .unwrap_or_else(|| recompute(quantity_sent, &returns).status);

    Ok(NewBatch {
        collection_name: collection_name.to_uppercase(),
        workshop: workshop.to_uppercase(),
        ref_code: ref_code.to_uppercase(),
        price: normalize_price(float_field(&row, "precounit")),
        fabric_type: text_field(&row, "tecido")
            .unwrap_or_else(|| "OUTRO".to_string())
            .to_uppercase(),
        quantity_sent,
        date_sent,
        date_expected,
        status,
        total_received,
        total_waste,
        returns,
    })
}

fn text_field(row: &HashMap<String, Value>, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn required_text(row: &HashMap<String, Value>, key: &str) -> Result<String, RowError> {
    text_field(row, key).ok_or_else(|| RowError::missing(key))
}

fn float_field(row: &HashMap<String, Value>, key: &str) -> f64 {
    match row.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().replace(',', ".").parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn int_field(row: &HashMap<String, Value>, key: &str) -> i32 {
    let value = float_field(row, key);
    if value.is_finite() && value > 0.0 {
        value.trunc() as i32
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn header_spellings_collapse() {
        let normalized = normalize_keys(&row(json!({
            "Qtd Enviada": 10,
            "total_recebido": 4,
            " PrevisaoEntrada ": "2025-02-01"
        })));
        assert!(normalized.contains_key("qtdenviada"));
        assert!(normalized.contains_key("totalrecebido"));
        assert!(normalized.contains_key("previsaoentrada"));
    }

    #[test]
    fn full_row_reconciles() {
        let batch = reconcile_row(&row(json!({
            "Colecao": "inverno 26",
            "Oficina": "oficina maria",
            "Ref": "ab-12",
            "Preco_Unit": "3,456",
            "Tecido": "m",
            "Qtd_Enviada": 560,
            "Data_Saida": "2025-01-10",
            "Previsao_Entrada": "10/02/2025",
            "Data_Ultima_Entrega": "2025-01-25",
            "Total_Recebido": 200,
            "Total_Perda": 10
        })))
        .unwrap();

        assert_eq!(batch.collection_name, "INVERNO 26");
        assert_eq!(batch.workshop, "OFICINA MARIA");
        assert_eq!(batch.ref_code, "AB-12");
        assert_eq!(batch.price, 3.46);
        assert_eq!(batch.quantity_sent, 560);
        assert_eq!(batch.total_received, 200);
        assert_eq!(batch.total_waste, 10);
        assert_eq!(batch.status, BatchStatus::Partial);
        assert_eq!(batch.returns.len(), 1);
        let synthetic = &batch.returns[0];
        assert_eq!(synthetic.quantity, 200);
        assert_eq!(synthetic.waste, 10);
        assert_eq!(synthetic.notes, IMPORT_NOTE);
        assert_eq!(
            synthetic.date,
            chrono::NaiveDate::from_ymd_opt(2025, 1, 25).unwrap()
        );
    }

    #[test]
    fn missing_required_field_fails_the_row() {
        let result = reconcile_row(&row(json!({
            "Colecao": "VERAO 25",
            "Oficina": "",
            "Ref": "99"
        })));
        assert_eq!(result.unwrap_err(), RowError::missing("oficina"));
    }

    #[test]
    fn skip_counting_leaves_other_rows_alone() {
        let rows = vec![
            row(json!({"Colecao": "A", "Oficina": "B", "Ref": "1"})),
            row(json!({"Colecao": "A", "Ref": "2"})),
            row(json!({"Colecao": "A", "Oficina": "B", "Ref": "3"})),
        ];
        let (ok, failed): (Vec<_>, Vec<_>) = rows
            .iter()
            .map(reconcile_row)
            .partition(Result::is_ok);
        assert_eq!(ok.len(), 2);
        assert_eq!(failed.len(), 1);
    }

    #[test]
    fn zero_receipts_means_empty_ledger() {
        let batch = reconcile_row(&row(json!({
            "Colecao": "A", "Oficina": "B", "Ref": "1",
            "Qtd_Enviada": 100
        })))
        .unwrap();
        assert!(batch.returns.is_empty());
        assert_eq!(batch.status, BatchStatus::Pending);
        assert_eq!(batch.fabric_type, "OUTRO");
        assert_eq!(batch.price, 0.0);
    }

    #[test]
    fn explicit_status_wins_when_recognized() {
        let batch = reconcile_row(&row(json!({
            "Colecao": "A", "Oficina": "B", "Ref": "1",
            "Qtd_Enviada": 100, "Total_Recebido": 100,
            "Status": "Parcial"
        })))
        .unwrap();
        assert_eq!(batch.status, BatchStatus::Partial);

        // Unrecognized status falls back to derivation.
        let batch = reconcile_row(&row(json!({
            "Colecao": "A", "Oficina": "B", "Ref": "1",
            "Qtd_Enviada": 100, "Total_Recebido": 100,
            "Status": "???"
        })))
        .unwrap();
        assert_eq!(batch.status, BatchStatus::Completed);
    }

    #[test]
    fn numeric_ref_is_accepted() {
        let batch = reconcile_row(&row(json!({
            "Colecao": "A", "Oficina": "B", "Ref": 12345
        })))
        .unwrap();
        assert_eq!(batch.ref_code, "12345");
    }

    #[test]
    fn negative_quantities_clamp_to_zero() {
        let batch = reconcile_row(&row(json!({
            "Colecao": "A", "Oficina": "B", "Ref": "1",
            "Qtd_Enviada": -50, "Total_Recebido": -3
        })))
        .unwrap();
        assert_eq!(batch.quantity_sent, 0);
        assert_eq!(batch.total_received, 0);
        assert!(batch.returns.is_empty());
    }
}
