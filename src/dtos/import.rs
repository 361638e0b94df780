use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Already-parsed spreadsheet rows: raw cell values keyed by header text.
#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub rows: Vec<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub failed: usize,
}

/// One export row. Header names and order match the legacy spreadsheet so an
/// exported file re-imports cleanly.
#[derive(Debug, Serialize)]
pub struct ExportRow {
    #[serde(rename = "Colecao")]
    pub collection: String,
    #[serde(rename = "Oficina")]
    pub workshop: String,
    #[serde(rename = "Ref")]
    pub ref_code: String,
    #[serde(rename = "Preco_Unit")]
    pub unit_price: f64,
    #[serde(rename = "Tecido")]
    pub fabric: String,
    #[serde(rename = "Qtd_Enviada")]
    pub quantity_sent: i32,
    #[serde(rename = "Data_Saida")]
    pub date_sent: String,
    #[serde(rename = "Previsao_Entrada")]
    pub date_expected: String,
    #[serde(rename = "Data_Ultima_Entrega")]
    pub last_delivery_date: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Total_Recebido")]
    pub total_received: i32,
    #[serde(rename = "Total_Perda")]
    pub total_waste: i32,
    #[serde(rename = "Falta")]
    pub missing: i32,
}
