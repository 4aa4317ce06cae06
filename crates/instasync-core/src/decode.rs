//! Status decoding: replace coded fields with their display labels.

use serde_json::Value;

use crate::status::{
    StatusTable, CAMPAIGN_STATUS, LEAD_ENRICHMENT_STATUS, LEAD_ESP_CODE, LEAD_INTEREST_STATUS,
    LEAD_STATUS, LEAD_UPLOAD_METHOD, LEAD_VERIFICATION_STATUS,
};

/// A coded field and the table that decodes it.
#[derive(Debug, Clone, Copy)]
pub struct CodedField {
    pub field: &'static str,
    pub table: StatusTable,
}

/// Pure record decoder. Never mutates its input.
#[derive(Debug, Clone)]
pub struct RecordDecoder {
    fields: Vec<CodedField>,
}

impl RecordDecoder {
    pub fn new(fields: Vec<CodedField>) -> Self {
        Self { fields }
    }

    /// Decoder for campaign records.
    pub fn campaigns() -> Self {
        Self::new(vec![CodedField {
            field: "status",
            table: CAMPAIGN_STATUS,
        }])
    }

    /// Decoder for lead records.
    pub fn leads() -> Self {
        Self::new(vec![
            CodedField { field: "status", table: LEAD_STATUS },
            CodedField { field: "lt_interest_status", table: LEAD_INTEREST_STATUS },
            CodedField { field: "verification_status", table: LEAD_VERIFICATION_STATUS },
            CodedField { field: "enrichment_status", table: LEAD_ENRICHMENT_STATUS },
            CodedField { field: "esp_code", table: LEAD_ESP_CODE },
            CodedField { field: "upload_method", table: LEAD_UPLOAD_METHOD },
        ])
    }

    pub fn fields(&self) -> &[CodedField] {
        &self.fields
    }

    /// Return a copy of `record` with every present coded field replaced by
    /// its label. Unknown and non-integer codes decode to `""`; absent fields
    /// stay absent. Non-object records are returned unchanged.
    pub fn decode(&self, record: &Value) -> Value {
        let mut out = record.clone();
        if let Value::Object(map) = &mut out {
            for coded in &self.fields {
                if let Some(slot) = map.get_mut(coded.field) {
                    let label = code_of(slot).map(|c| coded.table.label(c)).unwrap_or("");
                    *slot = Value::String(label.to_string());
                }
            }
        }
        out
    }

    pub fn decode_all(&self, records: &[Value]) -> Vec<Value> {
        records.iter().map(|r| self.decode(r)).collect()
    }
}

/// Integer code carried by a JSON value (`1`, `-2`, `"3"`, `2.0`).
fn code_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn campaign_status_decodes() {
        let d = RecordDecoder::campaigns();
        assert_eq!(d.decode(&json!({"status": 1}))["status"], "Active");
        assert_eq!(d.decode(&json!({"status": -2}))["status"], "Bounce Protect");
        assert_eq!(d.decode(&json!({"status": 999999}))["status"], "");
    }

    #[test]
    fn input_is_not_mutated() {
        let raw = json!({"id": "c1", "status": 2});
        let decoded = RecordDecoder::campaigns().decode(&raw);
        assert_eq!(raw["status"], 2);
        assert_eq!(decoded["status"], "Paused");
        assert_eq!(decoded["id"], "c1");
    }

    #[test]
    fn lead_fields_decode_independently() {
        let raw = json!({
            "email": "a@b.co",
            "status": -1,
            "lt_interest_status": 2,
            "verification_status": "11",
            "enrichment_status": 7,
            "esp_code": 1,
            "upload_method": 2,
        });
        let decoded = RecordDecoder::leads().decode(&raw);
        assert_eq!(decoded["status"], "Bounced");
        assert_eq!(decoded["lt_interest_status"], "Meeting Booked");
        assert_eq!(decoded["verification_status"], "Pending");
        assert_eq!(decoded["enrichment_status"], "");
        assert_eq!(decoded["esp_code"], "Google");
        assert_eq!(decoded["upload_method"], "API");
        assert_eq!(decoded["email"], "a@b.co");
    }

    #[test]
    fn absent_fields_stay_absent_and_junk_decodes_empty() {
        let decoded = RecordDecoder::leads().decode(&json!({"status": null, "email": "x"}));
        assert_eq!(decoded["status"], "");
        assert!(decoded.get("esp_code").is_none());
    }

    #[test]
    fn non_object_passthrough() {
        let d = RecordDecoder::campaigns();
        assert_eq!(d.decode(&json!("text")), json!("text"));
    }
}
