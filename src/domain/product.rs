//! Product documents as returned by Open Food Facts.

use serde::{Deserialize, Serialize};
use serde_json::Value;

const STATUS_POINTER: &str = "/status";
const PRODUCT_NAME_POINTER: &str = "/product/product_name";
const ENERGY_SERVING_POINTER: &str = "/product/nutriments/energy_serving";

/// Raw product document.
///
/// No schema is enforced; accessors only read the handful of fields the
/// energy resolver and the logs care about. Records are never mutated once
/// obtained, so the persisted form is exactly what the upstream returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductRecord(Value);

impl ProductRecord {
    pub fn new(document: Value) -> Self {
        Self(document)
    }

    /// A JSON `null` body carries no product at all.
    pub fn is_absent(&self) -> bool {
        self.0.is_null()
    }

    /// The integer `status` field, if present.
    pub fn status(&self) -> Option<i64> {
        self.0.pointer(STATUS_POINTER).and_then(Value::as_i64)
    }

    pub fn product_name(&self) -> Option<&str> {
        self.0.pointer(PRODUCT_NAME_POINTER).and_then(Value::as_str)
    }

    /// Per-serving energy node; usually a string such as `"529"`.
    pub fn energy_serving(&self) -> Option<&Value> {
        self.0.pointer(ENERGY_SERVING_POINTER)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn accessors_follow_document_paths() {
        let record = ProductRecord::new(json!({
            "status": 1,
            "product": {
                "product_name": "Club-Mate",
                "nutriments": { "energy_serving": "529" }
            }
        }));

        assert_eq!(record.status(), Some(1));
        assert_eq!(record.product_name(), Some("Club-Mate"));
        assert_eq!(record.energy_serving(), Some(&json!("529")));
        assert!(!record.is_absent());
    }

    #[test]
    fn missing_fields_are_none() {
        let record = ProductRecord::new(json!({ "code": "12345678" }));
        assert_eq!(record.status(), None);
        assert_eq!(record.product_name(), None);
        assert_eq!(record.energy_serving(), None);
    }

    #[test]
    fn serializes_as_the_bare_document() {
        let document = json!({ "status": 0, "status_verbose": "product not found" });
        let record = ProductRecord::new(document.clone());
        let encoded = serde_json::to_value(&record).expect("serialize record");
        assert_eq!(encoded, document);
    }
}
