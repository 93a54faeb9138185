pub mod assessments;
pub mod bookings;
pub mod estimates;
pub mod invoices;
pub mod jotter;
pub mod receipts;
pub mod settings;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::database::models::LineItem;
use crate::error::ApiError;

/// Path params for per-document routes. The tenant API is mounted both
/// bare and under /t/:tenant, so these routes see a second `tenant`
/// capture on the path-based mount; deserializing into a struct ignores
/// it instead of failing the extraction.
#[derive(Debug, Deserialize)]
pub struct DocPath {
    pub id: i32,
}

/// Common list-endpoint query parameters.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Serialize a document with its line items embedded.
pub(crate) fn attach_line_items<T: Serialize>(
    document: &T,
    line_items: Vec<LineItem>,
) -> Result<Value, ApiError> {
    let mut value = serde_json::to_value(document)
        .map_err(|e| ApiError::internal_server_error(e.to_string()))?;
    value["line_items"] = serde_json::to_value(line_items)
        .map_err(|e| ApiError::internal_server_error(e.to_string()))?;
    Ok(value)
}

/// Group a batch line-item fetch by parent document id.
pub(crate) fn group_line_items(items: Vec<LineItem>) -> HashMap<i32, Vec<LineItem>> {
    let mut grouped: HashMap<i32, Vec<LineItem>> = HashMap::new();
    for item in items {
        grouped.entry(item.document_id).or_default().push(item);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn item(document_id: i32, sort_order: i32) -> LineItem {
        LineItem {
            id: sort_order,
            document_type: "estimate".into(),
            document_id,
            description: "Labour".into(),
            quantity: Decimal::ONE,
            rate: Decimal::from(50),
            amount: Decimal::from(50),
            sort_order,
        }
    }

    #[test]
    fn groups_items_by_document() {
        let grouped = group_line_items(vec![item(1, 0), item(2, 0), item(1, 1)]);
        assert_eq!(grouped[&1].len(), 2);
        assert_eq!(grouped[&2].len(), 1);
        assert_eq!(grouped[&1][1].sort_order, 1);
    }

    #[test]
    fn attaches_line_items_to_serialized_document() {
        let doc = serde_json::json!({ "id": 1, "client_name": "Sam" });
        let value = attach_line_items(&doc, vec![item(1, 0)]).unwrap();
        assert_eq!(value["client_name"], "Sam");
        assert_eq!(value["line_items"].as_array().unwrap().len(), 1);
    }
}
