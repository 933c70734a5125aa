use serde_json::Value;

/// Builder for equality queries over one collection.
///
/// Every filter compares a top-level body field against a JSON value; a
/// document matches when all filters match. Results are ordered by
/// insertion time, then id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentQuery {
    /// Collection to search.
    pub collection: String,

    /// Top-level `(field, value)` equality filters.
    pub filters: Vec<(String, Value)>,

    /// Maximum number of documents to return.
    pub limit: Option<usize>,

    /// Number of documents to skip.
    pub offset: Option<usize>,
}

impl DocumentQuery {
    /// Creates a query matching every document in a collection.
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Default::default()
        }
    }

    /// Adds an equality filter on a top-level field.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Limits the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips a number of results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if the body satisfies every filter.
    pub fn matches(&self, body: &Value) -> bool {
        self.filters
            .iter()
            .all(|(field, value)| body.get(field) == Some(value))
    }

    /// Builds the JSON object used for containment matching (`body @> filter`).
    pub fn containment_filter(&self) -> Value {
        let map = self
            .filters
            .iter()
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect::<serde_json::Map<_, _>>();
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_query_matches_everything() {
        let query = DocumentQuery::collection("orders");
        assert!(query.matches(&json!({"status": "pending"})));
        assert!(query.matches(&json!({})));
    }

    #[test]
    fn all_filters_must_match() {
        let query = DocumentQuery::collection("ledger_entries")
            .eq("entry_type", "order_payment")
            .eq("order_id", "o-1");

        assert!(query.matches(&json!({"entry_type": "order_payment", "order_id": "o-1"})));
        assert!(!query.matches(&json!({"entry_type": "order_payment", "order_id": "o-2"})));
        assert!(!query.matches(&json!({"entry_type": "order_payment"})));
    }

    #[test]
    fn null_filter_requires_explicit_null() {
        let query = DocumentQuery::collection("ledger_entries").eq("booking_id", Value::Null);
        assert!(query.matches(&json!({"booking_id": null})));
        assert!(!query.matches(&json!({})));
    }

    #[test]
    fn containment_filter_collects_fields() {
        let query = DocumentQuery::collection("orders")
            .eq("status", "paid")
            .limit(10)
            .offset(5);
        assert_eq!(query.containment_filter(), json!({"status": "paid"}));
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.offset, Some(5));
    }
}
