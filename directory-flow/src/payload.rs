//! Final search payload handed to query consumers.

use crate::details::AdditionalDetails;
use crate::snapshot::FormSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalPayload {
    /// `{ bizId, institutionType, entityType, ...fields }` of the snapshot
    pub query: Map<String, Value>,
    pub additional_details: AdditionalDetails,
    pub timestamp: DateTime<Utc>,
}

impl FinalPayload {
    /// Pair a snapshot with raw additional details. `None` if the snapshot is
    /// not complete enough to query.
    pub fn assemble(
        snapshot: &FormSnapshot,
        raw_additional: &Value,
        timestamp: DateTime<Utc>,
    ) -> Option<Self> {
        let request = snapshot.lookup_request()?;
        Some(Self {
            query: request.to_body(),
            additional_details: AdditionalDetails::from_raw(raw_additional),
            timestamp,
        })
    }

    /// Deep equality ignoring `timestamp`.
    pub fn same_content(&self, other: &Self) -> bool {
        self.query == other.query && self.additional_details == other.additional_details
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn acme() -> FormSnapshot {
        FormSnapshot::new("b1", "bank", "FIRM").with_field("FIRM", "firmName", "Acme")
    }

    #[test]
    fn assembles_query_and_reshaped_details() {
        let raw = json!({ "checkbox": { "aum": true, "hq": false }, "values": { "aum": "10M" } });

        let payload = FinalPayload::assemble(&acme(), &raw, Utc::now()).expect("complete");
        let value = serde_json::to_value(&payload).expect("serialize");

        assert_eq!(
            value["query"],
            json!({ "bizId": "b1", "institutionType": "bank", "entityType": "FIRM", "firmName": "Acme" })
        );
        assert_eq!(value["additionalDetails"], json!({ "show": ["aum"], "aum": "10M" }));
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn incomplete_snapshot_does_not_assemble() {
        let snapshot = FormSnapshot::new("b1", "bank", "FIRM");
        assert_eq!(FinalPayload::assemble(&snapshot, &Value::Null, Utc::now()), None);
    }

    #[test]
    fn same_content_ignores_timestamp() {
        let now = Utc::now();
        let a = FinalPayload::assemble(&acme(), &json!([]), now).expect("complete");
        let b = FinalPayload::assemble(&acme(), &json!([]), now + Duration::seconds(5))
            .expect("complete");
        let c = FinalPayload::assemble(&acme(), &json!({ "checkbox": { "hq": true } }), now)
            .expect("complete");

        assert!(a.same_content(&b));
        assert_ne!(a, b);
        assert!(!a.same_content(&c));
    }
}
