//! Form snapshots and the identities derived from them.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Raw form state as the UI last saw it.
///
/// Replaced wholesale on every edit. Two snapshots with equal content are the
/// same epoch, whatever order their fields were entered in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    /// Per-entity field values, keyed by entity type then field name
    #[serde(default)]
    pub fields_by_entity: BTreeMap<String, Map<String, Value>>,
}

impl FormSnapshot {
    pub fn new(
        business_id: impl Into<String>,
        institution_type: impl Into<String>,
        entity_type: impl Into<String>,
    ) -> Self {
        Self {
            business_id: Some(business_id.into()),
            institution_type: Some(institution_type.into()),
            entity_type: Some(entity_type.into()),
            fields_by_entity: BTreeMap::new(),
        }
    }

    /// Set one field under `entity`.
    pub fn with_field(
        mut self,
        entity: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.fields_by_entity
            .entry(entity.into())
            .or_default()
            .insert(name.into(), value.into());
        self
    }

    /// Fields of the selected entity type that actually carry a value.
    pub fn extracted_fields(&self) -> Map<String, Value> {
        let Some(entity) = present(&self.entity_type) else {
            return Map::new();
        };
        self.fields_by_entity
            .get(entity)
            .map(|fields| {
                fields
                    .iter()
                    .filter(|(_, value)| is_populated(value))
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether the snapshot is complete enough to resolve and query.
    pub fn is_complete(&self) -> bool {
        present(&self.business_id).is_some()
            && present(&self.institution_type).is_some()
            && present(&self.entity_type).is_some()
            && !self.extracted_fields().is_empty()
    }

    /// Identity of this snapshot's epoch.
    pub fn request_key(&self) -> RequestKey {
        let mut root = Map::new();
        if let Some(business_id) = &self.business_id {
            root.insert("businessId".into(), Value::String(business_id.clone()));
        }
        if let Some(institution_type) = &self.institution_type {
            root.insert(
                "institutionType".into(),
                Value::String(institution_type.clone()),
            );
        }
        if let Some(entity_type) = &self.entity_type {
            root.insert("entityType".into(), Value::String(entity_type.clone()));
        }
        let fields: Map<String, Value> = self
            .fields_by_entity
            .iter()
            .map(|(entity, fields)| (entity.clone(), Value::Object(fields.clone())))
            .collect();
        root.insert("fieldsByEntity".into(), Value::Object(fields));
        // serde_json maps are ordered, so equal snapshots serialize identically.
        RequestKey(Value::Object(root).to_string())
    }

    /// Request body for the lookup service, or `None` if incomplete.
    pub fn lookup_request(&self) -> Option<LookupRequest> {
        if !self.is_complete() {
            return None;
        }
        Some(LookupRequest {
            biz_id: present(&self.business_id)?.to_string(),
            institution_type: present(&self.institution_type)?.to_string(),
            entity_type: present(&self.entity_type)?.to_string(),
            fields: self.extracted_fields(),
        })
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn is_populated(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

/// Opaque epoch identity: the canonical serialization of a [`FormSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey(String);

/// Lookup input assembled from a complete snapshot.
///
/// Serializes flat: `{ bizId, institutionType, entityType, ...fields }`.
/// A field that reuses one of the three header names overrides it.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupRequest {
    pub biz_id: String,
    pub institution_type: String,
    pub entity_type: String,
    pub fields: Map<String, Value>,
}

impl LookupRequest {
    pub fn to_body(&self) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("bizId".into(), Value::String(self.biz_id.clone()));
        body.insert(
            "institutionType".into(),
            Value::String(self.institution_type.clone()),
        );
        body.insert("entityType".into(), Value::String(self.entity_type.clone()));
        body.extend(self.fields.clone());
        body
    }
}

impl Serialize for LookupRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_body().serialize(serializer)
    }
}
