//! Combined additional-details state: resolver results and manual edits
//! folded into one value.

use crate::snapshot::RequestKey;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    Resolved,
    Manual,
}

/// One event on the additional-details stream.
#[derive(Debug, Clone, PartialEq)]
pub enum AdditionalResult {
    /// Settled lookup for the epoch identified by `request_key`.
    Resolved {
        payload: Value,
        request_key: RequestKey,
    },
    /// User edit. Carries no key: it belongs to whatever epoch is current.
    Manual { payload: Value },
}

/// Accumulated additional details.
///
/// While `has_manual_override` is set, resolved results for the same epoch
/// are ignored. A resolved result for a different epoch clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombinedAdditionalState {
    pub source: Option<ResultSource>,
    pub payload: Value,
    pub has_manual_override: bool,
    pub request_key: Option<RequestKey>,
}

impl CombinedAdditionalState {
    /// Apply one event. Rules are checked in order; the first match wins.
    pub fn fold(self, event: AdditionalResult) -> Self {
        match event {
            AdditionalResult::Resolved {
                payload,
                request_key,
            } if self.request_key.as_ref() != Some(&request_key) => Self {
                source: Some(ResultSource::Resolved),
                payload,
                has_manual_override: false,
                request_key: Some(request_key),
            },
            AdditionalResult::Manual { payload } => Self {
                source: Some(ResultSource::Manual),
                payload,
                has_manual_override: true,
                request_key: self.request_key,
            },
            AdditionalResult::Resolved { .. } if self.has_manual_override => self,
            AdditionalResult::Resolved { payload, .. } => Self {
                source: Some(ResultSource::Resolved),
                payload,
                ..self
            },
        }
    }

    /// Whether this state may be paired with the epoch `key`. A state that
    /// has never seen a resolution has no key and pairs with anything.
    pub fn matches(&self, key: &RequestKey) -> bool {
        self.request_key.as_ref().is_none_or(|own| own == key)
    }
}
