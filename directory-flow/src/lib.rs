//! Directory search data flow
//!
//! Turns high-frequency form edits into settled search payloads in three
//! stages:
//!
//! ```text
//! update_form_values ─► debounce (500ms) ─► distinct ─┬─► resolver ─► lookup service
//!                                                     │       │ settle / fail-soft
//! update_additional_manually ─────────────────────────┼──► combined details (fold)
//!                                                     ▼       │
//!                                     assembler (key + loading gate)
//!                                                     │
//!                                     debounce (300ms) ─► distinct ─► FinalPayload
//! ```
//!
//! A [`DirectoryFlow`] owns all of its state. Callers push snapshots and
//! manual edits in, and subscribe to final payloads and the loading flag.
//! Lookup failures never stop the flow; they degrade to "no additional details".

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod combined;
pub mod config;
pub mod details;
pub mod errors;
pub mod flow;
pub mod lookup;
pub mod payload;
pub mod snapshot;

pub use combined::{AdditionalResult, CombinedAdditionalState, ResultSource};
pub use config::{FlowConfig, LookupConfig};
pub use details::{AdditionalDetails, RawAdditional};
pub use errors::{FlowError, Result};
pub use flow::{DirectoryFlow, EpochPhase};
pub use lookup::{AdditionalDetailsLookup, HttpAdditionalDetailsLookup, LookupError};
pub use payload::FinalPayload;
pub use snapshot::{FormSnapshot, LookupRequest, RequestKey};
