//! Content fingerprints and the per-locale record store they are checked against.

pub mod hash;
pub mod normalize;
pub mod staleness;
pub mod store;

pub use hash::fingerprint;
pub use staleness::{check_locale, work_list, LocalePlan, Selection, StaleReason, TargetFilter};
pub use store::{FsRecordStore, RecordStore};
