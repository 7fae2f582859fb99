#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

//! Offline change records and the rules that decide what may be sent next.
//!
//! Everything in here is pure: no I/O, no runtime. The async engine that drives
//! these records against a remote registry lives in `hs-core-sync`.

mod dependents;
mod domain;
mod eligibility;
mod error;
mod record;

pub use dependents::{patch_records, results_by_key};
pub use domain::{
	Domain, DomainKind, OfflinePolicy, RetentionPolicy, RetentionScope, MAX_RETENTION_DAYS,
};
pub use eligibility::{is_blocked, next_eligible};
pub use error::{ErrorKind, SubmitError};
pub use record::{ChangeRecord, RecordId, RecordStatus, TransitionError};

#[cfg(test)]
pub(crate) mod test_domain;
