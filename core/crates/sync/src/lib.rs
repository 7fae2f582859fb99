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

use hs_sync::TransitionError;

use thiserror::Error;

mod client;
mod engine;
mod network;
mod queue;
mod recovery;
mod store;

pub use client::{ProgressReporter, RemoteClient};
pub use engine::{Engine, EngineConfig};
pub use network::{NetworkEvent, NetworkMonitor, NetworkState, ReachabilityProbe, TcpProbe};
pub use queue::{ActiveRecord, QueueEvent, QueueSnapshot, QueueState, SyncQueue};
pub use recovery::{demote_interrupted, sweep_expired};
pub use store::{JsonFileStore, MemoryStore, RecordStore, StoreError};

pub use hs_sync::{
	ChangeRecord, Domain, DomainKind, ErrorKind, OfflinePolicy, RecordId, RecordStatus,
	RetentionPolicy, RetentionScope, SubmitError, MAX_RETENTION_DAYS,
};

#[derive(Debug, Error)]
pub enum Error {
	#[error("change record not found <id='{0}'>")]
	RecordNotFound(RecordId),
	#[error("duplicate change record <id='{0}'>")]
	DuplicateRecord(RecordId),
	#[error("new change records must be pending <id='{0}'>")]
	NotPending(RecordId),
	#[error("change record failure is not retryable <id='{id}'>: {error}")]
	NotRetryable { id: RecordId, error: SubmitError },
	#[error(transparent)]
	Transition(#[from] TransitionError),
	#[error(transparent)]
	Store(#[from] StoreError),
	#[error("sync engine is not running")]
	EngineClosed,
}
