use std::{fmt, hash::Hash, time::Duration};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{ChangeRecord, RecordStatus};

/// The three independent queues of the application. Each one has its own engine,
/// its own persisted record list and its own in-flight slot.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DomainKind {
	Activities,
	Infrastructure,
	Reports,
}

/// What an engine does when the network is not there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflinePolicy {
	/// Do not pick anything while offline; a network error while sending marks the record failed.
	FailFast,
	/// Pick the next record even while offline, hold it `active` and wait for connectivity.
	/// A network error while sending goes back to waiting instead of failing the record.
	WaitForNetwork,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionScope {
	/// Any record past its age is dropped, sent or not.
	All,
	/// Only records the registry accepted are dropped. Pending and failed records are kept
	/// however old they get.
	#[serde(alias = "settled_only")]
	SyncedOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
	pub max_age: Duration,
	pub scope: RetentionScope,
}

/// Longest retention window a config may ask for, about a century.
pub const MAX_RETENTION_DAYS: u64 = 36_500;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

impl RetentionPolicy {
	/// Saturates instead of overflowing on absurd `days`, which then never expire anything.
	#[must_use]
	pub const fn days(days: u64, scope: RetentionScope) -> Self {
		Self {
			max_age: Duration::from_secs(days.saturating_mul(SECS_PER_DAY)),
			scope,
		}
	}

	/// Whether the expiry sweep drops this record at `now`.
	#[must_use]
	pub fn is_expired<D: Domain>(&self, record: &ChangeRecord<D>, now: DateTime<Utc>) -> bool {
		let in_scope = match self.scope {
			RetentionScope::All => true,
			RetentionScope::SyncedOnly => record.status == RecordStatus::Success,
		};

		in_scope
			&& chrono::Duration::from_std(self.max_age)
				.ok()
				.and_then(|max_age| now.checked_sub_signed(max_age))
				.is_some_and(|cutoff| record.created_at < cutoff)
	}
}

/// Binds one queue's types and rules together.
///
/// Implementors are zero sized markers; all the state lives in the record list.
pub trait Domain: fmt::Debug + Clone + Copy + PartialEq + Eq + Send + Sync + 'static {
	const KIND: DomainKind;
	const OFFLINE_POLICY: OfflinePolicy;

	/// Grouping key deciding the scope of fail-stop blocking.
	type Key: fmt::Debug
		+ Clone
		+ PartialEq
		+ Eq
		+ Hash
		+ Serialize
		+ DeserializeOwned
		+ Send
		+ Sync
		+ 'static;

	/// What gets sent. A closed set of variants per domain.
	type Payload: fmt::Debug
		+ Clone
		+ PartialEq
		+ Serialize
		+ DeserializeOwned
		+ Send
		+ Sync
		+ 'static;

	/// What the registry hands back on success.
	type Output: fmt::Debug
		+ Clone
		+ PartialEq
		+ Serialize
		+ DeserializeOwned
		+ Send
		+ Sync
		+ 'static;

	fn correlation_key(payload: &Self::Payload) -> Self::Key;

	/// Domain specific dependency rule, evaluated on top of the generic in-group ordering.
	fn is_blocked(_candidate: &ChangeRecord<Self>, _records: &[ChangeRecord<Self>]) -> bool {
		false
	}

	/// Payload to actually send, with any identifier known from earlier successes filled in.
	fn prepare_payload(
		candidate: &ChangeRecord<Self>,
		_records: &[ChangeRecord<Self>],
	) -> Self::Payload {
		candidate.payload.clone()
	}

	/// Patches records depending on the one at `succeeded`, which just turned `success`.
	/// Returns how many records were changed. Must be idempotent.
	fn resolve_dependents(_records: &mut [ChangeRecord<Self>], _succeeded: usize) -> usize {
		0
	}
}
