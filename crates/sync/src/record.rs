use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{Domain, SubmitError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
	#[must_use]
	pub fn new_v4() -> Self {
		Self(Uuid::new_v4())
	}
}

impl From<Uuid> for RecordId {
	fn from(uuid: Uuid) -> Self {
		Self(uuid)
	}
}

impl From<RecordId> for Uuid {
	fn from(id: RecordId) -> Self {
		id.0
	}
}

impl fmt::Display for RecordId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordStatus {
	Pending,
	Active,
	Success,
	Failure,
}

impl RecordStatus {
	/// `true` for records the remote registry has not acknowledged yet.
	#[must_use]
	pub const fn is_unsynced(self) -> bool {
		!matches!(self, Self::Success)
	}
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid status transition <id='{id}', from='{from}', to='{to}'>")]
pub struct TransitionError {
	pub id: RecordId,
	pub from: RecordStatus,
	pub to: RecordStatus,
}

/// A single offline mutation, queued until the remote registry accepts or rejects it.
///
/// Records are created `pending` by whoever commits the user's action. Afterwards only the
/// sync engine moves them along `pending -> active -> {success, failure}`, and a user retry is
/// the only way back from `failure` to `pending`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(
	serialize = "D::Key: Serialize, D::Payload: Serialize, D::Output: Serialize",
	deserialize = "D::Key: Deserialize<'de>, D::Payload: Deserialize<'de>, D::Output: Deserialize<'de>"
))]
pub struct ChangeRecord<D: Domain> {
	pub id: RecordId,
	pub correlation_key: D::Key,
	pub status: RecordStatus,
	pub payload: D::Payload,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<D::Output>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<SubmitError>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl<D: Domain> ChangeRecord<D> {
	#[must_use]
	pub fn new(payload: D::Payload) -> Self {
		let now = Utc::now();

		Self {
			id: RecordId::new_v4(),
			correlation_key: D::correlation_key(&payload),
			status: RecordStatus::Pending,
			payload,
			result: None,
			error: None,
			created_at: now,
			updated_at: now,
		}
	}

	fn transition(
		&mut self,
		expected: RecordStatus,
		to: RecordStatus,
	) -> Result<(), TransitionError> {
		if self.status != expected {
			return Err(TransitionError {
				id: self.id,
				from: self.status,
				to,
			});
		}

		self.status = to;
		self.updated_at = Utc::now();

		Ok(())
	}

	pub fn activate(&mut self) -> Result<(), TransitionError> {
		self.transition(RecordStatus::Pending, RecordStatus::Active)
	}

	pub fn succeed(&mut self, output: D::Output) -> Result<(), TransitionError> {
		self.transition(RecordStatus::Active, RecordStatus::Success)?;
		self.result = Some(output);
		self.error = None;

		Ok(())
	}

	pub fn fail(&mut self, error: SubmitError) -> Result<(), TransitionError> {
		self.transition(RecordStatus::Active, RecordStatus::Failure)?;
		self.error = Some(error);

		Ok(())
	}

	/// User initiated: puts a failed record back in circulation.
	pub fn retry(&mut self) -> Result<(), TransitionError> {
		self.transition(RecordStatus::Failure, RecordStatus::Pending)?;
		self.error = None;

		Ok(())
	}

	/// Only used when reloading a queue whose engine died mid-submission.
	pub fn demote(&mut self) -> Result<(), TransitionError> {
		self.transition(RecordStatus::Active, RecordStatus::Pending)
	}
}
