//! Hunting infrastructure edits (towers, feeders, salt licks).
//!
//! Items are identified locally by a guid until the registry assigns them an id. Updates and
//! deletes of an item created offline are queued before that id exists, so the id is resolved
//! from the create's result right before they are sent.

use hs_core_sync::{ChangeRecord, Domain, DomainKind, OfflinePolicy};
use hs_sync::{patch_records, results_by_key};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Location;

pub type RemoteId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InfrastructureKind {
	Tower,
	Feeder,
	SaltLick,
	Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureItem {
	pub kind: InfrastructureKind,
	pub name: String,
	pub location: Location,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "item", rename_all = "snake_case")]
pub enum Operation {
	Create(InfrastructureItem),
	Update(InfrastructureItem),
	Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureChange {
	pub local_guid: Uuid,
	/// `None` until the item's create went through.
	pub remote_id: Option<RemoteId>,
	pub operation: Operation,
}

impl InfrastructureChange {
	#[must_use]
	pub const fn create(local_guid: Uuid, item: InfrastructureItem) -> Self {
		Self {
			local_guid,
			remote_id: None,
			operation: Operation::Create(item),
		}
	}

	#[must_use]
	pub const fn update(
		local_guid: Uuid,
		remote_id: Option<RemoteId>,
		item: InfrastructureItem,
	) -> Self {
		Self {
			local_guid,
			remote_id,
			operation: Operation::Update(item),
		}
	}

	#[must_use]
	pub const fn delete(local_guid: Uuid, remote_id: Option<RemoteId>) -> Self {
		Self {
			local_guid,
			remote_id,
			operation: Operation::Delete,
		}
	}

	#[must_use]
	pub const fn is_create(&self) -> bool {
		matches!(self.operation, Operation::Create(_))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfrastructureReceipt {
	pub remote_id: RemoteId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Infrastructure;

/// Remote id of every item with at least one acknowledged change.
#[must_use]
pub fn id_by_correlation_key(
	records: &[ChangeRecord<Infrastructure>],
) -> HashMap<Uuid, RemoteId> {
	results_by_key(records, |record| record.result.map(|receipt| receipt.remote_id))
}

fn resolve_remote_id(
	candidate: &ChangeRecord<Infrastructure>,
	records: &[ChangeRecord<Infrastructure>],
) -> Option<RemoteId> {
	candidate.payload.remote_id.or_else(|| {
		id_by_correlation_key(records)
			.get(&candidate.correlation_key)
			.copied()
	})
}

impl Domain for Infrastructure {
	const KIND: DomainKind = DomainKind::Infrastructure;
	const OFFLINE_POLICY: OfflinePolicy = OfflinePolicy::FailFast;

	type Key = Uuid;
	type Payload = InfrastructureChange;
	type Output = InfrastructureReceipt;

	fn correlation_key(payload: &InfrastructureChange) -> Uuid {
		payload.local_guid
	}

	fn is_blocked(candidate: &ChangeRecord<Self>, records: &[ChangeRecord<Self>]) -> bool {
		!candidate.payload.is_create() && resolve_remote_id(candidate, records).is_none()
	}

	fn prepare_payload(
		candidate: &ChangeRecord<Self>,
		records: &[ChangeRecord<Self>],
	) -> InfrastructureChange {
		let mut payload = candidate.payload.clone();

		if !payload.is_create() {
			payload.remote_id = resolve_remote_id(candidate, records);
		}

		payload
	}

	fn resolve_dependents(records: &mut [ChangeRecord<Self>], succeeded: usize) -> usize {
		let Some(remote_id) = records
			.get(succeeded)
			.filter(|record| record.payload.is_create())
			.and_then(|record| record.result)
			.map(|receipt| receipt.remote_id)
		else {
			return 0;
		};

		patch_records(records, succeeded, |record| {
			if record.payload.remote_id == Some(remote_id) {
				false
			} else {
				record.payload.remote_id = Some(remote_id);
				true
			}
		})
	}
}
