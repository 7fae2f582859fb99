use serde::{Deserialize, Serialize};

use super::{ChangeRecord, Domain, DomainKind, OfflinePolicy};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Op {
	pub key: String,
	pub value: u32,
	pub blocked: bool,
}

impl Op {
	pub fn new(key: &str, value: u32) -> Self {
		Self {
			key: key.to_string(),
			value,
			blocked: false,
		}
	}

	pub fn blocked(key: &str, value: u32) -> Self {
		Self {
			blocked: true,
			..Self::new(key, value)
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notes;

impl Domain for Notes {
	const KIND: DomainKind = DomainKind::Activities;
	const OFFLINE_POLICY: OfflinePolicy = OfflinePolicy::FailFast;

	type Key = String;
	type Payload = Op;
	type Output = u32;

	fn correlation_key(payload: &Op) -> String {
		payload.key.clone()
	}

	fn is_blocked(candidate: &ChangeRecord<Self>, _records: &[ChangeRecord<Self>]) -> bool {
		candidate.payload.blocked
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Waiting;

impl Domain for Waiting {
	const KIND: DomainKind = DomainKind::Reports;
	const OFFLINE_POLICY: OfflinePolicy = OfflinePolicy::WaitForNetwork;

	type Key = String;
	type Payload = Op;
	type Output = u32;

	fn correlation_key(payload: &Op) -> String {
		payload.key.clone()
	}
}
