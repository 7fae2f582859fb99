//! Hunt activity logging. Events are batched per hunt and only need to reach the registry
//! in the order they happened, which the in-group ordering already guarantees.

use hs_core_sync::{Domain, DomainKind, OfflinePolicy};

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HuntId(pub i64);

impl fmt::Display for HuntId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HuntEvent {
	StartHunt {
		at: DateTime<Utc>,
	},
	PauseHunt {
		at: DateTime<Utc>,
	},
	ResumeHunt {
		at: DateTime<Utc>,
	},
	EndHunt {
		at: DateTime<Utc>,
	},
	Observation {
		at: DateTime<Utc>,
		species: String,
		count: u32,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		location: Option<Location>,
	},
}

impl HuntEvent {
	#[must_use]
	pub fn at(&self) -> DateTime<Utc> {
		match self {
			Self::StartHunt { at }
			| Self::PauseHunt { at }
			| Self::ResumeHunt { at }
			| Self::EndHunt { at }
			| Self::Observation { at, .. } => *at,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HuntActivity {
	pub hunt_id: HuntId,
	pub events: Vec<HuntEvent>,
}

impl HuntActivity {
	#[must_use]
	pub fn single(hunt_id: HuntId, event: HuntEvent) -> Self {
		Self {
			hunt_id,
			events: vec![event],
		}
	}
}

/// Ids the registry assigned to the events of one batch, in the same order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityReceipt {
	pub event_ids: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HuntActivities;

impl Domain for HuntActivities {
	const KIND: DomainKind = DomainKind::Activities;
	const OFFLINE_POLICY: OfflinePolicy = OfflinePolicy::FailFast;

	type Key = HuntId;
	type Payload = HuntActivity;
	type Output = ActivityReceipt;

	fn correlation_key(payload: &HuntActivity) -> HuntId {
		payload.hunt_id
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use hs_core_sync::{ChangeRecord, SubmitError};
	use hs_sync::next_eligible;

	fn event(kind: fn(DateTime<Utc>) -> HuntEvent) -> HuntActivity {
		HuntActivity::single(HuntId(7), kind(Utc::now()))
	}

	#[test]
	fn failed_start_holds_back_the_rest_of_the_hunt() {
		let mut start = ChangeRecord::<HuntActivities>::new(event(|at| HuntEvent::StartHunt { at }));
		start.activate().unwrap();
		start.fail(SubmitError::network("offline")).unwrap();

		let pause = ChangeRecord::<HuntActivities>::new(event(|at| HuntEvent::PauseHunt { at }));
		let other_hunt = ChangeRecord::<HuntActivities>::new(HuntActivity::single(
			HuntId(8),
			HuntEvent::StartHunt { at: Utc::now() },
		));

		let records = vec![start, pause, other_hunt.clone()];

		assert_eq!(next_eligible(&records, true).map(|r| r.id), Some(other_hunt.id));
		assert!(next_eligible(&records, false).is_none());
	}

	#[test]
	fn events_are_tagged_by_type() {
		let at = Utc::now();
		let json = serde_json::to_value(HuntEvent::Observation {
			at,
			species: "moose".to_string(),
			count: 2,
			location: None,
		})
		.unwrap();

		assert_eq!(json["type"], "observation");
		assert!(json.get("location").is_none());
		assert_eq!(serde_json::from_value::<HuntEvent>(json).unwrap().at(), at);
	}
}
