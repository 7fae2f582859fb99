//! Legally binding harvest reports.
//!
//! Reports of one animal form a chain sharing a `report_guid`. The first permit event of a
//! chain (usually an injured animal) mints the permit and report ids; every later report of
//! the chain, like the animal being found dead, must carry them.

use hs_core_sync::{ChangeRecord, Domain, DomainKind, OfflinePolicy, RecordStatus};
use hs_sync::patch_records;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReportCategory {
	Harvest,
	/// Events on a limited hunt permit.
	PermitEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReportEvent {
	Killed,
	Injured,
	FoundDead,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestReport {
	pub report_guid: Uuid,
	pub category: ReportCategory,
	pub event: ReportEvent,
	/// Amends a report the registry already has, instead of filing a new one.
	pub is_update: bool,
	pub permit_id: Option<i64>,
	pub report_id: Option<i64>,
	pub species: String,
	pub amount: u32,
	pub location: Location,
	pub occurred_at: DateTime<Utc>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

impl HarvestReport {
	/// A follow-up that can only be filed with ids minted by an earlier report of its chain.
	#[must_use]
	pub fn is_dependent(&self) -> bool {
		self.category == ReportCategory::PermitEvent
			&& self.event == ReportEvent::FoundDead
			&& (self.permit_id.is_none() || self.report_id.is_none())
	}

	/// Whether a success of this report mints ids for the rest of its chain.
	#[must_use]
	pub fn mints_ids(&self) -> bool {
		self.category == ReportCategory::PermitEvent && !self.is_update
	}

	fn apply_receipt(&mut self, receipt: &ReportReceipt) -> bool {
		let permit_id = receipt.permit_id.or(self.permit_id);
		let report_id = Some(receipt.report_id);

		if self.permit_id == permit_id && self.report_id == report_id {
			return false;
		}

		self.permit_id = permit_id;
		self.report_id = report_id;

		true
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportReceipt {
	pub report_id: i64,
	pub permit_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarvestReports;

/// Receipt of the latest successful, id minting injured report upstream of `candidate` in its chain.
fn upstream_receipt<'a>(
	candidate: &ChangeRecord<HarvestReports>,
	records: &'a [ChangeRecord<HarvestReports>],
) -> Option<&'a ReportReceipt> {
	records
		.iter()
		.take_while(|record| record.id != candidate.id)
		.filter(|record| {
			record.correlation_key == candidate.correlation_key
				&& record.status == RecordStatus::Success
				&& record.payload.mints_ids()
				&& record.payload.event == ReportEvent::Injured
		})
		.filter_map(|record| record.result.as_ref())
		.last()
}

impl Domain for HarvestReports {
	const KIND: DomainKind = DomainKind::Reports;
	const OFFLINE_POLICY: OfflinePolicy = OfflinePolicy::WaitForNetwork;

	type Key = Uuid;
	type Payload = HarvestReport;
	type Output = ReportReceipt;

	fn correlation_key(payload: &HarvestReport) -> Uuid {
		payload.report_guid
	}

	fn is_blocked(candidate: &ChangeRecord<Self>, records: &[ChangeRecord<Self>]) -> bool {
		candidate.payload.is_dependent() && upstream_receipt(candidate, records).is_none()
	}

	fn prepare_payload(
		candidate: &ChangeRecord<Self>,
		records: &[ChangeRecord<Self>],
	) -> HarvestReport {
		let mut payload = candidate.payload.clone();

		if payload.is_dependent() {
			if let Some(receipt) = upstream_receipt(candidate, records) {
				payload.apply_receipt(receipt);
			}
		}

		payload
	}

	fn resolve_dependents(records: &mut [ChangeRecord<Self>], succeeded: usize) -> usize {
		let Some((category, receipt)) = records
			.get(succeeded)
			.filter(|record| record.payload.mints_ids())
			.and_then(|record| record.result.map(|receipt| (record.payload.category, receipt)))
		else {
			return 0;
		};

		patch_records(records, succeeded, |record| {
			matches!(record.status, RecordStatus::Pending | RecordStatus::Failure)
				&& record.payload.category == category
				&& record.payload.apply_receipt(&receipt)
		})
	}
}
