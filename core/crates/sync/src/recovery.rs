use hs_sync::{ChangeRecord, Domain, RecordStatus, RetentionPolicy};

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::warn;

/// Puts records left `active` by an engine that died mid-submission back to `pending`.
///
/// Whether the registry saw the submission is unknowable from here, so the record is sent
/// again; the registry is expected to tolerate the repeat.
pub fn demote_interrupted<D: Domain>(records: &mut [ChangeRecord<D>]) -> usize {
	let mut demoted = 0;

	for record in records
		.iter_mut()
		.filter(|record| record.status == RecordStatus::Active)
	{
		if record.demote().is_ok() {
			warn!(
				domain = %D::KIND,
				id = %record.id,
				"Found change record interrupted mid-submission, back to pending;"
			);
			demoted += 1;
		}
	}

	demoted
}

/// Drops records past their retention window. Returns how many were dropped.
///
/// An expired record survives while any later record of its correlation group survives, so a
/// group is only ever cut from its head and fail-stop ordering holds after the sweep.
pub fn sweep_expired<D: Domain>(
	records: &mut Vec<ChangeRecord<D>>,
	retention: &RetentionPolicy,
	now: DateTime<Utc>,
) -> usize {
	let mut kept_keys = HashSet::new();
	let mut keep = vec![true; records.len()];

	for (idx, record) in records.iter().enumerate().rev() {
		if retention.is_expired(record, now) && !kept_keys.contains(&record.correlation_key) {
			warn!(
				domain = %D::KIND,
				id = %record.id,
				status = %record.status,
				created_at = %record.created_at,
				"Dropping expired change record;"
			);
			keep[idx] = false;
		} else {
			kept_keys.insert(record.correlation_key.clone());
		}
	}

	let before = records.len();

	let mut keep = keep.into_iter();
	records.retain(|_| keep.next().unwrap_or(true));

	before - records.len()
}
