use std::collections::HashMap;

use chrono::Utc;

use super::{ChangeRecord, Domain, RecordStatus};

/// Collects a value per correlation key out of every `success` record.
/// When a key succeeded more than once the latest record wins.
pub fn results_by_key<D, T>(
	records: &[ChangeRecord<D>],
	extract: impl Fn(&ChangeRecord<D>) -> Option<T>,
) -> HashMap<D::Key, T>
where
	D: Domain,
{
	records
		.iter()
		.filter(|record| record.status == RecordStatus::Success)
		.filter_map(|record| extract(record).map(|value| (record.correlation_key.clone(), value)))
		.collect()
}

/// Runs `patch` over every record sharing the correlation key of `records[source]`,
/// except that record itself. `patch` reports whether it changed anything, so callers
/// can keep patching idempotent. Returns the number of changed records.
pub fn patch_records<D: Domain>(
	records: &mut [ChangeRecord<D>],
	source: usize,
	mut patch: impl FnMut(&mut ChangeRecord<D>) -> bool,
) -> usize {
	let Some(key) = records.get(source).map(|record| record.correlation_key.clone()) else {
		return 0;
	};

	let mut patched = 0;

	for (index, record) in records.iter_mut().enumerate() {
		if index == source || record.correlation_key != key {
			continue;
		}

		if patch(record) {
			record.updated_at = Utc::now();
			patched += 1;
		}
	}

	patched
}
