use super::{ChangeRecord, Domain, OfflinePolicy, RecordStatus};

/// Picks the record the engine may send next, if any.
///
/// Records are scanned in insertion order. A `pending` record is skipped (but does not stop the
/// scan) when an earlier record of its correlation group has not gone through yet, or when its
/// domain says it depends on something unresolved. Nothing is eligible while a record is `active`,
/// and `FailFast` domains pick nothing while offline.
#[must_use]
pub fn next_eligible<D: Domain>(
	records: &[ChangeRecord<D>],
	online: bool,
) -> Option<&ChangeRecord<D>> {
	if !online && D::OFFLINE_POLICY == OfflinePolicy::FailFast {
		return None;
	}

	if records
		.iter()
		.any(|record| record.status == RecordStatus::Active)
	{
		return None;
	}

	records
		.iter()
		.enumerate()
		.filter(|(_, record)| record.status == RecordStatus::Pending)
		.find(|&(index, record)| !is_blocked(record, &records[..index], records))
		.map(|(_, record)| record)
}

/// `earlier` holds every record inserted before `candidate`, `records` the whole list.
#[must_use]
pub fn is_blocked<D: Domain>(
	candidate: &ChangeRecord<D>,
	earlier: &[ChangeRecord<D>],
	records: &[ChangeRecord<D>],
) -> bool {
	earlier.iter().any(|record| {
		record.correlation_key == candidate.correlation_key
			&& matches!(record.status, RecordStatus::Pending | RecordStatus::Failure)
	}) || D::is_blocked(candidate, records)
}
