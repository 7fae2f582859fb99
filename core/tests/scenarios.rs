use hs_core::{
	sync::{NetworkEvent, RecordStatus, SubmitError},
	HarvestReport, HuntActivity, HuntEvent, HuntId, InfrastructureChange, InfrastructureItem,
	InfrastructureKind, InfrastructureReceipt, Location, ReportCategory, ReportEvent,
	ReportReceipt,
};

use std::time::Duration;

use chrono::Utc;
use tempfile::tempdir;
use tokio::time::sleep;
use tracing_test::traced_test;
use uuid::Uuid;

mod common;

use common::{settle, start_session, Registries, Registry};

const HERE: Location = Location {
	latitude: 63.43,
	longitude: 10.39,
};

#[tokio::test]
#[traced_test]
async fn update_uses_the_id_minted_by_its_create() {
	let data_dir = tempdir().unwrap();
	let registries = Registries {
		infrastructure: Registry::new(|change: &InfrastructureChange, _| {
			Ok(InfrastructureReceipt {
				remote_id: change.remote_id.unwrap_or(42),
			})
		}),
		..Default::default()
	};
	let session = start_session(data_dir.path(), &registries, true).await;
	let queue = session.infrastructure();

	let g1 = Uuid::new_v4();
	let feeder = InfrastructureItem {
		kind: InfrastructureKind::Feeder,
		name: "Bog feeder".to_string(),
		location: HERE,
		description: None,
	};

	queue
		.add(InfrastructureChange::create(g1, feeder.clone()))
		.await
		.unwrap();
	settle(queue, |s| s.count(RecordStatus::Success) == 1).await;

	let update = queue
		.add(InfrastructureChange::update(g1, None, feeder))
		.await
		.unwrap();
	let snapshot = settle(queue, |s| s.count(RecordStatus::Success) == 2).await;

	let sent = registries.infrastructure.sent();
	assert_eq!(sent.len(), 2);
	assert_eq!(sent[1].remote_id, Some(42));
	assert_eq!(snapshot.record(update).unwrap().payload.remote_id, Some(42));

	session.logout().await;
}

#[tokio::test]
#[traced_test]
async fn failed_start_holds_back_the_rest_of_the_hunt() {
	let data_dir = tempdir().unwrap();
	let registries = Registries {
		activities: Registry::new(|activity: &HuntActivity, attempt| {
			if attempt == 0 {
				Err(SubmitError::network("connection reset"))
			} else {
				Ok(hs_core::ActivityReceipt {
					event_ids: vec![100; activity.events.len()],
				})
			}
		}),
		..Default::default()
	};
	let session = start_session(data_dir.path(), &registries, true).await;
	let queue = session.activities();

	let start = queue
		.add(HuntActivity::single(
			HuntId(7),
			HuntEvent::StartHunt { at: Utc::now() },
		))
		.await
		.unwrap();
	let pause = queue
		.add(HuntActivity::single(
			HuntId(7),
			HuntEvent::PauseHunt { at: Utc::now() },
		))
		.await
		.unwrap();

	let snapshot = settle(queue, |s| s.failed_count() == 1).await;
	assert_eq!(snapshot.record(pause).unwrap().status, RecordStatus::Pending);

	sleep(Duration::from_millis(100)).await;
	assert_eq!(registries.activities.attempts(), 1);
	assert_eq!(
		queue.snapshot().record(pause).unwrap().status,
		RecordStatus::Pending
	);

	queue.retry(start).await.unwrap();
	settle(queue, |s| s.unsynced_count() == 0).await;

	let sent = registries
		.activities
		.sent()
		.into_iter()
		.map(|activity| activity.events[0].clone())
		.collect::<Vec<_>>();
	assert!(matches!(
		sent.as_slice(),
		[
			HuntEvent::StartHunt { .. },
			HuntEvent::StartHunt { .. },
			HuntEvent::PauseHunt { .. }
		]
	));

	session.logout().await;
}

fn permit_event(guid: Uuid, event: ReportEvent) -> HarvestReport {
	HarvestReport {
		report_guid: guid,
		category: ReportCategory::PermitEvent,
		event,
		is_update: false,
		permit_id: None,
		report_id: None,
		species: "red deer".to_string(),
		amount: 1,
		location: HERE,
		occurred_at: Utc::now(),
		description: None,
	}
}

#[tokio::test]
#[traced_test]
async fn found_dead_carries_the_ids_of_the_injured_report() {
	let data_dir = tempdir().unwrap();
	let registries = Registries {
		reports: Registry::new(|report: &HarvestReport, _| {
			Ok(match report.event {
				ReportEvent::Injured => ReportReceipt {
					report_id: 9,
					permit_id: Some(5),
				},
				_ => ReportReceipt {
					report_id: report.report_id.unwrap_or(0) + 1,
					permit_id: report.permit_id,
				},
			})
		}),
		..Default::default()
	};
	let session = start_session(data_dir.path(), &registries, true).await;
	let queue = session.reports();

	let x = Uuid::new_v4();
	queue.add(permit_event(x, ReportEvent::Injured)).await.unwrap();
	let found_dead = queue
		.add(permit_event(x, ReportEvent::FoundDead))
		.await
		.unwrap();

	let snapshot = settle(queue, |s| s.count(RecordStatus::Success) == 2).await;

	let sent = registries.reports.sent();
	assert_eq!(sent.len(), 2);
	assert_eq!((sent[1].permit_id, sent[1].report_id), (Some(5), Some(9)));

	let record = snapshot.record(found_dead).unwrap();
	assert_eq!(
		(record.payload.permit_id, record.payload.report_id),
		(Some(5), Some(9))
	);

	session.logout().await;
}

#[tokio::test]
#[traced_test]
async fn offline_report_waits_and_is_sent_once_online() {
	let data_dir = tempdir().unwrap();
	let registries = Registries::default();
	let session = start_session(data_dir.path(), &registries, false).await;
	let queue = session.reports();

	let id = queue
		.add(HarvestReport {
			category: ReportCategory::Harvest,
			..permit_event(Uuid::new_v4(), ReportEvent::Killed)
		})
		.await
		.unwrap();

	let snapshot = settle(queue, |s| s.waiting_for_network()).await;
	assert_eq!(snapshot.record(id).unwrap().status, RecordStatus::Active);
	assert_eq!(registries.reports.attempts(), 0);

	session.network().handle(NetworkEvent::Available);

	settle(queue, |s| s.unsynced_count() == 0).await;
	assert_eq!(registries.reports.attempts(), 1);

	session.logout().await;
}
