use hs_sync::{ChangeRecord, Domain, ErrorKind, RecordId, RecordStatus};

use async_channel as chan;
use serde::Serialize;
use tokio::sync::{broadcast, oneshot, watch};

use super::{Error, NetworkState};

/// The queue region of an engine, as seen from outside.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
	#[default]
	Idle,
	Syncing,
	VerifyingNetworkConnection,
	WaitingForNetworkConnection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRecord {
	pub id: RecordId,
	/// Last fraction reported by the client for this submission.
	pub progress: Option<f32>,
	pub waiting_for_network: bool,
}

/// Everything a UI needs to render a queue. Published after every mutation.
#[derive(Debug, Clone)]
pub struct QueueSnapshot<D: Domain> {
	pub records: Vec<ChangeRecord<D>>,
	pub queue: QueueState,
	pub network: NetworkState,
	pub active: Option<ActiveRecord>,
}

impl<D: Domain> QueueSnapshot<D> {
	/// Records not yet acknowledged by the registry, failed ones included.
	#[must_use]
	pub fn unsynced_count(&self) -> usize {
		self.records
			.iter()
			.filter(|record| record.status.is_unsynced())
			.count()
	}

	#[must_use]
	pub fn failed_count(&self) -> usize {
		self.count(RecordStatus::Failure)
	}

	#[must_use]
	pub fn count(&self, status: RecordStatus) -> usize {
		self.records
			.iter()
			.filter(|record| record.status == status)
			.count()
	}

	#[must_use]
	pub fn waiting_for_network(&self) -> bool {
		self.active
			.as_ref()
			.is_some_and(|active| active.waiting_for_network)
	}

	#[must_use]
	pub fn record(&self, id: RecordId) -> Option<&ChangeRecord<D>> {
		self.records.iter().find(|record| record.id == id)
	}

	pub fn records_for_key<'a>(
		&'a self,
		key: &'a D::Key,
	) -> impl Iterator<Item = &'a ChangeRecord<D>> + 'a {
		self.records
			.iter()
			.filter(move |record| &record.correlation_key == key)
	}
}

/// Fired for cache invalidation and badges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
	Added(RecordId),
	Synced(RecordId),
	Failed(RecordId, ErrorKind),
	Retried(RecordId),
}

#[derive(Debug)]
pub(crate) enum Command<D: Domain> {
	Add {
		record: ChangeRecord<D>,
		ack: oneshot::Sender<Result<RecordId, Error>>,
	},
	Retry {
		id: RecordId,
		ack: oneshot::Sender<Result<(), Error>>,
	},
	Reevaluate,
}

/// Handle to one domain's engine. Cheap to clone; commands are processed in order.
#[derive(Debug)]
pub struct SyncQueue<D: Domain> {
	pub(crate) command_tx: chan::Sender<Command<D>>,
	pub(crate) snapshot_rx: watch::Receiver<QueueSnapshot<D>>,
	pub(crate) events_tx: broadcast::Sender<QueueEvent>,
}

impl<D: Domain> Clone for SyncQueue<D> {
	fn clone(&self) -> Self {
		Self {
			command_tx: self.command_tx.clone(),
			snapshot_rx: self.snapshot_rx.clone(),
			events_tx: self.events_tx.clone(),
		}
	}
}

impl<D: Domain> SyncQueue<D> {
	/// Queues a new mutation, returns the id of the record created for it.
	pub async fn add(&self, payload: D::Payload) -> Result<RecordId, Error> {
		self.add_record(ChangeRecord::new(payload)).await
	}

	/// Queues a record built by the caller. It must still be `pending`.
	pub async fn add_record(&self, record: ChangeRecord<D>) -> Result<RecordId, Error> {
		let (ack, ack_rx) = oneshot::channel();

		self.command_tx
			.send(Command::Add { record, ack })
			.await
			.map_err(|_| Error::EngineClosed)?;

		ack_rx.await.map_err(|_| Error::EngineClosed)?
	}

	/// User initiated retry of a `failure` record.
	pub async fn retry(&self, id: RecordId) -> Result<(), Error> {
		let (ack, ack_rx) = oneshot::channel();

		self.command_tx
			.send(Command::Retry { id, ack })
			.await
			.map_err(|_| Error::EngineClosed)?;

		ack_rx.await.map_err(|_| Error::EngineClosed)?
	}

	/// Asks the engine to look at its queue again, e.g. when the app comes to the foreground.
	pub async fn reevaluate(&self) -> Result<(), Error> {
		self.command_tx
			.send(Command::Reevaluate)
			.await
			.map_err(|_| Error::EngineClosed)
	}

	#[must_use]
	pub fn snapshot(&self) -> QueueSnapshot<D> {
		self.snapshot_rx.borrow().clone()
	}

	#[must_use]
	pub fn subscribe(&self) -> watch::Receiver<QueueSnapshot<D>> {
		self.snapshot_rx.clone()
	}

	#[must_use]
	pub fn events(&self) -> broadcast::Receiver<QueueEvent> {
		self.events_tx.subscribe()
	}

	#[must_use]
	pub fn unsynced_count(&self) -> usize {
		self.snapshot_rx.borrow().unsynced_count()
	}

	/// Resolves with the first published snapshot satisfying `predicate`, the current one included.
	pub async fn wait_for(
		&self,
		predicate: impl FnMut(&QueueSnapshot<D>) -> bool,
	) -> Result<QueueSnapshot<D>, Error> {
		let mut rx = self.snapshot_rx.clone();

		rx.wait_for(predicate)
			.await
			.map(|snapshot| snapshot.clone())
			.map_err(|_| Error::EngineClosed)
	}
}
