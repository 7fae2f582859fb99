use hs_actors::{Actor, Stopper};
use hs_sync::{
	next_eligible, ChangeRecord, Domain, DomainKind, ErrorKind, OfflinePolicy, RecordId,
	RecordStatus, RetentionPolicy, SubmitError,
};
use hs_utils::error::report_error;

use std::{any::Any, mem, panic::AssertUnwindSafe, pin::pin, sync::Arc};

use async_channel as chan;
use chrono::Utc;
use futures::{future, FutureExt};
use futures_concurrency::future::Race;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, instrument, trace, warn};

use super::{
	client::ProgressReporter,
	queue::Command,
	recovery::{demote_interrupted, sweep_expired},
	ActiveRecord, Error, NetworkState, QueueEvent, QueueSnapshot, QueueState, RecordStore,
	RemoteClient, SyncQueue,
};

const EVENTS_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct EngineConfig {
	/// Applied once, when the record list is loaded.
	pub retention: Option<RetentionPolicy>,
	pub command_capacity: usize,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			retention: None,
			command_capacity: 32,
		}
	}
}

#[derive(Debug, Default)]
enum State {
	#[default]
	Idle,
	VerifyingNetwork(RecordId),
	/// `after_failure` means the last attempt hit a network error while we believed we were
	/// online, so only a fresh transition to online resumes sending.
	WaitingForNetwork {
		id: RecordId,
		after_failure: bool,
	},
	Syncing(RecordId),
}

impl State {
	const fn queue_state(&self) -> QueueState {
		match self {
			Self::Idle => QueueState::Idle,
			Self::VerifyingNetwork(_) => QueueState::VerifyingNetworkConnection,
			Self::WaitingForNetwork { .. } => QueueState::WaitingForNetworkConnection,
			Self::Syncing(_) => QueueState::Syncing,
		}
	}
}

enum Trigger<D: Domain> {
	Command(Command<D>),
	Network(NetworkState),
	Closed,
}

enum SyncingMessage<D: Domain> {
	Submitted(Result<D::Output, SubmitError>),
	Command(Result<Command<D>, chan::RecvError>),
	Progress(Result<f32, chan::RecvError>),
	Network(NetworkState),
}

/// The single-flight sync loop of one domain queue.
///
/// Owns the record list exclusively: every mutation goes through this actor, is persisted as a
/// whole list right away and then published to [`SyncQueue`] observers. The queue region is the
/// [`State`] machine below; the network region is fed by a [`NetworkMonitor`] subscription and
/// only acts as a guard on the queue transitions.
///
/// [`NetworkMonitor`]: super::NetworkMonitor
pub struct Engine<D: Domain> {
	state: State,
	queue_state: QueueState,
	records: Vec<ChangeRecord<D>>,
	network: NetworkState,
	network_rx: watch::Receiver<NetworkState>,
	command_rx: chan::Receiver<Command<D>>,
	snapshot_tx: watch::Sender<QueueSnapshot<D>>,
	events_tx: broadcast::Sender<QueueEvent>,
	progress: Option<f32>,
	store: Arc<dyn RecordStore<D>>,
	client: Arc<dyn RemoteClient<D>>,
	closed: bool,
}

impl<D: Domain> Engine<D> {
	/// Loads the persisted list, recovers it from an unclean shutdown, sweeps expired records,
	/// and returns the engine together with its handle. The engine does nothing until it runs.
	#[instrument(skip_all, fields(domain = %D::KIND), err)]
	pub async fn load(
		store: Arc<dyn RecordStore<D>>,
		client: Arc<dyn RemoteClient<D>>,
		mut network_rx: watch::Receiver<NetworkState>,
		config: &EngineConfig,
	) -> Result<(Self, SyncQueue<D>), Error> {
		let mut records = store.load().await?.unwrap_or_default();

		let demoted = demote_interrupted(&mut records);
		let expired = config
			.retention
			.as_ref()
			.map_or(0, |retention| sweep_expired(&mut records, retention, Utc::now()));

		if demoted + expired > 0 {
			store.save(&records).await?;
		}

		debug!(
			records_count = records.len(),
			demoted, expired, "Loaded change records;"
		);

		let network = *network_rx.borrow_and_update();

		let (command_tx, command_rx) = chan::bounded(config.command_capacity.max(1));
		let (snapshot_tx, snapshot_rx) = watch::channel(QueueSnapshot {
			records: records.clone(),
			queue: QueueState::Idle,
			network,
			active: None,
		});
		let (events_tx, _) = broadcast::channel(EVENTS_CAPACITY);

		Ok((
			Self {
				state: State::Idle,
				queue_state: QueueState::Idle,
				records,
				network,
				network_rx,
				command_rx,
				snapshot_tx,
				events_tx: events_tx.clone(),
				progress: None,
				store,
				client,
				closed: false,
			},
			SyncQueue {
				command_tx,
				snapshot_rx,
				events_tx,
			},
		))
	}

	#[instrument(skip(self), fields(domain = %D::KIND, old_state = ?self.state))]
	async fn tick(&mut self) {
		let state = mem::take(&mut self.state);
		self.queue_state = state.queue_state();

		let state = match state {
			State::Idle => self.idle_state_transition().await,
			State::VerifyingNetwork(id) => self.verifying_network_state_transition(id).await,
			State::WaitingForNetwork { id, after_failure } => {
				self.waiting_for_network_state_transition(id, after_failure)
					.await
			}
			State::Syncing(id) => self.syncing_state_transition(id).await,
		};

		trace!(?state, "Sync engine state transitioned;");

		self.queue_state = state.queue_state();
		self.state = state;
		self.publish();
	}

	async fn idle_state_transition(&mut self) -> State {
		loop {
			if let Some(state) = self.activate_next().await {
				return state;
			}

			self.publish();

			match self.next_trigger().await {
				Trigger::Command(command) => self.handle_command(command).await,
				Trigger::Network(network) => self.network = network,
				Trigger::Closed => {
					self.closed = true;
					return State::Idle;
				}
			}
		}
	}

	async fn verifying_network_state_transition(&mut self, id: RecordId) -> State {
		loop {
			match self.network {
				NetworkState::Online => return State::Syncing(id),
				NetworkState::Offline => {
					return State::WaitingForNetwork {
						id,
						after_failure: false,
					}
				}
				NetworkState::Loading => {}
			}

			self.publish();

			match self.next_trigger().await {
				Trigger::Command(command) => self.handle_command(command).await,
				Trigger::Network(network) => self.network = network,
				Trigger::Closed => {
					self.closed = true;
					return State::VerifyingNetwork(id);
				}
			}
		}
	}

	async fn waiting_for_network_state_transition(
		&mut self,
		id: RecordId,
		after_failure: bool,
	) -> State {
		if !after_failure && self.network.is_online() {
			return State::Syncing(id);
		}

		loop {
			self.publish();

			match self.next_trigger().await {
				Trigger::Network(network) => {
					self.network = network;
					if network.is_online() {
						return State::Syncing(id);
					}
				}
				// An explicit nudge is the only other way out after a failed attempt
				Trigger::Command(Command::Reevaluate) if self.network.is_online() => {
					return State::Syncing(id);
				}
				Trigger::Command(command) => self.handle_command(command).await,
				Trigger::Closed => {
					self.closed = true;
					return State::WaitingForNetwork { id, after_failure };
				}
			}
		}
	}

	async fn syncing_state_transition(&mut self, id: RecordId) -> State {
		let Some(index) = self.position(id) else {
			error!(%id, "Active change record vanished from the queue");
			return State::Idle;
		};

		let payload = D::prepare_payload(&self.records[index], &self.records);
		if payload != self.records[index].payload {
			debug!(%id, "Back-filled identifiers before sending;");
			self.records[index].payload = payload.clone();
			self.records[index].updated_at = Utc::now();
			self.persist().await;
		}

		let (progress, progress_rx) = ProgressReporter::new();
		self.progress = None;
		self.publish();

		debug!(%id, "Submitting change record;");

		let mut submission = pin!({
			let client = Arc::clone(&self.client);
			async move {
				AssertUnwindSafe(client.submit(payload, progress))
					.catch_unwind()
					.await
					.unwrap_or_else(|panic| {
						Err(SubmitError::unexpected(format!(
							"submission panicked: {}",
							panic_message(panic.as_ref())
						)))
					})
			}
		});

		let mut commands_open = true;
		let mut progress_open = true;

		let outcome = loop {
			let message = {
				let Self {
					command_rx,
					network_rx,
					..
				} = self;

				(
					submission.as_mut().map(SyncingMessage::Submitted),
					recv_or_pending(command_rx, commands_open).map(SyncingMessage::Command),
					recv_or_pending(&progress_rx, progress_open).map(SyncingMessage::Progress),
					network_changed(network_rx).map(SyncingMessage::Network),
				)
					.race()
					.await
			};

			match message {
				SyncingMessage::Submitted(outcome) => break outcome,
				SyncingMessage::Command(Ok(command)) => self.handle_command(command).await,
				SyncingMessage::Command(Err(_)) => {
					// nobody can send us anything anymore, finish this submission and wind down
					commands_open = false;
					self.closed = true;
				}
				SyncingMessage::Progress(Ok(fraction)) => {
					self.progress = Some(fraction);
					self.publish();
				}
				SyncingMessage::Progress(Err(_)) => progress_open = false,
				SyncingMessage::Network(network) => {
					self.network = network;
					self.publish();
				}
			}
		};

		self.progress = None;

		self.apply_outcome(id, outcome).await
	}

	async fn apply_outcome(
		&mut self,
		id: RecordId,
		outcome: Result<D::Output, SubmitError>,
	) -> State {
		let Some(index) = self.position(id) else {
			error!(%id, "Submitted change record vanished from the queue");
			return State::Idle;
		};

		match outcome {
			Ok(output) => {
				if let Err(e) = self.records[index].succeed(output) {
					error!(?e, "Failed to mark change record as synced");
					return State::Idle;
				}

				let patched = D::resolve_dependents(&mut self.records, index);

				self.persist().await;

				info!(domain = %D::KIND, %id, patched, "Change record synced;");

				self.emit(QueueEvent::Synced(id));
			}

			Err(e)
				if e.kind() == ErrorKind::Network
					&& D::OFFLINE_POLICY == OfflinePolicy::WaitForNetwork =>
			{
				warn!(
					domain = %D::KIND,
					%id,
					%e,
					"Network failure while sending, waiting for connectivity;"
				);

				return State::WaitingForNetwork {
					id,
					after_failure: true,
				};
			}

			Err(e) => {
				let kind = e.kind();

				if kind == ErrorKind::Unexpected {
					error!(domain = %D::KIND, %id, %e, "Change record failed unexpectedly;");
				} else {
					warn!(domain = %D::KIND, %id, %e, "Change record failed;");
				}

				if let Err(e) = self.records[index].fail(e) {
					error!(?e, "Failed to mark change record as failed");
					return State::Idle;
				}

				self.persist().await;

				self.emit(QueueEvent::Failed(id, kind));
			}
		}

		State::Idle
	}

	/// Picks the next eligible record, marks it `active` and persists before anything is sent.
	async fn activate_next(&mut self) -> Option<State> {
		let id = next_eligible(&self.records, self.network.is_online())?.id;
		let index = self.position(id)?;

		if let Err(e) = self.records[index].activate() {
			error!(?e, "Eligible change record refused activation");
			return None;
		}

		self.persist().await;

		trace!(%id, "Activated change record;");

		Some(match D::OFFLINE_POLICY {
			OfflinePolicy::FailFast => State::Syncing(id),
			OfflinePolicy::WaitForNetwork => State::VerifyingNetwork(id),
		})
	}

	async fn handle_command(&mut self, command: Command<D>) {
		match command {
			Command::Add { record, ack } => {
				let res = self.add(record).await;
				if ack.send(res).is_err() {
					trace!("Add acknowledgement dropped by the caller");
				}
			}

			Command::Retry { id, ack } => {
				let res = self.retry(id).await;
				if ack.send(res).is_err() {
					trace!("Retry acknowledgement dropped by the caller");
				}
			}

			Command::Reevaluate => trace!("Re-evaluation requested"),
		}
	}

	async fn add(&mut self, record: ChangeRecord<D>) -> Result<RecordId, Error> {
		if record.status != RecordStatus::Pending {
			return Err(Error::NotPending(record.id));
		}

		if self.position(record.id).is_some() {
			return Err(Error::DuplicateRecord(record.id));
		}

		let id = record.id;
		self.records.push(record);
		self.persist().await;

		debug!(domain = %D::KIND, %id, "Queued change record;");

		self.emit(QueueEvent::Added(id));
		self.publish();

		Ok(id)
	}

	async fn retry(&mut self, id: RecordId) -> Result<(), Error> {
		let index = self.position(id).ok_or(Error::RecordNotFound(id))?;
		let record = &mut self.records[index];

		if let Some(error) = record.error.as_ref().filter(|error| !error.is_retryable()) {
			return Err(Error::NotRetryable {
				id,
				error: error.clone(),
			});
		}

		record.retry()?;
		self.persist().await;

		info!(domain = %D::KIND, %id, "Retrying change record;");

		self.emit(QueueEvent::Retried(id));
		self.publish();

		Ok(())
	}

	async fn next_trigger(&mut self) -> Trigger<D> {
		let Self {
			command_rx,
			network_rx,
			..
		} = self;

		(
			command_rx
				.recv()
				.map(|res| res.map_or(Trigger::Closed, Trigger::Command)),
			network_changed(network_rx).map(Trigger::Network),
		)
			.race()
			.await
	}

	fn position(&self, id: RecordId) -> Option<usize> {
		self.records.iter().position(|record| record.id == id)
	}

	async fn persist(&self) {
		report_error(
			&self.store.save(&self.records).await,
			"Failed to persist change records",
		);
	}

	fn emit(&self, event: QueueEvent) {
		if self.events_tx.send(event).is_err() {
			trace!("No queue event subscribers");
		}
	}

	fn publish(&self) {
		let active = self
			.records
			.iter()
			.find(|record| record.status == RecordStatus::Active)
			.map(|record| ActiveRecord {
				id: record.id,
				progress: self.progress,
				waiting_for_network: self.queue_state == QueueState::WaitingForNetworkConnection,
			});

		self.snapshot_tx.send_replace(QueueSnapshot {
			records: self.records.clone(),
			queue: self.queue_state,
			network: self.network,
			active,
		});
	}

	/// Refuses anything still queued once the engine winds down, so callers
	/// waiting on an acknowledgement get [`Error::EngineClosed`] instead of hanging.
	fn close(&mut self) {
		self.command_rx.close();

		while let Ok(command) = self.command_rx.try_recv() {
			trace!(?command, "Dropping command sent to a stopped engine");
		}
	}
}

impl<D: Domain> Actor<DomainKind> for Engine<D> {
	const IDENTIFIER: DomainKind = D::KIND;

	async fn run(&mut self, stop: Stopper) {
		enum Race {
			Ticked,
			Stopped,
		}

		info!(domain = %D::KIND, "Sync engine started;");

		self.network = *self.network_rx.borrow_and_update();
		self.publish();

		while !self.closed
			&& matches!(
				(
					self.tick().map(|()| Race::Ticked),
					stop.stopped().map(|()| Race::Stopped),
				)
					.race()
					.await,
				Race::Ticked
			) { /* Everything is Awesome! */ }

		self.close();

		info!(domain = %D::KIND, "Sync engine stopped;");
	}
}

async fn recv_or_pending<T>(rx: &chan::Receiver<T>, open: bool) -> Result<T, chan::RecvError> {
	if open {
		rx.recv().await
	} else {
		future::pending().await
	}
}

async fn network_changed(rx: &mut watch::Receiver<NetworkState>) -> NetworkState {
	if rx.changed().await.is_ok() {
		*rx.borrow_and_update()
	} else {
		// monitor gone, the last known state stays
		future::pending().await
	}
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
	panic
		.downcast_ref::<&str>()
		.copied()
		.or_else(|| panic.downcast_ref::<String>().map(String::as_str))
		.unwrap_or("unknown panic")
}
