#![allow(dead_code)]

use hs_actors::ActorsCollection;
use hs_core_sync::{
	Domain, DomainKind, Engine, EngineConfig, MemoryStore, NetworkEvent, NetworkMonitor,
	OfflinePolicy, ProgressReporter, QueueSnapshot, RemoteClient, SubmitError, SyncQueue,
};

use std::{
	collections::VecDeque,
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc, Mutex,
	},
	time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::{sync::Notify, time::timeout};

pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
	pub key: String,
	pub value: u64,
}

impl Item {
	pub fn new(key: &str, value: u64) -> Self {
		Self {
			key: key.to_string(),
			value,
		}
	}
}

/// Fails fast while offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Items;

impl Domain for Items {
	const KIND: DomainKind = DomainKind::Activities;
	const OFFLINE_POLICY: OfflinePolicy = OfflinePolicy::FailFast;

	type Key = String;
	type Payload = Item;
	type Output = u64;

	fn correlation_key(payload: &Item) -> String {
		payload.key.clone()
	}
}

/// Holds the active record until the network comes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drafts;

impl Domain for Drafts {
	const KIND: DomainKind = DomainKind::Reports;
	const OFFLINE_POLICY: OfflinePolicy = OfflinePolicy::WaitForNetwork;

	type Key = String;
	type Payload = Item;
	type Output = u64;

	fn correlation_key(payload: &Item) -> String {
		payload.key.clone()
	}
}

pub enum Step {
	Fail(SubmitError),
	Panic,
	/// Reports the progress, then blocks until notified.
	Hold {
		progress: f32,
		release: Arc<Notify>,
	},
	Sleep(Duration),
}

/// Answers submissions from a script, echoing the payload value once the script runs out.
#[derive(Default)]
pub struct ScriptedClient {
	script: Mutex<VecDeque<Step>>,
	sent: Mutex<Vec<Item>>,
	in_flight: AtomicUsize,
	max_in_flight: AtomicUsize,
}

impl ScriptedClient {
	pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
		Arc::new(Self {
			script: Mutex::new(steps.into_iter().collect()),
			..Default::default()
		})
	}

	pub fn push(&self, step: Step) {
		self.script.lock().unwrap().push_back(step);
	}

	pub fn attempts(&self) -> usize {
		self.sent.lock().unwrap().len()
	}

	pub fn sent(&self) -> Vec<Item> {
		self.sent.lock().unwrap().clone()
	}

	pub fn max_in_flight(&self) -> usize {
		self.max_in_flight.load(Ordering::SeqCst)
	}

	async fn answer(&self, payload: Item, progress: ProgressReporter) -> Result<u64, SubmitError> {
		let step = self.script.lock().unwrap().pop_front();

		match step {
			None => Ok(payload.value),
			Some(Step::Fail(e)) => Err(e),
			Some(Step::Panic) => panic!("client blew up"),
			Some(Step::Hold { progress: fraction, release }) => {
				progress.report(fraction);
				release.notified().await;
				Ok(payload.value)
			}
			Some(Step::Sleep(duration)) => {
				tokio::time::sleep(duration).await;
				Ok(payload.value)
			}
		}
	}
}

#[async_trait::async_trait]
impl<D> RemoteClient<D> for ScriptedClient
where
	D: Domain<Payload = Item, Output = u64>,
{
	async fn submit(&self, payload: Item, progress: ProgressReporter) -> Result<u64, SubmitError> {
		self.sent.lock().unwrap().push(payload.clone());

		let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
		self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

		struct Leave<'a>(&'a AtomicUsize);

		impl Drop for Leave<'_> {
			fn drop(&mut self) {
				self.0.fetch_sub(1, Ordering::SeqCst);
			}
		}

		let _leave = Leave(&self.in_flight);

		self.answer(payload, progress).await
	}
}

pub struct Harness<D: Domain> {
	pub actors: ActorsCollection<DomainKind>,
	pub queue: SyncQueue<D>,
	pub monitor: Arc<NetworkMonitor>,
	pub store: MemoryStore<D>,
	pub client: Arc<ScriptedClient>,
}

impl<D: Domain<Payload = Item, Output = u64>> Harness<D> {
	pub async fn start(client: Arc<ScriptedClient>, online: bool) -> Self {
		Self::start_with(client, MemoryStore::default(), online, &EngineConfig::default()).await
	}

	pub async fn start_with(
		client: Arc<ScriptedClient>,
		store: MemoryStore<D>,
		online: bool,
		config: &EngineConfig,
	) -> Self {
		let monitor = Arc::new(NetworkMonitor::new());
		monitor.handle(if online {
			NetworkEvent::Available
		} else {
			NetworkEvent::Unavailable
		});

		let (engine, queue) = Engine::load(
			Arc::new(store.clone()),
			Arc::clone(&client) as Arc<dyn RemoteClient<D>>,
			monitor.subscribe(),
			config,
		)
		.await
		.unwrap();

		let actors = ActorsCollection::default();
		actors.declare(engine).await;
		actors.start(D::KIND).await;

		Self {
			actors,
			queue,
			monitor,
			store,
			client,
		}
	}

	pub async fn settle(&self, predicate: impl FnMut(&QueueSnapshot<D>) -> bool) -> QueueSnapshot<D> {
		timeout(SETTLE_TIMEOUT, self.queue.wait_for(predicate))
			.await
			.expect("queue did not settle in time")
			.unwrap()
	}

	pub async fn stop(&self) {
		self.actors.stop(D::KIND).await;
	}
}
