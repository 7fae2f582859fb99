#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

use std::{
	collections::HashMap,
	fmt,
	future::Future,
	hash::Hash,
	marker::PhantomData,
	panic::{resume_unwind, AssertUnwindSafe},
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
	time::Duration,
};

use futures::FutureExt;
use tokio::{
	spawn,
	sync::{watch, Mutex, RwLock},
	task::JoinHandle,
	time::timeout,
};
use tracing::{error, instrument, warn};

const STOP_TIMEOUT: Duration = Duration::from_secs(30);

pub trait ActorId: Hash + Eq + Send + Sync + Copy + fmt::Debug + fmt::Display + 'static {}

impl<T: Hash + Eq + Send + Sync + Copy + fmt::Debug + fmt::Display + 'static> ActorId for T {}

/// A long running loop identified by a constant id, like one sync engine per queue.
pub trait Actor<Id: ActorId>: Send + Sync + 'static {
	const IDENTIFIER: Id;

	/// Runs until `stop` fires or the actor has nothing left to do.
	fn run(&mut self, stop: Stopper) -> impl Future<Output = ()> + Send;
}

#[async_trait::async_trait]
pub trait DynActor: Send + Sync + 'static {
	async fn run(&mut self, stop: Stopper);
}

struct Erased<Id: ActorId, A: Actor<Id>> {
	actor: A,
	_marker: PhantomData<Id>,
}

#[async_trait::async_trait]
impl<Id: ActorId, A: Actor<Id>> DynActor for Erased<Id, A> {
	async fn run(&mut self, stop: Stopper) {
		self.actor.run(stop).await;
	}
}

struct ActorHandler {
	actor: Arc<Mutex<Box<dyn DynActor>>>,
	maybe_handle: Option<JoinHandle<()>>,
	is_running: Arc<AtomicBool>,
	stop_tx: watch::Sender<bool>,
}

/// Owns a set of actors and their tasks. Cloning shares the same set.
pub struct ActorsCollection<Id: ActorId> {
	actors_map: Arc<RwLock<HashMap<Id, ActorHandler>>>,
}

impl<Id: ActorId> ActorsCollection<Id> {
	/// Registers an actor without starting it. Declaring an id twice replaces the old actor,
	/// which must have been stopped first.
	pub async fn declare<A: Actor<Id>>(&self, actor: A) {
		let (stop_tx, _) = watch::channel(false);

		let previous = self.actors_map.write().await.insert(
			A::IDENTIFIER,
			ActorHandler {
				actor: Arc::new(Mutex::new(Box::new(Erased {
					actor,
					_marker: PhantomData,
				}))),
				maybe_handle: None,
				is_running: Arc::new(AtomicBool::new(false)),
				stop_tx,
			},
		);

		if previous.is_some_and(|handler| handler.is_running.load(Ordering::Acquire)) {
			warn!(id = %A::IDENTIFIER, "Replaced an actor that was still running;");
		}
	}

	#[instrument(skip(self))]
	pub async fn start(&self, identifier: Id) {
		let mut actors_map = self.actors_map.write().await;
		let Some(actor) = actors_map.get_mut(&identifier) else {
			warn!("Tried to start an undeclared actor");
			return;
		};

		if actor.is_running.load(Ordering::Acquire) {
			warn!("Actor already running!");
			return;
		}

		if let Some(handle) = actor.maybe_handle.take() {
			if handle.await.is_err() {
				error!("Previous actor run failed to join");
			}
		}

		actor.stop_tx.send_replace(false);
		actor.is_running.store(true, Ordering::Release);

		actor.maybe_handle = Some(spawn({
			let stopper = Stopper(actor.stop_tx.subscribe());
			let is_running = Arc::clone(&actor.is_running);
			let actor = Arc::clone(&actor.actor);

			async move {
				let mut actor = actor.lock().await;

				if AssertUnwindSafe(actor.run(stopper))
					.catch_unwind()
					.await
					.is_err()
				{
					error!(%identifier, "Actor unexpectedly panicked");
				}

				is_running.store(false, Ordering::Release);
			}
		}));
	}

	#[instrument(skip(self))]
	pub async fn stop(&self, identifier: Id) {
		let mut actors_map = self.actors_map.write().await;
		let Some(actor) = actors_map.get_mut(&identifier) else {
			return;
		};

		if !actor.is_running.load(Ordering::Acquire) {
			warn!("Actor already stopped!");
		}

		actor.stop_tx.send_replace(true);
		wait_stop_or_abort(actor.maybe_handle.take()).await;
		actor.is_running.store(false, Ordering::Release);
	}

	pub async fn start_all(&self) {
		for identifier in self.identifiers().await {
			self.start(identifier).await;
		}
	}

	pub async fn stop_all(&self) {
		for identifier in self.identifiers().await {
			self.stop(identifier).await;
		}
	}

	pub async fn is_running(&self, identifier: Id) -> bool {
		self.actors_map
			.read()
			.await
			.get(&identifier)
			.is_some_and(|actor| actor.is_running.load(Ordering::Acquire))
	}

	/// Every declared actor with whether it is running right now.
	pub async fn get_state(&self) -> Vec<(Id, bool)> {
		self.actors_map
			.read()
			.await
			.iter()
			.map(|(identifier, actor)| (*identifier, actor.is_running.load(Ordering::Relaxed)))
			.collect()
	}

	async fn identifiers(&self) -> Vec<Id> {
		self.actors_map.read().await.keys().copied().collect()
	}
}

impl<Id: ActorId> Default for ActorsCollection<Id> {
	fn default() -> Self {
		Self {
			actors_map: Arc::default(),
		}
	}
}

impl<Id: ActorId> Clone for ActorsCollection<Id> {
	fn clone(&self) -> Self {
		Self {
			actors_map: Arc::clone(&self.actors_map),
		}
	}
}

/// Handed to [`Actor::run`]; fires once the collection asks the actor to stop.
#[derive(Clone)]
pub struct Stopper(watch::Receiver<bool>);

impl Stopper {
	/// Resolves when a stop was requested, or when the collection itself went away.
	pub async fn stopped(&self) {
		let mut rx = self.0.clone();
		if rx.wait_for(|stop| *stop).await.is_err() {
			warn!("Stop channel closed, will stop actor");
		}
	}
}

async fn wait_stop_or_abort(maybe_handle: Option<JoinHandle<()>>) {
	let Some(handle) = maybe_handle else {
		return;
	};

	let abort_handle = handle.abort_handle();

	match timeout(STOP_TIMEOUT, handle).await {
		Ok(Ok(())) => {}
		Ok(Err(e)) => {
			// Panics are caught inside the task, so this is a bug worth surfacing
			if e.is_panic() {
				error!("Actor task panicked outside of its run loop");
				resume_unwind(e.into_panic());
			}
		}
		Err(_) => {
			error!("Actor failed to gracefully stop in the allotted time, will force abortion");
			abort_handle.abort();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::sync::atomic::AtomicUsize;

	use tracing_test::traced_test;

	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	enum Id {
		Counter,
		Panicker,
	}

	impl fmt::Display for Id {
		fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
			fmt::Debug::fmt(self, f)
		}
	}

	struct Counter(Arc<AtomicUsize>);

	impl Actor<Id> for Counter {
		const IDENTIFIER: Id = Id::Counter;

		async fn run(&mut self, stop: Stopper) {
			self.0.fetch_add(1, Ordering::SeqCst);
			stop.stopped().await;
		}
	}

	struct Panicker;

	impl Actor<Id> for Panicker {
		const IDENTIFIER: Id = Id::Panicker;

		async fn run(&mut self, _stop: Stopper) {
			panic!("boom");
		}
	}

	#[tokio::test]
	#[traced_test]
	async fn starts_stops_and_restarts() {
		let runs = Arc::new(AtomicUsize::new(0));
		let actors = ActorsCollection::default();
		actors.declare(Counter(Arc::clone(&runs))).await;

		assert!(!actors.is_running(Id::Counter).await);

		actors.start(Id::Counter).await;
		assert!(actors.is_running(Id::Counter).await);

		actors.stop(Id::Counter).await;
		assert!(!actors.is_running(Id::Counter).await);

		actors.declare(Panicker).await;
		let mut state = actors.get_state().await;
		state.sort_by_key(|(id, _)| *id == Id::Panicker);
		assert_eq!(state, vec![(Id::Counter, false), (Id::Panicker, false)]);

		actors.start(Id::Counter).await;
		assert!(actors.get_state().await.contains(&(Id::Counter, true)));

		actors.stop_all().await;
		assert!(actors.get_state().await.iter().all(|(_, running)| !running));

		assert_eq!(runs.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	#[traced_test]
	async fn contains_panics() {
		let actors = ActorsCollection::default();
		actors.declare(Panicker).await;
		actors.start(Id::Panicker).await;

		// the panic is caught inside the task, stopping still joins cleanly
		actors.stop(Id::Panicker).await;

		assert!(!actors.is_running(Id::Panicker).await);
		assert!(logs_contain("Actor unexpectedly panicked"));
	}
}
