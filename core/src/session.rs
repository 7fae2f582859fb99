use hs_actors::ActorsCollection;
use hs_core_sync::{
	Domain, DomainKind, Engine, JsonFileStore, NetworkMonitor, RemoteClient, SyncQueue, TcpProbe,
};
use hs_utils::error::FileIOError;

use std::{
	path::{Path, PathBuf},
	sync::Arc,
};

use tokio::{fs, task::JoinHandle};
use tracing::{info, instrument};

use super::{config::SyncConfig, Error, HarvestReports, HuntActivities, Infrastructure};

/// The registry side of each queue.
pub struct Clients {
	pub activities: Arc<dyn RemoteClient<HuntActivities>>,
	pub infrastructure: Arc<dyn RemoteClient<Infrastructure>>,
	pub reports: Arc<dyn RemoteClient<HarvestReports>>,
}

/// The three queues of one signed in user. Created on login, torn down on logout.
pub struct Session {
	user_id: String,
	user_dir: PathBuf,
	actors: ActorsCollection<DomainKind>,
	activities: SyncQueue<HuntActivities>,
	infrastructure: SyncQueue<Infrastructure>,
	reports: SyncQueue<HarvestReports>,
	monitor: Arc<NetworkMonitor>,
	maybe_probe: Option<JoinHandle<()>>,
}

impl Session {
	/// Loads the user's record lists from `<data_dir>/users/<user_id>/` and starts syncing them.
	#[instrument(skip(config, clients, monitor), err)]
	pub async fn start(
		config: &SyncConfig,
		user_id: &str,
		clients: Clients,
		monitor: Arc<NetworkMonitor>,
	) -> Result<Self, Error> {
		validate_user_id(user_id)?;

		let user_dir = config.user_dir(user_id);
		fs::create_dir_all(&user_dir)
			.await
			.map_err(|e| FileIOError::from((user_dir.as_path(), e)))?;

		let actors = ActorsCollection::default();

		let activities =
			load_queue(config, &user_dir, clients.activities, &monitor, &actors).await?;
		let infrastructure =
			load_queue(config, &user_dir, clients.infrastructure, &monitor, &actors).await?;
		let reports = load_queue(config, &user_dir, clients.reports, &monitor, &actors).await?;

		actors.start_all().await;

		let maybe_probe = config.network.probe_address.as_ref().map(|address| {
			monitor.spawn_probe(
				TcpProbe::new(address.clone(), config.network.probe_timeout()),
				config.network.probe_interval(),
			)
		});

		info!(user_dir = %user_dir.display(), "Sync session started;");

		Ok(Self {
			user_id: user_id.to_string(),
			user_dir,
			actors,
			activities,
			infrastructure,
			reports,
			monitor,
			maybe_probe,
		})
	}

	#[must_use]
	pub fn user_id(&self) -> &str {
		&self.user_id
	}

	#[must_use]
	pub fn user_dir(&self) -> &Path {
		&self.user_dir
	}

	#[must_use]
	pub const fn activities(&self) -> &SyncQueue<HuntActivities> {
		&self.activities
	}

	#[must_use]
	pub const fn infrastructure(&self) -> &SyncQueue<Infrastructure> {
		&self.infrastructure
	}

	#[must_use]
	pub const fn reports(&self) -> &SyncQueue<HarvestReports> {
		&self.reports
	}

	#[must_use]
	pub const fn network(&self) -> &Arc<NetworkMonitor> {
		&self.monitor
	}

	/// Which engines are currently running.
	pub async fn engine_states(&self) -> Vec<(DomainKind, bool)> {
		self.actors.get_state().await
	}

	/// Records of all three queues not yet accepted by the registry.
	#[must_use]
	pub fn unsynced_count(&self) -> usize {
		self.activities.unsynced_count()
			+ self.infrastructure.unsynced_count()
			+ self.reports.unsynced_count()
	}

	/// Asks every engine to look at its queue again, e.g. when the app returns to the foreground.
	pub async fn reevaluate(&self) -> Result<(), Error> {
		self.activities.reevaluate().await?;
		self.infrastructure.reevaluate().await?;
		self.reports.reevaluate().await?;

		Ok(())
	}

	/// Stops all engines. Anything in flight is abandoned and sent again on the next login.
	#[instrument(skip(self), fields(user_id = %self.user_id))]
	pub async fn logout(self) {
		if let Some(probe) = self.maybe_probe {
			probe.abort();
		}

		self.actors.stop_all().await;

		info!("Sync session stopped;");
	}
}

async fn load_queue<D: Domain>(
	config: &SyncConfig,
	user_dir: &Path,
	client: Arc<dyn RemoteClient<D>>,
	monitor: &NetworkMonitor,
	actors: &ActorsCollection<DomainKind>,
) -> Result<SyncQueue<D>, Error> {
	let (engine, queue) = Engine::load(
		Arc::new(JsonFileStore::<D>::in_dir(user_dir)),
		client,
		monitor.subscribe(),
		&config.engine_config(D::KIND),
	)
	.await?;

	actors.declare(engine).await;

	Ok(queue)
}

/// User ids end up as directory names.
fn validate_user_id(user_id: &str) -> Result<(), Error> {
	if !user_id.is_empty()
		&& user_id
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
	{
		Ok(())
	} else {
		Err(Error::InvalidUserId(user_id.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn user_ids_must_be_safe_directory_names() {
		assert!(validate_user_id("hunter-42_a").is_ok());

		for bad in ["", "..", "a/b", "a b", "hjort\u{e6}"] {
			assert!(
				matches!(validate_user_id(bad), Err(Error::InvalidUserId(id)) if id == bad),
				"{bad} should be rejected"
			);
		}
	}
}
