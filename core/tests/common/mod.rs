#![allow(dead_code)]

use hs_core::{
	sync::{
		Domain, NetworkEvent, NetworkMonitor, ProgressReporter, QueueSnapshot, RemoteClient,
		SubmitError, SyncQueue,
	},
	ActivityReceipt, Clients, HarvestReports, HuntActivities, Infrastructure,
	InfrastructureReceipt, ReportReceipt, Session, SyncConfig,
};

use std::{
	path::Path,
	sync::{Arc, Mutex},
	time::Duration,
};

use tokio::time::timeout;

pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

type Respond<D> = dyn Fn(&<D as Domain>::Payload, usize) -> Result<<D as Domain>::Output, SubmitError>
	+ Send
	+ Sync;

/// A fake registry answering with `respond(payload, attempt)` and remembering what was sent.
pub struct Registry<D: Domain> {
	sent: Mutex<Vec<D::Payload>>,
	respond: Box<Respond<D>>,
}

impl<D: Domain> Registry<D> {
	pub fn new(
		respond: impl Fn(&D::Payload, usize) -> Result<D::Output, SubmitError> + Send + Sync + 'static,
	) -> Arc<Self> {
		Arc::new(Self {
			sent: Mutex::new(Vec::new()),
			respond: Box::new(respond),
		})
	}

	pub fn sent(&self) -> Vec<D::Payload> {
		self.sent.lock().unwrap().clone()
	}

	pub fn attempts(&self) -> usize {
		self.sent.lock().unwrap().len()
	}
}

#[async_trait::async_trait]
impl<D: Domain> RemoteClient<D> for Registry<D> {
	async fn submit(
		&self,
		payload: D::Payload,
		progress: ProgressReporter,
	) -> Result<D::Output, SubmitError> {
		let attempt = {
			let mut sent = self.sent.lock().unwrap();
			sent.push(payload.clone());
			sent.len() - 1
		};

		progress.report(1.0);

		(self.respond)(&payload, attempt)
	}
}

pub struct Registries {
	pub activities: Arc<Registry<HuntActivities>>,
	pub infrastructure: Arc<Registry<Infrastructure>>,
	pub reports: Arc<Registry<HarvestReports>>,
}

impl Default for Registries {
	fn default() -> Self {
		Self {
			activities: Registry::<HuntActivities>::new(|activity, _| {
				Ok(ActivityReceipt {
					event_ids: (0..).take(activity.events.len()).collect(),
				})
			}),
			infrastructure: Registry::<Infrastructure>::new(|change, _| {
				Ok(InfrastructureReceipt {
					remote_id: change.remote_id.unwrap_or(1),
				})
			}),
			reports: Registry::<HarvestReports>::new(|report, _| {
				Ok(ReportReceipt {
					report_id: report.report_id.unwrap_or(1),
					permit_id: report.permit_id,
				})
			}),
		}
	}
}

impl Registries {
	pub fn clients(&self) -> Clients {
		Clients {
			activities: self.activities.clone(),
			infrastructure: self.infrastructure.clone(),
			reports: self.reports.clone(),
		}
	}
}

pub async fn start_session(data_dir: &Path, registries: &Registries, online: bool) -> Session {
	let config = SyncConfig::load_from(data_dir).unwrap();

	let monitor = Arc::new(NetworkMonitor::new());
	monitor.handle(if online {
		NetworkEvent::Available
	} else {
		NetworkEvent::Unavailable
	});

	Session::start(&config, "hunter-1", registries.clients(), monitor)
		.await
		.unwrap()
}

pub async fn settle<D: Domain>(
	queue: &SyncQueue<D>,
	predicate: impl FnMut(&QueueSnapshot<D>) -> bool,
) -> QueueSnapshot<D> {
	timeout(SETTLE_TIMEOUT, queue.wait_for(predicate))
		.await
		.expect("queue did not settle in time")
		.unwrap()
}
