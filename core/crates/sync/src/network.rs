use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::{net::TcpStream, sync::watch, task::JoinHandle, time};
use tracing::{debug, info};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkState {
	/// Nothing determined yet.
	#[default]
	Loading,
	Online,
	Offline,
}

impl NetworkState {
	#[must_use]
	pub const fn is_online(self) -> bool {
		matches!(self, Self::Online)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
	Available,
	Unavailable,
}

impl From<NetworkEvent> for NetworkState {
	fn from(event: NetworkEvent) -> Self {
		match event {
			NetworkEvent::Available => Self::Online,
			NetworkEvent::Unavailable => Self::Offline,
		}
	}
}

/// Tracks connectivity, independent of any queue.
///
/// Starts in [`NetworkState::Loading`] and only notifies subscribers on actual changes,
/// so repeating the same event is harmless.
#[derive(Debug)]
pub struct NetworkMonitor {
	state_tx: watch::Sender<NetworkState>,
}

impl Default for NetworkMonitor {
	fn default() -> Self {
		Self::new()
	}
}

impl NetworkMonitor {
	#[must_use]
	pub fn new() -> Self {
		let (state_tx, _) = watch::channel(NetworkState::Loading);
		Self { state_tx }
	}

	/// Returns whether the state changed.
	pub fn handle(&self, event: NetworkEvent) -> bool {
		let new_state = NetworkState::from(event);

		let changed = self.state_tx.send_if_modified(|state| {
			if *state == new_state {
				false
			} else {
				*state = new_state;
				true
			}
		});

		if changed {
			info!(state = ?new_state, "Network state changed;");
		}

		changed
	}

	#[must_use]
	pub fn state(&self) -> NetworkState {
		*self.state_tx.borrow()
	}

	#[must_use]
	pub fn subscribe(&self) -> watch::Receiver<NetworkState> {
		self.state_tx.subscribe()
	}

	/// Feeds the monitor from `probe` every `interval`, first check right away.
	pub fn spawn_probe(
		self: &Arc<Self>,
		probe: impl ReachabilityProbe,
		interval: Duration,
	) -> JoinHandle<()> {
		let this = Arc::clone(self);

		tokio::spawn(async move {
			let mut ticker = time::interval(interval);
			ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

			loop {
				ticker.tick().await;

				let event = if probe.is_reachable().await {
					NetworkEvent::Available
				} else {
					NetworkEvent::Unavailable
				};

				this.handle(event);
			}
		})
	}
}

#[async_trait::async_trait]
pub trait ReachabilityProbe: Send + Sync + 'static {
	async fn is_reachable(&self) -> bool;
}

/// Considers the network available when a TCP connection to `address` opens in time.
#[derive(Debug, Clone)]
pub struct TcpProbe {
	address: String,
	timeout: Duration,
}

impl TcpProbe {
	pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
		Self {
			address: address.into(),
			timeout,
		}
	}
}

#[async_trait::async_trait]
impl ReachabilityProbe for TcpProbe {
	async fn is_reachable(&self) -> bool {
		match time::timeout(self.timeout, TcpStream::connect(&self.address)).await {
			Ok(Ok(_)) => true,
			Ok(Err(e)) => {
				debug!(address = %self.address, ?e, "Reachability probe failed to connect;");
				false
			}
			Err(_) => {
				debug!(address = %self.address, "Reachability probe timed out;");
				false
			}
		}
	}
}
