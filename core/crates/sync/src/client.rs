use hs_sync::{Domain, SubmitError};

use async_channel as chan;
use tracing::trace;

/// Performs the actual network call for one record.
///
/// Implementations must map every failure into a [`SubmitError`] kind: `Network` when the
/// registry could not be reached, `Rejected` when it answered with an error code, and
/// `Unexpected` for anything else. Panics are caught by the engine and treated as `Unexpected`.
#[async_trait::async_trait]
pub trait RemoteClient<D: Domain>: Send + Sync + 'static {
	async fn submit(
		&self,
		payload: D::Payload,
		progress: ProgressReporter,
	) -> Result<D::Output, SubmitError>;
}

/// Lets a client report how far along a submission is, as a fraction in `0.0..=1.0`.
/// Purely informational, it never changes what the engine does.
#[derive(Debug, Clone)]
pub struct ProgressReporter(chan::Sender<f32>);

impl ProgressReporter {
	pub(crate) fn new() -> (Self, chan::Receiver<f32>) {
		let (tx, rx) = chan::unbounded();
		(Self(tx), rx)
	}

	/// A reporter nobody listens to.
	#[must_use]
	pub fn detached() -> Self {
		Self::new().0
	}

	pub fn report(&self, fraction: f32) {
		let fraction = if fraction.is_finite() {
			fraction.clamp(0.0, 1.0)
		} else {
			0.0
		};

		if self.0.try_send(fraction).is_err() {
			trace!("Dropped progress report, submission already settled");
		}
	}
}
