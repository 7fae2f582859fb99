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

use hs_utils::error::FileIOError;

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

pub mod activity;
pub mod config;
pub mod infrastructure;
pub mod report;
pub mod session;

pub use activity::{ActivityReceipt, HuntActivities, HuntActivity, HuntEvent, HuntId};
pub use config::{Migrate, SyncConfig};
pub use infrastructure::{
	Infrastructure, InfrastructureChange, InfrastructureItem, InfrastructureKind,
	InfrastructureReceipt, Operation, RemoteId,
};
pub use report::{HarvestReport, HarvestReports, ReportCategory, ReportEvent, ReportReceipt};
pub use session::{Clients, Session};

pub use hs_core_sync as sync;

/// WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
	pub latitude: f64,
	pub longitude: f64,
}

#[derive(Debug, Error)]
pub enum Error {
	#[error("invalid user id <user_id='{0}'>")]
	InvalidUserId(String),
	#[error(transparent)]
	FileIO(#[from] FileIOError),
	#[error(transparent)]
	Sync(#[from] hs_core_sync::Error),
	#[error("invalid tracing directive: {0}")]
	TracingDirective(#[from] tracing_subscriber::filter::ParseError),
	#[error("failed to install the global tracing subscriber: {0}")]
	TracingInit(#[from] tracing_subscriber::util::TryInitError),
}

/// Installs the global subscriber: console output plus a daily rolling file under
/// `<data_dir>/logs`. Keep the returned guard alive for as long as logs should be flushed.
pub fn init_logger(data_dir: impl AsRef<Path>, log_level: &str) -> Result<WorkerGuard, Error> {
	let (non_blocking, guard) =
		tracing_appender::non_blocking(rolling::daily(data_dir.as_ref().join("logs"), "log"));

	let mut filter = EnvFilter::builder()
		.with_default_directive(log_level.parse()?)
		.from_env_lossy();

	if cfg!(debug_assertions) {
		filter = filter
			.add_directive("hs_core=debug".parse()?)
			.add_directive("hs_core_sync=debug".parse()?);
	}

	tracing_subscriber::registry()
		.with(filter)
		.with(fmt::layer())
		.with(
			fmt::Layer::default()
				.with_writer(non_blocking)
				.with_ansi(false)
				.with_filter(LevelFilter::DEBUG),
		)
		.try_init()?;

	Ok(guard)
}
