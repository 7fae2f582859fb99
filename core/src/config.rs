//! Sync configuration, stored as `huntsync.json` in the data directory.

use hs_core_sync::{
	DomainKind, EngineConfig, RetentionPolicy, RetentionScope, MAX_RETENTION_DAYS,
};

use std::{
	fs,
	path::{Path, PathBuf},
	time::Duration,
};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "huntsync.json";

/// Versioned documents upgrade themselves one step at a time.
pub trait Migrate {
	fn current_version(&self) -> u32;

	fn target_version() -> u32;

	fn migrate(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
	/// Config schema version
	pub version: u32,

	pub data_dir: PathBuf,

	/// Default tracing directive, overridden by `RUST_LOG`
	pub log_level: String,

	#[serde(default)]
	pub retention: RetentionConfig,

	#[serde(default)]
	pub network: NetworkConfig,

	/// Pending commands an engine buffers before callers have to wait
	#[serde(default = "default_channel_capacity")]
	pub channel_capacity: usize,
}

const fn default_channel_capacity() -> usize {
	32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionSettings {
	pub max_age_days: u64,
	pub scope: RetentionScope,
}

impl RetentionSettings {
	#[must_use]
	pub const fn policy(&self) -> RetentionPolicy {
		RetentionPolicy::days(self.max_age_days, self.scope)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionConfig {
	pub activities: RetentionSettings,
	pub infrastructure: RetentionSettings,
	pub reports: RetentionSettings,
}

impl Default for RetentionConfig {
	fn default() -> Self {
		Self {
			activities: RetentionSettings {
				max_age_days: 7,
				scope: RetentionScope::SyncedOnly,
			},
			infrastructure: RetentionSettings {
				max_age_days: 30,
				scope: RetentionScope::All,
			},
			reports: RetentionSettings {
				max_age_days: 30,
				scope: RetentionScope::SyncedOnly,
			},
		}
	}
}

impl RetentionConfig {
	fn validate(&self) -> Result<()> {
		for (kind, settings) in [
			(DomainKind::Activities, &self.activities),
			(DomainKind::Infrastructure, &self.infrastructure),
			(DomainKind::Reports, &self.reports),
		] {
			if settings.max_age_days > MAX_RETENTION_DAYS {
				return Err(anyhow!(
					"Retention of {kind} is {} days, at most {MAX_RETENTION_DAYS} are allowed",
					settings.max_age_days
				));
			}
		}

		Ok(())
	}

	#[must_use]
	pub const fn for_kind(&self, kind: DomainKind) -> &RetentionSettings {
		match kind {
			DomainKind::Activities => &self.activities,
			DomainKind::Infrastructure => &self.infrastructure,
			DomainKind::Reports => &self.reports,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
	/// `host:port` to probe for reachability. Without it the platform has to feed network events.
	pub probe_address: Option<String>,
	pub probe_interval_secs: u64,
	pub probe_timeout_secs: u64,
}

impl Default for NetworkConfig {
	fn default() -> Self {
		Self {
			probe_address: None,
			probe_interval_secs: 30,
			probe_timeout_secs: 5,
		}
	}
}

impl NetworkConfig {
	#[must_use]
	pub const fn probe_interval(&self) -> Duration {
		Duration::from_secs(self.probe_interval_secs)
	}

	#[must_use]
	pub const fn probe_timeout(&self) -> Duration {
		Duration::from_secs(self.probe_timeout_secs)
	}
}

impl SyncConfig {
	/// Loads the config of `data_dir`, creating a default one if there is none yet.
	pub fn load_from(data_dir: impl AsRef<Path>) -> Result<Self> {
		let data_dir = data_dir.as_ref();
		let config_path = data_dir.join(CONFIG_FILE_NAME);

		if !config_path.exists() {
			warn!(path = %config_path.display(), "No config found, creating default;");
			let config = Self::default_with_dir(data_dir.to_path_buf());
			config.save()?;
			return Ok(config);
		}

		info!(path = %config_path.display(), "Loading config;");
		let json = fs::read_to_string(&config_path)?;
		let mut config: Self = serde_json::from_str(&json)?;
		config.retention.validate()?;

		if config.current_version() < Self::target_version() {
			info!(
				from = config.current_version(),
				to = Self::target_version(),
				"Migrating config;"
			);
			config.migrate()?;
			config.save()?;
		}

		Ok(config)
	}

	#[must_use]
	pub fn default_with_dir(data_dir: PathBuf) -> Self {
		Self {
			version: Self::target_version(),
			data_dir,
			log_level: "info".to_string(),
			retention: RetentionConfig::default(),
			network: NetworkConfig::default(),
			channel_capacity: default_channel_capacity(),
		}
	}

	pub fn save(&self) -> Result<()> {
		fs::create_dir_all(&self.data_dir)?;

		let config_path = self.data_dir.join(CONFIG_FILE_NAME);
		fs::write(&config_path, serde_json::to_string_pretty(self)?)?;

		info!(path = %config_path.display(), "Saved config;");

		Ok(())
	}

	#[must_use]
	pub fn logs_dir(&self) -> PathBuf {
		self.data_dir.join("logs")
	}

	/// Where a user's record lists live.
	#[must_use]
	pub fn user_dir(&self, user_id: &str) -> PathBuf {
		self.data_dir.join("users").join(user_id)
	}

	#[must_use]
	pub fn engine_config(&self, kind: DomainKind) -> EngineConfig {
		EngineConfig {
			retention: Some(self.retention.for_kind(kind).policy()),
			command_capacity: self.channel_capacity,
		}
	}
}

impl Migrate for SyncConfig {
	fn current_version(&self) -> u32 {
		self.version
	}

	fn target_version() -> u32 {
		2
	}

	fn migrate(&mut self) -> Result<()> {
		match self.version {
			0 => {
				self.version = 1;
				self.migrate()
			}
			1 => {
				// v2 added reachability probing
				self.network = NetworkConfig::default();
				self.version = 2;
				Ok(())
			}
			2 => Ok(()),
			v => Err(anyhow!("Unknown config version: {v}")),
		}
	}
}
