use hs_sync::{ChangeRecord, Domain};
use hs_utils::{error::FileIOError, read_if_exists, write_atomically};

use std::{
	marker::PhantomData,
	path::{Path, PathBuf},
	sync::{Arc, Mutex, PoisonError},
};

use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum StoreError {
	#[error(transparent)]
	FileIO(#[from] FileIOError),
	#[error("failed to (de)serialize change records: {0}")]
	Serialization(#[from] serde_json::Error),
}

/// Durable storage for one user's record list of one domain.
///
/// Always whole-list: `save` overwrites everything, there are no partial writes.
#[async_trait::async_trait]
pub trait RecordStore<D: Domain>: Send + Sync + 'static {
	/// `None` when nothing was ever saved.
	async fn load(&self) -> Result<Option<Vec<ChangeRecord<D>>>, StoreError>;

	async fn save(&self, records: &[ChangeRecord<D>]) -> Result<(), StoreError>;
}

/// A JSON file per user and domain.
#[derive(Debug)]
pub struct JsonFileStore<D> {
	path: PathBuf,
	_marker: PhantomData<fn() -> D>,
}

impl<D: Domain> JsonFileStore<D> {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			_marker: PhantomData,
		}
	}

	/// `<user_dir>/<domain>.json`
	pub fn in_dir(user_dir: impl AsRef<Path>) -> Self {
		Self::new(user_dir.as_ref().join(format!("{}.json", D::KIND)))
	}

	#[must_use]
	pub fn path(&self) -> &Path {
		&self.path
	}
}

#[async_trait::async_trait]
impl<D: Domain> RecordStore<D> for JsonFileStore<D> {
	#[instrument(skip(self), fields(path = %self.path.display()), err)]
	async fn load(&self) -> Result<Option<Vec<ChangeRecord<D>>>, StoreError> {
		read_if_exists(&self.path)
			.await?
			.map(|bytes| serde_json::from_slice(&bytes))
			.transpose()
			.map_err(Into::into)
	}

	#[instrument(skip(self, records), fields(path = %self.path.display(), records_count = records.len()), err)]
	async fn save(&self, records: &[ChangeRecord<D>]) -> Result<(), StoreError> {
		let bytes = serde_json::to_vec(records)?;
		write_atomically(&self.path, &bytes).await.map_err(Into::into)
	}
}

/// Keeps the serialized list in memory, so reloads go through the same
/// encoding as the file store. Clones share the same storage.
#[derive(Debug)]
pub struct MemoryStore<D> {
	bytes: Arc<Mutex<Option<Vec<u8>>>>,
	_marker: PhantomData<fn() -> D>,
}

impl<D> Default for MemoryStore<D> {
	fn default() -> Self {
		Self {
			bytes: Arc::default(),
			_marker: PhantomData,
		}
	}
}

impl<D> Clone for MemoryStore<D> {
	fn clone(&self) -> Self {
		Self {
			bytes: Arc::clone(&self.bytes),
			_marker: PhantomData,
		}
	}
}

impl<D: Domain> MemoryStore<D> {
	/// Raw bytes of the last save, if any.
	#[must_use]
	pub fn snapshot(&self) -> Option<Vec<u8>> {
		self.bytes
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}

	pub fn preload(&self, records: &[ChangeRecord<D>]) -> Result<(), StoreError> {
		let bytes = serde_json::to_vec(records)?;
		*self.bytes.lock().unwrap_or_else(PoisonError::into_inner) = Some(bytes);
		Ok(())
	}
}

#[async_trait::async_trait]
impl<D: Domain> RecordStore<D> for MemoryStore<D> {
	async fn load(&self) -> Result<Option<Vec<ChangeRecord<D>>>, StoreError> {
		self.snapshot()
			.map(|bytes| serde_json::from_slice(&bytes))
			.transpose()
			.map_err(Into::into)
	}

	async fn save(&self, records: &[ChangeRecord<D>]) -> Result<(), StoreError> {
		let bytes = serde_json::to_vec(records)?;
		*self.bytes.lock().unwrap_or_else(PoisonError::into_inner) = Some(bytes);
		Ok(())
	}
}
