use std::path::Path;

use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

pub mod error;

use error::{report_error, FileIOError};

/// Replaces the whole file at `path` with `contents`.
///
/// Writes a sibling temp file, syncs it and renames it over the target, so readers
/// either see the previous contents or the new ones, never a torn write.
pub async fn write_atomically(path: impl AsRef<Path>, contents: &[u8]) -> Result<(), FileIOError> {
	let path = path.as_ref();

	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent)
			.await
			.map_err(|e| FileIOError::with_context(parent, e, "creating parent directory"))?;
	}

	let tmp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));

	let mut file = fs::File::create(&tmp_path)
		.await
		.map_err(|e| FileIOError::from((tmp_path.as_path(), e)))?;

	file.write_all(contents)
		.await
		.map_err(|e| FileIOError::from((tmp_path.as_path(), e)))?;

	file.sync_all()
		.await
		.map_err(|e| FileIOError::with_context(&tmp_path, e, "syncing temp file"))?;

	drop(file);

	if let Err(e) = fs::rename(&tmp_path, path).await {
		report_error(
			&fs::remove_file(&tmp_path)
				.await
				.map_err(|e| FileIOError::with_context(&tmp_path, e, "removing temp file")),
			"Failed to clean up after a failed replace",
		);
		return Err(FileIOError::with_context(path, e, "replacing file"));
	}

	Ok(())
}

/// Reads a whole file, mapping a missing file to `None`.
pub async fn read_if_exists(path: impl AsRef<Path>) -> Result<Option<Vec<u8>>, FileIOError> {
	let path = path.as_ref();

	match fs::read(path).await {
		Ok(bytes) => Ok(Some(bytes)),
		Err(e) => {
			let e = FileIOError::from((path, e));
			if e.is_not_found() {
				Ok(None)
			} else {
				Err(e)
			}
		}
	}
}
