use std::{fmt::Display, io, path::Path};

use thiserror::Error;
use tracing::error;

/// Logs the error of a result nobody is going to propagate
pub fn report_error(res: &Result<(), impl Display>, context: &str) {
	if let Err(e) = res {
		error!("{context}: {e:#}");
	}
}

/// File I/O error that remembers which path failed
#[derive(Error, Debug)]
#[error("file I/O error{}: {source}; path: '{}'", .maybe_context.as_ref().map(|ctx| format!(" ({ctx})")).unwrap_or_default(), .path.display())]
pub struct FileIOError {
	pub path: Box<Path>,
	#[source]
	pub source: io::Error,
	pub maybe_context: Option<&'static str>,
}

impl FileIOError {
	pub fn from_std_io_err(path: impl AsRef<Path>, source: io::Error) -> Self {
		Self {
			path: path.as_ref().into(),
			source,
			maybe_context: None,
		}
	}

	pub fn with_context(path: impl AsRef<Path>, source: io::Error, context: &'static str) -> Self {
		Self {
			path: path.as_ref().into(),
			source,
			maybe_context: Some(context),
		}
	}

	#[must_use]
	pub fn is_not_found(&self) -> bool {
		self.source.kind() == io::ErrorKind::NotFound
	}
}

impl From<(&Path, io::Error)> for FileIOError {
	fn from((path, source): (&Path, io::Error)) -> Self {
		Self::from_std_io_err(path, source)
	}
}
