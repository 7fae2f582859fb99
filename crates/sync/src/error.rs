use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
	Network,
	Rejected,
	Unexpected,
}

/// Why a submission did not succeed. Stored in the failed record so the UI can
/// look up a message and offer a retry.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmitError {
	/// The registry could not be reached at all.
	#[error("network failure: {message}")]
	Network { message: String },
	/// The registry answered and refused the change.
	#[error("rejected by registry <code='{code}'>")]
	Rejected {
		code: String,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		message: Option<String>,
	},
	#[error("unexpected submission failure: {message}")]
	Unexpected { message: String },
}

impl SubmitError {
	pub fn network(message: impl Into<String>) -> Self {
		Self::Network {
			message: message.into(),
		}
	}

	pub fn rejected(code: impl Into<String>) -> Self {
		Self::Rejected {
			code: code.into(),
			message: None,
		}
	}

	pub fn unexpected(message: impl Into<String>) -> Self {
		Self::Unexpected {
			message: message.into(),
		}
	}

	#[must_use]
	pub const fn kind(&self) -> ErrorKind {
		match self {
			Self::Network { .. } => ErrorKind::Network,
			Self::Rejected { .. } => ErrorKind::Rejected,
			Self::Unexpected { .. } => ErrorKind::Unexpected,
		}
	}

	/// A rejected payload would be rejected again, payloads never change after creation.
	#[must_use]
	pub const fn is_retryable(&self) -> bool {
		!matches!(self, Self::Rejected { .. })
	}
}
