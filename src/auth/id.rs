//! Strongly typed credential record identifier.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

const RECORD_ID_MAX_LEN: usize = 128;

/// Error returned when record identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum RecordIdError {
	/// The identifier was empty.
	#[error("Record identifier cannot be empty.")]
	Empty,
	/// The identifier contains whitespace characters.
	#[error("Record identifier contains whitespace.")]
	ContainsWhitespace,
	/// The identifier exceeded the allowed character count.
	#[error("Record identifier exceeds {max} characters.")]
	TooLong {
		/// Maximum permitted character count.
		max: usize,
	},
}

/// Unique identifier for a credential record shared across processes.
///
/// The custodian treats the value as opaque; conventions such as
/// `"{provider}:{provider_user_id}"` are up to the caller.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(String);
impl RecordId {
	/// Creates a new identifier after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, RecordIdError> {
		let view = value.as_ref();

		validate_view(view)?;

		Ok(Self(view.to_owned()))
	}
}
impl Deref for RecordId {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for RecordId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl From<RecordId> for String {
	fn from(value: RecordId) -> Self {
		value.0
	}
}
impl TryFrom<String> for RecordId {
	type Error = RecordIdError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate_view(&value)?;

		Ok(Self(value))
	}
}
impl Borrow<str> for RecordId {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl Debug for RecordId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Record({})", self.0)
	}
}
impl Display for RecordId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl FromStr for RecordId {
	type Err = RecordIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

fn validate_view(view: &str) -> Result<(), RecordIdError> {
	if view.is_empty() {
		return Err(RecordIdError::Empty);
	}
	if view.chars().any(char::is_whitespace) {
		return Err(RecordIdError::ContainsWhitespace);
	}
	if view.len() > RECORD_ID_MAX_LEN {
		return Err(RecordIdError::TooLong { max: RECORD_ID_MAX_LEN });
	}

	Ok(())
}
