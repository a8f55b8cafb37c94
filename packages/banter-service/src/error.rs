pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Address(#[from] banter_domain::jid::JidParseError),
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Collaborator error: {message}")]
	Collaborator { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<banter_storage::Error> for Error {
	fn from(err: banter_storage::Error) -> Self {
		match err {
			banter_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			banter_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			banter_storage::Error::NotFound(message) => Self::NotFound { message },
			banter_storage::Error::Conflict(message) => Self::Conflict { message },
		}
	}
}
impl From<color_eyre::Report> for Error {
	fn from(err: color_eyre::Report) -> Self {
		Self::Collaborator { message: err.to_string() }
	}
}
