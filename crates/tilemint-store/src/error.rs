//! Error types for the bundled stores.
//!
//! Store failures surface to the engine through the collaborator traits, so
//! `Error` converts into [`tilemint::Error`]: I/O and JSON failures become
//! `Persist` errors and engine errors pass through unchanged.

pub type Result<T> = core::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Reading or writing a backing file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A backing document could not be (de)serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Engine(#[from] tilemint::Error),
}

impl From<Error> for tilemint::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Engine(e) => e,
            other => tilemint::Error::Persist {
                reason: other.to_string(),
            },
        }
    }
}
