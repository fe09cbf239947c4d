use thiserror::Error;

use crate::models::ImageName;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// An out-of-range input, reported by the call that introduced it.
    #[error("invalid {subject}: {reason}")]
    Validation { subject: String, reason: String },

    /// Two images share a name but not a build source.
    #[error("image {name} is declared with conflicting build sources")]
    Conflict {
        name: ImageName,
        first: Option<String>,
        second: Option<String>,
    },
}

impl Error {
    pub fn validation<S, R>(subject: S, reason: R) -> Error
    where
        S: Into<String>,
        R: Into<String>,
    {
        Error::Validation {
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }
}
