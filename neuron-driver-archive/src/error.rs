// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {rpm_repository::RpmRepositoryError, thiserror::Error};

/// Broad classes of failures.
///
/// Every class is fatal to a run. The class only informs diagnostics.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorCategory {
    Transport,
    Decode,
    Integrity,
    VersionParse,
    Archive,
    Configuration,
    Io,
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("argument parsing error: {0:?}")]
    Clap(#[from] clap::Error),

    #[error("{0}")]
    Repository(#[from] RpmRepositoryError),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on {0}: {1:?}")]
    IoPath(String, std::io::Error),

    #[error("error walking directory: {0:?}")]
    WalkDir(#[from] walkdir::Error),

    #[error("YAML error: {0:?}")]
    SerdeYaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("package {0} carries no verifiable signer")]
    SignerMissing(String),

    #[error("could not parse version from changelog header: {0}")]
    ChangelogHeader(String),

    #[error("invalid version string: {0}")]
    VersionParse(String),

    #[error("invalid build timestamp: {0}")]
    Timestamp(u64),

    #[error("no directory containing {0} found under {1}")]
    SourceTreeNotFound(String, String),

    #[error("multiple directories containing {0} found: {1:?}")]
    SourceTreeAmbiguous(String, Vec<String>),

    #[error("archive transaction error: {0}")]
    Transaction(String),

    #[error("{0}: {1}")]
    Step(&'static str, Box<ArchiveError>),
}

impl ArchiveError {
    /// Obtain the class of this failure.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Step(_, inner) => inner.category(),
            Self::Repository(e) => match e {
                RpmRepositoryError::UrlParse(_)
                | RpmRepositoryError::Http(_)
                | RpmRepositoryError::HttpStatus(_, _) => ErrorCategory::Transport,
                RpmRepositoryError::Io(_) | RpmRepositoryError::IoPath(_, _) => ErrorCategory::Io,
                RpmRepositoryError::SignatureMissing
                | RpmRepositoryError::SignatureNoIssuer(_)
                | RpmRepositoryError::SignatureSignerUnresolved(_, _)
                | RpmRepositoryError::SignatureInvalid(_, _) => ErrorCategory::Integrity,
                _ => ErrorCategory::Decode,
            },
            Self::ChecksumMismatch { .. } | Self::SignerMissing(_) => ErrorCategory::Integrity,
            Self::ChangelogHeader(_) | Self::SerdeYaml(_) => ErrorCategory::Decode,
            Self::VersionParse(_) => ErrorCategory::VersionParse,
            Self::Git(_)
            | Self::Transaction(_)
            | Self::SourceTreeNotFound(_, _)
            | Self::SourceTreeAmbiguous(_, _) => ErrorCategory::Archive,
            Self::Clap(_) | Self::Config(_) => ErrorCategory::Configuration,
            Self::Timestamp(_) => ErrorCategory::Decode,
            Self::Io(_) | Self::IoPath(_, _) | Self::WalkDir(_) => ErrorCategory::Io,
        }
    }

    /// Whether this failure means untrusted content failed verification.
    pub fn is_integrity_failure(&self) -> bool {
        self.category() == ErrorCategory::Integrity
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Attach the name of a pipeline step to an error.
pub trait StepContext<T> {
    fn step(self, name: &'static str) -> Result<T>;
}

impl<T, E> StepContext<T> for std::result::Result<T, E>
where
    E: Into<ArchiveError>,
{
    fn step(self, name: &'static str) -> Result<T> {
        self.map_err(|e| ArchiveError::Step(name, Box::new(e.into())))
    }
}
