// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Run configuration.

An [ArchiveConfig] is assembled once at startup from built-in defaults, an
optional YAML file and command line arguments, then handed by reference to
every component.
*/

use {
    crate::error::{ArchiveError, Result},
    serde::{Deserialize, Serialize},
    std::path::{Component, Path, PathBuf},
};

/// Base URL of the upstream YUM repository.
pub const REPOSITORY_URL: &str = "https://yum.repos.neuron.amazonaws.com";

/// Location of the upstream release notes for the driver.
pub const CHANGELOG_URL: &str = "https://raw.githubusercontent.com/aws-neuron/aws-neuron-sdk/master/release-notes/runtime/aws-neuronx-dkms/index.rst";

/// Filename of the repository signing key, relative to the repository URL.
pub const SIGNING_KEY_FILE: &str = "GPG-PUB-KEY-AMAZON-AWS-NEURON.PUB";

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveConfig {
    /// URL or filesystem path of the YUM repository to mirror.
    pub repository_url: String,

    /// URL or filesystem path of the release notes document.
    pub changelog_url: String,

    /// Filename the release notes are stored under in the archive folder.
    pub changelog_file: String,

    /// Filename of the ASCII armored signing key in the repository and archive folder.
    pub signing_key_file: String,

    /// Root of the Git working tree holding the archive.
    pub repository_path: PathBuf,

    /// Folder, relative to the repository path, holding fetched artifacts.
    pub archive_folder: PathBuf,

    /// Folder, relative to the archive folder, holding fetched packages.
    pub rpm_folder: PathBuf,

    /// Folder, relative to the repository path, holding the extracted sources.
    pub source_folder: PathBuf,

    /// Names of packages to ingest.
    pub package_names: Vec<String>,

    /// Architecture packages must have, if any.
    pub package_arch: Option<String>,

    /// Substring identifying the source directory within a package payload.
    pub source_marker: String,

    /// Directory within a package payload holding source directories.
    pub payload_source_root: PathBuf,

    /// Branch that transactions merge into.
    pub primary_branch: String,

    pub committer_name: Option<String>,
    pub committer_email: Option<String>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            repository_url: REPOSITORY_URL.to_string(),
            changelog_url: CHANGELOG_URL.to_string(),
            changelog_file: "neuron-driver-release-notes.rst".to_string(),
            signing_key_file: SIGNING_KEY_FILE.to_string(),
            repository_path: PathBuf::from("."),
            archive_folder: PathBuf::from("archive"),
            rpm_folder: PathBuf::from("rpm"),
            source_folder: PathBuf::from("src"),
            package_names: vec!["aws-neuron-dkms".to_string(), "aws-neuronx-dkms".to_string()],
            package_arch: Some("noarch".to_string()),
            source_marker: "aws-neuron".to_string(),
            payload_source_root: PathBuf::from("usr/src"),
            primary_branch: "main".to_string(),
            committer_name: None,
            committer_email: None,
        }
    }
}

impl ArchiveConfig {
    /// Parse a configuration from YAML.
    ///
    /// Keys not present retain their default values.
    pub fn from_yaml(s: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;

        Ok(config)
    }

    /// Parse a configuration from a YAML file.
    pub fn from_yaml_path(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| ArchiveError::IoPath(format!("{}", path.display()), e))?;

        Self::from_yaml(&data)
    }

    /// Ensure values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.package_names.is_empty() {
            return Err(ArchiveError::Config(
                "at least one package name is required".into(),
            ));
        }
        if self.primary_branch.is_empty() {
            return Err(ArchiveError::Config("primary branch cannot be empty".into()));
        }
        if self.source_marker.is_empty() {
            return Err(ArchiveError::Config("source marker cannot be empty".into()));
        }

        for (key, path) in [
            ("archive_folder", &self.archive_folder),
            ("rpm_folder", &self.rpm_folder),
            ("source_folder", &self.source_folder),
        ] {
            let plain = !path.as_os_str().is_empty()
                && path
                    .components()
                    .all(|c| matches!(c, Component::Normal(part) if part != ".git"));

            if !plain {
                return Err(ArchiveError::Config(format!(
                    "{} must be a relative path without `.`, `..` or `.git` components",
                    key
                )));
            }
        }

        // The source folder is replaced wholesale on every release.
        if self.source_folder.starts_with(&self.archive_folder)
            || self.archive_folder.starts_with(&self.source_folder)
        {
            return Err(ArchiveError::Config(
                "source_folder and archive_folder must not overlap".into(),
            ));
        }

        for (key, name) in [
            ("signing_key_file", &self.signing_key_file),
            ("changelog_file", &self.changelog_file),
        ] {
            let mut components = Path::new(name).components();

            if !matches!(
                (components.next(), components.next()),
                (Some(Component::Normal(_)), None)
            ) {
                return Err(ArchiveError::Config(format!("{} must be a file name", key)));
            }
        }

        Ok(())
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.repository_path.join(&self.archive_folder)
    }

    pub fn rpm_dir(&self) -> PathBuf {
        self.archive_dir().join(&self.rpm_folder)
    }

    pub fn source_dir(&self) -> PathBuf {
        self.repository_path.join(&self.source_folder)
    }

    /// Path of the trusted signing key in the archive.
    pub fn signing_key_path(&self) -> PathBuf {
        self.archive_dir().join(&self.signing_key_file)
    }

    pub fn changelog_path(&self) -> PathBuf {
        self.archive_dir().join(&self.changelog_file)
    }

    /// Whether a package with the given name and architecture should be ingested.
    pub fn matches_package(&self, name: &str, arch: &str) -> bool {
        self.package_names.iter().any(|n| n == name)
            && self.package_arch.as_deref().map_or(true, |a| a == arch)
    }
}
