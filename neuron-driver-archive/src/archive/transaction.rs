// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    crate::{archive::VersionedArchive, error::Result},
    log::{info, warn},
};

pub const GPG_KEY_BRANCH: &str = "feat-update-archive-gpg-pub-key";
pub const REPODATA_BRANCH: &str = "feat-update-archive-repodata";
pub const CHANGELOG_BRANCH: &str = "feat-update-archive-changelog";
pub const RELEASE_BRANCH: &str = "feat-neuron-driver-release";

/// Describes one unit of change to record in the archive.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransactionDescriptor {
    /// Feature branch the change is committed on.
    pub branch: String,
    /// Commit message. Changed paths are appended.
    pub message: String,
    /// Tag to apply to the merged commit.
    pub tag: Option<String>,
    /// Path prefixes eligible for staging. Empty means everything.
    pub scope: Vec<String>,
}

impl TransactionDescriptor {
    pub fn new(branch: impl ToString, message: impl ToString) -> Self {
        Self {
            branch: branch.to_string(),
            message: message.to_string(),
            tag: None,
            scope: vec![],
        }
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl ToString) -> Self {
        self.tag = Some(tag.to_string());
        self
    }

    /// Restrict staging to paths at or under the given relative paths.
    #[must_use]
    pub fn with_scope(mut self, scope: impl IntoIterator<Item = String>) -> Self {
        self.scope = scope.into_iter().collect();
        self
    }

    pub fn gpg_key() -> Self {
        Self::new(GPG_KEY_BRANCH, "feat: Update archive - GPG Public Key")
    }

    pub fn repodata() -> Self {
        Self::new(REPODATA_BRANCH, "feat: Update archive - Repository metadata")
    }

    pub fn changelog() -> Self {
        Self::new(CHANGELOG_BRANCH, "feat: Update archive - Changelog")
    }

    /// A driver release, tagged with its version.
    pub fn release(version: &str, message: impl ToString) -> Self {
        Self::new(RELEASE_BRANCH, message).with_tag(version)
    }

    fn in_scope(&self, path: &str) -> bool {
        self.scope.is_empty()
            || self.scope.iter().any(|prefix| {
                let prefix = prefix.trim_end_matches('/');
                path == prefix
                    || path
                        .strip_prefix(prefix)
                        .map_or(false, |rest| rest.starts_with('/'))
            })
    }

    /// The full commit message for a set of staged paths.
    pub fn commit_message(&self, paths: &[String]) -> String {
        let mut message = self.message.trim_end().to_string();
        message.push_str("\n\nChanged files:\n");

        for path in paths {
            message.push_str(&format!("- {}\n", path));
        }

        message
    }
}

/// Result of running a transaction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TransactionOutcome {
    /// A commit was merged into the primary branch.
    Committed { paths: Vec<String> },
    /// Nothing changed; no commit was created.
    NoChanges,
}

/// Record working tree changes through a feature branch.
///
/// Any failure is returned immediately. A partially completed transaction
/// leaves at most a feature branch behind; the primary branch only moves on a
/// successful merge.
pub fn run_transaction(
    archive: &mut dyn VersionedArchive,
    descriptor: &TransactionDescriptor,
) -> Result<TransactionOutcome> {
    archive.begin_transaction(&descriptor.branch)?;

    let paths = archive
        .changed_paths()?
        .into_iter()
        .filter(|path| descriptor.in_scope(path))
        .collect::<Vec<_>>();

    if paths.is_empty() {
        warn!("no changes to record on {}", descriptor.branch);
        archive.abandon_transaction()?;
        return Ok(TransactionOutcome::NoChanges);
    }

    let message = descriptor.commit_message(&paths);
    archive.stage_and_commit(&paths, &message)?;
    archive.merge_to_primary()?;

    if let Some(tag) = &descriptor.tag {
        archive.tag(tag)?;
    }

    archive.cleanup()?;

    info!(
        "recorded {} changed paths via {}",
        paths.len(),
        descriptor.branch
    );

    Ok(TransactionOutcome::Committed { paths })
}
