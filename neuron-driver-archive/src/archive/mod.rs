// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Versioned storage of the archive.

The archive is a working tree whose history only ever grows through
transactions: a feature branch is cut from the primary branch, changes are
committed to it and merged back, and the feature branch is deleted. Tags name
ingested upstream versions and form the ledger of completed work.
*/

pub mod git;
#[cfg(test)]
pub mod memory;
pub mod transaction;

use {crate::error::Result, std::collections::BTreeSet, std::path::Path};

/// Storage operations the ingestion pipeline needs from an archive.
pub trait VersionedArchive {
    /// Root directory of the working tree.
    fn root(&self) -> &Path;

    /// Names of all tags.
    fn list_tags(&self) -> Result<BTreeSet<String>>;

    /// Message of the commit at the primary branch tip.
    fn primary_message(&self) -> Result<Option<String>>;

    /// Start a transaction on a feature branch cut from the primary branch tip.
    ///
    /// An existing branch of the same name is reset to the primary branch tip.
    fn begin_transaction(&mut self, branch: &str) -> Result<()>;

    /// Paths relative to [Self::root()] whose content differs from the last commit.
    ///
    /// Paths use `/` as separator and are sorted.
    fn changed_paths(&self) -> Result<Vec<String>>;

    /// Record exactly the given paths in a commit on the feature branch.
    fn stage_and_commit(&mut self, paths: &[String], message: &str) -> Result<()>;

    /// Merge the feature branch into the primary branch and switch to it.
    fn merge_to_primary(&mut self) -> Result<()>;

    /// Tag the primary branch tip.
    fn tag(&mut self, name: &str) -> Result<()>;

    /// Delete the feature branch after a successful merge.
    fn cleanup(&mut self) -> Result<()>;

    /// End a transaction without committing anything.
    fn abandon_transaction(&mut self) -> Result<()>;
}
