// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! In-memory [VersionedArchive] for tests.

The working tree is a real temporary directory. Committed state is a snapshot
of file contents held in memory.
*/

use {
    crate::{
        archive::VersionedArchive,
        error::{ArchiveError, Result},
    },
    std::{
        collections::{BTreeMap, BTreeSet},
        path::Path,
    },
};

pub struct MemoryArchive {
    dir: tempfile::TempDir,
    committed: BTreeMap<String, Vec<u8>>,
    pending: Vec<(String, Vec<String>)>,
    commits: Vec<(String, Vec<String>)>,
    tags: BTreeMap<String, usize>,
    branch: Option<String>,
}

impl MemoryArchive {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: tempfile::TempDir::new()?,
            committed: BTreeMap::new(),
            pending: vec![],
            commits: vec![],
            tags: BTreeMap::new(),
            branch: None,
        })
    }

    /// Commits merged into the primary branch as (message, paths).
    pub fn commits(&self) -> &[(String, Vec<String>)] {
        &self.commits
    }

    /// Forget a tag, as if tagging never happened.
    pub fn remove_tag(&mut self, name: &str) {
        self.tags.remove(name);
    }

    /// The open feature branch.
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    fn snapshot(&self) -> Result<BTreeMap<String, Vec<u8>>> {
        let mut files = BTreeMap::new();

        for entry in walkdir::WalkDir::new(self.dir.path()).min_depth(1) {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }

            let rel = entry
                .path()
                .strip_prefix(self.dir.path())
                .map_err(|e| ArchiveError::Transaction(format!("{:?}", e)))?
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join("/");

            let content = if entry.path_is_symlink() {
                std::fs::read_link(entry.path())?
                    .to_string_lossy()
                    .as_bytes()
                    .to_vec()
            } else {
                std::fs::read(entry.path())?
            };

            files.insert(rel, content);
        }

        Ok(files)
    }

    fn require_branch(&self) -> Result<()> {
        if self.branch.is_none() {
            Err(ArchiveError::Transaction("no transaction in progress".into()))
        } else {
            Ok(())
        }
    }
}

impl VersionedArchive for MemoryArchive {
    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn list_tags(&self) -> Result<BTreeSet<String>> {
        Ok(self.tags.keys().cloned().collect())
    }

    fn primary_message(&self) -> Result<Option<String>> {
        Ok(self.commits.last().map(|(message, _)| message.clone()))
    }

    fn begin_transaction(&mut self, branch: &str) -> Result<()> {
        self.pending.clear();
        self.branch = Some(branch.to_string());
        Ok(())
    }

    fn changed_paths(&self) -> Result<Vec<String>> {
        let current = self.snapshot()?;

        let paths = current
            .keys()
            .chain(self.committed.keys())
            .filter(|path| current.get(*path) != self.committed.get(*path))
            .cloned()
            .collect::<BTreeSet<_>>();

        Ok(paths.into_iter().collect())
    }

    fn stage_and_commit(&mut self, paths: &[String], message: &str) -> Result<()> {
        self.require_branch()?;
        let current = self.snapshot()?;

        for path in paths {
            match current.get(path) {
                Some(content) => {
                    self.committed.insert(path.clone(), content.clone());
                }
                None => {
                    self.committed.remove(path);
                }
            }
        }

        self.pending.push((message.to_string(), paths.to_vec()));
        Ok(())
    }

    fn merge_to_primary(&mut self) -> Result<()> {
        self.require_branch()?;
        self.commits.append(&mut self.pending);
        Ok(())
    }

    fn tag(&mut self, name: &str) -> Result<()> {
        if self.tags.contains_key(name) {
            return Err(ArchiveError::Transaction(format!("tag {} exists", name)));
        }

        self.tags.insert(name.to_string(), self.commits.len());
        Ok(())
    }

    fn cleanup(&mut self) -> Result<()> {
        self.require_branch()?;
        self.branch = None;
        Ok(())
    }

    fn abandon_transaction(&mut self) -> Result<()> {
        self.pending.clear();
        self.branch = None;
        Ok(())
    }
}
