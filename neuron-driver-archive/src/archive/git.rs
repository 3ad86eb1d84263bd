// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Git backed archive. */

use {
    crate::{
        archive::VersionedArchive,
        config::ArchiveConfig,
        error::{ArchiveError, Result},
    },
    git2::{
        build::CheckoutBuilder, BranchType, Commit, ErrorCode, Repository, Signature, Status,
        StatusOptions,
    },
    log::{debug, info},
    std::{
        collections::BTreeSet,
        path::{Path, PathBuf},
    },
};

/// A [VersionedArchive] stored in a non-bare Git repository.
pub struct GitArchive {
    repo: Repository,
    workdir: PathBuf,
    primary_branch: String,
    identity: Option<(String, String)>,
    feature_branch: Option<String>,
}

impl GitArchive {
    /// Open the repository at the configured repository path.
    pub fn open(config: &ArchiveConfig) -> Result<Self> {
        let repo = Repository::open(&config.repository_path)?;

        let identity = match (&config.committer_name, &config.committer_email) {
            (Some(name), Some(email)) => Some((name.clone(), email.clone())),
            _ => None,
        };

        Self::from_repository(repo, &config.primary_branch, identity)
    }

    pub fn from_repository(
        repo: Repository,
        primary_branch: &str,
        identity: Option<(String, String)>,
    ) -> Result<Self> {
        let workdir = repo
            .workdir()
            .ok_or_else(|| {
                ArchiveError::Transaction("archive repository must have a working tree".into())
            })?
            .to_path_buf();

        Ok(Self {
            repo,
            workdir,
            primary_branch: primary_branch.to_string(),
            identity,
            feature_branch: None,
        })
    }

    fn primary_ref(&self) -> String {
        format!("refs/heads/{}", self.primary_branch)
    }

    fn signature(&self) -> Result<Signature<'static>> {
        Ok(match &self.identity {
            Some((name, email)) => Signature::now(name, email)?,
            None => self.repo.signature()?,
        })
    }

    fn primary_commit(&self) -> Result<Commit<'_>> {
        match self.repo.find_reference(&self.primary_ref()) {
            Ok(reference) => Ok(reference.peel_to_commit()?),
            Err(e) if e.code() == ErrorCode::NotFound => Err(ArchiveError::Transaction(format!(
                "primary branch {} has no commits",
                self.primary_branch
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn feature(&self) -> Result<&str> {
        self.feature_branch
            .as_deref()
            .ok_or_else(|| ArchiveError::Transaction("no transaction in progress".into()))
    }

    fn delete_feature_branch(&mut self) -> Result<()> {
        let name = self.feature()?.to_string();

        match self.repo.find_branch(&name, BranchType::Local) {
            Ok(mut branch) => branch.delete()?,
            Err(e) if e.code() == ErrorCode::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        debug!("deleted branch {}", name);
        self.feature_branch = None;

        Ok(())
    }
}

impl VersionedArchive for GitArchive {
    fn root(&self) -> &Path {
        &self.workdir
    }

    fn list_tags(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .repo
            .tag_names(None)?
            .iter()
            .flatten()
            .map(|s| s.to_string())
            .collect())
    }

    fn primary_message(&self) -> Result<Option<String>> {
        Ok(self.primary_commit()?.message().map(|m| m.to_string()))
    }

    fn begin_transaction(&mut self, branch: &str) -> Result<()> {
        if let Some(existing) = &self.feature_branch {
            return Err(ArchiveError::Transaction(format!(
                "transaction on {} already in progress",
                existing
            )));
        }

        // HEAD can't be the branch being reset. The working tree is left alone.
        self.repo.set_head(&self.primary_ref())?;

        let tip = self.primary_commit()?;
        self.repo.branch(branch, &tip, true)?;
        self.repo.set_head(&format!("refs/heads/{}", branch))?;

        debug!("began transaction on {} at {}", branch, tip.id());
        self.feature_branch = Some(branch.to_string());

        Ok(())
    }

    fn changed_paths(&self) -> Result<Vec<String>> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);

        let statuses = self.repo.statuses(Some(&mut opts))?;

        let paths = statuses
            .iter()
            .filter(|entry| {
                let status = entry.status();
                status != Status::CURRENT && !status.contains(Status::IGNORED)
            })
            .filter_map(|entry| entry.path().map(|p| p.to_string()))
            .collect::<BTreeSet<_>>();

        Ok(paths.into_iter().collect())
    }

    fn stage_and_commit(&mut self, paths: &[String], message: &str) -> Result<()> {
        self.feature()?;

        let parent = self.repo.head()?.peel_to_commit()?;

        // Only the given paths may differ from the parent commit.
        let mut index = self.repo.index()?;
        index.read_tree(&parent.tree()?)?;

        for path in paths {
            let rel = Path::new(path);

            if self.workdir.join(rel).symlink_metadata().is_ok() {
                index.add_path(rel)?;
            } else {
                index.remove_path(rel)?;
            }
        }

        index.write()?;
        let tree = self.repo.find_tree(index.write_tree()?)?;

        let signature = self.signature()?;

        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &[&parent],
        )?;

        debug!("committed {} on {}", oid, self.feature()?);

        Ok(())
    }

    fn merge_to_primary(&mut self) -> Result<()> {
        let feature = self.feature()?.to_string();
        let primary_ref = self.primary_ref();

        let feature_commit = self
            .repo
            .find_branch(&feature, BranchType::Local)?
            .get()
            .peel_to_commit()?;
        let primary_commit = self.primary_commit()?;

        if feature_commit.id() == primary_commit.id()
            || self
                .repo
                .graph_descendant_of(feature_commit.id(), primary_commit.id())?
        {
            self.repo.find_reference(&primary_ref)?.set_target(
                feature_commit.id(),
                &format!("merge {}: Fast-forward", feature),
            )?;
        } else {
            let mut index = self
                .repo
                .merge_commits(&primary_commit, &feature_commit, None)?;

            if index.has_conflicts() {
                return Err(ArchiveError::Transaction(format!(
                    "merging {} into {} produced conflicts",
                    feature, self.primary_branch
                )));
            }

            let tree = self.repo.find_tree(index.write_tree_to(&self.repo)?)?;
            let signature = self.signature()?;

            let oid = self.repo.commit(
                Some(&primary_ref),
                &signature,
                &signature,
                &format!("Merge branch '{}'", feature),
                &tree,
                &[&primary_commit, &feature_commit],
            )?;

            // Bring in content from the primary side before switching to it.
            let merged = self.repo.find_commit(oid)?;
            self.repo
                .checkout_tree(merged.as_object(), Some(CheckoutBuilder::new().safe()))?;
        }

        self.repo.set_head(&primary_ref)?;

        info!("merged {} into {}", feature, self.primary_branch);

        Ok(())
    }

    fn tag(&mut self, name: &str) -> Result<()> {
        let commit = self.repo.head()?.peel_to_commit()?;
        self.repo.tag_lightweight(name, commit.as_object(), false)?;

        info!("tagged {} as {}", commit.id(), name);

        Ok(())
    }

    fn cleanup(&mut self) -> Result<()> {
        self.delete_feature_branch()
    }

    fn abandon_transaction(&mut self) -> Result<()> {
        self.repo.set_head(&self.primary_ref())?;
        self.delete_feature_branch()
    }
}

/// Create a repository with a single commit on `main`.
#[cfg(test)]
pub(crate) fn init_test_repository(path: &Path) -> Result<GitArchive> {
    let mut opts = git2::RepositoryInitOptions::new();
    opts.initial_head("main");
    let repo = Repository::init_opts(path, &opts)?;

    std::fs::write(path.join("README.md"), b"# Neuron driver archive\n")?;

    {
        let mut index = repo.index()?;
        index.add_path(Path::new("README.md"))?;
        index.write()?;
        let tree = repo.find_tree(index.write_tree()?)?;
        let signature = Signature::now("Archive Test", "archive@example.com")?;
        repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            "Initial commit",
            &tree,
            &[],
        )?;
    }

    GitArchive::from_repository(
        repo,
        "main",
        Some(("Archive Test".into(), "archive@example.com".into())),
    )
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::archive::transaction::{run_transaction, TransactionDescriptor, TransactionOutcome},
    };

    fn commit_count(archive: &GitArchive) -> Result<usize> {
        let mut walk = archive.repo.revwalk()?;
        walk.push_head()?;
        Ok(walk.count())
    }

    #[test]
    fn transaction_lifecycle() -> Result<()> {
        let td = tempfile::TempDir::new()?;
        let mut archive = init_test_repository(td.path())?;

        std::fs::create_dir_all(td.path().join("src"))?;
        std::fs::write(td.path().join("src/neuron_module.c"), b"int x;\n")?;

        assert_eq!(archive.changed_paths()?, vec!["src/neuron_module.c".to_string()]);

        let outcome = run_transaction(
            &mut archive,
            &TransactionDescriptor::release("2.16.7.0", "feat: Neuron Driver 2.16.7.0"),
        )?;
        assert!(matches!(outcome, TransactionOutcome::Committed { .. }));

        assert_eq!(commit_count(&archive)?, 2);
        assert!(archive.list_tags()?.contains("2.16.7.0"));
        assert!(archive.changed_paths()?.is_empty());
        assert_eq!(archive.repo.head()?.shorthand(), Some("main"));
        assert!(archive
            .repo
            .find_branch("feat-neuron-driver-release", BranchType::Local)
            .is_err());

        let head = archive.repo.head()?.peel_to_commit()?;
        assert_eq!(
            head.message(),
            Some("feat: Neuron Driver 2.16.7.0\n\nChanged files:\n- src/neuron_module.c\n")
        );

        // Deletions are recorded too.
        std::fs::remove_file(td.path().join("src/neuron_module.c"))?;
        run_transaction(&mut archive, &TransactionDescriptor::release("2.17.17.0", "feat: Neuron Driver 2.17.17.0"))?;
        assert_eq!(commit_count(&archive)?, 3);
        assert!(archive
            .repo
            .head()?
            .peel_to_tree()?
            .get_path(Path::new("src/neuron_module.c"))
            .is_err());

        Ok(())
    }

    #[test]
    fn empty_transaction_leaves_primary_untouched() -> Result<()> {
        let td = tempfile::TempDir::new()?;
        let mut archive = init_test_repository(td.path())?;
        let before = archive.repo.head()?.peel_to_commit()?.id();

        let outcome = run_transaction(&mut archive, &TransactionDescriptor::changelog())?;

        assert_eq!(outcome, TransactionOutcome::NoChanges);
        assert_eq!(archive.repo.head()?.peel_to_commit()?.id(), before);
        assert_eq!(archive.repo.head()?.shorthand(), Some("main"));
        assert!(archive
            .repo
            .find_branch("feat-update-archive-changelog", BranchType::Local)
            .is_err());

        Ok(())
    }

    #[test]
    fn stale_feature_branch_is_reset() -> Result<()> {
        let td = tempfile::TempDir::new()?;
        let mut archive = init_test_repository(td.path())?;

        // Simulate a crashed run that left a commit on the feature branch.
        std::fs::write(td.path().join("stale.txt"), b"stale")?;
        archive.begin_transaction("feat-update-archive-repodata")?;
        archive.stage_and_commit(&["stale.txt".to_string()], "stale")?;
        archive.feature_branch = None;
        std::fs::remove_file(td.path().join("stale.txt"))?;

        archive.begin_transaction("feat-update-archive-repodata")?;
        let feature_tip = archive
            .repo
            .find_branch("feat-update-archive-repodata", BranchType::Local)?
            .get()
            .peel_to_commit()?
            .id();
        assert_eq!(feature_tip, archive.primary_commit()?.id());
        archive.abandon_transaction()?;

        Ok(())
    }

    #[test]
    fn commit_excludes_previously_staged_paths() -> Result<()> {
        let td = tempfile::TempDir::new()?;
        let mut archive = init_test_repository(td.path())?;

        std::fs::write(td.path().join("unrelated.txt"), b"unrelated\n")?;
        {
            let mut index = archive.repo.index()?;
            index.add_path(Path::new("unrelated.txt"))?;
            index.write()?;
        }

        std::fs::create_dir_all(td.path().join("src"))?;
        std::fs::write(td.path().join("src/neuron_module.c"), b"int x;\n")?;

        let outcome = run_transaction(
            &mut archive,
            &TransactionDescriptor::release("2.1", "feat: Neuron Driver 2.1")
                .with_scope(vec!["src".into()]),
        )?;
        assert_eq!(
            outcome,
            TransactionOutcome::Committed {
                paths: vec!["src/neuron_module.c".to_string()]
            }
        );

        let head = archive.repo.head()?.peel_to_commit()?;
        let tree = head.tree()?;
        assert!(tree.get_path(Path::new("src/neuron_module.c")).is_ok());
        assert!(tree.get_path(Path::new("unrelated.txt")).is_err());
        assert!(!head.message().unwrap_or_default().contains("unrelated.txt"));
        assert!(td.path().join("unrelated.txt").exists());

        Ok(())
    }
}
