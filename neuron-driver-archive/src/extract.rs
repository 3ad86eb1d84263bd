// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Staging of package sources into the archive working tree. */

use {
    crate::{
        config::ArchiveConfig,
        error::{ArchiveError, Result},
    },
    log::{debug, info},
    rpm_repository::package::RpmPackage,
    std::path::{Path, PathBuf},
};

/// Find the single directory under `root` whose name contains `marker`.
pub fn locate_source_tree(root: &Path, marker: &str) -> Result<PathBuf> {
    let entries = std::fs::read_dir(root)
        .map_err(|e| ArchiveError::IoPath(format!("{}", root.display()), e))?;

    let mut matches = vec![];
    for entry in entries {
        let entry = entry?;

        if entry.file_type()?.is_dir() && entry.file_name().to_string_lossy().contains(marker) {
            matches.push(entry.path());
        }
    }

    match matches.len() {
        0 => Err(ArchiveError::SourceTreeNotFound(
            marker.to_string(),
            format!("{}", root.display()),
        )),
        1 => Ok(matches.remove(0)),
        _ => {
            matches.sort();
            Err(ArchiveError::SourceTreeAmbiguous(
                marker.to_string(),
                matches
                    .iter()
                    .map(|p| format!("{}", p.display()))
                    .collect(),
            ))
        }
    }
}

/// Replace the content of `dest` with a copy of `source`.
///
/// `dest` is removed first so nothing from a previous copy survives.
/// Returns the number of files copied.
pub fn replace_tree(source: &Path, dest: &Path) -> Result<usize> {
    if dest.symlink_metadata().is_ok() {
        std::fs::remove_dir_all(dest)
            .map_err(|e| ArchiveError::IoPath(format!("{}", dest.display()), e))?;
    }
    std::fs::create_dir_all(dest)
        .map_err(|e| ArchiveError::IoPath(format!("{}", dest.display()), e))?;

    let mut count = 0;

    for entry in walkdir::WalkDir::new(source).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let rel = entry.path().strip_prefix(source).map_err(|_| {
            ArchiveError::Transaction(format!(
                "{} is outside {}",
                entry.path().display(),
                source.display()
            ))
        })?;
        let target = dest.join(rel);

        if entry.path_is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            std::fs::copy(entry.path(), &target)
                .map_err(|e| ArchiveError::IoPath(format!("{}", target.display()), e))?;
            count += 1;
        }
    }

    Ok(count)
}

#[cfg(unix)]
fn copy_symlink(source: &Path, target: &Path) -> Result<()> {
    let link = std::fs::read_link(source)?;
    std::os::unix::fs::symlink(link, target)?;

    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, _: &Path) -> Result<()> {
    debug!("not copying symlink {}", source.display());
    Ok(())
}

/// Extract a package's payload and make its source tree the content of the source folder.
pub async fn stage_package_sources(package: &RpmPackage, config: &ArchiveConfig) -> Result<usize> {
    let scratch = tempfile::Builder::new()
        .prefix("aws-neuron-driver-")
        .tempdir()?;

    let extracted = package.extract_payload(scratch.path()).await?;
    debug!(
        "extracted {} files to {}",
        extracted.len(),
        scratch.path().display()
    );

    let source_tree = locate_source_tree(
        &scratch.path().join(&config.payload_source_root),
        &config.source_marker,
    )?;

    let dest = config.source_dir();
    let count = replace_tree(&source_tree, &dest)?;

    info!(
        "staged {} files from {} into {}",
        count,
        source_tree
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default(),
        dest.display()
    );

    Ok(count)
}
