// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Retrieval of remote content. */

use {
    crate::error::{ArchiveError, Result},
    log::{debug, info},
    rpm_repository::{
        io::{decompress_bytes, Compression},
        open_repository, RepositoryRootReader,
    },
    std::path::{Path, PathBuf},
};

/// Fetches content from the mirrored repository and other locations.
pub struct ContentFetcher {
    repository: Box<dyn RepositoryRootReader + Send>,
}

impl ContentFetcher {
    /// Construct an instance bound to a repository URL or filesystem path.
    pub fn new(repository_url: &str) -> Result<Self> {
        Ok(Self::from_reader(open_repository(repository_url)?))
    }

    pub fn from_reader(repository: Box<dyn RepositoryRootReader + Send>) -> Self {
        Self { repository }
    }

    /// The URL of the repository root.
    pub fn repository_url(&self) -> Result<String> {
        Ok(self.repository.url()?.to_string())
    }

    /// Fetch a path relative to the repository root into memory.
    pub async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        info!("fetching {}", self.repository.path_url(path)?);

        let data = self.repository.get_path_bytes(path).await?;
        debug!("fetched {} bytes from {}", data.len(), path);

        Ok(data)
    }

    /// Fetch a standalone document given its URL or filesystem path.
    pub async fn fetch_document(&self, location: &str) -> Result<Vec<u8>> {
        let (base, name) = match location.rsplit_once('/') {
            Some((base, name)) if !base.is_empty() && !base.ends_with('/') => (base, name),
            _ => {
                return Err(ArchiveError::Config(format!(
                    "cannot resolve document location: {}",
                    location
                )))
            }
        };

        info!("fetching {}", location);

        Ok(open_repository(base)?.get_path_bytes(name).await?)
    }

    /// Fetch a repository path and write it to a directory under a given filename.
    pub async fn fetch_to(&self, path: &str, dir: &Path, filename: &str) -> Result<PathBuf> {
        let data = self.fetch(path).await?;

        Self::persist(&data, dir, filename)
    }

    /// Write content to a file in a directory, creating the directory if needed.
    pub fn persist(data: &[u8], dir: &Path, filename: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .map_err(|e| ArchiveError::IoPath(format!("{}", dir.display()), e))?;

        let path = dir.join(filename);
        std::fs::write(&path, data)
            .map_err(|e| ArchiveError::IoPath(format!("{}", path.display()), e))?;

        debug!("wrote {}", path.display());

        Ok(path)
    }

    /// Decompress fetched content.
    pub async fn decompress(data: &[u8], compression: Compression) -> Result<Vec<u8>> {
        Ok(decompress_bytes(data, compression).await?)
    }
}
