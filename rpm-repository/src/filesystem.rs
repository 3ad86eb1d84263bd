// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Filesystem based RPM repositories. */

use {
    crate::{
        error::{Result, RpmRepositoryError},
        DataResolver, RepositoryRootReader,
    },
    async_trait::async_trait,
    futures::{io::BufReader, AsyncRead},
    log::debug,
    std::{
        path::{Path, PathBuf},
        pin::Pin,
    },
    url::Url,
};

/// A readable interface to an RPM repository backed by a filesystem.
#[derive(Clone, Debug)]
pub struct FilesystemRepositoryClient {
    root_dir: PathBuf,
}

impl FilesystemRepositoryClient {
    /// Construct a new instance, bound to the root directory specified.
    ///
    /// No validation of the passed path is performed.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            root_dir: path.as_ref().to_path_buf(),
        }
    }

    /// Resolve a request path to a filesystem path.
    ///
    /// `file://` URLs and absolute paths are used as-is. Everything else is
    /// relative to the repository root.
    fn resolve_path(&self, path: &str) -> PathBuf {
        if let Some(stripped) = path.strip_prefix("file://") {
            PathBuf::from(stripped)
        } else {
            self.root_dir.join(path)
        }
    }
}

#[async_trait]
impl DataResolver for FilesystemRepositoryClient {
    async fn get_path(&self, path: &str) -> Result<Pin<Box<dyn AsyncRead + Send>>> {
        let path = self.resolve_path(path);

        debug!("reading {}", path.display());

        let f = std::fs::File::open(&path)
            .map_err(|e| RpmRepositoryError::IoPath(format!("{}", path.display()), e))?;

        Ok(Box::pin(BufReader::new(futures::io::AllowStdIo::new(f))))
    }
}

impl RepositoryRootReader for FilesystemRepositoryClient {
    fn url(&self) -> Result<Url> {
        let root = if self.root_dir.is_absolute() {
            self.root_dir.clone()
        } else {
            std::env::current_dir()?.join(&self.root_dir)
        };

        Url::from_directory_path(&root).map_err(|_| {
            RpmRepositoryError::IoPath(
                format!("{}", root.display()),
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "error converting filesystem path to URL",
                ),
            )
        })
    }
}

#[cfg(test)]
mod test {
    use {super::*, futures::AsyncReadExt};

    #[tokio::test]
    async fn read_relative_and_absolute() -> Result<()> {
        let td = tempfile::TempDir::new()?;
        std::fs::create_dir_all(td.path().join("repodata"))?;
        std::fs::write(td.path().join("repodata").join("repomd.xml"), b"index")?;
        let outside = tempfile::NamedTempFile::new()?;
        std::fs::write(outside.path(), b"notes")?;

        let client = FilesystemRepositoryClient::new(td.path());

        assert_eq!(client.get_path_bytes("repodata/repomd.xml").await?, b"index");

        let mut data = vec![];
        client
            .get_path(&format!("file://{}", outside.path().display()))
            .await?
            .read_to_end(&mut data)
            .await?;
        assert_eq!(data, b"notes");

        assert!(client.url()?.as_str().ends_with('/'));

        Ok(())
    }

    #[tokio::test]
    async fn missing_file() {
        let client = FilesystemRepositoryClient::new("/nonexistent-repository-root");

        assert!(matches!(
            client.get_path("repodata/repomd.xml").await,
            Err(RpmRepositoryError::IoPath(_, _))
        ));
    }
}
