// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! RPM repository interaction.

This crate facilitates interacting with RPM package repositories and the
package files they advertise.

RPM repositories are defined by a base URL. Under that base URL is typically a
`repodata` directory containing a `repomd.xml` file. This `repomd.xml` file
(represented by [metadata::repomd::RepoMd]) describes other _metadata_
files constituting the repository.

Files and data structures in the `repodata` directory are defined in the
[metadata] module tree.

The [DataResolver] trait defines a generic path based read interface and
[RepositoryRootReader] binds it to a base URL. Concrete repository readers exist:
[http::HttpRepositoryClient] reads repositories accessed via HTTP and
[filesystem::FilesystemRepositoryClient] reads repositories from a local
directory. [open_repository()] picks one from a URL or path string.

Individual `.rpm` files can be parsed with [package::RpmPackage], have their
OpenPGP signatures verified against a [signature::Keyring], and have their
cpio payload extracted to the filesystem.
*/

pub mod builder;
pub mod error;
pub mod filesystem;
pub mod http;
pub mod io;
pub mod metadata;
pub mod package;
pub mod signature;

pub use crate::error::{Result, RpmRepositoryError};

use {
    crate::{
        io::{read_decompressed, Compression},
        metadata::repomd::RepoMd,
    },
    async_trait::async_trait,
    futures::{AsyncRead, AsyncReadExt},
    std::pin::Pin,
};

/// Path based content fetching.
#[async_trait]
pub trait DataResolver: Sync {
    /// Get the content of a relative path as an async reader.
    ///
    /// This obtains a reader for path data and returns the raw data without any
    /// decoding applied.
    async fn get_path(&self, path: &str) -> Result<Pin<Box<dyn AsyncRead + Send>>>;

    /// Get the full content of a relative path.
    async fn get_path_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let mut reader = self.get_path(path).await?;

        let mut data = vec![];
        reader
            .read_to_end(&mut data)
            .await
            .map_err(|e| RpmRepositoryError::IoPath(path.to_string(), e))?;

        Ok(data)
    }

    /// Get the content of a relative path, transparently applying decompression.
    async fn get_path_decompressed(
        &self,
        path: &str,
        compression: Compression,
    ) -> Result<Pin<Box<dyn AsyncRead + Send>>> {
        let reader = self.get_path(path).await?;

        Ok(read_decompressed(
            futures::io::BufReader::new(reader),
            compression,
        ))
    }
}

/// A read-only interface for the root of an RPM repository.
#[async_trait]
pub trait RepositoryRootReader: DataResolver + Sync {
    /// Obtain the URL to which this reader is bound.
    fn url(&self) -> Result<url::Url>;

    /// Resolve the URL of a path relative to the repository root.
    fn path_url(&self, path: &str) -> Result<url::Url> {
        Ok(self.url()?.join(path)?)
    }

    /// Fetch and parse a `repomd.xml` file given the relative path to that file.
    async fn fetch_repomd(&self, path: &str) -> Result<RepoMd> {
        let data = self.get_path_bytes(path).await?;

        RepoMd::from_reader(std::io::Cursor::new(data))
    }
}

/// Obtain a repository reader for a URL or filesystem path.
///
/// Values containing `://` are parsed as URLs. `http://` and `https://` URLs
/// resolve to [http::HttpRepositoryClient]; `file://` URLs and everything else
/// resolve to [filesystem::FilesystemRepositoryClient].
pub fn open_repository(location: &str) -> Result<Box<dyn RepositoryRootReader + Send>> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Ok(Box::new(http::HttpRepositoryClient::new(location)?))
    } else if let Some(path) = location.strip_prefix("file://") {
        Ok(Box::new(filesystem::FilesystemRepositoryClient::new(path)))
    } else {
        Ok(Box::new(filesystem::FilesystemRepositoryClient::new(
            location,
        )))
    }
}
