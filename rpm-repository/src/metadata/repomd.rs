// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! `repomd.xml` file format. */

use {
    crate::{
        error::{Result, RpmRepositoryError},
        io::{Compression, ContentDigest},
    },
    serde::{Deserialize, Serialize},
    std::io::Read,
};

/// Relative path of the `repomd.xml` file in a repository.
pub const REPOMD_PATH: &str = "repodata/repomd.xml";

/// A `repomd.xml` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoMd {
    /// Revision of the repository.
    ///
    /// Often an integer-like value.
    #[serde(default)]
    pub revision: String,
    /// Describes additional primary data files constituting this repository.
    pub data: Vec<RepoMdData>,
}

impl RepoMd {
    /// Construct an instance by parsing XML from a reader.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        Ok(serde_xml_rs::from_reader(reader)?)
    }

    /// Construct an instance by parsing XML from a string.
    pub fn from_xml(s: &str) -> Result<Self> {
        Ok(serde_xml_rs::from_str(s)?)
    }

    /// Find the `<data>` entry of a given type.
    pub fn find(&self, data_type: &str) -> Option<&RepoMdData> {
        self.data.iter().find(|entry| entry.data_type == data_type)
    }

    /// Obtain the `primary` entry, which must exist in a usable repository.
    pub fn primary(&self) -> Result<&RepoMdData> {
        self.find("primary")
            .ok_or(RpmRepositoryError::MetadataFileNotFound("primary"))
    }
}

/// A `<data>` element in a `repomd.xml` file.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RepoMdData {
    /// The type of data.
    #[serde(rename = "type")]
    pub data_type: String,
    /// Content checksum of this file.
    pub checksum: Checksum,
    /// Where the file is located.
    pub location: Location,
    /// Size in bytes of the file as stored in the repository.
    pub size: Option<u64>,
    /// Time file was created/modified.
    pub timestamp: Option<u64>,
    /// Content checksum of the decoded (often decompressed) file.
    #[serde(rename = "open-checksum")]
    pub open_checksum: Option<Checksum>,
    /// Size in bytes of the decoded (often decompressed) file.
    #[serde(rename = "open-size")]
    pub open_size: Option<u64>,
}

impl RepoMdData {
    /// The declared content digest of the file as stored.
    pub fn digest(&self) -> Result<ContentDigest> {
        ContentDigest::try_from(self.checksum.clone())
    }

    /// Compression of the stored file, derived from its location.
    pub fn compression(&self) -> Compression {
        Compression::from_path(&self.location.href)
    }

    /// The filename this entry is stored under locally.
    ///
    /// See [normalized_filename()].
    pub fn normalized_filename(&self) -> &str {
        normalized_filename(&self.location.href)
    }
}

/// The content checksum of a `<data>` element.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Checksum {
    /// The name of the content digest.
    #[serde(rename = "type")]
    pub name: String,
    /// The hex encoded content digest.
    #[serde(rename = "$value")]
    pub value: String,
}

impl TryFrom<Checksum> for ContentDigest {
    type Error = RpmRepositoryError;

    fn try_from(v: Checksum) -> std::result::Result<Self, Self::Error> {
        ContentDigest::from_checksum(&v.name, &v.value)
    }
}

/// The location of a `<data>` element.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Location {
    pub href: String,
}

/// Reduce a metadata location to a stable filename.
///
/// The directory is dropped, as is the `<hex digest>-` prefix `createrepo` puts in
/// front of content-addressed metadata files. e.g.
/// `repodata/0572...fb27-filelists.xml.gz` becomes `filelists.xml.gz`.
pub fn normalized_filename(href: &str) -> &str {
    let base = href.rsplit('/').next().unwrap_or(href);

    match base.split_once('-') {
        Some((prefix, rest))
            if prefix.len() >= 32 && prefix.chars().all(|c| c.is_ascii_hexdigit()) =>
        {
            rest
        }
        _ => base,
    }
}
