// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Repository metadata resolution.

The repository index (`repomd.xml`) is fetched first. The `primary`,
`filelists` and `other` files it advertises are each fetched, persisted to the
archive folder, checksum verified and decompressed. The `primary` catalog is
then reduced to the packages of interest.
*/

use {
    crate::{
        config::ArchiveConfig,
        error::{ArchiveError, Result},
        fetch::ContentFetcher,
        integrity::{require_checksum, write_sidecar},
        version::VersionKey,
    },
    chrono::{DateTime, TimeZone, Utc},
    log::{debug, info, warn},
    rpm_repository::{
        io::ContentDigest,
        metadata::{
            primary::{Package, Primary},
            repomd::{RepoMd, REPOMD_PATH},
        },
    },
    std::{
        collections::BTreeMap,
        path::{Path, PathBuf},
    },
};

/// Metadata types fetched from the repository index.
pub const METADATA_TYPES: [&str; 3] = ["primary", "filelists", "other"];

/// A package release eligible for ingestion.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    pub release: Option<String>,
    pub arch: String,
    pub checksum: ContentDigest,
    /// Location of the package relative to the repository root.
    pub location: String,
    /// Seconds since the UNIX epoch the package was built at.
    pub build_time: u64,
    pub license: Option<String>,
    pub summary: String,
    pub description: String,
    pub build_host: Option<String>,
}

impl PackageRecord {
    pub fn from_package(package: &Package) -> Result<Self> {
        Ok(Self {
            name: package.name.clone(),
            version: package.version.version.clone(),
            release: package.version.release.clone(),
            arch: package.arch.clone(),
            checksum: package.digest()?,
            location: package.location.href.clone(),
            build_time: package.time.build,
            license: package.license().map(|s| s.to_string()),
            summary: package.summary.clone(),
            description: package.description.clone(),
            build_host: package.build_host().map(|s| s.to_string()),
        })
    }

    /// The filename component of the package location.
    pub fn filename(&self) -> &str {
        self.location.rsplit('/').next().unwrap_or(&self.location)
    }

    pub fn build_time_utc(&self) -> Result<DateTime<Utc>> {
        i64::try_from(self.build_time)
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .ok_or(ArchiveError::Timestamp(self.build_time))
    }
}

/// Package records of interest keyed by version string.
///
/// When several records share a version, the one inserted last is kept.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    records: BTreeMap<String, PackageRecord>,
    superseded: usize,
}

impl Catalog {
    /// Build a catalog from `primary.xml` packages matching the configured filter.
    pub fn from_packages<'a>(
        packages: impl IntoIterator<Item = &'a Package>,
        config: &ArchiveConfig,
    ) -> Result<Self> {
        let mut catalog = Self::default();

        for package in packages {
            if !config.matches_package(&package.name, &package.arch) {
                continue;
            }

            catalog.insert(PackageRecord::from_package(package)?);
        }

        Ok(catalog)
    }

    /// Insert a record, returning the record it replaced, if any.
    pub fn insert(&mut self, record: PackageRecord) -> Option<PackageRecord> {
        let previous = self.records.insert(record.version.clone(), record);

        if let Some(previous) = &previous {
            warn!(
                "{} {} listed more than once; using the last entry",
                previous.name, previous.version
            );
            self.superseded += 1;
        }

        previous
    }

    pub fn get(&self, version: &str) -> Option<&PackageRecord> {
        self.records.get(version)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records replaced by a later record with the same version.
    pub fn superseded(&self) -> usize {
        self.superseded
    }

    /// Records sorted ascending by [VersionKey].
    ///
    /// Any version string that can't be parsed fails the whole operation.
    pub fn ordered(&self) -> Result<Vec<(VersionKey, &PackageRecord)>> {
        let mut records = self
            .records
            .iter()
            .map(|(version, record)| Ok((VersionKey::parse(version)?, record)))
            .collect::<Result<Vec<_>>>()?;

        records.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(records)
    }
}

/// The outcome of resolving repository metadata.
#[derive(Debug)]
pub struct ResolvedMetadata {
    pub repomd: RepoMd,
    /// Decoded content of each fetched metadata file, keyed by type.
    pub files: BTreeMap<String, Vec<u8>>,
    /// Files written to the archive folder.
    pub persisted: Vec<PathBuf>,
    pub catalog: Catalog,
}

/// Resolves repository metadata into a [Catalog].
pub struct MetadataResolver<'a> {
    config: &'a ArchiveConfig,
    fetcher: &'a ContentFetcher,
}

impl<'a> MetadataResolver<'a> {
    pub fn new(config: &'a ArchiveConfig, fetcher: &'a ContentFetcher) -> Self {
        Self { config, fetcher }
    }

    /// Decode raw repository index bytes.
    pub fn decode_index(data: &[u8]) -> Result<RepoMd> {
        Ok(RepoMd::from_reader(std::io::Cursor::new(data))?)
    }

    /// Fetch, persist and verify a metadata file, returning its decoded content.
    async fn fetch_metadata_file(
        &self,
        repomd: &RepoMd,
        data_type: &str,
        archive_dir: &Path,
        persisted: &mut Vec<PathBuf>,
    ) -> Result<Option<Vec<u8>>> {
        let entry = match repomd.find(data_type) {
            Some(entry) => entry,
            None => {
                debug!("repository does not advertise {} metadata", data_type);
                return Ok(None);
            }
        };

        let digest = entry.digest()?;

        let path = self
            .fetcher
            .fetch_to(
                &entry.location.href,
                archive_dir,
                entry.normalized_filename(),
            )
            .await?;
        persisted.push(path.clone());

        require_checksum(&path, &digest)?;
        persisted.push(write_sidecar(&path, &digest)?);

        let raw = std::fs::read(&path)
            .map_err(|e| ArchiveError::IoPath(format!("{}", path.display()), e))?;

        Ok(Some(
            ContentFetcher::decompress(&raw, entry.compression()).await?,
        ))
    }

    /// Resolve the repository index, its metadata files and the package catalog.
    pub async fn resolve(&self) -> Result<ResolvedMetadata> {
        let archive_dir = self.config.archive_dir();

        let index = self.fetcher.fetch(REPOMD_PATH).await?;
        let repomd = Self::decode_index(&index)?;
        // The primary catalog is mandatory.
        repomd.primary()?;

        let mut persisted = vec![ContentFetcher::persist(
            &index,
            &archive_dir,
            "repomd.xml",
        )?];

        info!("repository revision {}", repomd.revision);

        let mut files = BTreeMap::new();
        for data_type in METADATA_TYPES {
            if let Some(data) = self
                .fetch_metadata_file(&repomd, data_type, &archive_dir, &mut persisted)
                .await?
            {
                files.insert(data_type.to_string(), data);
            }
        }

        let primary_data = files
            .get("primary")
            .ok_or(rpm_repository::RpmRepositoryError::MetadataFileNotFound("primary"))?;
        let primary = Primary::from_reader(std::io::Cursor::new(primary_data))?;

        let catalog = Catalog::from_packages(primary.packages.iter(), self.config)?;

        info!(
            "{} of {} packages match {:?}",
            catalog.len(),
            primary.packages.len(),
            self.config.package_names
        );

        Ok(ResolvedMetadata {
            repomd,
            files,
            persisted,
            catalog,
        })
    }
}
