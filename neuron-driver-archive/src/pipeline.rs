// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Version ingestion.

A run refreshes the archived repository metadata, release notes and signing
key, then walks the catalog in ascending version order. Versions already
tagged in the archive are skipped. Every other version is fetched, passed
through the checksum and signature gates, extracted into the source folder
and recorded as a tagged release commit.

Any failure ends the run. Because each version is tagged as soon as it is
recorded, the next run resumes after the last recorded version.
*/

use {
    crate::{
        archive::{
            transaction::{run_transaction, TransactionDescriptor, TransactionOutcome},
            VersionedArchive,
        },
        changelog::{Changelog, ChangelogResolver},
        config::ArchiveConfig,
        error::{Result, StepContext},
        extract::stage_package_sources,
        fetch::ContentFetcher,
        integrity::{require_checksum, verify_signature, write_sidecar, IntegrityVerdict},
        metadata::{MetadataResolver, PackageRecord},
    },
    log::{debug, info, warn},
    rpm_repository::{package::RpmPackage, signature::Keyring},
    std::path::{Component, Path},
};

/// What a run did with each candidate version.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct IngestReport {
    /// Versions recorded and tagged by this run.
    pub ingested: Vec<String>,
    /// Versions already present in the ledger.
    pub skipped: Vec<String>,
    /// Versions whose content produced no change to record.
    pub unchanged: Vec<String>,
}

/// Express a path under the repository root in the form archives report changes in.
fn archive_relative(config: &ArchiveConfig, path: &Path) -> String {
    let rel = path.strip_prefix(&config.repository_path).unwrap_or(path);

    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Compose the commit message recording a release.
///
/// Changed paths are appended by the transaction.
pub fn release_message(
    record: &PackageRecord,
    verdict: &IntegrityVerdict,
    release_notes: Option<&str>,
    repository_url: &str,
) -> Result<String> {
    let mut message = format!("{}\n\n", release_subject(&record.version));

    message.push_str(&format!(
        "Source code extracted from file: {}\n",
        record.location
    ));
    message.push_str(&format!(
        "RPM Downloaded from repository: {}\n\n",
        repository_url
    ));

    if let Some(notes) = release_notes {
        message.push_str("Release Notes\n-------------\n");
        message.push_str(notes);
        message.push_str("\n-------------\n\n");
    }

    let algorithm = verdict.checksum.digest_type().name();

    message.push_str("Metadata\n--------\n");
    message.push_str(&format!("Package: {}\n", record.name));
    message.push_str(&format!("Version: {}\n", record.version));
    message.push_str(&format!(
        "License: {}\n",
        record.license.as_deref().unwrap_or_default()
    ));
    message.push_str(&format!("Summary: {}\n", record.summary));
    message.push_str(&format!("Description: {}\n", record.description));
    message.push_str(&format!("Filename: {}\n", record.location));
    message.push_str(&format!(
        "Checksum: {}:{}\n",
        algorithm,
        verdict.checksum.digest_hex()
    ));
    message.push_str(&format!(
        "Buildhost: {}\n",
        record.build_host.as_deref().unwrap_or_default()
    ));
    message.push_str(&format!("Buildtime: {}\n", record.build_time_utc()?));

    for signer in &verdict.signers {
        message.push_str(&format!("GPG key primary uid: {}\n", signer.user_id));
        message.push_str(&format!("GPG key creation time: {}\n", signer.key_created));
        message.push_str(&format!("GPG key fingerprint: {}\n", signer.fingerprint));
    }

    message.push_str("GPG check: OK\n");
    message.push_str(&format!("{} check: OK\n", algorithm.to_uppercase()));
    message.push_str("--------\n");

    Ok(message)
}

/// Remove a rejected artifact so it can't be recorded later.
fn discard(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!("unable to remove rejected {}: {:?}", path.display(), e);
    }
}

/// Fetch, verify, extract and record a single version.
async fn ingest_version(
    config: &ArchiveConfig,
    fetcher: &ContentFetcher,
    archive: &mut dyn VersionedArchive,
    changelog: &Changelog,
    record: &PackageRecord,
) -> Result<TransactionOutcome> {
    info!(
        "ingesting {}-{}-{}.{}",
        record.name,
        record.version,
        record.release.as_deref().unwrap_or_default(),
        record.arch
    );

    let path = fetcher
        .fetch_to(record.filename(), &config.rpm_dir(), record.filename())
        .await
        .step("fetch package")?;

    if let Err(e) = require_checksum(&path, &record.checksum) {
        discard(&path);
        return Err(e).step("checksum gate");
    }

    let signers = match verify_signature(&path, &config.signing_key_path()) {
        Ok(signers) => signers,
        Err(e) => {
            discard(&path);
            return Err(e).step("signature gate");
        }
    };

    let verdict = IntegrityVerdict {
        checksum: record.checksum.clone(),
        signers,
    };

    write_sidecar(&path, &verdict.checksum).step("persist checksum")?;

    let package = RpmPackage::from_path(&path).step("read package")?;
    stage_package_sources(&package, config)
        .await
        .step("extract sources")?;

    let notes = changelog.release_notes(&record.version);
    if notes.is_none() {
        warn!("no release notes for {}", record.version);
    }

    let message = release_message(
        record,
        &verdict,
        notes.as_deref(),
        &fetcher.repository_url()?,
    )?;

    let descriptor = TransactionDescriptor::release(&record.version, message).with_scope(vec![
        archive_relative(config, &config.source_dir()),
        archive_relative(config, &config.rpm_dir()),
    ]);

    run_transaction(archive, &descriptor).step("record release")
}

fn release_subject(version: &str) -> String {
    format!("feat: Neuron Driver {}", version)
}

/// Ingest every catalog version not yet present in the archive.
pub async fn ingest_versions(
    config: &ArchiveConfig,
    fetcher: &ContentFetcher,
    archive: &mut dyn VersionedArchive,
    changelog: &Changelog,
    records: &[&PackageRecord],
) -> Result<IngestReport> {
    let ledger = archive.list_tags().step("read ledger")?;
    info!("archive holds {} recorded versions", ledger.len());

    let mut report = IngestReport::default();

    for record in records {
        if ledger.contains(&record.version) {
            info!("{} already recorded; skipping", record.version);
            report.skipped.push(record.version.clone());
            continue;
        }

        match ingest_version(config, fetcher, archive, changelog, record).await? {
            TransactionOutcome::Committed { .. } => {
                report.ingested.push(record.version.clone());
            }
            TransactionOutcome::NoChanges => {
                let recorded = archive
                    .primary_message()
                    .step("read primary branch")?
                    .map_or(false, |message| {
                        message.lines().next() == Some(release_subject(&record.version).as_str())
                    });

                if recorded {
                    // An earlier run committed this version but stopped before tagging it.
                    warn!("{} committed but never tagged; tagging it now", record.version);
                    archive.tag(&record.version).step("record release")?;
                    report.ingested.push(record.version.clone());
                } else {
                    warn!("{} produced no changes; not tagging", record.version);
                    report.unchanged.push(record.version.clone());
                }
            }
        }
    }

    Ok(report)
}

/// Fetch the signing key into the archive and make sure it is usable.
async fn refresh_signing_key(config: &ArchiveConfig, fetcher: &ContentFetcher) -> Result<()> {
    let path = fetcher
        .fetch_to(
            &config.signing_key_file,
            &config.archive_dir(),
            &config.signing_key_file,
        )
        .await?;

    let keyring = Keyring::from_path(&path)?;
    info!("signing keyring holds {} keys", keyring.keys().len());

    Ok(())
}

/// Perform a complete run.
pub async fn run(
    config: &ArchiveConfig,
    fetcher: &ContentFetcher,
    archive: &mut dyn VersionedArchive,
) -> Result<IngestReport> {
    let metadata = MetadataResolver::new(config, fetcher)
        .resolve()
        .await
        .step("resolve repository metadata")?;

    for (data_type, data) in &metadata.files {
        debug!(
            "{} metadata of revision {} decodes to {} bytes",
            data_type,
            metadata.repomd.revision,
            data.len()
        );
    }

    let repodata_scope = metadata
        .persisted
        .iter()
        .map(|p| archive_relative(config, p))
        .collect::<Vec<_>>();
    run_transaction(
        archive,
        &TransactionDescriptor::repodata().with_scope(repodata_scope),
    )
    .step("record repository metadata")?;

    let changelog = ChangelogResolver::new(config, fetcher)
        .resolve()
        .await
        .step("resolve release notes")?;
    run_transaction(
        archive,
        &TransactionDescriptor::changelog()
            .with_scope(vec![archive_relative(config, &config.changelog_path())]),
    )
    .step("record release notes")?;

    refresh_signing_key(config, fetcher)
        .await
        .step("refresh signing key")?;
    run_transaction(
        archive,
        &TransactionDescriptor::gpg_key()
            .with_scope(vec![archive_relative(config, &config.signing_key_path())]),
    )
    .step("record signing key")?;

    let ordered = metadata.catalog.ordered().step("order versions")?;
    let records = ordered.iter().map(|(_, r)| *r).collect::<Vec<_>>();

    ingest_versions(config, fetcher, archive, &changelog, &records).await
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::{
            archive::{git::init_test_repository, memory::MemoryArchive},
            error::ArchiveError,
        },
        chrono::{TimeZone, Utc},
        pgp::{SignedPublicKey, SignedSecretKey},
        rpm_repository::{
            builder::{build_package, create_signing_key, package_builder},
            io::{ContentDigest, DigestFlavor},
            signature::SignerInfo,
            RpmRepositoryError,
        },
    };

    const RELEASE_NOTES: &str = "Neuron Driver\n\
        =============\n\
        \n\
        Neuron Driver release [2.10]\n\
        ----------------------------\n\
        \n\
        * Tenth.\n\
        \n\
        Neuron Driver release [2.1]\n\
        ---------------------------\n\
        \n\
        * First.\n";

    struct Mirror {
        dir: tempfile::TempDir,
        secret: SignedSecretKey,
        public: SignedPublicKey,
        /// Publish the primary catalog gzip compressed.
        gzip_primary: bool,
        /// Metadata type advertised in repomd.xml with a wrong checksum.
        corrupt_metadata: Option<&'static str>,
    }

    impl Mirror {
        fn new() -> Result<Self> {
            let (secret, public) = create_signing_key("Neuron Test <neuron@example.com>")?;

            Ok(Self {
                dir: tempfile::TempDir::new()?,
                secret,
                public,
                gzip_primary: false,
                corrupt_metadata: None,
            })
        }

        fn package(&self, version: &str, signer: &SignedSecretKey) -> Result<Vec<u8>> {
            let root = format!("/usr/src/aws-neuronx-{}", version);
            let header = format!("{}/version.h", root);
            let old = format!("{}/old.c", root);

            let mut files: Vec<(&str, &[u8])> = vec![
                (header.as_str(), version.as_bytes()),
                ("/usr/share/doc/aws-neuronx-dkms/README", &b"docs\n"[..]),
            ];

            if version == "2.1" {
                files.push((old.as_str(), &b"int old;\n"[..]));
            }

            Ok(build_package(
                package_builder("aws-neuronx-dkms", version, "dkms", "noarch"),
                &files,
                Some(signer),
            )?)
        }

        fn write_metadata(&self, data_type: &str, content: &[u8]) -> Result<String> {
            let (content, extension) = if data_type == "primary" && self.gzip_primary {
                let mut encoder = libflate::gzip::Encoder::new(Vec::new())?;
                std::io::Write::write_all(&mut encoder, content)?;
                (encoder.finish().into_result()?, "xml.gz")
            } else {
                (content.to_vec(), "xml")
            };

            let digest = ContentDigest::compute_reader(DigestFlavor::Sha256, &content[..])?;
            let href = format!("repodata/{}-{}.{}", digest.digest_hex(), data_type, extension);
            std::fs::write(self.dir.path().join(&href), &content)?;

            let declared = if self.corrupt_metadata == Some(data_type) {
                "00".repeat(32)
            } else {
                digest.digest_hex()
            };

            Ok(format!(
                "<data type=\"{}\"><checksum type=\"sha256\">{}</checksum>\
                 <location href=\"{}\"/></data>",
                data_type, declared, href
            ))
        }

        /// Publish packages as (version, content, declared sha256 override).
        fn publish(&self, packages: &[(&str, Vec<u8>, Option<String>)]) -> Result<()> {
            std::fs::create_dir_all(self.dir.path().join("repodata"))?;

            let mut primary = format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
                 <metadata xmlns=\"http://linux.duke.edu/metadata/common\" \
                 xmlns:rpm=\"http://linux.duke.edu/metadata/rpm\" packages=\"{}\">\n",
                packages.len()
            );

            for (version, data, declared) in packages {
                let filename = format!("aws-neuronx-dkms-{}.noarch.rpm", version);
                std::fs::write(self.dir.path().join(&filename), data)?;

                let digest = match declared {
                    Some(hex) => hex.clone(),
                    None => ContentDigest::compute_reader(DigestFlavor::Sha256, &data[..])?
                        .digest_hex(),
                };

                primary.push_str(&format!(
                    "<package type=\"rpm\">\
                     <name>aws-neuronx-dkms</name><arch>noarch</arch>\
                     <version epoch=\"0\" ver=\"{version}\" rel=\"dkms\"/>\
                     <checksum type=\"sha256\" pkgid=\"YES\">{digest}</checksum>\
                     <summary>aws-neuronx {version} dkms package</summary>\
                     <description>Kernel modules for aws-neuronx {version}.</description>\
                     <time file=\"1716400100\" build=\"1708472384\"/>\
                     <size package=\"{size}\" installed=\"0\" archive=\"0\"/>\
                     <location href=\"pool/{filename}\"/>\
                     <format><rpm:license>GPL-2.0</rpm:license>\
                     <rpm:buildhost>build.example.com</rpm:buildhost></format>\
                     </package>\n",
                    version = version,
                    digest = digest,
                    size = data.len(),
                    filename = filename,
                ));
            }
            primary.push_str("</metadata>\n");

            let mut repomd = String::from(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
                 <repomd xmlns=\"http://linux.duke.edu/metadata/repo\">\
                 <revision>1716400227</revision>",
            );
            repomd.push_str(&self.write_metadata("primary", primary.as_bytes())?);
            repomd.push_str(&self.write_metadata(
                "filelists",
                b"<filelists xmlns=\"http://linux.duke.edu/metadata/filelists\" packages=\"0\"/>",
            )?);
            repomd.push_str(&self.write_metadata(
                "other",
                b"<otherdata xmlns=\"http://linux.duke.edu/metadata/other\" packages=\"0\"/>",
            )?);
            repomd.push_str("</repomd>\n");
            std::fs::write(self.dir.path().join("repodata/repomd.xml"), repomd)?;

            std::fs::write(
                self.dir.path().join("GPG-PUB-KEY-AMAZON-AWS-NEURON.PUB"),
                self.public
                    .to_armored_string(None)
                    .map_err(RpmRepositoryError::from)?,
            )?;
            std::fs::write(self.dir.path().join("notes.rst"), RELEASE_NOTES)?;

            Ok(())
        }

        fn config(&self, repository_path: &Path) -> ArchiveConfig {
            ArchiveConfig {
                repository_url: format!("{}", self.dir.path().display()),
                changelog_url: format!("file://{}/notes.rst", self.dir.path().display()),
                repository_path: repository_path.to_path_buf(),
                ..Default::default()
            }
        }
    }

    fn release_commits(archive: &MemoryArchive) -> Vec<String> {
        archive
            .commits()
            .iter()
            .filter_map(|(message, _)| {
                message
                    .lines()
                    .next()
                    .and_then(|l| l.strip_prefix("feat: Neuron Driver "))
                    .map(|v| v.to_string())
            })
            .collect()
    }

    fn publish_versions(mirror: &Mirror, versions: &[&str]) -> Result<()> {
        let packages = versions
            .iter()
            .map(|v| Ok((*v, mirror.package(v, &mirror.secret)?, None)))
            .collect::<Result<Vec<_>>>()?;

        mirror.publish(&packages)
    }

    #[test]
    fn message_layout() -> Result<()> {
        let record = PackageRecord {
            name: "aws-neuronx-dkms".into(),
            version: "2.16.7.0".into(),
            release: Some("dkms".into()),
            arch: "noarch".into(),
            checksum: ContentDigest::sha256_hex(&"ab".repeat(32))?,
            location: "aws-neuronx-dkms-2.16.7.0.noarch.rpm".into(),
            build_time: 1708472384,
            license: Some("GPL-2.0".into()),
            summary: "summary".into(),
            description: "description".into(),
            build_host: None,
        };
        let verdict = IntegrityVerdict {
            checksum: record.checksum.clone(),
            signers: vec![SignerInfo {
                tag: 1002,
                user_id: "Neuron <neuron@example.com>".into(),
                fingerprint: "00AA".into(),
                key_id: "00AA".into(),
                key_created: Utc.timestamp_opt(1600000000, 0).unwrap(),
                signature_created: None,
            }],
        };

        let message = release_message(&record, &verdict, Some("* Fixes."), "https://repo")?;

        assert!(message.starts_with(
            "feat: Neuron Driver 2.16.7.0\n\n\
             Source code extracted from file: aws-neuronx-dkms-2.16.7.0.noarch.rpm\n\
             RPM Downloaded from repository: https://repo\n\n\
             Release Notes\n-------------\n* Fixes.\n-------------\n\n\
             Metadata\n--------\n"
        ));
        assert!(message.contains(&format!("Checksum: sha256:{}\n", "ab".repeat(32))));
        assert!(message.contains("Buildhost: \n"));
        assert!(message.contains("Buildtime: 2024-02-20 23:39:44 UTC\n"));
        assert!(message.contains("GPG key creation time: 2020-09-13 12:26:40 UTC\n"));
        assert!(message.ends_with("GPG check: OK\nSHA256 check: OK\n--------\n"));

        let message = release_message(&record, &verdict, None, "https://repo")?;
        assert!(!message.contains("Release Notes"));

        Ok(())
    }

    #[tokio::test]
    async fn ingest_in_version_order_and_resume() -> Result<()> {
        let mirror = Mirror::new()?;
        publish_versions(&mirror, &["2.10", "2.1", "2.2"])?;

        let mut archive = MemoryArchive::new()?;
        let config = mirror.config(archive.root());
        let fetcher = ContentFetcher::new(&config.repository_url)?;

        let report = run(&config, &fetcher, &mut archive).await?;
        assert_eq!(report.ingested, vec!["2.1", "2.2", "2.10"]);
        assert!(report.skipped.is_empty());
        assert_eq!(release_commits(&archive), vec!["2.1", "2.2", "2.10"]);
        assert_eq!(
            archive.list_tags()?.into_iter().collect::<Vec<_>>(),
            vec!["2.1", "2.10", "2.2"]
        );

        // Repository metadata, release notes and key each got a commit.
        assert_eq!(archive.commits().len(), 6);
        assert!(archive.changed_paths()?.is_empty());

        let first = &archive.commits()[3].0;
        assert!(first.contains("Release Notes\n-------------\n* First.\n-------------"));
        assert!(first.contains("GPG key primary uid: Neuron Test <neuron@example.com>"));
        assert!(first.contains("- archive/rpm/aws-neuronx-dkms-2.1.noarch.rpm\n"));
        assert!(first.contains("- archive/rpm/aws-neuronx-dkms-2.1.noarch.rpm.sha256\n"));
        assert!(first.contains("- src/old.c\n"));
        assert!(!archive.commits()[4].0.contains("Release Notes"));

        // Later versions fully replace earlier sources.
        assert!(!config.source_dir().join("old.c").exists());
        assert_eq!(
            std::fs::read_to_string(config.source_dir().join("version.h"))?,
            "2.10"
        );
        assert!(!config.source_dir().join("README").exists());

        let report = run(&config, &fetcher, &mut archive).await?;
        assert!(report.ingested.is_empty());
        assert_eq!(report.skipped, vec!["2.1", "2.2", "2.10"]);
        assert_eq!(archive.commits().len(), 6);

        Ok(())
    }

    #[tokio::test]
    async fn untagged_release_commit_is_tagged() -> Result<()> {
        let mirror = Mirror::new()?;
        publish_versions(&mirror, &["2.1", "2.2"])?;

        let mut archive = MemoryArchive::new()?;
        let config = mirror.config(archive.root());
        let fetcher = ContentFetcher::new(&config.repository_url)?;

        run(&config, &fetcher, &mut archive).await?;
        let commits = archive.commits().len();

        // A run that died between merging and tagging 2.2.
        archive.remove_tag("2.2");

        let report = run(&config, &fetcher, &mut archive).await?;
        assert_eq!(report.ingested, vec!["2.2"]);
        assert_eq!(report.skipped, vec!["2.1"]);
        assert!(report.unchanged.is_empty());
        assert!(archive.list_tags()?.contains("2.2"));
        assert_eq!(archive.commits().len(), commits);

        Ok(())
    }

    #[tokio::test]
    async fn checksum_mismatch_stops_run() -> Result<()> {
        let mirror = Mirror::new()?;
        mirror.publish(&[
            ("2.1", mirror.package("2.1", &mirror.secret)?, Some("00".repeat(32))),
            ("2.2", mirror.package("2.2", &mirror.secret)?, None),
        ])?;

        let mut archive = MemoryArchive::new()?;
        let config = mirror.config(archive.root());
        let fetcher = ContentFetcher::new(&config.repository_url)?;

        let err = run(&config, &fetcher, &mut archive).await.unwrap_err();
        assert!(err.is_integrity_failure());
        assert!(matches!(
            err,
            ArchiveError::Step("checksum gate", ref inner)
                if matches!(**inner, ArchiveError::ChecksumMismatch { .. })
        ));

        assert!(release_commits(&archive).is_empty());
        assert!(archive.list_tags()?.is_empty());
        assert!(!config.source_dir().exists());
        assert!(!config.rpm_dir().join("aws-neuronx-dkms-2.1.noarch.rpm").exists());
        assert!(!config.rpm_dir().join("aws-neuronx-dkms-2.2.noarch.rpm").exists());

        Ok(())
    }

    #[tokio::test]
    async fn metadata_checksum_mismatch_stops_run() -> Result<()> {
        for data_type in ["primary", "filelists", "other"] {
            let mut mirror = Mirror::new()?;
            mirror.corrupt_metadata = Some(data_type);
            publish_versions(&mirror, &["2.1"])?;

            let mut archive = MemoryArchive::new()?;
            let config = mirror.config(archive.root());
            let fetcher = ContentFetcher::new(&config.repository_url)?;

            let err = run(&config, &fetcher, &mut archive).await.unwrap_err();
            assert!(err.is_integrity_failure(), "{}: {}", data_type, err);
            assert!(format!("{}", err).starts_with("resolve repository metadata: "));

            assert!(archive.commits().is_empty());
            assert!(archive.list_tags()?.is_empty());
            assert!(!config.source_dir().exists());
            assert!(!config.rpm_dir().exists());
        }

        Ok(())
    }

    #[tokio::test]
    async fn gzip_primary_catalog() -> Result<()> {
        let mut mirror = Mirror::new()?;
        mirror.gzip_primary = true;
        publish_versions(&mirror, &["2.1", "2.2"])?;

        let mut archive = MemoryArchive::new()?;
        let config = mirror.config(archive.root());
        let fetcher = ContentFetcher::new(&config.repository_url)?;

        let metadata = MetadataResolver::new(&config, &fetcher).resolve().await?;
        let compressed = config.archive_dir().join("primary.xml.gz");
        assert!(metadata.persisted.contains(&compressed));
        assert!(metadata
            .persisted
            .contains(&config.archive_dir().join("primary.xml.gz.sha256")));
        assert_eq!(&std::fs::read(&compressed)?[..2], &[0x1f, 0x8b]);
        assert!(metadata.files["primary"].starts_with(b"<?xml"));
        assert_eq!(metadata.catalog.ordered()?.len(), 2);

        let report = run(&config, &fetcher, &mut archive).await?;
        assert_eq!(report.ingested, vec!["2.1", "2.2"]);

        Ok(())
    }

    #[tokio::test]
    async fn unresolved_signer_stops_run() -> Result<()> {
        let mirror = Mirror::new()?;
        let (stranger, _) = create_signing_key("Stranger <stranger@example.com>")?;
        mirror.publish(&[("2.1", mirror.package("2.1", &stranger)?, None)])?;

        let mut archive = MemoryArchive::new()?;
        let config = mirror.config(archive.root());
        let fetcher = ContentFetcher::new(&config.repository_url)?;

        let err = run(&config, &fetcher, &mut archive).await.unwrap_err();
        assert!(err.is_integrity_failure());
        assert!(format!("{}", err).starts_with("signature gate: "));

        assert!(archive.list_tags()?.is_empty());
        assert!(!config.source_dir().exists());

        Ok(())
    }

    #[tokio::test]
    async fn git_archive_end_to_end() -> Result<()> {
        let mirror = Mirror::new()?;
        publish_versions(&mirror, &["2.1", "2.2"])?;

        let td = tempfile::TempDir::new()?;
        let mut archive = init_test_repository(td.path())?;
        let config = mirror.config(td.path());
        let fetcher = ContentFetcher::new(&config.repository_url)?;

        let report = run(&config, &fetcher, &mut archive).await?;
        assert_eq!(report.ingested, vec!["2.1", "2.2"]);
        assert!(archive.list_tags()?.contains("2.2"));
        assert!(archive.changed_paths()?.is_empty());

        // A new upstream release resumes after the recorded ones.
        publish_versions(&mirror, &["2.1", "2.2", "2.10"])?;
        let report = run(&config, &fetcher, &mut archive).await?;
        assert_eq!(report.ingested, vec!["2.10"]);
        assert_eq!(report.skipped, vec!["2.1", "2.2"]);
        assert_eq!(archive.list_tags()?.len(), 3);
        assert!(archive.changed_paths()?.is_empty());

        Ok(())
    }
}
