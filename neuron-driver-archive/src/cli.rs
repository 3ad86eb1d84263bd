// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    crate::{
        archive::git::GitArchive,
        config::ArchiveConfig,
        error::Result,
        fetch::ContentFetcher,
        pipeline,
    },
    clap::{Arg, ArgMatches, Command},
    log::{info, LevelFilter},
    std::path::PathBuf,
};

const ABOUT: &str = "\
Archive AWS Neuron driver releases in a Git repository.

Repository metadata, release notes and the repository signing key are fetched
and recorded first. Then every driver version not yet tagged in the Git
repository is downloaded, verified against its declared checksum and the
repository signing key, and its source code is committed and tagged with the
version.

Repository and changelog locations may be URLs or local filesystem paths.
";

fn init_logging(matches: &ArgMatches) {
    let log_level = match matches.occurrences_of("verbose") {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.as_str()),
    );

    // Disable log context except at higher log levels.
    if log_level <= LevelFilter::Info {
        builder
            .format_timestamp(None)
            .format_level(false)
            .format_target(false);
    }

    if log_level == LevelFilter::Info {
        builder.filter_module("rustls", LevelFilter::Error);
        builder.filter_module("reqwest", LevelFilter::Warn);
    }

    builder.init();
}

/// Resolve the run configuration from defaults, a YAML file and arguments.
fn resolve_config(matches: &ArgMatches) -> Result<ArchiveConfig> {
    let mut config = if let Some(path) = matches.value_of_os("config") {
        ArchiveConfig::from_yaml_path(&PathBuf::from(path))?
    } else {
        ArchiveConfig::default()
    };

    if let Some(v) = matches.value_of_os("repo-path") {
        config.repository_path = PathBuf::from(v);
    }
    if let Some(v) = matches.value_of_os("archive-folder") {
        config.archive_folder = PathBuf::from(v);
    }
    if let Some(v) = matches.value_of_os("rpm-folder") {
        config.rpm_folder = PathBuf::from(v);
    }
    if let Some(v) = matches.value_of_os("source-folder") {
        config.source_folder = PathBuf::from(v);
    }
    if let Some(v) = matches.value_of("repository-url") {
        config.repository_url = v.to_string();
    }
    if let Some(v) = matches.value_of("changelog-url") {
        config.changelog_url = v.to_string();
    }
    if let Some(v) = matches.value_of("primary-branch") {
        config.primary_branch = v.to_string();
    }

    config.validate()?;

    Ok(config)
}

fn command() -> Command<'static> {
    Command::new("Neuron Driver Archive")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Archive AWS Neuron driver releases in a Git repository")
        .long_about(ABOUT)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .multiple_occurrences(true)
                .help("Increase logging verbosity. Can be specified multiple times."),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .takes_value(true)
                .allow_invalid_utf8(true)
                .help("Path to a YAML file defining the configuration"),
        )
        .arg(
            Arg::new("repo-path")
                .long("repo-path")
                .takes_value(true)
                .allow_invalid_utf8(true)
                .help("Path of the Git repository holding the archive"),
        )
        .arg(
            Arg::new("archive-folder")
                .long("archive-folder")
                .takes_value(true)
                .allow_invalid_utf8(true)
                .help("Folder within the repository holding fetched artifacts"),
        )
        .arg(
            Arg::new("rpm-folder")
                .long("rpm-folder")
                .takes_value(true)
                .allow_invalid_utf8(true)
                .help("Folder within the archive folder holding fetched packages"),
        )
        .arg(
            Arg::new("source-folder")
                .long("source-folder")
                .takes_value(true)
                .allow_invalid_utf8(true)
                .help("Folder within the repository holding the extracted sources"),
        )
        .arg(
            Arg::new("repository-url")
                .long("repository-url")
                .takes_value(true)
                .help("URL or path of the YUM repository to archive"),
        )
        .arg(
            Arg::new("changelog-url")
                .long("changelog-url")
                .takes_value(true)
                .help("URL or path of the driver release notes"),
        )
        .arg(
            Arg::new("primary-branch")
                .long("primary-branch")
                .takes_value(true)
                .help("Branch releases are merged into"),
        )
}

pub async fn run_cli() -> Result<()> {
    let matches = command().get_matches();

    init_logging(&matches);

    let config = resolve_config(&matches)?;

    let fetcher = ContentFetcher::new(&config.repository_url)?;
    let mut archive = GitArchive::open(&config)?;

    info!(
        "archiving {} into {}",
        fetcher.repository_url()?,
        config.repository_path.display()
    );

    let report = pipeline::run(&config, &fetcher, &mut archive).await?;

    info!(
        "{} versions ingested, {} already archived, {} without changes",
        report.ingested.len(),
        report.skipped.len(),
        report.unchanged.len()
    );
    for version in &report.ingested {
        info!("ingested {}", version);
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arguments_override_defaults() -> Result<()> {
        let matches = command().try_get_matches_from(vec![
            "nda",
            "--repo-path",
            "/srv/archive",
            "--source-folder",
            "driver",
            "--repository-url",
            "file:///srv/mirror",
            "-vv",
        ])?;

        assert_eq!(matches.occurrences_of("verbose"), 2);

        let config = resolve_config(&matches)?;
        assert_eq!(config.source_dir(), PathBuf::from("/srv/archive/driver"));
        assert_eq!(config.rpm_dir(), PathBuf::from("/srv/archive/archive/rpm"));
        assert_eq!(config.repository_url, "file:///srv/mirror");
        assert_eq!(config.primary_branch, "main");

        let matches =
            command().try_get_matches_from(vec!["nda", "--archive-folder", "/absolute"])?;
        assert!(resolve_config(&matches).is_err());

        Ok(())
    }
}
