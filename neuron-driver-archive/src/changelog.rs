// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Driver release notes.

The upstream release notes are a text document with a section per release.
Each section starts with a line like `Neuron Driver release [2.16.7.0]`
followed by a delimiter line (e.g. `-----`). Every line from a header up to
the next header belongs to that header's version.
*/

use {
    crate::{
        config::ArchiveConfig,
        error::{ArchiveError, Result},
        fetch::ContentFetcher,
    },
    log::{info, warn},
    once_cell::sync::Lazy,
    regex::Regex,
    std::collections::BTreeMap,
};

/// Prefix of lines starting a release section.
pub const RELEASE_HEADER_PREFIX: &str = "Neuron Driver release";

static RE_RELEASE_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(?P<version>.*)\]").unwrap());

/// Release notes lines keyed by version.
#[derive(Clone, Debug, Default)]
pub struct Changelog {
    entries: BTreeMap<String, Vec<String>>,
}

impl Changelog {
    /// Parse a release notes document.
    ///
    /// Lines before the first release header are ignored. A header whose
    /// version cannot be extracted is an error.
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut current: Option<String> = None;

        for line in text.lines() {
            if line.starts_with(RELEASE_HEADER_PREFIX) {
                let version = RE_RELEASE_VERSION
                    .captures(line)
                    .and_then(|caps| caps.name("version"))
                    .map(|m| m.as_str().trim())
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| ArchiveError::ChangelogHeader(line.to_string()))?;

                current = Some(version.to_string());
            }

            if let Some(version) = &current {
                entries
                    .entry(version.clone())
                    .or_default()
                    .push(line.to_string());
            }
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw lines of a version's section, including its header.
    pub fn lines(&self, version: &str) -> Option<&[String]> {
        self.entries.get(version).map(|v| v.as_slice())
    }

    /// The release notes body for a version.
    ///
    /// The header and delimiter lines are dropped, as are leading and
    /// trailing blank lines.
    pub fn release_notes(&self, version: &str) -> Option<String> {
        let lines = self.lines(version)?;
        let body = lines.get(2..).unwrap_or_default();

        let start = body.iter().position(|l| !l.trim().is_empty());
        let end = body.iter().rposition(|l| !l.trim().is_empty());

        match (start, end) {
            (Some(start), Some(end)) => Some(body[start..=end].join("\n")),
            _ => None,
        }
    }
}

/// Fetches, persists and parses the release notes.
pub struct ChangelogResolver<'a> {
    config: &'a ArchiveConfig,
    fetcher: &'a ContentFetcher,
}

impl<'a> ChangelogResolver<'a> {
    pub fn new(config: &'a ArchiveConfig, fetcher: &'a ContentFetcher) -> Self {
        Self { config, fetcher }
    }

    /// Fetch the release notes, write them to the archive folder and parse them.
    pub async fn resolve(&self) -> Result<Changelog> {
        let data = self.fetcher.fetch_document(&self.config.changelog_url).await?;

        ContentFetcher::persist(
            &data,
            &self.config.archive_dir(),
            &self.config.changelog_file,
        )?;

        let changelog = Changelog::parse(&String::from_utf8_lossy(&data))?;

        if changelog.is_empty() {
            warn!("release notes contain no release sections");
        } else {
            info!("release notes cover {} releases", changelog.len());
        }

        Ok(changelog)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const RELEASE_NOTES: &str = include_str!("testdata/release-notes.rst");

    #[test]
    fn release_notes_slice() -> Result<()> {
        let changelog = Changelog::parse("Neuron Driver release [2.1]\n===\nnote A\nnote B\n")?;

        assert_eq!(changelog.release_notes("2.1").as_deref(), Some("note A\nnote B"));
        assert_eq!(changelog.release_notes("2.2"), None);

        Ok(())
    }

    #[test]
    fn parse_document() -> Result<()> {
        let changelog = Changelog::parse(RELEASE_NOTES)?;

        assert_eq!(changelog.len(), 2);
        assert_eq!(
            changelog.lines("2.17.17.0").map(|l| l[0].as_str()),
            Some("Neuron Driver release [2.17.17.0]")
        );
        assert_eq!(
            changelog.release_notes("2.17.17.0").as_deref(),
            Some("Date: 05/01/2024\n\n* Improved DMA error reporting.")
        );
        assert_eq!(
            changelog.release_notes("2.16.7.0").as_deref(),
            Some("Date: 04/01/2024\n\n* Added support for Linux kernel 6.5.")
        );

        Ok(())
    }

    #[test]
    fn empty_and_invalid() -> Result<()> {
        assert!(Changelog::parse("Release notes\n\nnothing here\n")?.is_empty());
        assert!(matches!(
            Changelog::parse("Neuron Driver release 2.1\n"),
            Err(ArchiveError::ChangelogHeader(_))
        ));
        assert!(matches!(
            Changelog::parse("Neuron Driver release []\n"),
            Err(ArchiveError::ChangelogHeader(_))
        ));

        Ok(())
    }
}
