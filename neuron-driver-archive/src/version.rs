// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Version ordering.

Upstream versions look like `2.16.7.0`. A [VersionKey] parses the numeric
release segments plus an optional `-prerelease` and ignored `+metadata`
suffix, in the manner of semantic versions with an arbitrary number of
segments. Keys are used for ordering only; the original string is the
identity of a version.
*/

use {
    crate::error::{ArchiveError, Result},
    std::{
        cmp::Ordering,
        fmt::{Display, Formatter},
    },
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VersionKey {
    original: String,
    segments: Vec<u64>,
    prerelease: Option<String>,
}

impl VersionKey {
    /// Parse a version string.
    ///
    /// Any string without at least one numeric segment is rejected.
    pub fn parse(s: &str) -> Result<Self> {
        let err = || ArchiveError::VersionParse(s.to_string());

        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);

        let without_metadata = match trimmed.split_once('+') {
            Some((head, _)) => head,
            None => trimmed,
        };

        let (release, prerelease) = match without_metadata.split_once('-') {
            Some((release, pre)) if !pre.is_empty() => (release, Some(pre.to_string())),
            Some(_) => return Err(err()),
            None => (without_metadata, None),
        };

        if release.is_empty() {
            return Err(err());
        }

        let segments = release
            .split('.')
            .map(|segment| {
                if segment.is_empty() || !segment.chars().all(|c| c.is_ascii_digit()) {
                    Err(err())
                } else {
                    segment.parse::<u64>().map_err(|_| err())
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            original: s.to_string(),
            segments,
            prerelease,
        })
    }

    /// The string this key was parsed from.
    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    pub fn prerelease(&self) -> Option<&str> {
        self.prerelease.as_deref()
    }
}

impl Display for VersionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.original)
    }
}

/// Compare dot separated prerelease identifiers.
///
/// Numeric identifiers compare numerically and sort before alphanumeric ones.
fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let mut a_parts = a.split('.');
    let mut b_parts = b.split('.');

    loop {
        match (a_parts.next(), b_parts.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(a), Some(b)) => {
                let res = match (a.parse::<u64>(), b.parse::<u64>()) {
                    (Ok(a), Ok(b)) => a.cmp(&b),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => a.cmp(b),
                };

                if res != Ordering::Equal {
                    return res;
                }
            }
        }
    }
}

impl PartialOrd<Self> for VersionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Missing trailing segments are zero: 2.1 == 2.1.0.
        let len = self.segments.len().max(other.segments.len());

        for i in 0..len {
            let a = self.segments.get(i).copied().unwrap_or(0);
            let b = other.segments.get(i).copied().unwrap_or(0);

            match a.cmp(&b) {
                Ordering::Equal => {}
                res => return res,
            }
        }

        // A prerelease precedes its release.
        let res = match (&self.prerelease, &other.prerelease) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => compare_prerelease(a, b),
        };

        // Fall back to the original text so distinct strings never compare equal.
        res.then_with(|| self.original.cmp(&other.original))
    }
}
