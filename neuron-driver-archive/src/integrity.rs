// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Admission control for untrusted content.

Fetched artifacts must pass a content checksum and, for packages, an OpenPGP
signature check before anything else is done with them. The two checks are
independent and both must pass. Callers run the checksum gate first.
*/

use {
    crate::error::{ArchiveError, Result},
    log::{debug, info},
    rpm_repository::{
        io::ContentDigest,
        package::RpmPackage,
        signature::{verify_package, Keyring, SignerInfo},
    },
    std::path::{Path, PathBuf},
};

/// Outcome of a checksum comparison.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChecksumVerdict {
    Match,
    Mismatch { actual: String },
}

/// Compare the digest of a file against an expected digest.
///
/// The file is read incrementally.
pub fn verify_checksum(path: &Path, expected: &ContentDigest) -> Result<ChecksumVerdict> {
    let actual = ContentDigest::compute_path(expected.digest_type(), path)?;

    if &actual == expected {
        Ok(ChecksumVerdict::Match)
    } else {
        Ok(ChecksumVerdict::Mismatch {
            actual: actual.digest_hex(),
        })
    }
}

/// Like [verify_checksum()] but turns a mismatch into an error.
pub fn require_checksum(path: &Path, expected: &ContentDigest) -> Result<()> {
    match verify_checksum(path, expected)? {
        ChecksumVerdict::Match => {
            debug!(
                "{} {} matches {}",
                expected.digest_type().name(),
                path.display(),
                expected.digest_hex()
            );
            Ok(())
        }
        ChecksumVerdict::Mismatch { actual } => Err(ArchiveError::ChecksumMismatch {
            path: format!("{}", path.display()),
            expected: expected.digest_hex(),
            actual,
        }),
    }
}

/// Verify the OpenPGP signatures of a package file against a keyring file.
///
/// Every signature must resolve to a key in the keyring. A package yielding no
/// identifiable signer is rejected.
pub fn verify_signature(path: &Path, keyring_path: &Path) -> Result<Vec<SignerInfo>> {
    let keyring = Keyring::from_path(keyring_path)?;
    let package = RpmPackage::from_path(path)?;

    let signers = verify_package(&package, &keyring)?;

    if signers.is_empty() || signers.iter().any(|s| s.fingerprint.is_empty()) {
        return Err(ArchiveError::SignerMissing(format!("{}", path.display())));
    }

    for signer in &signers {
        info!(
            "{} signed by {} ({})",
            path.display(),
            signer.user_id,
            signer.fingerprint
        );
    }

    Ok(signers)
}

/// The result of admitting an artifact.
#[derive(Clone, Debug)]
pub struct IntegrityVerdict {
    /// The verified content digest.
    pub checksum: ContentDigest,
    /// Keys that verifiably signed the artifact.
    pub signers: Vec<SignerInfo>,
}

/// Path of the checksum sidecar for a file: `<file>.<algorithm>`.
pub fn sidecar_path(path: &Path, digest: &ContentDigest) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".");
    s.push(digest.digest_type().name());

    PathBuf::from(s)
}

/// Record a verified digest next to the file it describes.
pub fn write_sidecar(path: &Path, digest: &ContentDigest) -> Result<PathBuf> {
    let sidecar = sidecar_path(path, digest);

    std::fs::write(&sidecar, digest.digest_hex())
        .map_err(|e| ArchiveError::IoPath(format!("{}", sidecar.display()), e))?;

    Ok(sidecar)
}
