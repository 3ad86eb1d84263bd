// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! RPM package files.

Parsing is performed by the [rpm] crate. [RpmPackage] retains the raw file
bytes alongside the parsed package so the exact content covered by each
OpenPGP signature can be handed to a verifier.

The payload is a compressed cpio archive. It is decompressed with this crate's
[crate::io] facilities and unpacked with [extract_cpio].
*/

use {
    crate::{
        error::{Result, RpmRepositoryError},
        io::{decompress_bytes, Compression},
    },
    log::trace,
    rpm::IndexSignatureTag,
    std::{
        io::Read,
        path::{Component, Path, PathBuf},
    },
};

/// What content a signature tag covers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SignatureScope {
    /// The main header only.
    Header,
    /// The main header followed by the payload.
    HeaderAndPayload,
}

/// Signature header tags holding OpenPGP signatures.
const SIGNATURE_TAGS: [(IndexSignatureTag, SignatureScope); 4] = [
    (IndexSignatureTag::RPMSIGTAG_DSA, SignatureScope::Header),
    (IndexSignatureTag::RPMSIGTAG_RSA, SignatureScope::Header),
    (IndexSignatureTag::RPMSIGTAG_PGP, SignatureScope::HeaderAndPayload),
    (IndexSignatureTag::RPMSIGTAG_GPG, SignatureScope::HeaderAndPayload),
];

/// An OpenPGP signature found in a package's signature header.
#[derive(Clone, Copy, Debug)]
pub struct PackageSignature<'a> {
    /// Number of the signature header tag holding the signature.
    pub tag: u32,
    /// What content the signature covers.
    pub scope: SignatureScope,
    /// The raw OpenPGP signature packet.
    pub data: &'a [u8],
}

/// A parsed RPM package file.
#[derive(Debug)]
pub struct RpmPackage {
    package: rpm::Package,
    raw: Vec<u8>,
}

impl RpmPackage {
    /// Parse a package from a reader.
    ///
    /// The entire file is buffered in memory.
    pub fn from_reader(mut reader: impl Read) -> Result<Self> {
        let mut raw = vec![];
        reader.read_to_end(&mut raw)?;

        let package = rpm::Package::parse(&mut std::io::Cursor::new(&raw))?;

        Ok(Self { package, raw })
    }

    /// Parse a package from a file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let fh = std::fs::File::open(path)
            .map_err(|e| RpmRepositoryError::IoPath(format!("{}", path.display()), e))?;

        Self::from_reader(std::io::BufReader::new(fh))
    }

    /// The parsed lead and headers.
    pub fn metadata(&self) -> &rpm::PackageMetadata {
        &self.package.metadata
    }

    /// The raw (compressed) payload.
    pub fn payload(&self) -> &[u8] {
        &self.package.content
    }

    pub fn name(&self) -> Result<&str> {
        Ok(self.package.metadata.get_name()?)
    }

    pub fn version(&self) -> Result<&str> {
        Ok(self.package.metadata.get_version()?)
    }

    pub fn release(&self) -> Result<&str> {
        Ok(self.package.metadata.get_release()?)
    }

    pub fn arch(&self) -> Result<&str> {
        Ok(self.package.metadata.get_arch()?)
    }

    /// OpenPGP signatures present in the signature header.
    pub fn signatures(&self) -> Vec<PackageSignature<'_>> {
        SIGNATURE_TAGS
            .into_iter()
            .filter_map(|(tag, scope)| {
                self.package
                    .metadata
                    .signature
                    .get_entry_data_as_binary(tag)
                    .ok()
                    .map(|data| PackageSignature {
                        tag: tag as u32,
                        scope,
                        data,
                    })
            })
            .collect()
    }

    /// Obtain the bytes a signature of the given scope covers.
    ///
    /// The signature header records the combined size of the main header and
    /// payload, which are the trailing bytes of the file.
    pub fn signed_content(&self, scope: SignatureScope) -> Result<&[u8]> {
        let size = self
            .package
            .metadata
            .signature
            .get_entry_data_as_u32(IndexSignatureTag::RPMSIGTAG_SIZE)? as usize;
        let payload_size = self.package.content.len();

        if size > self.raw.len() || size < payload_size {
            return Err(RpmRepositoryError::RpmMalformedHeader(format!(
                "recorded header and payload size {} inconsistent with file size {}",
                size,
                self.raw.len()
            )));
        }

        let header_and_payload = &self.raw[self.raw.len() - size..];

        Ok(match scope {
            SignatureScope::Header => &header_and_payload[..size - payload_size],
            SignatureScope::HeaderAndPayload => header_and_payload,
        })
    }

    /// Compression applied to the payload.
    pub fn payload_compression(&self) -> Result<Compression> {
        Compression::from_rpm_compression(self.package.metadata.get_payload_compressor()?)
    }

    /// Obtain the decompressed cpio archive constituting the payload.
    pub async fn decompressed_payload(&self) -> Result<Vec<u8>> {
        let format = self.package.metadata.get_payload_format()?;
        if format != "cpio" {
            return Err(RpmRepositoryError::RpmPayloadFormat(format.to_string()));
        }

        decompress_bytes(&self.package.content, self.payload_compression()?).await
    }

    /// Extract the payload into a directory.
    ///
    /// Returns the relative paths of extracted regular files.
    pub async fn extract_payload(&self, dest_dir: &Path) -> Result<Vec<PathBuf>> {
        let archive = self.decompressed_payload().await?;

        extract_cpio(&archive, dest_dir)
    }
}

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;
const S_IFREG: u32 = 0o100000;
const S_IFLNK: u32 = 0o120000;

/// Resolve a cpio entry name to a relative path that cannot escape the destination.
fn sanitized_entry_path(name: &str) -> Result<PathBuf> {
    let mut path = PathBuf::new();

    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            _ => return Err(RpmRepositoryError::RpmPayloadIllegalPath(name.to_string())),
        }
    }

    Ok(path)
}

/// Extract a newc cpio archive into a directory.
pub fn extract_cpio(archive: &[u8], dest_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = vec![];
    let mut reader = cpio::NewcReader::new(std::io::Cursor::new(archive))?;

    loop {
        if reader.entry().name() == "TRAILER!!!" {
            break;
        }

        let name = reader.entry().name().to_string();
        let mode = reader.entry().mode();
        let relative = sanitized_entry_path(&name)?;

        let mut data = Vec::with_capacity(reader.entry().file_size() as usize);
        reader.read_to_end(&mut data)?;

        if !relative.as_os_str().is_empty() {
            let dest = dest_dir.join(&relative);

            match mode & S_IFMT {
                S_IFDIR => {
                    std::fs::create_dir_all(&dest)?;
                }
                S_IFLNK => {
                    if let Some(parent) = dest.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    let target = String::from_utf8_lossy(&data).to_string();
                    create_symlink(&target, &dest)?;
                }
                S_IFREG => {
                    if let Some(parent) = dest.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&dest, &data)?;
                    set_permissions(&dest, mode)?;
                    files.push(relative);
                }
                other => {
                    trace!("ignoring cpio entry {} with file type {:o}", name, other);
                }
            }
        }

        reader = cpio::NewcReader::new(reader.finish()?)?;
    }

    Ok(files)
}

#[cfg(unix)]
fn create_symlink(target: &str, dest: &Path) -> Result<()> {
    Ok(std::os::unix::fs::symlink(target, dest)?)
}

#[cfg(not(unix))]
fn create_symlink(target: &str, dest: &Path) -> Result<()> {
    trace!("not creating symlink {} -> {}", dest.display(), target);
    Ok(())
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    Ok(std::fs::set_permissions(
        path,
        std::fs::Permissions::from_mode(mode & 0o7777),
    )?)
}

#[cfg(not(unix))]
fn set_permissions(_: &Path, _: u32) -> Result<()> {
    Ok(())
}
