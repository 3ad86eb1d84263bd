// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    crate::error::{Result, RpmRepositoryError},
    async_compression::futures::bufread::{GzipDecoder, XzDecoder, ZstdDecoder},
    futures::{AsyncBufRead, AsyncRead, AsyncReadExt},
    std::{fmt::Formatter, io::Read, path::Path, pin::Pin},
};

/// Compression format.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Compression {
    /// No compression.
    None,
    /// Gzip compression.
    Gzip,
    /// Xz compression.
    Xz,
    /// Zstd compression.
    Zstd,
}

impl Compression {
    /// Resolve the compression format implied by a filename extension.
    pub fn from_path(path: &str) -> Self {
        match path {
            _ if path.ends_with(".gz") => Self::Gzip,
            _ if path.ends_with(".xz") => Self::Xz,
            _ if path.ends_with(".zst") => Self::Zstd,
            _ => Self::None,
        }
    }

    /// Resolve the compression format of an RPM payload.
    pub fn from_rpm_compression(value: rpm::CompressionType) -> Result<Self> {
        match value {
            rpm::CompressionType::None => Ok(Self::None),
            rpm::CompressionType::Gzip => Ok(Self::Gzip),
            rpm::CompressionType::Xz => Ok(Self::Xz),
            rpm::CompressionType::Zstd => Ok(Self::Zstd),
            #[allow(unreachable_patterns)]
            other => Err(RpmRepositoryError::RpmPayloadCompressor(format!(
                "{:?}",
                other
            ))),
        }
    }
}

pub fn read_decompressed<'a>(
    stream: impl AsyncBufRead + Send + 'a,
    compression: Compression,
) -> Pin<Box<dyn AsyncRead + Send + 'a>> {
    match compression {
        Compression::None => Box::pin(stream),
        Compression::Gzip => Box::pin(GzipDecoder::new(stream)),
        Compression::Xz => Box::pin(XzDecoder::new(stream)),
        Compression::Zstd => Box::pin(ZstdDecoder::new(stream)),
    }
}

/// Decompress an in-memory buffer.
pub async fn decompress_bytes(data: &[u8], compression: Compression) -> Result<Vec<u8>> {
    if compression == Compression::None {
        return Ok(data.to_vec());
    }

    let mut reader = read_decompressed(futures::io::Cursor::new(data), compression);
    let mut decoded = vec![];
    reader.read_to_end(&mut decoded).await?;

    Ok(decoded)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DigestFlavor {
    Sha1,
    Sha256,
}

impl DigestFlavor {
    /// Resolve a flavor from the `type` attribute of a `<checksum>` element.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "sha1" | "sha" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            name => Err(RpmRepositoryError::UnknownDigestFormat(name.to_string())),
        }
    }

    /// The name of this digest as used in repository metadata.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }

    /// Create a new hasher for this flavor.
    pub fn new_hasher(&self) -> Box<dyn digest::DynDigest + Send> {
        match self {
            Self::Sha1 => Box::new(sha1::Sha1::default()),
            Self::Sha256 => Box::new(sha2::Sha256::default()),
        }
    }
}

/// Represents a content digest.
#[derive(Clone, Eq, PartialEq, PartialOrd)]
pub enum ContentDigest {
    /// A SHA-1 digest.
    Sha1(Vec<u8>),
    /// A SHA-256 digest.
    Sha256(Vec<u8>),
}

impl std::fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sha1(data) => write!(f, "Sha1({})", hex::encode(data)),
            Self::Sha256(data) => write!(f, "Sha256({})", hex::encode(data)),
        }
    }
}

impl ContentDigest {
    /// Create a new SHA-1 instance by parsing a hex digest.
    pub fn sha1_hex(digest: &str) -> Result<Self> {
        Self::from_hex_digest(DigestFlavor::Sha1, digest)
    }

    /// Create a new SHA-256 instance by parsing a hex digest.
    pub fn sha256_hex(digest: &str) -> Result<Self> {
        Self::from_hex_digest(DigestFlavor::Sha256, digest)
    }

    /// Obtain an instance from a metadata checksum name and hex value.
    pub fn from_checksum(name: &str, value: &str) -> Result<Self> {
        Self::from_hex_digest(DigestFlavor::from_name(name)?, value.trim())
    }

    /// Obtain an instance by parsing a hex string as a [DigestFlavor].
    pub fn from_hex_digest(checksum: DigestFlavor, digest: &str) -> Result<Self> {
        let digest = hex::decode(digest)
            .map_err(|e| RpmRepositoryError::ContentDigestBadHex(digest.to_string(), e))?;

        Ok(Self::from_digest_bytes(checksum, digest))
    }

    fn from_digest_bytes(flavor: DigestFlavor, digest: Vec<u8>) -> Self {
        match flavor {
            DigestFlavor::Sha1 => Self::Sha1(digest),
            DigestFlavor::Sha256 => Self::Sha256(digest),
        }
    }

    /// Compute the digest of all data in a reader.
    pub fn compute_reader(flavor: DigestFlavor, mut reader: impl Read) -> std::io::Result<Self> {
        let mut hasher = flavor.new_hasher();
        let mut buffer = [0u8; 32768];

        loop {
            let count = reader.read(&mut buffer)?;
            if count == 0 {
                break;
            }

            hasher.update(&buffer[0..count]);
        }

        Ok(Self::from_digest_bytes(flavor, hasher.finalize().to_vec()))
    }

    /// Compute the digest of a file, streaming its content.
    pub fn compute_path(flavor: DigestFlavor, path: &Path) -> Result<Self> {
        let fh = std::fs::File::open(path)
            .map_err(|e| RpmRepositoryError::IoPath(format!("{}", path.display()), e))?;

        Self::compute_reader(flavor, std::io::BufReader::new(fh))
            .map_err(|e| RpmRepositoryError::IoPath(format!("{}", path.display()), e))
    }

    /// Create a new hasher matching for the type of this digest.
    pub fn new_hasher(&self) -> Box<dyn digest::DynDigest + Send> {
        self.digest_type().new_hasher()
    }

    /// Obtain the digest bytes for this content digest.
    pub fn digest_bytes(&self) -> &[u8] {
        match self {
            Self::Sha1(x) => x,
            Self::Sha256(x) => x,
        }
    }

    /// Obtain the hex encoded content digest.
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest_bytes())
    }

    /// Obtain the [DigestFlavor] for this digest.
    pub fn digest_type(&self) -> DigestFlavor {
        match self {
            Self::Sha1(_) => DigestFlavor::Sha1,
            Self::Sha256(_) => DigestFlavor::Sha256,
        }
    }
}
