// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Error type for this crate.
#[derive(Debug, Error)]
pub enum RpmRepositoryError {
    #[error("URL parse error: {0:?}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP error: {0:?}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {1} fetching {0}")]
    HttpStatus(String, u16),

    #[error("XML error: {0:?}")]
    Xml(#[from] serde_xml_rs::Error),

    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("repository I/O error on path {0}: {1:?}")]
    IoPath(String, std::io::Error),

    #[error("invalid hex in content digest: {0}; {1:?}")]
    ContentDigestBadHex(String, hex::FromHexError),

    #[error("unknown content digest format: {0}")]
    UnknownDigestFormat(String),

    #[error("repository metadata entry not found: {0}")]
    MetadataFileNotFound(&'static str),

    #[error("RPM error: {0:?}")]
    Rpm(#[from] rpm::Error),

    #[error("malformed RPM header: {0}")]
    RpmMalformedHeader(String),

    #[error("unsupported RPM payload format: {0}")]
    RpmPayloadFormat(String),

    #[error("unsupported RPM payload compressor: {0}")]
    RpmPayloadCompressor(String),

    #[error("illegal path in RPM payload: {0}")]
    RpmPayloadIllegalPath(String),

    #[error("PGP error: {0:?}")]
    Pgp(#[from] pgp::errors::Error),

    #[error("keyring contains no public keys")]
    KeyringEmpty,

    #[error("RPM package carries no signatures")]
    SignatureMissing,

    #[error("signature (tag {0}) carries no issuer key id")]
    SignatureNoIssuer(u32),

    #[error("signer {0} of signature (tag {1}) is not present in the trusted keyring")]
    SignatureSignerUnresolved(String, u32),

    #[error("signature (tag {0}) failed verification: {1}")]
    SignatureInvalid(u32, String),
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, RpmRepositoryError>;
