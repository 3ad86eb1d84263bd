// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! OpenPGP verification of RPM packages.

Packages are verified against a [Keyring] of trusted public keys. Every
OpenPGP signature in a package's signature header must name an issuer present
in the keyring (as a primary key or a subkey) and must verify against the
content its tag covers. A package without signatures is rejected.
*/

use {
    crate::{
        error::{Result, RpmRepositoryError},
        package::RpmPackage,
    },
    chrono::{DateTime, Utc},
    log::debug,
    pgp::{
        composed::{SignedPublicKey, SignedPublicSubKey},
        types::{KeyId, KeyTrait},
        Deserializable, StandaloneSignature,
    },
    std::{
        io::{Read, Seek},
        path::Path,
    },
};

/// A collection of trusted OpenPGP public keys.
#[derive(Clone, Debug)]
pub struct Keyring {
    keys: Vec<SignedPublicKey>,
}

/// A key in a [Keyring] able to verify signatures.
enum SigningKey<'a> {
    Primary(&'a SignedPublicKey),
    Subkey(&'a SignedPublicKey, &'a SignedPublicSubKey),
}

impl<'a> SigningKey<'a> {
    fn owner(&self) -> &'a SignedPublicKey {
        match self {
            Self::Primary(key) => key,
            Self::Subkey(key, _) => key,
        }
    }
}

impl Keyring {
    /// Construct an instance from ASCII armored public key blocks.
    ///
    /// Every key must carry valid self-signatures.
    pub fn from_armored(reader: impl Read + Seek) -> Result<Self> {
        let (keys, _) = SignedPublicKey::from_armor_many(reader)?;
        let keys = keys.collect::<pgp::errors::Result<Vec<_>>>()?;

        if keys.is_empty() {
            return Err(RpmRepositoryError::KeyringEmpty);
        }

        for key in &keys {
            key.verify()?;
            debug!(
                "loaded public key {}",
                hex::encode_upper(key.fingerprint())
            );
        }

        Ok(Self { keys })
    }

    /// Construct an instance from a file holding ASCII armored keys.
    pub fn from_path(path: &Path) -> Result<Self> {
        let fh = std::fs::File::open(path)
            .map_err(|e| RpmRepositoryError::IoPath(format!("{}", path.display()), e))?;

        Self::from_armored(std::io::BufReader::new(fh))
    }

    /// Public keys in this keyring.
    pub fn keys(&self) -> &[SignedPublicKey] {
        &self.keys
    }

    fn find_signer(&self, issuer: &KeyId) -> Option<SigningKey<'_>> {
        for key in &self.keys {
            if &key.key_id() == issuer {
                return Some(SigningKey::Primary(key));
            }

            for subkey in &key.public_subkeys {
                if &subkey.key_id() == issuer {
                    return Some(SigningKey::Subkey(key, subkey));
                }
            }
        }

        None
    }
}

/// Describes a verified package signature and the key that made it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignerInfo {
    /// Signature header tag the signature was stored in.
    pub tag: u32,
    /// Primary user id of the signing key.
    pub user_id: String,
    /// Upper case hex fingerprint of the signing (primary) key.
    pub fingerprint: String,
    /// Upper case hex key id of the key that produced the signature.
    pub key_id: String,
    /// When the signing key was created.
    pub key_created: DateTime<Utc>,
    /// When the signature was made, if recorded.
    pub signature_created: Option<DateTime<Utc>>,
}

/// Verify every OpenPGP signature of a package against a keyring.
///
/// Returns a [SignerInfo] per verified signature. Any unresolvable or invalid
/// signature fails the entire package.
pub fn verify_package(package: &RpmPackage, keyring: &Keyring) -> Result<Vec<SignerInfo>> {
    let signatures = package.signatures();

    if signatures.is_empty() {
        return Err(RpmRepositoryError::SignatureMissing);
    }

    let mut signers = vec![];

    for entry in signatures {
        let standalone = StandaloneSignature::from_bytes(entry.data)
            .map_err(|e| RpmRepositoryError::SignatureInvalid(entry.tag, format!("{:?}", e)))?;
        let signature = &standalone.signature;

        let issuer = signature
            .issuer()
            .ok_or(RpmRepositoryError::SignatureNoIssuer(entry.tag))?;
        let issuer_hex = hex::encode_upper(issuer.as_ref());

        let signer = keyring.find_signer(issuer).ok_or_else(|| {
            RpmRepositoryError::SignatureSignerUnresolved(issuer_hex.clone(), entry.tag)
        })?;

        let content = package.signed_content(entry.scope)?;

        match &signer {
            SigningKey::Primary(key) => signature.verify(*key, content),
            SigningKey::Subkey(_, subkey) => signature.verify(*subkey, content),
        }
        .map_err(|e| RpmRepositoryError::SignatureInvalid(entry.tag, format!("{:?}", e)))?;

        let owner = signer.owner();

        debug!("signature tag {} verified by key {}", entry.tag, issuer_hex);

        signers.push(SignerInfo {
            tag: entry.tag,
            user_id: owner
                .details
                .users
                .first()
                .map(|user| user.id.id().to_string())
                .unwrap_or_default(),
            fingerprint: hex::encode_upper(owner.fingerprint()),
            key_id: issuer_hex,
            key_created: *owner.primary_key.created_at(),
            signature_created: signature.created().cloned(),
        });
    }

    Ok(signers)
}
