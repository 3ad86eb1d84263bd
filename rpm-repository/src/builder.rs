// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Producing RPM package files.

Packages are assembled by [rpm::PackageBuilder]. The helpers here give built
packages a gzip compressed payload, bridge OpenPGP keys to the
[rpm::signature::pgp::Signer] used for signing, and generate signing keys.
This is primarily useful for producing test fixtures.
*/

use {
    crate::error::Result,
    pgp::{
        crypto::{HashAlgorithm, SymmetricKeyAlgorithm},
        types::{CompressionAlgorithm, SecretKeyTrait},
        KeyType, SecretKeyParamsBuilder, SignedPublicKey, SignedSecretKey,
    },
    smallvec::smallvec,
};

/// Start building a package with a gzip compressed payload.
pub fn package_builder(
    name: &str,
    version: &str,
    release: &str,
    arch: &str,
) -> rpm::PackageBuilder {
    rpm::PackageBuilder::new(name, version, "GPL-2.0-only", arch, name)
        .release(release)
        .compression(rpm::CompressionType::Gzip)
}

/// Serialize a package to bytes.
pub fn package_bytes(package: &rpm::Package) -> Result<Vec<u8>> {
    let mut data = vec![];
    package.write(&mut data)?;

    Ok(data)
}

/// Obtain a package signer for an OpenPGP secret key.
///
/// The key must not be protected by a passphrase.
pub fn package_signer(key: &SignedSecretKey) -> Result<rpm::signature::pgp::Signer> {
    let armored = key.to_armored_string(None)?;

    Ok(rpm::signature::pgp::Signer::load_from_asc_bytes(armored.as_bytes())?)
}

/// Add regular files to a package and serialize it.
///
/// The package is signed when a key is given.
pub fn build_package(
    mut builder: rpm::PackageBuilder,
    files: &[(&str, &[u8])],
    key: Option<&SignedSecretKey>,
) -> Result<Vec<u8>> {
    for (path, data) in files {
        builder = builder.with_file_contents(data.to_vec(), rpm::FileOptions::new(*path))?;
    }

    let package = match key {
        Some(key) => builder.build_and_sign(package_signer(key)?)?,
        None => builder.build()?,
    };

    package_bytes(&package)
}

/// Generate a self-signed EdDSA key pair suitable for signing packages.
pub fn create_signing_key(
    primary_user_id: impl ToString,
) -> Result<(SignedSecretKey, SignedPublicKey)> {
    let mut params = SecretKeyParamsBuilder::default();
    params
        .key_type(KeyType::EdDSA)
        .preferred_symmetric_algorithms(smallvec![SymmetricKeyAlgorithm::AES256])
        .preferred_hash_algorithms(smallvec![HashAlgorithm::SHA2_256])
        .preferred_compression_algorithms(smallvec![CompressionAlgorithm::ZLIB])
        .can_create_certificates(true)
        .can_sign(true)
        .primary_user_id(primary_user_id.to_string());

    let params = params
        .build()
        .map_err(|e| pgp::errors::Error::Message(format!("{:?}", e)))?;

    let secret_key = params.generate()?;
    let secret_key_signed = secret_key.sign(String::new)?;

    let public_key = secret_key_signed.public_key();
    let public_key_signed = public_key.sign(&secret_key_signed, String::new)?;

    Ok((secret_key_signed, public_key_signed))
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::package::{RpmPackage, SignatureScope},
    };

    #[test]
    fn signed_package() -> Result<()> {
        let (secret, _) = create_signing_key("Neuron Test <neuron@example.com>")?;

        let data = build_package(
            package_builder("a", "1", "1", "noarch"),
            &[("/usr/src/a/real.c", b"real\n")],
            Some(&secret),
        )?;
        let package = RpmPackage::from_reader(std::io::Cursor::new(data))?;

        let signatures = package.signatures();
        assert!(signatures
            .iter()
            .any(|signature| signature.scope == SignatureScope::Header));
        assert!(signatures
            .iter()
            .any(|signature| signature.scope == SignatureScope::HeaderAndPayload));

        Ok(())
    }
}
