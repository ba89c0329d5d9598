// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::address::Address;
use crate::utils::encoding::blake2b_256;
use anyhow::{Context as _, ensure};
use fvm_ipld_encoding::{de, ser, strict_bytes};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};
use std::borrow::Cow;

/// Length of a recoverable secp256k1 signature: `r || s || v`.
pub const SECP_SIG_LEN: usize = 65;

/// Signature variants for Filecoin signatures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[repr(u8)]
pub enum SignatureType {
    Secp256k1 = 1,
    Bls = 2,
}

impl TryFrom<u8> for SignatureType {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SignatureType::Secp256k1),
            2 => Ok(SignatureType::Bls),
            _ => anyhow::bail!("Invalid signature type byte (must be 1 or 2), was {value}"),
        }
    }
}

/// A cryptographic signature, represented in bytes, of any key protocol.
#[derive(Clone, Debug, PartialEq, Eq, Hash, derive_more::Constructor)]
pub struct Signature {
    pub sig_type: SignatureType,
    pub bytes: Vec<u8>,
}

impl ser::Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        strict_bytes::Serialize::serialize(&self.to_bytes(), serializer)
    }
}

impl<'de> de::Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        let bytes: Cow<'de, [u8]> = strict_bytes::Deserialize::deserialize(deserializer)?;
        match bytes.split_first() {
            None => Err(de::Error::custom("Cannot deserialize empty bytes")),
            Some((&sig_byte, rest)) => {
                let sig_type = SignatureType::try_from(sig_byte).map_err(de::Error::custom)?;
                Ok(Signature {
                    sig_type,
                    bytes: rest.to_vec(),
                })
            }
        }
    }
}

impl Signature {
    /// Creates a SECP Signature given the raw bytes.
    pub fn new_secp256k1(bytes: Vec<u8>) -> Self {
        Self {
            sig_type: SignatureType::Secp256k1,
            bytes,
        }
    }

    /// Creates a BLS Signature given the raw bytes.
    pub fn new_bls(bytes: Vec<u8>) -> Self {
        Self {
            sig_type: SignatureType::Bls,
            bytes,
        }
    }

    /// Returns the signature bytes including the signature type byte.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.bytes.len() + 1);
        bytes.push(self.sig_type as u8);
        bytes.extend_from_slice(&self.bytes);
        bytes
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Checks if a signature is valid given data and address.
    ///
    /// Only secp256k1 signatures are verified here. BLS aggregation lives with
    /// the proof verification collaborator and is rejected.
    pub fn verify(&self, data: &[u8], addr: &Address) -> anyhow::Result<()> {
        match self.sig_type {
            SignatureType::Secp256k1 => verify_secp256k1_sig(&self.bytes, data, addr),
            SignatureType::Bls => anyhow::bail!("BLS signature verification is not supported"),
        }
    }
}

fn verify_secp256k1_sig(sig: &[u8], data: &[u8], addr: &Address) -> anyhow::Result<()> {
    ensure!(
        sig.len() == SECP_SIG_LEN,
        "Invalid secp256k1 signature length {}",
        sig.len()
    );
    let (rs, v) = sig.split_at(SECP_SIG_LEN - 1);
    let digest = blake2b_256(data);
    let signature = EcdsaSignature::from_slice(rs)?;
    let recovery_id = RecoveryId::from_byte(v[0]).context("invalid recovery id")?;
    let key = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id)?;
    let recovered = Address::new_secp256k1(key.to_encoded_point(false).as_bytes())?;
    ensure!(
        &recovered == addr,
        "Signature does not match {addr}, recovered {recovered}"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;

    fn sign(key: &SigningKey, data: &[u8]) -> Signature {
        let (sig, recid) = key.sign_prehash_recoverable(&blake2b_256(data)).unwrap();
        let mut bytes = sig.to_bytes().to_vec();
        bytes.push(recid.to_byte());
        Signature::new_secp256k1(bytes)
    }

    fn address_of(key: &SigningKey) -> Address {
        Address::new_secp256k1(key.verifying_key().to_encoded_point(false).as_bytes()).unwrap()
    }

    #[test]
    fn secp_signature_roundtrip_verifies() {
        let key = SigningKey::from_slice(&[7; 32]).unwrap();
        let sig = sign(&key, b"hello filecoin");
        sig.verify(b"hello filecoin", &address_of(&key)).unwrap();
        assert!(sig.verify(b"tampered", &address_of(&key)).is_err());
    }

    #[test]
    fn secp_signature_rejects_other_signer() {
        let key = SigningKey::from_slice(&[7; 32]).unwrap();
        let other = SigningKey::from_slice(&[9; 32]).unwrap();
        let sig = sign(&key, b"data");
        assert!(sig.verify(b"data", &address_of(&other)).is_err());
    }

    #[test]
    fn bls_is_rejected() {
        let sig = Signature::new_bls(vec![0; 96]);
        assert!(sig.verify(b"data", &Address::new_id(1)).is_err());
    }

    #[test]
    fn encoding_carries_type_byte() {
        let sig = Signature::new_secp256k1(vec![1, 2, 3]);
        let bytes = fvm_ipld_encoding::to_vec(&sig).unwrap();
        let decoded: Signature = fvm_ipld_encoding::from_slice(&bytes).unwrap();
        assert_eq!(decoded, sig);
        let unknown_type =
            fvm_ipld_encoding::to_vec(&fvm_ipld_encoding::BytesSer(&[7, 1])).unwrap();
        assert!(fvm_ipld_encoding::from_slice::<Signature>(&unknown_type).is_err());
    }
}
