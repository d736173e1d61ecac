//! Content identifiers (CIDv0/CIDv1) over sha2-256 multihashes.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::varint::{VarintError, read_uvarint, write_uvarint};

/// Multicodec for DAG-CBOR blocks (repository commits, tree nodes, records).
pub const DAG_CBOR: u64 = 0x71;
/// Multicodec for raw binary blocks.
pub const RAW: u64 = 0x55;
/// Implicit codec of CIDv0.
pub const DAG_PB: u64 = 0x70;
/// Multihash code for sha2-256.
pub const SHA2_256: u64 = 0x12;

const SHA2_256_LEN: usize = 32;
/// Leading byte of a link inside a DAG-CBOR tag 42 (multibase identity).
const LINK_IDENTITY_PREFIX: u8 = 0x00;
const BASE32_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

/// A parsed content identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cid {
    version: u64,
    codec: u64,
    hash_code: u64,
    digest: Vec<u8>,
}

impl Cid {
    /// Build a CIDv1 addressing `bytes` with a sha2-256 multihash.
    pub fn for_block(codec: u64, bytes: &[u8]) -> Self {
        Self {
            version: 1,
            codec,
            hash_code: SHA2_256,
            digest: Sha256::digest(bytes).to_vec(),
        }
    }

    /// Encode `value` as DAG-CBOR and return its CID together with the bytes.
    pub fn of_dag_cbor<T: serde::Serialize>(value: &T) -> Result<(Self, Vec<u8>), serde_cbor::Error> {
        let bytes = crate::to_dag_cbor(value)?;
        Ok((Self::for_block(DAG_CBOR, &bytes), bytes))
    }

    /// Parse a CID from the front of `bytes`, returning it with the number of
    /// bytes consumed.
    pub fn read_prefix(bytes: &[u8]) -> Result<(Self, usize), CidError> {
        if bytes.len() >= 2 && bytes[0] == SHA2_256 as u8 && bytes[1] == SHA2_256_LEN as u8 {
            let end = 2 + SHA2_256_LEN;
            if bytes.len() < end {
                return Err(CidError::Truncated);
            }
            let cid = Self {
                version: 0,
                codec: DAG_PB,
                hash_code: SHA2_256,
                digest: bytes[2..end].to_vec(),
            };
            return Ok((cid, end));
        }

        let mut pos = 0;
        let mut next = |bytes: &[u8]| -> Result<u64, CidError> {
            let (value, used) = read_uvarint(&bytes[pos..])?;
            pos += used;
            Ok(value)
        };
        let version = next(bytes)?;
        if version != 1 {
            return Err(CidError::UnsupportedVersion(version));
        }
        let codec = next(bytes)?;
        let hash_code = next(bytes)?;
        let digest_len = next(bytes)? as usize;
        let end = pos.checked_add(digest_len).ok_or(CidError::Truncated)?;
        if bytes.len() < end {
            return Err(CidError::Truncated);
        }
        let cid = Self {
            version,
            codec,
            hash_code,
            digest: bytes[pos..end].to_vec(),
        };
        Ok((cid, end))
    }

    /// Parse a CID that must span all of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CidError> {
        let (cid, used) = Self::read_prefix(bytes)?;
        if used != bytes.len() {
            return Err(CidError::TrailingBytes(bytes.len() - used));
        }
        Ok(cid)
    }

    /// Parse the byte payload of a DAG-CBOR link, with or without its
    /// identity multibase prefix.
    pub fn from_link_bytes(bytes: &[u8]) -> Result<Self, CidError> {
        match bytes.split_first() {
            Some((&LINK_IDENTITY_PREFIX, rest)) => Self::from_bytes(rest),
            Some(_) => Self::from_bytes(bytes),
            None => Err(CidError::Truncated),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.digest.len() + 8);
        if self.version == 0 {
            out.push(SHA2_256 as u8);
            out.push(SHA2_256_LEN as u8);
            out.extend_from_slice(&self.digest);
            return out;
        }
        write_uvarint(self.version, &mut out);
        write_uvarint(self.codec, &mut out);
        write_uvarint(self.hash_code, &mut out);
        write_uvarint(self.digest.len() as u64, &mut out);
        out.extend_from_slice(&self.digest);
        out
    }

    /// Bytes suitable for a DAG-CBOR link (identity prefix + CID bytes).
    pub fn to_link_bytes(&self) -> Vec<u8> {
        let mut out = vec![LINK_IDENTITY_PREFIX];
        out.extend_from_slice(&self.to_bytes());
        out
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn codec(&self) -> u64 {
        self.codec
    }

    pub fn hash_code(&self) -> u64 {
        self.hash_code
    }

    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// Check `bytes` against this CID's digest. Returns `None` when the
    /// multihash function is not one we can compute.
    pub fn verify(&self, bytes: &[u8]) -> Option<bool> {
        match self.hash_code {
            SHA2_256 => Some(Sha256::digest(bytes).as_slice() == self.digest.as_slice()),
            _ => None,
        }
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version == 0 {
            // v0 has no multibase form without base58; fall back to base16.
            return write!(f, "f{}", hex::encode(self.to_bytes()));
        }
        f.write_str("b")?;
        f.write_str(&base32_lower(&self.to_bytes()))
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cid").field(&self.to_string()).finish()
    }
}

impl TryFrom<&[u8]> for Cid {
    type Error = CidError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Cid::from_bytes(value)
    }
}

fn base32_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 8).div_ceil(5));
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for &byte in bytes {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

/// Error returned when CID bytes cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CidError {
    #[error("cid truncated")]
    Truncated,
    #[error("unsupported cid version {0}")]
    UnsupportedVersion(u64),
    #[error("{0} unexpected byte(s) after cid")]
    TrailingBytes(usize),
    #[error("invalid varint in cid: {0}")]
    Varint(#[from] VarintError),
}
