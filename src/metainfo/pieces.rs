use bytes::{Bytes, BytesMut};
use sha1::{Digest, Sha1};

use super::error::MetainfoError;
use crate::constants::DIGEST_LEN;

/// SHA-1 digest of one piece.
pub type PieceDigest = [u8; DIGEST_LEN];

/// Hashes a piece payload.
pub fn hash_piece(data: &[u8]) -> PieceDigest {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Concatenated piece digests in index order.
///
/// The digest of piece `i` occupies bytes `[20i, 20i + 20)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestBlob {
    bytes: Bytes,
}

impl DigestBlob {
    /// Wraps stored digests, rejecting blobs that are not a multiple of 20 bytes.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Result<Self, MetainfoError> {
        let bytes = bytes.into();
        if bytes.len() % DIGEST_LEN != 0 {
            return Err(MetainfoError::DigestBlobLength(bytes.len()));
        }
        Ok(Self { bytes })
    }

    pub fn from_digests<I>(digests: I) -> Self
    where
        I: IntoIterator<Item = PieceDigest>,
    {
        let mut buf = BytesMut::new();
        for digest in digests {
            buf.extend_from_slice(&digest);
        }
        Self {
            bytes: buf.freeze(),
        }
    }

    /// Builds a blob from digests collected in arbitrary order.
    pub(crate) fn from_unsorted(mut digests: Vec<(u32, PieceDigest)>) -> Self {
        digests.sort_unstable_by_key(|(index, _)| *index);
        Self::from_digests(digests.into_iter().map(|(_, digest)| digest))
    }

    /// Number of digests.
    pub fn len(&self) -> usize {
        self.bytes.len() / DIGEST_LEN
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<PieceDigest> {
        let start = usize::try_from(index).ok()?.checked_mul(DIGEST_LEN)?;
        let chunk = self.bytes.get(start..start + DIGEST_LEN)?;
        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(chunk);
        Some(digest)
    }

    pub fn iter(&self) -> impl Iterator<Item = PieceDigest> + '_ {
        self.bytes.chunks_exact(DIGEST_LEN).map(|chunk| {
            let mut digest = [0u8; DIGEST_LEN];
            digest.copy_from_slice(chunk);
            digest
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}
