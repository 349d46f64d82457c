//! Verification of content on disk against stored piece digests.
//!
//! # Overview
//!
//! [`Verifier`] runs two independent checks:
//!
//! - a size check that only looks at file existence, type and size
//! - a content check that hashes every piece through the
//!   [`hashing`](crate::hashing) pipeline and compares it with the
//!   [`DigestBlob`](crate::metainfo::DigestBlob)
//!
//! A mismatched piece is attributed to the files it overlaps. When it
//! overlaps several files all of them are reported as suspects.

mod progress;
mod state;
mod verifier;

pub use progress::{SizeCheckProgress, VerifyProgress};
pub use state::{VerifyOutcome, VerifyState};
pub use verifier::Verifier;
