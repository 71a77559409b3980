//! Content identity: blake3 hashes of compiled documents.

mod hash;

pub use hash::ContentHash;
