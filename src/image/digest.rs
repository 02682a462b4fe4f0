//! SHA256 digests in the `sha256:<hex>` form registries use.

use sha2::{Digest, Sha256};

pub fn compute_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

pub fn docker_digest(data: &[u8]) -> String {
    format!("sha256:{}", compute_sha256(data))
}
