//! # Content Hashing
//!
//! Stable SHA-256 digests over ConfigMap/Secret data. The digest is the
//! change-detection signal and the value written into injected env vars, so
//! it must not depend on map iteration order or on fields Kubernetes
//! rewrites between reads (resourceVersion, managedFields).

use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use sha2::{Digest, Sha256};

/// Digest of a ConfigMap's `data` and `binaryData`.
pub fn hash_configmap(configmap: &ConfigMap) -> String {
    let mut hasher = Sha256::new();
    if let Some(data) = &configmap.data {
        for (key, value) in data {
            update_entry(&mut hasher, key, value.as_bytes());
        }
    }
    hasher.update([0xffu8]);
    if let Some(binary_data) = &configmap.binary_data {
        for (key, value) in binary_data {
            update_entry(&mut hasher, key, &value.0);
        }
    }
    hex_digest(hasher)
}

/// Digest of a Secret's `data` and `stringData`.
pub fn hash_secret(secret: &Secret) -> String {
    let mut hasher = Sha256::new();
    if let Some(data) = &secret.data {
        for (key, value) in data {
            update_entry(&mut hasher, key, &value.0);
        }
    }
    hasher.update([0xffu8]);
    if let Some(string_data) = &secret.string_data {
        for (key, value) in string_data {
            update_entry(&mut hasher, key, value.as_bytes());
        }
    }
    hex_digest(hasher)
}

// BTreeMap iteration is already key-ordered; the NUL separators keep
// ("ab", "c") and ("a", "bc") from colliding.
fn update_entry(hasher: &mut Sha256, key: &str, value: &[u8]) {
    hasher.update(key.as_bytes());
    hasher.update([0x00u8]);
    hasher.update(value);
    hasher.update([0x00u8]);
}

fn hex_digest(hasher: Sha256) -> String {
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
