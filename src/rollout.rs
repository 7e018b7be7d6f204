//! Deterministic rollout bucketing
//!
//! Maps (flag key, requester identity) to a stable bucket in [0, 100).
//! The same pair always lands in the same bucket, across restarts and
//! across nodes sharing the flag key, so a partially rolled-out flag is
//! sticky per identity rather than flickering per request.

use crate::context::EvaluationContext;
use sha2::{Digest, Sha256};

/// Identity used when the context carries neither a user nor a plugin
pub const ANONYMOUS_IDENTITY: &str = "anonymous";

/// Pick the bucketing identity for a context: user id, else plugin id,
/// else the anonymous sentinel.
pub fn bucket_identity(context: &EvaluationContext) -> &str {
    context
        .user_id
        .as_deref()
        .or(context.plugin_id.as_deref())
        .unwrap_or(ANONYMOUS_IDENTITY)
}

/// Compute the rollout bucket for (flag key, identity).
///
/// SHA-256 over `"{flag_key}:{identity}"`; the first digest word taken
/// modulo 100.
pub fn bucket(flag_key: &str, identity: &str) -> u8 {
    let mut hasher = Sha256::new();
    hasher.update(flag_key.as_bytes());
    hasher.update(b":");
    hasher.update(identity.as_bytes());
    let digest = hasher.finalize();

    let word = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    (word % 100) as u8
}
