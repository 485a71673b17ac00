//! Cache key layout for community member counters.
//!
//! Keys look like `community:<uuid>:member_count`.
use uuid::Uuid;

use crate::types::CommunityId;

pub const MEMBER_COUNT_KEY_PREFIX: &str = "community:";
const MEMBER_COUNT_KEY_SUFFIX: &str = ":member_count";

/// `SCAN MATCH` pattern selecting every member counter key.
pub const MEMBER_COUNT_KEY_PATTERN: &str = "community:*:member_count";

pub fn member_count_key(community_id: &CommunityId) -> String {
    format!("{MEMBER_COUNT_KEY_PREFIX}{community_id}{MEMBER_COUNT_KEY_SUFFIX}")
}

/// Extracts the community id from a member count key.
///
/// Returns `None` for keys that share the prefix but are not member counters.
pub fn parse_member_count_key(key: &str) -> Option<CommunityId> {
    let id = key
        .strip_prefix(MEMBER_COUNT_KEY_PREFIX)?
        .strip_suffix(MEMBER_COUNT_KEY_SUFFIX)?;
    Uuid::parse_str(id).ok()
}
