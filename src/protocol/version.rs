//! Protocol versioning
//!
//! The relay stamps every envelope with the protocol version so a consumer
//! built against an older message set can reject traffic it cannot read.

use serde::{Deserialize, Serialize};

/// Protocol version identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ProtocolVersion {
    /// The version this build speaks
    pub const CURRENT: ProtocolVersion = ProtocolVersion {
        major: 1,
        minor: 0,
        patch: 0,
    };

    /// Create a new version
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Check whether a message stamped `other` can be consumed by `self`.
    ///
    /// Major versions must match exactly; a consumer accepts messages from
    /// producers at the same or an older minor version.
    pub fn accepts(&self, other: &ProtocolVersion) -> bool {
        self.major == other.major && self.minor >= other.minor
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        ProtocolVersion::CURRENT
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_display() {
        assert_eq!(ProtocolVersion::new(1, 2, 3).to_string(), "1.2.3");
        assert_eq!(
            ProtocolVersion::CURRENT.to_string(),
            format!(
                "{}.{}.{}",
                ProtocolVersion::CURRENT.major,
                ProtocolVersion::CURRENT.minor,
                ProtocolVersion::CURRENT.patch
            )
        );
    }

    #[test]
    fn test_version_accepts() {
        let v1_0 = ProtocolVersion::new(1, 0, 0);
        let v1_1 = ProtocolVersion::new(1, 1, 0);
        let v2_0 = ProtocolVersion::new(2, 0, 0);

        // Newer minor consumes older minor
        assert!(v1_1.accepts(&v1_0));
        // Older minor rejects newer minor
        assert!(!v1_0.accepts(&v1_1));
        // Major mismatch rejects both ways
        assert!(!v2_0.accepts(&v1_0));
        assert!(!v1_0.accepts(&v2_0));
        // Patch is irrelevant
        assert!(v1_0.accepts(&ProtocolVersion::new(1, 0, 9)));
    }

    #[test]
    fn test_version_serialize() {
        let json = serde_json::to_string(&ProtocolVersion::CURRENT).unwrap();
        assert!(json.contains("\"major\":1"));
    }
}
