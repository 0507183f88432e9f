//! Protocol version negotiation.
//!
//! `ProtocolVersion` is a totally-ordered enum; the wire representation is
//! its date string (e.g. `"2025-06-18"`), matching the teacher's
//! `LATEST_PROTOCOL_VERSION` string constant but given real ordering instead
//! of string comparison, which does not sort MCP's date-coded versions
//! correctly in general.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProtocolVersion {
    V2024_11_05,
    V2025_03_26,
    V2025_06_18,
}

impl ProtocolVersion {
    /// All versions this crate understands, oldest first.
    pub const ALL: [ProtocolVersion; 3] = [
        ProtocolVersion::V2024_11_05,
        ProtocolVersion::V2025_03_26,
        ProtocolVersion::V2025_06_18,
    ];

    pub const LATEST: ProtocolVersion = ProtocolVersion::V2025_06_18;
    pub const OLDEST: ProtocolVersion = ProtocolVersion::V2024_11_05;

    pub fn as_str(self) -> &'static str {
        match self {
            ProtocolVersion::V2024_11_05 => "2024-11-05",
            ProtocolVersion::V2025_03_26 => "2025-03-26",
            ProtocolVersion::V2025_06_18 => "2025-06-18",
        }
    }

    pub fn parse(s: &str) -> Option<ProtocolVersion> {
        ProtocolVersion::ALL.into_iter().find(|v| v.as_str() == s)
    }

    /// Selects the highest version this side supports that is `<=` the
    /// requested version. If none qualifies (the request is older than this
    /// side's oldest supported version), returns the oldest supported
    /// version instead, per §4.E.
    pub fn negotiate(requested: ProtocolVersion) -> ProtocolVersion {
        ProtocolVersion::ALL
            .into_iter()
            .filter(|v| *v <= requested)
            .max()
            .unwrap_or(ProtocolVersion::OLDEST)
    }
}

impl Serialize for ProtocolVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProtocolVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ProtocolVersion::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unsupported protocol version: {s}")))
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compares by wire string, for use when the peer's requested version string
/// is unrecognized and must be rejected without panicking on `parse`.
pub fn compare_version_strings(a: &str, b: &str) -> Option<Ordering> {
    Some(ProtocolVersion::parse(a)?.cmp(&ProtocolVersion::parse(b)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_totally_ordered() {
        assert!(ProtocolVersion::V2024_11_05 < ProtocolVersion::V2025_03_26);
        assert!(ProtocolVersion::V2025_03_26 < ProtocolVersion::V2025_06_18);
        assert!(ProtocolVersion::V2024_11_05 < ProtocolVersion::V2025_06_18);
    }

    #[test]
    fn negotiate_picks_highest_supported_at_or_below_request() {
        assert_eq!(
            ProtocolVersion::negotiate(ProtocolVersion::V2025_03_26),
            ProtocolVersion::V2025_03_26
        );
        assert_eq!(
            ProtocolVersion::negotiate(ProtocolVersion::V2025_06_18),
            ProtocolVersion::V2025_06_18
        );
    }

    #[test]
    fn parse_round_trips_all_known_versions() {
        for v in ProtocolVersion::ALL {
            assert_eq!(ProtocolVersion::parse(v.as_str()), Some(v));
        }
        assert_eq!(ProtocolVersion::parse("1999-01-01"), None);
    }
}
