//! Test outcome carried from the xunit artifact through the report.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Outcome of a single test.
///
/// `Unknown` covers skipped tests and is serialized as JSON `null`, never
/// coerced into pass or fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestOutcome {
    Pass,
    Fail,
    Unknown,
}

impl TestOutcome {
    /// Wire representation, `None` for unknown.
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            Self::Pass => Some("pass"),
            Self::Fail => Some("fail"),
            Self::Unknown => None,
        }
    }

    /// Parse from the wire representation.
    pub fn parse(s: Option<&str>) -> Option<Self> {
        match s {
            Some("pass") => Some(Self::Pass),
            Some("fail") => Some(Self::Fail),
            None => Some(Self::Unknown),
            Some(_) => None,
        }
    }

    /// Map the raw xunit signal: skipped wins over failed.
    pub fn from_signal(skipped: bool, failed: bool) -> Self {
        if skipped {
            Self::Unknown
        } else if failed {
            Self::Fail
        } else {
            Self::Pass
        }
    }
}

impl std::fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str().unwrap_or("unknown"))
    }
}

impl Serialize for TestOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_str() {
            Some(s) => serializer.serialize_str(s),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for TestOutcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        TestOutcome::parse(raw.as_deref()).ok_or_else(|| {
            serde::de::Error::custom(format!("unknown test result: {:?}", raw))
        })
    }
}
