use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// A strict `MAJOR.MINOR.PATCH` version. Pre-release and build suffixes are
/// not accepted anywhere in the trust path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Semver {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

static SEMVER_RE: OnceLock<Regex> = OnceLock::new();

fn semver_re() -> &'static Regex {
    SEMVER_RE.get_or_init(|| Regex::new(r"^(\d+)\.(\d+)\.(\d+)$").unwrap())
}

const COMPONENT_BITS: u32 = 20;

impl Semver {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self { major, minor, patch }
    }

    /// Surrounding whitespace is ignored; anything else that is not three
    /// dot-separated decimal components is `None`.
    pub fn parse_strict(s: &str) -> Option<Self> {
        let caps = semver_re().captures(s.trim())?;
        Some(Self {
            major: caps[1].parse().ok()?,
            minor: caps[2].parse().ok()?,
            patch: caps[3].parse().ok()?,
        })
    }

    /// A pack version: strict, and small enough for [`Semver::sequence`].
    /// Manifests and `pack.json` accept nothing else, so every version that
    /// can be signed can also be ordered by the rollback gate.
    pub fn parse_pack_version(s: &str) -> Option<Self> {
        Self::parse_strict(s).filter(|v| v.sequence().is_some())
    }

    /// Monotone integer form used by the anti-rollback counter.
    /// Every component must stay below 2^20.
    pub fn sequence(&self) -> Option<i64> {
        let limit = 1u64 << COMPONENT_BITS;
        if self.major >= limit || self.minor >= limit || self.patch >= limit {
            return None;
        }
        let packed = (self.major << (2 * COMPONENT_BITS)) | (self.minor << COMPONENT_BITS) | self.patch;
        i64::try_from(packed).ok()
    }
}

impl fmt::Display for Semver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
