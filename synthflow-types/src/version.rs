//! Version tags: official releases and per-merge-request provisional builds.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which component of the version triple a release candidate bumps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BumpLevel {
    #[default]
    Patch,
    Minor,
    Major,
}

/// A four-component version identifier.
///
/// A tag is **official** when `origin` is absent and **provisional** when it
/// carries the merge-request id that produced it. Rendering:
///
/// - official: `v1.3.0`
/// - provisional: `mr42-v1.3.0.1` (origin prefix, trial suffix)
///
/// Ordering is lexicographic on `(major, minor, patch)`; for equal triples an
/// official tag sorts above every provisional one, so promotion never moves a
/// version backwards no matter how many trials were built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionTag {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,

    #[serde(default)]
    pub trial: u32,

    /// Merge-request id for provisional tags; `None` means official.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<u64>,
}

impl VersionTag {
    /// The `v0.0.0` baseline used when a repository has no tags yet.
    pub const ZERO: VersionTag = VersionTag {
        major: 0,
        minor: 0,
        patch: 0,
        trial: 0,
        origin: None,
    };

    pub fn official(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            trial: 0,
            origin: None,
        }
    }

    pub fn is_official(&self) -> bool {
        self.origin.is_none()
    }

    pub fn is_provisional(&self) -> bool {
        self.origin.is_some()
    }

    /// The `(major, minor, patch)` triple, ignoring trial/origin.
    pub fn base(&self) -> (u32, u32, u32) {
        (self.major, self.minor, self.patch)
    }

    /// The official version obtained by bumping `level`: the chosen component
    /// is incremented and every lower component is zeroed.
    pub fn bump(&self, level: BumpLevel) -> VersionTag {
        match level {
            BumpLevel::Patch => VersionTag::official(self.major, self.minor, self.patch + 1),
            BumpLevel::Minor => VersionTag::official(self.major, self.minor + 1, 0),
            BumpLevel::Major => VersionTag::official(self.major + 1, 0, 0),
        }
    }

    /// First provisional trial of this triple for the given merge request.
    pub fn with_origin(&self, origin: u64) -> VersionTag {
        VersionTag {
            trial: 0,
            origin: Some(origin),
            ..*self
        }
    }

    /// The next trial of the same target, keeping the current origin.
    pub fn next_trial(&self) -> VersionTag {
        VersionTag {
            trial: self.trial + 1,
            ..self.clone()
        }
    }

    /// The official tag this provisional build is promoted to. Idempotent:
    /// promoting an official tag returns it unchanged.
    pub fn promoted(&self) -> VersionTag {
        VersionTag::official(self.major, self.minor, self.patch)
    }

    fn order_key(&self) -> (u32, u32, u32, u8, u32, u64) {
        // Officials outrank provisionals of the same triple regardless of the
        // trial count; origin only breaks ties to stay consistent with Eq.
        let official_rank = if self.origin.is_none() { 1 } else { 0 };
        (
            self.major,
            self.minor,
            self.patch,
            official_rank,
            self.trial,
            self.origin.unwrap_or(0),
        )
    }
}

impl Ord for VersionTag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

impl PartialOrd for VersionTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.origin {
            None => write!(f, "v{}.{}.{}", self.major, self.minor, self.patch),
            Some(origin) => write!(
                f,
                "mr{}-v{}.{}.{}.{}",
                origin, self.major, self.minor, self.patch, self.trial
            ),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TagParseError {
    #[error("not a synthflow version tag: {0:?}")]
    Unrecognized(String),

    #[error("invalid number in tag {tag:?}: {component}")]
    BadNumber { tag: String, component: &'static str },
}

impl FromStr for VersionTag {
    type Err = TagParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unrecognized = || TagParseError::Unrecognized(s.to_string());

        let (origin, rest) = match s.strip_prefix("mr") {
            Some(tail) => {
                let (id, rest) = tail.split_once('-').ok_or_else(unrecognized)?;
                let id = id.parse::<u64>().map_err(|_| TagParseError::BadNumber {
                    tag: s.to_string(),
                    component: "origin",
                })?;
                (Some(id), rest)
            }
            None => (None, s),
        };

        let rest = rest.strip_prefix('v').ok_or_else(unrecognized)?;
        let parts: Vec<&str> = rest.split('.').collect();
        let expected = if origin.is_some() { 4 } else { 3 };
        if parts.len() != expected {
            return Err(unrecognized());
        }

        let num = |text: &str, component: &'static str| {
            text.parse::<u32>().map_err(|_| TagParseError::BadNumber {
                tag: s.to_string(),
                component,
            })
        };

        Ok(VersionTag {
            major: num(parts[0], "major")?,
            minor: num(parts[1], "minor")?,
            patch: num(parts[2], "patch")?,
            trial: if origin.is_some() {
                num(parts[3], "trial")?
            } else {
                0
            },
            origin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn official_displays_without_suffix() {
        assert_eq!(VersionTag::official(1, 2, 3).to_string(), "v1.2.3");
    }

    #[test]
    fn provisional_displays_origin_and_trial() {
        let tag = VersionTag::official(1, 3, 0).with_origin(42);
        assert_eq!(tag.to_string(), "mr42-v1.3.0.0");
        assert_eq!(tag.next_trial().to_string(), "mr42-v1.3.0.1");
    }

    #[test]
    fn parse_roundtrips_both_forms() {
        for text in ["v0.0.0", "v12.4.9", "mr7-v1.0.0.0", "mr42-v1.3.0.5"] {
            let tag: VersionTag = text.parse().expect("parse");
            assert_eq!(tag.to_string(), text);
        }
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("1.2.3".parse::<VersionTag>().is_err());
        assert!("v1.2".parse::<VersionTag>().is_err());
        assert!("vx.y.z".parse::<VersionTag>().is_err());
        assert!("mr-v1.2.3.0".parse::<VersionTag>().is_err());
        // official form must not carry a trial component
        assert!("v1.2.3.4".parse::<VersionTag>().is_err());
    }

    #[test]
    fn bump_zeroes_lower_components() {
        let base = VersionTag::official(1, 2, 3);
        assert_eq!(base.bump(BumpLevel::Patch), VersionTag::official(1, 2, 4));
        assert_eq!(base.bump(BumpLevel::Minor), VersionTag::official(1, 3, 0));
        assert_eq!(base.bump(BumpLevel::Major), VersionTag::official(2, 0, 0));
    }

    #[test]
    fn ordering_is_lexicographic_on_triple() {
        let a = VersionTag::official(1, 2, 3);
        let b = VersionTag::official(1, 3, 0);
        let c = VersionTag::official(2, 0, 0);
        assert!(a < b && b < c);
    }

    #[test]
    fn official_outranks_provisional_of_same_triple() {
        let official = VersionTag::official(1, 3, 0);
        let trial5 = VersionTag {
            trial: 5,
            origin: Some(42),
            ..official.clone()
        };
        assert!(official > trial5);
        assert!(trial5 < official);
    }

    #[test]
    fn trials_order_within_a_target() {
        let t0 = VersionTag::official(1, 3, 0).with_origin(42);
        let t1 = t0.next_trial();
        assert!(t0 < t1);
    }

    #[test]
    fn promotion_is_idempotent() {
        let trial = VersionTag::official(1, 3, 0).with_origin(42).next_trial();
        let official = trial.promoted();
        assert_eq!(official, VersionTag::official(1, 3, 0));
        assert_eq!(official.promoted(), official);
    }
}
