//! Version and constraint model.
//!
//! A version is either a released triple (`1.2.3`, optionally carrying a
//! pre-release tag) or the `head` sentinel meaning "latest trunk". `head`
//! orders above every release. A constraint is an interval over that order,
//! written in manifests as a single operator plus a version (`>=1.0.0`,
//! `~>2.1.0`, ...) or `*` for anything.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("invalid version '{0}'")]
    Version(String),

    #[error("invalid constraint '{0}'")]
    Constraint(String),
}

/// A package version: `head` or a released semver triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Version {
    /// The latest trunk build. Greater than every release.
    Head,
    Release(semver::Version),
}

impl Version {
    pub fn release(major: u64, minor: u64, patch: u64) -> Self {
        Self::Release(semver::Version::new(major, minor, patch))
    }

    pub fn is_head(&self) -> bool {
        matches!(self, Self::Head)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Head, Self::Head) => Ordering::Equal,
            (Self::Head, Self::Release(_)) => Ordering::Greater,
            (Self::Release(_), Self::Head) => Ordering::Less,
            (Self::Release(a), Self::Release(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "head" {
            return Ok(Self::Head);
        }
        semver::Version::parse(s)
            .map(Self::Release)
            .map_err(|_| VersionError::Version(s.to_string()))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Head => write!(f, "head"),
            Self::Release(v) => write!(f, "{v}"),
        }
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A constraint operator as written in a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Exact,
    GreaterEq,
    LessEq,
    Greater,
    Less,
    /// `~>`: at least the given version, below the next minor release.
    Compatible,
}

impl Op {
    fn symbol(self) -> &'static str {
        match self {
            Self::Exact => "==",
            Self::GreaterEq => ">=",
            Self::LessEq => "<=",
            Self::Greater => ">",
            Self::Less => "<",
            Self::Compatible => "~>",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// One end of a version interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub version: Version,
    pub inclusive: bool,
}

impl Bound {
    fn inclusive(version: Version) -> Self {
        Self { version, inclusive: true }
    }

    fn exclusive(version: Version) -> Self {
        Self { version, inclusive: false }
    }
}

/// An interval of versions.
///
/// Manifests only ever contain the `Any` and `Op` forms; `Interval` arises
/// from intersecting edges in the dependency graph, and `Empty` is the
/// absorbing invalid constraint produced by a conflicting intersection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// `*`: any version.
    Any,
    /// A single operator applied to a version, as written in a manifest.
    Op(Op, Version),
    /// An intersection result; at least one bound is present.
    Interval {
        min: Option<Bound>,
        max: Option<Bound>,
    },
    /// The unsatisfiable constraint.
    Empty,
}

impl Constraint {
    pub fn exact(version: Version) -> Self {
        Self::Op(Op::Exact, version)
    }

    /// A constraint is valid iff some version can satisfy it.
    pub fn is_valid(&self) -> bool {
        !self.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Interval { min, max } => bounds_empty(min.as_ref(), max.as_ref()),
            _ => false,
        }
    }

    /// Lower/upper bounds of the interval this constraint denotes.
    fn bounds(&self) -> (Option<Bound>, Option<Bound>) {
        match self {
            Self::Any => (None, None),
            Self::Empty => {
                // An inverted point interval; unreachable through `matches`
                // and `intersect`, which special-case Empty.
                let v = Version::Head;
                (Some(Bound::exclusive(v.clone())), Some(Bound::exclusive(v)))
            }
            Self::Interval { min, max } => (min.clone(), max.clone()),
            Self::Op(op, v) => match op {
                Op::Exact => (
                    Some(Bound::inclusive(v.clone())),
                    Some(Bound::inclusive(v.clone())),
                ),
                Op::GreaterEq => (Some(Bound::inclusive(v.clone())), None),
                Op::Greater => (Some(Bound::exclusive(v.clone())), None),
                Op::LessEq => (None, Some(Bound::inclusive(v.clone()))),
                Op::Less => (None, Some(Bound::exclusive(v.clone()))),
                Op::Compatible => match v {
                    // There is no release "after head"; ~>head pins head.
                    Version::Head => (
                        Some(Bound::inclusive(Version::Head)),
                        Some(Bound::inclusive(Version::Head)),
                    ),
                    Version::Release(r) => (
                        Some(Bound::inclusive(v.clone())),
                        Some(Bound::exclusive(Version::Release(semver::Version::new(
                            r.major,
                            r.minor + 1,
                            0,
                        )))),
                    ),
                },
            },
        }
    }

    /// Whether `version` lies inside this constraint's interval.
    pub fn matches(&self, version: &Version) -> bool {
        if self.is_empty() {
            return false;
        }
        let (min, max) = self.bounds();
        if let Some(b) = min {
            match version.cmp(&b.version) {
                Ordering::Less => return false,
                Ordering::Equal if !b.inclusive => return false,
                _ => {}
            }
        }
        if let Some(b) = max {
            match version.cmp(&b.version) {
                Ordering::Greater => return false,
                Ordering::Equal if !b.inclusive => return false,
                _ => {}
            }
        }
        true
    }

    /// Intersect two constraints.
    ///
    /// Commutative and associative; `Empty` absorbs. The result reuses an
    /// input's written form when it denotes the same interval, so edge
    /// constraints keep their manifest spelling through repeated
    /// intersection.
    pub fn intersect(&self, other: &Constraint) -> Constraint {
        if self.is_empty() || other.is_empty() {
            return Constraint::Empty;
        }

        let (a_min, a_max) = self.bounds();
        let (b_min, b_max) = other.bounds();

        let min = tighter_lower(a_min, b_min);
        let max = tighter_upper(a_max, b_max);

        if bounds_empty(min.as_ref(), max.as_ref()) {
            return Constraint::Empty;
        }

        if (min.clone(), max.clone()) == self.bounds() {
            return self.clone();
        }
        if (min.clone(), max.clone()) == other.bounds() {
            return other.clone();
        }
        match (min, max) {
            (None, None) => Constraint::Any,
            (min, max) => Constraint::Interval { min, max },
        }
    }
}

fn bounds_empty(min: Option<&Bound>, max: Option<&Bound>) -> bool {
    match (min, max) {
        (Some(lo), Some(hi)) => match lo.version.cmp(&hi.version) {
            Ordering::Greater => true,
            Ordering::Equal => !(lo.inclusive && hi.inclusive),
            Ordering::Less => false,
        },
        _ => false,
    }
}

fn tighter_lower(a: Option<Bound>, b: Option<Bound>) -> Option<Bound> {
    match (a, b) {
        (None, b) => b,
        (a, None) => a,
        (Some(a), Some(b)) => Some(match a.version.cmp(&b.version) {
            Ordering::Greater => a,
            Ordering::Less => b,
            // Same version: the exclusive bound is the tighter one.
            Ordering::Equal => {
                if a.inclusive {
                    b
                } else {
                    a
                }
            }
        }),
    }
}

fn tighter_upper(a: Option<Bound>, b: Option<Bound>) -> Option<Bound> {
    match (a, b) {
        (None, b) => b,
        (a, None) => a,
        (Some(a), Some(b)) => Some(match a.version.cmp(&b.version) {
            Ordering::Less => a,
            Ordering::Greater => b,
            Ordering::Equal => {
                if a.inclusive {
                    b
                } else {
                    a
                }
            }
        }),
    }
}

impl FromStr for Constraint {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "*" {
            return Ok(Self::Any);
        }
        let (op, rest) = if let Some(rest) = s.strip_prefix("==") {
            (Op::Exact, rest)
        } else if let Some(rest) = s.strip_prefix(">=") {
            (Op::GreaterEq, rest)
        } else if let Some(rest) = s.strip_prefix("<=") {
            (Op::LessEq, rest)
        } else if let Some(rest) = s.strip_prefix("~>") {
            (Op::Compatible, rest)
        } else if let Some(rest) = s.strip_prefix('>') {
            (Op::Greater, rest)
        } else if let Some(rest) = s.strip_prefix('<') {
            (Op::Less, rest)
        } else {
            return Err(VersionError::Constraint(s.to_string()));
        };
        let version: Version = rest
            .trim_start()
            .parse()
            .map_err(|_| VersionError::Constraint(s.to_string()))?;
        Ok(Self::Op(op, version))
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Op(op, v) => write!(f, "{op}{v}"),
            Self::Empty => write!(f, "(empty)"),
            Self::Interval { min, max } => {
                let mut wrote = false;
                if let Some(b) = min {
                    let op = if b.inclusive { ">=" } else { ">" };
                    write!(f, "{op}{}", b.version)?;
                    wrote = true;
                }
                if let Some(b) = max {
                    if wrote {
                        write!(f, ", ")?;
                    }
                    let op = if b.inclusive { "<=" } else { "<" };
                    write!(f, "{op}{}", b.version)?;
                }
                Ok(())
            }
        }
    }
}

impl Serialize for Constraint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Constraint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn c(s: &str) -> Constraint {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(v("1.2.3"), Version::release(1, 2, 3));
        assert_eq!(v("head"), Version::Head);
        assert!("1.2".parse::<Version>().is_err());
        assert!("latest".parse::<Version>().is_err());
    }

    #[test]
    fn test_head_orders_above_releases() {
        assert!(Version::Head > v("999.0.0"));
        assert!(v("1.2.3") < v("1.2.4"));
        assert!(v("1.2.3") < v("1.10.0"));
    }

    #[test]
    fn test_prerelease_orders_below_release() {
        assert!(v("1.0.0-alpha") < v("1.0.0"));
        assert!(v("1.0.0-alpha") < v("1.0.0-beta"));
    }

    #[test]
    fn test_constraint_parse_roundtrip() {
        for s in ["*", "==1.2.3", ">=1.0.0", "<=2.0.0", ">0.5.0", "<3.0.0", "~>1.2.0", "==head"] {
            assert_eq!(c(s).to_string(), s);
        }
        // Whitespace between op and version is accepted but not preserved.
        assert_eq!(c(">= 1.0.0").to_string(), ">=1.0.0");
        assert!("1.0.0".parse::<Constraint>().is_err());
        assert!("=>1.0.0".parse::<Constraint>().is_err());
    }

    #[test]
    fn test_matches() {
        assert!(c("*").matches(&v("0.0.1")));
        assert!(c("*").matches(&Version::Head));

        assert!(c("==1.2.3").matches(&v("1.2.3")));
        assert!(!c("==1.2.3").matches(&v("1.2.4")));

        assert!(c(">=1.0.0").matches(&v("1.0.0")));
        assert!(c(">=1.0.0").matches(&Version::Head));
        assert!(!c(">1.0.0").matches(&v("1.0.0")));

        assert!(c("<=2.0.0").matches(&v("2.0.0")));
        assert!(!c("<2.0.0").matches(&v("2.0.0")));
        assert!(c("<2.0.0").matches(&v("1.9.9")));
    }

    #[test]
    fn test_compatible_window() {
        let compat = c("~>1.2.3");
        assert!(!compat.matches(&v("1.2.2")));
        assert!(compat.matches(&v("1.2.3")));
        assert!(compat.matches(&v("1.2.9")));
        assert!(!compat.matches(&v("1.3.0")));
        assert!(!compat.matches(&Version::Head));

        let head = c("~>head");
        assert!(head.matches(&Version::Head));
        assert!(!head.matches(&v("1.0.0")));
    }

    #[test]
    fn test_intersect_narrows() {
        let both = c(">=1.0.0").intersect(&c("<2.0.0"));
        assert!(both.matches(&v("1.5.0")));
        assert!(!both.matches(&v("2.0.0")));
        assert!(!both.matches(&v("0.9.0")));
        assert_eq!(both.to_string(), ">=1.0.0, <2.0.0");
    }

    #[test]
    fn test_intersect_keeps_written_form() {
        // A tighter operand comes back verbatim.
        assert_eq!(c(">=1.0.0").intersect(&c(">=2.0.0")), c(">=2.0.0"));
        assert_eq!(c("*").intersect(&c("~>1.2.0")), c("~>1.2.0"));
        assert_eq!(c("==1.5.0").intersect(&c(">=1.0.0")), c("==1.5.0"));
    }

    #[test]
    fn test_intersect_conflict_is_empty() {
        assert!(c(">=2.0.0").intersect(&c("<2.0.0")).is_empty());
        assert!(c("==1.0.0").intersect(&c("==2.0.0")).is_empty());
        // Touching bounds with one exclusive side cannot be satisfied.
        assert!(c(">1.0.0").intersect(&c("<=1.0.0")).is_empty());
        // Touching inclusive bounds leave exactly one version.
        let point = c(">=1.0.0").intersect(&c("<=1.0.0"));
        assert!(point.matches(&v("1.0.0")));
        assert!(!point.matches(&v("1.0.1")));
    }

    #[test]
    fn test_intersect_commutative_associative() {
        let samples = [c("*"), c(">=1.0.0"), c("<2.0.0"), c("~>1.2.0"), c("==1.2.5")];
        for a in &samples {
            for b in &samples {
                let ab = a.intersect(b);
                let ba = b.intersect(a);
                assert_eq!(ab.bounds(), ba.bounds(), "a={a} b={b}");
                for x in &samples {
                    let left = ab.intersect(x);
                    let right = a.intersect(&b.intersect(x));
                    assert_eq!(left.bounds(), right.bounds(), "a={a} b={b} x={x}");
                    assert_eq!(left.is_empty(), right.is_empty());
                }
            }
        }
    }

    #[test]
    fn test_empty_absorbs() {
        for s in ["*", "==1.0.0", ">=0.1.0"] {
            assert!(Constraint::Empty.intersect(&c(s)).is_empty());
            assert!(c(s).intersect(&Constraint::Empty).is_empty());
        }
        assert!(!Constraint::Empty.matches(&v("1.0.0")));
        assert!(!Constraint::Empty.is_valid());
    }
}
