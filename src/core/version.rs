//! Version bump arithmetic

use semver::{Prerelease, Version};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::ReleaseError;

/// Kind of version bump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BumpType {
    Major,
    Minor,
    Patch,
}

impl BumpType {
    pub const ALL: [BumpType; 3] = [BumpType::Major, BumpType::Minor, BumpType::Patch];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Patch => "patch",
        }
    }

    /// Compute the next version.
    ///
    /// A pre-release that already sits on the bumped component is released
    /// as-is instead of being incremented again (`1.2.0-rc.1` + minor is
    /// `1.2.0`). Fails when the bumped component would overflow.
    pub fn apply(&self, current: &Version) -> Result<Version, ReleaseError> {
        let increment = |component: u64| {
            component
                .checked_add(1)
                .ok_or_else(|| ReleaseError::InvalidVersion {
                    version: current.to_string(),
                    message: format!("cannot apply a {} bump", self),
                })
        };
        let is_pre = !current.pre.is_empty();
        let (major, minor, patch) = match self {
            Self::Major => {
                if is_pre && current.minor == 0 && current.patch == 0 {
                    (current.major, 0, 0)
                } else {
                    (increment(current.major)?, 0, 0)
                }
            }
            Self::Minor => {
                if is_pre && current.patch == 0 {
                    (current.major, current.minor, 0)
                } else {
                    (current.major, increment(current.minor)?, 0)
                }
            }
            Self::Patch => {
                if is_pre {
                    (current.major, current.minor, current.patch)
                } else {
                    (current.major, current.minor, increment(current.patch)?)
                }
            }
        };

        let mut next = Version::new(major, minor, patch);
        next.pre = Prerelease::EMPTY;
        Ok(next)
    }
}

impl fmt::Display for BumpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BumpType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "patch" => Ok(Self::Patch),
            other => Err(format!("Invalid bump type: {}", other)),
        }
    }
}

/// Parse a manifest version string
pub fn parse_version(version: &str) -> Result<Version, ReleaseError> {
    Version::parse(version).map_err(|e| ReleaseError::InvalidVersion {
        version: version.to_string(),
        message: e.to_string(),
    })
}

/// The three candidate versions for the current one, labelled for display
pub fn bump_choices(current: &Version) -> Result<Vec<(BumpType, Version)>, ReleaseError> {
    BumpType::ALL
        .iter()
        .map(|b| Ok((*b, b.apply(current)?)))
        .collect()
}

/// `"minor (1.3.0)"`
pub fn format_bump(bump: BumpType, current: &Version) -> Result<String, ReleaseError> {
    Ok(format!("{} ({})", bump, bump.apply(current)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_standard_increments() {
        assert_eq!(BumpType::Major.apply(&v("1.2.3")).unwrap(), v("2.0.0"));
        assert_eq!(BumpType::Minor.apply(&v("1.2.3")).unwrap(), v("1.3.0"));
        assert_eq!(BumpType::Patch.apply(&v("1.2.3")).unwrap(), v("1.2.4"));
        assert_eq!(BumpType::Patch.apply(&v("0.0.0")).unwrap(), v("0.0.1"));
        assert_eq!(BumpType::Minor.apply(&v("0.9.9")).unwrap(), v("0.10.0"));
    }

    #[test]
    fn test_prerelease_increments() {
        assert_eq!(BumpType::Patch.apply(&v("1.2.3-alpha.1")).unwrap(), v("1.2.3"));
        assert_eq!(BumpType::Minor.apply(&v("1.2.0-rc.1")).unwrap(), v("1.2.0"));
        assert_eq!(BumpType::Minor.apply(&v("1.2.3-rc.1")).unwrap(), v("1.3.0"));
        assert_eq!(BumpType::Major.apply(&v("2.0.0-beta")).unwrap(), v("2.0.0"));
        assert_eq!(BumpType::Major.apply(&v("2.1.0-beta")).unwrap(), v("3.0.0"));
    }

    #[test]
    fn test_overflowing_bump_is_rejected() {
        let max = u64::MAX;
        let current = v(&format!("{}.{}.{}", max, max, max));

        for bump in BumpType::ALL {
            assert!(matches!(
                bump.apply(&current),
                Err(ReleaseError::InvalidVersion { .. })
            ));
        }
        assert!(bump_choices(&current).is_err());

        let current = v(&format!("1.{}.0", max));
        assert_eq!(BumpType::Major.apply(&current).unwrap(), v("2.0.0"));
    }

    #[test]
    fn test_build_metadata_is_dropped() {
        assert_eq!(BumpType::Patch.apply(&v("1.0.0+build.5")).unwrap(), v("1.0.1"));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("major".parse::<BumpType>(), Ok(BumpType::Major));
        assert_eq!("patch".parse::<BumpType>(), Ok(BumpType::Patch));
        assert!("huge".parse::<BumpType>().is_err());
    }

    #[test]
    fn test_parse_version_rejects_partial() {
        assert!(parse_version("1.0").is_err());
        assert!(parse_version("1.0.0").is_ok());
    }

    #[test]
    fn test_bump_choices_and_format() {
        let current = v("1.2.3");
        let choices = bump_choices(&current).unwrap();

        assert_eq!(choices.len(), 3);
        assert_eq!(choices[0], (BumpType::Major, v("2.0.0")));
        assert_eq!(format_bump(BumpType::Minor, &current).unwrap(), "minor (1.3.0)");
    }
}
