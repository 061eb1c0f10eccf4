//! Requirement specifiers
//!
//! A requirement names an upstream package and optionally constrains its
//! version. Three spellings are accepted:
//!
//! - `fmt/10.1.0` pins an exact version (`=10.1.0`)
//! - `fmt>=10.0,<11.0` (spaces allowed) is a semver range
//! - `fmt` accepts any version

use crate::error::ResolveError;
use semver::{Version, VersionReq};
use std::fmt;

/// A version constraint, keeping the text it was written as for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    req: VersionReq,
    text: String,
}

impl VersionConstraint {
    /// Constraint that accepts every version
    pub fn any() -> Self {
        Self {
            req: VersionReq::STAR,
            text: "*".to_string(),
        }
    }

    /// Parse a semver range such as `>=10.0, <11.0`
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        if text.is_empty() || text == "*" {
            return Ok(Self::any());
        }
        let req = VersionReq::parse(text).map_err(|e| e.to_string())?;
        Ok(Self {
            req,
            text: text.to_string(),
        })
    }

    /// Constraint matching exactly one version
    pub fn exact(version: &Version) -> Self {
        let text = format!("={}", version);
        Self {
            req: VersionReq::parse(&text).unwrap_or(VersionReq::STAR),
            text,
        }
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.req.matches(version)
    }

    pub fn is_any(&self) -> bool {
        self.req == VersionReq::STAR
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A declared requirement on another package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementSpec {
    pub name: String,
    pub constraint: VersionConstraint,
}

impl RequirementSpec {
    /// Parse a requirement specifier (see module docs for accepted forms)
    pub fn parse(spec: &str) -> Result<Self, ResolveError> {
        let invalid = |reason: String| ResolveError::InvalidRequirement {
            spec: spec.to_string(),
            reason,
        };

        let trimmed = spec.trim();
        let split = trimmed
            .find(|c: char| !is_name_char(c))
            .unwrap_or(trimmed.len());
        let (name, rest) = trimmed.split_at(split);
        validate_package_name(name).map_err(invalid)?;

        let rest = rest.trim();
        let constraint = if let Some(pinned) = rest.strip_prefix('/') {
            let version = parse_version(pinned).map_err(invalid)?;
            VersionConstraint::exact(&version)
        } else {
            VersionConstraint::parse(rest).map_err(invalid)?
        };

        Ok(Self {
            name: name.to_string(),
            constraint,
        })
    }
}

impl fmt::Display for RequirementSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.constraint.is_any() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}{}", self.name, self.constraint)
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'
}

/// Validate that a package name is usable as a single path component.
pub fn validate_package_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("package name cannot be empty".to_string());
    }
    if name.starts_with('.') {
        return Err(format!("package name '{}' must not start with '.'", name));
    }
    if !name.chars().all(is_name_char) {
        return Err(format!(
            "package name '{}' must contain only alphanumeric characters, '-', '_' or '.'",
            name
        ));
    }
    Ok(())
}

/// Parse a package version, padding missing minor/patch components.
///
/// Index entries are often written as `1.46` or `10`; those are read as
/// `1.46.0` and `10.0.0`.
pub fn parse_version(text: &str) -> Result<Version, String> {
    let text = text.trim();
    if let Ok(version) = Version::parse(text) {
        return Ok(version);
    }

    let (core, suffix) = match text.find(['-', '+']) {
        Some(pos) => text.split_at(pos),
        None => (text, ""),
    };
    let parts = core.split('.').count();
    let padded = match parts {
        1 => format!("{}.0.0{}", core, suffix),
        2 => format!("{}.0{}", core, suffix),
        _ => text.to_string(),
    };
    Version::parse(&padded).map_err(|e| format!("invalid version '{}': {}", text, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn parse_exact_reference() {
        let req = RequirementSpec::parse("fmt/10.1.0").unwrap();
        assert_eq!(req.name, "fmt");
        assert!(req.constraint.matches(&v("10.1.0")));
        assert!(!req.constraint.matches(&v("10.2.0")));
        assert_eq!(req.to_string(), "fmt=10.1.0");
    }

    #[test]
    fn parse_range() {
        let req = RequirementSpec::parse("fmt>=10.0,<11.0").unwrap();
        assert_eq!(req.name, "fmt");
        assert!(req.constraint.matches(&v("10.2.0")));
        assert!(!req.constraint.matches(&v("11.0.0")));
        assert!(!req.constraint.matches(&v("9.1.0")));
    }

    #[test]
    fn parse_range_with_spaces() {
        let req = RequirementSpec::parse("libuv >=1.40, <2.0").unwrap();
        assert_eq!(req.name, "libuv");
        assert!(req.constraint.matches(&v("1.46.0")));
    }

    #[test]
    fn parse_bare_name_is_any() {
        let req = RequirementSpec::parse("zlib").unwrap();
        assert!(req.constraint.is_any());
        assert!(req.constraint.matches(&v("0.0.1")));
        assert_eq!(req.to_string(), "zlib");
    }

    #[test]
    fn parse_rejects_bad_names_and_ranges() {
        assert!(RequirementSpec::parse("").is_err());
        assert!(RequirementSpec::parse(">=1.0").is_err());
        assert!(RequirementSpec::parse("../etc/1.0").is_err());
        assert!(RequirementSpec::parse("fmt>=banana").is_err());
        assert!(RequirementSpec::parse("fmt/not-a-version").is_err());
    }

    #[test]
    fn parse_version_pads_components() {
        assert_eq!(parse_version("1.46").unwrap(), v("1.46.0"));
        assert_eq!(parse_version("10").unwrap(), v("10.0.0"));
        assert_eq!(parse_version("1.2-rc1").unwrap(), v("1.2.0-rc1"));
        assert_eq!(parse_version("1.2.3+build5").unwrap(), v("1.2.3+build5"));
        assert!(parse_version("one.two").is_err());
    }

    #[test]
    fn validate_package_name_rules() {
        assert!(validate_package_name("libuv").is_ok());
        assert!(validate_package_name("boost_system").is_ok());
        assert!(validate_package_name("abseil-cpp").is_ok());
        assert!(validate_package_name(".hidden").is_err());
        assert!(validate_package_name("foo/bar").is_err());
        assert!(validate_package_name("hello world").is_err());
    }
}
