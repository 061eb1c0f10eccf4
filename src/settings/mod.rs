//! Settings model
//!
//! A [`Settings`] value is the concrete build configuration: operating system,
//! compiler (family, version, standard library), build type and architecture.
//! Every axis is a closed enum, so an unrecognized value is rejected at load
//! time instead of reaching the build tool.
//!
//! The digest of a settings value is what keys the on-disk layout and the
//! resolved graph nodes. It is computed over `axis=value` lines sorted by axis
//! name, which keeps it stable across runs and independent of how the raw
//! values were supplied.

pub mod values;

pub use values::{Arch, BuildType, Compiler, Libcxx, Os};

use crate::error::SettingsError;
use crate::recipe::Recipe;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A setting axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Axis {
    Os,
    Compiler,
    CompilerVersion,
    CompilerLibcxx,
    BuildType,
    Arch,
}

impl Axis {
    /// Dotted axis name as written in recipes and on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Self::Os => "os",
            Self::Compiler => "compiler",
            Self::CompilerVersion => "compiler.version",
            Self::CompilerLibcxx => "compiler.libcxx",
            Self::BuildType => "build_type",
            Self::Arch => "arch",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|a| a.name() == s)
    }

    pub fn all() -> &'static [Self] {
        &[
            Self::Os,
            Self::Compiler,
            Self::CompilerVersion,
            Self::CompilerLibcxx,
            Self::BuildType,
            Self::Arch,
        ]
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The set of axes a recipe or package is sensitive to.
///
/// Declaring `compiler` implies `compiler.version`. `compiler.libcxx` is only
/// required when declared explicitly, but it is kept in the relevant subset
/// whenever the compiler is, since it changes the binary ABI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sensitivity {
    axes: BTreeSet<Axis>,
}

impl Sensitivity {
    /// Build from declared axis names (`["os", "compiler", "build_type", "arch"]`)
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, SettingsError> {
        let mut axes = BTreeSet::new();
        for name in names {
            let name = name.as_ref();
            let axis = Axis::parse(name).ok_or_else(|| SettingsError::UnknownAxis(name.to_string()))?;
            axes.insert(axis);
            if axis == Axis::Compiler {
                axes.insert(Axis::CompilerVersion);
            }
        }
        Ok(Self { axes })
    }

    pub fn contains(&self, axis: Axis) -> bool {
        self.axes.contains(&axis)
    }

    /// Whether a value on this axis belongs to the relevant subset
    fn is_relevant(&self, axis: Axis) -> bool {
        self.contains(axis) || (axis == Axis::CompilerLibcxx && self.contains(Axis::Compiler))
    }

    /// Required axes, in axis order
    pub fn axes(&self) -> impl Iterator<Item = Axis> + '_ {
        self.axes.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }
}

/// Concrete build configuration.
///
/// Two values are equal iff every axis value matches; equal settings always
/// produce the same digest and therefore the same layout paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Settings {
    pub os: Option<Os>,
    pub compiler: Option<Compiler>,
    pub compiler_version: Option<String>,
    pub libcxx: Option<Libcxx>,
    pub build_type: Option<BuildType>,
    pub arch: Option<Arch>,
}

impl Settings {
    /// Validate raw `axis -> value` strings against a recipe's declared axes
    pub fn validate(recipe: &Recipe, raw: &BTreeMap<String, String>) -> Result<Self, SettingsError> {
        let settings = Self::parse(raw)?;
        settings.require(&recipe.settings, &recipe.identity.to_string())?;
        Ok(settings)
    }

    /// Parse raw values without checking for required axes.
    ///
    /// `compiler.version` is checked against the selected compiler's table,
    /// so it needs `compiler` to be present in the same map.
    pub fn parse(raw: &BTreeMap<String, String>) -> Result<Self, SettingsError> {
        let mut settings = Settings::default();
        let mut version = None;

        for (key, value) in raw {
            let axis = Axis::parse(key).ok_or_else(|| SettingsError::UnknownAxis(key.clone()))?;
            match axis {
                Axis::Os => settings.os = Some(parse_value(axis, value, Os::parse, Os::allowed)?),
                Axis::Compiler => {
                    settings.compiler = Some(parse_value(axis, value, Compiler::parse, Compiler::allowed)?)
                }
                Axis::CompilerVersion => version = Some(value.trim().to_string()),
                Axis::CompilerLibcxx => {
                    settings.libcxx = Some(parse_value(axis, value, Libcxx::parse, Libcxx::allowed)?)
                }
                Axis::BuildType => {
                    settings.build_type =
                        Some(parse_value(axis, value, BuildType::parse, BuildType::allowed)?)
                }
                Axis::Arch => settings.arch = Some(parse_value(axis, value, Arch::parse, Arch::allowed)?),
            }
        }

        if let Some(version) = version {
            let compiler = settings.compiler.ok_or_else(|| SettingsError::InvalidValue {
                axis: Axis::CompilerVersion.name().to_string(),
                value: version.clone(),
                allowed: "a compiler must be selected first".to_string(),
            })?;
            if !compiler.versions().contains(&version.as_str()) {
                return Err(SettingsError::InvalidValue {
                    axis: Axis::CompilerVersion.name().to_string(),
                    value: version,
                    allowed: compiler.versions().join(", "),
                });
            }
            settings.compiler_version = Some(version);
        }

        Ok(settings)
    }

    /// Check that every axis in `sensitivity` has a value
    pub fn require(&self, sensitivity: &Sensitivity, package: &str) -> Result<(), SettingsError> {
        match sensitivity.axes().find(|axis| self.value(*axis).is_none()) {
            Some(axis) => Err(SettingsError::MissingAxis {
                axis: axis.name().to_string(),
                package: package.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Canonical string value of an axis
    pub fn value(&self, axis: Axis) -> Option<&str> {
        match axis {
            Axis::Os => self.os.map(|v| v.as_str()),
            Axis::Compiler => self.compiler.map(|v| v.as_str()),
            Axis::CompilerVersion => self.compiler_version.as_deref(),
            Axis::CompilerLibcxx => self.libcxx.map(|v| v.as_str()),
            Axis::BuildType => self.build_type.map(|v| v.as_str()),
            Axis::Arch => self.arch.map(|v| v.as_str()),
        }
    }

    /// The subset of these settings a package with `sensitivity` cares about
    pub fn restrict(&self, sensitivity: &Sensitivity) -> Settings {
        let keep = |axis: Axis| sensitivity.is_relevant(axis);
        Settings {
            os: self.os.filter(|_| keep(Axis::Os)),
            compiler: self.compiler.filter(|_| keep(Axis::Compiler)),
            compiler_version: self
                .compiler_version
                .clone()
                .filter(|_| keep(Axis::CompilerVersion)),
            libcxx: self.libcxx.filter(|_| keep(Axis::CompilerLibcxx)),
            build_type: self.build_type.filter(|_| keep(Axis::BuildType)),
            arch: self.arch.filter(|_| keep(Axis::Arch)),
        }
    }

    /// Set axis values, sorted by axis name
    pub fn entries(&self) -> BTreeMap<&'static str, &str> {
        Axis::all()
            .iter()
            .filter_map(|axis| self.value(*axis).map(|v| (axis.name(), v)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Stable digest over the set axes
    pub fn digest(&self) -> SettingsDigest {
        let mut hasher = Sha256::new();
        for (axis, value) in self.entries() {
            hasher.update(axis.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
        SettingsDigest(hex::encode(hasher.finalize()))
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .entries()
            .into_iter()
            .map(|(axis, value)| format!("{}={}", axis, value))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

fn parse_value<T>(
    axis: Axis,
    value: &str,
    parse: fn(&str) -> Option<T>,
    allowed: fn() -> String,
) -> Result<T, SettingsError> {
    parse(value.trim()).ok_or_else(|| SettingsError::InvalidValue {
        axis: axis.name().to_string(),
        value: value.to_string(),
        allowed: allowed(),
    })
}

/// Hex-encoded SHA-256 digest of a [`Settings`] value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SettingsDigest(String);

impl SettingsDigest {
    /// Length of the short form used in directory names
    pub const SHORT_LEN: usize = 12;

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters
    pub fn short(&self) -> &str {
        &self.0[..Self::SHORT_LEN]
    }
}

impl fmt::Display for SettingsDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
