//! Recognized setting values
//!
//! Each axis has a closed set of values. Parsing is case-insensitive and
//! normalizes to the canonical spelling, so `linux` and `Linux` produce the
//! same digest.

use std::fmt;

/// Declares a closed value enum with canonical spellings.
macro_rules! setting_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Canonical spelling
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            /// All recognized values in declaration order
            pub fn all() -> &'static [Self] {
                &[$(Self::$variant),+]
            }

            /// Parse a value, ignoring ASCII case
            pub fn parse(s: &str) -> Option<Self> {
                Self::all()
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s))
            }

            /// Comma-separated list of recognized values (for error messages)
            pub fn allowed() -> String {
                Self::all()
                    .iter()
                    .map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

setting_enum! {
    /// Target operating system
    Os {
        Linux => "Linux",
        Macos => "Macos",
        Windows => "Windows",
        FreeBsd => "FreeBSD",
    }
}

setting_enum! {
    /// Compiler family
    Compiler {
        Gcc => "gcc",
        Clang => "clang",
        AppleClang => "apple-clang",
        Msvc => "msvc",
    }
}

setting_enum! {
    /// C++ standard library flavor
    Libcxx {
        Libstdcxx => "libstdc++",
        Libstdcxx11 => "libstdc++11",
        Libcxx => "libc++",
    }
}

setting_enum! {
    /// CMake-style build type
    BuildType {
        Debug => "Debug",
        Release => "Release",
        RelWithDebInfo => "RelWithDebInfo",
        MinSizeRel => "MinSizeRel",
    }
}

setting_enum! {
    /// Target architecture
    Arch {
        X86 => "x86",
        X86_64 => "x86_64",
        Armv7 => "armv7",
        Armv8 => "armv8",
    }
}

impl Compiler {
    /// Recognized `compiler.version` values for this compiler
    pub fn versions(&self) -> &'static [&'static str] {
        match self {
            Self::Gcc => &["9", "10", "11", "12", "13", "14"],
            Self::Clang => &["13", "14", "15", "16", "17", "18"],
            Self::AppleClang => &["14", "15", "16"],
            Self::Msvc => &["192", "193", "194"],
        }
    }

    /// Default C and C++ driver executables
    pub fn default_drivers(&self) -> (&'static str, &'static str) {
        match self {
            Self::Gcc => ("gcc", "g++"),
            Self::Clang | Self::AppleClang => ("clang", "clang++"),
            Self::Msvc => ("cl", "cl"),
        }
    }

    /// Whether the compiler accepts GCC-style command-line flags
    pub fn is_gnu_like(&self) -> bool {
        !matches!(self, Self::Msvc)
    }
}

impl Default for BuildType {
    fn default() -> Self {
        Self::Release
    }
}

impl BuildType {
    /// Upper-case form used in CMake variable names (`CMAKE_CXX_FLAGS_RELEASE`)
    pub fn cmake_suffix(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Release => "RELEASE",
            Self::RelWithDebInfo => "RELWITHDEBINFO",
            Self::MinSizeRel => "MINSIZEREL",
        }
    }
}

impl Arch {
    /// `CMAKE_SYSTEM_PROCESSOR` value
    pub fn processor(&self) -> &'static str {
        match self {
            Self::X86 => "x86",
            Self::X86_64 => "x86_64",
            Self::Armv7 => "armv7",
            Self::Armv8 => "aarch64",
        }
    }
}
