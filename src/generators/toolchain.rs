//! CMake toolchain file
//!
//! `kiln_toolchain.cmake` is passed to configure as `CMAKE_TOOLCHAIN_FILE`.
//! It pins the build type and compilers, carries architecture and standard
//! library flags, and puts the generators directory first on the package
//! search path so the dependency descriptors are found.

use super::{cmake_path, cmake_quote, write_artifact, GenerateContext, GeneratedArtifact, Generator};
use crate::error::GenerateError;
use crate::settings::{Arch, BuildType, Compiler, Libcxx, Os, Settings};
use async_trait::async_trait;
use std::path::Path;

/// Toolchain file name inside the generators directory
pub const TOOLCHAIN_FILE: &str = "kiln_toolchain.cmake";

/// Version of the toolchain file layout
pub const TOOLCHAIN_FORMAT_VERSION: u32 = 1;

const NAME: &str = "toolchain";

/// Compiler executables overriding the compiler's defaults
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolchainOptions {
    pub cc: Option<String>,
    pub cxx: Option<String>,
}

pub struct ToolchainGenerator {
    options: ToolchainOptions,
}

impl ToolchainGenerator {
    pub fn new(options: ToolchainOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Generator for ToolchainGenerator {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn generate(&self, ctx: &GenerateContext<'_>) -> Result<Vec<GeneratedArtifact>, GenerateError> {
        let build_type = ctx.settings.build_type.unwrap_or_default();
        let content = render(ctx.settings, build_type, &self.options, &ctx.plan.generators_dir);
        let path = ctx.plan.generators_dir.join(TOOLCHAIN_FILE);
        Ok(vec![write_artifact(NAME, path, &content).await?])
    }
}

fn render(settings: &Settings, build_type: BuildType, options: &ToolchainOptions, generators_dir: &Path) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "# kiln toolchain format {}\n# settings: {}\n\n",
        TOOLCHAIN_FORMAT_VERSION, settings
    ));
    out.push_str("include_guard()\n\n");
    out.push_str(&format!(
        "set(CMAKE_BUILD_TYPE {} CACHE STRING \"Build type\" FORCE)\n",
        cmake_quote(build_type.as_str())
    ));

    if let Some(compiler) = settings.compiler {
        let (default_cc, default_cxx) = compiler.default_drivers();
        let cc = options.cc.as_deref().unwrap_or(default_cc);
        let cxx = options.cxx.as_deref().unwrap_or(default_cxx);
        out.push_str(&format!("set(CMAKE_C_COMPILER {})\n", cmake_quote(cc)));
        out.push_str(&format!("set(CMAKE_CXX_COMPILER {})\n", cmake_quote(cxx)));
    } else {
        if let Some(cc) = &options.cc {
            out.push_str(&format!("set(CMAKE_C_COMPILER {})\n", cmake_quote(cc)));
        }
        if let Some(cxx) = &options.cxx {
            out.push_str(&format!("set(CMAKE_CXX_COMPILER {})\n", cmake_quote(cxx)));
        }
    }

    let flags = compile_flags(settings);
    if !flags.is_empty() {
        let joined = flags.join(" ");
        out.push_str(&format!("string(APPEND CMAKE_C_FLAGS_INIT \" {}\")\n", joined));
        out.push_str(&format!("string(APPEND CMAKE_CXX_FLAGS_INIT \" {}\")\n", joined));
    }
    if let Some(libcxx_flag) = settings.compiler.zip(settings.libcxx).and_then(|(c, l)| stdlib_flag(c, l)) {
        out.push_str(&format!("string(APPEND CMAKE_CXX_FLAGS_INIT \" {}\")\n", libcxx_flag));
    }
    if let Some(definition) = settings.libcxx.and_then(abi_definition) {
        out.push_str(&format!("add_compile_definitions({})\n", definition));
    }
    if let (Some(Os::Macos), Some(arch)) = (settings.os, settings.arch) {
        if let Some(osx) = osx_architecture(arch) {
            out.push_str(&format!("set(CMAKE_OSX_ARCHITECTURES {})\n", cmake_quote(osx)));
        }
    }

    let msvc = settings.compiler == Some(Compiler::Msvc);
    let per_type = build_type_flags(build_type, msvc);
    for lang in ["C", "CXX"] {
        out.push_str(&format!(
            "set(CMAKE_{}_FLAGS_{}_INIT {})\n",
            lang,
            build_type.cmake_suffix(),
            cmake_quote(per_type)
        ));
    }

    let generators = cmake_quote(&cmake_path(generators_dir));
    out.push('\n');
    out.push_str(&format!("list(PREPEND CMAKE_PREFIX_PATH {})\n", generators));
    out.push_str(&format!("list(PREPEND CMAKE_MODULE_PATH {})\n", generators));
    out.push_str("set(CMAKE_FIND_PACKAGE_PREFER_CONFIG ON)\n");
    out
}

/// Architecture flags for GCC-style compilers
fn compile_flags(settings: &Settings) -> Vec<&'static str> {
    let gnu = settings.compiler.is_some_and(|c| c.is_gnu_like()) && settings.compiler != Some(Compiler::AppleClang);
    match (gnu, settings.arch) {
        (true, Some(Arch::X86)) => vec!["-m32"],
        (true, Some(Arch::X86_64)) => vec!["-m64"],
        _ => vec![],
    }
}

fn stdlib_flag(compiler: Compiler, libcxx: Libcxx) -> Option<&'static str> {
    match (compiler, libcxx) {
        (Compiler::Clang | Compiler::AppleClang, Libcxx::Libcxx) => Some("-stdlib=libc++"),
        (Compiler::Clang, Libcxx::Libstdcxx | Libcxx::Libstdcxx11) => Some("-stdlib=libstdc++"),
        _ => None,
    }
}

fn abi_definition(libcxx: Libcxx) -> Option<&'static str> {
    match libcxx {
        Libcxx::Libstdcxx => Some("_GLIBCXX_USE_CXX11_ABI=0"),
        Libcxx::Libstdcxx11 => Some("_GLIBCXX_USE_CXX11_ABI=1"),
        Libcxx::Libcxx => None,
    }
}

fn osx_architecture(arch: Arch) -> Option<&'static str> {
    match arch {
        Arch::X86_64 => Some("x86_64"),
        Arch::Armv8 => Some("arm64"),
        _ => None,
    }
}

fn build_type_flags(build_type: BuildType, msvc: bool) -> &'static str {
    match (build_type, msvc) {
        (BuildType::Debug, false) => "-g -O0",
        (BuildType::Release, false) => "-O3 -DNDEBUG",
        (BuildType::RelWithDebInfo, false) => "-O2 -g -DNDEBUG",
        (BuildType::MinSizeRel, false) => "-Os -DNDEBUG",
        (BuildType::Debug, true) => "/Zi /Ob0 /Od /RTC1",
        (BuildType::Release, true) => "/O2 /Ob2 /DNDEBUG",
        (BuildType::RelWithDebInfo, true) => "/Zi /O2 /Ob1 /DNDEBUG",
        (BuildType::MinSizeRel, true) => "/O1 /Ob1 /DNDEBUG",
    }
}
