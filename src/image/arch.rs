//! CPU architecture canonicalization

use crate::{AavmError, Result};

/// The architectures AAVM knows how to run, in canonical form
pub const CANONICAL_ARCHS: [&str; 3] = ["amd64", "arm32v7", "arm64v8"];

const ARCH_ALIASES: &[(&str, &str)] = &[
    ("arm", "arm32v7"),
    ("arm32v7", "arm32v7"),
    ("armv7l", "arm32v7"),
    ("armhf", "arm32v7"),
    ("x64", "amd64"),
    ("x86_64", "amd64"),
    ("amd64", "amd64"),
    ("Intel 64", "amd64"),
    ("arm64", "arm64v8"),
    ("arm64v8", "arm64v8"),
    ("armv8", "arm64v8"),
    ("aarch64", "arm64v8"),
];

fn unsupported(arch: &str) -> AavmError {
    AavmError::UnsupportedArch {
        arch: arch.to_string(),
        choices: CANONICAL_ARCHS.join(", "),
    }
}

/// Map any known architecture alias to its canonical name
pub fn canonical_arch(arch: &str) -> Result<&'static str> {
    ARCH_ALIASES
        .iter()
        .find(|(alias, _)| *alias == arch)
        .map(|(_, canonical)| *canonical)
        .ok_or_else(|| unsupported(arch))
}

/// Fail unless `arch` is already in canonical form
pub fn assert_canonical_arch(arch: &str) -> Result<()> {
    if CANONICAL_ARCHS.contains(&arch) {
        Ok(())
    } else {
        Err(unsupported(arch))
    }
}

/// Docker platform string (`os/arch[/variant]`) for a canonical architecture
pub fn arch_to_platform(arch: &str) -> Result<&'static str> {
    match canonical_arch(arch)? {
        "amd64" => Ok("linux/amd64"),
        "arm32v7" => Ok("linux/arm/v7"),
        _ => Ok("linux/arm64/v8"),
    }
}
