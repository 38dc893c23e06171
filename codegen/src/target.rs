//! Target triple parsing and validation.
//!
//! A target is spelled `<arch>-<bits>-<os>[-feature]*`, e.g.
//! `x86-64-linux-avx2` or `arm-64-android-gpu`. Unknown architectures,
//! word sizes, operating systems or features are rejected outright.

use std::str::FromStr;

use snafu::ensure;

use crate::error::{self, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::EnumIter, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Arch {
    X86,
    Arm,
    Wasm,
    Hexagon,
    Riscv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::EnumIter, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Os {
    Linux,
    Osx,
    Windows,
    Android,
    Ios,
    Wasm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::EnumIter, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum TargetFeature {
    // SIMD ISAs
    Sse41,
    Avx2,
    Avx512,
    Neon,
    Simd128,
    // Accelerators
    Gpu,
    Hvx,
}

impl TargetFeature {
    pub fn is_simd(&self) -> bool {
        matches!(self, Self::Sse41 | Self::Avx2 | Self::Avx512 | Self::Neon | Self::Simd128)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub arch: Arch,
    pub bits: u8,
    pub os: Os,
    pub features: Vec<TargetFeature>,
}

impl Target {
    /// The host-shaped default used by JIT compilation.
    pub fn host() -> Self {
        Self { arch: Arch::X86, bits: 64, os: Os::Linux, features: vec![TargetFeature::Avx2] }
    }

    pub fn has_feature(&self, feature: TargetFeature) -> bool {
        self.features.contains(&feature)
    }

    pub fn supports_gpu(&self) -> bool {
        self.has_feature(TargetFeature::Gpu)
    }

    /// Widest natural vector width in lanes of 32-bit elements.
    pub fn natural_vector_lanes(&self) -> u16 {
        if self.has_feature(TargetFeature::Avx512) {
            16
        } else if self.has_feature(TargetFeature::Avx2) {
            8
        } else if self.has_feature(TargetFeature::Sse41)
            || self.has_feature(TargetFeature::Neon)
            || self.has_feature(TargetFeature::Simd128)
        {
            4
        } else {
            1
        }
    }
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split('-');
        let (Some(arch), Some(bits), Some(os)) = (parts.next(), parts.next(), parts.next()) else {
            return error::MalformedTargetSnafu {
                target: s.to_string(),
                message: "expected <arch>-<bits>-<os>".to_string(),
            }
            .fail();
        };
        let arch = Arch::from_str(arch).map_err(|_| Error::MalformedTarget {
            target: s.to_string(),
            message: format!("unknown architecture {arch:?}"),
        })?;
        let bits: u8 = bits.parse().map_err(|_| Error::MalformedTarget {
            target: s.to_string(),
            message: format!("bad word size {bits:?}"),
        })?;
        ensure!(
            bits == 32 || bits == 64,
            error::MalformedTargetSnafu {
                target: s.to_string(),
                message: format!("word size must be 32 or 64, got {bits}"),
            }
        );
        let os = Os::from_str(os).map_err(|_| Error::MalformedTarget {
            target: s.to_string(),
            message: format!("unknown os {os:?}"),
        })?;
        let features = parts
            .map(|f| {
                TargetFeature::from_str(f).map_err(|_| Error::MalformedTarget {
                    target: s.to_string(),
                    message: format!("unknown feature {f:?}"),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Target { arch, bits, os, features })
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.arch, self.bits, self.os)?;
        for feature in &self.features {
            write!(f, "-{feature}")?;
        }
        Ok(())
    }
}
