//! IACA architecture tags.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TargetError;

/// A microarchitecture generation IACA knows how to model.
///
/// The string form is the value passed to the analyzer's `-arch` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ArchTag {
    /// Haswell.
    Hsw,
    /// Broadwell.
    Bdw,
    /// Skylake (client).
    #[default]
    Skl,
    /// Skylake-SP / Skylake-X.
    Skx,
}

impl ArchTag {
    /// Every supported tag, oldest generation first.
    pub const ALL: [ArchTag; 4] = [ArchTag::Hsw, ArchTag::Bdw, ArchTag::Skl, ArchTag::Skx];

    /// The tag as understood by the analyzer's `-arch` flag.
    pub fn as_str(self) -> &'static str {
        match self {
            ArchTag::Hsw => "HSW",
            ArchTag::Bdw => "BDW",
            ArchTag::Skl => "SKL",
            ArchTag::Skx => "SKX",
        }
    }

    /// LLVM CPU model string.
    pub fn cpu(self) -> &'static str {
        match self {
            ArchTag::Hsw => "haswell",
            ArchTag::Bdw => "broadwell",
            ArchTag::Skl => "skylake",
            ArchTag::Skx => "skylake-avx512",
        }
    }

    /// LLVM feature string enabled on top of the CPU model.
    pub fn features(self) -> &'static str {
        match self {
            ArchTag::Hsw => "+avx2,+fma,+bmi,+bmi2",
            ArchTag::Bdw => "+avx2,+fma,+bmi,+bmi2,+adx",
            ArchTag::Skl => "+avx2,+fma,+bmi,+bmi2,+adx,+clflushopt",
            ArchTag::Skx => "+avx2,+fma,+bmi,+bmi2,+adx,+avx512f,+avx512bw,+avx512dq,+avx512vl",
        }
    }

    /// `(cpu, features)` pair consumed by code generation.
    pub fn codegen(self) -> (&'static str, &'static str) {
        (self.cpu(), self.features())
    }

    fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ArchTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ArchTag {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TargetError::UnsupportedArchitecture {
                tag: s.to_string(),
                supported: Self::supported_list(),
            })
    }
}

impl TryFrom<String> for ArchTag {
    type Error = TargetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ArchTag> for String {
    fn from(tag: ArchTag) -> Self {
        tag.as_str().to_string()
    }
}
