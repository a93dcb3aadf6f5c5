//! Host platform and privilege detection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operating systems with trust store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Darwin,
    Windows,
}

impl Platform {
    /// Platform of the running process, if it has backends at all.
    #[must_use]
    pub fn current() -> Option<Self> {
        std::env::consts::OS.parse().ok()
    }

    /// Config identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Darwin => "darwin",
            Self::Windows => "windows",
        }
    }

    /// True if any entry of a target's platform list names this platform.
    ///
    /// Unknown identifiers never match.
    #[must_use]
    pub fn is_listed_in<S: AsRef<str>>(self, platforms: &[S]) -> bool {
        platforms
            .iter()
            .any(|p| p.as_ref().parse::<Self>().is_ok_and(|parsed| parsed == self))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linux" => Ok(Self::Linux),
            "darwin" | "macos" | "osx" => Ok(Self::Darwin),
            "windows" | "win32" => Ok(Self::Windows),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

/// Does the process hold elevated privileges?
///
/// Unix: effective uid is 0. Elsewhere no check is available and this
/// returns false, so `require_root` targets are never registered there.
#[must_use]
pub fn is_elevated() -> bool {
    #[cfg(unix)]
    {
        nix::unistd::geteuid().is_root()
    }
    #[cfg(not(unix))]
    {
        false
    }
}
