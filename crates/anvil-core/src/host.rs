//! Host operating-system identification for platform-aware dispatch.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// The closed set of host platforms local execution distinguishes.
///
/// Selected once per invocation and injected; components never branch on
/// `cfg!` themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostOs {
    /// Linux, the BSDs, and anything else following POSIX conventions.
    Posix,
    /// macOS and other Apple platforms with Xcode-style toolchains.
    Darwin,
    /// Windows, with drive-letter paths and `;` separators.
    Windows,
}

impl HostOs {
    /// The platform this process is running on.
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::Darwin
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Posix
        }
    }

    /// Map an OS identifier string to a variant.
    ///
    /// Total: unknown identifiers fall back to POSIX behavior.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "macos" | "darwin" | "osx" => Self::Darwin,
            "windows" | "win32" => Self::Windows,
            _ => Self::Posix,
        }
    }

    /// The path-list separator for this platform.
    pub fn path_separator(self) -> char {
        match self {
            Self::Windows => ';',
            Self::Posix | Self::Darwin => ':',
        }
    }
}

impl Display for HostOs {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::Posix => "posix",
            Self::Darwin => "darwin",
            Self::Windows => "windows",
        };
        write!(formatter, "{name}")
    }
}
