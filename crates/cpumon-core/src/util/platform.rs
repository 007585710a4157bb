//! Host platform identity.

use std::fmt;
use std::sync::LazyLock;

/// Cached platform of the running process.
static CURRENT: LazyLock<Option<Platform>> =
    LazyLock::new(|| Platform::from_id(std::env::consts::OS));

/// Operating system family a collector can run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    /// Every known platform, in registry order.
    pub const ALL: [Platform; 3] = [Platform::Linux, Platform::MacOs, Platform::Windows];

    /// Platform the process was compiled for, or `None` for an OS with no
    /// registry entry.
    ///
    /// Resolved once per process.
    pub fn current() -> Option<Platform> {
        *CURRENT
    }

    /// Identifier used in configuration files (`platform.system()` style).
    pub fn as_id(&self) -> &'static str {
        match self {
            Platform::Linux => "Linux",
            Platform::MacOs => "Darwin",
            Platform::Windows => "Windows",
        }
    }

    /// Parses either a `platform.system()` style id or a Rust OS name.
    pub fn from_id(id: &str) -> Option<Platform> {
        match id {
            "Linux" | "linux" => Some(Platform::Linux),
            "Darwin" | "macos" => Some(Platform::MacOs),
            "Windows" | "windows" => Some(Platform::Windows),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_id())
    }
}

/// Id of the running platform, falling back to the Rust OS name when the
/// platform is not in the registry.
pub fn current_platform_id() -> &'static str {
    match Platform::current() {
        Some(p) => p.as_id(),
        None => std::env::consts::OS,
    }
}
