//! Facts about the running host, exposed to templates under `chezmoi`.
use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};

/// Detected operating system platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    /// Linux.
    Linux,
    /// macOS.
    Darwin,
    /// Windows.
    Windows,
    /// Anything else, displayed by its Rust OS name.
    Other,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::Darwin => write!(f, "darwin"),
            Self::Windows => write!(f, "windows"),
            Self::Other => write!(f, "{}", std::env::consts::OS),
        }
    }
}

/// Platform information for the current system.
#[derive(Debug, Clone)]
pub struct Platform {
    /// Operating system.
    pub os: Os,
    /// CPU architecture.
    pub arch: String,
    /// Host name including any domain.
    pub full_hostname: String,
    /// Name of the current user.
    pub username: String,
    /// Home directory of the current user.
    pub home_dir: PathBuf,
}

impl Platform {
    /// Detect the current platform.
    #[must_use]
    pub fn detect() -> Self {
        Self {
            os: Self::detect_os(),
            arch: Self::detect_arch().to_string(),
            full_hostname: Self::detect_hostname(),
            username: std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .unwrap_or_default(),
            home_dir: home_dir(),
        }
    }

    /// Hostname up to the first `.`.
    #[must_use]
    pub fn hostname(&self) -> &str {
        self.full_hostname
            .split('.')
            .next()
            .unwrap_or(&self.full_hostname)
    }

    /// Build the `{"chezmoi": {...}}` default template data layer.
    #[must_use]
    pub fn template_data(&self, source_dir: &Path) -> Value {
        json!({
            "chezmoi": {
                "arch": self.arch,
                "fullHostname": self.full_hostname,
                "homedir": self.home_dir.to_string_lossy(),
                "hostname": self.hostname(),
                "os": self.os.to_string(),
                "sourceDir": source_dir.to_string_lossy(),
                "username": self.username,
            }
        })
    }

    const fn detect_os() -> Os {
        if cfg!(target_os = "linux") {
            Os::Linux
        } else if cfg!(target_os = "macos") {
            Os::Darwin
        } else if cfg!(target_os = "windows") {
            Os::Windows
        } else {
            Os::Other
        }
    }

    fn detect_arch() -> &'static str {
        match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "x86" => "386",
            "aarch64" => "arm64",
            other => other,
        }
    }

    fn detect_hostname() -> String {
        std::fs::read_to_string("/etc/hostname")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| std::env::var("COMPUTERNAME").ok())
            .or_else(|| {
                crate::exec::run("hostname", &[])
                    .ok()
                    .map(|r| r.stdout.trim().to_string())
            })
            .unwrap_or_default()
    }
}

/// Return the user's home directory, falling back to `.`.
#[must_use]
pub fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_or_else(|_| PathBuf::from("."), PathBuf::from)
}
