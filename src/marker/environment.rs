// src/marker/environment.rs

//! Values of the marker variables for one target interpreter

use crate::version::Version;
use serde::Deserialize;
use std::env::consts;

/// The standard marker variables
///
/// Deserialized from the interpreter probe; field names match the marker
/// variable names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MarkerEnvironment {
    pub implementation_name: String,
    pub implementation_version: String,
    pub os_name: String,
    pub platform_machine: String,
    pub platform_python_implementation: String,
    pub platform_release: String,
    pub platform_system: String,
    pub platform_version: String,
    pub python_full_version: String,
    pub python_version: String,
    pub sys_platform: String,
}

impl MarkerEnvironment {
    /// Synthesize an environment for a CPython of the given version on this host
    pub fn for_python(version: &Version) -> Self {
        let major = version.release.first().copied().unwrap_or(0);
        let minor = version.release.get(1).copied().unwrap_or(0);

        let (os_name, sys_platform, platform_system) = match consts::OS {
            "windows" => ("nt", "win32", "Windows"),
            "macos" => ("posix", "darwin", "Darwin"),
            "linux" => ("posix", "linux", "Linux"),
            "freebsd" => ("posix", "freebsd", "FreeBSD"),
            other => ("posix", other, other),
        };

        Self {
            implementation_name: "cpython".to_string(),
            implementation_version: version.to_string(),
            os_name: os_name.to_string(),
            platform_machine: consts::ARCH.to_string(),
            platform_python_implementation: "CPython".to_string(),
            platform_release: String::new(),
            platform_system: platform_system.to_string(),
            platform_version: String::new(),
            python_full_version: version.to_string(),
            python_version: format!("{major}.{minor}"),
            sys_platform: sys_platform.to_string(),
        }
    }

    /// Look up a variable by its modern name
    pub fn get(&self, name: &str) -> Option<&str> {
        let value = match name {
            "implementation_name" => &self.implementation_name,
            "implementation_version" => &self.implementation_version,
            "os_name" => &self.os_name,
            "platform_machine" => &self.platform_machine,
            "platform_python_implementation" => &self.platform_python_implementation,
            "platform_release" => &self.platform_release,
            "platform_system" => &self.platform_system,
            "platform_version" => &self.platform_version,
            "python_full_version" => &self.python_full_version,
            "python_version" => &self.python_version,
            "sys_platform" => &self.sys_platform,
            "extra" => return Some(""),
            _ => return None,
        };
        Some(value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_python() {
        let env = MarkerEnvironment::for_python(&Version::parse("3.10.2").unwrap());
        assert_eq!(env.python_version, "3.10");
        assert_eq!(env.python_full_version, "3.10.2");
        assert_eq!(env.get("extra"), Some(""));
        assert_eq!(env.get("nonsense"), None);
    }

    #[test]
    fn test_deserialize() {
        let json = r##"{
            "implementation_name": "cpython",
            "implementation_version": "3.8.10",
            "os_name": "posix",
            "platform_machine": "x86_64",
            "platform_python_implementation": "CPython",
            "platform_release": "5.15.0",
            "platform_system": "Linux",
            "platform_version": "#1 SMP",
            "python_full_version": "3.8.10",
            "python_version": "3.8",
            "sys_platform": "linux"
        }"##;
        let env: MarkerEnvironment = serde_json::from_str(json).unwrap();
        assert_eq!(env.get("platform_release"), Some("5.15.0"));
        assert_eq!(env.get("python_version"), Some("3.8"));
    }
}
