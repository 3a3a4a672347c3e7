// src/interpreter.rs

//! Target interpreter discovery
//!
//! The interpreter's version drives `requires_python` filtering and its
//! marker environment decides which requirements are tracked at all.

use crate::error::{Error, Result};
use crate::marker::MarkerEnvironment;
use crate::version::Version;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Prints the marker variables of the running interpreter as JSON
const PROBE_SCRIPT: &str = r#"
import json, os, platform, sys
impl = sys.implementation
iv = "{0.major}.{0.minor}.{0.micro}".format(impl.version)
if impl.version.releaselevel != "final":
    iv += impl.version.releaselevel[0] + str(impl.version.serial)
print(json.dumps({
    "implementation_name": impl.name,
    "implementation_version": iv,
    "os_name": os.name,
    "platform_machine": platform.machine(),
    "platform_python_implementation": platform.python_implementation(),
    "platform_release": platform.release(),
    "platform_system": platform.system(),
    "platform_version": platform.version(),
    "python_full_version": platform.python_version(),
    "python_version": ".".join(platform.python_version_tuple()[:2]),
    "sys_platform": sys.platform,
}))
"#;

/// Interpreter names tried when none is configured
const DEFAULT_INTERPRETERS: &[&str] = &["python3", "python"];

/// Version and marker environment of the interpreter under test
#[derive(Debug, Clone)]
pub struct Interpreter {
    pub version: Version,
    pub markers: MarkerEnvironment,
}

impl Interpreter {
    /// Ask a real interpreter about itself
    pub fn probe(python: &Path) -> Result<Self> {
        debug!("Probing interpreter {}", python.display());

        let output = Command::new(python)
            .arg("-c")
            .arg(PROBE_SCRIPT)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                Error::InterpreterError(format!("failed to run {}: {}", python.display(), e))
            })?;

        if !output.status.success() {
            return Err(Error::InterpreterError(format!(
                "{} exited with {}: {}",
                python.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Self::from_probe_output(&String::from_utf8_lossy(&output.stdout))
    }

    /// Build from the JSON printed by the probe script
    pub fn from_probe_output(json: &str) -> Result<Self> {
        let markers: MarkerEnvironment = serde_json::from_str(json.trim())?;
        let version = Version::parse(&markers.python_full_version).map_err(|_| {
            Error::InterpreterError(format!(
                "unparseable interpreter version '{}'",
                markers.python_full_version
            ))
        })?;
        Ok(Self { version, markers })
    }

    /// Pretend to be a CPython of `version` on this host, without running anything
    pub fn for_version(version: Version) -> Self {
        let markers = MarkerEnvironment::for_python(&version);
        Self { version, markers }
    }
}

/// Locate the default interpreter on `PATH`
pub fn find_python() -> Result<PathBuf> {
    DEFAULT_INTERPRETERS
        .iter()
        .find_map(|name| which::which(name).ok())
        .ok_or_else(|| {
            Error::InterpreterError(format!(
                "none of {} found on PATH",
                DEFAULT_INTERPRETERS.join(", ")
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_probe_output() {
        let json = r##"{"implementation_name": "cpython", "implementation_version": "3.9.1",
            "os_name": "posix", "platform_machine": "aarch64",
            "platform_python_implementation": "CPython", "platform_release": "6.1",
            "platform_system": "Linux", "platform_version": "#1",
            "python_full_version": "3.9.1", "python_version": "3.9",
            "sys_platform": "linux"}"##;
        let interp = Interpreter::from_probe_output(json).unwrap();
        assert_eq!(interp.version, Version::parse("3.9.1").unwrap());
        assert_eq!(interp.markers.platform_machine, "aarch64");
    }

    #[test]
    fn test_from_probe_output_garbage() {
        assert!(Interpreter::from_probe_output("Traceback (most recent call last)").is_err());
    }

    #[test]
    fn test_for_version() {
        let interp = Interpreter::for_version(Version::parse("3.7").unwrap());
        assert_eq!(interp.markers.python_version, "3.7");
        assert_eq!(interp.markers.python_full_version, "3.7");
    }

    #[test]
    fn test_probe_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let result = Interpreter::probe(&dir.path().join("no-such-python"));
        assert!(matches!(result, Err(Error::InterpreterError(_))));
    }
}
