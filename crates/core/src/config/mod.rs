use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{BootstrapError, LibrarySpec, Result};

/// Native load chain of the stock Lyricstator deployment. The engine module
/// comes last so it may assume every dependency is already resident.
const DEFAULT_LIBRARY_CHAIN: [&str; 5] = [
    "SDL2",
    "SDL2_mixer",
    "SDL2_ttf",
    "SDL2_image",
    "lyricstator",
];

const DEFAULT_CAPABILITY: &str = "microphone";

/// Top-level configuration for a bootstrap run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub libraries: LibraryConfig,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            libraries: LibraryConfig::default(),
        }
    }
}

impl BootstrapConfig {
    /// Configuration matching the stock Lyricstator deployment.
    pub fn lyricstator_defaults() -> Self {
        Self::default()
    }

    /// Reads a JSON manifest from disk. Fields missing from the manifest keep
    /// their default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Checks the library chain before any component is constructed.
    pub fn validate(&self) -> Result<()> {
        if self.libraries.names.is_empty() {
            return Err(BootstrapError::configuration("library chain is empty"));
        }
        for (index, name) in self.libraries.names.iter().enumerate() {
            if self.libraries.names[..index].contains(name) {
                return Err(BootstrapError::configuration(format!(
                    "library `{name}` appears more than once in the chain"
                )));
            }
        }
        Ok(())
    }

    /// Produces the sequencer input in declared order.
    pub fn library_specs(&self) -> Vec<LibrarySpec> {
        self.libraries
            .names
            .iter()
            .map(|name| LibrarySpec::new(name.as_str()))
            .collect()
    }
}

/// Configuration for the capture-permission request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Capability name forwarded to the host permission subsystem.
    pub capability: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capability: DEFAULT_CAPABILITY.to_string(),
        }
    }
}

/// Configuration for the native load chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Module names in strict load order.
    pub names: Vec<String>,
    /// Directory the library files are resolved from. `None` leaves the
    /// lookup to the platform linker search path.
    pub search_dir: Option<PathBuf>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            names: DEFAULT_LIBRARY_CHAIN.iter().map(|s| s.to_string()).collect(),
            search_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_the_stock_chain() {
        let config = BootstrapConfig::lyricstator_defaults();

        assert_eq!(
            config.libraries.names,
            vec!["SDL2", "SDL2_mixer", "SDL2_ttf", "SDL2_image", "lyricstator"]
        );
        assert_eq!(config.capture.capability, "microphone");
        assert!(config.libraries.search_dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn library_specs_preserve_declared_order() {
        let config = BootstrapConfig::lyricstator_defaults();
        let specs = config.library_specs();

        let names: Vec<_> = specs.iter().map(|spec| spec.name.as_str()).collect();
        assert_eq!(names, config.libraries.names);
        assert!(specs.iter().all(|spec| !spec.loaded));
    }

    #[test]
    fn validate_rejects_empty_chain() {
        let mut config = BootstrapConfig::default();
        config.libraries.names.clear();

        let err = config.validate().unwrap_err();
        assert!(format!("{err}").contains("empty"));
    }

    #[test]
    fn validate_rejects_duplicate_names() {
        let mut config = BootstrapConfig::default();
        config.libraries.names.push("SDL2".to_string());

        let err = config.validate().unwrap_err();
        assert!(format!("{err}").contains("SDL2"));
    }

    #[test]
    fn reads_partial_manifest_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bootstrap.json");
        std::fs::write(
            &path,
            r#"{"libraries": {"names": ["SDL2", "lyricstator"]}}"#,
        )
        .unwrap();

        let config = BootstrapConfig::from_json_file(&path).unwrap();
        assert_eq!(config.libraries.names, vec!["SDL2", "lyricstator"]);
        // Untouched sections keep their defaults.
        assert_eq!(config.capture.capability, "microphone");
    }

    #[test]
    fn malformed_manifest_is_a_manifest_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bootstrap.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = BootstrapConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, BootstrapError::Manifest(_)));
    }

    #[test]
    fn missing_manifest_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.json");

        let err = BootstrapConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, BootstrapError::Io(_)));
    }
}
