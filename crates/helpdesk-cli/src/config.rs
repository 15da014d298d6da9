//! CLI configuration path handling

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use helpdesk_routing::EngineConfig;

/// Explicit path, else `~/.helpdesk/config.toml`
pub fn resolve_path(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => {
            let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot find home directory"))?;
            Ok(home.join(".helpdesk").join("config.toml"))
        }
    }
}

/// Load the engine configuration, falling back to the default roster
/// when the file does not exist
pub fn load(path: &Path) -> anyhow::Result<EngineConfig> {
    EngineConfig::load_or_default(path).with_context(|| format!("loading {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let path = resolve_path(Some(PathBuf::from("/tmp/custom.toml"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/custom.toml"));
    }

    #[test]
    fn test_missing_file_loads_default_roster() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.agents.len(), 5);
    }

    #[test]
    fn test_broken_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[routing\n").unwrap();
        let err = load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("broken.toml"));
    }
}
