// ============================================================
// Layer 6 — Config Loader
// ============================================================
// Reads the `--config` JSON file into an ExperimentConfig and
// validates it before anything else runs.
//
// Reference: serde_json documentation (from_str)

use std::{fs, path::Path};

use anyhow::{Context, Result};

use crate::domain::config::ExperimentConfig;

pub fn load_config(path: impl AsRef<Path>) -> Result<ExperimentConfig> {
    let path = path.as_ref();
    let raw  = fs::read_to_string(path)
        .with_context(|| format!("Cannot read config file '{}'", path.display()))?;

    let cfg: ExperimentConfig = serde_json::from_str(&raw)
        .with_context(|| format!("Malformed config file '{}'", path.display()))?;

    cfg.validate()
        .with_context(|| format!("Invalid config file '{}'", path.display()))?;

    tracing::debug!("Loaded config from '{}': {:?}", path.display(), cfg);
    Ok(cfg)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_partial_file() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "trainer": "inference", "device": "cpu", "cmap": "coolwarm" }"#).unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.trainer, "inference");
        assert_eq!(cfg.device, crate::domain::config::DeviceKind::Cpu);
        assert_eq!(cfg.cmap, crate::domain::field::Colormap::Coolwarm);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_config("/no/such/config.json").is_err());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "batch_size": 0 }"#).unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ batch_size: 4 ").unwrap();
        assert!(load_config(&path).is_err());
    }
}
