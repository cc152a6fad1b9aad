use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{CloakError, Result};
use crate::pairing::MIN_CODE_LEN;

const SETTINGS_KEY: &str = "settings.json";

/// How the calculator orders mixed operators.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Precedence {
    /// `* / %` before `+ -`, each level left-associative.
    #[default]
    Standard,
    /// Every operator applied in entry order, like a pocket calculator.
    LeftToRight,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GatewayConfig {
    pub precedence: Precedence,
    pub display_fraction_digits: usize,
    pub pairing_code_len: usize,
    pub keyring_service: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            precedence: Precedence::Standard,
            display_fraction_digits: 8,
            pairing_code_len: 6,
            keyring_service: "CloakCalculator".into(),
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.pairing_code_len < MIN_CODE_LEN {
            return Err(CloakError::malformed(
                SETTINGS_KEY,
                format!("pairing_code_len must be at least {MIN_CODE_LEN}"),
            ));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<GatewayConfig> {
    if !path.exists() {
        return Ok(GatewayConfig::default());
    }
    let data = fs::read(path).map_err(|e| CloakError::read(SETTINGS_KEY, e))?;
    let config: GatewayConfig =
        serde_json::from_slice(&data).map_err(|e| CloakError::malformed(SETTINGS_KEY, e))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(&dir.path().join("settings.json")).unwrap();
        assert_eq!(config, GatewayConfig::default());
        assert_eq!(config.pairing_code_len, 6);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, br#"{"precedence":"left_to_right"}"#).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.precedence, Precedence::LeftToRight);
        assert_eq!(config.display_fraction_digits, 8);
    }

    #[test]
    fn written_settings_load_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let config = GatewayConfig {
            display_fraction_digits: 4,
            pairing_code_len: 8,
            ..GatewayConfig::default()
        };
        fs::write(&path, serde_json::to_vec(&config).unwrap()).unwrap();
        assert_eq!(load_config(&path).unwrap(), config);
    }

    #[test]
    fn short_pairing_code_len_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        for len in [0, 5] {
            fs::write(&path, format!(r#"{{"pairing_code_len":{len}}}"#)).unwrap();
            assert!(matches!(
                load_config(&path),
                Err(CloakError::Malformed { .. })
            ));
        }
    }
}
