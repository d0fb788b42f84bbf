//! Application configuration for provider based tools.
//!
//! Configuration comes from an optional JSON file and is then overridden by
//! `OXR_*` environment variables.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::helpers::split_list;

pub const ENV_APP_NAME: &str = "OXR_APP_NAME";
pub const ENV_EXTENSIONS: &str = "OXR_EXTENSIONS";
pub const ENV_API_LAYERS: &str = "OXR_API_LAYERS";
pub const ENV_REFERENCE_SPACE: &str = "OXR_REFERENCE_SPACE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app_name: String,
    pub app_version: u32,
    pub engine_name: String,
    pub engine_version: u32,
    /// Wishlist of extensions; filtered against the runtime before init.
    pub extensions: Vec<String>,
    pub api_layers: Vec<String>,
    /// `local`, `stage`, `view` or `local_floor`.
    pub reference_space: String,
    /// `primary_mono` or `primary_stereo`.
    pub view_configuration: String,
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "oxr-app".to_string(),
            app_version: 1,
            engine_name: "oxr-provider".to_string(),
            engine_version: 1,
            extensions: Vec::new(),
            api_layers: Vec::new(),
            reference_space: "local".to_string(),
            view_configuration: "primary_stereo".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Applies `OXR_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Applies overrides using `lookup` in place of the process environment.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup(ENV_APP_NAME) {
            self.app_name = name;
        }
        if let Some(list) = lookup(ENV_EXTENSIONS) {
            self.extensions = split_list(&list);
        }
        if let Some(list) = lookup(ENV_API_LAYERS) {
            self.api_layers = split_list(&list);
        }
        if let Some(space) = lookup(ENV_REFERENCE_SPACE) {
            self.reference_space = space.trim().to_ascii_lowercase();
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.app_name.trim().is_empty() {
            return Err(Error::config("app_name must not be empty"));
        }
        // OpenXR caps application and engine names at 128 bytes including the nul.
        if self.app_name.len() >= 128 || self.engine_name.len() >= 128 {
            return Err(Error::config("app_name and engine_name must be shorter than 128 bytes"));
        }
        match self.reference_space.as_str() {
            "local" | "stage" | "view" | "local_floor" => {}
            other => return Err(Error::config(format!("unknown reference space '{other}'"))),
        }
        match self.view_configuration.as_str() {
            "primary_mono" | "primary_stereo" => Ok(()),
            other => Err(Error::config(format!("unknown view configuration '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reference_space, "local");
    }

    #[test]
    fn test_from_json_partial_uses_defaults() {
        let config = AppConfig::from_json(
            r#"{"app_name":"demo","extensions":["XR_EXT_hand_tracking"]}"#,
        )
        .unwrap();
        assert_eq!(config.app_name, "demo");
        assert_eq!(config.extensions, vec!["XR_EXT_hand_tracking"]);
        assert_eq!(config.view_configuration, "primary_stereo");
    }

    #[test]
    fn test_from_json_rejects_unknown_space() {
        let err = AppConfig::from_json(r#"{"reference_space":"ceiling"}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let err = AppConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_APP_NAME, "override"),
            (ENV_EXTENSIONS, "XR_FB_passthrough, XR_KHR_visibility_mask"),
            (ENV_REFERENCE_SPACE, " STAGE "),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_env_from(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.app_name, "override");
        assert_eq!(
            config.extensions,
            vec!["XR_FB_passthrough", "XR_KHR_visibility_mask"]
        );
        assert_eq!(config.reference_space, "stage");
        assert!(config.api_layers.is_empty());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = AppConfig::load("/nonexistent/oxr-config.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
