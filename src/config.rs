use std::path::PathBuf;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_WIA_HELPER: &str = "wia-helper.exe";
pub const SETTINGS_FILE: &str = "config.yaml";

/// Process-level settings read once at startup. User-editable settings
/// (API URL, tokens, provider keys) live in the YAML file instead, see
/// [`crate::settings`].
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub settings_path: PathBuf,
    pub openai_base_url: String,
    pub openai_model: String,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub wia_helper: PathBuf,
    /// Browser origin of the desktop GUI. Cross-origin calls from anywhere
    /// else get no CORS grant.
    pub gui_origin: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            settings_path: PathBuf::from(SETTINGS_FILE),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            wia_helper: PathBuf::from(DEFAULT_WIA_HELPER),
            gui_origin: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            settings_path: env_nonempty("PAPERSCAN_CONFIG")
                .map(PathBuf::from)
                .unwrap_or(defaults.settings_path),
            openai_base_url: env_nonempty("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            openai_model: env_nonempty("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            gemini_base_url: env_nonempty("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            gemini_model: env_nonempty("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            wia_helper: env_nonempty("PAPERSCAN_WIA_HELPER")
                .map(PathBuf::from)
                .unwrap_or(defaults.wia_helper),
            gui_origin: env_nonempty("PAPERSCAN_GUI_ORIGIN"),
        }
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_public_providers() {
        let config = AppConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.settings_path, PathBuf::from("config.yaml"));
        assert_eq!(config.openai_model, "gpt-4o-mini");
        assert_eq!(config.gemini_model, "gemini-2.0-flash-exp");
        assert!(config.openai_base_url.starts_with("https://"));
        assert_eq!(config.gui_origin, None);
    }
}
