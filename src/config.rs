use anyhow::{Context, Result};
use std::{fs, path::Path, time::Duration};

use crate::session::ViewPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/castify-env";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8081";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub api_base_url: Option<String>,
    pub api_token: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub short_clip_cutoff: Option<f64>,
    pub short_clip_fraction: Option<f64>,
    pub long_form_threshold: Option<f64>,
    pub anti_seek_guard: Option<f64>,
    pub log_filter: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub request_timeout: Option<Duration>,
    pub policy: ViewPolicy,
    pub log_filter: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_token: None,
            request_timeout: None,
            policy: ViewPolicy::default(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str, path: &Path) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("Parsing {key} from {}", path.display()))
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

pub fn read_env_config(path: &Path) -> Result<Option<EnvConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let mut cfg = EnvConfig::default();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some((key, value_raw)) = trimmed.split_once('=') {
            let key = key.trim();
            let value = value_raw.trim().trim_matches('"');
            match key {
                "API_BASE_URL" => cfg.api_base_url = non_empty(value),
                "API_TOKEN" => cfg.api_token = non_empty(value),
                "LOG_FILTER" => cfg.log_filter = non_empty(value),
                "REQUEST_TIMEOUT_SECS" => {
                    cfg.request_timeout_secs = Some(parse_value(key, value, path)?);
                }
                "VIEW_SHORT_CLIP_CUTOFF" => {
                    cfg.short_clip_cutoff = Some(parse_value(key, value, path)?);
                }
                "VIEW_SHORT_CLIP_FRACTION" => {
                    cfg.short_clip_fraction = Some(parse_value(key, value, path)?);
                }
                "VIEW_LONG_FORM_THRESHOLD" => {
                    cfg.long_form_threshold = Some(parse_value(key, value, path)?);
                }
                "VIEW_ANTI_SEEK_GUARD" => {
                    cfg.anti_seek_guard = Some(parse_value(key, value, path)?);
                }
                _ => {}
            }
        }
    }
    Ok(Some(cfg))
}

/// Builds the runtime configuration from an env file. A missing file yields
/// the defaults; a present one is merged over them and its policy validated.
pub fn load_runtime_config_from(path: impl AsRef<Path>) -> Result<RuntimeConfig> {
    let path = path.as_ref();
    let defaults = RuntimeConfig::default();
    let Some(cfg) = read_env_config(path)? else {
        return Ok(defaults);
    };

    let policy = ViewPolicy {
        short_clip_cutoff: cfg
            .short_clip_cutoff
            .unwrap_or(defaults.policy.short_clip_cutoff),
        short_clip_fraction: cfg
            .short_clip_fraction
            .unwrap_or(defaults.policy.short_clip_fraction),
        long_form_threshold: cfg
            .long_form_threshold
            .unwrap_or(defaults.policy.long_form_threshold),
        anti_seek_guard: cfg
            .anti_seek_guard
            .unwrap_or(defaults.policy.anti_seek_guard),
    };
    policy
        .validate()
        .with_context(|| format!("Invalid view policy in {}", path.display()))?;

    Ok(RuntimeConfig {
        api_base_url: cfg.api_base_url.unwrap_or(defaults.api_base_url),
        api_token: cfg.api_token,
        request_timeout: cfg
            .request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs),
        policy,
        log_filter: cfg.log_filter.unwrap_or(defaults.log_filter),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{DEFAULT_ANTI_SEEK_GUARD, DEFAULT_LONG_FORM_THRESHOLD};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    #[test]
    fn read_env_config_extracts_threshold() {
        let cfg = make_config("# tuning\nVIEW_LONG_FORM_THRESHOLD=\"45\"\n\nAPI_TOKEN=\"\"\n");
        let parsed = read_env_config(cfg.path()).unwrap().unwrap();
        assert_eq!(parsed.long_form_threshold, Some(45.0));
        assert_eq!(parsed.api_token, None);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = load_runtime_config_from(dir.path().join("absent")).unwrap();
        assert_eq!(runtime.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(runtime.policy, ViewPolicy::default());
        assert!(runtime.request_timeout.is_none());
    }

    #[test]
    fn load_runtime_config_merges_values() {
        let cfg = make_config(
            "API_BASE_URL=\"https://api.castify.test\"\nAPI_TOKEN=\"abc\"\nREQUEST_TIMEOUT_SECS=\"15\"\nVIEW_ANTI_SEEK_GUARD=\"2.5\"\nLOG_FILTER=\"castify_views=debug\"\n",
        );
        let runtime = load_runtime_config_from(cfg.path()).unwrap();
        assert_eq!(runtime.api_base_url, "https://api.castify.test");
        assert_eq!(runtime.api_token.as_deref(), Some("abc"));
        assert_eq!(runtime.request_timeout, Some(Duration::from_secs(15)));
        assert_eq!(runtime.policy.anti_seek_guard, 2.5);
        assert_eq!(runtime.policy.long_form_threshold, DEFAULT_LONG_FORM_THRESHOLD);
        assert_eq!(runtime.log_filter, "castify_views=debug");
    }

    #[test]
    fn malformed_number_is_an_error() {
        let cfg = make_config("VIEW_ANTI_SEEK_GUARD=\"fast\"\n");
        let err = load_runtime_config_from(cfg.path()).unwrap_err();
        assert!(format!("{err:#}").contains("VIEW_ANTI_SEEK_GUARD"));
    }

    #[test]
    fn invalid_policy_is_rejected() {
        let cfg = make_config("VIEW_ANTI_SEEK_GUARD=\"-1\"\n");
        assert!(load_runtime_config_from(cfg.path()).is_err());
        let ok = make_config(&format!("VIEW_ANTI_SEEK_GUARD=\"{DEFAULT_ANTI_SEEK_GUARD}\"\n"));
        assert!(load_runtime_config_from(ok.path()).is_ok());
    }
}
