//! Startup configuration.
//!
//! Sources, highest precedence first:
//! 1. Environment variables (`SLACK_*`, `JENKINS_*`, `RELAY_ALLOW_LIST`)
//! 2. The `[relay]` table of a TOML file
//! 3. Built-in defaults
//!
//! The result is immutable and shared by reference for the life of the process.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::auth::AllowList;
use crate::error::{RelayError, RelayResult};

pub const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_BOT_NAME: &str = "vespa";
pub const DEFAULT_IMAGE_SEARCH_BASE: &str = "http://www.google.com/images";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackCredentials {
    pub bot_token: String,
    pub app_token: String,
}

/// Remote job triggered by the restart command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartTarget {
    pub url: String,
    pub user: String,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub allow_list: AllowList,
    pub exec_timeout: Duration,
    pub bot_name: String,
    pub image_search_base: String,
    pub restart: Option<RestartTarget>,
    pub slack: Option<SlackCredentials>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            allow_list: AllowList::default(),
            exec_timeout: Duration::from_secs(DEFAULT_EXEC_TIMEOUT_SECS),
            bot_name: DEFAULT_BOT_NAME.to_string(),
            image_search_base: DEFAULT_IMAGE_SEARCH_BASE.to_string(),
            restart: None,
            slack: None,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RootConfig {
    #[serde(default)]
    relay: Option<FileConfig>,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct FileConfig {
    pub allow_list: Option<Vec<String>>,
    pub exec_timeout_secs: Option<u64>,
    pub bot_name: Option<String>,
    pub image_search_base: Option<String>,
    pub restart: Option<FileRestartConfig>,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct FileRestartConfig {
    pub url: Option<String>,
}

pub fn load_file_config(path: Option<&Path>) -> RelayResult<Option<FileConfig>> {
    let Some(path) = path else {
        return Ok(None);
    };

    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|err| {
        RelayError::Config(format!("failed to read {}: {err}", path.display()))
    })?;
    let parsed: RootConfig = toml::from_str(&contents).map_err(|err| {
        RelayError::Config(format!("failed to parse {}: {err}", path.display()))
    })?;

    Ok(parsed.relay)
}

impl RelayConfig {
    /// Merge file settings with the environment. `env` is injected so tests can
    /// supply fake credentials.
    pub fn resolve<F>(file: Option<&FileConfig>, env: F) -> RelayResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |name: &str| env(name).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let allow_list = match env("RELAY_ALLOW_LIST") {
            Some(raw) => AllowList::new(
                raw.split(',')
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty()),
            ),
            None => file
                .and_then(|cfg| cfg.allow_list.clone())
                .map(AllowList::new)
                .unwrap_or_default(),
        };

        let exec_timeout_secs = file
            .and_then(|cfg| cfg.exec_timeout_secs)
            .unwrap_or(DEFAULT_EXEC_TIMEOUT_SECS);
        if exec_timeout_secs == 0 {
            return Err(RelayError::Config(
                "exec_timeout_secs must be greater than zero".into(),
            ));
        }

        let bot_name = file
            .and_then(|cfg| cfg.bot_name.clone())
            .unwrap_or(defaults.bot_name);
        let image_search_base = file
            .and_then(|cfg| cfg.image_search_base.clone())
            .unwrap_or(defaults.image_search_base);

        let restart_url = env("JENKINS_RESTART_URL").or_else(|| {
            file.and_then(|cfg| cfg.restart.as_ref())
                .and_then(|restart| restart.url.clone())
        });
        let restart = match (restart_url, env("JENKINS_USER"), env("JENKINS_TOKEN")) {
            (Some(url), Some(user), Some(token)) => Some(RestartTarget { url, user, token }),
            (None, None, None) => None,
            _ => {
                warn!("restart target partially configured; restart command disabled");
                None
            }
        };

        let slack = match (env("SLACK_AUTH_TOKEN"), env("SLACK_APP_TOKEN")) {
            (Some(bot_token), Some(app_token)) => Some(SlackCredentials {
                bot_token,
                app_token,
            }),
            _ => None,
        };

        Ok(Self {
            allow_list,
            exec_timeout: Duration::from_secs(exec_timeout_secs),
            bot_name,
            image_search_base,
            restart,
            slack,
        })
    }

    /// Credentials for the Slack transport; absence is a startup failure.
    pub fn slack_credentials(&self) -> RelayResult<&SlackCredentials> {
        self.slack.as_ref().ok_or_else(|| {
            RelayError::Config("SLACK_AUTH_TOKEN and SLACK_APP_TOKEN must both be set".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_without_sources() {
        let cfg = RelayConfig::resolve(None, env_from(&[])).expect("resolve");
        assert!(cfg.allow_list.is_empty());
        assert_eq!(cfg.exec_timeout, Duration::from_secs(10));
        assert_eq!(cfg.bot_name, "vespa");
        assert!(cfg.restart.is_none());
        assert!(cfg.slack_credentials().is_err());
    }

    #[test]
    fn file_config_is_loaded() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("relay.toml");
        fs::write(
            &path,
            r#"
[relay]
allow_list = ["joe_yang", "tony_luo"]
exec_timeout_secs = 3
bot_name = "ops"

[relay.restart]
url = "https://ci.example.com/job/restart"
"#,
        )
        .expect("write config");

        let file = load_file_config(Some(&path))
            .expect("load")
            .expect("relay table");
        let cfg = RelayConfig::resolve(
            Some(&file),
            env_from(&[("JENKINS_USER", "bot"), ("JENKINS_TOKEN", "t0k")]),
        )
        .expect("resolve");

        assert!(cfg.allow_list.contains("tony_luo"));
        assert_eq!(cfg.exec_timeout, Duration::from_secs(3));
        assert_eq!(cfg.bot_name, "ops");
        let restart = cfg.restart.expect("restart target");
        assert_eq!(restart.url, "https://ci.example.com/job/restart");
        assert_eq!(restart.user, "bot");
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempdir().expect("tempdir");
        let loaded = load_file_config(Some(&dir.path().join("absent.toml"))).expect("load");
        assert!(loaded.is_none());
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("relay.toml");
        fs::write(&path, "[relay\nallow_list = 3").expect("write config");
        let err = load_file_config(Some(&path)).expect_err("should fail");
        assert!(err.is_fatal());
    }

    #[test]
    fn env_allow_list_overrides_file() {
        let file = FileConfig {
            allow_list: Some(vec!["from_file".into()]),
            ..FileConfig::default()
        };
        let cfg = RelayConfig::resolve(
            Some(&file),
            env_from(&[("RELAY_ALLOW_LIST", "alice, bob,,")]),
        )
        .expect("resolve");
        assert!(cfg.allow_list.contains("alice"));
        assert!(cfg.allow_list.contains("bob"));
        assert!(!cfg.allow_list.contains("from_file"));
        assert_eq!(cfg.allow_list.len(), 2);
    }

    #[test]
    fn slack_credentials_require_both_tokens() {
        let cfg = RelayConfig::resolve(None, env_from(&[("SLACK_AUTH_TOKEN", "xoxb-1")]))
            .expect("resolve");
        assert!(cfg.slack_credentials().is_err());

        let cfg = RelayConfig::resolve(
            None,
            env_from(&[("SLACK_AUTH_TOKEN", "xoxb-1"), ("SLACK_APP_TOKEN", "xapp-1")]),
        )
        .expect("resolve");
        assert_eq!(
            cfg.slack_credentials().expect("creds").app_token,
            "xapp-1"
        );
    }

    #[test]
    fn partial_restart_target_is_disabled() {
        let cfg = RelayConfig::resolve(
            None,
            env_from(&[("JENKINS_RESTART_URL", "https://ci"), ("JENKINS_USER", "bot")]),
        )
        .expect("resolve");
        assert!(cfg.restart.is_none());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let file = FileConfig {
            exec_timeout_secs: Some(0),
            ..FileConfig::default()
        };
        assert!(RelayConfig::resolve(Some(&file), env_from(&[])).is_err());
    }
}
