//! Configuration and session storage

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::auth::StoredSession;

const DEFAULT_API_BASE: &str = "https://amaan909-venue-finder.hf.space";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend origin. REST paths and the socket.io endpoint hang off it.
    #[serde(default = "default_api_base")]
    pub api_base_url: String,
    /// Session from the last login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<StoredSession>,
    #[serde(default)]
    pub realtime: RealtimeConfig,
}

/// Reconnection policy of the realtime channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    pub reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            reconnect_attempts: 5,
            reconnect_delay_ms: 1000,
        }
    }
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base(),
            session: None,
            realtime: RealtimeConfig::default(),
        }
    }
}

impl Config {
    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "venue-chat", "venue-chat")
            .context("Could not determine config directory")
    }

    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().to_path_buf())
    }

    /// Get config file path
    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Directory for the TUI log file.
    pub fn data_dir() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir).context("Failed to create config directory")?;

        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config file")?;

        // Set restrictive permissions on config file (contains the session token)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    /// The stored session, unless it has expired.
    pub fn active_session(&self) -> Option<&StoredSession> {
        self.session.as_ref().filter(|s| !s.is_expired())
    }

    /// Like [`Config::active_session`], with the error the commands print.
    pub fn require_session(&self) -> Result<&StoredSession> {
        match &self.session {
            None => anyhow::bail!("Not logged in. Run 'venue-chat login' first."),
            Some(s) if s.is_expired() => {
                anyhow::bail!("Session expired. Run 'venue-chat login'.")
            }
            Some(s) => Ok(s),
        }
    }

    pub fn set_session(&mut self, session: StoredSession) {
        self.session = Some(session);
    }

    pub fn clear_session(&mut self) {
        self.session = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, Session, UserId};

    #[test]
    fn test_defaults_when_empty() {
        let cfg = Config::parse("").unwrap();
        assert_eq!(cfg.api_base_url, DEFAULT_API_BASE);
        assert!(cfg.session.is_none());
        assert_eq!(cfg.realtime.reconnect_attempts, 5);
        assert_eq!(cfg.realtime.reconnect_delay_ms, 1000);
    }

    #[test]
    fn test_session_roundtrip_through_toml() {
        let mut cfg = Config::default();
        cfg.api_base_url = "http://localhost:5000".to_string();
        cfg.realtime.reconnect_attempts = 2;
        cfg.set_session(StoredSession::new(
            "tok".to_string(),
            Session {
                id: UserId(12),
                name: "Ana".to_string(),
                role: Role::Owner,
            },
        ));

        let text = toml::to_string_pretty(&cfg).unwrap();
        let back = Config::parse(&text).unwrap();
        assert_eq!(back.api_base_url, "http://localhost:5000");
        assert_eq!(back.realtime.reconnect_attempts, 2);
        let session = back.active_session().unwrap();
        assert_eq!(session.user.id, UserId(12));
        assert_eq!(session.user.role, Role::Owner);
    }

    #[test]
    fn test_require_session_messages() {
        let cfg = Config::default();
        let err = cfg.require_session().unwrap_err().to_string();
        assert!(err.contains("login"), "{}", err);
    }
}
