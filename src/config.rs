//! Local client configuration: where the server is, where the credential
//! cookie lives, how long requests may take. Resolved from flags,
//! environment and an optional TOML file; the server-side configuration is
//! a fetched record (see [`crate::records::RemoteConfig`]).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the booking API, e.g. `http://localhost:1323/data`.
    pub server_url: String,
    pub cookie_file: PathBuf,
    pub request_timeout: Duration,
}

#[cfg(test)]
impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:1323/data".to_string(),
            cookie_file: ".fleetbook-cookie.json".into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// The optional config file. Flags and environment win over it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub server_url: Option<String>,
    pub cookie_file: Option<PathBuf>,
    pub request_timeout: Option<String>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, String> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| format!("cannot read config file {}: {err}", path.display()))?;
        toml::from_str(&raw)
            .map_err(|err| format!("cannot parse config file {}: {err}", path.display()))
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn config_file__should_parse_partial_toml() {
        // When
        let file: ConfigFile = toml::from_str(
            "server_url = \"http://fleet.example/data\"\nrequest_timeout = \"45s\"\n",
        )
        .expect("parse config");

        // Then
        assert_eq!(
            file.server_url.as_deref(),
            Some("http://fleet.example/data")
        );
        assert_eq!(file.request_timeout.as_deref(), Some("45s"));
        assert!(file.cookie_file.is_none());
    }

    #[test]
    fn config_file__should_report_unreadable_paths() {
        // When
        let result = ConfigFile::load(Path::new("/definitely/not/here.toml"));

        // Then
        assert!(result.is_err());
    }
}
