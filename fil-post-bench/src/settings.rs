use anyhow::Result;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

const SETTINGS_PATH: &str = "./post-bench.config.toml";
const PREFIX: &str = "POST_BENCH";

/// Which sectors are requested from the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryFilter {
    /// All sectors of the miner, the placeholder is the miner's first sector.
    All,
    /// Only the requested sectors, the placeholder is the first requested sector that is on
    /// chain.
    Requested,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Lotus style `[TOKEN:]MULTIADDR` of the storage miner API.
    pub miner_api_info: String,
    /// Lotus style `[TOKEN:]MULTIADDR` of the full node API.
    pub fullnode_api_info: String,
    /// Miner address used when none is given on the command line.
    pub actor: Option<String>,
    pub query_filter: QueryFilter,
    pub rpc_timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            miner_api_info: "/ip4/127.0.0.1/tcp/2345/http".to_string(),
            fullnode_api_info: "/ip4/127.0.0.1/tcp/1234/http".to_string(),
            actor: None,
            query_filter: QueryFilter::All,
            rpc_timeout_secs: None,
        }
    }
}

impl Settings {
    /// Reads `./post-bench.config.toml` (if present) and `POST_BENCH_*` environment variables on
    /// top of the defaults.
    pub fn new() -> Result<Settings> {
        Ok(Self::load(SETTINGS_PATH)?)
    }

    fn load(path: &str) -> Result<Settings, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix(PREFIX))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let settings = Settings::load(path.to_str().unwrap()).unwrap();
        assert_eq!(settings.query_filter, QueryFilter::All);
        assert_eq!(settings.fullnode_api_info, "/ip4/127.0.0.1/tcp/1234/http");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("post-bench.config.toml");
        fs::write(
            &path,
            "actor = \"f01000\"\nquery_filter = \"requested\"\nrpc_timeout_secs = 600\n",
        )
        .unwrap();

        let settings = Settings::load(path.to_str().unwrap()).unwrap();
        assert_eq!(settings.actor.as_deref(), Some("f01000"));
        assert_eq!(settings.query_filter, QueryFilter::Requested);
        assert_eq!(settings.rpc_timeout_secs, Some(600));
        assert_eq!(settings.miner_api_info, "/ip4/127.0.0.1/tcp/2345/http");
    }
}
