//! Layered configuration.
//!
//! Values are resolved in a fixed order, later layers overriding earlier ones:
//!
//! 1. built-in defaults ([`Config::default`]),
//! 2. the TOML config file, if present,
//! 3. environment variables prefixed with `PIXTAG_`, with `__` separating
//!    nested keys (`PIXTAG_STORE__MAX_CONNECTIONS=8`).
//!
//! Command line flags sit above all of these; see [`first_present`].

pub mod error;

use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ErrorKind, Result};

pub const ENV_PREFIX: &str = "PIXTAG_";
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root directory for the cache stores. Defaults to the platform cache directory.
    pub cache_dir: Option<PathBuf>,
    pub store: StoreConfig,
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub busy_timeout_ms: u64,
    pub max_connections: u32,
}
impl Default for StoreConfig {
    fn default() -> Self {
        Self { busy_timeout_ms: 1500, max_connections: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// `None` leaves concurrency unbounded.
    pub max_in_flight: Option<usize>,
    pub shutdown_grace_ms: u64,
}
impl Default for FetchConfig {
    fn default() -> Self {
        Self { max_in_flight: None, shutdown_grace_ms: 60_000 }
    }
}

/// Where configuration is read from, besides the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sources {
    /// A missing file contributes nothing; it is not an error.
    pub file: Option<PathBuf>,
    pub env_prefix: String,
}
impl Default for Sources {
    fn default() -> Self {
        Self { file: None, env_prefix: ENV_PREFIX.to_string() }
    }
}
impl Sources {
    /// Use `file` if given, otherwise the platform config file.
    pub fn discover(file: Option<PathBuf>) -> Self {
        let file = first_present([file, project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))]);
        Self { file, ..Self::default() }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "pixtag", "pixtag")
}

impl Config {
    /// Merge every layer without reading anything yet.
    pub fn figment(sources: &Sources) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = &sources.file {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(&sources.env_prefix).split("__"))
    }

    /// Extract and validate a configuration.
    pub fn extract(figment: &Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(sources: &Sources) -> Result<Self> {
        let config = Self::extract(&Self::figment(sources))?;
        tracing::debug!(file = ?sources.file, "Loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.store.max_connections == 0 {
            exn::bail!(ErrorKind::Invalid("store.max_connections must be at least 1"));
        }
        if self.fetch.max_in_flight == Some(0) {
            exn::bail!(ErrorKind::Invalid("fetch.max_in_flight must be at least 1"));
        }
        Ok(())
    }

    /// The configured cache root, or the platform cache directory.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(project_dirs().ok_or_raise(|| ErrorKind::NoHomeDirectory)?.cache_dir().to_path_buf()),
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.store.busy_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.fetch.shutdown_grace_ms)
    }
}

/// The first value that is present, in priority order.
///
/// ```
/// # use pixtag_config::first_present;
/// let flag = None;
/// let configured = Some(4);
/// assert_eq!(first_present([flag, configured, Some(1)]), Some(4));
/// ```
pub fn first_present<T>(candidates: impl IntoIterator<Item = Option<T>>) -> Option<T> {
    candidates.into_iter().flatten().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    fn sources(file: Option<&str>) -> Sources {
        Sources { file: file.map(PathBuf::from), env_prefix: ENV_PREFIX.to_string() }
    }

    #[test]
    fn test_defaults() {
        Jail::expect_with(|_jail| {
            let config = Config::load(&sources(None)).unwrap();
            assert_eq!(config, Config::default());
            assert_eq!(config.busy_timeout(), Duration::from_millis(1500));
            assert_eq!(config.shutdown_grace(), Duration::from_secs(60));
            assert_eq!(config.fetch.max_in_flight, None);
            Ok(())
        });
    }

    #[test]
    fn test_file_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "pixtag.toml",
                r#"
                    cache_dir = "/var/cache/pixtag"

                    [store]
                    max_connections = 2

                    [fetch]
                    max_in_flight = 16
                "#,
            )?;
            let config = Config::load(&sources(Some("pixtag.toml"))).unwrap();
            assert_eq!(config.cache_dir().unwrap(), PathBuf::from("/var/cache/pixtag"));
            assert_eq!(config.store.max_connections, 2);
            assert_eq!(config.store.busy_timeout_ms, 1500);
            assert_eq!(config.fetch.max_in_flight, Some(16));
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("pixtag.toml", "[store]\nmax_connections = 2\nbusy_timeout_ms = 100\n")?;
            jail.set_env("PIXTAG_STORE__MAX_CONNECTIONS", "9");
            jail.set_env("PIXTAG_FETCH__SHUTDOWN_GRACE_MS", "250");
            let config = Config::load(&sources(Some("pixtag.toml"))).unwrap();
            assert_eq!(config.store.max_connections, 9);
            assert_eq!(config.store.busy_timeout_ms, 100);
            assert_eq!(config.shutdown_grace(), Duration::from_millis(250));
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_is_ignored() {
        Jail::expect_with(|_jail| {
            let config = Config::load(&sources(Some("does-not-exist.toml"))).unwrap();
            assert_eq!(config, Config::default());
            Ok(())
        });
    }

    #[rstest]
    #[case("[store]\nmax_connections = 0\n")]
    #[case("[fetch]\nmax_in_flight = 0\n")]
    fn test_rejects_zero_limits(#[case] contents: &str) {
        Jail::expect_with(|jail| {
            jail.create_file("pixtag.toml", contents)?;
            let err = Config::load(&sources(Some("pixtag.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Invalid(_)));
            Ok(())
        });
    }

    #[test]
    fn test_malformed_file() {
        Jail::expect_with(|jail| {
            jail.create_file("pixtag.toml", "[store]\nmax_connections = \"many\"\n")?;
            let err = Config::load(&sources(Some("pixtag.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Load));
            Ok(())
        });
    }

    #[rstest]
    #[case([None, None, Some(3)], Some(3))]
    #[case([Some(1), None, Some(3)], Some(1))]
    #[case([None, None, None], None)]
    fn test_first_present(#[case] candidates: [Option<u8>; 3], #[case] expected: Option<u8>) {
        assert_eq!(first_present(candidates), expected);
    }

    #[test]
    fn test_discover_prefers_explicit_file() {
        let sources = Sources::discover(Some(PathBuf::from("/etc/pixtag.toml")));
        assert_eq!(sources.file, Some(PathBuf::from("/etc/pixtag.toml")));
        assert_eq!(sources.env_prefix, ENV_PREFIX);
    }
}
