//! Session configuration (§10 AMBIENT STACK).
//!
//! Layered: built-in defaults, an optional `vistle.toml`, then CLI flags
//! and a couple of environment variables named in §6 EXTERNAL INTERFACES.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Base TCP port a hub binds to for its control socket; incremented
/// until a free port is found (§6 CLI surface).
pub const DEFAULT_BASE_PORT: u16 = 31093;

/// Shared-memory allocation retries halve the segment size down to this
/// floor before giving up (§4.1).
pub const SHM_ALLOC_FLOOR: usize = 4096;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataProxyConfig {
    /// Minimum parallel TCP connections opened to a newly-added peer hub.
    pub min_connections: usize,
    /// Maximum parallel TCP connections to a peer hub.
    pub max_connections: usize,
    /// Connect-attempt deadline in seconds, shared across the whole pool.
    pub connect_timeout_secs: u64,
    /// Store-and-forward (true) or streaming (false) payload relay.
    /// §13 Open Question #3: defaults to store-and-forward.
    pub streaming: bool,
}

impl Default for DataProxyConfig {
    fn default() -> Self {
        Self {
            min_connections: 2,
            max_connections: 12,
            connect_timeout_secs: 10,
            streaming: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub base_port: u16,
    pub shm_segment_size: usize,
    pub data_proxy: DataProxyConfig,
    pub archive_version: i32,
    pub log_level: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_port: DEFAULT_BASE_PORT,
            shm_segment_size: 1024 * 1024 * 1024,
            data_proxy: DataProxyConfig::default(),
            archive_version: 1,
            log_level: "info".to_string(),
        }
    }
}

impl SessionConfig {
    /// Load defaults, overlaid by `path` if it exists, overlaid by
    /// environment variables prefixed `VISTLE_` (e.g. `VISTLE_BASE_PORT`).
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&SessionConfig::default())
                .map_err(|e| Error::Config(e.to_string()))?);

        if let Some(path) = path {
            if std::path::Path::new(path).exists() {
                builder = builder.add_source(config::File::with_name(path));
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix("VISTLE").separator("_"),
        );

        let cfg = builder
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        cfg.try_deserialize()
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// True when running under a PBS batch job, which suppresses
    /// automatic UI start-up (§6 ENVIRONMENT VARIABLES).
    pub fn suppress_ui_autostart() -> bool {
        std::env::var("PBS_ENVIRONMENT").as_deref() == Ok("PBS_BATCH")
    }

    /// True when the manager must be built/run for thread-multiple MPI
    /// (§6 ENVIRONMENT VARIABLES).
    pub fn mpi_thread_multiple_required() -> bool {
        std::env::var("MPICH_MAX_THREAD_SAFETY").as_deref() == Ok("multiple")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_constants() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.base_port, DEFAULT_BASE_PORT);
        assert_eq!(cfg.data_proxy.min_connections, 2);
        assert_eq!(cfg.data_proxy.max_connections, 12);
        assert!(!cfg.data_proxy.streaming);
    }

    #[test]
    fn load_without_a_file_falls_back_to_defaults() {
        let cfg = SessionConfig::load(Some("/nonexistent/path.toml")).unwrap();
        assert_eq!(cfg.base_port, DEFAULT_BASE_PORT);
    }
}
