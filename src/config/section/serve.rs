//! `[serve]` section configuration.
//!
//! ```toml
//! [serve]
//! interface = "127.0.0.1"   # 0.0.0.0 makes the server reachable from the LAN
//! port = 8000
//! livereload = true         # Watch sources, rebuild and reload browsers
//! watch = ["theme"]         # Extra paths to watch (relative to the config file)
//! build_delay_ms = 100      # Quiet period before a rebuild starts
//! shutdown_delay_ms = 250   # Build loop wake-up interval while idle
//! poll_timeout_secs = 60    # How long a browser long-poll is held open
//! watcher = "native"        # native | poll
//! poll_interval_ms = 500    # Scan interval for watcher = "poll"
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::reload::WatcherKind;

/// Filesystem observer flavor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatcherMode {
    /// OS notifications (inotify, FSEvents, ReadDirectoryChangesW).
    #[default]
    Native,
    /// Periodic rescans; for network and container filesystems.
    Poll,
}

/// Development server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    pub interface: IpAddr,
    pub port: u16,
    pub livereload: bool,
    pub watch: Vec<PathBuf>,
    pub build_delay_ms: u64,
    pub shutdown_delay_ms: u64,
    pub poll_timeout_secs: u64,
    pub watcher: WatcherMode,
    pub poll_interval_ms: u64,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8000,
            livereload: true,
            watch: Vec::new(),
            build_delay_ms: 100,
            shutdown_delay_ms: 250,
            poll_timeout_secs: 60,
            watcher: WatcherMode::Native,
            poll_interval_ms: 500,
        }
    }
}

impl ServeConfig {
    pub fn watcher_kind(&self) -> WatcherKind {
        match self.watcher {
            WatcherMode::Native => WatcherKind::Native,
            WatcherMode::Poll => WatcherKind::Poll(Duration::from_millis(self.poll_interval_ms)),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shutdown_delay_ms == 0 {
            return Err(ConfigError::Validation(
                "serve.shutdown_delay_ms must be greater than 0".into(),
            ));
        }
        if self.poll_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "serve.poll_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.watcher == WatcherMode::Poll && self.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "serve.poll_interval_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
    use std::time::Duration;

    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_serve_config_defaults() {
        let config = test_parse_config("");
        let serve = &config.serve;

        assert_eq!(serve.interface, IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)));
        assert_eq!(serve.port, 8000);
        assert!(serve.livereload);
        assert!(serve.watch.is_empty());
        assert_eq!(serve.build_delay_ms, 100);
        assert_eq!(serve.shutdown_delay_ms, 250);
        assert_eq!(serve.poll_timeout_secs, 60);
        assert_eq!(serve.watcher_kind(), WatcherKind::Native);
        assert!(serve.validate().is_ok());
    }

    #[test]
    fn test_serve_config_partial_override() {
        let config = test_parse_config("[serve]\ninterface = \"::1\"\nport = 3000");

        assert_eq!(
            config.serve.interface,
            IpAddr::V6(Ipv6Addr::new(0, 0, 0, 0, 0, 0, 0, 1))
        );
        assert_eq!(config.serve.port, 3000);
        assert!(config.serve.livereload);
    }

    #[test]
    fn test_poll_watcher() {
        let config = test_parse_config("[serve]\nwatcher = \"poll\"\npoll_interval_ms = 2000");
        assert_eq!(
            config.serve.watcher_kind(),
            WatcherKind::Poll(Duration::from_secs(2))
        );
    }

    #[test]
    fn test_unknown_watcher_rejected() {
        let result: Result<crate::config::SiteConfig, _> =
            toml::from_str("[serve]\nwatcher = \"fsevents\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let config = test_parse_config("[serve]\nwatcher = \"poll\"\npoll_interval_ms = 0");
        assert!(config.serve.validate().is_err());

        let config = test_parse_config("[serve]\npoll_timeout_secs = 0");
        assert!(config.serve.validate().is_err());
    }
}
