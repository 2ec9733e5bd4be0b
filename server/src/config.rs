//! Command line configuration for the broadcast server.

use crate::registry::ColorPolicy;
use clap::builder::RangedU64ValueParser;
use clap::Parser;
use shared::PositionMode;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Real-time position broadcast server")]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to listen on (0 picks a free port)
    #[arg(short, long, default_value = "3000")]
    pub port: u16,

    /// Milliseconds between `updateAll` broadcasts
    #[arg(long, default_value = "50", value_parser = clap::value_parser!(u64).range(1..))]
    pub broadcast_interval_ms: u64,

    /// Milliseconds between stale-entry sweeps
    #[arg(long, default_value = "1000", value_parser = clap::value_parser!(u64).range(1..))]
    pub sweep_interval_ms: u64,

    /// Inactivity after which a client is dropped from the registry
    #[arg(long, default_value = "5000")]
    pub stale_timeout_ms: u64,

    /// Never evict inactive clients
    #[arg(long)]
    pub no_eviction: bool,

    /// Coordinate system accepted in `move` events (polar or cartesian)
    #[arg(long, default_value = "polar")]
    pub coordinates: PositionMode,

    /// Color assigned to new clients
    #[arg(long, default_value = shared::DEFAULT_COLOR)]
    pub default_color: String,

    /// Give every new client a random hue instead of the default color
    #[arg(long)]
    pub random_color: bool,

    /// Include the number of clients in every `updateAll`
    #[arg(long)]
    pub include_count: bool,

    /// Maximum number of concurrent clients
    #[arg(long, default_value = "256", value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub max_clients: usize,

    /// Outbound messages buffered per connection before sends start failing
    #[arg(long, default_value = "64", value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub outbound_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::parse_from(["server"])
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Staleness threshold, or `None` when eviction is disabled
    pub fn stale_timeout(&self) -> Option<Duration> {
        (!self.no_eviction).then(|| Duration::from_millis(self.stale_timeout_ms))
    }

    pub fn color_policy(&self) -> ColorPolicy {
        if self.random_color {
            ColorPolicy::RandomHue
        } else {
            ColorPolicy::Fixed(self.default_color.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr(), "127.0.0.1:3000");
        assert_eq!(config.broadcast_interval(), Duration::from_millis(50));
        assert_eq!(config.sweep_interval(), Duration::from_millis(1000));
        assert_eq!(config.stale_timeout(), Some(Duration::from_millis(5000)));
        assert_eq!(config.coordinates, PositionMode::Polar);
        assert_eq!(
            config.color_policy(),
            ColorPolicy::Fixed(shared::DEFAULT_COLOR.to_string())
        );
        assert!(!config.include_count);
        assert_eq!(config.max_clients, 256);
        assert_eq!(config.outbound_buffer, 64);
    }

    #[test]
    fn test_parse_overrides() {
        let config = ServerConfig::parse_from([
            "server",
            "-H",
            "0.0.0.0",
            "-p",
            "0",
            "--broadcast-interval-ms",
            "20",
            "--coordinates",
            "cartesian",
            "--random-color",
            "--no-eviction",
            "--include-count",
            "--max-clients",
            "3",
        ]);

        assert_eq!(config.bind_addr(), "0.0.0.0:0");
        assert_eq!(config.broadcast_interval(), Duration::from_millis(20));
        assert_eq!(config.coordinates, PositionMode::Cartesian);
        assert_eq!(config.color_policy(), ColorPolicy::RandomHue);
        assert_eq!(config.stale_timeout(), None);
        assert!(config.include_count);
        assert_eq!(config.max_clients, 3);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(ServerConfig::try_parse_from(["server", "--broadcast-interval-ms", "0"]).is_err());
        assert!(ServerConfig::try_parse_from(["server", "--sweep-interval-ms", "0"]).is_err());
        assert!(ServerConfig::try_parse_from(["server", "--max-clients", "0"]).is_err());
        assert!(ServerConfig::try_parse_from(["server", "--coordinates", "hex"]).is_err());
        assert!(ServerConfig::try_parse_from(["server", "--port", "70000"]).is_err());
    }
}
