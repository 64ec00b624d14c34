use crate::gateway::heartbeat::Liveness;
use crate::gateway::session::{SessionSettings, DEFAULT_OUTBOUND_CAPACITY};

pub const DEFAULT_HUB_CAPACITY: usize = 1024;

pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub hub_capacity: usize,
    pub outbound_capacity: usize,
    pub liveness: Liveness,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

impl Config {
    pub fn from_env() -> Self {
        let outbound_capacity = env_parse::<usize>("CHATHUB_OUTBOUND_QUEUE")
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_OUTBOUND_CAPACITY);
        let hub_capacity = env_parse::<usize>("CHATHUB_HUB_QUEUE")
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_HUB_CAPACITY);

        let defaults = Liveness::default();
        let ping_secs = env_parse::<u64>("CHATHUB_PING_INTERVAL_SECS")
            .unwrap_or_else(|| defaults.ping_interval.map_or(0, |d| d.as_secs()));
        let idle_secs = env_parse::<u64>("CHATHUB_IDLE_TIMEOUT_SECS")
            .unwrap_or(defaults.idle_timeout.as_secs());

        Self {
            port: env_parse("PORT").unwrap_or(8081),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:chathub.db?mode=rwc".to_string()),
            hub_capacity,
            outbound_capacity,
            liveness: Liveness::from_secs(ping_secs, idle_secs),
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            outbound_capacity: self.outbound_capacity,
            liveness: self.liveness,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::time::Duration;

    fn clear_env() {
        std::env::remove_var("PORT");
        std::env::remove_var("DATABASE_URL");
        std::env::remove_var("CHATHUB_OUTBOUND_QUEUE");
        std::env::remove_var("CHATHUB_HUB_QUEUE");
        std::env::remove_var("CHATHUB_PING_INTERVAL_SECS");
        std::env::remove_var("CHATHUB_IDLE_TIMEOUT_SECS");
    }

    #[test]
    #[serial]
    fn test_default_config() {
        clear_env();
        let config = Config::from_env();
        assert_eq!(config.port, 8081);
        assert_eq!(config.database_url, "sqlite:chathub.db?mode=rwc");
        assert_eq!(config.outbound_capacity, 256);
        assert_eq!(config.hub_capacity, 1024);
        assert_eq!(config.liveness.ping_interval, Some(Duration::from_secs(45)));
        assert_eq!(config.liveness.idle_timeout, Duration::from_secs(90));
    }

    #[test]
    #[serial]
    fn test_port_and_database_from_env() {
        clear_env();
        std::env::set_var("PORT", "9000");
        std::env::set_var("DATABASE_URL", "sqlite:test.db");
        let config = Config::from_env();
        assert_eq!(config.port, 9000);
        assert_eq!(config.database_url, "sqlite:test.db");
    }

    #[test]
    #[serial]
    fn test_invalid_values_fall_back_to_defaults() {
        clear_env();
        std::env::set_var("PORT", "not_a_number");
        std::env::set_var("CHATHUB_OUTBOUND_QUEUE", "0");
        std::env::set_var("CHATHUB_HUB_QUEUE", "-5");
        let config = Config::from_env();
        assert_eq!(config.port, 8081);
        assert_eq!(config.outbound_capacity, 256);
        assert_eq!(config.hub_capacity, 1024);
    }

    #[test]
    #[serial]
    fn test_queue_sizes_from_env() {
        clear_env();
        std::env::set_var("CHATHUB_OUTBOUND_QUEUE", "32");
        std::env::set_var("CHATHUB_HUB_QUEUE", "64");
        let config = Config::from_env();
        assert_eq!(config.session_settings().outbound_capacity, 32);
        assert_eq!(config.hub_capacity, 64);
    }

    #[test]
    #[serial]
    fn test_liveness_can_be_disabled() {
        clear_env();
        std::env::set_var("CHATHUB_PING_INTERVAL_SECS", "0");
        let config = Config::from_env();
        assert!(!config.liveness.is_enabled());
    }

    #[test]
    #[serial]
    fn test_custom_liveness() {
        clear_env();
        std::env::set_var("CHATHUB_PING_INTERVAL_SECS", "10");
        std::env::set_var("CHATHUB_IDLE_TIMEOUT_SECS", "25");
        let config = Config::from_env();
        assert_eq!(config.liveness.ping_interval, Some(Duration::from_secs(10)));
        assert_eq!(config.liveness.idle_timeout, Duration::from_secs(25));
    }
}
