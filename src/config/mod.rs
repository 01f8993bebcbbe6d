use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

pub struct Config {
    pub server: ServerConfig,
    pub engine: EngineConfig,
}

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Tunables for the room/session engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub scoring: ScoringConfig,
    /// Interval between `heartbeat` messages on every open connection.
    pub heartbeat_interval: Duration,
    /// A connection silent for longer than this is proactively pruned.
    pub connection_timeout: Duration,
    /// Optional idle-room expiry. `None` means rooms are only torn down by an
    /// explicit close or a host disconnect.
    pub room_idle_timeout: Option<Duration>,
}

/// Point-award policy for correct answers. The exact curve is a policy
/// choice, so both knobs come from the environment.
#[derive(Debug, Clone, Copy)]
pub struct ScoringConfig {
    pub base_points: u64,
    /// Floor awarded to any correct answer regardless of lateness.
    pub min_correct_points: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_points: 1000,
            min_correct_points: 100,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .expect("Invalid SERVER_PORT"),
            },
            engine: EngineConfig::from_env(),
        }
    }

    pub fn bind_address(&self) -> ([u8; 4], u16) {
        let ip_addr = self.parse_host_to_ipv4();
        (ip_addr.octets(), self.server.port)
    }

    fn parse_host_to_ipv4(&self) -> Ipv4Addr {
        // Try to parse as IP address first
        if let Ok(addr) = self.server.host.parse::<IpAddr>() {
            match addr {
                IpAddr::V4(ipv4) => return ipv4,
                IpAddr::V6(_) => {
                    tracing::warn!(
                        host = %self.server.host,
                        "IPv6 address provided but only IPv4 supported, using 0.0.0.0"
                    );
                    return Ipv4Addr::new(0, 0, 0, 0);
                }
            }
        }

        // Handle common hostnames
        match self.server.host.as_str() {
            "localhost" => Ipv4Addr::new(127, 0, 0, 1),
            "" | "0.0.0.0" => Ipv4Addr::new(0, 0, 0, 0),
            _ => {
                tracing::warn!(
                    host = %self.server.host,
                    "Unable to parse host as IPv4, using 0.0.0.0"
                );
                Ipv4Addr::new(0, 0, 0, 0)
            }
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let idle_secs = env_u64("ROOM_IDLE_TIMEOUT_SECS", 0);

        Self {
            scoring: ScoringConfig {
                base_points: env_u64("BASE_POINTS", 1000),
                min_correct_points: env_u64("MIN_CORRECT_POINTS", 100),
            },
            heartbeat_interval: Duration::from_secs(env_u64("HEARTBEAT_INTERVAL_SECS", 15).max(1)),
            connection_timeout: Duration::from_secs(env_u64("CONNECTION_TIMEOUT_SECS", 60)),
            room_idle_timeout: match idle_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            heartbeat_interval: Duration::from_secs(15),
            connection_timeout: Duration::from_secs(60),
            room_idle_timeout: None,
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
