use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{DEFAULT_DEPOSIT_INTERVAL, DEFAULT_SWAP_INTERVAL};
use crate::error::ControllerError;

/// Chain/hub deployment the wallet talks to. Persisted under `rpc-prod`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Network {
    Localhost,
    Rinkeby,
    Mainnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Localhost => "LOCALHOST",
            Network::Rinkeby => "RINKEBY",
            Network::Mainnet => "MAINNET",
        }
    }

    fn hub_path(&self) -> &'static str {
        match self {
            Network::Localhost => "local",
            Network::Rinkeby => "rinkeby",
            Network::Mainnet => "mainnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = ControllerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOCALHOST" => Ok(Network::Localhost),
            "RINKEBY" => Ok(Network::Rinkeby),
            "MAINNET" => Ok(Network::Mainnet),
            other => Err(ControllerError::UnknownNetwork(other.to_string())),
        }
    }
}

/// Optional per-network endpoints for custom hubs.
#[derive(Clone, Debug, Default)]
pub struct EndpointOverrides {
    pub local_hub: Option<String>,
    pub local_eth: Option<String>,
    pub rinkeby_hub: Option<String>,
    pub rinkeby_eth: Option<String>,
    pub mainnet_hub: Option<String>,
    pub mainnet_eth: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string for the persisted wallet state.
    pub database_url: String,

    /// `APP_ENV=development` defaults the network to LOCALHOST.
    pub development: bool,

    /// `APP_ENV=production` switches logs to JSON.
    pub json_logs: bool,

    /// Origin the hub paths are resolved against.
    pub public_url: String,

    pub overrides: EndpointOverrides,

    /// Gas price estimation endpoint (`safeLow` in tenths of a gwei).
    pub gas_oracle_url: String,

    // =========================
    // Polling
    // =========================
    pub deposit_interval: Duration,
    pub swap_interval: Duration,

    /// Bound on every external call made from a cycle.
    pub external_call_timeout: Duration,

    /// Age after which the minimum balance is recomputed.
    pub min_balance_refresh: Duration,

    /// Age after which an unconfirmed submission, or an unreached refund
    /// ceiling, is reported as stuck.
    pub stale_in_flight_after: Duration,

    /// Buffered warnings per UI subscriber before the oldest is dropped.
    pub warning_capacity: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Unset or unparsable values
    /// fall back to defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let app_env = get("APP_ENV").unwrap_or_default();
        let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        let millis = |key: &str, default: Duration| {
            get(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(default)
        };

        Self {
            database_url: non_empty("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://channel_controller.db?mode=rwc".to_string()),
            development: app_env == "development",
            json_logs: app_env == "production",
            public_url: non_empty("PUBLIC_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_lowercase(),
            overrides: EndpointOverrides {
                local_hub: non_empty("LOCAL_HUB_OVERRIDE"),
                local_eth: non_empty("LOCAL_ETH_OVERRIDE"),
                rinkeby_hub: non_empty("RINKEBY_HUB_OVERRIDE"),
                rinkeby_eth: non_empty("RINKEBY_ETH_OVERRIDE"),
                mainnet_hub: non_empty("MAINNET_HUB_OVERRIDE"),
                mainnet_eth: non_empty("MAINNET_ETH_OVERRIDE"),
            },
            gas_oracle_url: non_empty("GAS_ORACLE_URL")
                .unwrap_or_else(|| "https://ethgasstation.info/json/ethgasAPI.json".to_string()),

            deposit_interval: millis("DEPOSIT_INTERVAL_MS", DEFAULT_DEPOSIT_INTERVAL),
            swap_interval: millis("SWAP_INTERVAL_MS", DEFAULT_SWAP_INTERVAL),
            external_call_timeout: millis("EXTERNAL_CALL_TIMEOUT_MS", Duration::from_secs(30)),
            min_balance_refresh: millis("MIN_BALANCE_REFRESH_MS", Duration::from_secs(300)),
            stale_in_flight_after: millis("STALE_IN_FLIGHT_MS", Duration::from_secs(600)),
            warning_capacity: get("WARNING_CHANNEL_CAPACITY")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(64),
        }
    }

    /// Network used when none has been persisted yet.
    pub fn default_network(&self) -> Network {
        if self.development {
            Network::Localhost
        } else {
            Network::Mainnet
        }
    }

    pub fn hub_url(&self, network: Network) -> String {
        let override_url = match network {
            Network::Localhost => &self.overrides.local_hub,
            Network::Rinkeby => &self.overrides.rinkeby_hub,
            Network::Mainnet => &self.overrides.mainnet_hub,
        };

        override_url
            .clone()
            .unwrap_or_else(|| format!("{}/api/{}/hub", self.public_url, network.hub_path()))
    }

    /// Ethereum RPC override; without one the channel client's endpoint is used.
    pub fn eth_override(&self, network: Network) -> Option<&str> {
        match network {
            Network::Localhost => self.overrides.local_eth.as_deref(),
            Network::Rinkeby => self.overrides.rinkeby_eth.as_deref(),
            Network::Mainnet => self.overrides.mainnet_eth.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_without_env() {
        let cfg = config(&[]);
        assert_eq!(cfg.default_network(), Network::Mainnet);
        assert_eq!(cfg.deposit_interval, Duration::from_secs(5));
        assert_eq!(cfg.swap_interval, Duration::from_secs(1));
        assert_eq!(cfg.external_call_timeout, Duration::from_secs(30));
        assert!(!cfg.json_logs);
    }

    #[test]
    fn development_defaults_to_localhost() {
        let cfg = config(&[("APP_ENV", "development")]);
        assert_eq!(cfg.default_network(), Network::Localhost);
    }

    #[test]
    fn hub_url_is_derived_from_public_url() {
        let cfg = config(&[("PUBLIC_URL", "https://Wallet.Example/")]);
        assert_eq!(
            cfg.hub_url(Network::Rinkeby),
            "https://wallet.example/api/rinkeby/hub"
        );
        assert_eq!(
            cfg.hub_url(Network::Localhost),
            "https://wallet.example/api/local/hub"
        );
    }

    #[test]
    fn hub_override_wins() {
        let cfg = config(&[("MAINNET_HUB_OVERRIDE", "https://hub.custom")]);
        assert_eq!(cfg.hub_url(Network::Mainnet), "https://hub.custom");
        assert_eq!(cfg.eth_override(Network::Mainnet), None);
    }

    #[test]
    fn bad_durations_fall_back() {
        let cfg = config(&[("DEPOSIT_INTERVAL_MS", "soon"), ("SWAP_INTERVAL_MS", "250")]);
        assert_eq!(cfg.deposit_interval, Duration::from_secs(5));
        assert_eq!(cfg.swap_interval, Duration::from_millis(250));
    }

    #[test]
    fn network_names_round_trip_and_reject_unknown() {
        for n in [Network::Localhost, Network::Rinkeby, Network::Mainnet] {
            assert_eq!(n.as_str().parse::<Network>().unwrap(), n);
        }
        assert!(matches!(
            "ROPSTEN".parse::<Network>(),
            Err(ControllerError::UnknownNetwork(_))
        ));
    }
}
