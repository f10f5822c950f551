//! Tests for configuration

#[cfg(test)]
mod tests {
    use super::super::config::*;

    #[test]
    fn test_strategy_config_default() {
        let config = StrategyConfig::default();
        assert_eq!(config.min_reserve, "2000000");
        assert_eq!(config.default_ticker, "PEPE");
        assert_eq!(config.sentiment_threshold, 0.1);
        assert_eq!(config.fetch_timeout_ms, 3500);
        assert_eq!(config.interval_secs, 60);
        assert_eq!(config.signal_refresh_secs, 30);
        assert_eq!(config.reconnect_delay_secs, 5);
    }

    #[test]
    fn test_strategy_config_from_toml() {
        let config: StrategyConfig = toml::from_str(
            r#"
min_reserve = "5000000"
default_ticker = "WIF"
sentiment_threshold = 0.2
"#,
        )
        .unwrap();
        assert_eq!(config.min_reserve, "5000000");
        assert_eq!(config.default_ticker, "WIF");
        assert_eq!(config.sentiment_threshold, 0.2);
        // Unspecified fields keep their defaults
        assert_eq!(config.interval_secs, 60);
    }

    #[test]
    fn test_min_reserve_rejects_non_decimal() {
        let config: Config = toml::from_str(
            r#"
[strategy]
min_reserve = "2.5e6"
"#,
        )
        .unwrap();
        let err = config.min_reserve().unwrap_err();
        assert!(err.to_string().contains("min_reserve"));

        let config: Config = toml::from_str("").unwrap();
        assert_eq!(
            config.min_reserve().unwrap(),
            ethers::types::U256::from(2_000_000u64)
        );
    }

    #[test]
    fn test_network_profile_minimal() {
        let profile: NetworkProfile = toml::from_str(
            r#"
name = "base"
chain_id = 8453
rpc_urls = ["https://mainnet.base.org"]
router = "0x00000000000000000000000000000000000000cc"
base_asset = "0x00000000000000000000000000000000000000bb"
"#,
        )
        .unwrap();
        assert_eq!(profile.name, "base");
        assert_eq!(profile.chain_id, 8453);
        assert_eq!(profile.trigger, Trigger::Interval);
        assert!(!profile.relay);
        assert_eq!(profile.moat, "0");
        assert!(profile.ws_url.is_none());
        assert!(profile.tokens.is_empty());
    }

    #[test]
    fn test_network_profile_reactive_with_relay() {
        let profile: NetworkProfile = toml::from_str(
            r#"
name = "mainnet"
chain_id = 1
rpc_urls = ["https://rpc.example", "https://rpc-fallback.example"]
ws_url = "wss://rpc.example"
priority_fee_gwei = 2
moat = "300000000000000"
relay = true
relay_url = "https://relay.example"
trigger = "reactive"
router = "0x00000000000000000000000000000000000000cc"
base_asset = "0x00000000000000000000000000000000000000bb"

[tokens]
PEPE = "0x00000000000000000000000000000000000000aa"
"#,
        )
        .unwrap();
        assert_eq!(profile.trigger, Trigger::Reactive);
        assert!(profile.relay);
        assert_eq!(profile.relay_url.as_deref(), Some("https://relay.example"));
        assert_eq!(profile.priority_fee_gwei, Some(2));
        assert_eq!(profile.rpc_urls.len(), 2);
        assert!(profile.token_address("PEPE").is_some());
        assert!(profile.token_address("WIF").is_none());
    }

    #[test]
    fn test_validate_rejects_missing_private_key() {
        let config: Config = toml::from_str(
            r#"
[wallet]
executor = "0x00000000000000000000000000000000000000ee"

[[networks]]
name = "base"
chain_id = 8453
rpc_urls = ["https://mainnet.base.org"]
router = "0x00000000000000000000000000000000000000cc"
base_asset = "0x00000000000000000000000000000000000000bb"
"#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("private_key"));
    }

    #[test]
    fn test_validate_rejects_missing_networks() {
        let config: Config = toml::from_str(
            r#"
[wallet]
private_key = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"
executor = "0x00000000000000000000000000000000000000ee"
"#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("networks"));
    }

    #[test]
    fn test_validate_rejects_reactive_without_ws() {
        let config: Config = toml::from_str(
            r#"
[wallet]
private_key = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"
executor = "0x00000000000000000000000000000000000000ee"

[[networks]]
name = "base"
chain_id = 8453
rpc_urls = ["https://mainnet.base.org"]
trigger = "reactive"
router = "0x00000000000000000000000000000000000000cc"
base_asset = "0x00000000000000000000000000000000000000bb"
"#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ws_url"));
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        let config: Config = toml::from_str(
            r#"
[wallet]
private_key = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"
executor = "0x00000000000000000000000000000000000000ee"

[[networks]]
name = "base"
chain_id = 8453
rpc_urls = ["https://mainnet.base.org"]
moat = "100000"
router = "0x00000000000000000000000000000000000000cc"
base_asset = "0x00000000000000000000000000000000000000bb"
"#,
        )
        .unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_and_trust_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.trust.path, "trust.json");
        assert!(config.trust.seeds.is_empty());
        assert_eq!(config.database.path, "gridpulse.db");
        assert!(config.signals.sources.is_empty());
    }
}
