//! Relay configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// ICE server preference for a peer connection.
///
/// Senders on the same LAN can negotiate with host candidates only
/// (`none`); anything behind NAT needs the configured STUN servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceMode {
    /// Host candidates only, no ICE servers
    None,
    /// Use the configured STUN server list
    #[default]
    Stun,
}

impl std::str::FromStr for IceMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "none" => Ok(IceMode::None),
            "stun" => Ok(IceMode::Stun),
            other => Err(format!("unknown ice mode '{other}' (expected 'none' or 'stun')")),
        }
    }
}

/// Configuration for the relay core.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// STUN servers offered to peers that request (or default to) `IceMode::Stun`
    pub stun_servers: Vec<String>,
    /// ICE mode applied when the offer carries no preference
    pub default_ice_mode: IceMode,
    /// Expected label of the sender-created telemetry data channel
    pub channel_label: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            stun_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            default_ice_mode: IceMode::Stun,
            channel_label: "imu".to_string(),
        }
    }
}

impl RelayConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.default_ice_mode == IceMode::Stun && self.stun_servers.is_empty() {
            return Err(Error::Config(
                "default ice mode is 'stun' but no STUN servers are configured".to_string(),
            ));
        }
        if self.channel_label.is_empty() {
            return Err(Error::Config("channel label must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RelayConfig::default().validate().is_ok());
    }

    #[test]
    fn test_stun_mode_requires_servers() {
        let config = RelayConfig {
            stun_servers: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ice_mode_parsing() {
        assert_eq!("none".parse::<IceMode>(), Ok(IceMode::None));
        assert_eq!("stun".parse::<IceMode>(), Ok(IceMode::Stun));
        assert!("turn".parse::<IceMode>().is_err());
    }
}
