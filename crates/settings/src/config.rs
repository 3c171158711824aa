//! Configuration types

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use wgstream_core::ReservedTag;

use crate::{parse_key, Result, SettingsError};

/// Bogon tunnel addresses used when none are configured
pub const DEFAULT_ADDRESSES: [&str; 2] = ["10.0.0.1", "fd59:7153:2388:b5fd:0000:0000:0000:0001"];

/// Allowed IPs for a peer that does not list any
pub const DEFAULT_ALLOWED_IPS: [&str; 2] = ["0.0.0.0/0", "::0/0"];

pub const DEFAULT_MTU: u32 = 1420;

/// Tunnel configuration as written by the user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireGuardConfig {
    /// Dial peers (client) or serve accepted connections (server)
    #[serde(default, alias = "IsClient")]
    pub is_client: bool,

    /// Private key, hex or base64
    #[serde(default)]
    pub secret_key: String,

    /// Local tunnel addresses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Vec<String>>,

    #[serde(default)]
    pub peers: Vec<PeerConfig>,

    /// 0 means the default of 1420
    #[serde(default)]
    pub mtu: u32,

    /// Engine worker count; 0 lets the bind pick
    #[serde(default)]
    pub workers: u32,

    /// Empty or exactly 3 bytes, as a byte array or a base64 string
    #[serde(default, deserialize_with = "deserialize_reserved")]
    pub reserved: Vec<u8>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReservedField {
    Bytes(Vec<u8>),
    Base64(String),
}

fn deserialize_reserved<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    match ReservedField::deserialize(deserializer)? {
        ReservedField::Bytes(bytes) => Ok(bytes),
        ReservedField::Base64(text) => STANDARD.decode(text).map_err(serde::de::Error::custom),
    }
}

/// One peer as written by the user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerConfig {
    #[serde(default)]
    pub public_key: String,

    #[serde(default)]
    pub pre_shared_key: String,

    /// `host:port` of the peer
    #[serde(default)]
    pub endpoint: String,

    /// Persistent keepalive interval in seconds, 0 disables it
    #[serde(default)]
    pub keep_alive: u32,

    #[serde(default, rename = "allowedIPs", skip_serializing_if = "Option::is_none")]
    pub allowed_ips: Option<Vec<String>>,
}

/// Validated device configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub is_client: bool,
    /// Hex-encoded private key
    pub secret_key: String,
    pub addresses: Vec<String>,
    pub peers: Vec<PeerSettings>,
    pub mtu: u32,
    pub workers: u32,
    pub reserved: Option<ReservedTag>,
}

/// Validated peer configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSettings {
    /// Hex-encoded, empty if unset
    pub public_key: String,
    /// Hex-encoded, empty if unset
    pub pre_shared_key: String,
    pub endpoint: String,
    pub keep_alive: u32,
    pub allowed_ips: Vec<String>,
}

impl WireGuardConfig {
    /// Load a configuration file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(SettingsError::ReadError)?;
        let config = Self::from_json(&content)?;
        info!("Loaded tunnel config from {:?}", path);
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(SettingsError::ParseError)
    }

    pub fn build(&self) -> Result<DeviceConfig> {
        let secret_key = parse_key(&self.secret_key)?;

        let addresses = match &self.address {
            Some(addresses) => addresses.clone(),
            None => DEFAULT_ADDRESSES.iter().map(|a| a.to_string()).collect(),
        };

        let peers = self
            .peers
            .iter()
            .map(PeerConfig::build)
            .collect::<Result<Vec<_>>>()?;

        let mtu = if self.mtu == 0 { DEFAULT_MTU } else { self.mtu };

        let reserved = ReservedTag::from_slice(&self.reserved)
            .map_err(|_| SettingsError::InvalidReserved(self.reserved.len()))?;

        Ok(DeviceConfig {
            is_client: self.is_client,
            secret_key,
            addresses,
            peers,
            mtu,
            workers: self.workers,
            reserved,
        })
    }
}

impl PeerConfig {
    pub fn build(&self) -> Result<PeerSettings> {
        let public_key = if self.public_key.is_empty() {
            String::new()
        } else {
            parse_key(&self.public_key)?
        };

        let pre_shared_key = if self.pre_shared_key.is_empty() {
            String::new()
        } else {
            parse_key(&self.pre_shared_key)?
        };

        let allowed_ips = match &self.allowed_ips {
            Some(ips) => ips.clone(),
            None => DEFAULT_ALLOWED_IPS.iter().map(|ip| ip.to_string()).collect(),
        };

        Ok(PeerSettings {
            public_key,
            pre_shared_key,
            endpoint: self.endpoint.clone(),
            keep_alive: self.keep_alive,
            allowed_ips,
        })
    }
}

impl DeviceConfig {
    /// Reserved bytes as the bind expects them
    pub fn reserved_bytes(&self) -> &[u8] {
        match &self.reserved {
            Some(tag) => tag.as_bytes(),
            None => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn test_defaults_applied() {
        let config = WireGuardConfig {
            secret_key: KEY_HEX.to_string(),
            peers: vec![PeerConfig {
                endpoint: "203.0.113.5:51820".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let device = config.build().unwrap();
        assert_eq!(device.addresses, vec!["10.0.0.1", "fd59:7153:2388:b5fd:0000:0000:0000:0001"]);
        assert_eq!(device.mtu, 1420);
        assert_eq!(device.reserved, None);
        assert!(device.reserved_bytes().is_empty());
        assert!(!device.is_client);

        let peer = &device.peers[0];
        assert_eq!(peer.allowed_ips, vec!["0.0.0.0/0", "::0/0"]);
        assert_eq!(peer.keep_alive, 0);
        assert!(peer.public_key.is_empty());
    }

    #[test]
    fn test_explicit_values_kept() {
        let config = WireGuardConfig {
            is_client: true,
            secret_key: KEY_HEX.to_string(),
            address: Some(vec!["172.16.0.2".to_string()]),
            mtu: 1280,
            workers: 4,
            reserved: vec![7, 7, 7],
            peers: vec![PeerConfig {
                allowed_ips: Some(vec!["10.0.0.0/8".to_string()]),
                keep_alive: 25,
                ..Default::default()
            }],
        };

        let device = config.build().unwrap();
        assert!(device.is_client);
        assert_eq!(device.addresses, vec!["172.16.0.2"]);
        assert_eq!(device.mtu, 1280);
        assert_eq!(device.workers, 4);
        assert_eq!(device.reserved_bytes(), &[7, 7, 7]);
        assert_eq!(device.peers[0].allowed_ips, vec!["10.0.0.0/8"]);
        assert_eq!(device.peers[0].keep_alive, 25);
    }

    #[test]
    fn test_reserved_wrong_length_rejected() {
        for reserved in [vec![1u8], vec![1, 2], vec![1, 2, 3, 4]] {
            let config = WireGuardConfig {
                reserved,
                ..Default::default()
            };
            assert!(matches!(config.build(), Err(SettingsError::InvalidReserved(_))));
        }
    }

    #[test]
    fn test_bad_peer_key_rejected() {
        let config = WireGuardConfig {
            peers: vec![PeerConfig {
                public_key: "%%%".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(matches!(config.build(), Err(SettingsError::InvalidKey(_))));
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "IsClient": true,
            "secretKey": "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
            "peers": [{
                "publicKey": "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
                "endpoint": "peer.example:51820",
                "keepAlive": 15,
                "allowedIPs": ["0.0.0.0/0"]
            }],
            "mtu": 1400,
            "workers": 2,
            "reserved": [1, 2, 3]
        }"#;

        let config = WireGuardConfig::from_json(json).unwrap();
        assert!(config.is_client);
        assert_eq!(config.peers[0].endpoint, "peer.example:51820");
        assert_eq!(config.peers[0].keep_alive, 15);
        assert_eq!(config.peers[0].allowed_ips.as_deref(), Some(&["0.0.0.0/0".to_string()][..]));

        let device = config.build().unwrap();
        assert_eq!(device.mtu, 1400);
        assert_eq!(device.reserved, Some(ReservedTag::new([1, 2, 3])));
    }

    #[test]
    fn test_reserved_as_base64_string() {
        let config = WireGuardConfig::from_json(r#"{"reserved": "AQID"}"#).unwrap();
        assert_eq!(config.reserved, vec![1, 2, 3]);

        let config = WireGuardConfig::from_json(r#"{"reserved": ""}"#).unwrap();
        assert!(config.reserved.is_empty());

        let err = WireGuardConfig::from_json(r#"{"reserved": "not base64!"}"#).unwrap_err();
        assert!(matches!(err, SettingsError::ParseError(_)));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let config = WireGuardConfig {
            is_client: true,
            mtu: 1300,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"isClient\":true"));

        let parsed = WireGuardConfig::from_json(&json).unwrap();
        assert!(parsed.is_client);
        assert_eq!(parsed.mtu, 1300);
    }

    #[test]
    fn test_load_missing_file() {
        let err = WireGuardConfig::load_from(Path::new("/nonexistent/wgstream.json")).unwrap_err();
        assert!(matches!(err, SettingsError::ReadError(_)));
    }
}
