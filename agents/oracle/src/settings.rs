//! Oracle settings: the shared [`Settings`] plus the validator key.

use std::fmt::{Debug, Formatter};

use eyre::{Context, Result};
use serde::Deserialize;

use ethers::signers::LocalWallet;
use oracle_base::settings::{load_settings_object, LoadableFromSettings, Settings};

/// Settings for the oracle agent
#[derive(Clone, Deserialize)]
pub struct OracleSettings {
    #[serde(flatten)]
    base: Settings,
    /// Hex private key this node signs messages with
    pub signer_key: String,
}

impl Debug for OracleSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleSettings")
            .field("base", &self.base)
            .field("signer_key", &"<redacted>")
            .finish()
    }
}

impl AsRef<Settings> for OracleSettings {
    fn as_ref(&self) -> &Settings {
        &self.base
    }
}

impl LoadableFromSettings for OracleSettings {
    fn load() -> Result<Self> {
        load_settings_object("ORACLE")
    }
}

impl OracleSettings {
    /// The validator key
    pub fn signer(&self) -> Result<LocalWallet> {
        self.signer_key
            .trim()
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .context("Invalid signer key")
    }
}

#[cfg(test)]
mod test {
    use ethers::signers::Signer;

    use super::*;

    fn settings(key: &str) -> OracleSettings {
        serde_json::from_value(serde_json::json!({
            "signer_key": key,
            "tracing": { "level": "debug" },
            "ethereum_networks": [],
        }))
        .unwrap()
    }

    #[test]
    fn signer_key_is_parsed_and_hidden() {
        let key = format!("0x{}", "01".repeat(32));
        let settings = settings(&key);
        let wallet = settings.signer().unwrap();
        assert_eq!(wallet.address(), LocalWallet::from_bytes(&[1u8; 32]).unwrap().address());
        assert!(!format!("{settings:?}").contains(&"01".repeat(32)));
        assert!(settings.as_ref().cosmos_network.is_none());
    }

    #[test]
    fn malformed_signer_key_is_rejected() {
        assert!(settings("not a key").signer().is_err());
        assert!(settings("0x1234").signer().is_err());
    }
}
