//! Node configuration.

use crate::error::{SealError, SealResult};
use crate::keys::KeyAlgorithm;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Whether a node may issue signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The single node permitted to sign (the session host).
    Authority,
    #[default]
    Peer,
}

impl std::str::FromStr for Role {
    type Err = SealError;

    fn from_str(s: &str) -> SealResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "authority" | "server" => Ok(Role::Authority),
            "peer" | "client" => Ok(Role::Peer),
            other => Err(SealError::Config(format!("unknown role: '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node_id: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default = "default_item_id")]
    pub item_id: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Encoded secret key file. Authority nodes generate one here if missing.
    #[serde(default)]
    pub key_file: Option<PathBuf>,
    /// Encoded public key (`name:base64`) of the authority, distributed out of band.
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub algorithm: KeyAlgorithm,
}

fn default_item_id() -> String {
    "item".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./seal-data")
}

impl NodeConfig {
    pub fn new(node_id: impl Into<String>, role: Role) -> Self {
        Self {
            node_id: node_id.into(),
            role,
            item_id: default_item_id(),
            data_dir: default_data_dir(),
            key_file: None,
            public_key: None,
            algorithm: KeyAlgorithm::default(),
        }
    }

    /// Load from a JSON file, then apply `SEAL_DATA_DIR` / `SEAL_ROLE` overrides.
    pub fn from_file(path: &Path) -> SealResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SealError::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config: NodeConfig = serde_json::from_str(&content)
            .map_err(|e| SealError::Config(format!("invalid config: {e}")))?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> SealResult<()> {
        if let Ok(dir) = std::env::var("SEAL_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(role) = std::env::var("SEAL_ROLE") {
            self.role = role.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> SealResult<()> {
        if self.node_id.is_empty() {
            return Err(SealError::Config("node_id must not be empty".into()));
        }
        if self.item_id.is_empty()
            || self.item_id.contains(['/', '\\'])
            || self.item_id.contains("..")
        {
            return Err(SealError::Config(format!(
                "invalid item_id: '{}'",
                self.item_id
            )));
        }
        Ok(())
    }

    pub fn signature_path(&self) -> PathBuf {
        self.data_dir
            .join(format!("{}.signature.json", self.item_id))
    }
}
