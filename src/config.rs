use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use byte_unit::Byte;
use serde::{Deserialize, Deserializer};
use crate::block::BLOCK_SIZE;
use crate::client::MissingBlockPolicy;
use crate::common::NodeId;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Block size in bytes. Accepts an integer or a string such as "32 MiB".
    #[serde(deserialize_with = "deserialize_byte_size")]
    pub block_size: u64,
    pub metadata_path: PathBuf,
    /// Node `n` stores its blocks under `<storage_dir>/node_<n>`.
    pub storage_dir: PathBuf,
    /// Node ids in registration order.
    pub nodes: Vec<NodeId>,
    pub missing_blocks: MissingBlockPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_size: BLOCK_SIZE,
            metadata_path: PathBuf::from("metadata.json"),
            storage_dir: PathBuf::from("slave_storage"),
            nodes: (1..=4).map(|i| i.to_string()).collect(),
            missing_blocks: MissingBlockPolicy::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Config rooted at `dir`, with everything else defaulted.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            metadata_path: dir.join("metadata.json"),
            storage_dir: dir.join("slave_storage"),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::Config("block_size must be greater than zero".to_string()));
        }
        if self.nodes.is_empty() {
            return Err(Error::NoNodes);
        }
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node) {
                return Err(Error::DuplicateNode(node.clone()));
            }
        }
        Ok(())
    }

    pub fn node_dir(&self, node_id: &str) -> PathBuf {
        self.storage_dir.join(format!("node_{node_id}"))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ByteSize {
    Bytes(u64),
    Text(String),
}

fn deserialize_byte_size<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match ByteSize::deserialize(deserializer)? {
        ByteSize::Bytes(n) => Ok(n),
        ByteSize::Text(s) => Byte::parse_str(&s, true)
            .map(|b| b.as_u64())
            .map_err(serde::de::Error::custom),
    }
}
