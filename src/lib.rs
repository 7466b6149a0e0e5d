use std::sync::{Arc, Mutex};
use tracing::info;

pub mod block;
pub mod chunkserver;
pub mod client;
pub mod common;
pub mod config;
pub mod error;
pub mod master;

pub use crate::block::BLOCK_SIZE;
pub use crate::chunkserver::{BlockStore, Chunkserver, MemoryBlockStore};
pub use crate::client::{AddReport, Client, MissingBlock, MissingBlockPolicy, ReadReport};
pub use crate::common::{NetworkShim, NodeId};
pub use crate::config::Config;
pub use crate::error::{Error, Result};
pub use crate::master::{BlockAssignment, MasterServer, RoundRobin};

/// Bring up a master and one on-disk chunkserver per configured node, and
/// return a client wired to them.
pub fn start(config: &Config) -> Result<Client> {
    config.validate()?;

    // Setup master.
    let mut master = MasterServer::open(&config.metadata_path)?;
    master.register_nodes(config.nodes.iter().cloned())?;
    let master = Arc::new(Mutex::new(master));

    // Setup chunkservers and make them reachable over the network shim.
    let network = Arc::new(Mutex::new(NetworkShim::new()));
    for node_id in &config.nodes {
        let chunkserver = Chunkserver::open(node_id.clone(), config.node_dir(node_id))?;
        common::lock(&network).add_node(Arc::new(Mutex::new(chunkserver)))?;
    }

    info!(nodes = config.nodes.len(), block_size = config.block_size, "started");

    Ok(Client::new(master, network)
        .with_block_size(config.block_size)
        .with_missing_block_policy(config.missing_blocks))
}
