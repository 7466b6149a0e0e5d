use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::common::NodeId;

/// Placement of one block of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockAssignment {
    pub node_id: NodeId,
    pub block_num: u64,
}

/// Everything the master persists: file assignments plus the placement cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataState {
    /// Index of the node that receives the next placed block.
    #[serde(default)]
    pub cursor: usize,
    /// File name to its assignments, ordered by block number.
    #[serde(default)]
    pub files: BTreeMap<String, Vec<BlockAssignment>>,
}
