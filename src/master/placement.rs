use crate::common::NodeId;
use crate::error::{Error, Result};

/// Chooses the node for each newly placed block.
///
/// The cursor is owned by the caller so that it can be persisted with the
/// rest of the metadata.
pub trait PlacementPolicy: Send {
    fn select(&self, nodes: &[NodeId], cursor: &mut usize) -> Result<NodeId>;
}

/// Cycle through the nodes in registration order, one step per block.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundRobin;

impl PlacementPolicy for RoundRobin {
    fn select(&self, nodes: &[NodeId], cursor: &mut usize) -> Result<NodeId> {
        if nodes.is_empty() {
            return Err(Error::NoNodes);
        }
        // The node list may have shrunk since the cursor was persisted.
        let index = *cursor % nodes.len();
        *cursor = (index + 1) % nodes.len();
        Ok(nodes[index].clone())
    }
}
