use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use crate::chunkserver::BlockStore;
use crate::error::{Error, Result};

/// Identifier of a storage node.
pub type NodeId = String;

/// Shared handle to a storage node.
pub type NodeHandle = Arc<Mutex<dyn BlockStore>>;

/// Lock a mutex, recovering the guard if a previous holder panicked.
pub fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Check that a stored file name is usable as a single path component.
pub fn check_file_name(file_name: &str) -> Result<()> {
    if file_name.is_empty()
        || file_name == "."
        || file_name == ".."
        || file_name.contains(['/', '\\'])
    {
        return Err(Error::InvalidPath(file_name.to_string()));
    }
    Ok(())
}

/// In-process stand-in for the network: resolves node ids to block stores.
#[derive(Default)]
pub struct NetworkShim {
    nodes: HashMap<NodeId, NodeHandle>,
}

impl NetworkShim {
    pub fn new() -> NetworkShim {
        NetworkShim {
            nodes: HashMap::new(),
        }
    }

    pub fn add_node(&mut self, node: NodeHandle) -> Result<()> {
        let id = lock(&node).id().to_string();
        if self.nodes.contains_key(&id) {
            return Err(Error::DuplicateNode(id));
        }
        self.nodes.insert(id, node);
        Ok(())
    }

    pub fn get_node(&self, id: &str) -> Option<NodeHandle> {
        self.nodes.get(id).cloned()
    }

    /// Registered node ids, sorted.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunkserver::MemoryBlockStore;

    fn node(id: &str) -> NodeHandle {
        Arc::new(Mutex::new(MemoryBlockStore::new(id)))
    }

    #[test]
    fn test_add_and_get_node() {
        let mut network = NetworkShim::new();
        assert!(network.is_empty());

        network.add_node(node("2")).unwrap();
        network.add_node(node("1")).unwrap();

        assert_eq!(network.len(), 2);
        assert_eq!(network.node_ids(), vec!["1".to_string(), "2".to_string()]);
        assert_eq!(lock(&network.get_node("2").unwrap()).id(), "2");
        assert!(network.get_node("3").is_none());
    }

    #[test]
    fn test_check_file_name() {
        assert!(check_file_name("a.bin").is_ok());
        assert!(check_file_name("..a").is_ok());
        for name in ["", ".", "..", "a/b", "a\\b.bin"] {
            assert!(matches!(check_file_name(name), Err(Error::InvalidPath(_))), "{name}");
        }
    }

    #[test]
    fn test_duplicate_node() {
        let mut network = NetworkShim::new();
        network.add_node(node("1")).unwrap();

        let err = network.add_node(node("1")).unwrap_err();
        assert!(matches!(err, Error::DuplicateNode(id) if id == "1"));
    }
}
