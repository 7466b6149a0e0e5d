use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use crate::common::NodeId;
use crate::error::{Error, Result};

mod file;
mod placement;

pub use file::{BlockAssignment, MetadataState};
pub use placement::{PlacementPolicy, RoundRobin};

/// The central authority: records which node holds each block of each file
/// and places new blocks.
///
/// Metadata is persisted as JSON after every change. The whole state is
/// written to a temporary file which is then renamed over the old one.
pub struct MasterServer {
    metadata_path: PathBuf,

    // Persisted state.
    state: MetadataState,

    // Registered nodes, in registration order.
    nodes: Vec<NodeId>,

    placement: Box<dyn PlacementPolicy>,
}

impl MasterServer {
    /// Create a master with empty state. Nothing is read from disk.
    pub fn new(metadata_path: impl Into<PathBuf>) -> MasterServer {
        MasterServer {
            metadata_path: metadata_path.into(),
            state: MetadataState::default(),
            nodes: Vec::new(),
            placement: Box::new(RoundRobin),
        }
    }

    /// Create a master and load any previously persisted metadata.
    pub fn open(metadata_path: impl Into<PathBuf>) -> Result<MasterServer> {
        let mut master = MasterServer::new(metadata_path);
        master.load()?;
        Ok(master)
    }

    pub fn with_placement(mut self, placement: impl PlacementPolicy + 'static) -> MasterServer {
        self.placement = Box::new(placement);
        self
    }

    /// Reload state from disk. A missing metadata file yields empty state.
    pub fn load(&mut self) -> Result<()> {
        let file = match File::open(&self.metadata_path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.metadata_path.display(), "no metadata file, starting empty");
                self.state = MetadataState::default();
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        self.state = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Serialization(e.to_string()))?;
        info!(
            path = %self.metadata_path.display(),
            files = self.state.files.len(),
            cursor = self.state.cursor,
            "loaded metadata"
        );
        Ok(())
    }

    fn save_metadata(&self) -> Result<()> {
        if let Some(parent) = self.metadata_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Write to temp file first, then rename (atomic)
        let tmp_path = tmp_path(&self.metadata_path);
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &self.state)
                .map_err(|e| Error::Serialization(e.to_string()))?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        fs::rename(&tmp_path, &self.metadata_path)?;
        Ok(())
    }

    /// Register a storage node. Placement follows registration order.
    pub fn register_node(&mut self, node_id: impl Into<NodeId>) -> Result<()> {
        let node_id = node_id.into();
        if self.nodes.contains(&node_id) {
            return Err(Error::DuplicateNode(node_id));
        }
        self.nodes.push(node_id);
        Ok(())
    }

    pub fn register_nodes<I, S>(&mut self, node_ids: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        for node_id in node_ids {
            self.register_node(node_id)?;
        }
        Ok(())
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn cursor(&self) -> usize {
        self.state.cursor
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    /// Assign a node to each block of a new file and persist the result.
    ///
    /// Re-submitting a known file returns its original assignments when the
    /// block count matches, and fails with `ConsistencyMismatch` otherwise.
    pub fn assign_blocks(&mut self, file_name: &str, block_count: u64) -> Result<Vec<BlockAssignment>> {
        if let Some(existing) = self.state.files.get(file_name) {
            let recorded = existing.len() as u64;
            if recorded != block_count {
                return Err(Error::ConsistencyMismatch {
                    file: file_name.to_string(),
                    recorded,
                    requested: block_count,
                });
            }
            debug!(file = file_name, blocks = recorded, "file already assigned");
            return Ok(existing.clone());
        }

        let mut cursor = self.state.cursor;
        let mut assignments = Vec::with_capacity(block_count as usize);
        for block_num in 0..block_count {
            let node_id = self.placement.select(&self.nodes, &mut cursor)?;
            assignments.push(BlockAssignment { node_id, block_num });
        }

        let previous_cursor = std::mem::replace(&mut self.state.cursor, cursor);
        self.state.files.insert(file_name.to_string(), assignments.clone());

        if let Err(e) = self.save_metadata() {
            // Keep memory consistent with what is on disk.
            self.state.files.remove(file_name);
            self.state.cursor = previous_cursor;
            return Err(e);
        }

        info!(file = file_name, blocks = block_count, cursor = cursor, "assigned blocks");
        Ok(assignments)
    }

    /// Assignments for a file ordered by block number, empty if unknown.
    pub fn get_blocks(&self, file_name: &str) -> Vec<BlockAssignment> {
        let mut blocks = self.state.files.get(file_name).cloned().unwrap_or_default();
        blocks.sort_by_key(|a| a.block_num);
        blocks
    }

    /// Whether a file has been recorded, including files with zero blocks.
    pub fn contains(&self, file_name: &str) -> bool {
        self.state.files.contains_key(file_name)
    }

    /// All known file names, sorted.
    pub fn list_files(&self) -> Vec<String> {
        self.state.files.keys().cloned().collect()
    }

    /// Known file names starting with `prefix`, sorted.
    pub fn ls(&self, prefix: &str) -> Vec<String> {
        self.state
            .files
            .range(prefix.to_string()..)
            .take_while(|(name, _)| name.starts_with(prefix))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
