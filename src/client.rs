use std::fs::File;
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use serde::Deserialize;
use tracing::{debug, info, warn};
use crate::block::{block_count, read_block, BLOCK_SIZE};
use crate::common::{check_file_name, lock, NetworkShim, NodeHandle, NodeId};
use crate::error::{Error, Result};
use crate::master::{BlockAssignment, MasterServer};

/// What to do when a block cannot be found on its node during a read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingBlockPolicy {
    /// Report the block and keep going. The output lacks the block's bytes.
    #[default]
    BestEffort,
    /// Fail the read and remove the partial output.
    Abort,
}

/// Result of uploading a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddReport {
    pub file_name: String,
    pub size: u64,
    pub assignments: Vec<BlockAssignment>,
}

/// A block that could not be fetched during a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingBlock {
    pub block_num: u64,
    pub node_id: NodeId,
}

/// Result of reconstructing a file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadReport {
    pub blocks_written: u64,
    pub bytes_written: u64,
    pub missing: Vec<MissingBlock>,
}

impl ReadReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Splits files into blocks, pushes them to the nodes the master picks, and
/// reassembles them on read.
pub struct Client {
    master: Arc<Mutex<MasterServer>>,
    network: Arc<Mutex<NetworkShim>>,
    block_size: u64,
    missing_blocks: MissingBlockPolicy,
}

impl Client {
    pub fn new(master: Arc<Mutex<MasterServer>>, network: Arc<Mutex<NetworkShim>>) -> Client {
        Client {
            master,
            network,
            block_size: BLOCK_SIZE,
            missing_blocks: MissingBlockPolicy::default(),
        }
    }

    pub fn with_block_size(mut self, block_size: u64) -> Client {
        self.block_size = block_size;
        self
    }

    pub fn with_missing_block_policy(mut self, policy: MissingBlockPolicy) -> Client {
        self.missing_blocks = policy;
        self
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn master(&self) -> &Arc<Mutex<MasterServer>> {
        &self.master
    }

    pub fn network(&self) -> &Arc<Mutex<NetworkShim>> {
        &self.network
    }

    /// List the stored files.
    pub fn list_files(&self) -> Vec<String> {
        lock(&self.master).list_files()
    }

    /// List the stored files whose name starts with `prefix`.
    pub fn ls(&self, prefix: &str) -> Vec<String> {
        lock(&self.master).ls(prefix)
    }

    /// Get the total number of bytes stored across all nodes (disk used).
    pub fn du(&self) -> u64 {
        let network = lock(&self.network);
        let nodes: Vec<NodeHandle> = network
            .node_ids()
            .iter()
            .filter_map(|id| network.get_node(id))
            .collect();
        drop(network);

        nodes.iter().map(|node| lock(node).bytes_used()).sum()
    }

    fn node(&self, node_id: &str) -> Result<NodeHandle> {
        lock(&self.network)
            .get_node(node_id)
            .ok_or_else(|| Error::UnknownNode(node_id.to_string()))
    }

    /// Upload a local file. It is stored under its base name.
    pub fn add_file(&self, path: impl AsRef<Path>) -> Result<AddReport> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::InvalidPath(path.display().to_string()))?
            .to_string();

        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::SourceNotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let metadata = file.metadata()?;
        if !metadata.is_file() {
            return Err(Error::InvalidPath(path.display().to_string()));
        }

        // Reject names no node could store before anything is recorded.
        check_file_name(&file_name)?;

        // 1. Compute the number of blocks.
        let size = metadata.len();
        let block_count = block_count(size, self.block_size);

        // 2. Ask master for a node for every block.
        let assignments = lock(&self.master).assign_blocks(&file_name, block_count)?;

        // 3. Push each block to its node, in block order.
        let mut bytes_read = 0;
        for assignment in &assignments {
            let data = read_block(&mut file, self.block_size)
                .map_err(|e| Error::block_io(&file_name, assignment.block_num, &assignment.node_id, e))?;
            if data.is_empty() {
                // The source shrank after it was sized.
                return Err(Error::SourceChanged {
                    file: file_name,
                    expected: size,
                    actual: bytes_read,
                });
            }
            bytes_read += data.len() as u64;

            let node = self.node(&assignment.node_id)?;
            lock(&node).store(&file_name, assignment.block_num, &data)?;
            debug!(file = %file_name, block = assignment.block_num, node = %assignment.node_id, "pushed block");
        }

        let mut rest = [0u8; 1];
        let extra = file.read(&mut rest).map_err(|e| Error::SourceIo {
            file: file_name.clone(),
            source: e,
        })?;
        if extra != 0 {
            // The source grew after it was sized.
            let actual = file.metadata().map(|m| m.len()).unwrap_or(0);
            return Err(Error::SourceChanged {
                file: file_name,
                expected: size,
                actual: actual.max(bytes_read + extra as u64),
            });
        }

        info!(file = %file_name, size = size, blocks = block_count, "added file");
        Ok(AddReport {
            file_name,
            size,
            assignments,
        })
    }

    /// Reconstruct a stored file at `output_path`.
    ///
    /// Unknown files fail before the output is created. Missing blocks are
    /// handled per the configured `MissingBlockPolicy`; any error removes the
    /// partial output.
    pub fn read_file(&self, file_name: &str, output_path: impl AsRef<Path>) -> Result<ReadReport> {
        let output_path = output_path.as_ref();

        // 1. Get the block assignments from the master.
        let mut assignments = {
            let master = lock(&self.master);
            if !master.contains(file_name) {
                return Err(Error::FileNotFound(file_name.to_string()));
            }
            master.get_blocks(file_name)
        };
        assignments.sort_by_key(|a| a.block_num);

        // 2. Fetch the blocks in order into the output.
        let result = File::create(output_path)
            .map_err(Error::from)
            .and_then(|file| self.write_blocks(file_name, &assignments, file));

        match result {
            Ok(report) => {
                info!(
                    file = file_name,
                    output = %output_path.display(),
                    bytes = report.bytes_written,
                    missing = report.missing.len(),
                    "reconstructed file"
                );
                Ok(report)
            }
            Err(e) => {
                let _ = std::fs::remove_file(output_path);
                Err(e)
            }
        }
    }

    fn write_blocks(&self, file_name: &str, assignments: &[BlockAssignment], file: File) -> Result<ReadReport> {
        let mut out = BufWriter::new(file);
        let mut report = ReadReport::default();

        for assignment in assignments {
            let node = self.node(&assignment.node_id)?;
            let data = lock(&node).fetch(file_name, assignment.block_num)?;

            match data {
                Some(data) => {
                    out.write_all(&data)
                        .map_err(|e| Error::block_io(file_name, assignment.block_num, &assignment.node_id, e))?;
                    report.blocks_written += 1;
                    report.bytes_written += data.len() as u64;
                    debug!(file = file_name, block = assignment.block_num, node = %assignment.node_id, "fetched block");
                }
                None => {
                    warn!(file = file_name, block = assignment.block_num, node = %assignment.node_id, "block missing");
                    if self.missing_blocks == MissingBlockPolicy::Abort {
                        return Err(Error::BlockNotFound {
                            file: file_name.to_string(),
                            block: assignment.block_num,
                            node: assignment.node_id.clone(),
                        });
                    }
                    report.missing.push(MissingBlock {
                        block_num: assignment.block_num,
                        node_id: assignment.node_id.clone(),
                    });
                }
            }
        }

        out.flush()?;
        Ok(report)
    }
}
