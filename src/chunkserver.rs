use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use crate::common::{check_file_name, NodeId};
use crate::error::{Error, Result};

/// Block storage capability of a single node.
///
/// Blocks are addressed by (file name, block number) within the node. A node
/// only ever sees the blocks it was assigned.
pub trait BlockStore: Send {
    /// The node identifier.
    fn id(&self) -> &str;

    /// Store a block, overwriting any previous block at the same address.
    fn store(&mut self, file_name: &str, block_num: u64, data: &[u8]) -> Result<()>;

    /// Fetch a block. `Ok(None)` means the node does not hold it.
    fn fetch(&self, file_name: &str, block_num: u64) -> Result<Option<Vec<u8>>>;

    /// Total bytes of block data held by the node.
    fn bytes_used(&self) -> u64;
}

fn block_file_name(block_num: u64) -> String {
    format!("block_{block_num}")
}

fn parse_block_file_name(name: &str) -> Option<u64> {
    name.strip_prefix("block_")?.parse::<u64>().ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub len: u64,
    pub checksum: u32,
}

/// On-disk layout of a node: `<storage_dir>/<file name>/block_<n>`.
///
/// Checksums live in memory only. They are recorded on write and recomputed
/// from the bytes on disk when the directory is opened, so they catch changes
/// made while the node is running but not changes made between restarts.
pub struct ChunkserverStorage {
    // The path to the chunkserver storage directory.
    storage_dir: PathBuf,

    // Checksums of the blocks on disk.
    blocks: HashMap<(String, u64), BlockInfo>,
}

impl ChunkserverStorage {
    /// Open the storage directory, creating it if needed, and index the
    /// blocks already present.
    pub fn open(storage_dir: PathBuf) -> Result<ChunkserverStorage> {
        std::fs::create_dir_all(&storage_dir)?;

        let mut blocks = HashMap::new();

        for file_dir in std::fs::read_dir(&storage_dir)? {
            let file_dir = file_dir?;
            if !file_dir.file_type()?.is_dir() {
                continue;
            }
            let Some(file_name) = file_dir.file_name().to_str().map(str::to_string) else {
                continue;
            };

            for entry in std::fs::read_dir(file_dir.path())? {
                let entry = entry?;
                let Some(block_num) = entry.file_name().to_str().and_then(parse_block_file_name) else {
                    continue;
                };
                let data = std::fs::read(entry.path())?;
                let info = BlockInfo {
                    len: data.len() as u64,
                    checksum: crc32fast::hash(&data),
                };
                blocks.insert((file_name.clone(), block_num), info);
            }
        }

        Ok(ChunkserverStorage { storage_dir, blocks })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn block_path(&self, file_name: &str, block_num: u64) -> PathBuf {
        self.storage_dir.join(file_name).join(block_file_name(block_num))
    }

    pub fn block_info(&self, file_name: &str, block_num: u64) -> Option<BlockInfo> {
        self.blocks.get(&(file_name.to_string(), block_num)).copied()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    fn write_block(&mut self, file_name: &str, block_num: u64, data: &[u8]) -> std::io::Result<()> {
        let path = self.block_path(file_name, block_num);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, data)?;

        let info = BlockInfo {
            len: data.len() as u64,
            checksum: crc32fast::hash(data),
        };
        self.blocks.insert((file_name.to_string(), block_num), info);
        Ok(())
    }

    fn read_block(&self, file_name: &str, block_num: u64) -> std::io::Result<Option<Vec<u8>>> {
        match std::fs::read(self.block_path(file_name, block_num)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// A storage node backed by a local directory.
pub struct Chunkserver {
    pub id: NodeId,

    /// The storage for the chunkserver.
    storage: ChunkserverStorage,
}

impl Chunkserver {
    pub fn new(id: impl Into<NodeId>, storage: ChunkserverStorage) -> Chunkserver {
        Chunkserver { id: id.into(), storage }
    }

    /// Open a chunkserver rooted at `storage_dir`.
    pub fn open(id: impl Into<NodeId>, storage_dir: impl Into<PathBuf>) -> Result<Chunkserver> {
        let id = id.into();
        let storage = ChunkserverStorage::open(storage_dir.into())?;
        info!(node = %id, blocks = storage.len(), dir = %storage.storage_dir().display(), "opened chunkserver");
        Ok(Chunkserver::new(id, storage))
    }

    pub fn storage(&self) -> &ChunkserverStorage {
        &self.storage
    }
}

impl BlockStore for Chunkserver {
    fn id(&self) -> &str {
        &self.id
    }

    fn store(&mut self, file_name: &str, block_num: u64, data: &[u8]) -> Result<()> {
        check_file_name(file_name)?;
        self.storage
            .write_block(file_name, block_num, data)
            .map_err(|e| Error::block_io(file_name, block_num, &self.id, e))?;
        debug!(node = %self.id, file = file_name, block = block_num, len = data.len(), "stored block");
        Ok(())
    }

    fn fetch(&self, file_name: &str, block_num: u64) -> Result<Option<Vec<u8>>> {
        check_file_name(file_name)?;
        let data = self
            .storage
            .read_block(file_name, block_num)
            .map_err(|e| Error::block_io(file_name, block_num, &self.id, e))?;

        let Some(data) = data else {
            return Ok(None);
        };

        if let Some(info) = self.storage.block_info(file_name, block_num) {
            if info.checksum != crc32fast::hash(&data) {
                warn!(node = %self.id, file = file_name, block = block_num, "checksum mismatch");
                return Err(Error::ChecksumMismatch {
                    file: file_name.to_string(),
                    block: block_num,
                    node: self.id.clone(),
                });
            }
        }

        debug!(node = %self.id, file = file_name, block = block_num, len = data.len(), "fetched block");
        Ok(Some(data))
    }

    /// Sum of indexed block lengths. Block files removed behind the store's
    /// back are still counted until the next `open`.
    fn bytes_used(&self) -> u64 {
        self.storage.blocks.values().map(|info| info.len).sum()
    }
}

/// A storage node that keeps its blocks in memory.
#[derive(Debug, Default)]
pub struct MemoryBlockStore {
    id: NodeId,
    blocks: HashMap<(String, u64), Vec<u8>>,
}

impl MemoryBlockStore {
    pub fn new(id: impl Into<NodeId>) -> MemoryBlockStore {
        MemoryBlockStore {
            id: id.into(),
            blocks: HashMap::new(),
        }
    }

    /// Drop a block, as if its backing storage was lost.
    pub fn remove(&mut self, file_name: &str, block_num: u64) -> Option<Vec<u8>> {
        self.blocks.remove(&(file_name.to_string(), block_num))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl BlockStore for MemoryBlockStore {
    fn id(&self) -> &str {
        &self.id
    }

    fn store(&mut self, file_name: &str, block_num: u64, data: &[u8]) -> Result<()> {
        check_file_name(file_name)?;
        self.blocks.insert((file_name.to_string(), block_num), data.to_vec());
        Ok(())
    }

    fn fetch(&self, file_name: &str, block_num: u64) -> Result<Option<Vec<u8>>> {
        check_file_name(file_name)?;
        Ok(self.blocks.get(&(file_name.to_string(), block_num)).cloned())
    }

    fn bytes_used(&self) -> u64 {
        self.blocks.values().map(|data| data.len() as u64).sum()
    }
}
