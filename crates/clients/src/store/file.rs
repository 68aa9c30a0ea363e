use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use lumen_primitives::{BlockHeight, block::Block, state::ChainState};
use serde_json::to_vec_pretty;
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};
use tracing::debug;

use super::{Store, StoreError};

const STATE_FILE: &str = "state.json";
const BLOCKS_DIR: &str = "blocks";

/// A [`Store`] persisting every block and the chain state as JSON files in a directory.
///
/// Every file is written to a temporary path, flushed to disk, and renamed into place; the
/// parent directory is then synced so the rename survives a power loss. The state file is
/// the commit point: a crash between a block write and the state write leaves the block
/// invisible, and it is overwritten when its height is produced again.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileStore {
    /// Opens the store at `root`, creating the directory layout if needed.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(BLOCKS_DIR)).await?;

        debug!(path = %root.display(), "Opened file store");
        Ok(Self { root, write_lock: Arc::default() })
    }

    fn block_path(&self, height: BlockHeight) -> PathBuf {
        self.root.join(BLOCKS_DIR).join(format!("{height:020}.json"))
    }

    fn state_path(&self) -> PathBuf {
        self.root.join(STATE_FILE)
    }

    async fn write_atomic(path: &Path, contents: Vec<u8>) -> Result<(), StoreError> {
        let tmp = path.with_extension("json.tmp");

        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&contents).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp, path).await?;
        if let Some(parent) = path.parent() {
            Self::sync_dir(parent).await?;
        }
        Ok(())
    }

    #[cfg(unix)]
    async fn sync_dir(dir: &Path) -> Result<(), StoreError> {
        fs::File::open(dir).await?.sync_all().await?;
        Ok(())
    }

    #[cfg(not(unix))]
    async fn sync_dir(_dir: &Path) -> Result<(), StoreError> {
        Ok(())
    }

    async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Store for FileStore {
    async fn save_block(&self, block: &Block) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        Self::write_atomic(&self.block_path(block.height()), to_vec_pretty(block)?).await
    }

    async fn save_block_with_state(
        &self,
        block: &Block,
        state: &ChainState,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        Self::write_atomic(&self.block_path(block.height()), to_vec_pretty(block)?).await?;
        Self::write_atomic(&self.state_path(), to_vec_pretty(state)?).await
    }

    async fn get_block(&self, height: BlockHeight) -> Result<Option<Block>, StoreError> {
        let Some(state) = self.get_state().await? else {
            return Ok(None);
        };

        if height > state.last_block_height {
            return Ok(None);
        }

        match Self::read_optional(&self.block_path(height)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn save_state(&self, state: &ChainState) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        Self::write_atomic(&self.state_path(), to_vec_pretty(state)?).await
    }

    async fn get_state(&self) -> Result<Option<ChainState>, StoreError> {
        match Self::read_optional(&self.state_path()).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}
