use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use lumen_primitives::{BlockHeight, block::Block, state::ChainState};
use tokio::sync::RwLock;

use super::{Store, StoreError};

#[derive(Debug, Default)]
struct MemoryStoreInner {
    blocks: BTreeMap<BlockHeight, Block>,
    state: Option<ChainState>,
}

impl MemoryStoreInner {
    fn committed_height(&self) -> Option<BlockHeight> {
        self.state.as_ref().map(|s| s.last_block_height)
    }
}

/// An in-memory [`Store`]. Clones share the same storage, which outlives any manager
/// using it.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("injected write failure".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn save_block(&self, block: &Block) -> Result<(), StoreError> {
        self.check_writable()?;
        self.inner.write().await.blocks.insert(block.height(), block.clone());
        Ok(())
    }

    async fn save_block_with_state(
        &self,
        block: &Block,
        state: &ChainState,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut inner = self.inner.write().await;
        inner.blocks.insert(block.height(), block.clone());
        inner.state = Some(state.clone());
        Ok(())
    }

    async fn get_block(&self, height: BlockHeight) -> Result<Option<Block>, StoreError> {
        let inner = self.inner.read().await;
        if inner.committed_height().is_none_or(|committed| height > committed) {
            return Ok(None);
        }

        Ok(inner.blocks.get(&height).cloned())
    }

    async fn save_state(&self, state: &ChainState) -> Result<(), StoreError> {
        self.check_writable()?;
        self.inner.write().await.state = Some(state.clone());
        Ok(())
    }

    async fn get_state(&self) -> Result<Option<ChainState>, StoreError> {
        Ok(self.inner.read().await.state.clone())
    }
}
