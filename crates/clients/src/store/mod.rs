use async_trait::async_trait;
use lumen_primitives::{BlockHeight, block::Block, state::ChainState};

mod file;
pub use file::FileStore;

mod memory;
pub use memory::MemoryStore;

/// Errors that can occur when reading from or writing to the store.
#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable storage of blocks and of the chain state.
///
/// The chain state is the commit point: a block stored above the `last_block_height` of
/// the stored state is not visible to readers.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Stores a block. It becomes visible once a state committing its height is saved.
    async fn save_block(&self, block: &Block) -> Result<(), StoreError>;

    /// Atomically stores a block together with the chain state that commits it.
    async fn save_block_with_state(
        &self,
        block: &Block,
        state: &ChainState,
    ) -> Result<(), StoreError>;

    /// Returns the committed block at `height`, if any.
    async fn get_block(&self, height: BlockHeight) -> Result<Option<Block>, StoreError>;

    /// Stores the chain state.
    async fn save_state(&self, state: &ChainState) -> Result<(), StoreError>;

    /// Returns the stored chain state, if any.
    async fn get_state(&self) -> Result<Option<ChainState>, StoreError>;

    /// Returns the height of the last committed block, zero if nothing is stored.
    async fn height(&self) -> Result<BlockHeight, StoreError> {
        Ok(self.get_state().await?.map(|s| s.last_block_height).unwrap_or_default())
    }
}
