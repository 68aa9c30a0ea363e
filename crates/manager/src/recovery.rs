use lumen_primitives::{
    state::{ChainState, Genesis, StateError},
    summary::Summary,
};
use tracing::{debug, info};

use crate::{
    BlockManager, Collaborators,
    error::{Collaborator, ManagerError},
    pending::{PendingHeaders, SubmissionStatus},
};

/// Loads the chain state from the store, or initializes it from the genesis descriptor,
/// and rebuilds the pending-header queue from the stored blocks.
pub(crate) async fn recover(
    genesis: &Genesis,
    collaborators: &Collaborators,
    timeout: std::time::Duration,
) -> Result<(ChainState, PendingHeaders), ManagerError> {
    let Some(state) = collaborators.store.get_state().await? else {
        let app_hash = BlockManager::bounded_call(
            Collaborator::Executor,
            timeout,
            collaborators.executor.init_chain(genesis),
        )
        .await?;

        let state = ChainState::from_genesis(genesis, app_hash);
        state.check_invariants()?;
        collaborators.store.save_state(&state).await?;

        info!(chain_id = %state.chain_id, initial_height = state.initial_height, "🌱 Initialized chain state from genesis");
        return Ok((state, PendingHeaders::new()))
    };

    state.check_invariants().map_err(|e| ManagerError::Corruption(format!("stored state: {e}")))?;

    if state.chain_id != genesis.chain_id {
        return Err(StateError::ChainIdMismatch {
            expected: genesis.chain_id.clone(),
            actual: state.chain_id,
        }
        .into())
    }

    if state.initial_height != genesis.initial_height {
        return Err(ManagerError::Corruption(format!(
            "stored initial height {} does not match genesis initial height {}",
            state.initial_height, genesis.initial_height
        )))
    }

    let mut pending = PendingHeaders::new();
    for height in state.da_included_height + 1..=state.last_block_height {
        let block = collaborators
            .store
            .get_block(height)
            .await?
            .ok_or_else(|| ManagerError::Corruption(format!("missing block {height}")))?;

        if block.height() != height {
            return Err(ManagerError::Corruption(format!(
                "block stored at height {height} has height {}",
                block.height()
            )))
        }

        let status = if height <= state.last_submitted_height {
            SubmissionStatus::Submitted
        } else {
            SubmissionStatus::Unsubmitted
        };

        pending.push(block.header, status).map_err(|e| ManagerError::Corruption(e.to_string()))?;
    }

    if let Some(last) = pending.last_header() {
        if last.hash() != state.last_block_hash {
            return Err(ManagerError::Corruption(format!(
                "stored block {} does not match the chain tip hash {}",
                last.height, state.last_block_hash
            )))
        }
    }

    debug!(queued = pending.len(), unsubmitted = pending.num_unsubmitted(), "Rebuilt pending header queue");
    info!(state = %state.summary(), "🔁 Recovered chain state from store");

    Ok((state, pending))
}
