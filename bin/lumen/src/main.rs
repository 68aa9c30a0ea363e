#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Lumen rollup node.
//!
//! Runs the block manager against a file-backed store and in-process devnet collaborators.
//! Every non-empty line written to the node's stdin is injected into the devnet sequencer
//! as a transaction, e.g. `echo transfer | lumen`.

use std::{
    io::{self, BufRead},
    sync::Arc,
};

use clap::Parser;
use tracing::{debug, info, warn};

use lumen_clients::{
    da::{Confirmation, InMemoryDa},
    executor::InMemoryExecutor,
    gossip::BroadcastGossip,
    sequencer::InMemorySequencer,
    store::FileStore,
};
use lumen_config::Opts;
use lumen_manager::{BlockManager, Collaborators, ManagerConfig, genesis_from_opts};
use lumen_primitives::shutdown::{ShutdownSignal, run_until_shutdown};

mod allocator;
use allocator::{Allocator, new_allocator};

#[global_allocator]
static ALLOC: Allocator = new_allocator();

/// The number of headers buffered for each gossip subscriber.
const GOSSIP_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    if let Ok(custom_env_file) = std::env::var("ENV_FILE") {
        // Try from custom env file, and abort if it fails
        dotenvy::from_filename(custom_env_file)?;
    } else {
        // Try from default .env file, and ignore if it fails. It might
        // be that the user isn't using it.
        dotenvy::dotenv().ok();
    }

    let opts = Opts::parse();

    let log_provider = opts.telemetry.setup(&opts.instance_name)?;

    info!("🔦 Lumen node starting...");

    let shutdown_signal = ShutdownSignal::new();
    let cancel = shutdown_signal.token();
    let on_shutdown = || {
        info!("👋 Lumen node shutting down...");
        log_provider.shutdown();
    };

    let run_manager = async {
        let store = FileStore::open(&opts.store.path).await?;
        info!(path = %opts.store.path.display(), "Opened block store");

        let sequencer = InMemorySequencer::default();
        spawn_stdin_injector(sequencer.clone());

        let collaborators = Collaborators {
            executor: Arc::new(InMemoryExecutor::new()),
            sequencer: Arc::new(sequencer),
            da: Arc::new(InMemoryDa::new(opts.da.local_max_blob_size, Confirmation::Immediate)),
            store: Arc::new(store),
            gossip: Arc::new(BroadcastGossip::new(GOSSIP_CAPACITY)),
        };

        let manager =
            BlockManager::new(ManagerConfig::from(&opts), genesis_from_opts(&opts), collaborators)
                .await?;

        manager.run(cancel).await?;
        Ok::<_, eyre::Report>(())
    };

    run_until_shutdown(run_manager, shutdown_signal, on_shutdown).await
}

/// Injects the lines read from stdin into the sequencer until stdin is closed.
///
/// Reads run on a dedicated thread: a blocking stdin read cannot be cancelled, and the
/// thread must not hold up the runtime shutdown.
fn spawn_stdin_injector(sequencer: InMemorySequencer) {
    let handle = tokio::runtime::Handle::current();
    let spawned = std::thread::Builder::new().name("stdin-txs".to_owned()).spawn(move || {
        match handle.block_on(inject_lines(io::stdin().lock(), &sequencer)) {
            Ok(count) => debug!(count, "Stdin closed, stopped injecting transactions"),
            Err(e) => warn!(error = %e, "Failed to read transactions from stdin"),
        }
    });

    if let Err(e) = spawned {
        warn!(error = %e, "Failed to spawn the stdin transaction reader");
    }
}

/// Injects every non-empty line of `reader` as a transaction. Returns the number of
/// injected transactions.
async fn inject_lines(reader: impl BufRead, sequencer: &InMemorySequencer) -> io::Result<usize> {
    let mut count = 0;

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        sequencer.inject_tx(line.as_bytes().to_vec().into()).await;
        count += 1;
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use lumen_clients::sequencer::Sequencer;

    use super::*;

    #[tokio::test]
    async fn stdin_lines_become_transactions() {
        let sequencer = InMemorySequencer::default();
        let input: &[u8] = b"transfer\n\n  mint  \n";

        assert_eq!(inject_lines(input, &sequencer).await.unwrap(), 2);
        assert_eq!(sequencer.pending_txs().await, 2);

        let batch = sequencer.next_batch().await.unwrap();
        let txs = batch.transactions.iter().map(|tx| tx.to_vec()).collect::<Vec<_>>();
        assert_eq!(txs, vec![b"transfer".to_vec(), b"mint".to_vec()]);
    }
}
