use async_trait::async_trait;
use lumen_primitives::block::Header;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Errors that can occur when broadcasting a header.
#[derive(Debug, Clone, thiserror::Error)]
#[allow(missing_docs)]
pub enum GossipError {
    #[error("no peer is listening for headers")]
    NoPeers,
}

/// The header gossip publisher. Broadcasting is best effort.
#[async_trait]
pub trait HeaderGossip: Send + Sync + 'static {
    /// Broadcasts a freshly produced header to peers.
    async fn broadcast(&self, header: &Header) -> Result<(), GossipError>;
}

/// A gossip publisher that drops every header.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopGossip;

#[async_trait]
impl HeaderGossip for NoopGossip {
    async fn broadcast(&self, _header: &Header) -> Result<(), GossipError> {
        Ok(())
    }
}

/// A gossip publisher backed by a local [`broadcast`] channel.
#[derive(Debug, Clone)]
pub struct BroadcastGossip {
    sender: broadcast::Sender<Header>,
}

impl BroadcastGossip {
    /// Creates a new publisher buffering up to `capacity` headers per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns a stream of the headers broadcast after this call.
    pub fn subscribe(&self) -> BroadcastStream<Header> {
        BroadcastStream::new(self.sender.subscribe())
    }
}

#[async_trait]
impl HeaderGossip for BroadcastGossip {
    async fn broadcast(&self, header: &Header) -> Result<(), GossipError> {
        self.sender.send(header.clone()).map(|_| ()).map_err(|_| GossipError::NoPeers)
    }
}
