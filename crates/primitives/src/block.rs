use alloy_primitives::{Address, B256, Bytes, keccak256};
use alloy_rlp::{Decodable, RlpDecodable, RlpEncodable};
use serde::{Deserialize, Serialize};

use crate::{BLOCK_PROTOCOL_VERSION, BlockHeight, summary::Summary, time::Timestamp};

/// An opaque rollup transaction, as handed out by the sequencer.
pub type Transaction = Bytes;

/// A rollup block header.
///
/// The RLP encoding of the header is both the preimage of its hash and the
/// serialized form that gets published to the DA layer.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, RlpEncodable, RlpDecodable,
)]
pub struct Header {
    /// The block protocol version.
    pub version: u64,
    /// The chain this header belongs to.
    pub chain_id: String,
    /// The block height. Heights are strictly sequential.
    pub height: BlockHeight,
    /// The block timestamp, in UNIX milliseconds.
    pub timestamp: Timestamp,
    /// The hash of the previous block header, zero for the first block.
    pub parent_hash: B256,
    /// The identity of the aggregator that produced the block.
    pub proposer: Address,
    /// The application state commitment after applying this block.
    pub app_hash: B256,
    /// The digest of the ordered transaction list of the block.
    pub data_hash: B256,
}

impl Header {
    /// Returns the keccak-256 hash of the RLP-encoded header.
    pub fn hash(&self) -> B256 {
        keccak256(alloy_rlp::encode(self))
    }

    /// Returns the serialized header.
    pub fn encoded(&self) -> Bytes {
        Bytes::from(alloy_rlp::encode(self))
    }

    /// Decodes a header from its serialized form.
    pub fn decode_bytes(mut buf: &[u8]) -> Result<Self, alloy_rlp::Error> {
        Self::decode(&mut buf)
    }

    /// Returns true if this header is the direct child of `parent`.
    pub fn is_child_of(&self, parent: &Self) -> bool {
        self.height == parent.height + 1 &&
            self.parent_hash == parent.hash() &&
            self.chain_id == parent.chain_id
    }
}

impl Summary for Header {
    fn summary(&self) -> String {
        format!(
            "height={}, hash={}, parent={}, timestamp={}, app_hash={}, data_hash={}",
            self.height,
            self.hash(),
            self.parent_hash,
            self.timestamp,
            self.app_hash,
            self.data_hash
        )
    }
}

/// A block: a [`Header`] paired with its ordered list of transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// The block header.
    pub header: Header,
    /// The transactions of the block, in execution order.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Creates a new block.
    pub const fn new(header: Header, transactions: Vec<Transaction>) -> Self {
        Self { header, transactions }
    }

    /// Returns the block height.
    pub const fn height(&self) -> BlockHeight {
        self.header.height
    }

    /// Returns true if the header commits to the transaction list of the block.
    pub fn has_valid_data_hash(&self) -> bool {
        self.header.data_hash == transactions_digest(&self.transactions)
    }
}

/// Computes the digest committed to by [`Header::data_hash`].
pub fn transactions_digest(transactions: &[Transaction]) -> B256 {
    let mut out = Vec::new();
    alloy_rlp::encode_list::<_, Transaction>(transactions, &mut out);
    keccak256(out)
}

/// The ingredients needed to build a new [`Header`] on top of the current chain tip.
#[derive(Debug, Clone)]
pub struct HeaderTemplate<'a> {
    /// The chain id.
    pub chain_id: &'a str,
    /// The height of the new block.
    pub height: BlockHeight,
    /// The timestamp of the new block.
    pub timestamp: Timestamp,
    /// The hash of the chain tip.
    pub parent_hash: B256,
    /// The producer of the new block.
    pub proposer: Address,
    /// The state commitment returned by the executor.
    pub app_hash: B256,
}

impl HeaderTemplate<'_> {
    /// Seals the template into a [`Block`] carrying the given transactions.
    pub fn seal(self, transactions: Vec<Transaction>) -> Block {
        let header = Header {
            version: BLOCK_PROTOCOL_VERSION,
            chain_id: self.chain_id.to_owned(),
            height: self.height,
            timestamp: self.timestamp,
            parent_hash: self.parent_hash,
            proposer: self.proposer,
            app_hash: self.app_hash,
            data_hash: transactions_digest(&transactions),
        };

        Block::new(header, transactions)
    }
}

/// A batch of transactions handed out by the sequencer. An empty batch is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    /// The transactions in the batch, in the order they must be executed.
    pub transactions: Vec<Transaction>,
}

impl Batch {
    /// Creates a new batch from the given transactions.
    pub const fn new(transactions: Vec<Transaction>) -> Self {
        Self { transactions }
    }

    /// Returns true if the batch carries no transactions.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Returns the number of transactions in the batch.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(height: BlockHeight, parent_hash: B256) -> HeaderTemplate<'static> {
        HeaderTemplate {
            chain_id: "test-chain",
            height,
            timestamp: 1_000 + height,
            parent_hash,
            proposer: Address::repeat_byte(0x11),
            app_hash: B256::repeat_byte(0x22),
        }
    }

    #[test]
    fn header_survives_serialization() {
        let block = template(7, B256::ZERO).seal(vec![Bytes::from_static(b"tx")]);
        let encoded = block.header.encoded();

        let decoded = Header::decode_bytes(&encoded).unwrap();
        assert_eq!(decoded, block.header);
        assert_eq!(decoded.hash(), block.header.hash());
    }

    #[test]
    fn data_hash_commits_to_transaction_order() {
        let a = Bytes::from_static(b"a");
        let b = Bytes::from_static(b"b");

        let block = template(1, B256::ZERO).seal(vec![a.clone(), b.clone()]);
        assert!(block.has_valid_data_hash());
        assert_ne!(transactions_digest(&[a.clone(), b.clone()]), transactions_digest(&[b, a]));
    }

    #[test]
    fn empty_blocks_have_a_stable_data_hash() {
        let first = template(1, B256::ZERO).seal(vec![]);
        let second = template(2, first.header.hash()).seal(vec![]);

        assert_eq!(first.header.data_hash, second.header.data_hash);
        assert!(second.header.is_child_of(&first.header));
        assert!(!first.header.is_child_of(&second.header));
    }
}
