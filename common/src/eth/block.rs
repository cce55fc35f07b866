use serde::{Deserialize, Serialize};
use web3::helpers as w3h;
use web3::types::{BlockNumber, U256, U64};
use web3::{Transport, Web3};

/// Header fields of a block, the transactions list is not requested.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct BlockHeader {
    /// Block number. None if pending.
    pub number: Option<U64>,
    /// Base fee per unit of gas (if past London)
    #[serde(rename = "baseFeePerGas", default, skip_serializing_if = "Option::is_none")]
    pub base_fee_per_gas: Option<U256>,
}

// Read block header with specified block number
pub async fn read_block<T: Transport>(
    web3s: &Web3<T>,
    block_number: BlockNumber,
) -> anyhow::Result<BlockHeader> {
    tracing::trace!("Reading block: {block_number:?}");
    let num = w3h::serialize(&block_number);
    let include_txs = w3h::serialize(&false);
    let block = web3s
        .transport()
        .execute("eth_getBlockByNumber", vec![num, include_txs])
        .await
        .map_err(|e| anyhow::format_err!("Failed to query block {block_number:?}: {e}"))?;

    if block.is_null() {
        anyhow::bail!("Block {block_number:?} was not found");
    }

    serde_json::from_value(block).map_err(|e| anyhow::format_err!("Failed to decode block: {e}"))
}

pub async fn latest_base_fee<T: Transport>(web3s: &Web3<T>) -> anyhow::Result<U256> {
    let block = read_block(web3s, BlockNumber::Latest).await?;
    block
        .base_fee_per_gas
        .ok_or(anyhow::format_err!("Latest block has no base fee"))
}
