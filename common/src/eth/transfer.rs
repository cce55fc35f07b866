use crate::eth::account::Account;
use crate::eth::block::latest_base_fee;
use crate::eth::get_balance;
use crate::network::{Network, Profile};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use web3::types::{
    BlockNumber, Bytes, CallRequest, TransactionParameters, TransactionReceipt, H256, U256, U64,
};
use web3::{Transport, Web3};

const ETH_TRANSACTION_TYPE: u64 = 2;
const RECEIPT_TIMEOUT: &str = "BRIDGE_RECEIPT_TIMEOUT_SEC";
const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Fixed parameters of every bridge transaction of a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendParams {
    pub value: U256,
    pub gas_margin: U256,
    pub priority_fee: U256,
    pub receipt_timeout: Duration,
    pub receipt_poll_interval: Duration,
}

impl SendParams {
    pub fn from_profile(profile: &Profile) -> Self {
        let receipt_timeout = env::var(RECEIPT_TIMEOUT)
            .ok()
            .and_then(|s| u64::from_str(&s).ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RECEIPT_TIMEOUT);
        Self {
            value: profile.value,
            gas_margin: U256::from(profile.gas_margin),
            priority_fee: profile.priority_fee,
            receipt_timeout,
            receipt_poll_interval: RECEIPT_POLL_INTERVAL,
        }
    }
}

/// Mined bridge transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeReceipt {
    pub hash: H256,
    pub value: U256,
    pub gas_used: Option<U256>,
    pub block_number: Option<U64>,
    /// Sender balance after the transaction, if it could be read
    pub balance: Option<U256>,
    pub explorer_link: String,
}

/// Stage at which a send attempt was abandoned.
#[derive(Debug)]
pub enum SendError {
    Payload(anyhow::Error),
    Nonce(anyhow::Error),
    GasEstimation(anyhow::Error),
    BaseFee(anyhow::Error),
    Signing(anyhow::Error),
    Submission(anyhow::Error),
    Receipt(anyhow::Error),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Payload(e) => write!(f, "Invalid bridge payload: {e}"),
            SendError::Nonce(e) => write!(f, "Failed to get nonce: {e}"),
            SendError::GasEstimation(e) => write!(f, "Failed to estimate gas: {e}"),
            SendError::BaseFee(e) => write!(f, "Failed to get base fee: {e}"),
            SendError::Signing(e) => write!(f, "Failed to sign transaction: {e}"),
            SendError::Submission(e) => write!(f, "Failed to send transaction: {e}"),
            SendError::Receipt(e) => write!(f, "Failed to confirm transaction: {e}"),
        }
    }
}

impl std::error::Error for SendError {}

/// Build, sign and submit one bridge transaction and wait until it is mined.
///
/// Nothing is retried here, a failed attempt is logged and returned.
pub async fn send_bridge_transaction<T: Transport>(
    web3s: &Web3<T>,
    account: &Account,
    network: &Network,
    data: &str,
    params: &SendParams,
) -> Result<BridgeReceipt, SendError> {
    let result = try_send(web3s, account, network, data, params).await;
    if let Err(e) = &result {
        tracing::error!("{:?} on {}: {e}", account.address, network.name);
    }
    result
}

async fn try_send<T: Transport>(
    web3s: &Web3<T>,
    account: &Account,
    network: &Network,
    data: &str,
    params: &SendParams,
) -> Result<BridgeReceipt, SendError> {
    let contract = network.contract().map_err(SendError::Payload)?;
    let data = hex::decode(data.trim_start_matches("0x"))
        .map(Bytes)
        .map_err(|e| SendError::Payload(anyhow::format_err!("Payload is not valid hex: {e}")))?;

    let nonce = web3s
        .eth()
        .transaction_count(account.address, Some(BlockNumber::Pending))
        .await
        .map_err(|e| SendError::Nonce(e.into()))?;

    let call = CallRequest {
        from: Some(account.address),
        to: Some(contract),
        value: Some(params.value),
        data: Some(data.clone()),
        ..Default::default()
    };
    let gas_estimate = web3s
        .eth()
        .estimate_gas(call, None)
        .await
        .map_err(|e| SendError::GasEstimation(e.into()))?;
    let gas_limit = gas_estimate.checked_add(params.gas_margin).ok_or(SendError::GasEstimation(
        anyhow::format_err!("Gas estimate {gas_estimate} overflows with the margin"),
    ))?;

    let base_fee = latest_base_fee(web3s).await.map_err(SendError::BaseFee)?;
    let max_fee = base_fee.checked_add(params.priority_fee).ok_or(SendError::BaseFee(
        anyhow::format_err!("Base fee {base_fee} overflows with the priority fee"),
    ))?;
    tracing::debug!(
        "{:?} nonce {nonce}, gas limit {gas_limit}, max fee {max_fee}",
        account.address
    );

    let tx = TransactionParameters {
        nonce: Some(nonce),
        to: Some(contract),
        gas: gas_limit,
        gas_price: Some(max_fee),
        value: params.value,
        data,
        chain_id: Some(network.chain_id),
        transaction_type: Some(U64::from(ETH_TRANSACTION_TYPE)),
        max_fee_per_gas: Some(max_fee),
        max_priority_fee_per_gas: Some(params.priority_fee),
        ..Default::default()
    };
    let signed = web3s
        .accounts()
        .sign_transaction(tx, account.key())
        .await
        .map_err(|e| SendError::Signing(e.into()))?;

    let hash = web3s
        .eth()
        .send_raw_transaction(signed.raw_transaction)
        .await
        .map_err(|e| SendError::Submission(e.into()))?;
    tracing::info!("{:?} sent {hash:?} on {}", account.address, network.name);

    let receipt = wait_for_receipt(web3s, hash, params)
        .await
        .map_err(SendError::Receipt)?;
    if receipt.status == Some(U64::from(0)) {
        return Err(SendError::Receipt(anyhow::format_err!(
            "Transaction {hash:?} reverted"
        )));
    }

    let balance = match get_balance(web3s, account.address).await {
        Ok(balance) => Some(balance),
        Err(e) => {
            tracing::warn!("{e}");
            None
        }
    };

    Ok(BridgeReceipt {
        hash,
        value: params.value,
        gas_used: receipt.gas_used,
        block_number: receipt.block_number,
        balance,
        explorer_link: network.explorer_link(&format!("{hash:?}")),
    })
}

async fn wait_for_receipt<T: Transport>(
    web3s: &Web3<T>,
    hash: H256,
    params: &SendParams,
) -> anyhow::Result<TransactionReceipt> {
    let started = Instant::now();
    loop {
        let receipt = web3s
            .eth()
            .transaction_receipt(hash)
            .await
            .map_err(|e| anyhow::format_err!("Failed to get receipt of {hash:?}: {e}"))?;
        if let Some(receipt) = receipt {
            return Ok(receipt);
        }
        if started.elapsed() >= params.receipt_timeout {
            anyhow::bail!(
                "Transaction {hash:?} was not mined in {}s",
                params.receipt_timeout.as_secs()
            );
        }
        tokio::time::sleep(params.receipt_poll_interval).await;
    }
}
