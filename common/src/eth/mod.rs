pub mod account;
mod block;
pub mod helper;
#[cfg(any(test, feature = "mocks"))]
pub mod mock;
pub mod transfer;

pub use block::{latest_base_fee, read_block, BlockHeader};

use crate::network::Network;
use rand::seq::SliceRandom;
use std::future::Future;
use std::time::Duration;
use web3::transports::Http;
use web3::types::{Address, U256};
use web3::{Transport, Web3};

const CONNECT_ATTEMPTS: usize = 3;
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Opens RPC clients for networks. The bot connects through this seam so the
/// HTTP transport can be replaced in tests.
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport<Out: Send> + Send + Sync + 'static;

    fn connect(
        &self,
        network: &Network,
    ) -> impl Future<Output = anyhow::Result<Web3<Self::Transport>>> + Send;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HttpConnector;

impl Connector for HttpConnector {
    type Transport = Http;

    async fn connect(&self, network: &Network) -> anyhow::Result<Web3<Http>> {
        create_web3_connection(network).await
    }
}

/// Connect to a random endpoint of the network, retrying a few times.
pub async fn create_web3_connection(network: &Network) -> anyhow::Result<Web3<Http>> {
    for attempt in 1..=CONNECT_ATTEMPTS {
        let endpoint = network
            .rpc_urls
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or(anyhow::format_err!("Network {} has no RPC endpoints", network.name))?;
        tracing::debug!("Connecting to the {} endpoint: {endpoint}", network.name);

        match Http::new(&endpoint) {
            Ok(transport) => {
                let web3s = Web3::new(transport);
                match check_connection(&web3s, network).await {
                    Ok(()) => return Ok(web3s),
                    Err(e) => tracing::warn!("Attempt {attempt}: {e}"),
                }
            }
            Err(e) => {
                tracing::warn!("Attempt {attempt}: failed to create transport for {endpoint}: {e}")
            }
        }
        tokio::time::sleep(CONNECT_RETRY_DELAY).await;
    }
    anyhow::bail!("Failed to connect to {} network", network.name)
}

/// Check the endpoint answers and serves the configured chain.
pub async fn check_connection<T: Transport>(
    web3s: &Web3<T>,
    network: &Network,
) -> anyhow::Result<()> {
    let chain_id = web3s
        .eth()
        .chain_id()
        .await
        .map_err(|e| anyhow::format_err!("{} endpoint is not reachable: {e}", network.name))?;
    if chain_id != U256::from(network.chain_id) {
        anyhow::bail!(
            "{} endpoint serves chain {chain_id}, expected {}",
            network.name,
            network.chain_id
        );
    }
    Ok(())
}

pub async fn get_balance<T: Transport>(web3s: &Web3<T>, address: Address) -> anyhow::Result<U256> {
    web3s
        .eth()
        .balance(address, None)
        .await
        .map_err(|e| anyhow::format_err!("Failed to query balance of {address:?}: {e}"))
}
