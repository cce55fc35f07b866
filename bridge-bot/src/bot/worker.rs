use crate::bot::context::BotContext;
use crate::bot::report::BotEvent;
use common::eth::account::Account;
use common::eth::helper::address_hex;
use common::eth::transfer::send_bridge_transaction;
use common::eth::{get_balance, Connector};
use common::network::Network;
use std::sync::Arc;
use std::time::Duration;
use web3::types::U256;
use web3::Web3;

// Pause after a connection failure or when both networks are short of funds
const RETRY_PAUSE: Duration = Duration::from_secs(3);
// Pause after an unexpected cycle error
const ERROR_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Sent,
    SendFailed,
    /// Balance is below the threshold on both networks
    Skipped,
    ConnectionFailed,
}

/// Bridge loop of one account.
pub struct Worker<C: Connector> {
    ctx: Arc<BotContext<C>>,
    account: Account,
}

impl<C: Connector> Worker<C> {
    pub fn new(ctx: Arc<BotContext<C>>, account: Account) -> Self {
        Self { ctx, account }
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Run cycles until the bot is stopped.
    pub async fn run(self) {
        let account = self.account();
        tracing::info!("Start bridge loop for {:?} ({})", account.address, account.label);
        while self.ctx.is_running() {
            let pause = self.step().await;
            if !self.ctx.pause(pause).await {
                break;
            }
        }
        tracing::info!("Bridge loop for {:?} stopped", account.address);
    }

    /// Run one cycle and return the pause before the next one.
    pub async fn step(&self) -> Duration {
        match self.run_cycle().await {
            Ok(CycleOutcome::Sent | CycleOutcome::SendFailed) => self.ctx.profile.random_wait(),
            Ok(CycleOutcome::Skipped | CycleOutcome::ConnectionFailed) => RETRY_PAUSE,
            Err(e) => {
                tracing::error!("Failed to process address {:?}: {e}", self.account.address);
                ERROR_PAUSE
            }
        }
    }

    /// Check balance, switch networks if needed and send one transaction.
    pub async fn run_cycle(&self) -> anyhow::Result<CycleOutcome> {
        let address = self.account.address;
        let current = self.ctx.state.get_network(&address)?;
        let threshold = self.ctx.profile.threshold;

        let mut network = self.ctx.config.network(&current)?;
        let mut web3s = match self.ctx.connector.connect(network).await {
            Ok(web3s) => web3s,
            Err(e) => {
                tracing::error!("{e}");
                return Ok(CycleOutcome::ConnectionFailed);
            }
        };

        let balance = get_balance(&web3s, address).await?;
        if balance < threshold {
            let alternate_name = self.ctx.state.alternate_network(&address)?;
            tracing::warn!(
                "{address:?} balance on {current} is below {threshold} wei, trying {alternate_name}"
            );
            self.ctx
                .report(BotEvent::LowBalance {
                    address,
                    network: current,
                    alternate: alternate_name.clone(),
                })
                .await;

            let alternate = self.ctx.config.network(&alternate_name)?;
            let (alt_web3s, alt_balance) = match self.query_balance(alternate).await {
                Ok(res) => res,
                Err(e) => {
                    tracing::error!("Alternate network check failed: {e}");
                    return Ok(CycleOutcome::ConnectionFailed);
                }
            };
            if alt_balance < threshold {
                tracing::info!("Balance is too low on both networks, skip {address:?}");
                self.ctx.report(BotEvent::Skipped { address }).await;
                return Ok(CycleOutcome::Skipped);
            }

            let new_network = self.ctx.state.switch_network(&address)?;
            self.ctx
                .report(BotEvent::Switched {
                    address,
                    network: new_network,
                })
                .await;
            network = alternate;
            web3s = alt_web3s;
        }

        self.send(&web3s, network).await
    }

    async fn send(&self, web3s: &Web3<C::Transport>, network: &Network) -> anyhow::Result<CycleOutcome> {
        let route = self.ctx.profile.route(&network.name)?;
        let template = self.ctx.config.payload(route)?;
        let data = match template.replace_address(&address_hex(&self.account.address)) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("Invalid address format: {e}");
                return Ok(CycleOutcome::SendFailed);
            }
        };

        match send_bridge_transaction(web3s, &self.account, network, &data, &self.ctx.send_params)
            .await
        {
            Ok(receipt) => {
                let total = self.ctx.record_success();
                let reward_balance = self.reward_balance().await;
                self.ctx
                    .report(BotEvent::Sent {
                        label: self.account.label.clone(),
                        address: self.account.address,
                        network: network.name.clone(),
                        route: route.to_string(),
                        receipt,
                        reward_balance,
                        total,
                    })
                    .await;
                Ok(CycleOutcome::Sent)
            }
            Err(_) => {
                self.ctx
                    .report(BotEvent::SendFailed {
                        label: self.account.label.clone(),
                        address: self.account.address,
                        network: network.name.clone(),
                    })
                    .await;
                Ok(CycleOutcome::SendFailed)
            }
        }
    }

    async fn query_balance(
        &self,
        network: &Network,
    ) -> anyhow::Result<(Web3<C::Transport>, U256)> {
        let web3s = self.ctx.connector.connect(network).await?;
        let balance = get_balance(&web3s, self.account.address).await?;
        Ok((web3s, balance))
    }

    async fn reward_balance(&self) -> Option<U256> {
        let name = self.ctx.profile.reward_network.as_ref()?;
        let network = match self.ctx.config.network(name) {
            Ok(network) => network,
            Err(e) => {
                tracing::warn!("{e}");
                return None;
            }
        };
        match self.query_balance(network).await {
            Ok((_, balance)) => Some(balance),
            Err(e) => {
                tracing::warn!("Failed to query {name} balance: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CycleOutcome, Worker};
    use crate::bot::context::BotContext;
    use crate::bot::report::BotEvent;
    use common::eth::account::Account;
    use common::eth::helper::eth_to_wei;
    use common::eth::mock::{MockConnector, MockTransport};
    use common::eth::transfer::SendParams;
    use common::helper::resources::BRIDGE_CONFIG;
    use common::network::state::AddressState;
    use common::network::BridgeConfig;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const BASE_CHAIN_ID: u64 = 84532;
    const OP_CHAIN_ID: u64 = 11155420;
    const B2N_CHAIN_ID: u64 = 334;

    struct Setup {
        worker: Worker<MockConnector>,
        ctx: Arc<BotContext<MockConnector>>,
        base: MockTransport,
        op: MockTransport,
        events: mpsc::Receiver<BotEvent>,
    }

    fn setup(base_balance: &str, op_balance: &str) -> anyhow::Result<Setup> {
        let config = BridgeConfig::from_json(BRIDGE_CONFIG)?;
        let profile = config.profile("t3rn-base-op")?.clone();
        let mut send_params = SendParams::from_profile(&profile);
        send_params.receipt_poll_interval = Duration::from_millis(10);

        let account = Account::from_key(TEST_KEY, "main")?;
        let state = AddressState::new([account.address], "Base", "OP Sepolia");

        let base = MockTransport::chain(BASE_CHAIN_ID, eth_to_wei(base_balance)?);
        let op = MockTransport::chain(OP_CHAIN_ID, eth_to_wei(op_balance)?);
        let connector = MockConnector::default();
        connector.add("Base", base.clone());
        connector.add("OP Sepolia", op.clone());
        connector.add("b2n", MockTransport::chain(B2N_CHAIN_ID, eth_to_wei("7")?));

        let (events_tx, events) = mpsc::channel(16);
        let ctx = Arc::new(BotContext::new(
            config,
            profile,
            send_params,
            state,
            connector,
            events_tx,
        ));
        Ok(Setup {
            worker: Worker::new(ctx.clone(), account),
            ctx,
            base,
            op,
            events,
        })
    }

    #[tokio::test]
    pub async fn send_on_current_network() -> anyhow::Result<()> {
        let mut setup = setup("1.02", "0")?;
        let outcome = setup.worker.run_cycle().await?;

        assert_eq!(outcome, CycleOutcome::Sent);
        assert_eq!(setup.base.request_count("eth_sendRawTransaction"), 1);
        assert_eq!(setup.op.request_count("eth_getBalance"), 0);
        assert_eq!(setup.ctx.successful_txs(), 1);
        let address = setup.worker.account().address;
        assert_eq!(setup.ctx.state.get_network(&address)?, "Base");

        match setup.events.try_recv()? {
            BotEvent::Sent {
                network,
                route,
                reward_balance,
                total,
                ..
            } => {
                assert_eq!(network, "Base");
                assert_eq!(route, "Base - OP Sepolia");
                assert_eq!(reward_balance, Some(eth_to_wei("7")?));
                assert_eq!(total, 1);
            }
            event => anyhow::bail!("Unexpected event: {event:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    pub async fn switch_to_alternate_network() -> anyhow::Result<()> {
        let mut setup = setup("0.5", "2")?;
        let outcome = setup.worker.run_cycle().await?;

        assert_eq!(outcome, CycleOutcome::Sent);
        assert_eq!(setup.base.request_count("eth_sendRawTransaction"), 0);
        assert_eq!(setup.op.request_count("eth_sendRawTransaction"), 1);
        let address = setup.worker.account().address;
        assert_eq!(setup.ctx.state.get_network(&address)?, "OP Sepolia");

        assert!(matches!(setup.events.try_recv()?, BotEvent::LowBalance { .. }));
        assert!(matches!(setup.events.try_recv()?, BotEvent::Switched { .. }));
        match setup.events.try_recv()? {
            BotEvent::Sent { network, route, .. } => {
                assert_eq!(network, "OP Sepolia");
                assert_eq!(route, "OP - Base");
            }
            event => anyhow::bail!("Unexpected event: {event:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    pub async fn skip_when_both_networks_are_low() -> anyhow::Result<()> {
        let setup = setup("0.5", "1.009")?;
        let outcome = setup.worker.run_cycle().await?;

        assert_eq!(outcome, CycleOutcome::Skipped);
        assert_eq!(setup.base.request_count("eth_sendRawTransaction"), 0);
        assert_eq!(setup.op.request_count("eth_sendRawTransaction"), 0);
        let address = setup.worker.account().address;
        assert_eq!(setup.ctx.state.get_network(&address)?, "Base");
        assert_eq!(setup.worker.step().await, super::RETRY_PAUSE);
        Ok(())
    }

    #[tokio::test]
    pub async fn threshold_is_inclusive() -> anyhow::Result<()> {
        let setup = setup("1.01", "0")?;
        assert_eq!(setup.worker.run_cycle().await?, CycleOutcome::Sent);
        Ok(())
    }

    #[tokio::test]
    pub async fn connection_failure() -> anyhow::Result<()> {
        let setup = setup("2", "2")?;
        setup.base.fail("eth_chainId", "connection refused");
        assert_eq!(setup.worker.run_cycle().await?, CycleOutcome::ConnectionFailed);
        assert_eq!(setup.ctx.successful_txs(), 0);
        Ok(())
    }

    #[tokio::test]
    pub async fn alternate_check_failure() -> anyhow::Result<()> {
        let setup = setup("0.1", "2")?;
        setup.op.fail("eth_getBalance", "timeout");
        assert_eq!(setup.worker.run_cycle().await?, CycleOutcome::ConnectionFailed);
        let address = setup.worker.account().address;
        assert_eq!(setup.ctx.state.get_network(&address)?, "Base");
        Ok(())
    }

    #[tokio::test]
    pub async fn failed_send_continues() -> anyhow::Result<()> {
        let mut setup = setup("2", "0")?;
        setup.base.fail("eth_estimateGas", "execution reverted");
        assert_eq!(setup.worker.run_cycle().await?, CycleOutcome::SendFailed);
        assert_eq!(setup.ctx.successful_txs(), 0);
        assert!(matches!(setup.events.try_recv()?, BotEvent::SendFailed { .. }));

        // Next cycle succeeds once the node accepts the estimate again
        setup.base.respond("eth_estimateGas", serde_json::json!("0x1d4c0"));
        assert_eq!(setup.worker.run_cycle().await?, CycleOutcome::Sent);
        assert_eq!(setup.ctx.successful_txs(), 1);
        Ok(())
    }

    #[tokio::test]
    pub async fn balance_error_is_a_cycle_error() -> anyhow::Result<()> {
        let setup = setup("2", "0")?;
        setup.base.fail("eth_getBalance", "internal error");
        assert!(setup.worker.run_cycle().await.is_err());
        assert_eq!(setup.worker.step().await, super::ERROR_PAUSE);
        Ok(())
    }
}
