mod context;
mod report;
mod worker;

use crate::bot::context::BotContext;
use crate::bot::report::run_reporter;
use crate::bot::worker::Worker;
use common::eth::account::{load_accounts, Account};
use common::eth::transfer::SendParams;
use common::eth::{Connector, HttpConnector};
use common::network::state::AddressState;
use common::network::{get_profile_name, BridgeConfig};
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const EVENTS_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// One task per account
    #[default]
    Parallel,
    /// One task visiting the accounts in turn
    Sequential,
}

impl FromStr for RunMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "parallel" => Ok(RunMode::Parallel),
            "sequential" => Ok(RunMode::Sequential),
            other => anyhow::bail!("Unknown run mode: {other}"),
        }
    }
}

fn get_run_mode() -> anyhow::Result<RunMode> {
    match std::env::var("BRIDGE_MODE") {
        Ok(mode) => mode.parse(),
        Err(_) => Ok(RunMode::default()),
    }
}

pub async fn run_bot() -> anyhow::Result<()> {
    let config = BridgeConfig::load()?;
    let profile_name = get_profile_name();
    let profile = config.profile(&profile_name)?.clone();
    let mode = get_run_mode()?;
    let accounts = load_accounts()?;
    tracing::info!(
        "Loaded {} accounts, profile: {profile_name}, mode: {mode:?}",
        accounts.len()
    );

    let send_params = SendParams::from_profile(&profile);
    let state = AddressState::new(
        accounts.iter().map(|account| account.address),
        &profile.initial_network,
        &profile.alternate_network,
    );
    let (events_tx, events_rx) = mpsc::channel(EVENTS_CAPACITY);
    let reporter = tokio::spawn(run_reporter(events_rx));
    let ctx = Arc::new(BotContext::new(
        config,
        profile,
        send_params,
        state,
        HttpConnector,
        events_tx,
    ));

    let workers = spawn_workers(ctx.clone(), accounts, mode);

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::format_err!("Failed to listen for Ctrl-C: {e}"))?;
    tracing::info!("Stop signal received, waiting for workers");
    ctx.stop();

    let second_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };
    if !join_workers(workers, second_signal).await {
        tracing::warn!(
            "Second stop signal received, exit without waiting for in-flight transactions. \
             Successful transactions: {}",
            ctx.successful_txs()
        );
        return Ok(());
    }
    let total = ctx.successful_txs();
    // Reporter finishes once the last event sender is dropped
    drop(ctx);
    if let Err(e) = reporter.await {
        tracing::error!("Status reporter failed: {e}");
    }
    tracing::info!("Bot stopped. Successful transactions: {total}");
    Ok(())
}

/// Wait for every worker unless `interrupt` completes first. Returns false
/// if the wait was interrupted.
async fn join_workers(workers: Vec<JoinHandle<()>>, interrupt: impl Future<Output = ()>) -> bool {
    let join = async {
        for handle in workers {
            if let Err(e) = handle.await {
                tracing::error!("Worker task failed: {e}");
            }
        }
    };
    tokio::select! {
        _ = join => true,
        _ = interrupt => false,
    }
}

pub(crate) fn spawn_workers<C: Connector>(
    ctx: Arc<BotContext<C>>,
    accounts: Vec<Account>,
    mode: RunMode,
) -> Vec<JoinHandle<()>> {
    let workers = accounts
        .into_iter()
        .map(|account| Worker::new(ctx.clone(), account));
    match mode {
        RunMode::Parallel => workers.map(|worker| tokio::spawn(worker.run())).collect(),
        RunMode::Sequential => {
            let workers: Vec<_> = workers.collect();
            vec![tokio::spawn(run_sequential(ctx, workers))]
        }
    }
}

async fn run_sequential<C: Connector>(ctx: Arc<BotContext<C>>, workers: Vec<Worker<C>>) {
    tracing::info!("Start sequential loop over {} accounts", workers.len());
    'outer: while ctx.is_running() {
        for worker in &workers {
            if !ctx.is_running() {
                break 'outer;
            }
            let pause = worker.step().await;
            if !ctx.pause(pause).await {
                break 'outer;
            }
        }
    }
    tracing::info!("Sequential loop stopped");
}

#[cfg(test)]
mod tests {
    use super::{join_workers, spawn_workers, BotContext, RunMode};
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

    const KEYS: [&str; 2] = [
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
    ];

    fn setup() -> anyhow::Result<(
        Arc<BotContext<MockConnector>>,
        Vec<Account>,
        MockTransport,
        mpsc::Receiver<BotEvent>,
    )> {
        let config = BridgeConfig::from_json(BRIDGE_CONFIG)?;
        let mut profile = config.profile("t3rn-base-op")?.clone();
        // Long enough that no worker reaches a second cycle
        profile.wait_min_ms = 60_000;
        profile.wait_max_ms = 60_000;
        let mut send_params = SendParams::from_profile(&profile);
        send_params.receipt_poll_interval = Duration::from_millis(10);

        let accounts = KEYS
            .iter()
            .enumerate()
            .map(|(i, key)| Account::from_key(key, format!("Address {}", i + 1)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let state = AddressState::new(
            accounts.iter().map(|account| account.address),
            &profile.initial_network,
            &profile.alternate_network,
        );

        let base = MockTransport::chain(84532, eth_to_wei("5")?);
        let connector = MockConnector::default();
        connector.add("Base", base.clone());
        connector.add("OP Sepolia", MockTransport::chain(11155420, eth_to_wei("5")?));
        connector.add("b2n", MockTransport::chain(334, eth_to_wei("1")?));

        let (events_tx, events_rx) = mpsc::channel(64);
        let ctx = Arc::new(BotContext::new(
            config,
            profile,
            send_params,
            state,
            connector,
            events_tx,
        ));
        Ok((ctx, accounts, base, events_rx))
    }

    async fn wait_for_successes(ctx: &BotContext<MockConnector>, count: u64) -> anyhow::Result<()> {
        tokio::time::timeout(Duration::from_secs(10), async {
            while ctx.successful_txs() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .map_err(|_| anyhow::format_err!("Workers did not send {count} transactions"))
    }

    #[tokio::test]
    pub async fn parallel_workers_stop_on_signal() -> anyhow::Result<()> {
        let (ctx, accounts, base, _events) = setup()?;
        let workers = spawn_workers(ctx.clone(), accounts, RunMode::Parallel);
        assert_eq!(workers.len(), 2);

        wait_for_successes(&ctx, 2).await?;
        ctx.stop();
        for handle in workers {
            tokio::time::timeout(Duration::from_secs(5), handle).await??;
        }

        assert_eq!(ctx.successful_txs(), 2);
        assert_eq!(base.request_count("eth_sendRawTransaction"), 2);
        Ok(())
    }

    #[tokio::test]
    pub async fn sequential_worker_stops_on_signal() -> anyhow::Result<()> {
        let (ctx, accounts, base, _events) = setup()?;
        let workers = spawn_workers(ctx.clone(), accounts, RunMode::Sequential);
        assert_eq!(workers.len(), 1);

        // The first account sends, then the loop sleeps before the second one
        wait_for_successes(&ctx, 1).await?;
        ctx.stop();
        for handle in workers {
            tokio::time::timeout(Duration::from_secs(5), handle).await??;
        }

        assert_eq!(ctx.successful_txs(), 1);
        assert_eq!(base.request_count("eth_sendRawTransaction"), 1);
        Ok(())
    }

    #[tokio::test]
    pub async fn reporter_receives_sent_events() -> anyhow::Result<()> {
        let (ctx, accounts, _base, mut events) = setup()?;
        let workers = spawn_workers(ctx.clone(), accounts, RunMode::Parallel);
        wait_for_successes(&ctx, 2).await?;
        ctx.stop();
        for handle in workers {
            handle.await?;
        }
        drop(ctx);

        let mut sent = 0;
        while let Some(event) = events.recv().await {
            if matches!(event, BotEvent::Sent { .. }) {
                sent += 1;
            }
        }
        assert_eq!(sent, 2);
        Ok(())
    }

    #[test]
    fn parse_run_mode() -> anyhow::Result<()> {
        assert_eq!("parallel".parse::<RunMode>()?, RunMode::Parallel);
        assert_eq!(" Sequential".parse::<RunMode>()?, RunMode::Sequential);
        assert!("random".parse::<RunMode>().is_err());
        Ok(())
    }

    #[tokio::test]
    pub async fn join_waits_for_workers() -> anyhow::Result<()> {
        let (ctx, accounts, _base, _events) = setup()?;
        let workers = spawn_workers(ctx.clone(), accounts, RunMode::Parallel);
        wait_for_successes(&ctx, 2).await?;
        ctx.stop();
        assert!(join_workers(workers, std::future::pending()).await);
        Ok(())
    }

    #[tokio::test]
    pub async fn second_signal_interrupts_join() {
        // Stands for a worker stuck in a receipt wait
        let stuck = tokio::spawn(tokio::time::sleep(Duration::from_secs(600)));
        let joined = tokio::time::timeout(
            Duration::from_secs(5),
            join_workers(vec![stuck], tokio::time::sleep(Duration::from_millis(20))),
        )
        .await;
        assert_eq!(joined.ok(), Some(false));
    }
}
