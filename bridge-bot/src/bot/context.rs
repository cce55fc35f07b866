use crate::bot::report::BotEvent;
use common::eth::transfer::SendParams;
use common::eth::Connector;
use common::network::state::AddressState;
use common::network::{BridgeConfig, Profile};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// State shared by all workers of one bot run.
pub struct BotContext<C: Connector> {
    pub config: BridgeConfig,
    pub profile: Profile,
    pub send_params: SendParams,
    pub state: AddressState,
    pub connector: C,
    successful_txs: AtomicU64,
    stop: watch::Sender<bool>,
    events: mpsc::Sender<BotEvent>,
}

impl<C: Connector> BotContext<C> {
    pub fn new(
        config: BridgeConfig,
        profile: Profile,
        send_params: SendParams,
        state: AddressState,
        connector: C,
        events: mpsc::Sender<BotEvent>,
    ) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            config,
            profile,
            send_params,
            state,
            connector,
            successful_txs: AtomicU64::new(0),
            stop,
            events,
        }
    }

    pub fn successful_txs(&self) -> u64 {
        self.successful_txs.load(Ordering::SeqCst)
    }

    /// Count a mined transaction, returns the new total.
    pub fn record_success(&self) -> u64 {
        self.successful_txs.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_running(&self) -> bool {
        !*self.stop.borrow()
    }

    /// Ask every worker to stop before its next cycle.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    /// Sleep for the duration unless stopped first. Returns false if the bot
    /// was stopped.
    pub async fn pause(&self, duration: Duration) -> bool {
        let mut stop = self.stop.subscribe();
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_running(),
            _ = stop.wait_for(|stopped| *stopped) => false,
        }
    }

    pub async fn report(&self, event: BotEvent) {
        if self.events.send(event).await.is_err() {
            tracing::trace!("Status reporter is gone");
        }
    }
}
