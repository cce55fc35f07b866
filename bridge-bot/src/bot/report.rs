use common::eth::helper::{format_eth, wei_to_eth};
use common::eth::transfer::BridgeReceipt;
use tokio::sync::mpsc;
use web3::types::{Address, U256};

/// Status of a worker, printed by the reporter.
#[derive(Debug, Clone, PartialEq)]
pub enum BotEvent {
    Sent {
        label: String,
        address: Address,
        network: String,
        route: String,
        receipt: BridgeReceipt,
        reward_balance: Option<U256>,
        total: u64,
    },
    SendFailed {
        label: String,
        address: Address,
        network: String,
    },
    LowBalance {
        address: Address,
        network: String,
        alternate: String,
    },
    Switched {
        address: Address,
        network: String,
    },
    Skipped {
        address: Address,
    },
}

pub fn format_event(event: &BotEvent) -> String {
    match event {
        BotEvent::Sent {
            label,
            address,
            network,
            route,
            receipt,
            reward_balance,
            total,
        } => {
            let mut lines = vec![
                format!("Sender: {address:?} ({label}) on {network}"),
                format!(
                    "Gas used: {}",
                    receipt.gas_used.map(|g| g.to_string()).unwrap_or("-".to_string())
                ),
                format!(
                    "Block: {}",
                    receipt
                        .block_number
                        .map(|n| n.to_string())
                        .unwrap_or("-".to_string())
                ),
                format!(
                    "ETH balance: {}",
                    receipt
                        .balance
                        .map(|b| format!("{} ETH", format_eth(b)))
                        .unwrap_or("-".to_string())
                ),
            ];
            if let Some(reward_balance) = reward_balance {
                lines.push(format!("Reward balance: {}", format_eth(*reward_balance)));
            }
            lines.push(format!("Explorer: {}", receipt.explorer_link));
            lines.push(format!(
                "Successful transactions: {total} | Bridge: {route} | Value: {:.5} ETH",
                wei_to_eth(receipt.value)
            ));
            lines.join("\n")
        }
        BotEvent::SendFailed {
            label,
            address,
            network,
        } => format!("Bridge transaction of {address:?} ({label}) on {network} failed"),
        BotEvent::LowBalance {
            address,
            network,
            alternate,
        } => format!("{address:?} balance on {network} is too low, trying {alternate}"),
        BotEvent::Switched { address, network } => {
            format!("{address:?} switched to {network}, balance is sufficient")
        }
        BotEvent::Skipped { address } => {
            format!("Balance is too low on both networks, skip {address:?}")
        }
    }
}

/// Print worker events until every sender is dropped.
pub async fn run_reporter(mut events: mpsc::Receiver<BotEvent>) {
    while let Some(event) = events.recv().await {
        println!("{}\n", format_event(&event));
    }
    tracing::trace!("Status reporter finished");
}
