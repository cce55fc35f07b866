use std::collections::HashMap;
use std::sync::Mutex;
use web3::types::Address;

/// Active and alternate network of one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPair {
    pub current: String,
    pub alternate: String,
}

/// Per address network assignment. Switching is a pure swap of the pair.
#[derive(Debug, Default)]
pub struct AddressState {
    address_states: Mutex<HashMap<Address, NetworkPair>>,
}

impl AddressState {
    pub fn new(
        addresses: impl IntoIterator<Item = Address>,
        initial_network: &str,
        alternate_network: &str,
    ) -> Self {
        let address_states = addresses
            .into_iter()
            .map(|address| {
                let pair = NetworkPair {
                    current: initial_network.to_string(),
                    alternate: alternate_network.to_string(),
                };
                (address, pair)
            })
            .collect();
        Self {
            address_states: Mutex::new(address_states),
        }
    }

    pub fn pair(&self, address: &Address) -> anyhow::Result<NetworkPair> {
        let states = self
            .address_states
            .lock()
            .map_err(|e| anyhow::format_err!("Network state lock is poisoned: {e}"))?;
        states
            .get(address)
            .cloned()
            .ok_or(anyhow::format_err!("Unknown address: {address:?}"))
    }

    pub fn get_network(&self, address: &Address) -> anyhow::Result<String> {
        Ok(self.pair(address)?.current)
    }

    pub fn alternate_network(&self, address: &Address) -> anyhow::Result<String> {
        Ok(self.pair(address)?.alternate)
    }

    /// Swap current and alternate network, returns the new current one.
    pub fn switch_network(&self, address: &Address) -> anyhow::Result<String> {
        let mut states = self
            .address_states
            .lock()
            .map_err(|e| anyhow::format_err!("Network state lock is poisoned: {e}"))?;
        let pair = states
            .get_mut(address)
            .ok_or(anyhow::format_err!("Unknown address: {address:?}"))?;
        std::mem::swap(&mut pair.current, &mut pair.alternate);
        tracing::info!("{address:?} switched to {}", pair.current);
        Ok(pair.current.clone())
    }
}
