use crate::helper::resources::BRIDGE_CONFIG;
use crate::helper::{deserialize_eth, deserialize_gwei};
use crate::payload::PayloadTemplate;
use rand::Rng;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::time::Duration;
use web3::types::{Address, U256};

pub mod state;

const CONFIG_PATH_ENV: &str = "BRIDGE_CONFIG_PATH";
const PROFILE_ENV: &str = "BRIDGE_PROFILE";
const DEFAULT_PROFILE: &str = "t3rn-base-op";
const DEFAULT_GAS_MARGIN: u64 = 50_000;
const DEFAULT_PRIORITY_FEE: u64 = 5_000_000_000; // 5 gwei

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Network {
    #[serde(default)]
    pub name: String,
    pub rpc_urls: Vec<String>,
    pub chain_id: u64,
    /// Bridge contract, absent for networks that are only queried for balances
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub explorer_url: String,
}

impl Network {
    pub fn contract(&self) -> anyhow::Result<Address> {
        self.contract_address
            .ok_or(anyhow::format_err!("Network {} has no bridge contract", self.name))
    }

    pub fn explorer_link(&self, tx_hash: &str) -> String {
        format!("{}{tx_hash}", self.explorer_url)
    }
}

fn default_gas_margin() -> u64 {
    DEFAULT_GAS_MARGIN
}

fn default_priority_fee() -> U256 {
    U256::from(DEFAULT_PRIORITY_FEE)
}

/// One variant of the bot: what is sent, when to switch and how long to wait.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Profile {
    #[serde(deserialize_with = "deserialize_eth")]
    pub value: U256,
    #[serde(deserialize_with = "deserialize_eth")]
    pub threshold: U256,
    pub wait_min_ms: u64,
    pub wait_max_ms: u64,
    pub initial_network: String,
    pub alternate_network: String,
    /// Source network name -> payload template name
    pub routes: BTreeMap<String, String>,
    #[serde(default = "default_gas_margin")]
    pub gas_margin: u64,
    #[serde(
        rename = "priority_fee_gwei",
        default = "default_priority_fee",
        deserialize_with = "deserialize_gwei"
    )]
    pub priority_fee: U256,
    /// Network queried for the reward token balance after each send
    #[serde(default)]
    pub reward_network: Option<String>,
}

impl Profile {
    pub fn route(&self, network: &str) -> anyhow::Result<&str> {
        self.routes
            .get(network)
            .map(String::as_str)
            .ok_or(anyhow::format_err!("No bridge route from network {network}"))
    }

    /// Uniformly random pause between two send attempts.
    pub fn random_wait(&self) -> Duration {
        let millis = rand::thread_rng().gen_range(self.wait_min_ms..=self.wait_max_ms);
        Duration::from_millis(millis)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    pub networks: BTreeMap<String, Network>,
    pub payloads: BTreeMap<String, PayloadTemplate>,
    pub profiles: BTreeMap<String, Profile>,
}

impl BridgeConfig {
    /// Load configuration from the file in `BRIDGE_CONFIG_PATH` or the
    /// embedded default.
    pub fn load() -> anyhow::Result<Self> {
        match env::var(CONFIG_PATH_ENV) {
            Ok(path) => {
                tracing::info!("Load bridge config from {path}");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| anyhow::format_err!("Failed to read {CONFIG_PATH_ENV}: {e}"))?;
                Self::from_json(&contents)
            }
            Err(_) => {
                tracing::info!("Load embedded bridge config");
                Self::from_json(BRIDGE_CONFIG)
            }
        }
    }

    pub fn from_json(contents: &str) -> anyhow::Result<Self> {
        let mut config: BridgeConfig = serde_json::from_str(contents)
            .map_err(|e| anyhow::format_err!("Failed to decode bridge config: {e}"))?;
        for (name, network) in config.networks.iter_mut() {
            network.name = name.clone();
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, template) in &self.payloads {
            template
                .validate()
                .map_err(|e| anyhow::format_err!("Invalid payload `{name}`: {e}"))?;
        }
        for (name, network) in &self.networks {
            if network.rpc_urls.is_empty() {
                anyhow::bail!("Network {name} has no RPC endpoints");
            }
        }
        for (name, profile) in &self.profiles {
            self.validate_profile(profile)
                .map_err(|e| anyhow::format_err!("Invalid profile `{name}`: {e}"))?;
        }
        Ok(())
    }

    fn validate_profile(&self, profile: &Profile) -> anyhow::Result<()> {
        if profile.initial_network == profile.alternate_network {
            anyhow::bail!("Initial and alternate networks must differ");
        }
        if profile.wait_min_ms > profile.wait_max_ms {
            anyhow::bail!(
                "Wait bounds are inverted: {} > {}",
                profile.wait_min_ms,
                profile.wait_max_ms
            );
        }
        for network in [&profile.initial_network, &profile.alternate_network] {
            self.network(network)?.contract()?;
            let route = profile.route(network)?;
            self.payload(route)?;
        }
        if let Some(reward_network) = &profile.reward_network {
            self.network(reward_network)?;
        }
        Ok(())
    }

    pub fn network(&self, name: &str) -> anyhow::Result<&Network> {
        self.networks
            .get(name)
            .ok_or(anyhow::format_err!("Unknown network: {name}"))
    }

    pub fn payload(&self, name: &str) -> anyhow::Result<&PayloadTemplate> {
        self.payloads
            .get(name)
            .ok_or(anyhow::format_err!("Bridge payload {name} is not available"))
    }

    pub fn profile(&self, name: &str) -> anyhow::Result<&Profile> {
        self.profiles
            .get(name)
            .ok_or(anyhow::format_err!("Unknown profile: {name}"))
    }
}

pub fn get_profile_name() -> String {
    let profile = env::var(PROFILE_ENV).unwrap_or(DEFAULT_PROFILE.to_string());
    tracing::info!("Bridge profile: {profile}");
    profile
}
