use crate::eth::helper::{parse_units, ETH_DECIMALS, GWEI_DECIMALS};
use serde::{Deserialize, Deserializer};
use web3::types::U256;

pub mod resources;
pub mod tracing;

/// Deserialize a decimal ETH amount given as a string ("1.01") into wei.
pub fn deserialize_eth<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_units(&s, ETH_DECIMALS).map_err(serde::de::Error::custom)
}

/// Deserialize a decimal gwei amount given as a string ("5") into wei.
pub fn deserialize_gwei<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_units(&s, GWEI_DECIMALS).map_err(serde::de::Error::custom)
}
