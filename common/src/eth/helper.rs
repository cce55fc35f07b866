use web3::types::{Address, U256};

pub const ETH_DECIMALS: usize = 18;
pub const GWEI_DECIMALS: usize = 9;

pub fn wei_to_eth(wei_val: U256) -> f64 {
    let res = wei_val.low_u128() as f64;
    res / 1_000_000_000_000_000_000.0
}

/// Exact decimal representation of a wei amount in ETH, without trailing zeros.
pub fn format_eth(wei_val: U256) -> String {
    let unit = U256::exp10(ETH_DECIMALS);
    let whole = wei_val / unit;
    let fraction = wei_val % unit;
    if fraction.is_zero() {
        return whole.to_string();
    }
    let fraction = format!("{:0>width$}", fraction.to_string(), width = ETH_DECIMALS);
    format!("{whole}.{}", fraction.trim_end_matches('0'))
}

/// Parse a decimal amount ("1.01", "5", "0.201") into the smallest unit with
/// the given number of decimals.
pub fn parse_units(amount: &str, decimals: usize) -> anyhow::Result<U256> {
    let amount = amount.trim();
    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));
    if whole.is_empty() && fraction.is_empty() {
        anyhow::bail!("Empty amount");
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        anyhow::bail!("Amount is not a decimal number: {amount}");
    }
    if fraction.len() > decimals {
        anyhow::bail!("Amount {amount} has more than {decimals} decimals");
    }

    let unit = U256::exp10(decimals);
    let whole = if whole.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(whole)
            .map_err(|e| anyhow::format_err!("Failed to parse amount {amount}: {e:?}"))?
    };
    let fraction = if fraction.is_empty() {
        U256::zero()
    } else {
        let padded = format!("{fraction:0<decimals$}");
        U256::from_dec_str(&padded)
            .map_err(|e| anyhow::format_err!("Failed to parse amount {amount}: {e:?}"))?
    };

    whole
        .checked_mul(unit)
        .and_then(|w| w.checked_add(fraction))
        .ok_or(anyhow::format_err!("Amount {amount} is too large"))
}

pub fn eth_to_wei(amount: &str) -> anyhow::Result<U256> {
    parse_units(amount, ETH_DECIMALS)
}

/// Lower case hex of the address, without the `0x` prefix.
pub fn address_hex(address: &Address) -> String {
    hex::encode(address.as_bytes())
}
