//! Bridge call data templates.
//!
//! A template is a fixed hex payload with one embedded recipient address. The
//! address field position is part of the configuration and is checked against
//! the ABI layout of the call data (4-byte selector followed by 32-byte words)
//! before the template is used.

use serde::Deserialize;
use std::str::FromStr;
use web3::types::Address;

const HEX_PREFIX: &str = "0x";
const SELECTOR_SIZE: usize = 8; // Number of hex chars in the function selector
const WORD_SIZE: usize = 64; // Number of hex chars in one function argument
const ADDRESS_SIZE: usize = 40; // Number of hex chars in an address
const ADDRESS_PREFIX_SIZE: usize = WORD_SIZE - ADDRESS_SIZE; // Leading zeros in address argument

/// Width of the rewritten field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressField {
    /// Only the 40 address chars are overwritten
    Address,
    /// The whole 64 char word is overwritten with the zero padded address
    Word,
}

impl AddressField {
    pub fn width(self) -> usize {
        match self {
            AddressField::Address => ADDRESS_SIZE,
            AddressField::Word => WORD_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PayloadTemplate {
    /// Hex call data with `0x` prefix
    pub data: String,
    /// Char offset of the address field in `data`, prefix included
    pub offset: usize,
    pub field: AddressField,
}

impl PayloadTemplate {
    /// Check that the template is well formed hex call data and that the
    /// configured field covers the low 20 bytes of one argument word whose
    /// high 12 bytes are zero.
    pub fn validate(&self) -> anyhow::Result<()> {
        let body = self
            .data
            .strip_prefix(HEX_PREFIX)
            .ok_or(anyhow::format_err!("Payload must start with {HEX_PREFIX}"))?;
        hex::decode(body).map_err(|e| anyhow::format_err!("Payload is not valid hex: {e}"))?;
        if body.len() < SELECTOR_SIZE + WORD_SIZE || (body.len() - SELECTOR_SIZE) % WORD_SIZE != 0 {
            anyhow::bail!(
                "Payload is not a selector followed by 32-byte words, length {}",
                body.len()
            );
        }

        let (word_start, field_end) = self.word_range()?;
        if field_end > self.data.len() {
            anyhow::bail!(
                "Address field {}..{field_end} is out of payload bounds {}",
                self.offset,
                self.data.len()
            );
        }
        let padding = &self.data[word_start..word_start + ADDRESS_PREFIX_SIZE];
        if padding.chars().any(|c| c != '0') {
            anyhow::bail!(
                "Word at {word_start} is not an address argument, padding is `{padding}`"
            );
        }
        Ok(())
    }

    /// Range of the argument word that holds the address field.
    fn word_range(&self) -> anyhow::Result<(usize, usize)> {
        let args_start = HEX_PREFIX.len() + SELECTOR_SIZE;
        let field_end = self.offset + self.field.width();
        if field_end < args_start + WORD_SIZE || (field_end - args_start) % WORD_SIZE != 0 {
            anyhow::bail!(
                "Address field {}..{field_end} is not aligned to the end of an argument word",
                self.offset
            );
        }
        Ok((field_end - WORD_SIZE, field_end))
    }

    /// Address currently embedded in the template.
    pub fn decode_address(&self) -> anyhow::Result<Address> {
        let (_, field_end) = self.word_range()?;
        let address = self
            .data
            .get(field_end - ADDRESS_SIZE..field_end)
            .ok_or(anyhow::format_err!("Address field is out of payload bounds"))?;
        Address::from_str(address)
            .map_err(|e| anyhow::format_err!("Failed to decode embedded address: {e}"))
    }

    pub fn replace_address(&self, address: &str) -> anyhow::Result<String> {
        replace_address(&self.data, self.offset, self.field, address)
    }
}

/// Lower case hex of the address without prefix, exactly 40 chars.
pub fn clean_address(address: &str) -> anyhow::Result<String> {
    let clean = address.to_lowercase().replace(HEX_PREFIX, "");
    if clean.len() != ADDRESS_SIZE {
        anyhow::bail!(
            "Address length should be {ADDRESS_SIZE} chars, got {}",
            clean.len()
        );
    }
    Ok(clean)
}

/// Overwrite the field at `offset` with the address.
///
/// Only the field changes, the output has the template length.
pub fn replace_address(
    template: &str,
    offset: usize,
    field: AddressField,
    address: &str,
) -> anyhow::Result<String> {
    let clean = clean_address(address)?;
    let value = match field {
        AddressField::Address => clean,
        AddressField::Word => format!("{clean:0>width$}", width = WORD_SIZE),
    };
    let end = offset + field.width();
    let head = template
        .get(..offset)
        .ok_or(anyhow::format_err!("Address offset {offset} is out of payload bounds"))?;
    let tail = template
        .get(end..)
        .ok_or(anyhow::format_err!("Address field end {end} is out of payload bounds"))?;
    Ok(format!("{head}{value}{tail}"))
}
