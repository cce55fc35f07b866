use std::env;
use std::fmt;
use std::str::FromStr;
use web3::signing::{Key, SecretKey, SecretKeyRef};
use web3::types::Address;

const KEYS_PATH_ENV: &str = "BRIDGE_KEYS_PATH";

/// Signing account: private key, derived address and a label for the console.
#[derive(Clone)]
pub struct Account {
    pub label: String,
    pub address: Address,
    key: SecretKey,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("label", &self.label)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl Account {
    pub fn from_key(private_key: &str, label: impl Into<String>) -> anyhow::Result<Self> {
        let key = SecretKey::from_str(private_key.trim().trim_start_matches("0x"))
            .map_err(|e| anyhow::format_err!("Failed to load private key: {e}"))?;
        let address = SecretKeyRef::new(&key).address();
        Ok(Self {
            label: label.into(),
            address,
            key,
        })
    }

    pub fn key(&self) -> &SecretKey {
        &self.key
    }
}

/// Parse keys file contents: one private key per line, optionally followed by
/// `,label`. Empty lines and lines starting with `#` are skipped.
pub fn parse_accounts(contents: &str) -> anyhow::Result<Vec<Account>> {
    let mut accounts = vec![];
    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, label) = match line.split_once(',') {
            Some((key, label)) if !label.trim().is_empty() => (key, label.trim().to_string()),
            Some((key, _)) => (key, format!("Address {}", accounts.len() + 1)),
            None => (line, format!("Address {}", accounts.len() + 1)),
        };
        let account = Account::from_key(key, label)
            .map_err(|e| anyhow::format_err!("Invalid key on line {}: {e}", line_no + 1))?;
        accounts.push(account);
    }
    if accounts.is_empty() {
        anyhow::bail!("No private keys were found");
    }
    Ok(accounts)
}

pub fn load_accounts() -> anyhow::Result<Vec<Account>> {
    let keys_path = env::var(KEYS_PATH_ENV)
        .map_err(|e| anyhow::format_err!("Failed to get env {KEYS_PATH_ENV}: {e}"))?;
    let contents = std::fs::read_to_string(&keys_path)
        .map_err(|e| anyhow::format_err!("Failed to read {KEYS_PATH_ENV}: {e}"))?;
    let accounts = parse_accounts(&contents)?;
    tracing::info!("Loaded {} accounts", accounts.len());
    Ok(accounts)
}
