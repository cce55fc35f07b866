//! In-memory `web3::Transport` answering canned JSON per RPC method.

use crate::eth::{check_connection, Connector};
use crate::network::Network;
use futures::future::BoxFuture;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use web3::helpers as w3h;
use web3::types::{H256, U256};
use web3::{RequestId, Transport, Web3};

#[derive(Debug, Clone)]
enum MockResponse {
    Ok(Value),
    Err(String),
}

#[derive(Debug, Default)]
struct MockState {
    // One-shot answers, consumed before the sticky ones
    queued: HashMap<String, VecDeque<MockResponse>>,
    sticky: HashMap<String, MockResponse>,
    requests: Vec<(String, Vec<Value>)>,
}

#[derive(Debug, Default, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport of a healthy chain: every call used by the bot succeeds and
    /// transactions are mined immediately.
    pub fn chain(chain_id: u64, balance: U256) -> Self {
        let transport = Self::new();
        let tx_hash = H256::from_low_u64_be(chain_id);
        transport.respond("eth_chainId", json!(U256::from(chain_id)));
        transport.respond("eth_getBalance", json!(balance));
        transport.respond("eth_getTransactionCount", json!(U256::from(7)));
        transport.respond("eth_estimateGas", json!(U256::from(120_000)));
        transport.respond("eth_gasPrice", json!(U256::from(1_000_000_000u64)));
        transport.respond(
            "eth_getBlockByNumber",
            json!({
                "number": "0x100",
                "baseFeePerGas": json!(U256::from(1_000_000_000u64)),
                "timestamp": "0x1",
            }),
        );
        transport.respond("eth_sendRawTransaction", json!(tx_hash));
        transport.respond("eth_getTransactionReceipt", receipt(tx_hash, 256, 98_000, 1));
        transport
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A test panicking while holding the lock already failed
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Answer every call of the method with the value.
    pub fn respond(&self, method: &str, value: Value) {
        self.lock()
            .sticky
            .insert(method.to_string(), MockResponse::Ok(value));
    }

    /// Answer the next call of the method with the value.
    pub fn respond_once(&self, method: &str, value: Value) {
        self.lock()
            .queued
            .entry(method.to_string())
            .or_default()
            .push_back(MockResponse::Ok(value));
    }

    /// Fail every call of the method.
    pub fn fail(&self, method: &str, message: &str) {
        self.lock()
            .sticky
            .insert(method.to_string(), MockResponse::Err(message.to_string()));
    }

    pub fn requests(&self) -> Vec<(String, Vec<Value>)> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self, method: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|(m, _)| m == method)
            .count()
    }

    fn next_response(&self, method: &str) -> web3::Result<Value> {
        let mut state = self.lock();
        let response = match state.queued.get_mut(method).and_then(|q| q.pop_front()) {
            Some(response) => Some(response),
            None => state.sticky.get(method).cloned(),
        };
        match response {
            Some(MockResponse::Ok(value)) => Ok(value),
            Some(MockResponse::Err(message)) => Err(web3::Error::InvalidResponse(message)),
            None => Err(web3::Error::InvalidResponse(format!(
                "Unexpected call of {method}"
            ))),
        }
    }
}

impl Transport for MockTransport {
    type Out = BoxFuture<'static, web3::Result<Value>>;

    fn prepare(&self, method: &str, params: Vec<Value>) -> (RequestId, jsonrpc_core::Call) {
        let mut state = self.lock();
        state.requests.push((method.to_string(), params.clone()));
        let id = state.requests.len();
        (id, w3h::build_request(id, method, params))
    }

    fn send(&self, _id: RequestId, request: jsonrpc_core::Call) -> Self::Out {
        let response = match request {
            jsonrpc_core::Call::MethodCall(call) => self.next_response(&call.method),
            call => Err(web3::Error::InvalidResponse(format!(
                "Unsupported request: {call:?}"
            ))),
        };
        Box::pin(futures::future::ready(response))
    }
}

/// Receipt JSON with the fields `web3` requires.
pub fn receipt(tx_hash: H256, block_number: u64, gas_used: u64, status: u64) -> Value {
    json!({
        "transactionHash": tx_hash,
        "transactionIndex": "0x0",
        "blockHash": H256::from_low_u64_be(block_number),
        "blockNumber": json!(U256::from(block_number)),
        "from": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
        "to": "0xcee0372632a37ba4d0499d1e2116ecff3a17d3c3",
        "cumulativeGasUsed": json!(U256::from(gas_used)),
        "gasUsed": json!(U256::from(gas_used)),
        "contractAddress": null,
        "logs": [],
        "status": json!(U256::from(status)),
        "logsBloom": format!("0x{}", "0".repeat(512)),
        "type": "0x2",
        "effectiveGasPrice": "0x3b9aca00",
    })
}

/// Connector handing out mock transports by network name.
#[derive(Debug, Default, Clone)]
pub struct MockConnector {
    transports: Arc<Mutex<HashMap<String, MockTransport>>>,
}

impl MockConnector {
    pub fn add(&self, network: &str, transport: MockTransport) {
        self.transports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(network.to_string(), transport);
    }

    pub fn transport(&self, network: &str) -> Option<MockTransport> {
        self.transports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(network)
            .cloned()
    }
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self, network: &Network) -> anyhow::Result<Web3<MockTransport>> {
        let transport = self
            .transport(&network.name)
            .ok_or(anyhow::format_err!("Failed to connect to {} network", network.name))?;
        let web3s = Web3::new(transport);
        check_connection(&web3s, network).await?;
        Ok(web3s)
    }
}
