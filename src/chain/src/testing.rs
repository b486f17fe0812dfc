//! Test doubles for chain access (enabled with the `test-util` feature)
//!
//! [`FakeNode`] is a real HTTP JSON-RPC server on a loopback port, for
//! exercising [`RpcProvider`](crate::RpcProvider) end to end.
//! [`MockProvider`] answers [`BlockchainProvider`] calls from a script
//! without any I/O.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use num_bigint::BigUint;
use serde_json::{json, Value};

use crate::abi;
use crate::address::Address;
use crate::context::RequestContext;
use crate::error::{ChainError, Result, RpcError};
use crate::provider::BlockchainProvider;

/// How a [`FakeNode`] answers every request
#[derive(Debug, Clone)]
pub enum NodeBehavior {
    /// `{"result": <hex>}`
    Result(String),
    /// `{"error": {code, message}}`
    RpcError(i64, String),
    /// Bare HTTP status with an empty body
    Status(u16),
    /// 200 with a body that is not JSON
    Garbage,
    /// Sleep, then answer with `{"result": <hex>}`
    Slow(Duration, String),
}

#[derive(Clone)]
struct NodeState {
    behavior: NodeBehavior,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Value>>>,
}

/// A loopback JSON-RPC node with scripted behaviour
pub struct FakeNode {
    url: String,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl FakeNode {
    /// Bind a new node on `127.0.0.1:0` and serve it in the background
    pub async fn spawn(behavior: NodeBehavior) -> std::io::Result<Self> {
        let hits = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = NodeState {
            behavior,
            hits: Arc::clone(&hits),
            requests: Arc::clone(&requests),
        };

        let app = Router::new().route("/", post(handle)).with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            url: format!("http://{addr}/"),
            hits,
            requests,
        })
    }

    /// Base URL to hand to an `RpcConfig`
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Number of requests received so far
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Bodies of every request received, oldest first
    pub fn requests(&self) -> Vec<Value> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

async fn handle(State(state): State<NodeState>, Json(body): Json<Value>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let id = body.get("id").cloned().unwrap_or(Value::Null);
    if let Ok(mut requests) = state.requests.lock() {
        requests.push(body);
    }

    match state.behavior {
        NodeBehavior::Result(hex) => Json(json!({"jsonrpc": "2.0", "id": id, "result": hex})).into_response(),
        NodeBehavior::RpcError(code, message) => Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": code, "message": message},
        }))
        .into_response(),
        NodeBehavior::Status(code) => StatusCode::from_u16(code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
        NodeBehavior::Garbage => "<html>bad gateway</html>".into_response(),
        NodeBehavior::Slow(delay, hex) => {
            tokio::time::sleep(delay).await;
            Json(json!({"jsonrpc": "2.0", "id": id, "result": hex})).into_response()
        }
    }
}

/// URL of a loopback port with nothing listening on it
pub async fn dead_endpoint() -> std::io::Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{addr}/"))
}

/// Hex `eth_call` result encoding an unsigned integer
pub fn uint_result(value: impl Into<BigUint>) -> String {
    let word = abi::uint256_word(&value.into()).unwrap_or([0xff; abi::WORD_LEN]);
    format!("0x{}", hex::encode(word))
}

/// Hex `eth_call` result encoding an address
pub fn address_result(address: &Address) -> String {
    let mut word = [0u8; abi::WORD_LEN];
    word[abi::WORD_LEN - 20..].copy_from_slice(address.as_bytes());
    format!("0x{}", hex::encode(word))
}

/// Scripted answer for one (contract, call data) pair
#[derive(Debug, Clone)]
pub enum MockResponse {
    Raw(Vec<u8>),
    Fail(RpcError),
}

/// In-process [`BlockchainProvider`] driven by a response script
///
/// Unscripted calls fail with a JSON-RPC "execution reverted" error. An
/// optional latency is applied to every call and respects cancellation.
#[derive(Debug, Default)]
pub struct MockProvider {
    responses: HashMap<(Address, Vec<u8>), MockResponse>,
    chain_id: Option<u64>,
    latency: Option<Duration>,
    calls: AtomicUsize,
}

impl MockProvider {
    /// Provider with an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve only `chain_id`; calls for any other chain fail
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Script `balanceOf(holder)` on `contract`
    pub fn with_balance(mut self, contract: Address, holder: Address, balance: impl Into<BigUint>) -> Self {
        let raw = abi::uint256_word(&balance.into())
            .map(|word| word.to_vec())
            .unwrap_or_default();
        self.responses
            .insert((contract, abi::encode_balance_of(&holder)), MockResponse::Raw(raw));
        self
    }

    /// Script `ownerOf(token_id)` on `contract`
    pub fn with_owner(mut self, contract: Address, token_id: impl Into<BigUint>, owner: Address) -> Self {
        if let Ok(data) = abi::encode_owner_of(&token_id.into()) {
            let mut word = vec![0u8; abi::WORD_LEN - 20];
            word.extend_from_slice(owner.as_bytes());
            self.responses.insert((contract, data), MockResponse::Raw(word));
        }
        self
    }

    /// Script an arbitrary response for exact call data
    pub fn with_response(mut self, contract: Address, call_data: Vec<u8>, response: MockResponse) -> Self {
        self.responses.insert((contract, call_data), response);
        self
    }

    /// Make every `balanceOf(holder)` on `contract` fail
    pub fn with_balance_failure(self, contract: Address, holder: Address, error: RpcError) -> Self {
        let data = abi::encode_balance_of(&holder);
        self.with_response(contract, data, MockResponse::Fail(error))
    }

    /// Number of `call` invocations that passed validation
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlockchainProvider for MockProvider {
    fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    async fn call(
        &self,
        ctx: &RequestContext,
        chain_id: u64,
        contract: &str,
        call_data: &[u8],
    ) -> Result<Vec<u8>> {
        let contract = Address::parse(contract)?;
        if let Some(configured) = self.chain_id.filter(|served| *served != chain_id) {
            return Err(ChainError::UnsupportedChain {
                requested: chain_id,
                configured,
            });
        }
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::select! {
                _ = ctx.cancelled() => return Err(ChainError::Rpc(RpcError::Cancelled)),
                _ = tokio::time::sleep(latency) => {}
            }
        }

        match self.responses.get(&(contract, call_data.to_vec())) {
            Some(MockResponse::Raw(raw)) => Ok(raw.clone()),
            Some(MockResponse::Fail(error)) => Err(ChainError::Rpc(error.clone())),
            None => Err(ChainError::Rpc(RpcError::JsonRpc {
                code: 3,
                message: "execution reverted".to_string(),
            })),
        }
    }
}
