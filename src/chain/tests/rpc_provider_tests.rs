//! RpcProvider end-to-end tests against loopback JSON-RPC nodes
//!
//! Covers primary/fallback ordering, the single-fallback limit, timeouts,
//! cancellation, and the wire shape of `eth_call`.

use std::time::{Duration, Instant};

use tokengate_chain::testing::{address_result, dead_endpoint, uint_result, FakeNode, NodeBehavior};
use tokengate_chain::{
    Address, BigUint, BlockchainProvider, ChainError, RequestContext, RpcConfig, RpcError,
    RpcProvider,
};

const USDC: &str = "0xA0b86991c6218b36c1d19d4a2e9eB0cE3606eB48";
const HOLDER: &str = "0x00000000000000000000000000000000000000aa";

fn usdc() -> Address {
    Address::parse(USDC).unwrap()
}

fn holder() -> Address {
    Address::parse(HOLDER).unwrap()
}

// ============================================================================
// PRIMARY / FALLBACK ORDERING
// ============================================================================

#[tokio::test]
async fn test_primary_success_skips_fallback() {
    let primary = FakeNode::spawn(NodeBehavior::Result(uint_result(2_000_000_000u64))).await.unwrap();
    let fallback = FakeNode::spawn(NodeBehavior::Result(uint_result(1u8))).await.unwrap();

    let provider = RpcProvider::new(
        RpcConfig::new(1, primary.url()).with_fallback(fallback.url()),
    )
    .unwrap();

    let balance = provider
        .balance_of(&RequestContext::new(), 1, &usdc(), &holder())
        .await
        .unwrap();

    assert_eq!(balance, BigUint::from(2_000_000_000u64));
    assert_eq!(primary.hits(), 1);
    assert_eq!(fallback.hits(), 0, "fallback must not be contacted on success");
}

#[tokio::test]
async fn test_network_error_triggers_single_fallback() {
    let primary = dead_endpoint().await.unwrap();
    let fallback = FakeNode::spawn(NodeBehavior::Result(uint_result(5u8))).await.unwrap();

    let provider = RpcProvider::new(RpcConfig::new(1, primary).with_fallback(fallback.url())).unwrap();

    let balance = provider
        .balance_of(&RequestContext::new(), 1, &usdc(), &holder())
        .await
        .unwrap();

    assert_eq!(balance, BigUint::from(5u8));
    assert_eq!(fallback.hits(), 1);
}

#[tokio::test]
async fn test_both_endpoints_fail_without_further_retries() {
    let primary = FakeNode::spawn(NodeBehavior::Status(502)).await.unwrap();
    let fallback =
        FakeNode::spawn(NodeBehavior::RpcError(-32000, "header not found".to_string())).await.unwrap();

    let provider = RpcProvider::new(
        RpcConfig::new(1, primary.url()).with_fallback(fallback.url()),
    )
    .unwrap();

    let err = provider
        .balance_of(&RequestContext::new(), 1, &usdc(), &holder())
        .await
        .unwrap_err();

    // The error describes the last (fallback) failure
    match err {
        ChainError::Rpc(RpcError::JsonRpc { code, message }) => {
            assert_eq!(code, -32000);
            assert_eq!(message, "header not found");
        }
        other => panic!("expected json-rpc error, got {other:?}"),
    }
    assert_eq!(primary.hits(), 1);
    assert_eq!(fallback.hits(), 1);
}

#[tokio::test]
async fn test_malformed_envelope_counts_as_failure() {
    let primary = FakeNode::spawn(NodeBehavior::Garbage).await.unwrap();
    let fallback = FakeNode::spawn(NodeBehavior::Result(uint_result(9u8))).await.unwrap();

    let provider = RpcProvider::new(
        RpcConfig::new(1, primary.url()).with_fallback(fallback.url()),
    )
    .unwrap();

    let balance = provider
        .balance_of(&RequestContext::new(), 1, &usdc(), &holder())
        .await
        .unwrap();

    assert_eq!(balance, BigUint::from(9u8));
    assert_eq!(primary.hits(), 1);
    assert_eq!(fallback.hits(), 1);
}

#[tokio::test]
async fn test_no_fallback_configured() {
    let primary = FakeNode::spawn(NodeBehavior::Status(503)).await.unwrap();
    let provider = RpcProvider::new(RpcConfig::new(1, primary.url())).unwrap();

    let err = provider
        .balance_of(&RequestContext::new(), 1, &usdc(), &holder())
        .await
        .unwrap_err();

    assert!(matches!(err, ChainError::Rpc(RpcError::HttpStatus(503))));
    assert_eq!(primary.hits(), 1);
}

// ============================================================================
// TIMEOUTS AND CANCELLATION
// ============================================================================

#[tokio::test]
async fn test_timeout_on_both_endpoints() {
    let slow = Duration::from_secs(2);
    let primary = FakeNode::spawn(NodeBehavior::Slow(slow, uint_result(1u8))).await.unwrap();
    let fallback = FakeNode::spawn(NodeBehavior::Slow(slow, uint_result(1u8))).await.unwrap();

    let provider = RpcProvider::new(
        RpcConfig::new(1, primary.url())
            .with_fallback(fallback.url())
            .with_timeout(Duration::from_millis(100)),
    )
    .unwrap();

    let start = Instant::now();
    let err = provider
        .balance_of(&RequestContext::new(), 1, &usdc(), &holder())
        .await
        .unwrap_err();

    assert!(matches!(err, ChainError::Rpc(RpcError::Timeout(_))));
    assert!(start.elapsed() < slow, "timeouts must bound total latency");
    assert_eq!(primary.hits(), 1);
    assert_eq!(fallback.hits(), 1);
}

#[tokio::test]
async fn test_cancelled_context_fails_fast() {
    let primary = FakeNode::spawn(NodeBehavior::Result(uint_result(1u8))).await.unwrap();
    let provider = RpcProvider::new(RpcConfig::new(1, primary.url())).unwrap();

    let ctx = RequestContext::new();
    ctx.cancel();

    let err = provider.balance_of(&ctx, 1, &usdc(), &holder()).await.unwrap_err();

    assert!(matches!(err, ChainError::Rpc(RpcError::Cancelled)));
    assert_eq!(primary.hits(), 0);
}

#[tokio::test]
async fn test_cancellation_interrupts_in_flight_call() {
    let primary =
        FakeNode::spawn(NodeBehavior::Slow(Duration::from_secs(5), uint_result(1u8))).await.unwrap();
    let provider = RpcProvider::new(RpcConfig::new(1, primary.url())).unwrap();

    let ctx = RequestContext::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let start = Instant::now();
    let err = provider.balance_of(&ctx, 1, &usdc(), &holder()).await.unwrap_err();

    assert!(matches!(err, ChainError::Rpc(RpcError::Cancelled)));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_request_deadline_clamps_timeout() {
    let primary =
        FakeNode::spawn(NodeBehavior::Slow(Duration::from_secs(2), uint_result(1u8))).await.unwrap();
    let provider = RpcProvider::new(RpcConfig::new(1, primary.url())).unwrap();

    let ctx = RequestContext::with_timeout(Duration::from_millis(100));
    let start = Instant::now();
    let err = provider.balance_of(&ctx, 1, &usdc(), &holder()).await.unwrap_err();

    assert!(matches!(err, ChainError::Rpc(RpcError::Timeout(_))));
    assert!(start.elapsed() < Duration::from_secs(2));
}

// ============================================================================
// WIRE FORMAT AND DECODING
// ============================================================================

#[tokio::test]
async fn test_eth_call_wire_shape() {
    let node = FakeNode::spawn(NodeBehavior::Result(uint_result(0u8))).await.unwrap();
    let provider = RpcProvider::new(RpcConfig::new(1, node.url())).unwrap();

    provider
        .balance_of(&RequestContext::new(), 1, &usdc(), &holder())
        .await
        .unwrap();

    let requests = node.requests();
    assert_eq!(requests.len(), 1);

    let body = &requests[0];
    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(body["method"], "eth_call");
    assert_eq!(body["params"][0]["to"], USDC.to_lowercase());
    assert_eq!(
        body["params"][0]["data"],
        "0x70a0823100000000000000000000000000000000000000000000000000000000000000aa"
    );
    assert_eq!(body["params"][1], "latest");
}

#[tokio::test]
async fn test_owner_of_decodes_address() {
    let owner = Address::parse("0x1111111111111111111111111111111111111111").unwrap();
    let node = FakeNode::spawn(NodeBehavior::Result(address_result(&owner))).await.unwrap();
    let provider = RpcProvider::new(RpcConfig::new(1, node.url())).unwrap();

    let decoded = provider
        .owner_of(&RequestContext::new(), 1, &usdc(), &BigUint::from(1234u32))
        .await
        .unwrap();

    assert_eq!(decoded, owner);
}

#[tokio::test]
async fn test_short_result_is_decode_error_not_retried() {
    let primary = FakeNode::spawn(NodeBehavior::Result("0x".to_string())).await.unwrap();
    let fallback = FakeNode::spawn(NodeBehavior::Result(uint_result(1u8))).await.unwrap();
    let provider = RpcProvider::new(
        RpcConfig::new(1, primary.url()).with_fallback(fallback.url()),
    )
    .unwrap();

    let err = provider
        .balance_of(&RequestContext::new(), 1, &usdc(), &holder())
        .await
        .unwrap_err();

    assert!(matches!(err, ChainError::Decode(_)));
    assert_eq!(fallback.hits(), 0);
}
