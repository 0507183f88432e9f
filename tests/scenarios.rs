//! End-to-end scenarios wiring two in-memory peers back to back, one per
//! connection, over `tokio::io::duplex`.

use async_trait::async_trait;
use mcp_peer::core::capability::CapabilityRegistry;
use mcp_peer::core::roots::RootsModule;
use mcp_peer::core::tool::ToolHandler;
use mcp_peer::protocol::roots_types::Root;
use mcp_peer::protocol::types::{CallToolResult, ContentBlock, Implementation, Tool, ToolInputSchema};
use mcp_peer::protocol::version::ProtocolVersion;
use mcp_peer::server::McpServer;
use mcp_peer::client::McpClient;
use mcp_peer::core::peer::Peer;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

struct EchoHandler;

#[async_trait]
impl ToolHandler for EchoHandler {
    async fn call(&self, arguments: HashMap<String, serde_json::Value>) -> CallToolResult {
        let text = arguments.get("message").and_then(|v| v.as_str()).unwrap_or_default();
        CallToolResult::success(vec![ContentBlock::text(text)])
    }
}

fn echo_tool() -> Tool {
    Tool {
        name: "echo".into(),
        description: None,
        title: None,
        input_schema: ToolInputSchema {
            schema_type: "object".into(),
            properties: Some(HashMap::from([("message".to_string(), json!({"type": "string"}))])),
            required: Some(vec!["message".into()]),
            additional_properties: None,
        },
        output_schema: None,
        annotations: None,
    }
}

async fn connected_pair() -> (Arc<McpServer>, Arc<McpClient>) {
    let server = Arc::new(McpServer::new("s", "1"));
    server.tools().register_tool(echo_tool(), Arc::new(EchoHandler), true);

    let (server_read, client_write) = tokio::io::duplex(8192);
    let (client_read, server_write) = tokio::io::duplex(8192);
    tokio::spawn(server.clone().serve(server_read, server_write));

    let roots = RootsModule::new();
    let client = McpClient::connect(Implementation { name: "t".into(), version: "1".into() }, roots, client_read, client_write)
        .await
        .unwrap();
    (server, client)
}

/// S1 — handshake advertises tools, then a valid call round-trips.
#[tokio::test]
async fn s1_handshake_then_tool_call() {
    let (_server, client) = connected_pair().await;

    let tools = client.list_tools(None).await.unwrap();
    assert_eq!(tools.tools.len(), 1);
    assert_eq!(tools.tools[0].name, "echo");

    let mut args = HashMap::new();
    args.insert("message".to_string(), json!("hi"));
    let result = client.call_tool("echo", args).await.unwrap();
    assert_eq!(result.is_error, None);
    match &result.content[0] {
        ContentBlock::Text { text, .. } => assert_eq!(text, "hi"),
        other => panic!("expected text content, got {other:?}"),
    }
}

/// S2 — a missing required argument surfaces as an error-flagged result, not
/// a JSON-RPC error.
#[tokio::test]
async fn s2_schema_violation_is_an_error_result() {
    let (_server, client) = connected_pair().await;
    let result = client.call_tool("echo", HashMap::new()).await.unwrap();
    assert_eq!(result.is_error, Some(true));
    match &result.content[0] {
        ContentBlock::Text { text, .. } => {
            assert_eq!(text, "Required property \"message\" is missing at path #root");
        }
        other => panic!("expected text content, got {other:?}"),
    }
}

/// S3 — a wrongly-typed argument is likewise an error result with a
/// type-mismatch message.
#[tokio::test]
async fn s3_wrong_type_is_an_error_result() {
    let (_server, client) = connected_pair().await;
    let mut args = HashMap::new();
    args.insert("message".to_string(), json!(123));
    let result = client.call_tool("echo", args).await.unwrap();
    assert_eq!(result.is_error, Some(true));
    match &result.content[0] {
        ContentBlock::Text { text, .. } => {
            assert_eq!(text, "Value `123` is not of type `String` at path #root[\"message\"]");
        }
        other => panic!("expected text content, got {other:?}"),
    }
}

/// S4 — five in-window `update_resource` calls coalesce into at most two
/// `resources/updated` notifications, the last one strictly after the fifth
/// update. Exercised directly against `ResourcesModule` with a zero-length
/// throttle window for determinism, wired to a live peer so the assertion is
/// against actual outbound wire traffic rather than internal state.
#[tokio::test]
async fn s4_resource_updates_are_throttled_to_at_most_two_notifications() {
    use mcp_peer::core::resource::ResourcesModule;

    let (peer, mut outbound) = Peer::new();
    let resources = ResourcesModule::new(Duration::ZERO);
    let mut registry = CapabilityRegistry::new();
    resources.install(&peer, &mut registry);

    peer.dispatch(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "resources/subscribe",
        "params": {"uri": "foo://x"},
    }));
    // Drain the subscribe response before counting update notifications.
    tokio::time::timeout(Duration::from_millis(100), outbound.recv()).await.unwrap();

    for _ in 0..5 {
        resources.update_resource("foo://x").await;
    }

    let mut count = 0;
    while let Ok(Some(_)) = tokio::time::timeout(Duration::from_millis(100), outbound.recv()).await {
        count += 1;
    }
    assert!(count >= 1 && count <= 2, "expected 1 or 2 notifications, got {count}");
}

/// S5 — adding a root fans `notifications/roots/list_changed` out to every
/// connected server, and re-adding an already-present root is silent.
#[tokio::test]
async fn s5_roots_fan_out_to_every_connected_server() {
    let roots = RootsModule::new();
    let (peer_a, mut outbound_a) = Peer::new();
    let (peer_b, mut outbound_b) = Peer::new();
    let mut registry_a = CapabilityRegistry::new();
    let mut registry_b = CapabilityRegistry::new();
    roots.install(&peer_a, &mut registry_a);
    roots.install(&peer_b, &mut registry_b);

    assert!(roots.add_root(Root::new("file:///a")));
    for outbound in [&mut outbound_a, &mut outbound_b] {
        let notified = tokio::time::timeout(Duration::from_millis(50), outbound.recv()).await;
        assert!(notified.is_ok() && notified.unwrap().is_some());
    }

    assert!(!roots.add_root(Root::new("file:///a")));
    for outbound in [&mut outbound_a, &mut outbound_b] {
        let notified = tokio::time::timeout(Duration::from_millis(50), outbound.recv()).await;
        assert!(notified.is_err() || notified.unwrap().is_none());
    }
}

/// S6 — a server that only understands an older version negotiates down to
/// it, and a client negotiates whatever the server proposes as long as it
/// recognizes the version string at all.
#[tokio::test]
async fn s6_version_negotiation_downgrades_to_the_older_peer() {
    assert_eq!(ProtocolVersion::negotiate(ProtocolVersion::V2024_11_05), ProtocolVersion::V2024_11_05);
    assert_eq!(ProtocolVersion::negotiate(ProtocolVersion::V2025_06_18), ProtocolVersion::V2025_06_18);

    let (_server, client) = connected_pair().await;
    assert_eq!(client.protocol_version(), ProtocolVersion::LATEST);
}

/// S6 (second half) — a client that restricts itself to an older version
/// than whatever the server negotiates closes the connection instead of
/// proceeding, and never sends `notifications/initialized`.
#[tokio::test]
async fn s6_client_closes_when_negotiated_version_is_unsupported() {
    let server = Arc::new(McpServer::new("s", "1"));
    server.tools().register_tool(echo_tool(), Arc::new(EchoHandler), true);

    let (server_read, client_write) = tokio::io::duplex(8192);
    let (client_read, server_write) = tokio::io::duplex(8192);
    tokio::spawn(server.clone().serve(server_read, server_write));

    let roots = RootsModule::new();
    let err = McpClient::connect_with_supported_versions(
        Implementation { name: "t".into(), version: "1".into() },
        roots,
        client_read,
        client_write,
        &[ProtocolVersion::V2024_11_05],
    )
    .await
    .unwrap_err();

    assert_eq!(err.category(), "version_negotiation");
}
