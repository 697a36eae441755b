//! Minimal embedding example for privdns-core.
//!
//! Demonstrates wiring the engine with custom collaborator implementations:
//! a stub probe transport, a fixed latency oracle, and console-printing
//! event sinks. A real embedder would back the probe with an actual TLS
//! handshake and the oracle with resolver statistics.

use async_trait::async_trait;
use privdns_core::{
    BackoffBuilder, Do53LatencyOracle, DotServer, EngineConfig, EventSubscribers, NetId,
    PrivateDnsEngine, ProbeTransport, Protocol, StaticFlagStore, ValidationEventListener,
    ValidationObserver, ValidationState,
};
use std::sync::Arc;
use std::time::Duration;

/// Probe transport that "handshakes" for a fixed time and always succeeds
struct EmbeddedProbe;

#[async_trait]
impl ProbeTransport for EmbeddedProbe {
    async fn probe(&self, server: &DotServer, mark: u32) -> bool {
        println!(
            "[probe] {} (provider {:?}) with mark {mark:#x}",
            server.sockaddr(),
            server.provider()
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        true
    }
}

/// Oracle reporting a constant 40ms Do53 average for every network
struct EmbeddedOracle;

#[async_trait]
impl Do53LatencyOracle for EmbeddedOracle {
    async fn average_latency(&self, _net_id: NetId, _protocol: Protocol) -> Option<Duration> {
        Some(Duration::from_millis(40))
    }
}

struct PrintingListener;

impl ValidationEventListener for PrintingListener {
    fn on_private_dns_validation(
        &self,
        net_id: NetId,
        ip_address: &str,
        hostname: &str,
        success: bool,
    ) -> anyhow::Result<()> {
        println!("[event] netId={net_id} ip={ip_address} hostname={hostname:?} success={success}");
        Ok(())
    }
}

struct PrintingObserver;

impl ValidationObserver for PrintingObserver {
    fn on_validation_state_update(&self, ip_address: &str, state: ValidationState, net_id: NetId) {
        println!("[state] netId={net_id} ip={ip_address} -> {state}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Latency gating on, with a short retry schedule for the demo.
    let flags = Arc::new(StaticFlagStore::new());
    flags.set(privdns_core::config::flags::AVOID_BAD_PRIVATE_DNS, 1);

    let subscribers = Arc::new(EventSubscribers::new());
    subscribers.add_listener(Arc::new(PrintingListener));

    let config = EngineConfig {
        backoff: BackoffBuilder::new()
            .with_initial_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(2))
            .with_max_timeouts(3),
        ..EngineConfig::default()
    };

    let engine = PrivateDnsEngine::new(
        Arc::new(EmbeddedProbe),
        Arc::new(EmbeddedOracle),
        flags,
        subscribers,
        config,
    )?;
    engine.set_observer(Some(Arc::new(PrintingObserver)));

    // An opportunistic network with two endpoints.
    engine.set(
        100,
        0x1,
        &["1.1.1.1".to_string(), "2606:4700:4700::1111".to_string()],
        "",
        "",
    )?;

    // Validation runs on detached tasks; give it a moment.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let status = engine.get_status(100);
    println!("mode: {}", status.mode);
    for (server, state) in &status.dot_servers {
        println!(
            "  {} -> {state} (threshold {:?}ms)",
            server.sockaddr(),
            server.latency_threshold()
        );
    }

    let mut out = Vec::new();
    engine.dump(&mut out)?;
    print!("{}", String::from_utf8_lossy(&out));

    Ok(())
}
