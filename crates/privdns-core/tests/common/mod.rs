#![allow(dead_code)]

//! Test doubles and common utilities for the validation contract tests.
//!
//! The probe transport is scripted per endpoint, the latency oracle per
//! network. Validation events and observer state updates are captured on
//! unbounded channels so tests can await them under a paused Tokio clock.

use async_trait::async_trait;
use privdns_core::{
    BackoffBuilder, Do53LatencyOracle, DotServer, EngineConfig, EventSubscribers, NetId,
    PrivateDnsEngine, ProbeTransport, Protocol, StaticFlagStore, UnsolicitedEventListener,
    ValidationEventListener, ValidationEventParcel, ValidationObserver, ValidationState,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Scripted behavior for one endpoint: successive probe results (the last
/// entry repeats) plus a simulated probe duration.
#[derive(Clone)]
pub struct ProbeScript {
    pub results: Vec<bool>,
    pub duration: Duration,
}

/// A probe transport whose outcome is scripted per endpoint
pub struct FakeProbeTransport {
    scripts: Mutex<HashMap<SocketAddr, ProbeScript>>,
    attempts: Mutex<HashMap<SocketAddr, usize>>,
}

impl FakeProbeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(HashMap::new()),
            attempts: Mutex::new(HashMap::new()),
        })
    }

    /// Every probe of `addr` returns `result` after `duration`
    pub fn always(&self, addr: SocketAddr, result: bool, duration: Duration) {
        self.script(addr, &[result], duration);
    }

    pub fn script(&self, addr: SocketAddr, results: &[bool], duration: Duration) {
        self.scripts.lock().unwrap().insert(
            addr,
            ProbeScript {
                results: results.to_vec(),
                duration,
            },
        );
    }

    /// How many times `addr` has been probed
    pub fn attempts(&self, addr: SocketAddr) -> usize {
        self.attempts.lock().unwrap().get(&addr).copied().unwrap_or(0)
    }

    pub fn total_attempts(&self) -> usize {
        self.attempts.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl ProbeTransport for FakeProbeTransport {
    async fn probe(&self, server: &DotServer, _mark: u32) -> bool {
        let addr = server.sockaddr();
        let index = {
            let mut attempts = self.attempts.lock().unwrap();
            let count = attempts.entry(addr).or_insert(0);
            let index = *count;
            *count += 1;
            index
        };

        let script = self.scripts.lock().unwrap().get(&addr).cloned();
        match script {
            Some(script) => {
                if !script.duration.is_zero() {
                    tokio::time::sleep(script.duration).await;
                }
                script
                    .results
                    .get(index)
                    .or_else(|| script.results.last())
                    .copied()
                    .unwrap_or(false)
            }
            None => false,
        }
    }
}

/// A latency oracle with a settable per-network moving average
#[derive(Default)]
pub struct FakeLatencyOracle {
    averages: Mutex<HashMap<NetId, Duration>>,
}

impl FakeLatencyOracle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_average(&self, net_id: NetId, average: Duration) {
        self.averages.lock().unwrap().insert(net_id, average);
    }
}

#[async_trait]
impl Do53LatencyOracle for FakeLatencyOracle {
    async fn average_latency(&self, net_id: NetId, _protocol: Protocol) -> Option<Duration> {
        self.averages.lock().unwrap().get(&net_id).copied()
    }
}

/// A validation event as captured by the recording listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationEvent {
    pub net_id: NetId,
    pub ip_address: String,
    pub hostname: String,
    pub success: bool,
}

/// Classic listener that forwards every event to a channel
pub struct RecordingListener {
    tx: mpsc::UnboundedSender<ValidationEvent>,
}

impl RecordingListener {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ValidationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl ValidationEventListener for RecordingListener {
    fn on_private_dns_validation(
        &self,
        net_id: NetId,
        ip_address: &str,
        hostname: &str,
        success: bool,
    ) -> anyhow::Result<()> {
        let _ = self.tx.send(ValidationEvent {
            net_id,
            ip_address: ip_address.to_string(),
            hostname: hostname.to_string(),
            success,
        });
        Ok(())
    }
}

/// Unsolicited listener that stores every parcel
#[derive(Default)]
pub struct RecordingUnsolListener {
    pub parcels: Mutex<Vec<ValidationEventParcel>>,
}

impl UnsolicitedEventListener for RecordingUnsolListener {
    fn on_private_dns_validation_event(
        &self,
        event: &ValidationEventParcel,
    ) -> anyhow::Result<()> {
        self.parcels.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// One observer callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateUpdate {
    pub ip_address: String,
    pub state: ValidationState,
    pub net_id: NetId,
}

/// Observer that records and forwards every state update
pub struct RecordingObserver {
    pub seen: Mutex<Vec<StateUpdate>>,
    tx: mpsc::UnboundedSender<StateUpdate>,
}

impl RecordingObserver {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<StateUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                tx,
            }),
            rx,
        )
    }

    /// The state updates recorded so far for one endpoint
    pub fn states_for(&self, ip: &str) -> Vec<ValidationState> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|update| update.ip_address == ip)
            .map(|update| update.state)
            .collect()
    }
}

impl ValidationObserver for RecordingObserver {
    fn on_validation_state_update(&self, ip_address: &str, state: ValidationState, net_id: NetId) {
        let update = StateUpdate {
            ip_address: ip_address.to_string(),
            state,
            net_id,
        };
        self.seen.lock().unwrap().push(update.clone());
        let _ = self.tx.send(update);
    }
}

/// A millisecond-scale backoff so contract tests finish under a paused
/// clock: 100ms doubling to 400ms, four timeouts total (five attempts).
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        backoff: BackoffBuilder::new()
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(400))
            .with_max_timeouts(4),
        ..EngineConfig::default()
    }
}

/// Everything a contract test needs, wired together
pub struct Harness {
    pub engine: PrivateDnsEngine,
    pub probe: Arc<FakeProbeTransport>,
    pub oracle: Arc<FakeLatencyOracle>,
    pub flags: Arc<StaticFlagStore>,
    pub listener: Arc<RecordingListener>,
    pub unsol: Arc<RecordingUnsolListener>,
    pub observer: Arc<RecordingObserver>,
    pub events: mpsc::UnboundedReceiver<ValidationEvent>,
    pub states: mpsc::UnboundedReceiver<StateUpdate>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(fast_config())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let probe = FakeProbeTransport::new();
        let oracle = FakeLatencyOracle::new();
        let flags = Arc::new(StaticFlagStore::new());

        let subscribers = Arc::new(EventSubscribers::new());
        let (listener, events) = RecordingListener::new();
        subscribers.add_listener(listener.clone());
        let unsol = Arc::new(RecordingUnsolListener::default());
        subscribers.add_unsolicited_listener(unsol.clone());

        let engine = PrivateDnsEngine::new(
            probe.clone(),
            oracle.clone(),
            flags.clone(),
            subscribers,
            config,
        )
        .expect("engine construction succeeds");

        let (observer, states) = RecordingObserver::new();
        engine.set_observer(Some(observer.clone()));

        Self {
            engine,
            probe,
            oracle,
            flags,
            listener,
            unsol,
            observer,
            events,
            states,
        }
    }

    /// Await the next validation event; panics after two (virtual) hours
    pub async fn next_event(&mut self) -> ValidationEvent {
        timeout(Duration::from_secs(7200), self.events.recv())
            .await
            .expect("timed out waiting for a validation event")
            .expect("event channel closed")
    }

    /// Await an observer update putting `ip` into `state`
    pub async fn wait_for_state(&mut self, ip: &str, state: ValidationState) {
        loop {
            let update = timeout(Duration::from_secs(7200), self.states.recv())
                .await
                .unwrap_or_else(|_| panic!("timed out waiting for {ip} to reach {state}"))
                .expect("state channel closed");
            if update.ip_address == ip && update.state == state {
                return;
            }
        }
    }

    /// True if no validation event is currently queued
    pub fn no_pending_events(&mut self) -> bool {
        self.events.try_recv().is_err()
    }
}

pub fn dot_addr(ip: &str) -> SocketAddr {
    let ip: std::net::IpAddr = ip.parse().unwrap();
    SocketAddr::new(ip, 853)
}

pub fn server_list(ips: &[&str]) -> Vec<String> {
    ips.iter().map(|ip| ip.to_string()).collect()
}
