//! The detached per-probe validation driver.
//!
//! One driver runs per `(network, endpoint)` validation. It loops
//! probe → classify → commit, sleeping the backoff schedule between
//! attempts, and holds the registry lock only while committing. The driver
//! may outlive its record: teardown races surface at commit time as a
//! missing network, a missing record, or an inactive record, all of which
//! finish the task with a `Fail` outcome.

use super::{dispatch_notices, update_server_state, Notice, Shared};
use crate::config::flags;
use crate::server::{DotServer, NetId, PrivateDnsMode, ServerIdentity, ValidationState};
use crate::traits::Protocol;
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

/// One probe attempt's inputs to the commit decision
struct ProbeOutcome {
    got_answer: bool,
    is_revalidation: bool,
    latency_too_high: bool,
    max_attempts_reached: bool,
    /// Whether the backoff schedule could still fund another attempt.
    /// A retry the backoff cannot schedule is terminal: the commit records
    /// `Fail` instead of stranding the record `InProcess`.
    retry_available: bool,
}

pub(super) async fn run(
    shared: Arc<Shared>,
    server: DotServer,
    net_id: NetId,
    is_revalidation: bool,
) {
    let identity = server.identity().clone();

    let avoid_bad_private_dns = shared.flags.get_int(flags::AVOID_BAD_PRIVATE_DNS, 0) != 0;
    let min_latency = shared.flags.get_int(
        flags::MIN_LATENCY_THRESHOLD_MS,
        shared.config.min_latency_threshold_ms,
    );
    let max_latency = shared.flags.get_int(
        flags::MAX_LATENCY_THRESHOLD_MS,
        shared.config.max_latency_threshold_ms,
    );

    let mut latency_threshold: Option<i64> = None;
    let mut backoff = shared.config.backoff.build();

    for attempt in 1u32.. {
        // At least one backoff delay separates two probes, so regular Do53
        // traffic may have moved the average in between. Refresh the
        // threshold before every probe.
        if avoid_bad_private_dns && identity.is_opportunistic() {
            let do53_latency = shared.oracle.average_latency(net_id, Protocol::Udp).await;
            let target = match do53_latency {
                Some(latency) => 3 * latency.as_micros() as i64 / 1000,
                None => min_latency,
            };
            latency_threshold = Some(target.clamp(min_latency, max_latency));
        }

        // probe() performs network operations and can take milliseconds to
        // minutes, up to the transport's SYN retry limit.
        warn!(
            "validating DoT server {} with mark {:#x}",
            server.ip_string(),
            server.mark()
        );
        let started = Instant::now();
        let got_answer = shared.probe.probe(&server, server.mark()).await;
        let took_ms = started.elapsed().as_millis() as i64;
        warn!(
            "probe returned {got_answer} for {}, took {took_ms}ms, attempt {attempt}",
            server.ip_string()
        );

        // Keep opportunistic endpoints from sending probe traffic endlessly.
        let max_attempts_reached = avoid_bad_private_dns
            && identity.is_opportunistic()
            && attempt >= shared.config.opportunistic_max_attempts;
        if max_attempts_reached {
            warn!(
                "max validation attempts reached: {}",
                shared.config.opportunistic_max_attempts
            );
        }

        let target_time = latency_threshold.unwrap_or(i64::MAX);
        let latency_too_high = took_ms > target_time;
        if latency_too_high {
            warn!("probe took too long: threshold is {target_time}ms");
        }

        let needs_reeval = commit(
            &shared,
            &identity,
            net_id,
            ProbeOutcome {
                got_answer,
                is_revalidation,
                latency_too_high,
                max_attempts_reached,
                retry_available: backoff.has_next(),
            },
        );

        if !needs_reeval {
            break;
        }
        sleep(backoff.next()).await;
    }

    // Leave the computed threshold on the record for external consumers.
    let mut registry = shared.registry.lock().unwrap();
    if let Ok(record) = registry.server_mut(&identity, net_id) {
        if record.is_dot() {
            record.set_latency_threshold(latency_threshold);
            info!(
                "set latency threshold {} for {}",
                latency_threshold.map_or("none".to_string(), |ms| format!("{ms}ms")),
                identity.ip_string()
            );
        }
    }
}

/// Apply one probe outcome to the registry.
///
/// Returns whether the driver should re-evaluate after a backoff delay.
/// Exactly one subscriber event is emitted per commit; the registry lock is
/// released before any listener or observer runs.
fn commit(
    shared: &Shared,
    identity: &ServerIdentity,
    net_id: NetId,
    outcome: ProbeOutcome,
) -> bool {
    const NEEDS_REEVALUATION: bool = true;
    const DONT_REEVALUATE: bool = false;

    let mut notices = Vec::new();
    let observer;
    let succeeded_quickly;
    let reevaluation_status;
    {
        let mut registry = shared.registry.lock().unwrap();
        observer = registry.observer.clone();

        let mode = registry.modes.get(&net_id).copied();
        if mode.is_none() || !registry.transports.contains_key(&net_id) {
            warn!("netId {net_id} was erased during private DNS validation");
            notices.push(Notice {
                ip_address: identity.ip_string(),
                state: ValidationState::Fail,
                net_id,
            });
            succeeded_quickly = false;
            reevaluation_status = DONT_REEVALUATE;
        } else {
            let mut status = NEEDS_REEVALUATION;
            if outcome.got_answer {
                if !outcome.latency_too_high {
                    status = DONT_REEVALUATE;
                }
            } else if mode == Some(PrivateDnsMode::Opportunistic) && !outcome.is_revalidation {
                // No retry loop on the first opportunistic pass; the mode
                // falls back to Do53 anyway.
                status = DONT_REEVALUATE;
            }

            if outcome.max_attempts_reached {
                status = DONT_REEVALUATE;
            }

            let mut success = outcome.got_answer;
            let tracker = &registry.transports[&net_id];
            match tracker.get(identity) {
                None => {
                    warn!(
                        "server {} was removed during private DNS validation",
                        identity.ip_string()
                    );
                    success = false;
                    status = DONT_REEVALUATE;
                }
                Some(record) if !record.active() => {
                    warn!(
                        "server {} was removed from the configuration",
                        identity.ip_string()
                    );
                    success = false;
                    status = DONT_REEVALUATE;
                }
                Some(_) => {}
            }

            if status == NEEDS_REEVALUATION && !outcome.retry_available {
                warn!("retry budget exhausted for {}", identity.ip_string());
                status = DONT_REEVALUATE;
            }

            succeeded_quickly = success && !outcome.latency_too_high;
            let new_state = if succeeded_quickly {
                ValidationState::Success
            } else if status == NEEDS_REEVALUATION {
                ValidationState::InProcess
            } else {
                ValidationState::Fail
            };
            update_server_state(
                &mut registry,
                &shared.audit,
                identity,
                net_id,
                new_state,
                &mut notices,
            );
            reevaluation_status = status;
        }
    }

    // Subscribers first, then the observer, both outside the lock.
    shared
        .subscribers
        .notify_validation(identity, net_id, succeeded_quickly);
    dispatch_notices(observer, notices);

    reevaluation_status
}
