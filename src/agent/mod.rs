use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::persistence::SessionStore;
use crate::remote::{AccountingService, UpdateKind};
use crate::retry::RetryPolicy;
use crate::types::{MinefleetError, MinerStats, Result, SessionRecord};

/// Lifecycle of a mining session agent.
///
/// `Failed` is terminal and reachable from `Initializing` only; a failed
/// agent never enters the report loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Uninitialized,
    Initializing,
    Active,
    Stopping,
    Stopped,
    Failed,
}

/// Tunables injected at construction.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub report_interval: Duration,
    pub failure_cooldown: Duration,
    pub retry: RetryPolicy,
    /// Simulated earnings per MH/s per second.
    pub earnings_rate: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            report_interval: Duration::from_secs(60),
            failure_cooldown: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            earnings_rate: 0.000001,
        }
    }
}

/// Mutable session state. One lock keeps per-agent operations strictly
/// sequential: the report loop and the stop sequence never interleave a
/// submission.
struct SessionState {
    record: Option<SessionRecord>,
    last_report: Option<Instant>,
    reports_sent: u64,
}

/// One wallet's mining lifecycle: registration check, state reconciliation,
/// periodic report loop, and stop sequence.
pub struct MiningAgent {
    identity: String,
    proxy: Option<String>,
    stats: MinerStats,
    config: AgentConfig,
    service: Arc<dyn AccountingService>,
    store: SessionStore,
    /// Continuation condition for the report loop, checked between
    /// iterations.
    active: AtomicBool,
    /// First stop() wins; later calls only read the last confirmed total.
    stop_gate: AtomicBool,
    state: watch::Sender<AgentState>,
    session: Mutex<SessionState>,
}

impl MiningAgent {
    pub fn new(
        identity: String,
        proxy: Option<String>,
        stats: MinerStats,
        config: AgentConfig,
        service: Arc<dyn AccountingService>,
        store: SessionStore,
    ) -> Self {
        let (state, _) = watch::channel(AgentState::Uninitialized);
        Self {
            identity,
            proxy,
            stats,
            config,
            service,
            store,
            active: AtomicBool::new(false),
            stop_gate: AtomicBool::new(false),
            state,
            session: Mutex::new(SessionState {
                record: None,
                last_report: None,
                reports_sent: 0,
            }),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn stats(&self) -> MinerStats {
        self.stats
    }

    pub fn state(&self) -> AgentState {
        *self.state.borrow()
    }

    /// Snapshot of the in-memory session state, for status rendering.
    pub async fn current_record(&self) -> Option<SessionRecord> {
        self.session.lock().await.record.clone()
    }

    fn set_state(&self, state: AgentState) {
        let _ = self.state.send_replace(state);
    }

    fn session_delta(&self, record: &SessionRecord, elapsed_secs: f64) -> f64 {
        self.stats.hashrate_mhs * elapsed_secs * self.config.earnings_rate
            * (1.0 + record.referral_bonus)
    }

    /// Registration check plus state reconciliation.
    ///
    /// A local record outlives any remote snapshot: the remote balance may
    /// be stale relative to unsynced local progress, so it only seeds a
    /// session that has no record yet.
    pub(crate) async fn initialize(&self) -> Result<()> {
        self.set_state(AgentState::Initializing);
        debug!("[{}] Checking registration", self.identity);

        let registration = self
            .config
            .retry
            .run("check-registration", || {
                self.service.check_registration(&self.identity)
            })
            .await?;

        if !registration.is_registered {
            return Err(MinefleetError::NotRegistered(self.identity.clone()));
        }

        {
            let mut guard = self.session.lock().await;
            let session = &mut *guard;
            let record = match self.store.load(&self.identity) {
                Some(record) => {
                    info!(
                        "[{}] Resuming session, total {:.8}",
                        self.identity, record.earnings.total
                    );
                    record
                }
                None => {
                    let remote = registration.user_data.unwrap_or_default();
                    let record = SessionRecord::new(
                        Utc::now().timestamp(),
                        remote.balance,
                        remote.referral_bonus,
                    );
                    if let Err(e) = self.store.save(&self.identity, &record) {
                        warn!(
                            "[{}] Failed to persist initial session state: {e:#}",
                            self.identity
                        );
                    }
                    info!(
                        "[{}] New session, starting balance {:.8}",
                        self.identity, record.earnings.total
                    );
                    record
                }
            };
            session.record = Some(record);
            session.last_report = Some(Instant::now());
        }

        if self.stop_gate.load(Ordering::SeqCst) {
            // Shutdown raced initialization; don't enter the report loop.
            self.set_state(AgentState::Stopped);
            return Ok(());
        }
        self.active.store(true, Ordering::SeqCst);
        self.set_state(AgentState::Active);
        Ok(())
    }

    /// Full lifecycle: initialize, then report on the configured cadence
    /// until a stop request clears the active flag.
    pub async fn run(self: Arc<Self>) {
        if let Err(e) = self.initialize().await {
            warn!("[{}] Initialization failed: {e}", self.identity);
            self.set_state(AgentState::Failed);
            return;
        }
        if self.state() != AgentState::Active {
            return;
        }

        info!(
            "[{}] Session active: {:.1} MH/s, efficiency {:.2}{}",
            self.identity,
            self.stats.hashrate_mhs,
            self.stats.efficiency,
            self.proxy
                .as_deref()
                .map(|p| format!(" via {p}"))
                .unwrap_or_default()
        );

        loop {
            tokio::time::sleep(self.config.report_interval).await;
            if !self.active.load(Ordering::SeqCst) {
                break;
            }
            match self.report(UpdateKind::Periodic).await {
                Ok(balance) => {
                    info!("[{}] Balance confirmed: {:.8}", self.identity, balance);
                }
                Err(e) => {
                    // A missed cycle is not fatal; the next delta covers the gap.
                    warn!("[{}] Report cycle failed; cooling down: {e}", self.identity);
                    tokio::time::sleep(self.config.failure_cooldown).await;
                }
            }
        }
        debug!("[{}] Report loop exited", self.identity);
    }

    /// Compute the session-delta, submit it, adopt the server's total, and
    /// persist. On submission failure nothing is mutated or persisted, so
    /// the unreported delta rolls into the next cycle.
    async fn report(&self, kind: UpdateKind) -> Result<f64> {
        let mut guard = self.session.lock().await;
        let session = &mut *guard;
        let record = session
            .record
            .as_mut()
            .ok_or_else(|| MinefleetError::Internal("report before initialization".into()))?;

        let elapsed = session
            .last_report
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        let delta = self.session_delta(record, elapsed);

        let update = self
            .config
            .retry
            .run("update-balance", || {
                self.service.update_balance(&self.identity, delta, kind)
            })
            .await?;

        // The server owns the cumulative total; only the delta is ours.
        record.earnings.total = update.balance;
        session.last_report = Some(Instant::now());
        session.reports_sent += 1;

        let snapshot = record.clone();
        if let Err(e) = self.store.save(&self.identity, &snapshot) {
            // Best-effort durability: in-memory state stands even when the
            // disk write fails.
            warn!("[{}] Failed to persist session state: {e:#}", self.identity);
        }
        Ok(update.balance)
    }

    /// Stop sequence: clear the active flag, submit one final delta, persist,
    /// and return the best-known total. A failed final submission still
    /// reaches `Stopped` — the shutdown deadline belongs to the caller.
    pub async fn stop(&self) -> f64 {
        if self.state() == AgentState::Failed {
            return 0.0;
        }
        if self.stop_gate.swap(true, Ordering::SeqCst) {
            // A stop already ran or is running; the session lock orders us
            // behind it.
            let session = self.session.lock().await;
            return session
                .record
                .as_ref()
                .map(|r| r.earnings.total)
                .unwrap_or(0.0);
        }

        self.active.store(false, Ordering::SeqCst);
        self.set_state(AgentState::Stopping);

        let outcome = {
            let mut guard = self.session.lock().await;
            let session = &mut *guard;
            match session.record.as_mut() {
                None => None,
                Some(record) => {
                    let elapsed = session
                        .last_report
                        .map(|t| t.elapsed().as_secs_f64())
                        .unwrap_or(0.0);
                    let delta = self.session_delta(record, elapsed);

                    match self
                        .config
                        .retry
                        .run("final-update", || {
                            self.service
                                .update_balance(&self.identity, delta, UpdateKind::Final)
                        })
                        .await
                    {
                        Ok(update) => {
                            record.earnings.total = update.balance;
                        }
                        Err(e) => {
                            warn!(
                                "[{}] Final update failed; keeping last confirmed total: {e}",
                                self.identity
                            );
                        }
                    }

                    let snapshot = record.clone();
                    if let Err(e) = self.store.save(&self.identity, &snapshot) {
                        warn!(
                            "[{}] Failed to persist final session state: {e:#}",
                            self.identity
                        );
                    }
                    Some((snapshot.earnings.total, session.reports_sent))
                }
            }
        };

        self.set_state(AgentState::Stopped);
        match outcome {
            Some((total, reports)) => {
                info!(
                    "[{}] Session stopped after {} report(s); total {:.8}",
                    self.identity, reports, total
                );
                total
            }
            None => 0.0,
        }
    }
}
