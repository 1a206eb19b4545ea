use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::agent::{AgentState, MiningAgent};

/// Owns the agent collection: bulk startup, deadline-bounded stop fan-out,
/// and the aggregate total.
pub struct Coordinator {
    agents: Vec<Arc<MiningAgent>>,
    handles: Vec<JoinHandle<()>>,
    deadline: Duration,
    running: bool,
    shutting_down: bool,
}

impl Coordinator {
    pub fn new(agents: Vec<Arc<MiningAgent>>, deadline: Duration) -> Self {
        Self {
            agents,
            handles: Vec::new(),
            deadline,
            running: false,
            shutting_down: false,
        }
    }

    pub fn agents(&self) -> &[Arc<MiningAgent>] {
        &self.agents
    }

    /// Spawn every agent's lifecycle task, fire-and-forget: startup does not
    /// wait for any agent to reach `Active`. A second call is a warned no-op.
    pub fn start(&mut self) {
        if self.running {
            warn!("Coordinator already running; ignoring start request");
            return;
        }
        self.running = true;

        info!("Starting {} mining session(s)", self.agents.len());
        for agent in &self.agents {
            self.handles.push(tokio::spawn(agent.clone().run()));
        }
    }

    /// Stop every live agent within the deadline and aggregate the totals.
    ///
    /// An agent whose stop task fails contributes zero instead of aborting
    /// the aggregate. Hitting the deadline is an error; session files
    /// written by agents that finished in time are already durable.
    pub async fn shutdown(&mut self) -> Result<f64> {
        if self.shutting_down {
            warn!("Shutdown already in progress; ignoring duplicate request");
            return Ok(0.0);
        }
        self.shutting_down = true;

        let live: Vec<Arc<MiningAgent>> = self
            .agents
            .iter()
            .filter(|a| !matches!(a.state(), AgentState::Failed | AgentState::Stopped))
            .cloned()
            .collect();
        let skipped = self.agents.len() - live.len();
        if skipped > 0 {
            debug!("{skipped} session(s) already failed or stopped; not part of the stop set");
        }
        info!(
            "Stopping {} session(s), deadline {}s",
            live.len(),
            self.deadline.as_secs()
        );

        let stops: Vec<JoinHandle<f64>> = live
            .into_iter()
            .map(|agent| tokio::spawn(async move { agent.stop().await }))
            .collect();

        let Ok(results) =
            tokio::time::timeout(self.deadline, futures::future::join_all(stops)).await
        else {
            bail!(
                "shutdown deadline of {}s exceeded with stops still outstanding",
                self.deadline.as_secs()
            );
        };

        let total: f64 = results
            .into_iter()
            .map(|result| match result {
                Ok(total) => total,
                Err(e) => {
                    warn!("Stop task failed; counting zero for that session: {e}");
                    0.0
                }
            })
            .sum();

        // The lifecycle tasks are only sleeping at this point.
        for handle in self.handles.drain(..) {
            handle.abort();
        }

        let stopped = self
            .agents
            .iter()
            .filter(|a| a.state() == AgentState::Stopped)
            .count();
        let failed = self
            .agents
            .iter()
            .filter(|a| a.state() == AgentState::Failed)
            .count();
        info!("Shutdown complete: {stopped} stopped, {failed} failed, total paid {total:.8}");
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::tempdir;

    use crate::agent::AgentConfig;
    use crate::persistence::SessionStore;
    use crate::remote::{
        AccountingService, BalanceUpdate, RegistrationStatus, UpdateKind, UserData,
    };
    use crate::retry::RetryPolicy;
    use crate::types::{MinefleetError, MinerStats, Result as FleetResult};

    /// Scripted service: registration succeeds with a fixed balance, every
    /// update echoes a fixed final balance.
    struct FixedService {
        registered: bool,
        balance: f64,
        final_balance: f64,
        hang_updates: bool,
        update_calls: AtomicU32,
    }

    impl FixedService {
        fn new(balance: f64, final_balance: f64) -> Self {
            Self {
                registered: true,
                balance,
                final_balance,
                hang_updates: false,
                update_calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl AccountingService for FixedService {
        async fn check_registration(&self, _wallet: &str) -> FleetResult<RegistrationStatus> {
            if !self.registered {
                return Ok(RegistrationStatus {
                    is_registered: false,
                    user_data: None,
                });
            }
            Ok(RegistrationStatus {
                is_registered: true,
                user_data: Some(UserData {
                    balance: self.balance,
                    referral_bonus: 0.0,
                }),
            })
        }

        async fn update_balance(
            &self,
            _wallet: &str,
            _delta: f64,
            _kind: UpdateKind,
        ) -> FleetResult<BalanceUpdate> {
            self.update_calls.fetch_add(1, Ordering::SeqCst);
            if self.hang_updates {
                std::future::pending::<()>().await;
            }
            Ok(BalanceUpdate {
                success: true,
                balance: self.final_balance,
            })
        }
    }

    /// Service whose update path always errors, forcing the stop sequence
    /// to fall back to the last confirmed total.
    struct RejectingService;

    #[async_trait]
    impl AccountingService for RejectingService {
        async fn check_registration(&self, _wallet: &str) -> FleetResult<RegistrationStatus> {
            Ok(RegistrationStatus {
                is_registered: true,
                user_data: Some(UserData {
                    balance: 0.0,
                    referral_bonus: 0.0,
                }),
            })
        }

        async fn update_balance(
            &self,
            _wallet: &str,
            _delta: f64,
            _kind: UpdateKind,
        ) -> FleetResult<BalanceUpdate> {
            Err(MinefleetError::Transport("connection reset".into()))
        }
    }

    fn make_agent(
        dir: &std::path::Path,
        identity: &str,
        service: Arc<dyn AccountingService>,
    ) -> Arc<MiningAgent> {
        let config = AgentConfig {
            retry: RetryPolicy::new(1, Duration::from_millis(1)),
            ..Default::default()
        };
        Arc::new(MiningAgent::new(
            identity.to_string(),
            None,
            MinerStats::simulated(40.0, 120.0),
            config,
            service,
            SessionStore::new(dir),
        ))
    }

    #[tokio::test]
    async fn test_aggregate_is_exact_sum_of_stop_results() {
        let dir = tempdir().unwrap();

        let agents: Vec<Arc<MiningAgent>> = [1.0, 2.0, 3.0]
            .iter()
            .enumerate()
            .map(|(i, balance)| {
                let service = Arc::new(FixedService::new(*balance, balance * 1.1));
                make_agent(dir.path(), &format!("0x{i:040x}"), service)
            })
            .collect();
        for agent in &agents {
            agent.initialize().await.unwrap();
        }

        let mut coordinator = Coordinator::new(agents, Duration::from_secs(30));
        let total = coordinator.shutdown().await.unwrap();

        let expected = 1.0 * 1.1 + 2.0 * 1.1 + 3.0 * 1.1;
        assert!((total - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_failed_agents_are_excluded_from_aggregate() {
        let dir = tempdir().unwrap();

        let healthy = make_agent(
            dir.path(),
            "0x1111111111111111111111111111111111111111",
            Arc::new(FixedService::new(1.0, 4.0)),
        );
        healthy.initialize().await.unwrap();

        let rejected = make_agent(
            dir.path(),
            "0x2222222222222222222222222222222222222222",
            Arc::new(FixedService {
                registered: false,
                balance: 0.0,
                final_balance: 0.0,
                hang_updates: false,
                update_calls: AtomicU32::new(0),
            }),
        );
        rejected.clone().run().await;
        assert_eq!(rejected.state(), AgentState::Failed);

        let mut coordinator =
            Coordinator::new(vec![healthy, rejected.clone()], Duration::from_secs(30));
        let total = coordinator.shutdown().await.unwrap();

        assert!((total - 4.0).abs() < 1e-9);
        // The failed agent stayed failed rather than being driven to Stopped.
        assert_eq!(rejected.state(), AgentState::Failed);
    }

    #[tokio::test]
    async fn test_stop_failure_counts_as_zero_delta() {
        let dir = tempdir().unwrap();

        let flaky = make_agent(
            dir.path(),
            "0x3333333333333333333333333333333333333333",
            Arc::new(RejectingService),
        );
        // Seed a confirmed total so the stop path has something to keep.
        SessionStore::new(dir.path())
            .save(
                flaky.identity(),
                &crate::types::SessionRecord::new(1, 2.5, 0.0),
            )
            .unwrap();
        flaky.initialize().await.unwrap();

        let solid = make_agent(
            dir.path(),
            "0x4444444444444444444444444444444444444444",
            Arc::new(FixedService::new(1.0, 1.5)),
        );
        solid.initialize().await.unwrap();

        let mut coordinator = Coordinator::new(vec![flaky, solid], Duration::from_secs(30));
        let total = coordinator.shutdown().await.unwrap();

        // Failed final update keeps the last confirmed 2.5; solid stops at 1.5.
        assert!((total - 4.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_elapses_with_hung_stop() {
        let dir = tempdir().unwrap();

        let hung = make_agent(
            dir.path(),
            "0x5555555555555555555555555555555555555555",
            Arc::new(FixedService {
                registered: true,
                balance: 1.0,
                final_balance: 1.0,
                hang_updates: true,
                update_calls: AtomicU32::new(0),
            }),
        );
        hung.initialize().await.unwrap();

        let mut coordinator = Coordinator::new(vec![hung], Duration::from_secs(30));
        assert!(coordinator.shutdown().await.is_err());
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let dir = tempdir().unwrap();

        let agent = make_agent(
            dir.path(),
            "0x6666666666666666666666666666666666666666",
            Arc::new(FixedService::new(1.0, 1.0)),
        );
        let mut coordinator = Coordinator::new(vec![agent], Duration::from_secs(30));

        coordinator.start();
        let spawned = coordinator.handles.len();
        coordinator.start();
        assert_eq!(coordinator.handles.len(), spawned);

        let _ = coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_shutdown_is_guarded() {
        let dir = tempdir().unwrap();

        let agent = make_agent(
            dir.path(),
            "0x7777777777777777777777777777777777777777",
            Arc::new(FixedService::new(1.0, 2.0)),
        );
        agent.initialize().await.unwrap();

        let mut coordinator = Coordinator::new(vec![agent], Duration::from_secs(30));
        let first = coordinator.shutdown().await.unwrap();
        let second = coordinator.shutdown().await.unwrap();

        assert!((first - 2.0).abs() < 1e-9);
        assert!((second - 0.0).abs() < f64::EPSILON);
    }
}
