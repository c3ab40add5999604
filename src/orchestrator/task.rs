//! The queue-driven backup control loop

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::notifications::api::{AsyncNotificationManager, Event, PackageEvent, RunEvent};
use crate::ops::{BackupTask, OpKind, OpRegistry};
use crate::orchestrator::{BackupConfig, OrchestratorError, RunLifecycle, RunScheduler};
use crate::producer::{Producer, ProducerEngine};
use crate::relay::{CancelGate, PipePair, RelayPump};
use crate::runner::ProducerRunner;
use crate::transport::{BackupOutcome, RunStatus, Transport, TransportStatus};

/// Runs a queue of producers through the transport, one at a time
///
/// One instance per run; `run()` is single-shot. Whole-run cancellation
/// arrives through [`BackupTask::handle_cancel`], either directly or via the
/// operation registry entry the run holds for its duration.
pub struct BackupOrchestrator {
    config: BackupConfig,
    queue: Vec<Producer>,
    engine: Arc<dyn ProducerEngine>,
    transport: Arc<dyn Transport>,
    registry: Arc<OpRegistry>,
    notifications: Arc<Mutex<AsyncNotificationManager>>,
    scheduler: Arc<dyn RunScheduler>,
    lifecycle: Arc<dyn RunLifecycle>,
    cancel: Arc<CancelGate>,
    pump: RelayPump,
    started: AtomicBool,
}

impl BackupOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: BackupConfig,
        queue: Vec<Producer>,
        engine: Arc<dyn ProducerEngine>,
        transport: Arc<dyn Transport>,
        registry: Arc<OpRegistry>,
        notifications: Arc<Mutex<AsyncNotificationManager>>,
        scheduler: Arc<dyn RunScheduler>,
        lifecycle: Arc<dyn RunLifecycle>,
    ) -> Arc<Self> {
        let cancel = CancelGate::new();
        let pump = RelayPump::new(
            config.chunk_size,
            Arc::clone(&transport),
            Arc::clone(&cancel),
            Arc::clone(&notifications),
        );
        Arc::new(Self {
            config,
            queue,
            engine,
            transport,
            registry,
            notifications,
            scheduler,
            lifecycle,
            cancel,
            pump,
            started: AtomicBool::new(false),
        })
    }

    /// Process the queue to completion or cancellation.
    ///
    /// Global cleanup runs exactly once before this returns, on every exit
    /// path: the registry entry is removed, the run-finished event is
    /// published, the lifecycle guard is released if it was taken, and the
    /// scheduler is asked to plan the next run unless this one was
    /// cancelled.
    pub async fn run(self: &Arc<Self>) -> Result<RunStatus, OrchestratorError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(OrchestratorError::AlreadyStarted);
        }

        let acquired = self.lifecycle.try_acquire().await;
        if !acquired {
            log::warn!("Skipping full backup; a backup run is already in progress");
            self.cancel.set_cancelled().await;
        }

        let token = self
            .registry
            .register(Arc::clone(self) as Arc<dyn BackupTask>, OpKind::Run);
        log::debug!("Registered backup run, token={:#x}", token);

        self.publish(Event::Run(RunEvent::started())).await;

        let (loop_status, backoff) = self.run_queue().await;
        let run_status = if self.cancel.is_cancelled().await {
            RunStatus::Cancelled
        } else {
            loop_status
        };

        log::info!("Full data backup pass finished: {}", run_status);
        self.publish(Event::Run(RunEvent::finished(run_status))).await;
        self.registry.unregister(token);
        if acquired {
            self.lifecycle.release().await;
        }
        if run_status != RunStatus::Cancelled && self.config.update_schedule {
            self.scheduler.schedule_next_run(backoff).await;
        }

        Ok(run_status)
    }

    async fn run_queue(&self) -> (RunStatus, Duration) {
        let mut run_status = RunStatus::Success;
        let mut backoff = Duration::ZERO;

        for producer in &self.queue {
            let name = producer.name();
            log::info!("Initiating full-data transport backup of {}", name);

            let (data, mut transport_pipes) =
                PipePair::open_with_reader(self.config.pipe_capacity);
            let mut engine_pipes: Option<PipePair> = None;
            let mut runner: Option<Arc<ProducerRunner>> = None;
            let mut quota = u64::MAX;

            // Offer the transfer and, on acceptance, start the runner —
            // atomically with the cancel flag, so cancellation lands either
            // strictly before this producer's slot exists or through the
            // runner's token once it does.
            let begin_status = {
                let mut gate = self.cancel.lock().await;
                if gate.cancel_all {
                    transport_pipes.close();
                    break;
                }
                let status = self
                    .transport
                    .begin_full_backup(producer, data, self.config.transfer_flags())
                    .await;
                if status.is_ok() {
                    quota = self.transport.get_quota(producer).await;
                    let (writer, pair) =
                        PipePair::open_with_writer(self.config.pipe_capacity);
                    engine_pipes = Some(pair);
                    let started = ProducerRunner::new(
                        producer.clone(),
                        Arc::clone(&self.engine),
                        Arc::clone(&self.transport),
                        Arc::clone(&self.registry),
                        quota,
                        self.config.timeouts(),
                    );
                    gate.in_flight_op = Some(started.spawn(writer));
                    runner = Some(started);
                }
                status
            };

            let mut package_outcome: BackupOutcome = begin_status.into();

            if begin_status.is_ok() {
                if let (Some(active), Some(pipes)) = (runner.as_deref(), engine_pipes.as_mut()) {
                    package_outcome = self
                        .stream_producer(producer, active, pipes, &mut transport_pipes, quota)
                        .await;

                    // Transport-level failures take precedence; the runner's
                    // own code fills in only when the transport side stayed
                    // clean.
                    let runner_outcome = active.wait_final_result().await;
                    if package_outcome.is_success() && !runner_outcome.is_success() {
                        package_outcome = runner_outcome;
                    }

                    {
                        let mut gate = self.cancel.lock().await;
                        gate.in_flight_op = None;
                        // A cancellation has already aborted the transfer;
                        // otherwise commit a clean attempt or abort a dirty
                        // one. The commit's own status is the last word only
                        // when everything else stayed OK.
                        if !gate.cancel_all {
                            if package_outcome.is_success() {
                                package_outcome = self.transport.finish_backup().await.into();
                            } else {
                                self.transport.cancel_full_backup().await;
                            }
                        }
                    }
                }

                let gate = self.cancel.lock().await;
                if !gate.cancel_all {
                    backoff = self.transport.request_next_delay().await;
                    log::debug!("Transport suggested backoff {:?}", backoff);
                }
            }

            if self.config.update_schedule {
                self.scheduler.requeue_producer(name).await;
            }

            self.publish(Event::Package(PackageEvent::new(name, package_outcome)))
                .await;

            match package_outcome {
                BackupOutcome::Success => {
                    log::info!("Full-data backup of {} complete", name);
                }
                BackupOutcome::PackageRejected => {
                    log::info!("Transport rejected backup of {}, skipping", name);
                    // Rejection can come a-priori from begin or from the
                    // preflight pass; only the latter has an agent to kill.
                    if runner.is_some() {
                        self.engine.tear_down(producer).await;
                    }
                }
                BackupOutcome::QuotaExceeded => {
                    log::info!("Transport quota exceeded for {}", name);
                    // Give the runner a moment to deliver the quota signal
                    // before the agent goes away.
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    self.engine.tear_down(producer).await;
                }
                BackupOutcome::AgentError => {
                    log::warn!("Producer agent failure for {}", name);
                    self.engine.tear_down(producer).await;
                }
                BackupOutcome::Cancelled => {
                    log::warn!("Backup cancelled for {}", name);
                    self.engine.tear_down(producer).await;
                }
                BackupOutcome::TransportAborted => {
                    log::warn!("Transport failed; aborting backup run at {}", name);
                    run_status = RunStatus::TransportAborted;
                    self.engine.tear_down(producer).await;
                }
            }

            transport_pipes.close();
            if let Some(mut pipes) = engine_pipes {
                pipes.close();
            }
            self.engine.unbind(producer).await;

            if run_status == RunStatus::TransportAborted {
                break;
            }
        }

        (run_status, backoff)
    }

    /// Gate the transfer on the preflight verdict, then pump bytes.
    async fn stream_producer(
        &self,
        producer: &Producer,
        runner: &ProducerRunner,
        engine_pipes: &mut PipePair,
        transport_pipes: &mut PipePair,
        quota: u64,
    ) -> BackupOutcome {
        let name = producer.name();
        match runner.wait_preflight_result().await {
            Err(code) => {
                log::debug!(
                    "Backup error after preflight of {}: {}, not running backup",
                    name,
                    code
                );
                code
            }
            Ok(expected) => match (engine_pipes.reader_mut(), transport_pipes.writer_mut()) {
                (Some(source), Some(sink)) => {
                    let pumped = self.pump.run(name, source, sink, quota, expected).await;
                    if pumped.status == TransportStatus::QuotaExceeded {
                        runner.send_quota_exceeded(pumped.bytes_moved, quota).await;
                    }
                    pumped.status.into()
                }
                // A detached half means the slot was already torn down.
                _ => BackupOutcome::TransportAborted,
            },
        }
    }

    async fn publish(&self, event: Event) {
        if let Err(err) = self.notifications.lock().await.publish(event).await {
            log::debug!("Backup event not delivered: {}", err);
        }
    }
}

#[async_trait]
impl BackupTask for BackupOrchestrator {
    async fn operation_complete(&self, _result: i64) {
        // The run-level operation completes by unregistering, not by
        // callback.
    }

    /// Cancel the whole run.
    ///
    /// Only `cancel_all = true` is supported here; cancelling a single
    /// producer due to its own timeout is the runner's internal business.
    /// The lock is held across the transport abort so that once this
    /// returns, no further transport calls can be issued by the run.
    async fn handle_cancel(&self, cancel_all: bool) {
        if !cancel_all {
            log::error!("Expected cancel_all to be true; ignoring partial cancel request");
            return;
        }

        let mut gate = self.cancel.lock().await;
        if gate.cancel_all {
            log::debug!("Ignoring duplicate cancel call");
            return;
        }
        gate.cancel_all = true;

        if let Some(token) = gate.in_flight_op {
            self.registry.cancel(token, true).await;
            self.transport.cancel_full_backup().await;
        }
    }
}
