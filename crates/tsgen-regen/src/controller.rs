//! The long-lived regeneration controller.
//!
//! Triggering events go into a [`DebounceGate`]; every settlement runs one
//! cycle on a worker task and broadcasts the outcome. Because the worker
//! holds the settlement until the cycle finishes, cycles never overlap and
//! events that arrive meanwhile produce exactly one follow-up cycle.
//!
//! Each cycle runs on its own task. A panic in an injected collaborator is
//! reported as [`CycleError::Panicked`] and the worker carries on.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tsgen_core::FingerprintStore;

use crate::cycle::CycleRunner;
use crate::debounce::{DebounceGate, Settlement};
use crate::error::CycleError;
use crate::generator::ClientGenerator;
use crate::outcome::GenerationOutcome;
use crate::provider::ProviderResolver;

/// Outcomes buffered per subscriber before the oldest are dropped.
const OUTCOME_CAPACITY: usize = 16;

/// Debounces triggering events into regeneration cycles.
#[derive(Debug)]
pub struct RegenerationController<R, G, S> {
    runner: Arc<CycleRunner<R, G, S>>,
    gate: DebounceGate,
    auto_generate: bool,
    outcomes: broadcast::Sender<GenerationOutcome>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<R, G, S> RegenerationController<R, G, S>
where
    R: ProviderResolver + 'static,
    G: ClientGenerator + 'static,
    S: FingerprintStore + 'static,
{
    /// Starts the gate and the cycle worker.
    ///
    /// Cancelling `cancel` stops the gate; a cycle already running finishes.
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        runner: Arc<CycleRunner<R, G, S>>,
        debounce: Duration,
        auto_generate: bool,
        cancel: &CancellationToken,
    ) -> Self {
        let (gate, settlements) = DebounceGate::spawn(debounce, cancel.child_token());
        let (outcomes, _) = broadcast::channel(OUTCOME_CAPACITY);

        let worker = tokio::spawn(run_worker(
            Arc::clone(&runner),
            settlements,
            outcomes.clone(),
        ));

        info!(
            debounce_ms = debounce.as_millis(),
            auto_generate, "Regeneration controller started"
        );

        Self {
            runner,
            gate,
            auto_generate,
            outcomes,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Reports that something the schema may depend on changed.
    ///
    /// Never blocks. With `auto_generate` off this only logs.
    pub fn on_triggering_event(&self) {
        if !self.auto_generate {
            debug!("Auto-generation disabled, ignoring triggering event");
            return;
        }
        self.gate.notify();
    }

    /// Subscribes to cycle outcomes.
    pub fn subscribe(&self) -> broadcast::Receiver<GenerationOutcome> {
        self.outcomes.subscribe()
    }

    /// Returns the cycle runner.
    pub fn runner(&self) -> &CycleRunner<R, G, S> {
        &self.runner
    }

    /// Returns `true` while a cycle is running.
    pub fn is_busy(&self) -> bool {
        self.gate.is_in_flight()
    }

    /// Discards pending events and waits for a running cycle to finish.
    pub async fn shutdown(&self) {
        self.gate.shutdown().await;
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!(error = %e, "Regeneration worker ended abnormally");
            }
        }
        debug!("Regeneration controller stopped");
    }
}

async fn run_worker<R, G, S>(
    runner: Arc<CycleRunner<R, G, S>>,
    mut settlements: mpsc::Receiver<Settlement>,
    outcomes: broadcast::Sender<GenerationOutcome>,
) where
    R: ProviderResolver + 'static,
    G: ClientGenerator + 'static,
    S: FingerprintStore + 'static,
{
    while let Some(settlement) = settlements.recv().await {
        debug!(
            seq = settlement.seq(),
            coalesced = settlement.coalesced(),
            "Starting regeneration cycle"
        );
        let cycle = Arc::clone(&runner);
        let outcome = match tokio::spawn(async move { cycle.run_cycle().await }).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let message = panic_message(e);
                warn!(seq = settlement.seq(), %message, "Regeneration cycle panicked");
                CycleError::Panicked { message }.into()
            }
        };
        // No subscribers is fine.
        let _ = outcomes.send(outcome);
        settlement.complete();
    }
}

fn panic_message(error: JoinError) -> String {
    if !error.is_panic() {
        return error.to_string();
    }
    let payload = error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::CycleSettings;
    use crate::testing::{Behavior, FakeGenerator, FakeResolver, MemoryStore, schema_with_title};
    use camino::Utf8PathBuf;
    use tokio::sync::broadcast::error::TryRecvError;
    use tokio::time::{Instant, sleep};
    use tsgen_core::ClientFormat;

    const DEBOUNCE: Duration = Duration::from_millis(200);

    type Controller = RegenerationController<Arc<FakeResolver>, Arc<FakeGenerator>, Arc<MemoryStore>>;

    fn controller(generator: Behavior, auto_generate: bool) -> (Controller, Arc<FakeResolver>, Arc<FakeGenerator>) {
        let resolver = Arc::new(FakeResolver::serving(&schema_with_title("NinjaAPI")));
        let generator = Arc::new(FakeGenerator::new(generator));
        let runner = CycleRunner::new(
            Arc::clone(&resolver),
            Arc::clone(&generator),
            Arc::new(MemoryStore::new(None)),
            CycleSettings {
                provider: "cmd:export-schema".to_owned(),
                output_dir: Utf8PathBuf::from("frontend/src/api"),
                format: ClientFormat::Fetch,
                generate_timeout: Duration::from_secs(120),
            },
        );
        let controller = RegenerationController::spawn(
            Arc::new(runner),
            DEBOUNCE,
            auto_generate,
            &CancellationToken::new(),
        );
        (controller, resolver, generator)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_runs_one_cycle() {
        let (controller, _, generator) = controller(Behavior::Succeed, true);
        let mut outcomes = controller.subscribe();
        let start = Instant::now();

        controller.on_triggering_event();
        sleep(Duration::from_millis(50)).await;
        controller.on_triggering_event();
        sleep(Duration::from_millis(50)).await;
        controller.on_triggering_event();

        let outcome = outcomes.recv().await.unwrap();
        assert!(matches!(outcome, GenerationOutcome::Succeeded { .. }));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(300) && elapsed < Duration::from_millis(310));
        assert_eq!(generator.calls(), 1);

        controller.on_triggering_event();
        let outcome = outcomes.recv().await.unwrap();
        assert_eq!(outcome.reason_code(), "unchanged");
        assert_eq!(generator.calls(), 1);

        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_during_cycle_run_one_follow_up() {
        let (controller, resolver, generator) =
            controller(Behavior::Delay(Duration::from_secs(1)), true);
        let mut outcomes = controller.subscribe();

        controller.on_triggering_event();
        sleep(DEBOUNCE + Duration::from_millis(50)).await;
        assert!(controller.is_busy());
        assert_eq!(generator.calls(), 1);

        resolver.set_schema(&schema_with_title("NinjaAPI v2"));
        for _ in 0..3 {
            controller.on_triggering_event();
            sleep(Duration::from_millis(100)).await;
        }

        let first = outcomes.recv().await.unwrap();
        let second = outcomes.recv().await.unwrap();
        assert!(matches!(first, GenerationOutcome::Succeeded { .. }));
        assert!(matches!(second, GenerationOutcome::Succeeded { .. }));
        assert_ne!(first.fingerprint(), second.fingerprint());
        assert_eq!(generator.calls(), 2);

        sleep(Duration::from_secs(5)).await;
        assert!(matches!(outcomes.try_recv(), Err(TryRecvError::Empty)));
        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_generate_off_ignores_events() {
        let (controller, resolver, generator) = controller(Behavior::Succeed, false);

        controller.on_triggering_event();
        sleep(Duration::from_secs(1)).await;

        assert_eq!(resolver.resolutions(), 0);
        assert_eq!(generator.calls(), 0);
        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_running_cycle() {
        let (controller, _, generator) = controller(Behavior::Delay(Duration::from_secs(1)), true);
        let mut outcomes = controller.subscribe();

        controller.on_triggering_event();
        sleep(DEBOUNCE + Duration::from_millis(50)).await;
        assert_eq!(generator.calls(), 1);

        controller.shutdown().await;
        assert!(matches!(
            outcomes.try_recv(),
            Ok(GenerationOutcome::Succeeded { .. })
        ));
        assert!(!controller.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_discards_pending_events() {
        let (controller, resolver, _) = controller(Behavior::Succeed, true);

        controller.on_triggering_event();
        sleep(Duration::from_millis(50)).await;
        controller.shutdown().await;
        sleep(Duration::from_secs(1)).await;

        assert_eq!(resolver.resolutions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_generator_keeps_worker_alive() {
        let (controller, _, generator) = controller(Behavior::Panic("generator blew up"), true);
        let mut outcomes = controller.subscribe();

        controller.on_triggering_event();
        let outcome = outcomes.recv().await.unwrap();
        assert_eq!(outcome.reason_code(), "panicked");
        assert!(outcome.to_string().contains("generator blew up"));

        generator.set_behavior(Behavior::Succeed);
        controller.on_triggering_event();
        let outcome = outcomes.recv().await.unwrap();
        assert!(matches!(outcome, GenerationOutcome::Succeeded { .. }));
        assert_eq!(generator.calls(), 2);

        controller.shutdown().await;
    }
}
