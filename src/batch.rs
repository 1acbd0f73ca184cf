//! Batch Command Dispatcher.
//!
//! A fixed-size pool of tokio tasks drains a shared atomic counter over
//! the input command vector. Results land in a preallocated vector at
//! their input index, so ordering is positional regardless of completion
//! order, and a failure in one command never aborts the batch.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Mutex;
use utoipa::ToSchema;

use crate::error::{CoreError, CoreResult};
use crate::manager::{EmulatorManager, Selector};

/// Commands the dispatcher will execute; anything else is rejected at
/// submission.
pub const BATCHABLE_COMMANDS: &[&str] = &[
    "load-snapshot",
    "reset",
    "pause",
    "resume",
    "feature",
    "create",
    "start",
    "stop",
];

#[derive(Debug, Clone)]
pub struct BatchCommand {
    pub selector: Selector,
    pub command: String,
    pub arg1: String,
    pub arg2: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchResult {
    pub selector: String,
    pub command: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
    pub results: Vec<BatchResult>,
}

pub struct BatchDispatcher {
    manager: Arc<EmulatorManager>,
    workers: usize,
}

impl BatchDispatcher {
    pub fn new(manager: Arc<EmulatorManager>, workers: usize) -> Self {
        let workers = workers.max(1);
        Self { manager, workers }
    }

    /// Rejects the whole batch at submission if any command is outside
    /// the whitelist, otherwise dispatches across `self.workers` concurrent
    /// tasks.
    pub async fn execute(&self, commands: Vec<BatchCommand>) -> CoreResult<BatchSummary> {
        if let Some(bad) = commands.iter().find(|c| !BATCHABLE_COMMANDS.contains(&c.command.as_str())) {
            return Err(CoreError::NotBatchable(format!(
                "command '{}' is not batchable",
                bad.command
            )));
        }

        let started = Instant::now();
        let total = commands.len();
        let commands = Arc::new(commands);
        let next_index = Arc::new(AtomicUsize::new(0));
        let results: Arc<Mutex<Vec<Option<BatchResult>>>> = Arc::new(Mutex::new(vec![None; total]));

        let worker_count = self.workers.min(total.max(1));
        let mut handles = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let manager = self.manager.clone();
            let commands = commands.clone();
            let next_index = next_index.clone();
            let results = results.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let index = next_index.fetch_add(1, Ordering::SeqCst);
                    if index >= commands.len() {
                        break;
                    }
                    let command = &commands[index];
                    let result = execute_one(&manager, command).await;
                    let mut results = results.lock().await;
                    results[index] = Some(result);
                }
            }));
        }

        for handle in handles {
            // A worker task panicking must not abort the batch; treat it
            // as having already recorded its own failures.
            let _ = handle.await;
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let results: Vec<BatchResult> = Arc::try_unwrap(results)
            .map(|m| m.into_inner())
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, r)| {
                r.unwrap_or_else(|| BatchResult {
                    selector: format!("{:?}", commands[i].selector),
                    command: commands[i].command.clone(),
                    success: false,
                    error: Some("worker terminated before producing a result".into()),
                })
            })
            .collect();

        let succeeded = results.iter().filter(|r| r.success).count();
        let failed = results.len() - succeeded;

        Ok(BatchSummary {
            total,
            succeeded,
            failed,
            elapsed_ms,
            results,
        })
    }
}

fn selector_label(selector: &Selector) -> String {
    match selector {
        Selector::Uuid(u) => u.to_string(),
        Selector::Symbolic(s) => s.clone(),
        Selector::Index(i) => i.to_string(),
    }
}

/// Resolves the target instance and applies the requested operation,
/// catching every failure at this boundary and converting it to a failed
/// `BatchResult` — failures isolate to the one command, never the batch.
async fn execute_one(manager: &EmulatorManager, command: &BatchCommand) -> BatchResult {
    let label = selector_label(&command.selector);
    let outcome = run_command(manager, command).await;
    match outcome {
        Ok(()) => BatchResult {
            selector: label,
            command: command.command.clone(),
            success: true,
            error: None,
        },
        Err(e) => BatchResult {
            selector: label,
            command: command.command.clone(),
            success: false,
            error: Some(e.to_string()),
        },
    }
}

async fn run_command(manager: &EmulatorManager, command: &BatchCommand) -> CoreResult<()> {
    if command.command == "create" {
        let symbolic_id = if command.arg1.is_empty() { None } else { Some(command.arg1.clone()) };
        let model = if command.arg2.is_empty() { None } else { Some(command.arg2.clone()) };
        manager.create(symbolic_id, model, None).await?;
        return Ok(());
    }

    let arc = manager
        .resolve(&command.selector)
        .await
        .ok_or_else(|| CoreError::NotFound("no such emulator instance".into()))?;
    let mut instance = arc.lock().await;

    match command.command.as_str() {
        "reset" => instance.reset(),
        "pause" => instance.pause(),
        "resume" => instance.resume(),
        "start" => instance.start(),
        "stop" => instance.stop(),
        "feature" => {
            if command.arg1.is_empty() {
                return Err(CoreError::InvalidArgument("feature command requires arg1 (feature name)".into()));
            }
            instance.set_feature(command.arg1.clone());
            Ok(())
        }
        "load-snapshot" => {
            if instance.debug.debug_paused {
                return Err(CoreError::InvalidState(
                    "instance is paused by the debugger; clear the debug pause before loading a snapshot".into(),
                ));
            }
            if command.arg1.is_empty() {
                return Err(CoreError::InvalidArgument("load-snapshot command requires arg1 (path)".into()));
            }
            let path = command.arg1.clone();
            instance.with_pause_barrier(move |i| crate::snapshot::load_from_path(&path, i))?
        }
        other => Err(CoreError::NotBatchable(format!("command '{}' is not batchable", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;

    fn dispatcher(workers: usize) -> (Arc<EmulatorManager>, BatchDispatcher) {
        let manager = Arc::new(EmulatorManager::new(EventBus::new()));
        let dispatcher = BatchDispatcher::new(manager.clone(), workers);
        (manager, dispatcher)
    }

    #[tokio::test]
    async fn rejects_whole_batch_for_one_unbatchable_command() {
        let (_manager, dispatcher) = dispatcher(2);
        let commands = vec![BatchCommand {
            selector: Selector::Index(0),
            command: "nuke-everything".into(),
            arg1: String::new(),
            arg2: String::new(),
        }];
        let err = dispatcher.execute(commands).await.unwrap_err();
        assert!(matches!(err, CoreError::NotBatchable(_)));
    }

    #[tokio::test]
    async fn results_are_positional_regardless_of_completion_order() {
        let (manager, dispatcher) = dispatcher(4);
        manager.create(Some("a".into()), None, None).await.unwrap();
        manager.create(Some("b".into()), None, None).await.unwrap();

        let commands = vec![
            BatchCommand {
                selector: Selector::Symbolic("a".into()),
                command: "start".into(),
                arg1: String::new(),
                arg2: String::new(),
            },
            BatchCommand {
                selector: Selector::Symbolic("missing".into()),
                command: "start".into(),
                arg1: String::new(),
                arg2: String::new(),
            },
            BatchCommand {
                selector: Selector::Symbolic("b".into()),
                command: "start".into(),
                arg1: String::new(),
                arg2: String::new(),
            },
        ];

        let summary = dispatcher.execute(commands).await.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.results.len(), 3);
        assert!(summary.results[0].success);
        assert!(!summary.results[1].success);
        assert!(summary.results[2].success);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn batch_create_adds_a_new_instance() {
        let (manager, dispatcher) = dispatcher(1);
        let commands = vec![BatchCommand {
            selector: Selector::Index(0),
            command: "create".into(),
            arg1: "spawned".into(),
            arg2: String::new(),
        }];
        let summary = dispatcher.execute(commands).await.unwrap();
        assert!(summary.results[0].success);
        assert!(manager.resolve(&Selector::Symbolic("spawned".into())).await.is_some());
    }
}
