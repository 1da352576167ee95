//! Post-commit sagas.
//!
//! Some creates are followed by calls to other services (replicating a new
//! user, assigning roles). Those calls cannot join the local transaction, so
//! they run after it commits as an ordered list of steps, each with a
//! compensating action.

use async_trait::async_trait;
use nestwork_model::Document;
use std::sync::Arc;
use tracing::{info, warn};

/// One external call in a saga.
#[async_trait]
pub trait SagaStep: Send + Sync {
    fn name(&self) -> &str;

    /// Performs the call for the freshly created graph.
    /// Return `Err(message)` to abort the saga.
    async fn execute(&self, created: &Document) -> Result<(), String>;

    /// Undoes a successful [`execute`](Self::execute). Default is a no-op.
    async fn compensate(&self, created: &Document) -> Result<(), String> {
        let _ = created;
        Ok(())
    }
}

/// Why a saga stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagaFailure {
    pub step: String,
    pub message: String,
    /// Compensations that themselves failed, as `step: message`.
    pub compensation_errors: Vec<String>,
}

/// An ordered list of steps.
#[derive(Clone, Default)]
pub struct Saga {
    steps: Vec<Arc<dyn SagaStep>>,
}

impl Saga {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, step: impl SagaStep + 'static) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every step in order. On the first failure the steps that already
    /// succeeded are compensated in reverse order.
    pub async fn run(&self, created: &Document) -> Result<(), SagaFailure> {
        for (index, step) in self.steps.iter().enumerate() {
            if let Err(message) = step.execute(created).await {
                warn!("saga step '{}' failed: {message}", step.name());
                let compensation_errors = self.compensate(&self.steps[..index], created).await;
                return Err(SagaFailure {
                    step: step.name().to_string(),
                    message,
                    compensation_errors,
                });
            }
            info!("saga step '{}' done", step.name());
        }
        Ok(())
    }

    async fn compensate(&self, done: &[Arc<dyn SagaStep>], created: &Document) -> Vec<String> {
        let mut errors = Vec::new();
        for step in done.iter().rev() {
            if let Err(message) = step.compensate(created).await {
                warn!("compensation for '{}' failed: {message}", step.name());
                errors.push(format!("{}: {message}", step.name()));
            }
        }
        errors
    }
}
