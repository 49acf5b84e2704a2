//! Bundled rule evaluator
//!
//! Evaluates layered rule documents with the reference stack semantics. The
//! console treats it as any other opaque evaluator: it only sees verdicts and
//! diagnostics.

use crate::fault::FaultSwitch;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use triad_core::effects::{
    EvaluationOutcome, EvaluationRequest, EvaluatorDiagnostic, PolicyEvaluatorEffects,
};
use triad_core::{ConsoleError, ConsoleResult};
use triad_rules::{evaluate_stack, LayeredDocument};

/// Queries this evaluator answers end with this segment
pub const ALLOW_QUERY_SUFFIX: &str = ".allow";

/// In-process evaluator for the console's rule dialect
#[derive(Debug, Clone, Default)]
pub struct RuleEvaluator {
    fault: FaultSwitch,
    failure: Arc<Mutex<Option<String>>>,
    calls: Arc<AtomicUsize>,
}

impl RuleEvaluator {
    /// Evaluator in the reachable state
    pub fn new() -> Self {
        Self::default()
    }

    /// Share a reachability switch with other handlers
    pub fn with_fault(mut self, fault: FaultSwitch) -> Self {
        self.fault = fault;
        self
    }

    /// The evaluator's reachability switch
    pub fn fault(&self) -> &FaultSwitch {
        &self.fault
    }

    /// Make every evaluation fail with `Evaluator(message)` until cleared
    pub fn fail_with(&self, message: Option<String>) {
        *self.failure.lock() = message;
    }

    /// Number of evaluations attempted
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Parse diagnostics of a document, in document coordinates
    pub fn diagnostics(document: &LayeredDocument) -> Vec<EvaluatorDiagnostic> {
        document
            .layers
            .iter()
            .flat_map(|layer| {
                layer.rules.errors.iter().map(move |err| EvaluatorDiagnostic {
                    line: layer.document_line(err.line),
                    column: err.column,
                    message: err.message.clone(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl PolicyEvaluatorEffects for RuleEvaluator {
    async fn evaluate(&self, request: &EvaluationRequest) -> ConsoleResult<EvaluationOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.fault.check("policy evaluator")?;
        if let Some(message) = self.failure.lock().clone() {
            return Err(ConsoleError::evaluator(message));
        }

        let document = LayeredDocument::parse(&request.policy);
        let diagnostics = Self::diagnostics(&document);
        if !diagnostics.is_empty() {
            return Ok(EvaluationOutcome {
                allow: None,
                diagnostics,
            });
        }
        if !request.query.ends_with(ALLOW_QUERY_SUFFIX) {
            tracing::debug!(query = %request.query, "query undefined for this evaluator");
            return Ok(EvaluationOutcome::default());
        }
        let Some(action) = request.input.get("action").and_then(|a| a.as_str()) else {
            return Ok(EvaluationOutcome::default());
        };

        let verdict = evaluate_stack(&document.rule_sets(), action, &request.input);
        tracing::trace!(action, ?verdict, "stack evaluated");
        Ok(EvaluationOutcome {
            allow: Some(verdict.is_allow()),
            diagnostics: Vec::new(),
        })
    }
}
