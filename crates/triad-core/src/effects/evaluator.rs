//! Opaque policy evaluator

use crate::errors::ConsoleResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One evaluation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// Full policy document (effective stack)
    pub policy: String,
    /// Input document
    pub input: serde_json::Value,
    /// Query path, e.g. `data.triad.flow.allow`
    pub query: String,
}

/// Evaluator diagnostic addressed into [`EvaluationRequest::policy`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorDiagnostic {
    /// 1-based line within the submitted document
    pub line: u32,
    /// 1-based column
    pub column: u32,
    /// Diagnostic text
    pub message: String,
}

/// What the evaluator returned
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    /// Verdict; `None` when the query was undefined for this input
    pub allow: Option<bool>,
    /// Compile or evaluation diagnostics; non-empty means the document is invalid
    pub diagnostics: Vec<EvaluatorDiagnostic>,
}

/// The external rule-evaluation runtime
///
/// The console never interprets policy semantics itself beyond the structural
/// pre-check; allow/deny comes from here. `Err(Transient)` means unreachable,
/// `Err(Evaluator)` means the evaluation itself failed.
#[async_trait]
pub trait PolicyEvaluatorEffects: Send + Sync {
    /// Evaluate `request.query` against `request.policy` with `request.input`
    async fn evaluate(&self, request: &EvaluationRequest) -> ConsoleResult<EvaluationOutcome>;
}
