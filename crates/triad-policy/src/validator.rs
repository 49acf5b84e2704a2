//! Candidate policy validation
//!
//! Validation always runs against the full effective stack: the candidate is
//! substituted into the domain's local slot and composed with the real
//! ancestor chain. Hint lines are relative to the candidate text.

use crate::precheck::{tighten_only_hints, AncestorRules};
use crate::resolver::{PolicyResolver, ResolvedPolicy};
use std::sync::Arc;
use triad_core::effects::{EvaluationRequest, EvaluatorDiagnostic, PolicyEvaluatorEffects};
use triad_core::{ConsoleResult, DomainId, PolicyConfig, PolicyHint, ValidationReport};
use triad_rules::{LayerRole, LayeredDocument, RuleSet};

/// Validates candidate policy text for a domain
#[derive(Clone)]
pub struct PolicyValidator {
    resolver: PolicyResolver,
    evaluator: Arc<dyn PolicyEvaluatorEffects>,
    config: PolicyConfig,
}

impl PolicyValidator {
    /// Create a validator
    pub fn new(
        resolver: PolicyResolver,
        evaluator: Arc<dyn PolicyEvaluatorEffects>,
        config: PolicyConfig,
    ) -> Self {
        Self {
            resolver,
            evaluator,
            config,
        }
    }

    /// Validate `candidate` as the local policy of `domain_id`
    ///
    /// Returns a report for policy problems. Evaluator failures and
    /// unreachable collaborators are errors, never hints.
    pub async fn validate(
        &self,
        domain_id: &DomainId,
        candidate: &str,
    ) -> ConsoleResult<ValidationReport> {
        let resolved = self.resolver.resolve(domain_id).await?;
        self.validate_resolved(&resolved, candidate).await
    }

    /// Validate `candidate` against an already resolved chain
    pub async fn validate_resolved(
        &self,
        resolved: &ResolvedPolicy,
        candidate: &str,
    ) -> ConsoleResult<ValidationReport> {
        let domain_id = resolved.domain_id();
        let parsed = RuleSet::parse(candidate);
        if !parsed.is_valid() {
            let hints = parsed
                .errors
                .iter()
                .map(|err| {
                    let hint = PolicyHint::new(err.line, err.column, err.message.clone());
                    match &err.suggested_fix {
                        Some(fix) => hint.with_fix(fix.clone()),
                        None => hint,
                    }
                })
                .collect();
            let report = ValidationReport::from_hints(hints);
            tracing::debug!(domain = %domain_id, hints = report.hints.len(), "candidate has syntax errors");
            return Ok(report);
        }

        if self.config.structural_precheck {
            let ancestors = AncestorRules::from_chain(&resolved.parent_chain);
            let hints = tighten_only_hints(&parsed, &ancestors);
            if !hints.is_empty() {
                tracing::debug!(domain = %domain_id, hints = hints.len(), "candidate widens inherited policy");
                return Ok(ValidationReport::from_hints(hints));
            }
        }

        let document = resolved.effective_with_local(candidate);
        let request = EvaluationRequest {
            policy: document,
            input: self.config.representative_input.clone(),
            query: self.config.query.clone(),
        };
        let outcome = self.evaluator.evaluate(&request).await?;
        let layered = LayeredDocument::parse(&request.policy);
        let hints: Vec<PolicyHint> = outcome
            .diagnostics
            .iter()
            .map(|diag| locate(&layered, diag))
            .collect();
        let report = ValidationReport::from_hints(hints);
        tracing::info!(
            domain = %domain_id,
            success = report.success,
            hints = report.hints.len(),
            "policy candidate validated"
        );
        Ok(report)
    }

    /// Resolver the validator reads chains through
    pub fn resolver(&self) -> &PolicyResolver {
        &self.resolver
    }
}

/// Map an evaluator diagnostic back onto the candidate text
fn locate(document: &LayeredDocument, diag: &EvaluatorDiagnostic) -> PolicyHint {
    match document.layer_at(diag.line) {
        Some(layer) if layer.role == LayerRole::Local => PolicyHint::new(
            diag.line - layer.first_line + 1,
            diag.column,
            diag.message.clone(),
        ),
        Some(layer) => PolicyHint::new(
            1,
            1,
            format!(
                "inherited layer '{}' line {}: {}",
                layer.domain.as_deref().unwrap_or("?"),
                diag.line - layer.first_line + 1,
                diag.message
            ),
        )
        .with_fix("fix the ancestor's policy first"),
        None => PolicyHint::new(1, 1, diag.message.clone()),
    }
}

impl std::fmt::Debug for PolicyValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyValidator")
            .field("query", &self.config.query)
            .field("structural_precheck", &self.config.structural_precheck)
            .finish_non_exhaustive()
    }
}
