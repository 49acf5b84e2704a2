//! Tighten-only across the resolver and evaluator
//!
//! For a random parent policy and a random child policy, anything the
//! child's effective stack allows is also allowed by the parent's.

use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use triad_core::effects::{EvaluationRequest, PolicyEvaluatorEffects};
use triad_core::{Domain, DomainId, PolicyConfig};
use triad_effects::{MemoryDomainDirectory, MemoryPolicyStore, RuleEvaluator};
use triad_policy::PolicyResolver;

const PATTERNS: &[&str] = &["*", "ci.*", "ci.call.*", "ci.call.v1", "db.*", "db.read"];
const ACTIONS: &[&str] = &["ci.call.v1", "ci.call.v2", "ci.deploy", "db.read", "db.write"];

fn rule_line() -> impl Strategy<Value = String> {
    (
        prop::bool::ANY,
        prop::sample::select(PATTERNS),
        prop::option::of(prop::sample::select(&["upward", "downward", "lateral"][..])),
    )
        .prop_map(|(allow, pattern, direction)| {
            let effect = if allow { "allow" } else { "deny" };
            match direction {
                Some(d) => format!("{effect} {pattern} when direction == {d}"),
                None => format!("{effect} {pattern}"),
            }
        })
}

fn policy_text() -> impl Strategy<Value = String> {
    prop::collection::vec(rule_line(), 0..5).prop_map(|lines| lines.join("\n"))
}

async fn decide(effective: &str, action: &str, direction: &str) -> Option<bool> {
    let request = EvaluationRequest {
        policy: effective.to_string(),
        input: json!({"action": action, "direction": direction}),
        query: PolicyConfig::default().query,
    };
    RuleEvaluator::new()
        .evaluate(&request)
        .await
        .ok()
        .and_then(|outcome| outcome.allow)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn child_never_allows_what_parent_denies(
        root in policy_text(),
        mid in policy_text(),
        leaf in policy_text(),
        action in prop::sample::select(ACTIONS),
        direction in prop::sample::select(&["upward", "downward", "lateral"][..]),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        runtime.block_on(async {
            let dir = MemoryDomainDirectory::new();
            dir.insert(Domain::root("root", "Root"));
            dir.insert(Domain::child("mid", "root", "Mid"));
            dir.insert(Domain::child("leaf", "mid", "Leaf"));
            let store = MemoryPolicyStore::new();
            store.seed("root", root.clone());
            store.seed("mid", mid.clone());
            store.seed("leaf", leaf.clone());
            let resolver = PolicyResolver::new(
                Arc::new(dir),
                Arc::new(store),
                &PolicyConfig::default(),
            );

            let parent = resolver.resolve(&DomainId::new("mid")).await.unwrap();
            let child = resolver.resolve(&DomainId::new("leaf")).await.unwrap();
            let parent_allows = decide(&parent.effective, action, direction).await;
            let child_allows = decide(&child.effective, action, direction).await;

            prop_assert!(parent_allows.is_some());
            prop_assert!(child_allows.is_some());
            if child_allows == Some(true) {
                prop_assert_eq!(parent_allows, Some(true));
            }
            Ok(())
        })?;
    }

    #[test]
    fn root_effective_is_local(root in policy_text()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let resolved = runtime.block_on(async {
            let dir = MemoryDomainDirectory::new();
            dir.insert(Domain::root("root", "Root"));
            let store = MemoryPolicyStore::new();
            store.seed("root", root.clone());
            PolicyResolver::new(Arc::new(dir), Arc::new(store), &PolicyConfig::default())
                .resolve(&DomainId::new("root"))
                .await
                .unwrap()
        });
        prop_assert_eq!(&resolved.effective, &root);
        prop_assert!(resolved.parent_chain.is_empty());
    }
}
