//! Policy resolution
//!
//! Walks a domain's ancestor chain and composes the effective document the
//! evaluator sees. A root's effective text is its local text, unchanged.
//! Below the root the chain is rendered root-first, one marked layer per
//! domain, with the addressed domain's local slot last.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use triad_core::effects::{DomainDirectoryEffects, PolicyStoreEffects};
use triad_core::{
    ConsoleError, ConsoleResult, Domain, DomainId, PolicyConfig, PolicyDigest, PolicyScope,
    PolicyVersion,
};
use triad_rules::{render_marker, LayerRole};

/// One ancestor's local slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyLayer {
    /// Ancestor domain
    pub domain_id: DomainId,
    /// Its local policy text (empty when never written)
    pub text: String,
}

/// A domain's local policy with its inherited chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPolicy {
    /// The resolved domain
    pub domain: Domain,
    /// Local slot text (empty when never written)
    pub local: String,
    /// Local slot version, `None` when never written
    pub local_version: Option<PolicyVersion>,
    /// Ancestors, nearest parent first; empty for roots
    pub parent_chain: Vec<PolicyLayer>,
    /// Composed document submitted to the evaluator
    pub effective: String,
}

impl ResolvedPolicy {
    /// Id of the resolved domain
    pub fn domain_id(&self) -> &DomainId {
        &self.domain.id
    }

    /// Digest of the effective document
    pub fn digest(&self) -> PolicyDigest {
        PolicyDigest::of(&self.effective)
    }

    /// Version of the effective document
    ///
    /// The revision is the local slot's; the digest covers the whole stack.
    pub fn version(&self) -> PolicyVersion {
        PolicyVersion {
            revision: self.local_version.map(|v| v.revision).unwrap_or(0),
            digest: self.digest(),
        }
    }

    /// The same chain with `candidate` substituted into the local slot
    pub fn effective_with_local(&self, candidate: &str) -> String {
        compose(&self.domain.id, candidate, &self.parent_chain)
    }

    /// Ancestors rendered root-first without the local slot
    pub fn inherited(&self) -> String {
        render_inherited(&self.parent_chain)
    }
}

fn ancestor_body(text: &str) -> &str {
    text.strip_suffix('\n').unwrap_or(text)
}

fn render_inherited(parent_chain: &[PolicyLayer]) -> String {
    parent_chain
        .iter()
        .rev()
        .map(|layer| {
            format!(
                "{}\n{}",
                render_marker(layer.domain_id.as_str(), LayerRole::Inherited),
                ancestor_body(&layer.text)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Compose an effective document from a local text and its ancestor chain
///
/// `parent_chain` is nearest parent first.
pub fn compose(domain_id: &DomainId, local: &str, parent_chain: &[PolicyLayer]) -> String {
    if parent_chain.is_empty() {
        return local.to_string();
    }
    format!(
        "{}\n{}\n{}",
        render_inherited(parent_chain),
        render_marker(domain_id.as_str(), LayerRole::Local),
        local
    )
}

/// Resolves local and effective policy for any domain
#[derive(Clone)]
pub struct PolicyResolver {
    domains: Arc<dyn DomainDirectoryEffects>,
    store: Arc<dyn PolicyStoreEffects>,
    max_chain_depth: usize,
}

impl PolicyResolver {
    /// Create a resolver over the domain tree and policy store
    pub fn new(
        domains: Arc<dyn DomainDirectoryEffects>,
        store: Arc<dyn PolicyStoreEffects>,
        config: &PolicyConfig,
    ) -> Self {
        Self {
            domains,
            store,
            max_chain_depth: config.max_chain_depth,
        }
    }

    /// The domain directory this resolver walks
    pub fn domains(&self) -> &Arc<dyn DomainDirectoryEffects> {
        &self.domains
    }

    /// Resolve a domain's local slot, ancestor chain and effective document
    pub async fn resolve(&self, domain_id: &DomainId) -> ConsoleResult<ResolvedPolicy> {
        let domain = self.domains.get_domain(domain_id).await?;
        let stored = self.store.read_local(domain_id).await?;
        let (local, local_version) = match stored {
            Some(slot) => (slot.text, Some(slot.version)),
            None => (String::new(), None),
        };

        let mut parent_chain = Vec::new();
        let mut visited: HashSet<DomainId> = HashSet::from([domain.id.clone()]);
        let mut next = domain.parent_id.clone();
        while let Some(parent_id) = next {
            if !visited.insert(parent_id.clone()) {
                return Err(ConsoleError::invalid(format!(
                    "domain tree cycle through {parent_id} while resolving {domain_id}"
                )));
            }
            if parent_chain.len() >= self.max_chain_depth {
                return Err(ConsoleError::invalid(format!(
                    "ancestor chain of {domain_id} exceeds {} levels",
                    self.max_chain_depth
                )));
            }
            let parent = self.domains.get_domain(&parent_id).await?;
            let text = self
                .store
                .read_local(&parent_id)
                .await?
                .map(|slot| slot.text)
                .unwrap_or_default();
            parent_chain.push(PolicyLayer {
                domain_id: parent_id,
                text,
            });
            next = parent.parent_id;
        }

        let effective = compose(&domain.id, &local, &parent_chain);
        tracing::debug!(
            domain = %domain.id,
            depth = parent_chain.len(),
            "policy resolved"
        );
        Ok(ResolvedPolicy {
            domain,
            local,
            local_version,
            parent_chain,
            effective,
        })
    }

    /// Read one scope of a domain's policy
    ///
    /// `Local` is the domain's own slot; `Inherited` is its ancestor stack,
    /// empty for roots.
    pub async fn read(&self, domain_id: &DomainId, scope: PolicyScope) -> ConsoleResult<String> {
        let resolved = self.resolve(domain_id).await?;
        Ok(match scope {
            PolicyScope::Local => resolved.local,
            PolicyScope::Inherited => resolved.inherited(),
        })
    }
}

impl std::fmt::Debug for PolicyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyResolver")
            .field("max_chain_depth", &self.max_chain_depth)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use triad_effects::{MemoryDomainDirectory, MemoryPolicyStore};
    use triad_rules::LayeredDocument;

    fn fixture() -> (MemoryDomainDirectory, MemoryPolicyStore, PolicyResolver) {
        let dir = MemoryDomainDirectory::new();
        dir.insert(Domain::root("acme", "Acme"));
        dir.insert(Domain::child("ops", "acme", "Ops"));
        dir.insert(Domain::child("ci", "ops", "CI"));
        let store = MemoryPolicyStore::new();
        store.seed("acme", "allow ci.*\nallow db.read\n");
        store.seed("ops", "deny db.*");
        store.seed("ci", "allow ci.call.*");
        let resolver = PolicyResolver::new(
            Arc::new(dir.clone()),
            Arc::new(store.clone()),
            &PolicyConfig::default(),
        );
        (dir, store, resolver)
    }

    #[tokio::test]
    async fn root_effective_is_local_verbatim() {
        let (_, _, resolver) = fixture();
        let resolved = resolver.resolve(&DomainId::new("acme")).await.unwrap();
        assert!(resolved.parent_chain.is_empty());
        assert_eq!(resolved.effective, "allow ci.*\nallow db.read\n");
        assert_eq!(resolved.effective, resolved.local);
    }

    #[tokio::test]
    async fn chain_is_nearest_first_and_rendered_root_first() {
        let (_, _, resolver) = fixture();
        let resolved = resolver.resolve(&DomainId::new("ci")).await.unwrap();
        let chain: Vec<&str> = resolved
            .parent_chain
            .iter()
            .map(|l| l.domain_id.as_str())
            .collect();
        assert_eq!(chain, ["ops", "acme"]);

        let doc = LayeredDocument::parse(&resolved.effective);
        let order: Vec<Option<&str>> = doc.layers.iter().map(|l| l.domain.as_deref()).collect();
        assert_eq!(order, [Some("acme"), Some("ops"), Some("ci")]);
        assert_eq!(doc.layers[2].role, LayerRole::Local);
        assert_eq!(doc.layers[2].text, "allow ci.call.*");
    }

    #[tokio::test]
    async fn read_scopes() {
        let (_, _, resolver) = fixture();
        let ci = DomainId::new("ci");
        assert_eq!(
            resolver.read(&ci, PolicyScope::Local).await.unwrap(),
            "allow ci.call.*"
        );
        let inherited = resolver.read(&ci, PolicyScope::Inherited).await.unwrap();
        assert!(inherited.contains("deny db.*"));
        assert!(!inherited.contains("allow ci.call.*"));
        let root = DomainId::new("acme");
        assert_eq!(resolver.read(&root, PolicyScope::Inherited).await.unwrap(), "");
    }

    #[tokio::test]
    async fn cycles_and_missing_parents_fail() {
        let (dir, _, resolver) = fixture();
        dir.insert(Domain::child("a", "b", "A"));
        dir.insert(Domain::child("b", "a", "B"));
        assert_matches!(
            resolver.resolve(&DomainId::new("a")).await,
            Err(ConsoleError::Invalid { .. })
        );
        dir.insert(Domain::child("orphan", "gone", "Orphan"));
        assert_matches!(
            resolver.resolve(&DomainId::new("orphan")).await,
            Err(ConsoleError::NotFound { .. })
        );
    }

    #[tokio::test]
    async fn depth_limit_applies() {
        let (dir, store, _) = fixture();
        let config = PolicyConfig {
            max_chain_depth: 1,
            ..PolicyConfig::default()
        };
        let shallow = PolicyResolver::new(Arc::new(dir), Arc::new(store), &config);
        assert!(shallow.resolve(&DomainId::new("ops")).await.is_ok());
        assert_matches!(
            shallow.resolve(&DomainId::new("ci")).await,
            Err(ConsoleError::Invalid { .. })
        );
    }

    #[tokio::test]
    async fn store_outage_is_transient() {
        let (_, store, resolver) = fixture();
        store.fault().take_down();
        assert_matches!(
            resolver.resolve(&DomainId::new("ci")).await,
            Err(ConsoleError::Transient { .. })
        );
    }
}
