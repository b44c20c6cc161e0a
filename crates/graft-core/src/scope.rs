//! Identifier scopes: the outward view of node identity, and the per-batch
//! state of the two-phase build.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{CodecError, Result};
use crate::field::Field;
use crate::node::{Graph, NodeId};

/// Maps nodes to the string identifiers used on the wire, and back.
pub trait ResolveScope {
    fn resolve_id(&self, id: NodeId) -> Result<String>;

    fn retrieve_object(&self, key: &str) -> Option<NodeId>;
}

/// Bidirectional identifier index.
#[derive(Debug, Default, Clone)]
pub struct IndexedScope {
    by_key: IndexMap<String, NodeId>,
    by_id: HashMap<NodeId, String>,
    next: u64,
}

impl IndexedScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes every live node of `graph` under a generated identifier.
    pub fn from_graph(graph: &Graph) -> Self {
        let mut scope = Self::new();
        for id in graph.ids() {
            scope.expose(id);
        }
        scope
    }

    /// Binds `key` to `id`, replacing any previous binding of either side.
    pub fn insert(&mut self, key: impl Into<String>, id: NodeId) {
        let key = key.into();
        if let Some(old) = self.by_id.insert(id, key.clone()) {
            self.by_key.shift_remove(&old);
        }
        if let Some(old) = self.by_key.insert(key, id) {
            if old != id {
                self.by_id.remove(&old);
            }
        }
    }

    /// Identifier of `id`, generating one if the node is not indexed yet.
    pub fn expose(&mut self, id: NodeId) -> String {
        if let Some(key) = self.by_id.get(&id) {
            return key.clone();
        }
        let key = loop {
            let candidate = format!("n{}", self.next);
            self.next += 1;
            if !self.by_key.contains_key(&candidate) {
                break candidate;
            }
        };
        self.insert(key.clone(), id);
        key
    }

    pub fn remove_key(&mut self, key: &str) -> Option<NodeId> {
        let id = self.by_key.shift_remove(key)?;
        self.by_id.remove(&id);
        Some(id)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, NodeId)> + '_ {
        self.by_key.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl ResolveScope for IndexedScope {
    fn resolve_id(&self, id: NodeId) -> Result<String> {
        self.by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| CodecError::Resolution(id.to_string()))
    }

    fn retrieve_object(&self, key: &str) -> Option<NodeId> {
        self.by_key.get(key).copied()
    }
}

/// Identifier(s) captured by a reference-typed field, waiting for the end of
/// the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingRef {
    Single(String),
    List(Vec<Option<String>>),
}

impl PendingRef {
    /// Every non-null identifier, in slot order.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            PendingRef::Single(key) => vec![key.as_str()],
            PendingRef::List(keys) => keys.iter().flatten().map(String::as_str).collect(),
        }
    }
}

/// The same reference once its identifiers are looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedRef {
    Single(NodeId),
    List(Vec<Option<NodeId>>),
}

/// A deferred assignment of a reference into slot `ordinal` of `owner`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub owner: NodeId,
    pub ordinal: usize,
    pub pending: PendingRef,
}

/// Per-batch build state: identifiers of nodes created so far, plus every
/// reference assignment deferred until all of them exist.
///
/// Lookups fall back to an optional base scope holding nodes that predate
/// the batch.
#[derive(Default)]
pub struct BuildScope<'a> {
    base: Option<&'a dyn ResolveScope>,
    objects: IndexMap<String, NodeId>,
    bindings: Vec<Binding>,
}

impl<'a> BuildScope<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(base: &'a dyn ResolveScope) -> Self {
        Self {
            base: Some(base),
            ..Self::default()
        }
    }

    pub fn register(&mut self, key: impl Into<String>, id: NodeId) {
        self.objects.insert(key.into(), id);
    }

    pub fn retrieve_object(&self, key: &str) -> Option<NodeId> {
        self.objects
            .get(key)
            .copied()
            .or_else(|| self.base.and_then(|b| b.retrieve_object(key)))
    }

    /// Whether `key` was registered by this batch (as opposed to the base).
    pub fn is_registered(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    pub fn bind(&mut self, binding: Binding) {
        self.bindings.push(binding);
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub(crate) fn truncate_bindings(&mut self, len: usize) {
        self.bindings.truncate(len);
    }

    fn lookup(&self, key: &str) -> Result<NodeId> {
        self.retrieve_object(key)
            .ok_or_else(|| CodecError::Resolution(key.to_owned()))
    }

    fn lookup_pending(&self, pending: &PendingRef) -> Result<ResolvedRef> {
        Ok(match pending {
            PendingRef::Single(key) => ResolvedRef::Single(self.lookup(key)?),
            PendingRef::List(keys) => ResolvedRef::List(
                keys.iter()
                    .map(|k| k.as_deref().map(|k| self.lookup(k)).transpose())
                    .collect::<Result<_>>()?,
            ),
        })
    }

    /// Checks that `pending` would resolve, to nodes `field` accepts.
    pub fn check_pending(&self, graph: &Graph, field: &Field, pending: &PendingRef) -> Result<()> {
        field.check_targets(graph, &self.lookup_pending(pending)?)
    }

    fn binding_field(graph: &Graph, binding: &Binding) -> Result<Arc<Field>> {
        let descriptor = graph.descriptor(binding.owner)?;
        descriptor.field(binding.ordinal).cloned().ok_or_else(|| {
            CodecError::build(
                descriptor.serial_name(),
                format!("binding to missing field {}", binding.ordinal),
            )
        })
    }

    /// Dry run of [`resolve`](Self::resolve): fails exactly when it would,
    /// without touching the graph.
    pub fn verify(&self, graph: &Graph) -> Result<()> {
        for binding in &self.bindings {
            let field = Self::binding_field(graph, binding)?;
            self.check_pending(graph, &field, &binding.pending)?;
        }
        Ok(())
    }

    /// Applies every pending binding to `graph` in one pass.
    ///
    /// All bindings are looked up and checked before the first write. On
    /// failure the graph is untouched and the bindings stay pending.
    pub fn resolve(&mut self, graph: &mut Graph) -> Result<usize> {
        let mut staged = Vec::with_capacity(self.bindings.len());
        for binding in &self.bindings {
            let field = Self::binding_field(graph, binding)?;
            let resolved = self.lookup_pending(&binding.pending)?;
            field.check_targets(graph, &resolved)?;
            staged.push((binding.owner, field, resolved));
        }
        self.bindings.clear();
        let count = staged.len();
        for (owner, field, resolved) in staged {
            field.assign_reference(graph.node_mut(owner)?, resolved)?;
        }
        debug!(bindings = count, "resolved bindings");
        Ok(count)
    }

    /// Identifiers registered by this batch, in registration order.
    pub fn into_objects(self) -> IndexMap<String, NodeId> {
        self.objects
    }
}
