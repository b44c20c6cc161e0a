//! Host nodes and the arena that owns them.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::descriptor::TypeDescriptor;
use crate::error::{CodecError, Result};

/// Upcast helper implemented for every `'static` type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A host object whose slots are described by a [`TypeDescriptor`].
///
/// Implementing it is a one-liner; all behavior comes from the descriptor's
/// fields:
///
/// ```
/// #[derive(Debug, Default)]
/// struct Floor { x0: f64 }
///
/// impl graft_core::Node for Floor {}
/// ```
pub trait Node: AsAny + fmt::Debug {}

/// Position of a node inside a [`Graph`].
///
/// References between nodes are stored as `Option<NodeId>`; the wire never
/// sees these, it sees identifiers handed out by a resolve scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Entry {
    descriptor: Arc<TypeDescriptor>,
    object: Box<dyn Node>,
}

/// Arena of nodes, each tagged with its type descriptor.
///
/// Removed nodes leave a hole so that outstanding ids never alias a newer
/// node.
#[derive(Default)]
pub struct Graph {
    slots: Vec<Option<Entry>>,
    live: usize,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node and returns its id.
    pub fn insert(&mut self, descriptor: Arc<TypeDescriptor>, object: Box<dyn Node>) -> NodeId {
        let id = NodeId(self.slots.len() as u32);
        self.slots.push(Some(Entry { descriptor, object }));
        self.live += 1;
        id
    }

    /// Adds a blank instance built by the descriptor's constructor.
    pub fn insert_new(&mut self, descriptor: &Arc<TypeDescriptor>) -> Result<NodeId> {
        let object = descriptor.create_new_instance()?;
        Ok(self.insert(Arc::clone(descriptor), object))
    }

    pub fn remove(&mut self, id: NodeId) -> Option<Box<dyn Node>> {
        let entry = self.slots.get_mut(id.index())?.take()?;
        self.live -= 1;
        Some(entry.object)
    }

    /// Drops every slot at or above `len`. Used to discard the nodes of a
    /// failed batch.
    pub(crate) fn truncate(&mut self, len: usize) {
        while self.slots.len() > len {
            if let Some(Some(_)) = self.slots.pop() {
                self.live -= 1;
            }
        }
    }

    /// Number of slots ever allocated (live or removed).
    pub(crate) fn capacity_mark(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.slots.get(id.index()), Some(Some(_)))
    }

    /// Live node ids in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| NodeId(i as u32))
    }

    fn entry(&self, id: NodeId) -> Result<&Entry> {
        self.slots
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(CodecError::MissingNode(id))
    }

    pub fn node(&self, id: NodeId) -> Result<&dyn Node> {
        Ok(self.entry(id)?.object.as_ref())
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut dyn Node> {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .map(|e| e.object.as_mut())
            .ok_or(CodecError::MissingNode(id))
    }

    pub fn descriptor(&self, id: NodeId) -> Result<&Arc<TypeDescriptor>> {
        Ok(&self.entry(id)?.descriptor)
    }

    /// Descriptor and node together; the descriptor is cloned out so the node
    /// can be borrowed mutably alongside it.
    pub fn descriptor_and_node_mut(
        &mut self,
        id: NodeId,
    ) -> Result<(Arc<TypeDescriptor>, &mut dyn Node)> {
        let entry = self
            .slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(CodecError::MissingNode(id))?;
        Ok((Arc::clone(&entry.descriptor), entry.object.as_mut()))
    }

    pub fn get<H: Node>(&self, id: NodeId) -> Option<&H> {
        self.node(id).ok()?.as_any().downcast_ref::<H>()
    }

    pub fn get_mut<H: Node>(&mut self, id: NodeId) -> Option<&mut H> {
        self.node_mut(id).ok()?.as_any_mut().downcast_mut::<H>()
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (i, slot) in self.slots.iter().enumerate() {
            if let Some(e) = slot {
                map.entry(&NodeId(i as u32), &(e.descriptor.serial_name(), &e.object));
            }
        }
        map.finish()
    }
}
