//! Weak cross-partition references.

use std::fmt;

use graft_buffers::{Reader, Writer};

use crate::error::{DecodeError, Result};
use crate::node::NodeId;
use crate::wire::props;

/// Where a node lives: its partition (block) and its identifier inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub block: String,
    pub index: String,
}

impl Address {
    pub fn new(block: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            block: block.into(),
            index: index.into(),
        }
    }

    /// Encoded payload size, used for footprint estimates.
    pub fn byte_len(&self) -> usize {
        self.block.len() + self.index.len()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block, self.index)
    }
}

/// Resolution state of a weak reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefState {
    /// Only the address is known.
    #[default]
    Unresolved,
    /// Resolved to a node loaded in the current graph.
    Local(NodeId),
    /// Resolved: the target exists but lives in a partition that is not
    /// loaded.
    Remote,
}

/// A reference that may point outside the current partition.
///
/// Only the address travels on the wire; the state is local knowledge and
/// is always `Unresolved` after decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeakRef {
    pub address: Address,
    pub state: RefState,
}

impl WeakRef {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            state: RefState::Unresolved,
        }
    }

    pub fn local(address: Address, node: NodeId) -> Self {
        Self {
            address,
            state: RefState::Local(node),
        }
    }

    pub fn remote(address: Address) -> Self {
        Self {
            address,
            state: RefState::Remote,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self.state, RefState::Unresolved)
    }

    /// The loaded target, if any.
    pub fn target(&self) -> Option<NodeId> {
        match self.state {
            RefState::Local(id) => Some(id),
            _ => None,
        }
    }

    /// Copy for another graph: a local target id is meaningless there.
    pub fn detached(&self) -> Self {
        let state = match self.state {
            RefState::Local(_) => RefState::Unresolved,
            other => other,
        };
        Self {
            address: self.address.clone(),
            state,
        }
    }
}

impl fmt::Display for WeakRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            RefState::Unresolved => write!(f, "ref({}, unresolved)", self.address),
            RefState::Local(id) => write!(f, "ref({}, {})", self.address, id),
            RefState::Remote => write!(f, "ref({}, remote)", self.address),
        }
    }
}

/// Writes a nullable weak reference: properties byte, then block and index.
pub fn write_ref(writer: &mut Writer, value: Option<&WeakRef>) {
    match value {
        Some(r) => {
            writer.u8(props::IS_NON_NULL_PROPERTIES_BIT);
            writer.string_utf8(Some(&r.address.block));
            writer.string_utf8(Some(&r.address.index));
        }
        None => writer.u8(props::NULL),
    }
}

pub fn read_ref(reader: &mut Reader<'_>, field: &str) -> Result<Option<WeakRef>> {
    let p = reader.try_u8()?;
    if !props::is_non_null(p) {
        return Ok(None);
    }
    let block = reader
        .try_string_utf8()?
        .ok_or_else(|| DecodeError::NullElement {
            field: field.to_owned(),
        })?;
    let index = reader
        .try_string_utf8()?
        .ok_or_else(|| DecodeError::NullElement {
            field: field.to_owned(),
        })?;
    Ok(Some(WeakRef::new(Address::new(block, index))))
}
