//! Per-slot behavior: how one field of a host type is encoded, decoded,
//! diffed, cloned, measured, swept and printed.

mod array;
mod codec;
mod delta;
mod scalar;
pub mod slot;

use std::fmt;
use std::sync::Arc;

pub use codec::{Encoding, FieldComposer, FieldParser};
pub use delta::{DeltaValue, FieldDelta};
pub use slot::Slot;

use graft_buffers::Reader;

use crate::blob::{Blob, BlobCodec};
use crate::crawler::{GraphCrawler, ReferencedBlocks};
use crate::error::{CodecError, Result};
use crate::footprint::MemoryFootprint;
use crate::node::{Graph, Node, NodeId};
use crate::reference::WeakRef;
use crate::scope::{BuildScope, ResolveScope, ResolvedRef};
use crate::wire::{uint7x_count, DEFAULT_FLOW_TAG};

/// The value kind of a field together with the accessor bound to its slot.
#[derive(Debug)]
pub enum FieldKind {
    Boolean(Slot<bool>),
    Integer(Slot<i32>),
    Double(Slot<f64>),
    BooleanArray(Slot<Option<Vec<bool>>>),
    ShortArray(Slot<Option<Vec<i16>>>),
    DoubleArray(Slot<Option<Vec<f64>>>),
    StringArray(Slot<Option<Vec<String>>>),
    /// Embedded reference to a node of one specific type.
    Object {
        slot: Slot<Option<NodeId>>,
        target: String,
    },
    /// Reference to a node of any type.
    Interface(Slot<Option<NodeId>>),
    ObjectList(Slot<Option<Vec<Option<NodeId>>>>),
    WeakRef(Slot<Option<WeakRef>>),
    Blob {
        slot: Slot<Option<Box<dyn Blob>>>,
        codec: Arc<dyn BlobCodec>,
    },
}

/// Registration record for one field, consumed by
/// [`TypeBuilder::field`](crate::TypeBuilder::field).
#[derive(Debug)]
pub struct FieldSpec {
    name: String,
    flow: String,
    mask: u64,
    flags: u64,
    kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            flow: DEFAULT_FLOW_TAG.to_owned(),
            mask: 0,
            flags: 0,
            kind,
        }
    }

    pub fn boolean(name: impl Into<String>, slot: Slot<bool>) -> Self {
        Self::new(name, FieldKind::Boolean(slot))
    }

    pub fn integer(name: impl Into<String>, slot: Slot<i32>) -> Self {
        Self::new(name, FieldKind::Integer(slot))
    }

    pub fn double(name: impl Into<String>, slot: Slot<f64>) -> Self {
        Self::new(name, FieldKind::Double(slot))
    }

    pub fn boolean_array(name: impl Into<String>, slot: Slot<Option<Vec<bool>>>) -> Self {
        Self::new(name, FieldKind::BooleanArray(slot))
    }

    pub fn short_array(name: impl Into<String>, slot: Slot<Option<Vec<i16>>>) -> Self {
        Self::new(name, FieldKind::ShortArray(slot))
    }

    pub fn double_array(name: impl Into<String>, slot: Slot<Option<Vec<f64>>>) -> Self {
        Self::new(name, FieldKind::DoubleArray(slot))
    }

    pub fn string_array(name: impl Into<String>, slot: Slot<Option<Vec<String>>>) -> Self {
        Self::new(name, FieldKind::StringArray(slot))
    }

    /// Reference whose target must be a node of type `target`.
    pub fn object(
        name: impl Into<String>,
        slot: Slot<Option<NodeId>>,
        target: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            FieldKind::Object {
                slot,
                target: target.into(),
            },
        )
    }

    pub fn interface(name: impl Into<String>, slot: Slot<Option<NodeId>>) -> Self {
        Self::new(name, FieldKind::Interface(slot))
    }

    pub fn object_list(name: impl Into<String>, slot: Slot<Option<Vec<Option<NodeId>>>>) -> Self {
        Self::new(name, FieldKind::ObjectList(slot))
    }

    pub fn weak_ref(name: impl Into<String>, slot: Slot<Option<WeakRef>>) -> Self {
        Self::new(name, FieldKind::WeakRef(slot))
    }

    pub fn blob(
        name: impl Into<String>,
        slot: Slot<Option<Box<dyn Blob>>>,
        codec: Arc<dyn BlobCodec>,
    ) -> Self {
        Self::new(name, FieldKind::Blob { slot, codec })
    }

    /// Selects a non-canonical wire encoding, e.g. `"uint8"` or `"float32[]"`.
    pub fn flow(mut self, flow: impl Into<String>) -> Self {
        self.flow = flow.into();
        self
    }

    pub fn mask(mut self, mask: u64) -> Self {
        self.mask = mask;
        self
    }

    pub fn flags(mut self, flags: u64) -> Self {
        self.flags = flags;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_field(self, ordinal: usize) -> Field {
        Field {
            ordinal,
            name: self.name,
            flow: self.flow,
            mask: self.mask,
            flags: self.flags,
            kind: self.kind,
        }
    }
}

/// One value slot of a node type. Immutable once its type is built and
/// shared by every instance and every delta of that type.
#[derive(Debug)]
pub struct Field {
    ordinal: usize,
    name: String,
    flow: String,
    mask: u64,
    flags: u64,
    kind: FieldKind,
}

impl Field {
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// The ordinal as written in update frames.
    pub fn code(&self) -> Result<i32> {
        uint7x_count(self.ordinal, &self.name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flow(&self) -> &str {
        &self.flow
    }

    pub fn mask(&self) -> u64 {
        self.mask
    }

    pub fn flags(&self) -> u64 {
        self.flags
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Reads the header of an encoded value and binds a parser to it.
    pub fn create_parser(self: &Arc<Self>, reader: &mut Reader<'_>) -> Result<FieldParser> {
        let encoding = Encoding::from_header(&self.kind, &self.name, reader)?;
        Ok(FieldParser::new(Arc::clone(self), encoding))
    }

    /// Picks the encoding named by this field's flow.
    pub fn create_composer(self: &Arc<Self>, code: i32) -> Result<FieldComposer> {
        FieldComposer::new(Arc::clone(self), code)
    }

    /// Captures the current value of the slot.
    pub fn produce_diff(
        self: &Arc<Self>,
        node: &dyn Node,
        scope: &dyn ResolveScope,
    ) -> Result<FieldDelta> {
        let name = self.name.as_str();
        let value = match &self.kind {
            FieldKind::Boolean(s) => DeltaValue::Boolean(*s.get(node, name)?),
            FieldKind::Integer(s) => DeltaValue::Integer(*s.get(node, name)?),
            FieldKind::Double(s) => DeltaValue::Double(*s.get(node, name)?),
            FieldKind::BooleanArray(s) => DeltaValue::BooleanArray(s.get(node, name)?.clone()),
            FieldKind::ShortArray(s) => DeltaValue::ShortArray(s.get(node, name)?.clone()),
            FieldKind::DoubleArray(s) => DeltaValue::DoubleArray(s.get(node, name)?.clone()),
            FieldKind::StringArray(s) => DeltaValue::StringArray(s.get(node, name)?.clone()),
            FieldKind::Object { slot, .. } | FieldKind::Interface(slot) => DeltaValue::Object(
                slot.get(node, name)?
                    .map(|id| scope.resolve_id(id))
                    .transpose()?,
            ),
            FieldKind::ObjectList(s) => DeltaValue::ObjectList(match s.get(node, name)? {
                Some(ids) => Some(
                    ids.iter()
                        .map(|id| id.map(|id| scope.resolve_id(id)).transpose())
                        .collect::<Result<_>>()?,
                ),
                None => None,
            }),
            FieldKind::WeakRef(s) => DeltaValue::WeakRef(s.get(node, name)?.clone()),
            FieldKind::Blob { slot, .. } => DeltaValue::Blob(slot.get(node, name)?.clone()),
        };
        Ok(FieldDelta::new(Arc::clone(self), value))
    }

    /// Whether the slot holds different values in `base` and `update`.
    pub fn has_diff(
        self: &Arc<Self>,
        base: &dyn Node,
        base_scope: &dyn ResolveScope,
        update: &dyn Node,
        update_scope: &dyn ResolveScope,
    ) -> Result<bool> {
        let a = self.produce_diff(base, base_scope)?;
        let b = self.produce_diff(update, update_scope)?;
        Ok(a.value() != b.value())
    }

    /// Copies the slot of `origin` into `clone`. References are re-bound
    /// through `build` so they land on the clones of their targets.
    pub fn deep_clone(
        self: &Arc<Self>,
        origin: &dyn Node,
        resolve: &dyn ResolveScope,
        clone_id: NodeId,
        clone: &mut dyn Node,
        build: &mut BuildScope<'_>,
    ) -> Result<()> {
        self.produce_diff(origin, resolve)?
            .detached()
            .operate(clone_id, clone, build)
    }

    pub fn compute_footprint(&self, node: &dyn Node, fp: &mut MemoryFootprint) -> Result<()> {
        let name = self.name.as_str();
        match &self.kind {
            FieldKind::Boolean(_) => fp.report_bytes(1),
            FieldKind::Integer(_) => fp.report_bytes(4),
            FieldKind::Double(_) => fp.report_bytes(8),
            FieldKind::BooleanArray(s) => array_footprint(fp, s.get(node, name)?.as_deref(), 1),
            FieldKind::ShortArray(s) => array_footprint(fp, s.get(node, name)?.as_deref(), 2),
            FieldKind::DoubleArray(s) => array_footprint(fp, s.get(node, name)?.as_deref(), 8),
            FieldKind::StringArray(s) => {
                if let Some(items) = s.get(node, name)? {
                    fp.report_instance();
                    for item in items {
                        fp.report_instance();
                        fp.report_bytes(item.len());
                    }
                }
            }
            FieldKind::Object { .. } | FieldKind::Interface(_) => fp.report_reference(),
            FieldKind::ObjectList(s) => {
                if let Some(ids) = s.get(node, name)? {
                    fp.report_instance();
                    for _ in ids {
                        fp.report_reference();
                    }
                }
            }
            FieldKind::WeakRef(s) => {
                if let Some(r) = s.get(node, name)? {
                    fp.report_bytes(1 + r.address.byte_len() + 8);
                }
            }
            FieldKind::Blob { slot, .. } => {
                if let Some(blob) = slot.get(node, name)? {
                    fp.report_instance();
                    fp.report_bytes(blob.footprint());
                }
            }
        }
        Ok(())
    }

    /// Hands every strongly referenced node to `crawler`.
    pub fn sweep(&self, node: &dyn Node, crawler: &mut dyn GraphCrawler) -> Result<()> {
        match &self.kind {
            FieldKind::Object { slot, .. } | FieldKind::Interface(slot) => {
                if let Some(id) = *slot.get(node, &self.name)? {
                    crawler.accept(id);
                }
            }
            FieldKind::ObjectList(s) => {
                if let Some(ids) = s.get(node, &self.name)? {
                    for id in ids.iter().flatten() {
                        crawler.accept(*id);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Records the partition of a resolved weak reference.
    pub fn collect_referenced_blocks(
        &self,
        node: &dyn Node,
        blocks: &mut ReferencedBlocks,
    ) -> Result<()> {
        if let FieldKind::WeakRef(s) = &self.kind {
            if let Some(r) = s.get(node, &self.name)? {
                if r.is_resolved() {
                    blocks.record(&r.address.block);
                }
            }
        }
        Ok(())
    }

    pub fn is_value_resolved(&self, node: &dyn Node) -> Result<bool> {
        match &self.kind {
            FieldKind::WeakRef(s) => Ok(s
                .get(node, &self.name)?
                .as_ref()
                .map_or(true, WeakRef::is_resolved)),
            _ => Ok(true),
        }
    }

    /// Fails if a resolved reference points at a node of the wrong type.
    pub(crate) fn check_targets(&self, graph: &Graph, resolved: &ResolvedRef) -> Result<()> {
        if let (FieldKind::Object { target, .. }, ResolvedRef::Single(id)) =
            (&self.kind, resolved)
        {
            if graph.descriptor(*id)?.serial_name() != target {
                return Err(CodecError::TypeMismatch {
                    field: self.name.clone(),
                    expected: target.clone(),
                });
            }
        }
        Ok(())
    }

    /// Writes resolved node ids into a reference slot.
    pub fn assign_reference(&self, node: &mut dyn Node, resolved: ResolvedRef) -> Result<()> {
        match (&self.kind, resolved) {
            (
                FieldKind::Object { slot, .. } | FieldKind::Interface(slot),
                ResolvedRef::Single(id),
            ) => {
                slot.set(node, &self.name, Some(id))
            }
            (FieldKind::ObjectList(s), ResolvedRef::List(ids)) => {
                s.set(node, &self.name, Some(ids))
            }
            _ => Err(CodecError::TypeMismatch {
                field: self.name.clone(),
                expected: self.print_type(),
            }),
        }
    }

    pub fn print_type(&self) -> String {
        match &self.kind {
            FieldKind::Boolean(_) => "bool".into(),
            FieldKind::Integer(_) => "int".into(),
            FieldKind::Double(_) => "double".into(),
            FieldKind::BooleanArray(_) => "bool[]".into(),
            FieldKind::ShortArray(_) => "short[]".into(),
            FieldKind::DoubleArray(_) => "double[]".into(),
            FieldKind::StringArray(_) => "string[]".into(),
            FieldKind::Object { target, .. } => format!("obj<{target}>"),
            FieldKind::Interface(_) => "interface".into(),
            FieldKind::ObjectList(_) => "obj[]".into(),
            FieldKind::WeakRef(_) => "ref".into(),
            FieldKind::Blob { codec, .. } => format!("serial<{}>", codec.serial_name()),
        }
    }

    /// Writes `(<type>) <name>: <value>`.
    pub fn print(
        &self,
        node: &dyn Node,
        scope: &dyn ResolveScope,
        out: &mut dyn fmt::Write,
    ) -> Result<()> {
        let name = self.name.as_str();
        write!(out, "({}) {}: ", self.print_type(), name)?;
        match &self.kind {
            FieldKind::Boolean(s) => write!(out, "{}", s.get(node, name)?)?,
            FieldKind::Integer(s) => write!(out, "{}", s.get(node, name)?)?,
            FieldKind::Double(s) => write!(out, "{}", s.get(node, name)?)?,
            FieldKind::BooleanArray(s) => print_array(out, s.get(node, name)?.as_ref())?,
            FieldKind::ShortArray(s) => print_array(out, s.get(node, name)?.as_ref())?,
            FieldKind::DoubleArray(s) => print_array(out, s.get(node, name)?.as_ref())?,
            FieldKind::StringArray(s) => print_array(out, s.get(node, name)?.as_ref())?,
            FieldKind::Object { slot, .. } | FieldKind::Interface(slot) => {
                print_target(out, *slot.get(node, name)?, scope)?
            }
            FieldKind::ObjectList(s) => match s.get(node, name)? {
                Some(ids) => {
                    out.write_char('[')?;
                    for (i, id) in ids.iter().enumerate() {
                        if i > 0 {
                            out.write_str(", ")?;
                        }
                        print_target(out, *id, scope)?;
                    }
                    out.write_char(']')?;
                }
                None => out.write_str("null")?,
            },
            FieldKind::WeakRef(s) => match s.get(node, name)? {
                Some(r) => write!(out, "{r}")?,
                None => out.write_str("null")?,
            },
            FieldKind::Blob { slot, .. } => match slot.get(node, name)? {
                Some(blob) => write!(out, "{blob:?}")?,
                None => out.write_str("null")?,
            },
        }
        Ok(())
    }
}

fn array_footprint<T>(fp: &mut MemoryFootprint, items: Option<&[T]>, element_size: usize) {
    if let Some(items) = items {
        fp.report_instance();
        fp.report_bytes(items.len() * element_size);
    }
}

fn print_array<T: fmt::Debug>(out: &mut dyn fmt::Write, items: Option<&Vec<T>>) -> fmt::Result {
    match items {
        Some(items) => write!(out, "{items:?}"),
        None => out.write_str("null"),
    }
}

fn print_target(
    out: &mut dyn fmt::Write,
    id: Option<NodeId>,
    scope: &dyn ResolveScope,
) -> fmt::Result {
    match id {
        Some(id) => match scope.resolve_id(id) {
            Ok(key) => out.write_str(&key),
            Err(_) => out.write_str("<unresolved>"),
        },
        None => out.write_str("null"),
    }
}
