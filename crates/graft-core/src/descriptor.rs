//! Type descriptors: the ordered field layout of one node type, and the
//! whole-node operations driven by it.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use graft_buffers::{Reader, Writer};
use tracing::trace;

use crate::config::CodecOptions;
use crate::crawler::{GraphCrawler, ReferencedBlocks};
use crate::error::{CodecError, DecodeError, Result};
use crate::field::{Field, FieldDelta, FieldSpec};
use crate::footprint::MemoryFootprint;
use crate::node::{Graph, Node, NodeId};
use crate::scope::{BuildScope, ResolveScope};

/// Creates a blank instance of a host type.
pub type Constructor = fn() -> std::result::Result<Box<dyn Node>, String>;

fn default_constructor<H: Node + Default>() -> std::result::Result<Box<dyn Node>, String> {
    Ok(Box::new(H::default()))
}

/// Collects field registrations for one host type.
///
/// ```
/// use graft_core::{slot, FieldSpec, Node, TypeBuilder};
///
/// #[derive(Debug, Default)]
/// struct Floor { x0: f64, tags: Option<Vec<String>> }
/// impl Node for Floor {}
///
/// let floor = TypeBuilder::with_default::<Floor>("Floor")
///     .field(FieldSpec::double("x0", slot!(Floor, x0)))
///     .field(FieldSpec::string_array("tags", slot!(Floor, tags)))
///     .build()
///     .unwrap();
/// assert_eq!(floor.len(), 2);
/// assert_eq!(floor.field_by_name("tags").unwrap().ordinal(), 1);
/// ```
#[derive(Debug)]
pub struct TypeBuilder {
    serial_name: String,
    constructor: Constructor,
    specs: Vec<FieldSpec>,
}

impl TypeBuilder {
    pub fn new(serial_name: impl Into<String>, constructor: Constructor) -> Self {
        Self {
            serial_name: serial_name.into(),
            constructor,
            specs: Vec::new(),
        }
    }

    /// Builder whose instances start from `H::default()`.
    pub fn with_default<H: Node + Default>(serial_name: impl Into<String>) -> Self {
        Self::new(serial_name, default_constructor::<H>)
    }

    /// Appends a field; ordinals follow registration order.
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn build(self) -> Result<Arc<TypeDescriptor>> {
        if self.serial_name.is_empty() {
            return Err(CodecError::build("", "empty serial name"));
        }
        let mut by_name = HashMap::with_capacity(self.specs.len());
        let mut fields = Vec::with_capacity(self.specs.len());
        for (ordinal, spec) in self.specs.into_iter().enumerate() {
            if by_name.insert(spec.name().to_owned(), ordinal).is_some() {
                return Err(CodecError::build(
                    self.serial_name,
                    format!("duplicate field `{}`", spec.name()),
                ));
            }
            fields.push(Arc::new(spec.into_field(ordinal)));
        }
        Ok(Arc::new(TypeDescriptor {
            serial_name: self.serial_name,
            constructor: self.constructor,
            fields,
            by_name,
        }))
    }
}

/// The field layout of one node type.
///
/// Equality and hashing only look at the serial name.
pub struct TypeDescriptor {
    serial_name: String,
    constructor: Constructor,
    fields: Vec<Arc<Field>>,
    by_name: HashMap<String, usize>,
}

impl TypeDescriptor {
    pub fn serial_name(&self) -> &str {
        &self.serial_name
    }

    pub fn fields(&self) -> &[Arc<Field>] {
        &self.fields
    }

    pub fn field(&self, ordinal: usize) -> Option<&Arc<Field>> {
        self.fields.get(ordinal)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&Arc<Field>> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn create_new_instance(&self) -> Result<Box<dyn Node>> {
        (self.constructor)().map_err(|reason| CodecError::build(&self.serial_name, reason))
    }

    /// Whether `field` is one of this type's own fields.
    pub fn owns(&self, field: &Arc<Field>) -> bool {
        self.fields
            .get(field.ordinal())
            .is_some_and(|f| Arc::ptr_eq(f, field))
    }

    pub fn compute_footprint(&self, node: &dyn Node, fp: &mut MemoryFootprint) -> Result<()> {
        fp.report_instance();
        for field in &self.fields {
            fp.report_entry();
            field.compute_footprint(node, fp)?;
        }
        Ok(())
    }

    pub fn footprint(&self, node: &dyn Node) -> Result<usize> {
        let mut fp = MemoryFootprint::new();
        self.compute_footprint(node, &mut fp)?;
        Ok(fp.total())
    }

    pub fn sweep(&self, node: &dyn Node, crawler: &mut dyn GraphCrawler) -> Result<()> {
        for field in &self.fields {
            field.sweep(node, crawler)?;
        }
        Ok(())
    }

    pub fn collect_referenced_blocks(
        &self,
        node: &dyn Node,
        blocks: &mut ReferencedBlocks,
    ) -> Result<()> {
        for field in &self.fields {
            field.collect_referenced_blocks(node, blocks)?;
        }
        Ok(())
    }

    /// `false` if any weak reference of `node` is still unresolved.
    pub fn is_resolved(&self, node: &dyn Node) -> Result<bool> {
        for field in &self.fields {
            if !field.is_value_resolved(node)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Allocates a blank copy of `origin` in `into` and clones every field
    /// into it. References stay pending on `build` until the caller
    /// resolves the whole batch.
    pub fn deep_clone(
        self: &Arc<Self>,
        origin: &dyn Node,
        resolve: &dyn ResolveScope,
        into: &mut Graph,
        build: &mut BuildScope<'_>,
    ) -> Result<NodeId> {
        let id = into.insert_new(self)?;
        let clone = into.node_mut(id)?;
        for field in &self.fields {
            field.deep_clone(origin, resolve, id, clone, build)?;
        }
        Ok(id)
    }

    pub fn encode(&self, node: &dyn Node, scope: &dyn ResolveScope) -> Result<Vec<u8>> {
        let mut writer = Writer::new();
        self.encode_into(&mut writer, node, scope)?;
        Ok(writer.flush())
    }

    /// Writes every field, header then value, in ordinal order.
    pub fn encode_into(
        &self,
        writer: &mut Writer,
        node: &dyn Node,
        scope: &dyn ResolveScope,
    ) -> Result<()> {
        for field in &self.fields {
            let composer = field.create_composer(field.code()?)?;
            composer.publish_flow_encoding(writer);
            composer.compose_value(&field.produce_diff(node, scope)?, writer)?;
        }
        trace!(type_name = %self.serial_name, bytes = writer.len(), "encoded node");
        Ok(())
    }

    /// Decodes one node from a complete buffer.
    pub fn decode(
        self: &Arc<Self>,
        bytes: &[u8],
        graph: &mut Graph,
        build: &mut BuildScope<'_>,
    ) -> Result<NodeId> {
        let mut reader = Reader::new(bytes);
        let mark = build.bindings().len();
        let id = self.decode_from(&mut reader, graph, build, &CodecOptions::default())?;
        if !reader.is_eof() {
            graph.remove(id);
            build.truncate_bindings(mark);
            return Err(DecodeError::TrailingBytes(reader.size()).into());
        }
        Ok(id)
    }

    /// Allocates a node and fills it field by field from `reader`. On
    /// failure the half-built node is removed again.
    pub fn decode_from(
        self: &Arc<Self>,
        reader: &mut Reader<'_>,
        graph: &mut Graph,
        build: &mut BuildScope<'_>,
        options: &CodecOptions,
    ) -> Result<NodeId> {
        let id = graph.insert_new(self)?;
        let mark = build.bindings().len();
        if let Err(e) = self.decode_fields(id, reader, graph, build, options) {
            graph.remove(id);
            build.truncate_bindings(mark);
            return Err(e);
        }
        Ok(id)
    }

    fn decode_fields(
        &self,
        id: NodeId,
        reader: &mut Reader<'_>,
        graph: &mut Graph,
        build: &mut BuildScope<'_>,
        options: &CodecOptions,
    ) -> Result<()> {
        let node = graph.node_mut(id)?;
        for field in &self.fields {
            let delta = field.create_parser(reader)?.parse_value(reader, options)?;
            delta.operate(id, node, build)?;
        }
        Ok(())
    }

    /// Deltas for the fields whose values differ between `old` and `new`.
    pub fn diff(
        &self,
        old: &dyn Node,
        new: &dyn Node,
        scope: &dyn ResolveScope,
    ) -> Result<Vec<FieldDelta>> {
        self.diff_across(old, scope, new, scope)
    }

    /// Like [`diff`](Self::diff), with each side resolving identifiers in
    /// its own scope.
    pub fn diff_across(
        &self,
        old: &dyn Node,
        old_scope: &dyn ResolveScope,
        new: &dyn Node,
        new_scope: &dyn ResolveScope,
    ) -> Result<Vec<FieldDelta>> {
        let mut out = Vec::new();
        for field in &self.fields {
            let before = field.produce_diff(old, old_scope)?;
            let after = field.produce_diff(new, new_scope)?;
            if before.value() != after.value() {
                out.push(after);
            }
        }
        Ok(out)
    }

    pub fn apply_deltas(
        &self,
        id: NodeId,
        node: &mut dyn Node,
        deltas: &[FieldDelta],
        build: &mut BuildScope<'_>,
    ) -> Result<()> {
        for delta in deltas {
            if !self.owns(delta.field()) {
                return Err(CodecError::TypeMismatch {
                    field: delta.field().name().to_owned(),
                    expected: self.serial_name.clone(),
                });
            }
            delta.operate(id, node, build)?;
        }
        Ok(())
    }

    /// One line per field.
    pub fn print(
        &self,
        node: &dyn Node,
        scope: &dyn ResolveScope,
        out: &mut dyn fmt::Write,
    ) -> Result<()> {
        writeln!(out, "{} {{", self.serial_name)?;
        for field in &self.fields {
            out.write_str("  ")?;
            field.print(node, scope, out)?;
            out.write_char('\n')?;
        }
        out.write_char('}')?;
        Ok(())
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {{", self.serial_name)?;
        for field in &self.fields {
            writeln!(
                f,
                "  {}: ({}) {} flow={}",
                field.ordinal(),
                field.print_type(),
                field.name(),
                field.flow()
            )?;
        }
        f.write_str("}")
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("serial_name", &self.serial_name)
            .field("fields", &self.fields)
            .finish()
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.serial_name == other.serial_name
    }
}

impl Eq for TypeDescriptor {}

impl Hash for TypeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.serial_name.hash(state);
    }
}
