//! Batches: keyword-prefixed node, update and remove frames decoded as one
//! atomic unit.
//!
//! ```text
//! batch  = uint7x(frame count) frame*
//! NODE   = 0x01 id type-name field*
//! UPDATE = 0x02 id uint7x(count) (uint7x(field code) header value)*
//! REMOVE = 0x03 id
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use graft_buffers::{Reader, Writer};
use tracing::{debug, warn};

use crate::config::CodecOptions;
use crate::crawler::GraphCrawler;
use crate::error::{CodecError, DecodeError, EncodeError, Result};
use crate::field::FieldDelta;
use crate::node::{Graph, NodeId};
use crate::registry::TypeRegistry;
use crate::scope::{BuildScope, IndexedScope, PendingRef, ResolveScope};
use crate::wire::{keyword, uint7x_count};

/// Accumulates frames and writes them behind a frame count.
pub struct BatchEncoder {
    body: Writer,
    frames: i32,
    options: CodecOptions,
}

impl Default for BatchEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchEncoder {
    pub fn new() -> Self {
        Self::with_options(CodecOptions::default())
    }

    pub fn with_options(options: CodecOptions) -> Self {
        Self {
            body: Writer::with_alloc_size(options.writer_alloc_size),
            frames: 0,
            options,
        }
    }

    fn frame_writer(&self) -> Writer {
        Writer::with_alloc_size(self.options.writer_alloc_size)
    }

    fn push(&mut self, frame: &Writer) -> Result<()> {
        let frames = self
            .frames
            .checked_add(1)
            .ok_or_else(|| EncodeError::ValueOutOfRange {
                field: "frames".into(),
                value: i64::from(self.frames) + 1,
                encoding: "uint7x",
            })?;
        self.body.buf(frame.as_slice());
        self.frames = frames;
        Ok(())
    }

    /// Full encoding of one node, addressed by its identifier in `scope`.
    pub fn node(&mut self, graph: &Graph, id: NodeId, scope: &dyn ResolveScope) -> Result<()> {
        let key = scope.resolve_id(id)?;
        let descriptor = graph.descriptor(id)?;
        let mut frame = self.frame_writer();
        frame.u8(keyword::NODE);
        frame.string_utf8(Some(&key));
        frame.string_utf8(Some(descriptor.serial_name()));
        descriptor.encode_into(&mut frame, graph.node(id)?, scope)?;
        self.push(&frame)
    }

    /// Changed fields of the node known as `key`.
    pub fn update(&mut self, key: &str, deltas: &[FieldDelta]) -> Result<()> {
        let mut frame = self.frame_writer();
        frame.u8(keyword::UPDATE);
        frame.string_utf8(Some(key));
        frame.uint7x(uint7x_count(deltas.len(), "deltas")?);
        for delta in deltas {
            let field = delta.field();
            let composer = field.create_composer(field.code()?)?;
            frame.uint7x(composer.code());
            composer.publish_flow_encoding(&mut frame);
            composer.compose_value(delta, &mut frame)?;
        }
        self.push(&frame)
    }

    pub fn remove(&mut self, key: &str) -> Result<()> {
        let mut frame = self.frame_writer();
        frame.u8(keyword::REMOVE);
        frame.string_utf8(Some(key));
        self.push(&frame)
    }

    pub fn frame_count(&self) -> i32 {
        self.frames
    }

    pub fn finish(mut self) -> Vec<u8> {
        let body = self.body.flush();
        let mut out = Writer::with_alloc_size(body.len() + 5);
        out.uint7x(self.frames);
        out.buf(&body);
        debug!(frames = self.frames, bytes = out.len(), "encoded batch");
        out.flush()
    }
}

pub fn encode_nodes(graph: &Graph, ids: &[NodeId], scope: &dyn ResolveScope) -> Result<Vec<u8>> {
    let mut encoder = BatchEncoder::new();
    for &id in ids {
        encoder.node(graph, id, scope)?;
    }
    Ok(encoder.finish())
}

pub fn encode_updates(updates: &[(String, Vec<FieldDelta>)]) -> Result<Vec<u8>> {
    let mut encoder = BatchEncoder::new();
    for (key, deltas) in updates {
        encoder.update(key, deltas)?;
    }
    Ok(encoder.finish())
}

pub fn encode_remove(keys: &[&str]) -> Result<Vec<u8>> {
    let mut encoder = BatchEncoder::new();
    for key in keys {
        encoder.remove(key)?;
    }
    Ok(encoder.finish())
}

/// What a successfully applied batch changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub created: Vec<NodeId>,
    pub updated: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

/// Applies batches to a graph and its identifier scope.
pub struct BatchDecoder<'r> {
    registry: &'r TypeRegistry,
    options: CodecOptions,
}

impl<'r> BatchDecoder<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self::with_options(registry, CodecOptions::default())
    }

    pub fn with_options(registry: &'r TypeRegistry, options: CodecOptions) -> Self {
        Self { registry, options }
    }

    /// Decodes and applies one batch. Either every frame takes effect or
    /// none does: on failure the nodes allocated by the batch are dropped
    /// and `graph` and `scope` are left as they were.
    pub fn decode(
        &self,
        bytes: &[u8],
        graph: &mut Graph,
        scope: &mut IndexedScope,
    ) -> Result<BatchReport> {
        let mark = graph.capacity_mark();
        match self.load(bytes, graph, scope) {
            Ok(report) => {
                debug!(
                    created = report.created.len(),
                    updated = report.updated.len(),
                    removed = report.removed.len(),
                    "applied batch"
                );
                Ok(report)
            }
            Err(e) => {
                let discarded = graph.capacity_mark() - mark;
                graph.truncate(mark);
                warn!(error = %e, discarded, "batch discarded");
                Err(e)
            }
        }
    }

    fn load(
        &self,
        bytes: &[u8],
        graph: &mut Graph,
        scope: &mut IndexedScope,
    ) -> Result<BatchReport> {
        let mut reader = Reader::new(bytes);
        let count = reader.try_uint7x()?;
        if count < 0 {
            return Err(DecodeError::InvalidLength {
                field: "frames".into(),
                length: count,
            }
            .into());
        }
        let mut report = BatchReport::default();
        let mut updates: Vec<(NodeId, Vec<FieldDelta>)> = Vec::new();
        let mut removals: Vec<String> = Vec::new();
        let mut doomed: HashMap<NodeId, String> = HashMap::new();

        let created = {
            let mut build = BuildScope::with_base(&*scope);
            for _ in 0..count {
                match reader.try_u8()? {
                    keyword::NODE => {
                        let key = read_key(&mut reader, "id")?;
                        if build.retrieve_object(&key).is_some() {
                            return Err(DecodeError::DuplicateId(key).into());
                        }
                        let type_name = read_key(&mut reader, "type")?;
                        let descriptor = Arc::clone(self.registry.lookup(&type_name)?);
                        let id = descriptor.decode_from(
                            &mut reader,
                            graph,
                            &mut build,
                            &self.options,
                        )?;
                        debug!(id = %key, type_name = %type_name, "decoded node frame");
                        build.register(key, id);
                        report.created.push(id);
                    }
                    keyword::UPDATE => {
                        let key = read_key(&mut reader, "id")?;
                        let id = build
                            .retrieve_object(&key)
                            .ok_or(CodecError::Resolution(key))?;
                        updates.push((id, self.read_deltas(&mut reader, graph, id)?));
                    }
                    keyword::REMOVE => {
                        let key = read_key(&mut reader, "id")?;
                        let Some(id) = scope.retrieve_object(&key) else {
                            return Err(CodecError::Resolution(key));
                        };
                        doomed.insert(id, key.clone());
                        removals.push(key);
                    }
                    other => return Err(DecodeError::UnknownKeyword(other).into()),
                }
            }
            if self.options.reject_trailing_bytes && !reader.is_eof() {
                return Err(DecodeError::TrailingBytes(reader.size()).into());
            }

            // Nothing that existed before the batch is touched until every
            // reference is known to resolve.
            build.verify(graph)?;
            for (_, deltas) in &updates {
                for delta in deltas {
                    if let Some(pending) = delta.pending() {
                        build.check_pending(graph, delta.field(), &pending)?;
                    }
                }
            }
            check_removals(graph, &build, &updates, &doomed)?;
            for (id, deltas) in &updates {
                let (descriptor, node) = graph.descriptor_and_node_mut(*id)?;
                descriptor.apply_deltas(*id, node, deltas, &mut build)?;
                report.updated.push(*id);
            }
            build.resolve(graph)?;
            build.into_objects()
        };

        for (key, id) in created {
            scope.insert(key, id);
        }
        for key in removals {
            if let Some(id) = scope.remove_key(&key) {
                graph.remove(id);
                report.removed.push(id);
            }
        }
        Ok(report)
    }

    fn read_deltas(
        &self,
        reader: &mut Reader<'_>,
        graph: &Graph,
        id: NodeId,
    ) -> Result<Vec<FieldDelta>> {
        let descriptor = graph.descriptor(id)?;
        let count = reader.try_uint7x()?;
        if count < 0 {
            return Err(DecodeError::InvalidLength {
                field: "deltas".into(),
                length: count,
            }
            .into());
        }
        let mut deltas = Vec::new();
        for _ in 0..count {
            let code = reader.try_uint7x()?;
            let field = usize::try_from(code)
                .ok()
                .and_then(|ordinal| descriptor.field(ordinal))
                .ok_or_else(|| DecodeError::UnknownFieldCode {
                    type_name: descriptor.serial_name().to_owned(),
                    code,
                })?;
            let parser = field.create_parser(reader)?;
            deltas.push(parser.parse_value(reader, &self.options)?);
        }
        Ok(deltas)
    }
}

#[derive(Default)]
struct Targets(Vec<NodeId>);

impl GraphCrawler for Targets {
    fn accept(&mut self, id: NodeId) {
        self.0.push(id);
    }
}

/// Fails if a node that outlives the batch would still strongly reference
/// a node the batch removes, whether through a staged binding or through a
/// slot no update overwrites.
fn check_removals(
    graph: &Graph,
    build: &BuildScope<'_>,
    updates: &[(NodeId, Vec<FieldDelta>)],
    doomed: &HashMap<NodeId, String>,
) -> Result<()> {
    if doomed.is_empty() {
        return Ok(());
    }
    let dangling = |holder: NodeId, target: NodeId| -> Result<()> {
        match doomed.get(&target) {
            Some(key) if !doomed.contains_key(&holder) => {
                Err(DecodeError::RemovedWhileReferenced {
                    key: key.clone(),
                    holder,
                }
                .into())
            }
            _ => Ok(()),
        }
    };
    let pending_keys = |holder: NodeId, pending: &PendingRef| -> Result<()> {
        for key in pending.keys() {
            if let Some(target) = build.retrieve_object(key) {
                dangling(holder, target)?;
            }
        }
        Ok(())
    };

    for binding in build.bindings() {
        pending_keys(binding.owner, &binding.pending)?;
    }
    for (holder, deltas) in updates {
        for delta in deltas {
            if let Some(pending) = delta.pending() {
                pending_keys(*holder, &pending)?;
            }
        }
    }

    for holder in graph.ids() {
        if doomed.contains_key(&holder) {
            continue;
        }
        let overwritten: Vec<usize> = updates
            .iter()
            .filter(|(id, _)| *id == holder)
            .flat_map(|(_, deltas)| deltas.iter().map(|d| d.field().ordinal()))
            .collect();
        let descriptor = graph.descriptor(holder)?;
        let node = graph.node(holder)?;
        let mut targets = Targets::default();
        for field in descriptor.fields() {
            if !overwritten.contains(&field.ordinal()) {
                field.sweep(node, &mut targets)?;
            }
        }
        for target in targets.0 {
            dangling(holder, target)?;
        }
    }
    Ok(())
}

/// Non-null frame string.
fn read_key(reader: &mut Reader<'_>, what: &str) -> Result<String> {
    match reader.try_string_utf8()? {
        Some(s) => Ok(s.to_owned()),
        None => Err(DecodeError::NullElement {
            field: what.to_owned(),
        }
        .into()),
    }
}

/// Decodes `bytes` with default options.
pub fn decode_batch(
    bytes: &[u8],
    registry: &TypeRegistry,
    graph: &mut Graph,
    scope: &mut IndexedScope,
) -> Result<BatchReport> {
    BatchDecoder::new(registry).decode(bytes, graph, scope)
}

/// Deep copy of every node indexed by `scope`, with references re-pointed
/// at the copies. The copy is indexed under the same identifiers.
pub fn clone_graph(graph: &Graph, scope: &IndexedScope) -> Result<(Graph, IndexedScope)> {
    let mut out = Graph::new();
    let mut out_scope = IndexedScope::new();
    let mut build = BuildScope::new();
    for (key, id) in scope.iter() {
        let descriptor = graph.descriptor(id)?;
        let clone = descriptor.deep_clone(graph.node(id)?, scope, &mut out, &mut build)?;
        build.register(key, clone);
        out_scope.insert(key, clone);
    }
    build.resolve(&mut out)?;
    debug!(nodes = out.len(), "cloned graph");
    Ok((out, out_scope))
}
