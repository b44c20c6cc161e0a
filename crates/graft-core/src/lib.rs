//! Typed object-graph codec.
//!
//! Host types register their fields once, through a [`TypeBuilder`]; the
//! resulting [`TypeDescriptor`] then encodes, decodes, diffs, clones,
//! measures and sweeps nodes of that type. Cross references are stored as
//! [`NodeId`]s inside a [`Graph`] and travel on the wire as string
//! identifiers handed out by a [`ResolveScope`]. Decoding binds them in two
//! phases: every node of a batch is allocated first, then a [`BuildScope`]
//! resolves all pending references in one pass.
//!
//! ```
//! use graft_core::{slot, BuildScope, FieldSpec, Graph, IndexedScope, Node, TypeBuilder};
//!
//! #[derive(Debug, Default)]
//! struct Floor {
//!     x0: f64,
//!     tags: Option<Vec<String>>,
//! }
//! impl Node for Floor {}
//!
//! let floor = TypeBuilder::with_default::<Floor>("Floor")
//!     .field(FieldSpec::double("x0", slot!(Floor, x0)))
//!     .field(FieldSpec::string_array("tags", slot!(Floor, tags)))
//!     .build()
//!     .unwrap();
//!
//! let node = Floor { x0: 3.5, tags: Some(vec!["a".into(), "b".into()]) };
//! let bytes = floor.encode(&node, &IndexedScope::new()).unwrap();
//!
//! let mut graph = Graph::new();
//! let mut build = BuildScope::new();
//! let id = floor.decode(&bytes, &mut graph, &mut build).unwrap();
//! let back = graph.get::<Floor>(id).unwrap();
//! assert_eq!(back.x0, 3.5);
//! assert_eq!(back.tags.as_deref(), Some(&["a".to_string(), "b".to_string()][..]));
//! ```

pub mod batch;
pub mod blob;
pub mod config;
pub mod crawler;
pub mod descriptor;
pub mod error;
pub mod field;
pub mod footprint;
pub mod node;
pub mod reference;
pub mod registry;
pub mod scope;
pub mod wire;

pub use batch::{
    clone_graph, decode_batch, encode_nodes, encode_remove, encode_updates, BatchDecoder,
    BatchEncoder, BatchReport,
};
pub use blob::{Blob, BlobCodec, BlobRegistry};
pub use config::CodecOptions;
pub use crawler::{GraphCrawler, ReferencedBlocks, Sweeper};
pub use descriptor::{Constructor, TypeBuilder, TypeDescriptor};
pub use error::{CodecError, DecodeError, EncodeError, Result};
pub use field::{
    DeltaValue, Encoding, Field, FieldComposer, FieldDelta, FieldKind, FieldParser, FieldSpec,
    Slot,
};
pub use footprint::MemoryFootprint;
pub use node::{Graph, Node, NodeId};
pub use reference::{Address, RefState, WeakRef};
pub use registry::TypeRegistry;
pub use scope::{Binding, BuildScope, IndexedScope, PendingRef, ResolveScope, ResolvedRef};
pub use wire::WireType;
