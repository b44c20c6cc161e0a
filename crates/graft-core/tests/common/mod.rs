#![allow(dead_code)]

use std::sync::Arc;

use graft_buffers::{Reader, Writer};
use graft_core::{
    slot, Blob, BlobCodec, BlobRegistry, FieldSpec, Node, NodeId, TypeBuilder, TypeDescriptor,
    TypeRegistry, WeakRef,
};

/// Free-form labels carried as an opaque blob.
#[derive(Debug, Clone, PartialEq)]
pub struct Notes(pub Vec<String>);

impl Blob for Notes {
    fn serial_name(&self) -> &str {
        "notes"
    }

    fn serialize(&self, writer: &mut Writer) -> Result<(), String> {
        writer.uint7x(self.0.len() as i32);
        for note in &self.0 {
            writer.string_utf8(Some(note));
        }
        Ok(())
    }

    fn footprint(&self) -> usize {
        self.0.iter().map(String::len).sum()
    }

    fn clone_blob(&self) -> Box<dyn Blob> {
        Box::new(self.clone())
    }
}

pub struct NotesCodec;

impl BlobCodec for NotesCodec {
    fn serial_name(&self) -> &str {
        "notes"
    }

    fn deserialize(&self, reader: &mut Reader<'_>) -> Result<Box<dyn Blob>, String> {
        let n = reader.try_uint7x().map_err(|e| e.to_string())?;
        let mut notes = Vec::new();
        for _ in 0..n {
            let s = reader
                .try_string_utf8()
                .map_err(|e| e.to_string())?
                .ok_or_else(|| "null note".to_string())?;
            notes.push(s.to_owned());
        }
        Ok(Box::new(Notes(notes)))
    }
}

#[derive(Debug, Default)]
pub struct Floor {
    pub x0: f64,
    pub tags: Option<Vec<String>>,
    pub level: i32,
    pub lit: bool,
    pub heights: Option<Vec<f64>>,
    pub codes: Option<Vec<i16>>,
    pub switches: Option<Vec<bool>>,
    pub building: Option<NodeId>,
    pub neighbor: Option<WeakRef>,
    pub notes: Option<Box<dyn Blob>>,
}

impl Node for Floor {}

#[derive(Debug, Default)]
pub struct Building {
    pub height: i32,
    pub floors: Option<Vec<Option<NodeId>>>,
    pub lobby: Option<NodeId>,
}

impl Node for Building {}

pub struct Fixture {
    pub floor: Arc<TypeDescriptor>,
    pub building: Arc<TypeDescriptor>,
    pub registry: TypeRegistry,
}

pub fn floor_type(blobs: &BlobRegistry) -> Arc<TypeDescriptor> {
    TypeBuilder::with_default::<Floor>("Floor")
        .field(FieldSpec::double("x0", slot!(Floor, x0)))
        .field(FieldSpec::string_array("tags", slot!(Floor, tags)))
        .field(FieldSpec::integer("level", slot!(Floor, level)).flow("int16"))
        .field(FieldSpec::boolean("lit", slot!(Floor, lit)))
        .field(FieldSpec::double_array("heights", slot!(Floor, heights)))
        .field(FieldSpec::short_array("codes", slot!(Floor, codes)))
        .field(FieldSpec::boolean_array("switches", slot!(Floor, switches)))
        .field(FieldSpec::object("building", slot!(Floor, building), "Building"))
        .field(FieldSpec::weak_ref("neighbor", slot!(Floor, neighbor)))
        .field(FieldSpec::blob(
            "notes",
            slot!(Floor, notes),
            blobs.codec("notes").expect("notes codec is registered"),
        ))
        .build()
        .expect("Floor type must build")
}

pub fn building_type() -> Arc<TypeDescriptor> {
    TypeBuilder::with_default::<Building>("Building")
        .field(FieldSpec::integer("height", slot!(Building, height)))
        .field(FieldSpec::object_list("floors", slot!(Building, floors)))
        .field(FieldSpec::interface("lobby", slot!(Building, lobby)))
        .build()
        .expect("Building type must build")
}

pub fn fixture() -> Fixture {
    let mut blobs = BlobRegistry::new();
    blobs
        .register(Arc::new(NotesCodec))
        .expect("notes codec registers once");
    let floor = floor_type(&blobs);
    let building = building_type();
    let mut registry = TypeRegistry::new();
    registry.register(floor.clone()).expect("Floor registers");
    registry.register(building.clone()).expect("Building registers");
    Fixture {
        floor,
        building,
        registry,
    }
}

pub fn sample_floor() -> Floor {
    Floor {
        x0: 3.5,
        tags: Some(vec!["a".into(), "b".into()]),
        level: -3,
        lit: true,
        heights: Some(vec![2.5, 3.0]),
        codes: Some(vec![i16::MIN, 0, i16::MAX]),
        switches: Some(vec![true, false]),
        building: None,
        neighbor: None,
        notes: Some(Box::new(Notes(vec!["north wing".into()]))),
    }
}

/// Routes library logs to the test output. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}
