use std::sync::Arc;

use indexmap::IndexMap;

use crate::descriptor::TypeDescriptor;
use crate::error::{CodecError, DecodeError, Result};

/// Type descriptors by serial name, as needed to decode node frames.
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    types: IndexMap<String, Arc<TypeDescriptor>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: Arc<TypeDescriptor>) -> Result<()> {
        let name = descriptor.serial_name();
        if self.types.contains_key(name) {
            return Err(CodecError::build(name, "type registered twice"));
        }
        self.types.insert(name.to_owned(), descriptor);
        Ok(())
    }

    pub fn get(&self, serial_name: &str) -> Option<&Arc<TypeDescriptor>> {
        self.types.get(serial_name)
    }

    pub fn lookup(&self, serial_name: &str) -> Result<&Arc<TypeDescriptor>, DecodeError> {
        self.get(serial_name)
            .ok_or_else(|| DecodeError::UnknownType(serial_name.to_owned()))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TypeDescriptor>> + '_ {
        self.types.values()
    }
}
