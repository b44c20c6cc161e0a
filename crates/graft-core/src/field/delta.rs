use std::sync::Arc;

use super::{Field, FieldKind};
use crate::blob::{blob_bytes, Blob};
use crate::error::{CodecError, Result};
use crate::node::{Node, NodeId};
use crate::reference::WeakRef;
use crate::scope::{Binding, BuildScope, PendingRef};

/// A captured field value. References are held as identifiers so a delta
/// can cross graphs.
#[derive(Debug, Clone)]
pub enum DeltaValue {
    Boolean(bool),
    Integer(i32),
    Double(f64),
    BooleanArray(Option<Vec<bool>>),
    ShortArray(Option<Vec<i16>>),
    DoubleArray(Option<Vec<f64>>),
    StringArray(Option<Vec<String>>),
    /// Embedded object or interface reference.
    Object(Option<String>),
    ObjectList(Option<Vec<Option<String>>>),
    WeakRef(Option<WeakRef>),
    Blob(Option<Box<dyn Blob>>),
}

fn same_doubles(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

fn same_blob(a: &dyn Blob, b: &dyn Blob) -> bool {
    if a.serial_name() != b.serial_name() {
        return false;
    }
    match (blob_bytes(a), blob_bytes(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Doubles compare bit for bit, weak references by address and blobs by
/// their serialized bytes.
impl PartialEq for DeltaValue {
    fn eq(&self, other: &Self) -> bool {
        use DeltaValue as V;
        match (self, other) {
            (V::Boolean(a), V::Boolean(b)) => a == b,
            (V::Integer(a), V::Integer(b)) => a == b,
            (V::Double(a), V::Double(b)) => a.to_bits() == b.to_bits(),
            (V::BooleanArray(a), V::BooleanArray(b)) => a == b,
            (V::ShortArray(a), V::ShortArray(b)) => a == b,
            (V::DoubleArray(a), V::DoubleArray(b)) => match (a, b) {
                (Some(a), Some(b)) => same_doubles(a, b),
                (a, b) => a.is_none() && b.is_none(),
            },
            (V::StringArray(a), V::StringArray(b)) => a == b,
            (V::Object(a), V::Object(b)) => a == b,
            (V::ObjectList(a), V::ObjectList(b)) => a == b,
            (V::WeakRef(a), V::WeakRef(b)) => {
                a.as_ref().map(|r| &r.address) == b.as_ref().map(|r| &r.address)
            }
            (V::Blob(a), V::Blob(b)) => match (a, b) {
                (Some(a), Some(b)) => same_blob(&**a, &**b),
                (a, b) => a.is_none() && b.is_none(),
            },
            _ => false,
        }
    }
}

/// A field value captured from one node, ready to be encoded or applied to
/// another node of the same type.
#[derive(Debug, Clone)]
pub struct FieldDelta {
    field: Arc<Field>,
    value: DeltaValue,
}

impl FieldDelta {
    pub(crate) fn new(field: Arc<Field>, value: DeltaValue) -> Self {
        Self { field, value }
    }

    pub fn field(&self) -> &Arc<Field> {
        &self.field
    }

    pub fn value(&self) -> &DeltaValue {
        &self.value
    }

    /// The binding this delta registers when operated, if any.
    pub fn pending(&self) -> Option<PendingRef> {
        match &self.value {
            DeltaValue::Object(Some(key)) if !key.is_empty() => {
                Some(PendingRef::Single(key.clone()))
            }
            DeltaValue::ObjectList(Some(keys)) => Some(PendingRef::List(
                keys.iter()
                    .map(|k| k.as_ref().filter(|k| !k.is_empty()).cloned())
                    .collect(),
            )),
            _ => None,
        }
    }

    /// The same delta without local-graph knowledge: a weak reference
    /// resolved to a local node goes back to unresolved.
    pub(crate) fn detached(mut self) -> Self {
        if let DeltaValue::WeakRef(Some(r)) = &mut self.value {
            *r = r.detached();
        }
        self
    }

    /// Writes the value into `node`. Non-null references are not written
    /// here; they become bindings on `scope`, applied by
    /// [`BuildScope::resolve`].
    pub fn operate(
        &self,
        owner: NodeId,
        node: &mut dyn Node,
        scope: &mut BuildScope<'_>,
    ) -> Result<()> {
        let name = self.field.name();
        let ordinal = self.field.ordinal();
        match (self.field.kind(), &self.value) {
            (FieldKind::Boolean(s), DeltaValue::Boolean(v)) => s.set(node, name, *v),
            (FieldKind::Integer(s), DeltaValue::Integer(v)) => s.set(node, name, *v),
            (FieldKind::Double(s), DeltaValue::Double(v)) => s.set(node, name, *v),
            (FieldKind::BooleanArray(s), DeltaValue::BooleanArray(v)) => {
                s.set(node, name, v.clone())
            }
            (FieldKind::ShortArray(s), DeltaValue::ShortArray(v)) => s.set(node, name, v.clone()),
            (FieldKind::DoubleArray(s), DeltaValue::DoubleArray(v)) => s.set(node, name, v.clone()),
            (FieldKind::StringArray(s), DeltaValue::StringArray(v)) => s.set(node, name, v.clone()),
            (
                FieldKind::Object { slot, .. } | FieldKind::Interface(slot),
                DeltaValue::Object(_),
            ) => {
                match self.pending() {
                    Some(pending) => {
                        scope.bind(Binding {
                            owner,
                            ordinal,
                            pending,
                        });
                        Ok(())
                    }
                    None => slot.set(node, name, None),
                }
            }
            (FieldKind::ObjectList(s), DeltaValue::ObjectList(_)) => match self.pending() {
                Some(pending) => {
                    scope.bind(Binding {
                        owner,
                        ordinal,
                        pending,
                    });
                    Ok(())
                }
                None => s.set(node, name, None),
            },
            (FieldKind::WeakRef(s), DeltaValue::WeakRef(v)) => s.set(node, name, v.clone()),
            (FieldKind::Blob { slot, .. }, DeltaValue::Blob(v)) => slot.set(node, name, v.clone()),
            _ => Err(CodecError::TypeMismatch {
                field: name.to_owned(),
                expected: self.field.print_type(),
            }),
        }
    }
}

impl PartialEq for FieldDelta {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.field, &other.field) && self.value == other.value
    }
}
