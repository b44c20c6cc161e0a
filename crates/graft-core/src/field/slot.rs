//! Type-erased accessors binding a field to one slot of a host type.

use std::fmt;

use crate::error::{CodecError, Result};
use crate::node::Node;

trait SlotAccess<T>: Send + Sync {
    fn read<'a>(&self, node: &'a dyn Node) -> Option<&'a T>;
    fn write<'a>(&self, node: &'a mut dyn Node) -> Option<&'a mut T>;
    fn host(&self) -> &'static str;
}

struct HostSlot<H, T> {
    read: fn(&H) -> &T,
    write: fn(&mut H) -> &mut T,
}

impl<H: Node, T: 'static> SlotAccess<T> for HostSlot<H, T> {
    fn read<'a>(&self, node: &'a dyn Node) -> Option<&'a T> {
        node.as_any().downcast_ref::<H>().map(self.read)
    }

    fn write<'a>(&self, node: &'a mut dyn Node) -> Option<&'a mut T> {
        node.as_any_mut().downcast_mut::<H>().map(self.write)
    }

    fn host(&self) -> &'static str {
        std::any::type_name::<H>()
    }
}

/// Reads and writes one `T`-typed slot on nodes of a single host type.
///
/// Built from a pair of projections, usually through [`slot!`](crate::slot):
///
/// ```
/// use graft_core::{slot, Slot};
///
/// #[derive(Debug, Default)]
/// struct Floor { x0: f64 }
/// impl graft_core::Node for Floor {}
///
/// let x0: Slot<f64> = slot!(Floor, x0);
/// let mut floor = Floor { x0: 1.5 };
/// assert_eq!(*x0.get(&floor, "x0").unwrap(), 1.5);
/// *x0.get_mut(&mut floor, "x0").unwrap() = 2.0;
/// assert_eq!(floor.x0, 2.0);
/// ```
pub struct Slot<T: 'static> {
    access: Box<dyn SlotAccess<T>>,
}

impl<T: 'static> Slot<T> {
    pub fn new<H: Node>(read: fn(&H) -> &T, write: fn(&mut H) -> &mut T) -> Self {
        Self {
            access: Box::new(HostSlot { read, write }),
        }
    }

    /// Name of the host type this slot is bound to.
    pub fn host(&self) -> &'static str {
        self.access.host()
    }

    pub fn get<'a>(&self, node: &'a dyn Node, field: &str) -> Result<&'a T> {
        self.access.read(node).ok_or_else(|| self.mismatch(field))
    }

    pub fn get_mut<'a>(&self, node: &'a mut dyn Node, field: &str) -> Result<&'a mut T> {
        match self.access.write(node) {
            Some(value) => Ok(value),
            None => Err(self.mismatch(field)),
        }
    }

    pub fn set(&self, node: &mut dyn Node, field: &str, value: T) -> Result<()> {
        *self.get_mut(node, field)? = value;
        Ok(())
    }

    fn mismatch(&self, field: &str) -> CodecError {
        CodecError::TypeMismatch {
            field: field.to_owned(),
            expected: self.access.host().to_owned(),
        }
    }
}

impl<T: 'static> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slot<{}>({})", std::any::type_name::<T>(), self.host())
    }
}

/// Builds a [`Slot`] projecting `$host.$field`.
#[macro_export]
macro_rules! slot {
    ($host:ty, $field:ident) => {
        $crate::Slot::new::<$host>(|n| &n.$field, |n| &mut n.$field)
    };
}
