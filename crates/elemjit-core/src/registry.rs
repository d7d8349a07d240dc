//! Scalar type registry.
//!
//! A fixed, closed table of the C scalar types a kernel may use. Each entry
//! records where the value sits inside the host's scalar object
//! ([`ScalarObject`]) and how wide one buffer element is.

use std::fmt;
use std::mem::{offset_of, size_of};
use std::os::raw::c_char;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::host::ScalarObject;

/// Element representation of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    /// C `int` (32-bit signed).
    Int,
    /// C `double`.
    Double,
    /// C `char*` (pointer to a NUL-terminated byte string).
    CString,
}

impl ElementKind {
    /// Width of one element in bytes.
    pub const fn size(&self) -> usize {
        match self {
            ElementKind::Int => size_of::<i32>(),
            ElementKind::Double => size_of::<f64>(),
            ElementKind::CString => size_of::<*const c_char>(),
        }
    }

    /// C spelling of the type.
    pub const fn c_name(&self) -> &'static str {
        match self {
            ElementKind::Int => "int",
            ElementKind::Double => "double",
            ElementKind::CString => "char*",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.c_name())
    }
}

/// One registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// C type name as written in signatures.
    pub name: &'static str,
    /// Name of the matching host scalar object type.
    pub host_name: &'static str,
    /// Byte offset of the value inside the host scalar object.
    pub value_offset: usize,
    /// Byte width of one buffer element.
    pub element_size: usize,
    /// Element kind.
    pub kind: ElementKind,
}

static TYPES: [TypeDescriptor; 3] = [
    TypeDescriptor {
        name: "int",
        host_name: "IntObject",
        value_offset: offset_of!(ScalarObject<i32>, value),
        element_size: ElementKind::Int.size(),
        kind: ElementKind::Int,
    },
    TypeDescriptor {
        name: "double",
        host_name: "FloatObject",
        value_offset: offset_of!(ScalarObject<f64>, value),
        element_size: ElementKind::Double.size(),
        kind: ElementKind::Double,
    },
    TypeDescriptor {
        name: "char*",
        host_name: "StringObject",
        value_offset: offset_of!(ScalarObject<*const c_char>, value),
        element_size: ElementKind::CString.size(),
        kind: ElementKind::CString,
    },
];

/// Lookup over the fixed type table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeRegistry;

impl TypeRegistry {
    /// Resolve a C type name.
    pub fn lookup(name: &str) -> Result<&'static TypeDescriptor> {
        TYPES
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| CoreError::UnknownType(name.to_string()))
    }

    /// Descriptor for an element kind.
    pub fn for_kind(kind: ElementKind) -> &'static TypeDescriptor {
        match kind {
            ElementKind::Int => &TYPES[0],
            ElementKind::Double => &TYPES[1],
            ElementKind::CString => &TYPES[2],
        }
    }

    /// Every registered type.
    pub fn all() -> &'static [TypeDescriptor] {
        &TYPES
    }
}
