//! The built-in type catalog for expressions.
//!
//! Skein expressions carry one of four static types: string, number,
//! boolean, or any. The catalog maps the host runtime's native value kinds
//! onto those four, and is the integration point between the expression
//! type assignment and whatever value representation the host embeds. It
//! is `'static` data: read-only after initialization and safe to read from
//! any number of threads.

use serde::{Deserialize, Serialize};

/// The built-in type tags.
///
/// `Undefined` exists for the compilation phase only, as the placeholder
/// a type checker starts from; it never appears in an AST handed to
/// consumers and has no descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltinType {
    String,
    Number,
    Boolean,
    Any,
    Undefined,
}

impl BuiltinType {
    /// The descriptor for this type, or `None` for `Undefined`.
    pub const fn descriptor(self) -> Option<&'static TypeDescriptor> {
        match self {
            BuiltinType::String => Some(&STRING),
            BuiltinType::Number => Some(&NUMBER),
            BuiltinType::Boolean => Some(&BOOLEAN),
            BuiltinType::Any => Some(&ANY),
            BuiltinType::Undefined => None,
        }
    }
}

/// An immutable descriptor for one built-in type.
///
/// Serializable for tooling output; descriptors are catalog constants and
/// are never read back in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TypeDescriptor {
    pub name: &'static str,
    pub ty: BuiltinType,
}

pub const STRING: TypeDescriptor = TypeDescriptor {
    name: "String",
    ty: BuiltinType::String,
};

pub const NUMBER: TypeDescriptor = TypeDescriptor {
    name: "Number",
    ty: BuiltinType::Number,
};

pub const BOOLEAN: TypeDescriptor = TypeDescriptor {
    name: "Boolean",
    ty: BuiltinType::Boolean,
};

pub const ANY: TypeDescriptor = TypeDescriptor {
    name: "Any",
    ty: BuiltinType::Any,
};

/// Native value kinds a host runtime can hand to the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostValueKind {
    Int32,
    Int64,
    Float32,
    Float64,
    Text,
    Char,
    Bool,
    /// A host object the core treats as opaque.
    Opaque,
    /// The host's unit/void kind; it has no expression type.
    Void,
}

/// Map a host value kind onto a built-in type descriptor.
///
/// Integer and float kinds collapse to [`NUMBER`], textual kinds to
/// [`STRING`], booleans to [`BOOLEAN`], and opaque host objects to
/// [`ANY`]. `Void` has no mapping.
pub const fn lookup(kind: HostValueKind) -> Option<&'static TypeDescriptor> {
    match kind {
        HostValueKind::Int32
        | HostValueKind::Int64
        | HostValueKind::Float32
        | HostValueKind::Float64 => Some(&NUMBER),
        HostValueKind::Text | HostValueKind::Char => Some(&STRING),
        HostValueKind::Bool => Some(&BOOLEAN),
        HostValueKind::Opaque => Some(&ANY),
        HostValueKind::Void => None,
    }
}
