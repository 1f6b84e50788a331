//! Schema - Type descriptors for interpreting target memory
//!
//! Descriptors live in an arena and refer to each other by [`TypeId`], so a
//! schema can describe self-referential types (a list node pointing at its
//! own type) without reference cycles. A loaded schema is immutable.

pub mod elf;
pub mod symbols;

use thiserror::Error;

pub use symbols::{Symbol, SymbolTable};

/// Schema construction errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Type #{0} was reserved but never defined")]
    Undefined(u32),

    #[error("Type #{from} refers to missing type #{to}")]
    DanglingReference { from: u32, to: u32 },

    #[error("Root type #{0} is not a namespace")]
    RootNotNamespace(u32),

    #[error("Invalid pointer width {0}")]
    PointerWidth(u8),

    #[error("Failed to parse binary: {0}")]
    Binary(String),
}

/// Identity of a type descriptor within its schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Scalar kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Void,
    Bool,
    Char,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl PrimitiveKind {
    /// Size in bytes
    pub fn size(self) -> usize {
        match self {
            PrimitiveKind::Void => 0,
            PrimitiveKind::Bool | PrimitiveKind::Char | PrimitiveKind::I8 | PrimitiveKind::U8 => 1,
            PrimitiveKind::I16 | PrimitiveKind::U16 => 2,
            PrimitiveKind::I32 | PrimitiveKind::U32 | PrimitiveKind::F32 => 4,
            PrimitiveKind::I64 | PrimitiveKind::U64 | PrimitiveKind::F64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Void => "void",
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Char => "char",
            PrimitiveKind::I8 => "int8",
            PrimitiveKind::U8 => "uint8",
            PrimitiveKind::I16 => "int16",
            PrimitiveKind::U16 => "uint16",
            PrimitiveKind::I32 => "int32",
            PrimitiveKind::U32 => "uint32",
            PrimitiveKind::I64 => "int64",
            PrimitiveKind::U64 => "uint64",
            PrimitiveKind::F32 => "float",
            PrimitiveKind::F64 => "double",
        }
    }

    /// Unsigned primitive of the given width, if there is one
    pub fn unsigned_of_size(size: u64) -> Option<Self> {
        match size {
            1 => Some(PrimitiveKind::U8),
            2 => Some(PrimitiveKind::U16),
            4 => Some(PrimitiveKind::U32),
            8 => Some(PrimitiveKind::U64),
            _ => None,
        }
    }
}

/// Element count of an array
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayLen {
    Fixed(u32),
    /// Read from an integer field, addressed relative to the array's path
    Field(String),
}

/// Struct or union member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub ty: TypeId,
    /// Declared offset; packed after the previous member when absent
    pub offset: Option<u32>,
}

impl Member {
    pub fn new(name: impl Into<String>, ty: TypeId) -> Self {
        Self {
            name: name.into(),
            ty,
            offset: None,
        }
    }

    pub fn at(name: impl Into<String>, ty: TypeId, offset: u32) -> Self {
        Self {
            name: name.into(),
            ty,
            offset: Some(offset),
        }
    }
}

/// Type variants
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Primitive(PrimitiveKind),
    Array { element: TypeId, len: ArrayLen },
    Pointer { target: TypeId },
    FunctionPointer,
    /// NUL-terminated inline string of unknown length
    String,
    Enum { width: u8, values: Vec<(u64, String)> },
    Struct { members: Vec<Member>, size: Option<u32> },
    Union { members: Vec<Member>, size: u32 },
    Global { ty: TypeId, address: u64 },
    Namespace { children: Vec<(String, TypeId)> },
    Alias { target: TypeId },
    GraphicsBuffer { width: u32, height: u32, bytes_per_pixel: u8 },
    Placeholder,
}

impl TypeKind {
    /// Every type this one refers to
    fn references(&self) -> Vec<TypeId> {
        match self {
            TypeKind::Array { element, .. } => vec![*element],
            TypeKind::Pointer { target } | TypeKind::Alias { target } => vec![*target],
            TypeKind::Struct { members, .. } | TypeKind::Union { members, .. } => {
                members.iter().map(|m| m.ty).collect()
            }
            TypeKind::Global { ty, .. } => vec![*ty],
            TypeKind::Namespace { children } => children.iter().map(|(_, ty)| *ty).collect(),
            TypeKind::Primitive(_)
            | TypeKind::FunctionPointer
            | TypeKind::String
            | TypeKind::Enum { .. }
            | TypeKind::GraphicsBuffer { .. }
            | TypeKind::Placeholder => Vec::new(),
        }
    }
}

/// A named type descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDesc {
    pub name: String,
    pub kind: TypeKind,
}

/// Loaded, validated type graph
#[derive(Debug, Clone)]
pub struct Schema {
    types: Vec<TypeDesc>,
    root: TypeId,
    pointer_width: u8,
    symbols: SymbolTable,
}

impl Schema {
    pub fn root(&self) -> TypeId {
        self.root
    }

    pub fn get(&self, id: TypeId) -> Option<&TypeDesc> {
        self.types.get(id.index())
    }

    pub fn pointer_width(&self) -> usize {
        self.pointer_width as usize
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Symbolic name for an address (`name` or `name+0x10`)
    pub fn symbolize(&self, address: u64) -> Option<String> {
        self.symbols.describe(address)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// First type with the given name
    pub fn find(&self, name: &str) -> Option<TypeId> {
        self.types
            .iter()
            .position(|t| t.name == name)
            .map(|i| TypeId(i as u32))
    }
}

/// Incremental schema construction
///
/// `reserve` hands out an id before its descriptor exists, which is how
/// recursive types are written:
///
/// ```
/// use memwatch::schema::{Member, SchemaBuilder, TypeKind, PrimitiveKind};
///
/// let mut b = SchemaBuilder::new(8);
/// let node = b.reserve();
/// let next = b.add("node*", TypeKind::Pointer { target: node });
/// let value = b.primitive(PrimitiveKind::I32);
/// b.define(node, "node", TypeKind::Struct {
///     members: vec![Member::new("value", value), Member::new("next", next)],
///     size: None,
/// });
/// let root = b.add("root", TypeKind::Namespace { children: vec![] });
/// assert!(b.build(root).is_ok());
/// ```
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    types: Vec<Option<TypeDesc>>,
    pointer_width: u8,
    symbols: SymbolTable,
}

impl SchemaBuilder {
    pub fn new(pointer_width: u8) -> Self {
        Self {
            types: Vec::new(),
            pointer_width,
            symbols: SymbolTable::default(),
        }
    }

    pub fn add(&mut self, name: impl Into<String>, kind: TypeKind) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(Some(TypeDesc {
            name: name.into(),
            kind,
        }));
        id
    }

    pub fn primitive(&mut self, kind: PrimitiveKind) -> TypeId {
        self.add(kind.name(), TypeKind::Primitive(kind))
    }

    /// Allocate an id to be filled in later with `define`
    pub fn reserve(&mut self) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(None);
        id
    }

    pub fn define(&mut self, id: TypeId, name: impl Into<String>, kind: TypeKind) {
        if let Some(slot) = self.types.get_mut(id.index()) {
            *slot = Some(TypeDesc {
                name: name.into(),
                kind,
            });
        }
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    /// Validate references and freeze the schema
    pub fn build(self, root: TypeId) -> Result<Schema, SchemaError> {
        if !matches!(self.pointer_width, 4 | 8) {
            return Err(SchemaError::PointerWidth(self.pointer_width));
        }

        let mut types = Vec::with_capacity(self.types.len());
        for (index, slot) in self.types.into_iter().enumerate() {
            types.push(slot.ok_or(SchemaError::Undefined(index as u32))?);
        }

        for (index, desc) in types.iter().enumerate() {
            for target in desc.kind.references() {
                if target.index() >= types.len() {
                    return Err(SchemaError::DanglingReference {
                        from: index as u32,
                        to: target.0,
                    });
                }
            }
        }

        match types.get(root.index()) {
            Some(TypeDesc {
                kind: TypeKind::Namespace { .. },
                ..
            }) => {}
            Some(_) => return Err(SchemaError::RootNotNamespace(root.0)),
            None => {
                return Err(SchemaError::DanglingReference {
                    from: root.0,
                    to: root.0,
                })
            }
        }

        let mut symbols = self.symbols;
        symbols.finish();

        Ok(Schema {
            types,
            root,
            pointer_width: self.pointer_width,
            symbols,
        })
    }
}
