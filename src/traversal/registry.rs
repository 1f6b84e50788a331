//! Traversal registry - one shared traversal per schema type

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use super::alias::{AliasTraversal, PlaceholderTraversal};
use super::array::ArrayTraversal;
use super::enumeration::EnumTraversal;
use super::global::GlobalTraversal;
use super::graphics::GraphicsTraversal;
use super::namespace::NamespaceTraversal;
use super::pointer::{FunctionPointerTraversal, PointerTraversal};
use super::primitive::PrimitiveTraversal;
use super::string::StringTraversal;
use super::structure::{StructMember, StructTraversal};
use super::union::UnionTraversal;
use super::{Traversal, TraversalError, TypeInfo};
use crate::config::EngineConfig;
use crate::schema::{PrimitiveKind, Schema, TypeId, TypeKind};
use crate::trace::Tracer;

/// What history construction may need besides the record itself
pub struct Builder<'a> {
    pub schema: &'a Schema,
    pub registry: &'a mut TraversalRegistry,
    pub config: &'a EngineConfig,
    pub tracer: Tracer,
}

impl Builder<'_> {
    pub fn traversal(&mut self, id: TypeId) -> Result<Rc<Traversal>, TraversalError> {
        self.registry.get(self.schema, id, self.config)
    }
}

/// Memoized `TypeId -> Traversal` map
///
/// Pointers resolve their targets lazily, so recursive types through a
/// pointer are fine. Aliases are resolved while they are built. A type that
/// contains itself by value is rejected.
#[derive(Debug)]
pub struct TraversalRegistry {
    memo: HashMap<TypeId, Rc<Traversal>>,
    building: HashSet<TypeId>,
    tracer: Tracer,
}

impl Default for TraversalRegistry {
    fn default() -> Self {
        Self::new(Tracer::TRAVERSAL)
    }
}

impl TraversalRegistry {
    pub fn new(tracer: Tracer) -> Self {
        Self {
            memo: HashMap::new(),
            building: HashSet::new(),
            tracer,
        }
    }

    /// Traversal for `id`, building it (and its by-value parts) on first use
    pub fn get(
        &mut self,
        schema: &Schema,
        id: TypeId,
        config: &EngineConfig,
    ) -> Result<Rc<Traversal>, TraversalError> {
        if let Some(traversal) = self.memo.get(&id) {
            return Ok(traversal.clone());
        }

        let desc = schema.get(id).ok_or(TraversalError::UnknownType(id.0))?;
        if !self.building.insert(id) {
            return Err(TraversalError::RecursiveType(desc.name.clone()));
        }
        let built = self.build(schema, id, config);
        self.building.remove(&id);

        let traversal = Rc::new(built?);
        self.tracer.trace(format_args!(
            "built traversal for '{}' (#{})",
            traversal.type_name(),
            id.0
        ));
        self.memo.insert(id, traversal.clone());
        Ok(traversal)
    }

    fn build(
        &mut self,
        schema: &Schema,
        id: TypeId,
        config: &EngineConfig,
    ) -> Result<Traversal, TraversalError> {
        let desc = schema.get(id).ok_or(TraversalError::UnknownType(id.0))?;
        let info = TypeInfo {
            id,
            name: desc.name.clone(),
        };

        Ok(match &desc.kind {
            TypeKind::Primitive(kind) => Traversal::Primitive(PrimitiveTraversal { info, kind: *kind }),
            TypeKind::Array { element, len } => {
                let element = self.get(schema, *element, config)?;
                let inline_text = matches!(
                    unaliased(&element),
                    Traversal::Primitive(PrimitiveTraversal {
                        kind: PrimitiveKind::Char,
                        ..
                    })
                );
                Traversal::Array(ArrayTraversal {
                    info,
                    element,
                    len: len.clone(),
                    inline_text,
                    max_elements: config.max_dynamic_elements,
                    eager_limit: config.eager_array_limit,
                })
            }
            TypeKind::Pointer { target } => Traversal::Pointer(PointerTraversal {
                info,
                target: *target,
                width: schema.pointer_width(),
            }),
            TypeKind::FunctionPointer => Traversal::FunctionPointer(FunctionPointerTraversal {
                info,
                width: schema.pointer_width(),
            }),
            TypeKind::String => Traversal::String(StringTraversal {
                info,
                initial_size: config.string_initial_size.max(1),
                max_size: config.string_max_size.max(config.string_initial_size.max(1)),
            }),
            TypeKind::Enum { width, values } => Traversal::Enum(EnumTraversal {
                info,
                width: *width as usize,
                values: values.iter().cloned().collect(),
            }),
            TypeKind::Struct { members, size } => {
                let mut built = Vec::with_capacity(members.len());
                for member in members {
                    built.push(StructMember {
                        name: member.name.clone(),
                        offset: member.offset.map(|o| o as usize),
                        traversal: self.get(schema, member.ty, config)?,
                    });
                }
                Traversal::Struct(StructTraversal {
                    info,
                    members: built,
                    size: size.map(|s| s as usize),
                })
            }
            TypeKind::Union { members, size } => Traversal::Union(UnionTraversal {
                info,
                member_count: members.len(),
                size: *size as usize,
            }),
            TypeKind::Global { ty, address } => Traversal::Global(GlobalTraversal {
                info,
                inner: self.get(schema, *ty, config)?,
                address: *address,
            }),
            TypeKind::Namespace { children } => {
                let mut built = Vec::with_capacity(children.len());
                for (name, ty) in children {
                    built.push((name.clone(), self.get(schema, *ty, config)?));
                }
                Traversal::Namespace(NamespaceTraversal {
                    info,
                    children: built,
                })
            }
            TypeKind::Alias { target } => {
                check_alias_chain(schema, id)?;
                let target = self.get(schema, *target, config)?;
                Traversal::Alias(AliasTraversal::new(info, target))
            }
            TypeKind::GraphicsBuffer {
                width,
                height,
                bytes_per_pixel,
            } => Traversal::Graphics(GraphicsTraversal {
                info,
                width: *width,
                height: *height,
                bytes_per_pixel: *bytes_per_pixel,
            }),
            TypeKind::Placeholder => Traversal::Placeholder(PlaceholderTraversal { info }),
        })
    }

    /// Drop every memoized traversal (after a schema reload)
    pub fn clear(&mut self) {
        self.memo.clear();
        self.building.clear();
    }

    pub fn len(&self) -> usize {
        self.memo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }
}

/// Strip every alias layer off a built traversal
fn unaliased(mut traversal: &Traversal) -> &Traversal {
    while let Traversal::Alias(alias) = traversal {
        traversal = alias.target().as_ref();
    }
    traversal
}

/// Reject alias chains that loop back on themselves
fn check_alias_chain(schema: &Schema, start: TypeId) -> Result<(), TraversalError> {
    let mut seen = HashSet::new();
    let mut id = start;
    while let Some(desc) = schema.get(id) {
        let TypeKind::Alias { target } = desc.kind else {
            return Ok(());
        };
        if !seen.insert(id) {
            return Err(TraversalError::RecursiveType(desc.name.clone()));
        }
        id = target;
    }
    Err(TraversalError::UnknownType(id.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ArrayLen, Member, SchemaBuilder};

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn test_memoized_per_type() {
        let mut b = SchemaBuilder::new(8);
        let int = b.primitive(PrimitiveKind::I32);
        let root = b.add("root", TypeKind::Namespace { children: vec![] });
        let schema = b.build(root).unwrap();

        let mut registry = TraversalRegistry::default();
        let first = registry.get(&schema, int, &config()).unwrap();
        let second = registry.get(&schema, int, &config()).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.type_name(), "int32");
        assert_eq!(first.static_size(), 4);
    }

    #[test]
    fn test_recursive_through_pointer_is_fine() {
        let mut b = SchemaBuilder::new(8);
        let node = b.reserve();
        let next = b.add("node*", TypeKind::Pointer { target: node });
        let value = b.primitive(PrimitiveKind::I32);
        b.define(
            node,
            "node",
            TypeKind::Struct {
                members: vec![Member::new("value", value), Member::new("next", next)],
                size: None,
            },
        );
        let root = b.add("root", TypeKind::Namespace { children: vec![] });
        let schema = b.build(root).unwrap();

        let mut registry = TraversalRegistry::default();
        let t = registry.get(&schema, node, &config()).unwrap();
        assert_eq!(t.static_size(), 12);
    }

    #[test]
    fn test_by_value_recursion_rejected() {
        let mut b = SchemaBuilder::new(8);
        let s = b.reserve();
        b.define(
            s,
            "loop",
            TypeKind::Struct {
                members: vec![Member::new("me", s)],
                size: None,
            },
        );
        let root = b.add("root", TypeKind::Namespace { children: vec![] });
        let schema = b.build(root).unwrap();

        let mut registry = TraversalRegistry::default();
        assert_eq!(
            registry.get(&schema, s, &config()).unwrap_err(),
            TraversalError::RecursiveType("loop".into())
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_alias_cycle_rejected() {
        let mut b = SchemaBuilder::new(8);
        let a = b.reserve();
        let c = b.add("b", TypeKind::Alias { target: a });
        b.define(a, "a", TypeKind::Alias { target: c });
        let root = b.add("root", TypeKind::Namespace { children: vec![] });
        let schema = b.build(root).unwrap();

        let mut registry = TraversalRegistry::default();
        assert!(matches!(
            registry.get(&schema, a, &config()),
            Err(TraversalError::RecursiveType(_))
        ));
    }

    #[test]
    fn test_char_array_is_inline_text() {
        let mut b = SchemaBuilder::new(8);
        let ch = b.primitive(PrimitiveKind::Char);
        let byte = b.primitive(PrimitiveKind::U8);
        let name = b.add("char[8]", TypeKind::Array { element: ch, len: ArrayLen::Fixed(8) });
        let raw = b.add("uint8[8]", TypeKind::Array { element: byte, len: ArrayLen::Fixed(8) });
        let root = b.add("root", TypeKind::Namespace { children: vec![] });
        let schema = b.build(root).unwrap();

        let mut registry = TraversalRegistry::default();
        let name = registry.get(&schema, name, &config()).unwrap();
        let raw = registry.get(&schema, raw, &config()).unwrap();
        assert!(matches!(&*name, Traversal::Array(a) if a.inline_text));
        assert!(matches!(&*raw, Traversal::Array(a) if !a.inline_text));
    }

    #[test]
    fn test_char_alias_array_is_inline_text() {
        let mut b = SchemaBuilder::new(8);
        let ch = b.primitive(PrimitiveKind::Char);
        let tchar = b.add("tchar", TypeKind::Alias { target: ch });
        let wide = b.add("wchar", TypeKind::Alias { target: tchar });
        let name = b.add("tchar[8]", TypeKind::Array { element: wide, len: ArrayLen::Fixed(8) });
        let root = b.add("root", TypeKind::Namespace { children: vec![] });
        let schema = b.build(root).unwrap();

        let mut registry = TraversalRegistry::default();
        let name = registry.get(&schema, name, &config()).unwrap();
        assert!(matches!(&*name, Traversal::Array(a) if a.inline_text));
    }

    #[test]
    fn test_alias_size_known_when_built() {
        let mut b = SchemaBuilder::new(8);
        let int = b.primitive(PrimitiveKind::U32);
        let handle = b.add("handle_t", TypeKind::Alias { target: int });
        let root = b.add("root", TypeKind::Namespace { children: vec![] });
        let schema = b.build(root).unwrap();

        let mut registry = TraversalRegistry::default();
        let handle = registry.get(&schema, handle, &config()).unwrap();
        assert_eq!(handle.static_size(), 4);
        assert_eq!(handle.type_name(), "handle_t");
    }
}
