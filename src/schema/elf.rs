//! ELF schema provider
//!
//! Builds a schema straight from a binary's symbol tables using goblin:
//! - every sized data symbol (`STT_OBJECT`) becomes a global variable, typed
//!   as an unsigned integer when its size allows and as a byte array otherwise
//! - globals are grouped into one namespace per section (`.data`, `.bss`, ...)
//! - functions and data symbols both feed the address lookup table
//!
//! Without debug info there is no richer type information to recover; callers
//! refine individual globals with retype directives.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use goblin::elf::sym::{STT_FUNC, STT_OBJECT};
use goblin::elf::Elf;

use super::{ArrayLen, PrimitiveKind, Schema, SchemaBuilder, SchemaError, TypeId, TypeKind};
use crate::trace::Tracer;

/// Summary of what was pulled out of a binary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElfSummary {
    pub globals: usize,
    pub functions: usize,
    pub sections: usize,
    pub is_64bit: bool,
}

/// Load a schema from an ELF file on disk
pub fn load_file<P: AsRef<Path>>(path: P, load_bias: u64) -> Result<(Schema, ElfSummary), SchemaError> {
    let data = std::fs::read(path.as_ref()).map_err(|e| SchemaError::Binary(e.to_string()))?;
    from_bytes(&data, load_bias)
}

/// Build a schema from ELF bytes; `load_bias` is added to every address (PIE)
pub fn from_bytes(data: &[u8], load_bias: u64) -> Result<(Schema, ElfSummary), SchemaError> {
    let elf = Elf::parse(data).map_err(|e| SchemaError::Binary(e.to_string()))?;
    let pointer_width = if elf.is_64 { 8 } else { 4 };

    let mut builder = SchemaBuilder::new(pointer_width);
    let mut scalar_types: HashMap<PrimitiveKind, TypeId> = HashMap::new();
    let mut blob_types: HashMap<u64, TypeId> = HashMap::new();
    let mut byte_type: Option<TypeId> = None;
    // section name -> (global name -> type)
    let mut sections: BTreeMap<String, BTreeMap<String, TypeId>> = BTreeMap::new();
    let mut summary = ElfSummary {
        is_64bit: elf.is_64,
        ..Default::default()
    };

    let tables = [(&elf.syms, &elf.strtab), (&elf.dynsyms, &elf.dynstrtab)];
    for (syms, strtab) in tables {
        for sym in syms.iter() {
            if sym.st_value == 0 {
                continue;
            }
            let name = strtab.get_at(sym.st_name).unwrap_or("");
            if name.is_empty() {
                continue;
            }
            let address = sym.st_value.wrapping_add(load_bias);

            match sym.st_type() {
                STT_FUNC => {
                    builder.symbols_mut().insert(name, address, sym.st_size);
                    summary.functions += 1;
                }
                STT_OBJECT if sym.st_size > 0 => {
                    builder.symbols_mut().insert(name, address, sym.st_size);

                    let section = elf
                        .section_headers
                        .get(sym.st_shndx)
                        .and_then(|sh| elf.shdr_strtab.get_at(sh.sh_name))
                        .filter(|s| !s.is_empty())
                        .unwrap_or("[unknown]")
                        .to_string();
                    let globals = sections.entry(section).or_default();
                    if globals.contains_key(name) {
                        Tracer::SCHEMA.trace(format_args!("duplicate global {} skipped", name));
                        continue;
                    }

                    let value_type = match PrimitiveKind::unsigned_of_size(sym.st_size) {
                        Some(kind) => *scalar_types
                            .entry(kind)
                            .or_insert_with(|| builder.primitive(kind)),
                        None => {
                            let Ok(len) = u32::try_from(sym.st_size) else {
                                Tracer::SCHEMA.debug(format_args!(
                                    "{}: {} bytes is too large to watch",
                                    name, sym.st_size
                                ));
                                continue;
                            };
                            let byte = *byte_type
                                .get_or_insert_with(|| builder.primitive(PrimitiveKind::U8));
                            *blob_types.entry(sym.st_size).or_insert_with(|| {
                                builder.add(
                                    format!("uint8[{}]", sym.st_size),
                                    TypeKind::Array {
                                        element: byte,
                                        len: ArrayLen::Fixed(len),
                                    },
                                )
                            })
                        }
                    };
                    let global = builder.add(
                        name,
                        TypeKind::Global {
                            ty: value_type,
                            address,
                        },
                    );
                    globals.insert(name.to_string(), global);
                    summary.globals += 1;
                }
                _ => {}
            }
        }
    }

    let mut root_children = Vec::with_capacity(sections.len());
    for (section, globals) in sections {
        let namespace = builder.add(
            section.clone(),
            TypeKind::Namespace {
                children: globals.into_iter().collect(),
            },
        );
        root_children.push((section, namespace));
    }
    summary.sections = root_children.len();

    let root = builder.add(
        "root",
        TypeKind::Namespace {
            children: root_children,
        },
    );
    let schema = builder.build(root)?;
    Tracer::SCHEMA.debug(format_args!("{:?}", summary));
    Ok((schema, summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_elf() {
        assert!(matches!(
            from_bytes(b"MZ\x90\x00 not an elf", 0),
            Err(SchemaError::Binary(_))
        ));
    }

    #[test]
    fn test_parse_self() {
        // Parse the test executable itself
        let exe_path = std::env::current_exe().unwrap();
        match load_file(&exe_path, 0) {
            Ok((schema, summary)) => {
                println!("{:?}", summary);
                assert!(matches!(
                    schema.get(schema.root()).map(|t| &t.kind),
                    Some(TypeKind::Namespace { .. })
                ));
                assert_eq!(schema.pointer_width(), if summary.is_64bit { 8 } else { 4 });
            }
            Err(e) => println!("Could not parse self: {}", e),
        }
    }
}
