//! Address to symbol lookup

/// A named address range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub address: u64,
    /// Size in bytes (0 if unknown)
    pub size: u64,
}

/// Symbols sorted by address for range lookups
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    sorted: bool,
}

impl SymbolTable {
    pub fn insert(&mut self, name: impl Into<String>, address: u64, size: u64) {
        self.symbols.push(Symbol {
            name: name.into(),
            address,
            size,
        });
        self.sorted = false;
    }

    /// Sort and drop duplicate addresses; called when the schema is built
    pub fn finish(&mut self) {
        self.symbols.sort_by_key(|s| s.address);
        self.symbols.dedup_by_key(|s| s.address);
        self.sorted = true;
    }

    /// Symbol containing `address`; unsized symbols only match exactly
    pub fn lookup(&self, address: u64) -> Option<&Symbol> {
        if !self.sorted {
            return self.symbols.iter().find(|s| contains(s, address));
        }
        let index = self.symbols.partition_point(|s| s.address <= address);
        let candidate = self.symbols.get(index.checked_sub(1)?)?;
        contains(candidate, address).then_some(candidate)
    }

    /// `name` or `name+0x<offset>`
    pub fn describe(&self, address: u64) -> Option<String> {
        let symbol = self.lookup(address)?;
        let offset = address - symbol.address;
        Some(if offset == 0 {
            symbol.name.clone()
        } else {
            format!("{}+{:#x}", symbol.name, offset)
        })
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

fn contains(symbol: &Symbol, address: u64) -> bool {
    if symbol.size == 0 {
        address == symbol.address
    } else {
        address >= symbol.address && address < symbol.address + symbol.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_describe() {
        let mut table = SymbolTable::default();
        table.insert("update", 0x4000, 0x40);
        table.insert("main", 0x1000, 0x100);
        table.insert("_start", 0x900, 0);
        table.finish();

        assert_eq!(table.describe(0x1000).as_deref(), Some("main"));
        assert_eq!(table.describe(0x1010).as_deref(), Some("main+0x10"));
        assert_eq!(table.describe(0x900).as_deref(), Some("_start"));
        assert_eq!(table.describe(0x901), None);
        assert_eq!(table.describe(0x1100), None);
        assert_eq!(table.lookup(0x403f).map(|s| s.name.as_str()), Some("update"));
    }
}
