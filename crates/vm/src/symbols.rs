use std::collections::{BTreeMap, HashMap};

/// Function and object addresses from the program image.
///
/// Only used for diagnostics: backtraces, breakpoint names and the
/// `name+off` rendering of addresses.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    by_addr: BTreeMap<u32, String>,
    by_name: HashMap<String, u32>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, addr: u32, name: impl Into<String>) {
        let name = name.into();
        self.by_name.entry(name.clone()).or_insert(addr);
        self.by_addr.entry(addr).or_insert(name);
    }

    pub fn is_empty(&self) -> bool {
        self.by_addr.is_empty()
    }

    /// Symbols in address order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.by_addr.iter().map(|(addr, name)| (*addr, name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.by_addr.len()
    }

    pub fn address_of(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    /// Nearest symbol at or below `addr`, with the offset into it.
    pub fn lookup(&self, addr: u32) -> Option<(&str, u32)> {
        self.by_addr
            .range(..=addr)
            .next_back()
            .map(|(base, name)| (name.as_str(), addr - base))
    }

    /// Start address of the symbol containing `addr`.
    pub fn function_start(&self, addr: u32) -> Option<u32> {
        self.by_addr.range(..=addr).next_back().map(|(base, _)| *base)
    }

    /// `name+0xoff`, `name`, or the bare hex address.
    pub fn describe(&self, addr: u32) -> String {
        match self.lookup(addr) {
            Some((name, 0)) => name.to_string(),
            Some((name, off)) => format!("{}+0x{:x}", name, off),
            None => format!("0x{:08x}", addr),
        }
    }

    /// Name of the function containing `addr`, or `?`.
    pub fn function_name(&self, addr: u32) -> &str {
        self.lookup(addr).map(|(name, _)| name).unwrap_or("?")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_symbol_below() {
        let mut syms = SymbolTable::new();
        syms.insert(0x40_0100, "main");
        syms.insert(0x40_0200, "helper");
        assert_eq!(syms.lookup(0x40_0104), Some(("main", 4)));
        assert_eq!(syms.describe(0x40_0200), "helper");
        assert_eq!(syms.describe(0x40_0210), "helper+0x10");
        assert_eq!(syms.describe(0x40_0000), "0x00400000");
        assert_eq!(syms.address_of("helper"), Some(0x40_0200));
        assert_eq!(syms.function_name(0x10), "?");
    }
}
