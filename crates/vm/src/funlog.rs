use std::collections::BTreeSet;

use crate::symbols::SymbolTable;

/// Calls deeper than this are counted but not recorded.
pub const MAX_CALL_DEPTH: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Call {
    addr: u32,
    sp: u32,
}

/// Call/return tracking for the instrumented run loop.
///
/// Calls are recorded when control reaches the callee, one instruction
/// after the jump, so the delay slot has already run. Breakpoints are
/// function entry addresses; entering or returning into one reports a hit.
#[derive(Debug, Clone, Default)]
pub struct FunctionLog {
    calls: Vec<Call>,
    depth: usize,
    breakpoints: BTreeSet<u32>,
}

impl FunctionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every call and breakpoint, as exec does.
    pub fn clear(&mut self) {
        self.calls.clear();
        self.depth = 0;
        self.breakpoints.clear();
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn add_breakpoint(&mut self, addr: u32) {
        self.breakpoints.insert(addr);
    }

    /// Resolve each function name against `symbols`. Names that do not
    /// resolve are returned.
    pub fn set_breakpoints<'a, I>(&mut self, names: I, symbols: &SymbolTable) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut unknown = Vec::new();
        for name in names.into_iter().map(str::trim).filter(|n| !n.is_empty()) {
            match symbols.address_of(name) {
                Some(addr) => self.add_breakpoint(addr),
                None => unknown.push(name.to_string()),
            }
        }
        unknown
    }

    pub fn is_breakpoint(&self, addr: u32) -> bool {
        self.breakpoints.contains(&addr)
    }

    /// Record entry to `addr`. True when it is a breakpoint.
    pub fn call(&mut self, addr: u32, sp: u32) -> bool {
        if self.calls.len() < MAX_CALL_DEPTH {
            self.calls.push(Call { addr, sp });
        }
        self.depth += 1;
        self.is_breakpoint(addr)
    }

    /// Record a return. True when returning into a breakpoint function.
    ///
    /// A return with nothing recorded is ignored; handlers may longjmp out
    /// of the chain the log saw.
    pub fn ret(&mut self, _sp: u32) -> bool {
        if self.depth == 0 {
            return false;
        }
        if self.depth <= self.calls.len() {
            self.calls.pop();
        }
        self.depth -= 1;
        self.top_addr().map_or(false, |addr| self.is_breakpoint(addr))
    }

    fn top_addr(&self) -> Option<u32> {
        if self.depth == 0 || self.depth > self.calls.len() {
            return None;
        }
        self.calls.last().map(|c| c.addr)
    }

    /// Name of the function currently executing, as far as the log knows.
    pub fn top<'a>(&self, symbols: &'a SymbolTable) -> &'a str {
        self.top_addr()
            .map(|addr| symbols.function_name(addr))
            .unwrap_or("?")
    }

    /// `/main/f/g` style call chain.
    pub fn backtrace(&self, symbols: &SymbolTable) -> String {
        if self.calls.is_empty() {
            return "<no backtrace>".to_string();
        }
        let mut out = String::new();
        for call in &self.calls {
            out.push('/');
            out.push_str(symbols.function_name(call.addr));
        }
        if self.depth > self.calls.len() {
            out.push_str(&format!("/... ({} more)", self.depth - self.calls.len()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols() -> SymbolTable {
        let mut s = SymbolTable::new();
        s.insert(0x40_0000, "main");
        s.insert(0x40_0100, "f");
        s.insert(0x40_0200, "g");
        s
    }

    #[test]
    fn tracks_nested_calls() {
        let syms = symbols();
        let mut log = FunctionLog::new();
        log.call(0x40_0000, 0x1000);
        log.call(0x40_0100, 0x0ff0);
        log.call(0x40_0200, 0x0fe0);
        assert_eq!(log.backtrace(&syms), "/main/f/g");
        log.ret(0x0ff0);
        assert_eq!(log.top(&syms), "f");
        assert_eq!(log.depth(), 2);
    }

    #[test]
    fn breakpoints_fire_on_entry_and_return() {
        let syms = symbols();
        let mut log = FunctionLog::new();
        let unknown = log.set_breakpoints("f,nope".split(','), &syms);
        assert_eq!(unknown, vec!["nope".to_string()]);

        assert!(!log.call(0x40_0000, 0));
        assert!(log.call(0x40_0100, 0));
        assert!(!log.call(0x40_0200, 0));
        assert!(log.ret(0));
        assert!(!log.ret(0));
    }

    #[test]
    fn stray_return_is_ignored() {
        let mut log = FunctionLog::new();
        assert!(!log.ret(0));
        assert_eq!(log.depth(), 0);
        assert_eq!(log.backtrace(&SymbolTable::new()), "<no backtrace>");
    }

    #[test]
    fn overflow_is_counted() {
        let mut log = FunctionLog::new();
        for i in 0..MAX_CALL_DEPTH as u32 + 2 {
            log.call(i * 4, 0);
        }
        assert_eq!(log.depth(), MAX_CALL_DEPTH + 2);
        log.ret(0);
        log.ret(0);
        log.ret(0);
        assert_eq!(log.depth(), MAX_CALL_DEPTH - 1);
    }
}
