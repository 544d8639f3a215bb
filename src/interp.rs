//! # Circuit language interpreter
//!
//! Reads a line-oriented circuit description and wires it into a
//! [`Netlist`].
//!
//! ```text
//! # half adder
//! IN a /1
//! IN b /1
//! OUT sum = a XOR b
//! OUT carry = a AND b
//! ```
//!
//! ## Statements
//!
//! - `BLOCK name` … `END` groups lines, without scoping.
//! - `name /N` reserves an N-bit bus of unbound slots.
//! - `IN name /N` allocates N externally driven gates.
//! - `OUT name = expr` binds `name` and exposes it as a port.
//! - `name.i = expr` binds one reserved slot to a 1-bit result.
//! - `name = expr` binds or rebinds `name`.
//! - `name = LOOP(N) src` … `END` unrolls the body N times with `i` bound
//!   to the iteration; each pass computes `name` from the current `src`,
//!   then `src` takes that value.
//! - `name = SELECT(sel)` … `END` multiplexes 2^width(sel) branch lines.
//!
//! ## Expressions
//!
//! Bus references (`a`, `a.3`, `a.1..4`, with indices given as literals or
//! loop constants), lists `[a, b.0]`, constants `ONE`, `ZERO` and `CLOCK`
//! with an optional width `ONE(4)`, and the operators `AND OR XOR NAND NOR
//! LATCH` (binary) and `NOT` (prefix). Binary operators share one precedence
//! and associate left. An operator directly followed by a list reduces the
//! whole list: `XOR [a, b]`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info, trace};

use crate::bus::Bus;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::expr::Expression;
use crate::netlist::{Netlist, Opcode};
use crate::node::LogicNode;

const LOOP_COUNTER: &str = "i";

#[derive(Debug, Clone)]
struct SourceLine {
    number: usize,
    text: String,
}

/// Cursor over one line of source.
struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        let mut sc = Scanner { text, pos: 0 };
        sc.skip_whitespace();
        sc
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn at_end(&self) -> bool {
        self.rest().is_empty()
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let n = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        self.pos += n;
        self.skip_whitespace();
        &rest[..n]
    }

    /// Run of alphanumerics and underscores, possibly empty.
    fn word(&mut self) -> &'a str {
        self.take_while(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    fn number(&mut self) -> Option<usize> {
        self.take_while(|c| c.is_ascii_digit()).parse().ok()
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            self.skip_whitespace();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(Error::syntax(format!("`{token}`"), self.found()))
        }
    }

    fn found(&self) -> String {
        if self.at_end() {
            "end of line".to_string()
        } else {
            self.rest().to_string()
        }
    }

    fn finish(&self) -> Result<()> {
        if self.at_end() {
            Ok(())
        } else {
            Err(Error::syntax("end of line", self.found()))
        }
    }
}

fn is_end(text: &str) -> bool {
    let mut sc = Scanner::new(text);
    if sc.word() != "END" {
        return false;
    }
    sc.word();
    sc.at_end()
}

/// Whether the line starts a construct closed by its own `END`.
fn opens_block(text: &str) -> bool {
    if Scanner::new(text).word() == "BLOCK" {
        return true;
    }
    let rhs = text.split_once('=').map_or(text, |(_, rhs)| rhs);
    let mut sc = Scanner::new(rhs);
    matches!(sc.word(), "LOOP" | "SELECT") && sc.peek() == Some('(')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    Plain,
    Input,
    Output,
}

pub struct Interpreter {
    lines: Vec<SourceLine>,
    pos: usize,
    netlist: Netlist,
    buses: HashMap<String, Bus>,
    constants: HashMap<String, usize>,
}

impl Interpreter {
    pub fn new(source: &str, config: Config) -> Self {
        let lines = source
            .lines()
            .enumerate()
            .map(|(i, l)| SourceLine {
                number: i + 1,
                text: l.trim().to_string(),
            })
            .filter(|l| !l.text.is_empty() && !l.text.starts_with('#'))
            .collect();
        Interpreter {
            lines,
            pos: 0,
            netlist: Netlist::with_config(&config),
            buses: HashMap::new(),
            constants: HashMap::new(),
        }
    }

    pub fn from_path(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let source = fs::read_to_string(path)?;
        Ok(Self::new(&source, config))
    }

    pub fn netlist(&self) -> &Netlist {
        &self.netlist
    }

    pub fn netlist_mut(&mut self) -> &mut Netlist {
        &mut self.netlist
    }

    pub fn into_netlist(self) -> Netlist {
        self.netlist
    }

    pub fn bus(&self, name: &str) -> Option<&Bus> {
        self.buses.get(name)
    }

    pub fn constant(&self, name: &str) -> Option<usize> {
        self.constants.get(name).copied()
    }

    /// Wire the whole script into the netlist.
    pub fn build(&mut self) -> Result<()> {
        while self.pos < self.lines.len() {
            let line = self.next_line()?;
            self.parse_line(&line)?;
        }
        let stats = self.netlist.stats();
        info!(
            gates = stats.gates,
            max_depth = stats.max_depth,
            max_usage = stats.max_usage,
            "netlist built"
        );
        Ok(())
    }

    /// Build, settle one tick and return the port and gate dumps.
    pub fn parse(&mut self) -> Result<String> {
        self.build()?;
        self.netlist.tick();
        let dump = format!(
            "{}{}",
            self.netlist.dump_ports(),
            self.netlist.dump_gates()
        );
        debug!("{}", dump);
        Ok(dump)
    }

    fn next_line(&mut self) -> Result<SourceLine> {
        let line = self
            .lines
            .get(self.pos)
            .cloned()
            .ok_or(Error::UnexpectedEndOfInput)?;
        self.pos += 1;
        Ok(line)
    }

    /// Index of the `END` closing the construct whose body starts at `start`.
    fn find_block_end(&self, start: usize) -> Result<usize> {
        let mut depth = 0usize;
        for (idx, line) in self.lines.iter().enumerate().skip(start) {
            if is_end(&line.text) {
                if depth == 0 {
                    return Ok(idx);
                }
                depth -= 1;
            } else if opens_block(&line.text) {
                depth += 1;
            }
        }
        Err(Error::UnexpectedEndOfInput)
    }

    fn run_lines(&mut self, start: usize, end: usize) -> Result<()> {
        let resume = self.pos;
        self.pos = start;
        while self.pos < end {
            let line = self.next_line()?;
            self.parse_line(&line)?;
        }
        self.pos = resume;
        Ok(())
    }

    fn parse_line(&mut self, line: &SourceLine) -> Result<()> {
        trace!(line = line.number, "{}", line.text);
        self.parse_statement(&line.text)
            .map_err(|e| e.at_line(line.number))
    }

    fn parse_block(&mut self) -> Result<()> {
        loop {
            let line = self.next_line()?;
            if is_end(&line.text) {
                return Ok(());
            }
            self.parse_line(&line)?;
        }
    }

    fn parse_statement(&mut self, text: &str) -> Result<()> {
        let mut sc = Scanner::new(text);
        let mut name = sc.word();
        let binding = match name {
            "BLOCK" => {
                let label = sc.word();
                sc.finish()?;
                debug!(block = label, "enter block");
                return self.parse_block();
            }
            "IN" => Binding::Input,
            "OUT" => Binding::Output,
            _ => Binding::Plain,
        };
        if binding != Binding::Plain {
            name = sc.word();
        }
        if name.is_empty() {
            return Err(Error::syntax("bus name", sc.found()));
        }

        if sc.eat("/") {
            let width = sc
                .number()
                .ok_or_else(|| Error::syntax("bus width", sc.found()))?;
            sc.finish()?;
            let bus = match binding {
                Binding::Input => self.netlist.add_input(name, width)?,
                Binding::Plain => {
                    self.check_width(width)?;
                    Bus::unbound(width)
                }
                Binding::Output => return Err(Error::syntax("`=`", "/")),
            };
            self.buses.insert(name.to_string(), bus);
            return Ok(());
        }
        if binding == Binding::Input {
            return Err(Error::syntax("`/` and a width", sc.found()));
        }

        let slot = if binding == Binding::Plain && sc.eat(".") {
            let width = self
                .buses
                .get(name)
                .map(Bus::len)
                .ok_or_else(|| Error::UndefinedSymbol(name.to_string()))?;
            let index = self.read_number(&mut sc)?;
            if index >= width {
                return Err(Error::IndexOutOfRange { index, width });
            }
            Some(index)
        } else {
            None
        };

        sc.expect("=")?;
        let value = self.parse_expression(&mut sc, name)?;
        sc.finish()?;
        if value.is_empty() {
            return Err(Error::MalformedExpression(format!(
                "`{name}` has zero width"
            )));
        }

        match slot {
            Some(index) => {
                if value.len() != 1 {
                    return Err(Error::LengthMismatch {
                        left: 1,
                        right: value.len(),
                    });
                }
                let gate = value.gate(0)?;
                self.buses
                    .get_mut(name)
                    .ok_or_else(|| Error::UndefinedSymbol(name.to_string()))?
                    .bind(index, gate)?;
            }
            None => {
                if binding == Binding::Output {
                    self.netlist.register_port(name, value.clone());
                }
                self.buses.insert(name.to_string(), value);
            }
        }
        Ok(())
    }

    /// Right-hand side of an assignment. `target` names the bus being
    /// assigned, which `LOOP` accumulates into.
    fn parse_expression(&mut self, sc: &mut Scanner<'_>, target: &str) -> Result<Bus> {
        let mut probe = Scanner {
            text: sc.text,
            pos: sc.pos,
        };
        match probe.word() {
            "LOOP" => {
                sc.word();
                return self.parse_loop(sc, target);
            }
            "SELECT" => {
                sc.word();
                return self.parse_select(sc);
            }
            _ => {}
        }

        let mut expr = Expression::new();
        loop {
            if sc.peek() == Some('[') {
                let list = self.read_list(sc)?;
                expr.add_operand(LogicNode::Resolved(list))?;
                continue;
            }
            let word = sc.word();
            if word.is_empty() {
                break;
            }
            let constant = match word {
                "ONE" => Some(Opcode::One),
                "ZERO" => Some(Opcode::Zero),
                "CLOCK" => Some(Opcode::Clock),
                _ => None,
            };
            if let Some(op) = constant {
                let bus = self.constant_source(sc, op)?;
                expr.add_operand(LogicNode::Resolved(bus))?;
                continue;
            }
            match Opcode::from_keyword(word) {
                Some(op) if sc.peek() == Some('[') => {
                    let list = self.read_list(sc)?;
                    let gate = self.netlist.reduce(op, &list)?;
                    expr.add_operand(LogicNode::Resolved(Bus::single(gate)))?;
                }
                Some(op) => expr.add_operator(LogicNode::Operator(op), &mut self.netlist)?,
                None => {
                    let bus = self.read_bus_ref(word, sc)?;
                    expr.add_operand(LogicNode::Resolved(bus))?;
                }
            }
        }
        expr.compile(&mut self.netlist)?.into_bus()
    }

    /// `ONE`, `ZERO` or `CLOCK`, optionally fanned out to a width: `ONE(8)`.
    fn constant_source(&mut self, sc: &mut Scanner<'_>, op: Opcode) -> Result<Bus> {
        let width = if sc.eat("(") {
            let width = self.read_number(sc)?;
            sc.expect(")")?;
            Some(width)
        } else {
            None
        };
        if let Some(width) = width {
            self.check_width(width)?;
        }
        let gate = self.netlist.allocate(op, None, None)?;
        Ok(match width {
            Some(width) => Bus::Slots(vec![Some(gate); width]),
            None => Bus::single(gate),
        })
    }

    /// No bus can be wider than the netlist holds gates.
    fn check_width(&self, width: usize) -> Result<()> {
        let capacity = self.netlist.capacity();
        if width > capacity {
            return Err(Error::CapacityExceeded { capacity });
        }
        Ok(())
    }

    /// `[a, b.2, c.0..3]`, concatenated in order.
    fn read_list(&self, sc: &mut Scanner<'_>) -> Result<Bus> {
        sc.expect("[")?;
        let mut bus = Bus::Slots(Vec::new());
        if sc.eat("]") {
            return Ok(bus);
        }
        loop {
            let word = sc.word();
            if word.is_empty() {
                return Err(Error::syntax("bus name", sc.found()));
            }
            let part = self.read_bus_ref(word, sc)?;
            self.check_width(bus.len() + part.len())?;
            bus = bus.concat(&part);
            if sc.eat("]") {
                return Ok(bus);
            }
            sc.expect(",")?;
        }
    }

    /// `name`, `name.i` or `name.i..j`.
    fn read_bus_ref(&self, name: &str, sc: &mut Scanner<'_>) -> Result<Bus> {
        let bus = self
            .buses
            .get(name)
            .ok_or_else(|| Error::UndefinedSymbol(name.to_string()))?;
        if !sc.eat(".") {
            return Ok(bus.clone());
        }
        let from = self.read_number(sc)?;
        let to = if sc.eat("..") {
            self.read_number(sc)?
        } else {
            from
        };
        bus.slice(from, to)
    }

    /// Digit literal or a loop constant.
    fn read_number(&self, sc: &mut Scanner<'_>) -> Result<usize> {
        if sc.peek().map_or(false, |c| c.is_ascii_digit()) {
            return sc
                .number()
                .ok_or_else(|| Error::syntax("number", sc.found()));
        }
        let word = sc.word();
        if word.is_empty() {
            return Err(Error::syntax("number", sc.found()));
        }
        self.constants
            .get(word)
            .copied()
            .ok_or_else(|| Error::UndefinedSymbol(word.to_string()))
    }

    fn parse_loop(&mut self, sc: &mut Scanner<'_>, target: &str) -> Result<Bus> {
        sc.expect("(")?;
        let count = self.read_number(sc)?;
        sc.expect(")")?;
        let src = sc.word();
        if src.is_empty() {
            return Err(Error::syntax("loop source bus", sc.found()));
        }
        sc.finish()?;
        if target.is_empty() {
            return Err(Error::syntax("assignment target", "LOOP"));
        }

        let start = self.pos;
        let end = self.find_block_end(start)?;
        self.pos = end + 1;

        let backup = self
            .buses
            .get(src)
            .cloned()
            .ok_or_else(|| Error::UndefinedSymbol(src.to_string()))?;
        let outer = self.constants.get(LOOP_COUNTER).copied();
        for i in 0..count {
            self.buses
                .insert(target.to_string(), Bus::unbound(backup.len()));
            self.constants.insert(LOOP_COUNTER.to_string(), i);
            self.run_lines(start, end)?;
            let next = self
                .buses
                .get(target)
                .cloned()
                .ok_or_else(|| Error::UndefinedSymbol(target.to_string()))?;
            self.buses.insert(src.to_string(), next);
        }
        let result = self
            .buses
            .get(target)
            .cloned()
            .ok_or_else(|| Error::UndefinedSymbol(target.to_string()))?;

        self.buses.insert(src.to_string(), backup);
        match outer {
            Some(value) => self.constants.insert(LOOP_COUNTER.to_string(), value),
            None => self.constants.remove(LOOP_COUNTER),
        };
        debug!(count, src, bus = target, width = result.len(), "loop unrolled");
        Ok(result)
    }

    fn parse_select(&mut self, sc: &mut Scanner<'_>) -> Result<Bus> {
        sc.expect("(")?;
        let name = sc.word();
        if name.is_empty() {
            return Err(Error::syntax("selector bus", sc.found()));
        }
        let selector = self.read_bus_ref(name, sc)?;
        sc.expect(")")?;
        sc.finish()?;

        let mut branches = Vec::new();
        loop {
            let line = self.next_line()?;
            if is_end(&line.text) {
                break;
            }
            let branch = self
                .parse_branch(&line.text)
                .map_err(|e| e.at_line(line.number))?;
            branches.push(branch);
        }

        let width = selector.len();
        let expected = u32::try_from(width)
            .ok()
            .filter(|_| width > 0)
            .and_then(|w| 1usize.checked_shl(w));
        if expected != Some(branches.len()) {
            return Err(Error::UnsupportedBranchCount {
                selector: width,
                expected: expected.unwrap_or(0),
                got: branches.len(),
            });
        }

        let count = branches.len();
        for bit in 0..width {
            let sel = selector.gate(bit)?;
            let mut next = Vec::with_capacity(branches.len() / 2);
            for pair in branches.chunks(2) {
                if pair[0] == pair[1] {
                    next.push(pair[0].clone());
                } else {
                    next.push(self.netlist.select(sel, &pair[0], &pair[1])?);
                }
            }
            branches = next;
        }
        let out = branches
            .pop()
            .ok_or_else(|| Error::MalformedExpression("SELECT without branches".into()))?;
        debug!(branches = count, width = out.len(), "select tree");
        Ok(out)
    }

    fn parse_branch(&mut self, text: &str) -> Result<Bus> {
        let mut sc = Scanner::new(text);
        let bus = self.parse_expression(&mut sc, "")?;
        sc.finish()?;
        Ok(bus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlist::GateId;
    use std::io::Write;

    fn build(source: &str) -> Interpreter {
        let mut it = Interpreter::new(source, Config::default());
        it.build().unwrap();
        it
    }

    fn build_err(source: &str) -> Error {
        let mut it = Interpreter::new(source, Config::default());
        it.build().unwrap_err()
    }

    fn drive(it: &mut Interpreter, name: &str, value: u64) {
        let bus = it.bus(name).unwrap().clone();
        it.netlist_mut().write_bus(&bus, value);
    }

    fn sample(it: &mut Interpreter, name: &str) -> u64 {
        it.netlist_mut().tick();
        let bus = it.bus(name).unwrap().clone();
        it.netlist().read_bus(&bus)
    }

    #[test]
    fn and_gate_end_to_end() {
        let mut it = build("IN a /1\nIN b /1\nOUT r = a AND b\n");
        let net = it.netlist();
        assert_eq!(net.len(), 3);
        assert_eq!(net.gate(0).unwrap().opcode, Opcode::Passthrough);
        assert_eq!(net.gate(1).unwrap().opcode, Opcode::Passthrough);
        let and = net.gate(2).unwrap();
        assert_eq!(and.opcode, Opcode::And);
        assert_eq!((and.in1, and.in2), (Some(0), Some(1)));
        assert!(net.port("r").is_some());

        for (a, b) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
            drive(&mut it, "a", a);
            drive(&mut it, "b", b);
            assert_eq!(sample(&mut it, "r"), a & b, "a={a} b={b}");
        }
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let it = build("# header\n\n   \nIN a /2\n  # indented comment\nOUT n = NOT a\n");
        assert_eq!(it.netlist().len(), 4);
    }

    #[test]
    fn binary_operators_share_precedence() {
        let mut it = build("IN a /1\nIN b /1\nIN c /1\nOUT r = a OR b AND c\n");
        drive(&mut it, "a", 1);
        drive(&mut it, "b", 0);
        drive(&mut it, "c", 0);
        // (a OR b) AND c, not a OR (b AND c)
        assert_eq!(sample(&mut it, "r"), 0);
    }

    #[test]
    fn select_two_way() {
        let src = "IN s /1\nIN a /1\nIN b /1\nx = SELECT(s)\na\nb\nEND\n";
        let mut it = build(src);
        drive(&mut it, "a", 1);
        drive(&mut it, "b", 0);
        drive(&mut it, "s", 0);
        assert_eq!(sample(&mut it, "x"), 1);
        drive(&mut it, "s", 1);
        assert_eq!(sample(&mut it, "x"), 0);
        drive(&mut it, "b", 1);
        assert_eq!(sample(&mut it, "x"), 1);
    }

    #[test]
    fn select_four_way_uses_low_bit_first() {
        let src = "IN s /2\nIN d /4\nOUT x = SELECT(s)\n d.0\n d.1\n d.2\n d.3\nEND\n";
        let mut it = build(src);
        for sel in 0..4u64 {
            for data in 0..16u64 {
                drive(&mut it, "s", sel);
                drive(&mut it, "d", data);
                assert_eq!(sample(&mut it, "x"), (data >> sel) & 1, "s={sel} d={data:04b}");
            }
        }
    }

    #[test]
    fn select_collapses_equal_branches() {
        let it = build("IN s /1\nIN a /3\nx = SELECT(s)\na\na\nEND\n");
        assert_eq!(it.netlist().len(), 4);
        assert_eq!(it.bus("x"), it.bus("a"));
    }

    #[test]
    fn select_branch_count_must_match() {
        let err = build_err("IN s /2\nIN a /1\nx = SELECT(s)\na\na\nEND\n");
        assert!(matches!(
            err.root(),
            Error::UnsupportedBranchCount { selector: 2, expected: 4, got: 2 }
        ));
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn loop_rebinds_source_each_pass() {
        let src = "IN a /4\nacc = LOOP(3) a\nacc = NOT a\nEND\n";
        let mut it = build(src);
        assert_eq!(it.netlist().len(), 4 + 12);
        assert_eq!(it.bus("a"), it.netlist().port("a"));
        assert_eq!(it.constant("i"), None);
        drive(&mut it, "a", 0b0101);
        assert_eq!(sample(&mut it, "acc"), 0b1010);
    }

    #[test]
    fn loop_rotation_allocates_nothing() {
        let it = build("IN a /4\nr = LOOP(4) a\nr = [a.1..3, a.0]\nEND\n");
        assert_eq!(it.netlist().len(), 4);
        assert_eq!(it.bus("r"), it.bus("a"));
    }

    #[test]
    fn loop_counter_indexes_bits() {
        let src = "IN a /1\nIN b /4\nr = LOOP(4) a\n  r = a AND b.i\nEND r\n";
        let mut it = build(src);
        assert_eq!(it.netlist().len(), 5 + 4);
        drive(&mut it, "a", 1);
        drive(&mut it, "b", 0b1111);
        assert_eq!(sample(&mut it, "r"), 1);
        drive(&mut it, "b", 0b1011);
        assert_eq!(sample(&mut it, "r"), 0);
    }

    #[test]
    fn nested_loops_restore_counter() {
        let src = "\
IN a /1
IN b /4
r = LOOP(2) a
  q = LOOP(1) a
    q = a AND b.i
  END
  r = q OR b.i
END
";
        let mut it = build(src);
        for (data, expected) in [(0b0010, 1), (0b0100, 0), (0b0001, 1), (0b0011, 1)] {
            drive(&mut it, "a", 0);
            drive(&mut it, "b", data);
            assert_eq!(sample(&mut it, "r"), expected, "b={data:04b}");
        }
        assert_eq!(it.constant("i"), None);
    }

    #[test]
    fn loop_without_end_fails() {
        let err = build_err("IN a /1\nr = LOOP(2) a\nr = NOT a\n");
        assert!(matches!(err.root(), Error::UnexpectedEndOfInput));
    }

    #[test]
    fn oversized_widths_exceed_capacity() {
        let reserved = build_err("x /100000000000000000\n");
        assert!(matches!(reserved.root(), Error::CapacityExceeded { capacity: 5000 }));
        assert_eq!(reserved.line(), Some(1));

        let constant = build_err("k = ONE(100000000000000000)\n");
        assert!(matches!(constant.root(), Error::CapacityExceeded { capacity: 5000 }));

        let doubled = build_err("IN a /1\nr = LOOP(20) a\nr = [a, a]\nEND\n");
        assert!(matches!(doubled.root(), Error::CapacityExceeded { .. }));
    }

    #[test]
    fn block_and_select_without_end_fail() {
        let block = build_err("BLOCK x\nIN a /1\n");
        assert!(matches!(block.root(), Error::UnexpectedEndOfInput));

        let select = build_err("IN s /1\nx = SELECT(s)\ns\n");
        assert!(matches!(select.root(), Error::UnexpectedEndOfInput));
        assert_eq!(select.line(), Some(2));
    }

    #[test]
    fn empty_loop_keeps_existing_target() {
        let it = build("IN a /2\nr = NOT a\nr = LOOP(0) a\nr = ONE\nEND\n");
        assert_eq!(it.netlist().len(), 4);
        assert_eq!(it.bus("r"), Some(&Bus::range(2, 2)));
        assert_eq!(it.constant("i"), None);

        let err = build_err("IN a /2\nq = LOOP(0) a\nq = NOT a\nEND\n");
        assert!(matches!(err.root(), Error::UndefinedSymbol(n) if n == "q"));
    }

    #[test]
    fn blocks_group_lines() {
        let mut it = build("BLOCK io\nIN a /2\nEND\nOUT y = NOT a\n");
        drive(&mut it, "a", 0b01);
        assert_eq!(sample(&mut it, "y"), 0b10);
    }

    #[test]
    fn slot_binding() {
        let src = "IN a /2\nc /2\nc.0 = a.1\nc.1 = a.0\nOUT r = c\n";
        let mut it = build(src);
        assert_eq!(it.netlist().len(), 2);
        drive(&mut it, "a", 0b01);
        assert_eq!(sample(&mut it, "r"), 0b10);
    }

    #[test]
    fn slot_binding_errors() {
        let twice = build_err("IN a /2\nc /2\nc.0 = a.1\nc.0 = a.0\n");
        assert!(matches!(twice.root(), Error::AlreadyBound { slot: 0 }));
        assert_eq!(twice.line(), Some(4));

        let wide = build_err("IN a /2\nc /2\nc.0 = a\n");
        assert!(matches!(wide.root(), Error::LengthMismatch { left: 1, right: 2 }));

        let outside = build_err("IN a /2\nc /2\nc.2 = a.0\n");
        assert!(matches!(outside.root(), Error::IndexOutOfRange { index: 2, width: 2 }));
    }

    #[test]
    fn unbound_slot_cannot_be_used() {
        let err = build_err("c /2\nc.0 = ZERO\nOUT r = NOT c\n");
        assert!(matches!(err.root(), Error::UnboundSlot { slot: 1 }));
    }

    #[test]
    fn reductions_and_lists() {
        let src = "IN v /4\nOUT p = XOR [v]\nOUT m = AND [v.0..1, v.3]\nOUT w = [v.3, v.0]\n";
        let mut it = build(src);
        assert_eq!(it.bus("w").unwrap().len(), 2);
        drive(&mut it, "v", 0b1011);
        assert_eq!(sample(&mut it, "p"), 1);
        assert_eq!(sample(&mut it, "m"), 1);
        assert_eq!(sample(&mut it, "w"), 0b11);
        drive(&mut it, "v", 0b0011);
        assert_eq!(sample(&mut it, "p"), 0);
        assert_eq!(sample(&mut it, "m"), 0);
        assert_eq!(sample(&mut it, "w"), 0b10);
    }

    #[test]
    fn reduction_is_an_operand() {
        let mut it = build("IN v /3\nIN e /1\nOUT r = NOT OR [v] AND e\n");
        drive(&mut it, "e", 1);
        assert_eq!(sample(&mut it, "r"), 1);
        drive(&mut it, "v", 0b100);
        assert_eq!(sample(&mut it, "r"), 0);
    }

    #[test]
    fn constants_fan_out() {
        let mut it = build("OUT k = ONE(3)\nOUT z = ZERO\nIN a /3\nOUT m = a AND ONE\n");
        assert_eq!(it.bus("k").unwrap().len(), 3);
        assert_eq!(sample(&mut it, "k"), 0b111);
        assert_eq!(sample(&mut it, "z"), 0);
        drive(&mut it, "a", 0b110);
        assert_eq!(sample(&mut it, "m"), 0b110);
    }

    #[test]
    fn clock_and_latch() {
        let mut it = build("c = CLOCK\nIN r /1\nIN s /1\nOUT q = r LATCH s\n");
        assert_eq!(sample(&mut it, "c"), 1);
        assert_eq!(sample(&mut it, "c"), 0);
        drive(&mut it, "s", 1);
        assert_eq!(sample(&mut it, "q"), 1);
        drive(&mut it, "s", 0);
        assert_eq!(sample(&mut it, "q"), 1);
        drive(&mut it, "r", 1);
        assert_eq!(sample(&mut it, "q"), 0);
    }

    #[test]
    fn undefined_names() {
        let bus = build_err("IN a /1\nOUT r = a AND nope\n");
        assert!(matches!(bus.root(), Error::UndefinedSymbol(n) if n == "nope"));
        assert_eq!(bus.line(), Some(2));

        let constant = build_err("IN a /4\nOUT r = a.j\n");
        assert!(matches!(constant.root(), Error::UndefinedSymbol(n) if n == "j"));
    }

    #[test]
    fn syntax_errors() {
        let trailing = build_err("IN a /1\nOUT r = a ) \n");
        assert!(matches!(trailing.root(), Error::ParseSyntaxError { .. }));

        let missing_eq = build_err("IN a /1\nr a\n");
        assert!(matches!(missing_eq.root(), Error::ParseSyntaxError { .. }));

        let bad_input = build_err("IN a = ONE\n");
        assert!(matches!(bad_input.root(), Error::ParseSyntaxError { .. }));

        let dangling = build_err("IN a /1\nOUT r = a AND\n");
        assert!(matches!(dangling.root(), Error::UnexpectedTokenSequence { .. }));

        let empty = build_err("r =\n");
        assert!(matches!(empty.root(), Error::MalformedExpression(_)));
    }

    #[test]
    fn capacity_is_enforced() {
        let mut it = Interpreter::new(
            "IN a /4\nOUT r = NOT a\n",
            Config {
                capacity: 6,
                seed: 0,
            },
        );
        let err = it.build().unwrap_err();
        assert!(matches!(err.root(), Error::CapacityExceeded { capacity: 6 }));
    }

    #[test]
    fn parse_ticks_and_dumps() {
        let mut it = Interpreter::new("OUT k = ONE(2)\nOUT z = ZERO\n", Config::default());
        let dump = it.parse().unwrap();
        assert!(dump.starts_with("k: 11\nz: 0\n"), "{dump}");
        assert!(dump.contains("    0   1 0 "));
    }

    #[test]
    fn reads_source_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "IN a /2\nOUT b = NOT a").unwrap();
        let mut it = Interpreter::from_path(file.path(), Config::default()).unwrap();
        let dump = it.parse().unwrap();
        assert!(dump.contains("b: 11"));
        let ids: Vec<GateId> = it.bus("b").unwrap().gates().unwrap();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Interpreter::from_path(dir.path().join("none.gb"), Config::default())
            .err()
            .unwrap();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn ripple_adder_demo() {
        let mut it = build(include_str!("../demos/adder4.gb"));
        assert_eq!(it.constant("i"), None);
        for cin in 0..2u64 {
            for a in 0..16u64 {
                for b in 0..16u64 {
                    drive(&mut it, "a", a);
                    drive(&mut it, "b", b);
                    drive(&mut it, "cin", cin);
                    let total = sample(&mut it, "s") | sample(&mut it, "cout") << 4;
                    assert_eq!(total, a + b + cin, "{a} + {b} + {cin}");
                }
            }
        }
    }

    #[test]
    fn mux_demo() {
        let mut it = build(include_str!("../demos/mux4.gb"));
        for (i, name) in ["w", "x", "y", "z"].into_iter().enumerate() {
            drive(&mut it, name, i as u64);
        }
        for sel in 0..4u64 {
            drive(&mut it, "sel", sel);
            assert_eq!(sample(&mut it, "q"), sel);
        }
    }

    #[test]
    fn identical_sources_hash_equal() {
        let src = "IN a /8\nOUT p = XOR [a]\n";
        assert_eq!(build(src).netlist().hash(), build(src).netlist().hash());
        assert_ne!(
            build(src).netlist().hash(),
            build("IN a /8\nOUT p = AND [a]\n").netlist().hash()
        );
    }
}
