//! # Netlist: append-only gate arena
//!
//! Gates are allocated once and never rewired. A gate may only read gates
//! allocated before it, so one pass in index order settles every
//! combinational path.
//!
//! ## Example
//!
//! ```rust
//! use gatebus::netlist::{Netlist, Opcode};
//!
//! let mut net = Netlist::new(16);
//! let a = net.allocate(Opcode::Passthrough, None, None).unwrap();
//! let b = net.allocate(Opcode::Passthrough, None, None).unwrap();
//! let x = net.allocate(Opcode::Xor, Some(a), Some(b)).unwrap();
//!
//! net.set(a, true);
//! net.tick();
//! assert!(net.get(x));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use blake3::Hasher;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::bus::Bus;
use crate::config::Config;
use crate::error::{Error, Result};

/// Permanent index of a gate; doubles as its allocation order.
pub type GateId = usize;

/// Hex-encoded BLAKE3 of the netlist structure.
pub type NetlistHash = String;

/// Gate operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    /// Constant false
    Zero,
    /// Constant true
    One,
    /// Inverts itself every tick
    Clock,
    /// Externally driven value, untouched by `tick`
    Passthrough,
    /// Set/reset latch: `in1` resets, `in2` sets
    SetReset,
    And,
    Or,
    Xor,
    Nand,
    Nor,
    Not,
    Input,
    Output,
}

impl Opcode {
    /// Number of inputs the opcode consumes.
    pub fn arity(self) -> usize {
        match self {
            Opcode::Zero
            | Opcode::One
            | Opcode::Clock
            | Opcode::Passthrough
            | Opcode::Input
            | Opcode::Output => 0,
            Opcode::Not => 1,
            Opcode::SetReset
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::Nand
            | Opcode::Nor => 2,
        }
    }

    /// Operator keyword of the circuit language.
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "AND" => Some(Opcode::And),
            "OR" => Some(Opcode::Or),
            "XOR" => Some(Opcode::Xor),
            "NAND" => Some(Opcode::Nand),
            "NOR" => Some(Opcode::Nor),
            "NOT" => Some(Opcode::Not),
            "LATCH" => Some(Opcode::SetReset),
            _ => None,
        }
    }

    fn code(self) -> u8 {
        self as u8
    }
}

/// One netlist cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gate {
    pub in1: Option<GateId>,
    pub in2: Option<GateId>,
    pub opcode: Opcode,
    pub value: bool,
    /// Longest input chain ending here, in edges
    pub depth: u32,
    /// Fan-out
    pub usage: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetlistStats {
    pub gates: usize,
    pub capacity: usize,
    pub max_depth: u32,
    pub max_usage: u32,
}

/// Serializable view of a whole netlist.
#[derive(Debug, Serialize)]
pub struct NetlistSnapshot<'a> {
    pub hash: NetlistHash,
    pub stats: NetlistStats,
    pub ports: &'a BTreeMap<String, Bus>,
    pub gates: &'a [Gate],
}

#[derive(Debug, Clone)]
pub struct Netlist {
    gates: Vec<Gate>,
    capacity: usize,
    max_depth: u32,
    max_usage: u32,
    ports: BTreeMap<String, Bus>,
    rng: ChaCha20Rng,
}

impl Netlist {
    pub fn new(capacity: usize) -> Self {
        Self::with_config(&Config {
            capacity,
            ..Config::default()
        })
    }

    pub fn with_config(config: &Config) -> Self {
        Netlist {
            gates: Vec::with_capacity(config.capacity),
            capacity: config.capacity,
            max_depth: 0,
            max_usage: 0,
            ports: BTreeMap::new(),
            rng: ChaCha20Rng::seed_from_u64(config.seed),
        }
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn gate(&self, id: GateId) -> Option<&Gate> {
        self.gates.get(id)
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn max_usage(&self) -> u32 {
        self.max_usage
    }

    /// Append a gate wired to earlier gates `in1`/`in2`.
    pub fn allocate(
        &mut self,
        opcode: Opcode,
        in1: Option<GateId>,
        in2: Option<GateId>,
    ) -> Result<GateId> {
        let next = self.gates.len();
        if next >= self.capacity {
            return Err(Error::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        if let Some(pin) = [in1, in2].into_iter().flatten().find(|&pin| pin >= next) {
            return Err(Error::InvalidPinReference { pin, next });
        }
        let expected = opcode.arity();
        let got = usize::from(in1.is_some()) + usize::from(in2.is_some());
        // Unary gates take their input on the first pin.
        if got != expected || (expected == 1 && in1.is_none()) {
            return Err(Error::InvalidArity {
                opcode,
                expected,
                got,
            });
        }

        let mut depth = 0;
        for pin in [in1, in2].into_iter().flatten() {
            let input = &mut self.gates[pin];
            input.usage += 1;
            self.max_usage = self.max_usage.max(input.usage);
            depth = depth.max(input.depth + 1);
        }
        self.max_depth = self.max_depth.max(depth);
        self.gates.push(Gate {
            in1,
            in2,
            opcode,
            value: false,
            depth,
            usage: 0,
        });
        Ok(next)
    }

    /// One gate per bit of `bus`.
    pub fn apply_unary(&mut self, opcode: Opcode, bus: &Bus) -> Result<Bus> {
        let inputs = bus.gates()?;
        let start = self.gates.len();
        for gate in inputs {
            self.allocate(opcode, Some(gate), None)?;
        }
        Ok(Bus::range(start, bus.len()))
    }

    /// Element-wise binary operation; a one-bit operand is broadcast
    /// against every bit of the other.
    pub fn apply_binary(&mut self, opcode: Opcode, a: &Bus, b: &Bus) -> Result<Bus> {
        let (lhs, rhs) = (a.gates()?, b.gates()?);
        let pairs: Vec<(GateId, GateId)> = match (lhs.len(), rhs.len()) {
            (l, r) if l == r => lhs.into_iter().zip(rhs).collect(),
            (1, _) => rhs.into_iter().map(|g| (lhs[0], g)).collect(),
            (_, 1) => lhs.into_iter().map(|g| (g, rhs[0])).collect(),
            (left, right) => return Err(Error::LengthMismatch { left, right }),
        };
        let start = self.gates.len();
        for &(x, y) in &pairs {
            self.allocate(opcode, Some(x), Some(y))?;
        }
        Ok(Bus::range(start, pairs.len()))
    }

    /// 1-bit multiplexer: `a` when `selector` is low, `b` when high.
    pub fn select(&mut self, selector: GateId, a: &Bus, b: &Bus) -> Result<Bus> {
        if a.len() != b.len() {
            return Err(Error::LengthMismatch {
                left: a.len(),
                right: b.len(),
            });
        }
        let inverted = self.allocate(Opcode::Not, Some(selector), None)?;
        let low = self.apply_binary(Opcode::And, a, &Bus::single(inverted))?;
        let high = self.apply_binary(Opcode::And, b, &Bus::single(selector))?;
        self.apply_binary(Opcode::Or, &low, &high)
    }

    /// Fold `bus` into one gate with a balanced tree of `opcode`.
    pub fn reduce(&mut self, opcode: Opcode, bus: &Bus) -> Result<GateId> {
        if opcode.arity() != 2 {
            return Err(Error::InvalidArity {
                opcode,
                expected: opcode.arity(),
                got: 2,
            });
        }
        let gates = bus.gates()?;
        if gates.is_empty() {
            return Err(Error::IndexOutOfRange { index: 0, width: 0 });
        }
        self.reduce_gates(opcode, &gates)
    }

    fn reduce_gates(&mut self, opcode: Opcode, gates: &[GateId]) -> Result<GateId> {
        match gates {
            [single] => Ok(*single),
            [a, b] => self.allocate(opcode, Some(*a), Some(*b)),
            _ => {
                let (left, right) = gates.split_at((gates.len() - 1) / 2 + 1);
                let l = self.reduce_gates(opcode, left)?;
                let r = self.reduce_gates(opcode, right)?;
                self.allocate(opcode, Some(l), Some(r))
            }
        }
    }

    /// One synchronous pass in allocation order.
    pub fn tick(&mut self) {
        for i in 0..self.gates.len() {
            let gate = self.gates[i];
            let a = gate.in1.map_or(false, |p| self.gates[p].value);
            let b = gate.in2.map_or(false, |p| self.gates[p].value);
            let value = match gate.opcode {
                Opcode::Zero => false,
                Opcode::One => true,
                Opcode::Clock => !gate.value,
                Opcode::SetReset => match (a, b) {
                    (true, false) => false,
                    (false, true) => true,
                    (true, true) => self.rng.gen_bool(0.5),
                    (false, false) => gate.value,
                },
                Opcode::And => a && b,
                Opcode::Or => a || b,
                Opcode::Xor => a != b,
                Opcode::Nand => !(a && b),
                Opcode::Nor => !(a || b),
                Opcode::Not => !a,
                Opcode::Passthrough | Opcode::Input | Opcode::Output => gate.value,
            };
            self.gates[i].value = value;
        }
        trace!(gates = self.gates.len(), "tick");
    }

    /// Drive a gate from outside. Out-of-range ids are ignored.
    pub fn set(&mut self, id: GateId, value: bool) {
        if let Some(gate) = self.gates.get_mut(id) {
            gate.value = value;
        }
    }

    /// Observe a gate. Out-of-range ids read low.
    pub fn get(&self, id: GateId) -> bool {
        self.gates.get(id).map_or(false, |g| g.value)
    }

    /// Drive `bus` with the low bits of `value`, slot 0 least significant.
    pub fn write_bus(&mut self, bus: &Bus, value: u64) {
        for (bit, slot) in bus.iter().enumerate().take(64) {
            if let Some(id) = slot {
                self.set(id, (value >> bit) & 1 == 1);
            }
        }
    }

    pub fn read_bus(&self, bus: &Bus) -> u64 {
        bus.iter()
            .enumerate()
            .take(64)
            .filter(|(_, slot)| slot.map_or(false, |id| self.get(id)))
            .fold(0, |acc, (bit, _)| acc | (1 << bit))
    }

    /// Expose `bus` under `name` as an external port.
    pub fn register_port(&mut self, name: &str, bus: Bus) {
        self.ports.insert(name.to_string(), bus);
    }

    pub fn port(&self, name: &str) -> Option<&Bus> {
        self.ports.get(name)
    }

    pub fn ports(&self) -> impl Iterator<Item = (&str, &Bus)> {
        self.ports.iter().map(|(name, bus)| (name.as_str(), bus))
    }

    /// Allocate `width` externally driven gates and register them as a port.
    pub fn add_input(&mut self, name: &str, width: usize) -> Result<Bus> {
        let start = self.gates.len();
        for _ in 0..width {
            self.allocate(Opcode::Passthrough, None, None)?;
        }
        let bus = Bus::range(start, width);
        self.register_port(name, bus.clone());
        Ok(bus)
    }

    pub fn stats(&self) -> NetlistStats {
        NetlistStats {
            gates: self.gates.len(),
            capacity: self.capacity,
            max_depth: self.max_depth,
            max_usage: self.max_usage,
        }
    }

    /// Structural identity: opcodes and wiring, not values.
    pub fn hash(&self) -> NetlistHash {
        let mut hasher = Hasher::new();
        hasher.update(b"netlist/v0");
        for gate in &self.gates {
            hasher.update(&[gate.opcode.code()]);
            for pin in [gate.in1, gate.in2] {
                let raw = pin.map_or(u64::MAX, |p| p as u64);
                hasher.update(&raw.to_le_bytes());
            }
        }
        hex::encode(hasher.finalize().as_bytes())
    }

    pub fn snapshot(&self) -> NetlistSnapshot<'_> {
        NetlistSnapshot {
            hash: self.hash(),
            stats: self.stats(),
            ports: &self.ports,
            gates: &self.gates,
        }
    }

    /// Ports as `name: bits`, most significant bit first.
    pub fn dump_ports(&self) -> PortsDump<'_> {
        PortsDump(self)
    }

    /// Raw gate values, 32 per row.
    pub fn dump_gates(&self) -> GatesDump<'_> {
        GatesDump(self)
    }
}

pub struct PortsDump<'a>(&'a Netlist);

impl fmt::Display for PortsDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, bus) in self.0.ports() {
            write!(f, "{}: ", name)?;
            let bits: Vec<Option<GateId>> = bus.iter().collect();
            for slot in bits.into_iter().rev() {
                let c = match slot {
                    Some(id) if self.0.get(id) => '1',
                    Some(_) => '0',
                    None => '?',
                };
                write!(f, "{}", c)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

pub struct GatesDump<'a>(&'a Netlist);

const DUMP_ROW: usize = 32;

impl fmt::Display for GatesDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, gate) in self.0.gates.iter().enumerate() {
            if i % DUMP_ROW == 0 {
                write!(f, "{:>5}   ", i)?;
            }
            write!(f, "{} ", if gate.value { '1' } else { '0' })?;
            if (i + 1) % DUMP_ROW == 0 {
                writeln!(f)?;
            }
        }
        writeln!(f)
    }
}
