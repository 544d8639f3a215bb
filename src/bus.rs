//! Buses: ordered groups of gate indices treated as one multi-bit signal.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::netlist::GateId;

/// An ordered sequence of gate indices.
///
/// A bus is either a contiguous range of gates, which is what every
/// element-wise allocation produces, or an explicit list of slots. Explicit
/// slots may be unbound placeholders reserved by a width declaration and
/// bound later with [`Bus::bind`].
///
/// Buses are plain values: cloning duplicates explicit storage and the
/// indices stay valid for as long as the netlist that issued them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Bus {
    /// Gates `start..start + len`
    Range { start: GateId, len: usize },
    /// Explicit slots, `None` for unbound placeholders
    Slots(Vec<Option<GateId>>),
}

impl Default for Bus {
    fn default() -> Self {
        Bus::Range { start: 0, len: 0 }
    }
}

impl Bus {
    pub fn range(start: GateId, len: usize) -> Self {
        Bus::Range { start, len }
    }

    /// A one-bit bus over a single gate.
    pub fn single(gate: GateId) -> Self {
        Bus::Range { start: gate, len: 1 }
    }

    /// `width` unbound placeholders.
    pub fn unbound(width: usize) -> Self {
        Bus::Slots(vec![None; width])
    }

    pub fn len(&self) -> usize {
        match self {
            Bus::Range { len, .. } => *len,
            Bus::Slots(slots) => slots.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_contiguous(&self) -> bool {
        matches!(self, Bus::Range { .. })
    }

    /// Slot `index`, `None` when it is an unbound placeholder.
    pub fn slot(&self, index: usize) -> Result<Option<GateId>> {
        if index >= self.len() {
            return Err(Error::IndexOutOfRange {
                index,
                width: self.len(),
            });
        }
        Ok(match self {
            Bus::Range { start, .. } => Some(start + index),
            Bus::Slots(slots) => slots[index],
        })
    }

    /// Gate bound to slot `index`.
    pub fn gate(&self, index: usize) -> Result<GateId> {
        self.slot(index)?
            .ok_or(Error::UnboundSlot { slot: index })
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<GateId>> + '_ {
        (0..self.len()).map(move |i| match self {
            Bus::Range { start, .. } => Some(start + i),
            Bus::Slots(slots) => slots[i],
        })
    }

    /// All gates in order, failing on the first unbound slot.
    pub fn gates(&self) -> Result<Vec<GateId>> {
        self.iter()
            .enumerate()
            .map(|(slot, g)| g.ok_or(Error::UnboundSlot { slot }))
            .collect()
    }

    /// Sub-bus `from..=to`.
    pub fn slice(&self, from: usize, to: usize) -> Result<Bus> {
        if to >= self.len() || from > to {
            return Err(Error::IndexOutOfRange {
                index: if from > to { from } else { to },
                width: self.len(),
            });
        }
        let len = to - from + 1;
        match self {
            Bus::Range { start, .. } => Ok(Bus::range(start + from, len)),
            Bus::Slots(slots) => match slots[from] {
                Some(gate) if len == 1 => Ok(Bus::single(gate)),
                _ => Ok(Bus::Slots(slots[from..=to].to_vec())),
            },
        }
    }

    /// Concatenation, always materialized as explicit slots.
    pub fn concat(&self, other: &Bus) -> Bus {
        Bus::Slots(self.iter().chain(other.iter()).collect())
    }

    /// Bind the placeholder at `slot` to `gate`.
    pub fn bind(&mut self, slot: usize, gate: GateId) -> Result<()> {
        let width = self.len();
        match self {
            Bus::Range { .. } if slot < width => Err(Error::AlreadyBound { slot }),
            Bus::Slots(slots) if slot < width => match slots[slot] {
                Some(_) => Err(Error::AlreadyBound { slot }),
                None => {
                    slots[slot] = Some(gate);
                    Ok(())
                }
            },
            _ => Err(Error::IndexOutOfRange { index: slot, width }),
        }
    }
}

/// Positional comparison; an unbound slot never equals anything.
impl PartialEq for Bus {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|(a, b)| matches!((a, b), (Some(x), Some(y)) if x == y))
    }
}
