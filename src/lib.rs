//! # gatebus
//!
//! **Bus-level gate circuits from a line-oriented text language.**
//!
//! A script declares buses and boolean expressions over them; the
//! interpreter lowers everything into an append-only gate netlist that can
//! then be stepped one synchronous tick at a time.
//!
//! ## Quick Start
//!
//! ```rust
//! use gatebus::{Config, Interpreter};
//!
//! let mut it = Interpreter::new(
//!     "IN a /1\nIN b /1\nOUT r = a AND b\n",
//!     Config::default(),
//! );
//! it.build().unwrap();
//!
//! let a = it.bus("a").unwrap().clone();
//! let b = it.bus("b").unwrap().clone();
//! let r = it.bus("r").unwrap().clone();
//! let net = it.netlist_mut();
//! net.write_bus(&a, 1);
//! net.write_bus(&b, 1);
//! net.tick();
//! assert_eq!(net.read_bus(&r), 1);
//! ```
//!
//! ## Key Concepts
//!
//! - **Gate**: one netlist cell, wired only to earlier gates
//! - **Bus**: an ordered group of gates treated as one multi-bit signal
//! - **Tick**: one evaluation pass over all gates in allocation order
//! - **Expression**: infix operators over buses, compiled by a generic
//!   operator-precedence compiler ([`expr`])
//!
//! The [`Netlist`] can also be driven directly, without the text front end.

pub mod bus;
pub mod config;
pub mod error;
pub mod expr;
pub mod interp;
pub mod netlist;
pub mod node;

pub use bus::Bus;
pub use config::Config;
pub use error::{Error, Result};
pub use interp::Interpreter;
pub use netlist::{Gate, GateId, Netlist, NetlistHash, Opcode};
