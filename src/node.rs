//! Expression nodes for boolean bus expressions.

use crate::bus::Bus;
use crate::error::{Error, Result};
use crate::expr::ExprNode;
use crate::netlist::{Netlist, Opcode};

/// Either a pending gate operator or a bus that is already wired.
#[derive(Debug, Clone)]
pub enum LogicNode {
    Operator(Opcode),
    Resolved(Bus),
}

impl LogicNode {
    pub fn into_bus(self) -> Result<Bus> {
        match self {
            LogicNode::Resolved(bus) => Ok(bus),
            LogicNode::Operator(op) => Err(Error::MalformedExpression(format!(
                "unresolved operator {op:?}"
            ))),
        }
    }
}

impl ExprNode for LogicNode {
    type Context = Netlist;

    fn arity(&self) -> usize {
        match self {
            LogicNode::Resolved(_) => 0,
            LogicNode::Operator(op) => op.arity(),
        }
    }

    fn priority(&self) -> u32 {
        self.arity() as u32
    }

    fn bind_children(&mut self, netlist: &mut Netlist, children: Vec<Self>) -> Result<()> {
        let op = match self {
            LogicNode::Operator(op) => *op,
            LogicNode::Resolved(_) => {
                return Err(Error::MalformedExpression("operand has no children".into()))
            }
        };
        let buses = children
            .into_iter()
            .map(LogicNode::into_bus)
            .collect::<Result<Vec<_>>>()?;
        let bus = match buses.as_slice() {
            [x] => netlist.apply_unary(op, x)?,
            [x, y] => netlist.apply_binary(op, x, y)?,
            _ => {
                return Err(Error::MalformedExpression(format!(
                    "{op:?} got {} operands",
                    buses.len()
                )))
            }
        };
        *self = LogicNode::Resolved(bus);
        Ok(())
    }
}
