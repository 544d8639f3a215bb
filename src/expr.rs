//! Infix to postfix expression compiler, independent of what the nodes are.
//!
//! Operands and operators are pushed in source order. Whenever an operator
//! arrives, pending operators whose priority is not higher are reduced first,
//! so operators sharing a priority associate to the left.

use crate::error::{Error, Result};

/// A node the compiler can reduce.
pub trait ExprNode: Sized {
    /// Whatever `bind_children` needs to resolve an operator.
    type Context;

    /// 0 for operands, 1 for unary prefix, 2 for binary operators.
    fn arity(&self) -> usize;

    /// Lower values reduce first.
    fn priority(&self) -> u32;

    /// Turn an operator into a resolved operand, consuming exactly
    /// `arity()` children in left-to-right order.
    fn bind_children(&mut self, ctx: &mut Self::Context, children: Vec<Self>) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Start,
    Operand,
    UnaryPrefix,
    Binary,
    End,
}

impl Token {
    fn name(self) -> &'static str {
        match self {
            Token::Start => "start",
            Token::Operand => "operand",
            Token::UnaryPrefix => "unary operator",
            Token::Binary => "binary operator",
            Token::End => "end",
        }
    }

    fn accepts(self, next: Token) -> bool {
        match self {
            Token::Start | Token::UnaryPrefix | Token::Binary => {
                matches!(next, Token::UnaryPrefix | Token::Operand)
            }
            Token::Operand => matches!(next, Token::Binary | Token::End),
            Token::End => false,
        }
    }
}

/// One expression being compiled. Build a fresh one per statement.
pub struct Expression<N: ExprNode> {
    operands: Vec<N>,
    operators: Vec<N>,
    last: Token,
}

impl<N: ExprNode> Default for Expression<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: ExprNode> Expression<N> {
    pub fn new() -> Self {
        Expression {
            operands: Vec::new(),
            operators: Vec::new(),
            last: Token::Start,
        }
    }

    pub fn add_operand(&mut self, node: N) -> Result<()> {
        self.accept(Token::Operand)?;
        self.operands.push(node);
        Ok(())
    }

    pub fn add_operator(&mut self, node: N, ctx: &mut N::Context) -> Result<()> {
        let token = match node.arity() {
            1 => Token::UnaryPrefix,
            2 => Token::Binary,
            n => {
                return Err(Error::MalformedExpression(format!(
                    "operator with {n} operands"
                )))
            }
        };
        self.accept(token)?;
        // A prefix operator's operand has not arrived yet, nothing can reduce.
        if token == Token::Binary {
            while self
                .operators
                .last()
                .map_or(false, |top| top.priority() <= node.priority())
            {
                self.reduce_top(ctx)?;
            }
        }
        self.operators.push(node);
        Ok(())
    }

    pub fn compile(mut self, ctx: &mut N::Context) -> Result<N> {
        if self.last == Token::Start {
            return Err(Error::MalformedExpression("empty expression".into()));
        }
        self.accept(Token::End)?;
        while !self.operators.is_empty() {
            self.reduce_top(ctx)?;
        }
        if self.operands.len() != 1 {
            return Err(Error::MalformedExpression(format!(
                "{} operands left after reduction",
                self.operands.len()
            )));
        }
        self.operands
            .pop()
            .ok_or_else(|| Error::MalformedExpression("no operand".into()))
    }

    fn reduce_top(&mut self, ctx: &mut N::Context) -> Result<()> {
        let mut node = match self.operators.pop() {
            Some(node) => node,
            None => return Ok(()),
        };
        let n = node.arity();
        if n == 0 || self.operands.len() < n {
            return Err(Error::MalformedExpression(format!(
                "operator needs {n} operands, {} available",
                self.operands.len()
            )));
        }
        let children = self.operands.split_off(self.operands.len() - n);
        node.bind_children(ctx, children)?;
        self.operands.push(node);
        Ok(())
    }

    fn accept(&mut self, next: Token) -> Result<()> {
        if !self.last.accepts(next) {
            return Err(Error::UnexpectedTokenSequence {
                from: self.last.name(),
                to: next.name(),
            });
        }
        self.last = next;
        Ok(())
    }
}
