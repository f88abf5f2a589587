//! Encoding of BDD functions as and-inverter gates.
//!
//! Every BDD node becomes a multiplexer over its variable:
//!
//! ```text
//! ite(v, t, e) = NOT(NOT(v AND t) AND NOT(NOT(v) AND e))
//! ```
//!
//! Complement edges turn into literal negations, so shared nodes are encoded
//! once regardless of polarity.

use std::collections::HashMap;

use crate::aiger::{Aig, Lit};
use crate::bdd::Bdd;
use crate::error::{Result, SynthError};
use crate::reference::Ref;

fn regular(node: Ref) -> Ref {
    if node.is_negated() {
        -node
    } else {
        node
    }
}

pub struct CircuitEncoder<'a> {
    bdd: &'a Bdd,
    aig: Aig,
    /// Circuit literal per regular BDD node.
    node_cache: HashMap<Ref, Lit>,
    /// Circuit literal per BDD variable.
    leaves: HashMap<u32, Lit>,
}

impl<'a> CircuitEncoder<'a> {
    pub fn new(bdd: &'a Bdd) -> Self {
        let node_cache = HashMap::from([(bdd.one, Lit::TRUE)]);
        Self {
            bdd,
            aig: Aig::new(),
            node_cache,
            leaves: HashMap::new(),
        }
    }

    /// Bind a BDD variable to a fresh circuit input.
    pub fn add_input(&mut self, var: u32, name: Option<&str>) -> Lit {
        let lit = self.aig.next_lit();
        self.aig.add_input(lit, name);
        self.leaves.insert(var, lit);
        lit
    }

    /// Bind a BDD variable to a fresh latch. The next-state function is
    /// filled in later with [`seal_latch`][Self::seal_latch], once it has
    /// been encoded.
    pub fn declare_latch(&mut self, var: u32, name: Option<&str>) -> Lit {
        let lit = self.aig.next_lit();
        self.aig.add_latch(lit, Lit::FALSE, Lit::FALSE, name);
        self.leaves.insert(var, lit);
        lit
    }

    pub fn seal_latch(&mut self, lit: Lit, next: Lit) {
        self.aig.set_latch_next(lit, next);
    }

    pub fn add_output(&mut self, lit: Lit, name: &str) {
        self.aig.add_output(lit, Some(name));
    }

    fn lit_of(&self, node: Ref) -> Lit {
        let lit = self.node_cache[&regular(node)];
        if node.is_negated() {
            !lit
        } else {
            lit
        }
    }

    /// Encode the function rooted at `f` and return its circuit literal.
    /// Every variable in the support of `f` must have been bound first.
    pub fn encode(&mut self, f: Ref) -> Result<Lit> {
        // Iterative post-order, the DAG can be deeper than the call stack.
        let mut stack = vec![regular(f)];
        while let Some(&node) = stack.last() {
            if self.node_cache.contains_key(&node) {
                stack.pop();
                continue;
            }

            let low = self.bdd.low_node(node);
            let high = self.bdd.high_node(node);
            let mut ready = true;
            for child in [low, high] {
                let child = regular(child);
                if !self.node_cache.contains_key(&child) {
                    stack.push(child);
                    ready = false;
                }
            }
            if !ready {
                continue;
            }
            stack.pop();

            let v = self.bdd.variable(node.index());
            let v_lit = *self
                .leaves
                .get(&v)
                .ok_or_else(|| SynthError::Lookup(format!("variable {} has no circuit signal", v)))?;
            let t = self.lit_of(high);
            let e = self.lit_of(low);

            let pos = self.aig.create_and(v_lit, t);
            let neg = self.aig.create_and(!v_lit, e);
            let lit = !self.aig.create_and(!pos, !neg);
            self.node_cache.insert(node, lit);
        }

        Ok(self.lit_of(f))
    }

    pub fn finish(self) -> Aig {
        self.aig
    }
}
