//! Symbolic safety game built from an AIGER circuit.
//!
//! Inputs whose symbol name starts with [`CONTROLLABLE_PREFIX`] belong to the
//! controller; all other inputs belong to the environment. The outputs of
//! the circuit are error bits the controller has to keep low forever.

use std::collections::HashMap;

use log::debug;

use crate::aiger::{Aig, Lit};
use crate::bdd::Bdd;
use crate::error::{Result, SynthError};
use crate::reference::Ref;

pub const CONTROLLABLE_PREFIX: &str = "controllable_";

/// BDD variable allocation order.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum VarOrder {
    /// Inputs get the lower variable indices, latches the higher ones.
    #[default]
    InputsThenLatches,
    /// Latches get the lower variable indices, inputs the higher ones.
    LatchesThenInputs,
}

#[derive(Debug)]
pub struct SafetyGame<'a> {
    pub bdd: &'a Bdd,
    pub controllables: Vec<Ref>,
    pub uncontrollables: Vec<Ref>,
    pub latches: Vec<Ref>,
    /// Substitution vector indexed by BDD variable, mapping each latch
    /// variable to its next-state function and each input variable to itself.
    pub compose: Vec<Ref>,
    pub initial: Ref,
    /// States (over latch and input variables) where the error bit is low.
    pub safety_condition: Ref,
    /// Original AIGER literals, parallel to `controllables`.
    pub controllable_lits: Vec<Lit>,
    /// Original AIGER literals, parallel to `uncontrollables`.
    pub uncontrollable_lits: Vec<Lit>,
    /// Original AIGER literals, parallel to `latches`.
    pub latch_lits: Vec<Lit>,
}

fn lookup(cache: &HashMap<u32, Ref>, lit: Lit) -> Result<Ref> {
    let f = cache.get(&lit.var()).copied().ok_or_else(|| {
        SynthError::Input(format!("literal {} is not defined before use", lit))
    })?;
    Ok(if lit.is_negated() { -f } else { f })
}

impl<'a> SafetyGame<'a> {
    pub fn from_aig(bdd: &'a Bdd, aig: &Aig, order: VarOrder) -> Result<Self> {
        if aig.outputs.is_empty() {
            return Err(SynthError::Input(
                "the instance has no output, nothing to keep safe".to_string(),
            ));
        }

        let mut controllables = Vec::new();
        let mut uncontrollables = Vec::new();
        let mut controllable_lits = Vec::new();
        let mut uncontrollable_lits = Vec::new();
        let mut latches = Vec::new();
        let mut latch_lits = Vec::new();

        // Function cache, seeded with the constant and the variables.
        let mut cache: HashMap<u32, Ref> = HashMap::new();
        cache.insert(0, bdd.zero);

        let mut alloc_inputs = |cache: &mut HashMap<u32, Ref>| {
            for input in &aig.inputs {
                let var = bdd.new_var();
                cache.insert(input.lit.var(), var);
                let name = input.name.as_deref().unwrap_or("");
                if name.starts_with(CONTROLLABLE_PREFIX) {
                    controllables.push(var);
                    controllable_lits.push(input.lit);
                } else {
                    uncontrollables.push(var);
                    uncontrollable_lits.push(input.lit);
                }
            }
        };
        let mut alloc_latches = |cache: &mut HashMap<u32, Ref>| {
            for latch in &aig.latches {
                let var = bdd.new_var();
                cache.insert(latch.lit.var(), var);
                latches.push(var);
                latch_lits.push(latch.lit);
            }
        };
        match order {
            VarOrder::InputsThenLatches => {
                alloc_inputs(&mut cache);
                alloc_latches(&mut cache);
            }
            VarOrder::LatchesThenInputs => {
                alloc_latches(&mut cache);
                alloc_inputs(&mut cache);
            }
        }

        // Gate operands are defined before use, so one pass in file order
        // translates the whole network without recursion.
        for and in &aig.ands {
            let rhs0 = lookup(&cache, and.rhs0)?;
            let rhs1 = lookup(&cache, and.rhs1)?;
            cache.insert(and.lhs.var(), bdd.apply_and(rhs0, rhs1));
        }

        // Identity for inputs, next-state function for latches.
        let mut compose = vec![bdd.zero; bdd.num_vars() as usize];
        for &var in controllables.iter().chain(&uncontrollables) {
            let v = bdd.variable(var.index());
            compose[v as usize - 1] = var;
        }
        for (latch, &var) in aig.latches.iter().zip(&latches) {
            let next = lookup(&cache, latch.next)?;
            let v = bdd.variable(var.index());
            compose[v as usize - 1] = next;
        }

        // Initial states: every latch at its reset value.
        let mut initial = bdd.one;
        for (latch, &var) in aig.latches.iter().zip(&latches) {
            if latch.reset == Lit::FALSE {
                initial = bdd.apply_and(initial, -var);
            } else if latch.reset == Lit::TRUE {
                initial = bdd.apply_and(initial, var);
            } else {
                return Err(SynthError::Input(format!(
                    "latch {} has a non-constant reset",
                    latch.lit
                )));
            }
        }

        // Staying safe means keeping every error output low.
        let mut safety_condition = bdd.one;
        for output in &aig.outputs {
            let error = lookup(&cache, output.lit)?;
            safety_condition = bdd.apply_and(safety_condition, -error);
        }

        debug!(
            "game: {} controllable, {} uncontrollable, {} latches, safety {} nodes",
            controllables.len(),
            uncontrollables.len(),
            latches.len(),
            bdd.size(safety_condition),
        );

        Ok(SafetyGame {
            bdd,
            controllables,
            uncontrollables,
            latches,
            compose,
            initial,
            safety_condition,
            controllable_lits,
            uncontrollable_lits,
            latch_lits,
        })
    }
}

/// Splice a combinational controller circuit back into the original
/// instance. Controllable inputs of the original become and-gates driven by
/// the corresponding controller output; everything else is copied as is.
///
/// Controller inputs and outputs carry the decimal literal of the original
/// signal they correspond to as their symbol name.
pub fn combine(original: &Aig, controller: &Aig) -> Result<Aig> {
    let mut combined = Aig::new();

    for input in &original.inputs {
        let name = input.name.as_deref().unwrap_or("");
        if !name.starts_with(CONTROLLABLE_PREFIX) {
            combined.add_input(input.lit, input.name.as_deref());
        }
    }
    for latch in &original.latches {
        combined.add_latch(latch.lit, latch.next, latch.reset, latch.name.as_deref());
    }
    for output in &original.outputs {
        combined.add_output(output.lit, output.name.as_deref());
    }
    for and in &original.ands {
        combined.add_and(and.lhs, and.rhs0, and.rhs1);
    }

    let offset = (original.max_var() + 1) * 2;

    let parse_name = |name: Option<&str>| -> Result<Lit> {
        let name =
            name.ok_or_else(|| SynthError::Input("unnamed controller signal".to_string()))?;
        let raw: u32 = name.parse().map_err(|_| {
            SynthError::Input(format!("controller signal name '{}' is not a literal", name))
        })?;
        Ok(Lit::new(raw))
    };

    let mut controller_inputs: HashMap<u32, Lit> = HashMap::new();
    for input in &controller.inputs {
        let original_lit = parse_name(input.name.as_deref())?;
        controller_inputs.insert(input.lit.var(), original_lit);
    }

    let map_lit = |lit: Lit| -> Lit {
        if lit.var() == 0 {
            lit
        } else if let Some(&original_lit) = controller_inputs.get(&lit.var()) {
            if lit.is_negated() {
                !original_lit
            } else {
                original_lit
            }
        } else {
            Lit::new(lit.raw() + offset)
        }
    };

    for and in &controller.ands {
        combined.add_and(map_lit(and.lhs), map_lit(and.rhs0), map_lit(and.rhs1));
    }

    // Drive each former controllable input from its controller function.
    for output in &controller.outputs {
        let original_lit = parse_name(output.name.as_deref())?;
        combined.add_and(original_lit, map_lit(output.lit), Lit::TRUE);
    }

    Ok(combined)
}
