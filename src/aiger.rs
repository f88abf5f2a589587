//! ASCII AIGER (aag) circuits.
//!
//! A literal is `2*var` for the positive phase and `2*var+1` for the negated
//! one; variable 0 is the constant, so literal 0 is FALSE and literal 1 is
//! TRUE. See the [AIGER format description][aiger] for the file layout.
//!
//! [aiger]: https://fmv.jku.at/aiger/

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::fs;
use std::ops::Not;
use std::path::Path;

use crate::error::{Result, SynthError};

/// An AIGER literal.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Lit(u32);

impl Lit {
    pub const FALSE: Lit = Lit(0);
    pub const TRUE: Lit = Lit(1);

    pub const fn new(raw: u32) -> Self {
        Lit(raw)
    }

    pub const fn from_var(var: u32) -> Self {
        Lit(var << 1)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn var(self) -> u32 {
        self.0 >> 1
    }

    pub const fn is_negated(self) -> bool {
        self.0 & 1 == 1
    }

    /// The positive-phase literal of the same variable.
    pub const fn normalized(self) -> Self {
        Lit(self.0 & !1)
    }
}

impl Not for Lit {
    type Output = Lit;

    fn not(self) -> Lit {
        Lit(self.0 ^ 1)
    }
}

impl Display for Lit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Input {
    pub lit: Lit,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Latch {
    pub lit: Lit,
    pub next: Lit,
    /// Reset value: literal 0, literal 1, or the latch literal itself for
    /// an uninitialized latch.
    pub reset: Lit,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Output {
    pub lit: Lit,
    pub name: Option<String>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AndGate {
    pub lhs: Lit,
    pub rhs0: Lit,
    pub rhs1: Lit,
}

/// An and-inverter graph circuit.
#[derive(Debug, Clone, Default)]
pub struct Aig {
    max_var: u32,
    pub inputs: Vec<Input>,
    pub latches: Vec<Latch>,
    pub outputs: Vec<Output>,
    pub ands: Vec<AndGate>,
    pub comments: Vec<String>,
}

impl Aig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_var(&self) -> u32 {
        self.max_var
    }

    fn bump_max_var(&mut self, lit: Lit) {
        self.max_var = self.max_var.max(lit.var());
    }

    /// The next unused (positive) literal.
    pub fn next_lit(&self) -> Lit {
        Lit::from_var(self.max_var + 1)
    }

    pub fn add_input(&mut self, lit: Lit, name: Option<&str>) -> Lit {
        self.bump_max_var(lit);
        self.inputs.push(Input {
            lit,
            name: name.map(str::to_string),
        });
        lit
    }

    pub fn add_latch(&mut self, lit: Lit, next: Lit, reset: Lit, name: Option<&str>) -> Lit {
        self.bump_max_var(lit);
        self.latches.push(Latch {
            lit,
            next,
            reset,
            name: name.map(str::to_string),
        });
        lit
    }

    /// Replace the next-state function of an existing latch.
    pub fn set_latch_next(&mut self, lit: Lit, next: Lit) {
        let latch = self
            .latches
            .iter_mut()
            .find(|l| l.lit == lit)
            .unwrap_or_else(|| panic!("no latch with literal {}", lit));
        latch.next = next;
    }

    pub fn add_output(&mut self, lit: Lit, name: Option<&str>) {
        self.outputs.push(Output {
            lit,
            name: name.map(str::to_string),
        });
    }

    pub fn add_and(&mut self, lhs: Lit, rhs0: Lit, rhs1: Lit) -> Lit {
        self.bump_max_var(lhs);
        self.ands.push(AndGate { lhs, rhs0, rhs1 });
        lhs
    }

    /// Conjunction of two literals with constant folding. Allocates a fresh
    /// and-gate only when the result is not decided syntactically.
    pub fn create_and(&mut self, a: Lit, b: Lit) -> Lit {
        if a == Lit::FALSE || b == Lit::FALSE || a == !b {
            return Lit::FALSE;
        }
        if a == Lit::TRUE || a == b {
            return b;
        }
        if b == Lit::TRUE {
            return a;
        }
        let lhs = self.next_lit();
        self.add_and(lhs, a, b)
    }
}

fn parse_u32(token: Option<&str>, what: &str) -> Result<u32> {
    let token = token.ok_or_else(|| SynthError::Input(format!("missing {}", what)))?;
    token
        .parse()
        .map_err(|_| SynthError::Input(format!("invalid {}: '{}'", what, token)))
}

impl Aig {
    /// Parse an ASCII AIGER (`aag`) circuit.
    pub fn parse(text: &str) -> Result<Aig> {
        let mut lines = text.lines();

        let header = lines
            .next()
            .ok_or_else(|| SynthError::Input("empty file".to_string()))?;
        let mut fields = header.split_whitespace();
        match fields.next() {
            Some("aag") => {}
            Some("aig") => {
                return Err(SynthError::Input(
                    "binary AIGER is not supported, convert to aag first".to_string(),
                ))
            }
            _ => return Err(SynthError::Input(format!("bad header: '{}'", header))),
        }
        let max_var = parse_u32(fields.next(), "maximum variable index")?;
        let num_inputs = parse_u32(fields.next(), "input count")?;
        let num_latches = parse_u32(fields.next(), "latch count")?;
        let num_outputs = parse_u32(fields.next(), "output count")?;
        let num_ands = parse_u32(fields.next(), "and count")?;

        let mut aig = Aig::new();

        for _ in 0..num_inputs {
            let line = lines
                .next()
                .ok_or_else(|| SynthError::Input("truncated input section".to_string()))?;
            let lit = Lit::new(parse_u32(Some(line.trim()), "input literal")?);
            aig.add_input(lit, None);
        }

        for _ in 0..num_latches {
            let line = lines
                .next()
                .ok_or_else(|| SynthError::Input("truncated latch section".to_string()))?;
            let mut fields = line.split_whitespace();
            let lit = Lit::new(parse_u32(fields.next(), "latch literal")?);
            let next = Lit::new(parse_u32(fields.next(), "latch next-state literal")?);
            let reset = match fields.next() {
                Some(token) => Lit::new(parse_u32(Some(token), "latch reset")?),
                None => Lit::FALSE,
            };
            aig.add_latch(lit, next, reset, None);
        }

        for _ in 0..num_outputs {
            let line = lines
                .next()
                .ok_or_else(|| SynthError::Input("truncated output section".to_string()))?;
            let lit = Lit::new(parse_u32(Some(line.trim()), "output literal")?);
            aig.add_output(lit, None);
        }

        for _ in 0..num_ands {
            let line = lines
                .next()
                .ok_or_else(|| SynthError::Input("truncated and section".to_string()))?;
            let mut fields = line.split_whitespace();
            let lhs = Lit::new(parse_u32(fields.next(), "and literal")?);
            let rhs0 = Lit::new(parse_u32(fields.next(), "and operand")?);
            let rhs1 = Lit::new(parse_u32(fields.next(), "and operand")?);
            aig.add_and(lhs, rhs0, rhs1);
        }

        // Symbol table and comments.
        let mut in_comments = false;
        for line in lines {
            if in_comments {
                aig.comments.push(line.to_string());
                continue;
            }
            if line == "c" {
                in_comments = true;
                continue;
            }
            if line.is_empty() {
                continue;
            }
            let (kind, rest) = line.split_at(1);
            let (pos, name) = rest
                .split_once(' ')
                .ok_or_else(|| SynthError::Input(format!("bad symbol entry: '{}'", line)))?;
            let pos: usize = pos
                .parse()
                .map_err(|_| SynthError::Input(format!("bad symbol position: '{}'", line)))?;
            let slot = match kind {
                "i" => aig.inputs.get_mut(pos).map(|i| &mut i.name),
                "l" => aig.latches.get_mut(pos).map(|l| &mut l.name),
                "o" => aig.outputs.get_mut(pos).map(|o| &mut o.name),
                _ => return Err(SynthError::Input(format!("bad symbol entry: '{}'", line))),
            };
            match slot {
                Some(slot) => *slot = Some(name.to_string()),
                None => {
                    return Err(SynthError::Input(format!(
                        "symbol position out of range: '{}'",
                        line
                    )))
                }
            }
        }

        if aig.max_var > max_var {
            return Err(SynthError::Input(format!(
                "literal exceeds declared maximum variable index {}",
                max_var
            )));
        }
        aig.max_var = max_var;

        Ok(aig)
    }

    pub fn read_from_file(path: &Path) -> Result<Aig> {
        let text = fs::read_to_string(path).map_err(|source| SynthError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Aig::parse(&text)
    }

    pub fn to_aag_string(&self) -> String {
        self.to_string()
    }
}

impl Display for Aig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "aag {} {} {} {} {}",
            self.max_var,
            self.inputs.len(),
            self.latches.len(),
            self.outputs.len(),
            self.ands.len()
        )?;
        for input in &self.inputs {
            writeln!(f, "{}", input.lit)?;
        }
        for latch in &self.latches {
            if latch.reset == Lit::FALSE {
                writeln!(f, "{} {}", latch.lit, latch.next)?;
            } else {
                writeln!(f, "{} {} {}", latch.lit, latch.next, latch.reset)?;
            }
        }
        for output in &self.outputs {
            writeln!(f, "{}", output.lit)?;
        }
        for and in &self.ands {
            writeln!(f, "{} {} {}", and.lhs, and.rhs0, and.rhs1)?;
        }
        for (pos, input) in self.inputs.iter().enumerate() {
            if let Some(name) = &input.name {
                writeln!(f, "i{} {}", pos, name)?;
            }
        }
        for (pos, latch) in self.latches.iter().enumerate() {
            if let Some(name) = &latch.name {
                writeln!(f, "l{} {}", pos, name)?;
            }
        }
        for (pos, output) in self.outputs.iter().enumerate() {
            if let Some(name) = &output.name {
                writeln!(f, "o{} {}", pos, name)?;
            }
        }
        if !self.comments.is_empty() {
            writeln!(f, "c")?;
            for comment in &self.comments {
                writeln!(f, "{}", comment)?;
            }
        }
        Ok(())
    }
}

impl Aig {
    /// Simulate one step: compute output values and next-state latch values
    /// from the given input and current latch values.
    ///
    /// And-gates are resolved on demand, so their order in the circuit does
    /// not have to be topological.
    pub fn evaluate(&self, inputs: &[bool], latches: &[bool]) -> (Vec<bool>, Vec<bool>) {
        assert_eq!(inputs.len(), self.inputs.len());
        assert_eq!(latches.len(), self.latches.len());

        let mut values: HashMap<u32, bool> = HashMap::new();
        values.insert(0, false);
        for (input, &value) in self.inputs.iter().zip(inputs) {
            values.insert(input.lit.var(), value);
        }
        for (latch, &value) in self.latches.iter().zip(latches) {
            values.insert(latch.lit.var(), value);
        }
        let gates: HashMap<u32, &AndGate> =
            self.ands.iter().map(|and| (and.lhs.var(), and)).collect();

        fn resolve(
            lit: Lit,
            values: &mut HashMap<u32, bool>,
            gates: &HashMap<u32, &AndGate>,
        ) -> bool {
            let value = match values.get(&lit.var()) {
                Some(&v) => v,
                None => {
                    let gate = gates
                        .get(&lit.var())
                        .unwrap_or_else(|| panic!("undefined literal {}", lit));
                    let v = resolve(gate.rhs0, values, gates) && resolve(gate.rhs1, values, gates);
                    values.insert(lit.var(), v);
                    v
                }
            };
            value != lit.is_negated()
        }

        let outputs = self
            .outputs
            .iter()
            .map(|o| resolve(o.lit, &mut values, &gates))
            .collect();
        let next = self
            .latches
            .iter()
            .map(|l| resolve(l.next, &mut values, &gates))
            .collect();
        (outputs, next)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_lit() {
        assert_eq!(Lit::from_var(3).raw(), 6);
        assert_eq!(Lit::new(7).var(), 3);
        assert!(Lit::new(7).is_negated());
        assert!(!Lit::new(6).is_negated());
        assert_eq!(!Lit::new(6), Lit::new(7));
        assert_eq!(Lit::new(7).normalized(), Lit::new(6));
        assert_eq!(!Lit::FALSE, Lit::TRUE);
    }

    #[test]
    fn test_parse_roundtrip() {
        let text = "\
aag 5 2 1 1 2
2
4
6 10
6
8 2 6
10 8 4
i0 request
i1 controllable_grant
l0 busy
o0 error
c
a comment
";
        let aig = Aig::parse(text).unwrap();
        assert_eq!(aig.max_var(), 5);
        assert_eq!(aig.inputs.len(), 2);
        assert_eq!(aig.inputs[1].name.as_deref(), Some("controllable_grant"));
        assert_eq!(aig.latches[0].next, Lit::new(10));
        assert_eq!(aig.latches[0].reset, Lit::FALSE);
        assert_eq!(aig.outputs[0].name.as_deref(), Some("error"));
        assert_eq!(aig.comments, vec!["a comment"]);
        assert_eq!(aig.to_aag_string(), text);
    }

    #[test]
    fn test_parse_latch_reset() {
        let text = "aag 1 0 1 0 0\n2 2 1\n";
        let aig = Aig::parse(text).unwrap();
        assert_eq!(aig.latches[0].reset, Lit::TRUE);
        assert_eq!(aig.to_aag_string(), text);
    }

    #[test]
    fn test_parse_rejects_binary() {
        let err = Aig::parse("aig 1 1 0 0 0\n").unwrap_err();
        assert!(matches!(err, SynthError::Input(_)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Aig::parse("").is_err());
        assert!(Aig::parse("hello world\n").is_err());
        assert!(Aig::parse("aag 1 1 0 0 0\n").is_err());
        assert!(Aig::parse("aag 0 0 0 0 one\n").is_err());
    }

    #[test]
    fn test_create_and_folds_constants() {
        let mut aig = Aig::new();
        let a = aig.add_input(aig.next_lit(), None);
        let b = aig.add_input(aig.next_lit(), None);

        assert_eq!(aig.create_and(a, Lit::FALSE), Lit::FALSE);
        assert_eq!(aig.create_and(Lit::TRUE, b), b);
        assert_eq!(aig.create_and(a, a), a);
        assert_eq!(aig.create_and(a, !a), Lit::FALSE);
        assert!(aig.ands.is_empty());

        let c = aig.create_and(a, b);
        assert_eq!(aig.ands.len(), 1);
        assert_eq!(c.var(), 3);
    }

    #[test]
    fn test_evaluate() {
        // busy' = request; error = busy AND NOT grant
        let text = "\
aag 4 2 1 1 1
2
4
6 2
8
8 6 5
";
        let aig = Aig::parse(text).unwrap();

        let (outputs, next) = aig.evaluate(&[true, false], &[true]);
        assert_eq!(outputs, vec![true]);
        assert_eq!(next, vec![true]);

        let (outputs, next) = aig.evaluate(&[false, true], &[true]);
        assert_eq!(outputs, vec![false]);
        assert_eq!(next, vec![false]);
    }
}
