//! The BDD manager and core algorithms.
//!
//! All operations go through the [`Bdd`] manager, which owns the node arena
//! (hash-consed, so structural equality coincides with logical equality) and
//! the operation caches. Function values are opaque [`Ref`] handles into the
//! arena; negation is a complement edge and costs nothing. The arena is
//! append-only: nodes live until the manager itself is dropped, which matches
//! the one-manager-per-solve-session usage of this crate.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Debug;

use log::debug;
use num_bigint::BigUint;

use crate::cache::Cache;
use crate::reference::Ref;
use crate::table::Table;
use crate::utils::{pairing3, MyHash};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Node {
    variable: u32,
    low: Ref,
    high: Ref,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            variable: 0,
            low: Ref::new(1),
            high: Ref::new(1),
        }
    }
}

impl MyHash for Node {
    fn hash(&self) -> u64 {
        pairing3(
            self.variable as u64,
            self.low.unsigned() as u64,
            self.high.unsigned() as u64,
        )
    }
}

#[derive(Debug, Eq, PartialEq, Clone)]
enum OpKey {
    Ite(Ref, Ref, Ref),
    Exists(Ref, Ref),
    Constrain(Ref, Ref),
    Restrict(Ref, Ref),
}

impl MyHash for OpKey {
    fn hash(&self) -> u64 {
        match self {
            OpKey::Ite(f, g, h) => pairing3(
                f.unsigned() as u64,
                g.unsigned() as u64,
                h.unsigned() as u64,
            ),
            OpKey::Exists(f, g) => pairing3(1, f.unsigned() as u64, g.unsigned() as u64),
            OpKey::Constrain(f, g) => pairing3(2, f.unsigned() as u64, g.unsigned() as u64),
            OpKey::Restrict(f, g) => pairing3(3, f.unsigned() as u64, g.unsigned() as u64),
        }
    }
}

pub struct Bdd {
    storage: RefCell<Table<Node>>,
    cache: RefCell<Cache<OpKey, Ref>>,
    num_vars: Cell<u32>,
    pub zero: Ref,
    pub one: Ref,
}

impl Bdd {
    pub fn new(cache_bits: usize) -> Self {
        let mut storage = Table::new(cache_bits.min(20));

        // Allocate the terminal node at index 1.
        let one = storage.add(Node::default());
        assert_eq!(one, 1);
        let one = Ref::new(one as i32);
        let zero = -one;

        Self {
            storage: RefCell::new(storage),
            cache: RefCell::new(Cache::new(cache_bits)),
            num_vars: Cell::new(0),
            zero,
            one,
        }
    }
}

impl Default for Bdd {
    fn default() -> Self {
        Bdd::new(16)
    }
}

impl Debug for Bdd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bdd")
            .field("nodes", &self.storage.borrow().size())
            .field("vars", &self.num_vars.get())
            .finish()
    }
}

impl Bdd {
    pub fn num_vars(&self) -> u32 {
        self.num_vars.get()
    }

    pub fn variable(&self, index: usize) -> u32 {
        self.storage.borrow().value(index).variable
    }
    fn low(&self, index: usize) -> Ref {
        self.storage.borrow().value(index).low
    }
    fn high(&self, index: usize) -> Ref {
        self.storage.borrow().value(index).high
    }

    /// Low child with the complement edge of `node` pushed through.
    pub fn low_node(&self, node: Ref) -> Ref {
        let low = self.low(node.index());
        if node.is_negated() {
            -low
        } else {
            low
        }
    }
    /// High child with the complement edge of `node` pushed through.
    pub fn high_node(&self, node: Ref) -> Ref {
        let high = self.high(node.index());
        if node.is_negated() {
            -high
        } else {
            high
        }
    }

    pub fn is_zero(&self, node: Ref) -> bool {
        node == self.zero
    }
    pub fn is_one(&self, node: Ref) -> bool {
        node == self.one
    }
    pub fn is_terminal(&self, node: Ref) -> bool {
        self.is_zero(node) || self.is_one(node)
    }

    pub fn mk_node(&self, v: u32, low: Ref, high: Ref) -> Ref {
        assert_ne!(v, 0, "Variable index should not be zero");

        // Canonical form: the high edge is never complemented.
        if high.is_negated() {
            return -self.mk_node(v, -low, -high);
        }

        if low == high {
            return low;
        }

        let i = self.storage.borrow_mut().put(Node {
            variable: v,
            low,
            high,
        });
        Ref::new(i as i32)
    }

    pub fn mk_var(&self, v: u32) -> Ref {
        assert_ne!(v, 0, "Variable index should not be zero");
        if v > self.num_vars.get() {
            self.num_vars.set(v);
        }
        self.mk_node(v, self.zero, self.one)
    }

    /// Allocate the next unused variable.
    pub fn new_var(&self) -> Ref {
        self.mk_var(self.num_vars.get() + 1)
    }

    /// Conjunction of literals (DIMACS-style: negative means negated).
    pub fn mk_cube(&self, literals: impl IntoIterator<Item = i32>) -> Ref {
        let mut literals = literals.into_iter().collect::<Vec<_>>();
        literals.sort_by_key(|&v| v.abs());
        literals.reverse();
        let mut current = self.one;
        for lit in literals {
            assert_ne!(lit, 0, "Variable index should not be zero");
            current = if lit < 0 {
                self.mk_node(-lit as u32, current, self.zero)
            } else {
                self.mk_node(lit as u32, self.zero, current)
            };
        }
        current
    }

    /// Cofactors of `node` with respect to `v`, which must not be below the
    /// top variable of `node`.
    pub fn top_cofactors(&self, node: Ref, v: u32) -> (Ref, Ref) {
        assert_ne!(v, 0, "Variable index should not be zero");

        let i = node.index();
        if self.is_terminal(node) || v < self.variable(i) {
            return (node, node);
        }
        assert_eq!(v, self.variable(i));
        if node.is_negated() {
            (-self.low(i), -self.high(i))
        } else {
            (self.low(i), self.high(i))
        }
    }

    /// Apply the ITE operation to the arguments.
    ///
    /// ```text
    /// ITE(x, y, z) = (x ∧ y) ∨ (¬x ∧ z)
    /// ```
    pub fn apply_ite(&self, f: Ref, g: Ref, h: Ref) -> Ref {
        // Base cases:
        //   ite(1,G,H) => G
        //   ite(0,G,H) => H
        if self.is_one(f) {
            return g;
        }
        if self.is_zero(f) {
            return h;
        }

        // More base cases:
        //   ite(F,G,G) => G
        //   ite(F,1,0) => F
        //   ite(F,0,1) => ~F
        //   ite(F,1,~F) => 1
        //   ite(F,F,1) => 1
        //   ite(F,~F,0) => 0
        if g == h {
            return g;
        }
        if self.is_one(g) && self.is_zero(h) {
            return f;
        }
        if self.is_zero(g) && self.is_one(h) {
            return -f;
        }
        if self.is_one(g) && h == -f {
            return self.one;
        }
        if g == f && self.is_one(h) {
            return self.one;
        }
        if g == -f && self.is_zero(h) {
            return self.zero;
        }

        // Standard triples:
        //   ite(F,F,H) => ite(F,1,H)
        //   ite(F,G,F) => ite(F,G,0)
        //   ite(F,~F,H) => ite(F,0,H)
        //   ite(F,G,~F) => ite(F,G,1)
        if g == f {
            return self.apply_ite(f, self.one, h);
        }
        if h == f {
            return self.apply_ite(f, g, self.zero);
        }
        if g == -f {
            return self.apply_ite(f, self.zero, h);
        }
        if h == -f {
            return self.apply_ite(f, g, self.one);
        }

        let i = self.variable(f.index());
        let j = self.variable(g.index());
        let k = self.variable(h.index());
        assert_ne!(i, 0);

        // Equivalent pairs (choose the one with the lowest top variable):
        //   ite(F,1,H) == ite(H,1,F)
        //   ite(F,G,0) == ite(G,F,0)
        //   ite(F,G,1) == ite(~G,~F,1)
        //   ite(F,0,H) == ite(~H,0,~F)
        //   ite(F,G,~G) == ite(G,F,~F)
        if self.is_one(g) && k != 0 && k < i {
            return self.apply_ite(h, self.one, f);
        }
        if self.is_zero(h) && j != 0 && j < i {
            return self.apply_ite(g, f, self.zero);
        }
        if self.is_one(h) && j != 0 && j < i {
            return self.apply_ite(-g, -f, self.one);
        }
        if self.is_zero(g) && k != 0 && k < i {
            return self.apply_ite(-h, self.zero, -f);
        }
        if g == -h && j != 0 && j < i {
            return self.apply_ite(g, f, -f);
        }

        // Normalize so that the first two arguments are regular.
        let (mut f, mut g, mut h) = (f, g, h);

        // ite(~F,G,H) => ite(F,H,G)
        if f.is_negated() {
            f = -f;
            std::mem::swap(&mut g, &mut h);
        }

        // ite(F,~G,H) => ~ite(F,G,~H)
        let mut n = false;
        if g.is_negated() {
            n = true;
            g = -g;
            h = -h;
        }

        let (f, g, h) = (f, g, h);

        let key = OpKey::Ite(f, g, h);
        if let Some(&res) = self.cache.borrow().get(&key) {
            return if n { -res } else { res };
        }

        // Top variable of the triple:
        let i = self.variable(f.index());
        let j = self.variable(g.index());
        let k = self.variable(h.index());
        let mut m = i;
        if j != 0 {
            m = m.min(j);
        }
        if k != 0 {
            m = m.min(k);
        }
        assert_ne!(m, 0);

        let (f0, f1) = self.top_cofactors(f, m);
        let (g0, g1) = self.top_cofactors(g, m);
        let (h0, h1) = self.top_cofactors(h, m);

        let e = self.apply_ite(f0, g0, h0);
        let t = self.apply_ite(f1, g1, h1);
        let res = self.mk_node(m, e, t);
        self.cache.borrow_mut().insert(key, res);

        if n {
            -res
        } else {
            res
        }
    }

    fn maybe_constant(&self, node: Ref) -> Option<bool> {
        if self.is_zero(node) {
            Some(false)
        } else if self.is_one(node) {
            Some(true)
        } else {
            None
        }
    }

    /// Determine whether `ite(f, g, h)` is a constant without constructing
    /// the result. Returns `None` when the result is (or may be)
    /// non-constant.
    pub fn ite_constant(&self, f: Ref, g: Ref, h: Ref) -> Option<bool> {
        if self.is_one(f) {
            return self.maybe_constant(g);
        }
        if self.is_zero(f) {
            return self.maybe_constant(h);
        }

        if g == h {
            return self.maybe_constant(g);
        }
        if self.is_one(g) && h == -f {
            return Some(true);
        }
        if g == f && self.is_one(h) {
            return Some(true);
        }
        if g == -f && self.is_zero(h) {
            return Some(false);
        }
        if self.is_zero(g) && h == f {
            return Some(false);
        }
        if (self.is_one(g) && self.is_zero(h)) || (self.is_zero(g) && self.is_one(h)) {
            return None;
        }

        // A cached ITE result decides the question immediately.
        if let Some(&res) = self.cache.borrow().get(&OpKey::Ite(f, g, h)) {
            return self.maybe_constant(res);
        }

        let i = self.variable(f.index());
        let j = self.variable(g.index());
        let k = self.variable(h.index());
        assert_ne!(i, 0);

        let mut m = i;
        if j != 0 {
            m = m.min(j);
        }
        if k != 0 {
            m = m.min(k);
        }

        let (f0, f1) = self.top_cofactors(f, m);
        let (g0, g1) = self.top_cofactors(g, m);
        let (h0, h1) = self.top_cofactors(h, m);

        let t = self.ite_constant(f1, g1, h1)?;
        let e = self.ite_constant(f0, g0, h0)?;
        if t == e {
            Some(t)
        } else {
            None
        }
    }

    /// Check the tautology `f -> g` without building the implication BDD.
    pub fn is_implies(&self, f: Ref, g: Ref) -> bool {
        self.ite_constant(f, g, self.one) == Some(true)
    }

    pub fn apply_not(&self, f: Ref) -> Ref {
        -f
    }

    pub fn apply_and(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, self.zero)
    }

    pub fn apply_or(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, self.one, v)
    }

    pub fn apply_xor(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, -v, v)
    }

    pub fn apply_eq(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, -v)
    }

    pub fn apply_imply(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, self.one)
    }

    pub fn apply_and_many(&self, nodes: impl IntoIterator<Item = Ref>) -> Ref {
        let mut res = self.one;
        for node in nodes {
            res = self.apply_and(res, node);
        }
        res
    }

    pub fn apply_or_many(&self, nodes: impl IntoIterator<Item = Ref>) -> Ref {
        let mut res = self.zero;
        for node in nodes {
            res = self.apply_or(res, node);
        }
        res
    }

    // f|v<-b
    pub fn substitute(&self, f: Ref, v: u32, b: bool) -> Ref {
        let mut cache = HashMap::new();
        self.substitute_(f, v, b, &mut cache)
    }

    fn substitute_(&self, f: Ref, v: u32, b: bool, cache: &mut HashMap<Ref, Ref>) -> Ref {
        assert_ne!(v, 0, "Variable index should not be zero");

        if self.is_terminal(f) {
            return f;
        }

        let i = self.variable(f.index());

        if v < i {
            // 'f' does not depend on 'v'
            return f;
        }

        if v == i {
            return if b {
                self.high_node(f)
            } else {
                self.low_node(f)
            };
        }

        if let Some(&res) = cache.get(&f) {
            return res;
        }

        let low = self.substitute_(self.low_node(f), v, b, cache);
        let high = self.substitute_(self.high_node(f), v, b, cache);
        let res = self.mk_node(i, low, high);
        cache.insert(f, res);
        res
    }

    // f|v<-g
    pub fn compose(&self, f: Ref, v: u32, g: Ref) -> Ref {
        let mut cache = HashMap::new();
        self.compose_(f, v, g, &mut cache)
    }

    fn compose_(&self, f: Ref, v: u32, g: Ref, cache: &mut HashMap<Ref, Ref>) -> Ref {
        if self.is_terminal(f) {
            return f;
        }

        let i = self.variable(f.index());
        if v < i {
            // 'f' does not depend on 'v'
            return f;
        }

        if let Some(&res) = cache.get(&f) {
            return res;
        }

        let res = if v == i {
            self.apply_ite(g, self.high_node(f), self.low_node(f))
        } else {
            let low = self.compose_(self.low_node(f), v, g, cache);
            let high = self.compose_(self.high_node(f), v, g, cache);
            self.apply_ite(self.mk_var(i), high, low)
        };
        cache.insert(f, res);
        res
    }

    /// Simultaneous substitution: replace every variable `v` of `f` by
    /// `vector[v-1]`. Variables beyond the vector map to themselves.
    pub fn compose_vector(&self, f: Ref, vector: &[Ref]) -> Ref {
        let mut cache = HashMap::new();
        self.compose_vector_(f, vector, &mut cache)
    }

    fn compose_vector_(&self, f: Ref, vector: &[Ref], cache: &mut HashMap<Ref, Ref>) -> Ref {
        if self.is_terminal(f) {
            return f;
        }
        if let Some(&res) = cache.get(&f) {
            return res;
        }

        let v = self.variable(f.index());
        let low = self.compose_vector_(self.low_node(f), vector, cache);
        let high = self.compose_vector_(self.high_node(f), vector, cache);
        let g = vector
            .get(v as usize - 1)
            .copied()
            .unwrap_or_else(|| self.mk_var(v));
        let res = self.apply_ite(g, high, low);
        cache.insert(f, res);
        res
    }

    /// Existential quantification over `cube`, a conjunction of positive
    /// variables.
    pub fn exists(&self, f: Ref, cube: Ref) -> Ref {
        debug_assert!(!cube.is_negated() || self.is_one(cube));

        if self.is_terminal(f) || self.is_one(cube) {
            return f;
        }

        let u = self.variable(cube.index());
        let v = self.variable(f.index());
        let cube_rest = self.high(cube.index());

        if u < v {
            // 'f' does not depend on 'u': skip it.
            return self.exists(f, cube_rest);
        }

        let key = OpKey::Exists(f, cube);
        if let Some(&res) = self.cache.borrow().get(&key) {
            return res;
        }

        let (f0, f1) = self.top_cofactors(f, v);
        let res = if u == v {
            let e0 = self.exists(f0, cube_rest);
            let e1 = self.exists(f1, cube_rest);
            self.apply_or(e0, e1)
        } else {
            let e0 = self.exists(f0, cube);
            let e1 = self.exists(f1, cube);
            self.mk_node(v, e0, e1)
        };
        self.cache.borrow_mut().insert(key, res);
        res
    }

    /// Universal quantification over `cube`, a conjunction of positive
    /// variables.
    pub fn forall(&self, f: Ref, cube: Ref) -> Ref {
        -self.exists(-f, cube)
    }

    /// Constrain (generalized cofactor): `f|g` agrees with `f` wherever `g`
    /// holds.
    pub fn constrain(&self, f: Ref, g: Ref) -> Ref {
        if self.is_zero(g) {
            return self.zero;
        }
        if self.is_one(g) || self.is_terminal(f) {
            return f;
        }
        if f == g {
            return self.one;
        }
        if f == -g {
            return self.zero;
        }

        let key = OpKey::Constrain(f, g);
        if let Some(&res) = self.cache.borrow().get(&key) {
            return res;
        }

        let i = self.variable(f.index());
        let j = self.variable(g.index());
        let v = i.min(j);

        let (f0, f1) = self.top_cofactors(f, v);
        let (g0, g1) = self.top_cofactors(g, v);

        if self.is_zero(g1) {
            return self.constrain(f0, g0);
        }
        if self.is_zero(g0) {
            return self.constrain(f1, g1);
        }

        let res = if f0 == f1 {
            let low = self.constrain(f, g0);
            let high = self.constrain(f, g1);
            self.mk_node(v, low, high)
        } else {
            let low = self.constrain(f0, g0);
            let high = self.constrain(f1, g1);
            self.mk_node(v, low, high)
        };

        self.cache.borrow_mut().insert(key, res);
        res
    }

    /// Coudert-Madre restrict: minimize `f` against the care set `c`.
    ///
    /// Unlike [`constrain`][Bdd::constrain], variables of the care set that
    /// `f` does not depend on are quantified away first, so the result never
    /// picks up spurious dependencies.
    pub fn restrict(&self, f: Ref, c: Ref) -> Ref {
        if self.is_zero(c) {
            return self.zero;
        }
        if self.is_one(c) || self.is_terminal(f) {
            return f;
        }
        if f == c {
            return self.one;
        }
        if f == -c {
            return self.zero;
        }

        let key = OpKey::Restrict(f, c);
        if let Some(&res) = self.cache.borrow().get(&key) {
            return res;
        }

        let i = self.variable(f.index());
        let j = self.variable(c.index());

        let res = if j < i {
            // 'f' does not depend on the top variable of the care set.
            let (c0, c1) = self.top_cofactors(c, j);
            self.restrict(f, self.apply_or(c0, c1))
        } else {
            let (f0, f1) = self.top_cofactors(f, i);
            let (c0, c1) = self.top_cofactors(c, i);
            if self.is_zero(c1) {
                self.restrict(f0, c0)
            } else if self.is_zero(c0) {
                self.restrict(f1, c1)
            } else {
                let low = self.restrict(f0, c0);
                let high = self.restrict(f1, c1);
                self.mk_node(i, low, high)
            }
        };

        self.cache.borrow_mut().insert(key, res);
        res
    }

    fn descendants(&self, nodes: impl IntoIterator<Item = Ref>) -> HashSet<usize> {
        let mut visited = HashSet::new();
        visited.insert(self.one.index());
        let mut queue = VecDeque::from_iter(nodes);

        while let Some(node) = queue.pop_front() {
            let i = node.index();
            if visited.insert(i) {
                queue.push_back(self.low(i));
                queue.push_back(self.high(i));
            }
        }

        visited
    }

    /// Number of nodes in the DAG rooted at `f` (including the terminal).
    pub fn size(&self, f: Ref) -> u64 {
        self.descendants([f]).len() as u64
    }

    /// Variables the function depends on, in ascending order.
    pub fn support(&self, f: Ref) -> Vec<u32> {
        let mut vars: Vec<u32> = self
            .descendants([f])
            .into_iter()
            .map(|i| self.variable(i))
            .filter(|&v| v != 0)
            .collect();
        vars.sort_unstable();
        vars.dedup();
        vars
    }

    /// Number of satisfying assignments over `variables`, which must be
    /// sorted ascending and contain the support of `f`.
    pub fn sat_count(&self, f: Ref, variables: &[u32]) -> BigUint {
        debug_assert!(variables.windows(2).all(|w| w[0] < w[1]));
        let mut cache = HashMap::new();
        self.sat_count_(f, variables, 0, &mut cache)
    }

    fn sat_count_(
        &self,
        f: Ref,
        variables: &[u32],
        pos: usize,
        cache: &mut HashMap<(Ref, usize), BigUint>,
    ) -> BigUint {
        if self.is_zero(f) {
            return BigUint::ZERO;
        }
        if pos == variables.len() {
            assert!(self.is_one(f), "support of f exceeds the variable list");
            return BigUint::from(1u32);
        }
        if let Some(count) = cache.get(&(f, pos)) {
            return count.clone();
        }

        let (f0, f1) = self.top_cofactors(f, variables[pos]);
        let count = self.sat_count_(f0, variables, pos + 1, cache)
            + self.sat_count_(f1, variables, pos + 1, cache);
        cache.insert((f, pos), count.clone());
        count
    }

    /// Evaluate `f` under a total assignment of its support.
    pub fn eval(&self, f: Ref, assignment: &HashMap<u32, bool>) -> bool {
        let mut node = f;
        while !self.is_terminal(node) {
            let v = self.variable(node.index());
            let value = *assignment
                .get(&v)
                .unwrap_or_else(|| panic!("no value for variable {}", v));
            node = if value {
                self.high_node(node)
            } else {
                self.low_node(node)
            };
        }
        self.is_one(node)
    }

    pub fn to_bracket_string(&self, node: Ref) -> String {
        if self.is_zero(node) {
            return "(0)".to_string();
        } else if self.is_one(node) {
            return "(1)".to_string();
        }

        let v = self.variable(node.index());
        let low = self.low_node(node);
        let high = self.high_node(node);

        format!(
            "{}:(x{}, {}, {})",
            node,
            v,
            self.to_bracket_string(high),
            self.to_bracket_string(low)
        )
    }

    pub fn log_stats(&self) {
        let cache = self.cache.borrow();
        debug!(
            "bdd: {} nodes, {} vars, cache {} hits / {} misses",
            self.storage.borrow().size(),
            self.num_vars.get(),
            cache.hits(),
            cache.misses(),
        );
    }
}
