//! Extraction of a deterministic controller strategy from the winning
//! region.
//!
//! The nondeterministic strategy relation admits every controllable
//! assignment that keeps the play inside the winning region. It is resolved
//! one controllable at a time: wherever the relation forces a value the
//! function takes it, and on the remaining don't-care states the function is
//! minimized against the care set so the resulting BDDs stay small.

use log::debug;

use crate::game::SafetyGame;
use crate::reference::Ref;

/// How to resolve states where neither value of a controllable is forced.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum DontCareDefault {
    /// Pick whichever restricted function has the smaller BDD.
    #[default]
    Auto,
    ForceTrue,
    ForceFalse,
}

pub struct StrategyExtractor<'a> {
    game: &'a SafetyGame<'a>,
    dont_care: DontCareDefault,
}

impl<'a> StrategyExtractor<'a> {
    pub fn new(game: &'a SafetyGame<'a>, dont_care: DontCareDefault) -> Self {
        Self { game, dont_care }
    }

    /// Compute one function per controllable, parallel to
    /// `game.controllables`. Each function is over latch and uncontrollable
    /// variables only.
    pub fn extract(&self, winning_region: Ref) -> Vec<Ref> {
        let bdd = self.game.bdd;

        // All moves that stay within the winning region and avoid the error.
        let next = bdd.compose_vector(winning_region, &self.game.compose);
        let mut relation = bdd.apply_and(next, self.game.safety_condition);

        let mut strategies = Vec::with_capacity(self.game.controllables.len());

        for (pos, &controllable) in self.game.controllables.iter().enumerate() {
            let v = bdd.variable(controllable.index());

            // Project away the other controllables; they are resolved in
            // their own iterations.
            let others = bdd.apply_and_many(
                self.game
                    .controllables
                    .iter()
                    .copied()
                    .filter(|&c| c != controllable),
            );
            let local = bdd.exists(relation, others);

            let can_true = bdd.substitute(local, v, true);
            let can_false = bdd.substitute(local, v, false);
            let must_true = bdd.apply_and(can_true, -can_false);
            let must_false = bdd.apply_and(can_false, -can_true);

            let care = bdd.apply_and(winning_region, bdd.apply_or(must_true, must_false));

            let model_true = bdd.restrict(must_true, care);
            let model_false = bdd.restrict(-must_false, care);

            let model = match self.dont_care {
                DontCareDefault::Auto => {
                    if bdd.size(model_true) < bdd.size(model_false) {
                        model_true
                    } else {
                        model_false
                    }
                }
                DontCareDefault::ForceTrue => model_true,
                DontCareDefault::ForceFalse => model_false,
            };

            debug!(
                "strategy for controllable {}: {} nodes",
                pos,
                bdd.size(model)
            );

            // Commit the choice so later controllables see it.
            relation = bdd.apply_and(relation, bdd.apply_eq(bdd.mk_var(v), model));
            strategies.push(model);
        }

        strategies
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::aiger::Aig;
    use crate::bdd::Bdd;
    use crate::game::VarOrder;
    use crate::solver::{GameSemantics, SafetyGameSolver, SolveResult};

    const ARBITER: &str = "\
aag 4 2 1 1 1
2
4
6 2
8
8 6 5
i0 request
i1 controllable_grant
l0 busy
o0 error
";

    // Two controllables: error when busy and the grants disagree with
    // (grant_a AND grant_b). Forces both to be high whenever busy.
    const TWO_GRANTS: &str = "\
aag 6 3 1 1 2
2
4
6
8 2
12
10 4 6
12 8 11
i0 request
i1 controllable_grant_a
i2 controllable_grant_b
l0 busy
o0 error
";

    fn winning_region<'a>(bdd: &'a Bdd, text: &str) -> (SafetyGame<'a>, Ref) {
        let aig = Aig::parse(text).unwrap();
        let game = SafetyGame::from_aig(bdd, &aig, VarOrder::default()).unwrap();
        let solver = SafetyGameSolver::new(game, GameSemantics::Mealy);
        let region = match solver.solve() {
            SolveResult::Realizable(region) => region,
            SolveResult::Unrealizable => panic!("expected realizable"),
        };
        (solver.into_game(), region)
    }

    /// Strategies substituted into the game must keep every winning state
    /// winning for all environment moves.
    fn assert_strategies_win(game: &SafetyGame<'_>, region: Ref, strategies: &[Ref]) {
        let bdd = game.bdd;

        let next = bdd.compose_vector(region, &game.compose);
        let mut step = bdd.apply_and(next, game.safety_condition);
        for (&c, &model) in game.controllables.iter().zip(strategies) {
            let v = bdd.variable(c.index());
            step = bdd.compose(step, v, model);
        }

        let uncontrollable_cube = bdd.apply_and_many(game.uncontrollables.iter().copied());
        let forced = bdd.forall(step, uncontrollable_cube);
        assert!(bdd.is_implies(region, forced));
    }

    #[test]
    fn test_strategy_wins_arbiter() {
        let bdd = Bdd::default();
        let (game, region) = winning_region(&bdd, ARBITER);

        let strategies = StrategyExtractor::new(&game, DontCareDefault::Auto).extract(region);
        assert_eq!(strategies.len(), 1);
        assert_strategies_win(&game, region, &strategies);
    }

    #[test]
    fn test_strategy_leaves_only_state_variables() {
        let bdd = Bdd::default();
        let (game, region) = winning_region(&bdd, TWO_GRANTS);

        let strategies = StrategyExtractor::new(&game, DontCareDefault::Auto).extract(region);
        assert_eq!(strategies.len(), 2);
        assert_strategies_win(&game, region, &strategies);

        let controllable_vars: Vec<u32> = game
            .controllables
            .iter()
            .map(|c| bdd.variable(c.index()))
            .collect();
        for &model in &strategies {
            for v in bdd.support(model) {
                assert!(!controllable_vars.contains(&v));
            }
        }
    }

    #[test]
    fn test_forced_values_are_taken() {
        let bdd = Bdd::default();
        let (game, region) = winning_region(&bdd, ARBITER);
        let busy = game.latches[0];

        for dont_care in [
            DontCareDefault::Auto,
            DontCareDefault::ForceTrue,
            DontCareDefault::ForceFalse,
        ] {
            let strategies = StrategyExtractor::new(&game, dont_care).extract(region);
            // When busy is high the grant is forced high.
            assert!(bdd.is_implies(busy, strategies[0]));
            assert_strategies_win(&game, region, &strategies);
        }
    }
}
