//! Backward fixpoint computation of the winning region.

use log::{debug, info};

use crate::game::SafetyGame;
use crate::reference::Ref;

/// Who moves last within a step.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum GameSemantics {
    /// The controller sees the environment inputs of the current step
    /// before choosing its own.
    #[default]
    Mealy,
    /// The controller commits to its inputs first.
    Moore,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SolveResult {
    /// The system player wins from every initial state; the payload is the
    /// winning region over latch variables.
    Realizable(Ref),
    Unrealizable,
}

pub struct SafetyGameSolver<'a> {
    game: SafetyGame<'a>,
    semantics: GameSemantics,
    controllable_cube: Ref,
    uncontrollable_cube: Ref,
}

impl<'a> SafetyGameSolver<'a> {
    pub fn new(game: SafetyGame<'a>, semantics: GameSemantics) -> Self {
        let bdd = game.bdd;
        let controllable_cube = bdd.apply_and_many(game.controllables.iter().copied());
        let uncontrollable_cube = bdd.apply_and_many(game.uncontrollables.iter().copied());
        Self {
            game,
            semantics,
            controllable_cube,
            uncontrollable_cube,
        }
    }

    pub fn game(&self) -> &SafetyGame<'a> {
        &self.game
    }

    pub fn into_game(self) -> SafetyGame<'a> {
        self.game
    }

    /// States from which the system can force the play into `states` in one
    /// step while staying safe.
    pub fn pre_system(&self, states: Ref) -> Ref {
        let bdd = self.game.bdd;
        let next = bdd.compose_vector(states, &self.game.compose);
        let safe_next = bdd.apply_and(next, self.game.safety_condition);
        match self.semantics {
            GameSemantics::Mealy => {
                let system = bdd.exists(safe_next, self.controllable_cube);
                bdd.forall(system, self.uncontrollable_cube)
            }
            GameSemantics::Moore => {
                let environment = bdd.forall(safe_next, self.uncontrollable_cube);
                bdd.exists(environment, self.controllable_cube)
            }
        }
    }

    /// Greatest fixpoint of `pre_system`, starting from all states. Returns
    /// early as unrealizable once an initial state falls out.
    pub fn solve(&self) -> SolveResult {
        let bdd = self.game.bdd;
        let mut safe = bdd.one;
        let mut round = 0u32;

        loop {
            round += 1;
            let fixpoint = safe;
            safe = bdd.apply_and(safe, self.pre_system(safe));
            debug!("round {}: winning region {} nodes", round, bdd.size(safe));

            if !bdd.is_implies(self.game.initial, safe) {
                info!("initial state lost after {} rounds", round);
                return SolveResult::Unrealizable;
            }
            if safe == fixpoint {
                break;
            }
        }

        let latch_vars: Vec<u32> = self
            .game
            .latches
            .iter()
            .map(|l| bdd.variable(l.index()))
            .collect();
        let mut latch_vars_sorted = latch_vars;
        latch_vars_sorted.sort_unstable();
        info!(
            "fixpoint after {} rounds, {} of 2^{} latch states winning",
            round,
            bdd.sat_count(safe, &latch_vars_sorted),
            latch_vars_sorted.len(),
        );

        SolveResult::Realizable(safe)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::aiger::Aig;
    use crate::bdd::Bdd;
    use crate::game::VarOrder;

    fn solve(text: &str, semantics: GameSemantics) -> (Bdd, SolveResult) {
        let aig = Aig::parse(text).unwrap();
        let bdd = Bdd::default();
        let result = {
            let game = SafetyGame::from_aig(&bdd, &aig, VarOrder::default()).unwrap();
            SafetyGameSolver::new(game, semantics).solve()
        };
        (bdd, result)
    }

    // busy' = request; error = busy AND NOT grant. The controller can always
    // grant, so the game is realizable.
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

    // The error output is the constant TRUE literal.
    const DOOMED: &str = "\
aag 2 2 0 1 0
2
4
1
i0 request
i1 controllable_grant
";

    // No controllable inputs at all; the latch keeps its value and starts
    // safe, so the game is trivially realizable.
    const PASSIVE: &str = "\
aag 1 0 1 1 0
2 2
2
l0 stuck
o0 error
";

    #[test]
    fn test_realizable() {
        let (bdd, result) = solve(ARBITER, GameSemantics::Mealy);
        match result {
            SolveResult::Realizable(region) => {
                assert!(!bdd.is_zero(region));
            }
            SolveResult::Unrealizable => panic!("expected realizable"),
        }
    }

    #[test]
    fn test_unrealizable() {
        let (_, result) = solve(DOOMED, GameSemantics::Mealy);
        assert_eq!(result, SolveResult::Unrealizable);
    }

    #[test]
    fn test_no_controllables() {
        let (bdd, result) = solve(PASSIVE, GameSemantics::Mealy);
        match result {
            SolveResult::Realizable(region) => {
                // Exactly the states with the latch low are winning.
                let latch = bdd.mk_var(1);
                assert_eq!(region, -latch);
            }
            SolveResult::Unrealizable => panic!("expected realizable"),
        }
    }

    #[test]
    fn test_winning_region_is_fixpoint() {
        let aig = Aig::parse(ARBITER).unwrap();
        let bdd = Bdd::default();
        let game = SafetyGame::from_aig(&bdd, &aig, VarOrder::default()).unwrap();
        let solver = SafetyGameSolver::new(game, GameSemantics::Mealy);

        let region = match solver.solve() {
            SolveResult::Realizable(region) => region,
            SolveResult::Unrealizable => panic!("expected realizable"),
        };
        assert_eq!(bdd.apply_and(region, solver.pre_system(region)), region);
        assert!(bdd.is_implies(solver.game().initial, region));
    }

    #[test]
    fn test_rounds_are_monotone() {
        let aig = Aig::parse(ARBITER).unwrap();
        let bdd = Bdd::default();
        let game = SafetyGame::from_aig(&bdd, &aig, VarOrder::default()).unwrap();
        let solver = SafetyGameSolver::new(game, GameSemantics::Mealy);

        let mut safe = bdd.one;
        for _ in 0..8 {
            let next = bdd.apply_and(safe, solver.pre_system(safe));
            assert!(bdd.is_implies(next, safe));
            if next == safe {
                break;
            }
            safe = next;
        }
    }

    #[test]
    fn test_moore_agrees_on_arbiter() {
        // With Mealy semantics the controller may react to the current
        // request; granting unconditionally also works, so the Moore game is
        // realizable too.
        let (_, result) = solve(ARBITER, GameSemantics::Moore);
        assert!(matches!(result, SolveResult::Realizable(_)));
    }
}
