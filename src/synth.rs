//! End-to-end synthesis pipeline: game construction, solving, strategy
//! extraction and controller encoding.

use log::info;

use crate::aiger::Aig;
use crate::bdd::Bdd;
use crate::encode::CircuitEncoder;
use crate::error::Result;
use crate::game::{combine, SafetyGame, VarOrder};
use crate::minimize::AbcMinimizer;
use crate::reference::Ref;
use crate::solver::{GameSemantics, SafetyGameSolver, SolveResult};
use crate::strategy::{DontCareDefault, StrategyExtractor};

pub struct SynthesisConfig {
    pub var_order: VarOrder,
    pub semantics: GameSemantics,
    pub dont_care: DontCareDefault,
    pub minimizer: Option<AbcMinimizer>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            var_order: VarOrder::default(),
            semantics: GameSemantics::default(),
            dont_care: DontCareDefault::default(),
            minimizer: None,
        }
    }
}

/// Build the controller circuit from the extracted strategies. Its inputs
/// are the uncontrollable and latch signals of the original instance, its
/// outputs the controllable inputs; all are named by their original AIGER
/// literal so the circuits can be spliced back together.
fn encode_controller(game: &SafetyGame<'_>, strategies: &[Ref]) -> Result<Aig> {
    let bdd = game.bdd;
    let mut encoder = CircuitEncoder::new(bdd);

    for (&var, &lit) in game.uncontrollables.iter().zip(&game.uncontrollable_lits) {
        encoder.add_input(bdd.variable(var.index()), Some(&lit.to_string()));
    }
    for (&var, &lit) in game.latches.iter().zip(&game.latch_lits) {
        encoder.add_input(bdd.variable(var.index()), Some(&lit.to_string()));
    }

    for (&model, &lit) in strategies.iter().zip(&game.controllable_lits) {
        let function = encoder.encode(model)?;
        encoder.add_output(function, &lit.normalized().to_string());
    }

    Ok(encoder.finish())
}

/// Encode the winning region as a combinational circuit over the latch
/// signals.
fn encode_winning_region(game: &SafetyGame<'_>, region: Ref) -> Result<Aig> {
    let bdd = game.bdd;
    let mut encoder = CircuitEncoder::new(bdd);

    for &var in &game.latches {
        encoder.add_input(bdd.variable(var.index()), None);
    }
    let function = encoder.encode(region)?;
    encoder.add_output(function, "winning region");

    Ok(encoder.finish())
}

/// Decide realizability of `aig` and return the text to print on stdout.
///
/// Without `synthesize` the payload is a single verdict line. With it, a
/// realizable instance yields the original circuit with the controllable
/// inputs driven by synthesized logic, followed by the winning region.
pub fn run(aig: &Aig, config: &SynthesisConfig, synthesize: bool) -> Result<String> {
    let bdd = Bdd::new(20);
    let game = SafetyGame::from_aig(&bdd, aig, config.var_order)?;
    let solver = SafetyGameSolver::new(game, config.semantics);

    let region = match solver.solve() {
        SolveResult::Unrealizable => return Ok("unrealizable\n".to_string()),
        SolveResult::Realizable(region) => region,
    };
    if !synthesize {
        return Ok("realizable\n".to_string());
    }

    let game = solver.into_game();
    let strategies = StrategyExtractor::new(&game, config.dont_care).extract(region);

    let mut controller = encode_controller(&game, &strategies)?;
    info!("controller: {} and-gates", controller.ands.len());
    if let Some(minimizer) = &config.minimizer {
        controller = minimizer.minimize(&controller)?;
    }

    let mut combined = combine(aig, &controller)?;
    combined.comments.push("realizable".to_string());

    let region_aig = encode_winning_region(&game, region)?;
    bdd.log_stats();

    Ok(format!(
        "{}\nWINNING_REGION\n{}",
        combined.to_aag_string(),
        region_aig.to_aag_string()
    ))
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

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

    const DOOMED: &str = "\
aag 2 2 0 1 0
2
4
1
i0 request
i1 controllable_grant
";

    #[test]
    fn test_verdict_only() {
        let aig = Aig::parse(ARBITER).unwrap();
        let out = run(&aig, &SynthesisConfig::default(), false).unwrap();
        assert_eq!(out, "realizable\n");

        let aig = Aig::parse(DOOMED).unwrap();
        let out = run(&aig, &SynthesisConfig::default(), false).unwrap();
        assert_eq!(out, "unrealizable\n");
    }

    #[test]
    fn test_unrealizable_ignores_synthesize() {
        let aig = Aig::parse(DOOMED).unwrap();
        let out = run(&aig, &SynthesisConfig::default(), true).unwrap();
        assert_eq!(out, "unrealizable\n");
    }

    #[test]
    fn test_synthesized_controller_is_safe() {
        let aig = Aig::parse(ARBITER).unwrap();
        let out = run(&aig, &SynthesisConfig::default(), true).unwrap();

        // A blank line separates the circuit from the winning-region block.
        assert!(out.contains("\n\nWINNING_REGION\n"));

        let (combined_text, region_text) = out.split_once("\nWINNING_REGION\n").unwrap();
        let combined = Aig::parse(combined_text).unwrap();
        assert!(combined.comments.contains(&"realizable".to_string()));
        assert_eq!(combined.inputs.len(), 1);
        assert_eq!(combined.outputs.len(), 1);

        let region = Aig::parse(region_text).unwrap();
        assert_eq!(region.inputs.len(), 1);
        assert_eq!(region.outputs[0].name.as_deref(), Some("winning region"));

        // Exhaust all input sequences of length 4 from the initial state:
        // the error output must stay low.
        let mut states = vec![vec![false; combined.latches.len()]];
        for _ in 0..4 {
            let mut next_states = Vec::new();
            for state in &states {
                for request in [false, true] {
                    let (outputs, next) = combined.evaluate(&[request], state);
                    assert_eq!(outputs, vec![false]);
                    next_states.push(next);
                }
            }
            states = next_states;
        }
    }

    #[test]
    fn test_alt_order_agrees() {
        let aig = Aig::parse(ARBITER).unwrap();
        let config = SynthesisConfig {
            var_order: VarOrder::LatchesThenInputs,
            ..SynthesisConfig::default()
        };
        assert_eq!(run(&aig, &config, false).unwrap(), "realizable\n");

        let out = run(&aig, &config, true).unwrap();
        let (combined_text, _) = out.split_once("\nWINNING_REGION\n").unwrap();
        let combined = Aig::parse(combined_text).unwrap();
        let (outputs, _) = combined.evaluate(&[true], &[true]);
        assert_eq!(outputs, vec![false]);
    }

    #[test]
    fn test_moore_semantics() {
        let aig = Aig::parse(ARBITER).unwrap();
        let config = SynthesisConfig {
            semantics: GameSemantics::Moore,
            ..SynthesisConfig::default()
        };
        assert_eq!(run(&aig, &config, false).unwrap(), "realizable\n");
    }

    #[test]
    fn test_no_controllables() {
        // A latch that keeps its value and starts safe.
        let text = "aag 1 0 1 1 0\n2 2\n2\nl0 stuck\no0 error\n";
        let aig = Aig::parse(text).unwrap();
        let out = run(&aig, &SynthesisConfig::default(), true).unwrap();

        let (combined_text, _) = out.split_once("\nWINNING_REGION\n").unwrap();
        let combined = Aig::parse(combined_text).unwrap();
        // Nothing to control: the circuit is unchanged apart from the
        // comment.
        assert!(combined.inputs.is_empty());
        assert_eq!(combined.latches.len(), 1);
        let (outputs, _) = combined.evaluate(&[], &[false]);
        assert_eq!(outputs, vec![false]);
    }
}
