use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::debug;

use aigsynth::aiger::Aig;
use aigsynth::game::VarOrder;
use aigsynth::minimize::AbcMinimizer;
use aigsynth::solver::GameSemantics;
use aigsynth::strategy::DontCareDefault;
use aigsynth::synth::{self, SynthesisConfig};

/// Safety synthesis from AIGER circuits.
///
/// Decides whether the controllable inputs of the instance can always avoid
/// raising the error output, and optionally synthesizes a circuit that does.
#[derive(Parser)]
#[command(author, version)]
struct Cli {
    /// Instance in ASCII AIGER (aag) format.
    instance: Option<PathBuf>,

    /// Output a solution circuit instead of just the verdict.
    #[arg(long)]
    synthesize: bool,

    /// Allocate BDD variables for latches before inputs.
    #[arg(long)]
    alt: bool,

    /// Let the controller choose its outputs before seeing the inputs of the
    /// current step.
    #[arg(long)]
    moore: bool,

    /// Resolve don't-care strategy values to true instead of picking by BDD
    /// size.
    #[arg(long, conflicts_with = "force_false")]
    force_true: bool,

    /// Resolve don't-care strategy values to false.
    #[arg(long)]
    force_false: bool,

    /// Minimize the synthesized controller with this ABC binary.
    #[arg(long, value_name = "PATH")]
    abc: Option<PathBuf>,
}

fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;
    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;

    let cli = Cli::parse();
    let Some(instance) = cli.instance else {
        eprintln!("no instance given");
        return Ok(ExitCode::FAILURE);
    };

    let config = SynthesisConfig {
        var_order: if cli.alt {
            VarOrder::LatchesThenInputs
        } else {
            VarOrder::InputsThenLatches
        },
        semantics: if cli.moore {
            GameSemantics::Moore
        } else {
            GameSemantics::Mealy
        },
        dont_care: if cli.force_true {
            DontCareDefault::ForceTrue
        } else if cli.force_false {
            DontCareDefault::ForceFalse
        } else {
            DontCareDefault::Auto
        },
        minimizer: cli.abc.map(AbcMinimizer::new),
    };

    debug!("reading instance from {}", instance.display());
    let aig = Aig::read_from_file(&instance)?;
    let output = synth::run(&aig, &config, cli.synthesize)?;
    print!("{}", output);

    Ok(ExitCode::SUCCESS)
}
