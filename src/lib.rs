//! Safety synthesis for AIGER circuits.
//!
//! An instance is an and-inverter circuit whose inputs are split between the
//! environment and the controller (inputs named `controllable_*`) and whose
//! single output flags an error. The crate decides whether the controller
//! can keep the error low forever and, if so, synthesizes circuit logic for
//! the controllable inputs.
//!
//! The pipeline lives in [`synth::run`]: the circuit becomes a symbolic game
//! over an in-crate BDD engine ([`bdd`]), the winning region is a backward
//! fixpoint ([`solver`]), strategies are read off the region ([`strategy`])
//! and encoded back into gates ([`encode`]).

pub mod aiger;
pub mod bdd;
pub mod cache;
pub mod encode;
pub mod error;
pub mod game;
pub mod minimize;
pub mod reference;
pub mod solver;
pub mod strategy;
pub mod synth;
pub mod table;
pub mod utils;
