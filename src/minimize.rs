//! Optional circuit minimization through an external ABC binary.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use log::{debug, info};

use crate::aiger::Aig;
use crate::error::{Result, SynthError};

pub struct AbcMinimizer {
    command: PathBuf,
}

impl AbcMinimizer {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Run the circuit through ABC's rewriting passes. Heavier passes are
    /// only enabled for circuits small enough to finish in reasonable time.
    pub fn minimize(&self, aig: &Aig) -> Result<Aig> {
        let dir = tempfile::tempdir().map_err(|source| SynthError::Io {
            path: std::env::temp_dir(),
            source,
        })?;
        let input = dir.path().join("circuit.aag");
        let output = dir.path().join("minimized.aag");
        fs::write(&input, aig.to_aag_string()).map_err(|source| SynthError::Io {
            path: input.clone(),
            source,
        })?;

        let mut script = format!("read {}; strash; refactor -zl; rewrite -zl;", input.display());
        if aig.ands.len() < 1_000_000 {
            script += " refactor -zl; rewrite -zl;";
        }
        if aig.ands.len() < 200_000 {
            script += " dfraig; rewrite -zl; dfraig;";
        }
        script += &format!(" write {};", output.display());
        debug!("abc script: {}", script);

        let result = Command::new(&self.command)
            .arg("-q")
            .arg(&script)
            .output()
            .map_err(|e| {
                SynthError::ExternalTool(format!("could not run '{}': {}", self.command.display(), e))
            })?;
        if !result.status.success() {
            return Err(SynthError::ExternalTool(format!(
                "'{}' exited with {}: {}",
                self.command.display(),
                result.status,
                String::from_utf8_lossy(&result.stderr).trim(),
            )));
        }

        let minimized = Aig::read_from_file(&output)?;
        info!(
            "abc: {} and-gates down to {}",
            aig.ands.len(),
            minimized.ands.len()
        );
        Ok(minimized)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_missing_binary() {
        let minimizer = AbcMinimizer::new("definitely-not-an-abc-binary");
        let err = minimizer.minimize(&Aig::new()).unwrap_err();
        assert!(matches!(err, SynthError::ExternalTool(_)));
    }

    #[test]
    fn test_failing_binary() {
        let minimizer = AbcMinimizer::new("false");
        let err = minimizer.minimize(&Aig::new()).unwrap_err();
        assert!(matches!(err, SynthError::ExternalTool(_)));
    }
}
