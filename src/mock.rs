//! Mock external process for testing
//!
//! Records every invocation and replays scripted outcomes per program name,
//! including failure injection and filesystem side effects (PACKMOL declares
//! success by leaving its output file behind, so the mock can be told to
//! create files when it "runs").

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::process::{ExternalProcess, Invocation, ProcessError, ProcessOutput};

/// Scripted outcome for one program.
#[derive(Debug, Clone)]
pub struct MockOutcome {
    /// Exit code to report.
    pub exit_code: i32,
    /// Canned stdout.
    pub stdout: String,
    /// Canned stderr.
    pub stderr: String,
    /// Files to create (empty) when the program runs, resolved against the
    /// invocation cwd when relative.
    pub creates: Vec<PathBuf>,
    /// Number of invocations that fail before the outcome flips to a clean
    /// success that applies `creates` (None = always this outcome).
    pub fail_count: Option<u32>,
}

impl MockOutcome {
    /// Outcome that exits 0 with empty streams.
    pub fn success() -> Self {
        Self {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            creates: Vec::new(),
            fail_count: None,
        }
    }

    /// Outcome that exits 0 and prints the given stdout.
    pub fn success_with_stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::success()
        }
    }

    /// Outcome that exits nonzero with the given stderr.
    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            creates: Vec::new(),
            fail_count: None,
        }
    }

    /// Also create the given file when the program runs.
    pub fn creating(mut self, path: impl Into<PathBuf>) -> Self {
        self.creates.push(path.into());
        self
    }

    /// Fail only for the first `count` invocations of this program.
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }
}

/// Recording fake for [`ExternalProcess`].
#[derive(Debug, Default)]
pub struct MockProcess {
    outcomes: Mutex<HashMap<String, MockOutcome>>,
    call_counts: Mutex<HashMap<String, u32>>,
    invocations: Mutex<Vec<Invocation>>,
}

impl MockProcess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the outcome for every invocation of `program`.
    pub fn script(&self, program: impl Into<String>, outcome: MockOutcome) {
        self.outcomes.lock().unwrap().insert(program.into(), outcome);
    }

    /// All invocations recorded so far, in order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Invocations of a single program, in order.
    pub fn invocations_of(&self, program: &str) -> Vec<Invocation> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|inv| inv.program == program)
            .cloned()
            .collect()
    }

    /// Number of times `program` was invoked.
    pub fn call_count(&self, program: &str) -> u32 {
        *self.call_counts.lock().unwrap().get(program).unwrap_or(&0)
    }
}

impl ExternalProcess for MockProcess {
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ProcessError> {
        self.invocations.lock().unwrap().push(invocation.clone());

        let count = {
            let mut counts = self.call_counts.lock().unwrap();
            let entry = counts.entry(invocation.program.clone()).or_insert(0);
            *entry += 1;
            *entry
        };

        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .get(&invocation.program)
            .cloned()
            // Unscripted programs succeed silently.
            .unwrap_or_else(MockOutcome::success);

        // While the fail budget lasts, report the scripted failure without
        // side effects; afterwards flip to a clean success that still
        // leaves the scripted files behind.
        if let Some(limit) = outcome.fail_count {
            if count <= limit {
                return Ok(ProcessOutput {
                    exit_code: outcome.exit_code,
                    stdout: outcome.stdout,
                    stderr: outcome.stderr,
                });
            }
        }

        for file in &outcome.creates {
            let target = if file.is_absolute() {
                file.clone()
            } else {
                match invocation.cwd {
                    Some(ref cwd) => cwd.join(file),
                    None => file.clone(),
                }
            };
            if let Some(parent) = target.parent() {
                let _ = fs::create_dir_all(parent);
            }
            let _ = fs::write(&target, b"");
        }

        if outcome.fail_count.is_some() {
            // Fail budget exhausted.
            return Ok(ProcessOutput {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
            });
        }

        Ok(ProcessOutput {
            exit_code: outcome.exit_code,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unscripted_program_succeeds() {
        let mock = MockProcess::new();
        let out = mock.run(&Invocation::new("obabel", &["a", "-O", "b"])).unwrap();

        assert!(out.success());
        assert_eq!(mock.call_count("obabel"), 1);
    }

    #[test]
    fn test_scripted_failure() {
        let mock = MockProcess::new();
        mock.script("obabel", MockOutcome::failure(1, "cannot read input"));

        let out = mock.run(&Invocation::new("obabel", &[])).unwrap();
        assert_eq!(out.exit_code, 1);
        assert_eq!(out.stderr, "cannot read input");
    }

    #[test]
    fn test_fail_count_flips_to_success() {
        let mock = MockProcess::new();
        mock.script("sbatch", MockOutcome::failure(1, "busy").with_fail_count(2));

        assert!(!mock.run(&Invocation::new("sbatch", &[])).unwrap().success());
        assert!(!mock.run(&Invocation::new("sbatch", &[])).unwrap().success());
        assert!(mock.run(&Invocation::new("sbatch", &[])).unwrap().success());
    }

    #[test]
    fn test_creates_files_relative_to_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockProcess::new();
        mock.script("packmol", MockOutcome::success().creating("water_water.pdb"));

        mock.run(&Invocation::new("packmol", &[]).with_cwd(dir.path())).unwrap();

        assert!(dir.path().join("water_water.pdb").exists());
    }

    #[test]
    fn test_records_invocations_in_order() {
        let mock = MockProcess::new();
        mock.run(&Invocation::new("obabel", &["x"])).unwrap();
        mock.run(&Invocation::new("packmol", &[])).unwrap();

        let all = mock.invocations();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].program, "obabel");
        assert_eq!(all[1].program, "packmol");
        assert_eq!(mock.invocations_of("packmol").len(), 1);
    }
}
