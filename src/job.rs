//! Job definitions for the packing tool
//!
//! Each pair becomes one packing job: a deterministic job name rendered
//! from the member base names, the tolerance picked by pair kind, and the
//! PACKMOL input text that describes the box. Naming hazards are rejected
//! for the whole run before any external tool is invoked, so a collision
//! can never silently overwrite another job's artifacts.

use std::collections::HashSet;

use thiserror::Error;

use crate::config::PackingConfig;
use crate::pair::{PairKey, PairKind};

/// Separator joining the two member base names into a job name.
pub const NAME_SEPARATOR: char = '_';

/// Coordinate format all packing jobs work in.
pub const PACKING_FILETYPE: &str = "pdb";

/// A fully-resolved packing job, owned by one [`PairKey`].
#[derive(Debug, Clone, PartialEq)]
pub struct JobDefinition {
    /// Rendered job name, `name1_name2` (`name1 == name2` for self-pairs).
    pub name: String,
    /// Packing tolerance; tighter for self-pairs by policy.
    pub tolerance: f64,
    /// Edge length of the cubic packing box.
    pub box_edge: f64,
    /// Member structure filenames, in pair order.
    pub members: [String; 2],
    /// The pair this job was built from.
    pub pair: PairKey,
}

/// Job construction errors. All of these abort the run.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(
        "base name '{0}' contains the job-name separator '{sep}'; \
         pair names would be ambiguous",
        sep = NAME_SEPARATOR
    )]
    SeparatorInName(String),

    #[error("two distinct pairs render the same job name '{0}'")]
    DuplicateJobName(String),
}

impl JobDefinition {
    /// Input filename handed to the packing tool.
    pub fn input_file_name(&self) -> String {
        format!("{}.inp", self.name)
    }

    /// Output filename the packing tool is told to produce; its existence
    /// after the run is the success criterion.
    pub fn output_file_name(&self) -> String {
        format!("{}.{}", self.name, PACKING_FILETYPE)
    }

    /// Render the packing tool's input grammar for this job.
    pub fn render_input(&self) -> String {
        let mut text = String::new();
        text.push_str(&format!("tolerance {}\n", fmt_tolerance(self.tolerance)));
        text.push_str(&format!("filetype {}\n", PACKING_FILETYPE));
        text.push_str(&format!("output {}\n", self.output_file_name()));
        for member in &self.members {
            let edge = fmt_box_edge(self.box_edge);
            text.push('\n');
            text.push_str(&format!("structure {}\n", member));
            text.push_str("  number 1\n");
            text.push_str(&format!("  inside box 0. 0. 0. {edge} {edge} {edge}\n"));
            text.push_str("end structure\n");
        }
        text
    }
}

/// Build the job set for a run.
///
/// Tolerance selection: self-pair gets the same-structure tolerance,
/// cross-pair the strictly looser distinct-structure tolerance. Naming
/// hazards (separator inside a base name, or two pairs rendering the same
/// name) fail the whole set.
pub fn build_job_set(
    pairs: &[PairKey],
    packing: &PackingConfig,
) -> Result<Vec<JobDefinition>, JobError> {
    // Validate member names first so no partial job set escapes.
    for pair in pairs {
        for member in [&pair.first, &pair.second] {
            if member.contains(NAME_SEPARATOR) {
                return Err(JobError::SeparatorInName(member.clone()));
            }
        }
    }

    let mut seen = HashSet::new();
    let mut jobs = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let name = format!("{}{}{}", pair.first, NAME_SEPARATOR, pair.second);
        if !seen.insert(name.clone()) {
            return Err(JobError::DuplicateJobName(name));
        }
        let tolerance = match pair.kind {
            PairKind::SelfPair => packing.tolerance_self,
            PairKind::Cross => packing.tolerance_cross,
        };
        jobs.push(JobDefinition {
            name,
            tolerance,
            box_edge: packing.box_edge,
            members: [
                format!("{}.{}", pair.first, PACKING_FILETYPE),
                format!("{}.{}", pair.second, PACKING_FILETYPE),
            ],
            pair: pair.clone(),
        });
    }
    Ok(jobs)
}

/// True when `name` is a rendered pair name: exactly two nonempty base
/// names joined by the separator. Raw inputs never look like this because
/// separators inside base names fail the whole job set.
pub fn is_pair_name(name: &str) -> bool {
    let mut parts = name.split(NAME_SEPARATOR);
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(first), Some(second), None) if !first.is_empty() && !second.is_empty()
    )
}

/// Tolerances always carry a decimal point in the input grammar.
fn fmt_tolerance(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Box coordinates are written PACKMOL-style: `40.` for whole numbers.
fn fmt_box_edge(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}.", value.trunc() as i64)
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pair::generate_pairs;

    fn default_packing() -> PackingConfig {
        PackingConfig::default()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_expected_job_names_in_discovery_order() {
        let pairs = generate_pairs(&names(&["water", "methane"]));
        let jobs = build_job_set(&pairs, &default_packing()).unwrap();

        let job_names: Vec<_> = jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(
            job_names,
            vec!["water_water", "methane_methane", "water_methane"]
        );
    }

    #[test]
    fn test_tolerance_policy() {
        let pairs = generate_pairs(&names(&["a", "b"]));
        let jobs = build_job_set(&pairs, &default_packing()).unwrap();

        for job in &jobs {
            match job.pair.kind {
                PairKind::SelfPair => assert_eq!(job.tolerance, 2.0),
                PairKind::Cross => assert_eq!(job.tolerance, 2.1),
            }
        }
    }

    #[test]
    fn test_separator_in_base_name_is_fatal() {
        let pairs = generate_pairs(&names(&["water", "sodium_chloride"]));
        let result = build_job_set(&pairs, &default_packing());
        assert!(matches!(result, Err(JobError::SeparatorInName(name)) if name == "sodium_chloride"));
    }

    #[test]
    fn test_rendered_input_matches_grammar() {
        let pairs = generate_pairs(&names(&["water"]));
        let jobs = build_job_set(&pairs, &default_packing()).unwrap();

        let expected = "\
tolerance 2.0
filetype pdb
output water_water.pdb

structure water.pdb
  number 1
  inside box 0. 0. 0. 40. 40. 40.
end structure

structure water.pdb
  number 1
  inside box 0. 0. 0. 40. 40. 40.
end structure
";
        assert_eq!(jobs[0].render_input(), expected);
    }

    #[test]
    fn test_cross_pair_input_lists_both_members() {
        let pairs = generate_pairs(&names(&["water", "methane"]));
        let jobs = build_job_set(&pairs, &default_packing()).unwrap();
        let cross = &jobs[2];

        let input = cross.render_input();
        assert!(input.starts_with("tolerance 2.1\n"));
        assert!(input.contains("structure water.pdb\n"));
        assert!(input.contains("structure methane.pdb\n"));
        assert!(input.contains("output water_methane.pdb\n"));
    }

    #[test]
    fn test_fractional_box_edge_rendering() {
        let packing = PackingConfig {
            box_edge: 37.5,
            ..PackingConfig::default()
        };
        let pairs = generate_pairs(&names(&["a"]));
        let jobs = build_job_set(&pairs, &packing).unwrap();

        assert!(jobs[0].render_input().contains("inside box 0. 0. 0. 37.5 37.5 37.5\n"));
    }

    #[test]
    fn test_pair_name_recognition() {
        assert!(is_pair_name("water_methane"));
        assert!(is_pair_name("water_water"));

        assert!(!is_pair_name("water"));
        assert!(!is_pair_name("a_b_c"));
        assert!(!is_pair_name("_water"));
        assert!(!is_pair_name("water_"));
    }

    #[test]
    fn test_file_names() {
        let pairs = generate_pairs(&names(&["a", "b"]));
        let jobs = build_job_set(&pairs, &default_packing()).unwrap();

        assert_eq!(jobs[2].input_file_name(), "a_b.inp");
        assert_eq!(jobs[2].output_file_name(), "a_b.pdb");
    }
}
