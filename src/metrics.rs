//! Table-construction metrics.
//!
//! The fixed-point driver bumps these counters as it runs; after
//! `generate_states()` completes they describe the table that was built.
//! Construction is strictly single-threaded, so plain counters suffice.

/// Counters collected while the fixed point runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildMetrics {
    /// States popped off the driver worklist.
    pub worklist_pops: u64,
    /// Representer-state tuples permuted into candidate states.
    pub permutations: u64,
    /// Transitions recorded against operator builders.
    pub transitions: u64,
    /// Novel canonical states entered into the catalogue.
    pub states_created: u64,
    /// Candidate states that collapsed onto an existing canonical state.
    pub states_reused: u64,
    /// Canonical representer states interned.
    pub rep_states: u64,
    /// Predicated leaves in the compiled table.
    pub leaves: u64,
}

impl BuildMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the counters into a report.
    pub fn report(&self) -> BuildReport {
        BuildReport {
            worklist_pops: self.worklist_pops,
            permutations: self.permutations,
            transitions: self.transitions,
            states_created: self.states_created,
            states_reused: self.states_reused,
            rep_states: self.rep_states,
            leaves: self.leaves,
        }
    }
}

/// Snapshot of build metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub worklist_pops: u64,
    pub permutations: u64,
    pub transitions: u64,
    pub states_created: u64,
    pub states_reused: u64,
    pub rep_states: u64,
    pub leaves: u64,
}

impl BuildReport {
    /// Fraction of candidate states that canonicalization collapsed.
    pub fn reuse_rate(&self) -> f64 {
        let total = self.states_created + self.states_reused;
        if total == 0 {
            0.0
        } else {
            self.states_reused as f64 / total as f64
        }
    }
}

impl std::fmt::Display for BuildReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Table Construction ===")?;
        writeln!(f, "Worklist pops:      {}", self.worklist_pops)?;
        writeln!(f, "Permutations:       {}", self.permutations)?;
        writeln!(f, "Transitions:        {}", self.transitions)?;
        writeln!(
            f,
            "States:             {} created, {} reused ({:.1}% collapsed)",
            self.states_created,
            self.states_reused,
            self.reuse_rate() * 100.0
        )?;
        writeln!(f, "Representer states: {}", self.rep_states)?;
        writeln!(f, "Predicated leaves:  {}", self.leaves)?;
        Ok(())
    }
}
