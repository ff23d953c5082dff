//! Run configuration for the field optimiser.

use tracing::warn;

/// Which convergence tests apply at the end of each smoothing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationCriteria {
    /// Converge when mean smoothness drops to or below the absolute
    /// threshold.
    pub absolute: bool,
    /// Converge when the relative improvement between passes drops below the
    /// relative threshold.
    pub relative: bool,
    /// Stop after a fixed number of passes per level.
    pub fixed: bool,
}

impl Default for TerminationCriteria {
    fn default() -> Self {
        Self {
            absolute: true,
            relative: false,
            fixed: false,
        }
    }
}

impl TerminationCriteria {
    /// Parse a comma-separated selector such as `"absolute,relative"`.
    /// Unknown names are logged and ignored; an empty selection falls back
    /// to fixed iteration counts.
    #[must_use]
    pub fn parse(selector: &str) -> Self {
        let mut criteria = Self {
            absolute: false,
            relative: false,
            fixed: false,
        };
        for name in selector.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match name {
                "absolute" => criteria.absolute = true,
                "relative" => criteria.relative = true,
                "fixed" => criteria.fixed = true,
                unknown => warn!(criterion = unknown, "ignoring unknown termination criterion"),
            }
        }
        if criteria == (Self { absolute: false, relative: false, fixed: false }) {
            warn!(selector, "no recognised termination criteria, using fixed");
            criteria.fixed = true;
        }
        criteria
    }
}

/// How the nodes to smooth in a pass are chosen and ordered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionStrategy {
    /// Every node, visited in a shuffled order drawn from the caller's RNG.
    AllInRandomOrder,
    /// The hundred nodes with the worst smoothness, worst first.
    Worst100,
    /// The worst fraction of nodes by smoothness, worst first.
    WorstPercentage(f32),
}

impl Default for SelectionStrategy {
    fn default() -> Self {
        Self::AllInRandomOrder
    }
}

/// Configuration for a full optimisation run.
///
/// All fields have workable defaults; `with_*` builders override them.
#[derive(Debug, Clone)]
pub struct OptimiserParams {
    /// Lattice spacing for the position field.
    pub rho: f32,
    /// Which convergence tests run after each pass.
    pub termination: TerminationCriteria,
    /// Mean smoothness at or below this converges when `absolute` is set.
    pub absolute_threshold: f32,
    /// Percentage improvement below this converges when `relative` is set.
    pub relative_threshold: f32,
    /// Pass count per level after which `fixed` termination fires.
    pub max_iterations: u32,
    /// Node choice and ordering per pass.
    pub selection: SelectionStrategy,
    /// Optional blend of old and new tangents after each orientation update.
    pub damping_factor: Option<f32>,
    /// Weight neighbour contributions towards smoother surfels.
    pub weight_for_error: bool,
    /// Pass count over which error weighting ramps to full strength.
    pub weight_for_error_steps: u32,
    /// Hard cap on orientation passes per level.
    pub rosy_iterations: u32,
    /// Hard cap on position passes per level.
    pub posy_iterations: u32,
    /// Visit position-field neighbours in a shuffled order.
    pub randomise_neighbour_order: bool,
    /// Log mean smoothness after every pass.
    pub trace_smoothing: bool,
    /// Levels in the hierarchy, including the base.
    pub num_levels: usize,
}

impl Default for OptimiserParams {
    fn default() -> Self {
        Self {
            rho: 1.0,
            termination: TerminationCriteria::default(),
            absolute_threshold: 0.01,
            relative_threshold: 1.0,
            max_iterations: 50,
            selection: SelectionStrategy::default(),
            damping_factor: None,
            weight_for_error: false,
            weight_for_error_steps: 1,
            rosy_iterations: 50,
            posy_iterations: 50,
            randomise_neighbour_order: false,
            trace_smoothing: false,
            num_levels: 1,
        }
    }
}

impl OptimiserParams {
    /// Set the lattice spacing. Clamped positive: the lattice maths divides
    /// by it and wraps offsets modulo whole cells.
    #[must_use]
    pub fn with_rho(mut self, rho: f32) -> Self {
        self.rho = rho.max(f32::EPSILON);
        self
    }

    /// Select termination criteria from a comma-separated string.
    #[must_use]
    pub fn with_termination_criteria(mut self, selector: &str) -> Self {
        self.termination = TerminationCriteria::parse(selector);
        self
    }

    /// Set the absolute smoothness threshold.
    #[must_use]
    pub fn with_absolute_threshold(mut self, threshold: f32) -> Self {
        self.absolute_threshold = threshold;
        self
    }

    /// Set the relative improvement threshold, in percent.
    #[must_use]
    pub fn with_relative_threshold(mut self, threshold: f32) -> Self {
        self.relative_threshold = threshold;
        self
    }

    /// Set the per-level pass limit.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the node selection strategy.
    #[must_use]
    pub fn with_selection(mut self, selection: SelectionStrategy) -> Self {
        self.selection = selection;
        self
    }

    /// Blend each new tangent with the old one by this factor.
    #[must_use]
    pub fn with_damping_factor(mut self, factor: f32) -> Self {
        self.damping_factor = Some(factor);
        self
    }

    /// Ramp neighbour weights towards smoother surfels over `steps` passes.
    #[must_use]
    pub fn with_weight_for_error(mut self, steps: u32) -> Self {
        self.weight_for_error = true;
        self.weight_for_error_steps = steps.max(1);
        self
    }

    /// Cap the number of orientation passes per level.
    #[must_use]
    pub fn with_rosy_iterations(mut self, iterations: u32) -> Self {
        self.rosy_iterations = iterations.max(1);
        self
    }

    /// Cap the number of position passes per level.
    #[must_use]
    pub fn with_posy_iterations(mut self, iterations: u32) -> Self {
        self.posy_iterations = iterations.max(1);
        self
    }

    /// Shuffle position-field neighbour visit order each pass.
    #[must_use]
    pub fn with_randomised_neighbour_order(mut self) -> Self {
        self.randomise_neighbour_order = true;
        self
    }

    /// Log mean smoothness after every pass.
    #[must_use]
    pub fn with_trace_smoothing(mut self) -> Self {
        self.trace_smoothing = true;
        self
    }

    /// Set the number of hierarchy levels, including the base.
    #[must_use]
    pub fn with_num_levels(mut self, num_levels: usize) -> Self {
        self.num_levels = num_levels.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selector() {
        let c = TerminationCriteria::parse("absolute,relative");
        assert!(c.absolute);
        assert!(c.relative);
        assert!(!c.fixed);
    }

    #[test]
    fn test_parse_ignores_unknown_names() {
        let c = TerminationCriteria::parse("absolute, bogus ,fixed");
        assert!(c.absolute);
        assert!(!c.relative);
        assert!(c.fixed);
    }

    #[test]
    fn test_parse_empty_falls_back_to_fixed() {
        let c = TerminationCriteria::parse("");
        assert!(c.fixed);
        assert!(!c.absolute);
        assert!(!c.relative);
    }

    #[test]
    fn test_rho_clamped_positive() {
        assert!(OptimiserParams::default().with_rho(0.0).rho > 0.0);
        assert!(OptimiserParams::default().with_rho(-2.0).rho > 0.0);
    }

    #[test]
    fn test_builder_chain() {
        let p = OptimiserParams::default()
            .with_rho(1.5)
            .with_termination_criteria("relative")
            .with_max_iterations(10)
            .with_num_levels(0);
        assert_eq!(p.rho, 1.5);
        assert!(p.termination.relative);
        assert_eq!(p.max_iterations, 10);
        assert_eq!(p.num_levels, 1);
    }
}
