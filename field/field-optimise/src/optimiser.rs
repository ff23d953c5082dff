//! The cooperative optimisation state machine.

use field_multires::MultiResolutionSurfelGraph;
use field_posy::{compute_tij_tji, PosyParams};
use field_rosy::{best_rosy_vector_pair, RosyParams, RosyPolicy};
use field_surfel::{FrameGeometry, NodeId, Surfel, SurfelGraph};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::cancel::{CancelToken, NeverCancel};
use crate::error::{OptimiseError, OptimiseResult};
use crate::params::{OptimiserParams, SelectionStrategy};

const ZERO_SMOOTHNESS: f32 = 1e-9;

/// Where the state machine is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimiserState {
    /// No graph bound yet.
    Uninitialised,
    /// Graph bound, run not started.
    Initialised,
    /// About to begin passes at the current level.
    StartingLevel,
    /// Orientation passes in progress.
    OptimisingRosy,
    /// Position passes in progress.
    OptimisingPosy,
    /// Current level converged, deciding what comes next.
    EndingLevel,
    /// Computing per-edge rotation and translation labels at level 0.
    LabellingEdges,
    /// Run over.
    Done,
}

/// How a run ended. Not an error in any case; a cancelled run leaves a
/// valid, partially-smoothed graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimisationResult {
    /// The run has not finished.
    #[default]
    NotComplete,
    /// Every level converged and edges were labelled.
    Converged,
    /// A cancellation request ended the run early.
    Cancelled,
}

/// Drives alternating RoSy and PoSy smoothing passes over a multi-resolution
/// hierarchy, coarsest level first, propagating converged state downwards
/// and finally labelling level-0 edges.
///
/// Node updates are applied in place as each node is visited, so later nodes
/// in a pass see already-smoothed neighbours.
pub struct FieldOptimiser<R: Rng> {
    params: OptimiserParams,
    rng: R,
    cancel: Box<dyn CancelToken>,
    data: Option<MultiResolutionSurfelGraph>,
    state: OptimiserState,
    result: OptimisationResult,
    current_level: usize,
    iterations: u32,
    last_smoothness: Option<f32>,
}

impl<R: Rng> FieldOptimiser<R> {
    /// A new optimiser that never cancels.
    pub fn new(params: OptimiserParams, rng: R) -> Self {
        Self {
            params,
            rng,
            cancel: Box::new(NeverCancel),
            data: None,
            state: OptimiserState::Uninitialised,
            result: OptimisationResult::NotComplete,
            current_level: 0,
            iterations: 0,
            last_smoothness: None,
        }
    }

    /// Replace the cancellation token.
    #[must_use]
    pub fn with_cancel_token(mut self, token: impl CancelToken + 'static) -> Self {
        self.cancel = Box::new(token);
        self
    }

    /// Bind the graph to optimise and reset the run.
    pub fn set_data(&mut self, graph: SurfelGraph) {
        info!(
            nodes = graph.num_nodes(),
            num_levels = self.params.num_levels,
            "surfel graph bound"
        );
        self.data = Some(MultiResolutionSurfelGraph::new(graph));
        self.state = OptimiserState::Initialised;
        self.result = OptimisationResult::NotComplete;
        self.current_level = 0;
        self.iterations = 0;
        self.last_smoothness = None;
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> OptimiserState {
        self.state
    }

    /// How the run ended, or [`OptimisationResult::NotComplete`] while it is
    /// still going.
    #[must_use]
    pub fn result(&self) -> OptimisationResult {
        self.result
    }

    /// The bound hierarchy, if any.
    #[must_use]
    pub fn hierarchy(&self) -> Option<&MultiResolutionSurfelGraph> {
        self.data.as_ref()
    }

    /// Release the bound hierarchy, returning the optimiser to
    /// [`OptimiserState::Uninitialised`].
    pub fn take_hierarchy(&mut self) -> Option<MultiResolutionSurfelGraph> {
        self.state = OptimiserState::Uninitialised;
        self.data.take()
    }

    /// Advance by exactly one transition: one smoothing pass, one level
    /// change, or the final labelling step. Returns whether the run is over.
    ///
    /// # Errors
    ///
    /// [`OptimiseError::NoData`] before `set_data`; engine errors propagate.
    pub fn optimise_once(&mut self) -> OptimiseResult<bool> {
        match self.state {
            OptimiserState::Uninitialised => return Err(OptimiseError::NoData),
            OptimiserState::Initialised => self.optimise_begin()?,
            OptimiserState::StartingLevel => self.start_level(),
            OptimiserState::OptimisingRosy => self.optimise_rosy()?,
            OptimiserState::OptimisingPosy => self.optimise_posy()?,
            OptimiserState::EndingLevel => self.end_level()?,
            OptimiserState::LabellingEdges => self.label_edges()?,
            OptimiserState::Done => {}
        }
        Ok(self.state == OptimiserState::Done)
    }

    /// Run the state machine to completion.
    ///
    /// # Errors
    ///
    /// As [`FieldOptimiser::optimise_once`].
    pub fn run(&mut self) -> OptimiseResult<OptimisationResult> {
        while !self.optimise_once()? {}
        Ok(self.result)
    }

    fn optimise_begin(&mut self) -> OptimiseResult<()> {
        let data = self.data.as_mut().ok_or(OptimiseError::NoData)?;
        data.generate_levels(self.params.num_levels, &mut self.rng)?;
        self.current_level = data.num_levels() - 1;
        self.state = OptimiserState::StartingLevel;
        Ok(())
    }

    fn start_level(&mut self) {
        info!(level = self.current_level, "starting level");
        self.iterations = 0;
        self.last_smoothness = None;
        self.state = OptimiserState::OptimisingRosy;
    }

    fn optimise_rosy(&mut self) -> OptimiseResult<()> {
        if self.check_cancellation() {
            return Ok(());
        }
        let rosy_params = RosyParams {
            damping_factor: self.params.damping_factor,
            weight_for_error: self.params.weight_for_error,
            weight_for_error_steps: self.params.weight_for_error_steps,
        };
        let pass = self.iterations;
        let data = self.data.as_mut().ok_or(OptimiseError::NoData)?;
        let graph = data.level_mut(self.current_level)?;

        let nodes = select_nodes(&mut self.rng, graph, self.params.selection, true)?;
        for node in nodes {
            field_rosy::smooth_node(graph, node, &rosy_params, pass)?;
        }
        let mean = field_rosy::mean_smoothness(graph)?;
        if self.params.trace_smoothing {
            info!(level = self.current_level, pass, mean, "orientation smoothness");
        }

        self.iterations += 1;
        if self.phase_complete(mean, self.params.rosy_iterations) {
            debug!(level = self.current_level, passes = self.iterations, "orientation converged");
            self.iterations = 0;
            self.last_smoothness = None;
            self.state = OptimiserState::OptimisingPosy;
        } else {
            self.last_smoothness = Some(mean);
        }
        Ok(())
    }

    fn optimise_posy(&mut self) -> OptimiseResult<()> {
        if self.check_cancellation() {
            return Ok(());
        }
        let posy_params = PosyParams {
            rho: self.params.rho,
            randomise_neighbour_order: self.params.randomise_neighbour_order,
        };
        let data = self.data.as_mut().ok_or(OptimiseError::NoData)?;
        let graph = data.level_mut(self.current_level)?;

        let nodes = select_nodes(&mut self.rng, graph, self.params.selection, false)?;
        for node in nodes {
            field_posy::smooth_node(graph, node, &posy_params, &mut self.rng)?;
        }
        let mean = field_posy::mean_smoothness(graph, self.params.rho)?;
        if self.params.trace_smoothing {
            info!(
                level = self.current_level,
                pass = self.iterations,
                mean,
                "position smoothness"
            );
        }

        self.iterations += 1;
        if self.phase_complete(mean, self.params.posy_iterations) {
            debug!(level = self.current_level, passes = self.iterations, "position converged");
            self.iterations = 0;
            self.last_smoothness = None;
            self.state = OptimiserState::EndingLevel;
        } else {
            self.last_smoothness = Some(mean);
        }
        Ok(())
    }

    fn end_level(&mut self) -> OptimiseResult<()> {
        if self.current_level == 0 {
            self.state = OptimiserState::LabellingEdges;
            return Ok(());
        }
        let data = self.data.as_mut().ok_or(OptimiseError::NoData)?;
        data.propagate(self.current_level, true, true, self.params.rho)?;
        self.current_level -= 1;
        self.state = OptimiserState::StartingLevel;
        Ok(())
    }

    /// Store the resolved rotation pair and per-frame lattice translations
    /// on every level-0 edge, computed from the converged field.
    fn label_edges(&mut self) -> OptimiseResult<()> {
        let rho = self.params.rho;
        let data = self.data.as_mut().ok_or(OptimiseError::NoData)?;
        let graph = data.level_mut(0)?;

        for (a, b) in graph.edges() {
            let surfel_a = graph.surfel(a)?.clone();
            let surfel_b = graph.surfel(b)?.clone();
            let common: Vec<usize> = surfel_a
                .frames()
                .iter()
                .filter(|f| surfel_b.is_in_frame(**f))
                .copied()
                .collect();
            let Some(&first) = common.first() else {
                return Err(OptimiseError::NoCommonFrame {
                    a: surfel_a.id().to_string(),
                    b: surfel_b.id().to_string(),
                });
            };

            let (_, tangent_a, normal_a) = surfel_a.vertex_tangent_normal_for_frame(first)?;
            let (_, tangent_b, normal_b) = surfel_b.vertex_tangent_normal_for_frame(first)?;
            let pair = best_rosy_vector_pair(
                tangent_a,
                normal_a,
                tangent_b,
                normal_b,
                RosyPolicy::MinimumAngle,
            )?;
            graph.set_k(a, pair.k_ij, b, pair.k_ji)?;

            for frame in common {
                let geom_a = scaled_lattice_geometry(&surfel_a, frame, rho)?;
                let geom_b = scaled_lattice_geometry(&surfel_b, frame, rho)?;
                let (t_ij, t_ji, _) = compute_tij_tji(&geom_a, &geom_b, rho);
                graph.set_t(a, t_ij, b, t_ji, frame)?;
            }
        }

        info!(edges = graph.num_edges(), "edges labelled");
        self.state = OptimiserState::Done;
        self.result = OptimisationResult::Converged;
        Ok(())
    }

    /// Whether this pass finished its phase. Zero smoothness always
    /// converges; otherwise the configured criteria apply, and the per-phase
    /// cap is a hard stop.
    fn phase_complete(&self, latest: f32, cap: u32) -> bool {
        if latest.abs() < ZERO_SMOOTHNESS {
            return true;
        }
        if self.params.termination.relative {
            if let Some(last) = self.last_smoothness {
                if last.abs() >= ZERO_SMOOTHNESS {
                    let pct = 100.0 * (last - latest) / last;
                    if pct >= 0.0 && pct.abs() < self.params.relative_threshold {
                        return true;
                    }
                }
            }
        }
        if self.params.termination.absolute && latest <= self.params.absolute_threshold {
            return true;
        }
        if self.params.termination.fixed && self.iterations >= self.params.max_iterations {
            return true;
        }
        self.iterations >= cap
    }

    fn check_cancellation(&mut self) -> bool {
        if self.cancel.is_cancelled() {
            warn!(level = self.current_level, "optimisation cancelled");
            self.result = OptimisationResult::Cancelled;
            self.state = OptimiserState::Done;
            return true;
        }
        false
    }
}

/// The nodes to visit this pass, ordered per the strategy. Sorting is
/// stable so equal-smoothness ties keep the graph's node order.
fn select_nodes(
    rng: &mut impl Rng,
    graph: &SurfelGraph,
    strategy: SelectionStrategy,
    rosy_phase: bool,
) -> OptimiseResult<Vec<NodeId>> {
    if let SelectionStrategy::AllInRandomOrder = strategy {
        let mut nodes = graph.node_ids();
        nodes.shuffle(rng);
        return Ok(nodes);
    }

    let mut keyed: Vec<(NodeId, f32)> = Vec::new();
    for node in graph.node_ids() {
        let surfel = graph.surfel(node)?;
        let smoothness = if rosy_phase {
            surfel.rosy_smoothness()
        } else {
            surfel.posy_smoothness()
        };
        keyed.push((node, smoothness));
    }
    keyed.sort_by(|x, y| y.1.partial_cmp(&x.1).unwrap_or(std::cmp::Ordering::Equal));

    let take = match strategy {
        SelectionStrategy::Worst100 => 100,
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        SelectionStrategy::WorstPercentage(pct) => {
            ((keyed.len() as f32) * pct / 100.0).round() as usize
        }
        SelectionStrategy::AllInRandomOrder => keyed.len(),
    };
    keyed.truncate(take);
    Ok(keyed.into_iter().map(|(node, _)| node).collect())
}

/// In-frame geometry whose closest lattice point is expanded to lattice
/// scale, as edge labelling requires.
fn scaled_lattice_geometry(
    surfel: &Surfel,
    frame: usize,
    rho: f32,
) -> OptimiseResult<FrameGeometry> {
    let mut geometry = surfel.geometry_in_frame(frame)?;
    let offset = surfel.reference_lattice_offset();
    geometry.closest_lattice_point = geometry.vertex
        + rho * (offset.x * geometry.tangent + offset.y * geometry.orth_tangent);
    Ok(geometry)
}
