//! Growth iteration engine: drives discrete Borchert–Honda growth steps
//! over the internode graph and memoizes each realized iteration.
//!
//! The typical step is:
//! 1. Resolve a starting graph from the growth cache (or the base graph).
//! 2. Run the growth-direction solver ([`crate::solver`]).
//! 3. Refresh bud records ([`crate::internode::InternodeGraph::assign_buds`]).
//! 4. Run the BH distribution engine ([`crate::distribution`]).
//! 5. Synthesize new internodes from each bud's allocated resource.
//! 6. Merge, re-link, and cache the resulting graph.

use std::collections::{BTreeMap, HashMap};

use glam::Vec3;
use log::{debug, warn};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::{
    config::GrowthConfig,
    distribution,
    error::GrowthError,
    internode::{Internode, InternodeGraph},
    lsystem::GrammarEngine,
    resource::{ResourceNode, ResourceRegistry},
    solver::{self, BudSlot},
};

/// Lifecycle of the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// No base grammar output yet.
    Uninitialized,
    /// Base segments parsed into the iteration-0 graph.
    BaseReady,
    /// Growth realized up to the contained iteration, all cached.
    Grown(u32),
}

/// Base-tree inputs; any change invalidates the base graph and the whole
/// growth cache.
#[derive(Clone, Debug, PartialEq)]
struct BaseParams {
    grammar_text: String,
    angle_degrees: f32,
    step_size: f32,
    iterations: u32,
}

/// Owner of one growth simulation: the grammar engine seam, the base
/// graph, the resource registry snapshot, and the per-iteration growth
/// cache. All state is instance-owned, so several simulations can coexist
/// in one process.
///
/// ### Fields
/// - `grammar` - External grammar engine, consumed through
///   [`GrammarEngine`].
/// - `cfg` - Tunable constants for linkage, BH and shoot synthesis.
/// - `base` - Iteration-0 graph parsed from the grammar output.
/// - `registry` - Snapshot of the light resources seen last step.
/// - `cache` - Iteration number to realized-graph snapshots. Entries are
///   cloned on store and on read so replay never aliases live state.
pub struct GrowthEngine<G> {
    grammar: G,
    cfg: GrowthConfig,
    state: EngineState,
    base: Option<InternodeGraph>,
    base_params: Option<BaseParams>,
    registry: ResourceRegistry,
    cache: BTreeMap<u32, InternodeGraph>,
}

impl<G: GrammarEngine> GrowthEngine<G> {
    pub fn new(grammar: G, cfg: GrowthConfig) -> Self {
        Self {
            grammar,
            cfg,
            state: EngineState::Uninitialized,
            base: None,
            base_params: None,
            registry: ResourceRegistry::new(),
            cache: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &GrowthConfig {
        &self.cfg
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn grammar_mut(&mut self) -> &mut G {
        &mut self.grammar
    }

    /// Parses the grammar and builds the iteration-0 graph.
    ///
    /// Re-invoking with unchanged inputs is a no-op that keeps the
    /// existing base graph and growth cache. Any changed input rebuilds
    /// the base and discards the entire cache. On failure the engine
    /// keeps whatever state it had before the call.
    ///
    /// ### Parameters
    /// - `grammar_text` - Production grammar source; empty or whitespace
    ///   content fails with [`GrowthError::EmptyGrammar`].
    /// - `angle_degrees`, `step_size` - Turtle defaults forwarded to the
    ///   grammar engine.
    /// - `base_iterations` - Rewriting rounds for the base skeleton.
    ///
    /// ### Returns
    /// The iteration-0 graph, or [`GrowthError::NoGeometry`] if the
    /// grammar produced zero segments.
    pub fn initialize_base_tree(
        &mut self,
        grammar_text: &str,
        angle_degrees: f32,
        step_size: f32,
        base_iterations: u32,
    ) -> Result<&InternodeGraph, GrowthError> {
        if grammar_text.trim().is_empty() {
            return Err(GrowthError::EmptyGrammar);
        }

        let params = BaseParams {
            grammar_text: grammar_text.to_owned(),
            angle_degrees,
            step_size,
            iterations: base_iterations,
        };
        let unchanged = self.base.is_some() && self.base_params.as_ref() == Some(&params);

        if !unchanged {
            self.grammar.set_default_angle(angle_degrees);
            self.grammar.set_default_step(step_size);
            self.grammar.load_program(grammar_text);
            let (segments, _flowers) = self.grammar.process(base_iterations);
            if segments.is_empty() {
                return Err(GrowthError::NoGeometry);
            }

            let graph = InternodeGraph::from_segments(
                &segments,
                self.cfg.internode_radius,
                self.cfg.link_tolerance,
            );
            debug!("base tree rebuilt: {} internodes", graph.len());

            self.base_params = Some(params);
            self.cache.clear();
            self.state = EngineState::BaseReady;
            self.base = Some(graph);
        }

        match &self.base {
            Some(base) => Ok(base),
            None => Err(GrowthError::NoGeometry),
        }
    }

    /// Advances growth to `target_iteration`, reusing cached iterations.
    ///
    /// The resource list is the caller's once-per-step poll of the scene.
    /// If it differs from the registry snapshot, the growth cache (but not
    /// the base graph) is discarded and growth replays from iteration 1
    /// with the new resources. Already-cached target iterations are
    /// returned as-is without recomputation.
    ///
    /// ### Parameters
    /// - `target_iteration` - Growth time to realize; 0 is the base graph.
    /// - `base_angle_degrees` - Branching angle for unserved lateral
    ///   shoots.
    /// - `angle_jitter_degrees` - Jitter half-range around that angle.
    /// - `use_resource_distribution` - When `false`, steps carry the graph
    ///   forward unchanged (plain L-system behavior).
    /// - `resources` - Current `(handle, position)` light resources.
    ///
    /// ### Returns
    /// A snapshot of the graph at `target_iteration`, or
    /// [`GrowthError::NoGeometry`] if no base tree exists yet.
    pub fn step_growth(
        &mut self,
        target_iteration: u32,
        base_angle_degrees: f32,
        angle_jitter_degrees: f32,
        use_resource_distribution: bool,
        resources: &[ResourceNode],
    ) -> Result<InternodeGraph, GrowthError> {
        let Some(base) = &self.base else {
            return Err(GrowthError::NoGeometry);
        };

        if self.registry.is_dirty(resources) {
            warn!(
                "resource set changed, discarding {} cached growth iterations",
                self.cache.len()
            );
            self.registry.refresh(resources);
            self.cache.clear();
        }

        if target_iteration == 0 {
            return Ok(base.clone());
        }

        // Latest realized iteration at or below the target, else the base.
        let (mut iteration, mut graph) = match self.cache.range(..=target_iteration).next_back() {
            Some((&cached, snapshot)) => (cached, snapshot.clone()),
            None => (0, base.clone()),
        };

        while iteration < target_iteration {
            iteration += 1;
            graph = self.grow_step(
                graph,
                iteration,
                base_angle_degrees,
                angle_jitter_degrees,
                use_resource_distribution,
            );
            self.cache.insert(iteration, graph.clone());
        }

        if let Some((&highest, _)) = self.cache.iter().next_back() {
            self.state = EngineState::Grown(highest);
        }
        Ok(graph)
    }

    /// Read-only snapshot of the graph realized at `iteration` (0 is the
    /// base graph), if that iteration has been computed.
    pub fn internodes(&self, iteration: u32) -> Option<InternodeGraph> {
        if iteration == 0 {
            return self.base.clone();
        }
        self.cache.get(&iteration).cloned()
    }

    /// One discrete growth step over `graph`.
    fn grow_step(
        &self,
        mut graph: InternodeGraph,
        iteration: u32,
        base_angle_degrees: f32,
        angle_jitter_degrees: f32,
        use_resource_distribution: bool,
    ) -> InternodeGraph {
        if !use_resource_distribution {
            return graph;
        }

        let served = solver::solve(&mut graph, &self.registry);
        graph.assign_buds();
        distribution::distribute(&mut graph, &self.cfg);

        let directions: HashMap<BudSlot, Vec3> = served
            .iter()
            .map(|s| (s.slot, s.pair.optimal_point - s.pair.bud_position))
            .collect();

        let mut rng = self.step_rng(iteration);
        let mut shoots = Vec::new();

        for id in 0..graph.nodes.len() {
            let origin = graph.nodes[id].end;
            let heading = graph.nodes[id].heading();

            if let Some(bud) = &graph.nodes[id].terminal_bud {
                // Terminal shoots follow the resource direction when
                // served, otherwise they continue the existing heading.
                let dir = match directions.get(&BudSlot::Terminal(id)) {
                    Some(d) => {
                        let d = d.normalize_or_zero();
                        if d == Vec3::ZERO { heading } else { d }
                    }
                    None => heading,
                };
                synthesize_shoots(&mut shoots, &self.cfg, bud.resource_amount, origin, || dir);
            }

            if let Some(bud) = &graph.nodes[id].lateral_bud {
                let resource = bud.resource_amount;
                match directions.get(&BudSlot::Lateral(id)) {
                    Some(d) => {
                        let d = d.normalize_or_zero();
                        let dir = if d == Vec3::ZERO { heading } else { d };
                        synthesize_shoots(&mut shoots, &self.cfg, resource, origin, || dir);
                    }
                    None => {
                        // Unserved laterals branch at the configured angle
                        // with independent per-axis jitter.
                        synthesize_shoots(&mut shoots, &self.cfg, resource, origin, || {
                            jittered_lateral_direction(
                                base_angle_degrees,
                                angle_jitter_degrees,
                                &mut rng,
                            )
                        });
                    }
                }
            }
        }

        if !shoots.is_empty() {
            debug!("iteration {iteration}: synthesized {} shoots", shoots.len());
            graph.nodes.extend(shoots);
        }

        graph.relink(self.cfg.link_tolerance);
        graph.assign_buds();
        graph
    }

    /// Jitter stream for one iteration, derived from the configured seed
    /// so that replaying an iteration after cache invalidation stays
    /// deterministic.
    fn step_rng(&self, iteration: u32) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(
            self.cfg
                .jitter_seed
                .wrapping_add((iteration as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)),
        )
    }
}

/// Emits `floor(resource)` shoots (capped) of length
/// `shoot_length_factor * resource / num_shoots` from `origin`.
fn synthesize_shoots(
    shoots: &mut Vec<Internode>,
    cfg: &GrowthConfig,
    resource: f32,
    origin: Vec3,
    mut direction: impl FnMut() -> Vec3,
) {
    let num = (resource.floor() as u32).min(cfg.max_shoots_per_bud);
    if num == 0 {
        return;
    }
    let length = cfg.shoot_length_factor * resource / num as f32;
    for _ in 0..num {
        let dir = direction();
        if dir == Vec3::ZERO {
            continue;
        }
        shoots.push(Internode::new(
            origin,
            origin + dir * length,
            cfg.internode_radius,
        ));
    }
}

/// Direction at `angle ± jitter` degrees, sampled independently per axis.
/// Horizontal axes get a random sign so laterals spread to both sides.
fn jittered_lateral_direction(
    angle_degrees: f32,
    jitter_degrees: f32,
    rng: &mut ChaCha8Rng,
) -> Vec3 {
    let jitter = jitter_degrees.abs();
    let sample = |rng: &mut ChaCha8Rng| {
        let deg = if jitter > 0.0 {
            angle_degrees + rng.random_range(-jitter..=jitter)
        } else {
            angle_degrees
        };
        deg.to_radians()
    };
    let x = sample(rng).sin() * random_sign(rng);
    let y = sample(rng).cos();
    let z = sample(rng).sin() * random_sign(rng);
    Vec3::new(x, y, z).normalize_or_zero()
}

fn random_sign(rng: &mut ChaCha8Rng) -> f32 {
    if rng.random_bool(0.5) { 1.0 } else { -1.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Grammar engine double returning a canned segment list.
    struct StubGrammar {
        segments: Vec<[f32; 6]>,
        loaded: Option<String>,
    }

    impl StubGrammar {
        fn with_segments(segments: Vec<[f32; 6]>) -> Self {
            Self {
                segments,
                loaded: None,
            }
        }
    }

    impl GrammarEngine for StubGrammar {
        fn load_program(&mut self, text: &str) {
            self.loaded = Some(text.to_owned());
        }
        fn set_default_angle(&mut self, _degrees: f32) {}
        fn set_default_step(&mut self, _distance: f32) {}
        fn process(&mut self, _iterations: u32) -> (Vec<[f32; 6]>, Vec<[f32; 3]>) {
            (self.segments.clone(), Vec::new())
        }
        fn set_optimal_bud_directions(
            &mut self,
            _positions: Vec<[f32; 3]>,
            _directions: Vec<[f32; 3]>,
            _angles: Vec<f32>,
        ) {
        }
        fn get_optimal_bud_directions(&self) -> (Vec<[f32; 3]>, Vec<[f32; 3]>, Vec<f32>) {
            (Vec::new(), Vec::new(), Vec::new())
        }
    }

    const GRAMMAR: &str = "F\nF->F[+F]F";

    fn engine_with_root() -> GrowthEngine<StubGrammar> {
        GrowthEngine::new(
            StubGrammar::with_segments(vec![[0.0, 0.0, 0.0, 0.0, 1.0, 0.0]]),
            GrowthConfig::default(),
        )
    }

    fn light(name: &str, x: f32, y: f32, z: f32) -> ResourceNode {
        ResourceNode::new(name, Vec3::new(x, y, z))
    }

    #[test]
    fn zero_segments_fail_without_state_transition() {
        let mut engine = GrowthEngine::new(
            StubGrammar::with_segments(Vec::new()),
            GrowthConfig::default(),
        );

        let result = engine.initialize_base_tree(GRAMMAR, 22.5, 1.0, 2);

        assert_eq!(result.unwrap_err(), GrowthError::NoGeometry);
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert!(engine.internodes(0).is_none());
    }

    #[test]
    fn empty_grammar_text_fails_identically() {
        let mut engine = engine_with_root();
        assert_eq!(
            engine.initialize_base_tree("  \n ", 22.5, 1.0, 2).unwrap_err(),
            GrowthError::EmptyGrammar
        );
        assert_eq!(engine.state(), EngineState::Uninitialized);
    }

    #[test]
    fn step_before_initialization_fails() {
        let mut engine = engine_with_root();
        assert!(engine.step_growth(1, 22.5, 5.0, true, &[]).is_err());
    }

    #[test]
    fn base_tree_carries_buds_on_its_root() {
        let mut engine = engine_with_root();
        let base = engine.initialize_base_tree(GRAMMAR, 22.5, 1.0, 2).unwrap();

        assert_eq!(base.len(), 1);
        assert!(base.nodes[0].has_terminal_bud());
        assert!(base.nodes[0].has_lateral_bud());
    }

    #[test]
    fn disabled_distribution_returns_base_graph_unchanged() {
        let mut engine = engine_with_root();
        let base = engine
            .initialize_base_tree(GRAMMAR, 22.5, 1.0, 2)
            .unwrap()
            .clone();

        let grown = engine.step_growth(1, 22.5, 5.0, false, &[]).unwrap();

        assert_eq!(grown, base);
        assert_eq!(engine.state(), EngineState::Grown(1));
    }

    #[test]
    fn served_terminal_bud_grows_toward_the_resource() {
        let mut engine = engine_with_root();
        engine.initialize_base_tree(GRAMMAR, 22.5, 1.0, 2).unwrap();

        let resources = [light("light1", 0.0, 5.0, 0.0)];
        let grown = engine.step_growth(1, 22.5, 5.0, true, &resources).unwrap();

        // At least one new internode extends upward from the old tip.
        assert!(grown.len() > 1);
        let shoot = &grown.nodes[1];
        assert_eq!(shoot.start, Vec3::new(0.0, 1.0, 0.0));
        assert!(shoot.end.y > shoot.start.y);
        // The shoot is linked as a child of the original internode.
        assert_eq!(shoot.parent, Some(0));
    }

    #[test]
    fn repeated_step_growth_returns_bit_identical_snapshots() {
        let mut engine = engine_with_root();
        engine.initialize_base_tree(GRAMMAR, 22.5, 1.0, 2).unwrap();

        let resources = [light("light1", 0.0, 5.0, 0.0)];
        let first = engine.step_growth(1, 22.5, 5.0, true, &resources).unwrap();
        let second = engine.step_growth(1, 22.5, 5.0, true, &resources).unwrap();

        // Second call is served from the cache.
        assert_eq!(first, second);
    }

    #[test]
    fn replay_extends_from_the_latest_cached_iteration() {
        let mut engine = engine_with_root();
        engine.initialize_base_tree(GRAMMAR, 22.5, 1.0, 2).unwrap();

        let resources = [light("light1", 0.0, 8.0, 0.0)];
        engine.step_growth(1, 22.5, 5.0, true, &resources).unwrap();
        let at_three = engine.step_growth(3, 22.5, 5.0, true, &resources).unwrap();

        assert!(engine.internodes(1).is_some());
        assert!(engine.internodes(2).is_some());
        assert_eq!(engine.internodes(3), Some(at_three));
        assert_eq!(engine.state(), EngineState::Grown(3));
    }

    #[test]
    fn dirty_resources_discard_growth_cache_but_keep_base() {
        let mut engine = engine_with_root();
        engine.initialize_base_tree(GRAMMAR, 22.5, 1.0, 2).unwrap();

        let first = engine
            .step_growth(1, 22.5, 5.0, true, &[light("light1", 0.0, 5.0, 0.0)])
            .unwrap();

        // Same handle, new position: growth must recompute from the base.
        let second = engine
            .step_growth(1, 22.5, 5.0, true, &[light("light1", 5.0, 1.0, 0.0)])
            .unwrap();

        assert!(engine.internodes(0).is_some());
        assert_ne!(first, second);
        // New shoot now leans along +x instead of +y.
        let shoot = &second.nodes[1];
        assert!(shoot.end.x > shoot.start.x);
    }

    #[test]
    fn reinitializing_with_changed_inputs_discards_everything() {
        let mut engine = engine_with_root();
        engine.initialize_base_tree(GRAMMAR, 22.5, 1.0, 2).unwrap();
        engine
            .step_growth(1, 22.5, 5.0, true, &[light("light1", 0.0, 5.0, 0.0)])
            .unwrap();

        engine.initialize_base_tree(GRAMMAR, 30.0, 1.0, 2).unwrap();

        assert_eq!(engine.state(), EngineState::BaseReady);
        assert!(engine.internodes(1).is_none());
    }

    #[test]
    fn reinitializing_with_unchanged_inputs_keeps_the_cache() {
        let mut engine = engine_with_root();
        engine.initialize_base_tree(GRAMMAR, 22.5, 1.0, 2).unwrap();
        engine
            .step_growth(1, 22.5, 5.0, true, &[light("light1", 0.0, 5.0, 0.0)])
            .unwrap();

        engine.initialize_base_tree(GRAMMAR, 22.5, 1.0, 2).unwrap();

        assert!(engine.internodes(1).is_some());
    }

    #[test]
    fn shoot_count_honors_the_configured_cap() {
        let mut cfg = GrowthConfig::default();
        // Inflate the root budget so floor(v) would exceed the cap.
        cfg.alpha = 20.0;
        cfg.max_shoots_per_bud = 2;

        let mut engine = GrowthEngine::new(
            StubGrammar::with_segments(vec![[0.0, 0.0, 0.0, 0.0, 1.0, 0.0]]),
            cfg,
        );
        engine.initialize_base_tree(GRAMMAR, 22.5, 1.0, 2).unwrap();

        let grown = engine
            .step_growth(1, 22.5, 5.0, true, &[light("light1", 0.0, 5.0, 0.0)])
            .unwrap();

        // One internode plus at most cap shoots from its served bud.
        assert_eq!(grown.len(), 3);
    }

    #[test]
    fn iteration_zero_returns_the_base_graph() {
        let mut engine = engine_with_root();
        let base = engine
            .initialize_base_tree(GRAMMAR, 22.5, 1.0, 2)
            .unwrap()
            .clone();

        let at_zero = engine.step_growth(0, 22.5, 5.0, true, &[]).unwrap();
        assert_eq!(at_zero, base);
    }

    #[test]
    fn jittered_direction_is_unit_length_and_seed_deterministic() {
        let mut a = ChaCha8Rng::seed_from_u64(7);
        let mut b = ChaCha8Rng::seed_from_u64(7);

        let dir_a = jittered_lateral_direction(22.5, 5.0, &mut a);
        let dir_b = jittered_lateral_direction(22.5, 5.0, &mut b);

        assert_eq!(dir_a, dir_b);
        assert!((dir_a.length() - 1.0).abs() < 1.0e-5);
    }

    #[test]
    fn zero_jitter_uses_the_branching_angle_exactly() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let dir = jittered_lateral_direction(0.0, 0.0, &mut rng);
        // Angle 0 collapses to the vertical axis regardless of signs.
        assert!((dir.y - 1.0).abs() < 1.0e-6);
        assert!(dir.x.abs() < 1.0e-6 && dir.z.abs() < 1.0e-6);
    }
}
