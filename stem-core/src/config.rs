#[derive(Clone, Copy, Debug)]
pub struct GrowthConfig {
    pub alpha: f32,
    pub lambda: f32,
    pub epsilon: f32,
    pub internode_radius: f32,
    pub shoot_length_factor: f32,
    /// Upper bound on shoots synthesized per bud in a single step.
    pub max_shoots_per_bud: u32,
    /// Endpoint-coincidence tolerance for linkage. `None` means bit-exact
    /// coordinate equality, matching the upstream grammar engine's output.
    pub link_tolerance: Option<f32>,
    /// Base seed for the per-iteration lateral jitter streams.
    pub jitter_seed: u64,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            lambda: 0.5,
            epsilon: 0.001,
            internode_radius: 0.25,
            shoot_length_factor: 0.25,
            max_shoots_per_bud: 64,
            link_tolerance: None,
            jitter_seed: 0,
        }
    }
}
