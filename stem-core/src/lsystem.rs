//! Translation between the external grammar engine's flat-array
//! representation and the internode graph. Pure conversion, no algorithmic
//! content.

use glam::Vec3;

use crate::{internode::InternodeGraph, solver::GrowthPair};

/// Surface of the external grammar-rewriting engine.
///
/// The engine turns a textual production grammar into branch segments and
/// flower points, and accepts per-bud optimal growth directions back for
/// grammar-level use. An invalid grammar yields empty output lists; the
/// growth core treats empty as a hard failure rather than recovering here.
pub trait GrammarEngine {
    fn load_program(&mut self, text: &str);
    fn set_default_angle(&mut self, degrees: f32);
    fn set_default_step(&mut self, distance: f32);
    /// Rewrites for `iterations` rounds and runs the turtle, returning
    /// `(branch_segments, flower_points)`.
    fn process(&mut self, iterations: u32) -> (Vec<[f32; 6]>, Vec<[f32; 3]>);
    fn set_optimal_bud_directions(
        &mut self,
        positions: Vec<[f32; 3]>,
        directions: Vec<[f32; 3]>,
        angles: Vec<f32>,
    );
    fn get_optimal_bud_directions(&self) -> (Vec<[f32; 3]>, Vec<[f32; 3]>, Vec<f32>);
}

/// Converts solver output into the three parallel arrays the grammar
/// engine expects: bud positions, direction vectors, and angles in
/// degrees.
pub fn bud_direction_arrays(
    pairs: &[GrowthPair],
) -> (Vec<[f32; 3]>, Vec<[f32; 3]>, Vec<f32>) {
    let mut positions = Vec::with_capacity(pairs.len());
    let mut directions = Vec::with_capacity(pairs.len());
    let mut angles = Vec::with_capacity(pairs.len());
    for pair in pairs {
        positions.push(pair.bud_position.to_array());
        directions.push((pair.optimal_point - pair.bud_position).to_array());
        angles.push(pair.optimal_angle_degrees);
    }
    (positions, directions, angles)
}

/// Pushes the solver's growth pairs into the grammar engine.
pub fn feed_optimal_directions(engine: &mut dyn GrammarEngine, pairs: &[GrowthPair]) {
    let (positions, directions, angles) = bud_direction_arrays(pairs);
    engine.set_optimal_bud_directions(positions, directions, angles);
}

/// Builds the internode graph from the grammar engine's branch segments.
pub fn segments_to_graph(
    segments: &[[f32; 6]],
    radius: f32,
    tolerance: Option<f32>,
) -> InternodeGraph {
    InternodeGraph::from_segments(segments, radius, tolerance)
}

/// Flower points pass through the adapter untouched.
pub fn flower_positions(points: &[[f32; 3]]) -> Vec<Vec3> {
    points.iter().map(|p| Vec3::from_array(*p)).collect()
}

/// Compares the engine's stored bud arrays against freshly converted
/// pairs, by exact equality. Debug/test aid, not needed at runtime.
pub fn verify_bud_arrays(engine: &dyn GrammarEngine, pairs: &[GrowthPair]) -> bool {
    let (positions, directions, angles) = bud_direction_arrays(pairs);
    let (stored_positions, stored_directions, stored_angles) =
        engine.get_optimal_bud_directions();
    positions == stored_positions && directions == stored_directions && angles == stored_angles
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal engine double that just records what it is given.
    #[derive(Default)]
    struct RecordingEngine {
        positions: Vec<[f32; 3]>,
        directions: Vec<[f32; 3]>,
        angles: Vec<f32>,
    }

    impl GrammarEngine for RecordingEngine {
        fn load_program(&mut self, _text: &str) {}
        fn set_default_angle(&mut self, _degrees: f32) {}
        fn set_default_step(&mut self, _distance: f32) {}
        fn process(&mut self, _iterations: u32) -> (Vec<[f32; 6]>, Vec<[f32; 3]>) {
            (Vec::new(), Vec::new())
        }
        fn set_optimal_bud_directions(
            &mut self,
            positions: Vec<[f32; 3]>,
            directions: Vec<[f32; 3]>,
            angles: Vec<f32>,
        ) {
            self.positions = positions;
            self.directions = directions;
            self.angles = angles;
        }
        fn get_optimal_bud_directions(&self) -> (Vec<[f32; 3]>, Vec<[f32; 3]>, Vec<f32>) {
            (
                self.positions.clone(),
                self.directions.clone(),
                self.angles.clone(),
            )
        }
    }

    fn sample_pairs() -> Vec<GrowthPair> {
        vec![
            GrowthPair {
                bud_position: Vec3::new(0.0, 1.0, 0.0),
                optimal_point: Vec3::new(0.0, 5.0, 0.0),
                optimal_angle_degrees: 0.0,
                light_value: 1.0,
            },
            GrowthPair {
                bud_position: Vec3::new(1.0, 2.0, 0.0),
                optimal_point: Vec3::new(3.0, 3.0, 1.0),
                optimal_angle_degrees: 17.5,
                light_value: 1.0,
            },
        ]
    }

    #[test]
    fn arrays_are_parallel_and_directions_are_relative() {
        let (positions, directions, angles) = bud_direction_arrays(&sample_pairs());

        assert_eq!(positions.len(), 2);
        assert_eq!(directions.len(), 2);
        assert_eq!(angles.len(), 2);

        assert_eq!(positions[0], [0.0, 1.0, 0.0]);
        // Direction is optimal point minus bud position.
        assert_eq!(directions[0], [0.0, 4.0, 0.0]);
        assert_eq!(directions[1], [2.0, 1.0, 1.0]);
        assert_eq!(angles[1], 17.5);
    }

    #[test]
    fn round_trip_through_engine_is_exact() {
        let pairs = sample_pairs();
        let mut engine = RecordingEngine::default();

        feed_optimal_directions(&mut engine, &pairs);

        assert!(verify_bud_arrays(&engine, &pairs));
    }

    #[test]
    fn round_trip_detects_mismatch() {
        let pairs = sample_pairs();
        let mut engine = RecordingEngine::default();
        feed_optimal_directions(&mut engine, &pairs);

        // Drop one pair: the stored arrays no longer match.
        assert!(!verify_bud_arrays(&engine, &pairs[..1]));
    }

    #[test]
    fn segments_to_graph_builds_linked_internodes() {
        let graph = segments_to_graph(
            &[[0.0, 0.0, 0.0, 0.0, 1.0, 0.0], [0.0, 1.0, 0.0, 0.0, 2.0, 0.0]],
            0.25,
            None,
        );
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.nodes[1].parent, Some(0));
        assert_eq!(graph.nodes[0].radius, 0.25);
    }

    #[test]
    fn flower_positions_pass_through() {
        let flowers = flower_positions(&[[1.0, 2.0, 3.0]]);
        assert_eq!(flowers, vec![Vec3::new(1.0, 2.0, 3.0)]);
    }
}
