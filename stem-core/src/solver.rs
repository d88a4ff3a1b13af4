//! Growth-direction solving: assigns every light resource to its nearest
//! bud, then derives a weighted optimal growth direction per served bud.
//!
//! This is the first phase of a growth step. The second phase
//! ([`crate::distribution`]) consumes the light values this solver writes
//! onto the buds.

use glam::Vec3;

use crate::{internode::InternodeGraph, resource::ResourceRegistry, types::NodeId};

/// Addresses one bud slot on an internode, or the synthetic seed bud used
/// when the graph has no buds at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BudSlot {
    Terminal(NodeId),
    Lateral(NodeId),
    /// Zero-length bud at the origin, synthesized for an empty tree so
    /// that every resource still has somewhere to go.
    Seed,
}

/// Ephemeral per-iteration result for one served bud, consumed by the
/// distribution engine and the L-system adapter. Not persisted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GrowthPair {
    pub bud_position: Vec3,
    pub optimal_point: Vec3,
    pub optimal_angle_degrees: f32,
    pub light_value: f32,
}

/// A growth pair tagged with the bud slot it was computed for.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolvedBud {
    pub slot: BudSlot,
    pub pair: GrowthPair,
}

/// Runs the growth-direction solver over the current bud list.
///
/// For each resource in the registry snapshot the **closest bud** is found
/// by Euclidean distance from the resource position to the bud's end
/// point (ties broken by first-encountered in iteration order), building an
/// adjacency from bud to assigned resources. Every resource is assigned
/// unconditionally to its nearest bud; only an empty bud list diverts them
/// to the synthetic [`BudSlot::Seed`] at the origin.
///
/// For each bud with at least one assigned resource:
///
/// 1. `mean_resource_pos` is the arithmetic mean of the assigned positions.
/// 2. `optimal_direction = mean_resource_pos - bud_position`.
/// 3. `optimal_point = bud_position + optimal_direction`.
/// 4. The angle is `acos` of the normalized dot product between
///    `optimal_point` and `bud_position`, in degrees, defined as 0 when
///    either vector has zero length.
///
/// Served buds get `light_amount = 1.0` written back onto the bud record;
/// unserved buds are skipped and keep the cleared value of 0.
///
/// ### Parameters
/// - `graph` - The current internode graph; bud light values are updated
///   in place.
/// - `registry` - Snapshot of the current light resources.
///
/// ### Returns
/// One [`SolvedBud`] per served bud, in bud-list order.
pub fn solve(graph: &mut InternodeGraph, registry: &ResourceRegistry) -> Vec<SolvedBud> {
    // Clear stale competition values before this step's assignment.
    for node in &mut graph.nodes {
        if let Some(bud) = &mut node.terminal_bud {
            bud.light_amount = 0.0;
        }
        if let Some(bud) = &mut node.lateral_bud {
            bud.light_amount = 0.0;
        }
    }

    let slots = collect_bud_slots(graph);

    if slots.is_empty() {
        if registry.is_empty() {
            return Vec::new();
        }
        // Degenerate tree: a zero-length bud at the origin absorbs every
        // resource so growth can be seeded.
        let mean = mean_position(registry.positions());
        let optimal_direction = mean - Vec3::ZERO;
        return vec![SolvedBud {
            slot: BudSlot::Seed,
            pair: GrowthPair {
                bud_position: Vec3::ZERO,
                optimal_point: Vec3::ZERO + optimal_direction,
                optimal_angle_degrees: 0.0,
                light_value: 1.0,
            },
        }];
    }

    let positions: Vec<Vec3> = slots.iter().map(|&slot| slot_position(graph, slot)).collect();
    let adjacency = bud_resource_adjacency(&positions, registry);

    let mut served = Vec::with_capacity(slots.len());
    for (i, assigned) in adjacency.iter().enumerate() {
        if assigned.is_empty() {
            continue;
        }

        let bud_position = positions[i];
        let mean = mean_position(assigned.iter().copied());
        let optimal_direction = mean - bud_position;
        let optimal_point = bud_position + optimal_direction;
        let light_value = 1.0;

        set_bud_light(graph, slots[i], light_value);

        served.push(SolvedBud {
            slot: slots[i],
            pair: GrowthPair {
                bud_position,
                optimal_point,
                optimal_angle_degrees: angle_between_degrees(optimal_point, bud_position),
                light_value,
            },
        });
    }
    served
}

/// Assigns each resource to its nearest bud position.
///
/// The result is parallel to `bud_positions`: entry `i` holds the
/// positions of every resource whose closest bud is bud `i`. Assignment is
/// deterministic for unchanged input; distance ties keep the
/// first-encountered bud.
pub fn bud_resource_adjacency(
    bud_positions: &[Vec3],
    registry: &ResourceRegistry,
) -> Vec<Vec<Vec3>> {
    let mut adjacency = vec![Vec::new(); bud_positions.len()];
    if bud_positions.is_empty() {
        return adjacency;
    }

    for res_pos in registry.positions() {
        let mut best = 0;
        let mut best_d2 = f32::MAX;
        for (i, &bud_pos) in bud_positions.iter().enumerate() {
            let d2 = (res_pos - bud_pos).length_squared();
            if d2 < best_d2 {
                best_d2 = d2;
                best = i;
            }
        }
        adjacency[best].push(res_pos);
    }
    adjacency
}

/// Every bud slot in the graph, in internode order with the terminal bud
/// before the lateral bud of the same internode.
pub fn collect_bud_slots(graph: &InternodeGraph) -> Vec<BudSlot> {
    let mut slots = Vec::new();
    for (id, node) in graph.nodes.iter().enumerate() {
        if node.terminal_bud.is_some() {
            slots.push(BudSlot::Terminal(id));
        }
        if node.lateral_bud.is_some() {
            slots.push(BudSlot::Lateral(id));
        }
    }
    slots
}

/// Mean direction from `base` toward all registered resources, or the zero
/// vector when no resources exist. Whole-tree variant of the per-bud math,
/// exposed for grammar-level consumers.
pub fn mean_direction_toward(registry: &ResourceRegistry, base: Vec3) -> Vec3 {
    if registry.is_empty() {
        return Vec3::ZERO;
    }
    mean_position(registry.positions()) - base
}

fn slot_position(graph: &InternodeGraph, slot: BudSlot) -> Vec3 {
    match slot {
        BudSlot::Terminal(id) | BudSlot::Lateral(id) => graph.nodes[id].end,
        BudSlot::Seed => Vec3::ZERO,
    }
}

fn set_bud_light(graph: &mut InternodeGraph, slot: BudSlot, light: f32) {
    let bud = match slot {
        BudSlot::Terminal(id) => graph.nodes[id].terminal_bud.as_mut(),
        BudSlot::Lateral(id) => graph.nodes[id].lateral_bud.as_mut(),
        BudSlot::Seed => None,
    };
    if let Some(bud) = bud {
        bud.light_amount = light;
    }
}

fn mean_position(positions: impl Iterator<Item = Vec3>) -> Vec3 {
    let mut sum = Vec3::ZERO;
    let mut count = 0u32;
    for p in positions {
        sum += p;
        count += 1;
    }
    if count == 0 { Vec3::ZERO } else { sum / count as f32 }
}

fn angle_between_degrees(a: Vec3, b: Vec3) -> f32 {
    let la = a.length();
    let lb = b.length();
    if la == 0.0 || lb == 0.0 {
        return 0.0;
    }
    let cos = (a.dot(b) / (la * lb)).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}
