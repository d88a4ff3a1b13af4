//! Borchert–Honda resource distribution over the internode graph.
//!
//! Two ordered passes per growth step:
//! 1. [Basipetal] — light aggregation from the tips toward the root.
//! 2. [Acropetal] — resource allocation from the root toward the tips,
//!    splitting each internode's budget between its two competing
//!    consumers.
//!
//! [Basipetal]: distribute
//! [Acropetal]: distribute

use log::trace;

use crate::{config::GrowthConfig, internode::InternodeGraph};

/// Runs both BH passes over the graph, in place.
///
/// The root is the unique internode with no parent. Internode light and
/// resource accumulators (and bud resource amounts) are cleared first; bud
/// light values are the solver's output and are left untouched.
///
/// **Basipetal pass**: a breadth-first traversal from the root collects a
/// LIFO order; processing in reverse (leaves first), each internode adds
/// its own buds' light into its own `light_amount`, then adds its own
/// `light_amount` into its parent's. This aggregates the scalar light
/// demand of every tip down to the root.
///
/// **Acropetal pass**: the root's budget is `alpha * root.light_amount`.
/// In BFS order (root first), each internode's budget `V` is split between
/// its two competing consumers:
///
/// ```text
/// vA = V *      lambda  * qA / (lambda*qA + (1-lambda)*qB + epsilon)
/// vB = V * (1 - lambda) * qB / (lambda*qA + (1-lambda)*qB + epsilon)
/// ```
///
/// with `lambda` biasing allocation toward the continuing axis and
/// `epsilon` keeping the denominator nonzero. Consumer selection:
///
/// - two or more children: A and B are the first two children
///   (positional, not geometric); further children receive nothing.
/// - exactly one child: A is that child, B is the lateral bud.
/// - no children: A is the terminal bud, B is the lateral bud.
///
/// An absent or unlit second slot simply receives 0, and its sole lit
/// competitor takes the whole budget; the weighted formula only runs when
/// both consumers actually demand light.
///
/// ### Parameters
/// - `graph` - The graph to distribute over; mutated in place.
/// - `cfg` - Provides `alpha`, `lambda` and `epsilon`.
pub fn distribute(graph: &mut InternodeGraph, cfg: &GrowthConfig) {
    let Some(root) = graph.root() else {
        return;
    };

    for node in &mut graph.nodes {
        node.light_amount = 0.0;
        node.resource_amount = 0.0;
        if let Some(bud) = &mut node.terminal_bud {
            bud.resource_amount = 0.0;
        }
        if let Some(bud) = &mut node.lateral_bud {
            bud.resource_amount = 0.0;
        }
    }

    let order = graph.bfs_order(root);

    // Basipetal: leaves first.
    for &id in order.iter().rev() {
        let bud_light = graph.nodes[id]
            .terminal_bud
            .as_ref()
            .map_or(0.0, |b| b.light_amount)
            + graph.nodes[id]
                .lateral_bud
                .as_ref()
                .map_or(0.0, |b| b.light_amount);
        graph.nodes[id].light_amount += bud_light;

        if let Some(parent) = graph.nodes[id].parent {
            let light = graph.nodes[id].light_amount;
            graph.nodes[parent].light_amount += light;
        }
    }
    trace!(
        "basipetal pass complete, root light {}",
        graph.nodes[root].light_amount
    );

    // Acropetal: root first.
    graph.nodes[root].resource_amount = cfg.alpha * graph.nodes[root].light_amount;

    for &id in &order {
        let v = graph.nodes[id].resource_amount;
        let child_count = graph.nodes[id].children.len();

        if child_count >= 2 {
            let a = graph.nodes[id].children[0];
            let b = graph.nodes[id].children[1];
            let (va, vb) = bh_split(
                v,
                graph.nodes[a].light_amount,
                graph.nodes[b].light_amount,
                cfg,
            );
            graph.nodes[a].resource_amount = va;
            graph.nodes[b].resource_amount = vb;
        } else if child_count == 1 {
            let a = graph.nodes[id].children[0];
            let qa = graph.nodes[a].light_amount;
            let qb = graph.nodes[id]
                .lateral_bud
                .as_ref()
                .map_or(0.0, |b| b.light_amount);
            let (va, vb) = bh_split(v, qa, qb, cfg);
            graph.nodes[a].resource_amount = va;
            if let Some(bud) = &mut graph.nodes[id].lateral_bud {
                bud.resource_amount = vb;
            }
        } else {
            let qa = graph.nodes[id]
                .terminal_bud
                .as_ref()
                .map_or(0.0, |b| b.light_amount);
            let qb = graph.nodes[id]
                .lateral_bud
                .as_ref()
                .map_or(0.0, |b| b.light_amount);
            let (va, vb) = bh_split(v, qa, qb, cfg);
            if let Some(bud) = &mut graph.nodes[id].terminal_bud {
                bud.resource_amount = va;
            }
            if let Some(bud) = &mut graph.nodes[id].lateral_bud {
                bud.resource_amount = vb;
            }
        }
    }
    trace!(
        "acropetal pass complete, root resource {}",
        graph.nodes[root].resource_amount
    );
}

/// The BH split of budget `v` between the main consumer (`q_main`) and the
/// lateral consumer (`q_lateral`).
///
/// A sole demander takes the whole budget; the weighted formula only
/// arbitrates between two actually competing consumers, so epsilon never
/// bleeds budget away from an uncontested bud.
fn bh_split(v: f32, q_main: f32, q_lateral: f32, cfg: &GrowthConfig) -> (f32, f32) {
    if q_main > 0.0 && q_lateral == 0.0 {
        return (v, 0.0);
    }
    if q_main == 0.0 && q_lateral > 0.0 {
        return (0.0, v);
    }
    let denom = cfg.lambda * q_main + (1.0 - cfg.lambda) * q_lateral + cfg.epsilon;
    (
        v * cfg.lambda * q_main / denom,
        v * (1.0 - cfg.lambda) * q_lateral / denom,
    )
}
