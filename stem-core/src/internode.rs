use std::collections::VecDeque;

use glam::Vec3;

use crate::types::NodeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BudKind {
    Terminal,
    Lateral,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Bud {
    pub kind: BudKind,
    pub parent: NodeId,
    /// Continuing internode, only ever set on lateral buds whose owning
    /// internode has exactly one child.
    pub child: Option<NodeId>,
    pub light_amount: f32,
    pub resource_amount: f32,
}

impl Bud {
    pub fn new(kind: BudKind, parent: NodeId, child: Option<NodeId>) -> Self {
        Self {
            kind,
            parent,
            child,
            light_amount: 0.0,
            resource_amount: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Internode {
    pub start: Vec3,
    pub end: Vec3,
    pub radius: f32,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub light_amount: f32,
    pub resource_amount: f32,
    pub terminal_bud: Option<Bud>,
    pub lateral_bud: Option<Bud>,
}

impl Internode {
    pub fn new(start: Vec3, end: Vec3, radius: f32) -> Self {
        Self {
            start,
            end,
            radius,
            parent: None,
            children: Vec::with_capacity(2),
            light_amount: 0.0,
            resource_amount: 0.0,
            terminal_bud: None,
            lateral_bud: None,
        }
    }

    /// Unit direction from `start` to `end`, or zero for a degenerate
    /// zero-length segment.
    pub fn heading(&self) -> Vec3 {
        (self.end - self.start).normalize_or_zero()
    }

    pub fn has_terminal_bud(&self) -> bool {
        self.terminal_bud.is_some()
    }

    pub fn has_lateral_bud(&self) -> bool {
        self.lateral_bud.is_some()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InternodeGraph {
    pub nodes: Vec<Internode>,
}

impl InternodeGraph {
    /// Builds a linked graph from raw `(x0,y0,z0,x1,y1,z1)` segments as
    /// emitted by the grammar engine, then attaches bud records.
    ///
    /// Linkage is derived purely from geometric coincidence: internode `a`
    /// becomes the parent of internode `b` iff `a.end` matches `b.start`.
    /// With `tolerance == None` the match is bit-exact coordinate equality,
    /// which is what the upstream turtle actually produces.
    pub fn from_segments(segments: &[[f32; 6]], radius: f32, tolerance: Option<f32>) -> Self {
        let nodes = segments
            .iter()
            .map(|s| {
                Internode::new(
                    Vec3::new(s[0], s[1], s[2]),
                    Vec3::new(s[3], s[4], s[5]),
                    radius,
                )
            })
            .collect();

        let mut graph = Self { nodes };
        graph.relink(tolerance);
        graph.assign_buds();
        graph
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Rebuilds every parent/child edge from endpoint coincidence.
    ///
    /// All existing references are cleared first so that edges from a
    /// previous linkage pass cannot accumulate. The scan is an O(n²)
    /// all-pairs comparison, acceptable for the tens-to-hundreds of
    /// internodes a tree carries per iteration.
    pub fn relink(&mut self, tolerance: Option<f32>) {
        for node in &mut self.nodes {
            node.parent = None;
            node.children.clear();
        }

        for i in 0..self.nodes.len() {
            for j in 0..self.nodes.len() {
                if i == j {
                    continue;
                }
                if points_coincide(self.nodes[i].end, self.nodes[j].start, tolerance) {
                    self.nodes[i].children.push(j);
                    self.nodes[j].parent = Some(i);
                }
            }
        }
    }

    /// Attaches or refreshes bud records according to child count:
    /// zero children get a terminal and a lateral bud, exactly one child
    /// gets only a lateral bud (linked to the continuing internode), and
    /// two or more children get none.
    ///
    /// A bud slot that is still permitted keeps its existing record and
    /// accumulated amounts; slots that became invalid are dropped and new
    /// slots start zeroed.
    pub fn assign_buds(&mut self) {
        for id in 0..self.nodes.len() {
            let child_count = self.nodes[id].children.len();
            let continuing = self.nodes[id].children.first().copied();
            let node = &mut self.nodes[id];

            match child_count {
                0 => {
                    if node.terminal_bud.is_none() {
                        node.terminal_bud = Some(Bud::new(BudKind::Terminal, id, None));
                    }
                    match &mut node.lateral_bud {
                        Some(bud) => bud.child = None,
                        None => node.lateral_bud = Some(Bud::new(BudKind::Lateral, id, None)),
                    }
                }
                1 => {
                    node.terminal_bud = None;
                    match &mut node.lateral_bud {
                        Some(bud) => bud.child = continuing,
                        None => node.lateral_bud = Some(Bud::new(BudKind::Lateral, id, continuing)),
                    }
                }
                _ => {
                    node.terminal_bud = None;
                    node.lateral_bud = None;
                }
            }
        }
    }

    /// The unique internode with no parent, if any. When the linkage scan
    /// leaves several parentless internodes the lowest index wins.
    pub fn root(&self) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.parent.is_none())
    }

    /// Breadth-first order from `root`, via an explicit queue.
    pub fn bfs_order(&self, root: NodeId) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut queue = VecDeque::with_capacity(self.nodes.len());
        queue.push_back(root);
        while let Some(id) = queue.pop_front() {
            order.push(id);
            for &child in &self.nodes[id].children {
                queue.push_back(child);
            }
        }
        order
    }
}

fn points_coincide(a: Vec3, b: Vec3, tolerance: Option<f32>) -> bool {
    match tolerance {
        None => a == b,
        Some(tol) => (a - b).length_squared() <= tol * tol,
    }
}
