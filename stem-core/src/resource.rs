use std::collections::BTreeMap;

use glam::Vec3;

/// An external point-like light source, read-only from the engine's
/// perspective: an opaque handle plus its world position.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceNode {
    pub name: String,
    pub position: Vec3,
}

impl ResourceNode {
    pub fn new(name: impl Into<String>, position: Vec3) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }
}

/// Snapshot of the light resources observed at the last refresh.
///
/// The registry never learns about scene changes by notification; the
/// caller polls the scene once per growth step and the registry compares
/// the polled list against its snapshot. Each simulation instance owns its
/// own registry, so multiple trees can grow in one process.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    snapshot: BTreeMap<String, Vec3>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `current` differs from the snapshot: the count
    /// changed, a handle is missing from the snapshot, or a matched node
    /// moved. Positions compare exactly.
    pub fn is_dirty(&self, current: &[ResourceNode]) -> bool {
        if current.len() != self.snapshot.len() {
            return true;
        }
        current
            .iter()
            .any(|node| self.snapshot.get(&node.name) != Some(&node.position))
    }

    /// Clears and repopulates the snapshot from `current`.
    pub fn refresh(&mut self, current: &[ResourceNode]) {
        self.snapshot.clear();
        self.snapshot.extend(
            current
                .iter()
                .map(|node| (node.name.clone(), node.position)),
        );
    }

    /// Snapshot positions in stable (handle-sorted) order.
    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.snapshot.values().copied()
    }

    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }
}
