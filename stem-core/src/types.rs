/// Identifier for an internode in a [`crate::internode::InternodeGraph`].
///
/// This is an index into `InternodeGraph::nodes`, and is only meaningful
/// within the lifetime of a given graph instance. Snapshots cloned out of
/// the growth cache keep their indices because the arena is copied whole.
pub type NodeId = usize;
