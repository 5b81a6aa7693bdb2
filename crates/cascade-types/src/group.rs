use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a replica group.
///
/// A group names a set of storage nodes that all hold a copy of an object.
/// A write targets one or more groups; a read is satisfied by any one group
/// holding the data.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct GroupId(pub u32);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group-{}", self.0)
    }
}

/// Address of a single storage node.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct NodeAddr(pub String);

impl NodeAddr {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Policy deciding when a fanned-out write counts as successful.
///
/// Applied per logical write over the set of targeted replica groups.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum SuccessPolicy {
    /// Every targeted group must acknowledge the write.
    All,
    /// At least `n` groups must acknowledge the write.
    Quorum(usize),
}

impl SuccessPolicy {
    /// Number of acknowledgements required out of `total` targeted groups.
    pub fn required(&self, total: usize) -> usize {
        match self {
            SuccessPolicy::All => total,
            // A quorum larger than the target set degenerates to "all".
            SuccessPolicy::Quorum(n) => (*n).min(total),
        }
    }

    /// Returns `true` if `acked` acknowledgements satisfy the policy.
    pub fn satisfied(&self, acked: usize, total: usize) -> bool {
        acked >= self.required(total)
    }
}

impl Default for SuccessPolicy {
    fn default() -> Self {
        SuccessPolicy::All
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_requires_every_group() {
        let p = SuccessPolicy::All;
        assert_eq!(p.required(3), 3);
        assert!(p.satisfied(3, 3));
        assert!(!p.satisfied(2, 3));
    }

    #[test]
    fn quorum_requires_n() {
        let p = SuccessPolicy::Quorum(2);
        assert!(p.satisfied(2, 3));
        assert!(!p.satisfied(1, 3));
    }

    #[test]
    fn quorum_clamps_to_total() {
        let p = SuccessPolicy::Quorum(5);
        assert_eq!(p.required(3), 3);
        assert!(p.satisfied(3, 3));
    }

    #[test]
    fn group_display() {
        assert_eq!(GroupId(2).to_string(), "group-2");
    }

    #[test]
    fn node_addr_display() {
        let a = NodeAddr::new("localhost:1025");
        assert_eq!(a.to_string(), "localhost:1025");
        assert_eq!(a.as_str(), "localhost:1025");
    }
}
