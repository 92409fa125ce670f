//! Tree placement records and placement results.

use serde::{Deserialize, Serialize};

use super::{Program, TimeMs, UserId};

/// One position in a program tree.
///
/// Placements are never deleted. A recycled matrix root is marked inactive
/// and a fresh placement with `instance + 1` takes its place; the historical
/// tree stays queryable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreePlacement {
    pub id: i64,
    pub user_id: UserId,
    pub program: Program,
    pub slot_no: i64,
    /// Placement id of the parent node; None for a tree root.
    pub parent_id: Option<i64>,
    /// Recycle number for matrix trees, 1 for the first instance.
    pub instance: i64,
    /// Global phase (1 or 2); None outside the Global program.
    pub phase: Option<i64>,
    /// Depth below the tree root (root = 0).
    pub level: i64,
    /// Sibling index under the parent, left to right from 0.
    pub position: i64,
    /// Direct children attached so far (capacity guard).
    pub child_count: i64,
    /// Total descendants, maintained on every placement below this node.
    pub team_size: i64,
    pub active: bool,
    /// Set once the completion quota is reached and claimed.
    pub completed: bool,
    pub created_at: TimeMs,
}

/// Outcome of placing a user, consumed by the commission distributor and
/// returned to the adapter layer for display coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementResult {
    pub placement: TreePlacement,
    /// Placement ids of subtrees whose completion this placement triggered.
    pub completed_subtrees: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_serializes() {
        let p = TreePlacement {
            id: 1,
            user_id: UserId::new("u1".to_string()),
            program: Program::Matrix,
            slot_no: 1,
            parent_id: None,
            instance: 1,
            phase: None,
            level: 0,
            position: 0,
            child_count: 0,
            team_size: 0,
            active: true,
            completed: false,
            created_at: TimeMs::new(1000),
        };
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["program"], "matrix");
        assert_eq!(json["instance"], 1);
    }
}
