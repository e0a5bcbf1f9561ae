//! Directed reachability edges between nodes.

use crate::node::Node;
use crate::result::{ProbeResult, Status};
use serde::{Deserialize, Serialize};

/// One tested `from -> to` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityEdge {
    pub from: Node,
    pub to: Node,
    pub reachable: bool,
    pub timed_out: bool,
    pub raw_output: String,
}

impl ConnectivityEdge {
    /// Row label, e.g. `m1 -> w1`
    pub fn label(&self) -> String {
        format!("{} -> {}", self.from.name, self.to.name)
    }

    pub fn to_result(&self) -> ProbeResult {
        let (status, body) = match (self.reachable, self.timed_out) {
            (true, _) => (Status::Ok, "reachable"),
            (false, true) => (Status::Error, "unreachable (timed out)"),
            (false, false) => (Status::Error, "unreachable"),
        };
        ProbeResult::new(self.label(), status, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(reachable: bool, timed_out: bool) -> ConnectivityEdge {
        ConnectivityEdge {
            from: Node::inferred("m1"),
            to: Node::inferred("w1"),
            reachable,
            timed_out,
            raw_output: String::new(),
        }
    }

    #[test]
    fn test_edge_rows() {
        assert_eq!(edge(true, false).to_result(), ProbeResult::ok("m1 -> w1", "reachable"));
        assert_eq!(edge(false, false).to_result().body, "unreachable");
        assert_eq!(edge(false, true).to_result().body, "unreachable (timed out)");
    }
}
