//! Target addressing and selection.

use rand::seq::SliceRandom;

/// `node:port`, bracketing IPv6 literals.
pub fn target_addr(node: &str, port: u16) -> String {
    if node.contains(':') && !node.starts_with('[') {
        format!("[{}]:{}", node, port)
    } else {
        format!("{}:{}", node, port)
    }
}

/// Pick one node uniformly at random. No weighting, no affinity.
pub fn select_node(nodes: &[String]) -> Option<&str> {
    nodes.choose(&mut rand::thread_rng()).map(String::as_str)
}
