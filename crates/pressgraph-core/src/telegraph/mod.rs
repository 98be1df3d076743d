mod client;
mod nodes;

pub use client::{TelegraphClient, DEFAULT_API_BASE};
pub use nodes::{html_to_nodes, ContentNode, ConvertRules, NodeElement};
