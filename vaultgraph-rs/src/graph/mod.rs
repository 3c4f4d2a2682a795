//! Link graph and link resolution.

pub mod fuzzy;
pub mod link_graph;
pub mod resolution;

pub use fuzzy::{FuzzyResolver, Suggestion};
pub use link_graph::LinkGraph;
pub use resolution::{
    CandidateSource, ExactResolver, LookupKey, Overlay, ResolveRules, ResolveStrategy, ResolverTables,
};
