//! The error taxonomy for the configuration pipeline and execution engine.
//!
//! Load-time errors (parsing, syntax/semantic checks, graph construction)
//! are all represented here so callers can match on what actually went
//! wrong instead of inspecting message strings. Run-time per-node failures
//! (`RuntimeError`, `SubprocessError`) are the two variants the engine
//! recovers from locally; every other variant aborts the load.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum OctopusError {
    #[error("unknown keyword {0:?}")]
    UnknownKeyword(String),

    #[error("unsupported version {0:?}")]
    UnsupportedVersion(String),

    #[error("missing required field {field:?} for {context}")]
    MissingField { context: String, field: String },

    #[error("duplicate name {0:?}")]
    DuplicateName(String),

    #[error("runner mode mismatch: test {test:?} has mode {mode:?} but runner shape {runner_kind:?}")]
    RunnerModeMismatch {
        test: String,
        mode: String,
        runner_kind: String,
    },

    #[error("{host:?} refers to nonexistent {kind} {reference:?}")]
    UnknownReference {
        host: String,
        kind: &'static str,
        reference: String,
    },

    #[error("semantic check failed:\n{}", .0.join("\n"))]
    SemanticCheckFailed(Vec<String>),

    #[error("invalid edge type {0:?}")]
    InvalidEdgeType(String),

    #[error("cyclic graph, cannot produce a topological order or execution plan")]
    CyclicGraph,

    #[error("cannot reassign non-lazy variable {0:?}")]
    InvalidMutation(String),
}

pub type Result<T> = std::result::Result<T, OctopusError>;
