//! Vigil shared types: nodes, commands, probe results, classifiers and
//! report assembly. No process execution happens in this crate.

pub mod classify;
pub mod command;
pub mod edge;
pub mod error;
pub mod node;
pub mod report;
pub mod resource;
pub mod result;

pub use classify::{Classifier, Verdict};
pub use command::{Command, CommandOutcome, FailureKind, ERROR_MARKER, TIMED_OUT_MARKER};
pub use edge::ConnectivityEdge;
pub use error::{Result, VigilError};
pub use node::{Inventory, Node, NodeRole};
pub use report::{Report, ReportAssembler, Section};
pub use resource::{EphemeralResource, ResourceKind};
pub use result::{worst_status, ProbeResult, Status};
