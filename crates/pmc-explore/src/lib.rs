//! Explicit-state successor generation for networks of stochastic automata.

pub mod actions;
pub mod component;
pub mod config;
pub mod enumerate;
pub mod error;
pub mod evaluator;
pub mod explorer;
pub mod extension;
pub mod property;
pub mod registry;
pub mod state;
pub mod successors;

pub use actions::{ActionId, ActionIndex, SILENT};
pub use component::{AutomatonExplorer, Component, ComponentExplorer, EdgeProbabilitySum};
pub use config::{EnumeratorKind, ExplorerConfig};
pub use enumerate::{enumerate, EnumVariable};
pub use error::{ExploreError, ExploreResult};
pub use explorer::Explorer;
pub use extension::{
    ExplorerExtension, ProbabilityDeviation, ProbabilitySumCheck, ProbabilitySumReport,
};
pub use property::{EdgeProperty, GraphProperty, NodeProperty, PropertyValue};
pub use registry::{Permanence, Slot, SlotName, SlotRegistry};
pub use state::{Fingerprint, StateVector};
pub use successors::Successors;
