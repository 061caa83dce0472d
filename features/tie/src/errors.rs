use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::types::{DynError, TypeInfo};

/// Errors while building a graph
///
/// All of them describe a mistake in the registered components, so retrying
/// the same build yields the same error.
#[derive(Error, Debug, Clone)]
pub enum BuildError {
    /// A slot has no compatible provider
    ///
    /// Raised before construction for factory parameters, and after
    /// construction for instance slots which are still empty.
    #[error("dependency not enough: {dependency} for {component}#{slot}")]
    UnsatisfiedDependency {
        component: String,
        slot: String,
        dependency: TypeInfo,
    },

    /// Factories depend on each other in a loop
    #[error("dependency has a cycle: {0}")]
    DependencyCycle(CycleTrace),

    /// A non-root component is compatible with no slot at all
    #[error("unused component: {0}")]
    UnusedComponent(String),

    /// One component declares the same type for two of its slots
    #[error("interface conflict: {component} declares {interface} more than once")]
    InterfaceConflict {
        component: String,
        interface: TypeInfo,
    },

    /// A factory reported an error, construction was aborted
    ///
    /// Displays as the factory's own error, `factory` names the one which failed.
    #[error("{error}")]
    FactoryFailed {
        factory: String,
        error: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// A built value could not be handed out as the requested type
    #[error("Failed to downcast, required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        required_type: TypeInfo,
        actual_type: String,
    },
}

impl BuildError {
    pub(crate) fn factory_failed(factory: &str, error: DynError) -> Self {
        BuildError::FactoryFailed {
            factory: factory.to_string(),
            error: Arc::from(error),
        }
    }

    /// The error a factory returned, if this build failed because of one
    pub fn factory_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            BuildError::FactoryFailed { error, .. } => Some(error.as_ref()),
            _ => None,
        }
    }
}

/// A concrete loop between factories, read as
/// `z -> Y for y -> Z for z`: `z` provides `Y` to `y`, which provides `Z` back to `z`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleTrace {
    /// Component the loop was entered from
    pub start: String,
    /// Every following hop, ending on `start` again
    pub steps: Vec<CycleStep>,
}

/// One hop of a [CycleTrace]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleStep {
    /// Declared type of the slot that created the edge
    pub requirement: TypeInfo,
    /// The component owning that slot
    pub component: String,
}

impl CycleTrace {
    /// Components on the loop, in traversal order, `start` included once at each end
    pub fn components(&self) -> Vec<&str> {
        std::iter::once(self.start.as_str())
            .chain(self.steps.iter().map(|step| step.component.as_str()))
            .collect()
    }
}

impl fmt::Display for CycleTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.start)?;
        for step in &self.steps {
            write!(f, " -> {} for {}", step.requirement, step.component)?;
        }
        Ok(())
    }
}
