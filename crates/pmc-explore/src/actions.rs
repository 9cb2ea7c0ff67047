//! Dense action numbering.

use crate::error::{ExploreError, ExploreResult};
use std::collections::HashMap;

/// Index of an action; [`SILENT`] is reserved.
pub type ActionId = usize;

/// The silent action.
pub const SILENT: ActionId = 0;

/// Numbering of the model's actions: silent is 0, declared actions follow in
/// declaration order.
#[derive(Debug, Clone)]
pub struct ActionIndex {
    names: Vec<String>,
    by_name: HashMap<String, ActionId>,
}

impl ActionIndex {
    pub fn new(actions: &[String]) -> ExploreResult<Self> {
        let mut by_name = HashMap::with_capacity(actions.len());
        for (i, name) in actions.iter().enumerate() {
            if by_name.insert(name.clone(), i + 1).is_some() {
                return Err(ExploreError::InvalidModel(format!(
                    "action '{}' declared twice",
                    name
                )));
            }
        }
        Ok(Self {
            names: actions.to_vec(),
            by_name,
        })
    }

    /// Number of actions including silent.
    pub fn len(&self) -> usize {
        self.names.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Resolve an optional action name; `None` is silent.
    pub fn id(&self, name: Option<&str>) -> ExploreResult<ActionId> {
        match name {
            None => Ok(SILENT),
            Some(name) => self
                .by_name
                .get(name)
                .copied()
                .ok_or_else(|| ExploreError::UnknownAction(name.to_string())),
        }
    }

    /// Name of an action, `None` for silent.
    pub fn name(&self, id: ActionId) -> Option<&str> {
        if id == SILENT {
            None
        } else {
            self.names.get(id - 1).map(String::as_str)
        }
    }
}
