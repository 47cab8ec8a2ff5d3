//! Per-subresource state tracking.
//!
//! A resource either has one state shared by every subresource, or tracks each
//! subresource individually after the first transition that makes them
//! diverge. Transitions that bring every subresource back to the same state
//! collapse the tracker to the shared form again.

use crate::types::ResourceStates;

/// Current states of a resource's subresources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubresourceStates {
    /// Every subresource is in this state.
    Uniform(ResourceStates),
    /// One state per subresource, indexed by flat subresource index.
    PerSubresource(Vec<ResourceStates>),
}

/// One barrier produced by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    /// Affected subresource, or `None` for all of them.
    pub subresource: Option<u32>,
    /// State before the barrier.
    pub before: ResourceStates,
    /// State after the barrier.
    pub after: ResourceStates,
}

/// Error returned when transitioning a locked resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateLockedError;

/// Tracks the GPU-visible state of a resource.
#[derive(Debug, Clone)]
pub struct StateTracker {
    states: SubresourceStates,
    subresource_count: u32,
    locked: bool,
}

impl StateTracker {
    /// Create a tracker with every subresource in `initial`.
    pub fn new(initial: ResourceStates, subresource_count: u32) -> Self {
        Self {
            states: SubresourceStates::Uniform(initial),
            subresource_count: subresource_count.max(1),
            locked: false,
        }
    }

    /// Create a tracker whose state can never change.
    pub fn locked(state: ResourceStates, subresource_count: u32) -> Self {
        Self {
            locked: true,
            ..Self::new(state, subresource_count)
        }
    }

    /// Whether transitions are rejected.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Lock or unlock the state.
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    /// Number of tracked subresources.
    pub fn subresource_count(&self) -> u32 {
        self.subresource_count
    }

    /// Raw states.
    pub fn states(&self) -> &SubresourceStates {
        &self.states
    }

    /// The shared state, if every subresource agrees.
    pub fn uniform_state(&self) -> Option<ResourceStates> {
        match &self.states {
            SubresourceStates::Uniform(state) => Some(*state),
            SubresourceStates::PerSubresource(_) => None,
        }
    }

    /// State of one subresource.
    pub fn state(&self, subresource: u32) -> ResourceStates {
        match &self.states {
            SubresourceStates::Uniform(state) => *state,
            SubresourceStates::PerSubresource(states) => states
                .get(subresource as usize)
                .copied()
                .unwrap_or(ResourceStates::COMMON),
        }
    }

    /// Whether every subresource holds all of `states`.
    pub fn has_all_states(&self, states: ResourceStates) -> bool {
        match &self.states {
            SubresourceStates::Uniform(state) => state.contains(states),
            SubresourceStates::PerSubresource(list) => list.iter().all(|s| s.contains(states)),
        }
    }

    /// Move a subresource (or all of them) to `target`.
    ///
    /// Returns the barriers needed; subresources already satisfying `target`
    /// produce none and keep their current state. An out-of-range subresource
    /// is logged and produces no barrier.
    pub fn transition(
        &mut self,
        subresource: Option<u32>,
        target: ResourceStates,
    ) -> Result<Vec<StateChange>, StateLockedError> {
        let mut changes = Vec::new();

        if let Some(index) = subresource {
            if index >= self.subresource_count {
                log::error!(
                    "Subresource {index} is out of range ({} subresources); transition ignored",
                    self.subresource_count
                );
                return Ok(changes);
            }
        }

        match (&self.states, subresource) {
            (SubresourceStates::Uniform(state), None) => {
                if !state.satisfies(target) {
                    changes.push(StateChange {
                        subresource: None,
                        before: *state,
                        after: target,
                    });
                }
            }
            (SubresourceStates::Uniform(state), Some(index)) => {
                if !state.satisfies(target) {
                    changes.push(StateChange {
                        subresource: Some(index),
                        before: *state,
                        after: target,
                    });
                }
            }
            (SubresourceStates::PerSubresource(states), None) => {
                for (i, state) in states.iter().enumerate() {
                    if !state.satisfies(target) {
                        changes.push(StateChange {
                            subresource: Some(i as u32),
                            before: *state,
                            after: target,
                        });
                    }
                }
            }
            (SubresourceStates::PerSubresource(states), Some(index)) => {
                let state = states
                    .get(index as usize)
                    .copied()
                    .unwrap_or(ResourceStates::COMMON);
                if !state.satisfies(target) {
                    changes.push(StateChange {
                        subresource: Some(index),
                        before: state,
                        after: target,
                    });
                }
            }
        }

        if changes.is_empty() {
            return Ok(changes);
        }

        if self.locked {
            return Err(StateLockedError);
        }

        self.apply(&changes);
        Ok(changes)
    }

    fn apply(&mut self, changes: &[StateChange]) {
        for change in changes {
            match change.subresource {
                None => self.states = SubresourceStates::Uniform(change.after),
                Some(index) => self.set_subresource(index, change.after),
            }
        }
        self.collapse();
    }

    fn set_subresource(&mut self, index: u32, state: ResourceStates) {
        if self.subresource_count == 1 {
            self.states = SubresourceStates::Uniform(state);
            return;
        }

        if let SubresourceStates::Uniform(shared) = self.states {
            self.states =
                SubresourceStates::PerSubresource(vec![shared; self.subresource_count as usize]);
        }

        if let SubresourceStates::PerSubresource(states) = &mut self.states {
            if let Some(slot) = states.get_mut(index as usize) {
                *slot = state;
            }
        }
    }

    fn collapse(&mut self) {
        if let SubresourceStates::PerSubresource(states) = &self.states {
            if let Some(first) = states.first().copied() {
                if states.iter().all(|s| *s == first) {
                    self.states = SubresourceStates::Uniform(first);
                }
            }
        }
    }
}
