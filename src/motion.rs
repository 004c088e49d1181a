use tracing::warn;

use crate::components::{Behaviour, DeltaSource, MotionComponent};
use crate::error::ComponentError;
use crate::identity::{MacroId, SourceId};
use crate::params::ParamBag;
use crate::state::{MotionDelta, MotionState};

/// One attached behaviour, with the parameters it was built from
#[derive(Debug, Clone)]
pub struct AttachedComponent {
    pub behaviour: Behaviour,
    pub params: ParamBag,
    pub component: MotionComponent,
    pub owner: Option<MacroId>, // set when the macro attached it, not the source
}

/// What a source contributed during one tick
#[derive(Debug, Clone, Default)]
pub struct CollectedDeltas {
    pub deltas: Vec<MotionDelta>,
    pub failures: Vec<(&'static str, ComponentError)>,
}

/// A source's motion state plus its components, in attachment order
#[derive(Debug, Clone)]
pub struct SourceMotion {
    id: SourceId,
    pub state: MotionState,
    components: Vec<AttachedComponent>,
}

impl SourceMotion {
    pub fn new(id: SourceId, state: MotionState) -> Self {
        SourceMotion { id, state, components: Vec::new() }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    /// Attaches under the behaviour's key. Re-attaching replaces in place and keeps its slot
    pub fn attach(&mut self, behaviour: Behaviour, params: ParamBag, component: MotionComponent) -> Option<MotionComponent> {
        self.insert(AttachedComponent { behaviour, params, component, owner: None })
    }

    /// Same as `attach`, but marks the component as belonging to `group`
    pub fn attach_for_group(&mut self, group: MacroId, behaviour: Behaviour, params: ParamBag, component: MotionComponent) -> Option<MotionComponent> {
        self.insert(AttachedComponent { behaviour, params, component, owner: Some(group) })
    }

    fn insert(&mut self, attached: AttachedComponent) -> Option<MotionComponent> {
        let behaviour = attached.behaviour;
        match self.components.iter_mut().find(|c| c.behaviour == behaviour) {
            Some(existing) => Some(std::mem::replace(existing, attached).component),
            None => {
                self.components.push(attached);
                None
            },
        }
    }

    pub fn detach(&mut self, behaviour: Behaviour) -> Option<MotionComponent> {
        let idx = self.components.iter().position(|c| c.behaviour == behaviour)?;
        Some(self.components.remove(idx).component)
    }

    /// Detaches only if `group` put the component there
    pub fn detach_for_group(&mut self, group: MacroId, behaviour: Behaviour) -> Option<MotionComponent> {
        let idx = self.components.iter().position(|c| c.behaviour == behaviour && c.owner == Some(group))?;
        Some(self.components.remove(idx).component)
    }

    pub fn get(&self, behaviour: Behaviour) -> Option<&AttachedComponent> {
        self.components.iter().find(|c| c.behaviour == behaviour)
    }

    pub fn behaviours(&self) -> Vec<Behaviour> {
        self.components.iter().map(|c| c.behaviour).collect()
    }

    pub fn has_components(&self) -> bool {
        !self.components.is_empty()
    }

    /// Asks every enabled component for its delta, once each, in attachment order
    ///
    /// A failing component is logged and skipped, the rest of the source still moves.
    pub fn collect_deltas(&mut self, current_time: f64, dt: f64) -> CollectedDeltas {
        let mut collected = CollectedDeltas::default();
        let state = &self.state;

        for attached in self.components.iter_mut() {
            let component = &mut attached.component;
            if !component.is_enabled() {
                continue;
            }

            let tag = component.tag();
            let result = component.calculate_delta(state, current_time, dt).and_then(|delta| match delta {
                Some(d) if !d.is_finite() => Err(ComponentError::NonFinite(tag)),
                other => Ok(other),
            });

            match result {
                Ok(Some(delta)) => {
                    if !delta.is_negligible() {
                        collected.deltas.push(delta);
                    }
                },
                Ok(None) => {},
                Err(err) => {
                    warn!(source = %self.id, component = tag, "component skipped this tick: {}", err);
                    collected.failures.push((tag, err));
                },
            }
        }

        collected
    }
}
