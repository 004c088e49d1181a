use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};

use crate::components::{Behaviour, PhaseStep, SharedTrajectory};
use crate::identity::{MacroId, SourceId};
use crate::math::DVec3;
use crate::params::ParamBag;

/// Group state that member components read through a weak reference
#[derive(Debug, Clone)]
pub struct GroupShared {
    pub centroid: DVec3, // recomputed from the canonical store at the start of each tick
    pub trajectory: Option<SharedTrajectory>,
}

/// A named set of sources sharing group-level behaviours
#[derive(Debug)]
pub struct MacroGroup {
    id: MacroId,
    name: String,
    members: BTreeSet<SourceId>,
    behaviours: Vec<(Behaviour, ParamBag)>, // group-level behaviours, re-applied to joining members
    shared: Rc<RefCell<GroupShared>>,
}

impl MacroGroup {
    pub fn new(id: MacroId, name: &str, anchor: DVec3) -> Self {
        MacroGroup {
            id,
            name: name.to_string(),
            members: BTreeSet::new(),
            behaviours: Vec::new(),
            shared: Rc::new(RefCell::new(GroupShared {
                centroid: anchor,
                trajectory: None,
            })),
        }
    }

    pub fn id(&self) -> MacroId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &BTreeSet<SourceId> {
        &self.members
    }

    pub fn contains(&self, source: SourceId) -> bool {
        self.members.contains(&source)
    }

    pub fn centroid(&self) -> DVec3 {
        self.shared.borrow().centroid
    }

    pub fn shared(&self) -> Weak<RefCell<GroupShared>> {
        Rc::downgrade(&self.shared)
    }

    pub fn trajectory_phase(&self) -> Option<f64> {
        self.shared.borrow().trajectory.as_ref().map(|t| t.driver.phase())
    }

    pub(crate) fn add_member(&mut self, source: SourceId) {
        self.members.insert(source);
    }

    pub(crate) fn remove_member(&mut self, source: SourceId) -> bool {
        self.members.remove(&source)
    }

    pub fn behaviours(&self) -> &[(Behaviour, ParamBag)] {
        &self.behaviours
    }

    pub(crate) fn behaviour_params(&self, behaviour: Behaviour) -> Option<&ParamBag> {
        self.behaviours.iter().find(|(b, _)| *b == behaviour).map(|(_, bag)| bag)
    }

    pub(crate) fn record_behaviour(&mut self, behaviour: Behaviour, params: ParamBag) {
        match self.behaviours.iter_mut().find(|(b, _)| *b == behaviour) {
            Some(entry) => entry.1 = params,
            None => self.behaviours.push((behaviour, params)),
        }
    }

    pub(crate) fn forget_behaviour(&mut self, behaviour: Behaviour) -> bool {
        let before = self.behaviours.len();
        self.behaviours.retain(|(b, _)| *b != behaviour);
        if behaviour == Behaviour::MacroTrajectory {
            self.clear_trajectory();
        }
        self.behaviours.len() != before
    }

    pub(crate) fn clear_trajectory(&mut self) {
        self.shared.borrow_mut().trajectory = None;
    }

    /// Installs or replaces the shared trajectory, keeping the phase of the one it replaces
    pub(crate) fn set_trajectory(&mut self, mut trajectory: SharedTrajectory) {
        let mut shared = self.shared.borrow_mut();
        if let Some(previous) = shared.trajectory.as_ref() {
            trajectory.driver.inherit(&previous.driver);
            trajectory.last_step = PhaseStep::still(trajectory.driver.phase());
        }
        shared.trajectory = Some(trajectory);
    }

    /// Refreshes the centroid and advances the shared phase. Runs once per tick, before any member
    pub(crate) fn prepare_tick<F>(&mut self, current_time: f64, dt: f64, position_of: F)
    where
        F: Fn(SourceId) -> Option<DVec3>,
    {
        let mut shared = self.shared.borrow_mut();

        let mut sum = DVec3::zero();
        let mut count = 0usize;
        for position in self.members.iter().filter_map(|id| position_of(*id)) {
            sum += position;
            count += 1;
        }
        if count > 0 {
            shared.centroid = sum / count as f64;
        }

        if let Some(trajectory) = shared.trajectory.as_mut() {
            trajectory.last_step = trajectory.driver.advance(current_time, dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{MovementMode, PhaseDriver};
    use crate::config::MovementConfig;
    use crate::shapes::{Shape, ShapeSpec};

    #[test]
    fn centroid_tracks_member_positions() {
        let mut group = MacroGroup::new(MacroId::from(0), "pair", DVec3::zero());
        group.add_member(SourceId::from(1));
        group.add_member(SourceId::from(2));

        group.prepare_tick(0.0, 0.1, |id| {
            let raw: usize = id.into();
            Some(DVec3::new(raw as f64, 2.0, 0.0))
        });
        assert_eq!(DVec3::new(1.5, 2.0, 0.0), group.centroid());
    }

    #[test]
    fn shared_phase_advances_once_per_tick() {
        let mut group = MacroGroup::new(MacroId::from(0), "pair", DVec3::zero());
        let driver = PhaseDriver::new(MovementMode::Fix, 0.5, MovementConfig::default(), 0);
        group.set_trajectory(SharedTrajectory::new(ShapeSpec::new(Shape::Circle, 1.0), driver));

        group.prepare_tick(0.0, 0.1, |_| None);
        assert!((group.trajectory_phase().unwrap() - 0.05).abs() < 1e-12);

        // replacing the trajectory keeps where it was
        let faster = PhaseDriver::new(MovementMode::Fix, 1.0, MovementConfig::default(), 0);
        group.set_trajectory(SharedTrajectory::new(ShapeSpec::new(Shape::Square, 1.0), faster));
        assert!((group.trajectory_phase().unwrap() - 0.05).abs() < 1e-12);

        // never recorded, but the shared trajectory still goes
        assert!(!group.forget_behaviour(Behaviour::MacroTrajectory));
        assert_eq!(None, group.trajectory_phase());
    }

    #[test]
    fn members_and_behaviours() {
        let mut group = MacroGroup::new(MacroId::from(3), "trio", DVec3::new(0.0, 0.0, 1.0));
        group.add_member(SourceId::from(4));
        assert!(group.contains(SourceId::from(4)));
        assert!(group.remove_member(SourceId::from(4)));
        assert!(!group.remove_member(SourceId::from(4)));

        group.record_behaviour(Behaviour::MacroRotation, ParamBag::new().with("speed_z", 1.0));
        group.record_behaviour(Behaviour::MacroRotation, ParamBag::new().with("speed_z", 2.0));
        assert_eq!(1, group.behaviours().len());
        assert_eq!(Some(2.0), group.behaviour_params(Behaviour::MacroRotation).unwrap().scalar("speed_z").unwrap());
    }
}
