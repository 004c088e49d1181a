//! Hub
//!
//! The composition root. Owns every `SourceMotion` and `MacroGroup`, and once per tick turns the
//! deltas their components propose into new canonical positions:
//!
//!   1. each macro refreshes its centroid and advances its shared trajectory phase
//!   2. per source, in ascending id order: sync the motion state from the store, collect deltas,
//!      sum them weighted, add the sum to the stored position
//!
//! Components never write to the store. The hub is the only writer, and it only ever adds.

use std::collections::HashMap;
use std::fmt::Display;

use tracing::{debug, info, warn};

use crate::collections::SparseSet;
use crate::components::{Behaviour, BuildContext, MotionComponent, PhaseDriver, Scope, SharedTrajectory};
use crate::config::{HubConfig, ScenarioConfig};
use crate::constants::MAX_SOURCE_ID;
use crate::error::{ComponentError, HubError, HubResult};
use crate::group::MacroGroup;
use crate::identity::{IdAllocator, MacroId, SourceId};
use crate::math::{wrap_angles, DVec3, SVec3};
use crate::motion::SourceMotion;
use crate::output::{SinkEntry, SinkFrame};
use crate::params::ParamBag;
use crate::shapes::ShapeSpec;
use crate::state::MotionState;

/// Canonical pose of one source, as the host keeps it
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SourcePose {
    pub position: DVec3,
    pub orientation: DVec3, // yaw, pitch, roll
    pub aperture: f64,
}

impl SourcePose {
    pub fn at(position: DVec3) -> Self {
        SourcePose { position, ..SourcePose::default() }
    }
}

/// Host-owned canonical positions, indexed by source id
#[derive(Debug, Clone, Default)]
pub struct PositionStore {
    poses: SparseSet<SourceId, SourcePose>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: SourceId, pose: SourcePose) -> Option<SourcePose> {
        self.poses.insert_with(id, pose)
    }

    pub fn remove(&mut self, id: SourceId) -> Option<SourcePose> {
        self.poses.remove(id)
    }

    pub fn contains(&self, id: SourceId) -> bool {
        self.poses.contains(id)
    }

    pub fn get(&self, id: SourceId) -> Option<&SourcePose> {
        self.poses.get(id)
    }

    pub fn get_mut(&mut self, id: SourceId) -> Option<&mut SourcePose> {
        self.poses.get_mut(id)
    }

    pub fn position(&self, id: SourceId) -> Option<DVec3> {
        self.poses.get(id).map(|pose| pose.position)
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Flattens every pose for a sink, in ascending id order
    pub fn frame(&self, tick: u64, time: f64) -> SinkFrame {
        let entries = self
            .poses
            .sorted_keys()
            .into_iter()
            .filter_map(|id| {
                self.poses.get(id).map(|pose| SinkEntry {
                    id,
                    position: SVec3::from(pose.position),
                    orientation: SVec3::from(pose.orientation),
                    aperture: pose.aperture as f32,
                })
            })
            .collect();
        SinkFrame { tick, time, entries }
    }
}

/// What a configuration operation acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Source(SourceId),
    Macro(MacroId),
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Source(id) => write!(f, "{}", id),
            Target::Macro(id) => write!(f, "{}", id),
        }
    }
}

/// Summary of one `update`
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub tick: u64,
    pub time: f64,
    pub sources_updated: usize,
    pub deltas_applied: usize,
    pub failures: Vec<(SourceId, &'static str, ComponentError)>,
    pub missing: Vec<SourceId>, // registered, but absent from the store
}

#[derive(Debug)]
pub struct TrajectoryHub {
    config: HubConfig,
    sources: SparseSet<SourceId, SourceMotion>,
    macros: SparseSet<MacroId, MacroGroup>,
    macro_names: HashMap<String, MacroId>,
    membership: HashMap<SourceId, MacroId>,
    source_ids: IdAllocator,
    macro_ids: IdAllocator,
    tick: u64,
}

fn check_scope(behaviour: Behaviour, target: Target) -> HubResult<()> {
    match (behaviour.scope(), target) {
        (Scope::Macro, Target::Source(_)) => Err(HubError::ScopeMismatch { behaviour: behaviour.key(), expected: "a macro" }),
        (Scope::Source, Target::Macro(_)) => Err(HubError::ScopeMismatch { behaviour: behaviour.key(), expected: "a single source" }),
        _ => Ok(()),
    }
}

fn seed_for(raw: usize) -> u64 {
    raw as u64
}

impl Default for TrajectoryHub {
    fn default() -> Self {
        TrajectoryHub {
            config: HubConfig::default(),
            sources: SparseSet::new(),
            macros: SparseSet::new(),
            macro_names: HashMap::new(),
            membership: HashMap::new(),
            source_ids: IdAllocator::new(),
            macro_ids: IdAllocator::new(),
            tick: 0,
        }
    }
}

impl TrajectoryHub {
    pub fn new(config: HubConfig) -> HubResult<Self> {
        config.validate()?;
        Ok(TrajectoryHub { config, ..TrajectoryHub::default() })
    }

    /// Builds a hub and fills the store from a scenario description
    pub fn from_scenario(scenario: &ScenarioConfig, store: &mut PositionStore) -> HubResult<Self> {
        let mut hub = TrajectoryHub::new(scenario.hub.clone())?;

        for source in scenario.sources.iter() {
            let id = SourceId::from(source.id);
            hub.register_source_at(store, id, DVec3::from(source.position))?;
            if let Some(pose) = store.get_mut(id) {
                pose.aperture = source.aperture;
            }
        }

        for group in scenario.macros.iter() {
            let offsets: Vec<DVec3> = group.offsets.iter().map(|o| DVec3::from(*o)).collect();
            hub.create_macro(store, &group.name, DVec3::from(group.anchor), &offsets)?;
        }

        for entry in scenario.behaviours.iter() {
            let target = match (entry.source, entry.macro_name.as_deref()) {
                (Some(source), None) => Target::Source(SourceId::from(source)),
                (None, Some(name)) => Target::Macro(hub.macro_handle(name)?),
                _ => {
                    return Err(HubError::invalid(
                        "behaviours",
                        format!("\"{}\" needs exactly one of `source` or `macro`", entry.behaviour),
                    ))
                },
            };
            hub.attach_component(target, &entry.behaviour, entry.params.clone())?;
        }

        Ok(hub)
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Ticks completed so far
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn source(&self, id: SourceId) -> Option<&SourceMotion> {
        self.sources.get(id)
    }

    pub fn source_ids(&self) -> Vec<SourceId> {
        self.sources.sorted_keys()
    }

    pub fn macro_group(&self, id: MacroId) -> Option<&MacroGroup> {
        self.macros.get(id)
    }

    pub fn macro_of(&self, source: SourceId) -> Option<MacroId> {
        self.membership.get(&source).copied()
    }

    pub fn macro_handle(&self, name: &str) -> HubResult<MacroId> {
        self.macro_names.get(name).copied().ok_or_else(|| HubError::UnknownMacroName(name.to_string()))
    }

    // -- sources

    /// Registers a source under a fresh id and places it in the store
    pub fn register_source(&mut self, store: &mut PositionStore, position: DVec3) -> SourceId {
        let id: SourceId = self.source_ids.allocate();
        self.insert_source(store, id, position);
        id
    }

    /// Registers a source under an id chosen by the host
    pub fn register_source_at(&mut self, store: &mut PositionStore, id: SourceId, position: DVec3) -> HubResult<()> {
        let raw: usize = id.into();
        if raw > MAX_SOURCE_ID {
            return Err(HubError::invalid("id", format!("{} is above the limit of {}", raw, MAX_SOURCE_ID)));
        }
        if self.sources.contains(id) {
            return Err(HubError::DuplicateSource(id));
        }
        self.source_ids.reserve(raw);
        self.insert_source(store, id, position);
        Ok(())
    }

    fn insert_source(&mut self, store: &mut PositionStore, id: SourceId, position: DVec3) {
        self.sources.insert_with(id, SourceMotion::new(id, MotionState::new(position)));
        store.insert(id, SourcePose::at(position));
        info!(source = %id, "registered at {:?}", position);
    }

    pub fn unregister_source(&mut self, store: &mut PositionStore, id: SourceId) -> HubResult<()> {
        self.sources.remove(id).ok_or(HubError::UnknownSource(id))?;
        if let Some(group) = self.membership.remove(&id).and_then(|m| self.macros.get_mut(m)) {
            group.remove_member(id);
        }
        store.remove(id);
        info!(source = %id, "unregistered");
        Ok(())
    }

    // -- macros

    /// Creates a macro with one fresh source per offset, each placed at `anchor + offset`
    pub fn create_macro(&mut self, store: &mut PositionStore, name: &str, anchor: DVec3, offsets: &[DVec3]) -> HubResult<MacroId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(HubError::invalid("name", "a macro needs a name"));
        }
        if self.macro_names.contains_key(name) {
            return Err(HubError::DuplicateMacroName(name.to_string()));
        }
        if !anchor.is_finite() || offsets.iter().any(|o| !o.is_finite()) {
            return Err(HubError::invalid("offsets", "must be finite"));
        }

        let id: MacroId = self.macro_ids.allocate();
        let mut group = MacroGroup::new(id, name, anchor);
        for offset in offsets.iter() {
            let source = self.register_source(store, anchor + *offset);
            group.add_member(source);
            self.membership.insert(source, id);
        }

        info!(group = %id, "created \"{}\" with {} sources", name, offsets.len());
        self.macros.insert_with(id, group);
        self.macro_names.insert(name.to_string(), id);
        Ok(id)
    }

    /// Deletes a macro. Its members stay registered and keep their individual components,
    /// only what the macro attached goes away. Returns the former members
    pub fn delete_macro(&mut self, id: MacroId) -> HubResult<Vec<SourceId>> {
        let group = self.macros.remove(id).ok_or(HubError::UnknownMacro(id))?;
        self.macro_names.remove(group.name());

        let members: Vec<SourceId> = group.members().iter().copied().collect();
        for member in members.iter() {
            self.membership.remove(member);
            if let Some(motion) = self.sources.get_mut(*member) {
                for (behaviour, _) in group.behaviours() {
                    motion.detach_for_group(id, *behaviour);
                }
            }
        }

        info!(group = %id, "deleted \"{}\", released {} sources", group.name(), members.len());
        Ok(members)
    }

    /// Adds an existing source to a macro. The macro's behaviours are attached to it straight away
    pub fn add_to_macro(&mut self, source: SourceId, id: MacroId) -> HubResult<()> {
        if !self.sources.contains(source) {
            return Err(HubError::UnknownSource(source));
        }
        match self.membership.get(&source) {
            Some(owner) if *owner == id => return Ok(()),
            Some(owner) => return Err(HubError::SourceAlreadyGrouped { source_id: source, owner: *owner }),
            None => {},
        }

        let group = self.macros.get(id).ok_or(HubError::UnknownMacro(id))?;
        let ctx = BuildContext { config: &self.config, seed: seed_for(source.into()), group: Some(group.shared()) };
        let motion = self.sources.get(source).ok_or(HubError::UnknownSource(source))?;

        let mut built = Vec::new();
        for (behaviour, params) in group.behaviours() {
            if motion.get(*behaviour).map_or(false, |c| c.owner.is_none()) {
                continue
            }
            built.push((*behaviour, params.clone(), MotionComponent::build(*behaviour, params, &ctx)?));
        }

        if let Some(group) = self.macros.get_mut(id) {
            group.add_member(source);
        }
        if let Some(motion) = self.sources.get_mut(source) {
            for (behaviour, params, component) in built {
                motion.attach_for_group(id, behaviour, params, component);
            }
        }
        self.membership.insert(source, id);
        info!(source = %source, group = %id, "joined macro");
        Ok(())
    }

    /// Takes a source out of a macro, detaching what the macro attached to it
    pub fn remove_from_macro(&mut self, source: SourceId, id: MacroId) -> HubResult<()> {
        let group = self.macros.get_mut(id).ok_or(HubError::UnknownMacro(id))?;
        if !group.remove_member(source) {
            return Err(HubError::NotAMember { source_id: source, group: id });
        }
        self.membership.remove(&source);

        if let Some(motion) = self.sources.get_mut(source) {
            for (behaviour, _) in group.behaviours() {
                motion.detach_for_group(id, *behaviour);
            }
        }
        info!(source = %source, group = %id, "left macro");
        Ok(())
    }

    // -- components

    /// Attaches `behaviour` built from `params`, replacing any earlier attachment of the same
    /// behaviour and starting it from scratch
    pub fn attach_component(&mut self, target: Target, behaviour: &str, params: ParamBag) -> HubResult<()> {
        let behaviour: Behaviour = behaviour.parse()?;
        check_scope(behaviour, target)?;
        match target {
            Target::Source(id) => self.attach_to_source(id, behaviour, params, false)?,
            Target::Macro(id) => self.attach_to_macro(id, behaviour, params, false)?,
        }
        info!(on = %target, behaviour = behaviour.key(), "attached");
        Ok(())
    }

    /// Changes parameters of an attached behaviour. Keys missing from `params` keep their
    /// current values and phase or interpolation progress carries over
    pub fn configure_component(&mut self, target: Target, behaviour: &str, params: ParamBag) -> HubResult<()> {
        let behaviour: Behaviour = behaviour.parse()?;
        check_scope(behaviour, target)?;
        let not_attached = || HubError::NotAttached { behaviour: behaviour.key(), target: target.to_string() };

        match target {
            Target::Source(id) => {
                let motion = self.sources.get(id).ok_or(HubError::UnknownSource(id))?;
                let current = motion.get(behaviour).filter(|c| c.owner.is_none()).ok_or_else(not_attached)?;
                let merged = current.params.merged(&params);
                self.attach_to_source(id, behaviour, merged, true)?;
            },
            Target::Macro(id) => {
                let group = self.macros.get(id).ok_or(HubError::UnknownMacro(id))?;
                let merged = group.behaviour_params(behaviour).ok_or_else(not_attached)?.merged(&params);
                self.attach_to_macro(id, behaviour, merged, true)?;
            },
        }
        debug!(on = %target, behaviour = behaviour.key(), "reconfigured");
        Ok(())
    }

    pub fn set_component_enabled(&mut self, target: Target, behaviour: &str, enabled: bool) -> HubResult<()> {
        self.configure_component(target, behaviour, ParamBag::new().with("enabled", enabled))
    }

    pub fn detach_component(&mut self, target: Target, behaviour: &str) -> HubResult<()> {
        let behaviour: Behaviour = behaviour.parse()?;
        check_scope(behaviour, target)?;
        let not_attached = || HubError::NotAttached { behaviour: behaviour.key(), target: target.to_string() };

        match target {
            Target::Source(id) => {
                let motion = self.sources.get_mut(id).ok_or(HubError::UnknownSource(id))?;
                if motion.get(behaviour).map_or(true, |c| c.owner.is_some()) {
                    return Err(not_attached());
                }
                motion.detach(behaviour);
                self.restore_group_component(id, behaviour)?;
            },
            Target::Macro(id) => {
                let group = self.macros.get_mut(id).ok_or(HubError::UnknownMacro(id))?;
                if !group.forget_behaviour(behaviour) {
                    return Err(not_attached());
                }
                for member in group.members().iter() {
                    if let Some(motion) = self.sources.get_mut(*member) {
                        motion.detach_for_group(id, behaviour);
                    }
                }
            },
        }

        info!(on = %target, behaviour = behaviour.key(), "detached");
        Ok(())
    }

    /// Hands a member the group's version of `behaviour` once its own attachment is gone
    fn restore_group_component(&mut self, source: SourceId, behaviour: Behaviour) -> HubResult<()> {
        let group = match self.membership.get(&source).and_then(|m| self.macros.get(*m)) {
            Some(group) => group,
            None => return Ok(()),
        };
        let params = match group.behaviour_params(behaviour) {
            Some(params) => params.clone(),
            None => return Ok(()),
        };
        let owner = group.id();
        let ctx = BuildContext { config: &self.config, seed: seed_for(source.into()), group: Some(group.shared()) };
        let component = MotionComponent::build(behaviour, &params, &ctx)?;

        if let Some(motion) = self.sources.get_mut(source) {
            motion.attach_for_group(owner, behaviour, params, component);
        }
        debug!(source = %source, group = %owner, behaviour = behaviour.key(), "group attachment restored");
        Ok(())
    }

    fn attach_to_source(&mut self, id: SourceId, behaviour: Behaviour, params: ParamBag, keep_progress: bool) -> HubResult<()> {
        let ctx = BuildContext { config: &self.config, seed: seed_for(id.into()), group: None };
        let mut component = MotionComponent::build(behaviour, &params, &ctx)?;

        let motion = self.sources.get_mut(id).ok_or(HubError::UnknownSource(id))?;
        if keep_progress {
            if let Some(current) = motion.get(behaviour) {
                component.inherit_progress(&current.component);
            }
        }
        motion.attach(behaviour, params, component);
        Ok(())
    }

    fn attach_to_macro(&mut self, id: MacroId, behaviour: Behaviour, params: ParamBag, keep_progress: bool) -> HubResult<()> {
        let group = self.macros.get(id).ok_or(HubError::UnknownMacro(id))?;
        let shared = group.shared();

        // validates the bag even when there are no members yet
        let probe = BuildContext { config: &self.config, seed: seed_for(id.into()), group: Some(shared.clone()) };
        MotionComponent::build(behaviour, &params, &probe)?;

        let trajectory = match behaviour {
            Behaviour::MacroTrajectory => Some(SharedTrajectory::new(
                ShapeSpec::from_params(&params)?,
                PhaseDriver::from_params(&params, &self.config.movement, seed_for(id.into()))?,
            )),
            _ => None,
        };

        let mut built = Vec::new();
        for member in group.members().iter() {
            let current = self.sources.get(*member).and_then(|m| m.get(behaviour));
            if current.map_or(false, |c| c.owner.is_none()) {
                // the member's own attachment wins over the group's
                continue
            }
            let ctx = BuildContext { config: &self.config, seed: seed_for((*member).into()), group: Some(shared.clone()) };
            let mut component = MotionComponent::build(behaviour, &params, &ctx)?;
            if let (true, Some(current)) = (keep_progress, current) {
                component.inherit_progress(&current.component);
            }
            built.push((*member, component));
        }

        let group = self.macros.get_mut(id).ok_or(HubError::UnknownMacro(id))?;
        if let Some(trajectory) = trajectory {
            if !keep_progress {
                group.clear_trajectory();
            }
            group.set_trajectory(trajectory);
        }
        group.record_behaviour(behaviour, params.clone());

        for (member, component) in built {
            if let Some(motion) = self.sources.get_mut(member) {
                motion.attach_for_group(id, behaviour, params.clone(), component);
            }
        }
        Ok(())
    }

    // -- tick

    /// Advances every source by one tick of `dt` seconds
    ///
    /// A component that fails is skipped for this tick and reported, nothing else is affected.
    /// An invalid timestep is rejected before any state changes.
    pub fn update(&mut self, store: &mut PositionStore, current_time: f64, dt: f64) -> HubResult<TickReport> {
        if !(dt > 0.0 && dt.is_finite() && current_time.is_finite()) {
            return Err(HubError::InvalidTimestep { dt, time: current_time });
        }

        for group in self.macros.iter_mut() {
            group.prepare_tick(current_time, dt, |id| store.position(id));
        }

        let mut report = TickReport { tick: self.tick + 1, time: current_time, ..TickReport::default() };

        for id in self.sources.sorted_keys() {
            let motion = match self.sources.get_mut(id) {
                Some(motion) => motion,
                None => continue,
            };
            let pose = match store.get_mut(id) {
                Some(pose) => pose,
                None => {
                    warn!(source = %id, "not in the position store, skipped");
                    report.missing.push(id);
                    continue
                },
            };

            motion.state.position = pose.position;
            motion.state.orientation = pose.orientation;
            motion.state.aperture = pose.aperture;

            let collected = motion.collect_deltas(current_time, dt);

            let mut position_sum = DVec3::zero();
            let mut orientation_sum = DVec3::zero();
            for delta in collected.deltas.iter() {
                position_sum += delta.weighted_position();
                orientation_sum += delta.weighted_orientation();
            }

            pose.position += position_sum;
            if orientation_sum != DVec3::zero() {
                pose.orientation = wrap_angles(pose.orientation + orientation_sum);
            }

            motion.state.position = pose.position;
            motion.state.orientation = pose.orientation;
            motion.state.last_update_time = current_time;

            report.sources_updated += 1;
            report.deltas_applied += collected.deltas.len();
            report.failures.extend(collected.failures.into_iter().map(|(tag, err)| (id, tag, err)));
        }

        self.tick += 1;
        debug!(
            tick = report.tick,
            sources = report.sources_updated,
            deltas = report.deltas_applied,
            failures = report.failures.len(),
            "tick composed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{RotationPhase, DeltaSource};
    use std::f64::consts::FRAC_PI_2;

    const DT: f64 = 1.0 / 60.0;

    fn close(a: DVec3, b: DVec3, eps: f64) -> bool {
        a.length_to(&b) < eps
    }

    fn hub_with_source(position: DVec3) -> (TrajectoryHub, PositionStore, SourceId) {
        let mut hub = TrajectoryHub::default();
        let mut store = PositionStore::new();
        let id = hub.register_source(&mut store, position);
        (hub, store, id)
    }

    fn run(hub: &mut TrajectoryHub, store: &mut PositionStore, ticks: usize, dt: f64) {
        for i in 0..ticks {
            hub.update(store, i as f64 * dt, dt).unwrap();
        }
    }

    #[test]
    fn quarter_turn_about_y() {
        let (mut hub, mut store, id) = hub_with_source(DVec3::new(3.0, 0.0, 0.0));
        hub.attach_component(Target::Source(id), "individual_rotation", ParamBag::new().with("speed_y", vec![FRAC_PI_2]))
            .unwrap();

        run(&mut hub, &mut store, 60, DT);
        let position = store.position(id).unwrap();
        assert!(close(position, DVec3::new(0.0, 0.0, -3.0), 1e-6), "ended at {:?}", position);
        // a turn about y is a roll
        assert!((store.get(id).unwrap().orientation.z - FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn concentration_one_tick() {
        let (mut hub, mut store, id) = hub_with_source(DVec3::new(10.0, 0.0, 0.0));
        hub.attach_component(Target::Source(id), "concentration", ParamBag::new().with("factor", 0.5)).unwrap();

        let report = hub.update(&mut store, 0.0, DT).unwrap();
        assert_eq!(1, report.deltas_applied);
        assert!((store.position(id).unwrap().x - (10.0 - 10.0 * 0.5 * DT)).abs() < 1e-12);
    }

    #[test]
    fn deltas_add_up() {
        let start = DVec3::new(2.0, 1.0, 0.5);
        let rotation = ParamBag::new().with("speed_z", 1.0).with("center", DVec3::new(0.0, 0.5, 0.0));
        let concentration = ParamBag::new().with("factor", 0.5).with("target", DVec3::new(1.0, 1.0, 1.0));

        let mut moved = Vec::new();
        for attach in [(true, true), (true, false), (false, true)].iter() {
            let (mut hub, mut store, id) = hub_with_source(start);
            if attach.0 {
                hub.attach_component(Target::Source(id), "individual_rotation", rotation.clone()).unwrap();
            }
            if attach.1 {
                hub.attach_component(Target::Source(id), "concentration", concentration.clone()).unwrap();
            }
            hub.update(&mut store, 0.0, 0.1).unwrap();
            moved.push(store.position(id).unwrap() - start);
        }

        assert!(close(moved[0], moved[1] + moved[2], 1e-12));
        assert!(moved[1].magnitude() > 0.0 && moved[2].magnitude() > 0.0);
    }

    #[test]
    fn macro_members_share_trajectory_deltas() {
        let mut hub = TrajectoryHub::default();
        let mut store = PositionStore::new();
        let offsets = [DVec3::new(1.0, 0.0, 0.0), DVec3::new(-1.0, 0.0, 0.0)];
        let group = hub.create_macro(&mut store, "pair", DVec3::zero(), &offsets).unwrap();
        let members: Vec<SourceId> = hub.macro_group(group).unwrap().members().iter().copied().collect();
        assert_eq!(DVec3::new(-1.0, 0.0, 0.0), store.position(members[1]).unwrap());

        let bag = ParamBag::new().with("shape", "circle").with("speed", 0.25).with("radius", 2.0);
        hub.attach_component(Target::Macro(group), "macro_trajectory", bag).unwrap();

        for i in 0..30 {
            let before: Vec<DVec3> = members.iter().map(|m| store.position(*m).unwrap()).collect();
            hub.update(&mut store, i as f64 * 0.1, 0.1).unwrap();
            let d0 = store.position(members[0]).unwrap() - before[0];
            let d1 = store.position(members[1]).unwrap() - before[1];
            assert!(close(d0, d1, 1e-12));
            assert!(d0.magnitude() > 0.0);
        }
        assert!((hub.macro_group(group).unwrap().trajectory_phase().unwrap() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn macro_rotation_keeps_the_formation() {
        let mut hub = TrajectoryHub::default();
        let mut store = PositionStore::new();
        let offsets = [DVec3::new(1.0, 0.0, 0.0), DVec3::new(-1.0, 0.0, 0.0), DVec3::new(0.0, 2.0, 0.0)];
        let group = hub.create_macro(&mut store, "trio", DVec3::new(5.0, 5.0, 0.0), &offsets).unwrap();
        hub.attach_component(Target::Macro(group), "macro_rotation", ParamBag::new().with("speed_z", 1.0)).unwrap();

        let a = SourceId::from(0);
        let b = SourceId::from(1);
        run(&mut hub, &mut store, 90, DT);

        let gap = store.position(a).unwrap().length_to(&store.position(b).unwrap());
        assert!((gap - 2.0).abs() < 1e-4);
        assert!(store.position(a).unwrap().length_to(&DVec3::new(5.0, 5.0, 0.0)) > 0.5);
    }

    #[test]
    fn failing_source_does_not_stop_the_others() {
        let mut hub = TrajectoryHub::default();
        let mut store = PositionStore::new();
        let broken = hub.register_source(&mut store, DVec3::new(1.0, 0.0, 0.0));
        let fine = hub.register_source(&mut store, DVec3::new(1.0, 0.0, 0.0));
        for id in [broken, fine].iter() {
            hub.attach_component(Target::Source(*id), "individual_rotation", ParamBag::new().with("speed_z", 1.0)).unwrap();
        }
        store.get_mut(broken).unwrap().position = DVec3::new(f64::NAN, 0.0, 0.0);

        let report = hub.update(&mut store, 0.0, DT).unwrap();
        assert_eq!(1, report.failures.len());
        assert_eq!(broken, report.failures[0].0);
        assert_eq!(ComponentError::NonFinite("individual_rotation"), report.failures[0].2);
        assert_eq!(2, report.sources_updated);
        assert!(store.position(fine).unwrap().y > 0.0);
    }

    #[test]
    fn invalid_timestep_changes_nothing() {
        let (mut hub, mut store, id) = hub_with_source(DVec3::new(10.0, 0.0, 0.0));
        hub.attach_component(Target::Source(id), "concentration", ParamBag::new()).unwrap();

        for (time, dt) in [(0.0, 0.0), (0.0, -DT), (f64::NAN, DT), (0.0, f64::INFINITY)].iter() {
            assert!(matches!(hub.update(&mut store, *time, *dt), Err(HubError::InvalidTimestep { .. })));
        }
        assert_eq!(DVec3::new(10.0, 0.0, 0.0), store.position(id).unwrap());
        assert_eq!(0, hub.tick_count());
    }

    #[test]
    fn missing_store_entries_are_reported() {
        let (mut hub, mut store, id) = hub_with_source(DVec3::zero());
        store.remove(id);
        let report = hub.update(&mut store, 0.0, DT).unwrap();
        assert_eq!(vec![id], report.missing);
        assert_eq!(0, report.sources_updated);
    }

    #[test]
    fn scope_is_checked() {
        let mut hub = TrajectoryHub::default();
        let mut store = PositionStore::new();
        let source = hub.register_source(&mut store, DVec3::zero());
        let group = hub.create_macro(&mut store, "solo", DVec3::zero(), &[DVec3::new(1.0, 0.0, 0.0)]).unwrap();

        assert!(matches!(
            hub.attach_component(Target::Source(source), "macro_rotation", ParamBag::new()),
            Err(HubError::ScopeMismatch { .. })
        ));
        assert!(matches!(
            hub.attach_component(Target::Macro(group), "individual_trajectory", ParamBag::new()),
            Err(HubError::ScopeMismatch { .. })
        ));
        assert!(matches!(
            hub.attach_component(Target::Source(source), "wobble", ParamBag::new()),
            Err(HubError::UnknownBehaviour(_))
        ));
        assert!(matches!(
            hub.attach_component(Target::Source(SourceId::from(99)), "concentration", ParamBag::new()),
            Err(HubError::UnknownSource(_))
        ));
    }

    #[test]
    fn configuring_keeps_trajectory_phase() {
        let (mut hub, mut store, id) = hub_with_source(DVec3::zero());
        let target = Target::Source(id);
        hub.attach_component(target, "individual_trajectory", ParamBag::new().with("shape", "rose").with("speed", 0.5))
            .unwrap();
        run(&mut hub, &mut store, 10, 0.1);

        hub.configure_component(target, "individual_trajectory", ParamBag::new().with("speed", 1.0)).unwrap();
        let attached = hub.source(id).unwrap().get(Behaviour::IndividualTrajectory).unwrap();
        assert_eq!(Some("rose"), attached.params.text("shape").unwrap());
        match &attached.component {
            MotionComponent::IndividualTrajectory(t) => {
                assert!((t.driver.phase() - 0.5).abs() < 1e-9);
                assert_eq!(1.0, t.driver.speed);
            },
            other => panic!("unexpected {:?}", other),
        }

        assert!(matches!(
            hub.configure_component(target, "concentration", ParamBag::new()),
            Err(HubError::NotAttached { .. })
        ));
    }

    #[test]
    fn disabling_stops_contribution() {
        let (mut hub, mut store, id) = hub_with_source(DVec3::new(1.0, 0.0, 0.0));
        hub.attach_component(Target::Source(id), "manual_individual_rotation", ParamBag::new().with("target_yaw", 1.0))
            .unwrap();
        hub.set_component_enabled(Target::Source(id), "manual_individual_rotation", false).unwrap();

        let report = hub.update(&mut store, 0.0, DT).unwrap();
        assert_eq!(0, report.deltas_applied);
        assert_eq!(DVec3::new(1.0, 0.0, 0.0), store.position(id).unwrap());

        hub.set_component_enabled(Target::Source(id), "manual_individual_rotation", true).unwrap();
        match &hub.source(id).unwrap().get(Behaviour::ManualIndividualRotation).unwrap().component {
            MotionComponent::InterpolatedRotation(rot) => assert_eq!(RotationPhase::Converging, rot.phase()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn membership_carries_group_behaviours() {
        let mut hub = TrajectoryHub::default();
        let mut store = PositionStore::new();
        let group = hub.create_macro(&mut store, "ring", DVec3::zero(), &[DVec3::new(1.0, 0.0, 0.0)]).unwrap();
        let other = hub.create_macro(&mut store, "other", DVec3::zero(), &[]).unwrap();
        hub.attach_component(Target::Macro(group), "macro_rotation", ParamBag::new().with("speed_z", 0.5)).unwrap();

        let late = hub.register_source(&mut store, DVec3::new(0.0, 2.0, 0.0));
        hub.attach_component(Target::Source(late), "individual_rotation", ParamBag::new().with("speed_x", 0.5)).unwrap();
        hub.add_to_macro(late, group).unwrap();
        assert_eq!(Some(group), hub.macro_of(late));
        assert_eq!(
            vec![Behaviour::IndividualRotation, Behaviour::MacroRotation],
            hub.source(late).unwrap().behaviours()
        );
        assert!(matches!(hub.add_to_macro(late, other), Err(HubError::SourceAlreadyGrouped { .. })));

        hub.remove_from_macro(late, group).unwrap();
        assert_eq!(vec![Behaviour::IndividualRotation], hub.source(late).unwrap().behaviours());
        assert!(matches!(hub.remove_from_macro(late, group), Err(HubError::NotAMember { .. })));
    }

    #[test]
    fn deleting_a_macro_releases_its_members() {
        let mut hub = TrajectoryHub::default();
        let mut store = PositionStore::new();
        let offsets = [DVec3::new(1.0, 0.0, 0.0), DVec3::new(-1.0, 0.0, 0.0)];
        let group = hub.create_macro(&mut store, "pair", DVec3::zero(), &offsets).unwrap();
        let first = SourceId::from(0);

        hub.attach_component(Target::Macro(group), "concentration", ParamBag::new()).unwrap();
        hub.attach_component(Target::Macro(group), "macro_trajectory", ParamBag::new().with("shape", "heart")).unwrap();
        hub.attach_component(Target::Source(first), "individual_rotation", ParamBag::new().with("speed_z", 1.0)).unwrap();
        assert_eq!(3, hub.source(first).unwrap().behaviours().len());
        assert!(matches!(
            hub.create_macro(&mut store, "pair", DVec3::zero(), &[]),
            Err(HubError::DuplicateMacroName(_))
        ));

        let released = hub.delete_macro(group).unwrap();
        assert_eq!(2, released.len());
        assert_eq!(vec![Behaviour::IndividualRotation], hub.source(first).unwrap().behaviours());
        assert_eq!(None, hub.macro_of(first));
        assert!(matches!(hub.macro_handle("pair"), Err(HubError::UnknownMacroName(_))));
        assert!(matches!(hub.delete_macro(group), Err(HubError::UnknownMacro(_))));

        // the handle is never reused, the name is
        let again = hub.create_macro(&mut store, "pair", DVec3::zero(), &[]).unwrap();
        assert_ne!(group, again);
        assert_eq!(again, hub.macro_handle("pair").unwrap());
        hub.update(&mut store, 0.0, DT).unwrap();
    }

    #[test]
    fn macro_detach_leaves_individual_concentration() {
        let mut hub = TrajectoryHub::default();
        let mut store = PositionStore::new();
        let group = hub.create_macro(&mut store, "pair", DVec3::zero(), &[DVec3::new(2.0, 0.0, 0.0), DVec3::new(-2.0, 0.0, 0.0)]).unwrap();
        let own = SourceId::from(1);
        hub.attach_component(Target::Source(own), "concentration", ParamBag::new().with("factor", 0.9)).unwrap();
        hub.attach_component(Target::Macro(group), "concentration", ParamBag::new().with("factor", 0.1)).unwrap();

        let params = &hub.source(own).unwrap().get(Behaviour::Concentration).unwrap().params;
        assert_eq!(Some(0.9), params.scalar("factor").unwrap());

        hub.detach_component(Target::Macro(group), "concentration").unwrap();
        assert!(hub.source(own).unwrap().get(Behaviour::Concentration).is_some());
        assert!(hub.source(SourceId::from(0)).unwrap().get(Behaviour::Concentration).is_none());
        assert!(matches!(
            hub.detach_component(Target::Macro(group), "concentration"),
            Err(HubError::NotAttached { .. })
        ));
    }

    #[test]
    fn group_concentration_returns_after_own_detach() {
        let mut hub = TrajectoryHub::default();
        let mut store = PositionStore::new();
        let group = hub.create_macro(&mut store, "pair", DVec3::zero(), &[DVec3::new(2.0, 0.0, 0.0), DVec3::new(-2.0, 0.0, 0.0)]).unwrap();
        let own = SourceId::from(1);
        hub.attach_component(Target::Source(own), "concentration", ParamBag::new().with("factor", 0.9)).unwrap();
        hub.attach_component(Target::Macro(group), "concentration", ParamBag::new().with("factor", 0.1)).unwrap();

        hub.detach_component(Target::Source(own), "concentration").unwrap();
        let attached = hub.source(own).unwrap().get(Behaviour::Concentration).unwrap();
        assert_eq!(Some(group), attached.owner);
        assert_eq!(Some(0.1), attached.params.scalar("factor").unwrap());

        // now the group's, so the member can't detach it on its own
        assert!(matches!(
            hub.detach_component(Target::Source(own), "concentration"),
            Err(HubError::NotAttached { .. })
        ));

        hub.update(&mut store, 0.0, 0.1).unwrap();
        let x = store.position(own).unwrap().x;
        assert!(x > -2.0 && x < 0.0);
    }

    #[test]
    fn oversized_source_ids_are_rejected() {
        let (mut hub, mut store, _) = hub_with_source(DVec3::zero());
        let huge = SourceId::from(MAX_SOURCE_ID + 1);
        assert!(matches!(
            hub.register_source_at(&mut store, huge, DVec3::zero()),
            Err(HubError::InvalidParameter { .. })
        ));
        assert!(matches!(
            hub.register_source_at(&mut store, SourceId::from(usize::MAX), DVec3::zero()),
            Err(HubError::InvalidParameter { .. })
        ));
        assert!(!store.contains(huge));
        assert_eq!(SourceId::from(1), hub.register_source(&mut store, DVec3::zero()));

        let mut scenario = ScenarioConfig::default();
        scenario.sources.push(crate::config::SourceConfig { id: usize::MAX / 2, position: [0.0; 3], aperture: 0.0 });
        assert!(matches!(
            TrajectoryHub::from_scenario(&scenario, &mut PositionStore::new()),
            Err(HubError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn unregistering_cleans_up() {
        let mut hub = TrajectoryHub::default();
        let mut store = PositionStore::new();
        let group = hub.create_macro(&mut store, "pair", DVec3::zero(), &[DVec3::new(1.0, 0.0, 0.0)]).unwrap();
        let member = SourceId::from(0);

        hub.unregister_source(&mut store, member).unwrap();
        assert!(!store.contains(member));
        assert!(hub.macro_group(group).unwrap().members().is_empty());
        assert!(matches!(hub.unregister_source(&mut store, member), Err(HubError::UnknownSource(_))));

        hub.register_source_at(&mut store, SourceId::from(7), DVec3::zero()).unwrap();
        assert!(matches!(
            hub.register_source_at(&mut store, SourceId::from(7), DVec3::zero()),
            Err(HubError::DuplicateSource(_))
        ));
        assert_eq!(SourceId::from(8), hub.register_source(&mut store, DVec3::zero()));
    }

    #[test]
    fn scenario_builds_a_running_hub() {
        let text = r#"
            [[sources]]
            id = 0
            position = [3.0, 0.0, 0.0]
            aperture = 0.5

            [[macros]]
            name = "pair"
            anchor = [0.0, 0.0, 1.0]
            offsets = [[1.0, 0.0, 0.0], [-1.0, 0.0, 0.0]]

            [[behaviours]]
            source = 0
            behaviour = "individual_rotation"
            params = { speed_y = [1.5707963267948966] }

            [[behaviours]]
            macro = "pair"
            behaviour = "macro_trajectory"
            params = { shape = "lissajous", freq_a = 3, freq_b = 2, speed = 0.25 }
        "#;
        let scenario: ScenarioConfig = toml::from_str(text).unwrap();
        let mut store = PositionStore::new();
        let mut hub = TrajectoryHub::from_scenario(&scenario, &mut store).unwrap();

        assert_eq!(3, hub.source_ids().len());
        assert_eq!(0.5, store.get(SourceId::from(0)).unwrap().aperture);
        run(&mut hub, &mut store, 60, DT);
        assert!(close(store.position(SourceId::from(0)).unwrap(), DVec3::new(0.0, 0.0, -3.0), 1e-6));

        let frame = store.frame(hub.tick_count(), 1.0);
        assert_eq!(60, frame.tick);
        assert_eq!(3, frame.entries.len());
        assert_eq!(SourceId::from(2), frame.entries[2].id);
    }

    #[test]
    fn scenario_behaviour_needs_one_target() {
        let mut scenario = ScenarioConfig::default();
        scenario.behaviours.push(crate::config::BehaviourConfig {
            source: None,
            macro_name: None,
            behaviour: "concentration".to_string(),
            params: ParamBag::new(),
        });
        let mut store = PositionStore::new();
        assert!(matches!(
            TrajectoryHub::from_scenario(&scenario, &mut store),
            Err(HubError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn macro_concentration_pulls_toward_the_centroid() {
        let mut hub = TrajectoryHub::default();
        let mut store = PositionStore::new();
        let group = hub.create_macro(&mut store, "spread", DVec3::zero(), &[DVec3::new(4.0, 0.0, 0.0), DVec3::new(-4.0, 0.0, 0.0)]).unwrap();
        hub.attach_component(Target::Macro(group), "concentration", ParamBag::new().with("factor", 1.0)).unwrap();

        run(&mut hub, &mut store, 30, 0.1);
        let a = store.position(SourceId::from(0)).unwrap();
        let b = store.position(SourceId::from(1)).unwrap();
        assert!(a.x < 4.0 && a.x > 0.0);
        assert!((a.x + b.x).abs() < 1e-9);
        assert!(close(hub.macro_group(group).unwrap().centroid(), DVec3::zero(), 1e-9));

        // the component only ever reads the centroid
        let component = &hub.source(SourceId::from(0)).unwrap().get(Behaviour::Concentration).unwrap().component;
        assert!(component.is_enabled());
    }
}
