//! Data-oriented component store: entities plus one column per component.
//!
//! Spec §4.3 calls for an archetype-style store, but every monitor entity in
//! this engine carries the same component set (`MonitorState` always,
//! `PulseConfig` always, `InterventionConfig` and `CodeConfig` optionally
//! present-or-absent but never partially shaped) — so the general archetype
//! table degenerates to a single table indexed by entity slot, which is what
//! this implements. Grounded on the teacher's `InstanceManager`
//! (`instance_manager.rs`): a generation-checked slot table behind a
//! `RwLock`-free single-owner API, since the redesign in spec §9 confines
//! all mutation to the scheduler thread.

use std::collections::HashMap;

use crate::entity::Entity;
use crate::spec::{CodeConfig, InterventionConfig, PulseConfig};
use crate::state::MonitorState;

#[derive(Debug)]
struct Slot {
    generation: u32,
    occupied: bool,
    state: MonitorState,
    pulse: PulseConfig,
    intervention: Option<InterventionConfig>,
    codes: CodeConfig,
}

/// Owns every monitor's components, indexed by `Entity`.
///
/// Monitors are never removed in practice (spec §3: population is fixed at
/// load time for the engine's lifetime), but `despawn` and generation
/// bumping are kept so a stale `Entity` is reliably rejected rather than
/// silently aliasing a reused slot.
#[derive(Debug, Default)]
pub struct ComponentStore {
    slots: Vec<Slot>,
    by_name: HashMap<String, Entity>,
}

impl ComponentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(
        &mut self,
        state: MonitorState,
        pulse: PulseConfig,
        intervention: Option<InterventionConfig>,
        codes: CodeConfig,
    ) -> Entity {
        let name = state.name.clone();
        let index = self.slots.len() as u32;
        let entity = Entity { index, generation: 0 };
        self.slots.push(Slot { generation: 0, occupied: true, state, pulse, intervention, codes });
        self.by_name.insert(name, entity);
        entity
    }

    pub fn despawn(&mut self, entity: Entity) {
        if let Some(slot) = self.slots.get_mut(entity.index as usize) {
            if slot.generation == entity.generation && slot.occupied {
                slot.occupied = false;
                slot.generation += 1;
                self.by_name.retain(|_, e| *e != entity);
            }
        }
    }

    pub fn alive(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.index as usize)
            .is_some_and(|s| s.occupied && s.generation == entity.generation)
    }

    pub fn entity_by_name(&self, name: &str) -> Option<Entity> {
        self.by_name.get(name).copied()
    }

    pub fn state(&self, entity: Entity) -> Option<&MonitorState> {
        self.slots
            .get(entity.index as usize)
            .filter(|s| s.occupied && s.generation == entity.generation)
            .map(|s| &s.state)
    }

    pub fn state_mut(&mut self, entity: Entity) -> Option<&mut MonitorState> {
        self.slots
            .get_mut(entity.index as usize)
            .filter(|s| s.occupied && s.generation == entity.generation)
            .map(|s| &mut s.state)
    }

    pub fn pulse(&self, entity: Entity) -> Option<&PulseConfig> {
        self.slots
            .get(entity.index as usize)
            .filter(|s| s.occupied && s.generation == entity.generation)
            .map(|s| &s.pulse)
    }

    pub fn intervention(&self, entity: Entity) -> Option<&InterventionConfig> {
        self.slots
            .get(entity.index as usize)
            .filter(|s| s.occupied && s.generation == entity.generation)
            .and_then(|s| s.intervention.as_ref())
    }

    pub fn codes(&self, entity: Entity) -> Option<&CodeConfig> {
        self.slots
            .get(entity.index as usize)
            .filter(|s| s.occupied && s.generation == entity.generation)
            .map(|s| &s.codes)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.occupied).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every live entity, in spawn order. The scheduler's systems iterate
    /// this once per tick (spec §4.4); order is stable because entities are
    /// never reordered or recycled in normal operation.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.slots.iter().enumerate().filter(|(_, s)| s.occupied).map(|(i, s)| Entity {
            index: i as u32,
            generation: s.generation,
        })
    }

    /// Live entities whose predicate over `MonitorState` holds, without
    /// allocating an intermediate `Vec` (spec §4.3 "filter queries").
    pub fn query_states<'a>(
        &'a self,
        mut predicate: impl FnMut(&MonitorState) -> bool + 'a,
    ) -> impl Iterator<Item = Entity> + 'a {
        self.slots.iter().enumerate().filter_map(move |(i, s)| {
            if s.occupied && predicate(&s.state) {
                Some(Entity { index: i as u32, generation: s.generation })
            } else {
                None
            }
        })
    }
}
