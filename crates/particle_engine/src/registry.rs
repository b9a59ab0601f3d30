//! Effect registry: tracks running effect instances and their drivers.
//!
//! Three concurrent maps are kept in step: public id to internal key, key
//! to instance, and key to driver. Callers never see the keys. Insertion
//! publishes the id last and removal retracts it first, so a reader that
//! resolves an id always finds both the instance and its driver, and a
//! driver whose id has been retracted terminates on its next run.

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::ids::EffectId;
use crate::instance::EffectInstance;
use crate::scheduler::DriverSlot;

/// Registry of all running effects.
#[derive(Debug, Default)]
pub struct EffectRegistry {
    keys: DashMap<EffectId, Uuid>,
    instances: DashMap<Uuid, Arc<EffectInstance>>,
    drivers: DashMap<Uuid, Arc<DriverSlot>>,
}

impl EffectRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instance together with its driver.
    pub fn insert(&self, instance: EffectInstance, driver: Arc<DriverSlot>) -> Arc<EffectInstance> {
        let key = Uuid::new_v4();
        let id = instance.id;
        let instance = Arc::new(instance);
        self.instances.insert(key, Arc::clone(&instance));
        self.drivers.insert(key, driver);
        if let Some(stale) = self.keys.insert(id, key) {
            self.forget(stale);
        }
        instance
    }

    /// Remove an effect and cancel its driver.
    ///
    /// Returns the removed instance, or `None` if the id is unknown.
    pub fn remove(&self, id: EffectId) -> Option<Arc<EffectInstance>> {
        let (_, key) = self.keys.remove(&id)?;
        self.forget(key)
    }

    fn forget(&self, key: Uuid) -> Option<Arc<EffectInstance>> {
        if let Some((_, driver)) = self.drivers.remove(&key) {
            driver.cancel();
        }
        self.instances.remove(&key).map(|(_, instance)| instance)
    }

    /// Look up a running instance.
    #[must_use]
    pub fn get(&self, id: EffectId) -> Option<Arc<EffectInstance>> {
        let key = *self.keys.get(&id)?;
        self.instances.get(&key).map(|entry| Arc::clone(entry.value()))
    }

    /// Look up an effect's driver.
    #[must_use]
    pub fn driver(&self, id: EffectId) -> Option<Arc<DriverSlot>> {
        let key = *self.keys.get(&id)?;
        self.drivers.get(&key).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns `true` if `id` is running.
    #[must_use]
    pub fn contains(&self, id: EffectId) -> bool {
        self.keys.contains_key(&id)
    }

    /// Every running instance, ordered by id.
    #[must_use]
    pub fn list(&self) -> Vec<Arc<EffectInstance>> {
        let mut instances: Vec<_> = self.instances.iter().map(|entry| Arc::clone(entry.value())).collect();
        instances.sort_by_key(|instance| instance.id);
        instances
    }

    /// Every running effect's id and driver, ordered by id.
    #[must_use]
    pub fn drivers(&self) -> Vec<(EffectId, Arc<DriverSlot>)> {
        let mut drivers: Vec<_> = self
            .keys
            .iter()
            .filter_map(|entry| {
                let driver = self.drivers.get(entry.value())?;
                Some((*entry.key(), Arc::clone(driver.value())))
            })
            .collect();
        drivers.sort_by_key(|(id, _)| *id);
        drivers
    }

    /// Ids of effects playing `model` (case-insensitive), ordered.
    #[must_use]
    pub fn ids_for_model(&self, model: &str) -> Vec<EffectId> {
        let mut ids: Vec<_> = self
            .instances
            .iter()
            .filter(|entry| entry.model.eq_ignore_ascii_case(model))
            .map(|entry| entry.id)
            .collect();
        ids.sort();
        ids
    }

    /// Returns the number of running effects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if nothing is running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Remove every effect, cancelling all drivers. Returns the removed ids.
    pub fn clear(&self) -> Vec<EffectId> {
        let mut ids: Vec<EffectId> = self.keys.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        for id in &ids {
            self.remove(*id);
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use glam::DVec3;

    use super::*;
    use crate::instance::{Anchor, Lifetime, Location};

    fn instance(id: u64, model: &str) -> EffectInstance {
        EffectInstance {
            id: EffectId(id),
            model: model.to_string(),
            anchor: Anchor::Fixed(Location::new("w", DVec3::ZERO)),
            lifetime: Lifetime::Infinite,
            persistent: true,
            started_at_ms: 0,
            animation_started_at_ms: 0,
            initial_tick: 0,
            effects: None,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let registry = EffectRegistry::new();
        registry.insert(instance(1, "heart"), Arc::new(DriverSlot::new(0)));
        assert!(registry.contains(EffectId(1)));
        assert_eq!(registry.get(EffectId(1)).unwrap().model, "heart");
        assert!(registry.driver(EffectId(1)).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_cancels_driver() {
        let registry = EffectRegistry::new();
        let driver = Arc::new(DriverSlot::new(0));
        registry.insert(instance(1, "heart"), Arc::clone(&driver));

        assert!(registry.remove(EffectId(1)).is_some());
        assert!(driver.is_cancelled());
        assert!(registry.get(EffectId(1)).is_none());
        assert!(registry.driver(EffectId(1)).is_none());
        assert!(registry.remove(EffectId(1)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_list_and_drivers_sorted() {
        let registry = EffectRegistry::new();
        for id in [3, 1, 2] {
            registry.insert(instance(id, "m"), Arc::new(DriverSlot::new(0)));
        }
        let ids: Vec<u64> = registry.list().iter().map(|i| i.id.id()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        let driver_ids: Vec<u64> = registry.drivers().iter().map(|(id, _)| id.id()).collect();
        assert_eq!(driver_ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_ids_for_model() {
        let registry = EffectRegistry::new();
        registry.insert(instance(1, "Heart"), Arc::new(DriverSlot::new(0)));
        registry.insert(instance(2, "star"), Arc::new(DriverSlot::new(0)));
        registry.insert(instance(3, "heart"), Arc::new(DriverSlot::new(0)));
        assert_eq!(registry.ids_for_model("HEART"), vec![EffectId(1), EffectId(3)]);
    }

    #[test]
    fn test_clear_cancels_everything() {
        let registry = EffectRegistry::new();
        let a = Arc::new(DriverSlot::new(0));
        let b = Arc::new(DriverSlot::new(0));
        registry.insert(instance(1, "m"), Arc::clone(&a));
        registry.insert(instance(2, "m"), Arc::clone(&b));

        assert_eq!(registry.clear(), vec![EffectId(1), EffectId(2)]);
        assert!(a.is_cancelled() && b.is_cancelled());
        assert!(registry.is_empty());
    }
}
