//! Object registry: identity, lookup, and paint ordering.

use std::collections::HashMap;

use super::object::{DrawObject, ObjectId, ObjectProps};

/// Owns every registered drawable object and issues their identities.
///
/// Ids come from a monotonically increasing counter and are never reused, so
/// comparing ids compares registration order.
#[derive(Default)]
pub struct ObjectRegistry {
    objects: HashMap<ObjectId, DrawObject>,
    next_id: u64,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new object and return its id.
    pub fn register(&mut self, props: ObjectProps) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.objects.insert(id, DrawObject::new(id, props));
        id
    }

    /// Remove an object. The caller disposes its reactive subscriptions;
    /// every id-keyed lookup stops resolving immediately. Unknown ids are a
    /// no-op.
    pub fn unregister(&mut self, id: ObjectId) -> Option<DrawObject> {
        self.objects.remove(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&DrawObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut DrawObject> {
        self.objects.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// All ids in registration order.
    pub fn ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<_> = self.objects.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Ids in paint order: highest draw priority first, ties broken by
    /// registration order (earlier-registered paints first and claims its
    /// cells).
    pub fn paint_order(&self) -> Vec<ObjectId> {
        let mut ids: Vec<_> = self.objects.keys().copied().collect();
        ids.sort_by_key(|id| {
            let z = self.objects[id].z_index();
            (std::cmp::Reverse(z), *id)
        });
        ids
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::object::Content;
    use crate::types::Rect;

    fn props(z: i32) -> ObjectProps {
        ObjectProps::new(Rect::new(0, 0, 2, 1), Content::Fill('#')).z(z)
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut registry = ObjectRegistry::new();
        let a = registry.register(props(0));
        registry.unregister(a);
        let b = registry.register(props(0));
        assert_ne!(a, b);
    }

    #[test]
    fn test_paint_order_z_then_registration() {
        let mut registry = ObjectRegistry::new();
        let low = registry.register(props(1));
        let high = registry.register(props(5));
        let high_late = registry.register(props(5));

        assert_eq!(registry.paint_order(), vec![high, high_late, low]);
    }

    #[test]
    fn test_unregister_stops_resolving() {
        let mut registry = ObjectRegistry::new();
        let a = registry.register(props(1));
        let b = registry.register(props(2));

        registry.unregister(a);
        assert!(registry.get(a).is_none());
        assert_eq!(registry.paint_order(), vec![b]);
        assert_eq!(registry.ids(), vec![b]);
    }
}
