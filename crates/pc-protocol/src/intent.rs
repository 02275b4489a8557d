use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityKind};

/// One scored interpretation of an utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentCandidate {
    /// Registered intent name (e.g. "vm_resize").
    pub name: String,
    /// Normalized score in [0, 1].
    pub confidence: f64,
    /// Entity kinds that must be bound before the intent is actionable.
    pub required_slots: Vec<EntityKind>,
    /// Entity kinds that are bound when present but never block.
    #[serde(default)]
    pub optional_slots: Vec<EntityKind>,
    /// Slot name (entity kind name) → bound entity.
    #[serde(default)]
    pub bound_entities: BTreeMap<String, Entity>,
}

impl IntentCandidate {
    pub fn new(
        name: impl Into<String>,
        confidence: f64,
        required_slots: Vec<EntityKind>,
        optional_slots: Vec<EntityKind>,
    ) -> Self {
        Self {
            name: name.into(),
            confidence: confidence.clamp(0.0, 1.0),
            required_slots,
            optional_slots,
            bound_entities: BTreeMap::new(),
        }
    }

    /// Whether `kind` is a required or optional slot of this intent.
    pub fn accepts(&self, kind: EntityKind) -> bool {
        self.required_slots.contains(&kind) || self.optional_slots.contains(&kind)
    }

    pub fn is_bound(&self, kind: EntityKind) -> bool {
        self.bound_entities.contains_key(kind.as_str())
    }

    pub fn bound(&self, kind: EntityKind) -> Option<&Entity> {
        self.bound_entities.get(kind.as_str())
    }

    /// Bind `entity` to its slot unless that slot is already taken or the
    /// intent has no such slot. Returns whether the entity was bound.
    pub fn bind(&mut self, entity: Entity) -> bool {
        if !self.accepts(entity.kind) || self.is_bound(entity.kind) {
            return false;
        }
        self.bound_entities
            .insert(entity.kind.as_str().to_string(), entity);
        true
    }

    /// Required slots that are still unbound, in declaration order.
    pub fn missing_slots(&self) -> Vec<EntityKind> {
        self.required_slots
            .iter()
            .copied()
            .filter(|k| !self.is_bound(*k))
            .collect()
    }

    pub fn is_fully_bound(&self) -> bool {
        self.required_slots.iter().all(|k| self.is_bound(*k))
    }

    /// All bound entities in slot-name order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.bound_entities.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityValue, ResourceSpec};

    fn resize() -> IntentCandidate {
        IntentCandidate::new(
            "vm_resize",
            0.85,
            vec![EntityKind::VmId, EntityKind::ResourceSpec],
            vec![],
        )
    }

    #[test]
    fn confidence_is_clamped() {
        let c = IntentCandidate::new("vm_list", 1.7, vec![], vec![]);
        assert_eq!(c.confidence, 1.0);
    }

    #[test]
    fn missing_slots_tracks_binding() {
        let mut c = resize();
        assert_eq!(
            c.missing_slots(),
            vec![EntityKind::VmId, EntityKind::ResourceSpec]
        );

        let spec = ResourceSpec {
            memory_mb: Some(4096),
            ..Default::default()
        };
        assert!(c.bind(Entity::explicit(
            EntityKind::ResourceSpec,
            EntityValue::Resources(spec),
            None
        )));
        assert_eq!(c.missing_slots(), vec![EntityKind::VmId]);
        assert!(!c.is_fully_bound());

        assert!(c.bind(Entity::explicit(EntityKind::VmId, EntityValue::Id(100), None)));
        assert!(c.is_fully_bound());
    }

    #[test]
    fn bind_rejects_foreign_and_duplicate_slots() {
        let mut c = resize();
        assert!(!c.bind(Entity::explicit(
            EntityKind::Hostname,
            EntityValue::Name("a.example.com".into()),
            None
        )));
        assert!(c.bind(Entity::explicit(EntityKind::VmId, EntityValue::Id(100), None)));
        assert!(!c.bind(Entity::explicit(EntityKind::VmId, EntityValue::Id(200), None)));
        assert_eq!(
            c.bound(EntityKind::VmId).map(|e| &e.value),
            Some(&EntityValue::Id(100))
        );
    }
}
