use crate::entity::{Entity, EntityKind, NaturalKey};
use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Stable synthetic key of an entity inside one [`EntityStore`].
///
/// Ids are positions in insertion order and are never reused; an entity merged into
/// in place keeps its id, so every holder observes the merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub usize);

impl EntityId {
    pub fn index(&self) -> usize {
        self.0
    }

    pub fn offset(&self, by: usize) -> EntityId {
        EntityId(self.0 + by)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Owned, append-only collection of entities. Entities are never removed, only merged into.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntityStore {
    entities: Vec<Entity>,
}

impl EntityStore {
    pub fn new() -> Self {
        EntityStore { entities: vec![] }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        EntityStore {
            entities: Vec::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, entity: Entity) -> EntityId {
        self.entities.push(entity);
        EntityId(self.entities.len() - 1)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.0)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter().enumerate().map(|(idx, e)| (EntityId(idx), e))
    }

    pub fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.iter().filter(move |(_, e)| e.kind() == kind)
    }

    pub fn count_of_kind(&self, kind: EntityKind) -> usize {
        self.entities.iter().filter(|e| e.kind() == kind).count()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn into_entities(self) -> Vec<Entity> {
        self.entities
    }

    /// Move every entity of `other` to the end of this store and return the offset
    /// that maps an id of `other` to its new id here.
    pub fn append(&mut self, other: EntityStore) -> usize {
        let offset = self.entities.len();
        self.entities.extend(other.entities);
        offset
    }

    /// Every id per natural key. More than one id under a key means the key cannot
    /// be used to reference an entity unambiguously.
    pub fn natural_key_index(&self) -> HashMap<NaturalKey, Vec<EntityId>> {
        let mut index: HashMap<NaturalKey, Vec<EntityId>> = HashMap::with_capacity(self.entities.len());
        for (id, entity) in self.iter() {
            index.entry(entity.natural_key()).or_default().push(id);
        }
        index
    }

    /// `(kind, identifier)` lookup used by extractors whose rows name entities by
    /// primary identifier. The first entity wins when an identifier repeats.
    pub fn identifier_index(&self) -> HashMap<(EntityKind, String), EntityId> {
        let mut index = HashMap::with_capacity(self.entities.len());
        for (id, entity) in self.iter() {
            index.entry((entity.kind(), entity.identifier().to_string())).or_insert(id);
        }
        index
    }
}

impl FromIterator<Entity> for EntityStore {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        EntityStore {
            entities: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ids_follow_insertion_order() {
        let mut store = EntityStore::new();
        let a = store.insert(Entity::new("DB01", "Aspirin", EntityKind::Compound, "het.io"));
        let b = store.insert(Entity::new("D01", "Headache", EntityKind::Disease, "het.io"));
        assert_eq!((a, b), (EntityId(0), EntityId(1)));
        assert_eq!(store.get(b).map(Entity::name), Some("Headache"));
        assert_eq!(store.of_kind(EntityKind::Compound).count(), 1);
    }

    #[test]
    fn append_offsets_ids() {
        let mut first: EntityStore = vec![Entity::new("DB01", "Aspirin", EntityKind::Compound, "het.io")].into_iter().collect();
        let second: EntityStore = vec![Entity::new("D01", "Headache", EntityKind::Disease, "RepoDB")].into_iter().collect();
        let offset = first.append(second);
        assert_eq!(offset, 1);
        assert_eq!(first.get(EntityId(0).offset(offset)).map(Entity::identifier), Some("D01"));
    }

    #[test]
    fn natural_key_index_exposes_collisions() {
        let store: EntityStore = vec![
            Entity::new("DB01", "Aspirin", EntityKind::Compound, "het.io"),
            Entity::new("DB01", "Aspirin", EntityKind::Compound, "RepoDB"),
        ]
        .into_iter()
        .collect();
        let index = store.natural_key_index();
        assert_eq!(index.len(), 1);
        assert_eq!(index.values().next().map(Vec::len), Some(2));
    }
}
