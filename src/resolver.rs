//! First-match identity resolution.
//!
//! A candidate entity is compared against already accepted entities of the same kind in
//! insertion order; the first one whose attributes intersect the candidate's absorbs the
//! candidate's alt-ids and provenance and the candidate is discarded. Otherwise the candidate
//! is inserted. Absorbed alt-ids are kept as merged ids and are never matched against, so the
//! outcome for a chain A∩B, B∩C with A∩C=∅ does not depend on whether B comes before C.
//!
//! [`Resolver::indexed`] keeps an attribute → owner index to avoid the quadratic scan of
//! [`Resolver::linear`]. The index only narrows the search: every hit is re-checked with
//! [`Entity::same_entity`] and the lowest matching id wins, which is what the linear scan
//! would have returned.

use crate::entity::{Entity, EntityKind};
use crate::store::{EntityId, EntityStore};
use log::{debug, info};
use std::collections::{BTreeSet, HashMap};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    Inserted(EntityId),
    Merged(EntityId),
}

impl Resolution {
    pub fn id(&self) -> EntityId {
        match self {
            Resolution::Inserted(id) | Resolution::Merged(id) => *id,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct AttributeIndex {
    owners: HashMap<(EntityKind, String), Vec<EntityId>>,
}

impl AttributeIndex {
    pub fn build(store: &EntityStore) -> Self {
        let mut index = AttributeIndex::default();
        store.iter().for_each(|(id, entity)| index.observe(id, entity));
        index
    }

    /// Record every current attribute of `entity` as owned by `id`. Safe to call again after a merge.
    pub fn observe(&mut self, id: EntityId, entity: &Entity) {
        for attribute in entity.attributes() {
            let owners = self.owners.entry((entity.kind(), attribute.to_string())).or_default();
            if let Err(pos) = owners.binary_search(&id) {
                owners.insert(pos, id);
            }
        }
    }

    pub fn candidates(&self, entity: &Entity) -> BTreeSet<EntityId> {
        entity
            .attributes()
            .into_iter()
            .filter_map(|a| self.owners.get(&(entity.kind(), a.to_string())))
            .flatten()
            .copied()
            .collect()
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolveReport {
    pub inserted: usize,
    pub merged: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Resolver {
    index: Option<AttributeIndex>,
    report: ResolveReport,
}

impl Resolver {
    pub fn linear() -> Self {
        Resolver::default()
    }

    /// Indexed resolver primed with the current content of `store`. Every later insertion
    /// into `store` must go through [`Resolver::resolve`] for the index to stay complete.
    pub fn indexed(store: &EntityStore) -> Self {
        Resolver {
            index: Some(AttributeIndex::build(store)),
            report: ResolveReport::default(),
        }
    }

    pub fn report(&self) -> &ResolveReport {
        &self.report
    }

    pub fn find_match(&self, store: &EntityStore, candidate: &Entity) -> Option<EntityId> {
        match &self.index {
            None => store.of_kind(candidate.kind()).find(|(_, e)| e.same_entity(candidate)).map(|(id, _)| id),
            Some(index) => index
                .candidates(candidate)
                .into_iter()
                .find(|id| store.get(*id).is_some_and(|e| e.kind() == candidate.kind() && e.same_entity(candidate))),
        }
    }

    /// Every entity of the candidate's kind overlapping it, in id order.
    pub fn find_all_matches(&self, store: &EntityStore, candidate: &Entity) -> Vec<EntityId> {
        match &self.index {
            None => store.of_kind(candidate.kind()).filter(|(_, e)| e.same_entity(candidate)).map(|(id, _)| id).collect(),
            Some(index) => index
                .candidates(candidate)
                .into_iter()
                .filter(|id| store.get(*id).is_some_and(|e| e.kind() == candidate.kind() && e.same_entity(candidate)))
                .collect(),
        }
    }

    pub fn resolve(&mut self, store: &mut EntityStore, candidate: Entity) -> Resolution {
        match self.find_match(store, &candidate) {
            Some(id) => {
                if let Some(existing) = store.get_mut(id) {
                    debug!("merging {} ({}) into {} ({})", candidate.name(), candidate.identifier(), existing.name(), existing.identifier());
                    existing.absorb(&candidate);
                    if let Some(index) = self.index.as_mut() {
                        index.observe(id, existing);
                    }
                }
                self.report.merged += 1;
                Resolution::Merged(id)
            }
            None => {
                let id = store.insert(candidate);
                if let (Some(index), Some(entity)) = (self.index.as_mut(), store.get(id)) {
                    index.observe(id, entity);
                }
                self.report.inserted += 1;
                Resolution::Inserted(id)
            }
        }
    }

    /// Resolve every entity of `other` into `store`, in `other`'s order, returning for each id
    /// of `other` the id it ended up as in `store`.
    pub fn absorb(&mut self, store: &mut EntityStore, other: EntityStore) -> Vec<EntityId> {
        let total = other.len();
        let mapping: Vec<EntityId> = other.into_entities().into_iter().map(|candidate| self.resolve(store, candidate).id()).collect();
        info!("absorbed {} entities: {} inserted, {} merged so far", total, self.report.inserted, self.report.merged);
        mapping
    }
}
