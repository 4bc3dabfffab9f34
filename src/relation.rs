use crate::entity::{NaturalKey, Provenance};
use crate::error::{HetnetError, Result};
use crate::store::{EntityId, EntityStore};
use log::warn;
use serde_derive::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

pub const INVERSE_SUFFIX: &str = "_inv";

/// Direction flag carried by heterogeneous-network edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Both,
}

impl FromStr for Direction {
    type Err = HetnetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "forward" => Ok(Direction::Forward),
            "both" => Ok(Direction::Both),
            _ => Err(HetnetError::unrecognized("edge direction", s)),
        }
    }
}

pub fn inverse_kind(kind: &str) -> String {
    format!("{}{}", kind, INVERSE_SUFFIX)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relation {
    pub source: EntityId,
    pub destination: EntityId,
    pub kind: String,
    pub sources: Provenance,
}

impl Relation {
    pub fn new(source: EntityId, destination: EntityId, kind: impl Into<String>, sources: impl Into<Provenance>) -> Self {
        Relation {
            source,
            destination,
            kind: kind.into(),
            sources: sources.into(),
        }
    }

    /// The syntactic inverse: endpoints swapped, kind suffixed with `_inv`.
    pub fn inverse(&self) -> Relation {
        Relation {
            source: self.destination,
            destination: self.source,
            kind: inverse_kind(&self.kind),
            sources: self.sources.clone(),
        }
    }

    /// Forward relation, plus its inverse when `direction` is [`Direction::Both`].
    pub fn expand(self, direction: Direction) -> Vec<Relation> {
        match direction {
            Direction::Forward => vec![self],
            Direction::Both => {
                let inverse = self.inverse();
                vec![self, inverse]
            }
        }
    }

    pub fn key(&self) -> (EntityId, EntityId, &str) {
        (self.source, self.destination, self.kind.as_str())
    }

    pub fn remap(mut self, map: impl Fn(EntityId) -> EntityId) -> Relation {
        self.source = map(self.source);
        self.destination = map(self.destination);
        self
    }

    pub fn describe(&self, store: &EntityStore) -> String {
        let name = |id| store.get(id).map(|e| e.name().to_string()).unwrap_or_else(|| id.to_string());
        format!("{}\t{}\t{}", name(self.source), self.kind, name(self.destination))
    }

    pub(crate) fn to_record(&self, store: &EntityStore) -> Result<RelationRecord> {
        let key = |id: EntityId| store.get(id).map(|e| e.natural_key().to_record()).ok_or(HetnetError::UnknownEntity(id.index()));
        Ok(RelationRecord {
            source: key(self.source)?,
            destination: key(self.destination)?,
            kind: self.kind.clone(),
            sources: self.sources.clone(),
        })
    }
}

/// Relations unique on `(source, destination, kind)`. A repeated triple is counted and
/// dropped, since it signals an extractor emitting the same fact twice.
#[derive(Clone, Debug, Default)]
pub struct RelationSet {
    relations: Vec<Relation>,
    seen: HashSet<(EntityId, EntityId, String)>,
    duplicates: usize,
}

impl RelationSet {
    pub fn new() -> Self {
        RelationSet::default()
    }

    /// Returns false when the triple was already present.
    pub fn insert(&mut self, relation: Relation) -> bool {
        if !self.seen.insert((relation.source, relation.destination, relation.kind.clone())) {
            self.duplicates += 1;
            log::debug!("duplicate relation {:?}", relation.key());
            return false;
        }
        self.relations.push(relation);
        true
    }

    pub fn extend(&mut self, relations: impl IntoIterator<Item = Relation>) {
        relations.into_iter().for_each(|r| {
            self.insert(r);
        });
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relation> {
        self.relations.iter()
    }

    pub fn as_slice(&self) -> &[Relation] {
        &self.relations
    }

    pub fn into_relations(self) -> Vec<Relation> {
        if self.duplicates > 0 {
            warn!("{} duplicate relation triples were filtered", self.duplicates);
        }
        self.relations
    }
}

impl FromIterator<Relation> for RelationSet {
    fn from_iter<I: IntoIterator<Item = Relation>>(iter: I) -> Self {
        let mut set = RelationSet::new();
        set.extend(iter);
        set
    }
}

/// Checkpoint form of a [`Relation`]: endpoints by natural key `[identifier, name, kind]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct RelationRecord {
    source: [String; 3],
    destination: [String; 3],
    kind: String,
    #[serde(default)]
    sources: Provenance,
}

impl RelationRecord {
    /// Resolve both endpoints against `index` (from [`EntityStore::natural_key_index`]).
    /// Zero or several matches for a key is an ambiguous-reference error.
    pub(crate) fn resolve(self, index: &std::collections::HashMap<NaturalKey, Vec<EntityId>>) -> Result<Relation> {
        let lookup = |record: &[String; 3]| -> Result<EntityId> {
            let key = NaturalKey::from_record(record)?;
            match index.get(&key).map(Vec::as_slice) {
                Some([id]) => Ok(*id),
                other => Err(HetnetError::AmbiguousReference {
                    matches: other.map_or(0, <[EntityId]>::len),
                    key,
                }),
            }
        };
        Ok(Relation {
            source: lookup(&self.source)?,
            destination: lookup(&self.destination)?,
            kind: self.kind,
            sources: self.sources,
        })
    }
}
