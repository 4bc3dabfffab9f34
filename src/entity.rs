use crate::error::{HetnetError, Result};
use serde_derive::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Compound,
    Disease,
    Gene,
    Pathway,
    Anatomy,
    #[serde(rename = "Biological Process")]
    BiologicalProcess,
    #[serde(rename = "Cellular Component")]
    CellularComponent,
    #[serde(rename = "Molecular Function")]
    MolecularFunction,
    #[serde(rename = "Pharmacologic Class")]
    PharmacologicClass,
    #[serde(rename = "Side Effect")]
    SideEffect,
    Symptom,
}

impl EntityKind {
    pub const ALL: [EntityKind; 11] = [
        EntityKind::Compound,
        EntityKind::Disease,
        EntityKind::Gene,
        EntityKind::Pathway,
        EntityKind::Anatomy,
        EntityKind::BiologicalProcess,
        EntityKind::CellularComponent,
        EntityKind::MolecularFunction,
        EntityKind::PharmacologicClass,
        EntityKind::SideEffect,
        EntityKind::Symptom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Compound => "Compound",
            EntityKind::Disease => "Disease",
            EntityKind::Gene => "Gene",
            EntityKind::Pathway => "Pathway",
            EntityKind::Anatomy => "Anatomy",
            EntityKind::BiologicalProcess => "Biological Process",
            EntityKind::CellularComponent => "Cellular Component",
            EntityKind::MolecularFunction => "Molecular Function",
            EntityKind::PharmacologicClass => "Pharmacologic Class",
            EntityKind::SideEffect => "Side Effect",
            EntityKind::Symptom => "Symptom",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = HetnetError;

    fn from_str(s: &str) -> Result<Self> {
        EntityKind::ALL.iter().find(|k| k.as_str() == s).copied().ok_or_else(|| HetnetError::unrecognized("entity kind", s))
    }
}

/// Cross-reference namespaces an entity may carry alternate identifiers in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AltIdNamespace {
    Mesh,
    Umls,
    DrugBank,
    Omim,
    Ncbi,
    Reactome,
    Kegg,
}

impl AltIdNamespace {
    pub const ALL: [AltIdNamespace; 7] = [
        AltIdNamespace::Mesh,
        AltIdNamespace::Umls,
        AltIdNamespace::DrugBank,
        AltIdNamespace::Omim,
        AltIdNamespace::Ncbi,
        AltIdNamespace::Reactome,
        AltIdNamespace::Kegg,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AltIdNamespace::Mesh => "MESH",
            AltIdNamespace::Umls => "UMLS",
            AltIdNamespace::DrugBank => "DRUGBANK",
            AltIdNamespace::Omim => "OMIM",
            AltIdNamespace::Ncbi => "NCBI",
            AltIdNamespace::Reactome => "REACTOME",
            AltIdNamespace::Kegg => "KEGG",
        }
    }
}

impl fmt::Display for AltIdNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AltIdNamespace {
    type Err = HetnetError;

    fn from_str(s: &str) -> Result<Self> {
        AltIdNamespace::ALL.iter().find(|n| n.as_str() == s).copied().ok_or_else(|| HetnetError::unrecognized("alt-id namespace", s))
    }
}

/// Provenance labels ("het.io", "CTD", "RepoDB", ...). Order is irrelevant.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Provenance(BTreeSet<String>);

impl Provenance {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.contains(label)
    }

    pub fn merge(&mut self, other: &Provenance) {
        self.0.extend(other.0.iter().cloned());
    }
}

impl From<&str> for Provenance {
    fn from(label: &str) -> Self {
        Provenance(BTreeSet::from([label.to_string()]))
    }
}

impl From<String> for Provenance {
    fn from(label: String) -> Self {
        Provenance(BTreeSet::from([label]))
    }
}

impl From<Vec<String>> for Provenance {
    fn from(labels: Vec<String>) -> Self {
        labels.into_iter().collect()
    }
}

impl From<&[&str]> for Provenance {
    fn from(labels: &[&str]) -> Self {
        labels.iter().map(|l| l.to_string()).collect()
    }
}

impl FromIterator<String> for Provenance {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Provenance(iter.into_iter().filter(|l| !l.is_empty()).collect())
    }
}

/// The `(identifier, name, kind)` triple an entity is looked up by when no
/// direct reference is available, e.g. from a relation checkpoint.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NaturalKey {
    pub identifier: String,
    pub name: String,
    pub kind: EntityKind,
}

impl NaturalKey {
    pub fn to_record(&self) -> [String; 3] {
        [self.identifier.clone(), self.name.clone(), self.kind.to_string()]
    }

    pub fn from_record(record: &[String; 3]) -> Result<Self> {
        Ok(NaturalKey {
            identifier: record[0].clone(),
            name: record[1].clone(),
            kind: record[2].parse()?,
        })
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.identifier, self.name, self.kind)
    }
}

/// A biomedical concept with its bag of cross-reference identifiers.
///
/// Two entities denote the same concept when their [`attributes`](Entity::attributes)
/// intersect (see [`Entity::same_entity`]). That relation is not transitive, so
/// `PartialEq` is plain field equality and hashing goes through [`NaturalKey`].
///
/// Ids taken over from merged entities are kept apart from the entity's own alt-ids:
/// they are reported by [`Entity::alt_ids`] but never used for matching, so a merge
/// cannot bridge two otherwise disjoint entities.
#[skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Entity {
    identifier: String,
    name: String,
    kind: EntityKind,
    sources: Provenance,
    license: Option<String>,
    source_url: Option<String>,
    alt_ids: BTreeMap<AltIdNamespace, BTreeSet<String>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    merged_alt_ids: BTreeMap<AltIdNamespace, BTreeSet<String>>,
}

impl Entity {
    pub fn new(identifier: impl Into<String>, name: impl Into<String>, kind: EntityKind, sources: impl Into<Provenance>) -> Self {
        Entity {
            identifier: identifier.into(),
            name: name.into(),
            kind,
            sources: sources.into(),
            license: None,
            source_url: None,
            alt_ids: AltIdNamespace::ALL.iter().map(|ns| (*ns, BTreeSet::new())).collect(),
            merged_alt_ids: BTreeMap::new(),
        }
    }

    pub fn with_license(mut self, license: Option<String>) -> Self {
        self.license = license;
        self
    }

    pub fn with_source_url(mut self, source_url: Option<String>) -> Self {
        self.source_url = source_url;
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn sources(&self) -> &Provenance {
        &self.sources
    }

    pub fn license(&self) -> Option<&str> {
        self.license.as_deref()
    }

    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            identifier: self.identifier.clone(),
            name: self.name.clone(),
            kind: self.kind,
        }
    }

    /// Append identifiers under a namespace given by name, e.g. `"UMLS"`.
    ///
    /// Fails with an unrecognized-enum error when the namespace is not one of
    /// [`AltIdNamespace::ALL`].
    pub fn add_alt_id<I, S>(&mut self, namespace: &str, ids: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let namespace: AltIdNamespace = namespace.parse()?;
        self.extend_alt_ids(namespace, ids);
        Ok(())
    }

    pub fn extend_alt_ids<I, S>(&mut self, namespace: AltIdNamespace, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::<String>::into).filter(|id| !id.is_empty()).collect();
        if let Some(merged) = self.merged_alt_ids.get_mut(&namespace) {
            ids.iter().for_each(|id| {
                merged.remove(id);
            });
            if merged.is_empty() {
                self.merged_alt_ids.remove(&namespace);
            }
        }
        self.alt_ids.entry(namespace).or_default().extend(ids);
    }

    fn extend_merged_alt_ids<I>(&mut self, namespace: AltIdNamespace, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        let own = self.alt_ids.get(&namespace);
        let fresh: BTreeSet<String> = ids.into_iter().filter(|id| !id.is_empty() && !own.is_some_and(|o| o.contains(id))).collect();
        if !fresh.is_empty() {
            self.merged_alt_ids.entry(namespace).or_default().extend(fresh);
        }
    }

    /// Own and merged alt-ids of a namespace, sorted.
    pub fn alt_ids(&self, namespace: AltIdNamespace) -> impl Iterator<Item = &str> {
        let own = self.alt_ids.get(&namespace).into_iter().flatten();
        let merged = self.merged_alt_ids.get(&namespace).into_iter().flatten();
        own.chain(merged).map(String::as_str).collect::<BTreeSet<_>>().into_iter()
    }

    pub fn merged_alt_ids(&self, namespace: AltIdNamespace) -> impl Iterator<Item = &str> {
        self.merged_alt_ids.get(&namespace).into_iter().flatten().map(String::as_str)
    }

    pub fn alt_id_count(&self) -> usize {
        self.alt_ids.values().chain(self.merged_alt_ids.values()).map(BTreeSet::len).sum()
    }

    /// Primary identifier plus the entity's own alt-ids; merged alt-ids are left out.
    pub fn attributes(&self) -> HashSet<&str> {
        std::iter::once(self.identifier.as_str()).chain(self.alt_ids.values().flatten().map(String::as_str)).collect()
    }

    pub fn same_entity(&self, other: &Entity) -> bool {
        let theirs = other.attributes();
        self.attributes().iter().any(|a| theirs.contains(a))
    }

    /// Take over the provenance and every alt-id of `other`, which is being merged into `self`.
    /// Its alt-ids become merged alt-ids; the primary identifier of `other` is not carried over.
    pub fn absorb(&mut self, other: &Entity) {
        self.sources.merge(&other.sources);
        for namespace in AltIdNamespace::ALL {
            let ids: Vec<String> = other.alt_ids(namespace).map(str::to_string).collect();
            self.extend_merged_alt_ids(namespace, ids);
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Flat checkpoint form of an [`Entity`]. Required fields are optional here so that a
/// missing one surfaces as a malformed-record error instead of a generic parse failure.
#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct EntityRecord {
    identifier: Option<String>,
    name: Option<String>,
    kind: Option<String>,
    #[serde(default)]
    sources: Vec<String>,
    #[serde(default)]
    license: Option<String>,
    #[serde(default)]
    source_url: Option<String>,
    #[serde(default)]
    alt_ids: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    merged_alt_ids: BTreeMap<String, Vec<String>>,
}

impl EntityRecord {
    pub(crate) fn into_entity(self, context: &str, index: usize) -> Result<Entity> {
        let malformed = |field| HetnetError::MalformedRecord {
            context: context.to_string(),
            index,
            field,
        };
        let identifier = self.identifier.ok_or_else(|| malformed("identifier"))?;
        let name = self.name.ok_or_else(|| malformed("name"))?;
        let kind: EntityKind = self.kind.ok_or_else(|| malformed("kind"))?.parse()?;

        let mut entity = Entity::new(identifier, name, kind, Provenance::from(self.sources))
            .with_license(self.license)
            .with_source_url(self.source_url);
        for (namespace, ids) in self.alt_ids.into_iter() {
            entity.add_alt_id(&namespace, ids)?;
        }
        for (namespace, ids) in self.merged_alt_ids.into_iter() {
            entity.extend_merged_alt_ids(namespace.parse()?, ids);
        }
        Ok(entity)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use itertools::Itertools;

    fn aspirin() -> Entity {
        Entity::new("DB00945", "Aspirin", EntityKind::Compound, "het.io")
    }

    #[test]
    fn new_entity_has_every_namespace_empty() {
        let entity = aspirin();
        assert_eq!(entity.alt_id_count(), 0);
        assert_eq!(entity.attributes(), HashSet::from(["DB00945"]));
        assert_eq!(entity.sources().iter().collect_vec(), vec!["het.io"]);
    }

    #[test]
    fn add_alt_id_deduplicates() {
        let mut entity = aspirin();
        entity.add_alt_id("UMLS", ["C0004057", "C0004057"]).unwrap();
        entity.add_alt_id("UMLS", ["C0004057"]).unwrap();
        entity.add_alt_id("MESH", vec!["D001241".to_string()]).unwrap();
        assert_eq!(entity.alt_ids(AltIdNamespace::Umls).collect_vec(), vec!["C0004057"]);
        assert_eq!(entity.alt_id_count(), 2);
        assert!(entity.attributes().contains("D001241"));
    }

    #[test]
    fn add_alt_id_rejects_unknown_namespace() {
        let mut entity = aspirin();
        let err = entity.add_alt_id("CHEBI", ["15365"]).unwrap_err();
        assert!(matches!(err, HetnetError::UnrecognizedEnum { vocabulary: "alt-id namespace", .. }));
    }

    #[test]
    fn same_entity_is_attribute_overlap() {
        let mut a = aspirin();
        a.add_alt_id("UMLS", ["C0004057"]).unwrap();
        let mut b = Entity::new("D001241", "Acetylsalicylic Acid", EntityKind::Compound, "CTD");
        assert!(!a.same_entity(&b));
        b.add_alt_id("UMLS", ["C0004057"]).unwrap();
        assert!(a.same_entity(&b));
        assert!(b.same_entity(&a));
    }

    #[test]
    fn absorbed_ids_are_listed_but_not_matched() {
        let mut a = aspirin();
        a.extend_alt_ids(AltIdNamespace::Umls, ["C1"]);
        let mut b = Entity::new("DB00945", "Aspirin", EntityKind::Compound, "RepoDB");
        b.extend_alt_ids(AltIdNamespace::Umls, ["C1", "C2"]);
        a.absorb(&b);

        assert_eq!(a.alt_ids(AltIdNamespace::Umls).collect_vec(), vec!["C1", "C2"]);
        assert_eq!(a.merged_alt_ids(AltIdNamespace::Umls).collect_vec(), vec!["C2"]);
        assert!(!a.attributes().contains("C2"));
        assert_eq!(a.sources().iter().collect_vec(), vec!["RepoDB", "het.io"]);

        let mut c = Entity::new("X", "other", EntityKind::Compound, "CTD");
        c.extend_alt_ids(AltIdNamespace::Umls, ["C2"]);
        assert!(!a.same_entity(&c));

        a.extend_alt_ids(AltIdNamespace::Umls, ["C2"]);
        assert_eq!(a.merged_alt_ids(AltIdNamespace::Umls).count(), 0);
        assert!(a.same_entity(&c));
    }

    #[test]
    fn record_keeps_merged_alt_ids_apart() {
        let record: EntityRecord = serde_json::from_str(
            r#"{"identifier": "D001241", "name": "Aspirin", "kind": "Compound", "sources": ["CTD"],
                "alt_ids": {"MESH": ["D001241"]}, "merged_alt_ids": {"MESH": ["C039032", "D001241"]}}"#,
        )
        .unwrap();
        let entity = record.into_entity("test", 0).unwrap();
        assert_eq!(entity.alt_ids(AltIdNamespace::Mesh).collect_vec(), vec!["C039032", "D001241"]);
        assert_eq!(entity.merged_alt_ids(AltIdNamespace::Mesh).collect_vec(), vec!["C039032"]);
        assert_eq!(entity.alt_id_count(), 2);
    }

    #[test]
    fn entity_kind_parses_closed_vocabulary() {
        assert_eq!("Biological Process".parse::<EntityKind>().unwrap(), EntityKind::BiologicalProcess);
        assert_eq!(EntityKind::SideEffect.to_string(), "Side Effect");
        assert!("Protein".parse::<EntityKind>().is_err());
    }

    #[test]
    fn scalar_sources_become_one_element_provenance() {
        let provenance = Provenance::from("CTD");
        assert_eq!(provenance.len(), 1);
        let provenance = Provenance::from(vec!["CTD".to_string(), "RepoDB".to_string(), "CTD".to_string()]);
        assert_eq!(provenance.iter().collect_vec(), vec!["CTD", "RepoDB"]);
    }

    #[test]
    fn record_missing_kind_is_malformed() {
        let record: EntityRecord = serde_json::from_str(r#"{"identifier": "D01", "name": "Headache"}"#).unwrap();
        let err = record.into_entity("test", 3).unwrap_err();
        assert!(matches!(err, HetnetError::MalformedRecord { index: 3, field: "kind", .. }));
    }
}
