use crate::entity::{AltIdNamespace, Entity, EntityKind};
use crate::error::{HetnetError, Result};
use crate::relation::{Direction, Relation, RelationSet};
use crate::sources::{open_input, ExtractReport};
use crate::store::EntityStore;
use crate::vocab::{enrich, CrossReferenceVocabulary, EnrichmentReport, XrefKey, XrefRule};
use crate::PROGRESS_INTERVAL;
use log::{info, warn};
use serde_derive::Deserialize;
use serde_with::{serde_as, OneOrMany};
use std::{fmt, path};

pub const DATASET: &str = "hetio";
pub const PROVENANCE: &str = "het.io";

/// Compounds carry DrugBank identifiers.
pub const COMPOUND_XREFS: [XrefRule; 1] = [XrefRule::new(XrefKey::Identifier, "DRUGBANK", AltIdNamespace::Umls)];

/// Diseases carry Disease Ontology identifiers.
pub const DISEASE_XREFS: [XrefRule; 2] = [
    XrefRule::new(XrefKey::Identifier, "UMLS_CUI", AltIdNamespace::Umls),
    XrefRule::new(XrefKey::Identifier, "MESH", AltIdNamespace::Mesh),
];

/// Genes are numeric in the export, everything else is text.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum HetioIdentifier {
    Number(i64),
    Text(String),
}

impl fmt::Display for HetioIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HetioIdentifier::Number(n) => write!(f, "{}", n),
            HetioIdentifier::Text(s) => f.write_str(s),
        }
    }
}

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct HetioData {
    #[serde_as(as = "OneOrMany<_>")]
    #[serde(default)]
    pub source: Vec<String>,
    #[serde_as(as = "OneOrMany<_>")]
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl HetioData {
    /// `source` when given, `sources` otherwise.
    fn provenance(&self) -> Vec<String> {
        if self.source.is_empty() {
            self.sources.clone()
        } else {
            self.source.clone()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct HetioNode {
    pub kind: String,
    pub identifier: HetioIdentifier,
    pub name: String,
    #[serde(default)]
    pub data: HetioData,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct HetioEdge {
    pub source_id: (String, HetioIdentifier),
    pub target_id: (String, HetioIdentifier),
    pub kind: String,
    pub direction: String,
    #[serde(default)]
    pub data: HetioData,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct HetioDocument {
    pub nodes: Vec<HetioNode>,
    pub edges: Vec<HetioEdge>,
}

impl HetioDocument {
    /// Plain, gzip or bzip2-compressed JSON export.
    pub fn from_path(input: &path::Path) -> Result<Self> {
        info!("loading heterogeneous network from {}", input.display());
        let document: HetioDocument = serde_json::from_reader(open_input(input)?)?;
        info!("{} nodes, {} edges", document.nodes.len(), document.edges.len());
        Ok(document)
    }
}

pub fn build_entities(document: &HetioDocument) -> Result<EntityStore> {
    let mut store = EntityStore::with_capacity(document.nodes.len());
    for node in document.nodes.iter() {
        let kind: EntityKind = node.kind.parse()?;
        let entity = Entity::new(node.identifier.to_string(), node.name.clone(), kind, node.data.provenance())
            .with_license(node.data.license.clone())
            .with_source_url(node.data.url.clone());
        store.insert(entity);
    }
    info!("built {} entities", store.len());
    Ok(store)
}

/// One relation per `forward` edge, two per `both` edge. Edges whose endpoints are not in
/// `store` are skipped and counted; an unknown direction aborts.
pub fn build_relations(document: &HetioDocument, store: &EntityStore) -> Result<(RelationSet, ExtractReport)> {
    let index = store.identifier_index();
    let mut relations = RelationSet::new();
    let mut report = ExtractReport::default();

    for (row, edge) in document.edges.iter().enumerate() {
        report.rows += 1;
        if row > 0 && row % PROGRESS_INTERVAL == 0 {
            info!("processed {} edges", row);
        }
        let direction: Direction = edge.direction.parse()?;
        let lookup = |(kind, id): &(String, HetioIdentifier)| -> Result<_> {
            let kind: EntityKind = kind.parse()?;
            index.get(&(kind, id.to_string())).copied().ok_or_else(|| HetnetError::UnresolvableRow {
                dataset: DATASET,
                row,
                reason: format!("no {} node {}", kind, id),
            })
        };
        let endpoints = lookup(&edge.source_id).and_then(|s| lookup(&edge.target_id).map(|t| (s, t)));
        let (source, destination) = match endpoints {
            Ok(endpoints) => endpoints,
            Err(e) if e.is_row_level() => {
                warn!("skipping edge: {}", e);
                report.skipped += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        relations.extend(Relation::new(source, destination, edge.kind.clone(), edge.data.provenance()).expand(direction));
    }
    report.duplicates = relations.duplicates();
    report.log("heterogeneous network edges");
    Ok((relations, report))
}

pub fn enrich_compounds<V: CrossReferenceVocabulary + ?Sized>(store: &mut EntityStore, umls: &V) -> EnrichmentReport {
    enrich(store, EntityKind::Compound, umls, &COMPOUND_XREFS)
}

pub fn enrich_diseases<V: CrossReferenceVocabulary + ?Sized>(store: &mut EntityStore, ontology: &V) -> EnrichmentReport {
    enrich(store, EntityKind::Disease, ontology, &DISEASE_XREFS)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::EntityId;
    use crate::vocab::obo::OboOntology;

    const HETNET: &str = r#"{
        "nodes": [
            {"kind": "Compound", "identifier": "DB01", "name": "Aspirin",
             "data": {"source": "DrugBank", "license": "CC BY-NC 4.0", "url": "http://www.drugbank.ca/drugs/DB01"}},
            {"kind": "Disease", "identifier": "D01", "name": "Headache", "data": {"source": "Disease Ontology"}},
            {"kind": "Gene", "identifier": 5742, "name": "PTGS1", "data": {"sources": ["Entrez Gene", "HGNC"]}}
        ],
        "edges": [
            {"source_id": ["Compound", "DB01"], "target_id": ["Disease", "D01"], "kind": "treats", "direction": "both",
             "data": {"source": "PharmacotherapyDB"}},
            {"source_id": ["Compound", "DB01"], "target_id": ["Gene", 5742], "kind": "binds", "direction": "forward", "data": {}},
            {"source_id": ["Compound", "DB99"], "target_id": ["Gene", 5742], "kind": "binds", "direction": "both", "data": {}}
        ]
    }"#;

    fn document() -> HetioDocument {
        serde_json::from_str(HETNET).unwrap()
    }

    #[test]
    fn nodes_keep_provenance_and_numeric_identifiers() {
        let store = build_entities(&document()).unwrap();
        assert_eq!(store.len(), 3);
        let gene = store.get(EntityId(2)).unwrap();
        assert_eq!(gene.identifier(), "5742");
        assert_eq!(gene.sources().len(), 2);
        let aspirin = store.get(EntityId(0)).unwrap();
        assert!(aspirin.sources().contains("DrugBank"));
        assert_eq!(aspirin.license(), Some("CC BY-NC 4.0"));
    }

    #[test]
    fn both_direction_edge_adds_inverse() {
        let document = document();
        let store = build_entities(&document).unwrap();
        let (relations, report) = build_relations(&document, &store).unwrap();
        let described: Vec<String> = relations.iter().map(|r| r.describe(&store)).collect();
        assert_eq!(described, vec!["Aspirin\ttreats\tHeadache", "Headache\ttreats_inv\tAspirin", "Aspirin\tbinds\tPTGS1"]);
        assert_eq!(report, ExtractReport { rows: 3, skipped: 1, duplicates: 0 });
    }

    #[test]
    fn unknown_direction_aborts() {
        let mut document = document();
        document.edges[0].direction = "reverse".to_string();
        let store = build_entities(&document).unwrap();
        assert!(matches!(build_relations(&document, &store), Err(HetnetError::UnrecognizedEnum { .. })));
    }

    #[test]
    fn unknown_node_kind_aborts() {
        let mut document = document();
        document.nodes[0].kind = "Protein".to_string();
        assert!(matches!(build_entities(&document), Err(HetnetError::UnrecognizedEnum { .. })));
    }

    #[test]
    fn diseases_take_ontology_xrefs() {
        let document = document();
        let mut store = build_entities(&document).unwrap();
        let ontology = OboOntology::from_reader("[Term]\nid: D01\nxref: MESH:D006261\nxref: UMLS_CUI:C0018681\n".as_bytes()).unwrap();
        let report = enrich_diseases(&mut store, &ontology);
        assert_eq!(report.matched, 1);
        let headache = store.get(EntityId(1)).unwrap();
        assert_eq!(headache.alt_ids(AltIdNamespace::Mesh).collect::<Vec<_>>(), vec!["D006261"]);
        assert_eq!(headache.alt_ids(AltIdNamespace::Umls).collect::<Vec<_>>(), vec!["C0018681"]);
    }
}
