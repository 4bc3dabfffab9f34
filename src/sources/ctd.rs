//! Comparative Toxicogenomics Database vocabularies and curated relations.
//!
//! Every file is a header-less CSV with `#` comment lines; the column order of each file is
//! mirrored by the positional row structs below.

use crate::entity::{AltIdNamespace, Entity, EntityKind};
use crate::error::{HetnetError, Result};
use crate::relation::{Relation, RelationSet};
use crate::resolver::Resolver;
use crate::sources::{open_input, split_multi, split_namespace, ExtractReport};
use crate::store::{EntityId, EntityStore};
use crate::vocab::{enrich, CrossReferenceVocabulary, EnrichmentReport, XrefKey, XrefRule};
use crate::PROGRESS_INTERVAL;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde_derive::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::{io, path};

pub const DATASET: &str = "ctd";
pub const PROVENANCE: &str = "CTD";

pub const THERAPEUTIC: &str = "therapeutic";
pub const MARKER_MECHANISM: &str = "marker/mechanism";
pub const TREATS: &str = "treats";
pub const CONNECTS: &str = "connects";

const CHEM_DISEASE_EVIDENCE: [&str; 2] = [THERAPEUTIC, MARKER_MECHANISM];
const GENE_DISEASE_EVIDENCE: [&str; 3] = [MARKER_MECHANISM, THERAPEUTIC, "marker/mechanism|therapeutic"];

pub const CHEMICAL_XREFS: [XrefRule; 2] = [
    XrefRule::new(XrefKey::Identifier, "MSH", AltIdNamespace::Umls),
    XrefRule::new(XrefKey::AltIds(AltIdNamespace::DrugBank), "DRUGBANK", AltIdNamespace::Umls),
];

pub const DISEASE_XREFS: [XrefRule; 1] = [XrefRule::new(XrefKey::Identifier, "MSH", AltIdNamespace::Umls)];

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChemicalRow {
    pub chemical_name: String,
    pub chemical_id: String,
    pub cas_rn: String,
    pub definition: String,
    pub parent_ids: String,
    pub tree_numbers: String,
    pub parent_tree_numbers: String,
    pub synonyms: String,
    pub drug_bank_ids: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DiseaseRow {
    pub disease_name: String,
    pub disease_id: String,
    pub alt_disease_ids: String,
    pub definition: String,
    pub parent_ids: String,
    pub tree_numbers: String,
    pub parent_tree_numbers: String,
    pub synonyms: String,
    pub slim_mappings: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GeneRow {
    pub gene_symbol: String,
    pub gene_name: String,
    pub gene_id: String,
    pub alt_gene_ids: String,
    pub synonyms: String,
    pub bio_grid_ids: String,
    pub pharm_gkb_ids: String,
    pub uni_prot_ids: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PathwayRow {
    pub pathway_name: String,
    pub pathway_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChemGeneRow {
    pub chemical_name: String,
    pub chemical_id: String,
    pub cas_rn: String,
    pub gene_symbol: String,
    pub gene_id: String,
    pub gene_forms: String,
    pub organism: String,
    pub organism_id: String,
    pub interaction: String,
    pub interaction_actions: String,
    pub pub_med_ids: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChemDiseaseRow {
    pub chemical_name: String,
    pub chemical_id: String,
    pub cas_rn: String,
    pub disease_name: String,
    pub disease_id: String,
    pub direct_evidence: String,
    pub inference_gene_symbol: String,
    pub inference_score: String,
    pub omim_ids: String,
    pub pub_med_ids: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GeneDiseaseRow {
    pub gene_symbol: String,
    pub gene_id: String,
    pub disease_name: String,
    pub disease_id: String,
    pub direct_evidence: String,
    pub inference_chemical_name: String,
    pub inference_score: String,
    pub omim_ids: String,
    pub pub_med_ids: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GenePathwayRow {
    pub gene_symbol: String,
    pub gene_id: String,
    pub pathway_name: String,
    pub pathway_id: String,
}

pub fn rows_from_reader<T, R>(reader: R) -> impl Iterator<Item = Result<T>>
where
    T: DeserializeOwned,
    R: io::Read,
{
    csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .from_reader(reader)
        .into_deserialize()
        .map(|r| r.map_err(HetnetError::from))
}

pub fn rows<T: DeserializeOwned>(input: &path::Path) -> Result<impl Iterator<Item = Result<T>>> {
    info!("reading {}", input.display());
    Ok(rows_from_reader(open_input(input)?))
}

fn strip_mesh(id: &str) -> &str {
    id.strip_prefix("MESH:").unwrap_or(id)
}

pub fn chemical_entity(row: &ChemicalRow) -> Result<Entity> {
    let identifier = match split_namespace(&row.chemical_id) {
        Some(("MESH", id)) => id,
        _ => return Err(HetnetError::unrecognized("chemical id prefix", row.chemical_id.as_str())),
    };
    let mut entity = Entity::new(identifier, row.chemical_name.as_str(), EntityKind::Compound, PROVENANCE);
    entity.extend_alt_ids(AltIdNamespace::Mesh, [identifier]);
    entity.extend_alt_ids(AltIdNamespace::DrugBank, split_multi(&row.drug_bank_ids));
    Ok(entity)
}

pub fn disease_entity(row: &DiseaseRow) -> Result<Entity> {
    let (namespace, identifier) = match split_namespace(&row.disease_id) {
        Some(("MESH", id)) => (AltIdNamespace::Mesh, id),
        Some(("OMIM", id)) => (AltIdNamespace::Omim, id),
        _ => return Err(HetnetError::unrecognized("disease id prefix", row.disease_id.as_str())),
    };
    let mut entity = Entity::new(identifier, row.disease_name.as_str(), EntityKind::Disease, PROVENANCE);
    entity.extend_alt_ids(namespace, [identifier]);
    Ok(entity)
}

pub fn gene_entity(row: &GeneRow) -> Result<Entity> {
    let mut entity = Entity::new(row.gene_id.as_str(), row.gene_symbol.as_str(), EntityKind::Gene, PROVENANCE);
    entity.extend_alt_ids(AltIdNamespace::Ncbi, [row.gene_id.as_str()]);
    Ok(entity)
}

/// Pathways keep their prefixed id (`REACT:R-HSA-...`, `KEGG:hsa...`) as identifier.
pub fn pathway_entity(row: &PathwayRow) -> Result<Entity> {
    let (namespace, id) = match split_namespace(&row.pathway_id) {
        Some(("REACT", id)) => (AltIdNamespace::Reactome, id),
        Some(("KEGG", id)) => (AltIdNamespace::Kegg, id),
        _ => return Err(HetnetError::unrecognized("pathway id prefix", row.pathway_id.as_str())),
    };
    let mut entity = Entity::new(row.pathway_id.as_str(), row.pathway_name.as_str(), EntityKind::Pathway, PROVENANCE);
    entity.extend_alt_ids(namespace, [id]);
    Ok(entity)
}

/// Convert vocabulary rows and resolve them into one store; repeated concepts merge.
pub fn build_entities<T, I, F>(rows: I, convert: F) -> Result<(EntityStore, ExtractReport)>
where
    I: IntoIterator<Item = Result<T>>,
    F: Fn(&T) -> Result<Entity>,
{
    let mut store = EntityStore::new();
    let mut resolver = Resolver::indexed(&store);
    let mut report = ExtractReport::default();
    for row in rows {
        let entity = convert(&row?)?;
        report.rows += 1;
        if report.rows % PROGRESS_INTERVAL == 0 {
            info!("resolved {} vocabulary rows", report.rows);
        }
        resolver.resolve(&mut store, entity);
    }
    report.duplicates = resolver.report().merged;
    Ok((store, report))
}

pub fn enrich_chemicals<V: CrossReferenceVocabulary + ?Sized>(store: &mut EntityStore, umls: &V) -> EnrichmentReport {
    enrich(store, EntityKind::Compound, umls, &CHEMICAL_XREFS)
}

pub fn enrich_diseases<V: CrossReferenceVocabulary + ?Sized>(store: &mut EntityStore, umls: &V) -> EnrichmentReport {
    enrich(store, EntityKind::Disease, umls, &DISEASE_XREFS)
}

/// `(kind, name, identifier)` lookup used by the relation files, which name both endpoints.
///
/// Rows naming a vocabulary entry that merged into another entity fall back to the code
/// alone, matched against identifiers and the vocabulary namespaces of each entity's alt-ids.
#[derive(Clone, Debug, Default)]
pub struct NameIndex {
    ids: HashMap<(EntityKind, String, String), EntityId>,
    codes: HashMap<(EntityKind, String), EntityId>,
}

const CODE_NAMESPACES: [AltIdNamespace; 5] =
    [AltIdNamespace::Mesh, AltIdNamespace::Omim, AltIdNamespace::Ncbi, AltIdNamespace::Reactome, AltIdNamespace::Kegg];

impl NameIndex {
    pub fn build(store: &EntityStore) -> Self {
        let mut ids = HashMap::with_capacity(store.len());
        let mut codes = HashMap::with_capacity(store.len());
        for (id, entity) in store.iter() {
            ids.entry((entity.kind(), entity.name().to_string(), entity.identifier().to_string())).or_insert(id);
            codes.entry((entity.kind(), entity.identifier().to_string())).or_insert(id);
            for namespace in CODE_NAMESPACES {
                for code in entity.alt_ids(namespace) {
                    codes.entry((entity.kind(), code.to_string())).or_insert(id);
                }
            }
        }
        NameIndex { ids, codes }
    }

    fn find(&self, kind: EntityKind, name: &str, identifier: &str, row: usize) -> Result<EntityId> {
        if let Some(id) = self.ids.get(&(kind, name.to_string(), identifier.to_string())) {
            return Ok(*id);
        }
        let code = split_namespace(identifier).map_or(identifier, |(_, code)| code);
        let alias = self.codes.get(&(kind, identifier.to_string())).or_else(|| self.codes.get(&(kind, code.to_string())));
        match alias {
            Some(id) => {
                debug!("row {}: {} {} ({}) resolved to {} by code", row, kind, name, identifier, id);
                Ok(*id)
            }
            None => Err(HetnetError::UnresolvableRow {
                dataset: DATASET,
                row,
                reason: format!("no {} {} ({})", kind, name, identifier),
            }),
        }
    }
}

/// Shared driver of the four relation files: `emit` turns one row into zero or more relations.
fn build_relations<T, I, F>(what: &str, rows: I, mut emit: F) -> Result<(RelationSet, ExtractReport)>
where
    I: IntoIterator<Item = Result<T>>,
    F: FnMut(usize, T) -> Result<Vec<Relation>>,
{
    let mut relations = RelationSet::new();
    let mut report = ExtractReport::default();
    for (row, record) in rows.into_iter().enumerate() {
        report.rows += 1;
        if row > 0 && row % PROGRESS_INTERVAL == 0 {
            info!("{}: processed {} rows", what, row);
        }
        match emit(row, record?) {
            Ok(emitted) => relations.extend(emitted),
            Err(e) if e.is_row_level() => {
                warn!("skipping {} row: {}", what, e);
                report.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }
    report.duplicates = relations.duplicates();
    report.log(what);
    Ok((relations, report))
}

/// One relation per distinct interaction action of a row.
pub fn chem_gene_relations<I>(rows: I, index: &NameIndex) -> Result<(RelationSet, ExtractReport)>
where
    I: IntoIterator<Item = Result<ChemGeneRow>>,
{
    build_relations("chemical-gene", rows, |row, r| {
        let chemical = index.find(EntityKind::Compound, &r.chemical_name, strip_mesh(&r.chemical_id), row)?;
        let gene = index.find(EntityKind::Gene, &r.gene_symbol, &r.gene_id, row)?;
        let actions: BTreeSet<&str> = split_multi(&r.interaction_actions).collect();
        Ok(actions.into_iter().map(|action| Relation::new(chemical, gene, action, PROVENANCE)).collect())
    })
}

/// Curated chemical-disease rows only; `therapeutic` becomes `treats`.
pub fn chem_disease_relations<I>(rows: I, index: &NameIndex) -> Result<(RelationSet, ExtractReport)>
where
    I: IntoIterator<Item = Result<ChemDiseaseRow>>,
{
    build_relations("chemical-disease", rows, |row, r| {
        if !CHEM_DISEASE_EVIDENCE.contains(&r.direct_evidence.as_str()) {
            return Ok(vec![]);
        }
        let chemical = index.find(EntityKind::Compound, &r.chemical_name, strip_mesh(&r.chemical_id), row)?;
        let disease_id = split_namespace(&r.disease_id).map_or(r.disease_id.as_str(), |(_, id)| id);
        let disease = index.find(EntityKind::Disease, &r.disease_name, disease_id, row)?;
        let kind = if r.direct_evidence == THERAPEUTIC { TREATS } else { r.direct_evidence.as_str() };
        Ok(vec![Relation::new(chemical, disease, kind, PROVENANCE)])
    })
}

pub fn gene_disease_relations<I>(rows: I, index: &NameIndex) -> Result<(RelationSet, ExtractReport)>
where
    I: IntoIterator<Item = Result<GeneDiseaseRow>>,
{
    build_relations("gene-disease", rows, |row, r| {
        if !GENE_DISEASE_EVIDENCE.contains(&r.direct_evidence.as_str()) {
            return Ok(vec![]);
        }
        let gene = index.find(EntityKind::Gene, &r.gene_symbol, &r.gene_id, row)?;
        let disease_id = split_namespace(&r.disease_id).map_or(r.disease_id.as_str(), |(_, id)| id);
        let disease = index.find(EntityKind::Disease, &r.disease_name, disease_id, row)?;
        Ok(vec![Relation::new(gene, disease, r.direct_evidence.as_str(), PROVENANCE)])
    })
}

pub fn gene_pathway_relations<I>(rows: I, index: &NameIndex) -> Result<(RelationSet, ExtractReport)>
where
    I: IntoIterator<Item = Result<GenePathwayRow>>,
{
    build_relations("gene-pathway", rows, |row, r| {
        let gene = index.find(EntityKind::Gene, &r.gene_symbol, &r.gene_id, row)?;
        let pathway = index.find(EntityKind::Pathway, &r.pathway_name, &r.pathway_id, row)?;
        Ok(vec![Relation::new(gene, pathway, CONNECTS, PROVENANCE)])
    })
}
