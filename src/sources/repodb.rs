use crate::entity::{Entity, EntityKind, NaturalKey};
use crate::error::{HetnetError, Result};
use crate::relation::{Direction, Relation, RelationSet};
use crate::sources::ExtractReport;
use crate::store::{EntityId, EntityStore};
use log::{info, warn};
use polars::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path;

pub const DATASET: &str = "repodb";
pub const PROVENANCE: &str = "RepoDB";

pub const APPROVED: &str = "Approved";
pub const TREATS: &str = "treats";
pub const NOT_TREATS: &str = "not_treats";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RepoDbRow {
    pub drug_name: String,
    pub drug_id: String,
    pub ind_name: String,
    pub ind_id: String,
    pub status: String,
}

impl RepoDbRow {
    pub fn new(drug_name: &str, drug_id: &str, ind_name: &str, ind_id: &str, status: &str) -> Self {
        RepoDbRow {
            drug_name: drug_name.to_string(),
            drug_id: drug_id.to_string(),
            ind_name: ind_name.to_string(),
            ind_id: ind_id.to_string(),
            status: status.to_string(),
        }
    }

    /// Trial status collapsed to a binary outcome.
    pub fn relation_kind(&self) -> &'static str {
        if self.status == APPROVED {
            TREATS
        } else {
            NOT_TREATS
        }
    }
}

/// Read the outcomes table (comma separated, with header) through polars.
pub fn read_rows(input: &path::Path) -> Result<Vec<RepoDbRow>> {
    if !input.exists() {
        return Err(HetnetError::NotFound {
            what: "RepoDB table",
            path: input.to_path_buf(),
        });
    }
    let df = LazyCsvReader::new(input.to_path_buf())
        .with_infer_schema_length(Some(0))
        .with_truncate_ragged_lines(true)
        .with_has_header(true)
        .finish()?
        .select([col("drug_name"), col("drug_id"), col("ind_name"), col("ind_id"), col("status")])
        .collect()?;
    info!("read {} RepoDB rows from {}", df.height(), input.display());

    let context = input.display().to_string();
    let drug_names = df.column("drug_name")?.str()?;
    let drug_ids = df.column("drug_id")?.str()?;
    let ind_names = df.column("ind_name")?.str()?;
    let ind_ids = df.column("ind_id")?.str()?;
    let statuses = df.column("status")?.str()?;

    let mut rows = Vec::with_capacity(df.height());
    for index in 0..df.height() {
        let field = |values: &StringChunked, name: &'static str| -> Result<String> {
            values.get(index).map(str::to_string).ok_or_else(|| HetnetError::MalformedRecord {
                context: context.clone(),
                index,
                field: name,
            })
        };
        rows.push(RepoDbRow {
            drug_name: field(drug_names, "drug_name")?,
            drug_id: field(drug_ids, "drug_id")?,
            ind_name: field(ind_names, "ind_name")?,
            ind_id: field(ind_ids, "ind_id")?,
            // a missing status is simply not an approval
            status: statuses.get(index).unwrap_or_default().to_string(),
        });
    }
    Ok(rows)
}

/// One compound per distinct `(drug id, drug name)` pair, then one disease per distinct
/// `(indication id, indication name)` pair. An id spelled with several names yields several
/// entities.
pub fn build_entities(rows: &[RepoDbRow]) -> EntityStore {
    let mut store = EntityStore::new();
    let mut add = |kind: EntityKind, pairs: Vec<(&str, &str)>| {
        let mut seen: HashSet<(&str, &str)> = HashSet::new();
        let mut names: HashMap<&str, &str> = HashMap::new();
        for (id, name) in pairs {
            if !seen.insert((id, name)) {
                continue;
            }
            match names.get(id) {
                Some(first) => warn!("{} {} is named both {:?} and {:?}", kind, id, first, name),
                None => {
                    names.insert(id, name);
                }
            }
            store.insert(Entity::new(id, name, kind, PROVENANCE));
        }
    };
    add(EntityKind::Compound, rows.iter().map(|r| (r.drug_id.as_str(), r.drug_name.as_str())).collect());
    add(EntityKind::Disease, rows.iter().map(|r| (r.ind_id.as_str(), r.ind_name.as_str())).collect());
    info!("built {} RepoDB entities", store.len());
    store
}

/// One `treats`/`not_treats` relation per row, plus its inverse when `include_inverse` is set.
/// Endpoints resolve by `(id, name, kind)`.
pub fn build_relations(rows: &[RepoDbRow], store: &EntityStore, include_inverse: bool) -> Result<(RelationSet, ExtractReport)> {
    let index = store.natural_key_index();
    let find = |identifier: &str, name: &str, kind: EntityKind| -> Option<EntityId> {
        let key = NaturalKey {
            identifier: identifier.to_string(),
            name: name.to_string(),
            kind,
        };
        match index.get(&key).map(Vec::as_slice) {
            Some([id]) => Some(*id),
            _ => None,
        }
    };
    let direction = if include_inverse { Direction::Both } else { Direction::Forward };
    let mut relations = RelationSet::new();
    let mut report = ExtractReport::default();

    for (row, r) in rows.iter().enumerate() {
        report.rows += 1;
        let drug = find(&r.drug_id, &r.drug_name, EntityKind::Compound);
        let disease = find(&r.ind_id, &r.ind_name, EntityKind::Disease);
        let (Some(drug), Some(disease)) = (drug, disease) else {
            let e = HetnetError::UnresolvableRow {
                dataset: DATASET,
                row,
                reason: format!("{} -> {} not among the built entities", r.drug_id, r.ind_id),
            };
            warn!("skipping row: {}", e);
            report.skipped += 1;
            continue;
        };
        relations.extend(Relation::new(drug, disease, r.relation_kind(), PROVENANCE).expand(direction));
    }
    report.duplicates = relations.duplicates();
    report.log("RepoDB relations");
    Ok((relations, report))
}

#[cfg(test)]
mod test {
    use super::*;
    use itertools::Itertools;
    use std::fs;

    fn rows() -> Vec<RepoDbRow> {
        vec![
            RepoDbRow::new("Aspirin", "DB00945", "Headache", "C0018681", "Approved"),
            RepoDbRow::new("Aspirin", "DB00945", "Fever", "C0015967", "Terminated"),
            RepoDbRow::new("Caffeine", "DB00201", "Headache", "C0018681", "Withdrawn"),
            RepoDbRow::new("Caffeine", "DB00201", "Headache", "C0018681", "Suspended"),
        ]
    }

    #[test]
    fn one_entity_per_distinct_id_and_name() {
        let store = build_entities(&rows());
        assert_eq!(store.len(), 4);
        assert_eq!(store.count_of_kind(EntityKind::Compound), 2);
        assert_eq!(store.get(EntityId(2)).map(Entity::name), Some("Headache"));
    }

    #[test]
    fn id_spelled_two_ways_keeps_both_names() {
        let rows = vec![
            RepoDbRow::new("Aspirin", "DB00945", "Headache", "C0018681", "Approved"),
            RepoDbRow::new("Acetylsalicylic acid", "DB00945", "Fever", "C0015967", "Approved"),
        ];
        let store = build_entities(&rows);
        assert_eq!(store.count_of_kind(EntityKind::Compound), 2);
        assert_eq!(store.get(EntityId(1)).map(Entity::name), Some("Acetylsalicylic acid"));

        let (relations, report) = build_relations(&rows, &store, false).unwrap();
        let described = relations.iter().map(|r| r.describe(&store)).collect_vec();
        assert_eq!(described, vec!["Aspirin\ttreats\tHeadache", "Acetylsalicylic acid\ttreats\tFever"]);
        assert_eq!(report.skipped, 0);
    }

    #[test]
    fn status_collapses_to_treats_or_not_treats() {
        let rows = rows();
        let store = build_entities(&rows);
        let (relations, report) = build_relations(&rows, &store, false).unwrap();
        let described = relations.iter().map(|r| r.describe(&store)).collect_vec();
        assert_eq!(described, vec!["Aspirin\ttreats\tHeadache", "Aspirin\tnot_treats\tFever", "Caffeine\tnot_treats\tHeadache"]);
        assert_eq!(report.duplicates, 1);
    }

    #[test]
    fn inverse_relations_are_optional() {
        let rows = rows();
        let store = build_entities(&rows);
        let (relations, _) = build_relations(&rows[..1], &store, true).unwrap();
        assert_eq!(relations.iter().map(|r| r.kind.as_str()).collect_vec(), vec!["treats", "treats_inv"]);
    }

    #[test]
    fn rows_missing_from_store_are_skipped() {
        let rows = rows();
        let store = build_entities(&rows[..1]);
        let (relations, report) = build_relations(&rows, &store, false).unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(report.skipped, 3);
    }

    #[test]
    fn table_is_read_by_header() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("repodb.csv");
        fs::write(
            &input,
            "drug_name,drug_id,ind_name,ind_id,NCT,status,phase,DetailedStatus\n\
             Aspirin,DB00945,Headache,C0018681,,Approved,,\n\
             Caffeine,DB00201,Headache,C0018681,NCT00000001,Withdrawn,Phase 2,Lack of funding\n",
        )
        .unwrap();
        let read = read_rows(&input).unwrap();
        assert_eq!(read, vec![rows()[0].clone(), rows()[2].clone()]);
    }

    #[test]
    fn missing_table_is_not_found() {
        assert!(matches!(read_rows(path::Path::new("/nonexistent/repodb.csv")), Err(HetnetError::NotFound { .. })));
    }
}
