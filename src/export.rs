use crate::entity::Entity;
use crate::error::{HetnetError, Result};
use crate::relation::Relation;
use crate::store::{EntityId, EntityStore};
use log::info;
use std::fmt;
use std::io::{BufRead, Write};
use std::str::FromStr;
use std::{fs, io, path};

/// One line of the relation file: `"{head}\t{relation}\t{tail}"`, where head and tail
/// are `name:kind` labels.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Triple {
    pub head: String,
    pub relation: String,
    pub tail: String,
}

impl Triple {
    pub fn new(head: impl Into<String>, relation: impl Into<String>, tail: impl Into<String>) -> Self {
        Triple {
            head: head.into(),
            relation: relation.into(),
            tail: tail.into(),
        }
    }

    pub fn parse(line: &str, index: usize) -> Result<Self> {
        let mut parts = line.trim_end_matches(['\n', '\r']).splitn(3, '\t');
        let mut next = |field| {
            parts.next().map(str::to_string).ok_or_else(|| HetnetError::MalformedRecord {
                context: "relation file".to_string(),
                index,
                field,
            })
        };
        Ok(Triple {
            head: next("head")?,
            relation: next("relation")?,
            tail: next("tail")?,
        })
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.head, self.relation, self.tail)
    }
}

impl FromStr for Triple {
    type Err = HetnetError;

    fn from_str(s: &str) -> Result<Self> {
        Triple::parse(s, 0)
    }
}

pub fn entity_label(entity: &Entity) -> String {
    format!("{}:{}", entity.name(), entity.kind())
}

pub fn relation_triple(store: &EntityStore, relation: &Relation) -> Result<Triple> {
    let label = |id: EntityId| store.get(id).map(entity_label).ok_or(HetnetError::UnknownEntity(id.index()));
    Ok(Triple::new(label(relation.source)?, relation.kind.as_str(), label(relation.destination)?))
}

pub fn relation_triples(store: &EntityStore, relations: &[Relation]) -> Result<Vec<Triple>> {
    relations.iter().map(|r| relation_triple(store, r)).collect()
}

pub fn write_triples(output: &path::Path, triples: &[Triple]) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = io::BufWriter::new(fs::File::create(output)?);
    for triple in triples.iter() {
        writeln!(writer, "{}", triple)?;
    }
    writer.flush()?;
    info!("wrote {} triples to {}", triples.len(), output.display());
    Ok(())
}

pub fn read_triples(input: &path::Path) -> Result<Vec<Triple>> {
    if !input.exists() {
        return Err(HetnetError::NotFound {
            what: "relation file",
            path: input.to_path_buf(),
        });
    }
    let reader = io::BufReader::new(fs::File::open(input)?);
    let mut triples = vec![];
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        triples.push(Triple::parse(&line, index)?);
    }
    Ok(triples)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entity::EntityKind;

    #[test]
    fn line_format_uses_name_and_kind_labels() {
        let store: EntityStore = vec![
            Entity::new("DB01", "Aspirin", EntityKind::Compound, "het.io"),
            Entity::new("GO:0006954", "inflammatory response", EntityKind::BiologicalProcess, "het.io"),
        ]
        .into_iter()
        .collect();
        let triple = relation_triple(&store, &Relation::new(EntityId(0), EntityId(1), "participates", "het.io")).unwrap();
        assert_eq!(triple.to_string(), "Aspirin:Compound\tparticipates\tinflammatory response:Biological Process");
        assert_eq!(triple.to_string().parse::<Triple>().unwrap(), triple);
    }

    #[test]
    fn short_line_is_malformed() {
        let err = Triple::parse("Aspirin:Compound\ttreats", 7).unwrap_err();
        assert!(matches!(err, HetnetError::MalformedRecord { index: 7, field: "tail", .. }));
    }

    #[test]
    fn files_keep_line_order() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out").join("graph.txt");
        let triples = vec![
            Triple::new("Aspirin:Compound", "treats", "Headache:Disease"),
            Triple::new("Headache:Disease", "treats_inv", "Aspirin:Compound"),
        ];
        write_triples(&output, &triples).unwrap();
        assert_eq!(read_triples(&output).unwrap(), triples);
    }
}
