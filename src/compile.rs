//! Turn a base network plus held-out repurposing relations into line files for link prediction.

use crate::error::{HetnetError, Result};
use crate::export::{entity_label, relation_triple, write_triples, Triple};
use crate::relation::{Relation, INVERSE_SUFFIX};
use crate::resolver::Resolver;
use crate::store::{EntityId, EntityStore};
use itertools::Itertools;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::{fs, io, path};

/// Base relation kinds that would leak a held-out answer into the graph.
const LEAKING_KINDS: [&str; 2] = ["treats", "palliates"];

pub const TREATS: &str = "treats";
pub const NOT_TREATS: &str = "not_treats";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompileReport {
    pub held_out: usize,
    pub unmatched: usize,
    pub ambiguous: usize,
    pub leaking_skipped: usize,
}

#[derive(Clone, Debug, Default)]
pub struct CompiledNetwork {
    pub graph: Vec<Triple>,
    pub held_out: Vec<Triple>,
    pub report: CompileReport,
}

/// First base entity overlapping `id` of `store`, or `None` with a diagnostic.
fn map_onto_base(resolver: &Resolver, base: &EntityStore, store: &EntityStore, id: EntityId, report: &mut CompileReport) -> Result<Option<EntityId>> {
    let entity = store.get(id).ok_or(HetnetError::UnknownEntity(id.index()))?;
    let matches = resolver.find_all_matches(base, entity);
    match matches.as_slice() {
        [] => {
            debug!("{} ({}) does not exist in the base network", entity.name(), entity.identifier());
            Ok(None)
        }
        [first] => Ok(Some(*first)),
        [first, ..] => {
            warn!("{} ({}) matches {} base entities, taking the first", entity.name(), entity.identifier(), matches.len());
            report.ambiguous += 1;
            Ok(Some(*first))
        }
    }
}

/// Map every held-out relation onto base entities and emit it, then emit the base relations,
/// leaving out `treats`/`palliates` (and inverses) between pairs that are held out.
pub fn compile_network(base: &EntityStore, base_relations: &[Relation], held_store: &EntityStore, held_relations: &[Relation]) -> Result<CompiledNetwork> {
    let resolver = Resolver::indexed(base);
    let mut compiled = CompiledNetwork::default();
    let mut held_pairs: HashSet<(String, String)> = HashSet::new();

    for relation in held_relations.iter() {
        let head = map_onto_base(&resolver, base, held_store, relation.source, &mut compiled.report)?;
        let tail = map_onto_base(&resolver, base, held_store, relation.destination, &mut compiled.report)?;
        let (Some(head), Some(tail)) = (head, tail) else {
            compiled.report.unmatched += 1;
            continue;
        };
        let head = base.get(head).ok_or(HetnetError::UnknownEntity(head.index()))?;
        let tail = base.get(tail).ok_or(HetnetError::UnknownEntity(tail.index()))?;
        held_pairs.insert((head.name().to_string(), tail.name().to_string()));
        compiled.held_out.push(Triple::new(entity_label(head), relation.kind.as_str(), entity_label(tail)));
    }
    compiled.report.held_out = compiled.held_out.len();
    info!("{} held-out relations mapped, {} without a base counterpart", compiled.report.held_out, compiled.report.unmatched);

    for relation in base_relations.iter() {
        let triple = relation_triple(base, relation)?;
        let kind = relation.kind.strip_suffix(INVERSE_SUFFIX);
        if LEAKING_KINDS.contains(&kind.unwrap_or(relation.kind.as_str())) {
            let name = |id| base.get(id).map(|e| e.name().to_string()).unwrap_or_default();
            // an inverse runs disease to compound
            let pair = match kind {
                Some(_) => (name(relation.destination), name(relation.source)),
                None => (name(relation.source), name(relation.destination)),
            };
            if held_pairs.contains(&pair) {
                debug!("{} is held out, skipping", triple);
                compiled.report.leaking_skipped += 1;
                continue;
            }
        }
        compiled.graph.push(triple);
    }
    info!("{} base relations kept, {} held-out pairs removed", compiled.graph.len(), compiled.report.leaking_skipped);
    Ok(compiled)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplitConfig {
    pub dev_fraction: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        SplitConfig { dev_fraction: 0.4, seed: 42 }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DatasetSplit {
    pub graph: Vec<Triple>,
    pub train: Vec<Triple>,
    pub dev: Vec<Triple>,
    pub test: Vec<Triple>,
    pub entity_vocab: BTreeMap<String, usize>,
    pub relation_vocab: BTreeMap<String, usize>,
}

fn vocabulary<'a>(names: impl Iterator<Item = &'a str>) -> BTreeMap<String, usize> {
    names.collect::<BTreeSet<_>>().into_iter().enumerate().map(|(idx, name)| (name.to_string(), idx)).collect()
}

/// Deduplicate, build vocabularies, and split held-out `treats`/`not_treats` lines into dev and
/// test with the same fraction for both labels.
pub fn split(graph: Vec<Triple>, held_out: Vec<Triple>, config: SplitConfig) -> DatasetSplit {
    let graph: Vec<Triple> = graph.into_iter().unique().collect();
    let held_out: Vec<Triple> = held_out.into_iter().unique().collect();

    let all = || graph.iter().chain(held_out.iter());
    let entity_vocab = vocabulary(all().flat_map(|t| [t.head.as_str(), t.tail.as_str()]));
    let relation_vocab = vocabulary(all().map(|t| t.relation.as_str()));

    let train: Vec<Triple> = graph.iter().filter(|t| t.relation == TREATS).cloned().collect();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let (mut dev, mut test) = (vec![], vec![]);
    for label in [TREATS, NOT_TREATS] {
        let mut labelled: Vec<Triple> = held_out.iter().filter(|t| t.relation == label).cloned().collect();
        labelled.shuffle(&mut rng);
        let dev_count = (config.dev_fraction * labelled.len() as f64).floor() as usize;
        let rest = labelled.split_off(dev_count);
        dev.extend(labelled);
        test.extend(rest);
    }
    info!("split: {} graph, {} train, {} dev, {} test", graph.len(), train.len(), dev.len(), test.len());

    DatasetSplit {
        graph,
        train,
        dev,
        test,
        entity_vocab,
        relation_vocab,
    }
}

pub fn write_split(dir: &path::Path, split: &DatasetSplit) -> Result<()> {
    fs::create_dir_all(dir)?;
    write_triples(&dir.join("graph.txt"), &split.graph)?;
    write_triples(&dir.join("train.txt"), &split.train)?;
    write_triples(&dir.join("dev.txt"), &split.dev)?;
    write_triples(&dir.join("test.txt"), &split.test)?;
    serde_json::to_writer(io::BufWriter::new(fs::File::create(dir.join("entity_vocab.json"))?), &split.entity_vocab)?;
    serde_json::to_writer(io::BufWriter::new(fs::File::create(dir.join("relation_vocab.json"))?), &split.relation_vocab)?;
    info!("wrote split to {}", dir.display());
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entity::{AltIdNamespace, Entity, EntityKind};
    use crate::relation::Direction;

    fn base() -> (EntityStore, Vec<Relation>) {
        let store: EntityStore = vec![
            Entity::new("DB00945", "Aspirin", EntityKind::Compound, "het.io"),
            Entity::new("DOID:0060001", "headache", EntityKind::Disease, "het.io"),
            Entity::new("DOID:8398", "osteoarthritis", EntityKind::Disease, "het.io"),
        ]
        .into_iter()
        .map(|mut e| {
            if e.identifier() == "DOID:0060001" {
                e.extend_alt_ids(AltIdNamespace::Umls, ["C0018681"]);
            }
            e
        })
        .collect();
        let mut relations = Relation::new(EntityId(0), EntityId(1), "treats", "het.io").expand(Direction::Both);
        relations.extend(Relation::new(EntityId(0), EntityId(2), "palliates", "het.io").expand(Direction::Both));
        (store, relations)
    }

    fn held_out() -> (EntityStore, Vec<Relation>) {
        let store: EntityStore = vec![
            Entity::new("DB00945", "Aspirin", EntityKind::Compound, "RepoDB"),
            Entity::new("C0018681", "Headache", EntityKind::Disease, "RepoDB"),
            Entity::new("C0015967", "Fever", EntityKind::Disease, "RepoDB"),
        ]
        .into_iter()
        .collect();
        let relations = vec![
            Relation::new(EntityId(0), EntityId(1), "treats", "RepoDB"),
            Relation::new(EntityId(0), EntityId(2), "not_treats", "RepoDB"),
        ];
        (store, relations)
    }

    #[test]
    fn held_out_pairs_are_removed_from_the_graph() {
        let (base, base_relations) = base();
        let (held, held_relations) = held_out();
        let compiled = compile_network(&base, &base_relations, &held, &held_relations).unwrap();

        assert_eq!(compiled.held_out, vec![Triple::new("Aspirin:Compound", "treats", "headache:Disease")]);
        assert_eq!(compiled.report.unmatched, 1);
        assert_eq!(compiled.report.leaking_skipped, 2);
        assert_eq!(
            compiled.graph.iter().map(|t| t.to_string()).collect::<Vec<_>>(),
            vec!["Aspirin:Compound\tpalliates\tosteoarthritis:Disease", "osteoarthritis:Disease\tpalliates_inv\tAspirin:Compound"]
        );
    }

    fn triples(relation: &str, n: usize) -> Vec<Triple> {
        (0..n).map(|i| Triple::new(format!("drug{}:Compound", i), relation, "headache:Disease")).collect()
    }

    #[test]
    fn split_is_proportional_and_seeded() {
        let mut graph = triples(TREATS, 3);
        graph.extend(triples("binds", 2));
        graph.push(graph[0].clone());
        let mut held_out = triples(TREATS, 10);
        held_out.extend(triples(NOT_TREATS, 5));

        let first = split(graph.clone(), held_out.clone(), SplitConfig::default());
        assert_eq!(first.graph.len(), 5);
        assert_eq!(first.train.len(), 3);
        assert_eq!(first.dev.iter().filter(|t| t.relation == TREATS).count(), 4);
        assert_eq!(first.dev.iter().filter(|t| t.relation == NOT_TREATS).count(), 2);
        assert_eq!(first.dev.len() + first.test.len(), 15);
        assert_eq!(first.relation_vocab.len(), 3);
        assert_eq!(first.entity_vocab.len(), 11);

        let second = split(graph, held_out, SplitConfig::default());
        assert_eq!(first, second);
    }

    #[test]
    fn split_files_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let split = split(triples(TREATS, 2), triples(NOT_TREATS, 3), SplitConfig::default());
        write_split(dir.path(), &split).unwrap();
        let vocab: BTreeMap<String, usize> = serde_json::from_reader(fs::File::open(dir.path().join("relation_vocab.json")).unwrap()).unwrap();
        assert_eq!(vocab, BTreeMap::from([("not_treats".to_string(), 0), ("treats".to_string(), 1)]));
        assert!(dir.path().join("test.txt").exists());
    }
}
