use crate::config::{PipelineConfig, StageConfig};
use crate::entity::{Entity, EntityRecord};
use crate::error::{HetnetError, Result};
use crate::relation::{Relation, RelationRecord, RelationSet};
use crate::store::EntityStore;
use log::{debug, info, warn};
use serde_derive::{Deserialize, Serialize};
use std::{fs, io, path};

/// Relations read back from a checkpoint together with the ones that could not be resolved.
#[derive(Debug, Default)]
pub struct RelationLoad {
    pub relations: RelationSet,
    pub skipped: Vec<HetnetError>,
}

fn open(what: &'static str, checkpoint_path: &path::Path) -> Result<io::BufReader<fs::File>> {
    if !checkpoint_path.exists() {
        return Err(HetnetError::NotFound {
            what,
            path: checkpoint_path.to_path_buf(),
        });
    }
    Ok(io::BufReader::new(fs::File::open(checkpoint_path)?))
}

/// Serialize into a sibling temporary file and rename it over `checkpoint_path`.
fn write_json<T: serde::Serialize + ?Sized>(checkpoint_path: &path::Path, value: &T) -> Result<()> {
    if let Some(parent) = checkpoint_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = checkpoint_path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = path::PathBuf::from(tmp);
    {
        let mut writer = io::BufWriter::new(fs::File::create(&tmp)?);
        serde_json::to_writer(&mut writer, value)?;
        io::Write::flush(&mut writer)?;
    }
    fs::rename(&tmp, checkpoint_path)?;
    Ok(())
}

fn records_to_store(records: Vec<EntityRecord>, checkpoint_path: &path::Path) -> Result<EntityStore> {
    let context = checkpoint_path.display().to_string();
    records.into_iter().enumerate().map(|(idx, record)| record.into_entity(&context, idx)).collect()
}

fn resolve_records(records: Vec<RelationRecord>, store: &EntityStore) -> Result<RelationLoad> {
    let index = store.natural_key_index();
    let mut load = RelationLoad::default();
    for record in records {
        match record.resolve(&index) {
            Ok(relation) => {
                load.relations.insert(relation);
            }
            Err(e) if e.is_row_level() => {
                warn!("skipping relation: {}", e);
                load.skipped.push(e);
            }
            Err(e) => return Err(e),
        }
    }
    if !load.skipped.is_empty() {
        warn!("{} relations could not be resolved against {} entities", load.skipped.len(), store.len());
    }
    Ok(load)
}

pub fn write_entities(checkpoint_path: &path::Path, store: &EntityStore) -> Result<()> {
    write_json(checkpoint_path, store.entities())?;
    info!("wrote {} entities to {}", store.len(), checkpoint_path.display());
    Ok(())
}

pub fn read_entities(checkpoint_path: &path::Path) -> Result<EntityStore> {
    let records: Vec<EntityRecord> = serde_json::from_reader(open("entity checkpoint", checkpoint_path)?)?;
    let store = records_to_store(records, checkpoint_path)?;
    info!("read {} entities from {}", store.len(), checkpoint_path.display());
    Ok(store)
}

pub fn write_relations(checkpoint_path: &path::Path, relations: &[Relation], store: &EntityStore) -> Result<()> {
    let records = relations.iter().map(|r| r.to_record(store)).collect::<Result<Vec<_>>>()?;
    write_json(checkpoint_path, &records)?;
    info!("wrote {} relations to {}", records.len(), checkpoint_path.display());
    Ok(())
}

/// Read a relation checkpoint, resolving each endpoint by natural key against `store`.
///
/// A relation whose key matches zero or several entities is skipped and reported in
/// [`RelationLoad::skipped`]; the rest of the batch still loads.
pub fn read_relations(checkpoint_path: &path::Path, store: &EntityStore) -> Result<RelationLoad> {
    let records: Vec<RelationRecord> = serde_json::from_reader(open("relation checkpoint", checkpoint_path)?)?;
    let load = resolve_records(records, store)?;
    info!("read {} relations from {}", load.relations.len(), checkpoint_path.display());
    Ok(load)
}

#[derive(Serialize)]
struct NetworkSnapshotOut<'a> {
    nodes: &'a [Entity],
    edges: Vec<RelationRecord>,
}

#[derive(Deserialize)]
struct NetworkSnapshotIn {
    nodes: Vec<EntityRecord>,
    edges: Vec<RelationRecord>,
}

pub fn write_network(checkpoint_path: &path::Path, store: &EntityStore, relations: &[Relation]) -> Result<()> {
    let snapshot = NetworkSnapshotOut {
        nodes: store.entities(),
        edges: relations.iter().map(|r| r.to_record(store)).collect::<Result<Vec<_>>>()?,
    };
    write_json(checkpoint_path, &snapshot)?;
    info!("wrote network of {} nodes and {} edges to {}", store.len(), relations.len(), checkpoint_path.display());
    Ok(())
}

pub fn read_network(checkpoint_path: &path::Path) -> Result<(EntityStore, RelationLoad)> {
    let snapshot: NetworkSnapshotIn = serde_json::from_reader(open("network checkpoint", checkpoint_path)?)?;
    let store = records_to_store(snapshot.nodes, checkpoint_path)?;
    let load = resolve_records(snapshot.edges, &store)?;
    Ok((store, load))
}

/// Entities and relations of a dataset, as checkpointed by its `nodes` and `edges` stages.
pub fn read_dataset(config: &PipelineConfig, dataset: &str) -> Result<(EntityStore, Vec<Relation>)> {
    let store = read_entities(&config.stage(dataset, "nodes").checkpoint_path)?;
    let load = read_relations(&config.stage(dataset, "edges").checkpoint_path, &store)?;
    Ok((store, load.relations.into_relations()))
}

/// Checkpoint files of one output directory, named `<dataset>_<stage>.checkpoint.json`.
#[derive(Clone, Debug)]
pub struct CheckpointStore {
    dir: path::PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<path::PathBuf>) -> Self {
        CheckpointStore { dir: dir.into() }
    }

    pub fn path_for(&self, dataset: &str, stage: &str) -> path::PathBuf {
        self.dir.join(format!("{}_{}.checkpoint.json", dataset, stage))
    }

    pub fn save_entities(&self, dataset: &str, stage: &str, store: &EntityStore) -> Result<()> {
        write_entities(&self.path_for(dataset, stage), store)
    }

    /// `None` when no checkpoint exists for the key.
    pub fn load_entities(&self, dataset: &str, stage: &str) -> Result<Option<EntityStore>> {
        match read_entities(&self.path_for(dataset, stage)) {
            Ok(store) => Ok(Some(store)),
            Err(HetnetError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Reuse the checkpoint `load` produced unless forced; a checkpoint that fails to load
/// for any reason is rebuilt.
fn reuse<T>(stage: &StageConfig, load: impl FnOnce(&path::Path) -> Result<T>) -> Option<T> {
    if stage.force_rebuild {
        info!("force rebuild of {}", stage.checkpoint_path.display());
        return None;
    }
    match load(&stage.checkpoint_path) {
        Ok(value) => {
            info!("reusing checkpoint {}", stage.checkpoint_path.display());
            Some(value)
        }
        Err(HetnetError::NotFound { .. }) => {
            debug!("no checkpoint at {}", stage.checkpoint_path.display());
            None
        }
        Err(e) => {
            warn!("checkpoint {} is unusable, rebuilding: {}", stage.checkpoint_path.display(), e);
            None
        }
    }
}

pub fn run_entity_stage<F>(stage: &StageConfig, build: F) -> Result<EntityStore>
where
    F: FnOnce() -> Result<EntityStore>,
{
    if let Some(store) = reuse(stage, read_entities) {
        return Ok(store);
    }
    let store = build()?;
    if stage.save_checkpoint {
        write_entities(&stage.checkpoint_path, &store)?;
    }
    Ok(store)
}

pub fn run_relation_stage<F>(stage: &StageConfig, store: &EntityStore, build: F) -> Result<Vec<Relation>>
where
    F: FnOnce(&EntityStore) -> Result<RelationSet>,
{
    if let Some(load) = reuse(stage, |p| read_relations(p, store)) {
        return Ok(load.relations.into_relations());
    }
    let relations = build(store)?.into_relations();
    if stage.save_checkpoint {
        write_relations(&stage.checkpoint_path, &relations, store)?;
    }
    Ok(relations)
}

pub fn run_network_stage<F>(stage: &StageConfig, build: F) -> Result<(EntityStore, Vec<Relation>)>
where
    F: FnOnce() -> Result<(EntityStore, Vec<Relation>)>,
{
    if let Some((store, load)) = reuse(stage, read_network) {
        return Ok((store, load.relations.into_relations()));
    }
    let (store, relations) = build()?;
    if stage.save_checkpoint {
        write_network(&stage.checkpoint_path, &store, &relations)?;
    }
    Ok((store, relations))
}
