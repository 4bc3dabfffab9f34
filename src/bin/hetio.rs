use clap::{Parser, Subcommand};
use humantime::format_duration;
use log::{debug, info};
use rusty_hetnet_io::checkpoint::{run_entity_stage, run_relation_stage};
use rusty_hetnet_io::config::PipelineConfig;
use rusty_hetnet_io::sources::hetio;
use rusty_hetnet_io::vocab::obo::{self, OboOntology};
use rusty_hetnet_io::vocab::umls::UmlsIndex;
use rusty_hetnet_io::{EntityKind, EntityStore};
use std::time::Instant;
use std::{error, path};

#[derive(Parser, PartialEq, Debug)]
#[command(author, version, about, long_about = None)]
struct Options {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, PartialEq, Debug)]
enum Commands {
    BuildNodes {
        #[arg(short = 'c', long, required = true)]
        config: path::PathBuf,

        #[arg(short = 'f', long, default_value_t = false)]
        force_rebuild: bool,
    },
    BuildEdges {
        #[arg(short = 'c', long, required = true)]
        config: path::PathBuf,

        #[arg(short = 'f', long, default_value_t = false)]
        force_rebuild: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn error::Error>> {
    let start = Instant::now();
    env_logger::init();

    let options = Options::parse();
    debug!("{:?}", options);

    match &options.command {
        Some(Commands::BuildNodes { config, force_rebuild }) => {
            let config = PipelineConfig::from_path(config)?;
            build_nodes(&config, *force_rebuild).await?;
        }
        Some(Commands::BuildEdges { config, force_rebuild }) => {
            let config = PipelineConfig::from_path(config)?;
            build_edges(&config, *force_rebuild).await?;
        }
        None => {}
    }

    info!("Duration: {}", format_duration(start.elapsed()).to_string());
    Ok(())
}

async fn build_nodes(config: &PipelineConfig, force_rebuild: bool) -> Result<EntityStore, Box<dyn error::Error>> {
    let hetio_config = config.hetio()?;
    let stage = config.stage(hetio::DATASET, "nodes").forced(force_rebuild);

    // the ontology download is async, so it happens before the stage decides whether to build
    let ontology = match &config.disease_ontology {
        Some(location) if stage.force_rebuild || !stage.checkpoint_path.exists() => Some(obo::fetch(location, &config.checkpoint_dir).await?),
        _ => None,
    };

    let store = run_entity_stage(&stage, || {
        let document = hetio::HetioDocument::from_path(&hetio_config.path)?;
        let mut store = hetio::build_entities(&document)?;
        if let Some(umls) = &config.umls {
            let umls = UmlsIndex::from_path(umls, &config.umls_sources)?;
            let report = hetio::enrich_compounds(&mut store, &umls);
            info!("compounds: {} with UMLS cross references, {} without", report.matched, report.unmatched);
        }
        if let Some(ontology) = &ontology {
            let ontology = OboOntology::from_path(ontology)?;
            let report = hetio::enrich_diseases(&mut store, &ontology);
            info!("diseases: {} with ontology cross references, {} without", report.matched, report.unmatched);
        }
        Ok(store)
    })?;

    for kind in [EntityKind::Compound, EntityKind::Disease, EntityKind::Gene] {
        info!("{}: {}", kind, store.count_of_kind(kind));
    }
    info!("het.io entities: {}", store.len());
    Ok(store)
}

async fn build_edges(config: &PipelineConfig, force_rebuild: bool) -> Result<(), Box<dyn error::Error>> {
    let hetio_config = config.hetio()?;
    let store = build_nodes(config, false).await?;
    let stage = config.stage(hetio::DATASET, "edges").forced(force_rebuild);
    let relations = run_relation_stage(&stage, &store, |store| {
        let document = hetio::HetioDocument::from_path(&hetio_config.path)?;
        let (relations, _) = hetio::build_relations(&document, store)?;
        Ok(relations)
    })?;
    info!("het.io relations: {}", relations.len());
    Ok(())
}
