use clap::{Parser, Subcommand};
use humantime::format_duration;
use log::{debug, info};
use rusty_hetnet_io::checkpoint::{run_entity_stage, run_relation_stage};
use rusty_hetnet_io::config::PipelineConfig;
use rusty_hetnet_io::sources::repodb;
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

        /// Also emit `treats_inv`/`not_treats_inv`, overriding the stage setting.
        #[arg(long, default_value_t = false)]
        include_inverse: bool,
    },
}

fn main() -> Result<(), Box<dyn error::Error>> {
    let start = Instant::now();
    env_logger::init();

    let options = Options::parse();
    debug!("{:?}", options);

    match &options.command {
        Some(Commands::BuildNodes { config, force_rebuild }) => {
            let config = PipelineConfig::from_path(config)?;
            build_nodes(&config, *force_rebuild)?;
        }
        Some(Commands::BuildEdges {
            config,
            force_rebuild,
            include_inverse,
        }) => {
            let config = PipelineConfig::from_path(config)?;
            build_edges(&config, *force_rebuild, *include_inverse)?;
        }
        None => {}
    }

    info!("Duration: {}", format_duration(start.elapsed()).to_string());
    Ok(())
}

fn build_nodes(config: &PipelineConfig, force_rebuild: bool) -> Result<EntityStore, Box<dyn error::Error>> {
    let repodb_config = config.repodb()?;
    let store = run_entity_stage(&config.stage(repodb::DATASET, "nodes").forced(force_rebuild), || {
        let rows = repodb::read_rows(&repodb_config.path)?;
        Ok(repodb::build_entities(&rows))
    })?;
    info!(
        "RepoDB entities: {} compounds, {} diseases",
        store.count_of_kind(EntityKind::Compound),
        store.count_of_kind(EntityKind::Disease)
    );
    Ok(store)
}

fn build_edges(config: &PipelineConfig, force_rebuild: bool, include_inverse: bool) -> Result<(), Box<dyn error::Error>> {
    let repodb_config = config.repodb()?;
    let store = build_nodes(config, false)?;
    let stage = config.stage(repodb::DATASET, "edges").forced(force_rebuild);
    let include_inverse = stage.include_inverse || include_inverse;
    let relations = run_relation_stage(&stage, &store, |store| {
        let rows = repodb::read_rows(&repodb_config.path)?;
        let (relations, _) = repodb::build_relations(&rows, store, include_inverse)?;
        Ok(relations)
    })?;
    info!("RepoDB relations: {}", relations.len());
    Ok(())
}
