use clap::{Parser, Subcommand};
use humantime::format_duration;
use log::{debug, info};
use rusty_hetnet_io::checkpoint::{run_entity_stage, run_relation_stage};
use rusty_hetnet_io::config::PipelineConfig;
use rusty_hetnet_io::sources::ctd::{self, NameIndex};
use rusty_hetnet_io::vocab::umls::UmlsIndex;
use rusty_hetnet_io::{EntityStore, RelationSet};
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
        Some(Commands::BuildEdges { config, force_rebuild }) => {
            let config = PipelineConfig::from_path(config)?;
            build_edges(&config, *force_rebuild)?;
        }
        None => {}
    }

    info!("Duration: {}", format_duration(start.elapsed()).to_string());
    Ok(())
}

/// Read MRCONSO at most once, and only when a stage actually rebuilds.
fn load_umls<'a>(config: &PipelineConfig, cache: &'a mut Option<UmlsIndex>) -> rusty_hetnet_io::Result<Option<&'a UmlsIndex>> {
    let Some(mrconso) = &config.umls else {
        return Ok(None);
    };
    if cache.is_none() {
        *cache = Some(UmlsIndex::from_path(mrconso, &config.umls_sources)?);
    }
    Ok(cache.as_ref())
}

fn build_nodes(config: &PipelineConfig, force_rebuild: bool) -> Result<EntityStore, Box<dyn error::Error>> {
    let ctd_config = config.ctd()?;
    let mut umls = None;

    let chemicals = run_entity_stage(&config.stage(ctd::DATASET, "chemicals").forced(force_rebuild), || {
        let (mut store, report) = ctd::build_entities(ctd::rows(&ctd_config.chemicals)?, ctd::chemical_entity)?;
        report.log("chemicals");
        if let Some(umls) = load_umls(config, &mut umls)? {
            let report = ctd::enrich_chemicals(&mut store, umls);
            info!("chemicals: {} with UMLS cross references, {} without", report.matched, report.unmatched);
        }
        Ok(store)
    })?;

    let diseases = run_entity_stage(&config.stage(ctd::DATASET, "diseases").forced(force_rebuild), || {
        let (mut store, report) = ctd::build_entities(ctd::rows(&ctd_config.diseases)?, ctd::disease_entity)?;
        report.log("diseases");
        if let Some(umls) = load_umls(config, &mut umls)? {
            let report = ctd::enrich_diseases(&mut store, umls);
            info!("diseases: {} with UMLS cross references, {} without", report.matched, report.unmatched);
        }
        Ok(store)
    })?;

    let genes = run_entity_stage(&config.stage(ctd::DATASET, "genes").forced(force_rebuild), || {
        let (store, report) = ctd::build_entities(ctd::rows(&ctd_config.genes)?, ctd::gene_entity)?;
        report.log("genes");
        Ok(store)
    })?;

    let pathways = run_entity_stage(&config.stage(ctd::DATASET, "pathways").forced(force_rebuild), || {
        let (store, report) = ctd::build_entities(ctd::rows(&ctd_config.pathways)?, ctd::pathway_entity)?;
        report.log("pathways");
        Ok(store)
    })?;

    let store = run_entity_stage(&config.stage(ctd::DATASET, "nodes").forced(force_rebuild), move || {
        let mut store = chemicals;
        for other in [diseases, genes, pathways] {
            store.append(other);
        }
        Ok(store)
    })?;
    info!("CTD entities: {}", store.len());
    Ok(store)
}

fn build_edges(config: &PipelineConfig, force_rebuild: bool) -> Result<(), Box<dyn error::Error>> {
    let ctd_config = config.ctd()?;
    let store = build_nodes(config, false)?;
    let index = NameIndex::build(&store);

    let chem_gene = run_relation_stage(&config.stage(ctd::DATASET, "chem_gene").forced(force_rebuild), &store, |_| {
        let (relations, _) = ctd::chem_gene_relations(ctd::rows(&ctd_config.chem_gene)?, &index)?;
        Ok(relations)
    })?;
    let chem_disease = run_relation_stage(&config.stage(ctd::DATASET, "chem_disease").forced(force_rebuild), &store, |_| {
        let (relations, _) = ctd::chem_disease_relations(ctd::rows(&ctd_config.chem_disease)?, &index)?;
        Ok(relations)
    })?;
    let gene_disease = run_relation_stage(&config.stage(ctd::DATASET, "gene_disease").forced(force_rebuild), &store, |_| {
        let (relations, _) = ctd::gene_disease_relations(ctd::rows(&ctd_config.gene_disease)?, &index)?;
        Ok(relations)
    })?;
    let gene_pathway = run_relation_stage(&config.stage(ctd::DATASET, "gene_pathway").forced(force_rebuild), &store, |_| {
        let (relations, _) = ctd::gene_pathway_relations(ctd::rows(&ctd_config.gene_pathway)?, &index)?;
        Ok(relations)
    })?;

    let relations = run_relation_stage(&config.stage(ctd::DATASET, "edges").forced(force_rebuild), &store, move |_| {
        Ok([chem_gene, chem_disease, gene_disease, gene_pathway].into_iter().flatten().collect::<RelationSet>())
    })?;
    info!("CTD relations: {}", relations.len());
    Ok(())
}
