use clap::Parser;
use humantime::format_duration;
use log::{debug, info};
use rusty_hetnet_io::checkpoint::{read_dataset, run_network_stage};
use rusty_hetnet_io::config::PipelineConfig;
use rusty_hetnet_io::export::{relation_triples, write_triples};
use rusty_hetnet_io::graph::{combine, HetNetwork};
use std::time::Instant;
use std::{error, path};

/// Combine the node and edge checkpoints of several datasets into one network.
#[derive(Parser, PartialEq, Debug)]
#[command(author, version, about, long_about = None)]
struct Options {
    #[arg(short = 'c', long, required = true)]
    config: path::PathBuf,

    #[arg(short = 'd', long, value_delimiter = ',', default_value = "hetio,ctd,repodb")]
    datasets: Vec<String>,

    /// Merge entities of later datasets into overlapping entities of earlier ones.
    #[arg(short = 'x', long, default_value_t = false)]
    cross_resolve: bool,

    #[arg(short = 'f', long, default_value_t = false)]
    force_rebuild: bool,

    #[arg(short = 'o', long)]
    output: Option<path::PathBuf>,
}

fn main() -> Result<(), Box<dyn error::Error>> {
    let start = Instant::now();
    env_logger::init();

    let options = Options::parse();
    debug!("{:?}", options);

    let config = PipelineConfig::from_path(&options.config)?;
    let stage = config.stage("graph", "network").forced(options.force_rebuild);
    let (store, relations) = run_network_stage(&stage, || {
        let datasets = options.datasets.iter().map(|dataset| read_dataset(&config, dataset)).collect::<rusty_hetnet_io::Result<Vec<_>>>()?;
        combine(datasets, options.cross_resolve)
    })?;

    let network = HetNetwork::assemble(&store, &relations)?;
    for (kind, count) in network.kind_histogram() {
        info!("{}: {}", kind, count);
    }

    if let Some(output) = &options.output {
        write_triples(output, &relation_triples(&store, &relations)?)?;
    }

    info!("Duration: {}", format_duration(start.elapsed()).to_string());
    Ok(())
}
