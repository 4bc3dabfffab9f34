use clap::{Parser, Subcommand};
use humantime::format_duration;
use log::{debug, info};
use rusty_hetnet_io::checkpoint::read_dataset;
use rusty_hetnet_io::compile::{compile_network, split, write_split, SplitConfig};
use rusty_hetnet_io::config::PipelineConfig;
use rusty_hetnet_io::export::{read_triples, write_triples};
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
    /// Map held-out repurposing relations onto a base dataset and write both line files.
    Compile {
        #[arg(short = 'c', long, required = true)]
        config: path::PathBuf,

        #[arg(short = 'b', long, default_value = "hetio")]
        base: String,

        #[arg(short = 'r', long, default_value = "repodb")]
        held_out: String,

        #[arg(short = 'g', long, required = true)]
        graph_output: path::PathBuf,

        #[arg(short = 'o', long, required = true)]
        held_out_output: path::PathBuf,
    },
    Split {
        #[arg(short = 'g', long, required = true)]
        graph: path::PathBuf,

        #[arg(short = 'r', long, required = true)]
        held_out: path::PathBuf,

        #[arg(short = 'o', long, required = true)]
        output: path::PathBuf,

        #[arg(short = 'd', long, default_value_t = 0.4)]
        dev_fraction: f64,

        #[arg(short = 's', long, default_value_t = 42)]
        seed: u64,
    },
}

fn main() -> Result<(), Box<dyn error::Error>> {
    let start = Instant::now();
    env_logger::init();

    let options = Options::parse();
    debug!("{:?}", options);

    match &options.command {
        Some(Commands::Compile {
            config,
            base,
            held_out,
            graph_output,
            held_out_output,
        }) => {
            let config = PipelineConfig::from_path(config)?;
            let (base_store, base_relations) = read_dataset(&config, base)?;
            let (held_store, held_relations) = read_dataset(&config, held_out)?;
            let compiled = compile_network(&base_store, &base_relations, &held_store, &held_relations)?;
            info!("{:?}", compiled.report);
            write_triples(graph_output, &compiled.graph)?;
            write_triples(held_out_output, &compiled.held_out)?;
        }
        Some(Commands::Split {
            graph,
            held_out,
            output,
            dev_fraction,
            seed,
        }) => {
            if !(0.0..=1.0).contains(dev_fraction) {
                return Err(format!("dev fraction must lie in [0, 1], got {}", dev_fraction).into());
            }
            let config = SplitConfig {
                dev_fraction: *dev_fraction,
                seed: *seed,
            };
            let split = split(read_triples(graph)?, read_triples(held_out)?, config);
            write_split(output, &split)?;
        }
        None => {}
    }

    info!("Duration: {}", format_duration(start.elapsed()).to_string());
    Ok(())
}
