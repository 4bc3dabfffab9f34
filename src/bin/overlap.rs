use clap::Parser;
use humantime::format_duration;
use log::{debug, info};
use rusty_hetnet_io::checkpoint::read_entities;
use rusty_hetnet_io::overlap::overlap_report;
use std::time::Instant;
use std::{error, path};

/// Count compounds and diseases two entity checkpoints have in common.
#[derive(Parser, PartialEq, Debug)]
#[command(author, version, about, long_about = None)]
struct Options {
    #[arg(short = 'l', long, required = true)]
    left: path::PathBuf,

    #[arg(short = 'r', long, required = true)]
    right: path::PathBuf,
}

fn main() -> Result<(), Box<dyn error::Error>> {
    let start = Instant::now();
    env_logger::init();

    let options = Options::parse();
    debug!("{:?}", options);

    let left = read_entities(&options.left)?;
    let right = read_entities(&options.right)?;
    for report in overlap_report(&left, &right) {
        println!("{}", report);
    }

    info!("Duration: {}", format_duration(start.elapsed()).to_string());
    Ok(())
}
