use std::{env, path::Path};

use anyhow::{bail, Result};
use forecast_service::{
    model::{SequenceModel, SequencePredictor},
    observability,
};

fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: inspect_model <model_artifact_json>");
    }

    let model = SequenceModel::load(Path::new(&args[1]))?;

    println!("artifact:   {}", args[1]);
    println!("digest:     {}", model.digest());
    println!("input:      ({}, {})", model.time_steps(), model.input_width());
    println!("output:     ({})", model.input_width());
    println!("layers:");
    for line in model.layer_summary() {
        println!("  {line}");
    }

    Ok(())
}
