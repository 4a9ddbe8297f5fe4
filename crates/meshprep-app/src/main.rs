//! The binary entry point for the material preparation pipeline.
//!
//! Loads an OBJ mesh and its material libraries, merges multi-material
//! meshes into a single uber material with a re-indexed UV atlas, and
//! writes the result to the output directory.

use std::path::Path;

use clap::Parser;

use meshprep_config::{CliArgs, Config};
use meshprep_materials::MtlOptions;
use meshprep_mesh::{load_obj, save_obj};

fn main() {
    let args = CliArgs::parse();

    let config_path = args.config.clone().unwrap_or_else(|| "config.ron".into());
    let mut config = match Config::load_or_default(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config '{}': {e}", config_path.display());
            std::process::exit(1);
        }
    };
    config.apply_cli_overrides(&args);

    meshprep_log::init_logging(Some(&config));

    if let Err(e) = run(&args.input, &config) {
        eprintln!("meshprep failed: {e}");
        std::process::exit(1);
    }
}

fn run(input: &Path, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let options = MtlOptions {
        clear_specular_occlusion: config.load.clear_specular_occlusion,
    };

    tracing::info!(input = %input.display(), "loading mesh");
    let mesh = load_obj(input, &options)?;

    std::fs::create_dir_all(&config.output.directory)?;
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mesh".to_string());
    let out_path = config.output.directory.join(format!("{stem}_uber.obj"));
    save_obj(&out_path, &mesh)?;

    tracing::info!(output = %out_path.display(), "wrote merged mesh");
    Ok(())
}
