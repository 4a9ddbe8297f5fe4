//! Command-line argument parsing for the material preparation pipeline.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Pipeline command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "meshprep", about = "Merge a mesh's materials into one uber material")]
pub struct CliArgs {
    /// Input OBJ mesh.
    pub input: PathBuf,

    /// Output directory for the merged mesh, material, and textures.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Keep the occlusion channel of loaded specular textures instead of
    /// zeroing it.
    #[arg(long)]
    pub keep_specular_occlusion: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to a RON config file (overrides the default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref out) = args.out {
            self.output.directory = out.clone();
        }
        if args.keep_specular_occlusion {
            self.load.clear_specular_occlusion = false;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let args = CliArgs::parse_from([
            "meshprep",
            "scene.obj",
            "--out",
            "atlas_out",
            "--keep-specular-occlusion",
            "--log-level",
            "debug",
        ]);
        let mut config = Config::default();
        config.apply_cli_overrides(&args);

        assert_eq!(config.output.directory, PathBuf::from("atlas_out"));
        assert!(!config.load.clear_specular_occlusion);
        assert_eq!(config.debug.log_level, "debug");
    }

    #[test]
    fn test_no_overrides_keeps_defaults() {
        let args = CliArgs::parse_from(["meshprep", "scene.obj"]);
        let mut config = Config::default();
        config.apply_cli_overrides(&args);
        assert_eq!(config, Config::default());
        assert_eq!(args.input, PathBuf::from("scene.obj"));
    }
}
