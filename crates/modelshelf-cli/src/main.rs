//! modelshelf CLI: inspect and copy model associations.

mod logging;

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use modelshelf_core::config::{ConfigOverlay, LibraryConfig};
use modelshelf_io::JsonFormat;
use modelshelf_library::ModelLibrary;

use crate::logging::{init_logging, LogFormat, LoggingConfig};

#[derive(Parser)]
#[command(name = "modelshelf")]
#[command(about = "Inspect and copy model associations", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct GlobalArgs {
    /// YAML library configuration (overrides environment)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Keep models on disk between borrows
    #[arg(long, global = true)]
    on_disk: bool,

    /// Directory for shadow files; left in place on exit
    #[arg(long, global = true)]
    temp_dir: Option<String>,

    /// Only keep members of this exposure type (repeatable)
    #[arg(long = "exptype", global = true)]
    exptypes: Vec<String>,

    /// Only keep the first N members
    #[arg(long, global = true)]
    n_members: Option<usize>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value = "pretty")]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// List members: index, expname, exptype, group
    Inspect {
        #[arg(short, long)]
        asn: PathBuf,
    },

    /// Show group -> member indices
    Groups {
        #[arg(short, long)]
        asn: PathBuf,
    },

    /// Print CRDS parameters of the representative member as JSON
    Crds {
        #[arg(short, long)]
        asn: PathBuf,
    },

    /// Write every model and a new association into a directory
    Save {
        #[arg(short, long)]
        asn: PathBuf,

        #[arg(short, long)]
        out: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(&LoggingConfig {
        level: cli.global.log_level.clone(),
        format: cli.global.log_format,
    });

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(&cli.global)?;
    match &cli.command {
        Commands::Inspect { asn } => inspect(asn, &config),
        Commands::Groups { asn } => groups(asn, &config),
        Commands::Crds { asn } => crds(asn, &config),
        Commands::Save { asn, out } => save(asn, out, &config),
    }
}

/// defaults < environment < YAML file < flags
fn resolve_config(args: &GlobalArgs) -> Result<LibraryConfig, Box<dyn std::error::Error>> {
    let mut config = LibraryConfig::from_env();
    if let Some(path) = &args.config {
        let yaml = fs::read_to_string(path)?;
        config.merge(&ConfigOverlay::from_yaml_str(&yaml)?);
    }
    apply_cli_overrides(&mut config, args);
    Ok(config)
}

fn apply_cli_overrides(cfg: &mut LibraryConfig, args: &GlobalArgs) {
    if args.on_disk {
        cfg.on_disk = true;
    }
    if let Some(dir) = &args.temp_dir {
        cfg.temp_directory = Some(dir.clone());
    }
    if !args.exptypes.is_empty() {
        cfg.asn_exptypes = Some(args.exptypes.clone());
    }
    if let Some(n) = args.n_members {
        cfg.asn_n_members = Some(n);
    }
}

fn open_library(
    asn: &Path,
    config: &LibraryConfig,
) -> Result<ModelLibrary<JsonFormat>, Box<dyn std::error::Error>> {
    Ok(ModelLibrary::new(JsonFormat::default(), asn, config)?)
}

fn inspect(asn: &Path, config: &LibraryConfig) -> Result<(), Box<dyn std::error::Error>> {
    let library = open_library(asn, config)?;
    let descriptor = library.asn()?;
    println!("Association: {}", asn.display());
    println!(
        "Members: {} ({})",
        library.len(),
        if library.on_disk() { "on disk" } else { "in memory" }
    );
    println!();
    println!("{:>5}  {:<32} {:<12} GROUP", "INDEX", "EXPNAME", "EXPTYPE");
    for (i, m) in descriptor.members().iter().enumerate() {
        println!(
            "{:>5}  {:<32} {:<12} {}",
            i,
            m.expname,
            m.exptype,
            m.group_id.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn groups(asn: &Path, config: &LibraryConfig) -> Result<(), Box<dyn std::error::Error>> {
    let library = open_library(asn, config)?;
    for (name, indices) in library.group_indices()? {
        println!("{name}: {indices:?}");
    }
    Ok(())
}

fn crds(asn: &Path, config: &LibraryConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut library = open_library(asn, config)?;
    let params = library.get_crds_parameters()?;
    let doc = serde_json::json!({
        "observatory": library.crds_observatory(),
        "parameters": params,
    });
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

fn save(asn: &Path, out: &Path, config: &LibraryConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut library = open_library(asn, config)?;
    let written = library.save(out)?;
    println!("✓ Saved {} models", library.len());
    println!("  Association: {}", written.display());
    Ok(())
}
