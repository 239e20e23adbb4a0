//! # dynproto CLI Entry Point
//!
//! Assembles subcommands and dispatches to handler modules.

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use dynproto_cli::commands::{self, DecodeArgs, EncodeArgs, NameArgs, PackArgs};
use dynproto_cli::config::CliConfig;

/// Schema-driven protobuf marshaling from the command line.
///
/// Schemas come from `--proto` flags and the optional `--config` file;
/// `--map` registers virtual path prefixes before any schema is loaded.
#[derive(Parser, Debug)]
#[command(name = "dynproto", version, about)]
struct Cli {
    /// YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Map a virtual prefix to a real directory, as VIRTUAL=REAL.
    #[arg(long = "map", global = true)]
    maps: Vec<String>,

    /// Schema file to load. Repeatable.
    #[arg(long = "proto", global = true)]
    protos: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Load every schema and list the message names.
    Check,
    /// Report whether a message schema is loaded.
    Exist(NameArgs),
    /// Print a default-initialized message as JSON.
    Create(NameArgs),
    /// Encode a JSON object to wire bytes.
    Encode(EncodeArgs),
    /// Decode wire bytes to a JSON object.
    Decode(DecodeArgs),
    /// Encode field values given in declaration order.
    Pack(PackArgs),
    /// Decode wire bytes to a JSON array in declaration order.
    Unpack(DecodeArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };
    config.extend(&cli.maps, &cli.protos)?;
    let host = config.build_host()?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match &cli.command {
        Commands::Check => commands::check(&host, &mut out)?,
        Commands::Exist(args) => commands::exist(&host, args, &mut out)?,
        Commands::Create(args) => commands::create(&host, args, &mut out)?,
        Commands::Encode(args) => commands::encode(&host, args, &mut out)?,
        Commands::Decode(args) => commands::decode(&host, args, &mut out)?,
        Commands::Pack(args) => commands::pack(&host, args, &mut out)?,
        Commands::Unpack(args) => commands::unpack(&host, args, &mut out)?,
    }
    out.flush()?;

    Ok(())
}
