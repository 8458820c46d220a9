use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use ferry_bindings::config::{ConfigObject, PropertyFile};
use ferry_bindings::dependency::Dependency;
use ferry_bindings::network::{self, network_binding};
use ferry_core::{List, Object, ObjectExt, ObjectRef, Value};
use ferry_runtime::{Engine, RuntimeConfig};
use tracing::debug;
use tracing_subscriber::filter::EnvFilter;

#[derive(Parser)]
#[command(name = "ferry", version, about = "Ferry native/script bridge tools")]
struct Cli {
    /// Property file with `runtime.*` engine settings
    #[arg(long, global = true)]
    runtime_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read and edit property files
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Inspect network interfaces
    Network {
        #[command(subcommand)]
        command: NetworkCommand,
    },
    /// Check a manifest dependency line against an installed version
    Dependency { line: String, version: String },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the value at a dotted path
    Get { file: PathBuf, path: String },
    /// Set the value at a dotted path and save the file
    Set {
        file: PathBuf,
        path: String,
        value: String,
    },
    /// Print the whole file as a nested object
    Dump {
        file: PathBuf,
        #[arg(long, default_value_t = 8)]
        depth: usize,
    },
}

#[derive(Subcommand)]
enum NetworkCommand {
    /// List interfaces with their first address
    Interfaces {
        /// Print the raw interface list as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the first IPv4 and MAC address
    Address,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    let runtime = runtime_config(cli.runtime_config.as_deref())?;

    match cli.command {
        Commands::Config { command } => match command {
            ConfigCommand::Get { file, path } => config_get(runtime, &file, &path)?,
            ConfigCommand::Set { file, path, value } => config_set(runtime, &file, &path, value)?,
            ConfigCommand::Dump { file, depth } => config_dump(&file, depth)?,
        },
        Commands::Network { command } => match command {
            NetworkCommand::Interfaces { json: true } => {
                println!("{}", serde_json::to_string_pretty(network::interfaces())?);
            }
            NetworkCommand::Interfaces { json: false } => network_interfaces(runtime)?,
            NetworkCommand::Address => {
                println!("ip:  {}", network::first_ipv4_address());
                println!("mac: {}", network::first_mac_address());
            }
        },
        Commands::Dependency { line, version } => dependency_check(&line, &version)?,
    }

    Ok(())
}

fn runtime_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    let Some(path) = path else {
        return Ok(RuntimeConfig::default());
    };
    let properties = PropertyFile::load(path)?;
    Ok(RuntimeConfig::from_properties(&properties)?)
}

/// Start an engine with `object` exposed as the global `name`
fn engine_with(runtime: RuntimeConfig, name: &'static str, object: ObjectRef) -> Result<Engine> {
    let engine = Engine::builder()
        .config(runtime)
        .with_init(move |bridge| bridge.expose_object(name, object.clone()))
        .build()?;
    debug!(global = name, "engine started");
    Ok(engine)
}

// Reads go through the script global so the value makes the full round trip.
fn config_get(runtime: RuntimeConfig, file: &Path, path: &str) -> Result<()> {
    let config: ObjectRef = Arc::new(ConfigObject::load(file)?);
    let engine = engine_with(runtime, "config", config)?;
    let global = engine.handle().global()?;

    let value = global.get_ns(&format!("config.{path}"))?;
    if value.is_undefined() {
        return Err(anyhow!("{}: no value at '{}'", file.display(), path));
    }
    println!("{value}");
    engine.shutdown();
    Ok(())
}

fn config_set(runtime: RuntimeConfig, file: &Path, path: &str, value: String) -> Result<()> {
    let config = ConfigObject::load(file)?;
    let engine = engine_with(runtime, "config", Arc::new(config.clone()))?;
    let global = engine.handle().global()?;

    global.set_ns(&format!("config.{path}"), Value::string(value))?;
    engine.shutdown();
    config.save(file)?;
    Ok(())
}

fn config_dump(file: &Path, depth: usize) -> Result<()> {
    let config = ConfigObject::load(file)?;
    println!("{}", config.display_string(depth));
    Ok(())
}

fn network_interfaces(runtime: RuntimeConfig) -> Result<()> {
    let engine = engine_with(runtime, "Network", Arc::new(network_binding()))?;
    let global = engine.handle().global()?;

    let interfaces = global.call_ns("Network.getInterfaces", &[])?;
    let interfaces = interfaces.to_list()?;
    for index in 0..interfaces.size() {
        let interface = interfaces.at(index)?.to_object()?;
        let name = interface.call_ns("getName", &[])?.to_string();
        let address = interface.call_ns("getAddress", &[])?.to_string();
        let mac = interface.call_ns("getMACAddress", &[])?.to_string();
        println!("{:<16} {:<40} {}", name, address, mac);
    }
    engine.shutdown();
    Ok(())
}

fn dependency_check(line: &str, version: &str) -> Result<()> {
    let dependency = Dependency::parse_line(line)?;
    if dependency.is_satisfied_by(version) {
        println!("{} satisfies {}", version, dependency);
        Ok(())
    } else {
        Err(anyhow!("{} does not satisfy {}", version, dependency))
    }
}
