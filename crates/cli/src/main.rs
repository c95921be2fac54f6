mod error;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use client::{Session, SessionConfig};
use server::{Config, ToolServer, build_registry};
use tracing_subscriber::EnvFilter;

use error::{Error, Result};

const CONFIG_FILE: &str = "spyglass.toml";

#[derive(Parser)]
#[command(name = "spyglass")]
#[command(about = "Information-retrieval tool server and client", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tool server on stdio
    Serve {
        /// Configuration file (default: spyglass.toml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Spawn a server and list the tools it exposes
    Tools {
        /// Server command to spawn, e.g. `spyglass serve`
        #[arg(trailing_var_arg = true, required = true)]
        server: Vec<String>,
    },
    /// Invoke one tool and print the outcome
    Call {
        /// Tool name
        name: String,
        /// Arguments as a JSON object
        arguments: String,
        /// Server command to spawn
        #[arg(trailing_var_arg = true, required = true)]
        server: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Stdout is the protocol channel in serve mode; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => cmd_serve(config).await,
        Commands::Tools { server } => cmd_tools(server).await,
        Commands::Call {
            name,
            arguments,
            server,
        } => cmd_call(&name, &arguments, server).await,
    }
}

async fn cmd_serve(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = build_registry(&config)?;

    ToolServer::new(registry)
        .with_name(config.server.name.clone())
        .with_call_timeout(Duration::from_secs(config.server.call_timeout_secs))
        .serve_stdio()
        .await?;

    Ok(())
}

async fn cmd_tools(server: Vec<String>) -> Result<()> {
    let session = connect(server).await?;
    let tools = session.discover().await?;

    for tool in &tools {
        println!("{}", tool.name);
        println!("  {}", tool.description);
    }

    session.close().await?;
    Ok(())
}

async fn cmd_call(name: &str, arguments: &str, server: Vec<String>) -> Result<()> {
    let arguments: serde_json::Value =
        serde_json::from_str(arguments).map_err(|e| Error::BadArguments(e.to_string()))?;
    if !arguments.is_object() {
        return Err(Error::BadArguments("expected a JSON object".into()));
    }

    let session = connect(server).await?;
    session.discover().await?;

    let outcome = session.invoke(name, Some(arguments)).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    session.close().await?;
    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Ok(Config::load(path)?),
        None => {
            let default = PathBuf::from(CONFIG_FILE);
            if default.exists() {
                Ok(Config::load(default)?)
            } else {
                Ok(Config::default())
            }
        }
    }
}

async fn connect(server: Vec<String>) -> Result<Session> {
    let mut parts = server.into_iter();
    let command = parts.next().ok_or(Error::MissingServerCommand)?;

    let config = SessionConfig {
        name: command.clone(),
        command,
        args: parts.collect(),
        env: HashMap::new(),
    };

    Ok(Session::connect(config).await?)
}
