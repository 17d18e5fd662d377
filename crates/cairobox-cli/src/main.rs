//! Cairobox CLI
//!
//! One-shot compilation and the HTTP compile service.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cairobox::{
    CompilationRequest, CompileError, CompileLimits, Config, EXAMPLE_CONFIG, Runner, http,
};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cairobox")]
#[command(about = "Compile untrusted Cairo projects in throwaway workspaces")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path (default: cairobox.toml)
        #[arg(short, long, default_value = "cairobox.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Compile a contract once and print the toolchain output
    Compile {
        /// Contract source file
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        /// Scarb.toml manifest
        #[arg(short, long)]
        manifest: PathBuf,

        /// Toolchain ID (default: from configuration)
        #[arg(short, long)]
        toolchain: Option<String>,

        /// Wall time limit in seconds
        #[arg(long)]
        timeout: Option<f64>,
    },

    /// Run the HTTP compile service
    Serve {
        /// Address to bind (default: from configuration)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (default: from configuration)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check that a toolchain is installed and recent enough
    Check {
        /// Toolchain ID (default: from configuration)
        #[arg(short, long)]
        toolchain: Option<String>,
    },

    /// List configured toolchains
    Toolchains,

    /// Show effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if cli.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    // Init writes the example config, so it must not need a valid one
    if let Commands::Init { output, force } = &cli.command {
        return init_config(output, *force).await;
    }

    if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
    } else {
        debug!("using default configuration");
    }
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Compile {
            source,
            manifest,
            toolchain,
            timeout,
        } => run_compile(config, &source, &manifest, toolchain.as_deref(), timeout).await,
        Commands::Serve { host, port } => serve(config, host, port).await,
        Commands::Check { toolchain } => check(config, toolchain.as_deref()).await,
        Commands::Toolchains => {
            list_toolchains(&config);
            Ok(())
        }
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
    }
}

async fn run_compile(
    config: Config,
    source: &Path,
    manifest: &Path,
    toolchain: Option<&str>,
    timeout: Option<f64>,
) -> Result<()> {
    let source_text = tokio::fs::read_to_string(source)
        .await
        .context("failed to read source file")?;
    let manifest_text = tokio::fs::read_to_string(manifest)
        .await
        .context("failed to read manifest file")?;

    // Only pass explicitly-specified values so they don't override
    // per-toolchain defaults
    let user_limits = timeout.map(|secs| CompileLimits::unset().with_wall_time_limit(secs));

    let runner = Runner::new(config);
    let request = CompilationRequest::new(source_text, manifest_text);

    match runner
        .compile_with(&request, toolchain, user_limits.as_ref())
        .await
    {
        Ok(result) => {
            print!("{}", result.output());
            if !result.stderr.is_empty() {
                eprint!("{}", result.stderr);
            }
            for warning in &result.warnings {
                warn!(warning = %warning, "source check");
            }
            for artifact in &result.artifacts {
                info!(artifact = %artifact, "built contract");
            }

            // Log job info via tracing (stderr), keeping stdout clean for piping
            info!(
                job_id = %result.job_id,
                duration = format_args!("{:.3}s", result.duration.as_secs_f64()),
                truncated = result.truncated(),
                "compilation successful"
            );
            Ok(())
        }
        Err(CompileError::BuildFailed(result)) => {
            eprintln!("Compilation failed");
            eprintln!("Exit code: {:?}", result.exit_code);
            if let Some(hint) = cairobox::runner::classify_failure(&result.transcript()) {
                eprintln!("Hint: {hint}");
            }
            println!("{}", result.transcript());
            std::process::exit(1);
        }
        Err(e) => Err(e).context("compilation failed"),
    }
}

async fn serve(config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = config;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let addr = config.server.addr();
    let runner = Runner::new(config);

    match runner.sweep_stale().await {
        Ok(0) => {}
        Ok(removed) => info!(removed, "removed stale workspaces"),
        Err(e) => warn!(error = %e, "failed to sweep stale workspaces"),
    }

    match runner.check_toolchain(None).await {
        Ok(version) => info!(%version, "toolchain ready"),
        Err(e) => warn!(error = %e, "toolchain check failed, builds may fail"),
    }

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    http::serve(listener, runner, shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

async fn check(config: Config, toolchain: Option<&str>) -> Result<()> {
    let runner = Runner::new(config);
    let version = runner
        .check_toolchain(toolchain)
        .await
        .context("toolchain check failed")?;

    println!("Toolchain OK: {version}");
    Ok(())
}

fn list_toolchains(config: &Config) {
    println!("Available toolchains:\n");

    let mut toolchains: Vec<_> = config.toolchains.iter().collect();
    toolchains.sort_by_key(|(id, _)| *id);

    for (id, toolchain) in toolchains {
        let marker = if *id == config.default_toolchain {
            " (default)"
        } else {
            ""
        };
        println!(
            "  {:<15} {} [{}]{}",
            id,
            toolchain.name,
            toolchain.command.join(" "),
            marker
        );
    }
}

fn show_config(config: &Config) {
    println!("Default limits:");
    println!(
        "  Wall time limit: {:?} s",
        config.default_limits.wall_time_limit
    );
    println!("  Max output: {:?} KB", config.default_limits.max_output);
    println!("  Max input: {:?} KB", config.default_limits.max_input);
    println!();
    println!("Workspace root: {}", config.workspace_root.display());
    println!("Max concurrent jobs: {}", config.max_concurrent_jobs);
    println!(
        "Stale workspace age: {}",
        config
            .stale_workspace_age
            .map_or_else(|| "disabled".to_owned(), |secs| format!("{secs} s"))
    );
    println!();
    println!("Server: {}", config.server.addr());
    println!("Body limit: {} bytes", config.server.body_limit);
    println!();
    println!("Default toolchain: {}", config.default_toolchain);
    println!("Toolchains configured: {}", config.toolchains.len());
}

async fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
