//! PCATS CLI
//!
//! Entry point for the `pcats` command-line tool.

use clap::{Args, Parser, Subcommand};
use pcats_client::config::{default_config_path, env_layer, layer_from_pairs, EffectiveConfig};
use pcats_client::host::{ClientResult, FailureKind, JobClient};
use pcats_client::protocol::{CateParams, DataSource, DynamicParams, JobId, JobStatus, StaticParams};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Exit code for configuration and parameter file errors
const EXIT_CONFIG: i32 = 2;

#[derive(Parser)]
#[command(name = "pcats")]
#[command(about = "Client for the PCATS causal inference service", version)]
struct Cli {
    /// Path to config file (default: ~/.config/pcats/client.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Service base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Bearer token
    #[arg(long, global = true)]
    token: Option<String>,

    /// Seconds between status checks
    #[arg(long, global = true)]
    poll_interval: Option<u64>,

    /// Give up waiting after this many seconds
    #[arg(long, global = true)]
    poll_timeout: Option<u64>,

    /// Give up waiting after this many status checks
    #[arg(long, global = true)]
    max_polls: Option<u64>,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit an analysis described by a TOML parameter file
    Submit {
        #[command(subcommand)]
        kind: SubmitCommands,
    },

    /// Show the current status of a job
    Status { job_id: JobId },

    /// Wait until a job finishes
    Wait { job_id: JobId },

    /// Print the summary of a finished job
    Print { job_id: JobId },

    /// Print the summary of a finished CATE job
    PrintCate { job_id: JobId },

    /// Print the structured results of a finished job
    Results { job_id: JobId },

    /// Submit a CATE job derived from a finished job
    Cate {
        #[command(subcommand)]
        kind: CateCommands,
    },

    /// Upload a data file and print its reference
    Upload { path: PathBuf },

    /// Print the plot URL of a job
    PlotUrl {
        job_id: JobId,

        /// Plot type appended to the URL (e.g. "cate")
        #[arg(long)]
        plot_type: Option<String>,
    },

    /// Show the effective configuration (secrets redacted)
    Config,
}

#[derive(Subcommand)]
enum SubmitCommands {
    /// Single-stage analysis
    Static(SubmitArgs),
    /// Two-stage analysis
    Dynamic(SubmitArgs),
}

#[derive(Args)]
struct SubmitArgs {
    /// TOML parameter file
    #[arg(long, short = 'p')]
    params: PathBuf,

    /// Wait for the job to finish
    #[arg(long)]
    wait: bool,
}

#[derive(Subcommand)]
enum CateCommands {
    /// CATE of a single-stage job
    Static(CateArgs),
    /// CATE of a two-stage job
    Dynamic(CateArgs),
}

#[derive(Args)]
struct CateArgs {
    /// Finished job to derive from
    job_id: JobId,

    /// Covariate the effect is conditioned on
    #[arg(long)]
    x: String,

    /// Control treatment value
    #[arg(long)]
    control: String,

    /// Active treatment value
    #[arg(long)]
    treat: String,

    #[arg(long)]
    pr_values: Option<String>,

    /// Wait for the job to finish
    #[arg(long)]
    wait: bool,
}

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .try_init();

    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(EXIT_CONFIG);
        }
    };

    if let Commands::Config = cli.command {
        run_config(&config);
        return;
    }

    let settings = match config.settings() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(EXIT_CONFIG);
        }
    };
    debug!(base_url = %settings.base_url, "using service");

    let client = match JobClient::connect(settings.http_config(), settings.client_config()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    };

    let json_output = cli.json;
    let result = match cli.command {
        Commands::Submit { kind } => match kind {
            SubmitCommands::Static(args) => {
                let mut params: StaticParams = load_params(&args.params);
                let base = params_dir(&args.params);
                resolve_source(&mut params.data, &base);
                if let Some(ref mut mi) = params.mi_data {
                    resolve_source(mi, &base);
                }
                client
                    .submit_static(&params)
                    .and_then(|id| report_job(&client, id, args.wait, json_output))
            }
            SubmitCommands::Dynamic(args) => {
                let mut params: DynamicParams = load_params(&args.params);
                let base = params_dir(&args.params);
                resolve_source(&mut params.data, &base);
                if let Some(ref mut mi) = params.mi_data {
                    resolve_source(mi, &base);
                }
                client
                    .submit_dynamic(&params)
                    .and_then(|id| report_job(&client, id, args.wait, json_output))
            }
        },
        Commands::Cate { kind } => {
            let (args, dynamic) = match kind {
                CateCommands::Static(args) => (args, false),
                CateCommands::Dynamic(args) => (args, true),
            };
            let mut params = CateParams::new(&args.x, &args.control, &args.treat);
            params.pr_values = args.pr_values.clone();
            let submitted = if dynamic {
                client.submit_dynamic_cate(&args.job_id, &params)
            } else {
                client.submit_static_cate(&args.job_id, &params)
            };
            submitted.and_then(|id| report_job(&client, id, args.wait, json_output))
        }
        Commands::Status { job_id } => client.status(&job_id).map(|status| {
            print_status(&job_id, &status, json_output);
            0
        }),
        Commands::Wait { job_id } => client.wait(&job_id).map(|status| {
            print_status(&job_id, &status, json_output);
            status_exit_code(&status)
        }),
        Commands::Print { job_id } => client.print(&job_id).map(print_text),
        Commands::PrintCate { job_id } => client.print_cate(&job_id).map(print_text),
        Commands::Results { job_id } => client.results(&job_id).map(print_text),
        Commands::Upload { path } => client.upload_file(&path).map(|fileref| {
            print_value("fileref", &fileref, json_output);
            0
        }),
        Commands::PlotUrl { job_id, plot_type } => {
            client.plot_url(&job_id, plot_type.as_deref()).map(|url| {
                print_value("url", &url, json_output);
                0
            })
        }
        Commands::Config => Ok(0),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn load_config(cli: &Cli) -> Result<EffectiveConfig, String> {
    let user_path = match cli.config {
        Some(ref path) if !path.exists() => {
            return Err(format!("config file not found: {}", path.display()));
        }
        Some(ref path) => Some(path.clone()),
        None => default_config_path(),
    };

    let cli_layer = layer_from_pairs([
        ("base_url", cli.base_url.clone().map(Value::String)),
        ("request.token", cli.token.clone().map(Value::String)),
        ("poll.interval_seconds", cli.poll_interval.map(Value::from)),
        ("poll.timeout_seconds", cli.poll_timeout.map(Value::from)),
        ("poll.max_polls", cli.max_polls.map(Value::from)),
    ]);

    EffectiveConfig::build(
        user_path.as_deref(),
        env_layer(|name| std::env::var(name).ok()),
        cli_layer,
    )
    .map_err(|e| e.to_string())
}

fn run_config(config: &EffectiveConfig) {
    match config.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

/// Parse a TOML parameter file, exiting on error
fn load_params<T: DeserializeOwned>(path: &Path) -> T {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Cannot read parameter file {}: {}", path.display(), e);
            process::exit(EXIT_CONFIG);
        }
    };
    match toml::from_str(&contents) {
        Ok(params) => params,
        Err(e) => {
            eprintln!("Invalid parameter file {}: {}", path.display(), e);
            process::exit(EXIT_CONFIG);
        }
    }
}

fn params_dir(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// Relative data paths in a parameter file are relative to that file
fn resolve_source(source: &mut DataSource, base: &Path) {
    if let DataSource::File(path) = source {
        if path.is_relative() {
            *path = base.join(&*path);
        }
    }
}

/// Print a submitted job id, optionally waiting for the job first
fn report_job(client: &JobClient, job_id: JobId, wait: bool, json_output: bool) -> ClientResult<i32> {
    if !wait {
        print_value("job_id", job_id.as_str(), json_output);
        return Ok(0);
    }

    if !json_output {
        eprintln!("Submitted job {}, waiting...", job_id);
    }
    let status = client.wait(&job_id)?;
    print_status(&job_id, &status, json_output);
    Ok(status_exit_code(&status))
}

fn status_exit_code(status: &JobStatus) -> i32 {
    if status.is_error() {
        FailureKind::JobFailed.exit_code()
    } else {
        0
    }
}

fn print_status(job_id: &JobId, status: &JobStatus, json_output: bool) {
    if json_output {
        println!("{}", json!({ "job_id": job_id.as_str(), "status": status.as_str() }));
    } else {
        println!("{}: {}", job_id, status);
    }
}

fn print_value(key: &str, value: &str, json_output: bool) {
    if json_output {
        let mut object = serde_json::Map::new();
        object.insert(key.to_string(), Value::from(value));
        println!("{}", Value::Object(object));
    } else {
        println!("{}", value);
    }
}

fn print_text(text: String) -> i32 {
    println!("{}", text.trim_end());
    0
}
