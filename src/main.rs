use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sei_andamento::config::{BatchConfig, FetchConfig, DEFAULT_BATCH_DELAY, DEFAULT_TIMEOUT};
use sei_andamento::model::LookupResponse;
use sei_andamento::{batch, db, format};

#[derive(Parser, Debug)]
#[command(
    name = "sei-andamento",
    version,
    about = "Track process progress on a SEI public-consultation portal",
    long_about = "Fetches SEI process pages, extracts the current progress step \
        (Histórico de Andamentos), flags stale steps and records the latest \
        protocol entry.\n\n\
        Examples:\n  \
        sei-andamento lookup \"https://sei.pi.gov.br/sei/modulos/pesquisa/md_pesq_processo_exibir.php?...\"\n  \
        sei-andamento parse pagina.html --obra-id obra-17\n  \
        sei-andamento track obra-17 \"https://sei.pi.gov.br/...\"\n  \
        sei-andamento refresh --delay-ms 5000\n  \
        sei-andamento import updates.json"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        default_value = "json",
        help = "Output format",
        long_help = "Output format.\n  json     (default, best for programmatic use)\n  markdown (human-readable)"
    )]
    format: OutputFormat,

    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_TIMEOUT.as_secs(),
        help = "Per-request timeout in seconds"
    )]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(ValueEnum, Clone, Debug)]
enum OutputFormat {
    Json,
    Markdown,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look up a process page (exit code 0 = found, 1 = not found, 2 = fetch failed)
    Lookup {
        /// Public-consultation URL; the scheme may be omitted
        url: String,
    },

    /// Extract from a page saved in the browser
    #[command(long_about = "Extract from a page saved in the browser.\n\n\
        Use this when the portal blocks automated access: open the link,\n\
        save the page (Ctrl+S) and pass the file here. With --obra-id the\n\
        output is an updates document that `import` accepts.")]
    Parse {
        /// Saved HTML file
        file: PathBuf,

        #[arg(long, help = "Emit {\"updates\": [...]} for this work item")]
        obra_id: Option<String>,
    },

    /// Register a work item and its portal URL
    Track {
        obra_id: String,
        url: String,
    },

    /// Refresh every tracked work item, one request at a time
    #[command(long_about = "Refresh every tracked work item, one request at a time.\n\n\
        Found results are stored; failures keep the previous values.\n\
        Ctrl-C stops the run before the next request.")]
    Refresh {
        #[arg(
            long,
            default_value_t = DEFAULT_BATCH_DELAY.as_millis() as u64,
            help = "Pause between requests in milliseconds"
        )]
        delay_ms: u64,

        #[arg(long, short, help = "Refresh at most this many items")]
        limit: Option<usize>,
    },

    /// Apply a {"updates": [...]} JSON file to the store
    Import {
        file: PathBuf,
    },

    /// List stored work items
    List,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "command failed");
            for cause in err.chain().skip(1) {
                error!(cause = %cause, "caused by");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let fetch_config = FetchConfig::default().with_timeout(Duration::from_secs(cli.timeout_secs));

    match cli.command {
        Command::Lookup { url } => {
            let response = sei_andamento::lookup_url(&url, &fetch_config).await?;
            print_output(&cli.format, &response, format::lookup)?;
            Ok(lookup_exit_code(&response))
        }

        Command::Parse { file, obra_id } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let response = sei_andamento::parse_page(&bytes);

            match obra_id {
                Some(obra_id) => {
                    let document = sei_andamento::as_update_batch(&obra_id, &response)?;
                    println!("{}", serde_json::to_string_pretty(&document)?);
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    print_output(&cli.format, &response, format::lookup)?;
                    Ok(lookup_exit_code(&response))
                }
            }
        }

        Command::Track { obra_id, url } => {
            let url = sei_andamento::fetch::normalize_url(&url)?;
            let conn = db::open_or_create_db()?;
            db::write::track_obra(&conn, &obra_id, url.as_str())?;
            info!(obra = %obra_id, %url, "tracking");
            Ok(ExitCode::SUCCESS)
        }

        Command::Refresh { delay_ms, limit } => {
            let conn = db::open_or_create_db()?;
            let batch_config = BatchConfig {
                delay: Duration::from_millis(delay_ms),
                limit,
            };

            let (handle, mut cancel) = batch::cancellation();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("stopping after the current request");
                    handle.cancel();
                }
            });

            let outcomes =
                sei_andamento::refresh_tracked(&conn, &fetch_config, &batch_config, &mut cancel)
                    .await?;
            print_output(&cli.format, &outcomes, |o| format::batch(o))?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Import { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let document: serde_json::Value = serde_json::from_str(&text)
                .with_context(|| format!("{} is not valid JSON", file.display()))?;

            let conn = db::open_or_create_db()?;
            let summary = sei_andamento::import_updates(&conn, &document)?;
            print_output(&cli.format, &summary, format::update_summary)?;
            Ok(ExitCode::SUCCESS)
        }

        Command::List => {
            let conn = db::open_or_create_db()?;
            let obras = db::queries::list_obras(&conn)?;
            print_output(&cli.format, &obras, |o| format::obras(o))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn lookup_exit_code(response: &LookupResponse) -> ExitCode {
    match response {
        LookupResponse::Found(_) => ExitCode::SUCCESS,
        LookupResponse::NotFound(_) => ExitCode::from(1),
        LookupResponse::Unreachable(_) => ExitCode::from(2),
    }
}

/// Print output in the requested format
fn print_output<T: serde::Serialize>(
    fmt: &OutputFormat,
    value: &T,
    markdown_fn: impl FnOnce(&T) -> String,
) -> anyhow::Result<()> {
    match fmt {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Markdown => print!("{}", markdown_fn(value)),
    }
    Ok(())
}
