use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use performance_scoring::config::AppConfig;
use performance_scoring::db::{self, PgStudentStore};
use performance_scoring::predictor::ModelSlot;
use performance_scoring::report;
use performance_scoring::scoring::{ScoreRequest, Scorer};
use performance_scoring::server::{self, AppState};

#[derive(Parser)]
#[command(name = "performance-scoring")]
#[command(about = "Predicted grades, performance tiers and recommendations for student cohorts", long_about = None)]
struct Cli {
    /// Directory holding regression.json and classifier.json
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("scope")
        .args(["curso_id", "alumnos_ids"])
        .required(true)
        .multiple(true)
))]
struct ScopeArgs {
    /// Score every student enrolled in this course
    #[arg(long)]
    curso_id: Option<i64>,
    /// Score these students (comma separated); wins over --curso-id
    #[arg(long, value_delimiter = ',')]
    alumnos_ids: Option<Vec<i64>>,
}

impl ScopeArgs {
    fn request(&self) -> ScoreRequest {
        ScoreRequest {
            curso_id: self.curso_id,
            alumnos_ids: self.alumnos_ids.clone(),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Score a cohort and print the predictions
    Score {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
        /// Write output to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate a markdown report for a cohort
    Report {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Serve the scoring endpoint over HTTP
    Serve {
        #[arg(long)]
        host: Option<std::net::IpAddr>,
        #[arg(long)]
        port: Option<u16>,
    },
}

async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(config.database_url()?)
        .await
        .context("failed to connect to Postgres")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;
    if let Some(dir) = cli.model_dir {
        config.model_dir = dir;
    }

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Score { scope, format, out } => {
            let store = PgStudentStore::new(connect(&config).await?);
            let models = ModelSlot::load(&config.model_dir);
            let results = Scorer::new(&store, &models).score(&scope.request()).await?;

            if results.is_empty() && out.is_none() && matches!(format, OutputFormat::Table) {
                println!("No students found for this scope.");
                return Ok(());
            }

            let rendered = match format {
                OutputFormat::Table => report::to_table(&results),
                OutputFormat::Json => report::to_json(&results)?,
                OutputFormat::Csv => report::to_csv(&results)?,
            };

            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Predictions written to {}.", path.display());
                }
                None => print!("{rendered}"),
            }
        }
        Commands::Report { scope, out } => {
            let store = PgStudentStore::new(connect(&config).await?);
            let models = ModelSlot::load(&config.model_dir);
            let scores = Scorer::new(&store, &models)
                .score_cohort(&scope.request())
                .await?;
            let report = report::build_report(&scores, chrono::Utc::now());
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.bind_addr.set_ip(host);
            }
            if let Some(port) = port {
                config.bind_addr.set_port(port);
            }

            let pool = connect(&config).await?;
            let state = Arc::new(AppState {
                data: Arc::new(PgStudentStore::new(pool)),
                models: ModelSlot::load(&config.model_dir),
            });
            info!(model_dir = %config.model_dir.display(), "starting scoring service");
            server::serve(state, config.bind_addr).await?;
        }
    }

    Ok(())
}
