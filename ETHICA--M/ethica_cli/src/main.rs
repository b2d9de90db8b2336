use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ethica_assessment::{
    AssessmentConfig, AssessmentDriver, AssessmentState, AssessmentTelemetry, CheckpointStore,
    Framework, StageRuntime, WorkflowStatus,
};
use ethica_evidence::{
    corpus::CorpusLoader,
    retriever::FrameworkRetriever,
    store::FrameworkStore,
    web::{LoopbackWebClient, SerperWebClient, WebSearchClient},
};
use ethica_generation::{GenerationClient, HttpGenerationClient, LoopbackGenerationClient};
use ethica_report::ReportRenderer;
use shared_event_bus::FileEventPublisher;

#[derive(Parser, Debug)]
#[command(name = "ethica", version, about = "AI-ethics risk assessment pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs a full assessment for a named service.
    Assess(AssessArgs),
    /// Resumes a workflow from a state snapshot.
    Resume {
        /// Snapshot file produced by an earlier run.
        #[arg(long)]
        checkpoint: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Use offline loopback backends instead of live APIs.
        #[arg(long)]
        offline: bool,
    },
    /// Lists recent state snapshots.
    List {
        #[arg(long)]
        checkpoint_dir: Option<PathBuf>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Parser, Debug)]
struct AssessArgs {
    /// Name of the AI service to assess.
    service: String,
    /// Framework to assess against.
    #[arg(long, value_enum, default_value_t = FrameworkArg::EuAiAct)]
    framework: FrameworkArg,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    corpus_dir: Option<PathBuf>,
    #[arg(long)]
    output_dir: Option<PathBuf>,
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,
    /// Use offline loopback backends instead of live APIs.
    #[arg(long)]
    offline: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum FrameworkArg {
    EuAiAct,
    UnescoAiEthics,
    OecdAiPrinciples,
}

impl From<FrameworkArg> for Framework {
    fn from(arg: FrameworkArg) -> Self {
        match arg {
            FrameworkArg::EuAiAct => Self::EuAiAct,
            FrameworkArg::UnescoAiEthics => Self::UnescoAiEthics,
            FrameworkArg::OecdAiPrinciples => Self::OecdAiPrinciples,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Assess(args) => {
            let mut config = load_config(args.config.as_ref())?;
            if let Some(dir) = args.corpus_dir {
                config.corpus_dir = dir;
            }
            if let Some(dir) = args.output_dir {
                config.output_dir = dir;
            }
            if let Some(dir) = args.checkpoint_dir {
                config.checkpoint_dir = dir;
            }
            let state = AssessmentState::new(args.service, args.framework.into());
            run_workflow(state, &config, args.offline).await
        }
        Commands::Resume {
            checkpoint,
            config,
            offline,
        } => {
            let config = load_config(config.as_ref())?;
            let state = CheckpointStore::load(&checkpoint)
                .with_context(|| format!("loading snapshot {}", checkpoint.display()))?;
            run_workflow(state, &config, offline).await
        }
        Commands::List {
            checkpoint_dir,
            limit,
        } => {
            let config = AssessmentConfig::default();
            let dir = checkpoint_dir.unwrap_or(config.checkpoint_dir);
            let store = CheckpointStore::new(dir)?;
            for path in store.list()?.into_iter().take(limit) {
                let state = CheckpointStore::load(&path)?;
                println!(
                    "{} | {} | {} | {:?} | {}",
                    state.workflow_id,
                    state.service_name,
                    state.framework.label(),
                    state.status,
                    path.display()
                );
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<AssessmentConfig> {
    path.map_or_else(
        || Ok(AssessmentConfig::default()),
        AssessmentConfig::from_toml_file,
    )
}

async fn run_workflow(state: AssessmentState, config: &AssessmentConfig, offline: bool) -> Result<()> {
    let store = FrameworkStore::default();
    match CorpusLoader::default().load_directory(&store, &config.corpus_dir) {
        Ok(chunks) => eprintln!(
            "loaded {chunks} corpus chunks from {}",
            config.corpus_dir.display()
        ),
        Err(err) => eprintln!("corpus not loaded ({err}); relying on web evidence"),
    }

    let (generation, web) = backends(offline)?;
    let telemetry = telemetry(config)?;
    let mut runtime = StageRuntime::new(
        generation,
        FrameworkRetriever::new(store),
        web,
        ReportRenderer::new(&config.output_dir),
    )
    .with_adapter_timeout(config.adapter_timeout());
    if let Some(handle) = &telemetry {
        runtime = runtime.with_telemetry(handle.clone());
    }

    let checkpoints = CheckpointStore::new(&config.checkpoint_dir)?;
    let mut driver =
        AssessmentDriver::new(runtime, checkpoints).with_max_iterations(config.max_iterations);
    if let Some(handle) = telemetry {
        driver = driver.with_telemetry(handle);
    }

    let done = driver.run(state).await?;
    match (&done.status, &done.report_path) {
        (WorkflowStatus::Completed, Some(path)) => {
            println!("{}", path.display());
            Ok(())
        }
        _ => anyhow::bail!("workflow {} ended in status {:?}", done.workflow_id, done.status),
    }
}

fn backends(offline: bool) -> Result<(Arc<dyn GenerationClient>, Arc<dyn WebSearchClient>)> {
    if offline {
        return Ok((
            Arc::new(LoopbackGenerationClient),
            Arc::new(LoopbackWebClient),
        ));
    }
    let generation = HttpGenerationClient::from_env().context("configuring generation backend")?;
    let web: Arc<dyn WebSearchClient> = match SerperWebClient::from_env() {
        Ok(client) => Arc::new(client),
        Err(err) => {
            eprintln!("web search disabled ({err}); using offline fallback");
            Arc::new(LoopbackWebClient)
        }
    };
    Ok((Arc::new(generation), web))
}

fn telemetry(config: &AssessmentConfig) -> Result<Option<AssessmentTelemetry>> {
    if config.log_path.is_none() && config.event_log_path.is_none() {
        return Ok(None);
    }
    let mut builder = AssessmentTelemetry::builder("ethica");
    if let Some(path) = &config.log_path {
        builder = builder.log_path(path);
    }
    if let Some(path) = &config.event_log_path {
        builder = builder.event_publisher(Arc::new(FileEventPublisher::new(path)?));
    }
    Ok(Some(builder.build()?))
}
