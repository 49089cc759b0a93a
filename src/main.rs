use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::sync::Arc;

use bdc_engine::bdc::analytics::{AnalyticsSink, BatchingAnalyticsSink, LogAnalyticsSink};
use bdc_engine::bdc::config::{EngineConfig, UnknownStepPolicy};
use bdc_engine::bdc::resolvers::{register_available, BUILTIN_STEP_TYPES};
use bdc_engine::bdc::transport::{ReqwestTransport, Transport};
use bdc_engine::bdc::workflow::loader::WorkflowLoader;
use bdc_engine::bdc::workflow::{CodableState, StepResolverRegistry, WorkflowEngine};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Engine configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a workflow document and print the final state
    Run {
        /// Path to the workflow file
        #[arg(short, long)]
        file: String,

        /// Initial state document
        #[arg(short, long)]
        state: Option<String>,

        /// Fail on step types with no resolver
        #[arg(long)]
        strict: bool,
    },
    /// List the step types a workflow references
    Inspect {
        /// Path to the workflow file
        #[arg(short, long)]
        file: String,
    },
}

fn load_config(path: Option<&str>) -> anyhow::Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load(path).with_context(|| format!("loading {}", path))?,
        None => EngineConfig::default(),
    };
    Ok(config.apply_env()?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    let loader = WorkflowLoader::new();

    match args.command {
        Commands::Run {
            file,
            state,
            strict,
        } => {
            if strict {
                config.unknown_step_policy = UnknownStepPolicy::Strict;
            }

            let workflow = loader
                .load_workflow(&file)
                .with_context(|| format!("loading workflow {}", file))?;
            let initial = match state {
                Some(path) => loader
                    .load_state(&path)
                    .with_context(|| format!("loading state {}", path))?,
                None => CodableState::empty(),
            };

            let transport: Option<Arc<dyn Transport>> =
                match ReqwestTransport::new(&config.transport) {
                    Ok(t) => Some(Arc::new(t)),
                    Err(e) => {
                        log::warn!("HTTP steps disabled: {}", e);
                        None
                    }
                };

            let sink: Arc<dyn AnalyticsSink> = match (&transport, &config.analytics.endpoint) {
                (Some(transport), Some(endpoint)) => Arc::new(BatchingAnalyticsSink::new(
                    transport.clone(),
                    endpoint.clone(),
                    config.analytics.batch_size,
                )),
                _ => Arc::new(LogAnalyticsSink),
            };

            let registry = StepResolverRegistry::new();
            register_available(&registry, transport, sink.clone()).await;

            let engine = WorkflowEngine::builder(registry).config(&config).build();

            let cancel = engine.cancellation_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::warn!("Interrupted, cancelling workflow");
                    cancel.cancel();
                }
            });

            println!("Running workflow: {}", workflow.name());
            let result = engine.run(workflow, initial).await;

            engine.shutdown().await;
            if let Err(e) = sink.flush().await {
                log::warn!("Analytics flush failed: {}", e);
            }

            let final_state = result?;
            println!("{}", serde_json::to_string_pretty(&final_state)?);
        }
        Commands::Inspect { file } => {
            let workflow = loader
                .load_workflow(&file)
                .with_context(|| format!("loading workflow {}", file))?;

            println!("Workflow: {}", workflow.name());
            for step_type in workflow.step_types() {
                let status = if BUILTIN_STEP_TYPES.contains(&step_type.as_str()) {
                    "built-in"
                } else {
                    "unresolved"
                };
                println!("  {:<24} {}", step_type, status);
            }
        }
    }

    Ok(())
}
