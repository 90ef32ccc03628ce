use std::fs;
use std::process::ExitCode;

use clap::Parser;
use flexi_logger::Logger;
use regex::Regex;

use octopus::config::Config;
use octopus::engine::Engine;
use octopus::graph::GraphManager;
use octopus::process::ShellLauncher;
use octopus::runtime::ContainerRuntime;
use octopus::status::Tracker;
use octopus::util::DisplayablePathBuf;

/// Deploys containerized services and drives dependency-ordered test
/// suites against them from a declarative configuration document.
#[derive(Parser, Debug)]
#[command(name = "octopus", version)]
struct Cli {
    /// Path to the configuration document (YAML).
    #[arg(long, value_name = "PATH")]
    config: DisplayablePathBuf,

    /// Skip tests whose name matches this regex. May be repeated.
    #[arg(long = "skip-tests", value_name = "REGEX")]
    skip_tests: Vec<String>,

    /// Run only tests whose name matches this regex. May be repeated;
    /// a test matching any `--only-tests` regex is kept.
    #[arg(long = "only-tests", value_name = "REGEX")]
    only_tests: Vec<String>,

    /// Verbosity, e.g. `-v` or `-vv`.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print the execution history as JSON instead of the colored
    /// terminal summary.
    #[arg(long)]
    json: bool,
}

fn compile_all(patterns: &[String]) -> anyhow::Result<Vec<Regex>> {
    patterns.iter().map(|p| Regex::new(p).map_err(Into::into)).collect()
}

/// Applies `--skip-tests`/`--only-tests` to a generated plan. Service
/// nodes are never filtered; a test node is dropped if it matches any
/// skip pattern, or if `only` patterns were given and it matches none.
fn filter_plan(plan: Vec<String>, config: &Config, skip: &[Regex], only: &[Regex]) -> Vec<String> {
    plan.into_iter()
        .filter(|name| {
            if config.test(name).is_none() {
                return true;
            }
            if skip.iter().any(|re| re.is_match(name)) {
                return false;
            }
            if !only.is_empty() && !only.iter().any(|re| re.is_match(name)) {
                return false;
            }
            true
        })
        .collect()
}

fn init_logging(verbose: u8) -> anyhow::Result<()> {
    let spec = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    Logger::try_with_str(spec)?.start()?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::from(2);
    }

    match run(cli) {
        Ok(true) => ExitCode::from(0),
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async_run(cli))
}

async fn async_run(cli: Cli) -> anyhow::Result<bool> {
    use anyhow::Context;

    let raw = fs::read_to_string(&*cli.config)
        .with_context(|| format!("reading configuration document at {}", cli.config))?;
    let doc: serde_yaml::Value =
        serde_yaml::from_str(&raw).with_context(|| format!("parsing {} as YAML", cli.config))?;
    let config = Config::from_value(&doc).context("validating configuration")?;

    let graph = GraphManager::build(&config)?;
    let plan = graph.execution_plan()?;

    let skip = compile_all(&cli.skip_tests)?;
    let only = compile_all(&cli.only_tests)?;
    let plan = filter_plan(plan, &config, &skip, &only);

    let runtime: std::sync::Arc<dyn ContainerRuntime> = std::sync::Arc::new(unavailable_runtime::UnavailableRuntime);
    let launcher = Box::new(ShellLauncher);

    let mut engine = Engine::new(&config, &graph, runtime, launcher);
    let ok = engine.execute(&plan).await;

    if cli.json {
        let report = serde_json::to_string_pretty(&engine.nodes).context("serializing execution history")?;
        println!("{report}");
    } else {
        let mut tracker = Tracker::new(plan.clone(), std::io::stdout());
        tracker.repaint(&engine.nodes)?;
        tracker.summarize(&engine.nodes)?;
    }
    octopus::cleanup::run_shutdown();

    Ok(ok)
}

/// The container runtime is an external collaborator per §1 ("the
/// container runtime ... not redesigned here"); this binary has no
/// concrete runtime wired in. Swap in a real adapter (Docker, Podman,
/// whatever `service-runtime` resolves to at deploy time) to run
/// services for real.
mod unavailable_runtime {
    use octopus::runtime::{ContainerRuntime, DeploySpec, Result, RuntimeError};
    use std::collections::HashMap;

    pub struct UnavailableRuntime;

    impl ContainerRuntime for UnavailableRuntime {
        fn run(&self, spec: &DeploySpec) -> Result<String> {
            Err(unavailable("run", &spec.name))
        }
        fn start(&self, id: &str) -> Result<()> {
            Err(unavailable("start", id))
        }
        fn stop(&self, id: &str) -> Result<()> {
            Err(unavailable("stop", id))
        }
        fn pause(&self, id: &str) -> Result<()> {
            Err(unavailable("pause", id))
        }
        fn remove(&self, id: &str) -> Result<()> {
            Err(unavailable("remove", id))
        }
        fn logs(&self, id: &str) -> Result<Vec<String>> {
            Err(unavailable("logs", id))
        }
        fn health(&self, id: &str) -> Result<bool> {
            Err(unavailable("health", id))
        }
        fn inspect(&self, id: &str) -> Result<HashMap<String, String>> {
            Err(unavailable("inspect", id))
        }
    }

    fn unavailable(op: &'static str, id: &str) -> RuntimeError {
        RuntimeError::OperationFailed {
            op,
            container_id: id.to_string(),
            message: "no container runtime configured".to_string(),
        }
    }
}
