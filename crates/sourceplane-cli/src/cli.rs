use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};

use sourceplane_config::{discover_intent_files, load_intents};
use sourceplane_core::executor::Executor;
use sourceplane_core::planner::Planner;
use sourceplane_core::types::{Plan, PlanRequest, Repository};
use sourceplane_providers::{GitFetcher, RegistryLoader};

#[derive(Debug, Parser)]
#[command(
    name = "thinci",
    about = "Thin-CI: deterministic CI/CD planning engine",
    long_about = "Thin-CI generates deterministic execution plans for CI systems.\n\
                  It does not execute CI, it only creates plans that can be rendered into workflows.",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a CI execution plan
    Plan(PlanArgs),
    /// Execute one job from a previously generated plan
    Run(RunArgs),
    /// List providers referenced by the loaded intents
    Providers(RepoArgs),
    /// List components across loaded intents
    Components(RepoArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Args)]
struct PlanArgs {
    /// Generate a plan for GitHub Actions
    #[arg(long)]
    github: bool,
    /// Generate a plan for GitLab CI
    #[arg(long, conflicts_with = "github")]
    gitlab: bool,
    /// Explicit render target (alternative to --github/--gitlab)
    #[arg(long, conflicts_with_all = ["github", "gitlab"])]
    target: Option<String>,
    /// CI mode: plan, apply, or destroy
    #[arg(short, long, default_value = "plan")]
    mode: String,
    /// Base git ref for comparison
    #[arg(long, default_value = "main")]
    base: String,
    /// Head git ref for comparison
    #[arg(long, default_value = "HEAD")]
    head: String,
    /// Only include changed components
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    changed_only: bool,
    /// Target environment (prod, staging, ...)
    #[arg(short, long, default_value = "")]
    env: String,
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    output: OutputFormat,
    /// Changed file (repeatable); bypasses git diff
    #[arg(long = "changed-file", value_name = "PATH")]
    changed_files: Vec<String>,
    /// Repository root
    #[arg(long, default_value = ".")]
    repo: PathBuf,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Serialized plan file (JSON or YAML)
    #[arg(long)]
    plan: PathBuf,
    /// Job id to execute
    #[arg(long)]
    job: String,
    /// Stream command output
    #[arg(long)]
    verbose: bool,
    /// Resolve commands without executing them
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct RepoArgs {
    /// Repository root
    #[arg(long, default_value = ".")]
    repo: PathBuf,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Plan(args) => plan(args).await,
            Command::Run(args) => run(args).await,
            Command::Providers(args) => providers(args).await,
            Command::Components(args) => components(args).await,
        }
    }
}

async fn plan(args: PlanArgs) -> anyhow::Result<()> {
    let target = match (&args.target, args.github, args.gitlab) {
        (Some(target), _, _) => target.clone(),
        (None, true, _) => "github".to_string(),
        (None, _, true) => "gitlab".to_string(),
        _ => bail!("target platform required: use --github or --gitlab"),
    };

    let root = args
        .repo
        .canonicalize()
        .with_context(|| format!("repository root '{}' not found", args.repo.display()))?;

    let intent_files = discover_intent_files(&root)?;
    if intent_files.is_empty() {
        bail!("no intent.yaml files found in repository");
    }
    let intents = load_intents(&intent_files)?;

    let changed_files = if args.changed_files.is_empty() {
        crate::git::changed_files(&root, &args.base, &args.head).await?
    } else {
        args.changed_files.clone()
    };

    let registry = load_registry(&root, &intents).await?;

    let request = PlanRequest {
        base_ref: args.base,
        head_ref: args.head,
        changed_files,
        repository_path: root.display().to_string(),
        intent_files: intent_files
            .iter()
            .map(|p| p.display().to_string())
            .collect(),
        target,
        mode: args.mode,
        changed_only: args.changed_only,
        environment: args.env,
        provider_overrides: Default::default(),
    };

    let plan = Planner::new(&registry)
        .generate_plan(&request, &intents)
        .context("failed to generate plan")?;

    let rendered = match args.output {
        OutputFormat::Json => serde_json::to_string_pretty(&plan)?,
        OutputFormat::Yaml => serde_yaml::to_string(&plan)?,
    };
    println!("{rendered}");
    Ok(())
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(&args.plan)
        .with_context(|| format!("failed to read plan '{}'", args.plan.display()))?;

    let is_yaml = matches!(
        args.plan.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let plan: Plan = if is_yaml {
        serde_yaml::from_str(&content).context("failed to parse plan YAML")?
    } else {
        serde_json::from_str(&content).context("failed to parse plan JSON")?
    };

    let Some(job) = plan.job(&args.job) else {
        let available: Vec<&str> = plan.jobs.iter().map(|j| j.id.as_str()).collect();
        bail!(
            "job '{}' not found in plan (available jobs: {})",
            args.job,
            available.join(", ")
        );
    };

    Executor::new(args.verbose, args.dry_run)
        .execute_job(job)
        .await?;
    Ok(())
}

async fn providers(args: RepoArgs) -> anyhow::Result<()> {
    let (intents, root) = load_repo(&args.repo)?;
    let registry = load_registry(&root, &intents).await?;

    for name in registry.list() {
        let provider = registry
            .get(&name)
            .context("provider listed but not registered")?;
        let actions: Vec<&str> = provider
            .thin_ci
            .actions
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        println!(
            "{}  {}  [{}]",
            provider.name,
            if provider.version.is_empty() {
                "-"
            } else {
                provider.version.as_str()
            },
            actions.join(", ")
        );
    }
    Ok(())
}

async fn components(args: RepoArgs) -> anyhow::Result<()> {
    let (intents, _) = load_repo(&args.repo)?;

    for intent in &intents {
        for component in &intent.components {
            println!(
                "{}  {}  ({})",
                component.name, component.component_type, intent.metadata.name
            );
        }
    }
    Ok(())
}

fn load_repo(repo: &Path) -> anyhow::Result<(Vec<Repository>, PathBuf)> {
    let root = repo
        .canonicalize()
        .with_context(|| format!("repository root '{}' not found", repo.display()))?;
    let intent_files = discover_intent_files(&root)?;
    if intent_files.is_empty() {
        bail!("no intent.yaml files found in repository");
    }
    Ok((load_intents(&intent_files)?, root))
}

async fn load_registry(
    root: &Path,
    intents: &[Repository],
) -> anyhow::Result<sourceplane_core::registry::ProviderRegistry> {
    let fetcher = match env::var("SOURCEPLANE_CACHE_PATH") {
        Ok(cache) if !cache.is_empty() => GitFetcher::new(PathBuf::from(cache).join("providers")),
        _ => GitFetcher::with_default_cache()?,
    };

    let registry = RegistryLoader::new(root, &fetcher)
        .load(intents)
        .await
        .context("failed to load providers")?;
    Ok(registry)
}
