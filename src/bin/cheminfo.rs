//! cheminfo CLI
//!
//! Release assistant for the npm packages of the cheminfo and mljs
//! organizations

use anyhow::Result;
use cheminfo_tools::{
    BumpType, Collaborators, CommandExecutor, ConfigLoadOptions, ConfigLoader,
    ConventionalChangelog, DocsOutcome, DocsPlugin, GitPlugin, HttpTemplateSource, NpmPlugin,
    PublishConfig, RegistryConfig, ReleaseError, ReleaseOptions, ReleaseOrchestrator,
    ReleaseOutcome, ReleaseSettings, Reporter, TerminalPrompter,
};
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

/// Release assistant for cheminfo and mljs packages
#[derive(Parser)]
#[command(name = "cheminfo")]
#[command(version)]
#[command(about = "Release assistant for cheminfo and mljs packages", long_about = None)]
struct Cli {
    /// Print debug traces
    #[arg(short, long, global = true)]
    verbose: bool,

    /// npm registry URL (overrides the configuration)
    #[arg(long, global = true, value_name = "URL")]
    registry: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bump, tag and publish the package to npm
    #[command(alias = "release")]
    Publish {
        /// Kind of version bump (asked interactively when omitted)
        #[arg(short, long, value_enum)]
        bump: Option<BumpType>,

        /// npm organization (inferred from package.json when omitted)
        #[arg(short, long)]
        org: Option<String>,

        /// Skip the up-to-date check and the tests
        #[arg(short, long)]
        force: bool,

        /// Do not build and publish the documentation
        #[arg(long)]
        no_docs: bool,

        /// npm two-factor one-time password
        #[arg(long)]
        otp: Option<String>,

        /// Move the repository to releases from GitHub actions afterwards
        #[arg(long)]
        migrate: bool,

        /// Project path (defaults to current directory)
        #[arg(short = 'C', value_name = "PATH")]
        project_path: Option<PathBuf>,
    },

    /// Build the documentation
    #[command(alias = "docs")]
    Doc {
        /// Push the documentation to the pages branch
        #[arg(long)]
        publish: bool,

        /// Skip the up-to-date check
        #[arg(short, long)]
        force: bool,

        /// Project path (defaults to current directory)
        #[arg(short = 'C', value_name = "PATH")]
        project_path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match run(cli).await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            Reporter::default().error(&format!("{:#}", e));
            process::exit(1);
        }
    }
}

fn init_logger(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.format_timestamp(None).init();
}

/// Configuration layer made of the command-line flags
fn cli_overrides(registry: Option<String>) -> Option<PublishConfig> {
    let url = registry?;
    Some(PublishConfig {
        registry: Some(RegistryConfig {
            url: Some(url),
            tool_name: None,
        }),
        ..Default::default()
    })
}

async fn run(cli: Cli) -> Result<i32> {
    let overrides = cli_overrides(cli.registry);

    match cli.command {
        Commands::Publish {
            bump,
            org,
            force,
            no_docs,
            otp,
            migrate,
            project_path,
        } => {
            let path = project_path.unwrap_or_else(|| PathBuf::from("."));
            let options = ReleaseOptions {
                bump,
                org,
                force,
                docs: !no_docs,
                otp: otp.map(SecretString::from),
                migrate,
            };
            publish_command(path, overrides, options).await
        }
        Commands::Doc {
            publish,
            force,
            project_path,
        } => {
            let path = project_path.unwrap_or_else(|| PathBuf::from("."));
            doc_command(path, overrides, publish, force).await
        }
    }
}

async fn load_settings(
    project_path: &Path,
    overrides: Option<PublishConfig>,
) -> Result<ReleaseSettings> {
    let options = ConfigLoadOptions {
        cli_args: overrides,
        ..ConfigLoadOptions::from_env(project_path)
    };
    let config = ConfigLoader::load(options).await?;

    let validation = ConfigLoader::validate(&config);
    if !validation.valid || !validation.warnings.is_empty() {
        eprintln!("{}", ConfigLoader::format_validation_result(&validation));
    }
    if !validation.valid {
        anyhow::bail!("invalid configuration");
    }

    Ok(ReleaseSettings::from_config(
        &config,
        env!("CARGO_PKG_VERSION"),
    ))
}

fn build_orchestrator(
    project_path: &Path,
    settings: ReleaseSettings,
) -> Result<ReleaseOrchestrator> {
    let executor = CommandExecutor::new(project_path)?;
    let prompter = Arc::new(TerminalPrompter::new());
    let npm = Arc::new(
        NpmPlugin::new(executor.clone(), &settings.registry_url)
            .with_test_script(&settings.test_script),
    );

    let collaborators = Collaborators {
        vcs: Arc::new(GitPlugin::new(executor.clone())),
        registry: npm.clone(),
        tests: npm,
        changelog: Arc::new(ConventionalChangelog::new(executor.clone())),
        docs: Arc::new(DocsPlugin::new(
            executor,
            prompter.clone(),
            &settings.docs_dir,
            &settings.pages_branch,
        )),
        templates: Arc::new(HttpTemplateSource::new()),
        prompter,
    };

    Ok(ReleaseOrchestrator::new(settings, project_path, collaborators))
}

/// Print a release error with its suggestions
fn report_error(reporter: &Reporter, error: &ReleaseError) {
    log::debug!("error code: {}", error.code());
    reporter.error(&error.to_string());
    reporter.suggestions(&error.suggested_actions());
}

async fn publish_command(
    project_path: PathBuf,
    overrides: Option<PublishConfig>,
    options: ReleaseOptions,
) -> Result<i32> {
    println!("\n📦 cheminfo publish\n");

    let settings = load_settings(&project_path, overrides).await?;
    let orchestrator = build_orchestrator(&project_path, settings)?;
    let reporter = Reporter::default();

    match orchestrator.run(&options).await {
        Ok(report) => match report.outcome {
            ReleaseOutcome::Published => {
                if let (Some(name), Some(version)) = (&report.package_name, &report.new_version) {
                    println!("\n✅ Published {}@{}", name, version);
                }
                if !report.warnings.is_empty() {
                    println!("\n{} step(s) need manual attention", report.warnings.len());
                }
                log::debug!("{}", report.steps.history());
                Ok(0)
            }
            ReleaseOutcome::Cancelled { reason } => {
                println!("\nRelease cancelled ({})", reason);
                Ok(0)
            }
        },
        Err(e) => {
            report_error(&reporter, &e);
            Ok(1)
        }
    }
}

async fn doc_command(
    project_path: PathBuf,
    overrides: Option<PublishConfig>,
    publish: bool,
    force: bool,
) -> Result<i32> {
    println!("\n📚 cheminfo doc\n");

    let settings = load_settings(&project_path, overrides).await?;
    let orchestrator = build_orchestrator(&project_path, settings)?;
    let reporter = Reporter::default();

    match orchestrator.run_docs(publish, force).await {
        Ok(DocsOutcome::Built) => {
            println!("\n✅ Documentation built");
            Ok(0)
        }
        Ok(DocsOutcome::Published) => {
            println!("\n✅ Documentation published");
            Ok(0)
        }
        Ok(DocsOutcome::Declined) => Ok(0),
        Err(e) => {
            report_error(&reporter, &e);
            Ok(1)
        }
    }
}
