//! clientgen CLI entrypoint
//! Parses command-line arguments and dispatches to the core generator.

// Internal imports (std, crate)
use std::path::PathBuf;
use std::process::ExitCode;

// External imports (alphabetized)
use anyhow::Context;
use clap::Parser;
use clientgen_core::{emit, Config, Generator, RegistryScope, TemplateKind};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "clientgen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand
#[derive(clap::Args, Debug)]
struct SchemaArgs {
    /// Path or URL to the service schema (YAML or JSON)
    ///
    /// Can be a local file path or an HTTP/HTTPS URL
    /// Example: --schema design/pets.yaml
    /// Example: --schema https://example.com/pets.json
    #[arg(long)]
    schema: Option<String>,
    /// Configuration file (YAML or TOML); flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
    /// Lifetime of the declaration registry
    #[arg(long, value_enum)]
    scope: Option<RegistryScope>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Generate the client types of every service in a schema
    Generate {
        #[command(flatten)]
        schema: SchemaArgs,
        /// Root directory of the generated tree (default: gen)
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Package path generated code imports service modules from
        #[arg(long)]
        genpkg: Option<String>,
        /// Number of services generated concurrently (default: CPU count)
        #[arg(long)]
        workers: Option<usize>,
        /// Template set to render with
        #[arg(long, value_enum)]
        template_kind: Option<TemplateKind>,
        /// Custom template directory (only used with --template-kind=custom)
        #[arg(long)]
        template_dir: Option<PathBuf>,
        /// Print the artifact paths instead of writing them
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the section plan of each service
    Plan {
        #[command(flatten)]
        schema: SchemaArgs,
        /// Only plan the service with this name
        #[arg(long)]
        service: Option<String>,
        /// Print plans as JSON
        #[arg(long)]
        json: bool,
    },
}

async fn load_config(args: &SchemaArgs) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .await
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => {
            let schema = args
                .schema
                .clone()
                .context("Either --schema or --config is required")?;
            Config::new(schema, "gen")
        }
    };
    if let Some(schema) = &args.schema {
        config.schema = schema.clone();
    }
    if let Some(scope) = args.scope {
        config.registry_scope = scope;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Generate {
            schema,
            output_dir,
            genpkg,
            workers,
            template_kind,
            template_dir,
            dry_run,
        } => {
            let mut config = load_config(&schema).await?;
            if let Some(dir) = output_dir {
                config.output_dir = dir.to_string_lossy().to_string();
            }
            if let Some(genpkg) = genpkg {
                config.genpkg = genpkg;
            }
            if workers.is_some() {
                config.workers = workers;
            }
            if let Some(kind) = template_kind {
                config.template_kind = kind;
            }
            if let Some(dir) = template_dir {
                config.template_dir = Some(dir.to_string_lossy().to_string());
            }
            tracing::debug!(?config, "Resolved configuration");

            let location = config.schema.clone();
            let generator = Generator::from_config(config)
                .await
                .with_context(|| format!("Failed to prepare generation for {location}"))?;
            let report = generator.run().await.context("Generation failed")?;

            if dry_run {
                for artifact in report.artifacts() {
                    println!("{}", artifact.path.display());
                }
            } else {
                let written = emit::write_artifacts(report.artifacts())
                    .await
                    .context("Failed to write artifacts")?;
                println!("✅ Generated {} artifacts", written);
            }

            let mut failed = false;
            for (service, err) in report.failures() {
                eprintln!("❌ {service}: [{}] {err}", err.kind());
                failed = true;
            }
            Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
        }
        Commands::Plan {
            schema,
            service,
            json,
        } => {
            let config = load_config(&schema).await?;
            let location = config.schema.clone();
            let generator = Generator::from_config(config)
                .await
                .with_context(|| format!("Failed to load schema {location}"))?;
            let plans = generator.plans(service.as_deref())?;

            let mut failed = false;
            for (name, plan) in plans {
                match plan {
                    Ok(plan) if json => println!("{}", serde_json::to_string_pretty(&plan)?),
                    Ok(plan) => {
                        println!("{name}");
                        for section in &plan.sections {
                            println!("  {:<24} {}", section.kind.as_str(), section.name);
                        }
                    }
                    Err(err) => {
                        eprintln!("❌ {name}: [{}] {err}", err.kind());
                        failed = true;
                    }
                }
            }
            Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
        }
    }
}
