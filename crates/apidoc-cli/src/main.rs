use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use apidoc_core::config::{self, ApidocConfig, CONFIG_FILE_NAME, OutputFormat};
use apidoc_core::parse::{self, spec::SwaggerSpec};
use apidoc_core::transform::analysis;
use apidoc_core::transform::{self, NormalizeOptions, NormalizeReport};

#[derive(Parser)]
#[command(name = "apidoc", about = "Swagger 2.0 schema-graph normalizer", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a Swagger spec and print the result
    Patch {
        /// Path to the Swagger spec file (YAML or JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output format; defaults to the config file's, then JSON
        #[arg(long)]
        format: Option<FormatArg>,

        /// Config file to use instead of ./.apidoc.yaml
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Check a Swagger spec for dangling references and reference cycles
    Validate {
        /// Path to the Swagger spec file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Show what normalization does to a spec
    Inspect {
        /// Path to the Swagger spec file
        #[arg(short, long)]
        input: PathBuf,

        /// Output format
        #[arg(long, default_value = "yaml")]
        format: FormatArg,
    },

    /// Initialize a new apidoc configuration
    Init {
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Json,
    Yaml,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Yaml => OutputFormat::Yaml,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Patch {
            input,
            format,
            config,
        } => cmd_patch(input, format, config),

        Commands::Validate { input } => cmd_validate(input),

        Commands::Inspect { input, format } => cmd_inspect(input, format),

        Commands::Init { force } => cmd_init(force),

        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            clap_complete::generate(shell, &mut cmd, "apidoc", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Load the config at `path`, or `./.apidoc.yaml` when no path is given.
/// An explicitly named file must exist.
fn load_config(path: Option<&Path>) -> Result<ApidocConfig> {
    match path {
        Some(path) => config::load_config(path)?
            .with_context(|| format!("config file {} not found", path.display())),
        None => Ok(config::load_config(Path::new(CONFIG_FILE_NAME))?.unwrap_or_default()),
    }
}

fn read_spec(path: &Path) -> Result<SwaggerSpec> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("yaml");

    let parsed = match ext {
        "json" => parse::from_json(&content),
        _ => parse::from_yaml(&content),
    }
    .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(parsed)
}

fn render(spec: &SwaggerSpec, format: OutputFormat) -> Result<String> {
    let text = match format {
        OutputFormat::Json => parse::to_json(spec)?,
        OutputFormat::Yaml => parse::to_yaml(spec)?,
    };
    Ok(text)
}

fn cmd_patch(input: PathBuf, format: Option<FormatArg>, config: Option<PathBuf>) -> Result<()> {
    let cfg = load_config(config.as_deref())?;
    let mut spec = read_spec(&input)?;

    let report = transform::normalize_with_options(&mut spec, &NormalizeOptions::from_config(&cfg))
        .with_context(|| format!("failed to normalize {}", input.display()))?;
    log::info!(
        "{} roots, synthesized {:?}, pruned {:?}",
        report.roots.len(),
        report.synthesized,
        report.pruned
    );

    let format = format.map(OutputFormat::from).unwrap_or(cfg.output.format);
    let output = render(&spec, format)?;
    println!("{}", output.trim_end());
    Ok(())
}

fn cmd_validate(input: PathBuf) -> Result<()> {
    let parsed = read_spec(&input)?;

    eprintln!(
        "Valid Swagger {} spec: {}",
        parsed.swagger, parsed.info.title
    );
    eprintln!("  Version: {}", parsed.info.version);
    eprintln!("  Paths: {}", parsed.paths.len());
    eprintln!("  Operations: {}", parsed.operation_count());
    eprintln!("  Definitions: {}", parsed.definitions.len());

    let dangling = analysis::dangling_references(&parsed);
    for reference in &dangling {
        eprintln!("  dangling reference: {reference}");
    }
    let cycles = analysis::find_cycles(&parsed);
    for cycle in &cycles {
        eprintln!("  reference cycle: {}", cycle.join(" -> "));
    }
    if !dangling.is_empty() {
        anyhow::bail!("{} dangling reference(s)", dangling.len());
    }

    // Also check that it normalizes into an acyclic document
    let mut normalized = parsed.clone();
    let report = transform::normalize(&mut normalized)?;
    let remaining = analysis::find_cycles(&normalized);
    if !remaining.is_empty() {
        anyhow::bail!("{} reference cycle(s) survive normalization", remaining.len());
    }
    eprintln!(
        "  Normalized: {} synthesized, {} pruned",
        report.synthesized.len(),
        report.pruned.len()
    );

    eprintln!("Validation successful.");
    Ok(())
}

fn cmd_inspect(input: PathBuf, format: FormatArg) -> Result<()> {
    let cfg = load_config(None)?;
    let mut spec = read_spec(&input)?;
    let before = counts(&spec);
    let report = transform::normalize_with_options(&mut spec, &NormalizeOptions::from_config(&cfg))?;

    let summary = build_inspect_summary(&spec, before, &report);

    match format {
        FormatArg::Yaml => {
            let yaml = serde_yaml_ng::to_string(&summary)?;
            print!("{}", yaml);
        }
        FormatArg::Json => {
            let json = serde_json::to_string_pretty(&summary)?;
            println!("{}", json);
        }
    }

    Ok(())
}

fn counts(spec: &SwaggerSpec) -> serde_json::Value {
    serde_json::json!({
        "paths": spec.paths.len(),
        "operations": spec.operation_count(),
        "definitions": spec.definitions.len(),
    })
}

fn build_inspect_summary(
    spec: &SwaggerSpec,
    before: serde_json::Value,
    report: &NormalizeReport,
) -> serde_json::Value {
    serde_json::json!({
        "info": {
            "title": spec.info.title,
            "version": spec.info.version,
        },
        "before": before,
        "after": counts(spec),
        "roots": report.roots,
        "synthesized": report.synthesized,
        "pruned": report.pruned,
        "unbroken": report.unbroken,
    })
}

fn cmd_init(force: bool) -> Result<()> {
    let config_path = PathBuf::from(CONFIG_FILE_NAME);

    if config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite.",
            config_path.display()
        );
    }

    fs::write(&config_path, config::default_config_content())?;
    eprintln!("Created {}", config_path.display());
    Ok(())
}
