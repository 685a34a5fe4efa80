//! qail-cte — inspect and render QAIL CTE definitions
//!
//! # Usage
//!
//! ```bash
//! # Parse a single CTE string
//! qail-cte parse "popular_posts AS (SELECT * FROM posts WHERE views_count > 100)"
//!
//! # Render a WITH prologue from the config file plus extra CTEs
//! qail-cte render "recent AS (SELECT * FROM posts LIMIT 10)" --select recent
//!
//! # Report names declared twice with different bodies
//! qail-cte check
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use qail_cte::config;
use qail_cte::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "qail-cte")]
#[command(author = "QAIL Contributors")]
#[command(version)]
#[command(about = "🪝 Composable WITH clauses for QAIL", long_about = None)]
#[command(after_help = "EXAMPLES:
    qail-cte parse 'popular_posts AS (SELECT * FROM posts WHERE views_count > 100)'
    qail-cte render 'a AS (SELECT 1)' 'b AS (SELECT * FROM a)' --select b
    qail-cte render --recursive 'tree AS (SELECT 1 UNION ALL SELECT n + 1 FROM tree)'
    qail-cte check --config qail-cte.toml")]
struct Cli {
    /// Config file (defaults to ./qail-cte.toml, then the user config dir)
    #[arg(short, long, global = true, env = "QAIL_CTE_CONFIG")]
    config: Option<PathBuf>,

    /// Output format (overrides the config file)
    #[arg(short, long, value_enum, global = true)]
    format: Option<OutputFormat>,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

impl From<config::OutputFormat> for OutputFormat {
    fn from(format: config::OutputFormat) -> Self {
        match format {
            config::OutputFormat::Text => OutputFormat::Text,
            config::OutputFormat::Json => OutputFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a `name AS (SELECT ...)` string and show its parts
    Parse {
        /// The CTE string
        cte: String,
    },
    /// Render the WITH prologue for the configured and given CTEs
    Render {
        /// Additional CTE strings, attached after the configured ones
        ctes: Vec<String>,

        /// Render WITH RECURSIVE
        #[arg(short, long)]
        recursive: bool,

        /// Append `SELECT * FROM <TABLE>` to the prologue
        #[arg(short, long, value_name = "TABLE")]
        select: Option<String>,
    },
    /// List definitions and names declared with conflicting bodies
    Check {
        /// Additional CTE strings, attached after the configured ones
        ctes: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = CteConfig::load(cli.config.as_deref()).context("failed to load config")?;
    init_logging(&config, cli.verbose);

    if !config.output.color {
        colored::control::set_override(false);
    }
    let format = cli.format.unwrap_or_else(|| config.output.format.into());

    match &cli.command {
        Commands::Parse { cte } => parse_cte_string(cte, format),
        Commands::Render {
            ctes,
            recursive,
            select,
        } => {
            let registry = build_registry(&config, ctes, *recursive)?;
            render(&registry, select.as_deref(), format)
        }
        Commands::Check { ctes } => {
            let registry = build_registry(&config, ctes, false)?;
            check(&registry, format)
        }
    }
}

fn init_logging(config: &CteConfig, verbose: bool) {
    let filter = EnvFilter::try_from_env("QAIL_CTE_LOG").unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { config.log.level.as_str() };
        EnvFilter::new(level)
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Configured CTEs first, then the command-line ones, in order.
fn build_registry(config: &CteConfig, ctes: &[String], recursive: bool) -> Result<CteRegistry> {
    let config = CteConfig {
        recursive: config.recursive || recursive,
        ..config.clone()
    };
    let base = config.registry().context("invalid CTE in config")?;
    if ctes.is_empty() {
        return Ok(base);
    }

    let args = ctes.iter().map(|c| WithArg::from(c.as_str())).collect();
    Ok(base.attach(args, config.recursive)?)
}

fn parse_cte_string(input: &str, format: OutputFormat) -> Result<()> {
    let cte = qail_cte::parse(input)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&cte)?);
        }
        OutputFormat::Text => {
            println!("{}", "🪝 QAIL CTE".cyan().bold());
            println!();
            println!("  {} {}", "Table:".dimmed(), cte.table_name.white());
            println!("  {} {}", "Expression:".dimmed(), cte.expression.yellow());
            println!();
            println!("{}", "Rendered:".green().bold());
            println!("  {}", cte.into_definition().to_string().white());
        }
    }
    Ok(())
}

fn render(registry: &CteRegistry, select: Option<&str>, format: OutputFormat) -> Result<()> {
    let sql = match select {
        Some(table) => QailCmd {
            ctes: registry.clone(),
            ..QailCmd::get(table)
        }
        .to_sql(),
        None => registry.render(),
    };

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "recursive": registry.is_recursive(),
                "definitions": registry.definitions(),
                "sql": sql,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            if sql.is_empty() {
                println!("{}", "(no CTEs)".dimmed());
            } else {
                println!("{}", "Generated SQL:".green().bold());
                println!("{}", sql.white());
            }
        }
    }
    Ok(())
}

fn check(registry: &CteRegistry, format: OutputFormat) -> Result<()> {
    let conflicts = registry.conflicts();

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "recursive": registry.is_recursive(),
                "names": registry.names(),
                "conflicts": conflicts,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            if registry.is_empty() {
                println!("{}", "(no CTEs)".dimmed());
            }
            for (i, def) in registry.definitions().iter().enumerate() {
                let name = if conflicts.contains(&def.name.as_str()) {
                    def.name.red().bold()
                } else {
                    def.name.cyan()
                };
                println!("{:>3}. {} {}", i + 1, name, def.body.to_sql().dimmed());
            }
            if registry.is_recursive() {
                println!();
                println!("{}", "WITH RECURSIVE".yellow());
            }
        }
    }

    if !conflicts.is_empty() {
        bail!(
            "{} CTE name(s) declared with different bodies: {}",
            conflicts.len(),
            conflicts.join(", ")
        );
    }
    if matches!(format, OutputFormat::Text) && !registry.is_empty() {
        println!();
        println!("{} {} CTE(s), no conflicts", "✓".green(), registry.names().len());
    }
    Ok(())
}
