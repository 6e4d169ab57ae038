use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use lesiongraph::config::{load_config, AppConfig};
use lesiongraph::error::LesionError;
use lesiongraph::format::format_value;
use lesiongraph::graph::measurement_history;
use lesiongraph::store::Catalog;

/// lesiongraph: lesion connectivity and trajectories across imaging studies
#[derive(Parser)]
#[command(name = "lesiongraph")]
#[command(
    about = "Tracks lesion segments across studies: connections, related segments, trajectories."
)]
#[command(version)]
struct Cli {
    /// JSON file with the studies (an array, or an object with a `studies` key)
    #[arg(short, long, global = true, env = "LESIONGRAPH_DATA")]
    data: Option<PathBuf>,
    /// Extra configuration file layered over `lesiongraph.toml`
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Log filter, overrides RUST_LOG and the configured level
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show counts, the baseline study and the catalog generation
    Summary,
    /// List every parent segment with its children
    Connections,
    /// List the segments connected to a segment in either direction
    Related {
        #[arg(short, long)]
        segment: String,
    },
    /// Show the trajectory of a segment grouped by study, then its measurement history
    Trajectory {
        #[arg(short, long)]
        segment: String,
    },
    /// Print the graph view as JSON, optionally highlighting a selection
    Graph {
        #[arg(short, long)]
        segment: Option<String>,
    },
    /// Bucket segments by classification with their ancestors
    Groups,
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration failed: {}", e);
            std::process::exit(1);
        }
    };
    init_tracing(&config, cli.log_level.as_deref());

    if let Err(e) = run(cli, &config) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(config: &AppConfig, log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(cli: Cli, config: &AppConfig) -> Result<()> {
    let data = cli
        .data
        .ok_or_else(|| LesionError::InvalidInput("--data <FILE> is required".into()))?;
    let mut catalog = Catalog::from_json_file(&data)
        .with_context(|| format!("failed to load studies from {}", data.display()))?;
    info!(path = %data.display(), "catalog ready");

    let decimals = config.display.decimals;
    match cli.command {
        Commands::Summary => cmd_summary(&catalog),
        Commands::Connections => cmd_connections(&catalog),
        Commands::Related { segment } => {
            select(&mut catalog, &segment)?;
            cmd_related(&mut catalog, &segment);
        }
        Commands::Trajectory { segment } => {
            select(&mut catalog, &segment)?;
            cmd_trajectory(&catalog, decimals);
        }
        Commands::Graph { segment } => {
            if let Some(segment) = &segment {
                select(&mut catalog, segment)?;
            }
            let view = catalog.graph_view();
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Commands::Groups => cmd_groups(&catalog, config),
    }
    Ok(())
}

fn select(catalog: &mut Catalog, segment_id: &str) -> Result<()> {
    catalog.require_segment(segment_id)?;
    catalog.select(Some(segment_id));
    debug!(segment_id, "selection changed");
    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_summary(catalog: &Catalog) {
    let summary = catalog.summary();
    println!("  Studies:     {}", summary.studies);
    println!("  Series:      {}", summary.series);
    println!("  Segments:    {}", summary.segments);
    println!("  Connections: {}", summary.connections);
    println!(
        "  Baseline:    {}",
        summary.baseline_study_id.as_deref().unwrap_or("(none)")
    );
    println!("  Generation:  {}", summary.generation);
}

fn cmd_connections(catalog: &Catalog) {
    let connections = catalog.connections();
    if connections.is_empty() {
        println!("  No connections.");
        return;
    }
    for (parent, children) in connections.iter() {
        let children: Vec<&str> = children.iter().map(String::as_str).collect();
        println!("  {} -> {}", parent, children.join(", "));
    }
}

fn cmd_related(catalog: &mut Catalog, segment_id: &str) {
    let related = catalog.related();
    if related.is_empty() {
        println!("  '{}' has no related segments.", segment_id);
        return;
    }
    println!("  Related to '{}' ({}):", segment_id, related.len());
    for id in related {
        println!("    - {}", id);
    }
}

fn cmd_trajectory(catalog: &Catalog, decimals: usize) {
    let groups = catalog.trajectory();
    for group in &groups {
        let mut flags = Vec::new();
        if group.has_split {
            flags.push("split");
        }
        if group.has_merge {
            flags.push("merge");
        }
        println!(
            "  {} ({}) volume {}{}",
            group.study.study_date,
            group.study.study_id,
            format_value(Some(group.total_volume), decimals),
            if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            }
        );
        for entry in &group.segments {
            let marker = if entry.is_selected { "*" } else { "-" };
            println!(
                "    {} {} '{}' volume {} axial {}",
                marker,
                entry.segment.id,
                entry.segment.label,
                format_value(entry.segment.volume, decimals),
                format_value(entry.segment.axial_diameter, decimals)
            );
        }
    }

    let history = measurement_history(&groups);
    if history.is_empty() {
        return;
    }
    println!();
    println!("  Measurement history:");
    for row in &history {
        println!(
            "    {:<11} {:<12} volume {} ({}%)  axial {} ({}%)",
            row.control,
            row.date,
            format_value(Some(row.volume), decimals),
            format_value(row.volume_change, decimals),
            format_value(row.axial_diameter, decimals),
            format_value(row.axial_diameter_change, decimals)
        );
    }
}

fn cmd_groups(catalog: &Catalog, config: &AppConfig) {
    let groups = catalog.classification_groups(config.groups.default_classification);
    for (classification, segments) in &groups {
        println!("  {} ({}):", classification, segments.len());
        for grouped in segments {
            let ancestors: Vec<&str> = grouped.ancestors.iter().map(String::as_str).collect();
            if ancestors.is_empty() {
                println!("    - {}", grouped.segment.id);
            } else {
                println!("    - {} <- {}", grouped.segment.id, ancestors.join(", "));
            }
        }
    }
}
