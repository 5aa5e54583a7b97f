//! Pipegraph CLI
//!
//! Batch front end over the topology engine:
//! - `run` — full reconstruction pass (direction fix, size arrays, length
//!   check, weld placement) over a document snapshot
//! - `check-lengths` — stock-length compliance report only
//! - `welds` — compute and export the flat weld-marker list
//! - `viz` — supply-forest graph description (DOT/JSON)
//!
//! All mutation happens against the snapshot file atomically: a fatal error
//! anywhere leaves it byte-identical.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use pipegraph_model::{Document, Tolerances};
use pipegraph_model::stock::StockTable;
use pipegraph_topology::{self as topology, runner};

mod viz;

#[derive(Parser)]
#[command(name = "pipegraph")]
#[command(
    author,
    version,
    about = "Pipegraph: pipe-network topology reconstruction and fabrication artifacts"
)]
struct Cli {
    /// Verbose logging (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Tolerance configuration JSON (defaults apply when omitted)
    #[arg(long, global = true)]
    tolerances: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full reconstruction pass; rewrites the snapshot on success.
    Run {
        /// Document snapshot JSON
        snapshot: PathBuf,
        /// Stock-length configuration JSON
        #[arg(short, long)]
        stock: PathBuf,
        /// Write the run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
        /// Compute everything but do not rewrite the snapshot
        #[arg(long)]
        dry_run: bool,
    },

    /// Stock-length compliance report; never mutates the snapshot.
    CheckLengths {
        snapshot: PathBuf,
        #[arg(short, long)]
        stock: PathBuf,
        /// Restrict to one pipeline by name
        #[arg(long)]
        pipeline: Option<String>,
    },

    /// Compute weld markers and export the flat list as JSON.
    Welds {
        snapshot: PathBuf,
        #[arg(short, long)]
        stock: PathBuf,
        /// Output path (stdout when omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Export the supply forest for external visualization.
    Viz {
        snapshot: PathBuf,
        /// Output format: dot|json
        #[arg(short, long, default_value = "dot")]
        format: String,
        /// Output path (stdout when omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let tol = load_tolerances(cli.tolerances.as_deref())?;

    match cli.command {
        Commands::Run {
            snapshot,
            stock,
            report,
            dry_run,
        } => cmd_run(&snapshot, &stock, report.as_deref(), dry_run, &tol),
        Commands::CheckLengths {
            snapshot,
            stock,
            pipeline,
        } => cmd_check_lengths(&snapshot, &stock, pipeline.as_deref(), &tol),
        Commands::Welds {
            snapshot,
            stock,
            out,
        } => cmd_welds(&snapshot, &stock, out.as_deref(), &tol),
        Commands::Viz {
            snapshot,
            format,
            out,
        } => cmd_viz(&snapshot, &format, out.as_deref(), &tol),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn load_tolerances(path: Option<&std::path::Path>) -> Result<Tolerances> {
    match path {
        Some(p) => {
            let json = fs::read_to_string(p)
                .with_context(|| format!("reading tolerances {}", p.display()))?;
            Ok(serde_json::from_str(&json)?)
        }
        None => Ok(Tolerances::default()),
    }
}

fn load_inputs(
    snapshot: &std::path::Path,
    stock: &std::path::Path,
) -> Result<(Document, StockTable)> {
    let doc = Document::load(snapshot)
        .with_context(|| format!("loading snapshot {}", snapshot.display()))?;
    let stock = StockTable::load(stock)
        .with_context(|| format!("loading stock lengths {}", stock.display()))?;
    Ok((doc, stock))
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_run(
    snapshot: &std::path::Path,
    stock_path: &std::path::Path,
    report_path: Option<&std::path::Path>,
    dry_run: bool,
    tol: &Tolerances,
) -> Result<()> {
    let (mut doc, stock) = load_inputs(snapshot, stock_path)?;

    let outcome = runner::full_run(&mut doc, &stock, tol)?;

    if dry_run {
        println!("{}", "dry run: snapshot not rewritten".yellow());
    } else {
        doc.save_atomic(snapshot)?;
    }

    if let Some(path) = report_path {
        fs::write(path, serde_json::to_string_pretty(&outcome.report)?)?;
    }

    print_summary(&outcome.report);
    Ok(())
}

fn cmd_check_lengths(
    snapshot: &std::path::Path,
    stock_path: &std::path::Path,
    only: Option<&str>,
    tol: &Tolerances,
) -> Result<()> {
    let (doc, stock) = load_inputs(snapshot, stock_path)?;

    let pipelines = topology::assemble(&doc, tol)?;
    let forest = topology::build_forest(pipelines, &doc, tol)?;

    let mut total_ok = 0usize;
    let mut total_bad = 0usize;
    for node_id in forest.depth_first() {
        let pipeline = &forest.node(node_id).pipeline;
        if only.map_or(false, |name| name != pipeline.name) {
            continue;
        }
        let anchor = topology::direction::connection_station(&forest, node_id, &doc, tol)
            .unwrap_or(0.0);
        let report = topology::check_lengths(pipeline, anchor, &doc, &stock, tol)?;
        total_ok += report.ok;
        total_bad += report.mismatches.len();
        for line in summarize_lengths(&report) {
            println!("{line}");
        }
    }

    let status = format!("{total_ok} compliant, {total_bad} mismatches");
    if total_bad == 0 {
        println!("{}", status.green());
    } else {
        println!("{}", status.yellow());
    }
    Ok(())
}

fn cmd_welds(
    snapshot: &std::path::Path,
    stock_path: &std::path::Path,
    out: Option<&std::path::Path>,
    tol: &Tolerances,
) -> Result<()> {
    let (mut doc, stock) = load_inputs(snapshot, stock_path)?;

    // Welds need canonical direction and size arrays first; run the stages
    // in memory without persisting.
    let outcome = runner::full_run(&mut doc, &stock, tol)?;
    let json = serde_json::to_string_pretty(&outcome.placement)?;

    match out {
        Some(path) => {
            fs::write(path, json)?;
            println!(
                "{} welds to {}",
                outcome.placement.welds.len(),
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_viz(
    snapshot: &std::path::Path,
    format: &str,
    out: Option<&std::path::Path>,
    tol: &Tolerances,
) -> Result<()> {
    let format = viz::VizFormat::parse(format)?;
    let doc = Document::load(snapshot)
        .with_context(|| format!("loading snapshot {}", snapshot.display()))?;

    let pipelines = topology::assemble(&doc, tol)?;
    let forest = topology::build_forest(pipelines, &doc, tol)?;

    let graph = viz::forest_graph(&forest, &doc);
    let rendered = viz::render(&graph, format)?;
    match out {
        Some(path) => fs::write(path, rendered)?,
        None => print!("{rendered}"),
    }
    Ok(())
}

// ============================================================================
// Output helpers
// ============================================================================

fn print_summary(report: &topology::RunReport) {
    println!("{}", "— run summary —".bold());
    for line in report.summary().lines() {
        if line.starts_with("warning:") {
            println!("{}", line.yellow());
        } else {
            println!("{line}");
        }
    }
    let soft = report.soft_error_count();
    if soft == 0 {
        println!("{}", "ok".green().bold());
    } else {
        println!("{}", format!("{soft} soft errors").yellow().bold());
    }
}

fn summarize_lengths(report: &topology::LengthReport) -> Vec<String> {
    let mut lines = vec![format!(
        "{}: {} ok, {} mismatches, {} correctable",
        report.pipeline,
        report.ok,
        report.mismatches.len(),
        report.candidates.len()
    )];
    for m in &report.mismatches {
        lines.push(format!("  run #{}: length {:.3}", m.run, m.length));
    }
    lines
}
