use clap::{ArgAction, Parser, ValueEnum};
use log::{info, LevelFilter};
use serde_json::json;
use shapeopt::compare::format_table;
use shapeopt::{
    compare, DataGraph, Query, RewriteConfig, RewritePolicy, Rewriter, ShapeModel, Validator,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Set the base log level (use -v / -q to adjust relative to this level)
    #[arg(
        long,
        value_enum,
        default_value_t = LogLevel::Info,
        global = true,
        help = "error | warn | info | debug | trace"
    )]
    log_level: LogLevel,

    /// Increase logging verbosity (can be used multiple times)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Decrease logging verbosity (can be used multiple times)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn init_logging(base: LogLevel, verbose: u8, quiet: u8) {
    let levels = [
        LevelFilter::Error,
        LevelFilter::Warn,
        LevelFilter::Info,
        LevelFilter::Debug,
        LevelFilter::Trace,
    ];

    let base_idx = levels
        .iter()
        .position(|lvl| *lvl == base.to_filter())
        .unwrap_or(2) as i8; // default to Info
    let adjusted =
        (base_idx + verbose as i8 - quiet as i8).clamp(0, (levels.len() - 1) as i8) as usize;

    env_logger::Builder::from_default_env()
        .format_target(false)
        .filter_level(levels[adjusted])
        .init();
}

#[derive(Parser, Debug)]
struct CommonArgs {
    /// Path to the SHACL shapes file (Turtle)
    #[arg(short, long, value_name = "FILE")]
    shapes_file: PathBuf,

    /// Path to the data file (Turtle)
    #[arg(short, long, value_name = "FILE")]
    data_file: PathBuf,
}

#[derive(Parser, Debug)]
struct RewriteCli {
    /// Path to the SPARQL query to rewrite
    #[arg(long, value_name = "FILE")]
    query_file: PathBuf,

    /// strict | legacy
    #[arg(long, default_value_t = RewritePolicy::Strict)]
    policy: RewritePolicy,

    /// Maximum number of rewrite passes
    #[arg(long, default_value_t = 10)]
    max_iterations: usize,

    /// Print the query before and after every applied rule
    #[arg(long)]
    trace: bool,
}

impl RewriteCli {
    fn config(&self) -> RewriteConfig {
        RewriteConfig::default()
            .with_policy(self.policy)
            .with_max_iterations(self.max_iterations)
            .with_trace(self.trace)
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ValidateOutputFormat {
    Dump,
    Json,
}

#[derive(Parser)]
struct ValidateArgs {
    #[clap(flatten)]
    common: CommonArgs,

    #[arg(long, value_enum, default_value_t = ValidateOutputFormat::Dump)]
    format: ValidateOutputFormat,
}

#[derive(Parser)]
struct RewriteArgs {
    #[clap(flatten)]
    common: CommonArgs,

    #[clap(flatten)]
    rewrite: RewriteCli,

    /// Print the rewrite statistics as JSON after the query
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct CompareArgs {
    #[clap(flatten)]
    common: CommonArgs,

    #[clap(flatten)]
    rewrite: RewriteCli,

    /// Number of timed executions of each query, after one untimed warm-up
    #[arg(long, default_value_t = 1)]
    runs: usize,

    /// Print a JSON summary instead of the queries and result tables
    #[arg(long)]
    json: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Validate the data against the shapes
    Validate(ValidateArgs),
    /// Validate the data, then print the query rewritten against the shapes
    Rewrite(RewriteArgs),
    /// Validate, rewrite, then execute and time both queries
    Compare(CompareArgs),
}

fn load(common: &CommonArgs) -> Result<(ShapeModel, DataGraph), Box<dyn std::error::Error>> {
    let model = ShapeModel::from_file(&common.shapes_file)?;
    let data = DataGraph::from_file(&common.data_file)?;
    Ok((model, data))
}

fn read_query(path: &Path) -> Result<Query, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read query file {}: {}", path.display(), e))?;
    Ok(Query::parse(&text)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.verbose, cli.quiet);

    match cli.command {
        Commands::Validate(args) => {
            let (model, data) = load(&args.common)?;
            let report = Validator::new(&model).validate(&data)?;
            match args.format {
                ValidateOutputFormat::Dump => println!("{}", report),
                ValidateOutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&report.to_json())?)
                }
            }
            if !report.conforms() {
                process::exit(1);
            }
        }
        Commands::Rewrite(args) => {
            let (model, data) = load(&args.common)?;
            let query = read_query(&args.rewrite.query_file)?;
            let report = Validator::new(&model).validate(&data)?;
            let rewriter = Rewriter::new(report.validated()?, args.rewrite.config());
            let rewrite = rewriter.rewrite(&query);

            for applied in &rewrite.applied {
                info!(
                    "Applied {} for {} ({} edit(s))",
                    applied.rule, applied.path, applied.edits
                );
            }
            if args.rewrite.trace {
                eprintln!("{}", rewrite.format_trace());
            }
            println!("{}", rewrite.query);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&rewrite.stats)?);
            }
        }
        Commands::Compare(args) => {
            let (model, data) = load(&args.common)?;
            let query = read_query(&args.rewrite.query_file)?;
            let report = Validator::new(&model).validate(&data)?;
            let rewriter = Rewriter::new(report.validated()?, args.rewrite.config());
            let rewrite = rewriter.rewrite(&query);
            if args.rewrite.trace {
                eprintln!("{}", rewrite.format_trace());
            }

            let comparison = compare(&data, &query, &rewrite.query, args.runs)?;

            if args.json {
                let summary = json!({
                    "policy": args.rewrite.policy,
                    "original": query.to_string(),
                    "rewritten": rewrite.query.to_string(),
                    "stats": rewrite.stats,
                    "comparison": comparison.to_json(),
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Original query:\n{}\n", query);
                println!("{}\n", format_table(&comparison.original.rows));
                println!("-----------------------------\n");
                println!("Rewritten query:\n{}\n", rewrite.query);
                println!("{}\n", format_table(&comparison.rewritten.rows));
                println!(
                    "Original time:  {:.6} s (mean of {} run(s))",
                    comparison.original.timing.mean_secs, comparison.original.timing.runs
                );
                println!(
                    "Rewritten time: {:.6} s (mean of {} run(s))",
                    comparison.rewritten.timing.mean_secs, comparison.rewritten.timing.runs
                );
                if let Some(speedup) = comparison.speedup() {
                    println!("Speedup: {:.2}x", speedup);
                }
                println!("Results match: {}", comparison.results_match);
            }
            if !comparison.results_match {
                process::exit(2);
            }
        }
    }

    Ok(())
}
