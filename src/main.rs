use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use sylvan_data::{ClassColumn, Dataset, DatasetReader};
use sylvan_forest::{
    BinaryCounts, CascadeConfig, DecisionTreeConfig, ForestConfig, ForestError, RandomFeatures,
    RandomForest, Sampling,
};

#[derive(Parser)]
#[command(name = "sylvan")]
#[command(about = "CART decision trees and Random Forests with out-of-bag evaluation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel classification (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Input dataset options shared by every subcommand.
#[derive(Args, Debug, Clone)]
struct DataArgs {
    /// Path to the delimited input file
    #[arg(long)]
    data: PathBuf,

    /// Class column, by header name or zero-based index (defaults to the last column)
    #[arg(long)]
    class: Option<String>,

    /// Field delimiter
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// The input file has no header row
    #[arg(long, default_value_t = false)]
    no_header: bool,

    /// Class label treated as positive (moved to the front of the value space)
    #[arg(long)]
    positive: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Build a single CART tree and report its training accuracy
    Cart {
        #[command(flatten)]
        input: DataArgs,

        /// Print the tree to stderr
        #[arg(long, default_value_t = false)]
        print_tree: bool,
    },

    /// Build a Random Forest with out-of-bag statistics
    Forest {
        #[command(flatten)]
        input: DataArgs,

        /// Number of trees
        #[arg(long, default_value_t = 100)]
        n_tree: usize,

        /// Attributes searched per split (defaults to round(sqrt(#attributes)))
        #[arg(long)]
        n_random_feature: Option<usize>,

        /// Search every attribute at every split
        #[arg(long, default_value_t = false, conflicts_with = "n_random_feature")]
        all_features: bool,

        /// Bag size as a percentage of the rows
        #[arg(long, default_value_t = 66)]
        percent_boot: usize,

        /// Draw distinct rows into each bag
        #[arg(long, default_value_t = false)]
        without_replacement: bool,

        /// Skip the per-tree out-of-bag pass
        #[arg(long, default_value_t = false)]
        no_oob: bool,

        /// Statistics file: one row per tree plus a totals row
        #[arg(long)]
        stats_file: Option<PathBuf>,

        /// Save the trained forest to this path
        #[arg(long)]
        model: Option<PathBuf>,
    },

    /// Build a cascade of small forests
    Cascade {
        #[command(flatten)]
        input: DataArgs,

        /// Maximum number of stages
        #[arg(long, default_value_t = 200)]
        n_stage: usize,

        /// Maximum number of trees per stage
        #[arg(long, default_value_t = 1)]
        n_tree: usize,

        /// Bag size as a percentage of each stage's rows
        #[arg(long, default_value_t = 66)]
        percent_boot: usize,

        /// OOB TP rate a stage must exceed to stop adding trees
        #[arg(long, default_value_t = 0.9)]
        tp_rate: f64,

        /// OOB TN rate a stage must exceed to stop adding trees
        #[arg(long, default_value_t = 0.7)]
        tn_rate: f64,

        /// Statistics file: one row per stage plus a totals row
        #[arg(long)]
        stats_file: Option<PathBuf>,
    },

    /// Classify a dataset with a saved forest
    Classify {
        #[command(flatten)]
        input: DataArgs,

        /// Path to the trained model binary
        #[arg(long)]
        model: PathBuf,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct CartOutput {
    n_rows: usize,
    n_nodes: usize,
    n_leaves: usize,
    depth: usize,
    training_accuracy: f64,
}

#[derive(Serialize)]
struct ForestOutput {
    n_rows: usize,
    n_trees: usize,
    n_random_feature: usize,
    n_subsample: usize,
    oob_error: f64,
    oob_error_mean: f64,
    oob_counts: BinaryCounts,
    f_measure: f64,
    training_accuracy: f64,
    model: Option<PathBuf>,
}

#[derive(Serialize)]
struct CascadeOutput {
    n_rows: usize,
    n_stages: usize,
    stage_weights: Vec<f64>,
    oob_error_mean: f64,
    training_accuracy: f64,
}

#[derive(Serialize)]
struct ClassifyOutput {
    n_rows: usize,
    model_n_trees: usize,
    accuracy: Option<f64>,
    predictions: Vec<String>,
}

fn read_dataset(args: &DataArgs) -> Result<Dataset> {
    let delimiter =
        u8::try_from(args.delimiter).context("delimiter must be a single ASCII character")?;
    let class_column = match &args.class {
        None => ClassColumn::Last,
        Some(s) => s
            .parse::<usize>()
            .map_or_else(|_| ClassColumn::Name(s.clone()), ClassColumn::Index),
    };
    let mut dataset = DatasetReader::new(&args.data)
        .with_delimiter(delimiter)
        .with_header(!args.no_header)
        .with_class_column(class_column)
        .read()
        .with_context(|| format!("failed to read {}", args.data.display()))?;

    if let Some(positive) = &args.positive {
        let mut space = dataset.class_value_space().to_vec();
        let pos = space
            .iter()
            .position(|v| v == positive)
            .with_context(|| format!("positive label \"{positive}\" not found in class column"))?;
        let label = space.remove(pos);
        space.insert(0, label);
        dataset = dataset
            .with_class_value_space(space)
            .context("failed to reorder class value space")?;
    }

    info!(
        n_rows = dataset.row_count(),
        n_columns = dataset.column_count(),
        classes = ?dataset.class_value_space(),
        "dataset loaded"
    );
    Ok(dataset)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configure Rayon thread pool
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Cart { input, print_tree } => {
            let dataset = read_dataset(&input)?;
            let tree = DecisionTreeConfig::new()
                .with_seed(cli.seed)
                .fit(&dataset)
                .context("tree construction failed")?;
            let (_, matrix) = tree
                .classify_set(&dataset)
                .context("classification failed")?;

            if print_tree {
                eprint!("{tree}");
            }

            let output = CartOutput {
                n_rows: dataset.row_count(),
                n_nodes: tree.n_nodes(),
                n_leaves: tree.n_leaves(),
                depth: tree.depth(),
                training_accuracy: matrix.accuracy(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Forest {
            input,
            n_tree,
            n_random_feature,
            all_features,
            percent_boot,
            without_replacement,
            no_oob,
            stats_file,
            model,
        } => {
            let dataset = read_dataset(&input)?;

            let random_features = match (all_features, n_random_feature) {
                (true, _) => RandomFeatures::All,
                (false, Some(n)) => RandomFeatures::Fixed(n),
                (false, None) => RandomFeatures::Sqrt,
            };
            let sampling = if without_replacement {
                Sampling::WithoutReplacement
            } else {
                Sampling::WithReplacement
            };
            let config = ForestConfig::new()
                .with_n_tree(n_tree)
                .with_random_features(random_features)
                .with_percent_boot(percent_boot)
                .with_sampling(sampling)
                .with_run_oob(!no_oob)
                .with_seed(cli.seed)
                .with_stats_path(stats_file);
            let forest = config.fit(&dataset).context("forest training failed")?;

            let training = forest
                .classify_set(&dataset, None)
                .context("classification failed")?;

            if let Some(path) = &model {
                forest.save(path).context("failed to save model")?;
            }

            let total = forest.stat_total();
            let output = ForestOutput {
                n_rows: dataset.row_count(),
                n_trees: forest.trees().len(),
                n_random_feature: forest.n_random_feature(),
                n_subsample: forest.n_subsample(),
                oob_error: total.oob_error,
                oob_error_mean: total.oob_error_mean,
                oob_counts: total.counts(),
                f_measure: total.f_measure,
                training_accuracy: training.matrix.accuracy(),
                model,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Cascade {
            input,
            n_stage,
            n_tree,
            percent_boot,
            tp_rate,
            tn_rate,
            stats_file,
        } => {
            let dataset = read_dataset(&input)?;
            let cascade = CascadeConfig::new()
                .with_n_stage(n_stage)
                .with_n_tree(n_tree)
                .with_percent_boot(percent_boot)
                .with_tp_rate(tp_rate)
                .with_tn_rate(tn_rate)
                .with_seed(cli.seed)
                .with_stats_path(stats_file)
                .fit(&dataset)
                .context("cascade training failed")?;

            let training_accuracy = match cascade.classify_set(&dataset) {
                Ok(result) => result.matrix.accuracy(),
                Err(ForestError::EmptyForest) => 0.0,
                Err(e) => return Err(e).context("classification failed"),
            };

            let output = CascadeOutput {
                n_rows: dataset.row_count(),
                n_stages: cascade.stages().len(),
                stage_weights: cascade.stages().iter().map(|s| s.weight()).collect(),
                oob_error_mean: cascade.stats().total().oob_error_mean,
                training_accuracy,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Classify { input, model } => {
            let forest = RandomForest::load(&model).context("failed to load model")?;
            info!(
                n_trees = forest.trees().len(),
                classes = ?forest.class_values(),
                "model loaded"
            );

            let dataset = read_dataset(&input)?;
            let predictions = forest
                .classify_rows(&dataset)
                .context("classification failed")?;

            // Labels outside the model's value space leave accuracy undefined.
            let accuracy = match forest.classify_set(&dataset, None) {
                Ok(result) => Some(result.matrix.accuracy()),
                Err(ForestError::UnknownClassValue { .. }) => None,
                Err(e) => return Err(e).context("classification failed"),
            };

            let output = ClassifyOutput {
                n_rows: dataset.row_count(),
                model_n_trees: forest.trees().len(),
                accuracy,
                predictions: predictions
                    .iter()
                    .map(|&p| forest.class_values()[p].clone())
                    .collect(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
