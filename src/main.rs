use anyhow::Result;
use clap::Parser;
use traceroute_cluster::cluster::metrics::summarize_clusters;
use traceroute_cluster::cluster::{ClusterEngine, MaxDegree};
use traceroute_cluster::config::{Config, LabelKind};
use traceroute_cluster::data::{loader, preprocessing};
use traceroute_cluster::graph::algorithms::neighbors;
use traceroute_cluster::graph::{Entity, GraphBuilder};
use traceroute_cluster::storage;

#[derive(Parser, Debug)]
#[clap(
    name = "traceroute-cluster",
    about = "Build hop graphs from traceroute batches and cluster them by label"
)]
struct Cli {
    /// Path to input JSON traceroute batch
    #[clap(long)]
    input: String,

    /// Output directory for results
    #[clap(long, default_value = "cluster_results")]
    output_dir: String,

    /// Attribute used to label entities
    #[clap(long, value_enum, default_value = "org")]
    label: LabelKind,

    /// Clustering degree: 0 (no clustering), 1 (connected by label) or inf (group by label)
    #[clap(long, default_value = "1")]
    max_degree: MaxDegree,

    /// Prefix for cluster ids (defaults to the label name)
    #[clap(long)]
    id_prefix: Option<String>,

    /// Earliest traceroute timestamp to include
    #[clap(long)]
    since: Option<i64>,

    /// Latest traceroute timestamp to include
    #[clap(long)]
    until: Option<i64>,

    /// Traceroute ids to hide
    #[clap(long)]
    exclude: Vec<String>,

    /// Number of worker threads (0 = use all available cores)
    #[clap(long, default_value = "0")]
    threads: usize,

    /// Verbose logging
    #[clap(long, short)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> Config {
        Config::new(self.label, self.max_degree, self.id_prefix.clone())
            .with_time_window(self.since, self.until)
            .with_hidden_ids(self.exclude.clone())
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Cli::parse();

    // Configure logging
    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    // Set number of threads
    let num_threads = if args.threads > 0 {
        args.threads
    } else {
        // If threads = 0, use all available cores
        num_cpus::get()
    };

    log::info!("Using {} worker threads", num_threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()?;

    let config = args.config();

    log::info!("Starting traceroute clustering");
    log::info!("Input: {}", args.input);
    log::info!("Output: {}", args.output_dir);
    log::info!(
        "Label: {} (prefix '{}'), max degree {}",
        config.label.name(),
        config.effective_prefix(),
        config.max_degree
    );

    // 1. Load and select traceroutes
    let mut batch = loader::load_batch(&args.input)?;
    preprocessing::retain_time_window(&mut batch, config.ts_min, config.ts_max);
    preprocessing::exclude_ids(&mut batch, &config.hidden_ids);

    log::info!("Using {} traceroutes", batch.len());

    // 2. Build the hop graph
    let entities = GraphBuilder::build(&batch.traceroutes);

    log::info!("Built graph with {} entities", entities.len());

    // 3. Cluster by label
    let engine = ClusterEngine::new(config.max_degree).with_id_prefix(config.effective_prefix());
    let label = config.label;
    let clusters = engine.cluster(
        &entities,
        |e: &Entity| label.label_for(e),
        |e| neighbors(e),
    )?;

    log::info!("Found {} clusters", clusters.len());

    // 4. Summarize and save results
    let summaries = summarize_clusters(&clusters);
    storage::save_results(&entities, &clusters, &summaries, &args.output_dir)?;

    log::info!("Analysis complete. Results saved to {}", args.output_dir);

    Ok(())
}
