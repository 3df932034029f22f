mod config;
mod dataset;
mod export;
mod plot;
mod report;
mod score;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use eqtrend_core::latex::clean;
use eqtrend_core::stats::Periods;
use eqtrend_core::xml::latexml::Latexml;
use eqtrend_core::xml::mathml::MathmlConverter;
use eqtrend_core::{parse_latex, Backend, EquationStore, ScoreMetric};
use eqtrend_fetch::wikipedia::equations_from_page;
use eqtrend_fetch::{equations_from_bindings, PageCache, SparqlClient, WikiClient, DEFAULT_QUERY};
use eqtrend_store::SqliteStore;

use config::Config;

#[derive(Parser)]
#[command(
    name = "eqtrend",
    version,
    about = "Trace the complexity of eponymous equations through history"
)]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch equations named after people from Wikidata
    Query {
        /// Read the SPARQL query from a file instead of the built-in one
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Crawl Wikipedia list pages and store the equations they link to
    Scrape {
        /// List page URL (repeatable; default: from config)
        #[arg(short, long)]
        url: Vec<String>,

        /// Articles followed per list page
        #[arg(short, long)]
        max_pages: Option<usize>,

        /// Only read pages already in the cache
        #[arg(long)]
        offline: bool,
    },

    /// Measure stored equations with one backend
    Score {
        #[arg(short, long, default_value = "grammar")]
        backend: CliBackend,

        /// Rescore equations that already have a score
        #[arg(long)]
        force: bool,
    },

    /// Parse one formula and show what each stage makes of it
    Parse {
        /// LaTeX source, with or without the {\displaystyle ...} wrapper
        latex: String,

        #[arg(short, long, default_value = "grammar")]
        backend: CliBackend,
    },

    /// Export the joined equation table
    Export {
        #[arg(short, long, default_value = "csv")]
        format: export::Format,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long, default_value = "grammar")]
        backend: CliBackend,
    },

    /// Print missing values, summaries, trend and top birth places
    Analyze {
        #[arg(short, long, default_value = "grammar")]
        backend: CliBackend,

        /// Complexity measure (default: from config)
        #[arg(short, long)]
        metric: Option<CliMetric>,
    },

    /// Draw the charts as SVG files
    Plot {
        #[arg(short, long, default_value = "grammar")]
        backend: CliBackend,

        #[arg(short, long)]
        metric: Option<CliMetric>,

        /// Output directory (default: from config)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Show store statistics
    Stats,

    /// Show the active configuration
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliBackend {
    Grammar,
    Mathml,
    Latexml,
}

impl From<CliBackend> for Backend {
    fn from(val: CliBackend) -> Self {
        match val {
            CliBackend::Grammar => Backend::Grammar,
            CliBackend::Mathml => Backend::Mathml,
            CliBackend::Latexml => Backend::Latexml,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CliMetric {
    Ops,
    Depth,
    Nodes,
}

impl From<CliMetric> for ScoreMetric {
    fn from(val: CliMetric) -> Self {
        match val {
            CliMetric::Ops => ScoreMetric::Ops,
            CliMetric::Depth => ScoreMetric::Depth,
            CliMetric::Nodes => ScoreMetric::Nodes,
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "eqtrend", "eqtrend")
}

fn default_db_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("equations.db"))
        .unwrap_or_else(|| PathBuf::from("equations.db"))
}

fn default_cache_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.cache_dir().join("pages"))
        .unwrap_or_else(|| PathBuf::from("content"))
}

fn open_store(db: Option<PathBuf>, cfg: &Config) -> Result<SqliteStore> {
    let path = db
        .or_else(|| cfg.store.path.as_ref().map(PathBuf::from))
        .unwrap_or_else(default_db_path);
    SqliteStore::new(&path).context("failed to open database")
}

fn resolve_metric(flag: Option<CliMetric>, cfg: &Config) -> Result<ScoreMetric> {
    match flag {
        Some(m) => Ok(m.into()),
        None => cfg
            .analysis
            .metric
            .parse()
            .map_err(|e: String| anyhow::anyhow!("[analysis] metric: {e}")),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config()?;

    let store = || open_store(cli.db.clone(), &cfg);

    match cli.command {
        Commands::Query { file } => cmd_query(&store()?, &cfg, file.as_deref()),
        Commands::Scrape {
            url,
            max_pages,
            offline,
        } => cmd_scrape(&store()?, &cfg, url, max_pages, offline),
        Commands::Score { backend, force } => cmd_score(&store()?, &cfg, backend.into(), force),
        Commands::Parse { latex, backend } => cmd_parse(&latex, backend.into(), &cfg),
        Commands::Export {
            format,
            output,
            backend,
        } => cmd_export(&store()?, format, output.as_deref(), backend.into()),
        Commands::Analyze { backend, metric } => cmd_analyze(
            &store()?,
            &cfg,
            backend.into(),
            resolve_metric(metric, &cfg)?,
        ),
        Commands::Plot {
            backend,
            metric,
            out,
        } => cmd_plot(
            &store()?,
            &cfg,
            backend.into(),
            resolve_metric(metric, &cfg)?,
            out,
        ),
        Commands::Stats => cmd_stats(&store()?),
        Commands::Config => cmd_config(&cfg),
    }
}

// ---------------------------------------------------------------------------
// Fetch commands
// ---------------------------------------------------------------------------

fn cmd_query(store: &SqliteStore, cfg: &Config, file: Option<&Path>) -> Result<()> {
    let query = match file {
        Some(p) => {
            std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?
        }
        None => DEFAULT_QUERY.to_string(),
    };
    let client = SparqlClient::new(
        cfg.sparql.endpoint.as_str(),
        &cfg.sparql.user_agent,
        Duration::from_secs(cfg.sparql.timeout_secs),
    );
    let bindings = client.query(&query).context("SPARQL query failed")?;
    let equations = equations_from_bindings(&bindings);

    let added = store.batch(|s| {
        let mut added = 0;
        for eq in &equations {
            added += usize::from(s.insert(eq)?);
        }
        Ok(added)
    })?;
    println!(
        "Stored {} equations from {} rows ({added} new).",
        equations.len(),
        bindings.len()
    );
    Ok(())
}

fn cmd_scrape(
    store: &SqliteStore,
    cfg: &Config,
    urls: Vec<String>,
    max_pages: Option<usize>,
    offline: bool,
) -> Result<()> {
    let wiki = &cfg.wikipedia;
    let cache = PageCache::new(
        wiki.cache_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(default_cache_dir),
    );

    let pages: Vec<PathBuf> = if offline {
        cache.pages()?.into_iter().map(|(_, p)| p).collect()
    } else {
        let urls = if urls.is_empty() {
            wiki.list_pages.clone()
        } else {
            urls
        };
        let client = WikiClient::new(
            &wiki.base_url,
            cache.clone(),
            &cfg.sparql.user_agent,
            Duration::from_secs(wiki.timeout_secs),
        );
        let mut pages = Vec::new();
        for url in &urls {
            match client.crawl_list_page(url, max_pages.unwrap_or(wiki.max_pages)) {
                Ok(paths) => pages.extend(paths),
                Err(e) => tracing::warn!(url = %url, error = %e, "skipping list page"),
            }
        }
        pages.sort();
        pages.dedup();
        pages
    };
    println!("{} pages in {}", pages.len(), cache.dir().display());

    let base = wiki.base_url.trim_end_matches('/');
    let (mut found, mut added) = (0, 0);
    store.batch(|s| {
        for path in &pages {
            let Some(name) = path.file_stem().and_then(|n| n.to_str()) else {
                continue;
            };
            let html = match std::fs::read_to_string(path) {
                Ok(h) => h,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "unreadable page");
                    continue;
                }
            };
            let url = format!("{base}/wiki/{name}");
            for eq in equations_from_page(&url, &html) {
                found += 1;
                added += usize::from(s.insert(&eq)?);
            }
        }
        Ok(())
    })?;
    println!("Stored {found} equations ({added} new).");
    Ok(())
}

// ---------------------------------------------------------------------------
// Scoring commands
// ---------------------------------------------------------------------------

fn cmd_score(store: &SqliteStore, cfg: &Config, backend: Backend, force: bool) -> Result<()> {
    let run = score::run(store, backend, force, &cfg.latexml)?;
    if run.scored + run.failed == 0 {
        println!("Nothing to score with {backend} (use --force to rescore).");
    } else {
        println!(
            "Scored {} equations with {backend} ({} parsed, {} failed).",
            run.scored + run.failed,
            run.scored,
            run.failed
        );
    }
    Ok(())
}

fn cmd_parse(latex: &str, backend: Backend, cfg: &Config) -> Result<()> {
    println!("input:   {latex}");
    println!("cleaned: {}", clean(latex));

    match backend {
        Backend::Grammar => {
            let expr = parse_latex(latex).map_err(|e| anyhow::anyhow!("parse error {e}"))?;
            println!("tree:    {expr}");
            println!(
                "ops={} depth={} nodes={}",
                expr.count_ops(),
                expr.depth(),
                expr.node_count()
            );
        }
        Backend::Mathml => {
            let conv = MathmlConverter::new()?;
            let xml = conv.to_mathml(latex)?;
            println!("mathml:  {xml}");
            let m = conv.measure(latex)?;
            println!("ops={} depth={} nodes={}", m.ops, m.depth, m.nodes);
        }
        Backend::Latexml => {
            let tool = Latexml::new(
                cfg.latexml.command.as_str(),
                Duration::from_secs(cfg.latexml.timeout_secs),
            );
            let metrics = tool.run(&[("input".to_string(), latex.to_string())])?;
            let Some(m) = metrics.get("input") else {
                bail!("latexml produced no XMath for this formula");
            };
            println!("ops={} depth={} nodes={}", m.ops, m.depth, m.nodes);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Output commands
// ---------------------------------------------------------------------------

fn cmd_export(
    store: &SqliteStore,
    format: export::Format,
    output: Option<&Path>,
    backend: Backend,
) -> Result<()> {
    let rows = dataset::load(store, backend)?;
    match output {
        Some(p) => {
            let file = std::fs::File::create(p)
                .with_context(|| format!("creating {}", p.display()))?;
            export::write(&rows, format, std::io::BufWriter::new(file))?;
            eprintln!("Wrote {} rows to {}", rows.len(), p.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            export::write(&rows, format, &mut lock)?;
            lock.flush()?;
        }
    }
    Ok(())
}

fn cmd_analyze(
    store: &SqliteStore,
    cfg: &Config,
    backend: Backend,
    metric: ScoreMetric,
) -> Result<()> {
    let rows = dataset::load(store, backend)?;
    let obs = dataset::observations(&rows, metric);
    let opts = report::ReportOptions {
        title: format!("{backend} / {metric}"),
        periods: Periods::new(cfg.analysis.period_breaks.clone()),
        top_places: cfg.analysis.top_places,
    };
    print!("{}", report::render(&obs, &opts));
    Ok(())
}

fn cmd_plot(
    store: &SqliteStore,
    cfg: &Config,
    backend: Backend,
    metric: ScoreMetric,
    out: Option<PathBuf>,
) -> Result<()> {
    let rows = dataset::load(store, backend)?;
    let obs = dataset::observations(&rows, metric);
    let dir = out.unwrap_or_else(|| PathBuf::from(&cfg.plot.output_dir));
    let opts = plot::PlotOptions {
        size: (cfg.plot.width, cfg.plot.height),
        metric_name: metric.to_string(),
        top_places: cfg.analysis.top_places,
        periods: Periods::new(cfg.analysis.period_breaks.clone()),
        outlier_cutoff: cfg.analysis.outlier_cutoff,
    };

    let written = plot::plot_all(&dir, &obs, &opts)?;
    if written.is_empty() {
        println!("Nothing to plot; run `eqtrend score --backend {backend}` first.");
    }
    for path in written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn cmd_stats(store: &SqliteStore) -> Result<()> {
    let stats = store.stats()?;
    println!("Equations: {}", stats.total_equations);
    println!("  wikidata:  {}", stats.wikidata);
    println!("  wikipedia: {}", stats.wikipedia);
    println!("  dated:     {}", stats.with_birth);
    for (backend, ok, failed) in &stats.scores {
        println!("Scores ({backend}): {ok} ok, {failed} failed");
    }
    if let Some(oldest) = stats.oldest_fetch {
        println!("Oldest:    {}", oldest.format("%Y-%m-%d %H:%M"));
    }
    if let Some(newest) = stats.newest_fetch {
        println!("Newest:    {}", newest.format("%Y-%m-%d %H:%M"));
    }
    Ok(())
}

fn cmd_config(cfg: &Config) -> Result<()> {
    println!("Config: {}", config::show_config_path());
    println!();
    println!("[store]");
    println!(
        "  path = {}",
        cfg.store
            .path
            .as_deref()
            .map(String::from)
            .unwrap_or_else(|| default_db_path().display().to_string())
    );
    println!();
    println!("[sparql]");
    println!("  endpoint = {}", cfg.sparql.endpoint);
    println!("  user_agent = {}", cfg.sparql.user_agent);
    println!("  timeout_secs = {}", cfg.sparql.timeout_secs);
    println!();
    println!("[wikipedia]");
    println!("  base_url = {}", cfg.wikipedia.base_url);
    for page in &cfg.wikipedia.list_pages {
        println!("  list_page = {page}");
    }
    println!(
        "  cache_dir = {}",
        cfg.wikipedia
            .cache_dir
            .as_deref()
            .map(String::from)
            .unwrap_or_else(|| default_cache_dir().display().to_string())
    );
    println!("  max_pages = {}", cfg.wikipedia.max_pages);
    println!();
    println!("[latexml]");
    println!("  command = {}", cfg.latexml.command);
    println!("  timeout_secs = {}", cfg.latexml.timeout_secs);
    println!("  batch_size = {}", cfg.latexml.batch_size);
    println!();
    println!("[analysis]");
    println!("  period_breaks = {:?}", cfg.analysis.period_breaks);
    println!("  outlier_cutoff = {}", cfg.analysis.outlier_cutoff);
    println!("  top_places = {}", cfg.analysis.top_places);
    println!("  metric = {}", cfg.analysis.metric);
    println!();
    println!("[plot]");
    println!("  output_dir = {}", cfg.plot.output_dir);
    println!("  size = {}x{}", cfg.plot.width, cfg.plot.height);
    Ok(())
}
