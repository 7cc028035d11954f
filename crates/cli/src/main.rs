use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio::signal;
use tracing::{info, warn};
use vigil_api::{HttpApi, MonitorApi, MonitoringRequest, QuestionCreate, WebsiteCreate};
use vigil_monitor::{render_detail, FetchOutcome, MonitorConfig, RefreshCoordinator, ViewState};
use vigil_search::{SelectionStatus, SortKey, ViewQuery};
use vigil_store::ResultStore;

mod render;

#[derive(Parser, Debug)]
#[command(name = "vigilctl", version, about = "Vigil: LLM misrepresentation monitor CLI")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Backend base URL
    #[arg(long = "api-url", env = "VIGIL_API_URL", global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Args, Debug, Clone)]
struct ListArgs {
    /// Only show results flagged as misrepresentations
    #[arg(long = "misrep-only", action = ArgAction::SetTrue)]
    misrep_only: bool,
    /// Sort key: date, accuracy or website
    #[arg(long = "sort", default_value = "date", value_parser = SortKey::from_str)]
    sort: SortKey,
    /// Fuzzy text filter over website, url, question and service
    #[arg(long = "filter", default_value = "")]
    filter: String,
    /// Number of results to fetch
    #[arg(long = "limit", env = "VIGIL_RESULTS_LIMIT")]
    limit: Option<usize>,
}

impl ListArgs {
    fn query(&self) -> ViewQuery {
        ViewQuery { misrepresentations_only: self.misrep_only, sort: self.sort, text: self.filter.clone() }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch once and print summary tiles plus the result table
    Results {
        #[command(flatten)]
        list: ListArgs,
    },
    /// Live view: refetch periodically and redraw on every new result set
    Watch {
        #[command(flatten)]
        list: ListArgs,
        /// Refresh interval in milliseconds
        #[arg(long = "interval-ms", env = "VIGIL_REFRESH_MS")]
        interval_ms: Option<u64>,
        /// Keep this result's detail open across refreshes
        #[arg(long = "select")]
        select: Option<i64>,
    },
    /// Show the detail view of one result
    Show {
        id: i64,
        #[arg(long = "limit", env = "VIGIL_RESULTS_LIMIT")]
        limit: Option<usize>,
    },
    /// Misrepresentation summary by website
    Summary,
    /// Manage monitored websites
    Websites {
        #[command(subcommand)]
        cmd: WebsiteCmd,
    },
    /// Control the monitoring pipeline
    Monitor {
        #[command(subcommand)]
        cmd: MonitorCmd,
    },
    /// Manage manual questions for a website
    Questions {
        #[command(subcommand)]
        cmd: QuestionCmd,
    },
    /// Backend component health
    Health,
    /// Dashboard statistics
    Stats,
}

#[derive(Subcommand, Debug)]
enum WebsiteCmd {
    /// List websites
    Ls {
        /// Include deactivated websites
        #[arg(long = "all", action = ArgAction::SetTrue)]
        all: bool,
    },
    /// Add a website to monitor
    Add {
        #[arg(long)]
        url: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Deactivate a website
    Rm { id: i64 },
}

#[derive(Subcommand, Debug)]
enum MonitorCmd {
    /// Start a monitoring run (all active websites unless ids are given)
    Start {
        #[arg(long = "website-id")]
        website_ids: Vec<i64>,
        #[arg(long = "session-name")]
        session_name: Option<String>,
    },
    /// Pipeline status
    Status,
    /// Schedule periodic runs
    Schedule {
        #[arg(long = "hours", default_value_t = 6)]
        hours: u32,
    },
    /// Stop scheduled runs
    Stop,
}

#[derive(Subcommand, Debug)]
enum QuestionCmd {
    /// List active questions for a website
    Ls { website_id: i64 },
    /// Add a manual question
    Add {
        #[arg(long = "website-id")]
        website_id: i64,
        #[arg(long = "text")]
        text: String,
        #[arg(long)]
        category: Option<String>,
    },
}

fn init_tracing() {
    let env = std::env::var("VIGIL_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics(addr: Option<&str>) {
    let Some(addr) = addr else { return };
    if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        match builder.with_http_listener(sock).install() {
            Ok(_) => info!(addr = %addr, "Prometheus metrics exporter listening"),
            Err(e) => warn!(error = %e, "failed to install metrics exporter"),
        }
    } else {
        warn!(addr = %addr, "invalid VIGIL_METRICS_ADDR; expected host:port");
    }
}

fn emit<T: Serialize>(output: Output, value: &T, human: impl FnOnce(&T)) -> Result<()> {
    match output {
        Output::Human => human(value),
        Output::Json => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

fn fetched(outcome: FetchOutcome) -> Result<()> {
    match outcome {
        FetchOutcome::Failed(e) if e.is_transient() => {
            Err(e).context("fetching analysis results (backend unavailable, try again shortly)")
        }
        FetchOutcome::Failed(e) => Err(e).context("fetching analysis results"),
        _ => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let mut cfg = MonitorConfig::from_env();
    if let Some(url) = cli.api_url.clone() {
        cfg.api_url = url;
    }
    init_metrics(cfg.metrics_addr.as_deref());
    let http = HttpApi::with_timeout(&cfg.api_url, cfg.http_timeout).context("configuring API client")?;
    let api: Arc<dyn MonitorApi> = Arc::new(http);
    let out = cli.output;

    match cli.command {
        Commands::Results { list } => {
            let store = Arc::new(ResultStore::new());
            let coord = RefreshCoordinator::new(api, store.clone(), list.limit.unwrap_or(cfg.results_limit));
            fetched(coord.fetch_now().await)?;
            let view = ViewState::new(list.query());
            let frame = view.frame(&store.get());
            emit(out, &frame, |f| render::frame(f, &view.query))?;
        }
        Commands::Watch { list, interval_ms, select } => {
            let interval = interval_ms.map(Duration::from_millis).unwrap_or(cfg.refresh_interval);
            let store = Arc::new(ResultStore::new());
            let coord = RefreshCoordinator::new(api, store.clone(), list.limit.unwrap_or(cfg.results_limit));
            let mut view = ViewState::new(list.query());
            if let Some(id) = select {
                view.select(id);
            }
            let mut versions = store.subscribe_version();
            let mut status = coord.subscribe_status();
            let mut shown_error: Option<String> = None;

            info!(api = %cfg.api_url, interval_ms = interval.as_millis() as u64, "watch: starting");
            let first = coord.clone();
            tokio::spawn(async move { first.fetch_now().await });
            coord.set_auto_refresh(true, interval);

            loop {
                tokio::select! {
                    changed = versions.changed() => {
                        if changed.is_err() { break; }
                        let snap = store.get();
                        if let SelectionStatus::Invalidated(id) = view.on_snapshot(&snap) {
                            eprintln!("result {} is no longer in the result set; detail closed", id);
                        }
                        let frame = view.frame(&snap);
                        let detail = view.detail(&snap);
                        match out {
                            Output::Human => {
                                render::clear_screen();
                                render::frame(&frame, &view.query);
                                if let Some(d) = &detail { println!("\n{}", d.to_text()); }
                            }
                            Output::Json => println!("{}", serde_json::to_string(&frame)?),
                        }
                    }
                    changed = status.changed() => {
                        if changed.is_err() { break; }
                        let err = status.borrow_and_update().last_error.clone();
                        if err != shown_error {
                            match &err {
                                Some(e) => eprintln!("! refresh failed (showing last good data): {}", e),
                                None if shown_error.is_some() => eprintln!("refresh recovered"),
                                None => {}
                            }
                            shown_error = err;
                        }
                    }
                    _ = signal::ctrl_c() => {
                        info!("Ctrl-C received; stopping watch");
                        break;
                    }
                }
            }
            coord.set_auto_refresh(false, interval);
        }
        Commands::Show { id, limit } => {
            let store = Arc::new(ResultStore::new());
            let limit = limit.unwrap_or(cfg.results_limit);
            let coord = RefreshCoordinator::new(api, store.clone(), limit);
            fetched(coord.fetch_now().await)?;
            let snap = store.get();
            let Some(result) = snap.get(id) else {
                bail!("result {} not found among the latest {} results", id, limit);
            };
            let detail = render_detail(result);
            emit(out, &detail, |d| print!("{}", d.to_text()))?;
        }
        Commands::Summary => {
            let summary = api.summary().await.context("fetching summary")?;
            emit(out, &summary, render::summary)?;
        }
        Commands::Websites { cmd } => match cmd {
            WebsiteCmd::Ls { all } => {
                let sites = api.websites(!all).await.context("listing websites")?;
                emit(out, &sites, |s| render::websites(s))?;
            }
            WebsiteCmd::Add { url, name, description } => {
                let ack = api.create_website(&WebsiteCreate { url, name, description }).await.context("adding website")?;
                emit(out, &ack, render::ack)?;
            }
            WebsiteCmd::Rm { id } => {
                let ack = api.delete_website(id).await.with_context(|| format!("deactivating website {}", id))?;
                emit(out, &ack, render::ack)?;
            }
        },
        Commands::Monitor { cmd } => match cmd {
            MonitorCmd::Start { website_ids, session_name } => {
                let req = MonitoringRequest { website_ids: (!website_ids.is_empty()).then_some(website_ids), session_name };
                let ack = api.start_monitoring(&req).await.context("starting monitoring")?;
                emit(out, &ack, render::ack)?;
            }
            MonitorCmd::Status => {
                let st = api.monitoring_status().await.context("fetching monitoring status")?;
                emit(out, &st, render::monitoring_status)?;
            }
            MonitorCmd::Schedule { hours } => {
                if hours == 0 {
                    bail!("--hours must be at least 1");
                }
                let ack = api.schedule_monitoring(hours).await.context("scheduling monitoring")?;
                emit(out, &ack, render::ack)?;
            }
            MonitorCmd::Stop => {
                let ack = api.stop_monitoring().await.context("stopping monitoring")?;
                emit(out, &ack, render::ack)?;
            }
        },
        Commands::Questions { cmd } => match cmd {
            QuestionCmd::Ls { website_id } => {
                let qs = api.questions(website_id).await.context("listing questions")?;
                emit(out, &qs, |q| render::questions(q))?;
            }
            QuestionCmd::Add { website_id, text, category } => {
                let ack = api
                    .create_question(&QuestionCreate { website_id, question_text: text, category })
                    .await
                    .context("adding question")?;
                emit(out, &ack, render::ack)?;
            }
        },
        Commands::Health => {
            let h = api.health().await.context("checking backend health")?;
            emit(out, &h, render::health)?;
            if !h.is_healthy() {
                bail!("backend reports status '{}'", h.status);
            }
        }
        Commands::Stats => {
            let s = api.dashboard_stats().await.context("fetching dashboard stats")?;
            emit(out, &s, render::stats)?;
        }
    }
    Ok(())
}
