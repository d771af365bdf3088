use anyhow::{anyhow, Context, Result};
use checks::{CheckResponse, Dispatcher, DispatcherConfig, HostStore, StatusAggregator};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use probes::{ProbeOptions, ProbeSet};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use store_sqlite::{Db, Host, HostId, HostServiceId, NewHost, ServiceStatusRow, StatusCounts};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use vigil_core::{clock, Schedule, ScheduleUnit, ServiceKind, Status};

mod config;
mod logging;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat { Text, Json }

#[derive(Debug, Parser)]
#[command(name = "vigil", version, about = "Host and service health checks")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./vigil.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Bound on each store operation in milliseconds
    #[arg(long, global = true)]
    store_timeout_ms: Option<u64>,
    /// Bound on each probe in milliseconds
    #[arg(long, global = true)]
    probe_timeout_ms: Option<u64>,
    /// Output format
    #[arg(long, value_enum, global = true, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Debug logging
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Create the database and seed the service catalogue
    Init,
    /// Register a host together with its default HTTP check
    AddHost {
        /// Display name
        name: String,
        /// URL probed by HTTP/HTTPS checks
        #[arg(long)]
        url: String,
        #[arg(long, default_value = "")]
        canonical_name: String,
        #[arg(long, default_value = "")]
        ip: String,
        #[arg(long, default_value = "")]
        ipv6: String,
        #[arg(long, default_value = "")]
        location: String,
        #[arg(long, default_value = "")]
        os: String,
        /// Register the host as inactive
        #[arg(long, default_value_t = false)]
        inactive: bool,
    },
    /// Change fields of an existing host
    UpdateHost {
        id: HostId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        canonical_name: Option<String>,
        #[arg(long)]
        ip: Option<String>,
        #[arg(long)]
        ipv6: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        os: Option<String>,
        #[arg(long, action = ArgAction::Set)]
        active: Option<bool>,
    },
    /// List every host with its checks
    ListHosts,
    /// Show one host with its checks
    ShowHost { id: HostId },
    /// Bind another check (https, ssl) to a host
    AddService {
        host_id: HostId,
        /// http, https or ssl
        #[arg(long)]
        kind: ServiceKind,
        #[arg(long, default_value_t = 3)]
        every: u32,
        /// s, m, h or d
        #[arg(long, default_value = "m")]
        unit: ScheduleUnit,
    },
    /// Enable or disable a host's check
    Toggle {
        host_id: HostId,
        /// http, https or ssl
        #[arg(long)]
        service: ServiceKind,
        #[arg(long, action = ArgAction::Set)]
        active: bool,
    },
    /// Change how often a check is meant to run
    SetSchedule {
        host_service_id: HostServiceId,
        every: u32,
        /// s, m, h or d
        unit: ScheduleUnit,
    },
    /// Run one check now and print the result
    Check {
        host_service_id: HostServiceId,
        /// Status the caller last saw; echoed back in the response
        #[arg(long)]
        old_status: Option<Status>,
    },
    /// Run every active check concurrently
    CheckAll {
        /// Max checks in flight
        #[arg(long)]
        concurrency: Option<usize>,
        /// Check launches per second; 0 disables pacing
        #[arg(long)]
        qps: Option<u32>,
    },
    /// Count active checks per status
    Counts,
    /// List active checks in one status, by host then service name
    Services {
        #[arg(long)]
        status: Status,
        /// Write CSV to this file instead of printing
        #[arg(long, value_name = "FILE")]
        csv: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    run(cli)
}

fn run(cli: Cli) -> Result<()> {

    let (concurrency, qps) = match &cli.command {
        Commands::CheckAll { concurrency, qps } => (*concurrency, *qps),
        _ => (None, None),
    };
    let file_cfg = config::load_config(cli.config.as_deref())?;
    let settings = config::Settings::resolve(
        file_cfg,
        config::Overrides {
            database: cli.db.clone(),
            store_timeout_ms: cli.store_timeout_ms,
            probe_timeout_ms: cli.probe_timeout_ms,
            concurrency,
            qps,
        },
    );
    let format = cli.format;
    let open_store = || -> Result<Arc<dyn HostStore>> {
        let db = Db::open_or_create(&settings.database, settings.store_timeout)
            .with_context(|| format!("opening {}", settings.database.display()))?;
        Ok(Arc::new(db))
    };

    match cli.command {
        Commands::Version => {
            println!("vigil {} (core {})", env!("CARGO_PKG_VERSION"), vigil_core::version());
        }
        Commands::Init => {
            let store = open_store()?;
            let services = store.get_all_services()?;
            emit(format, &services, || {
                println!("database ready at {}", settings.database.display());
                for s in &services {
                    println!("  service {} {}", s.id, s.service_name);
                }
            })?;
        }
        Commands::AddHost { name, url, canonical_name, ip, ipv6, location, os, inactive } => {
            let store = open_store()?;
            let host = NewHost { host_name: name, canonical_name, url, ip, ipv6, location, os, active: !inactive };
            let id = store.insert_host(&host)?;
            tracing::info!(host_id = id, "host added");
            let host = store.get_host_by_id(id)?;
            emit(format, &host, || print_host(&host))?;
        }
        Commands::UpdateHost { id, name, url, canonical_name, ip, ipv6, location, os, active } => {
            let store = open_store()?;
            let mut host = store.get_host_by_id(id)?;
            if let Some(v) = name { host.host_name = v; }
            if let Some(v) = url { host.url = v; }
            if let Some(v) = canonical_name { host.canonical_name = v; }
            if let Some(v) = ip { host.ip = v; }
            if let Some(v) = ipv6 { host.ipv6 = v; }
            if let Some(v) = location { host.location = v; }
            if let Some(v) = os { host.os = v; }
            if let Some(v) = active { host.active = v; }
            store.update_host(&host)?;
            let host = store.get_host_by_id(id)?;
            emit(format, &host, || print_host(&host))?;
        }
        Commands::ListHosts => {
            let store = open_store()?;
            let hosts = store.get_all_hosts()?;
            emit(format, &hosts, || hosts.iter().for_each(print_host))?;
        }
        Commands::ShowHost { id } => {
            let store = open_store()?;
            let host = store.get_host_by_id(id)?;
            emit(format, &host, || print_host(&host))?;
        }
        Commands::AddService { host_id, kind, every, unit } => {
            let store = open_store()?;
            let schedule = Schedule::new(every, unit).ok_or_else(|| anyhow!("--every must be positive"))?;
            let id = store.insert_host_service(host_id, kind, schedule)?;
            let hs = store.get_host_service_by_id(id)?;
            emit(format, &hs, || println!("host service {} added: {} every {}{} (inactive)", hs.id, kind.display_name(), every, unit))?;
        }
        Commands::Toggle { host_id, service, active } => {
            let store = open_store()?;
            store.update_host_service_status(host_id, service.id(), active)?;
            let host = store.get_host_by_id(host_id)?;
            emit(format, &host, || print_host(&host))?;
        }
        Commands::SetSchedule { host_service_id, every, unit } => {
            let store = open_store()?;
            let schedule = Schedule::new(every, unit).ok_or_else(|| anyhow!("every must be positive"))?;
            let mut hs = store.get_host_service_by_id(host_service_id)?;
            hs.schedule = schedule;
            hs.updated_at = clock::now();
            store.update_host_service(&hs)?;
            let hs = store.get_host_service_by_id(host_service_id)?;
            emit(format, &hs, || println!("host service {} now every {}{}", hs.id, every, unit))?;
        }
        Commands::Check { host_service_id, old_status } => {
            let store = open_store()?;
            let dispatcher = build_dispatcher(&settings, store)?;
            let rt = tokio::runtime::Runtime::new()?;
            let resp = rt.block_on(async move {
                match old_status {
                    Some(old) => dispatcher.run_check(host_service_id, old).await,
                    None => dispatcher.run_many(vec![host_service_id]).await.remove(0),
                }
            });
            // the response shape is the same for every format
            println!("{}", serde_json::to_string_pretty(&resp)?);
            if !resp.ok {
                std::process::exit(1);
            }
        }
        Commands::CheckAll { .. } => {
            let store = open_store()?;
            let dispatcher = build_dispatcher(&settings, store)?;
            let rt = tokio::runtime::Runtime::new()?;
            let started = std::time::Instant::now();
            let results = rt.block_on(async move { dispatcher.run_active().await })?;
            tracing::info!(count = results.len(), elapsed_ms = started.elapsed().as_millis() as u64, "check-all finished");
            emit(format, &results, || results.iter().for_each(print_response))?;
        }
        Commands::Counts => {
            let store = open_store()?;
            let rt = tokio::runtime::Runtime::new()?;
            let agg = StatusAggregator::new(store, settings.store_timeout);
            let counts = rt.block_on(agg.status_counts())?;
            emit(format, &counts, || print_counts(&counts))?;
        }
        Commands::Services { status, csv } => {
            let store = open_store()?;
            let rt = tokio::runtime::Runtime::new()?;
            let agg = StatusAggregator::new(store, settings.store_timeout);
            let rows = rt.block_on(agg.services_by_status(status))?;
            if let Some(path) = csv {
                write_csv(&path, &rows)?;
                tracing::info!(rows = rows.len(), path = %path.display(), "csv written");
            } else {
                emit(format, &rows, || rows.iter().for_each(print_status_row))?;
            }
        }
    }
    Ok(())
}

fn build_dispatcher(settings: &config::Settings, store: Arc<dyn HostStore>) -> Result<Dispatcher> {
    let mut opts = ProbeOptions {
        timeout: settings.probe_timeout,
        cert_warning_days: settings.cert_warning_days,
        ..Default::default()
    };
    if let Some(ua) = &settings.user_agent {
        opts.user_agent = ua.clone();
    }
    let probes = ProbeSet::new(&opts)?;
    let cfg = DispatcherConfig { store_timeout: settings.store_timeout, concurrency: settings.concurrency, qps: settings.qps };
    Ok(Dispatcher::new(store, probes, cfg))
}

fn emit<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce()) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => text(),
    }
    Ok(())
}

fn ts(t: OffsetDateTime) -> String {
    t.format(&Rfc3339).unwrap_or_else(|_| String::new())
}

fn print_host(h: &Host) {
    let state = if h.active { "active" } else { "inactive" };
    println!("{:>4}  {}  {}  [{}]", h.id, h.host_name, h.url, state);
    for hs in &h.host_services {
        println!(
            "      #{:<4} {:<16} {:<8} every {}{:<3} {:<8} last check {}",
            hs.id,
            hs.service.service_name,
            hs.status,
            hs.schedule.number,
            hs.schedule.unit,
            if hs.active { "on" } else { "off" },
            ts(hs.last_check)
        );
    }
}

fn print_response(r: &CheckResponse) {
    if r.ok {
        let old = r.old_status.map(|s| s.to_string()).unwrap_or_default();
        let new = r.new_status.map(|s| s.to_string()).unwrap_or_default();
        println!("#{:<4} {:>8} -> {:<8} {}", r.host_service_id, old, new, r.message.trim_end());
    } else {
        println!("#{:<4} failed: {}", r.host_service_id, r.message);
    }
}

fn print_counts(c: &StatusCounts) {
    for status in Status::ALL {
        println!("{:<8} {}", status, c.get(status));
    }
    println!("{:<8} {}", "total", c.total());
}

fn print_status_row(r: &ServiceStatusRow) {
    println!(
        "{:<24} {:<16} {:<8} last check {}",
        r.host_name,
        r.service_name,
        r.host_service.status,
        ts(r.host_service.last_check)
    );
}

fn write_csv(path: &std::path::Path, rows: &[ServiceStatusRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(std::fs::File::create(path)?);
    wtr.write_record(["host_service_id", "host_id", "host_name", "service_name", "status", "schedule", "last_check"])?;
    for r in rows {
        let hs = &r.host_service;
        wtr.write_record([
            hs.id.to_string(),
            hs.host_id.to_string(),
            r.host_name.clone(),
            r.service_name.clone(),
            hs.status.to_string(),
            format!("{}{}", hs.schedule.number, hs.schedule.unit),
            ts(hs.last_check),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
