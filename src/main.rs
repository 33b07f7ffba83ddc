//! Water Level Report Service - single run
//!
//! Each invocation:
//! 1. Loads samples from a saved file or the station telemetry feed
//! 2. Runs outlier rejection, gap filling, event detection and trend assignment
//! 3. Selects which peaks/troughs to report (ledger at synoptic hours)
//! 4. Prints the report line, or `checking` outside synoptic hours
//!
//! Scheduling is left to cron/systemd; one invocation is one report.
//!
//! Usage:
//!   wlmon_service --url https://example.org/feed.json --ledger record_data.json
//!   wlmon_service --input samples.json --now 2025-06-17T13:00 --json
//!   wlmon_service --payload feed.json --verbose
//!
//! Environment:
//!   WLMON_CONFIG - path to pipeline.toml (default ./pipeline.toml)
//!   RUST_LOG     - log filter (overrides --verbose)

use chrono::{Duration, NaiveDateTime, Timelike, Utc};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use wlmon_service::analysis::pipeline;
use wlmon_service::config::{self, PipelineConfig};
use wlmon_service::ingest::telemetry;
use wlmon_service::ledger::{EventLedger, JsonFileLedger, MemoryLedger};
use wlmon_service::logging::{init_tracing, TracingLog};
use wlmon_service::model::WaterSample;
use wlmon_service::report;

const USAGE: &str = "[--config PATH] [--input FILE | --payload FILE | --url URL] [--ledger FILE] [--now YYYY-MM-DDTHH:MM] [--json] [--verbose]";

enum Source {
    SampleFile(PathBuf),
    PayloadFile(PathBuf),
    Url(String),
}

#[derive(Default)]
struct Options {
    config: Option<PathBuf>,
    source: Option<Source>,
    ledger: Option<PathBuf>,
    now: Option<NaiveDateTime>,
    json: bool,
    verbose: bool,
}

fn fail(message: &str) -> ! {
    eprintln!("\n❌ {}\n", message);
    process::exit(1);
}

fn parse_args(args: &[String]) -> Options {
    let mut options = Options::default();
    let program = args.first().map(String::as_str).unwrap_or("wlmon_service");

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let value = || -> String {
            match args.get(i + 1) {
                Some(v) => v.clone(),
                None => fail(&format!("{} requires a value", flag)),
            }
        };
        match flag {
            "--config" => {
                options.config = Some(PathBuf::from(value()));
                i += 2;
            }
            "--input" => {
                options.source = Some(Source::SampleFile(PathBuf::from(value())));
                i += 2;
            }
            "--payload" => {
                options.source = Some(Source::PayloadFile(PathBuf::from(value())));
                i += 2;
            }
            "--url" => {
                options.source = Some(Source::Url(value()));
                i += 2;
            }
            "--ledger" => {
                options.ledger = Some(PathBuf::from(value()));
                i += 2;
            }
            "--now" => {
                let raw = value();
                match NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M") {
                    Ok(now) => options.now = Some(now),
                    Err(e) => fail(&format!("--now {}: {}", raw, e)),
                }
                i += 2;
            }
            "--json" => {
                options.json = true;
                i += 1;
            }
            "--verbose" => {
                options.verbose = true;
                i += 1;
            }
            _ => {
                eprintln!("Unknown argument: {}", flag);
                eprintln!("Usage: {} {}", program, USAGE);
                process::exit(1);
            }
        }
    }
    options
}

fn load_pipeline_config(explicit: Option<&Path>) -> PipelineConfig {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = config::config_path_from_env();
            if !path.exists() {
                tracing::warn!("{} not found, using built-in defaults", path.display());
                return PipelineConfig::default();
            }
            path
        }
    };
    match config::load_config(&path) {
        Ok(config) => config,
        Err(e) => fail(&e.to_string()),
    }
}

fn load_samples(source: Option<Source>, config: &PipelineConfig, log: &TracingLog) -> Vec<WaterSample> {
    let source = match source {
        Some(source) => source,
        None => match &config.source.url {
            Some(url) => Source::Url(url.clone()),
            None => fail("no input: pass --input, --payload or --url, or set [source] url"),
        },
    };

    let result = match source {
        Source::SampleFile(path) => telemetry::parse_sample_file(&path),
        Source::PayloadFile(path) => match fs::read_to_string(&path) {
            Ok(body) => telemetry::parse_payload(&body, log),
            Err(e) => fail(&format!("failed to read {}: {}", path.display(), e)),
        },
        Source::Url(url) => telemetry::fetch_payload(&url, &config.source, log)
            .and_then(|body| telemetry::parse_payload(&body, log)),
    };
    match result {
        Ok(samples) => samples,
        Err(e) => fail(&e.to_string()),
    }
}

fn station_now(config: &PipelineConfig) -> NaiveDateTime {
    let now = Utc::now().naive_utc() + Duration::hours(config.station.utc_offset_hours as i64);
    now.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now)
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let options = parse_args(&args);
    init_tracing(options.verbose);

    if !options.json {
        println!("🌊 Water Level Report Service");
        println!("==============================\n");
    }

    let config = load_pipeline_config(options.config.as_deref());
    let log = TracingLog;
    let now = options.now.unwrap_or_else(|| station_now(&config));

    if !options.json {
        println!("📥 Loading samples...");
    }
    let samples = load_samples(options.source, &config, &log);
    if !options.json {
        println!("✓ {} samples\n", samples.len());
        println!("📊 Running pipeline as of {}...", now.format("%Y-%m-%d %H:%M"));
    }

    let output = pipeline::run(samples, now, &config, &log);

    let mut ledger: Box<dyn EventLedger> = match &options.ledger {
        Some(path) => match JsonFileLedger::open(path) {
            Ok(ledger) => Box::new(ledger),
            Err(e) => fail(&e.to_string()),
        },
        None => Box::new(MemoryLedger::new()),
    };

    let composed = match report::compose_report(&output, now, &config, ledger.as_mut(), &log) {
        Ok(report) => report,
        Err(e) => fail(&e.to_string()),
    };

    if options.json {
        let body = serde_json::json!({
            "now": now,
            "synoptic": composed.synoptic,
            "report": composed.text,
            "message": composed.message(),
            "points": output.points,
            "events": output.event_samples(),
        });
        match serde_json::to_string_pretty(&body) {
            Ok(text) => println!("{}", text),
            Err(e) => fail(&e.to_string()),
        }
    } else {
        println!("✓ {} events, {} report points\n", output.events.len(), output.points.len());
        println!("{}", composed.message());
    }
}
