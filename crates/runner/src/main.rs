use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use vigil_detector::{Detector, IsolationForestDetector};
use vigil_runner::{
    AlertLog, AlertRecorder, DetectionService, FileEvidenceSink, RunnerConfig, read_events_from,
    write_subgraph,
};

/// Hops and node cap for `--export-graph`
const EXPORT_DEPTH: usize = 2;
const EXPORT_MAX_NODES: usize = 200;

fn print_help() {
    eprintln!(
        r#"Vigil - market manipulation cluster detector

USAGE:
    vigil --events <PATH> [OPTIONS]

OPTIONS:
    --events <PATH>         Events file, JSON Lines or a JSON array ("-" for stdin)
    --config <PATH>         Load runner configuration from JSON file
    --out <DIR>             Results directory (evidence/ and alerts.jsonl inside)
    --evidence-dir <DIR>    Evidence directory (overrides --out)
    --threshold <FLOAT>     Cluster alert threshold, 0..1
    --seeds <N>             Seed accounts evaluated per scan
    --ml-weight <FLOAT>     Isolation-forest share of the final score, 0..1
    --export-graph <ACCT>   Write the account's 2-hop neighborhood as JSON and DOT
    --help                  Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                Log level filter (default: info)

EXAMPLES:
    # Rule-only scan with defaults
    vigil --events events.jsonl

    # Mix in the anomaly model and lower the threshold
    vigil --events events.jsonl --ml-weight 0.3 --threshold 0.5 --out results

    # Dump the relationship graph around a suspect for visualization
    vigil --events events.jsonl --export-graph ACC-17
"#
    );
}

#[derive(Debug, Default)]
struct CliArgs {
    events: Option<String>,
    config: Option<String>,
    out: Option<PathBuf>,
    evidence_dir: Option<PathBuf>,
    threshold: Option<f64>,
    seeds: Option<usize>,
    ml_weight: Option<f64>,
    export_graph: Vec<String>,
}

fn value_for(args: &[String], i: usize, flag: &str) -> String {
    match args.get(i) {
        Some(value) => value.clone(),
        None => {
            eprintln!("Error: {} requires a value", flag);
            std::process::exit(1);
        }
    }
}

fn parsed<T: std::str::FromStr>(raw: String, flag: &str) -> T {
    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            eprintln!("Error: invalid value '{}' for {}", raw, flag);
            std::process::exit(1);
        }
    }
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs::default();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--events" | "-e" => {
                i += 1;
                cli.events = Some(value_for(&args, i, flag));
            }
            "--config" | "-c" => {
                i += 1;
                cli.config = Some(value_for(&args, i, flag));
            }
            "--out" | "-o" => {
                i += 1;
                cli.out = Some(PathBuf::from(value_for(&args, i, flag)));
            }
            "--evidence-dir" => {
                i += 1;
                cli.evidence_dir = Some(PathBuf::from(value_for(&args, i, flag)));
            }
            "--threshold" => {
                i += 1;
                cli.threshold = Some(parsed(value_for(&args, i, flag), flag));
            }
            "--seeds" => {
                i += 1;
                cli.seeds = Some(parsed(value_for(&args, i, flag), flag));
            }
            "--ml-weight" => {
                i += 1;
                cli.ml_weight = Some(parsed(value_for(&args, i, flag), flag));
            }
            "--export-graph" => {
                i += 1;
                cli.export_graph.push(value_for(&args, i, flag));
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }
    cli
}

/// Config file first, then flags on top
fn resolve_config(cli: &CliArgs) -> vigil_runner::Result<RunnerConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            RunnerConfig::from_file(path)?
        }
        None => RunnerConfig::default(),
    };

    if let Some(out) = &cli.out {
        config.evidence_dir = out.join("evidence");
        config.alerts_path = out.join("alerts.jsonl");
    }
    if let Some(dir) = &cli.evidence_dir {
        config.evidence_dir = dir.clone();
    }
    if let Some(threshold) = cli.threshold {
        config.detector.alert_threshold = threshold;
    }
    if let Some(seeds) = cli.seeds {
        config.detector.seed_count = seeds;
    }
    if let Some(weight) = cli.ml_weight {
        config.detector.ml_weight = weight;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = parse_args();
    let Some(events_path) = cli.events.clone() else {
        eprintln!("Error: --events is required");
        print_help();
        std::process::exit(1);
    };

    let config = resolve_config(&cli)?;
    let events = read_events_from(&events_path)?;
    info!("Loaded {} events from {}", events.len(), events_path);

    let mut detector = Detector::new(config.detector.clone())?;
    if config.detector.ml_weight > 0.0 {
        detector = detector.with_anomaly_detector(Arc::new(IsolationForestDetector::new()));
    }

    let sink = FileEvidenceSink::new(&config.evidence_dir)?;
    let log = AlertLog::open(&config.alerts_path)?;
    let mut recorder = AlertRecorder::new(sink, log);

    let (service, input, mut alerts) = DetectionService::new(detector, &config);
    let service_handle = service.spawn();

    let feeder = tokio::spawn(async move {
        for event in events {
            if input.send(event).await.is_err() {
                break;
            }
        }
    });

    while let Some(raised) = alerts.recv().await {
        recorder.record(raised)?;
    }

    feeder.await?;
    let report = service_handle.await?;
    let stats = report.detector.stats();

    let graph_dir = config
        .evidence_dir
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_default();
    for seed in &cli.export_graph {
        let (json_path, dot_path) = write_subgraph(
            report.detector.graph(),
            seed,
            EXPORT_DEPTH,
            EXPORT_MAX_NODES,
            &graph_dir,
        )?;
        info!(
            "Graph around {} written to {} and {}",
            seed,
            json_path.display(),
            dot_path.display()
        );
    }

    println!("=== Vigil summary ===");
    println!("Events received:    {}", report.events_received);
    println!("Accepted:           {}", stats.accepted());
    println!("Rejected:           {}", stats.rejected);
    println!("Scans:              {}", report.scans);
    println!("Alerts:             {}", recorder.recorded());
    println!("Anomaly model:      {}", report.detector.anomaly_status());
    println!("Evidence directory: {}", config.evidence_dir.display());
    println!("Alert log:          {}", config.alerts_path.display());

    Ok(())
}
