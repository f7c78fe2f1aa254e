//! Command bodies: transport assembly, the acquisition loop, bundle check, dataset check.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::{Result, WrapErr};
use serde_json::json;
use spectro_config::{Config, FrameConvention};
use spectro_core::{Orchestrator, OrchestratorCfg, Pipeline, RunStats};
use spectro_serial::SimulatedTransport;
use spectro_traits::Transport;

/// Pace of simulated frames, roughly the sensor's integration time.
const SIM_PERIOD: Duration = Duration::from_millis(20);
/// Every n-th simulated line is a banner instead of a frame.
const SIM_NOISE_EVERY: u64 = 7;

fn simulated(cfg: &Config) -> SimulatedTransport {
    let sim = SimulatedTransport::new(0x5eed)
        .with_period(SIM_PERIOD)
        .with_noise_every(SIM_NOISE_EVERY);
    match cfg.frame.convention {
        FrameConvention::Tagged => sim.tagged(cfg.frame.tag.clone()),
        FrameConvention::Untagged => sim,
    }
}

#[cfg(feature = "hardware")]
fn open_transport(cfg: &Config, sim: bool) -> Result<Box<dyn Transport>> {
    if sim {
        return Ok(Box::new(simulated(cfg)));
    }
    let port = spectro_serial::SerialTransport::open(
        &cfg.serial.port,
        cfg.serial.baud,
        Duration::from_millis(cfg.serial.read_timeout_ms),
    )?;
    // Opening the port resets most boards; let the firmware boot.
    std::thread::sleep(Duration::from_millis(cfg.serial.settle_ms));
    Ok(Box::new(port))
}

#[cfg(not(feature = "hardware"))]
fn open_transport(cfg: &Config, sim: bool) -> Result<Box<dyn Transport>> {
    if !sim {
        tracing::warn!(
            port = %cfg.serial.port,
            "built without the `hardware` feature; using the simulated sensor"
        );
    }
    Ok(Box::new(simulated(cfg)))
}

pub fn run_loop(cfg: &Config, sim: bool, max_cycles: Option<u64>, json_out: bool) -> Result<()> {
    // Bundles first: a bad model must never leave a half-open port behind.
    let pipeline = Arc::new(Pipeline::load(&cfg.models.juice, &cfg.models.concentration)?);

    let mut transport = open_transport(cfg, sim)?;
    transport
        .reset_input()
        .map_err(|e| eyre::eyre!("reset input buffer: {e}"))?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "could not install Ctrl-C handler");
        }
    }

    tracing::info!(
        port = %cfg.serial.port,
        baud = cfg.serial.baud,
        sim,
        reads_per_sample = cfg.sampling.reads_per_sample,
        "starting acquisition"
    );
    let mut orchestrator = Orchestrator::new(transport, pipeline, OrchestratorCfg::from(cfg));
    let stats = orchestrator.run(&shutdown, max_cycles);
    drop(orchestrator);

    print_stats(&stats, json_out);
    Ok(())
}

fn print_stats(stats: &RunStats, json_out: bool) {
    if json_out {
        println!("{}", json!({ "stats": stats }));
        return;
    }
    println!(
        "cycles: ok={} failed={} | lines: read={} dropped={} | frames: accepted={} rejected={} | idle_resets={} timeouts={} read_errors={}",
        stats.cycles_ok,
        stats.cycles_failed,
        stats.lines_read,
        stats.lines_dropped,
        stats.frames_accepted,
        stats.frames_rejected,
        stats.idle_resets,
        stats.timeouts,
        stats.read_errors
    );
}

pub fn check(cfg: &Config, json_out: bool) -> Result<()> {
    let p = Pipeline::load(&cfg.models.juice, &cfg.models.concentration)?;
    let juice = p.juice();
    let conc = p.concentration();
    if json_out {
        println!(
            "{}",
            json!({
                "juice": {
                    "kind": juice.classifier().kind(),
                    "preprocess": juice.preprocess().tag(),
                    "features": juice.feature_width(),
                    "classes": juice.labels().classes(),
                    "model_name": juice.model_name(),
                },
                "concentration": {
                    "kind": conc.classifier().kind(),
                    "preprocess": conc.preprocess().tag(),
                    "features": conc.feature_width(),
                    "classes": conc.labels().classes(),
                    "juice_categories": conc.encoder().categories(),
                    "model_name": conc.model_name(),
                },
                "reads_per_sample": cfg.sampling.reads_per_sample,
            })
        );
        return Ok(());
    }
    println!(
        "juice: kind={} preprocess={} features={} classes={}",
        juice.classifier().kind(),
        juice.preprocess().tag(),
        juice.feature_width(),
        juice.labels().classes().join(",")
    );
    println!(
        "concentration: kind={} preprocess={} features={} classes={} juice_categories={}",
        conc.classifier().kind(),
        conc.preprocess().tag(),
        conc.feature_width(),
        conc.labels().classes().join(","),
        conc.encoder().categories().join(",")
    );
    println!("ok");
    Ok(())
}

pub fn dataset(files: &[PathBuf], json_out: bool) -> Result<()> {
    let mut reports = Vec::with_capacity(files.len());
    for f in files {
        let rows = spectro_config::load_dataset_csv(f)
            .wrap_err_with(|| format!("dataset {}", f.display()))?;
        let summary = spectro_config::DatasetSummary::from_rows(&rows);
        tracing::debug!(file = %f.display(), rows = summary.rows, "dataset validated");
        reports.push((f, summary));
    }
    for (f, s) in &reports {
        if json_out {
            println!(
                "{}",
                json!({
                    "file": f.display().to_string(),
                    "rows": s.rows,
                    "juice": s.by_juice,
                    "concentration": s.by_concentration,
                })
            );
            continue;
        }
        let fmt_counts = |m: &std::collections::BTreeMap<String, usize>| {
            m.iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(" ")
        };
        println!(
            "{}: {} rows | juice: {} | concentration: {}",
            f.display(),
            s.rows,
            fmt_counts(&s.by_juice),
            fmt_counts(&s.by_concentration)
        );
    }
    Ok(())
}
