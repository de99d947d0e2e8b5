use anyhow::Result;
use covidbr::{
    format::{rate, signed_percent, thousands},
    output::{resolve_output_path, write_table},
    pipeline, Config,
};
use std::{env, path::PathBuf, time::Instant};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) load config ──────────────────────────────────────────────
    let config = match Config::resolve(env::args().nth(1).map(PathBuf::from)) {
        Ok(c) => c,
        Err(e) => {
            error!("config: {}", e);
            return Err(e.into());
        }
    };
    info!(
        url = %config.source.url,
        format = %config.source.format,
        metric = %config.ranking.metric,
        "configured"
    );

    // ─── 3) fetch → normalize → derive → rank ────────────────────────
    let start = Instant::now();
    let report = match pipeline::run(&config) {
        Ok(r) => r,
        Err(e) => {
            error!("pipeline failed: {}", e);
            return Err(e.into());
        }
    };
    info!(elapsed = ?start.elapsed(), "pipeline done");

    // ─── 4) summary ──────────────────────────────────────────────────
    info!("data de referência: {}", report.date.format("%d/%m/%Y"));
    info!(
        "casos confirmados: {} | óbitos: {}",
        thousands(report.totals.confirmed),
        thousands(report.totals.deaths)
    );
    match report.variation {
        Some(v) => info!("variação mensal de casos: {}", signed_percent(v)),
        None => info!("variação mensal de casos: indisponível"),
    }
    info!(
        "maior letalidade: {} ({}%) | menor letalidade: {} ({}%)",
        report.worst.region,
        rate(report.worst.mortality_rate),
        report.best.region,
        rate(report.best.mortality_rate)
    );
    for (i, r) in report.top.iter().enumerate() {
        let value = report
            .table
            .metric
            .value(r)
            .map(rate)
            .unwrap_or_else(|| "-".to_string());
        info!("{:>2}. {} {}={}", i + 1, r.region, report.table.metric, value);
    }

    // ─── 5) write table ──────────────────────────────────────────────
    if let Some(path) = resolve_output_path(&config.output, report.date) {
        if let Err(e) = write_table(&path, &report.records) {
            error!("writing {} failed: {}", path.display(), e);
            return Err(e.into());
        }
    }

    info!("all done");
    Ok(())
}
