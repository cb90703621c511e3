//! Export of pick tables and signals: JSON and CSV.
//!
//! - **JSON**: the full tables, with a `schema_version` and generation time
//! - **CSV**: one row per pick, tagged with the table it belongs to
//!
//! Scored headlines for news sentiment are read from a JSON array here too.

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use marketlens_core::signals::{PickTables, ScoredHeadline, Signal, StockPick};
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
struct PicksDocument<'a> {
    schema_version: u32,
    generated_at: DateTime<Utc>,
    tables: &'a PickTables,
}

#[derive(Debug, Deserialize)]
struct SchemaHeader {
    schema_version: u32,
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_picks_json(tables: &PickTables, generated_at: DateTime<Utc>) -> Result<String> {
    let doc = PicksDocument {
        schema_version: SCHEMA_VERSION,
        generated_at,
        tables,
    };
    serde_json::to_string_pretty(&doc).context("failed to serialize pick tables to JSON")
}

/// Reject documents written by a newer schema.
pub fn check_schema(json: &str) -> Result<u32> {
    let header: SchemaHeader =
        serde_json::from_str(json).context("document has no schema_version")?;
    if header.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            header.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(header.schema_version)
}

pub fn export_signal_json(signal: &Signal) -> Result<String> {
    serde_json::to_string_pretty(signal).context("failed to serialize signal to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

fn write_pick_rows(
    wtr: &mut csv::Writer<Vec<u8>>,
    table: &str,
    picks: &[StockPick],
) -> Result<()> {
    for (rank, p) in picks.iter().enumerate() {
        let record = [
            table.to_string(),
            (rank + 1).to_string(),
            p.symbol.clone(),
            p.display_name.clone(),
            p.category.label().to_string(),
            format!("{:.2}", p.price),
            format!("{:.2}", p.price_change_pct),
            format!("{:.2}", p.volume_ratio),
            format!("{:.3}", p.overall_score),
            format!("{:.1}", p.confidence),
            format!("{:.2}", p.buy_position.price),
            p.buy_position.basis.label().to_string(),
            format!("{:.2}", p.sell_position.price),
            p.sell_position.basis.label().to_string(),
            p.potential_return.to_string(),
            format!("{:.2}", p.risk_score),
            p.reason_summary(),
            p.risk_summary(),
            p.degraded.to_string(),
        ];
        wtr.write_record(&record)?;
    }
    Ok(())
}

/// Columns: table, rank, symbol, name, category, price, change_pct,
/// volume_ratio, score, confidence, buy_price, buy_basis, sell_price,
/// sell_basis, potential_return, risk_score, reasons, risk_factors, degraded
pub fn export_picks_csv(tables: &PickTables) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "table",
        "rank",
        "symbol",
        "name",
        "category",
        "price",
        "change_pct",
        "volume_ratio",
        "score",
        "confidence",
        "buy_price",
        "buy_basis",
        "sell_price",
        "sell_basis",
        "potential_return",
        "risk_score",
        "reasons",
        "risk_factors",
        "degraded",
    ])?;

    write_pick_rows(&mut wtr, "regular", &tables.regular)?;
    write_pick_rows(&mut wtr, "penny", &tables.penny)?;
    write_pick_rows(&mut wtr, "mixed", &tables.mixed)?;

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Files ──────────────────────────────────────────────────────────

/// Read `[{"text": ..., "compound": ...}, ...]`.
pub fn load_headlines(path: &Path) -> Result<Vec<ScoredHeadline>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read headlines from {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("invalid headline file {}", path.display()))
}

pub fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}
