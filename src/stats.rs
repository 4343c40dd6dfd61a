//! Store statistics for `memh stats`.
//!
//! Prints the row counts from [`MemoryService::stats`] plus a per-category
//! breakdown of memory entries and how recently the knowledge base was
//! indexed.

use anyhow::Result;
use sqlx::Row;

use crate::service::MemoryService;

/// Query the store and print a summary.
pub async fn run_stats(service: &MemoryService) -> Result<()> {
    let config = service.config();
    let stats = service.stats().await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    let last_indexed: Option<i64> =
        sqlx::query_scalar("SELECT MAX(updated_at) FROM knowledge_chunks")
            .fetch_one(service.pool())
            .await?;

    println!("Memory Harness: Store Stats");
    println!("===========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", human_size(db_size));
    println!();
    println!("  Memories:    {}", stats.memories);
    match config.knowledge.root() {
        Some(root) => {
            println!("  Knowledge:   {}", root.display());
            println!("    files:     {}", stats.files);
            println!("    chunks:    {}", stats.chunks);
            println!(
                "    indexed:   {}",
                last_indexed.map_or_else(|| "never".to_string(), format_ts_relative)
            );
        }
        None => println!("  Knowledge:   disabled"),
    }
    match &config.history.path {
        Some(path) => println!(
            "  History:     {} entries ({})",
            stats.history_entries,
            path.display()
        ),
        None => println!("  History:     disabled"),
    }

    let rows = sqlx::query(
        "SELECT category, COUNT(*) AS n FROM memories GROUP BY category ORDER BY n DESC, category",
    )
    .fetch_all(service.pool())
    .await?;

    if !rows.is_empty() {
        println!();
        println!("  By category:");
        println!("  {:<14} {:>6}", "CATEGORY", "COUNT");
        println!("  {}", "-".repeat(21));
        for row in &rows {
            let category: String = row.get("category");
            let n: i64 = row.get("n");
            println!("  {:<14} {:>6}", category, n);
        }
    }

    println!();
    Ok(())
}

/// Database file size in binary units, one decimal above a kilobyte.
fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit + 1 < UNITS.len() {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

/// Relative time for a millisecond timestamp (e.g. "3 hours ago").
fn format_ts_relative(ts_ms: i64) -> String {
    let delta = (chrono::Utc::now().timestamp_millis() - ts_ms) / 1000;

    if delta < 0 {
        format_ts_iso(ts_ms)
    } else if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts_ms)
    }
}

fn format_ts_iso(ts_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ts_ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts_ms.to_string())
}
