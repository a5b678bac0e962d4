//! Grid Seed - synthetic meter data for a GridOps database
//!
//! Usage:
//!   grid_seed --db data/data.db
//!   grid_seed --db /tmp/grid.db --users 10 --history-days 90 --future-days 45 --seed 7
//!
//! Recreates `users` and `meter_loads`, then fills hourly per-meter loads
//! from `history_days` before today to `future_days` after it.

use anyhow::{Context, Result};
use chrono::{Datelike, Duration, Local, NaiveDate, Timelike};
use clap::Parser;
use gridopsd::storage::ensure_schema;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusqlite::{params, Connection};
use std::f64::consts::PI;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "grid_seed", version, about = "Seed a GridOps database with synthetic meter loads")]
struct Args {
    /// SQLite database file
    #[arg(long, default_value = "data/data.db")]
    db: PathBuf,

    /// Number of users (meters 1001..)
    #[arg(long, default_value_t = 5)]
    users: u32,

    /// Days of history before today
    #[arg(long, default_value_t = 730)]
    history_days: i64,

    /// Days of forecasts after today
    #[arg(long, default_value_t = 45)]
    future_days: i64,

    /// RNG seed for reproducible data
    #[arg(long)]
    seed: Option<u64>,
}

// ============================================================================
// LOAD MODEL
// ============================================================================

/// Yearly curve: low in early spring, peaking in summer
fn season_factor(date: NaiveDate) -> f64 {
    1.0 + 0.3 * ((date.ordinal() as f64 / 365.0) * 2.0 * PI - 0.5).sin()
}

/// Expected system-wide load for a day
fn daily_target(date: NaiveDate) -> f64 {
    500.0 + season_factor(date) * 200.0
}

/// Intraday curve: trough before dawn, peak mid-afternoon
fn hour_factor(hour: u32) -> f64 {
    1.0 + 0.5 * ((hour as f64 - 6.0) * PI / 12.0).sin()
}

/// Standard normal sample (Box-Muller)
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

struct SeedPlan {
    users: u32,
    start: NaiveDate,
    today: NaiveDate,
    end: NaiveDate,
}

impl SeedPlan {
    fn new(today: NaiveDate, users: u32, history_days: i64, future_days: i64) -> Self {
        Self {
            users,
            start: today - Duration::days(history_days.max(0)),
            today,
            end: today + Duration::days(future_days.max(0)),
        }
    }

    /// Daily totals: history carries noise, the future is the plain curve
    fn day_total(&self, date: NaiveDate, rng: &mut StdRng) -> f64 {
        if date <= self.today {
            round2(daily_target(date) + standard_normal(rng) * 50.0)
        } else {
            daily_target(date)
        }
    }

    fn rows(&self, rng: &mut StdRng) -> Vec<(i64, String, f64)> {
        let mut rows = Vec::new();
        let mut date = self.start;
        while date <= self.end {
            let total = self.day_total(date, rng);
            for hour in 0..24 {
                let Some(ts) = date.and_hms_opt(hour, 0, 0) else {
                    continue;
                };
                let system_load = (total / 24.0) * hour_factor(ts.hour());
                for i in 1..=self.users {
                    let jitter: f64 = rng.gen_range(0.8..1.2);
                    let load = (system_load / self.users as f64) * jitter;
                    rows.push((
                        1000 + i as i64,
                        ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                        round2(load),
                    ));
                }
            }
            date += Duration::days(1);
        }
        rows
    }
}

// ============================================================================
// DATABASE
// ============================================================================

fn seed(conn: &mut Connection, plan: &SeedPlan, rng: &mut StdRng) -> Result<usize> {
    let tx = conn.transaction()?;
    tx.execute("DROP TABLE IF EXISTS users", [])?;
    tx.execute("DROP TABLE IF EXISTS meter_loads", [])?;
    ensure_schema(&tx)?;

    for i in 1..=plan.users {
        tx.execute(
            "INSERT INTO users VALUES (?1, ?2)",
            params![format!("user_{}", i), 1000 + i as i64],
        )?;
    }

    let rows = plan.rows(rng);
    {
        let mut insert = tx.prepare("INSERT INTO meter_loads VALUES (?1, ?2, ?3)")?;
        for (meter_id, ts, load) in &rows {
            insert.execute(params![meter_id, ts, load])?;
        }
    }
    tx.commit()?;
    Ok(rows.len())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let today = Local::now().date_naive();
    let plan = SeedPlan::new(today, args.users, args.history_days, args.future_days);
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    if let Some(parent) = args.db.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let mut conn = Connection::open(&args.db)
        .with_context(|| format!("opening {}", args.db.display()))?;

    info!(
        "Seeding {} users from {} to {} into {}",
        plan.users,
        plan.start,
        plan.end,
        args.db.display()
    );
    let count = seed(&mut conn, &plan, &mut rng)?;
    info!("Inserted {} meter load rows", count);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> SeedPlan {
        SeedPlan::new(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(), 3, 2, 1)
    }

    #[test]
    fn test_row_count() {
        let mut rng = StdRng::seed_from_u64(1);
        // 4 days x 24 hours x 3 meters
        assert_eq!(plan().rows(&mut rng).len(), 4 * 24 * 3);
    }

    #[test]
    fn test_hour_factor_shape() {
        assert!((hour_factor(12) - 1.5).abs() < 1e-9);
        assert!((hour_factor(0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_future_day_total_is_noise_free() {
        let p = plan();
        let mut rng = StdRng::seed_from_u64(9);
        let tomorrow = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        assert_eq!(p.day_total(tomorrow, &mut rng), daily_target(tomorrow));
    }

    #[test]
    fn test_seed_populates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let count = seed(&mut conn, &plan(), &mut rng).unwrap();

        let users: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))
            .unwrap();
        let loads: i64 = conn
            .query_row("SELECT COUNT(*) FROM meter_loads", [], |r| r.get(0))
            .unwrap();
        assert_eq!(users, 3);
        assert_eq!(loads as usize, count);

        let day_sum: f64 = conn
            .query_row(
                "SELECT SUM(forecasted_load) FROM meter_loads WHERE date_time LIKE '2025-06-02%'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        // Jitter averages out near the daily target
        let target = daily_target(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
        assert!((day_sum - target).abs() < target * 0.25);
    }
}
