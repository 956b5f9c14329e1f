use anyhow::{bail, Context, Result};
use log::info;
use rusqlite::Connection;

/// Schema scripts in order; entry `n` upgrades `user_version` from `n` to `n + 1`.
const MIGRATIONS: &[(&str, &str)] = &[("schema_v1.sql", include_str!("schemas/schema_v1.sql"))];

fn latest_version() -> i32 {
    MIGRATIONS.len() as i32
}

/// Brings the capture schema up to date in a single transaction. A database
/// written by a newer build is refused rather than downgraded.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let current: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")?;
    let latest = latest_version();

    if current < 0 {
        bail!("capture database has invalid schema version {current}");
    }
    if current > latest {
        bail!("capture database is at schema {current}, this build only knows {latest}");
    }
    if current == latest {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to open migration transaction")?;
    for (name, script) in &MIGRATIONS[current as usize..] {
        tx.execute_batch(script)
            .with_context(|| format!("failed to apply {name}"))?;
        info!("Applied capture schema migration {name}");
    }
    tx.pragma_update(None, "user_version", latest)
        .context("failed to update user_version pragma")?;
    tx.commit().context("failed to commit migrations")
}
