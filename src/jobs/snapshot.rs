//! Background job: snapshot the adding cache to CSV every second, and
//! restore it at startup.
//!
//! Best-effort crash recovery, not a durability guarantee — the snapshotter
//! clones the cache's maps under its mutex and writes the CSVs after
//! releasing it, so mutators never block on file I/O and a slow disk never
//! holds up `addIsu`/`getTotal`/`buyItem`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time;

use crate::adding_cache::AddingCache;

/// Spawn the background snapshot task. Call once at startup, after
/// [`restore`] has already populated the cache.
pub fn spawn(cache: std::sync::Arc<AddingCache>, dir: PathBuf, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(interval_secs.max(1)));
        loop {
            interval.tick().await;
            if let Err(e) = dump(&cache, &dir) {
                tracing::error!("adding cache snapshot failed: {e}");
            }
        }
    });
}

fn que_path(dir: &Path) -> PathBuf {
    dir.join("que.csv")
}

fn total_path(dir: &Path) -> PathBuf {
    dir.join("total.csv")
}

fn dump(cache: &AddingCache, dir: &Path) -> anyhow::Result<()> {
    let (que, total) = cache.snapshot();

    let mut que_writer = csv::Writer::from_path(que_path(dir))?;
    for (room, time, isu) in que {
        que_writer.write_record([room, time.to_string(), isu])?;
    }
    que_writer.flush()?;

    let mut total_writer = csv::Writer::from_path(total_path(dir))?;
    for (room, isu) in total {
        total_writer.write_record([room, isu])?;
    }
    total_writer.flush()?;

    Ok(())
}

/// Restore cache state from a previous snapshot, if present. Called once at
/// startup before the HTTP listener binds. Missing files are not an error —
/// a fresh deployment has none yet.
pub fn restore(cache: &AddingCache, dir: &Path) {
    if let Ok(mut reader) = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(que_path(dir))
    {
        let mut que = Vec::new();
        for record in reader.records().flatten() {
            if let (Some(room), Some(time), Some(isu)) =
                (record.get(0), record.get(1), record.get(2))
            {
                if let Ok(time) = time.parse::<i64>() {
                    que.push((room.to_string(), time, isu.to_string()));
                }
            }
        }
        if !que.is_empty() {
            cache.restore(que, Vec::new());
        }
    }

    if let Ok(mut reader) = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(total_path(dir))
    {
        let mut total = Vec::new();
        for record in reader.records().flatten() {
            if let (Some(room), Some(isu)) = (record.get(0), record.get(1)) {
                total.push((room.to_string(), isu.to_string()));
            }
        }
        if !total.is_empty() {
            cache.restore(Vec::new(), total);
        }
    }
}
