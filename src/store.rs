//! The canvas store: an in-memory grid kept in step with its durable log.
//!
//! All mutation goes through [`CanvasStore::write`], which validates the
//! request, skips writes that would not change anything, and only touches the
//! grid after the log append has been made durable. The grid is rebuilt from
//! the log at startup, so at every point the grid equals the result of
//! replaying the log from the beginning.

use std::sync::Mutex;

use log::{debug, info};

use crate::canvas::Canvas;
use crate::error::{Error, Result};
use crate::wal::PixelLog;

/// Outcome of a write that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The pixel changed; the write was logged with this sequence number.
    Applied { seq: u64 },
    /// The pixel already had the requested color; nothing was logged.
    Unchanged,
}

/// The process-wide canvas plus the log that backs it.
///
/// Shared across request handlers behind an `Arc`; a single mutex serializes
/// the compare-append-mutate write path so concurrent writes to the same cell
/// cannot race the no-op check, and so the log and the grid never diverge.
pub struct CanvasStore {
    state: Mutex<State>,
}

struct State {
    canvas: Canvas,
    log: Box<dyn PixelLog>,
}

impl CanvasStore {
    /// Build a store by replaying every record in the log, in order.
    ///
    /// Later records overwrite earlier ones, which is correct because the
    /// scan is ascending by sequence. Any scan failure, out-of-order
    /// sequence, or out-of-range record is fatal: a grid that cannot be
    /// fully hydrated must not be served.
    pub fn open(log: Box<dyn PixelLog>) -> Result<Self> {
        let mut canvas = Canvas::new();
        let mut replayed = 0u64;
        let mut last_seq = None;

        {
            let scan = log
                .scan_all()
                .map_err(|e| Error::InitFailed(e.to_string()))?;
            for record in scan {
                let record = record.map_err(|e| Error::InitFailed(e.to_string()))?;
                if last_seq.is_some_and(|seq| record.seq <= seq) {
                    return Err(Error::InitFailed(format!(
                        "sequence {} out of order during replay",
                        record.seq
                    )));
                }
                let (x, y) = Canvas::check_bounds(record.x.into(), record.y.into())
                    .map_err(|e| Error::InitFailed(format!("record {}: {}", record.seq, e)))?;
                canvas.set(x, y, (record.r, record.g, record.b));
                last_seq = Some(record.seq);
                replayed += 1;
            }
        }

        info!("replayed {} pixel writes from the log", replayed);
        Ok(Self {
            state: Mutex::new(State { canvas, log }),
        })
    }

    /// Apply one pixel write.
    ///
    /// Validates bounds, elides writes that match the current color, appends
    /// to the log, and only then mutates the grid. On a failed append the
    /// grid is left untouched.
    pub fn write(&self, x: i64, y: i64, rgb: (u8, u8, u8)) -> Result<WriteOutcome> {
        let (x, y) = Canvas::check_bounds(x, y)?;
        let mut state = self.state.lock().unwrap();

        if state.canvas.get(x, y) == rgb {
            return Ok(WriteOutcome::Unchanged);
        }

        let seq = state.log.append(x, y, rgb)?;
        state.canvas.set(x, y, rgb);
        debug!(
            "pixel ({}, {}) -> #{:02x}{:02x}{:02x} (seq {})",
            x, y, rgb.0, rgb.1, rgb.2, seq
        );
        Ok(WriteOutcome::Applied { seq })
    }

    /// Encode the current canvas as a PNG.
    ///
    /// The grid is copied out under the lock; encoding happens outside it.
    pub fn png_snapshot(&self) -> Result<Vec<u8>> {
        let canvas = self.state.lock().unwrap().canvas.clone();
        canvas.encode_png()
    }

    /// Current color of one pixel.
    pub fn pixel(&self, x: i64, y: i64) -> Result<(u8, u8, u8)> {
        let (x, y) = Canvas::check_bounds(x, y)?;
        Ok(self.state.lock().unwrap().canvas.get(x, y))
    }

    /// Snapshot of the whole grid.
    pub fn canvas(&self) -> Canvas {
        self.state.lock().unwrap().canvas.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::{MemoryLog, PixelWrite, Scan};

    fn store_with_log() -> (CanvasStore, MemoryLog) {
        let log = MemoryLog::new();
        let handle = log.clone();
        let store = CanvasStore::open(Box::new(log)).expect("open");
        (store, handle)
    }

    #[test]
    fn write_applies_and_logs() {
        let (store, log) = store_with_log();

        let outcome = store.write(0, 0, (255, 0, 0)).unwrap();
        assert_eq!(outcome, WriteOutcome::Applied { seq: 1 });
        assert_eq!(store.pixel(0, 0).unwrap(), (255, 0, 0));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn identical_write_is_elided() {
        let (store, log) = store_with_log();

        store.write(4, 5, (10, 20, 30)).unwrap();
        let second = store.write(4, 5, (10, 20, 30)).unwrap();

        assert_eq!(second, WriteOutcome::Unchanged);
        assert_eq!(log.len(), 1);
        assert_eq!(store.pixel(4, 5).unwrap(), (10, 20, 30));
    }

    #[test]
    fn writing_default_color_to_untouched_cell_is_elided() {
        let (store, log) = store_with_log();

        let outcome = store.write(9, 9, (0, 0, 0)).unwrap();
        assert_eq!(outcome, WriteOutcome::Unchanged);
        assert!(log.is_empty());
    }

    #[test]
    fn out_of_bounds_write_has_no_effect() {
        let (store, log) = store_with_log();

        for (x, y) in [(-1, 0), (0, -1), (256, 0), (0, 256), (1 << 40, 3)] {
            assert!(matches!(
                store.write(x, y, (1, 2, 3)),
                Err(Error::OutOfBounds { .. })
            ));
        }
        assert!(log.is_empty());
        assert_eq!(store.pixel(0, 0).unwrap(), (0, 0, 0));
    }

    #[test]
    fn last_write_wins() {
        let (store, log) = store_with_log();

        store.write(12, 34, (255, 0, 0)).unwrap();
        store.write(12, 34, (0, 0, 255)).unwrap();

        assert_eq!(store.pixel(12, 34).unwrap(), (0, 0, 255));
        let cell_records: Vec<_> = log
            .records()
            .into_iter()
            .filter(|r| (r.x, r.y) == (12, 34))
            .collect();
        assert_eq!(cell_records.len(), 2);
        assert_eq!(
            (cell_records[1].r, cell_records[1].g, cell_records[1].b),
            (0, 0, 255)
        );
    }

    #[test]
    fn replay_matches_live_grid() {
        let (store, log) = store_with_log();

        store.write(0, 0, (255, 0, 0)).unwrap();
        store.write(100, 200, (0, 255, 0)).unwrap();
        store.write(255, 255, (0, 0, 255)).unwrap();
        store.write(0, 0, (9, 9, 9)).unwrap();

        let rebuilt = CanvasStore::open(Box::new(log.clone())).expect("replay");
        assert!(rebuilt.canvas() == store.canvas());
        assert_eq!(rebuilt.pixel(0, 0).unwrap(), (9, 9, 9));
        assert_eq!(rebuilt.pixel(100, 200).unwrap(), (0, 255, 0));
    }

    #[test]
    fn concurrent_writes_keep_log_and_grid_consistent() {
        use std::sync::Arc;

        let log = MemoryLog::new();
        let handle = log.clone();
        let store = Arc::new(CanvasStore::open(Box::new(log)).unwrap());

        let mut threads = Vec::new();
        for t in 1..=4u8 {
            let store = Arc::clone(&store);
            threads.push(std::thread::spawn(move || {
                for i in 0..50u8 {
                    store.write(7, 7, (t, i, 0)).unwrap();
                }
            }));
        }
        for thread in threads {
            thread.join().unwrap();
        }

        let records = handle.records();
        let last = records.last().unwrap();
        assert_eq!(store.pixel(7, 7).unwrap(), (last.r, last.g, last.b));
        for pair in records.windows(2) {
            // Strictly increasing sequences, and no record that repeats the
            // previous color: the no-op check ran inside the critical section.
            assert!(pair[1].seq > pair[0].seq);
            assert_ne!(
                (pair[0].r, pair[0].g, pair[0].b),
                (pair[1].r, pair[1].g, pair[1].b)
            );
        }
    }

    struct FailingLog;

    impl PixelLog for FailingLog {
        fn append(&mut self, _x: u32, _y: u32, _rgb: (u8, u8, u8)) -> Result<u64> {
            Err(Error::PersistFailed("disk full".into()))
        }

        fn scan_all(&self) -> Result<Scan<'_>> {
            Ok(Box::new(std::iter::empty()))
        }
    }

    #[test]
    fn failed_append_leaves_grid_untouched() {
        let store = CanvasStore::open(Box::new(FailingLog)).unwrap();

        assert!(matches!(
            store.write(1, 1, (5, 5, 5)),
            Err(Error::PersistFailed(_))
        ));
        assert_eq!(store.pixel(1, 1).unwrap(), (0, 0, 0));
    }

    struct StaticLog(Vec<PixelWrite>);

    impl PixelLog for StaticLog {
        fn append(&mut self, _x: u32, _y: u32, _rgb: (u8, u8, u8)) -> Result<u64> {
            unreachable!("replay-only log")
        }

        fn scan_all(&self) -> Result<Scan<'_>> {
            Ok(Box::new(self.0.clone().into_iter().map(Ok)))
        }
    }

    fn record(seq: u64, x: u32, y: u32) -> PixelWrite {
        PixelWrite {
            seq,
            x,
            y,
            r: 1,
            g: 2,
            b: 3,
        }
    }

    #[test]
    fn replay_rejects_out_of_order_sequences() {
        let log = StaticLog(vec![record(2, 0, 0), record(1, 1, 1)]);
        assert!(matches!(
            CanvasStore::open(Box::new(log)),
            Err(Error::InitFailed(_))
        ));
    }

    #[test]
    fn replay_rejects_out_of_range_records() {
        let log = StaticLog(vec![record(1, 999, 0)]);
        assert!(matches!(
            CanvasStore::open(Box::new(log)),
            Err(Error::InitFailed(_))
        ));
    }
}
