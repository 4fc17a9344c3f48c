//! Pixelboard
//!
//! A shared collaborative pixel canvas served over HTTP. Every accepted
//! single-pixel write is appended to a durable log before it lands in the
//! in-memory grid, and the grid is rebuilt by replaying that log at startup,
//! so the canvas survives restarts without ever persisting the bitmap itself.
//!
//! # Example
//!
//! ```
//! use pixelboard::{CanvasStore, MemoryLog, WriteOutcome};
//!
//! # fn main() -> pixelboard::Result<()> {
//! let store = CanvasStore::open(Box::new(MemoryLog::new()))?;
//! let outcome = store.write(0, 0, (255, 0, 0))?;
//! assert!(matches!(outcome, WriteOutcome::Applied { seq: 1 }));
//!
//! // Writing the same color again is a no-op and is not logged.
//! assert_eq!(store.write(0, 0, (255, 0, 0))?, WriteOutcome::Unchanged);
//!
//! let png = store.png_snapshot()?;
//! assert_eq!(&png[0..8], b"\x89PNG\r\n\x1a\n");
//! # Ok(())
//! # }
//! ```

pub mod canvas;
pub mod error;
pub mod server;
pub mod store;
pub mod wal;

pub use canvas::{Canvas, HEIGHT, WIDTH};
pub use error::{Error, Result};
pub use store::{CanvasStore, WriteOutcome};
pub use wal::{FileLog, MemoryLog, PixelLog, PixelWrite};
