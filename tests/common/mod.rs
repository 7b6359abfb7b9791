//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{at, song_row, test_config, FakeSheetReader, FakeViewSource, TestStore, NOW};
//! use wakmusic_chart_crawler::SyncCycle;
//!
//! #[test]
//! fn test_cycle() {
//!     let store = TestStore::new();
//!     let sheet = FakeSheetReader::new(vec![song_row("Artist - Title", "vid1")]);
//!     let views = FakeViewSource::new(&[("vid1", 10)]);
//!     let config = test_config(&store);
//!     let cycle = SyncCycle::new(&store.store, &sheet, &views, &config);
//!     cycle.run(at(2024, 1, 1, 0), NOW).unwrap();
//! }
//! ```

mod constants;
mod fakes;
mod fixtures;

pub use constants::*;
#[allow(unused_imports)]
pub use fakes::{FailingStore, FakeSheetReader, FakeViewSource};
#[allow(unused_imports)]
pub use fixtures::{at, song_row, song_row_with, test_config, TestStore};
