//! `binsort` is a bounded-memory external merge sort for binary files of 64-bit integers.
//!
//! External sorting is a class of sorting algorithms that can handle massive amounts of data. External sorting
//! is required when the data being sorted do not fit into the main memory (RAM) of a computer and instead must be
//! resided in slower external memory, usually a hard disk drive. Sorting is achieved in two passes. During the
//! first pass every input file is cut into blocks that fit in RAM; each block is sorted and written out as a
//! temporary run file. During the second pass the runs are merged a bounded number at a time, round after round,
//! until a single fully sorted run remains; that run is renamed onto the output path without copying the data.
//! For more information see [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Overview
//!
//! `binsort` supports the following features:
//!
//! * **Fixed wire format:**
//!   every file is a raw sequence of little-endian signed 64-bit integers with no header and no delimiters;
//!   a trailing fragment shorter than one record is dropped and its size reported.
//! * **Multithreading support:**
//!   input files are split into runs in parallel and run groups are merged in parallel, utilizing maximum CPU
//!   resources and reducing sorting time.
//! * **Bounded memory:**
//!   the block size caps how many records are held in memory per worker, so arbitrarily large inputs sort
//!   within a fixed memory budget.
//!
//! # Example
//!
//! ```no_run
//! use std::path::{Path, PathBuf};
//!
//! use binsort::ExternalSorterBuilder;
//!
//! fn main() {
//!     let inputs = vec![PathBuf::from("a.bin"), PathBuf::from("b.bin")];
//!
//!     let sorter = ExternalSorterBuilder::new()
//!         .with_block_size(1 << 20)
//!         .with_fan_in(8)
//!         .build()
//!         .unwrap();
//!
//!     let report = sorter.sort_files(&inputs, Path::new("sorted.bin")).unwrap();
//!     println!("{} records written to {}", report.records, report.output.display());
//! }
//! ```

pub mod buffer;
pub mod merger;
pub mod run;
pub mod scratch;
pub mod sort;
pub mod split;

pub use buffer::BlockBuffer;
pub use merger::BinaryHeapMerger;
pub use run::{RunReader, RunWriter, RECORD_SIZE};
pub use scratch::ScratchDir;
pub use sort::{ExternalSorter, ExternalSorterBuilder, SortError, SortReport};
