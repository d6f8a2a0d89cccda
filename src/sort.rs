//! External sorter.

use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log;
use rayon::prelude::*;

use crate::merger;
use crate::scratch::ScratchDir;
use crate::split::{self, FileSplit};

/// Records sorted in memory per run unless configured otherwise
/// (1 Mi records, 8 MiB of record data).
pub const DEFAULT_BLOCK_SIZE: usize = 1 << 20;
/// Runs merged together per k-way merge unless configured otherwise.
pub const DEFAULT_FAN_IN: usize = 16;
/// Read/write coalescing buffer size in bytes unless configured otherwise.
pub const DEFAULT_RW_BUF_SIZE: usize = 1 << 16;

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Scratch directory creation error.
    TempDir(io::Error),
    /// Workers thread pool initialization error.
    ThreadPoolBuild(rayon::ThreadPoolBuildError),
    /// Common I/O error.
    Io(io::Error),
    /// Final rename onto the output path failed.
    Rename(io::Error),
    /// Scratch directory removal failed.
    Cleanup(io::Error),
    /// The input list was empty.
    NoInput,
    /// Invalid sorter configuration.
    Config(&'static str),
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::TempDir(err) => Some(err),
            SortError::ThreadPoolBuild(err) => Some(err),
            SortError::Io(err) => Some(err),
            SortError::Rename(err) => Some(err),
            SortError::Cleanup(err) => Some(err),
            SortError::NoInput | SortError::Config(_) => None,
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::TempDir(err) => write!(f, "scratch directory not created: {}", err),
            SortError::ThreadPoolBuild(err) => write!(f, "thread pool initialization failed: {}", err),
            SortError::Io(err) => write!(f, "I/O operation failed: {}", err),
            SortError::Rename(err) => write!(f, "renaming the result onto the output path failed: {}", err),
            SortError::Cleanup(err) => write!(f, "scratch directory removal failed: {}", err),
            SortError::NoInput => write!(f, "no input files given"),
            SortError::Config(reason) => write!(f, "invalid configuration: {}", reason),
        }
    }
}

/// Outcome of a successful sort.
#[derive(Debug)]
pub struct SortReport {
    /// Where the sorted data landed.
    pub output: PathBuf,
    /// Records written to the output.
    pub records: u64,
    /// Inputs that could not be opened and contributed no records.
    pub skipped_inputs: usize,
    /// Bytes discarded because an input length was not a whole number of
    /// records.
    pub trailing_bytes: u64,
}

/// External sorter builder. Provides methods for [`ExternalSorter`] initialization.
#[derive(Clone)]
pub struct ExternalSorterBuilder {
    /// Number of threads to be used to split and merge data in parallel.
    threads_number: Option<usize>,
    /// Directory the scratch directory is created under.
    tmp_dir: Option<Box<Path>>,
    /// Maximum records per in-memory block.
    block_size: usize,
    /// Maximum runs merged together in one k-way merge.
    fan_in: usize,
    /// Run file read/write buffer size.
    rw_buf_size: usize,
}

impl ExternalSorterBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        ExternalSorterBuilder::default()
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    pub fn build(self) -> Result<ExternalSorter, SortError> {
        ExternalSorter::new(
            self.threads_number,
            self.tmp_dir.as_deref(),
            self.block_size,
            self.fan_in,
            self.rw_buf_size,
        )
    }

    /// Sets number of threads to be used to split and merge data in parallel.
    pub fn with_threads_number(mut self, threads_number: usize) -> ExternalSorterBuilder {
        self.threads_number = Some(threads_number);
        return self;
    }

    /// Sets directory to be used to store temporary data.
    pub fn with_tmp_dir(mut self, path: &Path) -> ExternalSorterBuilder {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Sets the maximum number of records sorted in memory at once.
    pub fn with_block_size(mut self, block_size: usize) -> ExternalSorterBuilder {
        self.block_size = block_size;
        return self;
    }

    /// Sets the maximum number of runs merged together in one k-way merge.
    pub fn with_fan_in(mut self, fan_in: usize) -> ExternalSorterBuilder {
        self.fan_in = fan_in;
        return self;
    }

    /// Sets run file read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: usize) -> ExternalSorterBuilder {
        self.rw_buf_size = buf_size;
        return self;
    }
}

impl Default for ExternalSorterBuilder {
    fn default() -> Self {
        ExternalSorterBuilder {
            threads_number: None,
            tmp_dir: None,
            block_size: DEFAULT_BLOCK_SIZE,
            fan_in: DEFAULT_FAN_IN,
            rw_buf_size: DEFAULT_RW_BUF_SIZE,
        }
    }
}

/// External sorter for binary files of 64-bit records.
///
/// Equal records carry no identity of their own, so no relative order among
/// them is guaranteed or observable across merges.
pub struct ExternalSorter {
    /// Worker thread pool.
    thread_pool: rayon::ThreadPool,
    /// Directory the scratch directory is created under.
    tmp_dir: Option<Box<Path>>,
    /// Maximum records per in-memory block.
    block_size: usize,
    /// Maximum runs merged together in one k-way merge.
    fan_in: usize,
    /// Run file read/write buffer size.
    rw_buf_size: usize,
}

impl ExternalSorter {
    /// Creates a new external sorter instance.
    ///
    /// # Arguments
    /// * `threads_number` - Number of threads to be used for parallel splitting and merging.
    ///   If the parameter is [`None`] threads number will be selected based on available CPU core number.
    /// * `tmp_dir` - Directory the scratch directory is created under. If the parameter is [`None`]
    ///   default OS temporary directory will be used.
    /// * `block_size` - Maximum records sorted in memory at once.
    /// * `fan_in` - Maximum runs merged together in one k-way merge.
    /// * `rw_buf_size` - Run file read/write buffer size.
    pub fn new(
        threads_number: Option<usize>,
        tmp_dir: Option<&Path>,
        block_size: usize,
        fan_in: usize,
        rw_buf_size: usize,
    ) -> Result<Self, SortError> {
        if block_size == 0 {
            return Err(SortError::Config("block size must be at least one record"));
        }
        if fan_in < 2 {
            return Err(SortError::Config("merge fan-in must be at least 2"));
        }

        return Ok(ExternalSorter {
            thread_pool: Self::init_thread_pool(threads_number)?,
            tmp_dir: tmp_dir.map(|path| path.into()),
            block_size,
            fan_in,
            rw_buf_size,
        });
    }

    fn init_thread_pool(threads_number: Option<usize>) -> Result<rayon::ThreadPool, SortError> {
        let mut thread_pool_builder = rayon::ThreadPoolBuilder::new();

        if let Some(threads_number) = threads_number {
            log::info!("initializing thread-pool (threads: {})", threads_number);
            thread_pool_builder = thread_pool_builder.num_threads(threads_number);
        } else {
            log::info!("initializing thread-pool (threads: default)");
        }
        let thread_pool = thread_pool_builder
            .build()
            .map_err(|err| SortError::ThreadPoolBuild(err))?;

        return Ok(thread_pool);
    }

    /// Sorts all records from `inputs` into a single file at `output`.
    ///
    /// Every input is split into sorted runs in parallel, the runs are
    /// merged in rounds of at most the configured fan-in until one remains,
    /// and that run is renamed onto `output`, replacing any prior file
    /// there. Nothing is renamed into place unless the whole pipeline
    /// succeeded, and the scratch directory is removed whether it succeeded
    /// or not.
    pub fn sort_files(&self, inputs: &[PathBuf], output: &Path) -> Result<SortReport, SortError> {
        if inputs.is_empty() {
            return Err(SortError::NoInput);
        }

        let scratch = ScratchDir::new(self.tmp_dir.as_deref()).map_err(|err| SortError::TempDir(err))?;

        let splits = self.split_phase(inputs, &scratch)?;

        let records: u64 = splits.iter().map(|split| split.records).sum();
        let skipped_inputs = splits.iter().filter(|split| split.skipped).count();
        let trailing_bytes: u64 = splits.iter().map(|split| split.trailing_bytes).sum();
        let runs = Vec::from_iter(splits.into_iter().flat_map(|split| split.runs));

        log::info!("split phase done: {} records in {} runs", records, runs.len());

        match self.merge_phase(runs, &scratch)? {
            Some(last_run) => {
                fs::rename(&last_run, output).map_err(|err| SortError::Rename(err))?;
            }
            // every input was empty or skipped, so the sum of readable
            // input lengths is zero and the output is an empty file
            None => {
                fs::File::create(output).map_err(|err| SortError::Io(err))?;
            }
        }

        scratch.close().map_err(|err| SortError::Cleanup(err))?;

        log::info!("sorted {} records into {}", records, output.display());

        return Ok(SortReport {
            output: output.to_path_buf(),
            records,
            skipped_inputs,
            trailing_bytes,
        });
    }

    /// Splits every input into sorted runs, one task per input file.
    ///
    /// Each task owns its local result; the per-file results are only
    /// joined here at the phase barrier, and any task error aborts the
    /// phase.
    fn split_phase(&self, inputs: &[PathBuf], scratch: &ScratchDir) -> Result<Vec<FileSplit>, SortError> {
        self.thread_pool
            .install(|| {
                inputs
                    .par_iter()
                    .map(|input| split::split_file(input, scratch, self.block_size, self.rw_buf_size))
                    .collect::<io::Result<Vec<_>>>()
            })
            .map_err(|err| SortError::Io(err))
    }

    /// Merges the run set down to a single run.
    ///
    /// Each round partitions the runs positionally into groups of at most
    /// the fan-in and merges the groups in parallel; the round barrier
    /// aborts on the first failed group. Zero or one run means zero rounds.
    fn merge_phase(&self, mut runs: Vec<PathBuf>, scratch: &ScratchDir) -> Result<Option<PathBuf>, SortError> {
        while runs.len() > 1 {
            log::debug!("merge round: {} runs, fan-in {}", runs.len(), self.fan_in);

            runs = self
                .thread_pool
                .install(|| {
                    runs.par_chunks(self.fan_in)
                        .map(|group| merger::merge_group(group, scratch, self.rw_buf_size))
                        .collect::<io::Result<Vec<_>>>()
                })
                .map_err(|err| SortError::Io(err))?;
        }

        return Ok(runs.pop());
    }
}
