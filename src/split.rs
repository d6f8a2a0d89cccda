//! Input splitting.
//!
//! Each input file is read in blocks of at most the configured number of
//! records; every block is sorted in memory and written out as a run.

use std::io;
use std::path::{Path, PathBuf};

use log;
use rayon::prelude::*;

use crate::run::{self, RunReader};
use crate::scratch::ScratchDir;

/// What one input file contributed to the run set.
pub struct FileSplit {
    /// Runs produced from the file, in file order.
    pub runs: Vec<PathBuf>,
    /// Whole records read from the file.
    pub records: u64,
    /// Bytes at the end of the file that did not form a whole record.
    pub trailing_bytes: u64,
    /// Whether the file could not be opened and contributed nothing.
    pub skipped: bool,
}

impl FileSplit {
    fn skipped() -> Self {
        FileSplit {
            runs: Vec::new(),
            records: 0,
            trailing_bytes: 0,
            skipped: true,
        }
    }
}

/// Splits one input file into sorted runs of at most `block_size` records.
///
/// An input that cannot be opened is logged and skipped, contributing zero
/// records; the caller surfaces the skip through its report. Any I/O error
/// past that point is returned and aborts the split phase.
pub fn split_file(
    input: &Path,
    scratch: &ScratchDir,
    block_size: usize,
    rw_buf_size: usize,
) -> io::Result<FileSplit> {
    let reader = match RunReader::open(input, rw_buf_size) {
        Ok(reader) => reader,
        Err(err) => {
            log::warn!("skipping unreadable input {}: {}", input.display(), err);
            return Ok(FileSplit::skipped());
        }
    };

    let trailing_bytes = reader.trailing_bytes();
    if trailing_bytes > 0 {
        log::warn!(
            "{}: dropping {} trailing bytes that do not form a whole record",
            input.display(),
            trailing_bytes
        );
    }

    let mut runs = Vec::new();
    let mut records = 0u64;
    let mut block: Vec<i64> = Vec::with_capacity(block_size);

    for record in reader {
        block.push(record?);
        records += 1;

        if block.len() == block_size {
            runs.push(sort_and_write_block(&mut block, scratch, rw_buf_size)?);
        }
    }

    if !block.is_empty() {
        runs.push(sort_and_write_block(&mut block, scratch, rw_buf_size)?);
    }

    log::debug!(
        "{}: {} records split into {} runs",
        input.display(),
        records,
        runs.len()
    );

    return Ok(FileSplit {
        runs,
        records,
        trailing_bytes,
        skipped: false,
    });
}

/// Sorts the accumulated block and materializes it as a run, leaving the
/// block empty for reuse.
fn sort_and_write_block(
    block: &mut Vec<i64>,
    scratch: &ScratchDir,
    rw_buf_size: usize,
) -> io::Result<PathBuf> {
    block.par_sort_unstable();

    let path = run::write_run(scratch.next_run_path(), block, rw_buf_size)?;
    block.clear();

    return Ok(path);
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::io::prelude::*;
    use std::path::Path;

    use rstest::*;

    use super::split_file;
    use crate::run::RunReader;
    use crate::scratch::ScratchDir;

    #[fixture]
    fn scratch() -> ScratchDir {
        ScratchDir::new(None).unwrap()
    }

    fn write_records(path: &Path, records: &[i64]) {
        let mut file = fs::File::create(path).unwrap();
        for &record in records {
            file.write_all(&record.to_le_bytes()).unwrap();
        }
    }

    fn read_records(path: &Path) -> Vec<i64> {
        RunReader::open(path, 8192).unwrap().map(Result::unwrap).collect()
    }

    #[rstest]
    fn test_split_produces_sorted_runs(scratch: ScratchDir) {
        let input_dir = tempfile::tempdir().unwrap();
        let input = input_dir.path().join("input.bin");
        write_records(&input, &[9, -4, 7, 0, 3, 8, -1, 5, 2, 6]);

        let split = split_file(&input, &scratch, 4, 64).unwrap();

        assert!(!split.skipped);
        assert_eq!(split.records, 10);
        assert_eq!(split.trailing_bytes, 0);
        assert_eq!(split.runs.len(), 3);

        let mut all = Vec::new();
        for run in &split.runs {
            let records = read_records(run);
            assert!(records.windows(2).all(|pair| pair[0] <= pair[1]));
            all.extend(records);
        }

        all.sort_unstable();
        assert_eq!(all, vec![-4, -1, 0, 2, 3, 5, 6, 7, 8, 9]);
    }

    #[rstest]
    fn test_block_boundary_produces_full_runs(scratch: ScratchDir) {
        let input_dir = tempfile::tempdir().unwrap();
        let input = input_dir.path().join("input.bin");
        write_records(&input, &[4, 3, 2, 1]);

        let split = split_file(&input, &scratch, 2, 64).unwrap();

        assert_eq!(split.runs.len(), 2);
        assert_eq!(read_records(&split.runs[0]), vec![3, 4]);
        assert_eq!(read_records(&split.runs[1]), vec![1, 2]);
    }

    #[rstest]
    fn test_missing_input_is_skipped(scratch: ScratchDir) {
        let split = split_file(Path::new("no/such/file.bin"), &scratch, 4, 64).unwrap();

        assert!(split.skipped);
        assert!(split.runs.is_empty());
        assert_eq!(split.records, 0);
    }
}
