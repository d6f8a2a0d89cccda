//! Binary heap merger.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs;
use std::io;
use std::path::PathBuf;

use log;

use crate::run::{RunReader, RunWriter};
use crate::scratch::ScratchDir;

/// Binary heap merger implementation.
/// Merges multiple sorted inputs into a single sorted output.
/// Time complexity is *m* \* log(*n*) in worst case where *m* is the number of records,
/// *n* is the number of cursors (inputs).
pub struct BinaryHeapMerger<C>
where
    C: IntoIterator<Item = io::Result<i64>>,
{
    // binary heap is max-heap by default so the key is reversed to convert it to min-heap;
    // the cursor index rides along as the tie payload
    items: BinaryHeap<(Reverse<i64>, usize)>,
    cursors: Vec<C::IntoIter>,
    initiated: bool,
}

impl<C> BinaryHeapMerger<C>
where
    C: IntoIterator<Item = io::Result<i64>>,
{
    /// Creates an instance of a binary heap merger using record cursors as inputs.
    /// Cursor records should be sorted in ascending order otherwise the result is undefined.
    ///
    /// # Arguments
    /// * `cursors` - Cursors to be merged into a single sorted stream
    pub fn new<I>(cursors: I) -> Self
    where
        I: IntoIterator<Item = C>,
    {
        let cursors = Vec::from_iter(cursors.into_iter().map(|c| c.into_iter()));
        let items = BinaryHeap::with_capacity(cursors.len());

        return BinaryHeapMerger {
            cursors,
            items,
            initiated: false,
        };
    }
}

impl<C> Iterator for BinaryHeapMerger<C>
where
    C: IntoIterator<Item = io::Result<i64>>,
{
    type Item = io::Result<i64>;

    /// Returns the next record from the inputs in ascending order.
    fn next(&mut self) -> Option<Self::Item> {
        if !self.initiated {
            for (idx, cursor) in self.cursors.iter_mut().enumerate() {
                if let Some(record) = cursor.next() {
                    match record {
                        Ok(record) => self.items.push((Reverse(record), idx)),
                        Err(err) => return Some(Err(err)),
                    }
                }
            }
            self.initiated = true;
        }

        let (result, idx) = self.items.pop()?;
        if let Some(record) = self.cursors[idx].next() {
            match record {
                Ok(record) => self.items.push((Reverse(record), idx)),
                Err(err) => return Some(Err(err)),
            }
        }

        return Some(Ok(result.0));
    }
}

/// Merges one group of runs into a single new run and deletes the consumed
/// inputs.
///
/// A run that cannot be opened or holds no readable records contributes
/// nothing and is logged rather than failing the merge. A consumed run that
/// cannot be removed fails the operation.
pub fn merge_group(
    group: &[PathBuf],
    scratch: &ScratchDir,
    rw_buf_size: usize,
) -> io::Result<PathBuf> {
    let mut cursors = Vec::with_capacity(group.len());
    for path in group {
        match RunReader::open(path, rw_buf_size) {
            Ok(cursor) if !cursor.is_empty() => cursors.push(cursor),
            Ok(_) => log::warn!("skipping empty run {}", path.display()),
            Err(err) => log::warn!("skipping unreadable run {}: {}", path.display(), err),
        }
    }

    let mut writer = RunWriter::create(scratch.next_run_path(), rw_buf_size)?;
    for record in BinaryHeapMerger::new(cursors) {
        writer.push(record?)?;
    }
    let merged = writer.finish()?;

    for path in group {
        match fs::remove_file(path) {
            Ok(()) => {}
            // a run skipped above because it was gone has nothing to delete
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
    }

    log::debug!("merged {} runs into {}", group.len(), merged.display());

    return Ok(merged);
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::io::{self, ErrorKind};

    use rstest::*;

    use super::{merge_group, BinaryHeapMerger};
    use crate::run::{write_run, RunReader};
    use crate::scratch::ScratchDir;

    #[rstest]
    #[case(
        vec![],
        vec![],
    )]
    #[case(
        vec![
            vec![],
            vec![]
        ],
        vec![],
    )]
    #[case(
        vec![
            vec![Ok(4), Ok(5), Ok(7)],
            vec![Ok(1), Ok(6)],
            vec![Ok(3)],
            vec![],
        ],
        vec![Ok(1), Ok(3), Ok(4), Ok(5), Ok(6), Ok(7)],
    )]
    #[case(
        vec![
            vec![Result::Err(io::Error::new(ErrorKind::Other, "test error"))]
        ],
        vec![
            Result::Err(io::Error::new(ErrorKind::Other, "test error"))
        ],
    )]
    #[case(
        vec![
            vec![Ok(3), Result::Err(io::Error::new(ErrorKind::Other, "test error"))],
            vec![Ok(1), Ok(2)],
        ],
        vec![
            Ok(1),
            Ok(2),
            Result::Err(io::Error::new(ErrorKind::Other, "test error")),
        ],
    )]
    fn test_merger(
        #[case] cursors: Vec<Vec<io::Result<i64>>>,
        #[case] expected_result: Vec<io::Result<i64>>,
    ) {
        let merger = BinaryHeapMerger::new(cursors);
        let actual_result: Vec<io::Result<i64>> = merger.collect();
        assert!(
            compare_results(&actual_result, &expected_result),
            "actual={:?}, expected={:?}",
            actual_result,
            expected_result
        );
    }

    fn compare_results(actual: &[io::Result<i64>], expected: &[io::Result<i64>]) -> bool {
        actual.len() == expected.len()
            && actual
                .iter()
                .zip(expected)
                .all(|pair| match pair {
                    (Ok(actual_record), Ok(expected_record)) => actual_record == expected_record,
                    (Err(actual_err), Err(expected_err)) => {
                        actual_err.to_string() == expected_err.to_string()
                    }
                    _ => false,
                })
    }

    #[rstest]
    fn test_merge_group_writes_sorted_run_and_deletes_inputs() {
        let scratch = ScratchDir::new(None).unwrap();

        let first = write_run(scratch.next_run_path(), &[1, 4, 6], 64).unwrap();
        let second = write_run(scratch.next_run_path(), &[2, 3, 5], 64).unwrap();
        let group = vec![first.clone(), second.clone()];

        let merged = merge_group(&group, &scratch, 64).unwrap();

        let records: Vec<i64> = RunReader::open(&merged, 64)
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(records, vec![1, 2, 3, 4, 5, 6]);

        assert!(!first.exists());
        assert!(!second.exists());
    }

    #[rstest]
    fn test_merge_group_skips_empty_run() {
        let scratch = ScratchDir::new(None).unwrap();

        let run = write_run(scratch.next_run_path(), &[-2, 8], 64).unwrap();
        let empty = scratch.next_run_path();
        fs::File::create(&empty).unwrap();
        let group = vec![run, empty];

        let merged = merge_group(&group, &scratch, 64).unwrap();

        let records: Vec<i64> = RunReader::open(&merged, 64)
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(records, vec![-2, 8]);
    }
}
