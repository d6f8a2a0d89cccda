//! Run file I/O.
//!
//! A run is a temporary file holding an ascending sequence of records.
//! [`RunWriter`] materializes an in-memory sorted block as a run on disk,
//! [`RunReader`] streams a record file back in file order. Both apply to
//! input files as well, since inputs and runs share the same wire format.

use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};

use crate::buffer::BlockBuffer;

/// Fixed record width in bytes. Every file in the pipeline is a raw
/// sequence of little-endian signed 64-bit integers with no header and no
/// delimiters.
pub const RECORD_SIZE: usize = 8;

/// Sequential cursor over a record file.
///
/// The readable region is bounded at the last whole record; a trailing
/// fragment shorter than [`RECORD_SIZE`] is excluded from iteration and
/// reported through [`RunReader::trailing_bytes`].
pub struct RunReader {
    reader: io::Take<io::BufReader<fs::File>>,
    trailing: u64,
}

impl RunReader {
    /// Opens `path` for sequential record reading.
    pub fn open(path: &Path, buf_size: usize) -> io::Result<Self> {
        let file = fs::File::open(path)?;
        let file_len = file.metadata()?.len();
        let trailing = file_len % RECORD_SIZE as u64;

        let reader = io::BufReader::with_capacity(buf_size, file).take(file_len - trailing);

        return Ok(RunReader { reader, trailing });
    }

    /// Checks whether any whole records are left to read.
    pub fn is_empty(&self) -> bool {
        self.reader.limit() == 0
    }

    /// Returns the number of bytes at the end of the file that do not form
    /// a whole record and are excluded from iteration.
    pub fn trailing_bytes(&self) -> u64 {
        self.trailing
    }
}

impl Iterator for RunReader {
    type Item = io::Result<i64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.reader.limit() == 0 {
            None
        } else {
            Some(self.reader.read_i64::<LittleEndian>())
        }
    }
}

/// Writes records to a freshly created run file, coalescing them through a
/// [`BlockBuffer`] so the file is produced in few large writes.
pub struct RunWriter {
    path: PathBuf,
    out: fs::File,
    buffer: BlockBuffer,
    flush_at: usize,
}

impl RunWriter {
    /// Creates the run file at `path`. `buf_size` bounds how many pending
    /// bytes accumulate before they are written out.
    pub fn create(path: PathBuf, buf_size: usize) -> io::Result<Self> {
        let out = fs::File::create(&path)?;

        return Ok(RunWriter {
            path,
            out,
            buffer: BlockBuffer::with_capacity(buf_size),
            flush_at: buf_size.max(RECORD_SIZE),
        });
    }

    /// Appends one record.
    pub fn push(&mut self, record: i64) -> io::Result<()> {
        let mut encoded = [0u8; RECORD_SIZE];
        LittleEndian::write_i64(&mut encoded, record);
        self.buffer.write(&encoded);

        if self.buffer.len() >= self.flush_at {
            self.buffer.flush(&mut self.out)?;
        }

        return Ok(());
    }

    /// Flushes the remaining pending bytes and returns the finished run
    /// path.
    pub fn finish(mut self) -> io::Result<PathBuf> {
        self.buffer.flush(&mut self.out)?;

        return Ok(self.path);
    }
}

/// Writes an entire sorted block as one run file and returns its path.
pub fn write_run(path: PathBuf, records: &[i64], buf_size: usize) -> io::Result<PathBuf> {
    let mut writer = RunWriter::create(path, buf_size)?;
    for &record in records {
        writer.push(record)?;
    }

    return writer.finish();
}
