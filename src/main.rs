use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;

use binsort::{ExternalSorterBuilder, RECORD_SIZE};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let manifest = arg_parser.value_of("manifest").expect("value is required");
    let inputs = match read_manifest(Path::new(manifest)) {
        Ok(inputs) => inputs,
        Err(err) => {
            log::error!("manifest reading error: {}", err);
            process::exit(1);
        }
    };

    let output = arg_parser.value_of("output").expect("value is required");

    let block_size = arg_parser.value_of("block_size").expect("value is required");
    let block_bytes = block_size.parse::<ByteSize>().expect("value is pre-validated").as_u64();
    let block_records = (block_bytes as usize / RECORD_SIZE).max(1);

    let fan_in: usize = arg_parser.value_of_t_or_exit("fan_in");
    let threads: Option<usize> = arg_parser
        .is_present("threads")
        .then(|| arg_parser.value_of_t_or_exit("threads"));
    let tmp_dir: Option<&str> = arg_parser.value_of("tmp_dir");

    let mut sorter_builder = ExternalSorterBuilder::new()
        .with_block_size(block_records)
        .with_fan_in(fan_in);

    if let Some(threads) = threads {
        sorter_builder = sorter_builder.with_threads_number(threads);
    }

    if let Some(tmp_dir) = tmp_dir {
        sorter_builder = sorter_builder.with_tmp_dir(Path::new(tmp_dir));
    }

    let sorter = match sorter_builder.build() {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(1);
        }
    };

    let report = match sorter.sort_files(&inputs, Path::new(output)) {
        Ok(report) => report,
        Err(err) => {
            log::error!("sorting error: {}", err);
            process::exit(1);
        }
    };

    log::info!("{} records written to {}", report.records, report.output.display());
    if report.skipped_inputs > 0 {
        log::warn!("{} input files could not be read and were skipped", report.skipped_inputs);
    }
    if report.trailing_bytes > 0 {
        log::warn!(
            "{} trailing bytes did not form whole records and were dropped",
            report.trailing_bytes
        );
    }
}

/// Reads the input file list, one name per line, resolved relative to the
/// manifest's directory.
fn read_manifest(path: &Path) -> io::Result<Vec<PathBuf>> {
    let manifest = fs::read_to_string(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));

    let inputs = manifest
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| base.join(line))
        .collect();

    return Ok(inputs);
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("binsort")
        .about("external merge sort for binary files of 64-bit integers")
        .arg(
            clap::Arg::new("manifest")
                .short('m')
                .long("manifest")
                .help("file listing the input files to sort, one per line")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("output")
                .short('o')
                .long("output")
                .help("result file")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .arg(
            clap::Arg::new("threads")
                .short('t')
                .long("threads")
                .help("number of threads to use for parallel splitting and merging")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("tmp_dir")
                .short('d')
                .long("tmp-dir")
                .help("directory to be used to store temporary data")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("block_size")
                .short('c')
                .long("block-size")
                .help("amount of record data sorted in memory at once")
                .takes_value(true)
                .default_value("64MB")
                .validator(|v| match v.parse::<ByteSize>() {
                    Ok(_) => Ok(()),
                    Err(err) => Err(format!("Block size format incorrect: {}", err)),
                }),
        )
        .arg(
            clap::Arg::new("fan_in")
                .short('f')
                .long("fan-in")
                .help("maximum number of runs merged together at once")
                .takes_value(true)
                .default_value("16")
                .validator(|v| match v.parse::<usize>() {
                    Ok(fan_in) if fan_in >= 2 => Ok(()),
                    Ok(_) => Err("Fan-in must be at least 2".to_string()),
                    Err(err) => Err(format!("Fan-in format incorrect: {}", err)),
                }),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
