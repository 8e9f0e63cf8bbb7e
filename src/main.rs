//! gfstream: genomic feature stream operations
//!
//! Usage: gfstream <COMMAND> [OPTIONS]

use clap::{Parser, Subcommand};
use log::debug;
use std::io;
use std::path::PathBuf;
use std::process;

use gfstream::bed::{read_stream, reader_stream, BedWriter};
use gfstream::commands::{
    AggregateRegistry, Aggregation, CobbleCommand, FusionCommand, Region, Regions,
    ShuffleCommand, SortCommand, UnrollCommand,
};
use gfstream::genome::Genome;
use gfstream::{FeatureError, FeatureStream, Result};

#[derive(Parser)]
#[command(name = "gfstream")]
#[command(version)]
#[command(about = "gfstream: lazy genomic feature stream operations on BED files", long_about = None)]
struct Cli {
    /// Fail at the first record out of (chr, start) order in fusion, cobble
    /// and unroll input.
    #[arg(long, global = true)]
    validate_order: bool,

    /// Read zero-length intervals (start == end) as 1bp intervals.
    #[arg(long, global = true)]
    extend_zero_length: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sort a BED file
    Sort {
        /// Input BED file (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Genome file for chromosome ordering
        #[arg(short = 'g', long)]
        genome: Option<PathBuf>,

        /// Comma-separated chromosome order (overrides --genome)
        #[arg(long, value_delimiter = ',')]
        chroms: Vec<String>,

        /// Comma-separated sort keys
        #[arg(short, long, value_delimiter = ',', default_value = "chr,start,end")]
        fields: Vec<String>,

        /// Reverse the sort order
        #[arg(short, long)]
        reverse: bool,
    },

    /// Fuse overlapping features into one
    Fusion {
        /// Input BED file, sorted (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Require strand to match for fusion
        #[arg(short, long)]
        strand: bool,

        /// Aggregation override, e.g. name=collapse or score=max (repeatable)
        #[arg(short, long = "aggregate", value_parser = parse_aggregate)]
        aggregate: Vec<(String, String)>,
    },

    /// Cut overlapping features into disjoint fragments
    Cobble {
        /// Input BED file, sorted (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Only cut features of the same strand against each other
        #[arg(short, long)]
        strand: bool,

        /// Share each score among fragments in proportion to their length
        #[arg(long)]
        scored: bool,

        /// Aggregation override, e.g. name=collapse or score=max (repeatable)
        #[arg(short, long = "aggregate", value_parser = parse_aggregate)]
        aggregate: Vec<(String, String)>,
    },

    /// Report one record per base over regions
    Unroll {
        /// Input BED file, sorted (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Region as start-end or chr:start-end (repeatable)
        #[arg(long = "region", value_parser = parse_region)]
        regions: Vec<Region>,

        /// BED file of regions (used when no --region is given)
        #[arg(long = "regions-file")]
        regions_file: Option<PathBuf>,

        /// Comma-separated fields reported first
        #[arg(short, long, value_delimiter = ',', default_value = "score")]
        fields: Vec<String>,
    },

    /// Move features to random positions
    Shuffle {
        /// Input BED file (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Chromosome length
        #[arg(short = 'l', long, default_value_t = i64::MAX)]
        chrom_len: i64,

        /// Random copies per feature
        #[arg(short = 'n', long, default_value_t = 1)]
        repeat: usize,

        /// Keep generation order instead of sorting by position
        #[arg(long)]
        unsorted: bool,

        /// Random seed
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn parse_aggregate(s: &str) -> std::result::Result<(String, String), String> {
    let (field, name) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=AGGREGATION, got '{}'", s))?;
    if Aggregation::parse(name).is_none() {
        return Err(format!(
            "unknown aggregation '{}' (expected generic, sum, min, max, collapse, concat, consensus, first or last)",
            name
        ));
    }
    Ok((field.to_string(), name.to_string()))
}

fn parse_region(s: &str) -> std::result::Result<Region, String> {
    let (chrom, span) = match s.rsplit_once(':') {
        Some((chrom, span)) => (Some(chrom), span),
        None => (None, s),
    };
    let (start, end) = span
        .split_once('-')
        .ok_or_else(|| format!("expected start-end, got '{}'", span))?;
    let start: i64 = start.trim().parse().map_err(|_| format!("invalid start '{}'", start))?;
    let end: i64 = end.trim().parse().map_err(|_| format!("invalid end '{}'", end))?;
    Ok(match chrom {
        Some(c) => Region::on(c, start, end),
        None => Region::new(start, end),
    })
}

fn main() {
    pretty_env_logger::init();
    let cli = Cli::parse();

    // Switches must be set before any input is read
    gfstream::config::set_validate_order(cli.validate_order);
    gfstream::config::set_extend_zero_length(cli.extend_zero_length);

    let result = match cli.command {
        Commands::Sort {
            input,
            genome,
            chroms,
            fields,
            reverse,
        } => run_sort(input, genome, chroms, fields, reverse),

        Commands::Fusion {
            input,
            strand,
            aggregate,
        } => open_input(input).and_then(|stream| {
            let cmd = FusionCommand::new()
                .with_strand(strand)
                .with_registry(registry(aggregate));
            write_output(cmd.run(stream)?)
        }),

        Commands::Cobble {
            input,
            strand,
            scored,
            aggregate,
        } => open_input(input).and_then(|stream| {
            let cmd = CobbleCommand::new()
                .with_strand(strand)
                .with_scored(scored)
                .with_registry(registry(aggregate));
            write_output(cmd.run(stream)?)
        }),

        Commands::Unroll {
            input,
            regions,
            regions_file,
            fields,
        } => run_unroll(input, regions, regions_file, fields),

        Commands::Shuffle {
            input,
            chrom_len,
            repeat,
            unsorted,
            seed,
        } => open_input(input).and_then(|stream| {
            let cmd = ShuffleCommand::new()
                .with_chrom_len(chrom_len)
                .with_repeat(repeat)
                .with_sorted(!unsorted)
                .with_seed(seed);
            write_output(cmd.run(stream)?)
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Registry from `FIELD=AGGREGATION` pairs already checked by the parser.
fn registry(overrides: Vec<(String, String)>) -> AggregateRegistry {
    let mut reg = AggregateRegistry::new();
    for (field, name) in overrides {
        if let Some(agg) = Aggregation::parse(&name) {
            reg.set(field, agg);
        }
    }
    reg
}

/// BED stream from a file, or from stdin for `-` or no path.
fn open_input(input: Option<PathBuf>) -> Result<FeatureStream> {
    match input {
        Some(path) if path.to_string_lossy() != "-" => read_stream(path),
        _ => reader_stream(io::stdin()),
    }
}

fn write_output(stream: FeatureStream) -> Result<()> {
    let stdout = io::stdout();
    let mut writer = BedWriter::new(stdout.lock());
    let written = writer.write_stream(stream)?;
    writer.flush()?;
    debug!("wrote {} records", written);
    Ok(())
}

fn run_sort(
    input: Option<PathBuf>,
    genome_path: Option<PathBuf>,
    chroms: Vec<String>,
    fields: Vec<String>,
    reverse: bool,
) -> Result<()> {
    let mut cmd = SortCommand::new().with_fields(&fields).with_reverse(reverse);
    if !chroms.is_empty() {
        cmd = cmd.with_chrom_order(&chroms);
    } else if let Some(ref gp) = genome_path {
        cmd = cmd.with_genome(&Genome::from_file(gp)?);
    }
    write_output(cmd.run(open_input(input)?)?)
}

fn run_unroll(
    input: Option<PathBuf>,
    regions: Vec<Region>,
    regions_file: Option<PathBuf>,
    fields: Vec<String>,
) -> Result<()> {
    let regions = match (regions.is_empty(), regions_file) {
        (false, _) => Regions::List(regions),
        (true, Some(path)) => Regions::Stream(read_stream(path)?),
        (true, None) => {
            return Err(FeatureError::Schema(
                "unroll needs --region or --regions-file".to_string(),
            ))
        }
    };
    let cmd = UnrollCommand::new().with_fields(&fields);
    write_output(cmd.run(open_input(input)?, regions)?)
}
