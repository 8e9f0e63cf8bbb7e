//! End-to-end tests: BED text in, operators, BED text out.
//!
//! Tests touching the global switches run serially.

use gfstream::bed::{parse_stream, read_stream, reader_stream, BedWriter};
use gfstream::commands::{
    map_chromosomes, AggregateRegistry, Aggregation, CobbleCommand, FusionCommand, SortCommand,
    UnrollCommand,
};
use gfstream::config;
use gfstream::genome::{ChromTable, Genome};
use gfstream::{FeatureError, FeatureStream};
use serial_test::serial;
use std::io::Write;
use tempfile::NamedTempFile;

fn reset_config() {
    config::set_validate_order(false);
    config::set_extend_zero_length(false);
}

fn to_bed(stream: FeatureStream) -> String {
    let mut out = Vec::new();
    {
        let mut writer = BedWriter::new(&mut out);
        writer.write_stream(stream).unwrap();
        writer.flush().unwrap();
    }
    String::from_utf8(out).unwrap()
}

fn bed_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

// =============================================================================
// Fusion and cobble on BED6 input
// =============================================================================

#[test]
#[serial]
fn test_fusion_bed6() {
    reset_config();
    let input = "chr1\t10\t15\tA\t1\t+\nchr1\t13\t18\tB\t2\t-\nchr1\t18\t25\tC\t3\t-\n";
    let fused = FusionCommand::new().run(parse_stream(input).unwrap()).unwrap();
    assert_eq!(
        to_bed(fused),
        "chr1\t10\t18\tA|B\t3.0\t.\nchr1\t18\t25\tC\t3.0\t-\n"
    );
}

#[test]
#[serial]
fn test_cobble_bed6() {
    reset_config();
    let input = "chr1\t10\t20\tA\t1\t+\nchr1\t12\t22\tB\t1\t-\nchr1\t15\t25\tC\t1\t-\n";
    let cobbled = CobbleCommand::new()
        .with_aggregate("name", Aggregation::Join(",".into()))
        .run(parse_stream(input).unwrap())
        .unwrap();
    let expected = "\
chr1\t10\t12\tA\t1.0\t+
chr1\t12\t15\tA,B\t2.0\t.
chr1\t15\t20\tA,B,C\t3.0\t.
chr1\t20\t22\tB,C\t2.0\t-
chr1\t22\t25\tC\t1.0\t-
";
    assert_eq!(to_bed(cobbled), expected);
}

#[test]
#[serial]
fn test_sort_then_fusion_from_file() {
    reset_config();
    let file = bed_file("chr2\t5\t9\nchr1\t30\t40\nchr1\t1\t10\nchr2\t1\t6\nchr1\t5\t12\n");
    let sorted = SortCommand::new().run(read_stream(file.path()).unwrap()).unwrap();
    let fused = FusionCommand::new().run(sorted).unwrap();
    assert_eq!(to_bed(fused), "chr1\t1\t12\nchr1\t30\t40\nchr2\t1\t9\n");
}

#[test]
#[serial]
fn test_sort_with_genome_file() {
    reset_config();
    let genome = Genome::from_reader("chrM\t16000\nchr2\t100\nchr1\t100\n".as_bytes()).unwrap();
    let stream = parse_stream("chr1\t1\t2\nchrX\t1\t2\nchr2\t1\t2\nchrM\t1\t2\n").unwrap();
    let sorted = SortCommand::new().with_genome(&genome).run(stream).unwrap();
    assert_eq!(
        to_bed(sorted),
        "chrM\t1\t2\nchr2\t1\t2\nchr1\t1\t2\nchrX\t1\t2\n"
    );
}

#[test]
#[serial]
fn test_file_stream_resets() {
    reset_config();
    let file = bed_file("chr1\t1\t5\ta\nchr1\t6\t9\tb\n");
    let mut stream = read_stream(file.path()).unwrap();
    assert!(stream.is_resettable());
    assert_eq!(stream.next().unwrap().unwrap().values()[3].as_str(), Some("a"));
    stream.reset().unwrap();
    assert_eq!(stream.collect_records().unwrap().len(), 2);
}

#[test]
#[serial]
fn test_reader_stream_is_single_pass() {
    reset_config();
    let mut stream = reader_stream("chr1\t1\t5\n".as_bytes()).unwrap();
    assert_eq!(stream.by_ref().count(), 1);
    assert!(matches!(stream.reset(), Err(FeatureError::NotResettable)));
}

// =============================================================================
// Unroll over a region file
// =============================================================================

#[test]
#[serial]
fn test_unroll_with_region_file() {
    reset_config();
    let regions = bed_file("chr1\t0\t4\nchr2\t2\t4\n");
    let input = "chr1\t1\t3\tx\t5\t+\nchr2\t1\t3\ty\t7\t-\n";
    let unrolled = UnrollCommand::new()
        .run(parse_stream(input).unwrap(), read_stream(regions.path()).unwrap())
        .unwrap();
    assert_eq!(unrolled.fields(), &["score", "name", "strand"]);
    assert_eq!(
        to_bed(unrolled),
        "0.0\t.\t.\n5.0\tx\t+\n5.0\tx\t+\n0.0\t.\t.\n7.0\ty\t-\n0.0\t.\t.\n"
    );
}

// =============================================================================
// Chromosome aliases
// =============================================================================

#[test]
#[serial]
fn test_map_chromosomes_from_alias_file() {
    reset_config();
    let table = ChromTable::from_reader("chrI\t2779\tNC_001133.8\tI\n".as_bytes()).unwrap();
    let stream = parse_stream("NC_001133.8\t1\t5\nI\t6\t9\nchrV\t1\t2\n").unwrap();
    let mapped = map_chromosomes(stream, &table, false).unwrap();
    assert_eq!(to_bed(mapped), "chrI\t1\t5\nchrI\t6\t9\n");
}

// =============================================================================
// Global switches
// =============================================================================

#[test]
#[serial]
fn test_validate_order_reports_unsorted_input() {
    reset_config();
    config::set_validate_order(true);
    let stream = parse_stream("chr1\t1\t5\nchr2\t1\t5\nchr1\t8\t9\n").unwrap();
    let result = FusionCommand::new().run(stream).unwrap().collect_records();
    reset_config();
    match result {
        Err(FeatureError::OrderViolation { record, .. }) => assert_eq!(record, 3),
        other => panic!("expected an order violation, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_unsorted_input_passes_without_validation() {
    reset_config();
    let stream = parse_stream("chr1\t1\t5\nchr2\t1\t5\nchr1\t8\t9\n").unwrap();
    let result = FusionCommand::new().run(stream).unwrap().collect_records();
    assert_eq!(result.unwrap().len(), 3);
}

#[test]
#[serial]
fn test_extend_zero_length() {
    reset_config();
    config::set_extend_zero_length(true);
    let stream = parse_stream("chr1\t10\t10\n").unwrap();
    reset_config();
    assert_eq!(to_bed(stream), "chr1\t10\t11\n");

    let stream = parse_stream("chr1\t10\t10\n").unwrap();
    assert_eq!(to_bed(stream), "chr1\t10\t10\n");
}

#[test]
#[serial]
fn test_custom_aggregation_through_registry() {
    reset_config();
    let registry = AggregateRegistry::new()
        .with("score", Aggregation::Max)
        .with("name", Aggregation::custom(|values| {
            Ok(values.iter().map(|v| v.render()).max().unwrap_or_default().into())
        }));
    let input = "chr1\t0\t10\tb\t4\t+\nchr1\t5\t15\ta\t9\t+\n";
    let fused = gfstream::commands::fusion(parse_stream(input).unwrap(), registry, true).unwrap();
    assert_eq!(to_bed(fused), "chr1\t0\t15\tb\t9.0\t+\n");
}
