//! Property tests for the interval operators.

use gfstream::commands::{
    concat_fields, split_field, CobbleCommand, FusionCommand, Region, SortCommand, SplitMode,
    UnrollCommand,
};
use gfstream::{rec, FeatureStream, Record};
use proptest::prelude::*;

/// Intervals on one chromosome, sorted by (start, end), all non-empty.
fn sorted_intervals() -> impl Strategy<Value = Vec<(i64, i64)>> {
    prop::collection::vec((0i64..60, 1i64..15), 0..25).prop_map(|mut v| {
        let mut intervals: Vec<(i64, i64)> = v.drain(..).map(|(s, len)| (s, s + len)).collect();
        intervals.sort();
        intervals
    })
}

fn scored_stream(intervals: &[(i64, i64)]) -> FeatureStream {
    let rows = intervals.iter().map(|&(s, e)| rec!["chr1", s, e, 1]).collect();
    FeatureStream::from_rows(&["chr", "start", "end", "score"], rows).unwrap()
}

/// Sorted intervals, each with a strand (`1` or `-1`) and a positive score.
fn stranded_intervals() -> impl Strategy<Value = Vec<(i64, i64, i64, f64)>> {
    prop::collection::vec((0i64..60, 1i64..15, any::<bool>(), 0.5f64..100.0), 0..25).prop_map(|v| {
        let mut intervals: Vec<(i64, i64, i64, f64)> = v
            .into_iter()
            .map(|(s, len, plus, score)| (s, s + len, if plus { 1 } else { -1 }, score))
            .collect();
        intervals.sort_by_key(|&(s, e, _, _)| (s, e));
        intervals
    })
}

fn depth(intervals: &[(i64, i64)], pos: i64) -> i64 {
    intervals.iter().filter(|&&(s, e)| s <= pos && pos < e).count() as i64
}

fn spans(records: &[Record]) -> Vec<(i64, i64)> {
    records
        .iter()
        .map(|r| (r.values()[1].as_int().unwrap(), r.values()[2].as_int().unwrap()))
        .collect()
}

proptest! {
    #[test]
    fn cobble_fragments_tile_the_input(intervals in sorted_intervals()) {
        let records = CobbleCommand::new()
            .run(scored_stream(&intervals))
            .unwrap()
            .collect_records()
            .unwrap();
        let frags = spans(&records);

        for w in frags.windows(2) {
            prop_assert!(w[0].1 <= w[1].0, "fragments overlap: {:?}", frags);
        }
        for (r, &(s, e)) in records.iter().zip(frags.iter()) {
            prop_assert!(s < e);
            let d = depth(&intervals, s);
            prop_assert_eq!(r.values()[3].as_int(), Some(d));
            // Depth is constant over a fragment.
            for pos in s..e {
                prop_assert_eq!(depth(&intervals, pos), d);
            }
        }
        for pos in 0..80 {
            let in_input = depth(&intervals, pos) > 0;
            let in_output = frags.iter().any(|&(s, e)| s <= pos && pos < e);
            prop_assert_eq!(in_input, in_output, "position {}", pos);
        }
    }

    #[test]
    fn stranded_cobble_tiles_each_strand(intervals in stranded_intervals()) {
        let rows = intervals
            .iter()
            .map(|&(s, e, strand, _)| rec!["chr1", s, e, 1, strand])
            .collect();
        let stream = FeatureStream::from_rows(&["chr", "start", "end", "score", "strand"], rows).unwrap();
        let records = CobbleCommand::new()
            .with_strand(true)
            .run(stream)
            .unwrap()
            .collect_records()
            .unwrap();

        let frags = spans(&records);
        for w in frags.windows(2) {
            prop_assert!(w[0].0 <= w[1].0, "fragments out of order: {:?}", frags);
        }
        for strand in [1i64, -1] {
            let inputs: Vec<(i64, i64)> = intervals
                .iter()
                .filter(|i| i.2 == strand)
                .map(|i| (i.0, i.1))
                .collect();
            let own: Vec<(&Record, (i64, i64))> = records
                .iter()
                .zip(frags.iter().copied())
                .filter(|(r, _)| r.values()[4].as_int() == Some(strand))
                .collect();
            for w in own.windows(2) {
                let ((_, (_, prev_end)), (_, (next_start, _))) = (w[0], w[1]);
                prop_assert!(prev_end <= next_start, "strand {} fragments overlap: {:?}", strand, frags);
            }
            for (r, (s, _)) in &own {
                prop_assert_eq!(r.values()[3].as_int(), Some(depth(&inputs, *s)));
            }
            for pos in 0..80 {
                let in_input = depth(&inputs, pos) > 0;
                let in_output = own.iter().any(|(_, (s, e))| *s <= pos && pos < *e);
                prop_assert_eq!(in_input, in_output, "strand {} position {}", strand, pos);
            }
        }
    }

    #[test]
    fn scored_cobble_conserves_score(intervals in stranded_intervals()) {
        let rows = intervals
            .iter()
            .map(|&(s, e, _, score)| rec!["chr1", s, e, score])
            .collect();
        let stream = FeatureStream::from_rows(&["chr", "start", "end", "score"], rows).unwrap();
        let records = CobbleCommand::new()
            .with_scored(true)
            .run(stream)
            .unwrap()
            .collect_records()
            .unwrap();

        let input_total: f64 = intervals.iter().map(|i| i.3).sum();
        let output_total: f64 = records.iter().map(|r| r.values()[3].as_f64().unwrap()).sum();
        prop_assert!(
            (input_total - output_total).abs() <= 1e-6 * input_total.max(1.0),
            "{} vs {}",
            input_total,
            output_total
        );
    }

    #[test]
    fn fusion_covers_each_input_once(intervals in sorted_intervals()) {
        let records = FusionCommand::new()
            .run(scored_stream(&intervals))
            .unwrap()
            .collect_records()
            .unwrap();
        let fused = spans(&records);

        prop_assert!(fused.len() <= intervals.len());
        for w in fused.windows(2) {
            prop_assert!(w[0].1 <= w[1].0, "fused features overlap: {:?}", fused);
        }
        for &(s, e) in &intervals {
            let holders = fused.iter().filter(|&&(fs, fe)| fs <= s && e <= fe).count();
            prop_assert_eq!(holders, 1, "{:?} in {:?}", (s, e), fused);
        }
        let total: i64 = records.iter().map(|r| r.values()[3].as_int().unwrap()).sum();
        prop_assert_eq!(total, intervals.len() as i64);
    }

    #[test]
    fn unroll_reports_one_record_per_base(
        intervals in sorted_intervals(),
        gaps in prop::collection::vec((0i64..10, 0i64..10), 1..6),
    ) {
        let mut regions = Vec::new();
        let mut pos = 0;
        for (gap, len) in gaps {
            regions.push(Region::new(pos + gap, pos + gap + len));
            pos += gap + len;
        }
        let expected: i64 = regions.iter().map(|r| r.len() as i64).sum();

        let cobbled = CobbleCommand::new().run(scored_stream(&intervals)).unwrap();
        let unrolled = UnrollCommand::new().run(cobbled, regions.clone()).unwrap();
        let depths: Vec<i64> = unrolled
            .map(|r| r.unwrap().values()[0].as_int().unwrap())
            .collect();
        prop_assert_eq!(depths.len() as i64, expected);

        let positions: Vec<i64> = regions.iter().flat_map(|r| r.start..r.end).collect();
        for (p, d) in positions.iter().zip(depths.iter()) {
            prop_assert_eq!(*d, depth(&intervals, *p), "position {}", p);
        }
    }

    #[test]
    fn sort_is_idempotent(
        rows in prop::collection::vec((0usize..3, 0i64..100, 1i64..20), 0..30),
    ) {
        let chroms = ["chr1", "chr2", "chrX"];
        let records: Vec<Record> = rows
            .iter()
            .map(|&(c, s, len)| rec![chroms[c], s, s + len])
            .collect();
        let stream = FeatureStream::from_rows(&["chr", "start", "end"], records).unwrap();

        let once = SortCommand::new().run(stream).unwrap().collect_records().unwrap();
        let again_stream = FeatureStream::from_rows(&["chr", "start", "end"], once.clone()).unwrap();
        let twice = SortCommand::new().run(again_stream).unwrap().collect_records().unwrap();
        prop_assert_eq!(&once, &twice);

        for w in once.windows(2) {
            let key = |r: &Record| {
                (
                    r.values()[0].as_str().unwrap().to_string(),
                    r.values()[1].as_int().unwrap(),
                    r.values()[2].as_int().unwrap(),
                )
            };
            prop_assert!(key(&w[0]) <= key(&w[1]));
        }
    }

    #[test]
    fn split_undoes_concat(
        pairs in prop::collection::vec(("[a-z]{0,5}", "[a-z0-9]{0,5}"), 0..10),
    ) {
        let records: Vec<Record> = pairs
            .iter()
            .enumerate()
            .map(|(i, (a, b))| rec![i as i64, a.as_str(), b.as_str()])
            .collect();
        let stream = FeatureStream::from_rows(&["id", "a", "b"], records.clone()).unwrap();

        let joined = concat_fields(stream, &["a", "b"], "ab", "|", false).unwrap();
        prop_assert_eq!(joined.fields(), &["id", "ab"]);
        let split = split_field(joined, "ab", &["a", "b"], "|", SplitMode::Positional, false).unwrap();
        prop_assert_eq!(split.fields(), &["id", "a", "b"]);
        prop_assert_eq!(split.collect_records().unwrap(), records);
    }
}
