use bms_timeline::{
    decode::{DecodeConfig, DecodeOutput, decode_bytes},
    model::Chart,
};

const MESSY: &str = r"
#BPM 180
#WAV01 a.wav
#WAV02 b.wav
#BPM01 90
#STOP01 48
#SCROLL01 0.5
#00102:0.5
#00103:78
#00108:0100
#00109:0001
#001SC:01
#00111:0101010101010101
#00151:0200000002000000
#00151:00020000
#00216:01
#00256:02
#002D3:05
#00311:01
#00356:02
#00411:0202
";

fn charts() -> Vec<DecodeOutput> {
    let config = DecodeConfig::default();
    let mut outputs = vec![
        decode_bytes("messy.bms", MESSY.as_bytes(), &config).unwrap(),
        decode_bytes(
            "sample_7k.bme",
            include_bytes!("files/sample_7k.bme"),
            &config,
        )
        .unwrap(),
    ];
    #[cfg(feature = "bmson")]
    outputs.push(decode_bytes("sample.bmson", include_bytes!("files/sample.bmson"), &config).unwrap());
    outputs
}

fn check(chart: &Chart) {
    let timelines = chart.timelines();
    for pair in timelines.windows(2) {
        let [prev, next] = pair else { continue };
        assert!(prev.position() < next.position(), "positions must increase");
        assert!(prev.time_us() <= next.time_us(), "times must not decrease");
        assert!(
            next.exact_time_us() >= prev.exact_time_us() + prev.stop_us() as f64 - 1.0,
            "a stop delays everything after it"
        );
    }
    for timeline in timelines {
        assert!(timeline.bpm() > 0.0);
        let owned = timeline
            .lane_notes()
            .chain(timeline.hidden_lane_notes())
            .map(|(_, id)| id)
            .chain(timeline.bg_notes().iter().copied());
        for id in owned {
            let note = chart.note(id).unwrap();
            assert_eq!(note.position(), timeline.position());
            assert_eq!(note.time_us(), timeline.time_us());
        }
        for (lane, id) in timeline.lane_notes() {
            assert!(lane < chart.lane_count());
            let note = chart.note(id).unwrap();
            let Some(pair) = note.pair() else { continue };
            let other = chart.note(pair).unwrap();
            assert_eq!(other.pair(), Some(id), "pairing is symmetric");
            assert_ne!(note.is_long_end(), other.is_long_end());
            if note.is_long_start() {
                assert!(other.position() > note.position(), "tails follow heads");
            }
        }
    }
}

#[test]
fn test_every_chart_keeps_timeline_invariants() {
    for output in charts() {
        check(&output.chart);
    }
}

#[test]
fn test_messy_chart_timing() {
    let output = decode_bytes("messy.bms", MESSY.as_bytes(), &DecodeConfig::default()).unwrap();
    let chart = &output.chart;
    // measure 1 is half long, so measure 2 starts at 1.5
    let positions: Vec<_> = chart
        .timelines()
        .iter()
        .filter(|timeline| timeline.is_section_line())
        .map(|timeline| timeline.position())
        .collect();
    assert_eq!(positions, vec![0.0, 1.0, 1.5, 2.5, 3.5]);

    // the inline tempo 0x78 and the defined one share position 1.0, the later line wins
    let at_1 = chart
        .timelines()
        .iter()
        .find(|timeline| timeline.position() == 1.0)
        .unwrap();
    assert_eq!(at_1.bpm(), 90.0);
    assert_eq!(at_1.scroll(), 0.5);
}
