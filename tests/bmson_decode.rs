#![cfg(feature = "bmson")]

use pretty_assertions::assert_eq;

use bms_timeline::{
    bmson::{Bmson, BmsonDecoder},
    decode::{ChartFormat, DecodeConfig, DecodeError, DecodeOutput, DecodeWarning, decode_bytes},
    model::{
        LnMode,
        mode::Mode,
        note::{LongNoteType, NoteKind},
        timeline::{AnimationSequence, AnimationTrigger},
    },
};

fn decode(json: &str) -> DecodeOutput {
    BmsonDecoder::new(&DecodeConfig::default())
        .decode("test.bmson", json.as_bytes())
        .unwrap()
}

#[test]
fn test_sample_document() {
    let source = include_str!("files/sample.bmson");
    let output = decode_bytes("sample.bmson", source.as_bytes(), &DecodeConfig::default()).unwrap();
    assert!(output.logs.is_empty(), "{:?}", output.logs);

    let chart = &output.chart;
    assert_eq!(chart.format, ChartFormat::Bmson);
    assert_eq!(chart.mode, Mode::Beat7K);
    assert_eq!(chart.bpm, 150.0);
    assert_eq!(chart.ln_mode, LnMode::ChargeNote);
    assert_eq!(chart.metadata.title, "Sample Chart");
    assert_eq!(chart.metadata.subartist, "obj:Someone,movie:Other");
    assert_eq!(chart.metadata.chart_name, "ANOTHER");
    assert_eq!(chart.metadata.play_level, "12");
    assert_eq!(chart.metadata.defexrank, Some(100.0));
    assert_eq!(chart.metadata.total, Some(300.0));
    assert_eq!(chart.metadata.stagefile, "eyecatch.png");
    assert_eq!(chart.metadata.banner, "banner.png");
    assert_eq!(
        chart.wav_list,
        vec![
            "kick.wav",
            "snare.wav",
            "hat.wav",
            "release.wav",
            "ghost.wav",
            "boom.wav"
        ]
    );
    assert_eq!(chart.bga_list, vec!["back.png", "poor.png"]);
}

#[test]
fn test_sample_matches_text_timing() {
    let source = include_str!("files/sample.bmson");
    let output = decode_bytes("sample.bmson", source.as_bytes(), &DecodeConfig::default()).unwrap();
    let timing: Vec<_> = output
        .chart
        .timelines()
        .iter()
        .map(|timeline| (timeline.position(), timeline.time_us()))
        .collect();
    assert_eq!(
        timing,
        vec![
            (0.0, 0),
            (1.0, 1_600_000),
            (1.25, 2_000_000),
            (1.5, 2_400_000),
            (1.75, 2_800_000),
            (2.0, 3_200_000),
            (2.5, 4_800_000),
            (3.0, 5_200_000),
            (3.5, 5_600_000),
        ]
    );
}

#[test]
fn test_sample_notes() {
    let source = include_str!("files/sample.bmson");
    let output = decode_bytes("sample.bmson", source.as_bytes(), &DecodeConfig::default()).unwrap();
    let chart = &output.chart;
    let lane_notes: Vec<_> = chart
        .lane_notes()
        .map(|(timeline, lane, note)| (timeline.position(), lane, note.wav))
        .collect();
    assert_eq!(
        lane_notes,
        vec![
            (1.0, 0, Some(0)),
            (1.0, 7, Some(2)),
            (1.5, 0, Some(1)),
            (2.0, 0, Some(2)),
            (2.0, 1, Some(1)),
            (2.5, 0, Some(3)),
            (3.0, 3, Some(5)),
            (3.5, 1, None),
        ]
    );

    let at_1 = &chart.timelines()[1];
    assert_eq!(at_1.bg_notes().len(), 1);
    assert_eq!(at_1.bga(), Some(0));
    let hidden = chart.note(at_1.hidden_note(2).unwrap()).unwrap();
    assert_eq!(hidden.wav, Some(4));

    let cue = &at_1.event_cues()[0];
    assert_eq!(cue.trigger, AnimationTrigger::Miss);
    assert_eq!(cue.sequences, vec![AnimationSequence::single(Some(1))]);

    let mine = chart.note(chart.timelines()[7].note(3).unwrap()).unwrap();
    assert_eq!(mine.kind, NoteKind::Mine { damage: 10.0 });
}

#[test]
fn test_long_note_length_in_pulses() {
    let output = decode(
        r#"{
            "version": "1.0.0",
            "info": { "init_bpm": 120, "resolution": 240 },
            "sound_channels": [{ "name": "a.wav", "notes": [{ "x": 1, "y": 0, "l": 480, "t": 3 }] }]
        }"#,
    );
    let notes: Vec<_> = output
        .chart
        .lane_notes()
        .map(|(timeline, _, note)| (timeline.position(), note.is_long_end()))
        .collect();
    assert_eq!(notes, vec![(0.0, false), (0.5, true)]);
    let (_, _, head) = output.chart.lane_notes().next().unwrap();
    assert_eq!(head.ln_type(), Some(LongNoteType::HellChargeNote));
}

#[test]
fn test_note_inside_long_note_goes_to_background() {
    let output = decode(
        r#"{
            "version": "1.0.0",
            "info": { "init_bpm": 120 },
            "sound_channels": [
                { "name": "a.wav", "notes": [{ "x": 1, "y": 240 }] },
                { "name": "b.wav", "notes": [{ "x": 1, "y": 0, "l": 960 }] }
            ]
        }"#,
    );
    assert_eq!(output.logs.len(), 1);
    assert!(matches!(
        output.logs[0].warning,
        DecodeWarning::InsideLongNote { lane: 0, .. }
    ));
    let quarter = output
        .chart
        .timelines()
        .iter()
        .find(|timeline| timeline.position() == 0.25)
        .unwrap();
    assert_eq!(quarter.note(0), None);
    assert_eq!(quarter.bg_notes().len(), 1);
}

#[test]
fn test_missing_required_field_is_fatal() {
    let err = BmsonDecoder::new(&DecodeConfig::default())
        .decode(
            "test.bmson",
            br#"{ "version": "1.0.0", "info": { "title": "no tempo" }, "sound_channels": [] }"#,
        )
        .unwrap_err();
    let DecodeError::Json(err) = err else {
        panic!("expected a JSON error, got {err:?}");
    };
    // the missing field is reported on the object lacking it
    assert!(err.path().to_string().starts_with("info"));
    assert!(err.inner().to_string().contains("init_bpm"));
}

#[test]
fn test_malformed_json_is_fatal() {
    let result = decode_bytes("broken.bmson", b"{ \"version\": ", &DecodeConfig::default());
    assert!(matches!(result, Err(DecodeError::Json(_))));
}

#[test]
fn test_layer_event_with_undefined_sequence() {
    let output = decode(
        r#"{
            "version": "1.0.0",
            "info": { "init_bpm": 120 },
            "sound_channels": [],
            "bga": {
                "bga_header": [{ "id": 5, "name": "layer.png" }],
                "bga_sequence": [{ "id": 7, "sequence": [{ "time": 0, "id": 5 }, { "time": 100, "id": -1 }] }],
                "layer_events": [
                    { "y": 0, "id": 5 },
                    { "y": 960, "id_set": [7, 5], "condition": "play", "interval": 250 }
                ]
            }
        }"#,
    );
    let timelines = output.chart.timelines();
    assert_eq!(timelines[0].layer(), Some(0));

    let cue = &timelines[1].event_cues()[0];
    assert_eq!(cue.trigger, AnimationTrigger::Play);
    assert_eq!(cue.interval, 250);
    assert_eq!(cue.sequences.len(), 2);
    assert_eq!(cue.sequences[0].frames[0].image, Some(0));
    assert_eq!(cue.sequences[0].frames[1].image, None);
    assert_eq!(cue.sequences[1], AnimationSequence::single(Some(0)));

    assert_eq!(output.logs.len(), 1);
    assert!(matches!(
        &output.logs[0].warning,
        DecodeWarning::UndefinedReference { id, .. } if id == "5"
    ));
}

#[test]
fn test_document_round_trips_through_serde() {
    let source = include_str!("files/sample.bmson");
    let bmson: Bmson = serde_json::from_str(source).unwrap();
    let again: Bmson = serde_json::from_str(&serde_json::to_string(&bmson).unwrap()).unwrap();
    assert_eq!(bmson, again);
    assert_eq!(bmson.info.resolution, 240);
    assert_eq!(bmson.sound_channels.len(), 4);
}

#[test]
fn test_huge_pulse_positions_are_bounded() {
    let output = decode(
        r#"{
            "version": "1.0.0",
            "info": { "init_bpm": 120 },
            "sound_channels": [{ "name": "a.wav", "notes": [
                { "x": 0, "y": 18446744073709551615, "l": 1 },
                { "x": 1, "y": 4000000000000 }
            ] }]
        }"#,
    );
    let section_lines = output
        .chart
        .timelines()
        .iter()
        .filter(|timeline| timeline.is_section_line())
        .count();
    assert_eq!(section_lines, 1000);
    assert!(matches!(
        &output.logs[0].warning,
        DecodeWarning::OutOfRange { field, .. } if field == "last measure"
    ));
    assert_eq!(output.chart.lane_notes().count(), 1);
}

#[test]
fn test_miss_event_with_undefined_sequence() {
    let output = decode(
        r#"{
            "version": "1.0.0",
            "info": { "init_bpm": 120 },
            "sound_channels": [],
            "bga": {
                "bga_header": [{ "id": 3, "name": "poor.png" }],
                "poor_events": [{ "y": 0, "id": 3 }]
            }
        }"#,
    );
    let cue = &output.chart.timelines()[0].event_cues()[0];
    assert_eq!(cue.trigger, AnimationTrigger::Miss);
    assert_eq!(cue.sequences, vec![AnimationSequence::single(Some(0))]);
    assert_eq!(output.logs.len(), 1);
    assert!(matches!(
        &output.logs[0].warning,
        DecodeWarning::UndefinedReference { id, .. } if id == "3"
    ));
}

#[test]
fn test_mine_inside_long_note_goes_to_background() {
    let output = decode(
        r#"{
            "version": "1.0.0",
            "info": { "init_bpm": 120 },
            "sound_channels": [{ "name": "a.wav", "notes": [{ "x": 1, "y": 0, "l": 960 }] }],
            "mine_channels": [{ "name": "boom.wav", "notes": [{ "x": 1, "y": 480, "damage": 5.0 }] }]
        }"#,
    );
    assert_eq!(output.logs.len(), 1);
    assert!(matches!(
        output.logs[0].warning,
        DecodeWarning::InsideLongNote { lane: 0, .. }
    ));
    let half = output
        .chart
        .timelines()
        .iter()
        .find(|timeline| timeline.position() == 0.5)
        .unwrap();
    let demoted = output.chart.note(half.bg_notes()[0]).unwrap();
    assert_eq!(demoted.kind, NoteKind::Plain);
    assert_eq!(demoted.wav, Some(1));
}
