use pretty_assertions::assert_eq;

use bms_timeline::{
    bms::BmsDecoder,
    decode::{ControlFlowIssue, DecodeConfig, DecodeOutput, DecodeWarning},
    rng::{Rng, RngMock},
};

const TWO_BRANCHES: &str = r"
#WAV01 one.wav
#WAV02 two.wav
#RANDOM 2
#IF 1
#00011:01
#ENDIF
#IF 2
#00011:02
#ENDIF
#ENDRANDOM
";

fn decode_with(config: &DecodeConfig, source: &str, rng: impl Rng) -> DecodeOutput {
    BmsDecoder::new(config).decode_with_rng("test.bms", source.as_bytes(), rng)
}

fn wavs(output: &DecodeOutput) -> Vec<Option<usize>> {
    output.chart.lane_notes().map(|(_, _, note)| note.wav).collect()
}

#[test]
fn test_selected_randoms_override_rng() {
    let config = DecodeConfig::default().with_selected_randoms([1]);
    let output = decode_with(&config, TWO_BRANCHES, RngMock([2]));
    assert!(output.logs.is_empty(), "{:?}", output.logs);
    assert_eq!(wavs(&output), vec![Some(0)]);
    assert_eq!(output.chart.random_selections, vec![1]);
}

#[test]
fn test_rng_rolls_without_selection() {
    let output = decode_with(&DecodeConfig::default(), TWO_BRANCHES, RngMock([2]));
    assert_eq!(wavs(&output), vec![Some(1)]);
    assert_eq!(output.chart.random_selections, vec![2]);
}

#[test]
fn test_selections_run_out() {
    let source = format!("{TWO_BRANCHES}{}", TWO_BRANCHES.replace("#00011", "#00111"));
    let config = DecodeConfig::default().with_selected_randoms([2]);
    let output = decode_with(&config, &source, RngMock([1]));
    assert_eq!(wavs(&output), vec![Some(1), Some(0)]);
    assert_eq!(output.chart.random_selections, vec![2, 1]);
}

#[test]
fn test_nested_random() {
    let source = r"
#WAV01 a.wav
#WAV02 b.wav
#WAV03 c.wav
#RANDOM 2
#IF 1
    #RANDOM 2
    #IF 1
    #00011:01
    #ENDIF
    #IF 2
    #00011:02
    #ENDIF
    #ENDRANDOM
#ENDIF
#IF 2
#00011:03
#ENDIF
#ENDRANDOM
";
    let output = decode_with(&DecodeConfig::default(), source, RngMock([1, 2]));
    assert!(output.logs.is_empty(), "{:?}", output.logs);
    assert_eq!(wavs(&output), vec![Some(1)]);
    assert_eq!(output.chart.random_selections, vec![1, 2]);

    let output = decode_with(&DecodeConfig::default(), source, RngMock([2]));
    assert_eq!(wavs(&output), vec![Some(2)]);
}

#[test]
fn test_else_chain() {
    let source = r"
#WAV01 a.wav
#WAV02 b.wav
#WAV03 c.wav
#SETRANDOM 3
#IF 1
#00011:01
#ELSEIF 3
#00011:02
#ELSE
#00011:03
#ENDIF
#ENDRANDOM
";
    let output = decode_with(&DecodeConfig::default(), source, RngMock([1]));
    assert!(output.logs.is_empty(), "{:?}", output.logs);
    assert_eq!(wavs(&output), vec![Some(1)]);
    // a fixed value is not a roll
    assert!(output.chart.random_selections.is_empty());
}

#[test]
fn test_headers_inside_branches() {
    let source = r"
#RANDOM 2
#IF 1
#TITLE first
#ELSE
#TITLE second
#ENDIF
#ENDRANDOM
";
    let output = decode_with(&DecodeConfig::default(), source, RngMock([2]));
    assert_eq!(output.chart.metadata.title, "second");
}

#[test]
fn test_unbalanced_directives() {
    let source = r"
#ENDIF
#IF 1
#RANDOM 2
#IF 1
#ENDRANDOM
#ENDRANDOM
";
    let output = decode_with(&DecodeConfig::default(), source, RngMock([1]));
    let issues: Vec<_> = output
        .logs
        .iter()
        .map(|log| log.warning.clone())
        .collect();
    assert_eq!(
        issues,
        vec![
            DecodeWarning::UnbalancedControlFlow(ControlFlowIssue::EndIfWithoutIf),
            DecodeWarning::UnbalancedControlFlow(ControlFlowIssue::IfWithoutRandom),
            DecodeWarning::UnbalancedControlFlow(ControlFlowIssue::UnclosedIf),
            DecodeWarning::UnbalancedControlFlow(ControlFlowIssue::EndRandomWithoutRandom),
        ]
    );
}

#[test]
fn test_invalid_random_skips_every_branch() {
    let source = "#WAV01 a.wav\n#RANDOM x\n#IF 1\n#00011:01\n#ENDIF\n#ENDRANDOM\n#00111:01\n";
    let output = decode_with(&DecodeConfig::default(), source, RngMock([1]));
    assert_eq!(output.logs.len(), 1);
    assert!(matches!(
        output.logs[0].warning,
        DecodeWarning::InvalidNumber { .. }
    ));
    let positions: Vec<_> = output
        .chart
        .lane_notes()
        .map(|(timeline, _, _)| timeline.position())
        .collect();
    assert_eq!(positions, vec![1.0]);
}

#[test]
fn test_relaxed_aliases() {
    let source = r"
#WAV01 a.wav
#RONDAM 1
#IF 1
#00011:01
#IFEND
#ENDRANDOM
";
    let output = decode_with(&DecodeConfig::default(), source, RngMock([1]));
    assert!(output.logs.is_empty(), "{:?}", output.logs);
    assert_eq!(wavs(&output), vec![Some(0)]);

    let strict = DecodeConfig::default().with_relaxed(false);
    let output = decode_with(&strict, source, RngMock([1]));
    assert_eq!(
        output.logs[0].warning,
        DecodeWarning::UnknownHeader("RONDAM".to_string())
    );
}
