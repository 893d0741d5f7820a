//! The text-format decoder.
//!
//! Decoding runs in two passes over the source. The scan pass dispatches every line: control-flow
//! directives update the [`ControlFlow`] stacks, headers and definitions are applied at once, and
//! measure lines are buffered per measure. The lane layout can still change while scanning, so
//! notes are placed only in the build pass, after every measure has been laid out and every timing
//! event applied.

use std::{collections::BTreeMap, ops::Range, path::Path};

use itertools::Itertools;

use super::{
    channel::{Channel, NoteChannelKind},
    control_flow::ControlFlow,
    definitions::Definitions,
    long_note::{PairTracker, terminate},
    obj_id::{Base, ObjId},
    section::{ChannelLine, Section, build_sections},
};
use crate::{
    decode::{
        ChartFormat, DecodeConfig, DecodeLog, DecodeOutput, DecodeWarning,
        DefinitionKind, decode_text, finalize,
    },
    metadata::{parse_float, parse_int},
    model::{
        Chart, LnMode,
        mode::Mode,
        note::{LongNoteType, Note},
        store::{TimelineStore, TimingChange, TimingEvent},
        timeline::{AnimationCue, AnimationSequence, AnimationTrigger},
    },
    rng::{Rng, default_rng},
};

/// Decoder of `.bms`, `.bme`, `.bml` and `.pms` files.
///
/// A decoder only borrows its configuration, so one can be reused for any number of independent
/// decodes.
///
/// ```rust
/// use bms_timeline::{bms::BmsDecoder, decode::DecodeConfig, rng::RngMock};
///
/// let source = "#WAV01 a.wav\n#WAV02 b.wav\n#RANDOM 2\n#IF 1\n#00111:01\n#ENDIF\n#IF 2\n#00111:02\n#ENDIF\n#ENDRANDOM\n";
/// let config = DecodeConfig::default();
/// let output = BmsDecoder::new(&config).decode_with_rng("song.bms", source.as_bytes(), RngMock([2]));
/// let (_, lane, note) = output.chart.lane_notes().next().unwrap();
/// assert_eq!(lane, 0);
/// assert_eq!(note.wav, Some(1));
/// assert_eq!(output.chart.random_selections, vec![2]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct BmsDecoder<'a> {
    config: &'a DecodeConfig,
}

impl<'a> BmsDecoder<'a> {
    /// Creates a decoder using `config`.
    #[must_use]
    pub const fn new(config: &'a DecodeConfig) -> Self {
        Self { config }
    }

    /// Decodes `bytes`, rolling unselected `#RANDOM` blocks with the default generator.
    pub fn decode(&self, path: impl AsRef<Path>, bytes: &[u8]) -> DecodeOutput {
        self.decode_with_rng(path, bytes, default_rng())
    }

    /// Decodes `bytes`, rolling unselected `#RANDOM` blocks with `rng`.
    pub fn decode_with_rng(
        &self,
        path: impl AsRef<Path>,
        bytes: &[u8],
        rng: impl Rng,
    ) -> DecodeOutput {
        let path = path.as_ref();
        log::debug!("decoding {} as text chart", path.display());
        let (text, fallback) = decode_text(bytes);
        let mode = self.config.hint.unwrap_or_else(|| starting_mode(path));
        let mut scan = Scan {
            config: self.config,
            rng,
            selections: self.config.selected_randoms.as_deref().unwrap_or_default().iter(),
            chart: Chart::new(path.to_path_buf(), ChartFormat::Bms, mode),
            defs: Definitions::default(),
            flow: ControlFlow::default(),
            lines: BTreeMap::new(),
            ln_mode: None,
            logs: Vec::new(),
        };
        if fallback {
            scan.logs.push(DecodeLog::new(DecodeWarning::EncodingFallback, None));
        }
        let mut offset = 0;
        for line in text.split_inclusive('\n') {
            scan.line(line, offset..offset + line.len());
            offset += line.len();
        }
        scan.build(bytes)
    }
}

fn starting_mode(path: &Path) -> Mode {
    let is_pms = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pms"));
    if is_pms { Mode::PopN5K } else { Mode::Beat5K }
}

/// A control-flow directive, aliases resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    Random,
    SetRandom,
    If,
    ElseIf,
    Else,
    EndIf,
    EndRandom,
}

impl Directive {
    fn parse(keyword: &str, args: &str, relaxed: bool) -> Option<Self> {
        Some(match keyword {
            "RANDOM" => Self::Random,
            "SETRANDOM" => Self::SetRandom,
            "IF" => Self::If,
            "ELSEIF" => Self::ElseIf,
            "ELSE" => Self::Else,
            "ENDIF" => Self::EndIf,
            "ENDRANDOM" => Self::EndRandom,
            "RONDAM" if relaxed => Self::Random,
            "IFEND" if relaxed => Self::EndIf,
            "END" if relaxed && args.trim().eq_ignore_ascii_case("IF") => Self::EndIf,
            _ => return None,
        })
    }
}

/// State of the scan pass.
struct Scan<'a, R> {
    config: &'a DecodeConfig,
    rng: R,
    selections: std::slice::Iter<'a, u64>,
    chart: Chart,
    defs: Definitions,
    flow: ControlFlow,
    lines: BTreeMap<u32, Vec<ChannelLine>>,
    ln_mode: Option<LnMode>,
    logs: Vec<DecodeLog>,
}

impl<R: Rng> Scan<'_, R> {
    fn warn(&mut self, warning: DecodeWarning, range: &Range<usize>) {
        self.logs.push(DecodeLog::new(warning, Some(range.clone())));
    }

    fn line(&mut self, line: &str, range: Range<usize>) {
        let line = line.trim();
        let Some(rest) = line
            .strip_prefix('#')
            .or_else(|| line.strip_prefix('＃').filter(|_| self.config.relaxed))
        else {
            // comments and stray text
            return;
        };
        let (keyword, args) = rest
            .split_once(char::is_whitespace)
            .unwrap_or((rest, ""));
        let upper = keyword.to_ascii_uppercase();
        if let Some(directive) = Directive::parse(&upper, args, self.config.relaxed) {
            self.directive(directive, args.trim(), &range);
            return;
        }
        if self.flow.is_skipping() {
            return;
        }
        if let Some(result) = split_channel_line(rest) {
            match result {
                Ok((measure, channel, data)) => self.channel_line(measure, channel, data, range),
                Err(warning) => self.warn(warning, &range),
            }
            return;
        }
        self.header(&upper, keyword, args.trim(), &range);
    }

    fn directive(&mut self, directive: Directive, args: &str, range: &Range<usize>) {
        let parsed = args.parse::<u64>().ok();
        let result = match directive {
            Directive::Random => {
                let value = match parsed.filter(|&max| max >= 1) {
                    Some(max) => {
                        let value = match self.selections.next() {
                            Some(&selected) => selected,
                            None => self.rng.generate(1..=max),
                        };
                        log::trace!("#RANDOM {max} selected {value}");
                        self.chart.random_selections.push(value);
                        value
                    }
                    None => {
                        self.warn(random_arg_warning("RANDOM", args), range);
                        0
                    }
                };
                self.flow.push_random(value);
                Ok(())
            }
            Directive::SetRandom => {
                if parsed.is_none() {
                    self.warn(random_arg_warning("SETRANDOM", args), range);
                }
                self.flow.push_random(parsed.unwrap_or(0));
                Ok(())
            }
            Directive::If => self.flow.begin_if(parsed),
            Directive::ElseIf => self.flow.else_if(parsed),
            Directive::Else => self.flow.else_branch(),
            Directive::EndIf => self.flow.end_if(),
            Directive::EndRandom => self.flow.end_random(),
        };
        if let Err(issue) = result {
            self.warn(DecodeWarning::UnbalancedControlFlow(issue), range);
        }
    }

    fn channel_line(&mut self, measure: u32, channel: &str, data: &str, range: Range<usize>) {
        // channels this decoder has no use for are ignored
        let Some(channel) = Channel::parse(channel) else {
            return;
        };
        let mut mode = self.chart.mode;
        if channel.uses_extended_keys() {
            mode = mode.with_extended_keys();
        }
        if channel.uses_second_player() {
            mode = mode.with_second_player();
        }
        if mode != self.chart.mode {
            log::trace!("lane layout promoted from {} to {mode}", self.chart.mode);
            self.chart.mode = mode;
        }
        self.lines.entry(measure).or_default().push(ChannelLine {
            channel,
            data: data.trim().to_string(),
            range,
            base: self.defs.base,
        });
    }

    fn header(&mut self, upper: &str, keyword: &str, args: &str, range: &Range<usize>) {
        let mut corrections = Vec::new();
        let defined = self.defs.apply(upper, keyword, args, &mut corrections);
        for warning in corrections {
            self.warn(warning, range);
        }
        let result = match defined {
            Ok(true) => Ok(()),
            Err(warning) => Err(warning),
            Ok(false) => self.global_header(upper, args),
        };
        if let Err(warning) = result {
            self.warn(warning, range);
        }
    }

    fn global_header(&mut self, upper: &str, args: &str) -> Result<(), DecodeWarning> {
        match upper {
            "BPM" => {
                let bpm = parse_float(upper, args, |_| true)?;
                if bpm <= 0.0 {
                    return Err(DecodeWarning::NegativeBpm(bpm));
                }
                self.chart.bpm = bpm;
            }
            "LNOBJ" => {
                let id = self
                    .defs
                    .id(args)
                    .ok_or_else(|| DecodeWarning::InvalidCell(args.to_string()))?;
                self.defs.lnobj = Some(id);
            }
            "LNMODE" => {
                let number = parse_int(upper, args, 1..=3)?;
                self.ln_mode = LnMode::from_number(number);
            }
            "LNTYPE" => {
                // only the channel-pair encoding exists
                let _ = parse_int(upper, args, 1..=1)?;
            }
            "BASE" => {
                self.defs.base = Base::from_arg(args).ok_or_else(|| DecodeWarning::OutOfRange {
                    field: upper.to_string(),
                    value: args.to_string(),
                })?;
            }
            _ => {
                if !self.chart.metadata.apply_header(upper, args)? {
                    return Err(DecodeWarning::UnknownHeader(upper.to_string()));
                }
            }
        }
        Ok(())
    }

    /// The build pass, consuming the scan.
    fn build(mut self, bytes: &[u8]) -> DecodeOutput {
        if matches!(self.chart.metadata.player, 2 | 3) {
            self.chart.mode = self.chart.mode.with_second_player();
        }
        self.chart.ln_mode = self
            .config
            .ln_mode_override
            .or(self.ln_mode)
            .unwrap_or_default();
        let declared_ln_type = self
            .config
            .ln_mode_override
            .or(self.ln_mode)
            .map_or(LongNoteType::Undefined, LnMode::note_type);

        let sections = build_sections(std::mem::take(&mut self.lines), |warning, range| {
            self.logs.push(DecodeLog::new(warning, Some(range)));
        });

        let mut store = TimelineStore::new(self.chart.mode.key_count(), self.chart.bpm);
        let events = self.timing_events(&sections);
        store.apply_timing_events(events);
        for section in &sections {
            store.get_or_create(section.start).set_section_line();
        }

        let cells = self.note_cells(&sections);
        self.place_long_notes(&mut store, &cells, declared_ln_type);
        self.place_visible_notes(&mut store, &cells, declared_ln_type);
        self.place_mines_and_hidden(&mut store, &cells);
        self.place_background(&mut store, &sections);

        let Self {
            mut chart,
            defs,
            logs,
            ..
        } = self;
        chart.wav_list = defs.wav.into_files();
        chart.bga_list = defs.bmp.into_files();
        finalize(chart, store, bytes, logs)
    }

    fn cells_of(&mut self, line: &ChannelLine) -> Vec<super::section::Cell> {
        line.cells().unwrap_or_else(|warning| {
            self.warn(warning, &line.range);
            Vec::new()
        })
    }

    fn timing_events(&mut self, sections: &[Section]) -> Vec<TimingEvent> {
        let mut events = Vec::new();
        for section in sections {
            for line in &section.lines {
                if !matches!(
                    line.channel,
                    Channel::BpmInline | Channel::BpmDefined | Channel::Stop | Channel::Scroll
                ) {
                    continue;
                }
                for cell in self.cells_of(line) {
                    let change = match line.channel {
                        Channel::BpmInline => match cell.id.hex_value() {
                            Some(bpm) => Some(TimingChange::Bpm(f64::from(bpm))),
                            None => {
                                self.warn(DecodeWarning::InvalidCell(cell.id.to_string()), &line.range);
                                None
                            }
                        },
                        Channel::BpmDefined => {
                            self.resolve(&line.range, cell.id, DefinitionKind::Bpm, TimingChange::Bpm)
                        }
                        Channel::Stop => {
                            self.resolve(&line.range, cell.id, DefinitionKind::Stop, TimingChange::Stop)
                        }
                        _ => self.resolve(
                            &line.range,
                            cell.id,
                            DefinitionKind::Scroll,
                            TimingChange::Scroll,
                        ),
                    };
                    if let Some(change) = change {
                        events.push(TimingEvent {
                            position: section.position(cell.fraction),
                            change,
                        });
                    }
                }
            }
        }
        events
    }

    fn resolve(
        &mut self,
        range: &Range<usize>,
        id: ObjId,
        kind: DefinitionKind,
        change: fn(f64) -> TimingChange,
    ) -> Option<TimingChange> {
        let table = match kind {
            DefinitionKind::Bpm => &self.defs.bpm,
            DefinitionKind::Stop => &self.defs.stop,
            _ => &self.defs.scroll,
        };
        let value = table.get(&id).copied();
        if value.is_none() {
            self.warn(
                DecodeWarning::UndefinedReference {
                    kind,
                    id: id.to_string(),
                },
                range,
            );
        }
        value.map(change)
    }

    fn note_cells(&mut self, sections: &[Section]) -> Vec<NoteCell> {
        let mode = self.chart.mode;
        let mut cells = Vec::new();
        for section in sections {
            for line in &section.lines {
                let Channel::Note { kind, player, key } = line.channel else {
                    continue;
                };
                // slots the layout leaves unassigned are discarded
                let Some(lane) = mode.lane_for_channel(player, key) else {
                    continue;
                };
                for cell in self.cells_of(line) {
                    cells.push(NoteCell {
                        kind,
                        lane,
                        position: section.position(cell.fraction),
                        id: cell.id,
                        range: line.range.clone(),
                    });
                }
            }
        }
        cells
    }

    fn place_long_notes(
        &mut self,
        store: &mut TimelineStore,
        cells: &[NoteCell],
        ln_type: LongNoteType,
    ) {
        let mut tracker = PairTracker::default();
        let long_cells = cells
            .iter()
            .filter(|cell| cell.kind == NoteChannelKind::Long)
            .sorted_by(|a, b| a.lane.cmp(&b.lane).then(a.position.total_cmp(&b.position)));
        for cell in long_cells {
            let wav = self.defs.wav.index(cell.id);
            if let Some(warning) = tracker.feed(store, cell.lane, cell.position, wav, ln_type) {
                self.warn(warning, &cell.range);
            }
        }
    }

    fn place_visible_notes(
        &mut self,
        store: &mut TimelineStore,
        cells: &[NoteCell],
        ln_type: LongNoteType,
    ) {
        let visible = cells
            .iter()
            .filter(|cell| cell.kind == NoteChannelKind::Visible)
            .sorted_by(|a, b| a.position.total_cmp(&b.position));
        for cell in visible {
            let wav = self.defs.wav.index(cell.id);
            if self.defs.lnobj == Some(cell.id) {
                // a terminator that closes nothing still sounds
                if let Err(warning) = terminate(store, cell.lane, cell.position, wav, ln_type) {
                    store.add_background_note(cell.position, Note::plain(wav));
                    self.warn(warning, &cell.range);
                }
                continue;
            }
            let (_, warning) = store.place_lane_note(cell.position, cell.lane, Note::plain(wav));
            if let Some(warning) = warning {
                self.warn(warning, &cell.range);
            }
        }
    }

    fn place_mines_and_hidden(&mut self, store: &mut TimelineStore, cells: &[NoteCell]) {
        let mine_wav = self.defs.wav.index(ObjId::NULL);
        for cell in cells.iter().sorted_by(|a, b| a.position.total_cmp(&b.position)) {
            let (lane, position) = (cell.lane, cell.position);
            let warning = match cell.kind {
                NoteChannelKind::Mine => {
                    let mine = Note::mine(mine_wav, f64::from(cell.id.value()));
                    store.place_lane_note(position, lane, mine).1
                }
                NoteChannelKind::Hidden => {
                    let note = Note::plain(self.defs.wav.index(cell.id));
                    store
                        .insert_hidden_note(position, lane, note)
                        .err()
                        .map(|_| DecodeWarning::LaneCollision { lane, position })
                }
                NoteChannelKind::Visible | NoteChannelKind::Long => None,
            };
            if let Some(warning) = warning {
                self.warn(warning, &cell.range);
            }
        }
    }

    fn place_background(&mut self, store: &mut TimelineStore, sections: &[Section]) {
        for section in sections {
            for line in &section.lines {
                if !matches!(
                    line.channel,
                    Channel::Bgm | Channel::BgaBase | Channel::BgaLayer | Channel::BgaPoor
                ) {
                    continue;
                }
                for cell in self.cells_of(line) {
                    let position = section.position(cell.fraction);
                    if line.channel == Channel::Bgm {
                        store.add_background_note(position, Note::plain(self.defs.wav.index(cell.id)));
                        continue;
                    }
                    // undefined images are skipped
                    let Some(image) = self.defs.bmp.index(cell.id) else {
                        continue;
                    };
                    let timeline = store.get_or_create(position);
                    match line.channel {
                        Channel::BgaBase => timeline.set_bga(Some(image)),
                        Channel::BgaLayer => timeline.set_layer(Some(image)),
                        _ => timeline.push_cue(AnimationCue {
                            trigger: AnimationTrigger::Miss,
                            interval: 0,
                            sequences: vec![AnimationSequence::single(Some(image))],
                        }),
                    }
                }
            }
        }
    }
}

/// A note-channel cell resolved to a lane.
#[derive(Debug, Clone)]
struct NoteCell {
    kind: NoteChannelKind,
    lane: usize,
    position: f64,
    id: ObjId,
    range: Range<usize>,
}

fn random_arg_warning(field: &str, args: &str) -> DecodeWarning {
    if args.is_empty() {
        DecodeWarning::MissingArgument(field.to_string())
    } else {
        DecodeWarning::InvalidNumber {
            field: field.to_string(),
            value: args.to_string(),
        }
    }
}

/// Splits `mmmCC:data`. `None` when `rest` does not have the shape of a measure line at all.
fn split_channel_line(rest: &str) -> Option<Result<(u32, &str, &str), DecodeWarning>> {
    let bytes = rest.as_bytes();
    let measure = rest.get(..3).filter(|m| m.bytes().all(|b| b.is_ascii_digit()))?;
    if bytes.get(5) != Some(&b':') {
        return None;
    }
    let channel = rest
        .get(3..5)
        .filter(|ch| ch.bytes().all(|b| b.is_ascii_alphanumeric()));
    let (Some(channel), Ok(measure)) = (channel, measure.parse()) else {
        return Some(Err(DecodeWarning::InvalidChannel(
            rest.chars().take(5).collect(),
        )));
    };
    Some(Ok((measure, channel, rest.get(6..).unwrap_or_default())))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::rng::RngMock;

    fn decode(source: &str) -> DecodeOutput {
        BmsDecoder::new(&DecodeConfig::default()).decode_with_rng(
            "test.bms",
            source.as_bytes(),
            RngMock([1]),
        )
    }

    #[test]
    fn channel_line_shapes() {
        assert_eq!(
            split_channel_line("00111:0101"),
            Some(Ok((1, "11", "0101")))
        );
        assert_eq!(split_channel_line("TITLE x"), None);
        assert_eq!(split_channel_line("00111 01"), None);
        assert_eq!(
            split_channel_line("001-1:01"),
            Some(Err(DecodeWarning::InvalidChannel("001-1".to_string())))
        );
    }

    #[test]
    fn relaxed_aliases() {
        assert_eq!(Directive::parse("RONDAM", "", true), Some(Directive::Random));
        assert_eq!(Directive::parse("RONDAM", "", false), None);
        assert_eq!(Directive::parse("END", "IF", true), Some(Directive::EndIf));
        assert_eq!(Directive::parse("END", "", true), None);
    }

    #[test]
    fn unknown_header_is_info() {
        let output = decode("#FOO bar\n");
        assert_eq!(output.logs.len(), 1);
        assert_eq!(
            output.logs[0].warning,
            DecodeWarning::UnknownHeader("FOO".to_string())
        );
        assert_eq!(output.logs[0].range, Some(0..9));
    }

    #[test]
    fn full_width_prefix_only_when_relaxed() {
        let strict = DecodeConfig::default().with_relaxed(false);
        let source = "＃TITLE wide\n";
        let output = BmsDecoder::new(&strict).decode("a.bms", source.as_bytes());
        assert_eq!(output.chart.metadata.title, "");
        assert_eq!(decode(source).chart.metadata.title, "wide");
    }

    #[test]
    fn extended_channel_promotes_layout() {
        let output = decode("#00118:01\n");
        assert_eq!(output.chart.mode, Mode::Beat7K);
        let output = decode("#00121:01\n");
        assert_eq!(output.chart.mode, Mode::Beat10K);
        let output = decode("#PLAYER 3\n#00111:01\n");
        assert_eq!(output.chart.mode, Mode::Beat10K);
    }

    #[test]
    fn pms_starts_as_popn() {
        let output = BmsDecoder::new(&DecodeConfig::default()).decode("a.pms", b"#00115:01\n");
        assert_eq!(output.chart.mode, Mode::PopN5K);
        let output = BmsDecoder::new(&DecodeConfig::default()).decode("a.pms", b"#00122:01\n");
        assert_eq!(output.chart.mode, Mode::PopN9K);
    }

    #[test]
    fn hidden_and_mine_channels() {
        let output = decode("#WAV00 mine.wav\n#WAV01 a.wav\n#00031:01\n#000D2:0A\n");
        let timeline = &output.chart.timelines()[0];
        let hidden = output.chart.note(timeline.hidden_note(0).unwrap()).unwrap();
        assert_eq!(hidden.wav, Some(1));
        let mine = output.chart.note(timeline.note(1).unwrap()).unwrap();
        assert_eq!(mine.wav, Some(0));
        assert_eq!(mine.kind, crate::model::note::NoteKind::Mine { damage: 10.0 });
    }

    #[test]
    fn miss_layer_becomes_cue() {
        let output = decode("#BMP01 miss.png\n#00006:01\n#00004:02\n");
        let timeline = &output.chart.timelines()[0];
        assert_eq!(timeline.event_cues().len(), 1);
        assert_eq!(timeline.event_cues()[0].trigger, AnimationTrigger::Miss);
        assert_eq!(timeline.bga(), None);
        assert!(output.logs.is_empty());
    }
}
