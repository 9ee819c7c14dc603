// MIDI export and import for generated basslines.
//
// Writes a single-track Standard MIDI File with the `midly` crate: track
// name, tempo, optional program change, then one note-on/note-off pair per
// note. Note positions arrive in sixteenth-note steps and are converted to
// beats (divide by 4) and then to ticks here.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use midly::num::{u15, u24, u28, u4, u7};
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
};

use crate::bass::{NoteEvent, STEPS_PER_BEAT};
use crate::dice::GenerationParameters;
use crate::error::ExportError;

/// Ticks per quarter note.
pub const TICKS_PER_BEAT: u16 = 480;

const TICKS_PER_STEP: u32 = TICKS_PER_BEAT as u32 / STEPS_PER_BEAT;

const CHANNEL: u8 = 0;

/// Largest value a 24-bit tempo field holds.
const MAX_TEMPO_MICROS: u32 = 0x00FF_FFFF;

/// Largest value a 28-bit delta time holds.
const MAX_DELTA_TICKS: u32 = 0x0FFF_FFFF;

/// MIDI export options
#[derive(Debug, Clone)]
pub struct MidiExportOptions {
    pub tempo: u32,
    pub track_name: String,
    /// General MIDI program to select before the first note, if any.
    pub program: Option<u8>,
}

impl Default for MidiExportOptions {
    fn default() -> Self {
        MidiExportOptions {
            tempo: crate::config::DEFAULT_TEMPO,
            track_name: "Bassline".to_string(),
            program: None,
        }
    }
}

/// A bassline read back from a MIDI file.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedBassline {
    pub tempo: Option<u32>,
    pub notes: Vec<NoteEvent>,
}

/// Encode a bassline as MIDI file bytes.
pub fn export_midi(notes: &[NoteEvent], options: &MidiExportOptions) -> Result<Vec<u8>, ExportError> {
    if notes.is_empty() {
        return Err(ExportError::EmptyBassline);
    }

    let track = build_track(notes, options)?;
    let smf = Smf {
        header: Header::new(Format::SingleTrack, Timing::Metrical(u15::new(TICKS_PER_BEAT))),
        tracks: vec![track],
    };

    let mut bytes = Vec::new();
    smf.write_std(&mut bytes)?;
    Ok(bytes)
}

fn build_track<'a>(notes: &[NoteEvent], options: &'a MidiExportOptions) -> Result<Track<'a>, ExportError> {
    let mut track = Track::new();

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(options.track_name.as_bytes())),
    });
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(tempo_field(options.tempo)?)),
    });
    if let Some(program) = options.program {
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel: u4::new(CHANNEL),
                message: MidiMessage::ProgramChange {
                    program: u7::new(data_byte("program", program)?),
                },
            },
        });
    }

    // (tick, order, message): offs sort ahead of ons on the same tick so a
    // repeated pitch is released before it is struck again
    let mut events: Vec<(u32, u8, MidiMessage)> = Vec::with_capacity(notes.len() * 2);
    for note in notes {
        let key = u7::new(data_byte("pitch", note.pitch)?);
        let vel = u7::new(data_byte("velocity", note.velocity)?);
        let tick_on = note
            .position
            .checked_mul(TICKS_PER_STEP)
            .ok_or(ExportError::TrackTooLong)?;
        let tick_off = tick_on
            .checked_add(beats_to_ticks(note.duration).max(1))
            .ok_or(ExportError::TrackTooLong)?;

        events.push((tick_on, 1, MidiMessage::NoteOn { key, vel }));
        events.push((tick_off, 0, MidiMessage::NoteOff { key, vel: u7::new(0) }));
    }
    events.sort_by_key(|&(tick, order, _)| (tick, order));

    let mut last_tick = 0;
    for (tick, _, message) in events {
        track.push(TrackEvent {
            delta: delta_field(tick - last_tick)?,
            kind: TrackEventKind::Midi {
                channel: u4::new(CHANNEL),
                message,
            },
        });
        last_tick = tick;
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    Ok(track)
}

fn data_byte(field: &'static str, value: u8) -> Result<u8, ExportError> {
    if value > 127 {
        return Err(ExportError::PitchOutOfRange { field, value });
    }
    Ok(value)
}

fn tempo_field(bpm: u32) -> Result<u24, ExportError> {
    let micros = tempo_to_micros(bpm);
    if micros > MAX_TEMPO_MICROS {
        return Err(ExportError::TempoOutOfRange { tempo: bpm });
    }
    Ok(u24::new(micros))
}

fn delta_field(ticks: u32) -> Result<u28, ExportError> {
    if ticks > MAX_DELTA_TICKS {
        return Err(ExportError::TrackTooLong);
    }
    Ok(u28::new(ticks))
}

fn beats_to_ticks(beats: f64) -> u32 {
    (beats * TICKS_PER_BEAT as f64).round() as u32
}

fn tempo_to_micros(bpm: u32) -> u32 {
    60_000_000 / bpm.max(1)
}

fn micros_to_tempo(micros: u32) -> u32 {
    (60_000_000.0 / micros.max(1) as f64).round() as u32
}

/// Decode a MIDI file written by [`export_midi`] back into notes.
///
/// Positions come back in sixteenth-note steps and durations in beats. A
/// note-off closes the earliest still-sounding note of the same pitch.
pub fn import_midi(bytes: &[u8]) -> Result<ImportedBassline, ExportError> {
    let smf = Smf::parse(bytes)?;
    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(ticks) => ticks.as_int() as f64,
        Timing::Timecode(..) => TICKS_PER_BEAT as f64,
    };

    let mut tempo = None;
    let mut notes: Vec<(u32, NoteEvent)> = Vec::new();

    for track in &smf.tracks {
        let mut tick: u32 = 0;
        let mut sounding: HashMap<u8, VecDeque<(u32, u8)>> = HashMap::new();

        for event in track {
            tick = tick
                .checked_add(event.delta.as_int())
                .ok_or(ExportError::TrackTooLong)?;
            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(micros)) if tempo.is_none() => {
                    tempo = Some(micros_to_tempo(micros.as_int()));
                }
                TrackEventKind::Midi { message, .. } => match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        sounding
                            .entry(key.as_int())
                            .or_default()
                            .push_back((tick, vel.as_int()));
                    }
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        let pitch = key.as_int();
                        if let Some((start, velocity)) =
                            sounding.get_mut(&pitch).and_then(|queue| queue.pop_front())
                        {
                            let beats = start as f64 / ticks_per_beat;
                            notes.push((
                                start,
                                NoteEvent {
                                    pitch,
                                    position: (beats * STEPS_PER_BEAT as f64).round() as u32,
                                    duration: (tick - start) as f64 / ticks_per_beat,
                                    velocity,
                                },
                            ));
                        } else {
                            log::warn!("Note-off for pitch {} with no matching note-on", pitch);
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        }
    }

    // note-offs arrive in release order; restore onset order
    notes.sort_by_key(|&(start, _)| start);
    Ok(ImportedBassline {
        tempo,
        notes: notes.into_iter().map(|(_, note)| note).collect(),
    })
}

/// `funk_bassline_C_major_120bpm.mid` style name for a parameter set.
pub fn bassline_filename(params: &GenerationParameters) -> String {
    format!(
        "{}_bassline_{}_{}_{}bpm.mid",
        params.genre.to_lowercase(),
        params.root_note,
        params.scale_type,
        params.tempo
    )
}

/// `bassline_20240131_235959.mid`, for when no name is given.
pub fn timestamped_filename() -> String {
    format!("bassline_{}.mid", chrono::Local::now().format("%Y%m%d_%H%M%S"))
}

/// Drop everything but alphanumerics, space, `-`, `_` and `.`.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.'))
        .collect()
}

/// Write a bassline to `dir`, returning the full path of the new file.
pub fn save_midi(
    notes: &[NoteEvent],
    filename: Option<&str>,
    options: &MidiExportOptions,
    dir: &Path,
) -> Result<PathBuf, ExportError> {
    let bytes = export_midi(notes, options)?;

    let name = match filename {
        Some(name) => sanitize_filename(name),
        None => timestamped_filename(),
    };
    let path = dir.join(name);
    std::fs::write(&path, &bytes)?;

    log::info!("Saved {} notes to {}", notes.len(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bass::generate_bassline;
    use crate::random::seeded_rng;

    fn note(pitch: u8, position: u32, duration: f64) -> NoteEvent {
        NoteEvent {
            pitch,
            position,
            duration,
            velocity: 100,
        }
    }

    #[test]
    fn test_empty_bassline_rejected() {
        assert!(matches!(
            export_midi(&[], &MidiExportOptions::default()),
            Err(ExportError::EmptyBassline)
        ));
    }

    #[test]
    fn test_out_of_range_pitch_rejected() {
        let notes = [note(200, 0, 1.0)];
        assert!(matches!(
            export_midi(&notes, &MidiExportOptions::default()),
            Err(ExportError::PitchOutOfRange { field: "pitch", value: 200 })
        ));
    }

    #[test]
    fn test_tempo_must_fit_tempo_event() {
        let notes = [note(36, 0, 1.0)];
        for tempo in [0, 2, 3] {
            let options = MidiExportOptions {
                tempo,
                ..MidiExportOptions::default()
            };
            assert!(matches!(
                export_midi(&notes, &options),
                Err(ExportError::TempoOutOfRange { tempo: t }) if t == tempo
            ));
        }

        // 15,000,000 us per beat still fits in 24 bits
        let slowest = MidiExportOptions {
            tempo: 4,
            ..MidiExportOptions::default()
        };
        let bytes = export_midi(&notes, &slowest).unwrap();
        assert_eq!(import_midi(&bytes).unwrap().tempo, Some(4));
    }

    #[test]
    fn test_gap_too_long_for_delta_rejected() {
        // 3,000,000 steps = 360,000,000 ticks, past the 28-bit delta limit
        let notes = [note(36, 0, 1.0), note(38, 3_000_000, 1.0)];
        assert!(matches!(
            export_midi(&notes, &MidiExportOptions::default()),
            Err(ExportError::TrackTooLong)
        ));
        assert!(matches!(
            export_midi(&[note(36, u32::MAX, 1.0)], &MidiExportOptions::default()),
            Err(ExportError::TrackTooLong)
        ));
    }

    #[test]
    fn test_import_rejects_tick_overflow() {
        // twenty maximal deltas add up to more than u32::MAX ticks
        let mut track = Track::new();
        for _ in 0..20 {
            track.push(TrackEvent {
                delta: u28::new(0x0FFF_FFFF),
                kind: TrackEventKind::Midi {
                    channel: u4::new(0),
                    message: MidiMessage::NoteOn {
                        key: u7::new(36),
                        vel: u7::new(100),
                    },
                },
            });
        }
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        let smf = Smf {
            header: Header::new(Format::SingleTrack, Timing::Metrical(u15::new(TICKS_PER_BEAT))),
            tracks: vec![track],
        };
        let mut bytes = Vec::new();
        smf.write_std(&mut bytes).unwrap();

        assert!(matches!(import_midi(&bytes), Err(ExportError::TrackTooLong)));
    }

    #[test]
    fn test_header_and_meta_events() {
        let options = MidiExportOptions {
            tempo: 120,
            track_name: "Bassline".to_string(),
            program: Some(38),
        };
        let bytes = export_midi(&[note(36, 0, 1.0)], &options).unwrap();
        let smf = Smf::parse(&bytes).unwrap();

        assert_eq!(smf.header.format, Format::SingleTrack);
        assert_eq!(smf.header.timing, Timing::Metrical(u15::new(480)));
        assert_eq!(smf.tracks.len(), 1);

        let track = &smf.tracks[0];
        assert_eq!(
            track[0].kind,
            TrackEventKind::Meta(MetaMessage::TrackName(b"Bassline"))
        );
        assert_eq!(
            track[1].kind,
            TrackEventKind::Meta(MetaMessage::Tempo(u24::new(500_000)))
        );
        assert!(matches!(
            track[2].kind,
            TrackEventKind::Midi { message: MidiMessage::ProgramChange { program }, .. } if program == u7::new(38)
        ));
        assert_eq!(
            track.last().unwrap().kind,
            TrackEventKind::Meta(MetaMessage::EndOfTrack)
        );
        // name, tempo, program, on, off, end
        assert_eq!(track.len(), 6);
    }

    #[test]
    fn test_step_positions_become_beats() {
        // position 6 = beat 1.5 = 720 ticks
        let bytes = export_midi(&[note(40, 6, 0.5)], &MidiExportOptions::default()).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        let mut tick = 0;
        let mut on_tick = None;
        let mut off_tick = None;
        for event in &smf.tracks[0] {
            tick += event.delta.as_int();
            match event.kind {
                TrackEventKind::Midi { message: MidiMessage::NoteOn { .. }, .. } => on_tick = Some(tick),
                TrackEventKind::Midi { message: MidiMessage::NoteOff { .. }, .. } => off_tick = Some(tick),
                _ => {}
            }
        }
        assert_eq!(on_tick, Some(720));
        assert_eq!(off_tick, Some(960));
    }

    #[test]
    fn test_release_before_restrike() {
        // same pitch back to back: the off at tick 480 must precede the next on
        let notes = [note(36, 0, 1.0), note(36, 4, 1.0)];
        let bytes = export_midi(&notes, &MidiExportOptions::default()).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        let messages: Vec<&str> = smf.tracks[0]
            .iter()
            .filter_map(|event| match event.kind {
                TrackEventKind::Midi { message: MidiMessage::NoteOn { .. }, .. } => Some("on"),
                TrackEventKind::Midi { message: MidiMessage::NoteOff { .. }, .. } => Some("off"),
                _ => None,
            })
            .collect();
        assert_eq!(messages, vec!["on", "off", "on", "off"]);
    }

    #[test]
    fn test_round_trip_fixed_sequence() {
        let notes = vec![
            note(36, 0, 0.25),
            note(43, 2, 0.5),
            note(40, 4, 2.0),
            note(38, 13, 0.75),
            note(36, 16, 1.5),
        ];
        let options = MidiExportOptions {
            tempo: 97,
            ..MidiExportOptions::default()
        };
        let bytes = export_midi(&notes, &options).unwrap();
        let imported = import_midi(&bytes).unwrap();

        assert_eq!(imported.tempo, Some(97));
        assert_eq!(imported.notes, notes);
    }

    #[test]
    fn test_round_trip_generated_monophonic_line() {
        let (mut rng, _) = seeded_rng(Some(31));
        let generated = generate_bassline("E", "minor", "Pop", 4, 1.0, &mut rng).unwrap();
        // keep one note per distinct pitch so no two notes of a pitch overlap
        let mut seen = std::collections::HashSet::new();
        let notes: Vec<NoteEvent> = generated
            .into_iter()
            .filter(|n| seen.insert(n.pitch))
            .collect();

        let bytes = export_midi(&notes, &MidiExportOptions::default()).unwrap();
        let imported = import_midi(&bytes).unwrap();
        let pitches: Vec<u8> = imported.notes.iter().map(|n| n.pitch).collect();
        let expected: Vec<u8> = notes.iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, expected);
        for (back, original) in imported.notes.iter().zip(&notes) {
            assert_eq!(back.duration, original.duration);
            assert_eq!(back.position, original.position);
        }
    }

    #[test]
    fn test_import_rejects_garbage() {
        assert!(matches!(
            import_midi(b"definitely not midi"),
            Err(ExportError::Parse(_))
        ));
    }

    #[test]
    fn test_filenames() {
        let params = GenerationParameters {
            root_note: "F#".to_string(),
            scale_type: "harmonic_minor".to_string(),
            genre: "Darksynth".to_string(),
            tempo: 140,
            bars: 4,
            note_density: 1.0,
        };
        let name = bassline_filename(&params);
        assert_eq!(name, "darksynth_bassline_F#_harmonic_minor_140bpm.mid");
        assert_eq!(
            sanitize_filename(&name),
            "darksynth_bassline_F_harmonic_minor_140bpm.mid"
        );
        assert_eq!(sanitize_filename("../../etc/passwd"), "....etcpasswd");

        let stamped = timestamped_filename();
        assert!(stamped.starts_with("bassline_"));
        assert!(stamped.ends_with(".mid"));
        assert_eq!(stamped.len(), "bassline_20240101_000000.mid".len());
    }

    #[test]
    fn test_save_midi_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let notes = [note(36, 0, 1.0), note(38, 8, 0.5)];
        let options = MidiExportOptions {
            tempo: 128,
            ..MidiExportOptions::default()
        };
        let path = save_midi(&notes, Some("pop bass?.mid"), &options, dir.path()).unwrap();

        assert_eq!(path, dir.path().join("pop bass.mid"));
        let bytes = std::fs::read(&path).unwrap();
        let imported = import_midi(&bytes).unwrap();
        assert_eq!(imported.notes, notes.to_vec());
        assert_eq!(imported.tempo, Some(128));
    }

    #[test]
    fn test_save_midi_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no").join("such").join("dir");
        assert!(matches!(
            save_midi(&[note(36, 0, 1.0)], Some("x.mid"), &MidiExportOptions::default(), &missing),
            Err(ExportError::Io(_))
        ));
    }
}
