// Scale and root-note tables.
//
// Root notes sit in the bass octave (C = MIDI 36). Scales are semitone
// offsets from the root, ascending within one octave and starting at 0.

use crate::error::GenerationError;

/// Note names accepted as a root, enharmonic spellings included.
const ROOT_NOTES: &[(&str, u8)] = &[
    ("C", 36),
    ("C#", 37),
    ("Db", 37),
    ("D", 38),
    ("D#", 39),
    ("Eb", 39),
    ("E", 40),
    ("F", 41),
    ("F#", 42),
    ("Gb", 42),
    ("G", 43),
    ("G#", 44),
    ("Ab", 44),
    ("A", 45),
    ("A#", 46),
    ("Bb", 46),
    ("B", 47),
];

const SCALES: &[(&str, &[u8])] = &[
    // Standard
    ("major", &[0, 2, 4, 5, 7, 9, 11]),
    ("minor", &[0, 2, 3, 5, 7, 8, 10]),
    ("pentatonic_major", &[0, 2, 4, 7, 9]),
    ("pentatonic_minor", &[0, 3, 5, 7, 10]),
    ("blues", &[0, 3, 5, 6, 7, 10]),
    // Church modes
    ("dorian", &[0, 2, 3, 5, 7, 9, 10]),
    ("phrygian", &[0, 1, 3, 5, 7, 8, 10]),
    ("lydian", &[0, 2, 4, 6, 7, 9, 11]),
    ("mixolydian", &[0, 2, 4, 5, 7, 9, 10]),
    ("locrian", &[0, 1, 3, 5, 6, 8, 10]),
    // Altered minors
    ("harmonic_minor", &[0, 2, 3, 5, 7, 8, 11]),
    ("melodic_minor", &[0, 2, 3, 5, 7, 9, 11]),
    ("hungarian_minor", &[0, 2, 3, 6, 7, 8, 11]),
    // World
    ("hirajoshi", &[0, 2, 3, 7, 8]),
    ("persian", &[0, 1, 4, 5, 6, 8, 11]),
    ("byzantine", &[0, 1, 4, 5, 7, 8, 11]),
    ("egyptian", &[0, 2, 5, 7, 10]),
    // Synthetic
    ("whole_tone", &[0, 2, 4, 6, 8, 10]),
    ("diminished", &[0, 2, 3, 5, 6, 8, 9, 11]),
    ("prometheus", &[0, 2, 4, 6, 9, 10]),
    ("enigmatic", &[0, 1, 4, 6, 8, 10, 11]),
];

/// Octaves spanned by the scale the generator draws from.
pub const DEFAULT_OCTAVES: u32 = 2;

const MAX_MIDI_PITCH: u32 = 127;

/// MIDI pitch of a root note name. Names are matched exactly ("c" is not "C").
pub fn resolve_pitch_class(name: &str) -> Result<u8, GenerationError> {
    ROOT_NOTES
        .iter()
        .find(|(note, _)| *note == name)
        .map(|&(_, pitch)| pitch)
        .ok_or_else(|| GenerationError::UnknownNote {
            name: name.to_string(),
        })
}

pub fn scale_offsets(scale_type: &str) -> Result<&'static [u8], GenerationError> {
    SCALES
        .iter()
        .find(|(scale, _)| *scale == scale_type)
        .map(|&(_, offsets)| offsets)
        .ok_or_else(|| GenerationError::UnknownScale {
            name: scale_type.to_string(),
        })
}

/// Lay a scale over `octaves` octaves starting at the root.
///
/// Output is octave-major in definition order, so its length is always
/// `octaves * offsets.len()`. Nothing is sorted or deduplicated.
pub fn generate_scale(
    root_note: &str,
    scale_type: &str,
    octaves: u32,
) -> Result<Vec<u8>, GenerationError> {
    let root = resolve_pitch_class(root_note)? as u32;
    let offsets = scale_offsets(scale_type)?;

    let top_offset = offsets.last().copied().unwrap_or(0) as u32;
    if octaves > 0 {
        let highest = (root + top_offset).saturating_add(12u32.saturating_mul(octaves - 1));
        if highest > MAX_MIDI_PITCH {
            let max_octaves = (MAX_MIDI_PITCH - root - top_offset) / 12 + 1;
            return Err(GenerationError::out_of_range(
                "octaves",
                octaves as f64,
                0.0,
                max_octaves as f64,
            ));
        }
    }

    let mut scale_notes = Vec::with_capacity(octaves as usize * offsets.len());
    for octave in 0..octaves {
        for &offset in offsets {
            scale_notes.push((root + offset as u32 + octave * 12) as u8);
        }
    }
    Ok(scale_notes)
}

/// All scale names in lexicographic order.
pub fn scale_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = SCALES.iter().map(|&(name, _)| name).collect();
    names.sort_unstable();
    names
}

/// All root note names in lexicographic order.
pub fn root_note_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = ROOT_NOTES.iter().map(|&(name, _)| name).collect();
    names.sort_unstable();
    names
}

/// "harmonic_minor" -> "Harmonic Minor", for display.
pub fn display_scale_name(scale_type: &str) -> String {
    scale_type
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
