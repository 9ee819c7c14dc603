use crate::error::GenerationError;
use crate::random::{pick, RandomSource};
use crate::rhythms::{self, STEPS_PER_BAR};
use crate::scales::{self, DEFAULT_OCTAVES};

/// Note lengths (in beats) a generated note may take.
pub const NOTE_DURATIONS: [f64; 6] = [0.25, 0.5, 0.75, 1.0, 1.5, 2.0];

/// Velocity every generated note is played at.
pub const DEFAULT_VELOCITY: u8 = 100;

/// Length of the note forced in when density thinning removed everything.
pub const FALLBACK_DURATION: f64 = 1.0;

/// Sixteenth-note steps per beat. Exporters divide `NoteEvent::position`
/// by this to get beats.
pub const STEPS_PER_BEAT: u32 = 4;

/// One generated bass note.
///
/// `position` counts sixteenth-note steps from the start of the sequence
/// (bar * 16 + step); it is not in beats. `duration` is in beats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    pub pitch: u8,
    pub position: u32,
    pub duration: f64,
    pub velocity: u8,
}

impl NoteEvent {
    /// Start of the note in beats.
    pub fn beat_position(&self) -> f64 {
        self.position as f64 / STEPS_PER_BEAT as f64
    }

    /// End of the note in beats.
    pub fn end_beat(&self) -> f64 {
        self.beat_position() + self.duration
    }
}

/// The pitches a bassline may use: the first half (by index) of the scale.
/// A scale too short to have a lower half is used whole.
pub fn lower_half(scale_notes: &[u8]) -> &[u8] {
    let half = &scale_notes[..scale_notes.len() / 2];
    if half.is_empty() {
        scale_notes
    } else {
        half
    }
}

/// Guarantee at least one note: when `notes` is empty, push a single
/// one-beat note at position 0 drawn from `pitch_pool`.
pub fn ensure_non_empty<R>(notes: &mut Vec<NoteEvent>, pitch_pool: &[u8], rng: &mut R)
where
    R: RandomSource + ?Sized,
{
    if !notes.is_empty() {
        return;
    }
    if let Some(&pitch) = pick(rng, pitch_pool) {
        notes.push(NoteEvent {
            pitch,
            position: 0,
            duration: FALLBACK_DURATION,
            velocity: DEFAULT_VELOCITY,
        });
    }
}

/// Generate a bassline.
///
/// Each bar draws its own template from the genre, so bars can differ.
/// Every trigger in the template survives with probability `note_density`
/// and gets an independent random pitch from the lower half of a two-octave
/// scale plus a random duration from [`NOTE_DURATIONS`]. Notes come out in
/// bar-major, step-minor order and the result is never empty.
pub fn generate_bassline<R>(
    root_note: &str,
    scale_type: &str,
    genre: &str,
    bar_count: u32,
    note_density: f64,
    rng: &mut R,
) -> Result<Vec<NoteEvent>, GenerationError>
where
    R: RandomSource + ?Sized,
{
    // All lookups and range checks happen before any random draw.
    let scale_notes = scales::generate_scale(root_note, scale_type, DEFAULT_OCTAVES)?;
    rhythms::templates_for_genre(genre)?;
    if bar_count < 1 {
        return Err(GenerationError::out_of_range(
            "bar count",
            bar_count as f64,
            1.0,
            u32::MAX as f64,
        ));
    }
    if !(0.0..=1.0).contains(&note_density) {
        return Err(GenerationError::out_of_range(
            "note density",
            note_density,
            0.0,
            1.0,
        ));
    }

    let pitch_pool = lower_half(&scale_notes);
    if pitch_pool.is_empty() {
        return Err(GenerationError::EmptyScale {
            name: scale_type.to_string(),
        });
    }
    let mut bassline = Vec::new();

    for bar in 0..bar_count {
        let template = rhythms::choose_template(genre, rng)?;

        for (step, &hit) in template.iter().enumerate() {
            if hit != 1 {
                continue;
            }
            if rng.next_unit() > note_density {
                continue;
            }

            let pitch = pitch_pool[rng.pick_index(pitch_pool.len())];
            let duration = NOTE_DURATIONS[rng.pick_index(NOTE_DURATIONS.len())];
            bassline.push(NoteEvent {
                pitch,
                position: bar * STEPS_PER_BAR as u32 + step as u32,
                duration,
                velocity: DEFAULT_VELOCITY,
            });
        }
    }

    ensure_non_empty(&mut bassline, pitch_pool, rng);

    log::debug!(
        "Generated {} notes: {} {} {}, {} bars, density {:.2}",
        bassline.len(),
        root_note,
        scale_type,
        genre,
        bar_count,
        note_density
    );

    Ok(bassline)
}
