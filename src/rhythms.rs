// Genre rhythm templates.
//
// A template is one 4/4 bar at sixteenth-note resolution: 1 triggers a note,
// 0 rests. Each genre carries a few variants and the generator picks one per
// bar.

use crate::error::GenerationError;
use crate::random::RandomSource;

/// Steps in one bar of a template (sixteenth notes in 4/4).
pub const STEPS_PER_BAR: usize = 16;

pub type RhythmTemplate = [u8; STEPS_PER_BAR];

const GENRES: &[(&str, &[RhythmTemplate])] = &[
    (
        "Funk",
        &[
            [1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 1, 0, 1, 1, 0],
            [1, 0, 1, 1, 0, 1, 1, 0, 1, 0, 1, 0, 1, 1, 0, 0],
        ],
    ),
    (
        "Darksynth",
        &[
            [1, 0, 0, 1, 0, 0, 1, 0, 1, 0, 1, 1, 0, 1, 0, 0],
            [1, 0, 1, 0, 1, 1, 0, 0, 1, 0, 0, 1, 1, 0, 1, 0],
        ],
    ),
    (
        "Pop",
        &[
            [1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 1, 0, 0, 0, 0],
            [1, 0, 0, 1, 0, 0, 1, 0, 0, 1, 0, 0, 1, 0, 0, 0],
        ],
    ),
    (
        "Trap",
        &[
            [1, 0, 0, 0, 0, 1, 0, 0, 1, 0, 0, 0, 0, 1, 0, 0],
            [1, 0, 0, 0, 1, 0, 0, 1, 0, 0, 1, 0, 0, 0, 0, 0],
        ],
    ),
];

pub fn templates_for_genre(genre: &str) -> Result<&'static [RhythmTemplate], GenerationError> {
    GENRES
        .iter()
        .find(|(name, _)| *name == genre)
        .map(|&(_, templates)| templates)
        .ok_or_else(|| GenerationError::UnknownGenre {
            name: genre.to_string(),
        })
}

/// Uniformly pick one of the genre's templates.
pub fn choose_template<R>(
    genre: &str,
    rng: &mut R,
) -> Result<&'static RhythmTemplate, GenerationError>
where
    R: RandomSource + ?Sized,
{
    let templates = templates_for_genre(genre)?;
    Ok(&templates[rng.pick_index(templates.len())])
}

/// All genre names in lexicographic order.
pub fn genre_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = GENRES.iter().map(|&(name, _)| name).collect();
    names.sort_unstable();
    names
}

/// Number of note triggers in a template.
#[cfg(test)]
pub fn onset_count(template: &RhythmTemplate) -> usize {
    template.iter().filter(|&&hit| hit == 1).count()
}
