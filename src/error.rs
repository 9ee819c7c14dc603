use thiserror::Error;

/// Rejections raised by the generation core. Nothing is generated when one
/// of these is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error("Invalid root note '{name}'. Choose from: {}", crate::scales::root_note_names().join(", "))]
    UnknownNote { name: String },

    #[error("Invalid scale type '{name}'. Choose from: {}", crate::scales::scale_names().join(", "))]
    UnknownScale { name: String },

    #[error("Invalid genre '{name}'. Choose from: {}", crate::rhythms::genre_names().join(", "))]
    UnknownGenre { name: String },

    #[error("Scale '{name}' has no notes to draw from")]
    EmptyScale { name: String },

    #[error("{parameter} must be between {min} and {max} (got {value})")]
    InvalidParameterRange {
        parameter: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

impl GenerationError {
    pub(crate) fn out_of_range(parameter: &'static str, value: f64, min: f64, max: f64) -> Self {
        GenerationError::InvalidParameterRange {
            parameter,
            value,
            min,
            max,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Cannot create MIDI file with empty bassline")]
    EmptyBassline,

    #[error("{field} {value} does not fit in a MIDI data byte")]
    PitchOutOfRange { field: &'static str, value: u8 },

    #[error("Tempo {tempo} BPM cannot be stored in a MIDI tempo event")]
    TempoOutOfRange { tempo: u32 },

    #[error("Track is longer than a MIDI file can address")]
    TrackTooLong,

    #[error("Failed to save MIDI file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse MIDI data: {0}")]
    Parse(#[from] midly::Error),

    #[error("Could not locate a home or Desktop directory for output")]
    NoOutputDirectory,
}

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("Cannot create preview: empty bassline")]
    EmptyBassline,

    #[error("Invalid instrument '{name}'. Choose from: {}", crate::preview::BassInstrument::names().join(", "))]
    UnknownInstrument { name: String },

    #[error("Audio device error: {0}")]
    Device(String),
}

/// Any failure the front ends report to the user.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Preview(#[from] PreviewError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
