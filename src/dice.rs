use std::fmt;
use std::io::{self, BufRead, Write};

use crate::bass::{self, NoteEvent};
use crate::config::{
    BAR_RANGE, DENSITY_RANGE, ROLL_BARS, ROLL_DENSITY_RANGE, ROLL_TEMPO_RANGE, TEMPO_RANGE,
};
use crate::error::GenerationError;
use crate::random::{pick, RandomSource};
use crate::rhythms;
use crate::scales;

/// Everything needed to generate and export one bassline.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParameters {
    pub root_note: String,
    pub scale_type: String,
    pub genre: String,
    pub tempo: u32,
    pub bars: u32,
    pub note_density: f64,
}

impl GenerationParameters {
    /// Check the parameters against the manual-entry ranges, tempo included.
    pub fn validate(&self) -> Result<(), GenerationError> {
        scales::resolve_pitch_class(&self.root_note)?;
        scales::scale_offsets(&self.scale_type)?;
        rhythms::templates_for_genre(&self.genre)?;

        if !TEMPO_RANGE.contains(&self.tempo) {
            return Err(GenerationError::out_of_range(
                "tempo",
                self.tempo as f64,
                *TEMPO_RANGE.start() as f64,
                *TEMPO_RANGE.end() as f64,
            ));
        }
        if !BAR_RANGE.contains(&self.bars) {
            return Err(GenerationError::out_of_range(
                "bars",
                self.bars as f64,
                *BAR_RANGE.start() as f64,
                *BAR_RANGE.end() as f64,
            ));
        }
        if !DENSITY_RANGE.contains(&self.note_density) {
            return Err(GenerationError::out_of_range(
                "note density",
                self.note_density,
                *DENSITY_RANGE.start(),
                *DENSITY_RANGE.end(),
            ));
        }
        Ok(())
    }

    /// Validate, then run the generator with these parameters.
    pub fn generate<R>(&self, rng: &mut R) -> Result<Vec<NoteEvent>, GenerationError>
    where
        R: RandomSource + ?Sized,
    {
        self.validate()?;
        bass::generate_bassline(
            &self.root_note,
            &self.scale_type,
            &self.genre,
            self.bars,
            self.note_density,
            rng,
        )
    }
}

impl fmt::Display for GenerationParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Root Note:     {}", self.root_note)?;
        writeln!(f, "Scale Type:    {}", scales::display_scale_name(&self.scale_type))?;
        writeln!(f, "Genre:         {}", self.genre)?;
        writeln!(f, "Tempo:         {} BPM", self.tempo)?;
        writeln!(f, "Bars:          {}", self.bars)?;
        write!(f, "Note Density:  {:.2}", self.note_density)
    }
}

/// Roll a random, musically useful parameter set: any root, scale and genre,
/// tempo 60-180, a fixed 8 bars, density 0.30-1.00 in hundredths.
pub fn roll_parameters<R>(rng: &mut R) -> GenerationParameters
where
    R: RandomSource + ?Sized,
{
    let roots = scales::root_note_names();
    let scale_types = scales::scale_names();
    let genres = rhythms::genre_names();

    // the tables are static and non-empty
    let root_note = pick(rng, &roots).copied().unwrap_or(crate::config::DEFAULT_ROOT_NOTE);
    let scale_type = pick(rng, &scale_types).copied().unwrap_or(crate::config::DEFAULT_SCALE);
    let genre = pick(rng, &genres).copied().unwrap_or(crate::config::DEFAULT_GENRE);

    let tempo_span = (ROLL_TEMPO_RANGE.end() - ROLL_TEMPO_RANGE.start() + 1) as usize;
    let tempo = ROLL_TEMPO_RANGE.start() + rng.pick_index(tempo_span) as u32;

    let (low, high) = (*ROLL_DENSITY_RANGE.start(), *ROLL_DENSITY_RANGE.end());
    let density = low + rng.next_unit() * (high - low);
    let note_density = ((density * 100.0).round() / 100.0).clamp(low, high);

    GenerationParameters {
        root_note: root_note.to_string(),
        scale_type: scale_type.to_string(),
        genre: genre.to_string(),
        tempo,
        bars: ROLL_BARS,
        note_density,
    }
}

/// Show rolled parameters and ask to accept (Y), reject (N) or re-roll (R).
///
/// Every answer other than accept or reject, unrecognised ones included, rolls
/// a fresh set before asking again. Returns the accepted parameters, or `None`
/// on reject or end of input.
pub fn interactive_roll<R, I, W>(
    rng: &mut R,
    input: &mut I,
    output: &mut W,
) -> io::Result<Option<GenerationParameters>>
where
    R: RandomSource + ?Sized,
    I: BufRead,
    W: Write,
{
    loop {
        let params = roll_parameters(rng);
        print_parameters(&params, output)?;

        write!(output, "\nAccept these parameters? (Y/N/R) [Yes/No/Re-roll]: ")?;
        output.flush()?;

        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 {
            return Ok(None);
        }

        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(Some(params)),
            "n" | "no" => return Ok(None),
            "r" | "re-roll" | "reroll" => {}
            _ => writeln!(output, "Invalid input. Please enter Y, N, or R.")?,
        }
    }
}

pub fn print_parameters<W: Write>(params: &GenerationParameters, output: &mut W) -> io::Result<()> {
    writeln!(output, "\n🎲 Dice Roll Parameters 🎲")?;
    writeln!(output, "{}", "-".repeat(30))?;
    writeln!(output, "{}", params)?;
    writeln!(output, "{}", "-".repeat(30))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{seeded_rng, ScriptedSource};
    use std::io::Cursor;

    fn params() -> GenerationParameters {
        GenerationParameters {
            root_note: "G".to_string(),
            scale_type: "mixolydian".to_string(),
            genre: "Pop".to_string(),
            tempo: 100,
            bars: 4,
            note_density: 0.8,
        }
    }

    #[test]
    fn test_rolled_parameters_in_range() {
        let (mut rng, _) = seeded_rng(Some(1234));
        for _ in 0..500 {
            let rolled = roll_parameters(&mut rng);
            assert!(rolled.validate().is_ok(), "{:?}", rolled);
            assert!(ROLL_TEMPO_RANGE.contains(&rolled.tempo));
            assert_eq!(rolled.bars, 8);
            assert!(ROLL_DENSITY_RANGE.contains(&rolled.note_density));
            let hundredths = rolled.note_density * 100.0;
            assert!((hundredths - hundredths.round()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_roll_edges() {
        // huge indices wrap, density draw at the top of the unit interval
        let mut high = ScriptedSource::new(vec![0.999_999], vec![usize::MAX - 1]);
        let rolled = roll_parameters(&mut high);
        assert_eq!(rolled.note_density, 1.0);

        let mut low = ScriptedSource::new(vec![0.0], vec![0]);
        let rolled = roll_parameters(&mut low);
        assert_eq!(rolled.root_note, "A");
        assert_eq!(rolled.scale_type, "blues");
        assert_eq!(rolled.genre, "Darksynth");
        assert_eq!(rolled.tempo, 60);
        assert_eq!(rolled.note_density, 0.3);
    }

    #[test]
    fn test_roll_reaches_every_genre() {
        let (mut rng, _) = seeded_rng(Some(77));
        let mut genres: Vec<String> = (0..200).map(|_| roll_parameters(&mut rng).genre).collect();
        genres.sort();
        genres.dedup();
        assert_eq!(genres, vec!["Darksynth", "Funk", "Pop", "Trap"]);
    }

    #[test]
    fn test_validate_ranges() {
        assert!(params().validate().is_ok());

        let slow = GenerationParameters { tempo: 39, ..params() };
        assert!(matches!(
            slow.validate(),
            Err(GenerationError::InvalidParameterRange { parameter: "tempo", .. })
        ));

        let long = GenerationParameters { bars: 17, ..params() };
        assert!(matches!(
            long.validate(),
            Err(GenerationError::InvalidParameterRange { parameter: "bars", .. })
        ));

        let dense = GenerationParameters { note_density: -0.1, ..params() };
        assert!(matches!(
            dense.validate(),
            Err(GenerationError::InvalidParameterRange { parameter: "note density", .. })
        ));

        let unknown = GenerationParameters { genre: "Polka".to_string(), ..params() };
        assert!(matches!(
            unknown.validate(),
            Err(GenerationError::UnknownGenre { .. })
        ));
    }

    #[test]
    fn test_generate_from_parameters() {
        let (mut rng, _) = seeded_rng(Some(3));
        let notes = params().generate(&mut rng).unwrap();
        assert!(!notes.is_empty());
        assert!(notes.iter().all(|n| n.position < 4 * 16));
    }

    #[test]
    fn test_interactive_accept() {
        let (mut rng, _) = seeded_rng(Some(10));
        let (mut expected_rng, _) = seeded_rng(Some(10));
        let expected = roll_parameters(&mut expected_rng);

        let mut input = Cursor::new("y\n");
        let mut output = Vec::new();
        let accepted = interactive_roll(&mut rng, &mut input, &mut output).unwrap();
        assert_eq!(accepted, Some(expected));

        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("Dice Roll Parameters"));
        assert!(shown.contains("Bars:          8"));
    }

    #[test]
    fn test_interactive_reject_and_eof() {
        let (mut rng, _) = seeded_rng(Some(10));
        let mut output = Vec::new();
        assert_eq!(
            interactive_roll(&mut rng, &mut Cursor::new("N\n"), &mut output).unwrap(),
            None
        );
        assert_eq!(
            interactive_roll(&mut rng, &mut Cursor::new(""), &mut output).unwrap(),
            None
        );
    }

    #[test]
    fn test_interactive_reroll_then_accept() {
        let (mut rng, _) = seeded_rng(Some(21));
        let (mut expected_rng, _) = seeded_rng(Some(21));
        roll_parameters(&mut expected_rng);
        let second = roll_parameters(&mut expected_rng);

        let mut input = Cursor::new("r\ny\n");
        let mut output = Vec::new();
        let accepted = interactive_roll(&mut rng, &mut input, &mut output).unwrap();
        assert_eq!(accepted, Some(second));
        let shown = String::from_utf8(output).unwrap();
        assert_eq!(shown.matches("Dice Roll Parameters").count(), 2);
    }

    #[test]
    fn test_interactive_invalid_answer_rolls_again() {
        let (mut rng, _) = seeded_rng(Some(21));
        let (mut expected_rng, _) = seeded_rng(Some(21));
        roll_parameters(&mut expected_rng);
        let second = roll_parameters(&mut expected_rng);
        let third = roll_parameters(&mut expected_rng);

        let mut input = Cursor::new("maybe\ny\n");
        let mut output = Vec::new();
        let accepted = interactive_roll(&mut rng, &mut input, &mut output).unwrap();
        assert_eq!(accepted, Some(second));

        let mut input = Cursor::new("?\nr\nyes\n");
        let mut output = Vec::new();
        let (mut rng, _) = seeded_rng(Some(21));
        let accepted = interactive_roll(&mut rng, &mut input, &mut output).unwrap();
        assert_eq!(accepted, Some(third));

        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("Invalid input. Please enter Y, N, or R."));
        assert_eq!(shown.matches("Dice Roll Parameters").count(), 3);
    }
}
