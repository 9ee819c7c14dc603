mod bass;
mod config;
mod dice;
mod error;
mod midi;
mod preview;
mod random;
mod rhythms;
mod scales;
mod tui;

use crate::bass::NoteEvent;
use crate::dice::GenerationParameters;
use crate::error::AppError;
use crate::midi::MidiExportOptions;
use crate::preview::{BassInstrument, Previewer};
use crate::tui::UserAction;

use clap::{Args, Parser, Subcommand};
use crossbeam_channel::Sender;
use rand::Rng;
use ratatui::prelude::CrosstermBackend;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    name = "basslinegen",
    version,
    about = "Generate basslines from a root note, scale and genre, and save them as MIDI"
)]
struct Cli {
    /// Directory MIDI files are written to (defaults to the Desktop)
    #[arg(long, global = true, env = config::OUTPUT_DIR_ENV)]
    out_dir: Option<PathBuf>,

    /// RNG seed (same seed => same bassline)
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Without a subcommand the interactive terminal UI starts
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a bassline from explicit parameters
    Generate(GenerateArgs),
    /// Roll random parameters, confirm them, then generate
    Roll(PlaybackArgs),
    /// List root notes, scales, genres and preview instruments
    List,
    /// Print the tempo and notes stored in a MIDI file
    Inspect {
        /// MIDI file to read
        file: PathBuf,
    },
}

#[derive(Debug, Args)]
struct GenerateArgs {
    /// Root note, e.g. C, F#, Bb
    #[arg(long, default_value = config::DEFAULT_ROOT_NOTE)]
    root: String,

    /// Scale type, e.g. major, dorian, pentatonic_minor
    #[arg(long, default_value = config::DEFAULT_SCALE)]
    scale: String,

    /// Rhythmic genre (Funk, Darksynth, Pop, Trap)
    #[arg(long, default_value = config::DEFAULT_GENRE)]
    genre: String,

    /// Tempo in BPM (40-240)
    #[arg(long, default_value_t = config::DEFAULT_TEMPO)]
    tempo: u32,

    /// Number of bars (1-16)
    #[arg(long, default_value_t = config::DEFAULT_BARS)]
    bars: u32,

    /// Probability that a rhythm hit plays (0.0-1.0)
    #[arg(long, default_value_t = config::DEFAULT_DENSITY)]
    density: f64,

    /// Output file name (defaults to a descriptive name)
    #[arg(short, long)]
    output: Option<String>,

    #[command(flatten)]
    playback: PlaybackArgs,
}

#[derive(Debug, Args)]
struct PlaybackArgs {
    /// Play the bassline after saving it
    #[arg(long)]
    preview: bool,

    /// Bass instrument used for the preview
    #[arg(long, default_value = config::DEFAULT_INSTRUMENT)]
    instrument: String,

    /// Store the instrument as a program change in the MIDI file
    #[arg(long)]
    embed_instrument: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Generate(args)) => {
            init_logging(false);
            run_generate(args, cli.out_dir.as_deref(), cli.seed)?
        }
        Some(Command::Roll(playback)) => {
            init_logging(false);
            run_roll(playback, cli.out_dir.as_deref(), cli.seed)?
        }
        Some(Command::List) => run_list(),
        Some(Command::Inspect { file }) => {
            init_logging(false);
            run_inspect(&file)?
        }
        None => {
            init_logging(true);
            run_tui(cli.out_dir, cli.seed)?
        }
    }
    Ok(())
}

// The terminal UI owns the screen, so its log goes to a file instead.
fn init_logging(to_file: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if to_file {
        match std::fs::File::create(config::tui_log_path()) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(_) => {
                builder.filter_level(log::LevelFilter::Off);
            }
        }
    }
    let _ = builder.try_init();
}

/// "funk" -> "Funk", matching how genres are named.
fn capitalize(input: &str) -> String {
    let lower = input.trim().to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn run_generate(args: GenerateArgs, out_dir: Option<&Path>, seed: Option<u64>) -> Result<(), AppError> {
    let params = GenerationParameters {
        root_note: args.root.trim().to_string(),
        scale_type: args.scale.trim().to_string(),
        genre: capitalize(&args.genre),
        tempo: args.tempo,
        bars: args.bars,
        note_density: args.density,
    };
    generate_and_report(&params, args.output, &args.playback, out_dir, seed)
}

fn run_roll(playback: PlaybackArgs, out_dir: Option<&Path>, seed: Option<u64>) -> Result<(), AppError> {
    let (mut rng, _) = random::seeded_rng(seed);
    let stdin = std::io::stdin();
    let params = dice::interactive_roll(&mut rng, &mut stdin.lock(), &mut std::io::stdout())?;

    match params {
        Some(params) => {
            let seed = rng.gen::<u64>();
            generate_and_report(&params, None, &playback, out_dir, Some(seed))
        }
        None => {
            println!("Dice roll cancelled.");
            Ok(())
        }
    }
}

fn generate_and_report(
    params: &GenerationParameters,
    filename: Option<String>,
    playback: &PlaybackArgs,
    out_dir: Option<&Path>,
    seed: Option<u64>,
) -> Result<(), AppError> {
    params.validate()?;
    let instrument = BassInstrument::from_name(&playback.instrument)?;

    let options = MidiExportOptions {
        tempo: params.tempo,
        program: playback.embed_instrument.then(|| instrument.program()),
        ..MidiExportOptions::default()
    };

    println!("\nGenerating bassline...");
    let (notes, path, seed) = generate_and_save(params, filename, &options, out_dir, seed)?;
    println!("\nSuccess! MIDI file saved to: {}", path.display());
    println!("{} notes, seed {}", notes.len(), seed);

    if playback.preview {
        let mut previewer = Previewer::new(instrument);
        previewer.start(&notes, params.tempo)?;
        println!("Playing preview on {}...", instrument.name());
        while previewer.is_playing() {
            thread::sleep(Duration::from_millis(50));
        }
    }
    Ok(())
}

/// Generate with a fresh rng and write the MIDI file.
fn generate_and_save(
    params: &GenerationParameters,
    filename: Option<String>,
    options: &MidiExportOptions,
    out_dir: Option<&Path>,
    seed: Option<u64>,
) -> Result<(Vec<NoteEvent>, PathBuf, u64), AppError> {
    let (mut rng, seed) = random::seeded_rng(seed);
    log::info!("Generating {:?} with seed {}", params, seed);

    let notes = params.generate(&mut rng)?;
    let dir = config::resolve_output_dir(out_dir)?;
    let filename = filename.unwrap_or_else(|| midi::bassline_filename(params));
    let path = midi::save_midi(&notes, Some(&filename), options, &dir)?;
    Ok((notes, path, seed))
}

fn run_list() {
    println!("Root notes:  {}", scales::root_note_names().join(", "));
    println!("\nScales:");
    for (i, scale) in scales::scale_names().iter().enumerate() {
        println!("{:>3}. {:<18} {}", i + 1, scale, scales::display_scale_name(scale));
    }
    println!("\nGenres:      {}", rhythms::genre_names().join(", "));
    println!("Instruments: {}", BassInstrument::names().join(", "));
}

fn run_inspect(file: &Path) -> Result<(), AppError> {
    let bytes = std::fs::read(file)?;
    let bassline = midi::import_midi(&bytes)?;

    match bassline.tempo {
        Some(tempo) => println!("Tempo: {} BPM", tempo),
        None => println!("Tempo: not set"),
    }
    println!("{} notes", bassline.notes.len());
    println!("{:>5} {:>7} {:>8} {:>8} {:>4}", "bar", "beat", "pitch", "length", "vel");
    for note in &bassline.notes {
        let beat = note.beat_position();
        println!(
            "{:>5} {:>7.2} {:>8} {:>8.2} {:>4}",
            (beat / 4.0).floor() as u32 + 1,
            beat % 4.0 + 1.0,
            note.pitch,
            note.duration,
            note.velocity
        );
    }
    Ok(())
}

struct GenerationOutcome {
    params: GenerationParameters,
    result: Result<(Vec<NoteEvent>, PathBuf, u64), AppError>,
}

fn run_tui(out_dir: Option<PathBuf>, seed: Option<u64>) -> Result<(), Box<dyn Error>> {
    let (outcome_sender, outcome_receiver) = crossbeam_channel::unbounded::<GenerationOutcome>();

    let mut tui = tui::Tui::new(CrosstermBackend::new(std::io::stdout()))?;
    tui.setup()?;

    // Dice rolls and the seeds handed to each generation thread come from here
    let (mut rng, session_seed) = random::seeded_rng(seed);
    log::info!("Session seed {}", session_seed);

    let mut previewer = Previewer::new(tui.state().instrument);
    let mut generation_handle: Option<JoinHandle<()>> = None;
    let mut last_bassline: Option<(GenerationParameters, Vec<NoteEvent>)> = None;

    tui.state_mut()
        .push_status("Set parameters and press Generate. Arrows move/change, q quits.");

    let result = 'main: loop {
        tui.state_mut().previewing = previewer.is_playing();
        if let Err(err) = tui.draw() {
            break 'main Err(err);
        }

        // Results from the generation thread
        while let Ok(outcome) = outcome_receiver.try_recv() {
            if let Some(handle) = generation_handle.take() {
                let _ = handle.join();
            }
            let state = tui.state_mut();
            state.generating = false;
            match outcome.result {
                Ok((notes, path, seed)) => {
                    state.push_status(format!(
                        "Successfully generated {} notes (seed {}): {}",
                        notes.len(),
                        seed,
                        path.display()
                    ));
                    last_bassline = Some((outcome.params, notes));
                }
                Err(err) => {
                    log::error!("Generation failed: {}", err);
                    state.push_status(format!("Generation failed: {}", err));
                }
            }
        }

        let action = match tui.handle_input(Duration::from_millis(50)) {
            Ok(action) => action,
            Err(err) => break 'main Err(err.into()),
        };

        match action {
            UserAction::Quit => break 'main Ok(()),
            UserAction::Generate => {
                let state = tui.state_mut();
                if state.generating {
                    state.push_status("Already generating, please wait.");
                    continue;
                }
                let params = state.parameters();
                if let Err(err) = params.validate() {
                    state.push_status(format!("Invalid parameters: {}", err));
                    continue;
                }
                state.generating = true;
                state.push_status("Generating bassline...");
                generation_handle = Some(spawn_generation(
                    params,
                    out_dir.clone(),
                    rng.gen::<u64>(),
                    outcome_sender.clone(),
                ));
            }
            UserAction::Randomize => {
                let params = dice::roll_parameters(&mut rng);
                let state = tui.state_mut();
                state.apply_parameters(&params);
                state.push_status("Generated random parameters");
            }
            UserAction::TogglePreview => {
                if previewer.is_playing() {
                    previewer.stop();
                    tui.state_mut().push_status("Preview stopped");
                    continue;
                }

                let state = tui.get_current_app_state();
                let params = state.parameters();
                let notes = match &last_bassline {
                    Some((generated_with, notes)) if *generated_with == params => notes.clone(),
                    _ => match params.generate(&mut rng) {
                        Ok(notes) => notes,
                        Err(err) => {
                            tui.state_mut().push_status(format!("Invalid parameters: {}", err));
                            continue;
                        }
                    },
                };

                previewer.set_instrument(state.instrument);
                let message = match previewer.start(&notes, params.tempo) {
                    Ok(()) => format!(
                        "Previewing {} notes on {}",
                        notes.len(),
                        previewer.instrument().name()
                    ),
                    Err(err) => format!("Preview failed: {}", err),
                };
                tui.state_mut().push_status(message);
                last_bassline = Some((params, notes));
            }
            UserAction::NoOp => {}
        }
    };

    previewer.stop();
    if let Some(handle) = generation_handle.take() {
        let _ = handle.join();
    }
    tui.teardown()?;
    result
}

// Each generation gets its own seed so concurrent runs never share an rng.
fn spawn_generation(
    params: GenerationParameters,
    out_dir: Option<PathBuf>,
    seed: u64,
    outcome_sender: Sender<GenerationOutcome>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let options = MidiExportOptions {
            tempo: params.tempo,
            ..MidiExportOptions::default()
        };
        let result = generate_and_save(&params, None, &options, out_dir.as_deref(), Some(seed));
        let _ = outcome_sender.send(GenerationOutcome { params, result });
    })
}
