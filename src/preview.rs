use crate::bass::NoteEvent;
use crate::error::PreviewError;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use dasp_signal::Signal;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const SAMPLE_RATE: u32 = 44100;

/// Portion of each note that sounds; the rest is silence between notes.
const ARTICULATION: f32 = 0.9;

/// Attack ramp length in seconds, to avoid clicks.
const ATTACK_SECONDS: f32 = 0.005;

/// The General MIDI bass programs (32-39).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BassInstrument {
    AcousticBass,
    ElectricBassFinger,
    ElectricBassPick,
    FretlessBass,
    SlapBass1,
    SlapBass2,
    SynthBass1,
    SynthBass2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Waveform {
    Sine,
    Square,
    Saw,
}

impl BassInstrument {
    pub const ALL: [BassInstrument; 8] = [
        BassInstrument::AcousticBass,
        BassInstrument::ElectricBassFinger,
        BassInstrument::ElectricBassPick,
        BassInstrument::FretlessBass,
        BassInstrument::SlapBass1,
        BassInstrument::SlapBass2,
        BassInstrument::SynthBass1,
        BassInstrument::SynthBass2,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BassInstrument::AcousticBass => "Acoustic Bass",
            BassInstrument::ElectricBassFinger => "Electric Bass (finger)",
            BassInstrument::ElectricBassPick => "Electric Bass (pick)",
            BassInstrument::FretlessBass => "Fretless Bass",
            BassInstrument::SlapBass1 => "Slap Bass 1",
            BassInstrument::SlapBass2 => "Slap Bass 2",
            BassInstrument::SynthBass1 => "Synth Bass 1",
            BassInstrument::SynthBass2 => "Synth Bass 2",
        }
    }

    /// General MIDI program number.
    pub fn program(self) -> u8 {
        match self {
            BassInstrument::AcousticBass => 32,
            BassInstrument::ElectricBassFinger => 33,
            BassInstrument::ElectricBassPick => 34,
            BassInstrument::FretlessBass => 35,
            BassInstrument::SlapBass1 => 36,
            BassInstrument::SlapBass2 => 37,
            BassInstrument::SynthBass1 => 38,
            BassInstrument::SynthBass2 => 39,
        }
    }

    pub fn from_name(name: &str) -> Result<Self, PreviewError> {
        BassInstrument::ALL
            .iter()
            .copied()
            .find(|instrument| instrument.name() == name)
            .ok_or_else(|| PreviewError::UnknownInstrument {
                name: name.to_string(),
            })
    }

    /// Instrument names in alphabetical order.
    pub fn names() -> Vec<&'static str> {
        let mut names: Vec<&'static str> = BassInstrument::ALL.iter().map(|i| i.name()).collect();
        names.sort_unstable();
        names
    }

    fn waveform(self) -> Waveform {
        match self {
            BassInstrument::AcousticBass | BassInstrument::FretlessBass => Waveform::Sine,
            BassInstrument::ElectricBassFinger
            | BassInstrument::ElectricBassPick
            | BassInstrument::SlapBass1
            | BassInstrument::SlapBass2 => Waveform::Square,
            BassInstrument::SynthBass1 | BassInstrument::SynthBass2 => Waveform::Saw,
        }
    }

    /// Seconds the note takes to decay to silence; plucked basses die away.
    fn decay_seconds(self) -> f32 {
        match self {
            BassInstrument::SlapBass1 | BassInstrument::SlapBass2 => 0.35,
            BassInstrument::ElectricBassPick => 0.6,
            BassInstrument::AcousticBass | BassInstrument::ElectricBassFinger => 0.9,
            _ => f32::INFINITY,
        }
    }
}

impl Default for BassInstrument {
    fn default() -> Self {
        BassInstrument::SynthBass1
    }
}

/// MIDI note number to frequency (A4 = MIDI 69 = 440 Hz).
fn note_to_freq(note: u8) -> f64 {
    440.0 * 2f64.powf((note as f64 - 69.0) / 12.0)
}

/// Render a bassline to mono samples at [`SAMPLE_RATE`].
pub fn render_samples(notes: &[NoteEvent], tempo: u32, instrument: BassInstrument) -> Vec<f32> {
    let sec_per_beat = 60.0 / tempo.max(1) as f32;
    let samples_per_beat = SAMPLE_RATE as f32 * sec_per_beat;

    let end_beat = notes.iter().map(|n| n.end_beat()).fold(0.0, f64::max) as f32;
    let mut mixed = vec![0.0f32; (end_beat * samples_per_beat).ceil() as usize];

    for note in notes {
        let start = (note.beat_position() as f32 * samples_per_beat) as usize;
        let length = (note.duration as f32 * samples_per_beat * ARTICULATION) as usize;
        let voice = render_note(instrument, note_to_freq(note.pitch), length);
        let gain = note.velocity as f32 / 127.0;

        for (offset, sample) in voice.into_iter().enumerate() {
            if let Some(slot) = mixed.get_mut(start + offset) {
                *slot += sample * gain;
            }
        }
    }

    // Normalize the result to prevent distortion
    let peak = mixed.iter().map(|s| s.abs()).fold(0.0, f32::max);
    if peak > 1.0 {
        for sample in &mut mixed {
            *sample /= peak;
        }
    }
    mixed
}

fn render_note(instrument: BassInstrument, freq: f64, length: usize) -> Vec<f32> {
    let hz = dasp_signal::rate(SAMPLE_RATE as f64).const_hz(freq);
    match instrument.waveform() {
        Waveform::Sine => shape(hz.sine(), length, instrument, 0.8),
        Waveform::Square => shape(hz.square(), length, instrument, 0.35),
        Waveform::Saw => shape(hz.saw(), length, instrument, 0.45),
    }
}

/// Pull `length` samples through a short attack, an exponential decay and a
/// linear release over the last tenth of the note.
fn shape<S>(mut signal: S, length: usize, instrument: BassInstrument, level: f32) -> Vec<f32>
where
    S: Signal<Frame = f64>,
{
    let attack = (ATTACK_SECONDS * SAMPLE_RATE as f32).max(1.0);
    let release = (length as f32 * 0.1).max(1.0);
    let decay = instrument.decay_seconds() * SAMPLE_RATE as f32;

    (0..length)
        .map(|i| {
            let t = i as f32;
            let attack_gain = (t / attack).min(1.0);
            let decay_gain = (-t / decay).exp();
            let release_gain = ((length as f32 - t) / release).min(1.0);
            signal.next() as f32 * level * attack_gain * decay_gain * release_gain
        })
        .collect()
}

enum PreviewControl {
    Stop,
}

/// Plays basslines through the default audio device on a background thread.
pub struct Previewer {
    instrument: BassInstrument,
    control: Option<Sender<PreviewControl>>,
    handle: Option<JoinHandle<()>>,
    playing: Arc<AtomicBool>,
}

impl Previewer {
    pub fn new(instrument: BassInstrument) -> Self {
        Previewer {
            instrument,
            control: None,
            handle: None,
            playing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn instrument(&self) -> BassInstrument {
        self.instrument
    }

    pub fn set_instrument(&mut self, instrument: BassInstrument) {
        log::debug!("Set instrument to: {}", instrument.name());
        self.instrument = instrument;
    }

    /// Start playing, replacing whatever is playing now.
    pub fn start(&mut self, notes: &[NoteEvent], tempo: u32) -> Result<(), PreviewError> {
        if notes.is_empty() {
            return Err(PreviewError::EmptyBassline);
        }
        self.stop();

        let samples = render_samples(notes, tempo, self.instrument);
        let (control_tx, control_rx) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let playing = Arc::clone(&self.playing);

        playing.store(true, Ordering::SeqCst);
        let handle = thread::spawn(move || {
            playback_thread(samples, control_rx, ready_tx, &playing);
            playing.store(false, Ordering::SeqCst);
        });

        let opened = ready_rx
            .recv()
            .map_err(|_| PreviewError::Device("playback thread exited".to_string()))
            .and_then(|result| result.map_err(PreviewError::Device));

        if let Err(err) = opened {
            let _ = handle.join();
            log::error!("Playback failed: {}", err);
            return Err(err);
        }

        log::info!(
            "Started preview: {} notes at {} BPM on {}",
            notes.len(),
            tempo,
            self.instrument.name()
        );
        self.control = Some(control_tx);
        self.handle = Some(handle);
        Ok(())
    }

    /// Stop playback if any; does nothing when idle.
    pub fn stop(&mut self) {
        if let Some(control) = self.control.take() {
            let _ = control.send(PreviewControl::Stop);
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Preview thread panicked while stopping");
            } else {
                log::debug!("Stopped playback");
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

impl Default for Previewer {
    fn default() -> Self {
        Previewer::new(BassInstrument::default())
    }
}

impl Drop for Previewer {
    fn drop(&mut self) {
        self.stop();
    }
}

// The output stream is not Send, so it is opened and dropped on this thread.
fn playback_thread(
    samples: Vec<f32>,
    control: Receiver<PreviewControl>,
    ready: Sender<Result<(), String>>,
    playing: &AtomicBool,
) {
    let opened = OutputStream::try_default()
        .map_err(|e| format!("Failed to open audio output: {}", e))
        .and_then(|(stream, handle)| {
            Sink::try_new(&handle)
                .map(|sink| (stream, sink))
                .map_err(|e| format!("Failed to create audio sink: {}", e))
        });

    let (_stream, sink) = match opened {
        Ok(opened) => {
            let _ = ready.send(Ok(()));
            opened
        }
        Err(message) => {
            let _ = ready.send(Err(message));
            return;
        }
    };

    sink.append(SamplesBuffer::new(1, SAMPLE_RATE, samples));

    while playing.load(Ordering::SeqCst) && !sink.empty() {
        match control.try_recv() {
            Ok(PreviewControl::Stop) | Err(TryRecvError::Disconnected) => {
                sink.stop();
                break;
            }
            Err(TryRecvError::Empty) => {}
        }
        // Sleep a bit to reduce CPU usage
        thread::sleep(Duration::from_millis(10));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(pitch: u8, position: u32, duration: f64) -> NoteEvent {
        NoteEvent {
            pitch,
            position,
            duration,
            velocity: 100,
        }
    }

    #[test]
    fn test_instrument_programs() {
        let programs: Vec<u8> = BassInstrument::ALL.iter().map(|i| i.program()).collect();
        assert_eq!(programs, (32..=39).collect::<Vec<u8>>());
        assert_eq!(BassInstrument::default().program(), 38);
    }

    #[test]
    fn test_instrument_lookup() {
        for instrument in BassInstrument::ALL {
            assert_eq!(BassInstrument::from_name(instrument.name()).unwrap(), instrument);
        }
        assert!(matches!(
            BassInstrument::from_name("Tuba"),
            Err(PreviewError::UnknownInstrument { .. })
        ));
        let names = BassInstrument::names();
        assert_eq!(names.len(), 8);
        assert!(names.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_note_to_freq() {
        assert!((note_to_freq(69) - 440.0).abs() < 1e-9);
        assert!((note_to_freq(57) - 220.0).abs() < 1e-9);
        assert!((note_to_freq(36) - 65.406).abs() < 0.01);
    }

    #[test]
    fn test_render_length_follows_tempo() {
        // last note ends at beat 4; at 120 BPM that is 2 seconds
        let notes = [note(36, 0, 1.0), note(40, 12, 1.0)];
        let samples = render_samples(&notes, 120, BassInstrument::SynthBass1);
        assert_eq!(samples.len(), 2 * SAMPLE_RATE as usize);

        let slower = render_samples(&notes, 60, BassInstrument::SynthBass1);
        assert_eq!(slower.len(), 4 * SAMPLE_RATE as usize);
    }

    #[test]
    fn test_render_is_audible_and_bounded() {
        let notes = [note(36, 0, 2.0), note(43, 0, 2.0), note(40, 0, 2.0)];
        for instrument in BassInstrument::ALL {
            let samples = render_samples(&notes, 120, instrument);
            assert!(samples.iter().any(|s| s.abs() > 0.01), "{:?} is silent", instrument);
            assert!(samples.iter().all(|s| s.abs() <= 1.0 + 1e-6));
        }
    }

    #[test]
    fn test_render_silence_between_notes() {
        // gap between beat 0.25 and beat 2
        let notes = [note(36, 0, 0.25), note(36, 8, 0.25)];
        let samples = render_samples(&notes, 120, BassInstrument::SynthBass2);
        let gap_middle = SAMPLE_RATE as usize / 2;
        assert_eq!(samples[gap_middle], 0.0);
    }

    #[test]
    fn test_empty_preview_rejected() {
        let mut previewer = Previewer::default();
        assert!(matches!(previewer.start(&[], 120), Err(PreviewError::EmptyBassline)));
        assert!(!previewer.is_playing());
    }

    #[test]
    fn test_stop_when_idle() {
        let mut previewer = Previewer::default();
        previewer.stop();
        assert!(!previewer.is_playing());
    }
}
