use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction as LayoutDirection, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Padding, Paragraph},
    Frame, Terminal,
};

use std::collections::HashMap;
use std::io;
use std::sync::OnceLock;
use std::time::Duration;

use crate::config::{self, BAR_RANGE, DENSITY_RANGE, TEMPO_RANGE};
use crate::dice::GenerationParameters;
use crate::preview::BassInstrument;
use crate::{rhythms, scales};

/// Status lines kept for the log panel.
const STATUS_HISTORY: usize = 50;

const DENSITY_STEP: f64 = 0.05;

#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub enum InputId {
    RootNote,
    Scale,
    Genre,
    Tempo,
    Bars,
    Density,
    Instrument,
    Generate,
    Randomize,
    Preview,
    Quit,
}

const FIELDS: [InputId; 7] = [
    InputId::RootNote,
    InputId::Scale,
    InputId::Genre,
    InputId::Tempo,
    InputId::Bars,
    InputId::Density,
    InputId::Instrument,
];

const BUTTONS: [InputId; 4] = [
    InputId::Generate,
    InputId::Randomize,
    InputId::Preview,
    InputId::Quit,
];

#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
enum Direction {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug)]
struct InputNode {
    neighbors: HashMap<Direction, InputId>,
}

static INPUT_GRAPH: OnceLock<HashMap<InputId, InputNode>> = OnceLock::new();

// Fields form a column; the buttons form a row under it. Left/Right on a
// field changes its value instead of moving, so fields only have Up/Down.
fn get_input_graph() -> &'static HashMap<InputId, InputNode> {
    INPUT_GRAPH.get_or_init(|| {
        let mut graph = HashMap::new();

        for (i, &field) in FIELDS.iter().enumerate() {
            let mut neighbors = HashMap::new();
            if i > 0 {
                neighbors.insert(Direction::Up, FIELDS[i - 1]);
            }
            let below = FIELDS.get(i + 1).copied().unwrap_or(InputId::Generate);
            neighbors.insert(Direction::Down, below);
            graph.insert(field, InputNode { neighbors });
        }

        for (i, &button) in BUTTONS.iter().enumerate() {
            let left = BUTTONS[(i + BUTTONS.len() - 1) % BUTTONS.len()];
            let right = BUTTONS[(i + 1) % BUTTONS.len()];
            graph.insert(
                button,
                InputNode {
                    neighbors: HashMap::from([
                        (Direction::Up, InputId::Instrument),
                        (Direction::Left, left),
                        (Direction::Right, right),
                    ]),
                },
            );
        }

        graph
    })
}

fn next_focus(current: InputId, direction: Direction) -> InputId {
    get_input_graph()
        .get(&current)
        .and_then(|node| node.neighbors.get(&direction).copied())
        .unwrap_or(current) // Stay put when there is no neighbour that way
}

/// Things the main loop has to act on.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UserAction {
    Quit,
    Generate,
    Randomize,
    TogglePreview,
    NoOp,
}

/// Current form values and status shown by the UI.
#[derive(Debug, Clone)]
pub struct AppState {
    pub root_note: String,
    pub scale_type: String,
    pub genre: String,
    pub tempo: u32,
    pub bars: u32,
    pub note_density: f64,
    pub instrument: BassInstrument,
    pub generating: bool,
    pub previewing: bool,
    pub status: Vec<String>,
}

impl Default for AppState {
    fn default() -> Self {
        AppState {
            root_note: config::DEFAULT_ROOT_NOTE.to_string(),
            scale_type: config::DEFAULT_SCALE.to_string(),
            genre: config::DEFAULT_GENRE.to_string(),
            tempo: config::DEFAULT_TEMPO,
            bars: config::DEFAULT_BARS,
            note_density: config::DEFAULT_DENSITY,
            instrument: BassInstrument::from_name(config::DEFAULT_INSTRUMENT).unwrap_or_default(),
            generating: false,
            previewing: false,
            status: Vec::new(),
        }
    }
}

impl AppState {
    pub fn parameters(&self) -> GenerationParameters {
        GenerationParameters {
            root_note: self.root_note.clone(),
            scale_type: self.scale_type.clone(),
            genre: self.genre.clone(),
            tempo: self.tempo,
            bars: self.bars,
            note_density: self.note_density,
        }
    }

    pub fn apply_parameters(&mut self, params: &GenerationParameters) {
        self.root_note = params.root_note.clone();
        self.scale_type = params.scale_type.clone();
        self.genre = params.genre.clone();
        self.tempo = params.tempo;
        self.bars = params.bars;
        self.note_density = params.note_density;
    }

    pub fn push_status(&mut self, message: impl Into<String>) {
        self.status.push(message.into());
        if self.status.len() > STATUS_HISTORY {
            let excess = self.status.len() - STATUS_HISTORY;
            self.status.drain(..excess);
        }
    }

    /// Left/Right on a field: step through its options or nudge its number.
    fn adjust(&mut self, field: InputId, forward: bool) {
        match field {
            InputId::RootNote => {
                self.root_note = cycle(&scales::root_note_names(), &self.root_note, forward)
            }
            InputId::Scale => {
                self.scale_type = cycle(&scales::scale_names(), &self.scale_type, forward)
            }
            InputId::Genre => self.genre = cycle(&rhythms::genre_names(), &self.genre, forward),
            InputId::Instrument => {
                let name = cycle(&BassInstrument::names(), self.instrument.name(), forward);
                self.instrument = BassInstrument::from_name(&name).unwrap_or(self.instrument);
            }
            InputId::Tempo => self.tempo = nudge(self.tempo, forward, *TEMPO_RANGE.start(), *TEMPO_RANGE.end()),
            InputId::Bars => self.bars = nudge(self.bars, forward, *BAR_RANGE.start(), *BAR_RANGE.end()),
            InputId::Density => {
                let step = if forward { DENSITY_STEP } else { -DENSITY_STEP };
                let next = ((self.note_density + step) * 100.0).round() / 100.0;
                self.note_density = next.clamp(*DENSITY_RANGE.start(), *DENSITY_RANGE.end());
            }
            _ => {}
        }
    }
}

fn cycle(options: &[&str], current: &str, forward: bool) -> String {
    let len = options.len();
    if len == 0 {
        return current.to_string();
    }
    let index = options.iter().position(|&o| o == current).unwrap_or(0);
    let next = if forward { (index + 1) % len } else { (index + len - 1) % len };
    options[next].to_string()
}

fn nudge(value: u32, forward: bool, min: u32, max: u32) -> u32 {
    if forward {
        (value + 1).min(max)
    } else {
        value.saturating_sub(1).max(min)
    }
}

// TUI struct represents the terminal user interface, parameterized by the type of backend (B)
pub struct Tui<B: Backend> {
    terminal: Terminal<B>,
    current_focus: InputId,
    state: AppState,
}

impl<B: Backend> Tui<B> {
    pub fn new(backend: B) -> Result<Self, Box<dyn std::error::Error>> {
        let terminal = Terminal::new(backend)?;
        Ok(Self {
            terminal,
            current_focus: InputId::RootNote,
            state: AppState::default(),
        })
    }

    // Raw mode and the alternate screen for the session
    pub fn setup(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        self.terminal.clear()?;
        Ok(())
    }

    pub fn teardown(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        disable_raw_mode()?;
        execute!(io::stdout(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut AppState {
        &mut self.state
    }

    pub fn get_current_app_state(&self) -> AppState {
        self.state.clone()
    }

    pub fn draw(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let focus = self.current_focus;
        let state = &self.state;
        self.terminal.draw(|f| render(f, focus, state))?;
        Ok(())
    }

    /// Wait up to `timeout` for a key and act on it.
    pub fn handle_input(&mut self, timeout: Duration) -> io::Result<UserAction> {
        if !event::poll(timeout)? {
            return Ok(UserAction::NoOp);
        }
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => Ok(self.handle_key(key)),
            _ => Ok(UserAction::NoOp),
        }
    }

    fn handle_key(&mut self, KeyEvent { code, .. }: KeyEvent) -> UserAction {
        let on_field = FIELDS.contains(&self.current_focus);
        match code {
            KeyCode::Char('q') | KeyCode::Esc => UserAction::Quit,
            KeyCode::Char('g') => UserAction::Generate,
            KeyCode::Char('r') => UserAction::Randomize,
            KeyCode::Char('p') | KeyCode::Char(' ') => UserAction::TogglePreview,
            KeyCode::Up | KeyCode::Char('k') => {
                self.move_focus(Direction::Up);
                UserAction::NoOp
            }
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Tab => {
                self.move_focus(Direction::Down);
                UserAction::NoOp
            }
            KeyCode::Left | KeyCode::Char('h') => {
                if on_field {
                    self.state.adjust(self.current_focus, false);
                } else {
                    self.move_focus(Direction::Left);
                }
                UserAction::NoOp
            }
            KeyCode::Right | KeyCode::Char('l') => {
                if on_field {
                    self.state.adjust(self.current_focus, true);
                } else {
                    self.move_focus(Direction::Right);
                }
                UserAction::NoOp
            }
            KeyCode::Enter => match self.current_focus {
                InputId::Generate => UserAction::Generate,
                InputId::Randomize => UserAction::Randomize,
                InputId::Preview => UserAction::TogglePreview,
                InputId::Quit => UserAction::Quit,
                _ => {
                    self.move_focus(Direction::Down);
                    UserAction::NoOp
                }
            },
            _ => UserAction::NoOp,
        }
    }

    fn move_focus(&mut self, direction: Direction) {
        self.current_focus = next_focus(self.current_focus, direction)
    }
}

fn render(f: &mut Frame, focus: InputId, state: &AppState) {
    let area = f.size();
    let rows = Layout::default()
        .direction(LayoutDirection::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(FIELDS.len() as u16 + 2),
            Constraint::Length(3),
            Constraint::Min(3),
        ])
        .split(area);

    let title = Paragraph::new(Line::from(Span::styled(
        "♪ ♫ ♪  Bassline Generator  ♪ ♫ ♪",
        Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
    )))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::BOTTOM));
    f.render_widget(title, rows[0]);

    let fields: Vec<Line> = FIELDS
        .iter()
        .map(|&field| {
            let (label, value) = field_text(field, state);
            let focused = field == focus;
            let marker = if focused { "▶ " } else { "  " };
            let value_style = if focused {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let arrows = if focused { format!("◀ {} ▶", value) } else { value };
            Line::from(vec![
                Span::raw(marker),
                Span::styled(format!("{:<14}", label), Style::default().fg(Color::Cyan)),
                Span::styled(arrows, value_style),
            ])
        })
        .collect();
    let params = Paragraph::new(fields).block(
        Block::default()
            .title("Musical Parameters")
            .borders(Borders::ALL)
            .padding(Padding::horizontal(1)),
    );
    f.render_widget(params, rows[1]);

    let buttons: Vec<Span> = BUTTONS
        .iter()
        .flat_map(|&button| {
            let style = if button == focus {
                Style::default().fg(Color::Black).bg(Color::Yellow)
            } else {
                Style::default()
            };
            [Span::styled(button_label(button, state), style), Span::raw("  ")]
        })
        .collect();
    let controls = Paragraph::new(Line::from(buttons))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(controls, rows[2]);

    let inner_width = rows[3].width.saturating_sub(2).max(1) as usize;
    let visible = rows[3].height.saturating_sub(2) as usize;
    let mut lines: Vec<Line> = state
        .status
        .iter()
        .flat_map(|message| {
            textwrap::wrap(message, inner_width)
                .into_iter()
                .map(|part| Line::from(part.into_owned()))
                .collect::<Vec<_>>()
        })
        .collect();
    if lines.len() > visible {
        lines.drain(..lines.len() - visible);
    }
    let status = Paragraph::new(lines).block(Block::default().title("Status").borders(Borders::ALL));
    f.render_widget(status, rows[3]);
}

fn field_text(field: InputId, state: &AppState) -> (&'static str, String) {
    match field {
        InputId::RootNote => ("Root Note:", state.root_note.clone()),
        InputId::Scale => ("Scale Type:", scales::display_scale_name(&state.scale_type)),
        InputId::Genre => ("Genre:", state.genre.clone()),
        InputId::Tempo => ("Tempo (BPM):", state.tempo.to_string()),
        InputId::Bars => ("Bars:", state.bars.to_string()),
        InputId::Density => ("Note Density:", format!("{:.2}", state.note_density)),
        InputId::Instrument => ("Instrument:", state.instrument.name().to_string()),
        _ => ("", String::new()),
    }
}

fn button_label(button: InputId, state: &AppState) -> String {
    match button {
        InputId::Generate if state.generating => "[… Generating]".to_string(),
        InputId::Generate => "[♫ Generate]".to_string(),
        InputId::Randomize => "[🎲 Random Parameters]".to_string(),
        InputId::Preview if state.previewing => "[■ Stop Preview]".to_string(),
        InputId::Preview => "[▶ Preview]".to_string(),
        InputId::Quit => "[Quit]".to_string(),
        _ => String::new(),
    }
}
