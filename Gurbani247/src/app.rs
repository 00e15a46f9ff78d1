//! Screen state and key bindings

use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use gbradio::PlaybackState;
use rand::Rng;

use crate::visualizer::Visualizer;

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Toggle,
    Quit,
    None,
}

/// Everything the screen shows, fed from the session observables.
#[derive(Debug)]
pub struct App {
    title: String,
    state: PlaybackState,
    visualizer: Visualizer,
    spinner: usize,
}

impl App {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            state: PlaybackState::Idle,
            visualizer: Visualizer::new(),
            spinner: 0,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn visualizer(&self) -> &Visualizer {
        &self.visualizer
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_state<R: Rng + ?Sized>(&mut self, state: PlaybackState, now: Instant, rng: &mut R) {
        self.state = state;
        self.visualizer
            .set_playing(state == PlaybackState::Playing, now, rng);
    }

    pub fn on_tick(&mut self) {
        if self.state == PlaybackState::Loading {
            self.spinner = (self.spinner + 1) % SPINNER.len();
        }
    }

    /// Text of the play/pause button.
    pub fn button_label(&self) -> String {
        match self.state {
            PlaybackState::Loading => format!("{} Loading", SPINNER[self.spinner]),
            PlaybackState::Playing => "Pause".to_string(),
            PlaybackState::Idle | PlaybackState::Paused => "Play".to_string(),
        }
    }

    pub fn handle_key(&self, key: KeyEvent) -> Action {
        if key.kind != KeyEventKind::Press {
            return Action::None;
        }

        match key.code {
            KeyCode::Char(' ') | KeyCode::Enter => Action::Toggle,
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Action::Quit,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,
            _ => Action::None,
        }
    }
}
