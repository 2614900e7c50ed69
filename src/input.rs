use crate::app::InputMode;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    Down,
    Up,
    PageDown,
    PageUp,
    Top,
    Bottom,
    GPrefix,
    ToggleHelp,
    StartCommand,
    StartFilter,
    Describe,
    Delete,
    Rollback,
    Logs,
    ToggleMark,
    ClearMarks,
    /// Column offset relative to NAME; `-1` is the last column, `-2` NAMESPACE.
    SortColumn(isize),
    SortKey(char),
    SortInvert,
    EnterResource,
    Back,
    SubmitInput,
    CancelInput,
    Backspace,
    InputChar(char),
    ConfirmYes,
    ConfirmNo,
}

pub fn map_key(mode: InputMode, key: KeyEvent) -> Option<Action> {
    match mode {
        InputMode::Normal => map_normal_mode_key(key),
        InputMode::Command | InputMode::Filter => map_input_mode_key(key),
    }
}

fn map_normal_mode_key(key: KeyEvent) -> Option<Action> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => Some(Action::Quit),
        KeyCode::Char('d') if ctrl => Some(Action::Delete),
        KeyCode::Char('b') if ctrl => Some(Action::Rollback),
        KeyCode::Char('f') if ctrl => Some(Action::PageDown),
        KeyCode::Char('u') if ctrl => Some(Action::PageUp),
        // Terminals report Ctrl-\ either as the backslash or as Ctrl-4.
        KeyCode::Char('\\') | KeyCode::Char('4') if ctrl => Some(Action::ClearMarks),
        KeyCode::Char(_) if ctrl => None,
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('j') | KeyCode::Down => Some(Action::Down),
        KeyCode::Char('k') | KeyCode::Up => Some(Action::Up),
        KeyCode::PageDown => Some(Action::PageDown),
        KeyCode::PageUp => Some(Action::PageUp),
        KeyCode::Char('g') => Some(Action::GPrefix),
        KeyCode::Home => Some(Action::Top),
        KeyCode::Char('G') | KeyCode::End => Some(Action::Bottom),
        KeyCode::Char('?') => Some(Action::ToggleHelp),
        KeyCode::Char(':') => Some(Action::StartCommand),
        KeyCode::Char('/') => Some(Action::StartFilter),
        KeyCode::Char('d') => Some(Action::Describe),
        KeyCode::Char('l') => Some(Action::Logs),
        KeyCode::Char(' ') => Some(Action::ToggleMark),
        KeyCode::Char('y') => Some(Action::ConfirmYes),
        KeyCode::Char('n') => Some(Action::ConfirmNo),
        KeyCode::Char('N') => Some(Action::SortColumn(0)),
        KeyCode::Char('A') => Some(Action::SortColumn(-1)),
        KeyCode::Char('P') => Some(Action::SortColumn(-2)),
        KeyCode::Char('I') => Some(Action::SortInvert),
        KeyCode::Char(c) if c.is_ascii_uppercase() => Some(Action::SortKey(c)),
        KeyCode::Enter => Some(Action::EnterResource),
        KeyCode::Esc => Some(Action::Back),
        _ => None,
    }
}

fn map_input_mode_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Esc => Some(Action::CancelInput),
        KeyCode::Enter => Some(Action::SubmitInput),
        KeyCode::Backspace => Some(Action::Backspace),
        KeyCode::Char(c) if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT => {
            Some(Action::InputChar(c))
        }
        _ => None,
    }
}
