use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::InputMode;
use crate::kinds::ResourceKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    Up,
    Down,
    PageUp,
    PageDown,
    Top,
    Bottom,
    SwitchKind(ResourceKind),
    OpenNamespaces,
    OpenMenu,
    ShowYaml,
    EditResource,
    DeleteRow,
    DeleteAllRows,
    Refresh,
    MenuAccept,
    ConfirmYes,
    ConfirmNo,
    InputChar(char),
    Backspace,
    NextField,
    Submit,
    Cancel,
}

pub fn map_key(mode: InputMode, key: KeyEvent) -> Option<Action> {
    match mode {
        InputMode::Normal => map_normal_key(key),
        InputMode::Menu => map_menu_key(key),
        InputMode::Confirm => map_confirm_key(key),
        InputMode::Login | InputMode::Rescale => map_input_key(key),
        InputMode::Report => map_report_key(key),
        InputMode::Waiting => None,
    }
}

fn map_normal_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('j') if key.modifiers.is_empty() => Some(Action::Down),
        KeyCode::Down => Some(Action::Down),
        KeyCode::Char('k') if key.modifiers.is_empty() => Some(Action::Up),
        KeyCode::Up => Some(Action::Up),
        KeyCode::PageDown => Some(Action::PageDown),
        KeyCode::PageUp => Some(Action::PageUp),
        KeyCode::Char('g') | KeyCode::Home => Some(Action::Top),
        KeyCode::Char('G') | KeyCode::End => Some(Action::Bottom),
        KeyCode::Char('p') | KeyCode::Char('1') => Some(Action::SwitchKind(ResourceKind::Pods)),
        KeyCode::Char('s') | KeyCode::Char('2') => {
            Some(Action::SwitchKind(ResourceKind::Services))
        }
        KeyCode::Char('d') | KeyCode::Char('3') => {
            Some(Action::SwitchKind(ResourceKind::Deployments))
        }
        KeyCode::Char('c') | KeyCode::Char('4') => {
            Some(Action::SwitchKind(ResourceKind::ConfigMaps))
        }
        KeyCode::Char('5') => Some(Action::SwitchKind(ResourceKind::Nodes)),
        KeyCode::Char('n') => Some(Action::OpenNamespaces),
        KeyCode::Char('y') => Some(Action::ShowYaml),
        KeyCode::Char('e') => Some(Action::EditResource),
        KeyCode::Delete if key.modifiers.contains(KeyModifiers::SHIFT) => {
            Some(Action::DeleteAllRows)
        }
        KeyCode::Delete => Some(Action::DeleteRow),
        KeyCode::Char('r') | KeyCode::F(5) => Some(Action::Refresh),
        KeyCode::Enter => Some(Action::OpenMenu),
        _ => None,
    }
}

fn map_menu_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Down => Some(Action::Down),
        KeyCode::Up => Some(Action::Up),
        KeyCode::Enter => Some(Action::MenuAccept),
        KeyCode::Esc => Some(Action::Cancel),
        // Anything printable feeds the prefix search.
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Action::InputChar(c))
        }
        _ => None,
    }
}

fn map_confirm_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => Some(Action::ConfirmYes),
        KeyCode::Char('n') | KeyCode::Char('N') => Some(Action::ConfirmNo),
        KeyCode::Esc => Some(Action::ConfirmNo),
        _ => None,
    }
}

fn map_input_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Enter => Some(Action::Submit),
        KeyCode::Esc => Some(Action::Cancel),
        KeyCode::Backspace => Some(Action::Backspace),
        KeyCode::Tab | KeyCode::Down => Some(Action::NextField),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Action::InputChar(c))
        }
        _ => None,
    }
}

fn map_report_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Enter | KeyCode::Esc | KeyCode::Char('q') => Some(Action::Cancel),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{Action, map_key};
    use crate::app::InputMode;
    use crate::kinds::ResourceKind;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn kind_switch_keys_cover_all_top_level_kinds() {
        assert_eq!(
            map_key(InputMode::Normal, key(KeyCode::Char('p'))),
            Some(Action::SwitchKind(ResourceKind::Pods))
        );
        assert_eq!(
            map_key(InputMode::Normal, key(KeyCode::Char('s'))),
            Some(Action::SwitchKind(ResourceKind::Services))
        );
        assert_eq!(
            map_key(InputMode::Normal, key(KeyCode::Char('d'))),
            Some(Action::SwitchKind(ResourceKind::Deployments))
        );
        assert_eq!(
            map_key(InputMode::Normal, key(KeyCode::Char('c'))),
            Some(Action::SwitchKind(ResourceKind::ConfigMaps))
        );
        assert_eq!(
            map_key(InputMode::Normal, key(KeyCode::Char('5'))),
            Some(Action::SwitchKind(ResourceKind::Nodes))
        );
    }

    #[test]
    fn delete_distinguishes_single_from_bulk() {
        assert_eq!(
            map_key(InputMode::Normal, key(KeyCode::Delete)),
            Some(Action::DeleteRow)
        );
        assert_eq!(
            map_key(
                InputMode::Normal,
                KeyEvent::new(KeyCode::Delete, KeyModifiers::SHIFT)
            ),
            Some(Action::DeleteAllRows)
        );
    }

    #[test]
    fn menu_chars_feed_the_search() {
        assert_eq!(
            map_key(InputMode::Menu, key(KeyCode::Char('r'))),
            Some(Action::InputChar('r'))
        );
        assert_eq!(
            map_key(InputMode::Menu, key(KeyCode::Enter)),
            Some(Action::MenuAccept)
        );
    }

    #[test]
    fn waiting_swallows_all_input() {
        assert_eq!(map_key(InputMode::Waiting, key(KeyCode::Char('q'))), None);
        assert_eq!(map_key(InputMode::Waiting, key(KeyCode::Enter)), None);
    }

    #[test]
    fn escape_declines_a_confirmation() {
        assert_eq!(
            map_key(InputMode::Confirm, key(KeyCode::Esc)),
            Some(Action::ConfirmNo)
        );
    }
}
