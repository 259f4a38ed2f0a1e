use crate::domain::keybindings::{Action, KeyBindingMap, Profile};
use crate::domain::keys::{AltKey, KeyStroke};

// Profiles bind arrows, Home and End by their CSI form only. Terminal-specific
// alternatives are layered on during resolution.

fn ctrl(letter: char) -> KeyStroke {
    KeyStroke::Ctrl(letter)
}

fn alt(ch: char) -> KeyStroke {
    KeyStroke::Alt(AltKey::Char(ch))
}

fn home() -> KeyStroke {
    KeyStroke::raw(b"\x1b[H")
}

fn end() -> KeyStroke {
    KeyStroke::raw(b"\x1b[F")
}

/// Bindings for the search-mode contexts (Global, Input, Results, Search).
pub fn search_defaults(profile: Profile) -> KeyBindingMap {
    let mut map = KeyBindingMap::new();

    map.bind(Action::Submit, vec![KeyStroke::enter()]);
    map.bind(Action::DeleteBackward, vec![KeyStroke::backspace(), ctrl('h')]);
    map.bind(Action::ToggleWorkflowView, vec![KeyStroke::tab()]);
    map.bind(Action::AddToWorkflow, vec![ctrl('t')]);
    map.bind(Action::SoftCancel, vec![ctrl('g'), KeyStroke::Escape]);
    map.bind(Action::Quit, vec![ctrl('q')]);
    map.bind(Action::MoveToBeginning, vec![ctrl('a'), home()]);
    map.bind(Action::MoveToEnd, vec![ctrl('e'), end()]);
    map.bind(Action::ClearLine, vec![ctrl('u')]);

    match profile {
        Profile::Default => {
            map.bind(Action::MoveUp, vec![ctrl('p'), KeyStroke::up()]);
            map.bind(Action::MoveDown, vec![ctrl('n'), KeyStroke::down()]);
            map.bind(Action::MoveLeft, vec![ctrl('b'), KeyStroke::left()]);
            map.bind(Action::MoveRight, vec![ctrl('f'), KeyStroke::right()]);
            map.bind(Action::MoveWordLeft, vec![KeyStroke::Alt(AltKey::Left)]);
            map.bind(Action::MoveWordRight, vec![KeyStroke::Alt(AltKey::Right)]);
            map.bind(
                Action::DeleteWord,
                vec![ctrl('w'), KeyStroke::Alt(AltKey::Backspace)],
            );
            map.bind(Action::DeleteToEnd, vec![ctrl('k')]);
        }
        Profile::Emacs => {
            map.bind(Action::MoveUp, vec![ctrl('p'), KeyStroke::up()]);
            map.bind(Action::MoveDown, vec![ctrl('n'), KeyStroke::down()]);
            map.bind(Action::MoveLeft, vec![ctrl('b'), KeyStroke::left()]);
            map.bind(Action::MoveRight, vec![ctrl('f'), KeyStroke::right()]);
            map.bind(
                Action::MoveWordLeft,
                vec![alt('b'), KeyStroke::Alt(AltKey::Left)],
            );
            map.bind(
                Action::MoveWordRight,
                vec![alt('f'), KeyStroke::Alt(AltKey::Right)],
            );
            map.bind(
                Action::DeleteWord,
                vec![KeyStroke::Alt(AltKey::Backspace), ctrl('w')],
            );
            map.bind(Action::DeleteToEnd, vec![ctrl('k')]);
            map.bind(Action::AddToWorkflow, vec![ctrl('t'), alt('t')]);
        }
        Profile::Readline => {
            map.bind(Action::MoveUp, vec![ctrl('p'), KeyStroke::up()]);
            map.bind(Action::MoveDown, vec![ctrl('n'), KeyStroke::down()]);
            map.bind(Action::MoveLeft, vec![ctrl('b'), KeyStroke::left()]);
            map.bind(Action::MoveRight, vec![ctrl('f'), KeyStroke::right()]);
            map.bind(Action::MoveWordLeft, vec![alt('b')]);
            map.bind(Action::MoveWordRight, vec![alt('f')]);
            map.bind(
                Action::DeleteWord,
                vec![ctrl('w'), KeyStroke::Alt(AltKey::Backspace)],
            );
            map.bind(Action::DeleteToEnd, vec![ctrl('k')]);
            map.bind(Action::ClearLine, vec![ctrl('u'), ctrl('x')]);
        }
        Profile::Vi => {
            map.bind(Action::MoveUp, vec![ctrl('k'), ctrl('p'), KeyStroke::up()]);
            map.bind(Action::MoveDown, vec![ctrl('j'), ctrl('n'), KeyStroke::down()]);
            map.bind(Action::MoveLeft, vec![KeyStroke::left()]);
            map.bind(Action::MoveRight, vec![KeyStroke::right()]);
            map.bind(
                Action::MoveWordLeft,
                vec![KeyStroke::Alt(AltKey::Left), alt('b')],
            );
            map.bind(
                Action::MoveWordRight,
                vec![KeyStroke::Alt(AltKey::Right), alt('w')],
            );
            map.bind(Action::DeleteWord, vec![ctrl('w')]);
            map.bind(Action::DeleteToEnd, vec![ctrl('d')]);
        }
    }

    map
}

/// Bindings for the workflow contexts. Plain letters are safe here because
/// workflow mode has no text input.
pub fn workflow_defaults(profile: Profile) -> KeyBindingMap {
    let mut map = KeyBindingMap::new();

    map.bind(Action::Submit, vec![KeyStroke::enter()]);
    map.bind(Action::ToggleWorkflowView, vec![KeyStroke::tab()]);
    map.bind(Action::SoftCancel, vec![ctrl('g'), KeyStroke::Escape]);
    map.bind(Action::Quit, vec![ctrl('q')]);
    map.bind(Action::WorkflowCreate, vec![KeyStroke::Char('n')]);
    map.bind(Action::WorkflowDelete, vec![KeyStroke::Char('d')]);
    map.bind(Action::WorkflowClear, vec![KeyStroke::Char('c')]);
    map.bind(Action::WorkflowClone, vec![KeyStroke::Char('y')]);
    map.bind(Action::WorkflowExecute, vec![KeyStroke::Char('x')]);
    map.bind(Action::WorkflowSelect, vec![KeyStroke::Char('s')]);
    map.bind(
        Action::WorkflowRemoveStep,
        vec![KeyStroke::Char('r'), KeyStroke::backspace()],
    );
    map.bind(Action::WorkflowCancel, vec![KeyStroke::Char('q')]);

    let mut up = vec![ctrl('p'), KeyStroke::up()];
    let mut down = vec![ctrl('n'), KeyStroke::down()];
    if profile == Profile::Vi {
        up.insert(0, KeyStroke::Char('k'));
        down.insert(0, KeyStroke::Char('j'));
    }
    map.bind(Action::MoveUp, up);
    map.bind(Action::MoveDown, down);

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILES: [Profile; 4] = [
        Profile::Default,
        Profile::Emacs,
        Profile::Vi,
        Profile::Readline,
    ];

    #[test]
    fn every_profile_binds_navigation_and_recovery() {
        for profile in PROFILES {
            let search = search_defaults(profile);
            for action in [
                Action::MoveUp,
                Action::MoveDown,
                Action::Submit,
                Action::SoftCancel,
                Action::ToggleWorkflowView,
                Action::DeleteWord,
            ] {
                assert!(
                    !search.keys(action).is_empty(),
                    "{} leaves {} unbound",
                    profile.name(),
                    action
                );
            }
            assert!(search.keys(Action::WorkflowCreate).is_empty());

            let workflow = workflow_defaults(profile);
            assert!(!workflow.keys(Action::WorkflowCreate).is_empty());
            assert!(workflow.keys(Action::ClearLine).is_empty());
        }
    }

    #[test]
    fn no_stroke_is_shared_within_a_context() {
        for profile in PROFILES {
            for map in [search_defaults(profile), workflow_defaults(profile)] {
                let mut seen: Vec<(&KeyStroke, Action)> = Vec::new();
                for action in Action::ALL {
                    for stroke in map.keys(action) {
                        if let Some((_, other)) = seen.iter().find(|(s, _)| *s == stroke) {
                            panic!(
                                "{}: {stroke} bound to both {other} and {action}",
                                profile.name()
                            );
                        }
                        seen.push((stroke, action));
                    }
                }
            }
        }
    }

    #[test]
    fn vi_uses_letters_in_workflow_lists() {
        let map = workflow_defaults(Profile::Vi);
        assert_eq!(map.action_for(&KeyStroke::Char('j')), Some(Action::MoveDown));
        assert_eq!(
            workflow_defaults(Profile::Default).action_for(&KeyStroke::Char('j')),
            None
        );
    }
}
