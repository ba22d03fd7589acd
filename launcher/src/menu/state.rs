// Launcher menu state
use alloc::string::String;
use alloc::vec::Vec;
use embedded_storage::nor_flash::NorFlash;
use launchpad_core::{Handle, PackageInfo, PackageStore};

use super::input::MenuAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    /// Entries are being collected from the store
    Building,
    /// List shown, cursor not moved yet
    Idle,
    /// Cursor moved at least once
    Navigating,
    /// User picked a package; the handoff follows
    Confirmed(Handle),
    /// Menu left; entries dropped
    Exiting,
}

impl MenuState {
    /// Human-readable name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Building => "Building",
            Self::Idle => "Idle",
            Self::Navigating => "Navigating",
            Self::Confirmed(_) => "Confirmed",
            Self::Exiting => "Exiting",
        }
    }

    /// The loop stops in these states.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed(_) | Self::Exiting)
    }
}

/// One selectable line of the menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub handle: Handle,
    pub label: String,
}

impl MenuEntry {
    /// Entry for a package: its title, or its name when it has none.
    pub fn from_info(info: &PackageInfo<'_>) -> Self {
        let label = if info.title.is_empty() {
            info.name
        } else {
            info.title
        };
        Self {
            handle: info.handle,
            label: label.into(),
        }
    }
}

pub struct LauncherMenu {
    pub(super) entries: Vec<MenuEntry>,
    pub(super) selected: usize,
    pub(super) state: MenuState,
}

impl LauncherMenu {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            selected: 0,
            state: MenuState::Building,
        }
    }

    /// Collect the installed packages in store order.
    pub fn build<F: NorFlash>(store: &PackageStore<F>) -> Self {
        let mut menu = Self::new();
        menu.entries = store
            .enumerate()
            .filter(|info| info.installed)
            .map(|info| MenuEntry::from_info(&info))
            .collect();
        menu.state = MenuState::Idle;
        log::info!("[MENU] {} apps", menu.entries.len());
        menu
    }

    pub fn entries(&self) -> &[MenuEntry] {
        &self.entries
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn state(&self) -> MenuState {
        self.state
    }

    pub fn selected_entry(&self) -> Option<&MenuEntry> {
        self.entries.get(self.selected)
    }

    /// Apply one action. Returns true when the display needs a redraw.
    pub fn apply(&mut self, action: MenuAction) -> bool {
        match action {
            MenuAction::Down => {
                self.state = MenuState::Navigating;
                if self.selected + 1 < self.entries.len() {
                    self.selected += 1;
                    return true;
                }
                false
            }
            MenuAction::Up => {
                self.state = MenuState::Navigating;
                if self.selected > 0 {
                    self.selected -= 1;
                    return true;
                }
                false
            }
            MenuAction::Accept => {
                // Nothing to start on an empty list
                if let Some(entry) = self.selected_entry() {
                    let state = MenuState::Confirmed(entry.handle);
                    log::info!("[MENU] {} '{}' ({})", state.name(), entry.label, entry.handle);
                    self.state = state;
                }
                false
            }
            MenuAction::Exit => {
                self.state = MenuState::Exiting;
                self.entries = Vec::new();
                self.selected = 0;
                false
            }
        }
    }
}

impl Default for LauncherMenu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    fn menu_with(n: u8) -> LauncherMenu {
        let mut menu = LauncherMenu::new();
        menu.entries = (0..n)
            .map(|i| MenuEntry {
                handle: Handle::new(i),
                label: std::format!("app {}", i),
            })
            .collect();
        menu.state = MenuState::Idle;
        menu
    }

    #[test]
    fn test_down_stops_at_last_entry() {
        let mut menu = menu_with(3);
        for _ in 0..10 {
            menu.apply(MenuAction::Down);
        }
        assert_eq!(menu.selected(), 2);
        assert_eq!(menu.state(), MenuState::Navigating);
    }

    #[test]
    fn test_up_stays_at_first_entry() {
        let mut menu = menu_with(3);
        assert!(!menu.apply(MenuAction::Up));
        assert_eq!(menu.selected(), 0);
        assert!(menu.apply(MenuAction::Down));
        assert!(menu.apply(MenuAction::Up));
        assert_eq!(menu.selected(), 0);
    }

    #[test]
    fn test_accept_confirms_selected_handle() {
        let mut menu = menu_with(3);
        menu.apply(MenuAction::Down);
        menu.apply(MenuAction::Accept);
        assert_eq!(menu.state(), MenuState::Confirmed(Handle::new(1)));
    }

    #[test]
    fn test_accept_on_empty_list_does_nothing() {
        let mut menu = menu_with(0);
        menu.apply(MenuAction::Accept);
        assert_eq!(menu.state(), MenuState::Idle);
        menu.apply(MenuAction::Down);
        assert_eq!(menu.selected(), 0);
    }

    #[test]
    fn test_exit_drops_entries() {
        let mut menu = menu_with(2);
        menu.apply(MenuAction::Exit);
        assert_eq!(menu.state(), MenuState::Exiting);
        assert!(menu.state().is_terminal());
        assert!(menu.entries().is_empty());
    }

    #[test]
    fn test_label_falls_back_to_name() {
        let info = PackageInfo {
            handle: Handle::new(4),
            name: "snake",
            title: "",
            version: 1,
            size: 10,
            installed: true,
        };
        assert_eq!(MenuEntry::from_info(&info).label, "snake".to_string());

        let titled = PackageInfo { title: "Snake!", ..info };
        assert_eq!(MenuEntry::from_info(&titled).label, "Snake!");
    }
}
