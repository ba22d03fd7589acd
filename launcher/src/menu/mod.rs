// App launcher menu

pub mod input;
pub mod renderer;
pub mod state;

pub use input::{InputEvent, InputQueue, InputSource, MenuAction};
pub use renderer::{MenuRenderer, TextStyle, TextSurface};
pub use state::{LauncherMenu, MenuEntry, MenuState};

use crate::boot::{boot_package, BootTarget};
use crate::config::LauncherConfig;

impl LauncherMenu {
    /// Cooperative menu loop: wait briefly for input, apply it, redraw on
    /// change. Confirming an entry hands off to `target` and never returns;
    /// back/home return to the caller.
    pub fn run<Q, S, T>(&mut self, queue: &mut Q, surface: &mut S, target: &mut T, config: &LauncherConfig)
    where
        Q: InputQueue + ?Sized,
        S: TextSurface + ?Sized,
        T: BootTarget + ?Sized,
    {
        let mut render = true;

        loop {
            if let Some(action) = queue
                .receive(config.poll_timeout_ms)
                .and_then(MenuAction::from_event)
            {
                render |= self.apply(action);
            }

            if render {
                MenuRenderer::render(&mut *surface, config.title, &self.entries, self.selected);
                render = false;
            }

            match self.state {
                MenuState::Confirmed(handle) => boot_package(target, handle),
                MenuState::Exiting => {
                    log::info!("[MENU] {}", self.state.name());
                    return;
                }
                _ => {}
            }
        }
    }
}
