// Input handling for the launcher menu

/// Buttons reported by the input controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    JoystickDown,
    JoystickUp,
    JoystickLeft,
    JoystickRight,
    JoystickPress,
    Accept,
    Back,
    Home,
    Select,
    Start,
    Menu,
}

/// A button edge: `pressed` is false on release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub source: InputSource,
    pub pressed: bool,
}

impl InputEvent {
    pub const fn press(source: InputSource) -> Self {
        Self {
            source,
            pressed: true,
        }
    }

    pub const fn release(source: InputSource) -> Self {
        Self {
            source,
            pressed: false,
        }
    }
}

/// Queue of button events filled by the input controller's task.
pub trait InputQueue {
    /// Wait up to `timeout_ms` for the next event.
    fn receive(&mut self, timeout_ms: u32) -> Option<InputEvent>;
}

/// What an event means to the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Down,
    Up,
    Accept,
    Exit,
}

impl MenuAction {
    /// Map a button event. Releases and unbound buttons map to nothing.
    pub fn from_event(event: InputEvent) -> Option<Self> {
        if !event.pressed {
            return None;
        }
        match event.source {
            InputSource::JoystickDown => Some(Self::Down),
            InputSource::JoystickUp => Some(Self::Up),
            InputSource::Accept
            | InputSource::JoystickPress
            | InputSource::Select
            | InputSource::Start => Some(Self::Accept),
            InputSource::Back | InputSource::Home => Some(Self::Exit),
            InputSource::JoystickLeft | InputSource::JoystickRight | InputSource::Menu => None,
        }
    }
}
