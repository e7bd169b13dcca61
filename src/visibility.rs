//! Host visibility signal (foreground/background), injected as a capability
//! instead of consulted as an ambient global so pollers stay testable.

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

impl Visibility {
    pub fn is_hidden(self) -> bool {
        self == Visibility::Hidden
    }
}

/// Create a visibility signal. The host keeps the sender and flips it when
/// the display moves between foreground and background.
pub fn channel(initial: Visibility) -> (watch::Sender<Visibility>, watch::Receiver<Visibility>) {
    watch::channel(initial)
}
