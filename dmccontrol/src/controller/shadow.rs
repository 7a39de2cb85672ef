/// Local view of what the controller believes the renderer is doing.
///
/// Only the event dispatcher thread changes it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LocalPlayback {
    #[default]
    Stopped,
    Playing,
    Paused,
    Error,
}

impl LocalPlayback {
    pub fn is_playing(self) -> bool {
        self == LocalPlayback::Playing
    }

    pub fn is_paused(self) -> bool {
        self == LocalPlayback::Paused
    }

    /// An item is loaded, playing or paused.
    pub fn has_item(self) -> bool {
        self.is_playing() || self.is_paused()
    }
}
