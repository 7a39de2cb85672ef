/// A request addressed to the transport controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Play(String),
    Pause,
    /// Seek to the given second, then play.
    Resume(u32),
    Stop,
    Seek(u32),
    SetVolume(u16),
    SetMute(bool),
    GetVolume,
    GetMute,
    GetDuration,
    GetPosition,
    GetTransportState,
    GetMaxVolume,
    GetMinVolume,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Play(_) => "Play",
            Command::Pause => "Pause",
            Command::Resume(_) => "Resume",
            Command::Stop => "Stop",
            Command::Seek(_) => "Seek",
            Command::SetVolume(_) => "SetVolume",
            Command::SetMute(_) => "SetMute",
            Command::GetVolume => "GetVolume",
            Command::GetMute => "GetMute",
            Command::GetDuration => "GetDuration",
            Command::GetPosition => "GetPosition",
            Command::GetTransportState => "GetTransportState",
            Command::GetMaxVolume => "GetMaxVolume",
            Command::GetMinVolume => "GetMinVolume",
        }
    }

    /// Mutating commands hold the device's write gate.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Command::Play(_)
                | Command::Pause
                | Command::Resume(_)
                | Command::Stop
                | Command::Seek(_)
                | Command::SetVolume(_)
                | Command::SetMute(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries_do_not_mutate() {
        assert!(Command::Play("http://x/a.flac".into()).is_mutating());
        assert!(Command::Seek(10).is_mutating());
        assert!(Command::SetMute(true).is_mutating());
        assert!(!Command::GetPosition.is_mutating());
        assert!(!Command::GetTransportState.is_mutating());
        assert_eq!(Command::Resume(3).name(), "Resume");
    }
}
