/// Manual controls delivered to the rotation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationCommand {
    Next,
    Previous,
    OpenTrailer,
    RefreshNow,
    Quit,
}

impl RotationCommand {
    /// Parse one stdin line; unknown input is `None`.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "n" | "next" => Some(Self::Next),
            "p" | "prev" | "previous" => Some(Self::Previous),
            "t" | "trailer" => Some(Self::OpenTrailer),
            "r" | "refresh" => Some(Self::RefreshNow),
            "q" | "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}
