/// ANSI color codes for record and diagnostic output
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub channel: &'static str,   // Bright cyan for channel banners
    pub timestamp: &'static str, // Dim for timestamps
    pub speaker: &'static str,   // Green for speaker names
    pub metadata: &'static str,  // Dim for session header fields
    pub notice: &'static str,    // Yellow for tracking and reset notices
    pub error: &'static str,     // Bright red for diagnostics
    pub reset: &'static str,     // Reset to default color
}

impl ColorScheme {
    pub fn new(use_colors: bool) -> Self {
        if use_colors {
            Self {
                channel: "\x1b[96m",
                timestamp: "\x1b[2m",
                speaker: "\x1b[32m",
                metadata: "\x1b[2m",
                notice: "\x1b[33m",
                error: "\x1b[91m",
                reset: "\x1b[0m",
            }
        } else {
            // All empty strings for no-color mode
            Self {
                channel: "",
                timestamp: "",
                speaker: "",
                metadata: "",
                notice: "",
                error: "",
                reset: "",
            }
        }
    }
}
