//! Fixed option tables shared by the server state and the client controls.

/// Allowed screen sizes (in world cells).
pub const VALID_SIZES: [i32; 7] = [1, 2, 4, 6, 8, 10, 12];
pub const DEFAULT_SCREEN_SIZE: i32 = 2;

pub const QUALITY_OPTIONS: [&str; 4] = ["low", "medium", "high", "dash"];
pub const DEFAULT_QUALITY_INDEX: i32 = 1;

pub const SPEED_OPTIONS: [f32; 7] = [0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 2.0];
pub const DEFAULT_SPEED_INDEX: i32 = 3;

/// One entry of the video source table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSource {
    /// Display name.
    pub name: &'static str,
    /// Embed URL prefix; `None` means the input URL is used verbatim.
    pub embed_base: Option<&'static str>,
}

pub const VIDEO_SOURCES: [VideoSource; 6] = [
    VideoSource {
        name: "YouTube",
        embed_base: Some("https://www.youtube.com/embed/"),
    },
    VideoSource {
        name: "Invidious 1",
        embed_base: Some("https://yewtu.be/embed/"),
    },
    VideoSource {
        name: "Invidious 2",
        embed_base: Some("https://inv.nadeko.net/embed/"),
    },
    VideoSource {
        name: "Invidious 3",
        embed_base: Some("https://invidious.nerdvpn.de/embed/"),
    },
    VideoSource {
        name: "Invidious 4",
        embed_base: Some("https://inv.tux.pizza/embed/"),
    },
    VideoSource {
        name: "Direct URL",
        embed_base: None,
    },
];
pub const DEFAULT_SOURCE_INDEX: i32 = 1;
/// Index of the first-party source (no quality parameters appended).
pub const YOUTUBE_SOURCE_INDEX: usize = 0;
/// Index of the direct-URL passthrough source.
pub const DIRECT_SOURCE_INDEX: usize = 5;

pub fn is_valid_size(size: i32) -> bool {
    VALID_SIZES.contains(&size)
}

pub fn is_valid_quality_index(index: i32) -> bool {
    index >= 0 && (index as usize) < QUALITY_OPTIONS.len()
}

pub fn is_valid_source_index(index: i32) -> bool {
    index >= 0 && (index as usize) < VIDEO_SOURCES.len()
}

pub fn is_valid_speed_index(index: i32) -> bool {
    index >= 0 && (index as usize) < SPEED_OPTIONS.len()
}

/// Human label for a speed multiplier (`1x`, `2x`, `0.5x`).
pub fn speed_label(speed: f32) -> String {
    if speed.fract() == 0.0 {
        format!("{}x", speed as i32)
    } else {
        format!("{speed}x")
    }
}

/// Compact source label used on buttons (`Inv1`, `Direct`).
pub fn short_source_name(name: &str) -> String {
    match name {
        "Direct URL" => "Direct".to_string(),
        other => match other.strip_prefix("Invidious ") {
            Some(n) => format!("Inv{n}"),
            None => other.to_string(),
        },
    }
}
