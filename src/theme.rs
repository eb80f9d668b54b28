use egui::Color32;
use serde::{Deserialize, Serialize};

/// Accent colour of the terminal chrome, prompt glyph, snake and rain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accent { #[default] Teal, Gold, Violet, Matrix, Danger, Slate }

impl Accent {
    pub const ALL: [Accent; 6] = [
        Accent::Teal, Accent::Gold, Accent::Violet, Accent::Matrix, Accent::Danger, Accent::Slate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Accent::Teal   => "teal",
            Accent::Gold   => "gold",
            Accent::Violet => "violet",
            Accent::Matrix => "matrix",
            Accent::Danger => "danger",
            Accent::Slate  => "slate",
        }
    }

    pub fn rgb(self) -> [u8; 3] {
        match self {
            Accent::Teal   => [0x2E, 0xC4, 0xB6],
            Accent::Gold   => [0xFF, 0xD1, 0x66],
            Accent::Violet => [0x83, 0x38, 0xEC],
            Accent::Matrix => [0x00, 0xFF, 0x41],
            Accent::Danger => [0xEF, 0x44, 0x44],
            Accent::Slate  => [0x9B, 0xA3, 0xAF],
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        Self::ALL.into_iter().find(|a| a.name() == name)
    }

    pub fn names() -> String {
        Self::ALL.iter().map(|a| a.name()).collect::<Vec<_>>().join(", ")
    }

    pub fn color(self) -> Color32 {
        let [r, g, b] = self.rgb();
        Color32::from_rgb(r, g, b)
    }

    pub fn with_alpha(self, alpha: u8) -> Color32 {
        let [r, g, b] = self.rgb();
        Color32::from_rgba_unmultiplied(r, g, b, alpha)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub background: [u8; 4],
    pub panel:      [u8; 4],
    pub foreground: [u8; 4],
    pub bright:     [u8; 4],
    pub muted:      [u8; 4],
    pub error:      [u8; 4],
    pub warning:    [u8; 4],
    pub directory:  [u8; 4],
    pub font_size:  f32,
}
impl Default for Palette {
    fn default() -> Self {
        Self {
            background: [15,  15,  16,  255],
            panel:      [10,  10,  10,  255],
            foreground: [203, 213, 225, 255],
            bright:     [255, 255, 255, 255],
            muted:      [100, 116, 139, 255],
            error:      [239, 68,  68,  255],
            warning:    [248, 113, 113, 255],
            directory:  [96,  165, 250, 255],
            font_size:  13.0,
        }
    }
}

pub fn rgba(c: [u8; 4]) -> Color32 {
    Color32::from_rgba_unmultiplied(c[0], c[1], c[2], c[3])
}
