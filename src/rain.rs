use std::time::{Duration, Instant};

use rand::Rng;

pub const FRAME:        Duration = Duration::from_millis(50);
pub const CELL_PX:      f32 = 20.0;
pub const RESET_CHANCE: f64 = 0.025;
const FADE:  f32 = 0.9;
const FLOOR: f32 = 0.05;

const GLYPHS: &[char] = &[
    '0', '1', 'ア', 'イ', 'ウ', 'エ', 'オ', 'カ', 'キ', 'ク', 'ケ', 'コ', 'サ', 'シ', 'ス', 'セ', 'ソ',
    'タ', 'チ', 'ツ', 'テ', 'ト', 'ナ', 'ニ', 'ヌ', 'ネ', 'ノ', 'ハ', 'ヒ', 'フ', 'ヘ', 'ホ', 'マ', 'ミ',
    'ム', 'メ', 'モ', 'ヤ', 'ユ', 'ヨ', 'ラ', 'リ', 'ル', 'レ', 'ロ', 'ワ', 'ヲ', 'ン',
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Glyph { pub ch: char, pub glow: f32 }

/// Falling-glyph overlay. `drops` is the only simulation state; `glyphs` is the fading trail.
#[derive(Debug, Default)]
pub struct Rain {
    cols:       usize,
    rows:       usize,
    drops:      Vec<u32>,
    glyphs:     Vec<Option<Glyph>>,
    last_frame: Option<Instant>,
}

impl Rain {
    #[cfg(test)]
    pub fn new(cols: usize, rows: usize) -> Self {
        let mut rain = Self::default();
        rain.resize(cols, rows);
        rain
    }

    /// Resets only when the grid size actually changes.
    pub fn resize(&mut self, cols: usize, rows: usize) {
        if cols == self.cols && rows == self.rows { return; }
        self.cols   = cols;
        self.rows   = rows;
        self.drops  = vec![1; cols];
        self.glyphs = vec![None; cols * rows];
    }

    pub fn fit(&mut self, width: f32, height: f32) {
        self.resize((width / CELL_PX).floor().max(0.0) as usize, (height / CELL_PX).floor().max(0.0) as usize);
    }

    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for slot in self.glyphs.iter_mut() {
            if let Some(g) = slot {
                g.glow *= FADE;
                if g.glow < FLOOR { *slot = None; }
            }
        }
        for (col, drop) in self.drops.iter_mut().enumerate() {
            let ch = GLYPHS[rng.gen_range(0..GLYPHS.len())];
            let row = drop.saturating_sub(1) as usize;
            if row < self.rows {
                self.glyphs[row * self.cols + col] = Some(Glyph { ch, glow: 1.0 });
            }
            if *drop as usize > self.rows && rng.gen_bool(RESET_CHANCE) {
                *drop = 0;
            }
            *drop += 1;
        }
    }

    /// Runs one frame if the redraw interval has passed.
    pub fn tick<R: Rng + ?Sized>(&mut self, now: Instant, rng: &mut R) -> bool {
        if self.last_frame.is_some_and(|t| now.duration_since(t) < FRAME) { return false; }
        self.last_frame = Some(now);
        self.step(rng);
        true
    }

    pub fn reset_clock(&mut self) { self.last_frame = None; }

    pub fn glyph(&self, col: usize, row: usize) -> Option<Glyph> {
        if col >= self.cols || row >= self.rows { return None; }
        self.glyphs[row * self.cols + col]
    }

    pub fn cols(&self) -> usize { self.cols }
    pub fn rows(&self) -> usize { self.rows }
    #[cfg(test)]
    pub fn drops(&self) -> &[u32] { &self.drops }
}
