use std::time::{Duration, Instant};

use egui::*;

use crate::config::Config;
use crate::rain::CELL_PX;
use crate::sequence::{ScanView, StepStatus};
use crate::terminal::{KeyInput, Mode, Terminal};
use crate::theme::{rgba, Palette};
use crate::transcript::{Body, Line, Tone};

const TITLE:     &str = "demondOS_v2.5 // ROOT";
const GAME_PX:   f32  = 320.0;
const FRAME_MS:  u64  = 33;
const IDLE_MS:   u64  = 250;
const SPINNER:   &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub struct UplinkApp {
    term:       Terminal,
    palette:    Palette,
    opacity:    f32,
    focus_next: bool,
    last_mode:  Mode,
}

impl UplinkApp {
    pub fn new(cc: &eframe::CreationContext, term: Terminal) -> Self {
        let mut style = (*cc.egui_ctx.style()).clone();
        style.visuals.window_rounding                 = Rounding::same(8.0);
        style.visuals.widgets.noninteractive.rounding = Rounding::same(4.0);
        style.visuals.widgets.inactive.rounding       = Rounding::same(4.0);
        style.visuals.widgets.hovered.rounding        = Rounding::same(4.0);
        style.visuals.widgets.active.rounding         = Rounding::same(4.0);
        style.visuals.panel_fill                      = Color32::TRANSPARENT;
        style.visuals.extreme_bg_color                = Color32::TRANSPARENT;
        cc.egui_ctx.set_style(style);

        let Config { palette, opacity, .. } = term.config().clone();
        Self { term, palette, opacity, focus_next: true, last_mode: Mode::Standard }
    }

    fn tone_color(&self, tone: Tone) -> Color32 {
        let p = &self.palette;
        match tone {
            Tone::Plain     => rgba(p.foreground),
            Tone::Accent    => self.term.accent().color(),
            Tone::Muted     => rgba(p.muted),
            Tone::Bright    => rgba(p.bright),
            Tone::Directory => rgba(p.directory),
            Tone::Error     => rgba(p.error),
            Tone::Warning   => rgba(p.warning),
        }
    }

    fn mono(&self, text: impl Into<String>, tone: Tone) -> RichText {
        RichText::new(text).monospace().size(self.palette.font_size).color(self.tone_color(tone))
    }

    fn handle_keys(&mut self, ctx: &Context, now: Instant) {
        let keys: Vec<KeyInput> = ctx.input(|i| i.events.iter().filter_map(key_input).collect());
        for key in keys {
            // horizontal arrows belong to the line editor outside the game
            if matches!(key, KeyInput::Left | KeyInput::Right) && self.term.mode() != Mode::Game { continue; }
            let was_open = self.term.is_open();
            self.term.key(key, now);
            if !was_open && self.term.is_open() { self.focus_next = true; }
        }
    }

    fn draw_backdrop(&self, ui: &mut Ui) {
        let rect = ui.max_rect();
        let painter = ui.painter();
        painter.rect_filled(rect, 0.0, rgba(self.palette.background));
        painter.text(
            rect.center(), Align2::CENTER_CENTER, "press Alt+T",
            FontId::monospace(self.palette.font_size + 2.0), self.term.accent().with_alpha(160),
        );
        if !self.term.status().is_empty() {
            painter.text(
                rect.center() + vec2(0.0, 24.0), Align2::CENTER_CENTER, self.term.status(),
                FontId::monospace(self.palette.font_size), rgba(self.palette.muted),
            );
        }
    }

    fn draw_title_bar(&mut self, ui: &mut Ui) {
        let accent = self.term.accent();
        egui::Frame::none()
            .fill(rgba(self.palette.panel))
            .stroke(Stroke::new(1.0, accent.with_alpha(90)))
            .inner_margin(Margin::symmetric(12.0, 6.0))
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    for color in [Color32::from_rgb(255, 95, 86), Color32::from_rgb(255, 189, 46), Color32::from_rgb(39, 201, 63)] {
                        let (rect, _) = ui.allocate_exact_size(Vec2::splat(11.0), Sense::hover());
                        ui.painter().circle_filled(rect.center(), 5.5, color.linear_multiply(0.85));
                        ui.add_space(2.0);
                    }
                    ui.add_space(8.0);
                    ui.label(RichText::new(TITLE).monospace().color(accent.color()).size(12.0).strong());
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        if ui.add(egui::Button::new(RichText::new("✕").color(rgba(self.palette.muted))).frame(false)).clicked() {
                            self.term.close();
                        }
                        if self.term.has_live_response() {
                            ui.label(RichText::new("UPLINK").color(accent.color()).size(10.0));
                        }
                    });
                });
            });
    }

    fn draw_line(&self, ui: &mut Ui, line: &Line) {
        ui.horizontal_wrapped(|ui| {
            ui.spacing_mut().item_spacing.x = 0.0;
            for span in &line.spans {
                ui.label(self.mono(span.text.as_str(), span.tone));
            }
        });
    }

    fn draw_prompt(&self, ui: &mut Ui) {
        ui.label(self.mono("➜ ", Tone::Accent));
    }

    fn draw_scan(&self, ui: &mut Ui, view: &ScanView) {
        ui.label(self.mono(view.title, Tone::Bright));
        for (msg, status) in &view.steps {
            let (mark, tone) = match status {
                StepStatus::Pending   => continue,
                StepStatus::Active(_) => ("[~] ", Tone::Plain),
                StepStatus::Done      => ("[✓] ", Tone::Muted),
            };
            ui.horizontal(|ui| {
                ui.label(self.mono(mark, Tone::Accent));
                ui.label(self.mono(*msg, tone));
            });
        }
        if view.steps.iter().any(|(_, s)| matches!(s, StepStatus::Active(_))) {
            ui.add(egui::ProgressBar::new(f32::from(view.progress) / 100.0)
                .desired_width(240.0)
                .fill(self.term.accent().with_alpha(180)));
        }
    }

    fn draw_entries(&self, ui: &mut Ui, frame: usize) {
        for entry in self.term.transcript().entries() {
            match &entry.body {
                Body::Echo(line) => {
                    ui.horizontal(|ui| {
                        ui.spacing_mut().item_spacing.x = 0.0;
                        self.draw_prompt(ui);
                        ui.label(self.mono(line.as_str(), Tone::Bright))
                            .on_hover_text(entry.at.format("%H:%M:%S").to_string());
                    });
                }
                Body::Lines(lines) => lines.iter().for_each(|l| self.draw_line(ui, l)),
                Body::Remote { text, live, .. } => {
                    if text.is_empty() && *live {
                        ui.label(self.mono(format!("{} Establishing neural uplink...", SPINNER[frame % SPINNER.len()]), Tone::Accent));
                    } else {
                        let cursor = if *live { "▋" } else { "" };
                        ui.label(self.mono(format!("{text}{cursor}"), Tone::Plain));
                    }
                }
                Body::Scan(view) => self.draw_scan(ui, view),
            }
            ui.add_space(2.0);
        }
    }

    fn draw_boot(&self, ui: &mut Ui, now: Instant) {
        for line in self.term.boot_lines(now) {
            ui.label(self.mono(*line, Tone::Accent));
        }
        ui.label(self.mono("▋", Tone::Accent));
    }

    fn draw_standard(&mut self, ui: &mut Ui, now: Instant, frame: usize) {
        egui::ScrollArea::vertical()
            .id_source("uplink_transcript")
            .stick_to_bottom(true)
            .auto_shrink([false, false])
            .show(ui, |ui| {
                if self.term.is_booting() {
                    self.draw_boot(ui, now);
                    return;
                }
                self.draw_entries(ui, frame);
                ui.horizontal(|ui| {
                    ui.spacing_mut().item_spacing.x = 0.0;
                    self.draw_prompt(ui);
                    let font = FontId::monospace(self.palette.font_size);
                    let color = rgba(self.palette.bright);
                    let resp = ui.add(
                        egui::TextEdit::singleline(self.term.input_mut())
                            .frame(false)
                            .desired_width(f32::INFINITY)
                            .font(font)
                            .text_color(color),
                    );
                    if self.focus_next { resp.request_focus(); self.focus_next = false; }
                    if resp.lost_focus() && ui.input(|i| i.key_pressed(Key::Enter)) {
                        self.term.key(KeyInput::Enter, now);
                        resp.request_focus();
                    }
                });
            });
    }

    fn draw_game(&self, ui: &mut Ui) {
        let snake = self.term.snake();
        let accent = self.term.accent();
        ui.vertical_centered(|ui| {
            ui.add_space(12.0);
            ui.horizontal(|ui| {
                ui.label(self.mono(format!("SCORE: {}", snake.score()), Tone::Bright));
                ui.add_space(24.0);
                ui.label(self.mono(format!("HIGH: {}", snake.high_score()), Tone::Muted));
                ui.add_space(24.0);
                ui.label(self.mono(format!("LEN: {}", snake.len()), Tone::Muted));
            });
            let (rect, _) = ui.allocate_exact_size(Vec2::splat(GAME_PX), Sense::hover());
            let painter = ui.painter_at(rect);
            painter.rect_filled(rect, 0.0, Color32::BLACK);
            painter.rect_stroke(rect, 0.0, Stroke::new(1.0, accent.with_alpha(120)));
            let cell = GAME_PX / snake.grid().max(1) as f32;
            let cell_rect = |x: i32, y: i32| Rect::from_min_size(
                rect.min + vec2(x as f32 * cell, y as f32 * cell),
                Vec2::splat(cell - 1.0),
            );
            let food = snake.food();
            painter.rect_filled(cell_rect(food.x, food.y), 2.0, rgba(self.palette.error));
            for part in snake.body() {
                painter.rect_filled(cell_rect(part.x, part.y), 1.0, accent.color());
            }
            ui.add_space(8.0);
            ui.label(self.mono("Press ESC to abort mission", Tone::Muted));
        });
    }

    fn draw_rain(&mut self, ui: &mut Ui) {
        let rect = ui.max_rect();
        self.term.rain_mut().fit(rect.width(), rect.height());
        let accent = self.term.accent();
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, Color32::BLACK);
        let rain = self.term.rain();
        let font = FontId::monospace(CELL_PX * 0.8);
        for row in 0..rain.rows() {
            for col in 0..rain.cols() {
                let Some(g) = rain.glyph(col, row) else { continue };
                let pos = rect.min + vec2(col as f32 * CELL_PX, row as f32 * CELL_PX);
                let color = if g.glow >= 1.0 { Color32::WHITE } else { accent.with_alpha((g.glow * 255.0) as u8) };
                painter.text(pos, Align2::LEFT_TOP, g.ch, font.clone(), color);
            }
        }
        painter.text(
            rect.center_bottom() - vec2(0.0, 16.0), Align2::CENTER_BOTTOM, "PRESS ESC TO DISENGAGE",
            FontId::monospace(12.0), accent.with_alpha(200),
        );
    }

    fn draw_scanlines(&self, painter: &Painter, rect: Rect) {
        let line = Color32::from_black_alpha(28);
        let mut y = rect.top();
        while y < rect.bottom() {
            painter.line_segment([pos2(rect.left(), y), pos2(rect.right(), y)], Stroke::new(1.0, line));
            y += 3.0;
        }
    }

    fn draw_panel(&mut self, ui: &mut Ui, now: Instant, frame: usize) {
        let full = ui.max_rect();
        let bg = rgba(self.palette.background).gamma_multiply(self.opacity);
        ui.painter().rect_filled(full, 0.0, bg);
        ui.painter().rect_stroke(full, 0.0, Stroke::new(1.0, self.term.accent().with_alpha(70)));

        ui.vertical(|ui| {
            self.draw_title_bar(ui);
            if !self.term.is_open() { return; }
            egui::Frame::none()
                .inner_margin(Margin::symmetric(14.0, 10.0))
                .show(ui, |ui| match self.term.mode() {
                    Mode::Standard   => self.draw_standard(ui, now, frame),
                    Mode::Game       => self.draw_game(ui),
                    Mode::Visualizer => self.draw_rain(ui),
                });
        });
        self.draw_scanlines(ui.painter(), full);
    }
}

fn key_input(event: &Event) -> Option<KeyInput> {
    match event {
        Event::Key { key: Key::T, pressed: true, repeat: false, modifiers, .. } if modifiers.alt => Some(KeyInput::Hotkey),
        Event::Key { key: Key::Escape,     pressed: true, .. } => Some(KeyInput::Escape),
        Event::Key { key: Key::ArrowUp,    pressed: true, .. } => Some(KeyInput::Up),
        Event::Key { key: Key::ArrowDown,  pressed: true, .. } => Some(KeyInput::Down),
        Event::Key { key: Key::ArrowLeft,  pressed: true, .. } => Some(KeyInput::Left),
        Event::Key { key: Key::ArrowRight, pressed: true, .. } => Some(KeyInput::Right),
        _ => None,
    }
}

impl eframe::App for UplinkApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.handle_keys(ctx, now);
        self.term.tick(now);
        if self.term.mode() != self.last_mode {
            self.last_mode = self.term.mode();
            if self.last_mode == Mode::Standard { self.focus_next = true; }
        }

        let busy = self.term.is_open() || self.term.has_live_response();
        ctx.request_repaint_after(Duration::from_millis(if busy { FRAME_MS } else { IDLE_MS }));

        let frame = (ctx.input(|i| i.time) * 12.0) as usize;
        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(Color32::TRANSPARENT))
            .show(ctx, |ui| {
                if self.term.is_open() {
                    self.draw_panel(ui, now, frame);
                } else {
                    self.draw_backdrop(ui);
                }
            });
    }
}
