//! The demondOS terminal widget: power state, display mode, transcript and the
//! timers and remote jobs that write into it.
//!
//! Everything runs on the UI thread through `tick`. Timers are deadlines owned by
//! values held here, so dropping them is the cancellation. Remote workers only reach
//! the transcript through `RemoteEvent`s tagged with the session that issued them.

use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use crossbeam_channel::{unbounded, Receiver, Sender};
use rand::rngs::StdRng;

use crate::command::{self, Context, Effect, HistoryItem};
use crate::config::Config;
use crate::rain::Rain;
use crate::remote::{self, Backend, CancelFlag, Job, RemoteEvent, RemoteEventKind, RemoteRequest};
use crate::sequence::{Boot, Scan};
use crate::snake::{Direction, Snake, Step};
use crate::theme::Accent;
use crate::transcript::{Body, EntryId, Line, Tone, Transcript};

pub const WELCOME: &[&str] = &["Welcome to demondOS v2.5.0", "Type \"help\" for available commands."];
pub const CLOSED_STATUS: &str = "Session closed.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode { Standard, Game, Visualizer }

#[derive(Debug)]
pub enum Power { Off, Booting(Boot), On }

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyInput { Hotkey, Enter, Escape, Up, Down, Left, Right }

struct InFlight { entry: EntryId, cancel: CancelFlag }

pub struct Terminal {
    open:        bool,
    power:       Power,
    mode:        Mode,
    transcript:  Transcript,
    input:       String,
    accent:      Accent,
    snake:       Snake,
    rain:        Rain,
    scans:       Vec<Scan>,
    session:     u64,
    inflight:    Vec<InFlight>,
    backend:     Option<Arc<dyn Backend>>,
    config:      Config,
    events_tx:   Sender<RemoteEvent>,
    events_rx:   Receiver<RemoteEvent>,
    history:     Vec<HistoryItem>,
    history_idx: Option<usize>,
    rng:         StdRng,
    status:      String,
}

impl Terminal {
    pub fn new(config: Config, backend: Option<Arc<dyn Backend>>, rng: StdRng) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            open: false, power: Power::Off, mode: Mode::Standard,
            transcript: Transcript::new(), input: String::new(), accent: config.accent,
            snake: Snake::default(), rain: Rain::default(), scans: Vec::new(),
            session: 0, inflight: Vec::new(), backend, config,
            events_tx, events_rx, history: Vec::new(), history_idx: None, rng,
            status: String::new(),
        }
    }

    pub fn open(&mut self, now: Instant) {
        if self.open { return; }
        log::info!("terminal open (session {})", self.session);
        self.open   = true;
        self.status.clear();
        self.power  = Power::Booting(Boot::new(now, &mut self.rng));
    }

    /// Tears down the session. Nothing already scheduled may touch the transcript afterwards.
    pub fn close(&mut self) {
        if !self.open { return; }
        log::info!("terminal closed (session {})", self.session);
        self.open  = false;
        self.power = Power::Off;
        self.mode  = Mode::Standard;
        self.snake.stop();
        self.teardown_session();
        self.input.clear();
        self.history.clear();
        self.history_idx = None;
        self.status = CLOSED_STATUS.into();
    }

    pub fn toggle(&mut self, now: Instant) {
        if self.open { self.close() } else { self.open(now) }
    }

    fn teardown_session(&mut self) {
        self.scans.clear();
        for job in self.inflight.drain(..) { job.cancel.cancel(); }
        self.session += 1;
        self.transcript.clear();
    }

    pub fn accepts_input(&self) -> bool {
        self.open && matches!(self.power, Power::On) && self.mode == Mode::Standard
    }

    pub fn key(&mut self, key: KeyInput, now: Instant) {
        if key == KeyInput::Hotkey { return self.toggle(now); }
        if !self.open { return; }
        match (self.mode, key) {
            (Mode::Game, KeyInput::Escape)       => self.end_game(),
            (Mode::Visualizer, KeyInput::Escape) => self.set_mode(Mode::Standard),
            (Mode::Game, KeyInput::Up)           => { self.snake.steer(Direction::Up); }
            (Mode::Game, KeyInput::Down)         => { self.snake.steer(Direction::Down); }
            (Mode::Game, KeyInput::Left)         => { self.snake.steer(Direction::Left); }
            (Mode::Game, KeyInput::Right)        => { self.snake.steer(Direction::Right); }
            (Mode::Standard, KeyInput::Enter)    => self.submit(now),
            (Mode::Standard, KeyInput::Up)       => self.recall(true),
            (Mode::Standard, KeyInput::Down)     => self.recall(false),
            _ => {}
        }
    }

    fn recall(&mut self, older: bool) {
        if !self.accepts_input() || self.history.is_empty() { return; }
        let last = self.history.len() - 1;
        self.history_idx = match (self.history_idx, older) {
            (None, true)                  => Some(last),
            (Some(i), true)               => Some(i.saturating_sub(1)),
            (Some(i), false) if i < last  => Some(i + 1),
            (_, false)                    => None,
        };
        self.input = self.history_idx.map(|i| self.history[i].line.clone()).unwrap_or_default();
    }

    /// Submits the input buffer.
    fn submit(&mut self, now: Instant) {
        let line = std::mem::take(&mut self.input);
        self.run_line(&line, now);
    }

    pub fn run_line(&mut self, line: &str, now: Instant) {
        if !self.accepts_input() { return; }
        let Some(inv) = command::parse(line) else { return };
        self.history_idx = None;
        self.history.push(HistoryItem { at: Local::now(), line: inv.line.to_string() });
        self.transcript.push(Body::Echo(inv.line.to_string()));

        let reply = match command::lookup(inv.name) {
            Some(kind) => command::execute(kind, &inv.args, &Context { history: &self.history }),
            None       => command::not_found(inv.name),
        };
        self.transcript.push_lines(reply.lines);
        if let Some(effect) = reply.effect { self.apply(effect, now); }
    }

    fn apply(&mut self, effect: Effect, now: Instant) {
        match effect {
            Effect::Clear => {
                self.scans.clear();
                self.transcript.clear();
            }
            Effect::Close => self.close(),
            Effect::Reboot => {
                log::info!("reboot");
                self.teardown_session();
                self.power = Power::Booting(Boot::new(now, &mut self.rng));
            }
            Effect::StartGame => {
                self.snake.start(now, &mut self.rng);
                self.set_mode(Mode::Game);
            }
            Effect::StartVisualizer => {
                self.rain.reset_clock();
                self.set_mode(Mode::Visualizer);
            }
            Effect::StartScan => {
                let entry = self.transcript.push(Body::Lines(Vec::new()));
                let scan = Scan::new(entry, now, &mut self.rng);
                self.transcript.replace(entry, Body::Scan(scan.view(now)));
                self.scans.push(scan);
            }
            Effect::SetAccent(accent) => self.accent = accent,
            Effect::Remote(request)   => self.start_remote(request),
        }
    }

    fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode { log::info!("mode {:?} -> {mode:?}", self.mode); }
        self.mode = mode;
    }

    fn end_game(&mut self) {
        let score = self.snake.stop();
        self.set_mode(Mode::Standard);
        self.transcript.push_line(Line::plain(format!("Game Over. Score: {score}")));
    }

    fn start_remote(&mut self, request: RemoteRequest) {
        let Some(backend) = self.backend.clone() else {
            self.transcript.push_line(Line::error(remote::OFFLINE_LINE));
            return;
        };
        let entry = self.transcript.push(Body::Remote { flavor: request.flavor, text: String::new(), live: true });
        let cancel = CancelFlag::default();
        self.inflight.push(InFlight { entry, cancel: cancel.clone() });
        let job = Job {
            session: self.session,
            entry,
            persona: self.config.persona(request.flavor),
            prompt:  request.full_prompt(),
            stream:  request.flavor.streams(),
            cancel,
        };
        backend.dispatch(job, self.events_tx.clone());
    }

    /// Drains finished or partial remote output into the entries that asked for it.
    pub fn poll_remote(&mut self) {
        while let Ok(ev) = self.events_rx.try_recv() {
            if ev.session != self.session {
                log::debug!("dropping event for closed session {}", ev.session);
                continue;
            }
            let finished = !matches!(ev.kind, RemoteEventKind::Chunk(_));
            let applied = match ev.kind {
                RemoteEventKind::Chunk(chunk) => self.transcript.update(ev.entry, |body| {
                    if let Body::Remote { text, .. } = body { text.push_str(&chunk); }
                }),
                RemoteEventKind::Done => self.transcript.update(ev.entry, |body| {
                    if let Body::Remote { flavor, text, live } = body {
                        *text = remote::finalize(*flavor, text);
                        *live = false;
                    }
                }),
                RemoteEventKind::Failed(reason) => {
                    log::warn!("uplink failure on entry {}: {reason}", ev.entry);
                    self.transcript.replace(ev.entry, Body::Lines(vec![Line::error(remote::FAILURE_LINE)]))
                }
            };
            if !applied { log::debug!("entry {} is gone", ev.entry); }
            if finished { self.inflight.retain(|j| j.entry != ev.entry); }
        }
    }

    /// Advances every timer owned by the widget.
    pub fn tick(&mut self, now: Instant) {
        self.poll_remote();
        if !self.open { return; }

        if let Power::Booting(boot) = &mut self.power {
            if boot.poll(now) {
                self.power = Power::On;
                for line in WELCOME { self.transcript.push_line(Line::new(*line, Tone::Plain)); }
            }
        }

        let mut finished = Vec::new();
        for scan in &mut self.scans {
            let view = scan.view(now);
            self.transcript.replace(scan.entry, Body::Scan(view));
            if scan.poll(now) { finished.push(scan.entry); }
        }
        if !finished.is_empty() {
            self.scans.retain(|s| !finished.contains(&s.entry));
            for _ in &finished { self.transcript.push_line(Line::plain("Diagnostic Complete.")); }
        }

        match self.mode {
            Mode::Game => {
                if self.snake.tick(now, &mut self.rng) == Some(Step::Collided) { self.end_game(); }
            }
            Mode::Visualizer => { self.rain.tick(now, &mut self.rng); }
            Mode::Standard   => {}
        }
    }

    pub fn boot_lines(&self, now: Instant) -> &'static [&'static str] {
        match &self.power {
            Power::Booting(boot) => boot.visible(now),
            _                    => &[],
        }
    }

    pub fn is_open(&self) -> bool { self.open }
    pub fn is_booting(&self) -> bool { matches!(self.power, Power::Booting(_)) }
    pub fn mode(&self) -> Mode { self.mode }
    pub fn accent(&self) -> Accent { self.accent }
    pub fn transcript(&self) -> &Transcript { &self.transcript }
    pub fn snake(&self) -> &Snake { &self.snake }
    pub fn rain(&self) -> &Rain { &self.rain }
    pub fn rain_mut(&mut self) -> &mut Rain { &mut self.rain }
    pub fn input_mut(&mut self) -> &mut String { &mut self.input }
    pub fn status(&self) -> &str { &self.status }
    pub fn config(&self) -> &Config { &self.config }
    pub fn has_live_response(&self) -> bool { !self.inflight.is_empty() }

    #[cfg(test)]
    pub(crate) fn snake_mut(&mut self) -> &mut Snake { &mut self.snake }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snake::{Cell, TICK};
    use rand::SeedableRng;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records jobs and lets the test decide what the "network" sends back.
    #[derive(Default)]
    struct Scripted { jobs: Mutex<Vec<(Job, Sender<RemoteEvent>)>> }

    impl Backend for Scripted {
        fn dispatch(&self, job: Job, tx: Sender<RemoteEvent>) {
            if let Ok(mut jobs) = self.jobs.lock() { jobs.push((job, tx)); }
        }
    }

    impl Scripted {
        fn send(&self, idx: usize, kind: RemoteEventKind) {
            let jobs = self.jobs.lock().unwrap();
            let (job, tx) = &jobs[idx];
            tx.send(RemoteEvent { session: job.session, entry: job.entry, kind }).unwrap();
        }
        fn job(&self, idx: usize) -> Job { self.jobs.lock().unwrap()[idx].0.clone() }
    }

    fn booted(backend: Option<Arc<dyn Backend>>) -> (Terminal, Instant) {
        let mut term = Terminal::new(Config::default(), backend, StdRng::seed_from_u64(42));
        let t0 = Instant::now();
        term.open(t0);
        let done = match &term.power { Power::Booting(b) => b.complete_at(), _ => t0 };
        term.tick(done);
        assert!(term.accepts_input());
        (term, done)
    }

    fn last(term: &Terminal) -> String { term.transcript().last_text().unwrap_or_default() }

    fn remote_body(term: &Terminal, entry: EntryId) -> Option<(String, bool)> {
        match term.transcript().get(entry).map(|e| &e.body) {
            Some(Body::Remote { text, live, .. }) => Some((text.clone(), *live)),
            _                                      => None,
        }
    }

    #[test]
    fn boot_gates_input_then_welcomes() {
        let mut term = Terminal::new(Config::default(), None, StdRng::seed_from_u64(1));
        let t0 = Instant::now();
        term.key(KeyInput::Hotkey, t0);
        assert!(term.is_open() && term.is_booting());
        term.run_line("help", t0);
        assert!(term.transcript().is_empty());
        let done = match &term.power { Power::Booting(b) => b.complete_at(), _ => t0 };
        term.tick(done);
        assert!(!term.is_booting());
        assert_eq!(term.transcript().len(), WELCOME.len());
    }

    #[test]
    fn blank_lines_append_nothing() {
        let (mut term, now) = booted(None);
        let before = term.transcript().len();
        for line in ["", "   ", "\t \t"] {
            *term.input_mut() = line.to_string();
            term.key(KeyInput::Enter, now);
        }
        assert_eq!(term.transcript().len(), before);
        assert!(term.history.is_empty());
    }

    #[test]
    fn unknown_command_changes_nothing_but_the_log() {
        let (mut term, now) = booted(None);
        let before = term.transcript().len();
        term.run_line("Hack the-planet", now);
        assert_eq!(term.transcript().len(), before + 2);
        assert_eq!(last(&term), "Command not found: Hack. Type \"help\".");
        assert_eq!(term.mode(), Mode::Standard);
        assert_eq!(term.accent(), Accent::Teal);
        assert!(term.accepts_input());
    }

    #[test]
    fn walkthrough_theme_snake_escape() {
        let (mut term, now) = booted(None);
        term.run_line("theme gold", now);
        assert_eq!(term.accent(), Accent::Gold);
        assert_eq!(last(&term), "Theme updated to: gold");

        term.run_line("SNAKE", now);
        assert_eq!(term.mode(), Mode::Game);
        assert_eq!(term.snake().head(), Some(Cell { x: 10, y: 10 }));
        assert_eq!(term.snake().score(), 0);
        assert!(!term.accepts_input());

        term.snake_mut().set_food(Cell { x: 11, y: 10 });
        term.tick(now + TICK);
        assert_eq!(term.snake().score(), 10);
        assert_eq!(term.snake().len(), 2);

        term.key(KeyInput::Escape, now + TICK);
        assert_eq!(term.mode(), Mode::Standard);
        assert_eq!(last(&term), "Game Over. Score: 10");
    }

    #[test]
    fn arrows_only_steer_in_game_mode() {
        let (mut term, now) = booted(None);
        term.run_line("ls", now);
        term.key(KeyInput::Up, now);
        assert_eq!(term.input_mut().as_str(), "ls");
        assert_eq!(term.snake().heading(), Direction::Right);
        term.key(KeyInput::Down, now);
        assert_eq!(term.input_mut().as_str(), "");
    }

    #[test]
    fn collision_returns_to_standard_with_score() {
        let (mut term, now) = booted(None);
        term.run_line("snake", now);
        let mut t = now;
        for _ in 0..4 {
            let head = term.snake().head().unwrap_or(Cell { x: 0, y: 0 });
            term.snake_mut().set_food(Cell { x: head.x + 1, y: head.y });
            t += TICK;
            term.tick(t);
        }
        term.snake_mut().set_food(Cell { x: 0, y: 0 });
        for dir in [KeyInput::Down, KeyInput::Left, KeyInput::Up] {
            term.key(dir, t);
            t += TICK;
            term.tick(t);
        }
        assert_eq!(term.mode(), Mode::Standard);
        assert_eq!(last(&term), "Game Over. Score: 40");
    }

    #[test]
    fn matrix_mode_exits_on_escape() {
        let (mut term, now) = booted(None);
        term.run_line("matrix", now);
        assert_eq!(term.mode(), Mode::Visualizer);
        term.rain_mut().resize(4, 4);
        term.tick(now);
        assert_eq!(term.rain().drops(), &[2, 2, 2, 2]);
        term.key(KeyInput::Escape, now);
        assert_eq!(term.mode(), Mode::Standard);
    }

    #[test]
    fn streaming_fills_its_placeholder() {
        let backend = Arc::new(Scripted::default());
        let (mut term, now) = booted(Some(backend.clone()));
        term.run_line("ai status?", now);
        let job = backend.job(0);
        assert!(job.stream);
        assert_eq!(job.prompt, "status?");
        assert_eq!(remote_body(&term, job.entry), Some((String::new(), true)));

        backend.send(0, RemoteEventKind::Chunk("All ".into()));
        backend.send(0, RemoteEventKind::Chunk("nominal.".into()));
        term.tick(now);
        assert_eq!(remote_body(&term, job.entry), Some(("All nominal.".into(), true)));
        assert!(term.accepts_input());

        backend.send(0, RemoteEventKind::Done);
        term.tick(now);
        assert_eq!(remote_body(&term, job.entry), Some(("All nominal.".into(), false)));
        assert!(!term.has_live_response());
    }

    #[test]
    fn concurrent_requests_write_to_their_own_entries() {
        let backend = Arc::new(Scripted::default());
        let (mut term, now) = booted(Some(backend.clone()));
        term.run_line("ai one", now);
        term.run_line("analyze 1", now);
        let (a, b) = (backend.job(0), backend.job(1));
        assert_eq!(b.persona.model, term.config().ai_analysis_model);
        assert!(b.prompt.starts_with("Context: Project: demondOS"));

        backend.send(1, RemoteEventKind::Chunk("second".into()));
        backend.send(0, RemoteEventKind::Chunk("first".into()));
        term.tick(now);
        assert_eq!(remote_body(&term, a.entry).map(|r| r.0), Some("first".into()));
        assert_eq!(remote_body(&term, b.entry).map(|r| r.0), Some("second".into()));
    }

    #[test]
    fn failure_leaves_one_error_line_and_no_spinner() {
        let backend = Arc::new(Scripted::default());
        let (mut term, now) = booted(Some(backend.clone()));
        term.run_line("fortune", now);
        let job = backend.job(0);
        assert!(!job.stream);
        backend.send(0, RemoteEventKind::Chunk("half".into()));
        backend.send(0, RemoteEventKind::Failed("connection reset".into()));
        term.tick(now);

        let entry = term.transcript().get(job.entry).map(|e| e.body.clone());
        assert_eq!(entry, Some(Body::Lines(vec![Line::error(remote::FAILURE_LINE)])));
        let live = term.transcript().entries().iter()
            .filter(|e| matches!(e.body, Body::Remote { live: true, .. }))
            .count();
        assert_eq!(live, 0);
    }

    #[test]
    fn offline_uplink_reports_once() {
        let (mut term, now) = booted(None);
        let before = term.transcript().len();
        term.run_line("draw a skull", now);
        assert_eq!(term.transcript().len(), before + 2);
        assert_eq!(last(&term), remote::OFFLINE_LINE);
    }

    #[test]
    fn close_mid_stream_discards_late_output_and_cancels() {
        let backend = Arc::new(Scripted::default());
        let (mut term, now) = booted(Some(backend.clone()));
        term.run_line("roast", now);
        let job = backend.job(0);
        term.key(KeyInput::Hotkey, now);
        assert!(job.cancel.is_cancelled());
        assert!(term.transcript().is_empty());
        assert_eq!(term.status(), CLOSED_STATUS);

        backend.send(0, RemoteEventKind::Chunk("too late".into()));
        backend.send(0, RemoteEventKind::Done);
        term.tick(now);
        assert!(term.transcript().is_empty());

        term.open(now);
        let done = match &term.power { Power::Booting(b) => b.complete_at(), _ => now };
        backend.send(0, RemoteEventKind::Chunk("still late".into()));
        term.tick(done);
        assert!(term.transcript().entries().iter().all(|e| !matches!(e.body, Body::Remote { .. })));
    }

    #[test]
    fn close_mid_boot_stops_the_sequence() {
        let mut term = Terminal::new(Config::default(), None, StdRng::seed_from_u64(9));
        let t0 = Instant::now();
        term.open(t0);
        term.tick(t0 + Duration::from_millis(400));
        term.close();
        term.tick(t0 + Duration::from_secs(30));
        assert!(term.transcript().is_empty());
        assert!(!term.is_booting());
        assert!(term.boot_lines(t0 + Duration::from_secs(30)).is_empty());
    }

    #[test]
    fn scan_runs_inline_then_reports() {
        let (mut term, now) = booted(None);
        term.run_line("scan", now);
        let entry = term.transcript().entries().last().map(|e| e.id).unwrap_or_default();
        assert!(matches!(term.transcript().get(entry).map(|e| &e.body), Some(Body::Scan(_))));
        let end = term.scans[0].complete_at();
        term.tick(end);
        assert_eq!(last(&term), "Diagnostic Complete.");
        assert!(term.scans.is_empty());
    }

    #[test]
    fn clear_cancels_pending_scans() {
        let (mut term, now) = booted(None);
        term.run_line("scan", now);
        term.run_line("clear", now);
        assert!(term.transcript().is_empty());
        term.tick(now + Duration::from_secs(30));
        assert!(term.transcript().is_empty());
    }

    #[test]
    fn reboot_replays_boot_and_discards_streams() {
        let backend = Arc::new(Scripted::default());
        let (mut term, now) = booted(Some(backend.clone()));
        term.run_line("ai hi", now);
        term.run_line("reboot", now);
        assert!(term.is_booting());
        assert!(term.transcript().is_empty());
        backend.send(0, RemoteEventKind::Chunk("stale".into()));
        let done = match &term.power { Power::Booting(b) => b.complete_at(), _ => now };
        term.tick(done);
        assert_eq!(term.transcript().len(), WELCOME.len());
    }

    #[test]
    fn reopening_starts_with_empty_history() {
        let (mut term, now) = booted(None);
        term.run_line("sudo secret-from-first-session", now);
        term.key(KeyInput::Hotkey, now);
        term.key(KeyInput::Hotkey, now);
        let done = match &term.power { Power::Booting(b) => b.complete_at(), _ => now };
        term.tick(done);

        term.key(KeyInput::Up, done);
        assert_eq!(term.input_mut().as_str(), "");
        term.run_line("history", done);
        assert_eq!(last(&term), "   1  ".to_string() + &term.history[0].at.format("%H:%M:%S  ").to_string() + "history");
        assert_eq!(term.history.len(), 1);
    }

    #[test]
    fn exit_closes_the_widget() {
        let (mut term, now) = booted(None);
        term.run_line("exit", now);
        assert!(!term.is_open());
        assert!(term.transcript().is_empty());
        assert_eq!(term.status(), CLOSED_STATUS);
    }
}
