//! Command table and the pure handlers behind it.
//!
//! A handler never touches terminal state. It returns a `Reply`: lines to append and
//! at most one `Effect` for the terminal to apply before the next input is accepted.

use chrono::{DateTime, Local};
use serde_json::json;

use crate::catalog::{self, NOTES, PROJECTS};
use crate::remote::{Flavor, RemoteRequest};
use crate::theme::Accent;
use crate::transcript::{block, Line, Tone};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandKind {
    Help, Ls, Cat, Projects, Analyze, Ai, Draw, Roast, Fortune,
    Scan, Theme, Snake, Matrix, Sudo, History, Clear, Reboot, Exit,
}

pub struct CommandSpec {
    pub name:    &'static str,
    pub kind:    CommandKind,
    pub usage:   &'static str,
    pub summary: &'static str,
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec { name: "ai",       kind: CommandKind::Ai,       usage: "ai [query]",   summary: "Ask demondOS" },
    CommandSpec { name: "draw",     kind: CommandKind::Draw,     usage: "draw [txt]",   summary: "Generate ASCII art" },
    CommandSpec { name: "analyze",  kind: CommandKind::Analyze,  usage: "analyze [id]", summary: "Project critique" },
    CommandSpec { name: "roast",    kind: CommandKind::Roast,    usage: "roast",        summary: "System banter" },
    CommandSpec { name: "fortune",  kind: CommandKind::Fortune,  usage: "fortune",      summary: "Oracle query" },
    CommandSpec { name: "projects", kind: CommandKind::Projects, usage: "projects",     summary: "Project index" },
    CommandSpec { name: "history",  kind: CommandKind::History,  usage: "history",      summary: "Session log" },
    CommandSpec { name: "ls",       kind: CommandKind::Ls,       usage: "ls",           summary: "List directories" },
    CommandSpec { name: "cat",      kind: CommandKind::Cat,      usage: "cat [file]",   summary: "Read content" },
    CommandSpec { name: "scan",     kind: CommandKind::Scan,     usage: "scan",         summary: "Diagnostics" },
    CommandSpec { name: "theme",    kind: CommandKind::Theme,    usage: "theme [val]",  summary: "UI color shift" },
    CommandSpec { name: "snake",    kind: CommandKind::Snake,    usage: "snake",        summary: "Launch Game" },
    CommandSpec { name: "matrix",   kind: CommandKind::Matrix,   usage: "matrix",       summary: "Enter the void" },
    CommandSpec { name: "reboot",   kind: CommandKind::Reboot,   usage: "reboot",       summary: "Restart system" },
    CommandSpec { name: "help",     kind: CommandKind::Help,     usage: "help",         summary: "This screen" },
    CommandSpec { name: "sudo",     kind: CommandKind::Sudo,     usage: "sudo",         summary: "Elevate" },
    CommandSpec { name: "clear",    kind: CommandKind::Clear,    usage: "clear",        summary: "Wipe transcript" },
    CommandSpec { name: "exit",     kind: CommandKind::Exit,     usage: "exit",         summary: "Close terminal" },
];

pub fn lookup(name: &str) -> Option<CommandKind> {
    COMMANDS.iter().find(|c| c.name.eq_ignore_ascii_case(name)).map(|c| c.kind)
}

#[derive(Debug, PartialEq)]
pub struct Invocation<'a> {
    pub line: &'a str,
    pub name: &'a str,
    pub args: Vec<&'a str>,
}

/// None for empty or whitespace-only input.
pub fn parse(line: &str) -> Option<Invocation<'_>> {
    let line = line.trim();
    let mut tokens = line.split_whitespace();
    let name = tokens.next()?;
    Some(Invocation { line, name, args: tokens.collect() })
}

#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    Clear,
    Close,
    Reboot,
    StartGame,
    StartVisualizer,
    StartScan,
    SetAccent(Accent),
    Remote(RemoteRequest),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reply {
    pub lines:  Vec<Line>,
    pub effect: Option<Effect>,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self { Self { lines: vec![Line::plain(text)], effect: None } }
    fn lines(lines: Vec<Line>) -> Self { Self { lines, effect: None } }
    fn effect(effect: Effect) -> Self { Self { lines: Vec::new(), effect: Some(effect) } }
    fn with(mut self, effect: Effect) -> Self { self.effect = Some(effect); self }
}

#[derive(Clone, Debug)]
pub struct HistoryItem { pub at: DateTime<Local>, pub line: String }

pub struct Context<'a> { pub history: &'a [HistoryItem] }

pub fn not_found(name: &str) -> Reply {
    Reply::text(format!("Command not found: {name}. Type \"help\"."))
}

pub fn execute(kind: CommandKind, args: &[&str], ctx: &Context) -> Reply {
    log::debug!("dispatch {kind:?} {args:?}");
    let joined = args.join(" ");
    match kind {
        CommandKind::Help     => help(),
        CommandKind::Ls       => Reply::lines(vec![
            Line::new("projects/", Tone::Directory).span("    ", Tone::Plain).span("notes/", Tone::Directory),
            Line::new("system_log.txt", Tone::Muted).span("  ", Tone::Plain).span("readme.md", Tone::Muted),
        ]),
        CommandKind::Cat      => cat(args.first().copied()),
        CommandKind::Projects => projects(),
        CommandKind::Analyze  => analyze(args.first().copied()),
        CommandKind::Ai if joined.is_empty()   => Reply::text("Usage: ai <prompt>"),
        CommandKind::Ai       => Reply::effect(Effect::Remote(RemoteRequest::new(Flavor::Chat, joined))),
        CommandKind::Draw if joined.is_empty() => Reply::text("Usage: draw <prompt>"),
        CommandKind::Draw     => Reply::effect(Effect::Remote(RemoteRequest::new(Flavor::Ascii, joined))),
        CommandKind::Roast    => {
            let prompt = if joined.is_empty() { "Roast me for being a guest user.".to_string() } else { joined };
            Reply::effect(Effect::Remote(RemoteRequest::new(Flavor::Roast, prompt)))
        }
        CommandKind::Fortune  => Reply::effect(Effect::Remote(RemoteRequest::new(Flavor::Fortune, "Generate fortune."))),
        CommandKind::Scan     => Reply::effect(Effect::StartScan),
        CommandKind::Theme    => theme(args.first().copied()),
        CommandKind::Snake    => Reply::text("Initializing graphical interface...").with(Effect::StartGame),
        CommandKind::Matrix   => Reply::text("Entering the void... (Press ESC to return)").with(Effect::StartVisualizer),
        CommandKind::Sudo     => Reply::lines(vec![
            Line::new("Password for guest: ", Tone::Muted).span("********", Tone::Error),
            Line::new("ACCESS DENIED. This incident will be reported.", Tone::Warning),
        ]),
        CommandKind::History  => history(ctx.history),
        CommandKind::Clear    => Reply::effect(Effect::Clear),
        CommandKind::Reboot   => Reply::effect(Effect::Reboot),
        CommandKind::Exit     => Reply::effect(Effect::Close),
    }
}

fn help() -> Reply {
    let mut lines = vec![Line::new("AVAILABLE MODULES v2.5:", Tone::Bright)];
    lines.extend(COMMANDS.chunks(2).map(|row| {
        row.iter().fold(Line::default(), |line, c| {
            line.span(format!("{:<14}", c.usage), Tone::Accent).span(format!(":: {:<22}", c.summary), Tone::Muted)
        })
    }));
    Reply::lines(lines)
}

fn projects() -> Reply {
    let mut lines: Vec<Line> = PROJECTS.iter().take(5).map(|p| {
        Line::new("➜ ", Tone::Accent)
            .span(format!("{:<4}", p.id), Tone::Bright)
            .span(p.title, Tone::Plain)
    }).collect();
    lines.push(Line::new("... type 'analyze [id]' for full schematic.", Tone::Muted));
    Reply::lines(lines)
}

fn analyze(id: Option<&str>) -> Reply {
    let Some(id) = id else { return Reply::text("Usage: analyze <project_id>") };
    match catalog::project(id) {
        Some(p) => Reply::effect(Effect::Remote(
            RemoteRequest::new(Flavor::Analyze, "Analyze this project architectural choices.").with_context(p.context()),
        )),
        None => Reply::lines(vec![Line::error(format!("Error: Project ID {id} not found."))]),
    }
}

fn theme(name: Option<&str>) -> Reply {
    match name.and_then(Accent::from_name) {
        Some(accent) => Reply::text(format!("Theme updated to: {}", accent.name())).with(Effect::SetAccent(accent)),
        None         => Reply::text(format!("Available themes: {}", Accent::names())),
    }
}

fn json_block(value: &serde_json::Value) -> Reply {
    let text = serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("json error: {e}"));
    Reply::lines(block(&text, Tone::Muted))
}

fn cat(path: Option<&str>) -> Reply {
    let Some(path) = path else { return Reply::text("Usage: cat [filename]") };
    if path == "projects" || path == "projects/" {
        return Reply::text("Is a directory.");
    }
    if let Some(file) = path.strip_prefix("projects/") {
        if file == "*" {
            let index: Vec<_> = PROJECTS.iter().map(|p| json!({ "file": format!("{}.json", p.id), "title": p.title })).collect();
            return json_block(&json!(index));
        }
        return match catalog::project_file(file) {
            Some(p) => json_block(&json!(p)),
            None    => Reply::text(format!("cat: projects/{file}: No such file or directory")),
        };
    }
    if let Some(file) = path.strip_prefix("notes/") {
        if file.is_empty() || file == "*" {
            let index: Vec<_> = NOTES.iter().map(|n| json!({ "file": format!("{}.md", n.id), "title": n.title })).collect();
            return json_block(&json!(index));
        }
        return match catalog::note_file(file) {
            Some(n) => Reply::lines(block(&n.render(), Tone::Muted)),
            None    => Reply::text(format!("cat: notes/{file}: No such file or directory")),
        };
    }
    match path {
        "readme.md"      => Reply::text("demondOS: a native CLI for personal branding."),
        "system_log.txt" => Reply::text("Log: System boot successful. User session active."),
        _                => Reply::text(format!("cat: {path}: No such file or directory")),
    }
}

fn history(items: &[HistoryItem]) -> Reply {
    if items.is_empty() { return Reply::text("(no history)"); }
    Reply::lines(items.iter().enumerate().map(|(i, h)| {
        Line::new(format!("{:>4}  ", i + 1), Tone::Muted)
            .span(h.at.format("%H:%M:%S  ").to_string(), Tone::Muted)
            .span(h.line.clone(), Tone::Plain)
    }).collect())
}
