//! Outbound text-generation calls and the events they feed back to the terminal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context as AnyhowCtx, Result};
use crossbeam_channel::Sender;
use futures::StreamExt;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthChar;

use crate::transcript::EntryId;

pub const FAILURE_LINE: &str = "Error: Neural Uplink Failed.";
pub const OFFLINE_LINE: &str = "Error: Neural Uplink offline (ai_enabled = false).";
pub const ASCII_MAX_COLS: usize = 60;

const ASCII_SYSTEM: &str = "You are an ASCII art generator. Generate ASCII art for the prompt. \
                            Max width 60 chars. Return ONLY raw ASCII text. No markdown fences.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Flavor { Chat, Roast, Analyze, Fortune, Ascii }

impl Flavor {
    /// Fortunes are one line, so they use the single complete response mode.
    pub fn streams(self) -> bool { !matches!(self, Flavor::Fortune) }

    pub fn instruction(self, base: &str) -> String {
        match self {
            Flavor::Chat    => base.to_string(),
            Flavor::Roast   => format!("{base} You are in 'Security Kernel' mode. Roast the user gently. Be sarcastic but funny."),
            Flavor::Analyze => format!("{base} You are in 'Architect Mode'. Analyze the provided project data. \
                                        Be professional, critical, and highlight stack choices. Keep it structured."),
            Flavor::Fortune => format!("{base} You are a digital oracle. Provide a cryptic, philosophical fortune \
                                        about entropy and code. Max 1 sentence."),
            Flavor::Ascii   => ASCII_SYSTEM.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RemoteRequest {
    pub flavor:  Flavor,
    pub prompt:  String,
    pub context: Option<String>,
}

impl RemoteRequest {
    pub fn new(flavor: Flavor, prompt: impl Into<String>) -> Self {
        Self { flavor, prompt: prompt.into(), context: None }
    }
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
    pub fn full_prompt(&self) -> String {
        match &self.context {
            Some(ctx) => format!("Context: {ctx}\n\nUser Query: {}", self.prompt),
            None      => self.prompt.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Persona { pub model: String, pub system: String }

/// Shared flag a worker polls between chunks.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) { self.0.store(true, Ordering::Relaxed); }
    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::Relaxed) }
}

#[derive(Clone, Debug)]
pub struct Job {
    pub session: u64,
    pub entry:   EntryId,
    pub persona: Persona,
    pub prompt:  String,
    pub stream:  bool,
    pub cancel:  CancelFlag,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RemoteEventKind { Chunk(String), Done, Failed(String) }

#[derive(Clone, Debug, PartialEq)]
pub struct RemoteEvent {
    pub session: u64,
    pub entry:   EntryId,
    pub kind:    RemoteEventKind,
}

/// Runs a job off the UI thread; every job ends with exactly one `Done` or `Failed`.
pub trait Backend: Send + Sync {
    fn dispatch(&self, job: Job, tx: Sender<RemoteEvent>);
}

#[derive(Serialize)]
struct GenerateReq<'a> { model: &'a str, system: &'a str, prompt: &'a str, stream: bool }

#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct GenerateChunk {
    #[serde(default)] pub response: String,
    #[serde(default)] pub done:     bool,
    #[serde(default)] pub error:    Option<String>,
}

/// Splits a newline-delimited JSON body that may arrive cut at arbitrary byte offsets.
#[derive(Debug, Default)]
pub struct NdjsonDecoder { buf: Vec<u8> }

impl NdjsonDecoder {
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<GenerateChunk>> {
        self.buf.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if let Some(chunk) = Self::parse(&line)? { out.push(chunk); }
        }
        Ok(out)
    }

    pub fn finish(mut self) -> Result<Option<GenerateChunk>> {
        let rest = std::mem::take(&mut self.buf);
        Self::parse(&rest)
    }

    fn parse(line: &[u8]) -> Result<Option<GenerateChunk>> {
        let text = std::str::from_utf8(line).context("stream chunk is not utf-8")?.trim();
        if text.is_empty() { return Ok(None); }
        let chunk = serde_json::from_str(text).with_context(|| format!("malformed chunk: {text}"))?;
        Ok(Some(chunk))
    }
}

pub fn generate_url(endpoint: &str) -> String {
    if endpoint.ends_with("/api/chat") {
        endpoint.replace("/api/chat", "/api/generate")
    } else if endpoint.ends_with("/api/generate") {
        endpoint.to_string()
    } else {
        format!("{}/api/generate", endpoint.trim_end_matches('/'))
    }
}

/// Short operator-facing reason for the log.
pub fn describe(err: &anyhow::Error, model: &str) -> String {
    let text = format!("{err:#}");
    if text.contains("404") {
        format!("model not found, run: ollama pull {model}")
    } else if text.contains("Connection refused") || text.contains("error sending request") {
        "Ollama not running, start it: ollama serve".into()
    } else {
        text
    }
}

lazy_static! {
    static ref FENCE: Regex = Regex::new(r"(?m)^[ \t]*```[A-Za-z0-9_+-]*[ \t]*\r?$\n?").unwrap();
}

pub fn strip_fences(text: &str) -> String {
    FENCE.replace_all(text, "").trim_start_matches(['\r', '\n']).trim_end().to_string()
}

pub fn clip_columns(text: &str, max_cols: usize) -> String {
    text.lines().map(|line| {
        let mut width = 0;
        line.chars().take_while(|c| {
            width += c.width().unwrap_or(0);
            width <= max_cols
        }).collect::<String>()
    }).collect::<Vec<_>>().join("\n")
}

/// Final text shown once a response has ended.
pub fn finalize(flavor: Flavor, text: &str) -> String {
    let clean = strip_fences(text);
    if flavor == Flavor::Ascii { clip_columns(&clean, ASCII_MAX_COLS) } else { clean }
}

/// Ollama-compatible `/api/generate` client.
#[derive(Clone, Debug)]
pub struct OllamaBackend { pub endpoint: String, pub timeout: Duration }

impl OllamaBackend {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self { endpoint: endpoint.into(), timeout }
    }
}

impl Backend for OllamaBackend {
    fn dispatch(&self, job: Job, tx: Sender<RemoteEvent>) {
        let url     = generate_url(&self.endpoint);
        let timeout = self.timeout;
        thread::spawn(move || {
            let (session, entry) = (job.session, job.entry);
            let result = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Err(e) => Err(anyhow::Error::from(e).context("tokio runtime")),
                Ok(rt) => rt.block_on(run(&url, timeout, &job, &tx)),
            };
            let kind = match result {
                Ok(())   => RemoteEventKind::Done,
                Err(e)   => {
                    let reason = describe(&e, &job.persona.model);
                    log::warn!("uplink request {entry} failed: {reason}");
                    RemoteEventKind::Failed(reason)
                }
            };
            let _ = tx.send(RemoteEvent { session, entry, kind });
        });
    }
}

fn emit(tx: &Sender<RemoteEvent>, job: &Job, text: String) -> bool {
    tx.send(RemoteEvent { session: job.session, entry: job.entry, kind: RemoteEventKind::Chunk(text) }).is_ok()
}

/// Returns Ok(false) when the caller should stop reading.
fn forward(chunk: GenerateChunk, tx: &Sender<RemoteEvent>, job: &Job) -> Result<bool> {
    if let Some(err) = chunk.error { bail!("backend error: {err}"); }
    if !chunk.response.is_empty() && !emit(tx, job, chunk.response) { return Ok(false); }
    Ok(!chunk.done)
}

async fn run(url: &str, timeout: Duration, job: &Job, tx: &Sender<RemoteEvent>) -> Result<()> {
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(timeout)
        .build()?;
    let body = GenerateReq {
        model: &job.persona.model, system: &job.persona.system, prompt: &job.prompt, stream: job.stream,
    };
    log::debug!("uplink request {} -> {url} ({}, stream={})", job.entry, job.persona.model, job.stream);
    let resp = client.post(url).json(&body).send().await?.error_for_status()?;

    if !job.stream {
        let chunk = resp.json::<GenerateChunk>().await.context("decode response")?;
        if !job.cancel.is_cancelled() { forward(chunk, tx, job)?; }
        return Ok(());
    }

    let mut decoder = NdjsonDecoder::default();
    let mut body = resp.bytes_stream();
    while let Some(part) = body.next().await {
        if job.cancel.is_cancelled() {
            log::debug!("uplink request {} cancelled", job.entry);
            return Ok(());
        }
        let part = part.context("read stream")?;
        for chunk in decoder.feed(&part)? {
            if !forward(chunk, tx, job)? { return Ok(()); }
        }
    }
    if let Some(chunk) = decoder.finish()? { forward(chunk, tx, job)?; }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    #[test]
    fn prompt_carries_context_prefix() {
        let bare = RemoteRequest::new(Flavor::Chat, "hello");
        assert_eq!(bare.full_prompt(), "hello");
        let ctx = RemoteRequest::new(Flavor::Analyze, "why?").with_context("Project: x");
        assert_eq!(ctx.full_prompt(), "Context: Project: x\n\nUser Query: why?");
    }

    #[test]
    fn ascii_replaces_the_persona_others_extend_it() {
        let base = "You are demondOS.";
        assert_eq!(Flavor::Chat.instruction(base), base);
        assert!(Flavor::Roast.instruction(base).starts_with(base));
        assert!(Flavor::Fortune.instruction(base).contains("Max 1 sentence"));
        assert!(!Flavor::Ascii.instruction(base).contains(base));
        assert!(!Flavor::Fortune.streams());
        assert!(Flavor::Ascii.streams());
    }

    #[test]
    fn decoder_joins_chunks_split_mid_line() {
        let mut d = NdjsonDecoder::default();
        assert!(d.feed(br#"{"response":"Hel"#).unwrap().is_empty());
        let got = d.feed(b"lo\",\"done\":false}\n\n{\"response\":\" there\"}\n").unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].response, "Hello");
        assert_eq!(got[1].response, " there");
        let tail = NdjsonDecoder { buf: br#"{"response":"","done":true}"#.to_vec() }.finish().unwrap();
        assert_eq!(tail.map(|c| c.done), Some(true));
    }

    #[test]
    fn decoder_rejects_garbage() {
        let mut d = NdjsonDecoder::default();
        assert!(d.feed(b"<html>oops</html>\n").is_err());
    }

    #[test]
    fn endpoint_normalisation() {
        assert_eq!(generate_url("http://h:11434"), "http://h:11434/api/generate");
        assert_eq!(generate_url("http://h:11434/"), "http://h:11434/api/generate");
        assert_eq!(generate_url("http://h/api/chat"), "http://h/api/generate");
        assert_eq!(generate_url("http://h/api/generate"), "http://h/api/generate");
    }

    #[test]
    fn fences_are_stripped_and_ascii_clipped() {
        let raw = "```text\n /\\_/\\\n( o.o )\n```\n";
        assert_eq!(strip_fences(raw), " /\\_/\\\n( o.o )");
        let wide = "x".repeat(80);
        assert_eq!(finalize(Flavor::Ascii, &wide).len(), ASCII_MAX_COLS);
        assert_eq!(finalize(Flavor::Chat, &wide).len(), 80);
    }

    #[test]
    fn wide_glyphs_count_double() {
        assert_eq!(clip_columns("アイウ", 4), "アイ");
    }

    fn job(stream: bool) -> Job {
        Job {
            session: 1, entry: 9,
            persona: Persona { model: "m".into(), system: "s".into() },
            prompt: "p".into(), stream, cancel: CancelFlag::default(),
        }
    }

    /// One-shot HTTP server: reads a full request, answers with `status` and `body`.
    fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut req = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = sock.read(&mut buf).unwrap();
                if n == 0 { break; }
                req.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&req).to_string();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let len = text[..head_end].lines()
                        .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().to_string()))
                        .and_then(|v| v.parse::<usize>().ok())
                        .unwrap_or(0);
                    if req.len() >= head_end + 4 + len { break; }
                }
            }
            let resp = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/x-ndjson\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(resp.as_bytes()).unwrap();
        });
        format!("http://{addr}")
    }

    fn collect(rx: &crossbeam_channel::Receiver<RemoteEvent>) -> Vec<RemoteEventKind> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.recv_timeout(Duration::from_secs(10)) {
            let last = matches!(ev.kind, RemoteEventKind::Done | RemoteEventKind::Failed(_));
            assert_eq!((ev.session, ev.entry), (1, 9));
            out.push(ev.kind);
            if last { break; }
        }
        out
    }

    #[test]
    fn streaming_backend_relays_chunks_then_done() {
        let url = serve_once("200 OK", "{\"response\":\"neon \"}\n{\"response\":\"rain\"}\n{\"response\":\"\",\"done\":true}\n");
        let (tx, rx) = crossbeam_channel::unbounded();
        OllamaBackend::new(url, Duration::from_secs(10)).dispatch(job(true), tx);
        assert_eq!(collect(&rx), vec![
            RemoteEventKind::Chunk("neon ".into()),
            RemoteEventKind::Chunk("rain".into()),
            RemoteEventKind::Done,
        ]);
    }

    #[test]
    fn complete_mode_sends_one_chunk() {
        let url = serve_once("200 OK", "{\"response\":\"Entropy compiles.\",\"done\":true}");
        let (tx, rx) = crossbeam_channel::unbounded();
        OllamaBackend::new(url, Duration::from_secs(10)).dispatch(job(false), tx);
        assert_eq!(collect(&rx), vec![RemoteEventKind::Chunk("Entropy compiles.".into()), RemoteEventKind::Done]);
    }

    #[test]
    fn http_errors_end_in_a_single_failure() {
        let url = serve_once("500 Internal Server Error", "boom");
        let (tx, rx) = crossbeam_channel::unbounded();
        OllamaBackend::new(url, Duration::from_secs(10)).dispatch(job(true), tx);
        let events = collect(&rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], RemoteEventKind::Failed(_)));
    }

    #[test]
    fn backend_error_lines_fail_the_stream() {
        let url = serve_once("200 OK", "{\"response\":\"a\"}\n{\"error\":\"model crashed\"}\n");
        let (tx, rx) = crossbeam_channel::unbounded();
        OllamaBackend::new(url, Duration::from_secs(10)).dispatch(job(true), tx);
        let events = collect(&rx);
        assert_eq!(events[0], RemoteEventKind::Chunk("a".into()));
        assert!(matches!(&events[1], RemoteEventKind::Failed(r) if r.contains("model crashed")));
    }
}
