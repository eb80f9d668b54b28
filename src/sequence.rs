//! Timed, scripted step sequences: the boot log and the inline diagnostic scan.
//!
//! A `Sequencer` turns a `Plan` into absolute deadlines when it is built. Nothing is
//! scheduled outside the value itself, so dropping it cancels every pending step.

use std::time::{Duration, Instant};

use rand::Rng;

use crate::transcript::EntryId;

pub const BOOT_LINES: &[&str] = &[
    "BIOS DATE 01/01/2025 14:22:51 VER 1.0.2",
    "CPU: QUANTUM NEURAL CORE @ 45.2 THz",
    "Checking Memory... 1048576K OK",
    "Detecting Primary Master ... demondOS_DRIVE",
    "Booting from Primary Master...",
    "Loading Kernel...",
    "Mounting File System...",
    "Initializing Neural Uplink...",
    "demondOS v2.5.0 Ready.",
];

pub const SCAN_TITLE: &str = "SYSTEM DIAGNOSTIC TOOL v2.1";

pub const SCAN_STEPS: &[&str] = &[
    "Initializing Neural Handshake...",
    "Verifying Identity Integrity...",
    "Scanning Memory Sectors...",
    "Calibrating Entropy Sensors...",
    "System Nominal.",
];

/// Millisecond ranges are half-open; an empty range means a fixed value.
#[derive(Clone, Copy, Debug)]
pub struct Plan {
    pub lead_ms:   (u64, u64),
    pub active_ms: (u64, u64),
    pub gap:       Duration,
    pub hold:      Duration,
}

pub const BOOT_PLAN: Plan = Plan {
    lead_ms:   (150, 350),
    active_ms: (0, 0),
    gap:       Duration::ZERO,
    hold:      Duration::from_millis(800),
};

pub const SCAN_PLAN: Plan = Plan {
    lead_ms:   (0, 0),
    active_ms: (300, 900),
    gap:       Duration::from_millis(100),
    hold:      Duration::from_millis(800),
};

fn jitter<R: Rng + ?Sized>(rng: &mut R, (lo, hi): (u64, u64)) -> Duration {
    let ms = if hi <= lo { lo } else { rng.gen_range(lo..hi) };
    Duration::from_millis(ms)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepStatus { Pending, Active(u8), Done }

#[derive(Clone, Copy, Debug)]
struct Step { starts: Instant, ends: Instant }

#[derive(Debug)]
pub struct Sequencer {
    steps:       Vec<Step>,
    complete_at: Instant,
    finished:    bool,
}

impl Sequencer {
    pub fn new<R: Rng + ?Sized>(plan: &Plan, count: usize, start: Instant, rng: &mut R) -> Self {
        let mut t = start;
        let mut steps = Vec::with_capacity(count);
        for _ in 0..count {
            t += jitter(rng, plan.lead_ms);
            let starts = t;
            t += jitter(rng, plan.active_ms);
            steps.push(Step { starts, ends: t });
            t += plan.gap;
        }
        Self { steps, complete_at: t + plan.hold, finished: false }
    }

    pub fn status(&self, idx: usize, now: Instant) -> StepStatus {
        let Some(step) = self.steps.get(idx) else { return StepStatus::Pending };
        if now < step.starts { return StepStatus::Pending; }
        if now >= step.ends { return StepStatus::Done; }
        let total   = (step.ends - step.starts).as_millis().max(1);
        let elapsed = (now - step.starts).as_millis();
        // 5% increments
        StepStatus::Active(((elapsed * 20 / total) * 5).min(100) as u8)
    }

    pub fn revealed(&self, now: Instant) -> usize {
        self.steps.iter().take_while(|s| s.starts <= now).count()
    }

    /// True exactly once, on the first poll at or after the completion deadline.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.finished || now < self.complete_at { return false; }
        self.finished = true;
        true
    }

    #[cfg(test)]
    pub fn complete_at(&self) -> Instant { self.complete_at }
}

#[derive(Debug)]
pub struct Boot { seq: Sequencer }

impl Boot {
    pub fn new<R: Rng + ?Sized>(start: Instant, rng: &mut R) -> Self {
        Self { seq: Sequencer::new(&BOOT_PLAN, BOOT_LINES.len(), start, rng) }
    }
    pub fn visible(&self, now: Instant) -> &'static [&'static str] {
        &BOOT_LINES[..self.seq.revealed(now)]
    }
    pub fn poll(&mut self, now: Instant) -> bool { self.seq.poll(now) }
    #[cfg(test)]
    pub fn complete_at(&self) -> Instant { self.seq.complete_at() }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScanView {
    pub title:    &'static str,
    pub steps:    Vec<(&'static str, StepStatus)>,
    pub progress: u8,
}

/// A running diagnostic bound to the transcript entry that renders it.
#[derive(Debug)]
pub struct Scan {
    pub entry: EntryId,
    seq:       Sequencer,
}

impl Scan {
    pub fn new<R: Rng + ?Sized>(entry: EntryId, start: Instant, rng: &mut R) -> Self {
        Self { entry, seq: Sequencer::new(&SCAN_PLAN, SCAN_STEPS.len(), start, rng) }
    }

    pub fn view(&self, now: Instant) -> ScanView {
        let steps: Vec<_> = SCAN_STEPS.iter().enumerate()
            .map(|(i, msg)| (*msg, self.seq.status(i, now)))
            .collect();
        let progress = steps.iter().find_map(|(_, s)| match s {
            StepStatus::Active(p) => Some(*p),
            _                     => None,
        }).unwrap_or(0);
        ScanView { title: SCAN_TITLE, steps, progress }
    }

    pub fn poll(&mut self, now: Instant) -> bool { self.seq.poll(now) }
    #[cfg(test)]
    pub fn complete_at(&self) -> Instant { self.seq.complete_at() }
}
