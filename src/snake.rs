//! Fixed-tick snake on a toroidal grid.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use rand::Rng;

pub const GRID_SIZE:  i32 = 20;
pub const TICK:       Duration = Duration::from_millis(150);
pub const FOOD_SCORE: u32 = 10;
pub const START:      Cell = Cell { x: 10, y: 10 };

/// Ticks replayed at most per frame after a stall.
const MAX_CATCH_UP: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cell { pub x: i32, pub y: i32 }

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction { Up, Down, Left, Right }

impl Direction {
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up    => (0, -1),
            Direction::Down  => (0, 1),
            Direction::Left  => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
    pub fn is_horizontal(self) -> bool { matches!(self, Direction::Left | Direction::Right) }
    #[cfg(test)]
    pub fn opposite(self) -> Self {
        match self {
            Direction::Up    => Direction::Down,
            Direction::Down  => Direction::Up,
            Direction::Left  => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step { Moved, Ate, Collided }

#[derive(Debug)]
pub struct Snake {
    grid:       i32,
    body:       VecDeque<Cell>,
    food:       Cell,
    heading:    Direction,
    queued:     Direction,
    score:      u32,
    high_score: u32,
    running:    bool,
    last_tick:  Option<Instant>,
}

impl Default for Snake {
    fn default() -> Self { Self::with_grid(GRID_SIZE) }
}

impl Snake {
    pub fn with_grid(grid: i32) -> Self {
        Self {
            grid, body: VecDeque::from([START]), food: START,
            heading: Direction::Right, queued: Direction::Right,
            score: 0, high_score: 0, running: false, last_tick: None,
        }
    }

    pub fn start<R: Rng + ?Sized>(&mut self, now: Instant, rng: &mut R) {
        let start = Cell { x: START.x.rem_euclid(self.grid), y: START.y.rem_euclid(self.grid) };
        self.body      = VecDeque::from([start]);
        self.heading   = Direction::Right;
        self.queued    = Direction::Right;
        self.score     = 0;
        self.running   = true;
        self.last_tick = Some(now);
        self.place_food(rng);
    }

    /// Food may land on the body; placement is uniform over the whole grid.
    pub fn place_food<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.food = Cell { x: rng.gen_range(0..self.grid), y: rng.gen_range(0..self.grid) };
    }

    /// Turns on the axis of the last completed move are ignored.
    pub fn steer(&mut self, dir: Direction) -> bool {
        if !self.running || dir.is_horizontal() == self.heading.is_horizontal() { return false; }
        self.queued = dir;
        true
    }

    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Step {
        let head = *self.body.back().unwrap_or(&START);
        let (dx, dy) = self.queued.delta();
        let next = Cell { x: (head.x + dx).rem_euclid(self.grid), y: (head.y + dy).rem_euclid(self.grid) };
        self.heading = self.queued;

        if self.body.contains(&next) {
            self.running = false;
            return Step::Collided;
        }
        self.body.push_back(next);
        if next == self.food {
            self.score += FOOD_SCORE;
            self.high_score = self.high_score.max(self.score);
            self.place_food(rng);
            Step::Ate
        } else {
            self.body.pop_front();
            Step::Moved
        }
    }

    /// Advances by whole ticks elapsed since the last one. Returns `Collided` if the game ended.
    pub fn tick<R: Rng + ?Sized>(&mut self, now: Instant, rng: &mut R) -> Option<Step> {
        let last = self.last_tick?;
        if !self.running { return None; }
        let mut outcome = None;
        let mut at = last;
        for _ in 0..MAX_CATCH_UP {
            if now.duration_since(at) < TICK { break; }
            at += TICK;
            let step = self.step(rng);
            outcome = Some(step);
            if step == Step::Collided { break; }
        }
        // drop any backlog beyond the catch-up window
        self.last_tick = Some(if now.duration_since(at) >= TICK { now } else { at });
        outcome
    }

    /// Ends the game and reports the final score.
    pub fn stop(&mut self) -> u32 {
        self.running = false;
        self.last_tick = None;
        self.score
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool { self.running }
    pub fn score(&self) -> u32 { self.score }
    pub fn high_score(&self) -> u32 { self.high_score }
    pub fn food(&self) -> Cell { self.food }
    #[cfg(test)]
    pub fn heading(&self) -> Direction { self.heading }
    pub fn grid(&self) -> i32 { self.grid }
    pub fn len(&self) -> usize { self.body.len() }
    #[cfg(test)]
    pub fn head(&self) -> Option<Cell> { self.body.back().copied() }
    pub fn body(&self) -> impl Iterator<Item = &Cell> { self.body.iter() }

    #[cfg(test)]
    pub(crate) fn set_food(&mut self, cell: Cell) { self.food = cell; }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn started() -> (Snake, StdRng, Instant) {
        let mut rng = StdRng::seed_from_u64(11);
        let now = Instant::now();
        let mut s = Snake::default();
        s.start(now, &mut rng);
        (s, rng, now)
    }

    #[test]
    fn starts_at_fixed_cell_with_zero_score() {
        let (s, _, _) = started();
        assert!(s.is_running());
        assert_eq!(s.len(), 1);
        assert_eq!(s.head(), Some(START));
        assert_eq!(s.score(), 0);
        let f = s.food();
        assert!((0..GRID_SIZE).contains(&f.x) && (0..GRID_SIZE).contains(&f.y));
    }

    #[test]
    fn reversal_is_rejected_even_with_two_quick_turns() {
        let (mut s, _, _) = started();
        assert!(!s.steer(Direction::Left));
        assert!(!s.steer(Direction::Right));
        assert!(s.steer(Direction::Up));
        // heading is still Right until the next move, so Left stays illegal
        assert!(!s.steer(Direction::Left));
        for dir in [Direction::Up, Direction::Down, Direction::Left, Direction::Right] {
            let before = s.heading();
            s.steer(dir);
            assert_ne!(s.queued, before.opposite());
        }
    }

    #[test]
    fn wraps_around_edges() {
        let (mut s, mut rng, _) = started();
        s.set_food(Cell { x: 0, y: 0 });
        for _ in 0..10 { assert_eq!(s.step(&mut rng), Step::Moved); }
        assert_eq!(s.head(), Some(Cell { x: 0, y: 10 }));
        assert!(s.steer(Direction::Up));
        for _ in 0..11 { s.set_food(Cell { x: 5, y: 5 }); s.step(&mut rng); }
        assert_eq!(s.head(), Some(Cell { x: 0, y: 19 }));
    }

    #[test]
    fn eating_grows_by_one_and_scores() {
        let (mut s, mut rng, _) = started();
        for n in 1..=4u32 {
            let head = s.head().unwrap_or(START);
            s.set_food(Cell { x: (head.x + 1).rem_euclid(GRID_SIZE), y: head.y });
            assert_eq!(s.step(&mut rng), Step::Ate);
            assert_eq!(s.len(), 1 + n as usize);
            assert_eq!(s.score(), n * FOOD_SCORE);
        }
        assert_eq!(s.high_score(), 40);
    }

    #[test]
    fn self_collision_ends_the_game() {
        let (mut s, mut rng, _) = started();
        // grow to five cells in a row, then curl back into the body
        for _ in 0..4 {
            let head = s.head().unwrap_or(START);
            s.set_food(Cell { x: head.x + 1, y: head.y });
            s.step(&mut rng);
        }
        s.set_food(Cell { x: 0, y: 0 });
        assert!(s.steer(Direction::Down)); s.step(&mut rng);
        assert!(s.steer(Direction::Left)); s.step(&mut rng);
        assert!(s.steer(Direction::Up));
        assert_eq!(s.step(&mut rng), Step::Collided);
        assert!(!s.is_running());
        assert_eq!(s.stop(), 40);
    }

    #[test]
    fn high_score_survives_restart() {
        let (mut s, mut rng, now) = started();
        s.set_food(Cell { x: 11, y: 10 });
        s.step(&mut rng);
        s.stop();
        s.start(now, &mut rng);
        assert_eq!(s.score(), 0);
        assert_eq!(s.high_score(), 10);
    }

    #[test]
    fn tick_moves_only_on_whole_periods() {
        let (mut s, mut rng, now) = started();
        s.set_food(Cell { x: 0, y: 0 });
        assert_eq!(s.tick(now + TICK / 2, &mut rng), None);
        assert_eq!(s.tick(now + TICK, &mut rng), Some(Step::Moved));
        assert_eq!(s.head(), Some(Cell { x: 11, y: 10 }));
        assert_eq!(s.tick(now + TICK + TICK / 2, &mut rng), None);
    }

    #[test]
    fn food_can_spawn_under_the_body() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut s = Snake::with_grid(1);
        s.start(Instant::now(), &mut rng);
        assert_eq!(s.food(), Cell { x: 0, y: 0 });
        assert_eq!(s.head(), Some(Cell { x: 0, y: 0 }));
    }
}
