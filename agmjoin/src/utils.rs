/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;
use std::time::{Duration, Instant};

/// Records how long each named phase of a run took.
#[derive(Debug, Clone)]
pub struct Timer {
    started: Instant,
    last: Instant,
    phases: Vec<(&'static str, Duration)>,
}

impl Timer {
    pub fn new() -> Self {
        let now = Instant::now();
        Timer {
            started: now,
            last: now,
            phases: Vec::new(),
        }
    }

    /// Closes the current phase under `name` and starts the next one.
    pub fn lap(&mut self, name: &'static str) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last);
        self.last = now;
        self.phases.push((name, elapsed));
        elapsed
    }

    pub fn phases(&self) -> &[(&'static str, Duration)] {
        &self.phases
    }

    pub fn phase(&self, name: &str) -> Option<Duration> {
        self.phases
            .iter()
            .filter(|(phase, _)| *phase == name)
            .map(|(_, elapsed)| *elapsed)
            .reduce(|a, b| a + b)
    }

    /// Time since the timer was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Timer::new()
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, elapsed) in &self.phases {
            writeln!(f, "{} time: {:.6}", name, elapsed.as_secs_f64())?;
        }
        write!(f, "total time: {:.6}", self.elapsed().as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_laps_are_recorded_in_order() {
        let mut timer = Timer::new();
        timer.lap("opt");
        timer.lap("sort");
        timer.lap("join");
        let names: Vec<&str> = timer.phases().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["opt", "sort", "join"]);

        let summed: Duration = timer.phases().iter().map(|(_, d)| *d).sum();
        assert!(summed <= timer.elapsed());
        assert!(timer.phase("sort").is_some());
        assert!(timer.phase("missing").is_none());
    }

    #[test]
    fn test_display_lists_phases() {
        let mut timer = Timer::new();
        timer.lap("opt");
        let text = timer.to_string();
        assert!(text.starts_with("opt time: "));
        assert!(text.contains("total time: "));
    }
}
