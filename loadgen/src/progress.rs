use std::io::Write;
use std::time::Duration;

use tokio::time::Instant;

use crate::statistics::{RunSummary, Tally};

/// Receives updates from the runner as workers report.
pub trait Progress {
    fn batch_started(&mut self, _index: usize, _size: usize) {}

    fn update(&mut self, tally: &Tally);

    /// Called once a batch has fully drained.
    fn batch_finished(&mut self, _index: usize, _tally: &Tally) {}

    /// Called before the runner writes its own diagnostics.
    fn interrupt(&mut self) {}

    fn finish(&mut self, _summary: &RunSummary) {}
}

/// Discards every update.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn update(&mut self, _tally: &Tally) {}
}

/// What the live line counts towards the goal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Counting {
    Completed,
    Successes,
}

/// Rewrites a single status line in place.
///
/// Redraws are throttled, except for the final state of a batch, the goal
/// being reached and the end of the run, which are always drawn.
pub struct ConsoleProgress<W> {
    out: W,
    goal: u64,
    counting: Counting,
    batch: usize,
    min_interval: Duration,
    last_draw: Option<Instant>,
    line_open: bool,
}

impl<W: Write> ConsoleProgress<W> {
    #[must_use]
    pub fn new(out: W, goal: u64, counting: Counting) -> Self {
        Self {
            out,
            goal,
            counting,
            batch: 0,
            min_interval: Duration::from_millis(100),
            last_draw: None,
            line_open: false,
        }
    }

    #[must_use]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&self, tally: &Tally) -> String {
        let done = match self.counting {
            Counting::Completed => tally.completed(),
            Counting::Successes => tally.success,
        };
        let pct = if self.goal == 0 {
            100.0
        } else {
            (done.min(self.goal) as f64 / self.goal as f64) * 100.0
        };
        let mut line = format!(
            "{done}/{} ({pct:5.1}%) | ok {} | failed {}",
            self.goal, tally.success, tally.failed
        );
        if self.counting == Counting::Successes {
            line.push_str(&format!(" | batch {}", self.batch));
        }
        line
    }

    fn draw(&mut self, tally: &Tally) {
        let line = self.line(tally);
        // Progress output is best effort.
        let _ = write!(self.out, "\r\x1b[2K{line}");
        let _ = self.out.flush();
        self.last_draw = Some(Instant::now());
        self.line_open = true;
    }

    fn end_line(&mut self) {
        if self.line_open {
            let _ = writeln!(self.out);
            let _ = self.out.flush();
            self.line_open = false;
        }
    }
}

impl<W: Write> Progress for ConsoleProgress<W> {
    fn batch_started(&mut self, index: usize, _size: usize) {
        self.batch = index + 1;
    }

    fn update(&mut self, tally: &Tally) {
        let due = self
            .last_draw
            .map_or(true, |last| last.elapsed() >= self.min_interval);
        let reached = match self.counting {
            Counting::Completed => tally.completed() >= self.goal,
            Counting::Successes => tally.success >= self.goal,
        };
        if due || reached {
            self.draw(tally);
        }
    }

    fn batch_finished(&mut self, _index: usize, tally: &Tally) {
        self.draw(tally);
    }

    fn interrupt(&mut self) {
        self.end_line();
    }

    fn finish(&mut self, summary: &RunSummary) {
        self.draw(&summary.tally);
        self.end_line();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(progress: ConsoleProgress<Vec<u8>>) -> String {
        String::from_utf8(progress.into_inner()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn completed_line() {
        let mut progress = ConsoleProgress::new(Vec::new(), 4, Counting::Completed);
        progress.update(&Tally { success: 1, failed: 1 });
        let out = rendered(progress);
        assert!(out.ends_with("2/4 ( 50.0%) | ok 1 | failed 1"), "{out:?}");
        assert!(out.starts_with('\r'));
    }

    #[tokio::test(start_paused = true)]
    async fn throttles_intermediate_draws() {
        let mut progress = ConsoleProgress::new(Vec::new(), 10, Counting::Successes);
        progress.batch_started(0, 5);
        progress.update(&Tally { success: 1, failed: 0 });
        progress.update(&Tally { success: 2, failed: 0 });
        progress.update(&Tally { success: 10, failed: 0 });
        let out = rendered(progress);
        assert_eq!(out.matches('\r').count(), 2, "{out:?}");
        assert!(out.contains("1/10"));
        assert!(!out.contains("2/10"));
        assert!(out.ends_with("10/10 (100.0%) | ok 10 | failed 0 | batch 1"));
    }

    #[tokio::test(start_paused = true)]
    async fn batch_end_always_draws() {
        let mut progress = ConsoleProgress::new(Vec::new(), 10, Counting::Successes);
        progress.batch_started(0, 3);
        progress.update(&Tally { success: 1, failed: 0 });
        progress.update(&Tally { success: 2, failed: 1 });
        progress.batch_finished(0, &Tally { success: 2, failed: 1 });
        let out = rendered(progress);
        assert_eq!(out.matches('\r').count(), 2, "{out:?}");
        assert!(out.ends_with("2/10 ( 20.0%) | ok 2 | failed 1 | batch 1"), "{out:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_closes_open_line_once() {
        let mut progress = ConsoleProgress::new(Vec::new(), 4, Counting::Completed);
        progress.interrupt();
        progress.update(&Tally { success: 1, failed: 0 });
        progress.interrupt();
        progress.interrupt();
        let out = rendered(progress);
        assert_eq!(out.matches('\n').count(), 1, "{out:?}");
        assert!(out.ends_with("1/4 ( 25.0%) | ok 1 | failed 0\n"), "{out:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn finish_ends_line() {
        let mut progress = ConsoleProgress::new(Vec::new(), 0, Counting::Completed);
        progress.finish(&RunSummary::new("fixed"));
        let out = rendered(progress);
        assert!(out.ends_with("0/0 (100.0%) | ok 0 | failed 0\n"), "{out:?}");
    }
}
