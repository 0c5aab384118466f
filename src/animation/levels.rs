// src/animation/levels.rs

//! Scrolling bar graph of audio levels.
//!
//! An external meter writes one level per line (plain decimal numbers) to a
//! file, FIFO or stdin. `LevelFeed` reads them on its own thread, shifts
//! each value into a history one column per level, paints the graph and
//! publishes it to a private hand-off.
//!
//! `LevelGraph` is step-gated on that feed: every step waits for the next
//! painted graph and takes it exactly once, so the wall scrolls with the
//! audio and a silent feed simply holds the last picture.

use super::{Animation, StepStatus};
use crate::color::Rgb;
use crate::handoff::ScreenHandoff;
use crate::input::PadState;
use crate::screen::{PanelLayout, Screen};
use anyhow::Context;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How long a step waits for the feed before repeating the last graph.
const STEP_WAIT: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    /// Where levels are read from; `-` is stdin. No feed runs when unset.
    pub path: Option<PathBuf>,
    /// Level that fills the full height of the wall.
    pub full_scale: f64,
}

impl Default for LevelConfig {
    fn default() -> Self {
        LevelConfig {
            path: None,
            full_scale: 30.0,
        }
    }
}

/// The last `width` levels, oldest on the left.
#[derive(Debug, Clone)]
pub struct LevelHistory {
    values: Vec<f64>,
    full_scale: f64,
}

impl LevelHistory {
    pub fn new(width: usize, full_scale: f64) -> Self {
        LevelHistory {
            values: vec![0.0; width],
            full_scale,
        }
    }

    pub fn push(&mut self, level: f64) {
        if self.values.is_empty() {
            return;
        }
        self.values.rotate_left(1);
        if let Some(last) = self.values.last_mut() {
            *last = level;
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Paints one bar per column. Lit rows are colored by height.
    pub fn paint(&self, screen: &mut Screen) {
        let height = screen.height() as f64;
        for (x, &level) in self.values.iter().enumerate() {
            let bar = level / self.full_scale * height;
            for y in 0..screen.height() {
                let color = if bar > height - y as f64 {
                    Rgb::from_hsv(y as f64 * 3.0, 0.7, 0.8)
                } else {
                    Rgb::BLACK
                };
                screen.set(x as i64, y as i64, color);
            }
        }
    }
}

/// Reader thread turning a stream of levels into painted graphs.
pub struct LevelFeed {
    frames: ScreenHandoff,
}

impl LevelFeed {
    /// Starts the feed configured by `config`, if any.
    pub fn open(config: &LevelConfig, layout: PanelLayout) -> anyhow::Result<Option<Arc<Self>>> {
        let Some(path) = &config.path else {
            return Ok(None);
        };
        let feed = if path.as_os_str() == "-" {
            info!("LevelFeed: reading levels from stdin");
            Self::spawn(BufReader::new(io::stdin()), layout, config.full_scale)
        } else {
            let file = File::open(path)
                .with_context(|| format!("Failed to open level source {}", path.display()))?;
            info!("LevelFeed: reading levels from {}", path.display());
            Self::spawn(BufReader::new(file), layout, config.full_scale)
        };
        Ok(Some(feed))
    }

    /// Reads levels from `reader` until it ends.
    pub fn spawn<R: BufRead + Send + 'static>(
        reader: R,
        layout: PanelLayout,
        full_scale: f64,
    ) -> Arc<Self> {
        let feed = Arc::new(LevelFeed {
            frames: ScreenHandoff::new(),
        });
        let shared = feed.clone();
        let spawned = thread::Builder::new()
            .name("level-feed".to_string())
            .spawn(move || {
                let mut history = LevelHistory::new(layout.width(), full_scale);
                let mut screen = Screen::new(layout);
                for line in reader.lines() {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            error!("LevelFeed: reading levels: {}", e);
                            return;
                        }
                    };
                    match line.trim().parse::<f64>() {
                        Ok(level) => {
                            history.push(level);
                            history.paint(&mut screen);
                            shared.frames.publish(&screen);
                        }
                        Err(e) => warn!("LevelFeed: skipping {:?}: {}", line, e),
                    }
                }
                info!("LevelFeed: level source closed");
            });
        if let Err(e) = spawned {
            error!("LevelFeed: failed to spawn reader thread: {}", e);
        }
        feed
    }

    /// The graph painted since the last call, waiting up to `timeout`.
    pub fn next_graph(&self, timeout: Duration) -> Option<Screen> {
        self.frames.wait_next(timeout)
    }
}

/// Shows the feed's graph, one new level per step.
pub struct LevelGraph {
    feed: Arc<LevelFeed>,
    current: Option<Screen>,
}

impl LevelGraph {
    pub fn new(feed: Arc<LevelFeed>) -> Self {
        LevelGraph {
            feed,
            current: None,
        }
    }
}

impl Animation for LevelGraph {
    fn name(&self) -> &'static str {
        "levels"
    }

    fn step(&mut self, _pads: &[PadState]) -> StepStatus {
        if let Some(graph) = self.feed.next_graph(STEP_WAIT) {
            self.current = Some(graph);
        }
        StepStatus::Running
    }

    fn paint(&self, screen: &mut Screen) {
        match &self.current {
            Some(graph) if graph.layout() == screen.layout() => screen.clone_from(graph),
            _ => screen.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Instant;
    use test_log::test;

    fn lit_rows(screen: &Screen, x: i64) -> Vec<i64> {
        (0..screen.height() as i64)
            .filter(|&y| screen.get(x, y) != Some(Rgb::BLACK))
            .collect()
    }

    #[test]
    fn history_scrolls_left() {
        let mut h = LevelHistory::new(3, 30.0);
        for v in [1.0, 2.0, 3.0, 4.0] {
            h.push(v);
        }
        assert_eq!(h.values(), &[2.0, 3.0, 4.0]);
    }

    #[test]
    fn bars_rise_from_the_bottom() {
        let layout = PanelLayout::new(1, 1);
        let mut h = LevelHistory::new(layout.width(), 30.0);
        h.push(20.0);
        let mut screen = Screen::new(layout);
        screen.fill((9, 9, 9));
        h.paint(&mut screen);
        // 20/30 of 18 rows is 12, strictly above 18 - y
        assert_eq!(lit_rows(&screen, 17), (7..18).collect::<Vec<_>>());
        assert_eq!(screen.get(17, 17), Some(Rgb::from_hsv(51.0, 0.7, 0.8)));
        assert!(lit_rows(&screen, 0).is_empty());
    }

    #[test]
    fn graph_takes_each_painted_level_once() {
        let layout = PanelLayout::new(1, 1);
        let feed = LevelFeed::spawn(Cursor::new("10\nnoise\n20\n"), layout, 30.0);
        let mut graph = LevelGraph::new(feed.clone());
        let mut screen = Screen::new(layout);

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            graph.step(&[]);
            graph.paint(&mut screen);
            if lit_rows(&screen, 16).len() == 5 && lit_rows(&screen, 17).len() == 11 {
                break;
            }
            assert!(Instant::now() < deadline, "feed never painted both levels");
        }

        // nothing new: the step times out and the graph stays put
        assert!(feed.next_graph(Duration::from_millis(10)).is_none());
        graph.step(&[]);
        graph.paint(&mut screen);
        assert_eq!(lit_rows(&screen, 17).len(), 11);
    }

    #[test]
    fn unset_path_runs_no_feed() {
        let feed = LevelFeed::open(&LevelConfig::default(), PanelLayout::new(1, 1)).unwrap();
        assert!(feed.is_none());
    }

    #[test]
    fn graph_without_levels_is_dark() {
        let layout = PanelLayout::new(1, 1);
        let feed = LevelFeed::spawn(Cursor::new(""), layout, 30.0);
        let mut graph = LevelGraph::new(feed);
        let mut screen = Screen::new(layout);
        screen.fill((5, 5, 5));
        graph.step(&[]);
        graph.paint(&mut screen);
        assert!(screen.as_bytes().iter().all(|&b| b == 0));
    }
}
