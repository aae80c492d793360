//! Input lines are latched here and only sampled by a core at instruction
//! boundaries; output lines are driven into a [`LineSink`].

use std::cell::RefCell;
use std::rc::Rc;

use crate::ConfigError;

/// Index of an input line on a specific core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct InputLine(pub u8);

impl InputLine {
    /// Array index of the line inside a latch.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Requested level for an input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum LineLevel {
    /// Line released.
    #[default]
    Clear,
    /// Line asserted until explicitly cleared.
    Assert,
    /// Line asserted until the core acknowledges the interrupt it raised.
    Hold,
}

impl LineLevel {
    /// Returns `true` for both asserting levels.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Assert | Self::Hold)
    }
}

/// How a core reacts to an input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Trigger {
    /// A clear-to-active transition is latched once.
    #[default]
    Edge,
    /// The line requests service at every boundary while active.
    Level,
}

/// Name and behavior of one input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineDescriptor {
    /// Name used for setup-time lookup.
    pub name: &'static str,
    /// Line index.
    pub line: InputLine,
    /// Trigger mode.
    pub trigger: Trigger,
}

impl LineDescriptor {
    /// Creates a descriptor.
    #[must_use]
    pub const fn new(name: &'static str, line: InputLine, trigger: Trigger) -> Self {
        Self {
            name,
            line,
            trigger,
        }
    }
}

/// Resolves a line name (case-insensitive) against a core's line table.
///
/// # Errors
///
/// Returns [`ConfigError::UnsupportedLine`] when no line carries `name`.
pub fn resolve_line(
    core: &'static str,
    lines: &[LineDescriptor],
    name: &str,
) -> Result<InputLine, ConfigError> {
    lines
        .iter()
        .find(|descriptor| descriptor.name.eq_ignore_ascii_case(name))
        .map(|descriptor| descriptor.line)
        .ok_or_else(|| ConfigError::UnsupportedLine {
            core,
            name: name.to_owned(),
        })
}

/// Requested levels plus latched rising edges for a fixed set of lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineLatch {
    levels: Vec<LineLevel>,
    edges: Vec<bool>,
}

impl LineLatch {
    /// Creates a latch with `count` lines, all clear.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            levels: vec![LineLevel::Clear; count],
            edges: vec![false; count],
        }
    }

    /// Number of lines in the latch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Returns `true` when the latch has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Records a requested level; a clear-to-active change latches an edge.
    pub fn set(&mut self, line: InputLine, level: LineLevel) {
        let index = line.index();
        let Some(slot) = self.levels.get_mut(index) else {
            tracing::warn!(line = line.0, "ignoring level change on unknown input line");
            return;
        };
        if !slot.is_active() && level.is_active() {
            self.edges[index] = true;
        }
        *slot = level;
    }

    /// Current requested level; unknown lines read as clear.
    #[must_use]
    pub fn level(&self, line: InputLine) -> LineLevel {
        self.levels
            .get(line.index())
            .copied()
            .unwrap_or(LineLevel::Clear)
    }

    /// Returns whether an edge is latched without consuming it.
    #[must_use]
    pub fn has_edge(&self, line: InputLine) -> bool {
        self.edges.get(line.index()).copied().unwrap_or(false)
    }

    /// Consumes a latched rising edge.
    pub fn take_edge(&mut self, line: InputLine) -> bool {
        self.edges
            .get_mut(line.index())
            .is_some_and(std::mem::take)
    }

    /// Samples a line according to its trigger mode.
    pub fn sample(&mut self, line: InputLine, trigger: Trigger) -> bool {
        let edge = self.take_edge(line);
        match trigger {
            Trigger::Edge => edge,
            Trigger::Level => self.level(line).is_active(),
        }
    }

    /// Acknowledges service of a line: a held line drops back to clear.
    pub fn acknowledge(&mut self, line: InputLine) {
        if let Some(slot) = self.levels.get_mut(line.index()) {
            if *slot == LineLevel::Hold {
                *slot = LineLevel::Clear;
            }
        }
    }

    /// Drops every latched edge; requested levels are left alone.
    pub fn discard_edges(&mut self) {
        self.edges.fill(false);
    }
}

/// Shared handle to a core's [`LineLatch`].
///
/// Devices may keep a clone and raise lines from inside a bus access. The
/// core still only looks at the latch between instructions.
#[derive(Debug, Clone, Default)]
pub struct LineHandle {
    latch: Rc<RefCell<LineLatch>>,
}

impl LineHandle {
    /// Creates a handle over a fresh latch with `count` lines.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            latch: Rc::new(RefCell::new(LineLatch::new(count))),
        }
    }

    /// Requests a level on a line.
    pub fn set_line(&self, line: InputLine, level: LineLevel) {
        self.latch.borrow_mut().set(line, level);
    }

    /// Current requested level of a line.
    #[must_use]
    pub fn level(&self, line: InputLine) -> LineLevel {
        self.latch.borrow().level(line)
    }

    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut LineLatch) -> R) -> R {
        f(&mut self.latch.borrow_mut())
    }
}

/// Index of an output line driven by a core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputLine(pub u8);

/// Receiver for the lines a core drives.
pub trait LineSink {
    /// Called on every change of an output line.
    fn set_output(&mut self, line: OutputLine, asserted: bool);
}

/// Sink that drops every output change.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLineSink;

impl LineSink for NullLineSink {
    fn set_output(&mut self, _line: OutputLine, _asserted: bool) {}
}

/// Sink that records output changes into a shared log.
#[derive(Debug, Clone, Default)]
pub struct RecordingLineSink {
    events: Rc<RefCell<Vec<(OutputLine, bool)>>>,
}

impl RecordingLineSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every recorded change, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<(OutputLine, bool)> {
        self.events.borrow().clone()
    }
}

impl LineSink for RecordingLineSink {
    fn set_output(&mut self, line: OutputLine, asserted: bool) {
        self.events.borrow_mut().push((line, asserted));
    }
}

#[cfg(test)]
mod tests {
    use super::{
        resolve_line, InputLine, LineDescriptor, LineHandle, LineLatch, LineLevel, LineSink,
        OutputLine, RecordingLineSink, Trigger,
    };
    use crate::ConfigError;

    const LINES: &[LineDescriptor] = &[
        LineDescriptor::new("INT", InputLine(0), Trigger::Edge),
        LineDescriptor::new("RESET", InputLine(1), Trigger::Level),
    ];

    #[test]
    fn rising_edge_is_latched_once() {
        let mut latch = LineLatch::new(2);
        latch.set(InputLine(0), LineLevel::Assert);
        latch.set(InputLine(0), LineLevel::Assert);
        assert!(latch.take_edge(InputLine(0)));
        assert!(!latch.take_edge(InputLine(0)));
    }

    #[test]
    fn edge_survives_release_before_sampling() {
        let mut latch = LineLatch::new(1);
        latch.set(InputLine(0), LineLevel::Assert);
        latch.set(InputLine(0), LineLevel::Clear);
        assert!(latch.sample(InputLine(0), Trigger::Edge));
        assert!(!latch.sample(InputLine(0), Trigger::Level));
    }

    #[test]
    fn level_trigger_requests_service_while_active() {
        let mut latch = LineLatch::new(1);
        latch.set(InputLine(0), LineLevel::Assert);
        assert!(latch.sample(InputLine(0), Trigger::Level));
        assert!(latch.sample(InputLine(0), Trigger::Level));
    }

    #[test]
    fn hold_clears_on_acknowledge_but_assert_does_not() {
        let mut latch = LineLatch::new(2);
        latch.set(InputLine(0), LineLevel::Hold);
        latch.set(InputLine(1), LineLevel::Assert);
        latch.acknowledge(InputLine(0));
        latch.acknowledge(InputLine(1));
        assert_eq!(latch.level(InputLine(0)), LineLevel::Clear);
        assert_eq!(latch.level(InputLine(1)), LineLevel::Assert);
    }

    #[test]
    fn unknown_line_is_ignored() {
        let mut latch = LineLatch::new(1);
        latch.set(InputLine(7), LineLevel::Assert);
        assert_eq!(latch.level(InputLine(7)), LineLevel::Clear);
        assert!(!latch.take_edge(InputLine(7)));
    }

    #[test]
    fn handle_clones_share_one_latch() {
        let handle = LineHandle::new(2);
        let device_side = handle.clone();
        device_side.set_line(InputLine(1), LineLevel::Assert);
        assert_eq!(handle.level(InputLine(1)), LineLevel::Assert);
        assert!(handle.with(|latch| latch.take_edge(InputLine(1))));
    }

    #[test]
    fn names_resolve_case_insensitively() {
        assert_eq!(resolve_line("test", LINES, "int"), Ok(InputLine(0)));
        assert_eq!(
            resolve_line("test", LINES, "NMI"),
            Err(ConfigError::UnsupportedLine {
                core: "test",
                name: "NMI".to_owned()
            })
        );
    }

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingLineSink::new();
        let mut driver = sink.clone();
        driver.set_output(OutputLine(0), true);
        driver.set_output(OutputLine(0), false);
        assert_eq!(
            sink.events(),
            vec![(OutputLine(0), true), (OutputLine(0), false)]
        );
    }
}
