use crate::command::TraceEntry;
use itertools::Itertools;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Message marking the end of the reconstructed state in a filtered
/// command list
pub const END_OF_SETUP: &str = "END OF SETUP COMMANDS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("no commands at or after line {0}")]
    NoCommandsAtOrAfter(usize),
}

/// Which part of a trace log to convert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    /// Every command
    #[default]
    All,
    /// Commands from start_line onwards, at most max_commands of them.
    /// No state is reconstructed.
    Lines {
        start_line: Option<usize>,
        max_commands: Option<usize>,
    },
    /// A window of draw calls, preceded by the state set up by the
    /// draws before it
    Draws {
        start_draw: u32,
        max_draws: Option<u32>,
    },
}

impl Selection {
    /// Apply the selection to the full command list
    pub fn apply(&self, entries: &[TraceEntry]) -> Result<Vec<TraceEntry>, SelectionError> {
        match *self {
            Selection::All => Ok(entries.to_vec()),
            Selection::Lines {
                start_line,
                max_commands,
            } => {
                let start = match start_line {
                    Some(line) => first_command_at_or_after(line, entries)
                        .ok_or(SelectionError::NoCommandsAtOrAfter(line))?,
                    None => 0,
                };
                let selected = &entries[start..];
                let end = max_commands.map_or(selected.len(), |max| max.min(selected.len()));
                Ok(selected[..end].to_vec())
            }
            Selection::Draws {
                start_draw,
                max_draws,
            } => Ok(filter_draws(entries, start_draw, max_draws)),
        }
    }
}

/// Index of the first command on or after line_number
pub fn first_command_at_or_after(line_number: usize, entries: &[TraceEntry]) -> Option<usize> {
    entries
        .iter()
        .position(|entry| entry.line_number().is_some_and(|line| line >= line_number))
}

/// Reduce a command list to the draws start_draw up to (but not
/// including) start_draw + max_draws, so that it can be replayed on
/// its own.
///
/// The result starts with the last value written to each stateful
/// method before start_draw, in log order, followed by an END OF SETUP
/// marker and then the commands of the window unchanged. Nothing after
/// the window is examined. A max_draws of None means no end to the
/// window.
pub fn filter_draws(
    entries: &[TraceEntry],
    start_draw: u32,
    max_draws: Option<u32>,
) -> Vec<TraceEntry> {
    let end_draw = max_draws.map(|max| start_draw.saturating_add(max));

    let mut state: HashMap<u32, &TraceEntry> = HashMap::new();
    let mut window = Vec::new();

    for entry in entries {
        let Some(method) = entry.as_method() else {
            continue;
        };
        if method.draw_number < start_draw {
            if method.is_stateful() {
                state.insert(method.call.operation, entry);
            }
            continue;
        }
        if end_draw.is_some_and(|end| method.draw_number >= end) {
            break;
        }
        window.push(entry.clone());
    }

    tracing::debug!(
        state_commands = state.len(),
        window_commands = window.len(),
        start_draw,
        ?max_draws,
        "filtered draws"
    );

    state
        .into_values()
        .sorted_by_key(|entry| entry.line_number())
        .cloned()
        .chain(std::iter::once(TraceEntry::annotation(END_OF_SETUP)))
        .chain(window)
        .collect()
}

/// Where a draw call ends in the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawBoundary {
    /// Position of the end marker in the command list
    pub command_index: usize,
    pub line_number: usize,
    pub draw_number: u32,
}

/// List the end of every draw call in the command list
pub fn draw_boundaries(entries: &[TraceEntry]) -> Vec<DrawBoundary> {
    entries
        .iter()
        .enumerate()
        .filter_map(|(command_index, entry)| {
            let method = entry.as_method().filter(|method| method.is_end())?;
            Some(DrawBoundary {
                command_index,
                line_number: method.line_number,
                draw_number: method.draw_number,
            })
        })
        .collect()
}

impl fmt::Display for DrawBoundary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Command {} on line {} ends draw {}",
            self.command_index, self.line_number, self.draw_number
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MethodCall;
    use crate::tracker::StreamTracker;

    const SURFACE_FORMAT: u32 = 0x208;
    const BLEND_ENABLE: u32 = 0x304;
    const VERTEX: u32 = 0x1800;

    /// Build a log of draws, each setting the surface format and blend
    /// enable to the draw index before drawing three vertices.
    fn make_draws(count: u32) -> Vec<TraceEntry> {
        let mut tracker = StreamTracker::new();
        let mut line = 0;
        let mut entries = Vec::new();
        let mut push = |operation, raw_value| {
            line += 1;
            let call = MethodCall::new(0, 0x97, operation, raw_value);
            entries.push(TraceEntry::Method(tracker.place(line, call)));
        };
        for n in 1..=count {
            push(SURFACE_FORMAT, n);
            push(BLEND_ENABLE, n);
            push(0x17fc, 5);
            for v in 0..3 {
                push(VERTEX, v);
            }
            push(0x17fc, 0);
        }
        entries
    }

    fn methods(entries: &[TraceEntry]) -> Vec<(u32, u32)> {
        entries
            .iter()
            .filter_map(TraceEntry::as_method)
            .map(|method| (method.call.operation, method.call.raw_value))
            .collect()
    }

    #[test]
    fn check_first_draw_has_no_state_prefix() {
        let entries = make_draws(3);
        let filtered = filter_draws(&entries, 1, None);
        assert_eq!(filtered[0], TraceEntry::annotation(END_OF_SETUP));
        assert_eq!(&filtered[1..], &entries[..]);
    }

    #[test]
    fn check_single_draw_window() {
        let entries = make_draws(10);
        let filtered = filter_draws(&entries, 5, Some(1));

        // Latest value of each stateful method from draws 1-4
        assert_eq!(
            methods(&filtered[..2]),
            vec![(SURFACE_FORMAT, 4), (BLEND_ENABLE, 4)]
        );
        assert_eq!(filtered[2], TraceEntry::annotation(END_OF_SETUP));

        let window = &filtered[3..];
        assert_eq!(window.len(), 7);
        assert!(window.iter().all(|entry| entry.draw_number() == Some(5)));
        assert_eq!(methods(&window[..2]), vec![(SURFACE_FORMAT, 5), (BLEND_ENABLE, 5)]);
    }

    #[test]
    fn check_hoisted_state_is_last_writer_in_line_order() {
        let entries = make_draws(4);
        let filtered = filter_draws(&entries, 4, Some(1));
        let state_lines: Vec<usize> = filtered
            .iter()
            .take_while(|entry| entry.as_method().is_some())
            .filter_map(TraceEntry::line_number)
            .collect();
        // Draw 3 starts at line 15
        assert_eq!(state_lines, vec![15, 16]);
    }

    #[test]
    fn check_window_past_end_of_log() {
        let entries = make_draws(3);
        let filtered = filter_draws(&entries, 3, Some(100));
        assert_eq!(filtered.len(), 2 + 1 + 7);
    }

    #[test]
    fn check_other_classes_are_hoisted() {
        let mut tracker = StreamTracker::new();
        let calls = [
            MethodCall::new(1, 0x39, 0x0, 0x14cf0),
            MethodCall::new(0, 0x97, 0x17fc, 5),
            MethodCall::new(0, 0x97, 0x17fc, 0),
            MethodCall::new(0, 0x97, 0x1800, 0),
        ];
        let entries: Vec<TraceEntry> = calls
            .into_iter()
            .enumerate()
            .map(|(n, call)| TraceEntry::from(tracker.place(n + 1, call)))
            .collect();
        let filtered = filter_draws(&entries, 2, None);
        assert_eq!(filtered[0].line_number(), Some(1));
        assert_eq!(filtered[1], TraceEntry::annotation(END_OF_SETUP));
        assert_eq!(filtered[2].line_number(), Some(4));
        assert_eq!(filtered.len(), 3);
    }

    #[test]
    fn check_line_selection() -> Result<(), SelectionError> {
        let entries = make_draws(2);
        let selection = Selection::Lines {
            start_line: Some(3),
            max_commands: Some(4),
        };
        let selected = selection.apply(&entries)?;
        let lines: Vec<usize> = selected.iter().filter_map(TraceEntry::line_number).collect();
        assert_eq!(lines, vec![3, 4, 5, 6]);

        let rest = Selection::Lines {
            start_line: Some(14),
            max_commands: None,
        }
        .apply(&entries)?;
        assert_eq!(rest.len(), 1);
        Ok(())
    }

    #[test]
    fn check_line_selection_out_of_range() {
        let entries = make_draws(2);
        let selection = Selection::Lines {
            start_line: Some(15),
            max_commands: None,
        };
        assert_eq!(
            selection.apply(&entries),
            Err(SelectionError::NoCommandsAtOrAfter(15))
        );
    }

    #[test]
    fn check_draw_boundaries() {
        let entries = make_draws(2);
        let boundaries = draw_boundaries(&entries);
        assert_eq!(boundaries.len(), 2);
        assert_eq!(
            boundaries[1],
            DrawBoundary {
                command_index: 13,
                line_number: 14,
                draw_number: 2
            }
        );
        assert_eq!(
            boundaries[0].to_string(),
            "Command 6 on line 7 ends draw 1"
        );
    }
}
