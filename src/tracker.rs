use crate::command::{BeginEndRole, MethodCall, PgraphMethod};

/// Draw call framing state, threaded through the lines of a log
///
/// A draw runs from just after one SET_BEGIN_END(OP_END) (or the start
/// of the log) up to and including the next one. Draws are numbered
/// from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamTracker {
    draw_number: u32,
    in_begin_end: bool,
}

impl Default for StreamTracker {
    fn default() -> Self {
        Self {
            draw_number: 1,
            in_begin_end: false,
        }
    }
}

impl StreamTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw number the next method will be given
    pub fn draw_number(&self) -> u32 {
        self.draw_number
    }

    pub fn in_begin_end(&self) -> bool {
        self.in_begin_end
    }

    /// Place a parsed call in the stream. The method records the state
    /// from before the call; a begin marker then opens the region and
    /// an end marker closes it and moves on to the next draw.
    pub fn place(&mut self, line_number: usize, call: MethodCall) -> PgraphMethod {
        let method = PgraphMethod {
            line_number,
            draw_number: self.draw_number,
            in_begin_end_block: self.in_begin_end,
            call,
        };

        match method.begin_end_role() {
            Some(BeginEndRole::Begin) => self.in_begin_end = true,
            Some(BeginEndRole::End) => {
                self.in_begin_end = false;
                self.draw_number += 1;
            }
            None => (),
        }

        method
    }
}
