use crate::methods::{
    is_non_portable_method, is_stateless_method, NV097_SET_BEGIN_END, NV20_KELVIN_PRIMITIVE,
};
use std::fmt;

/// The role a method plays in framing a primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginEndRole {
    /// SET_BEGIN_END with a primitive type (non-zero)
    Begin,
    /// SET_BEGIN_END with OP_END (zero), closing a draw call
    End,
}

/// A method as recognised on a single log line, before it has been
/// placed in the command stream.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub channel: u32,
    pub device_class: u32,
    pub operation: u32,
    pub operation_name: Option<String>,
    pub raw_value: u32,
    pub float_value: Option<f32>,
    pub value_description: Option<String>,
}

impl MethodCall {
    /// Make a call with no symbol or decoded parameter
    pub fn new(channel: u32, device_class: u32, operation: u32, raw_value: u32) -> Self {
        Self {
            channel,
            device_class,
            operation,
            operation_name: None,
            raw_value,
            float_value: None,
            value_description: None,
        }
    }

    pub fn is_kelvin(&self) -> bool {
        self.device_class == NV20_KELVIN_PRIMITIVE
    }

    pub fn begin_end_role(&self) -> Option<BeginEndRole> {
        if !self.is_kelvin() || self.operation != NV097_SET_BEGIN_END {
            None
        } else if self.raw_value != 0 {
            Some(BeginEndRole::Begin)
        } else {
            Some(BeginEndRole::End)
        }
    }
}

/// One PGRAPH method from the trace log, placed in the command stream
///
/// Records are created once while the log is read and are never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct PgraphMethod {
    /// 1-based line in the trace log
    pub line_number: usize,
    /// Draw call this method belongs to (the first draw is 1)
    pub draw_number: u32,
    /// True if a SET_BEGIN_END region was open when this method
    /// arrived (so true for the end marker, false for the begin
    /// marker)
    pub in_begin_end_block: bool,
    pub call: MethodCall,
}

impl PgraphMethod {
    pub fn begin_end_role(&self) -> Option<BeginEndRole> {
        self.call.begin_end_role()
    }

    pub fn is_begin(&self) -> bool {
        self.begin_end_role() == Some(BeginEndRole::Begin)
    }

    pub fn is_end(&self) -> bool {
        self.begin_end_role() == Some(BeginEndRole::End)
    }

    /// Whether the effect of this method outlives the draw call it is
    /// issued in.
    ///
    /// Methods on classes other than Kelvin are always assumed to be
    /// stateful. Kelvin methods inside a begin/end region only carry
    /// vertex data, so they are never stateful.
    pub fn is_stateful(&self) -> bool {
        if !self.call.is_kelvin() {
            return true;
        }
        if self.in_begin_end_block {
            return false;
        }
        !is_stateless_method(self.call.operation)
    }

    /// Whether replaying the parameter verbatim is unsafe outside the
    /// captured application (memory offsets, report clears)
    pub fn is_non_portable(&self) -> bool {
        self.call.is_kelvin() && is_non_portable_method(self.call.operation)
    }
}

/// An item in the ordered command list
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEntry {
    Method(PgraphMethod),
    /// A marker carrying only a message, rendered as a comment
    Annotation(String),
}

impl TraceEntry {
    pub fn annotation(message: impl Into<String>) -> Self {
        Self::Annotation(message.into())
    }

    pub fn as_method(&self) -> Option<&PgraphMethod> {
        match self {
            TraceEntry::Method(method) => Some(method),
            TraceEntry::Annotation(_) => None,
        }
    }

    pub fn line_number(&self) -> Option<usize> {
        self.as_method().map(|method| method.line_number)
    }

    pub fn draw_number(&self) -> Option<u32> {
        self.as_method().map(|method| method.draw_number)
    }

    pub fn is_stateful(&self) -> bool {
        self.as_method().is_some_and(PgraphMethod::is_stateful)
    }

    pub fn is_non_portable(&self) -> bool {
        self.as_method().is_some_and(PgraphMethod::is_non_portable)
    }

    pub fn is_end(&self) -> bool {
        self.as_method().is_some_and(PgraphMethod::is_end)
    }
}

impl From<PgraphMethod> for TraceEntry {
    fn from(method: PgraphMethod) -> Self {
        Self::Method(method)
    }
}

impl fmt::Display for MethodCall {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}: 0x{:x} -> 0x{:x}",
            self.channel, self.device_class, self.operation
        )?;
        if let Some(name) = &self.operation_name {
            write!(f, " {name}")?;
        }
        write!(f, " 0x{:x}", self.raw_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(device_class: u32, operation: u32, raw_value: u32, in_block: bool) -> PgraphMethod {
        PgraphMethod {
            line_number: 1,
            draw_number: 1,
            in_begin_end_block: in_block,
            call: MethodCall::new(0, device_class, operation, raw_value),
        }
    }

    #[test]
    fn check_begin_end_roles() {
        assert!(method(0x97, 0x17fc, 5, false).is_begin());
        assert!(method(0x97, 0x17fc, 0, true).is_end());
        assert_eq!(method(0x97, 0x1800, 0, false).begin_end_role(), None);
        // Same offset on another class is not a begin/end marker
        assert_eq!(method(0x39, 0x17fc, 0, false).begin_end_role(), None);
    }

    #[test]
    fn check_other_classes_are_always_stateful() {
        assert!(method(0x39, 0x0, 0x14cf0, false).is_stateful());
        assert!(method(0x39, 0x17fc, 0, true).is_stateful());
        assert!(method(0x9f, 0x2fc, 3, true).is_stateful());
    }

    #[test]
    fn check_methods_in_begin_end_are_never_stateful() {
        assert!(!method(0x97, 0x1800, 0x11000f, true).is_stateful());
        assert!(!method(0x97, 0x1b00, 0x1000, true).is_stateful());
        assert!(method(0x97, 0x1800, 0x11000f, false).is_stateful());
    }

    #[test]
    fn check_stateless_kelvin_methods() {
        assert!(!method(0x97, 0x17fc, 5, false).is_stateful());
        assert!(!method(0x97, 0x100, 0, false).is_stateful());
        assert!(!method(0x97, 0x1d70, 0, false).is_stateful());
    }

    #[test]
    fn check_non_portable() {
        assert!(method(0x97, 0x210, 0, false).is_non_portable());
        assert!(!method(0x39, 0x210, 0, false).is_non_portable());
        assert!(!method(0x97, 0x1800, 0, false).is_non_portable());
    }

    #[test]
    fn check_annotations_are_inert() {
        let note = TraceEntry::annotation("END OF SETUP COMMANDS");
        assert!(!note.is_stateful());
        assert!(!note.is_non_portable());
        assert!(!note.is_end());
        assert_eq!(note.line_number(), None);
    }
}
