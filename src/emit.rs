//! Rendering of a command list as C/C++ code which pushes the same
//! methods with pbkit or PBKitPlusPlus

use crate::command::{PgraphMethod, TraceEntry};
use std::fmt;

/// Maximum number of methods pushed between pb_begin() and pb_end()
pub const MAX_COMMANDS_PER_FLUSH: usize = 32;

const INDENT: &str = "  ";

/// The push-buffer API the generated code is written against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputDialect {
    /// Raw nxdk pbkit calls
    #[default]
    Pbkit,
    /// PBKitPlusPlus, which manages push-buffer space itself
    PbkitPlusPlus,
}

impl OutputDialect {
    fn syntax(self) -> &'static dyn PushSyntax {
        match self {
            OutputDialect::Pbkit => &PbkitSyntax,
            OutputDialect::PbkitPlusPlus => &PbkitPlusPlusSyntax,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmitOptions {
    pub dialect: OutputDialect,
    /// Emit methods with application-specific memory offsets as live
    /// code rather than commenting them out
    pub retain_non_portable: bool,
}

/// Method offset, with its symbol as a comment if known
struct Operation<'a> {
    offset: u32,
    name: Option<&'a str>,
}

impl fmt::Display for Operation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:X}", self.offset)?;
        if let Some(name) = self.name {
            write!(f, " /* {name} */")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Param {
    Raw(u32),
    Float(f32),
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Param::Raw(value) => write!(f, "0x{value:X}"),
            Param::Float(value) => write!(f, "{value:?}"),
        }
    }
}

/// Target of a push: the bound Kelvin object, or an explicit
/// channel/class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Kelvin,
    Object { channel: u32, device_class: u32 },
}

/// How a single method is rendered
#[derive(Debug, Clone, Copy, PartialEq)]
enum Template {
    /// Live push
    Push { target: Target, param: Param },
    /// Kelvin method with no symbol, kept only as a comment
    Placeholder,
}

impl Template {
    fn select(method: &PgraphMethod) -> Self {
        let call = &method.call;
        let param = match call.float_value {
            Some(value) if call.operation_name.is_some() => Param::Float(value),
            _ => Param::Raw(call.raw_value),
        };
        match (call.is_kelvin(), call.operation_name.is_some()) {
            (true, true) => Template::Push {
                target: Target::Kelvin,
                param,
            },
            (true, false) => Template::Placeholder,
            (false, _) => Template::Push {
                target: Target::Object {
                    channel: call.channel,
                    device_class: call.device_class,
                },
                param,
            },
        }
    }
}

/// Call syntax of a push-buffer API
trait PushSyntax {
    fn begin(&self) -> &'static [&'static str];
    fn end(&self) -> &'static [&'static str];
    /// Lines closing a full buffer and opening the next one, or None
    /// if the API does not need them
    fn flush(&self) -> Option<&'static [&'static str]>;
    fn push(&self, operation: &Operation<'_>, param: Param) -> String;
    fn push_to(
        &self,
        channel: u32,
        device_class: u32,
        operation: &Operation<'_>,
        param: Param,
    ) -> String;
}

struct PbkitSyntax;

impl PushSyntax for PbkitSyntax {
    fn begin(&self) -> &'static [&'static str] {
        &["uint32_t *p;", "p = pb_begin();"]
    }

    fn end(&self) -> &'static [&'static str] {
        &["pb_end(p);"]
    }

    fn flush(&self) -> Option<&'static [&'static str]> {
        Some(&["pb_end(p);", "while (pb_busy()) {}", "p = pb_begin();"])
    }

    fn push(&self, operation: &Operation<'_>, param: Param) -> String {
        match param {
            Param::Raw(_) => format!("p = pb_push1(p, {operation}, {param});"),
            Param::Float(_) => format!("p = pb_push1f(p, {operation}, {param});"),
        }
    }

    fn push_to(
        &self,
        channel: u32,
        device_class: u32,
        operation: &Operation<'_>,
        param: Param,
    ) -> String {
        let function = match param {
            Param::Raw(_) => "pb_push1_to",
            Param::Float(_) => "pb_push1f_to",
        };
        format!("p = {function}({channel} /* 0x{device_class:X} */, p, {operation}, {param});")
    }
}

struct PbkitPlusPlusSyntax;

impl PushSyntax for PbkitPlusPlusSyntax {
    fn begin(&self) -> &'static [&'static str] {
        &["Pushbuffer::Begin();"]
    }

    fn end(&self) -> &'static [&'static str] {
        &["Pushbuffer::End();"]
    }

    fn flush(&self) -> Option<&'static [&'static str]> {
        None
    }

    fn push(&self, operation: &Operation<'_>, param: Param) -> String {
        format!("Pushbuffer::Push({operation}, {param});")
    }

    fn push_to(
        &self,
        channel: u32,
        device_class: u32,
        operation: &Operation<'_>,
        param: Param,
    ) -> String {
        format!("Pushbuffer::PushTo({channel} /* 0x{device_class:X} */, {operation}, {param});")
    }
}

/// Generated code for a command list
///
/// Formatting the program produces the complete function body: the
/// push-buffer is opened, every entry is rendered on its own line, and
/// the buffer is closed. With pbkit, the buffer is ended and waited on
/// before every run of MAX_COMMANDS_PER_FLUSH further methods.
pub struct Program<'a> {
    entries: &'a [TraceEntry],
    options: EmitOptions,
}

impl<'a> Program<'a> {
    pub fn new(entries: &'a [TraceEntry], options: EmitOptions) -> Self {
        Self { entries, options }
    }

    fn render_method(&self, syntax: &dyn PushSyntax, method: &PgraphMethod) -> String {
        let call = &method.call;
        let template = Template::select(method);

        let comment_prefix = if method.is_non_portable() && !self.options.retain_non_portable {
            "// NONPORTABLE: "
        } else if template == Template::Placeholder {
            "// "
        } else {
            ""
        };

        let operation = Operation {
            offset: call.operation,
            name: call.operation_name.as_deref(),
        };
        let code = match template {
            Template::Push {
                target: Target::Kelvin,
                param,
            } => syntax.push(&operation, param),
            Template::Push {
                target:
                    Target::Object {
                        channel,
                        device_class,
                    },
                param,
            } => syntax.push_to(channel, device_class, &operation, param),
            Template::Placeholder => syntax.push(&operation, Param::Raw(call.raw_value)),
        };

        match &call.value_description {
            Some(description) => format!("{INDENT}{comment_prefix}{code}  // {description}"),
            None => format!("{INDENT}{comment_prefix}{code}"),
        }
    }
}

fn write_lines(f: &mut fmt::Formatter, lines: &[&str]) -> fmt::Result {
    for line in lines {
        writeln!(f, "{INDENT}{line}")?;
    }
    Ok(())
}

impl fmt::Display for Program<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let syntax = self.options.dialect.syntax();
        let mut in_buffer = 0;

        write_lines(f, syntax.begin())?;
        for entry in self.entries {
            match entry {
                TraceEntry::Annotation(message) => writeln!(f, "{INDENT}// {message}")?,
                TraceEntry::Method(method) => {
                    if let Some(flush) = syntax.flush() {
                        if in_buffer == MAX_COMMANDS_PER_FLUSH {
                            write_lines(f, flush)?;
                            in_buffer = 0;
                        }
                    }
                    writeln!(f, "{}", self.render_method(syntax, method))?;
                    in_buffer += 1;
                }
            }
        }
        write_lines(f, syntax.end())
    }
}

/// Render a command list as code
pub fn emit_commands(entries: &[TraceEntry], options: EmitOptions) -> String {
    Program::new(entries, options).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MethodCall;

    fn entry(call: MethodCall) -> TraceEntry {
        TraceEntry::Method(PgraphMethod {
            line_number: 1,
            draw_number: 1,
            in_begin_end_block: false,
            call,
        })
    }

    fn named(operation: u32, name: &str, raw_value: u32) -> MethodCall {
        MethodCall {
            operation_name: Some(name.to_string()),
            ..MethodCall::new(0, 0x97, operation, raw_value)
        }
    }

    /// The lines between the opening and closing of the buffer
    fn body(entries: &[TraceEntry], options: EmitOptions) -> Vec<String> {
        let text = emit_commands(entries, options);
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        let skip = options.dialect.syntax().begin().len();
        let keep = lines.len() - skip - options.dialect.syntax().end().len();
        lines.into_iter().skip(skip).take(keep).collect()
    }

    #[test]
    fn check_empty_program() {
        let text = emit_commands(&[], EmitOptions::default());
        assert_eq!(text, "  uint32_t *p;\n  p = pb_begin();\n  pb_end(p);\n");

        let options = EmitOptions {
            dialect: OutputDialect::PbkitPlusPlus,
            ..EmitOptions::default()
        };
        assert_eq!(
            emit_commands(&[], options),
            "  Pushbuffer::Begin();\n  Pushbuffer::End();\n"
        );
    }

    #[test]
    fn check_kelvin_push_with_description() {
        let mut call = named(0x17fc, "NV097_SET_BEGIN_END", 0);
        call.value_description = Some("NV097_SET_BEGIN_END_OP_END".to_string());
        assert_eq!(
            body(&[entry(call)], EmitOptions::default()),
            vec![
                "  p = pb_push1(p, 0x17FC /* NV097_SET_BEGIN_END */, 0x0);  // NV097_SET_BEGIN_END_OP_END"
            ]
        );
    }

    #[test]
    fn check_float_push() {
        let mut call = named(0xb84, "NV097_SET_TRANSFORM_CONSTANT[1]", 0x3f00_0000);
        call.float_value = Some(0.5);
        let entries = [entry(call)];
        assert_eq!(
            body(&entries, EmitOptions::default()),
            vec!["  p = pb_push1f(p, 0xB84 /* NV097_SET_TRANSFORM_CONSTANT[1] */, 0.5);"]
        );
        let options = EmitOptions {
            dialect: OutputDialect::PbkitPlusPlus,
            ..EmitOptions::default()
        };
        assert_eq!(
            body(&entries, options),
            vec!["  Pushbuffer::Push(0xB84 /* NV097_SET_TRANSFORM_CONSTANT[1] */, 0.5);"]
        );
    }

    #[test]
    fn check_unnamed_kelvin_method_is_commented() {
        let entries = [entry(MethodCall::new(0, 0x97, 0x1800, 0x11000f))];
        assert_eq!(
            body(&entries, EmitOptions::default()),
            vec!["  // p = pb_push1(p, 0x1800, 0x11000F);"]
        );
    }

    #[test]
    fn check_other_class_push_to() {
        let entries = [entry(MethodCall::new(1, 0x39, 0x0, 0x14cf0))];
        assert_eq!(
            body(&entries, EmitOptions::default()),
            vec!["  p = pb_push1_to(1 /* 0x39 */, p, 0x0, 0x14CF0);"]
        );
        let options = EmitOptions {
            dialect: OutputDialect::PbkitPlusPlus,
            ..EmitOptions::default()
        };
        assert_eq!(
            body(&entries, options),
            vec!["  Pushbuffer::PushTo(1 /* 0x39 */, 0x0, 0x14CF0);"]
        );
    }

    #[test]
    fn check_non_portable_methods() {
        let entries = [entry(named(0x210, "NV097_SET_SURFACE_COLOR_OFFSET", 0x1000))];
        assert_eq!(
            body(&entries, EmitOptions::default()),
            vec!["  // NONPORTABLE: p = pb_push1(p, 0x210 /* NV097_SET_SURFACE_COLOR_OFFSET */, 0x1000);"]
        );
        let options = EmitOptions {
            retain_non_portable: true,
            ..EmitOptions::default()
        };
        assert_eq!(
            body(&entries, options),
            vec!["  p = pb_push1(p, 0x210 /* NV097_SET_SURFACE_COLOR_OFFSET */, 0x1000);"]
        );
    }

    #[test]
    fn check_annotation() {
        let entries = [TraceEntry::annotation("END OF SETUP COMMANDS")];
        assert_eq!(
            body(&entries, EmitOptions::default()),
            vec!["  // END OF SETUP COMMANDS"]
        );
    }

    fn count_flushes(methods: usize, annotations: usize, options: EmitOptions) -> usize {
        let mut entries: Vec<TraceEntry> = (0..methods)
            .map(|n| entry(named(0x1800, "NV097_ARRAY_ELEMENT16", n as u32)))
            .collect();
        entries.extend((0..annotations).map(|_| TraceEntry::annotation("note")));
        emit_commands(&entries, options)
            .lines()
            .filter(|line| line.trim() == "while (pb_busy()) {}")
            .count()
    }

    #[test]
    fn check_flush_boundaries() {
        let options = EmitOptions::default();
        assert_eq!(count_flushes(32, 0, options), 0);
        assert_eq!(count_flushes(33, 0, options), 1);
        assert_eq!(count_flushes(64, 0, options), 1);
        assert_eq!(count_flushes(65, 0, options), 2);
        // Annotations are not pushed, so do not fill the buffer
        assert_eq!(count_flushes(32, 10, options), 0);
    }

    #[test]
    fn check_flush_follows_32nd_method() {
        let entries: Vec<TraceEntry> = (0..65)
            .map(|n| entry(named(0x1800, "NV097_ARRAY_ELEMENT16", n)))
            .collect();
        let lines = body(&entries, EmitOptions::default());
        // 65 pushes and two groups of three flush lines
        assert_eq!(lines.len(), 65 + 6);
        assert!(lines[31].contains("0x1F);"));
        assert_eq!(lines[32], "  pb_end(p);");
        assert_eq!(lines[33], "  while (pb_busy()) {}");
        assert_eq!(lines[34], "  p = pb_begin();");
        assert!(lines[66].contains("0x3F);"));
        assert_eq!(lines[67], "  pb_end(p);");
        assert!(lines[70].contains("0x40);"));
    }

    #[test]
    fn check_pbkitplusplus_never_flushes() {
        let options = EmitOptions {
            dialect: OutputDialect::PbkitPlusPlus,
            ..EmitOptions::default()
        };
        assert_eq!(count_flushes(100, 0, options), 0);
    }
}
