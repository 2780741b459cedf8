/// One parsed syscall event from an strace trace.
///
/// Every string field borrows from the line buffer the event was parsed
/// out of, so a record must be consumed (appended to the database) before
/// the buffer is reused for the next line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Syscall<'a> {
    pub timestamp: &'a str,
    pub name: &'a str,
    /// Raw text between the outermost parentheses, verbatim.
    pub args: &'a str,
    /// Absent when strace printed `?` or the call is unfinished.
    pub return_value: Option<i64>,
    pub error_code: Option<&'a str>,
    pub error_message: Option<&'a str>,
    /// Seconds, from the `<0.000042>` trailer.
    pub duration: Option<f64>,
    pub unfinished: bool,
    pub resumed: bool,
}
