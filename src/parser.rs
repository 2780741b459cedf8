use crate::record::Syscall;

const UNFINISHED_MARKER: &str = "<unfinished ...>";
const RESUMED_PREFIX: &str = "<... ";
const RESUMED_MARKER: &str = " resumed>";

/// Parse one strace line produced with `-tt`/`-ttt` (and optionally `-T`).
///
/// Recognises the three shapes strace emits:
///
/// - complete:   `HH:MM:SS.micro name(args) = ret [ERR (msg)] [<dur>]`
/// - unfinished: `HH:MM:SS.micro name(args <unfinished ...>) = ?`
/// - resumed:    `HH:MM:SS.micro <... name resumed>tail) = ret [<dur>]`
///
/// Blank lines, comments and anything else that does not match return
/// `None`. All string fields of the result borrow from `line`; parsing
/// performs no allocation.
pub fn parse_line(line: &str) -> Option<Syscall<'_>> {
    let (timestamp, rest) = split_timestamp(line)?;
    parse_complete(timestamp, rest)
        .or_else(|| parse_unfinished(timestamp, rest))
        .or_else(|| parse_resumed(timestamp, rest))
}

/// Split off the leading timestamp: everything up to the first space that
/// is preceded by at least two `:` and one `.`. The timestamp itself is
/// treated as opaque text.
fn split_timestamp(line: &str) -> Option<(&str, &str)> {
    let mut colons = 0u32;
    let mut dots = 0u32;
    for (i, b) in line.bytes().enumerate() {
        match b {
            b':' => colons += 1,
            b'.' => dots += 1,
            b' ' if colons >= 2 && dots >= 1 => {
                let rest = line[i + 1..].trim_start();
                if rest.is_empty() {
                    return None;
                }
                return Some((&line[..i], rest));
            }
            _ => {}
        }
    }
    None
}

/// Position of the `)` matching an already-consumed `(`, tracking depth so
/// nested argument text like `{st_rdev=makedev(0x88, 0), ...}` does not
/// end the scan early.
fn matching_paren(s: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, b) in s.bytes().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// `name(args) = ret [ERR (msg)] [<dur>]`
fn parse_complete<'a>(timestamp: &'a str, rest: &'a str) -> Option<Syscall<'a>> {
    // Unfinished lines also contain `name(args`; let that branch claim them.
    if rest.contains(UNFINISHED_MARKER) {
        return None;
    }

    let open = rest.find('(')?;
    let name = &rest[..open];
    if name.is_empty() {
        return None;
    }

    let body = &rest[open + 1..];
    let close = matching_paren(body)?;
    let args = &body[..close];

    let outcome = body[close + 1..].trim_start().strip_prefix('=')?;
    let (return_value, error_code, error_message, duration) = parse_outcome(outcome)?;

    Some(Syscall {
        timestamp,
        name,
        args,
        return_value,
        error_code,
        error_message,
        duration,
        unfinished: false,
        resumed: false,
    })
}

/// `name(partial_args <unfinished ...>[) = ?]`
fn parse_unfinished<'a>(timestamp: &'a str, rest: &'a str) -> Option<Syscall<'a>> {
    let marker = rest.find(UNFINISHED_MARKER)?;
    let open = rest.find('(')?;
    if open >= marker {
        return None;
    }
    let name = &rest[..open];
    if name.is_empty() {
        return None;
    }

    // Verbatim up to the marker; strace leaves a trailing space here and we
    // keep it.
    let args = &rest[open + 1..marker];

    Some(Syscall {
        timestamp,
        name,
        args,
        return_value: None,
        error_code: None,
        error_message: None,
        duration: None,
        unfinished: true,
        resumed: false,
    })
}

/// `<... name resumed>tail) = ret [ERR (msg)] [<dur>]`
fn parse_resumed<'a>(timestamp: &'a str, rest: &'a str) -> Option<Syscall<'a>> {
    let after_prefix = rest.strip_prefix(RESUMED_PREFIX)?;
    let marker = after_prefix.find(RESUMED_MARKER)?;
    let name = &after_prefix[..marker];
    if name.is_empty() {
        return None;
    }

    // The tail carries the unmatched `)` of the interrupted call, so the
    // depth scan starts at 1 just like the complete branch.
    let tail = &after_prefix[marker + RESUMED_MARKER.len()..];
    let close = matching_paren(tail)?;
    let args = &tail[..close];

    let outcome = tail[close + 1..].trim_start().strip_prefix('=')?;
    let (return_value, error_code, error_message, duration) = parse_outcome(outcome)?;

    Some(Syscall {
        timestamp,
        name,
        args,
        return_value,
        error_code,
        error_message,
        duration,
        unfinished: false,
        resumed: true,
    })
}

type Outcome<'a> = (Option<i64>, Option<&'a str>, Option<&'a str>, Option<f64>);

/// Decode everything after the `=`: the return value, then either an error
/// code with optional message (only for strictly negative returns) or a
/// parenthesised annotation (ignored), then the `<seconds>` duration.
fn parse_outcome(outcome: &str) -> Option<Outcome<'_>> {
    let outcome = outcome.trim_start();
    let token_end = outcome
        .find(|c: char| c == ' ' || c == '<')
        .unwrap_or(outcome.len());
    let return_value = parse_return_value(&outcome[..token_end])?;
    let mut tail = outcome[token_end..].trim_start();

    let mut error_code = None;
    let mut error_message = None;

    if !tail.is_empty() && !tail.starts_with('<') {
        match return_value {
            Some(rv) if rv < 0 => {
                let end = tail
                    .find(|c: char| c.is_ascii_whitespace())
                    .unwrap_or(tail.len());
                error_code = Some(&tail[..end]);
                tail = tail[end..].trim_start();
                // Error messages never nest parentheses.
                if let Some(msg) = tail.strip_prefix('(') {
                    let close = msg.find(')')?;
                    error_message = Some(&msg[..close]);
                    tail = msg[close + 1..].trim_start();
                }
            }
            _ => {
                // poll/select/wait4 annotate non-negative results, e.g.
                // `= 1 ([{fd=3, revents=POLLIN}])`. Skip, never an error.
                if let Some(note) = tail.strip_prefix('(') {
                    let close = matching_paren(note)?;
                    tail = note[close + 1..].trim_start();
                }
            }
        }
    }

    let duration = if let Some(dur) = tail.strip_prefix('<') {
        let close = dur.find('>')?;
        Some(dur[..close].parse::<f64>().ok()?)
    } else {
        None
    };

    Some((return_value, error_code, error_message, duration))
}

/// `?` means strace never saw the call return. Hex values keep the sign
/// strace printed (`-0x...` shows up for some mmap failures).
fn parse_return_value(token: &str) -> Option<Option<i64>> {
    if token == "?" {
        return Some(None);
    }
    let value = if let Some(hex) = token.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(hex) = token.strip_prefix("-0x") {
        -i64::from_str_radix(hex, 16).ok()?
    } else {
        token.parse::<i64>().ok()?
    };
    Some(Some(value))
}
