use std::io::{self, BufRead, Read};

use crate::exec::io_util::was_interrupted;

/// Read one line from `input`, without its newline and with surrounding spaces and tabs removed.
///
/// At most `limit` bytes of a line are kept, the rest of it is read and discarded. Returns `None`
/// at end of input. A last line without a newline is still returned.
pub(crate) fn read_line(input: &mut impl BufRead, limit: usize) -> io::Result<Option<Vec<u8>>> {
    let mut raw = Vec::new();

    loop {
        let wanted = limit.saturating_sub(raw.len()) as u64;
        match input.by_ref().take(wanted).read_until(b'\n', &mut raw) {
            Ok(0) if raw.is_empty() && wanted > 0 => return Ok(None),
            Ok(_) => break,
            // anything read before the interruption stays in `raw`
            Err(err) if was_interrupted(&err) => {}
            Err(err) => return Err(err),
        }
    }

    if raw.last() == Some(&b'\n') {
        raw.pop();
    } else if raw.len() >= limit {
        discard_line(input)?;
    }

    Ok(Some(trim_blanks(&raw).to_vec()))
}

/// Consume `input` up to and including the next newline.
fn discard_line(input: &mut impl BufRead) -> io::Result<()> {
    loop {
        let (used, done) = match input.fill_buf() {
            Ok([]) => return Ok(()),
            Ok(buf) => match buf.iter().position(|&byte| byte == b'\n') {
                Some(newline) => (newline + 1, true),
                None => (buf.len(), false),
            },
            Err(err) if was_interrupted(&err) => continue,
            Err(err) => return Err(err),
        };

        input.consume(used);
        if done {
            return Ok(());
        }
    }
}

pub(crate) fn is_blank(byte: &u8) -> bool {
    matches!(byte, b' ' | b'\t')
}

pub(crate) fn trim_blanks(line: &[u8]) -> &[u8] {
    let start = line.iter().position(|byte| !is_blank(byte));
    let end = line.iter().rposition(|byte| !is_blank(byte));

    match (start, end) {
        (Some(start), Some(end)) => &line[start..=end],
        _ => &[],
    }
}
