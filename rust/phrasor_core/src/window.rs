//! Sliding n-gram window emitter.
//!
//! The token buffer is carried across line boundaries within one shard, so
//! windows may span consecutive input lines. A token stream of N tokens
//! always yields exactly `max(0, N - width + 1)` full windows, no matter
//! how the stream was split into lines.

use std::io;

/// Emits every complete `width`-token window from a token stream, sliding
/// one token at a time.
#[derive(Debug)]
pub struct WindowEmitter {
    width: usize,
    buf: Vec<String>,
}

impl WindowEmitter {
    /// `width` must be at least 1.
    pub fn new(width: usize) -> Self {
        assert!(width >= 1, "window width must be at least 1");
        WindowEmitter {
            width,
            buf: Vec::new(),
        }
    }

    /// Append `tokens` and emit every complete window that becomes
    /// available. The trailing `width - 1` tokens stay buffered for the
    /// next call. Stops at the first emit error.
    pub fn advance<F>(&mut self, tokens: Vec<String>, mut emit: F) -> io::Result<()>
    where
        F: FnMut(&[String]) -> io::Result<()>,
    {
        self.buf.extend(tokens);
        if self.buf.len() < self.width {
            return Ok(());
        }
        let mut start = 0;
        while self.buf.len() - start >= self.width {
            emit(&self.buf[start..start + self.width])?;
            start += 1;
        }
        self.buf.drain(..start);
        Ok(())
    }

    /// Emit the remaining partial window (fewer than `width` tokens) once,
    /// at end of input. The buffer is left empty.
    pub fn flush<F>(&mut self, mut emit: F) -> io::Result<()>
    where
        F: FnMut(&[String]) -> io::Result<()>,
    {
        if !self.buf.is_empty() {
            emit(&self.buf)?;
            self.buf.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    fn collect_windows(emitter: &mut WindowEmitter, lines: &[&str]) -> Vec<String> {
        let mut out = Vec::new();
        for line in lines {
            emitter
                .advance(toks(line), |w| {
                    out.push(w.join("\t"));
                    Ok(())
                })
                .unwrap();
        }
        out
    }

    #[test]
    fn windows_span_line_boundaries() {
        let mut em = WindowEmitter::new(3);
        let windows = collect_windows(&mut em, &["a b", "c d"]);
        assert_eq!(windows, vec!["a\tb\tc", "b\tc\td"]);
    }

    #[test]
    fn flush_emits_short_trailing_record_once() {
        let mut em = WindowEmitter::new(3);
        let _ = collect_windows(&mut em, &["a b", "c d"]);
        let mut tail = Vec::new();
        em.flush(|w| {
            tail.push(w.join("\t"));
            Ok(())
        })
        .unwrap();
        assert_eq!(tail, vec!["c\td"]);
        // A second flush emits nothing.
        em.flush(|_| panic!("buffer should be empty")).unwrap();
    }

    #[test]
    fn stream_shorter_than_width_only_flushes() {
        let mut em = WindowEmitter::new(4);
        let windows = collect_windows(&mut em, &["a b c"]);
        assert!(windows.is_empty());
        let mut tail = Vec::new();
        em.flush(|w| {
            tail.push(w.join("\t"));
            Ok(())
        })
        .unwrap();
        assert_eq!(tail, vec!["a\tb\tc"]);
    }

    #[test]
    fn width_one_emits_every_token_with_empty_tail() {
        let mut em = WindowEmitter::new(1);
        let windows = collect_windows(&mut em, &["a b", "c"]);
        assert_eq!(windows, vec!["a", "b", "c"]);
        em.flush(|_| panic!("no trailing record for width 1")).unwrap();
    }

    #[test]
    fn window_count_matches_token_count() {
        // 7 tokens, width 3: exactly 5 windows however the lines fall.
        for split in [
            vec!["t1 t2 t3 t4 t5 t6 t7"],
            vec!["t1", "t2 t3 t4 t5 t6 t7"],
            vec!["t1 t2 t3", "t4 t5 t6", "t7"],
            vec!["t1", "t2", "t3", "t4", "t5", "t6", "t7"],
        ] {
            let mut em = WindowEmitter::new(3);
            let windows = collect_windows(&mut em, &split);
            assert_eq!(windows.len(), 5, "split {:?}", split);
        }
    }
}
