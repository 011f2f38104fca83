//! Incremental `text/event-stream` decoder.
//!
//! Bytes arrive in arbitrary chunks; an event is dispatched on each blank
//! line. Comment lines (leading `:`) are the usual keep-alive and are dropped.
//! `retry` is skipped as well: reconnect pacing is owned by the monitor's policy.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseMessage {
    pub event: Option<String>,
    pub id: Option<String>,
    pub data: String,
}

#[derive(Debug, Default)]
pub struct SseParser {
    line: Vec<u8>,
    data: Vec<String>,
    event: Option<String>,
    id: Option<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one body chunk; returns every message completed by it.
    pub fn push_bytes(&mut self, chunk: &[u8]) -> Vec<SseMessage> {
        let mut out = Vec::new();
        for &b in chunk {
            if b != b'\n' {
                self.line.push(b);
                continue;
            }
            let mut line = std::mem::take(&mut self.line);
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.is_empty() {
                out.extend(self.dispatch());
            } else {
                self.field(&line);
            }
        }
        out
    }

    /// Flush a trailing message when the body ends without a blank line.
    pub fn finish(&mut self) -> Option<SseMessage> {
        let mut line = std::mem::take(&mut self.line);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if !line.is_empty() {
            self.field(&line);
        }
        self.dispatch()
    }

    fn field(&mut self, line: &[u8]) {
        if line[0] == b':' {
            return;
        }
        let (name, value) = match line.iter().position(|b| *b == b':') {
            Some(ix) => {
                let rest = &line[ix + 1..];
                (&line[..ix], rest.strip_prefix(b" ").unwrap_or(rest))
            }
            None => (line, &[][..]),
        };
        let value = String::from_utf8_lossy(value).into_owned();
        match name {
            b"data" => self.data.push(value),
            b"event" => self.event = Some(value),
            b"id" if !value.contains('\0') => self.id = Some(value),
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseMessage> {
        if self.data.is_empty() && self.event.is_none() && self.id.is_none() {
            return None;
        }
        let data = self.data.join("\n");
        self.data.clear();
        Some(SseMessage {
            event: self.event.take(),
            id: self.id.take(),
            data,
        })
    }
}
