use std::time::Instant;
use tracing::info;

/// Logs how long a scope took when dropped.
pub struct Timer {
    label: &'static str,
    started: Instant,
}

impl Timer {
    pub fn start(label: &'static str) -> Self {
        info!("{} started", label);
        Self { label, started: Instant::now() }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!("{} finished in {:.2?}", self.label, self.started.elapsed());
    }
}

/// `1234567` → `"1,234,567"`.
pub fn fmt_number(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let groups: Vec<&str> = digits
        .as_bytes()
        .rchunks(3)
        .rev()
        .filter_map(|g| std::str::from_utf8(g).ok())
        .collect();
    let sign = if n < 0 { "-" } else { "" };
    format!("{}{}", sign, groups.join(","))
}

/// First `max_chars` characters of `s`, with "…" appended when cut.
pub fn snippet(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
