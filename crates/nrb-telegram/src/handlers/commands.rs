/// Split `/cmd@botname args` into (`cmd`, `args`). Returns `None` for non-commands.
pub fn parse_command(text: &str) -> Option<(String, String)> {
    let text = text.trim();
    if !text.starts_with('/') {
        return None;
    }

    let mut parts = text.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    if cmd.is_empty() {
        return None;
    }
    Some((cmd, rest))
}

/// Only `/start` is a command; any other text goes through the rewrite pipeline.
pub fn is_start(text: &str) -> bool {
    matches!(parse_command(text), Some((cmd, _)) if cmd == "start")
}
