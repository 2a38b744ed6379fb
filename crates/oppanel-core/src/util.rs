//! Text helpers shared by settings, the remote adapter and the CLI.

/// Longest text kept when echoing remote error bodies or payload previews.
pub const MAX_COMPACT_CHARS: usize = 180;

/// Trimmed value, or `None` for a missing or blank one.
///
/// Settings read from the environment or a config file go through this so
/// `SUPABASE_URL=""` behaves like an unset variable.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_owned())
        .filter(|trimmed| !trimmed.is_empty())
}

pub fn is_http_url(value: &str) -> bool {
    ["http://", "https://"]
        .iter()
        .any(|scheme| value.starts_with(scheme))
}

/// Trim and cap at [`MAX_COMPACT_CHARS`] characters.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(MAX_COMPACT_CHARS).collect()
}
