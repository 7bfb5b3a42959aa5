//! String utilities
//!
//! Contains helper functions for safe string manipulation.

/// Safely truncate a string at a character boundary
///
/// # Example
/// ```
/// use tg_batch_uploader::utils::truncate_str;
///
/// let text = "Hello, 世界!";
/// assert_eq!(truncate_str(text, 8), "Hello, 世");
/// assert_eq!(truncate_str(text, 100), "Hello, 世界!");
/// ```
pub fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Mask a bot token for logging
///
/// Keeps the bot id (the part before `:`) and the last four characters of the
/// secret, so two tokens can still be told apart in logs.
///
/// # Example
/// ```
/// use tg_batch_uploader::utils::mask_token;
///
/// assert_eq!(mask_token("123456:ABCDEFGHIJKLmnop"), "123456:…mnop");
/// assert_eq!(mask_token("short"), "…");
/// ```
pub fn mask_token(token: &str) -> String {
    let (bot_id, secret) = match token.split_once(':') {
        Some((id, secret)) => (Some(id), secret),
        None => (None, token),
    };

    let count = secret.chars().count();
    let tail: String = if count > 8 {
        secret.chars().skip(count - 4).collect()
    } else {
        String::new()
    };

    match bot_id {
        Some(id) => format!("{}:…{}", id, tail),
        None => format!("…{}", tail),
    }
}
