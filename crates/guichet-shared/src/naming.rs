//! Templating for ticket channel names and welcome messages.
//!
//! Channel names must satisfy the host platform's rules (lowercase,
//! hyphen-separated, bounded length), so rendering substitutes the
//! placeholders first and then forces the result into the allowed alphabet.

/// Longest slice of the requester/category names carried into a channel name.
const SEGMENT_CAP: usize = 10;

/// Host platform upper bound on channel name length.
const NAME_CAP: usize = 100;

/// Render a ticket channel name from the community's configured template.
///
/// `{counter}` becomes the ticket number, `{user}` the requester's display
/// name and `{category}` the category name, both lowercased and capped at
/// ten characters. Any character outside `[a-z0-9-]` in the final string is
/// replaced by a hyphen and the whole name is capped at the platform limit.
pub fn ticket_channel_name(template: &str, number: u64, requester: &str, category: &str) -> String {
    let user_part: String = requester.to_lowercase().chars().take(SEGMENT_CAP).collect();
    let category_part: String = category.to_lowercase().chars().take(SEGMENT_CAP).collect();

    template
        .replace("{counter}", &number.to_string())
        .replace("{user}", &user_part)
        .replace("{category}", &category_part)
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '-' => c,
            _ => '-',
        })
        .take(NAME_CAP)
        .collect()
}

/// Render a welcome message template.
///
/// Supports `{user}` (mention markup), `{ticket_id}` and `{category}`.
pub fn welcome_text(template: &str, user_mention: &str, number: u64, category: &str) -> String {
    template
        .replace("{user}", user_mention)
        .replace("{ticket_id}", &number.to_string())
        .replace("{category}", category)
}
