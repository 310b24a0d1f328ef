use crate::core::compat::{DisplayResult, DisplayState};
use poise::serenity_prelude as serenity;

const COMPAT_LIST_URL: &str = "https://rpcs3.net/compatibility";
const COMMIT_URL: &str = "https://github.com/RPCS3/rpcs3/commit";
const PULL_URL: &str = "https://github.com/RPCS3/rpcs3/pull";
const FORUM_THREAD_URL: &str = "https://forums.rpcs3.net/thread";

/// Turn a lookup result into an embed.
pub fn build_result_embed(result: &DisplayResult) -> serenity::CreateEmbed {
    let mut embed = serenity::CreateEmbed::new()
        .title(embed_title(result))
        .description(embed_description(result))
        .color(status_colour(result));

    if let (Some(code), DisplayState::Known { .. }) = (&result.code, &result.state) {
        embed = embed.url(format!("{COMPAT_LIST_URL}?g={code}"));
    }

    if !result.for_log {
        if let Some(thumbnail) = &result.thumbnail_url {
            embed = embed.thumbnail(thumbnail.clone());
        }
    }

    embed
}

/// Answered codes stay in the title so the next message mentioning them can
/// be skipped. Service-state replies are left unprefixed so they get retried.
fn embed_title(result: &DisplayResult) -> String {
    let answered = matches!(
        result.state,
        DisplayState::Known { .. } | DisplayState::Unknown
    );
    match &result.code {
        Some(code) if answered && !result.title.contains(code.as_str()) => {
            format!("[{code}] {}", truncate(&result.title, 240))
        }
        _ => truncate(&result.title, 256),
    }
}

fn embed_description(result: &DisplayResult) -> String {
    match &result.state {
        DisplayState::Known { status } => {
            let mut lines = Vec::new();
            match &result.date {
                Some(date) => lines.push(format!("Status: **{status}** since {date}")),
                None => lines.push(format!("Status: **{status}**")),
            }

            let mut links = Vec::new();
            if let Some(commit) = &result.commit {
                let short = commit.chars().take(7).collect::<String>();
                links.push(format!("[`{short}`]({COMMIT_URL}/{commit})"));
            }
            if let Some(pr) = result.pr {
                links.push(format!("[PR #{pr}]({PULL_URL}/{pr})"));
            }
            if let Some(thread) = result.thread {
                links.push(format!("[Forum thread]({FORUM_THREAD_URL}-{thread}.html)"));
            }
            if !links.is_empty() {
                lines.push(format!("Tested on build {}", links.join(" · ")));
            }

            lines.join("\n")
        }
        DisplayState::Unknown => {
            "No compatibility report for this title yet, feel free to test it and submit one."
                .to_string()
        }
        DisplayState::Maintenance => "Please try again in a few minutes.".to_string(),
        DisplayState::CommunicationError => match &result.code {
            Some(code) => format!("Couldn't look up {code} right now."),
            None => "Couldn't reach the compatibility list right now.".to_string(),
        },
    }
}

fn status_colour(result: &DisplayResult) -> u32 {
    match &result.state {
        DisplayState::Known { status } => match status.to_ascii_lowercase().as_str() {
            "playable" => 0x1EBC61,
            "ingame" => 0xF9B32F,
            "intro" => 0xE08A1E,
            "loadable" => 0xE74C3C,
            "nothing" => 0x455556,
            _ => 0x3198FF,
        },
        DisplayState::Unknown => 0x3198FF,
        DisplayState::Maintenance | DisplayState::CommunicationError => 0xE74C3C,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}
