// Bot presence.
//
// Discord-layer glue only: the status line tells members which providers
// are answering `/moderate` right now.

use poise::serenity_prelude as serenity;

fn status_line(providers: &[&str]) -> String {
    if providers.is_empty() {
        "content (no LLM providers configured)".to_string()
    } else {
        format!("content via {}", providers.join(", "))
    }
}

/// Called once the bot is ready.
pub fn on_ready(ctx: &serenity::Context, providers: &[&str]) {
    let activity = serenity::ActivityData::watching(status_line(providers));
    let status = if providers.is_empty() {
        serenity::OnlineStatus::DoNotDisturb
    } else {
        serenity::OnlineStatus::Online
    };
    ctx.set_presence(Some(activity), status);
}
