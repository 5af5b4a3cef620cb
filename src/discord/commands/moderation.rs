// Discord commands for content moderation.
//
// **Notice the pattern:**
// 1. Extract primitive data from Discord types
// 2. Call core service
// 3. Format the response based on the result
//
// This layer is THIN - no business logic, just translation.

use crate::core::analytics::{AnalyticsService, SystemSummary, UserSummary};
use crate::core::moderation::{
    Classification, ContentStatus, ModerationService, ModerationStore, RequestView, ResultView,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// One store instance shared by the orchestrator and analytics.
pub type SharedStore = Arc<dyn ModerationStore>;

pub struct Data {
    pub moderation: Arc<ModerationService<SharedStore>>,
    pub analytics: Arc<AnalyticsService<SharedStore>>,
}

// Discord rejects embed fields longer than this.
const FIELD_LIMIT: usize = 1024;

/// Submit content for moderation and inspect the results.
#[poise::command(
    slash_command,
    subcommands("text", "image", "result", "summary", "stats"),
    guild_only
)]
pub async fn moderate(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Classify a piece of text.
#[poise::command(slash_command, guild_only)]
pub async fn text(
    ctx: Context<'_>,
    #[description = "Text to moderate"] content: String,
    #[description = "LLM provider (defaults to the first configured)"] provider: Option<String>,
) -> Result<(), Error> {
    ctx.defer().await?;

    let submitter = ctx.author().name.clone();
    let submitted = ctx
        .data()
        .moderation
        .submit_text(&submitter, &content, provider.as_deref())
        .await;

    match submitted {
        Ok(view) => reply_with_request(ctx, &view).await,
        Err(e) => reply_error(ctx, e).await,
    }
}

/// Classify an image attachment.
#[poise::command(slash_command, guild_only)]
pub async fn image(
    ctx: Context<'_>,
    #[description = "Image to moderate"] attachment: serenity::Attachment,
    #[description = "LLM provider (defaults to the first configured)"] provider: Option<String>,
) -> Result<(), Error> {
    let is_image = attachment
        .content_type
        .as_deref()
        .map(|t| t.starts_with("image/"))
        .unwrap_or(false);
    if !is_image {
        ctx.send(
            poise::CreateReply::default()
                .content("❌ That attachment is not an image.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    ctx.defer().await?;

    let bytes = attachment.download().await?;
    let encoded = STANDARD.encode(&bytes);
    let submitter = ctx.author().name.clone();

    let submitted = ctx
        .data()
        .moderation
        .submit_image(&submitter, &encoded, provider.as_deref())
        .await;

    match submitted {
        Ok(view) => reply_with_request(ctx, &view).await,
        Err(e) => reply_error(ctx, e).await,
    }
}

/// Look up the result of a moderation request.
#[poise::command(slash_command, guild_only)]
pub async fn result(
    ctx: Context<'_>,
    #[description = "Request id"] request_id: i64,
) -> Result<(), Error> {
    match ctx.data().moderation.get_result(request_id).await {
        Ok(Some(result)) => {
            let logs = ctx.data().moderation.notification_logs(request_id).await?;
            let alerts = if logs.is_empty() {
                "None sent".to_string()
            } else {
                logs.iter()
                    .map(|log| format!("**{}**: {}", log.channel, log.status))
                    .collect::<Vec<_>>()
                    .join("\n")
            };

            let embed = result_embed(&result).field("Alerts", alerts, false);
            ctx.send(poise::CreateReply::default().embed(embed)).await?;
            Ok(())
        }
        Ok(None) => {
            ctx.send(
                poise::CreateReply::default()
                    .content(format!("No result for request #{}.", request_id))
                    .ephemeral(true),
            )
            .await?;
            Ok(())
        }
        Err(e) => reply_error(ctx, e).await,
    }
}

/// Moderation history for a user.
#[poise::command(slash_command, guild_only)]
pub async fn summary(
    ctx: Context<'_>,
    #[description = "User to check (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let target_user = user.as_ref().unwrap_or_else(|| ctx.author());

    match ctx.data().analytics.user_summary(&target_user.name).await {
        Ok(summary) => {
            let embed = user_summary_embed(&summary).thumbnail(target_user.face());
            ctx.send(poise::CreateReply::default().embed(embed)).await?;
            Ok(())
        }
        Err(e) => reply_error(ctx, e).await,
    }
}

/// System-wide moderation statistics.
#[poise::command(slash_command, guild_only)]
pub async fn stats(ctx: Context<'_>) -> Result<(), Error> {
    match ctx.data().analytics.system_summary().await {
        Ok(summary) => {
            let embed = system_summary_embed(&summary);
            ctx.send(poise::CreateReply::default().embed(embed)).await?;
            Ok(())
        }
        Err(e) => reply_error(ctx, e).await,
    }
}

// ============================================================================
// RENDERING
// ============================================================================

async fn reply_with_request(ctx: Context<'_>, view: &RequestView) -> Result<(), Error> {
    let mut embed = serenity::CreateEmbed::new()
        .title(format!("🛡️ Moderation Request #{}", view.request_id))
        .color(status_color(view.status))
        .field("Status", format!("{} {}", status_emoji(view.status), view.status), true)
        .field("Type", view.kind.to_string(), true)
        .field("Submitted by", view.submitter.clone(), true)
        .field("Created", discord_time(view.created_at), true);

    if view.status == ContentStatus::Completed {
        if let Some(result) = ctx.data().moderation.get_result(view.request_id).await? {
            embed = embed
                .color(classification_color(result.classification))
                .field(
                    "Classification",
                    format!("**{}**", result.classification.as_str().to_uppercase()),
                    true,
                )
                .field("Confidence", format!("{:.2}", result.confidence), true)
                .field("Provider", result.provider.clone(), true)
                .field("Reasoning", truncate(&result.reasoning), false);
        }
    }

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

async fn reply_error(ctx: Context<'_>, err: impl Display) -> Result<(), Error> {
    tracing::warn!(user = %ctx.author().name, "Moderation command failed: {}", err);
    ctx.send(
        poise::CreateReply::default()
            .content(format!("❌ {}", err))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

fn result_embed(result: &ResultView) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title(format!("🛡️ Moderation Result #{}", result.request_id))
        .color(classification_color(result.classification))
        .field(
            "Classification",
            format!("**{}**", result.classification.as_str().to_uppercase()),
            true,
        )
        .field("Confidence", format!("{:.2}", result.confidence), true)
        .field("Provider", result.provider.clone(), true)
        .field("Reasoning", truncate(&result.reasoning), false)
        .field("Submitted", discord_time(result.created_at), false)
}

fn user_summary_embed(summary: &UserSummary) -> serenity::CreateEmbed {
    let recent = if summary.recent_activity.is_empty() {
        "No requests yet".to_string()
    } else {
        summary
            .recent_activity
            .iter()
            .map(|item| {
                let label = item
                    .classification
                    .map(|c| format!(" → {}", c))
                    .unwrap_or_default();
                format!(
                    "`#{}` {} {} {}{}",
                    item.request_id,
                    status_emoji(item.status),
                    item.kind,
                    item.created_at.format("%Y-%m-%d %H:%M"),
                    label
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let last = summary
        .last_request_timestamp
        .map(discord_time)
        .unwrap_or_else(|| "Never".to_string());

    serenity::CreateEmbed::new()
        .title(format!("📋 Moderation Summary for {}", summary.submitter))
        .color(0x5865F2)
        .field("Total", summary.total.to_string(), true)
        .field("Completed", summary.completed_count.to_string(), true)
        .field("Failed", summary.failed_count.to_string(), true)
        .field(
            "Classifications",
            format_histogram(&summary.classification_histogram),
            false,
        )
        .field("Recent activity", truncate(&recent), false)
        .field("Last request", last, false)
}

fn system_summary_embed(summary: &SystemSummary) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title("📊 Moderation Statistics")
        .color(0x5865F2)
        .field("Total requests", summary.total.to_string(), true)
        .field(
            "Last 24 hours",
            summary.requests_in_last_24h.to_string(),
            true,
        )
        .field("By status", format_histogram(&summary.status_histogram), false)
        .field(
            "By classification",
            format_histogram(&summary.classification_histogram),
            false,
        )
}

/// Discord renders `<t:UNIX:R>` in the reader's locale, e.g. "3 hours ago".
fn discord_time(ts: DateTime<Utc>) -> String {
    format!("<t:{}:R>", ts.timestamp())
}

fn format_histogram<K: Display>(histogram: &BTreeMap<K, u64>) -> String {
    if histogram.is_empty() {
        return "None".to_string();
    }
    histogram
        .iter()
        .map(|(key, count)| format!("**{}**: {}", key, count))
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate(text: &str) -> String {
    if text.is_empty() {
        return "-".to_string();
    }
    if text.chars().count() <= FIELD_LIMIT {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(FIELD_LIMIT - 3).collect();
    cut.push_str("...");
    cut
}

fn status_emoji(status: ContentStatus) -> &'static str {
    match status {
        ContentStatus::Pending => "⏳",
        ContentStatus::Completed => "✅",
        ContentStatus::Failed => "❌",
    }
}

fn status_color(status: ContentStatus) -> u32 {
    match status {
        ContentStatus::Pending => 0xF1C40F,
        ContentStatus::Completed => 0x2ECC71,
        ContentStatus::Failed => 0x95A5A6,
    }
}

fn classification_color(classification: Classification) -> u32 {
    match classification {
        Classification::Safe => 0x2ECC71,
        Classification::Spam => 0xE67E22,
        Classification::Toxic | Classification::Harassment => 0xE74C3C,
    }
}
