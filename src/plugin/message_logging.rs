use crate::{db, db::LoggedMessage, event::*, log_error, plugin::*};
use anyhow::Result;
use serenity::all::{GuildId, Message};

/// Records every message in guilds which opted in with `message_logging`
pub struct MessageLogging;

#[serenity::async_trait]
impl Plugin for MessageLogging {
    fn name(&self) -> &'static str {
        "message_logging"
    }

    fn usage(&self, _prefix: &str) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> Result<EventHandled> {
        let Event::Message { msg, .. } = event else {
            return Ok(EventHandled::No);
        };
        let Some(guild_id) = msg.guild_id else {
            return Ok(EventHandled::No);
        };

        // Logging is passive: a failure here must not keep commands from running
        if let Err(e) = log(ctx, msg, guild_id).await {
            log_error!("Could not log message {}: {:#}", msg.id, e);
        }
        Ok(EventHandled::No)
    }
}

async fn log(ctx: &Context<'_>, msg: &Message, guild_id: GuildId) -> Result<()> {
    if !ctx.guilds.is_set(guild_id, "message_logging").await? {
        return Ok(());
    }

    let (guild_name, channel_name) = match ctx.cache.guild(guild_id) {
        Some(guild) => (
            guild.name.clone(),
            guild
                .channels
                .get(&msg.channel_id)
                .map(|channel| channel.name.clone())
                .unwrap_or_default(),
        ),
        None => return Ok(()),
    };

    let author_tag = msg.author.tag();
    db::log_message(
        ctx.db,
        &LoggedMessage {
            id: msg.id.get(),
            content: &msg.content,
            created_at: *msg.timestamp,
            author_id: msg.author.id.get(),
            author_tag: &author_tag,
            channel_id: msg.channel_id.get(),
            channel_name: &channel_name,
            guild_id: guild_id.get(),
            guild_name: &guild_name,
        },
    )
    .await?;

    Ok(())
}
