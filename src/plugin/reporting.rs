//! Broadcasts to the configured stream channels: guild membership changes and fatal command errors

use crate::{event::*, log_error, plugin::*};
use anyhow::{anyhow, Result};
use chrono::Utc;
use serenity::all::{
    ChannelId, Colour, CreateEmbed, CreateEmbedFooter, CreateMessage, GuildId, Message,
};

/// Discord refuses embed descriptions longer than this
const MAX_DESCRIPTION: usize = 4096;

pub struct Reporting;

#[serenity::async_trait]
impl Plugin for Reporting {
    fn name(&self) -> &'static str {
        "reporting"
    }

    fn usage(&self, _prefix: &str) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> Result<EventHandled> {
        let announcement = match event {
            Event::GuildJoin(guild) => joined(&guild.name, guild.id),
            Event::GuildLeave { id, name } => left(name.as_deref(), *id),
            _ => return Ok(EventHandled::No),
        };

        let Some(channel) = ctx.cfg.read().await.streams.guilds() else {
            return Ok(EventHandled::Yes);
        };

        channel
            .send_message(ctx.cache_http, CreateMessage::new().content(announcement))
            .await
            .map_err(|e| anyhow!("Could not broadcast to guilds stream `{}`: {}", channel, e))?;

        Ok(EventHandled::Yes)
    }
}

fn joined(name: &str, id: GuildId) -> String {
    format!("\u{1f535} {} `{}`", name, id)
}

fn left(name: Option<&str>, id: GuildId) -> String {
    format!("\u{1f534} {} `{}`", name.unwrap_or("<unknown guild>"), id)
}

/// Sends a `fatal error` embed describing `err` to the errors stream, if there is one
pub async fn broadcast_error(ctx: &Context<'_>, msg: &Message, cmd: &Invocation, err: &anyhow::Error) {
    let Some(channel) = ctx.cfg.read().await.streams.errors() else {
        return;
    };

    let embed = error_embed(ctx, msg, cmd, err);
    if let Err(e) = send_embed(ctx, channel, embed).await {
        log_error!("Could not broadcast to errors stream `{}`: {}", channel, e);
    }
}

fn error_embed(ctx: &Context<'_>, msg: &Message, cmd: &Invocation, err: &anyhow::Error) -> CreateEmbed {
    let trace = format!("{:?}", err);
    let mut embed = CreateEmbed::new()
        .title("fatal error")
        .colour(Colour::RED)
        .description(format!("```\n{}\n```", truncate(&trace, MAX_DESCRIPTION - 8)))
        .field("command", format!("`{}{}`", cmd.prefix, cmd.name), false)
        .field(
            "invoker",
            format!("{} `{}`", msg.author.tag(), msg.author.id),
            false,
        )
        .footer(CreateEmbedFooter::new(Utc::now().to_rfc3339()));

    if let Some(guild_id) = msg.guild_id {
        let name = ctx
            .cache
            .guild(guild_id)
            .map(|guild| guild.name.clone())
            .unwrap_or_default();
        embed = embed.field("guild", format!("{} `{}`", name, guild_id), false);
    }

    embed
}

async fn send_embed(ctx: &Context<'_>, channel: ChannelId, embed: CreateEmbed) -> Result<()> {
    channel
        .send_message(ctx.cache_http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

/// At most `max` bytes of `s`, cut on a character boundary
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
