use crate::{
    error::fail,
    event::*,
    guild_config::{self, SCHEMA},
    helper::MessageHelper,
    log_internal,
    plugin::*,
};
use anyhow::Result;
use serenity::all::{
    Colour, CreateEmbed, CreateEmbedFooter, CreateMessage, EditProfile, GuildId, Message,
    Permissions,
};

/// Per-server configuration: prefixes and schema keys
pub struct Cfg;

#[serenity::async_trait]
impl Plugin for Cfg {
    fn name(&self) -> &'static str {
        "cfg"
    }

    fn usage(&self, prefix: &str) -> Option<String> {
        Some(format!(
            "{p}cfg prefix add <prefix> - add a prefix for this server\n\
             {p}cfg prefix remove <prefix> - remove a prefix\n\
             {p}cfg prefix list - list this server's prefixes\n\
             {p}cfg schema - list configuration keys\n\
             {p}cfg set <key> <value> - set a configuration key\n\
             {p}cfg nick <nick> - change my nickname on this server\n\
             {p}cfg username <name> - change my username (bot admins only)",
            p = prefix
        ))
    }

    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> Result<EventHandled> {
        let Some((msg, cmd)) = event.is_bot_cmd(&["cfg", "config"]) else {
            return Ok(EventHandled::No);
        };

        match cmd.arg(0) {
            Some("nick") => {
                nick(ctx, msg, cmd).await?;
                return Ok(EventHandled::Yes);
            }
            Some("username") => {
                username(ctx, msg, cmd).await?;
                return Ok(EventHandled::Yes);
            }
            _ => {}
        }

        msg.require_permissions(ctx, Permissions::MANAGE_GUILD)?;
        let Some(guild_id) = msg.guild_id else {
            return fail("you can't do that in a dm.");
        };

        match (cmd.arg(0), cmd.arg(1)) {
            (Some("prefix"), Some("add")) => prefix_add(ctx, msg, cmd, guild_id).await?,
            (Some("prefix"), Some("remove")) => prefix_remove(ctx, msg, cmd, guild_id).await?,
            (Some("prefix"), Some("list")) => prefix_list(ctx, msg, guild_id).await?,
            (Some("schema"), _) => schema(ctx, msg).await?,
            (Some("set"), _) => set(ctx, msg, cmd, guild_id).await?,
            _ => return fail("input error: unknown subcommand. see `{prefix}help`."),
        }

        Ok(EventHandled::Yes)
    }
}

async fn prefix_add(
    ctx: &Context<'_>,
    msg: &Message,
    cmd: &Invocation,
    guild_id: GuildId,
) -> Result<()> {
    let Some(prefix) = cmd.rest(2) else {
        return fail("input error: missing a prefix.");
    };

    let defaults = ctx.cfg.read().await.general.default_prefixes.clone();
    ctx.guilds.add_prefix(guild_id, &prefix, &defaults).await?;

    msg.reply(ctx.cache_http, "\u{1f44c}").await?;
    Ok(())
}

async fn prefix_remove(
    ctx: &Context<'_>,
    msg: &Message,
    cmd: &Invocation,
    guild_id: GuildId,
) -> Result<()> {
    let Some(prefix) = cmd.rest(2) else {
        return fail("input error: missing a prefix.");
    };

    let defaults = ctx.cfg.read().await.general.default_prefixes.clone();
    ctx.guilds
        .remove_prefix(guild_id, &prefix, &defaults)
        .await?;

    msg.reply(ctx.cache_http, "\u{1f44c}").await?;
    Ok(())
}

async fn prefix_list(ctx: &Context<'_>, msg: &Message, guild_id: GuildId) -> Result<()> {
    let defaults = ctx.cfg.read().await.general.default_prefixes.clone();
    let prefixes = ctx.guilds.prefixes(guild_id, &defaults).await?;

    let embed = CreateEmbed::new()
        .title("prefixes")
        .colour(Colour::BLURPLE)
        .description(bullets(&prefixes))
        .footer(CreateEmbedFooter::new("mentioning me will always work"));

    msg.channel_id
        .send_message(ctx.cache_http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

async fn schema(ctx: &Context<'_>, msg: &Message) -> Result<()> {
    if SCHEMA.is_empty() {
        return fail("there are no config fields.");
    }

    let lines: Vec<String> = SCHEMA
        .iter()
        .map(|field| {
            format!(
                "{}: `{}`, {}",
                field.key,
                field.kind.pretty(),
                field.description
            )
        })
        .collect();

    msg.reply(ctx.cache_http, lines.join("\n")).await?;
    Ok(())
}

async fn set(ctx: &Context<'_>, msg: &Message, cmd: &Invocation, guild_id: GuildId) -> Result<()> {
    let (Some(key), Some(value)) = (cmd.arg(1), cmd.rest(2)) else {
        return fail("input error: usage is `{prefix}cfg set <key> <value>`.");
    };

    let Some(field) = guild_config::field(key) else {
        return fail("that key is invalid.");
    };
    if !field.kind.accepts(&value) {
        return fail(format!(
            "that key is not a valid {}.",
            field.kind.pretty()
        ));
    }

    ctx.guilds.set(guild_id, key, &value).await?;

    msg.reply(ctx.cache_http, "\u{1f44c} set.").await?;
    Ok(())
}

async fn nick(ctx: &Context<'_>, msg: &Message, cmd: &Invocation) -> Result<()> {
    msg.require_permissions(ctx, Permissions::MANAGE_NICKNAMES)?;
    let Some(guild_id) = msg.guild_id else {
        return fail("you can't do that in a dm.");
    };
    let Some(nick) = cmd.rest(1) else {
        return fail("input error: missing a nickname.");
    };

    if let Err(e) = guild_id.edit_nickname(ctx.cache_http, Some(nick.as_str())).await {
        return fail(format!("failed to edit nick: `{}`", e));
    }

    msg.reply(ctx.cache_http, "\u{1f44c}").await?;
    Ok(())
}

async fn username(ctx: &Context<'_>, msg: &Message, cmd: &Invocation) -> Result<()> {
    msg.require_admin(ctx).await?;
    let Some(name) = cmd.rest(1) else {
        return fail("input error: missing a username.");
    };

    let mut me = ctx.cache.current_user().clone();
    if let Err(e) = me
        .edit(ctx.cache_http, EditProfile::new().username(name))
        .await
    {
        return fail(format!("failed to edit username: `{}`", e));
    }
    log_internal!("Username changed to {} by {}", me.name, msg.author.name);

    msg.reply(ctx.cache_http, "\u{1f44c}").await?;
    Ok(())
}

fn bullets(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("\u{2022} {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_bullets() {
        let prefixes = vec!["k?".to_owned(), "!".to_owned()];
        assert_eq!(bullets(&prefixes), "\u{2022} k?\n\u{2022} !");
        assert_eq!(bullets(&[]), "");
    }
}
