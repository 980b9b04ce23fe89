use crate::{
    error::fail,
    event::*,
    helper::{describe, InvocationHelper, MessageHelper},
    log_internal,
    plugin::*,
};
use anyhow::Result;
use serenity::all::{Colour, CreateEmbed, CreateMessage, Message};

/// Commands for bot admins: blocking users, managing admins and the process itself
pub struct Admin;

#[serenity::async_trait]
impl Plugin for Admin {
    fn name(&self) -> &'static str {
        "admin"
    }

    fn usage(&self, prefix: &str) -> Option<String> {
        Some(format!(
            "{p}block <user> [reason] - block someone from me (bot admins only)\n\
             {p}block info <user> - show why someone is blocked (bot admins only)\n\
             {p}unblock <user> - unblock someone (bot admins only)\n\
             {p}promote <user> - make someone a global admin (bot admins only)\n\
             {p}reload - reload configuration (bot admins only)\n\
             {p}die - disconnect and exit (bot admins only)",
            p = prefix
        ))
    }

    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> Result<EventHandled> {
        let Some((msg, cmd)) =
            event.is_bot_cmd(&["block", "unblock", "promote", "reload", "die"])
        else {
            return Ok(EventHandled::No);
        };

        msg.require_admin(ctx).await?;

        match (cmd.name.as_str(), cmd.arg(0)) {
            ("block", Some("info")) => block_info(ctx, msg, cmd).await?,
            ("block", _) => block(ctx, msg, cmd).await?,
            ("unblock", _) => unblock(ctx, msg, cmd).await?,
            ("promote", _) => promote(ctx, msg, cmd).await?,
            ("reload", _) => reload(ctx, msg).await?,
            _ => die(ctx, msg).await?,
        }

        Ok(EventHandled::Yes)
    }
}

async fn block(ctx: &Context<'_>, msg: &Message, cmd: &Invocation) -> Result<()> {
    let who = cmd.user_arg(ctx, 0).await?;
    if who.id == msg.author.id {
        return fail("you can't block yourself.");
    }

    ctx.blocklist
        .block(who.id, cmd.rest(1), msg.author.id)
        .await?;
    log_internal!("{} blocked {} ({})", msg.author.name, who.name, who.id);

    msg.reply(ctx.cache_http, format!("\u{1f44c} blocked {}.", describe(&who)))
        .await?;
    Ok(())
}

async fn block_info(ctx: &Context<'_>, msg: &Message, cmd: &Invocation) -> Result<()> {
    let who = cmd.user_arg(ctx, 1).await?;

    let Some(record) = ctx.blocklist.info(who.id).await? else {
        msg.reply(ctx.cache_http, "that user isn't blocked.").await?;
        return Ok(());
    };

    let admin = match record.blocked_by.to_user(ctx.cache_http).await {
        Ok(admin) => describe(&admin),
        Err(_) => "`<unknown user>`".to_owned(),
    };
    let reason = match record.reason.as_deref() {
        Some(reason) if !reason.is_empty() => reason.to_owned(),
        _ => "`<no reason>`".to_owned(),
    };

    let embed = CreateEmbed::new()
        .title(describe(&who))
        .colour(Colour::RED)
        .field("admin", admin, false)
        .field("reason", reason, false)
        .timestamp(record.blocked_at);

    msg.channel_id
        .send_message(ctx.cache_http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

async fn unblock(ctx: &Context<'_>, msg: &Message, cmd: &Invocation) -> Result<()> {
    let who = cmd.user_arg(ctx, 0).await?;

    if ctx.blocklist.unblock(who.id).await? {
        log_internal!("{} unblocked {} ({})", msg.author.name, who.name, who.id);
    }

    msg.reply(ctx.cache_http, format!("\u{1f44c} unblocked {}.", describe(&who)))
        .await?;
    Ok(())
}

async fn promote(ctx: &Context<'_>, msg: &Message, cmd: &Invocation) -> Result<()> {
    let who = cmd.user_arg(ctx, 0).await?;

    {
        let mut cfg = ctx.cfg.write().await;
        if cfg.is_admin(who.id) {
            return fail(format!("{} is already a global admin.", who.tag()));
        }
        cfg.add_admin(who.id).await?;
    }
    log_internal!("{} promoted {} ({})", msg.author.name, who.name, who.id);

    msg.reply(
        ctx.cache_http,
        format!("\u{1f44c} made {} a global admin.", who.tag()),
    )
    .await?;
    Ok(())
}

async fn reload(ctx: &Context<'_>, msg: &Message) -> Result<()> {
    ctx.cfg.write().await.reload().await?;
    log_internal!("Configuration reloaded by {}", msg.author.name);

    msg.reply(ctx.cache_http, "configuration reloaded.").await?;
    Ok(())
}

async fn die(ctx: &Context<'_>, msg: &Message) -> Result<()> {
    msg.reply(ctx.cache_http, "ok, bye.").await?;
    log_internal!("Shutdown requested by {}", msg.author.name);
    ctx.shutdown.notify_one();
    Ok(())
}
