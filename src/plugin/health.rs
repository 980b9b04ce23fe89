use crate::{error::fail, event::*, plugin::*};
use anyhow::Result;
use serenity::all::EditMessage;
use tokio::time::Instant;

pub struct Health;

#[serenity::async_trait]
impl Plugin for Health {
    fn name(&self) -> &'static str {
        "health"
    }

    fn usage(&self, prefix: &str) -> Option<String> {
        Some(format!(
            "{p}ping - measure how long a reply takes (alias: {p}p)",
            p = prefix
        ))
    }

    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(&["ping", "p"]) else {
            return Ok(EventHandled::No);
        };

        let cooldown = ctx
            .vstate
            .write()
            .await
            .ping_cooldown
            .try_acquire(msg.author.id);
        if let Err(remaining) = cooldown {
            return fail(format!(
                "slow down, try again in `{:.1}s`.",
                remaining.as_secs_f64()
            ));
        }

        let before = Instant::now();
        let mut reply = msg.reply(ctx.cache_http, "po\u{2014}").await?;
        let elapsed = before.elapsed();

        reply
            .edit(
                ctx.cache_http,
                EditMessage::new().content(format!(
                    "pong! `{:.2}ms`",
                    elapsed.as_secs_f64() * 1000.0
                )),
            )
            .await?;

        Ok(EventHandled::Yes)
    }
}
