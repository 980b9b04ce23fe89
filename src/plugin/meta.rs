use crate::{event::*, plugin::*};
use anyhow::Result;
use serenity::all::{Colour, CreateEmbed, CreateMessage};

/// Information about the bot itself
pub struct Meta;

#[serenity::async_trait]
impl Plugin for Meta {
    fn name(&self) -> &'static str {
        "meta"
    }

    fn usage(&self, prefix: &str) -> Option<String> {
        Some(format!("{p}about - about me! (alias: {p}info)", p = prefix))
    }

    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(&["about", "info"]) else {
            return Ok(EventHandled::No);
        };

        let (description, admins) = {
            let cfg = ctx.cfg.read().await;
            (describe_bot(cfg.testing()), mentions(&cfg.general.admins))
        };
        let title = ctx.cache.current_user().tag();

        let embed = CreateEmbed::new()
            .title(title)
            .colour(Colour::BLURPLE)
            .description(description)
            .field("admins", admins, false);

        msg.channel_id
            .send_message(ctx.cache_http, CreateMessage::new().embed(embed))
            .await?;
        Ok(EventHandled::Yes)
    }
}

fn describe_bot(testing: bool) -> String {
    if testing {
        "i'm a cool bot (testing)".to_owned()
    } else {
        "i'm a cool bot".to_owned()
    }
}

fn mentions(ids: &[u64]) -> String {
    if ids.is_empty() {
        return "nobody".to_owned();
    }
    ids.iter()
        .map(|id| format!("<@{}>", id))
        .collect::<Vec<_>>()
        .join("\n")
}
