use crate::{event::*, plugin::*};
use anyhow::Result;

pub struct Help;

#[serenity::async_trait]
impl Plugin for Help {
    fn name(&self) -> &'static str {
        "help"
    }

    fn usage(&self, prefix: &str) -> Option<String> {
        Some(format!("{}help - show this help message", prefix))
    }

    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> Result<EventHandled> {
        let Some((msg, cmd)) = event.is_bot_cmd(&["help"]) else {
            return Ok(EventHandled::No);
        };

        let disabled = ctx.cfg.read().await.general.disabled_plugins.clone();

        let mut reply = String::new();
        reply.push_str("```\n");
        reply.push_str("Commands:\n");
        for plugin in crate::plugin::plugins() {
            if disabled.iter().any(|name| name == plugin.name()) {
                continue;
            }
            if let Some(usage) = plugin.usage(&cmd.prefix) {
                reply.push_str(&usage);
                reply.push('\n');
            }
        }
        reply.push_str("```\n");

        msg.reply(ctx.cache_http, &reply).await?;
        Ok(EventHandled::Yes)
    }
}
