use crate::{event::*, log_event, logging, plugin::*};
use anyhow::Result;

/// Prints debug information about event to stdout
pub struct Debug;

#[serenity::async_trait]
impl Plugin for Debug {
    fn name(&self) -> &'static str {
        "debug"
    }

    fn usage(&self, _prefix: &str) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> Result<EventHandled> {
        match event {
            Event::Ready(ready) => {
                log_event!(
                    "Connected to {} server(s) as {}",
                    ready.guilds.len(),
                    logging::user(&ready.user),
                );
            }
            Event::Message { msg, .. } => {
                log_event!("{} {}", logging::origin(ctx.cache, msg), msg.content);
            }
            Event::GuildJoin(guild) => {
                log_event!(
                    "Joined server {} ({})",
                    logging::guild(Some(&guild.name)),
                    guild.id
                );
            }
            Event::GuildLeave { id, name } => {
                log_event!("Left server {} ({})", logging::guild(name.as_deref()), id);
            }
        }

        Ok(EventHandled::No)
    }
}
