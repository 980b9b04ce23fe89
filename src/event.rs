//! The Serenity crate we're using for the Discord API is designed around callbacks to handle
//! events.  However, this does not mesh well with our plugin framework here.  To resolve this,
//! the handler translates the callbacks into a distinct Event enum.

use crate::{context::Context, error::CommandFailure, log_error};
use serenity::all::{Guild, GuildId, Message, Ready};

/// A Discord event
pub enum Event {
    Ready(Ready),
    Message {
        msg: Message,
        /// Set when the message starts with one of our prefixes
        cmd: Option<Invocation>,
    },
    GuildJoin(Guild),
    GuildLeave {
        id: GuildId,
        name: Option<String>,
    },
}

impl Event {
    // When an event occurs, iterate over all the plugins to see if any can/should handle it.
    //
    // An error stops the iteration: a message whose command failed is not offered to anyone else.
    // Messages only get here once their author has been admitted.
    pub async fn handle(self, ctx: &Context<'_>) {
        let disabled = ctx.cfg.read().await.general.disabled_plugins.clone();

        for plugin in crate::plugin::plugins() {
            if disabled.iter().any(|name| name == plugin.name()) {
                continue;
            }

            match plugin.handle(ctx, &self).await {
                Ok(EventHandled::Yes) => return,
                Ok(EventHandled::No) => continue,
                Err(err) => {
                    self.report(ctx, plugin.name(), err).await;
                    return;
                }
            }
        }
    }

    async fn report(&self, ctx: &Context<'_>, plugin: &str, err: anyhow::Error) {
        let Event::Message { msg, cmd } = self else {
            log_error!("Error in plugin {}: {:#}", plugin, err);
            return;
        };

        // Business-logic failures are the user's to read, not ours
        if let Some(failure) = err.downcast_ref::<CommandFailure>() {
            let prefix = cmd.as_ref().map(|cmd| cmd.prefix.as_str()).unwrap_or("");
            if let Err(e) = msg.reply(ctx.cache_http, failure.render(prefix)).await {
                log_error!("Could not reply to {}: {}", msg.author.id, e);
            }
            return;
        }

        log_error!(
            "Error in plugin {} handling message {} from {} ({}): {:#}",
            plugin,
            msg.id,
            msg.author.name,
            msg.author.id,
            err,
        );

        let Some(cmd) = cmd else {
            return;
        };
        if let Err(e) = msg.reply(ctx.cache_http, "a fatal error has occurred.").await {
            log_error!("Could not reply to {}: {}", msg.author.id, e);
        }
        crate::plugin::reporting::broadcast_error(ctx, msg, cmd, &err).await;
    }

    // Check if a message is one of the named bot commands, e.g. `k?wallet`.
    pub fn is_bot_cmd(&self, names: &[&str]) -> Option<(&Message, &Invocation)> {
        match self {
            Event::Message {
                msg,
                cmd: Some(cmd),
            } if names.contains(&cmd.name.as_str()) => Some((msg, cmd)),
            _ => None,
        }
    }
}

pub enum EventHandled {
    Yes,
    No,
}

/// A message addressed to the bot as a command
#[derive(Debug, PartialEq)]
pub struct Invocation {
    /// The prefix the user typed
    pub prefix: String,
    pub name: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Split `content` into a command if it starts with one of `prefixes`.  The longest matching
    /// prefix wins.
    pub fn parse(content: &str, prefixes: &[String]) -> Option<Self> {
        let prefix = prefixes
            .iter()
            .filter(|prefix| !prefix.is_empty() && content.starts_with(prefix.as_str()))
            .max_by_key(|prefix| prefix.len())?;

        let rest = &content[prefix.len()..];
        if rest.starts_with(char::is_whitespace) {
            return None;
        }

        let mut words = rest.split_whitespace();
        let name = words.next()?.to_owned();

        Some(Self {
            prefix: prefix.clone(),
            name,
            args: words.map(str::to_owned).collect(),
        })
    }

    /// Parse a message against the prefixes in effect where it was sent
    pub async fn resolve(ctx: &Context<'_>, msg: &Message) -> Option<Self> {
        let defaults = ctx.cfg.read().await.general.default_prefixes.clone();
        let me = ctx.cache.current_user().id;
        let mut prefixes = vec![format!("<@{}> ", me), format!("<@!{}> ", me)];

        match msg.guild_id {
            Some(guild_id) => match ctx.guilds.prefixes(guild_id, &defaults).await {
                Ok(guild_prefixes) => prefixes.extend(guild_prefixes),
                Err(e) => {
                    log_error!("Could not load prefixes for guild {}: {}", guild_id, e);
                    prefixes.extend(defaults);
                }
            },
            None => prefixes.extend(defaults),
        }

        Self::parse(&msg.content, &prefixes)
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Arguments from `index` onwards joined by single spaces, if there are any
    pub fn rest(&self, index: usize) -> Option<String> {
        match self.args.get(index..) {
            Some(rest) if !rest.is_empty() => Some(rest.join(" ")),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes() -> Vec<String> {
        vec![
            "<@10> ".to_owned(),
            "<@!10> ".to_owned(),
            "k".to_owned(),
            "k?".to_owned(),
        ]
    }

    #[test]
    fn parses_command_and_args() {
        let cmd = Invocation::parse("k?block 42 being rude", &prefixes()).unwrap();
        assert_eq!(cmd.prefix, "k?");
        assert_eq!(cmd.name, "block");
        assert_eq!(cmd.args, vec!["42", "being", "rude"]);
        assert_eq!(cmd.arg(0), Some("42"));
        assert_eq!(cmd.rest(1).as_deref(), Some("being rude"));
        assert_eq!(cmd.rest(3), None);
        assert_eq!(cmd.rest(10), None);
    }

    #[test]
    fn longest_prefix_wins() {
        let cmd = Invocation::parse("k?ping", &prefixes()).unwrap();
        assert_eq!(cmd.prefix, "k?");
        assert_eq!(cmd.name, "ping");

        let cmd = Invocation::parse("kping", &prefixes()).unwrap();
        assert_eq!(cmd.prefix, "k");
    }

    #[test]
    fn mention_prefix() {
        let cmd = Invocation::parse("<@!10> wallet", &prefixes()).unwrap();
        assert_eq!(cmd.prefix, "<@!10> ");
        assert_eq!(cmd.name, "wallet");
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn not_commands() {
        assert_eq!(Invocation::parse("hello k?ping", &prefixes()), None);
        assert_eq!(Invocation::parse("k? ping", &prefixes()), None);
        assert_eq!(Invocation::parse("k?", &prefixes()), None);
        assert_eq!(Invocation::parse("<@10>", &prefixes()), None);
        assert_eq!(Invocation::parse("anything", &["".to_owned()]), None);
    }
}
