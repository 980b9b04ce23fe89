//! Logging to the terminal with colors
//!
//! Every line starts with a marker: `*` for gateway events, `+` for things kmn does itself and `!`
//! for failures.  Failures go to stderr, everything else to stdout.

use serenity::all::{Message, User};
use std::fmt::Display;
use std::io::IsTerminal;
use std::sync::LazyLock;

#[derive(Clone, Copy)]
pub enum Color {
    Default,
    Event,
    Internal,
    Error,
    User,
    Channel,
    Guild,
    Glue,
}

impl Color {
    fn code(self) -> &'static str {
        match self {
            Color::Default => "\x1b[0m",
            Color::Event => "\x1b[33m",
            Color::Internal => "\x1b[35m",
            Color::Error => "\x1b[31m",
            Color::User => "\x1b[32m",
            Color::Channel => "\x1b[36m",
            Color::Guild => "\x1b[38;5;33m",
            Color::Glue => "\x1b[90m",
        }
    }

    /// `text` in this color, then back to the default
    pub fn paint(self, text: impl Display) -> String {
        format!("{}{}{}", self, text, Color::Default)
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        // Only print colors when printing to a terminal.  This won't change while we run.
        static STDOUT_IS_TERMINAL: LazyLock<bool> =
            LazyLock::new(|| std::io::stdout().is_terminal());

        if *STDOUT_IS_TERMINAL {
            f.write_str(self.code())
        } else {
            Ok(())
        }
    }
}

#[macro_export]
macro_rules! log_event {
    ($fmtstr:literal $($args:tt)*) => {
        println!(
            concat!("{}*{} ", $fmtstr),
            $crate::logging::Color::Event,
            $crate::logging::Color::Default
            $($args)*
        )
    };
}

#[macro_export]
macro_rules! log_internal {
    ($fmtstr:literal $($args:tt)*) => {
        println!(
            concat!("{}+{} ", $fmtstr),
            $crate::logging::Color::Internal,
            $crate::logging::Color::Default
            $($args)*
        )
    };
}

/// Infrastructure failures.  Goes to stderr.
#[macro_export]
macro_rules! log_error {
    ($fmtstr:literal $($args:tt)*) => {
        eprintln!(
            concat!("{}!{} ", $fmtstr),
            $crate::logging::Color::Error,
            $crate::logging::Color::Default
            $($args)*
        )
    };
}

pub fn user(user: &User) -> String {
    Color::User.paint(&user.name)
}

pub fn guild(name: Option<&str>) -> String {
    Color::Guild.paint(name.unwrap_or("<unknown-guild>"))
}

/// `server:channel:author`, resolved from the cache only
pub fn origin(cache: &serenity::all::Cache, msg: &Message) -> String {
    let (guild_name, channel_name) = match msg.guild(cache) {
        Some(guild) => (
            guild.name.clone(),
            guild
                .channels
                .get(&msg.channel_id)
                .map(|channel| channel.name.clone()),
        ),
        None if msg.guild_id.is_none() => ("<direct-message>".to_owned(), None),
        None => ("<unknown-guild>".to_owned(), None),
    };
    let glue = Color::Glue.paint(":");

    format!(
        "{}{glue}{}{glue}{}",
        Color::Guild.paint(guild_name),
        Color::Channel.paint(channel_name.as_deref().unwrap_or("<unknown-channel>")),
        user(&msg.author),
        glue = glue,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(text: &str) -> String {
        let mut plain = text.to_owned();
        for color in [
            Color::Default,
            Color::Event,
            Color::Internal,
            Color::Error,
            Color::User,
            Color::Channel,
            Color::Guild,
            Color::Glue,
        ] {
            plain = plain.replace(color.code(), "");
        }
        plain
    }

    #[test]
    fn painting_resets_afterwards() {
        let painted = Color::Guild.paint("kmn hq");
        assert_eq!(strip(&painted), "kmn hq");
        assert!(painted.ends_with(&Color::Default.to_string()));
    }

    #[test]
    fn unknown_guilds() {
        assert_eq!(strip(&guild(None)), "<unknown-guild>");
        assert_eq!(strip(&guild(Some("kmn hq"))), "kmn hq");
    }
}
