use crate::{context::Context, event::EventHandled};
use anyhow::Result;

mod admin;
mod cfg;
mod currency;
mod debug;
mod fun;
mod health;
mod help;
mod message_logging;
mod meta;
mod moderation;
mod ready;
pub mod reporting;
mod timezone;

#[serenity::async_trait]
pub trait Plugin: Sync + Send {
    /// Plugin name.  Used for debug and for disabling plugins in the configuration
    fn name(&self) -> &'static str;
    /// Help message lines, given the prefix the user is using.  None if no help message
    fn usage(&self, prefix: &str) -> Option<String>;
    /// Potentially handle event.  Returns:
    /// - Ok(EventHandled::Yes) if the event has been handled and no other plugin should attempt to
    /// handle it
    /// - Ok(EventHandled::No) if another plugin should attempt to handle the event
    /// - Err if an error occurred
    async fn handle(&self, ctx: &Context<'_>, event: &crate::event::Event) -> Result<EventHandled>;
}

/// Ordered list of available plugins
pub fn plugins() -> Vec<Box<dyn Plugin>> {
    vec![
        // Core bot operations
        Box::new(debug::Debug),
        Box::new(ready::Ready),
        // Passive
        Box::new(message_logging::MessageLogging),
        Box::new(timezone::LastSpoke),
        Box::new(reporting::Reporting),
        // Commands
        Box::new(help::Help),
        Box::new(admin::Admin),
        Box::new(currency::Currency),
        Box::new(timezone::Timezone),
        Box::new(cfg::Cfg),
        Box::new(moderation::Moderation),
        Box::new(fun::Fun),
        Box::new(health::Health),
        Box::new(meta::Meta),
    ]
}
