//! Miscellaneous convenience methods

use crate::{context::Context, error::CommandFailure, event::Invocation};
use anyhow::Result;
use serenity::all::{Message, Permissions, RoleId, User, UserId};

/// Accepts `<@123>`, `<@!123>` or a bare `123`
pub fn parse_user_id(arg: &str) -> Option<UserId> {
    let id = arg
        .strip_prefix("<@")
        .and_then(|s| s.strip_suffix('>'))
        .map(|s| s.strip_prefix('!').unwrap_or(s))
        .unwrap_or(arg);

    id.parse::<u64>().ok().filter(|id| *id != 0).map(UserId::new)
}

/// Accepts `<@&123>` or a bare `123`
pub fn parse_role_id(arg: &str) -> Option<RoleId> {
    let id = arg
        .strip_prefix("<@&")
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(arg);

    id.parse::<u64>().ok().filter(|id| *id != 0).map(RoleId::new)
}

/// A finite, non-negative amount of currency
pub fn parse_amount(arg: &str) -> Result<f64> {
    match arg.parse::<f64>() {
        Ok(amount) if amount.is_finite() && amount >= 0.0 => Ok(amount),
        _ => Err(CommandFailure::new(format!("input error: `{}` is not an amount.", arg)).into()),
    }
}

/// `name (id)`, for replies that must not ping anyone
pub fn describe(user: &User) -> String {
    format!("{} (`{}`)", user.tag(), user.id)
}

#[serenity::async_trait]
pub trait InvocationHelper {
    /// The user named by argument `index`
    async fn user_arg(&self, ctx: &Context<'_>, index: usize) -> Result<User>;
    /// The user named by argument `index`, or `fallback` if there is no such argument
    async fn user_arg_or(&self, ctx: &Context<'_>, index: usize, fallback: &User) -> Result<User>;
}

#[serenity::async_trait]
impl InvocationHelper for Invocation {
    async fn user_arg(&self, ctx: &Context<'_>, index: usize) -> Result<User> {
        let Some(arg) = self.arg(index) else {
            return Err(
                CommandFailure::new("input error: missing a user. see `{prefix}help`.").into(),
            );
        };

        let user_id = parse_user_id(arg).ok_or_else(|| {
            CommandFailure::new(format!("input error: user \"{}\" not found.", arg))
        })?;

        user_id.to_user(ctx.cache_http).await.map_err(|_| {
            CommandFailure::new(format!("input error: user \"{}\" not found.", arg)).into()
        })
    }

    async fn user_arg_or(&self, ctx: &Context<'_>, index: usize, fallback: &User) -> Result<User> {
        match self.arg(index) {
            Some(_) => self.user_arg(ctx, index).await,
            None => Ok(fallback.clone()),
        }
    }
}

#[serenity::async_trait]
pub trait MessageHelper {
    async fn is_from_admin(&self, ctx: &Context<'_>) -> bool;
    /// Fail with the usual message unless the author is a bot admin
    async fn require_admin(&self, ctx: &Context<'_>) -> Result<()>;
    /// The author's guild permissions, from the cache.  None outside guilds.
    fn author_guild_permissions(&self, ctx: &Context<'_>) -> Option<Permissions>;
    /// Fail unless sent in a guild by a member holding `required`
    fn require_permissions(&self, ctx: &Context<'_>, required: Permissions) -> Result<()>;
}

#[serenity::async_trait]
impl MessageHelper for Message {
    async fn is_from_admin(&self, ctx: &Context<'_>) -> bool {
        ctx.cfg.read().await.is_admin(self.author.id)
    }

    async fn require_admin(&self, ctx: &Context<'_>) -> Result<()> {
        if self.is_from_admin(ctx).await {
            Ok(())
        } else {
            Err(CommandFailure::new("you can't do that.").into())
        }
    }

    fn author_guild_permissions(&self, ctx: &Context<'_>) -> Option<Permissions> {
        let guild = self.guild(ctx.cache)?;
        let member = guild.members.get(&self.author.id)?;
        #[allow(deprecated)]
        let permissions = guild.member_permissions(member);
        Some(permissions)
    }

    fn require_permissions(&self, ctx: &Context<'_>, required: Permissions) -> Result<()> {
        if self.guild_id.is_none() {
            return Err(CommandFailure::new("you can't do that in a dm.").into());
        }

        match self.author_guild_permissions(ctx) {
            Some(permissions) if permissions.contains(required) => Ok(()),
            _ => Err(CommandFailure::new(format!(
                "uhh... you are missing {} permission(s) to run this command.",
                required
            ))
            .into()),
        }
    }
}
