use crate::{
    error::fail,
    event::*,
    helper::{parse_role_id, InvocationHelper, MessageHelper},
    plugin::*,
};
use anyhow::Result;
use serenity::all::{Colour, EditRole, GuildId, Message, Permissions, RoleId, User};

/// Role management for members with Manage Roles
pub struct Moderation;

#[serenity::async_trait]
impl Plugin for Moderation {
    fn name(&self) -> &'static str {
        "moderation"
    }

    fn usage(&self, prefix: &str) -> Option<String> {
        Some(format!(
            "{p}role give <user> <role...> - give someone roles\n\
             {p}role take <user> <role...> - take roles from someone\n\
             {p}role everyone - toggle whether the `here` and `everyone` roles are mentionable\n\
             {p}quickrole <name> [permissions] [colour] [user] - create a role, e.g. \
             `{p}quickrole helper manage_messages,kick_members #2ecc71`",
            p = prefix
        ))
    }

    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> Result<EventHandled> {
        let Some((msg, cmd)) = event.is_bot_cmd(&["role", "quickrole"]) else {
            return Ok(EventHandled::No);
        };

        msg.require_permissions(ctx, Permissions::MANAGE_ROLES)?;

        if cmd.name == "quickrole" {
            quickrole(ctx, msg, cmd).await?;
            return Ok(EventHandled::Yes);
        }

        match cmd.arg(0) {
            Some("give") => change_roles(ctx, msg, cmd, true).await?,
            Some("take") => change_roles(ctx, msg, cmd, false).await?,
            Some("everyone") => toggle_pseudo_mentions(ctx, msg, cmd).await?,
            _ => return fail("input error: unknown subcommand. see `{prefix}help`."),
        }

        Ok(EventHandled::Yes)
    }
}

fn role_args(cmd: &Invocation) -> Result<Vec<RoleId>> {
    let args = cmd.args.get(2..).unwrap_or_default();
    if args.is_empty() {
        return fail("input error: missing a role. see `{prefix}help`.");
    }

    args.iter()
        .map(|arg| match parse_role_id(arg) {
            Some(role_id) => Ok(role_id),
            None => fail(format!("input error: role \"{}\" not found.", arg)),
        })
        .collect()
}

/// Name of the first role the author may not hand out, if any
fn escalation(ctx: &Context<'_>, msg: &Message, roles: &[RoleId]) -> Result<Option<String>> {
    let Some(guild) = msg.guild(ctx.cache) else {
        return fail("you can't do that in a dm.");
    };
    let top = guild
        .members
        .get(&msg.author.id)
        .map(|member| {
            member
                .roles
                .iter()
                .filter_map(|id| guild.roles.get(id))
                .map(|role| role.position)
                .max()
                .unwrap_or(0)
        })
        .unwrap_or(0);

    let mut named = Vec::with_capacity(roles.len());
    for id in roles {
        let Some(role) = guild.roles.get(id) else {
            return fail(format!("input error: role \"{}\" not found.", id));
        };
        named.push((role.name.as_str(), role.position));
    }

    Ok(first_above(top, &named).map(str::to_owned))
}

fn first_above<'a>(top: u16, roles: &[(&'a str, u16)]) -> Option<&'a str> {
    roles
        .iter()
        .find(|(_, position)| *position > top)
        .map(|(name, _)| *name)
}

async fn change_roles(ctx: &Context<'_>, msg: &Message, cmd: &Invocation, give: bool) -> Result<()> {
    let Some(guild_id) = msg.guild_id else {
        return fail("you can't do that in a dm.");
    };
    let who = cmd.user_arg(ctx, 1).await?;
    let roles = role_args(cmd)?;

    if let Some(name) = escalation(ctx, msg, &roles)? {
        return fail(format!("{} is higher than your top role.", name));
    }

    let member = guild_id.member(ctx.cache_http, who.id).await?;
    if give {
        member.add_roles(ctx.cache_http, &roles).await?;
    } else {
        member.remove_roles(ctx.cache_http, &roles).await?;
    }

    msg.reply(ctx.cache_http, "\u{1f44c}").await?;
    Ok(())
}

/// Roles named `here` and `everyone`, which stand in for the real mentions, with whether each
/// is currently mentionable
fn pseudo_roles(ctx: &Context<'_>, msg: &Message) -> Result<Vec<(RoleId, String, bool)>> {
    let Some(guild) = msg.guild(ctx.cache) else {
        return fail("you can't do that in a dm.");
    };

    let found: Vec<_> = ["here", "everyone"]
        .iter()
        .filter_map(|name| guild.roles.values().find(|role| role.name == *name))
        .map(|role| (role.id, role.name.clone(), role.mentionable))
        .collect();
    if found.len() != 2 {
        return fail("`here` and or `everyone` roles were not found.");
    }
    Ok(found)
}

async fn toggle_pseudo_mentions(ctx: &Context<'_>, msg: &Message, cmd: &Invocation) -> Result<()> {
    let Some(guild_id) = msg.guild_id else {
        return fail("you can't do that in a dm.");
    };
    let roles = pseudo_roles(ctx, msg)?;

    let reason = format!("{}role everyone by {}", cmd.prefix, msg.author.tag());
    for (id, name, mentionable) in roles {
        let edit = EditRole::new()
            .mentionable(!mentionable)
            .audit_log_reason(&reason);
        if guild_id.edit_role(ctx.cache_http, id, edit).await.is_err() {
            return fail(format!("failed to edit {}, probably higher than me.", name));
        }
    }

    msg.reply(ctx.cache_http, "\u{1f44c}").await?;
    Ok(())
}

/// Comma separated permission names such as `manage_roles,kick_members`.  `server` may be
/// written for `guild`.
fn parse_permissions(arg: &str) -> Result<Permissions> {
    arg.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .try_fold(Permissions::empty(), |permissions, key| {
            let name = key.to_lowercase().replace("server", "guild").to_uppercase();
            match Permissions::from_name(&name) {
                Some(permission) => Ok(permissions | permission),
                None => fail(format!("invalid permission key: {}", key)),
            }
        })
}

/// `#rrggbb`, `0xrrggbb` or `rrggbb`
fn parse_colour(arg: &str) -> Result<Colour> {
    let hex = arg
        .strip_prefix('#')
        .or_else(|| arg.strip_prefix("0x"))
        .unwrap_or(arg);
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return fail(format!("input error: `{}` is not a colour.", arg));
    }
    Ok(Colour::new(u32::from_str_radix(hex, 16)?))
}

async fn quickrole(ctx: &Context<'_>, msg: &Message, cmd: &Invocation) -> Result<()> {
    let Some(guild_id) = msg.guild_id else {
        return fail("you can't do that in a dm.");
    };
    let Some(name) = cmd.arg(0) else {
        return fail("input error: missing a role name. see `{prefix}help`.");
    };
    let permissions = match cmd.arg(1) {
        Some(arg) => parse_permissions(arg)?,
        None => Permissions::empty(),
    };
    let colour = cmd.arg(2).map(parse_colour).transpose()?;
    let assign_to = match cmd.arg(3) {
        Some(_) => Some(cmd.user_arg(ctx, 3).await?),
        None => None,
    };

    let reason = format!("quickrole by {} ({})", msg.author.tag(), msg.author.id);
    let mut builder = EditRole::new()
        .name(name)
        .permissions(permissions)
        .audit_log_reason(&reason);
    if let Some(colour) = colour {
        builder = builder.colour(colour);
    }
    let role = guild_id.create_role(ctx.cache_http, builder).await?;

    let reply = match assign_to {
        Some(who) => match assign(ctx, guild_id, &who, role.id).await {
            Ok(()) => format!(
                "created role {} (`{}`) and gave it to {}!",
                name,
                role.id,
                who.tag()
            ),
            Err(_) => format!("created role, but failed to assign it to {}.", who.tag()),
        },
        None => format!("created role {} (`{}`)", name, role.id),
    };

    msg.reply(ctx.cache_http, reply).await?;
    Ok(())
}

async fn assign(ctx: &Context<'_>, guild_id: GuildId, who: &User, role: RoleId) -> Result<()> {
    let member = guild_id.member(ctx.cache_http, who.id).await?;
    member.add_role(ctx.cache_http, role).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalation_check() {
        let roles = [("member", 1), ("mod", 5), ("admin", 9)];
        assert_eq!(first_above(9, &roles), None);
        assert_eq!(first_above(5, &roles), Some("admin"));
        assert_eq!(first_above(3, &roles), Some("mod"));
        assert_eq!(first_above(0, &[]), None);
    }

    #[test]
    fn permission_lists() {
        assert_eq!(
            parse_permissions("manage_roles,kick_members").unwrap(),
            Permissions::MANAGE_ROLES | Permissions::KICK_MEMBERS
        );
        assert_eq!(
            parse_permissions("manage_server").unwrap(),
            Permissions::MANAGE_GUILD
        );
        assert_eq!(parse_permissions(" send_messages ,").unwrap(), Permissions::SEND_MESSAGES);
        assert!(parse_permissions("be_cool").is_err());
    }

    #[test]
    fn colours() {
        assert_eq!(parse_colour("#2ecc71").unwrap(), Colour::new(0x2ecc71));
        assert_eq!(parse_colour("0xFF0000").unwrap(), Colour::new(0xff0000));
        assert_eq!(parse_colour("000000").unwrap(), Colour::new(0));
        assert!(parse_colour("#fff").is_err());
        assert!(parse_colour("+fffff").is_err());
        assert!(parse_colour("red").is_err());
    }
}
