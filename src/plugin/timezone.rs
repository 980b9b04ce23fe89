use crate::{
    error::{fail, StoreError},
    event::*,
    helper::{InvocationHelper, MessageHelper},
    plugin::*,
};
use anyhow::Result;
use chrono::{DateTime, FixedOffset, Timelike, Utc};
use chrono_tz::Tz;
use serde_json::json;
use serenity::all::{Message, User};

/// Longest timezone name we will store
const MAX_TIMEZONE_LEN: usize = 64;

/// Timezone lookups and sleep nagging
pub struct Timezone;

/// Records when each user last said anything, for `sleep`
pub struct LastSpoke;

/// A validated timezone
#[derive(Debug, PartialEq)]
pub enum Zone {
    Named(Tz),
    Offset(FixedOffset),
}

impl Zone {
    /// Accepts IANA names (`Europe/Berlin`) and `±HH:MM` offsets
    pub fn parse(name: &str) -> Result<Self> {
        if name.contains(['`', '@', '#']) || name.len() > MAX_TIMEZONE_LEN {
            return fail("that looks like an invalid timezone.");
        }

        if let Ok(tz) = name.parse::<Tz>() {
            return Ok(Zone::Named(tz));
        }
        match parse_offset(name) {
            Some(offset) => Ok(Zone::Offset(offset)),
            None => fail("invalid timezone."),
        }
    }

    pub fn at(&self, utc: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            Zone::Named(tz) => utc.with_timezone(tz).fixed_offset(),
            Zone::Offset(offset) => utc.with_timezone(offset),
        }
    }
}

fn parse_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':')?;
    let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
    if !two_digits(hours) || !two_digits(minutes) {
        return None;
    }

    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Full timestamp for `time`.  Without a preference both clocks are shown.
fn format_long(time: &DateTime<FixedOffset>, twelve_hour: Option<bool>) -> String {
    let format = match twelve_hour {
        None => "%b %a %Y-%m-%d %H:%M:%S (%I:%M:%S %P)",
        Some(true) => "%b %a %Y-%m-%d %I:%M:%S %P",
        Some(false) => "%b %a %Y-%m-%d %H:%M:%S",
    };
    time.format(format).to_string()
}

/// Just the clock, for `sleep`.  Without a preference US zones get a 12-hour clock.
fn format_short(time: &DateTime<FixedOffset>, raw: &str, twelve_hour: Option<bool>) -> String {
    if twelve_hour.unwrap_or_else(|| raw.contains("US")) {
        time.format("%I:%M %P").to_string()
    } else {
        time.format("%H:%M").to_string()
    }
}

/// 23:00 through 05:59
fn is_bedtime(time: &DateTime<FixedOffset>) -> bool {
    matches!(time.hour(), 23 | 0..=5)
}

#[serenity::async_trait]
impl Plugin for LastSpoke {
    fn name(&self) -> &'static str {
        "last_spoke"
    }

    fn usage(&self, _prefix: &str) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> Result<EventHandled> {
        if let Event::Message { msg, .. } = event {
            ctx.vstate.write().await.last_spoke.update(msg.author.id);
        }
        Ok(EventHandled::No)
    }
}

#[serenity::async_trait]
impl Plugin for Timezone {
    fn name(&self) -> &'static str {
        "timezone"
    }

    fn usage(&self, prefix: &str) -> Option<String> {
        Some(format!(
            "{p}time [user] - show the time for someone (alias: {p}t)\n\
             {p}time set <timezone> - set your timezone, e.g. Europe/Berlin or -07:00\n\
             {p}time format <12|24> - choose how times are shown to you\n\
             {p}time unset - forget your timezone\n\
             {p}time write <user> <timezone> - set someone's timezone (bot admins only)\n\
             {p}sleep [user] - tell someone to sleep, maybe",
            p = prefix
        ))
    }

    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> Result<EventHandled> {
        let Some((msg, cmd)) = event.is_bot_cmd(&["time", "t", "sleep"]) else {
            return Ok(EventHandled::No);
        };

        match (cmd.name.as_str(), cmd.arg(0)) {
            ("sleep", _) => sleep(ctx, msg, cmd).await?,
            (_, Some("set")) => set(ctx, msg, cmd).await?,
            (_, Some("unset")) => unset(ctx, msg).await?,
            (_, Some("write")) => write(ctx, msg, cmd).await?,
            (_, Some("format")) => format(ctx, msg, cmd).await?,
            _ => time(ctx, msg, cmd).await?,
        }

        Ok(EventHandled::Yes)
    }
}

/// The user's stored timezone name and its parsed form
fn zone_for(ctx: &Context<'_>, who: &User) -> Result<(String, Zone)> {
    let Some(raw) = ctx.pstate.timezones.get_as::<String>(&who.id.to_string()) else {
        return fail(format!("{} has no timezone set.", who.tag()));
    };
    let zone = Zone::parse(&raw)?;
    Ok((raw, zone))
}

fn twelve_hour(ctx: &Context<'_>, msg: &Message) -> Option<bool> {
    ctx.pstate
        .hour_format
        .get_as::<bool>(&msg.author.id.to_string())
}

async fn time(ctx: &Context<'_>, msg: &Message, cmd: &Invocation) -> Result<()> {
    let who = cmd.user_arg_or(ctx, 0, &msg.author).await?;
    let (raw, zone) = zone_for(ctx, &who)?;
    let now = zone.at(Utc::now());

    msg.reply(
        ctx.cache_http,
        format!("`{}`: {}", raw, format_long(&now, twelve_hour(ctx, msg))),
    )
    .await?;
    Ok(())
}

async fn set(ctx: &Context<'_>, msg: &Message, cmd: &Invocation) -> Result<()> {
    let Some(name) = cmd.rest(1) else {
        return fail(
            "input error: missing a timezone. send a name from \
             <https://en.wikipedia.org/wiki/List_of_tz_database_time_zones> or an offset like \
             `-07:00`.",
        );
    };
    Zone::parse(&name)?;

    ctx.pstate
        .timezones
        .put(msg.author.id.to_string(), json!(name))
        .await?;

    msg.reply(
        ctx.cache_http,
        format!("ok, your timezone was set to `{}`.", name),
    )
    .await?;
    Ok(())
}

async fn unset(ctx: &Context<'_>, msg: &Message) -> Result<()> {
    match ctx
        .pstate
        .timezones
        .delete(&msg.author.id.to_string())
        .await
    {
        Ok(()) => {}
        Err(StoreError::KeyNotFound(_)) => return fail("you don't have a timezone set."),
        Err(e) => return Err(e.into()),
    }

    msg.reply(ctx.cache_http, "ok, i forgot your timezone.")
        .await?;
    Ok(())
}

async fn write(ctx: &Context<'_>, msg: &Message, cmd: &Invocation) -> Result<()> {
    msg.require_admin(ctx).await?;
    let who = cmd.user_arg(ctx, 1).await?;
    let Some(name) = cmd.rest(2) else {
        return fail("input error: missing a timezone. see `{prefix}help`.");
    };
    Zone::parse(&name)?;

    ctx.pstate
        .timezones
        .put(who.id.to_string(), json!(name))
        .await?;

    msg.reply(
        ctx.cache_http,
        format!("\u{1f44c} set {}'s timezone to `{}`.", who.tag(), name),
    )
    .await?;
    Ok(())
}

async fn format(ctx: &Context<'_>, msg: &Message, cmd: &Invocation) -> Result<()> {
    let twelve_hour = match cmd.arg(1) {
        Some("12") => true,
        Some("24") => false,
        _ => return fail("input error: pick `12` or `24`."),
    };

    ctx.pstate
        .hour_format
        .put(msg.author.id.to_string(), json!(twelve_hour))
        .await?;

    msg.reply(
        ctx.cache_http,
        format!(
            "\u{1f44c} you'll see times on a {}-hour clock.",
            if twelve_hour { 12 } else { 24 }
        ),
    )
    .await?;
    Ok(())
}

async fn sleep(ctx: &Context<'_>, msg: &Message, cmd: &Invocation) -> Result<()> {
    let who = cmd.user_arg_or(ctx, 0, &msg.author).await?;
    let (subject, object) = if who.id == msg.author.id {
        ("you", "you")
    } else {
        ("they", "them")
    };

    let (raw, zone) = zone_for(ctx, &who)?;
    let now = zone.at(Utc::now());
    let clock = format_short(&now, &raw, twelve_hour(ctx, msg));

    let reply = if !is_bedtime(&now) {
        format!(
            "{} don't need to sleep (it's {} for {}).",
            subject, clock, object
        )
    } else if ctx.vstate.read().await.last_spoke.recently(who.id) {
        format!("hey <@{}>, it's {}. you should sleep.", who.id, clock)
    } else {
        format!("{} isn't around, they're probably sleeping.", who.tag())
    };

    msg.reply(ctx.cache_http, reply).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, hour, minute, 5).unwrap()
    }

    #[test]
    fn named_zones() {
        assert_eq!(
            Zone::parse("Europe/Berlin").unwrap(),
            Zone::Named(chrono_tz::Europe::Berlin)
        );
        assert_eq!(Zone::parse("UTC").unwrap(), Zone::Named(chrono_tz::UTC));
        assert!(Zone::parse("Mars/Olympus_Mons").is_err());
    }

    #[test]
    fn offsets() {
        assert_eq!(
            Zone::parse("-07:00").unwrap(),
            Zone::Offset(FixedOffset::west_opt(7 * 3600).unwrap())
        );
        assert_eq!(
            Zone::parse("+05:30").unwrap(),
            Zone::Offset(FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap())
        );
        assert!(Zone::parse("+5:30").is_err());
        assert!(Zone::parse("+24:00").is_err());
        assert!(Zone::parse("07:00").is_err());
        assert!(Zone::parse("+07:60").is_err());
        assert!(Zone::parse("++1:00").is_err());
        assert!(Zone::parse("+-1:00").is_err());
        assert!(Zone::parse("+01:+5").is_err());
    }

    #[test]
    fn suspicious_names() {
        for name in ["@everyone", "`code`", "#general"] {
            let err = Zone::parse(name).unwrap_err();
            assert_eq!(err.to_string(), "that looks like an invalid timezone.");
        }

        let long = "A".repeat(MAX_TIMEZONE_LEN + 1);
        assert_eq!(
            Zone::parse(&long).unwrap_err().to_string(),
            "that looks like an invalid timezone."
        );
        assert_eq!(
            Zone::parse("Nowhere/Special").unwrap_err().to_string(),
            "invalid timezone."
        );
    }

    #[test]
    fn conversion() {
        let berlin = Zone::parse("Europe/Berlin").unwrap().at(utc(12, 0));
        assert_eq!(berlin.hour(), 13);

        let offset = Zone::parse("-07:00").unwrap().at(utc(3, 0));
        assert_eq!(offset.hour(), 20);
    }

    #[test]
    fn formatting() {
        let time = Zone::parse("UTC").unwrap().at(utc(14, 3));
        assert_eq!(
            format_long(&time, None),
            "Jan Mon 2024-01-15 14:03:05 (02:03:05 pm)"
        );
        assert_eq!(format_long(&time, Some(true)), "Jan Mon 2024-01-15 02:03:05 pm");
        assert_eq!(format_long(&time, Some(false)), "Jan Mon 2024-01-15 14:03:05");

        assert_eq!(format_short(&time, "UTC", None), "14:03");
        assert_eq!(format_short(&time, "US/Pacific", None), "02:03 pm");
        assert_eq!(format_short(&time, "US/Pacific", Some(false)), "14:03");
        assert_eq!(format_short(&time, "UTC", Some(true)), "02:03 pm");
    }

    #[test]
    fn bedtime() {
        let zone = Zone::parse("UTC").unwrap();
        assert!(is_bedtime(&zone.at(utc(23, 0))));
        assert!(is_bedtime(&zone.at(utc(0, 30))));
        assert!(is_bedtime(&zone.at(utc(5, 59))));
        assert!(!is_bedtime(&zone.at(utc(6, 0))));
        assert!(!is_bedtime(&zone.at(utc(22, 59))));
    }
}
