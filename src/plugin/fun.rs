use crate::{event::*, helper::InvocationHelper, plugin::*};
use anyhow::Result;
use serenity::all::UserId;

/// Pairs which always score perfectly
const RIGGED: &[(u64, u64)] = &[(162819866682851329, 138428648901312512)];

pub struct Fun;

#[serenity::async_trait]
impl Plugin for Fun {
    fn name(&self) -> &'static str {
        "fun"
    }

    fn usage(&self, prefix: &str) -> Option<String> {
        Some(format!(
            "{}ship <user> <user> - ship two peeps to see their score",
            prefix
        ))
    }

    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> Result<EventHandled> {
        let Some((msg, cmd)) = event.is_bot_cmd(&["ship"]) else {
            return Ok(EventHandled::No);
        };

        let a = cmd.user_arg(ctx, 0).await?;
        let b = cmd.user_arg(ctx, 1).await?;
        let score = ship_score(a.id, b.id);

        msg.reply(
            ctx.cache_http,
            format!(
                "{} x {}: **{:.2}%**, {}",
                a.tag(),
                b.tag(),
                score * 100.0,
                verdict(score)
            ),
        )
        .await?;

        Ok(EventHandled::Yes)
    }
}

/// Between 0 and 1, from the fifth digit of each id
fn ship_score(a: UserId, b: UserId) -> f64 {
    if RIGGED.contains(&(a.get(), b.get())) {
        return 1.0;
    }
    f64::from(fifth_digit(a) + fifth_digit(b)) / 18.0
}

fn fifth_digit(id: UserId) -> u32 {
    id.to_string()
        .chars()
        .nth(4)
        .and_then(|c| c.to_digit(10))
        .unwrap_or(0)
}

fn verdict(score: f64) -> &'static str {
    match score {
        s if s <= 0.0 => ":put_litter_in_its_place: never meant to be.",
        s if s < 0.3 => ":nauseated_face: terrible.",
        s if s < 0.5 => ":thinking: maybe...",
        s if s < 0.7 => ":blue_heart: okay i guess :blue_heart:",
        s if s < 0.8 => ":heart: great match! :heart:",
        s if s < 0.9 => ":heart: mmm :sweat_drops:",
        _ => ":heart: a match made in heaven~ :sweat_drops::heart:",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_uses_fifth_digits() {
        // fifth digits: 9 and 0
        let a = UserId::new(123490000000000000);
        let b = UserId::new(123400000000000000);
        assert_eq!(ship_score(a, b), 0.5);
        assert_eq!(ship_score(b, b), 0.0);
        assert_eq!(ship_score(a, a), 1.0);
    }

    #[test]
    fn rigged_pairs_are_ordered() {
        let a = UserId::new(162819866682851329);
        let b = UserId::new(138428648901312512);
        assert_eq!(ship_score(a, b), 1.0);
        // fifth digits: 1 and 2
        assert_eq!(ship_score(b, a), 3.0 / 18.0);
    }

    #[test]
    fn short_ids_score_zero_digits() {
        assert_eq!(fifth_digit(UserId::new(42)), 0);
    }

    #[test]
    fn verdict_bands() {
        assert_eq!(verdict(0.0), ":put_litter_in_its_place: never meant to be.");
        assert_eq!(verdict(0.1), ":nauseated_face: terrible.");
        assert_eq!(verdict(0.3), ":thinking: maybe...");
        assert_eq!(verdict(0.5), ":blue_heart: okay i guess :blue_heart:");
        assert_eq!(verdict(0.75), ":heart: great match! :heart:");
        assert_eq!(verdict(0.85), ":heart: mmm :sweat_drops:");
        assert_eq!(
            verdict(1.0),
            ":heart: a match made in heaven~ :sweat_drops::heart:"
        );
    }
}
