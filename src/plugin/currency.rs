use crate::{
    error::{fail, CommandFailure},
    event::*,
    helper::{parse_amount, InvocationHelper, MessageHelper},
    plugin::*,
    storage::JsonStore,
};
use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serenity::all::{CreateMessage, Message, UserId};

/// Largest amount one may attempt to steal at once
const MAX_STEAL: f64 = 80.0;
/// Largest share of the target's wallet one may attempt to steal
const MAX_STEAL_SHARE: f64 = 0.5;
/// Upper bound on the bonus added to the roll range
const MAX_STEAL_BONUS: f64 = 10.0;

/// Bottlecaps (`bc`), stored per user
pub struct Currency;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Account {
    pub wallet: f64,
    #[serde(default)]
    pub grace_period: u64,
    #[serde(default)]
    pub last_stole: u64,
}

impl Account {
    fn new() -> Self {
        Self {
            wallet: 0.0,
            grace_period: 0,
            last_stole: 0,
        }
    }
}

/// Accounts in the currency store, keyed by user id
///
/// Every balance change runs inside one store transaction, from the first read to the write.
pub struct Bank<'a> {
    store: &'a JsonStore,
}

/// What happened during a theft, for the reply
#[derive(Debug, PartialEq)]
pub struct Heist {
    outcome: StealOutcome,
    potential: f64,
    rolled: f64,
    /// The thief's wallet before the theft
    thief_wallet: f64,
}

fn require_account(account: Option<Account>) -> Result<Account> {
    account.ok_or_else(|| {
        CommandFailure::new("you have no account, create one with `{prefix}register`.").into()
    })
}

impl<'a> Bank<'a> {
    pub fn new(store: &'a JsonStore) -> Self {
        Self { store }
    }

    pub fn account(&self, user_id: UserId) -> Option<Account> {
        self.store.get_as(&user_id.to_string())
    }

    pub fn wallet(&self, user_id: UserId) -> Result<f64> {
        Ok(require_account(self.account(user_id))?.wallet)
    }

    pub async fn create_account(&self, user_id: UserId) -> Result<()> {
        let mut tx = self.store.transaction().await;
        if tx.contains(&user_id.to_string()) {
            return fail("you already have an account lol");
        }
        tx.put_as(user_id.to_string(), &Account::new())?;
        tx.commit().await?;
        Ok(())
    }

    /// Overwrite the wallet of an existing account
    pub async fn write(&self, user_id: UserId, amount: f64) -> Result<()> {
        let mut tx = self.store.transaction().await;
        let mut account = require_account(tx.get_as(&user_id.to_string()))?;
        account.wallet = amount;
        tx.put_as(user_id.to_string(), &account)?;
        tx.commit().await?;
        Ok(())
    }

    /// Move `amount` from one wallet to another.  `to_name` is used in failures.
    pub async fn transfer(&self, from: UserId, to: UserId, amount: f64, to_name: &str) -> Result<()> {
        let mut tx = self.store.transaction().await;

        let mut sender = require_account(tx.get_as(&from.to_string()))?;
        if sender.wallet < amount {
            return fail("you don't have enough...");
        }
        let Some(mut receiver) = tx.get_as::<Account>(&to.to_string()) else {
            return fail(format!(
                "{} doesn't have an account. make them create one with `{{prefix}}register`.",
                to_name
            ));
        };

        sender.wallet -= amount;
        receiver.wallet += amount;
        tx.put_as(from.to_string(), &sender)?;
        tx.put_as(to.to_string(), &receiver)?;
        tx.commit().await?;
        Ok(())
    }

    /// Attempt a theft.  `roll` picks a number up to the potential it is given.
    pub async fn steal(
        &self,
        thief: UserId,
        target: UserId,
        amount: f64,
        target_name: &str,
        roll: impl FnOnce(f64) -> f64 + Send,
    ) -> Result<Heist> {
        let mut tx = self.store.transaction().await;

        let mut thief_account = require_account(tx.get_as(&thief.to_string()))?;
        let mut target_account = require_account(tx.get_as(&target.to_string()))?;
        check_steal(amount, target_account.wallet, target_name)?;

        let potential = steal_potential(amount);
        let rolled = roll(potential);
        let thief_wallet = thief_account.wallet;
        let outcome = steal_outcome(amount, rolled, thief_wallet);

        match outcome {
            StealOutcome::Stolen => {
                target_account.wallet -= amount;
                thief_account.wallet += amount;
                tx.put_as(target.to_string(), &target_account)?;
                tx.put_as(thief.to_string(), &thief_account)?;
            }
            StealOutcome::CaughtBroke => {}
            StealOutcome::Caught { penalty } => {
                thief_account.wallet -= penalty;
                tx.put_as(thief.to_string(), &thief_account)?;
            }
        }
        tx.commit().await?;

        Ok(Heist {
            outcome,
            potential,
            rolled,
            thief_wallet,
        })
    }
}

/// Refuses thefts which are too large, in general or for this target
fn check_steal(amount: f64, target_wallet: f64, target: &str) -> Result<()> {
    if amount > MAX_STEAL {
        return fail(format!(
            "you're stealing too much. `{:.1}bc` max pls.",
            MAX_STEAL
        ));
    }
    if amount > target_wallet {
        return fail("that person doesn't have the money you want. look for someone else.");
    }
    if amount > target_wallet * MAX_STEAL_SHARE {
        return fail(format!(
            "you can't steal more than 50% of someone's wallet. the max you can steal from {} is `{:.2}bc`.",
            target,
            target_wallet * MAX_STEAL_SHARE
        ));
    }
    Ok(())
}

/// Upper end of the roll range for stealing `amount`
fn steal_potential(amount: f64) -> f64 {
    amount + (amount * 1.5).floor().min(MAX_STEAL_BONUS)
}

#[derive(Debug, PartialEq)]
enum StealOutcome {
    /// The amount moves from target to thief
    Stolen,
    /// The thief had nothing to lose
    CaughtBroke,
    /// The thief loses `penalty`
    Caught { penalty: f64 },
}

fn steal_outcome(amount: f64, roll: f64, thief_wallet: f64) -> StealOutcome {
    if amount < roll {
        StealOutcome::Stolen
    } else if thief_wallet <= 0.0 {
        StealOutcome::CaughtBroke
    } else {
        StealOutcome::Caught {
            penalty: (amount * 1.5).min(thief_wallet),
        }
    }
}

fn roll(potential: f64) -> f64 {
    rand::thread_rng().gen_range(0.0..=potential)
}

#[serenity::async_trait]
impl Plugin for Currency {
    fn name(&self) -> &'static str {
        "currency"
    }

    fn usage(&self, prefix: &str) -> Option<String> {
        Some(format!(
            "{p}register - make an account\n\
             {p}wallet [user] - view a balance\n\
             {p}send <user> <amount> - send someone bottlecaps (alias: {p}transfer)\n\
             {p}steal <user> <amount> - steal some monies\n\
             {p}write <user> <amount> - write someone's wallet (bot admins only)",
            p = prefix
        ))
    }

    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> Result<EventHandled> {
        let Some((msg, cmd)) =
            event.is_bot_cmd(&["register", "wallet", "write", "send", "transfer", "steal"])
        else {
            return Ok(EventHandled::No);
        };

        let bank = Bank::new(&ctx.pstate.currency);
        match cmd.name.as_str() {
            "register" => register(ctx, msg, &bank).await?,
            "wallet" => wallet(ctx, msg, cmd, &bank).await?,
            "write" => write(ctx, msg, cmd, &bank).await?,
            "steal" => steal(ctx, msg, cmd, &bank).await?,
            _ => send(ctx, msg, cmd, &bank).await?,
        }

        Ok(EventHandled::Yes)
    }
}

fn amount_arg(cmd: &Invocation, index: usize) -> Result<f64> {
    match cmd.arg(index) {
        Some(arg) => parse_amount(arg),
        None => fail("input error: missing an amount. see `{prefix}help`."),
    }
}

async fn register(ctx: &Context<'_>, msg: &Message, bank: &Bank<'_>) -> Result<()> {
    bank.create_account(msg.author.id).await?;
    msg.reply(ctx.cache_http, "\u{1f44c}").await?;
    Ok(())
}

async fn wallet(ctx: &Context<'_>, msg: &Message, cmd: &Invocation, bank: &Bank<'_>) -> Result<()> {
    let who = cmd.user_arg_or(ctx, 0, &msg.author).await?;
    let balance = bank.wallet(who.id)?;

    msg.reply(
        ctx.cache_http,
        format!("{} \u{2192} `{:.2}bc`", who.tag(), balance),
    )
    .await?;
    Ok(())
}

async fn write(ctx: &Context<'_>, msg: &Message, cmd: &Invocation, bank: &Bank<'_>) -> Result<()> {
    msg.require_admin(ctx).await?;
    let who = cmd.user_arg(ctx, 0).await?;
    let amount = amount_arg(cmd, 1)?;

    bank.write(who.id, amount).await?;

    msg.reply(
        ctx.cache_http,
        format!("\u{1f44c} {} \u{2192} `{:.2}bc`", who.tag(), amount),
    )
    .await?;
    Ok(())
}

async fn send(ctx: &Context<'_>, msg: &Message, cmd: &Invocation, bank: &Bank<'_>) -> Result<()> {
    let target = cmd.user_arg(ctx, 0).await?;
    let amount = amount_arg(cmd, 1)?;

    if target.id == msg.author.id {
        return fail("what");
    }
    if amount <= 0.0 {
        return fail("you have to send something.");
    }

    bank.transfer(msg.author.id, target.id, amount, &target.tag())
        .await?;

    msg.reply(
        ctx.cache_http,
        format!(
            "\u{1f4b8} {} `--[ {:.2}bc ]-->` {}",
            msg.author.tag(),
            amount,
            target.tag()
        ),
    )
    .await?;

    // The target may not accept DMs from us; the transfer stands regardless
    let _ = target
        .direct_message(
            ctx.cache_http,
            CreateMessage::new().content(format!(
                "\u{1f4b8} you got money! you have received `{:.2}bc` from <@{}>.",
                amount, msg.author.id
            )),
        )
        .await;

    Ok(())
}

async fn steal(ctx: &Context<'_>, msg: &Message, cmd: &Invocation, bank: &Bank<'_>) -> Result<()> {
    let target = cmd.user_arg(ctx, 0).await?;
    let amount = amount_arg(cmd, 1)?;

    if target.id == msg.author.id {
        return fail("what");
    }

    let heist = bank
        .steal(msg.author.id, target.id, amount, &target.tag(), roll)
        .await?;

    let reply = match heist.outcome {
        StealOutcome::Stolen => format!(
            "\u{1f52b} ouch. {} \u{2192} `{:.2}bc`\n\n[amount:`{}` < rolled:`{:.2}`] chance = `{:.2}`",
            msg.author.tag(),
            amount,
            amount,
            heist.rolled,
            heist.potential
        ),
        StealOutcome::CaughtBroke => "\u{1f694} oops, you failed.".to_owned(),
        StealOutcome::Caught { penalty } => format!(
            "\u{1f694} oops, you failed. you have lost `{:.2}bc` ({:.2}% of your total wallet).",
            penalty,
            penalty / heist.thief_wallet * 100.0
        ),
    };

    msg.reply(ctx.cache_http, reply).await?;
    Ok(())
}
