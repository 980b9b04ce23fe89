use crate::{
    blocked::{Admission, BlockList},
    config::Config,
    context::Context,
    event::{Event, Invocation},
    guild_config::GuildSettings,
    log_error,
    persistent_state::PersistentState,
    volatile_state::VolatileState,
};
use serenity::all::{Guild, Message, Ready, UnavailableGuild};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};

/// Discord event handler
pub struct Handler {
    cfg: RwLock<Config>,
    pstate: PersistentState,
    vstate: RwLock<VolatileState>,
    blocklist: BlockList,
    guilds: GuildSettings,
    db: PgPool,
    shutdown: Arc<Notify>,
}

impl<'a> Handler {
    pub fn new(
        cfg: Config,
        pstate: PersistentState,
        vstate: VolatileState,
        blocklist: BlockList,
        guilds: GuildSettings,
        db: PgPool,
        shutdown: Arc<Notify>,
    ) -> Self {
        Self {
            cfg: RwLock::new(cfg),
            pstate,
            vstate: RwLock::new(vstate),
            blocklist,
            guilds,
            db,
            shutdown,
        }
    }

    fn ctx(&'a self, discord_ctx: &'a serenity::all::Context) -> Context<'a> {
        Context {
            cfg: &self.cfg,
            pstate: &self.pstate,
            vstate: &self.vstate,
            blocklist: &self.blocklist,
            guilds: &self.guilds,
            db: &self.db,
            shutdown: &self.shutdown,
            cache: &discord_ctx.cache,
            http: &discord_ctx.http,
            cache_http: discord_ctx,
        }
    }
}

#[serenity::async_trait]
impl serenity::all::EventHandler for Handler {
    async fn ready(&self, discord_ctx: serenity::all::Context, ready: Ready) {
        Event::Ready(ready).handle(&self.ctx(&discord_ctx)).await;
    }

    async fn message(&self, discord_ctx: serenity::all::Context, msg: Message) {
        let ctx = self.ctx(&discord_ctx);

        // Nothing else, not even prefix lookup, happens for authors we won't serve.
        match ctx.blocklist.admit(msg.author.id, msg.author.bot).await {
            Admission::Admitted => {}
            Admission::Bot | Admission::Blocked => return,
            Admission::Unvetted(e) => {
                log_error!(
                    "Dropping message {} from {} ({}): {}",
                    msg.id,
                    msg.author.name,
                    msg.author.id,
                    e
                );
                return;
            }
        }

        let cmd = Invocation::resolve(&ctx, &msg).await;
        Event::Message { msg, cmd }.handle(&ctx).await;
    }

    async fn guild_create(
        &self,
        discord_ctx: serenity::all::Context,
        guild: Guild,
        is_new: Option<bool>,
    ) {
        // Also fired for every guild we are already in when connecting
        if is_new != Some(true) {
            return;
        }
        Event::GuildJoin(guild)
            .handle(&self.ctx(&discord_ctx))
            .await;
    }

    async fn guild_delete(
        &self,
        discord_ctx: serenity::all::Context,
        incomplete: UnavailableGuild,
        full: Option<Guild>,
    ) {
        // An outage rather than us leaving
        if incomplete.unavailable {
            return;
        }
        Event::GuildLeave {
            id: incomplete.id,
            name: full.map(|guild| guild.name),
        }
        .handle(&self.ctx(&discord_ctx))
        .await;
    }
}
