// Bot presence. Set once on ready and refreshed after reconnects.

use poise::serenity_prelude as serenity;

const DEFAULT_ACTIVITY: &str = "Valorant customs | /help";

/// Shows the default "Playing ..." line.
pub fn reset_status(ctx: &serenity::Context) {
    let activity = serenity::ActivityData::playing(DEFAULT_ACTIVITY);
    ctx.set_presence(Some(activity), serenity::OnlineStatus::Online);
}

pub fn on_ready(ctx: &serenity::Context) {
    reset_status(ctx);
    tracing::info!("Presence set");
}
