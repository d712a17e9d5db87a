// Operational log mirrored to the LOG channel, plus the framework error hook.

use crate::core::casino::CasinoError;
use crate::core::crash::CrashGameError;
use crate::core::custom_game::CustomGameError;
use crate::core::economy::EconomyError;
use crate::core::leveling::LevelingError;
use crate::core::tickets::TicketError;
use crate::core::valorant::ValorantError;
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

pub const AUDIT_PREFIX: &str = "📋 ";

#[derive(Debug, Clone, Copy, Default)]
pub struct AuditLog {
    channel_id: Option<u64>,
}

impl AuditLog {
    pub fn new(channel_id: Option<u64>) -> Self {
        Self { channel_id }
    }

    /// Post `text` to the log channel. Failures are only traced.
    pub async fn send(&self, http: &serenity::Http, text: impl AsRef<str>) {
        let text = text.as_ref();
        tracing::info!(target: "audit", "{text}");

        let Some(channel_id) = self.channel_id else {
            return;
        };
        if let Err(e) = serenity::ChannelId::new(channel_id)
            .say(http, audit_line(text))
            .await
        {
            tracing::warn!("Failed to post to the log channel: {e}");
        }
    }
}

fn audit_line(text: &str) -> String {
    // Discord rejects messages over 2000 characters.
    let mut line = format!("{AUDIT_PREFIX}{text}");
    if line.chars().count() > 2000 {
        line = line.chars().take(1997).collect::<String>() + "...";
    }
    line
}

/// Errors caused by what the user asked for (bad bet, wrong state, ...)
/// rather than by the bot. They are shown to the user and not audited.
pub fn is_user_error(error: &Error) -> bool {
    fn economy(e: &EconomyError) -> bool {
        !matches!(e, EconomyError::StoreError(_))
    }

    if let Some(e) = error.downcast_ref::<EconomyError>() {
        return economy(e);
    }
    if let Some(e) = error.downcast_ref::<CasinoError>() {
        return match e {
            CasinoError::Economy(inner) => economy(inner),
            _ => true,
        };
    }
    if let Some(e) = error.downcast_ref::<CrashGameError>() {
        return match e {
            CrashGameError::Economy(inner) => economy(inner),
            CrashGameError::Round(_) => true,
        };
    }
    if let Some(e) = error.downcast_ref::<ValorantError>() {
        return matches!(
            e,
            ValorantError::InvalidRiotId
                | ValorantError::AccountNotFound(_)
                | ValorantError::NotLinked
                | ValorantError::RankUnavailable(_)
        );
    }
    if let Some(e) = error.downcast_ref::<LevelingError>() {
        return matches!(e, LevelingError::InvalidAmount);
    }
    error.is::<CustomGameError>() || error.is::<TicketError>()
}

pub async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            tracing::error!("Failed to start bot: {error}");
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            let command = ctx.command().qualified_name.clone();
            if is_user_error(&error) {
                tracing::debug!(command, "Command refused: {error}");
                let _ = ctx
                    .send(
                        poise::CreateReply::default()
                            .content(format!("❌ {error}"))
                            .ephemeral(true),
                    )
                    .await;
                return;
            }

            tracing::error!(command, "Command failed: {error}");
            ctx.data()
                .audit
                .send(
                    ctx.http(),
                    format!("Error in /{command} used by <@{}>: {error}", ctx.author().id),
                )
                .await;
            let _ = ctx
                .send(
                    poise::CreateReply::default()
                        .content("Something went wrong while running that command.")
                        .ephemeral(true),
                )
                .await;
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                tracing::error!("Error while handling error: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_audit_lines_are_truncated() {
        let line = audit_line(&"x".repeat(3000));
        assert_eq!(line.chars().count(), 2000);
        assert!(line.starts_with(AUDIT_PREFIX));
        assert!(line.ends_with("..."));
    }

    #[test]
    fn user_mistakes_are_not_failures() {
        let bet: Error = Box::new(EconomyError::InsufficientFunds {
            required: 10,
            available: 5,
        });
        assert!(is_user_error(&bet));

        let wrapped: Error = Box::new(CasinoError::Economy(EconomyError::InvalidAmount));
        assert!(is_user_error(&wrapped));

        let link: Error = Box::new(ValorantError::NotLinked);
        assert!(is_user_error(&link));
    }

    #[test]
    fn storage_failures_are_real_errors() {
        let store: Error = Box::new(EconomyError::StoreError("connection reset".into()));
        assert!(!is_user_error(&store));

        let api: Error = Box::new(ValorantError::Api("502".into()));
        assert!(!is_user_error(&api));

        let other: Error = "boom".into();
        assert!(!is_user_error(&other));
    }
}
