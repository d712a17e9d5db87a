// Routes persistent component interactions (buttons and modals that outlive
// a single command) by their custom id. Buttons owned by a running command
// collector are left alone.

use super::entry::{handle_entry_submit, open_entry_modal, ENTRY_MODAL, ENTRY_OPEN_BUTTON};
use crate::discord::boards::{handle_daily_button, DAILY_COINS_BUTTON, DAILY_XP_BUTTON};
use crate::discord::commands::autobalance::{handle_move_button, AUTOBALANCE_PREFIX};
use crate::discord::commands::betting::{handle_bet_button, handle_bet_submit, BET_PREFIX};
use crate::discord::commands::crash::{handle_cashout, CASHOUT_PREFIX};
use crate::discord::commands::custom_game::{handle_lobby_button, LOBBY_BUTTON_PREFIX};
use crate::discord::commands::party::{handle_party_button, PARTY_PREFIX};
use crate::discord::commands::shop::{handle_custom_role_submit, handle_shop_component, SHOP_PREFIX};
use crate::discord::commands::tickets::{handle_ticket_button, TICKET_BUTTON_PREFIX};
use crate::discord::Data;
use anyhow::Result;
use poise::serenity_prelude::{self as serenity, Context};

#[derive(Debug, PartialEq)]
enum Route {
    Daily,
    CrashCashout,
    Lobby,
    Ticket,
    EntryForm,
    Bet,
    Autobalance,
    Party,
    Shop,
    Unrouted,
}

fn route(custom_id: &str) -> Route {
    if custom_id == DAILY_COINS_BUTTON || custom_id == DAILY_XP_BUTTON {
        Route::Daily
    } else if custom_id.starts_with(CASHOUT_PREFIX) {
        Route::CrashCashout
    } else if custom_id.starts_with(LOBBY_BUTTON_PREFIX) {
        Route::Lobby
    } else if custom_id.starts_with(TICKET_BUTTON_PREFIX) {
        Route::Ticket
    } else if custom_id == ENTRY_OPEN_BUTTON {
        Route::EntryForm
    } else if custom_id.starts_with(BET_PREFIX) {
        Route::Bet
    } else if custom_id.starts_with(AUTOBALANCE_PREFIX) {
        Route::Autobalance
    } else if custom_id.starts_with(PARTY_PREFIX) {
        Route::Party
    } else if custom_id.starts_with(SHOP_PREFIX) {
        Route::Shop
    } else {
        Route::Unrouted
    }
}

pub async fn handle_interaction(
    ctx: &Context,
    data: &Data,
    interaction: &serenity::Interaction,
) -> Result<()> {
    match interaction {
        serenity::Interaction::Component(component) => {
            match route(&component.data.custom_id) {
                Route::Daily => handle_daily_button(ctx, component, data).await,
                Route::CrashCashout => handle_cashout(ctx, component, data).await,
                Route::Lobby => handle_lobby_button(ctx, component, data).await,
                Route::Ticket => handle_ticket_button(ctx, component, data).await,
                Route::EntryForm => open_entry_modal(ctx, component).await,
                Route::Bet => handle_bet_button(ctx, component, data).await,
                Route::Autobalance => handle_move_button(ctx, component, data).await,
                Route::Party => handle_party_button(ctx, component, data).await,
                Route::Shop => handle_shop_component(ctx, component, data).await,
                Route::Unrouted => Ok(()),
            }
        }
        serenity::Interaction::Modal(modal) => match modal.data.custom_id.as_str() {
            ENTRY_MODAL => handle_entry_submit(ctx, modal, data).await,
            id => match route(id) {
                Route::Bet => handle_bet_submit(ctx, modal, data).await,
                Route::Shop => handle_custom_role_submit(ctx, modal, data).await,
                _ => Ok(()),
            },
        },
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistent_buttons_are_routed() {
        assert_eq!(route("daily:coins"), Route::Daily);
        assert_eq!(route("daily:xp"), Route::Daily);
        assert_eq!(route("crash:cashout:123"), Route::CrashCashout);
        assert_eq!(route("cg:join"), Route::Lobby);
        assert_eq!(route("ticket:close"), Route::Ticket);
        assert_eq!(route("entry:open"), Route::EntryForm);
        assert_eq!(route("bet:first"), Route::Bet);
        assert_eq!(route("bet:amount:second:42"), Route::Bet);
        assert_eq!(route("ab:move:b"), Route::Autobalance);
        assert_eq!(route("party:join"), Route::Party);
        assert_eq!(route("shop:color"), Route::Shop);
        assert_eq!(route("shop:custom_form"), Route::Shop);
    }

    #[test]
    fn collector_buttons_are_left_alone() {
        assert_eq!(route("bj_hit"), Route::Unrouted);
        assert_eq!(route("next"), Route::Unrouted);
        assert_eq!(route("duel_accept"), Route::Unrouted);
    }
}
