//! `/api/player/*` routes — avatar lifecycle, control handoff, and the
//! interaction trigger.

use crate::game::interact::InteractionOutcome;
use crate::game::session::with_session_mut;
use crate::routes::util::{error_reply, get_param, ok_reply, parse_form_body};

/// Handle POST /api/player/add
/// Body params: id={name}&color={css color}. Adding an existing id is a
/// silent no-op, mirroring the store.
pub fn handle_add_post(body: &str) -> String {
    let params = parse_form_body(body);
    let Some(id) = get_param(&params, "id").filter(|v| !v.is_empty()) else {
        return error_reply("missing id parameter");
    };
    let color = get_param(&params, "color").unwrap_or("white");
    with_session_mut(|g| g.add_player(id, color));
    ok_reply()
}

/// Handle POST /api/player/select
/// Body params: id={name} — hand keyboard control to this player.
pub fn handle_select_post(body: &str) -> String {
    let params = parse_form_body(body);
    let Some(id) = get_param(&params, "id").filter(|v| !v.is_empty()) else {
        return error_reply("missing id parameter");
    };
    let selected = with_session_mut(|g| g.select_player(id));
    if selected {
        ok_reply()
    } else {
        error_reply("unknown player")
    }
}

/// Handle POST /api/player/interact
/// Body params: id={name} (optional, defaults to the controlled player).
/// One discrete trigger: picks up the nearest free block or drops the
/// carried one.
pub fn handle_interact_post(body: &str) -> String {
    let params = parse_form_body(body);
    with_session_mut(|g| {
        let player_id = match get_param(&params, "id").filter(|v| !v.is_empty()) {
            Some(id) => id.to_string(),
            None => match g.state().current_player_id.clone() {
                Some(id) => id,
                None => return error_reply("no player selected"),
            },
        };
        match g.interact(&player_id) {
            InteractionOutcome::PickedUp { object_id } => serde_json::json!({
                "outcome": "picked_up",
                "object_id": object_id,
            })
            .to_string(),
            InteractionOutcome::Dropped {
                object_id,
                position,
                stacked,
            } => serde_json::json!({
                "outcome": "dropped",
                "object_id": object_id,
                "position": position,
                "stacked": stacked,
            })
            .to_string(),
            InteractionOutcome::NoCandidate => {
                serde_json::json!({ "outcome": "none" }).to_string()
            }
            InteractionOutcome::UnknownPlayer => error_reply("unknown player"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::session::{FrameInput, Game, replace_session, with_session, with_session_mut};

    fn reset() {
        replace_session(Game::new(0));
    }

    #[test]
    fn add_requires_id_and_is_idempotent() {
        reset();
        assert!(handle_add_post("color=red").contains("error"));
        handle_add_post("id=Millie&color=white");
        handle_add_post("id=Millie&color=red");
        let color = with_session(|g| g.state().players["Millie"].color.clone());
        assert_eq!(color, "white");
        reset();
    }

    #[test]
    fn select_validates_player() {
        reset();
        assert!(handle_select_post("id=nobody").contains("error"));
        handle_add_post("id=Millie");
        assert_eq!(handle_select_post("id=Millie"), ok_reply());
        let current = with_session(|g| g.state().current_player_id.clone());
        assert_eq!(current.as_deref(), Some("Millie"));
        reset();
    }

    #[test]
    fn interact_without_selection_errors() {
        reset();
        assert!(handle_interact_post("").contains("no player selected"));
        reset();
    }

    #[test]
    fn interact_picks_up_nearby_starter_block() {
        reset();
        handle_add_post("id=Millie");
        handle_select_post("id=Millie");
        // one frame gives bodies to the player and the starter blocks;
        // dynamic_1 at (-2, 0, 2) is within the capture radius of spawn
        with_session_mut(|g| {
            g.frame(1.0 / 60.0, &FrameInput::default());
        });

        let reply = handle_interact_post("");
        let parsed: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(parsed["outcome"], "picked_up");

        // a second trigger drops it again
        let reply = handle_interact_post("id=Millie");
        let parsed: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(parsed["outcome"], "dropped");
        assert!(parsed["position"].is_array());
        reset();
    }
}
