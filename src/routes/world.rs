//! `/api/world/*` and reset routes — render snapshot, theme, dreaming flag,
//! round and game resets.

use crate::game::session::{with_session, with_session_mut};
use crate::routes::util::{error_reply, get_bool, get_param, ok_reply, parse_form_body};

/// Handle GET /api/world/state
/// The full render snapshot: players, visible objects, theme, win status.
pub fn handle_state_get(_query: &str) -> String {
    with_session(|g| {
        serde_json::to_string(&g.render_snapshot()).unwrap_or_else(|_| "{}".to_string())
    })
}

/// Handle POST /api/world/description
/// Body params: description={text} — host-side override of the theme.
pub fn handle_description_post(body: &str) -> String {
    let params = parse_form_body(body);
    let Some(description) = get_param(&params, "description").filter(|d| !d.is_empty()) else {
        return error_reply("missing description parameter");
    };
    with_session_mut(|g| g.set_world_description(description));
    ok_reply()
}

/// Handle POST /api/world/dreaming
/// Body params: on=true|false — mirrors the external video layer's state.
pub fn handle_dreaming_post(body: &str) -> String {
    let params = parse_form_body(body);
    let Some(on) = get_bool(&params, "on") else {
        return error_reply("missing or invalid on parameter");
    };
    with_session_mut(|g| g.set_is_dreaming(on));
    ok_reply()
}

/// Handle POST /api/round/reset
/// Restores the starter objects and re-arms the win machinery; chat and the
/// theme survive.
pub fn handle_round_reset_post(_body: &str) -> String {
    with_session_mut(|g| g.reset_round());
    ok_reply()
}

/// Handle POST /api/game/reset
/// Round reset plus a fresh chat log, theme, and dreaming flag.
pub fn handle_game_reset_post(_body: &str) -> String {
    with_session_mut(|g| g.reset_game());
    ok_reply()
}
