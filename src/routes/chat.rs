//! `/api/chat/*` and `/api/generation/*` routes.
//!
//! Chat posts run the command scan synchronously and hand any resulting
//! generation requests straight back to the caller, so the host can fire its
//! AI calls without an extra poll. Results come back through the generation
//! routes with the token they were issued under; stale tokens are rejected.

use crate::game::session::{with_session, with_session_mut};
use crate::routes::util::{error_reply, get_param, get_u64, ok_reply, parse_form_body};

/// Handle GET /api/chat/messages
/// The append-only chat log as a JSON array.
pub fn handle_messages_get(_query: &str) -> String {
    with_session(|g| {
        serde_json::to_string(&g.state().messages).unwrap_or_else(|_| "[]".to_string())
    })
}

/// Handle POST /api/chat/send
/// Body params: player={id}&text={message}.
/// Returns the new message id plus any generation requests the host must
/// perform.
pub fn handle_send_post(body: &str) -> String {
    let params = parse_form_body(body);
    let Some(player) = get_param(&params, "player").filter(|v| !v.is_empty()) else {
        return error_reply("missing player parameter");
    };
    let Some(text) = get_param(&params, "text").filter(|v| !v.is_empty()) else {
        return error_reply("missing text parameter");
    };

    let (message_id, requests) = with_session_mut(|g| g.add_message(player, text));
    serde_json::json!({
        "message_id": message_id,
        "requests": requests,
    })
    .to_string()
}

/// Handle GET /api/generation/pending
/// Requests emitted but not yet answered (e.g. after a page the host missed).
pub fn handle_pending_get(_query: &str) -> String {
    with_session(|g| {
        serde_json::json!({ "requests": g.pending_generations() }).to_string()
    })
}

/// Handle POST /api/generation/world
/// Body params: token={n}&message_id={id}&description={text}.
/// Applies a world-description result; stale tokens are discarded.
pub fn handle_generation_world_post(body: &str) -> String {
    let params = parse_form_body(body);
    let Some(token) = get_u64(&params, "token") else {
        return error_reply("missing or invalid token parameter");
    };
    let Some(message_id) = get_param(&params, "message_id") else {
        return error_reply("missing message_id parameter");
    };
    let Some(description) = get_param(&params, "description") else {
        return error_reply("missing description parameter");
    };

    match with_session_mut(|g| g.apply_world_generation(token, message_id, description)) {
        Ok(()) => ok_reply(),
        Err(e) => error_reply(&e),
    }
}

/// Handle POST /api/generation/object
/// Body params: token={n}&message_id={id}&payload={descriptor json}.
/// Parses the `{label, color, shape}` descriptor and spawns the object.
pub fn handle_generation_object_post(body: &str) -> String {
    let params = parse_form_body(body);
    let Some(token) = get_u64(&params, "token") else {
        return error_reply("missing or invalid token parameter");
    };
    let Some(message_id) = get_param(&params, "message_id") else {
        return error_reply("missing message_id parameter");
    };
    let Some(payload) = get_param(&params, "payload").filter(|v| !v.is_empty()) else {
        return error_reply("missing payload parameter");
    };

    match with_session_mut(|g| g.apply_object_generation(token, message_id, payload)) {
        Ok(object_id) => serde_json::json!({ "ok": true, "object_id": object_id }).to_string(),
        Err(e) => error_reply(&e),
    }
}
