//! DreamStack in-browser WASM game core.
//!
//! The render layer drives this module two ways. `frame(dt, input)` advances
//! the simulation once per animation tick — movement, physics step, position
//! sync, win evaluation — and returns the render snapshot as JSON.
//! `handle_request(method, path, query, body)` is the command bridge for
//! everything else: chat, interaction triggers, generation results, resets.
//! Uses `matchit` for URL routing — the same router engine that powers Axum.
//!
//! External AI calls never happen here. Chat posts return pending generation
//! requests; the host performs them and posts results back through the
//! `/api/generation/*` routes, token-guarded against resets.

use wasm_bindgen::prelude::*;

pub mod game;
pub mod routes;

use game::session::{self, FrameInput, Game};

/// Install logging/panic hooks and start a fresh session.
///
/// `seed` feeds the session rng (drop jitter, spawn scatter, autopilot), so a
/// host can make a run reproducible.
#[wasm_bindgen]
pub fn boot(seed: u64) {
    console_error_panic_hook::set_once();
    #[cfg(target_arch = "wasm32")]
    let _ = tracing_wasm::try_set_as_global_default();
    session::replace_session(Game::new(seed));
}

/// Advance one simulation frame and return the render snapshot JSON.
///
/// `input` is a JSON object like `{"player": "Millie", "dir": [1.0, 0.0]}`
/// carrying the controlled player's movement direction; an empty object (or
/// unparseable string) means no input this frame.
#[wasm_bindgen]
pub fn frame(dt: f64, input: &str) -> String {
    let parsed: FrameInput = serde_json::from_str(input).unwrap_or_default();
    let snapshot = session::with_session_mut(|g| g.frame(dt, &parsed));
    serde_json::to_string(&snapshot).unwrap_or_else(|_| "{}".to_string())
}

/// Process an HTTP-like request and return a JSON string.
///
/// Called from JavaScript via wasm-bindgen.
///
/// # Arguments
/// * `method` — HTTP method (e.g., "GET", "POST")
/// * `path`   — URL path (e.g., "/api/chat/send")
/// * `query`  — Query string (e.g., "?id=Millie")
/// * `body`   — URL-encoded request body. Empty string for GET requests.
#[wasm_bindgen]
pub fn handle_request(method: &str, path: &str, query: &str, body: &str) -> String {
    // Build the router. matchit compiles route patterns into a radix tree.
    let mut router = matchit::Router::new();

    // Register routes — the value is a &str tag we match on below
    router.insert("/api/world/state", "world_state").ok();
    router.insert("/api/world/description", "world_description").ok();
    router.insert("/api/world/dreaming", "world_dreaming").ok();

    router.insert("/api/player/add", "player_add").ok();
    router.insert("/api/player/select", "player_select").ok();
    router.insert("/api/player/interact", "player_interact").ok();

    router.insert("/api/chat/messages", "chat_messages").ok();
    router.insert("/api/chat/send", "chat_send").ok();

    router.insert("/api/generation/pending", "generation_pending").ok();
    router.insert("/api/generation/world", "generation_world").ok();
    router.insert("/api/generation/object", "generation_object").ok();

    router.insert("/api/round/reset", "round_reset").ok();
    router.insert("/api/game/reset", "game_reset").ok();

    match router.at(path) {
        Ok(matched) => match (*matched.value, method) {
            ("world_state", "GET") => routes::world::handle_state_get(query),
            ("world_description", "POST") => routes::world::handle_description_post(body),
            ("world_dreaming", "POST") => routes::world::handle_dreaming_post(body),

            ("player_add", "POST") => routes::player::handle_add_post(body),
            ("player_select", "POST") => routes::player::handle_select_post(body),
            ("player_interact", "POST") => routes::player::handle_interact_post(body),

            ("chat_messages", "GET") => routes::chat::handle_messages_get(query),
            ("chat_send", "POST") => routes::chat::handle_send_post(body),

            ("generation_pending", "GET") => routes::chat::handle_pending_get(query),
            ("generation_world", "POST") => routes::chat::handle_generation_world_post(body),
            ("generation_object", "POST") => routes::chat::handle_generation_object_post(body),

            ("round_reset", "POST") => routes::world::handle_round_reset_post(body),
            ("game_reset", "POST") => routes::world::handle_game_reset_post(body),

            _ => method_not_allowed(),
        },
        Err(_) => not_found(),
    }
}

fn not_found() -> String {
    r#"{"error":"route not found"}"#.to_string()
}

fn method_not_allowed() -> String {
    r#"{"error":"method not allowed"}"#.to_string()
}
