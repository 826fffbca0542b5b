//! Client orchestrator — connects networking, room state, and the TUI.
//!
//! This module owns the event loop and drives:
//! - [`banter_client::controller::ClientController`] — shared dispatch logic
//! - [`crate::tui::Tui`] — ratatui frontend
//!
//! This module is specific to the TUI binary.

use banter_client::controller::{ClientController, PollResult};
use banter_client::session::{FileSessionStore, SessionStore};

use crate::tui::{Tui, UserIntent};

/// Start the chat client, connecting via WebSocket to the given server.
///
/// If `fresh` is true, any cached session is discarded before connecting,
/// so no rejoin handshake happens.
pub async fn start_client(server_url: &str, fresh: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = FileSessionStore::new();
    if fresh {
        store.clear();
    }

    let mut ctrl = ClientController::new(store);
    ctrl.connect(server_url).await?;
    tracing::info!(url = %server_url, "connected to chat server");

    let mut tui = Tui::setup()?;
    let result = run_event_loop(&mut tui, &mut ctrl).await;
    tui.teardown()?;
    ctrl.close();
    result
}

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

async fn run_event_loop<S: SessionStore>(
    tui: &mut Tui,
    ctrl: &mut ClientController<S>,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        tui.render(&ctrl.state)?;

        let timeout = tokio::time::Duration::from_millis(50);

        tokio::select! {
            poll = ctrl.recv() => {
                match poll {
                    PollResult::Updated(changed) => {
                        if changed.any() {
                            tui.on_state_changed(&ctrl.state);
                        }
                    }
                    PollResult::Disconnected => {
                        // Render the disconnected status once, then leave.
                        tui.render(&ctrl.state)?;
                        tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
                        break;
                    }
                    PollResult::Empty => {}
                }
            }

            _ = tokio::time::sleep(timeout) => {
                match tui.poll_and_handle_input(&ctrl.state)? {
                    UserIntent::Quit => break,
                    UserIntent::CreateRoom { username } => ctrl.create_room(&username),
                    UserIntent::JoinRoom { username, room_id } => {
                        ctrl.join_room(&username, &room_id);
                    }
                    UserIntent::SendChat(text) => ctrl.send_chat(&text),
                    UserIntent::None => {}
                }
            }
        }
    }

    Ok(())
}
