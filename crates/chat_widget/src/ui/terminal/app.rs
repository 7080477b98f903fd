use anyhow::Result;
use chat_core::{ChatReducer, ConnectionManager, InboundFrames, SendOutcome};
use crossterm::event::{Event, EventStream, KeyEventKind};
use futures::StreamExt;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use super::input::{InputManager, KeyEventResult};
use super::renderer::TerminalRenderer;
use super::tui;
use crate::config::WidgetConfig;

const ANIMATION_TICK: Duration = Duration::from_millis(100);
const IDLE_TICK: Duration = Duration::from_secs(86400);

const UNDELIVERED_INFO: &str = "Message was not delivered: the connection is not open.";

/// Main event loop for handling terminal events, inbound frames and
/// connection state changes.
async fn event_loop(
    tui: &mut tui::Tui,
    connection: &ConnectionManager,
    inbound: InboundFrames,
    mut renderer: TerminalRenderer,
) -> Result<()> {
    let mut event_stream = EventStream::new();
    let mut state_rx = connection.subscribe();
    let mut reducer = ChatReducer::new();
    let mut input_manager = InputManager::new();
    let mut inbound_open = true;
    let mut state_watch_open = true;
    let mut needs_redraw = true;

    loop {
        let state = connection.state();

        if needs_redraw {
            tui.draw(|frame| renderer.paint(frame, &reducer, state, &input_manager))?;
            needs_redraw = false;
        }

        let animation_delay = if renderer.needs_animation_timer(&reducer, state) {
            ANIMATION_TICK
        } else {
            // Effectively infinite - no animation needed
            IDLE_TICK
        };

        tokio::select! {
            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key_event))) if key_event.kind == KeyEventKind::Press => {
                        let editable = state.is_open();
                        match input_manager.handle_key_event(key_event, editable) {
                            KeyEventResult::Quit => break,
                            KeyEventResult::Submit => {
                                let outcome =
                                    reducer.send_message(input_manager.draft_mut(), connection);
                                input_manager.sync_cursor();
                                match outcome {
                                    SendOutcome::Empty => {}
                                    SendOutcome::Sent => {
                                        renderer.clear_info();
                                        renderer.transcript_view.follow_latest();
                                    }
                                    SendOutcome::Undelivered => {
                                        renderer.set_info(UNDELIVERED_INFO);
                                        renderer.transcript_view.follow_latest();
                                    }
                                }
                            }
                            KeyEventResult::ToggleAnalysis => renderer.toggle_analysis(),
                            KeyEventResult::ScrollUp(rows) => renderer.transcript_view.scroll_up(rows),
                            KeyEventResult::ScrollDown(rows) => {
                                renderer.transcript_view.scroll_down(rows)
                            }
                            KeyEventResult::ScrollToLatest => {
                                renderer.transcript_view.follow_latest()
                            }
                            KeyEventResult::ScrollAnalysisUp(rows) => {
                                renderer.analysis_state.scroll_up(rows)
                            }
                            KeyEventResult::ScrollAnalysisDown(rows) => {
                                renderer.analysis_state.scroll_down(rows)
                            }
                            KeyEventResult::Escape => {
                                if renderer.has_info() {
                                    renderer.clear_info();
                                } else {
                                    debug!("escape pressed with nothing to dismiss");
                                }
                            }
                            KeyEventResult::Continue => {}
                        }
                        needs_redraw = true;
                    }
                    Some(Ok(Event::Paste(pasted))) => {
                        input_manager.handle_paste(&pasted, state.is_open());
                        needs_redraw = true;
                    }
                    Some(Ok(Event::Resize(_, _))) => {
                        needs_redraw = true;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        return Err(e.into());
                    }
                    None => {
                        // Event stream ended
                        break;
                    }
                }
            }

            frame = inbound.recv(), if inbound_open => {
                match frame {
                    Ok(raw) => {
                        // Rejected frames are logged by the reducer and otherwise ignored.
                        if let Ok(applied) = reducer.apply_frame(&raw) {
                            if applied.touches_transcript() {
                                renderer.transcript_view.follow_latest();
                            }
                            needs_redraw = true;
                        }
                    }
                    Err(_) => {
                        debug!("inbound frame channel closed");
                        inbound_open = false;
                    }
                }
            }

            changed = state_rx.changed(), if state_watch_open => {
                if changed.is_err() {
                    state_watch_open = false;
                } else {
                    let state = *state_rx.borrow_and_update();
                    info!(%state, "connection state changed");
                }
                needs_redraw = true;
            }

            _ = tokio::time::sleep(animation_delay) => {
                needs_redraw = true;
            }
        }
    }

    Ok(())
}

pub struct TerminalChatApp {
    config: WidgetConfig,
}

impl TerminalChatApp {
    pub fn new(config: WidgetConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<()> {
        let (connection, inbound) = ConnectionManager::open(self.config.endpoint.clone());
        let renderer = TerminalRenderer::new(self.config.analysis_open);

        let mut tui = match tui::init() {
            Ok(tui) => tui,
            Err(e) => {
                connection.shutdown().await;
                return Err(e.into());
            }
        };

        let loop_result = event_loop(&mut tui, &connection, inbound, renderer).await;

        // Restore terminal state before anything else can print.
        let cleanup_result = tui::restore();

        connection.shutdown().await;

        if let Err(cleanup_error) = cleanup_result {
            if loop_result.is_ok() {
                return Err(cleanup_error.into());
            }
            warn!("Terminal cleanup failed after loop error: {}", cleanup_error);
        }

        loop_result?;
        info!("chat widget exited");
        Ok(())
    }
}
