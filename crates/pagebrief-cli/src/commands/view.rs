use std::io;
use std::sync::Arc;

use anyhow::Result;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, MouseButton, MouseEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, SetTitle},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    Frame, Terminal,
};
use tokio::time::Instant;

use pagebrief_core::presentation::DismissReason;
use pagebrief_core::{AppConfig, SessionController, SessionDeps, TriggerSource};
use pagebrief_tui::{
    app::{App, Focus, Mode},
    event::{AppEvent, EventHandler},
    input::{handle_key_event, Action},
    keymap::Keymap,
    widgets::{
        InputBarWidget, NotificationWidget, OverlayWidget, PageWidget, PopupWidget,
        StatusBarWidget,
    },
    TuiSecretPrompt,
};

const MOUSE_SCROLL_LINES: u16 = 3;

pub async fn run(config: Arc<AppConfig>, source: &str) -> Result<()> {
    // Create keymap from config
    let keymap = Keymap::from_config(&config.keymap);

    let (document, article) = super::load_and_classify(&config, source).await?;

    let (prompt, prompt_rx) = TuiSecretPrompt::channel();
    let deps = SessionDeps::from_config(&config, Arc::new(prompt))?;
    let session = SessionController::new(article, deps, &config);
    let mut app = App::new(config.clone(), session, prompt_rx, source, document.html);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    let title = format!("pagebrief · {}", app.page_title);
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture, SetTitle(title))?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut app, &keymap);

    // Restore terminal, also after an error in the loop
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_loop<B: Backend>(terminal: &mut Terminal<B>, app: &mut App, keymap: &Keymap) -> Result<()> {
    let event_handler = EventHandler::new(app.config.ui.tick_rate_ms);

    // Main loop
    loop {
        // Apply attempt progress, prompt requests and timers
        app.update(Instant::now());

        // Draw UI
        terminal.draw(|frame| draw(frame, app))?;

        if let Some(event) = event_handler.next()? {
            match event {
                AppEvent::Key(key) => {
                    let action = handle_key_event(key, app, keymap);
                    handle_action(app, action, terminal.size()?.height);
                }
                AppEvent::Mouse(mouse) => match mouse.kind {
                    MouseEventKind::Down(MouseButton::Left) => {
                        app.click_at(mouse.column, mouse.row, Instant::now());
                    }
                    MouseEventKind::ScrollDown => app.scroll_down(MOUSE_SCROLL_LINES),
                    MouseEventKind::ScrollUp => app.scroll_up(MOUSE_SCROLL_LINES),
                    _ => {}
                },
                // Page text is re-wrapped on the next draw
                AppEvent::Resize(_, _) => {}
                AppEvent::Tick => {}
            }
        }

        if app.should_quit {
            break;
        }
    }

    // Nothing may outlive the UI: answer a pending prompt, stop the request
    app.close_modal();
    if app.session.is_busy() {
        app.session.cancel();
    }
    Ok(())
}

fn draw(frame: &mut Frame, app: &mut App) {
    let size = frame.area();

    // Main layout: page + input bar + status bar
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(size);

    PageWidget::render(frame, main_layout[0], app);
    InputBarWidget::render(frame, main_layout[1], app);
    StatusBarWidget::render(frame, main_layout[2], app);
    OverlayWidget::render(frame, main_layout[0], app);
    NotificationWidget::render(frame, size, app);

    // Modals on top
    match &app.mode {
        Mode::SecretPrompt(entry) => {
            PopupWidget::render_secret_prompt(frame, &app.theme, &entry.provider, entry.input.chars().count());
        }
        Mode::ModelPicker { selected } => {
            PopupWidget::render_model_picker(
                frame,
                &app.theme,
                &app.model_choices(),
                *selected,
                app.session.active_model(),
            );
        }
        Mode::Normal => {}
    }
}

fn handle_action(app: &mut App, action: Action, height: u16) {
    let page = (height / 2).max(1);

    match action {
        Action::Quit => app.should_quit = true,
        Action::Summarize => app.summarize(TriggerSource::Shortcut),
        Action::ResetKey => app.request_key_reset(),
        Action::PickModel => app.open_model_picker(),
        Action::Cancel => app.cancel(),
        Action::FocusInput => app.focus_input(),
        Action::CloseOverlay => app.close_overlay(DismissReason::Escape),
        Action::ScrollDown => app.scroll_down(1),
        Action::ScrollUp => app.scroll_up(1),
        Action::PageDown => app.scroll_down(page),
        Action::PageUp => app.scroll_up(page),
        Action::MoveDown => app.picker_move(true),
        Action::MoveUp => app.picker_move(false),
        Action::Confirm => match app.mode {
            Mode::SecretPrompt(_) => app.secret_submit(),
            Mode::ModelPicker { .. } => app.picker_confirm(),
            Mode::Normal if app.focus == Focus::Input => app.submit_input(),
            Mode::Normal => {}
        },
        Action::Abort => match app.mode {
            Mode::SecretPrompt(_) | Mode::ModelPicker { .. } => app.close_modal(),
            Mode::Normal => {
                app.input.clear();
                app.leave_input();
            }
        },
        Action::InputChar(c) => match app.mode {
            Mode::SecretPrompt(_) => app.secret_input_char(c),
            Mode::Normal if app.focus == Focus::Input => app.input.push(c),
            _ => {}
        },
        Action::Backspace => match app.mode {
            Mode::SecretPrompt(_) => app.secret_backspace(),
            Mode::Normal if app.focus == Focus::Input => {
                app.input.pop();
            }
            _ => {}
        },
        Action::None => {}
    }
}
