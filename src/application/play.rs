#[cfg(test)]
#[path = "play_test.rs"]
mod tests;

use anyhow::Result;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Input;
use dialoguer::Select;
use tokio::task;
use yansi::Paint;

use crate::domain::models::GameStatus;
use crate::domain::models::Phase;
use crate::domain::models::SessionError;
use crate::domain::services::Session;
use crate::domain::services::SessionState;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MenuEntry {
    Option { id: String, label: String },
    FreeText,
    StartOver,
    Quit,
}

impl MenuEntry {
    fn label(&self) -> String {
        match self {
            MenuEntry::Option { label, .. } => return label.to_string(),
            MenuEntry::FreeText => return "Say something else".to_string(),
            MenuEntry::StartOver => return "Start over".to_string(),
            MenuEntry::Quit => return "Quit".to_string(),
        }
    }
}

/// Builds the choice menu for the turn on display. Options whose outcome has
/// already been generated carry a "ready" marker.
pub fn menu_entries<F: Fn(&str) -> bool>(state: &SessionState, is_ready: F) -> Vec<MenuEntry> {
    let mut entries = vec![];
    if state.phase == Phase::PresentingOptions {
        for option in state.options() {
            let mut label = option.action.to_string();
            if is_ready(&option.id) {
                label = format!("{label} {}", Paint::green("(ready)").dimmed());
            }
            entries.push(MenuEntry::Option {
                id: option.id.to_string(),
                label,
            });
        }
        entries.push(MenuEntry::FreeText);
    }

    entries.push(MenuEntry::StartOver);
    entries.push(MenuEntry::Quit);

    return entries;
}

/// Text shown for the turn on display, ending banner included.
pub fn render_turn(state: &SessionState) -> String {
    let mut lines = vec![];
    if let Some(turn) = &state.current_turn {
        if let Some(game_state) = &state.game_state {
            lines.push(
                Paint::new(format!("Episode {}", game_state.episode_counter))
                    .bold()
                    .to_string(),
            );
        }
        lines.push(turn.narrated_state.to_string());

        if let Some(image_prompt) = &turn.image_prompt {
            if turn.image.is_some() {
                lines.push(Paint::new(format!("[illustrated: {image_prompt}]")).dimmed().to_string());
            }
        }
    }

    match state.phase {
        Phase::GameOver => {
            let status = state
                .game_state
                .as_ref()
                .map(|game_state| return game_state.status)
                .unwrap_or_default();
            if status == GameStatus::Victory {
                lines.push(Paint::green("You are victorious!").bold().to_string());
            } else {
                lines.push(Paint::red("You have died.").bold().to_string());
            }
        }
        Phase::Stuck => {
            lines.push(
                Paint::yellow("The story offers no way forward.")
                    .bold()
                    .to_string(),
            );
        }
        _ => {}
    }

    return lines.join("\n\n");
}

fn print_error(err: &SessionError) {
    eprintln!("{}", Paint::red(format!("Something went wrong: {err}")));
}

async fn prompt_menu(entries: &[MenuEntry]) -> Result<MenuEntry> {
    let labels = entries
        .iter()
        .map(|entry| return entry.label())
        .collect::<Vec<String>>();

    let idx = task::spawn_blocking(move || {
        return Select::with_theme(&ColorfulTheme::default())
            .with_prompt("What do you do?")
            .default(0)
            .items(&labels)
            .interact_opt();
    })
    .await??;

    match idx {
        Some(idx) => return Ok(entries[idx].clone()),
        None => return Ok(MenuEntry::Quit),
    }
}

async fn prompt_text() -> Result<String> {
    let text = task::spawn_blocking(|| {
        return Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt("You")
            .allow_empty(true)
            .interact_text();
    })
    .await??;

    return Ok(text);
}

/// Runs the game until the player quits.
pub async fn start(session: Session) -> Result<()> {
    let mut rendered_epoch = None;

    loop {
        let state = session.snapshot().await;

        if state.phase == Phase::Idle {
            println!("{}", Paint::new("Starting your adventure...").dimmed());
            if let Err(err) = session.start().await {
                print_error(&err);
                let entries = vec![MenuEntry::StartOver, MenuEntry::Quit];
                if prompt_menu(&entries).await? == MenuEntry::Quit {
                    return Ok(());
                }
            }
            continue;
        }

        if state.phase.is_busy() {
            tokio::task::yield_now().await;
            continue;
        }

        if rendered_epoch != Some(state.epoch) {
            println!("\n{}\n", render_turn(&state));
            rendered_epoch = Some(state.epoch);
        }

        let progress = session.prefetch_progress();
        tracing::debug!(
            pending = progress.pending,
            resolved = progress.resolved,
            "Prompting player"
        );

        let entries = menu_entries(&state, |option_id| {
            return session.is_option_ready(option_id);
        });
        let res = match prompt_menu(&entries).await? {
            MenuEntry::Option { id, .. } => {
                println!("{}", Paint::new("...").dimmed());
                session.select_option(&id).await
            }
            MenuEntry::FreeText => {
                let text = prompt_text().await?;
                session.submit_free_text(&text).await
            }
            MenuEntry::StartOver => {
                session.reset().await;
                continue;
            }
            MenuEntry::Quit => {
                session.reset().await;
                return Ok(());
            }
        };

        if let Err(err) = res {
            print_error(&err);
        }
    }
}
