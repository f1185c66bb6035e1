//! Line-oriented terminal front end for a [`SessionController`].

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::GuidanceError;
use crate::session::{AdvanceOutcome, LifecycleState, SessionController, Step};
use crate::Result;

/// Number of semantic areas listed on the results screen.
const TOP_AREAS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Renders the session to `output` and feeds commands read from `input`.
///
/// Controller failures are shown to the user and the loop continues; only
/// I/O errors on the terminal itself end [`run`] with an error.
///
/// [`run`]: TerminalDriver::run
pub struct TerminalDriver<R, W> {
    controller: SessionController,
    input: R,
    output: W,
    notice: Option<String>,
}

impl<R, W> TerminalDriver<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(controller: SessionController, input: R, output: W) -> Self {
        Self {
            controller,
            input,
            output,
            notice: None,
        }
    }

    /// The driven controller.
    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Initialize the session and process commands until quit or end of input.
    pub async fn run(&mut self) -> Result<()> {
        if let Err(e) = self.controller.initialize().await {
            debug!(error = %e, "initial load failed");
        }

        loop {
            self.render().await?;
            let Some(line) = self.read_line().await? else {
                debug!("input closed");
                break;
            };
            if self.handle(line.trim()).await? == Flow::Quit {
                break;
            }
        }

        self.output.write_all(b"Goodbye.\n").await?;
        self.output.flush().await?;
        Ok(())
    }

    /// Leave the session and hand back the output sink.
    pub fn finish(self) -> W {
        self.controller.leave();
        self.output
    }

    async fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }

    async fn handle(&mut self, command: &str) -> Result<Flow> {
        if command.eq_ignore_ascii_case("q") {
            return Ok(Flow::Quit);
        }

        let result = match self.controller.lifecycle() {
            LifecycleState::Loading => Ok(()),
            LifecycleState::Error => match command {
                "" | "r" => self.controller.retry().await.map(drop),
                _ => self.unknown(command),
            },
            LifecycleState::Landing => match command {
                "" | "c" => self.controller.resume().await,
                "r" => self.controller.restart().await.map(drop),
                _ => self.unknown(command),
            },
            LifecycleState::Active => self.handle_active(command).await,
            LifecycleState::Finished => match command {
                "r" => self.controller.restart().await.map(drop),
                _ => self.unknown(command),
            },
        };

        if let Err(e) = result {
            self.notice = Some(describe(&e));
        }
        Ok(Flow::Continue)
    }

    async fn handle_active(&mut self, command: &str) -> Result<()> {
        if self.controller.insight().is_some() {
            if command.is_empty() {
                self.controller.dismiss_insight();
                return Ok(());
            }
            return self.unknown(command);
        }

        match command {
            "b" => self.controller.navigate_back().map(drop),
            "r" => self.controller.restart().await.map(drop),
            "" => Ok(()),
            _ => {
                let answer = self.answer_for(command)?;
                match self.controller.submit(answer).await {
                    Ok(AdvanceOutcome::Stale) => debug!("submission superseded"),
                    Ok(outcome) => debug!(?outcome, "submission applied"),
                    // Shown with the step by render_active.
                    Err(e) if self.controller.advance_error().is_some() => {
                        debug!(error = %e, "advance failed");
                    }
                    Err(e) => return Err(e),
                }
                Ok(())
            }
        }
    }

    fn unknown(&mut self, command: &str) -> Result<()> {
        self.notice = Some(format!("Unknown command '{}'.", command));
        Ok(())
    }

    fn answer_for(&self, command: &str) -> Result<String> {
        let step = self
            .controller
            .visible_step()
            .ok_or_else(|| GuidanceError::InconsistentSession("no step on screen".into()))?;

        if step.options.is_empty() {
            return Ok(command.to_string());
        }

        command
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| step.options.get(i))
            .cloned()
            .ok_or_else(|| GuidanceError::InvalidAnswer {
                step_id: step.id.clone(),
                answer: command.to_string(),
            })
    }

    async fn render(&mut self) -> Result<()> {
        let mut screen = String::new();

        match self.controller.lifecycle() {
            LifecycleState::Loading => screen.push_str("Loading your test...\n"),
            LifecycleState::Error => {
                let reason = self.controller.last_error().unwrap_or("unknown error");
                screen.push_str(&format!("Could not load your test: {}\n", reason));
                screen.push_str("[Enter] retry  [q] quit\n");
            }
            LifecycleState::Landing => {
                screen.push_str(&format!(
                    "Welcome back! You have answered {} of {} questions.\n",
                    self.controller.current_index(),
                    self.controller.total_steps()
                ));
                screen.push_str("[c] continue  [r] start over  [q] quit\n");
            }
            LifecycleState::Active => self.render_active(&mut screen),
            LifecycleState::Finished => self.render_finished(&mut screen),
        }

        if let Some(notice) = self.notice.take() {
            screen.push_str(&format!("! {}\n", notice));
        }
        screen.push_str("> ");

        self.output.write_all(screen.as_bytes()).await?;
        self.output.flush().await?;
        Ok(())
    }

    fn render_active(&self, screen: &mut String) {
        if let Some(insight) = self.controller.insight() {
            screen.push_str(&format!("\n*** {} ***\n", insight.text));
            screen.push_str("[Enter] continue\n");
            return;
        }

        let Some(step) = self.controller.visible_step() else {
            screen.push_str("Preparing the next question...\n");
            return;
        };

        screen.push_str(&format!(
            "\nQuestion {}/{}: {}\n",
            self.controller.history().current_index() + 1,
            self.controller.total_steps(),
            step.prompt
        ));
        if let Some(ref reasoning) = step.reasoning {
            screen.push_str(&format!("  ({})\n", reasoning));
        }
        render_options(screen, step, self.controller.selected_answer());

        if let Some(error) = self.controller.advance_error() {
            screen.push_str(&format!(
                "! Your answer could not be sent ({}). Choose again to retry.\n",
                error
            ));
        }
        screen.push_str("[1-9] answer  [b] back  [r] restart  [q] quit\n");
    }

    fn render_finished(&self, screen: &mut String) {
        screen.push_str("\nTest complete! Your results are being prepared.\n");
        let areas = self.controller.convergence().snapshot();
        if !areas.is_empty() {
            screen.push_str("Strongest areas so far:\n");
            for area in areas.iter().take(TOP_AREAS) {
                screen.push_str(&format!("  {:<16} {:.1}\n", area.label, area.weight));
            }
        }
        screen.push_str("[r] take the test again  [q] quit\n");
    }
}

fn render_options(screen: &mut String, step: &Step, selected: Option<&str>) {
    if step.options.is_empty() {
        screen.push_str("  (type your answer)\n");
        return;
    }
    for (i, option) in step.options.iter().enumerate() {
        let marker = if selected == Some(option.as_str()) { '*' } else { ' ' };
        screen.push_str(&format!("{} {}) {}", marker, i + 1, option));
        if let Some(asset) = step.resolved_assets.as_ref().and_then(|a| a.get(i)) {
            screen.push_str(&format!("  <{}>", asset));
        }
        screen.push('\n');
    }
}

fn describe(error: &GuidanceError) -> String {
    match error {
        GuidanceError::InvalidAnswer { answer, .. } => {
            format!("'{}' is not one of the options.", answer)
        }
        GuidanceError::AtFirstStep => "Already at the first question.".to_string(),
        other => other.to_string(),
    }
}
