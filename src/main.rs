use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    sync::Arc,
};

use hevi::{
    app_dirs::AppDirs,
    clock::SystemClock,
    config::{ConfigStore, FileConfigStore},
    export::{export_session, history_summary},
    feedback::DesktopFeedback,
    machine::Phase,
    registry::SetDraft,
    runtime::{AppEvent, CrosstermEventSource, FixedTicker, Runner},
    session::SessionDriver,
    store::Store,
    ui::{self, EntryForm},
};

const TICK_RATE_MS: u64 = 100;

/// terminal strength-training timer with time-under-tension tracking
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal workout timer that measures every set against the wall clock, survives being closed mid-set, and keeps a local history of your training."
)]
pub struct Cli {
    /// workout template to run (id or name); defaults to the first template
    #[clap(short = 't', long)]
    template: Option<String>,

    /// list available workout templates and exit
    #[clap(long)]
    list_templates: bool,

    /// print a session as JSON for external analysis and exit
    #[clap(long, value_name = "SESSION_ID")]
    export: Option<String>,

    /// print a per-template history summary and exit
    #[clap(long)]
    history: bool,

    /// override the data directory
    #[clap(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// preparation countdown length in seconds
    #[clap(long)]
    countdown_secs: Option<u32>,

    /// rest target length in seconds
    #[clap(long)]
    rest_secs: Option<u32>,

    /// silence tones for this run
    #[clap(long)]
    mute: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let data_dir = cli
        .data_dir
        .clone()
        .or_else(AppDirs::data_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    let store = Store::open(&data_dir)?;
    store.seed_defaults()?;

    if cli.list_templates {
        for template in store.load_templates()? {
            let sets: u32 = template.exercises.iter().map(|e| e.sets).sum();
            println!(
                "{}  {} ({} exercises, {} sets)",
                template.id,
                template.name,
                template.exercises.len(),
                sets
            );
        }
        return Ok(());
    }

    if let Some(session_id) = &cli.export {
        let Some(session) = store.session(session_id)? else {
            return Err(format!("no session with id {session_id}").into());
        };
        let workout = store
            .template(&session.template_id)?
            .map(|t| t.name)
            .unwrap_or_else(|| session.template_id.clone());
        let export = export_session(&session, &workout);
        println!("{}", serde_json::to_string_pretty(&export)?);
        return Ok(());
    }

    if cli.history {
        let sessions = store.load_sessions()?;
        for summary in history_summary(&sessions) {
            let name = store
                .template(&summary.template_id)?
                .map(|t| t.name)
                .unwrap_or_else(|| summary.template_id.clone());
            println!(
                "{name}: {} sessions, {} sets, {:.0} kg total volume",
                summary.sessions, summary.total_sets, summary.total_volume_kg
            );
        }
        return Ok(());
    }

    let mut config = FileConfigStore::new().load();
    if let Some(secs) = cli.countdown_secs {
        config.countdown_secs = secs;
    }
    if let Some(secs) = cli.rest_secs {
        config.rest_target_secs = secs;
    }

    let templates = store.load_templates()?;
    let template = match &cli.template {
        Some(wanted) => templates
            .iter()
            .find(|t| t.id == *wanted || t.name.eq_ignore_ascii_case(wanted))
            .cloned()
            .ok_or_else(|| format!("no template matching {wanted:?}"))?,
        None => templates
            .first()
            .cloned()
            .ok_or("no workout templates available")?,
    };

    let mut feedback = DesktopFeedback::new();
    feedback.set_muted(cli.mute || !config.sound);

    let driver = SessionDriver::start(
        store,
        &template,
        &config,
        Arc::new(SystemClock),
        Box::new(feedback),
    )?
    .with_history_csv(AppDirs::history_csv_path());

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, driver);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

struct App {
    driver: SessionDriver,
    form: EntryForm,
}

impl App {
    fn new(driver: SessionDriver) -> Self {
        Self {
            driver,
            form: EntryForm::default(),
        }
    }

    fn entry_open(&self) -> bool {
        self.driver.machine().phase() == Phase::Rest && !self.driver.machine().set_acknowledged()
    }

    /// Context action on space: arm, stop, or move on.
    fn on_space(&mut self) {
        match self.driver.machine().phase() {
            Phase::Idle => {
                let _ = self.driver.begin_set();
            }
            Phase::Execution => {
                if self.driver.end_set().is_ok() {
                    self.form = EntryForm::default();
                    if let Some(prior) = self.driver.prior_measurement() {
                        self.form.draft = SetDraft::prefill(prior);
                    }
                }
            }
            Phase::Rest if self.driver.machine().set_acknowledged() => {
                self.driver.advance();
            }
            Phase::Transition => {
                self.driver.advance();
            }
            _ => {}
        }
    }

    fn on_entry_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Tab => {
                self.form.active = self.form.active.next();
            }
            KeyCode::Enter => match self.driver.register(&self.form.draft) {
                Ok(()) => self.form.error = None,
                Err(err) => self.form.error = Some(err.to_string()),
            },
            KeyCode::Backspace => {
                self.form.active_value_mut().pop();
            }
            KeyCode::Char('f') => {
                self.form.draft.technical_failure = !self.form.draft.technical_failure;
            }
            KeyCode::Char(c) if c.is_ascii_digit() || c == '.' || c == ',' => {
                self.form.active_value_mut().push(c);
            }
            _ => {}
        }
    }
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    driver: SessionDriver,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(std::time::Duration::from_millis(TICK_RATE_MS)),
    );
    let mut app = App::new(driver);

    loop {
        terminal.draw(|f| ui::render(f, &app.driver, &app.form))?;

        match runner.step() {
            AppEvent::Tick => {
                app.driver.tick();
            }
            AppEvent::Resize => {}
            AppEvent::FocusGained => {
                app.driver.on_focus_gained();
            }
            AppEvent::Key(key) => {
                if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
                    break;
                }
                match key.code {
                    // Quitting keeps the session and snapshot on disk; the
                    // next launch resumes mid-phase.
                    KeyCode::Esc => break,
                    KeyCode::Char('q') if !app.entry_open() => break,
                    KeyCode::Char('c') if !app.entry_open() => {
                        app.driver.cancel();
                        break;
                    }
                    KeyCode::Char(' ') => app.on_space(),
                    _ if app.entry_open() => app.on_entry_key(key),
                    _ => {}
                }
            }
        }
    }

    Ok(())
}
