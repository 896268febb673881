use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::machine::Phase;
use crate::registry::SetDraft;
use crate::session::SessionDriver;

const HORIZONTAL_MARGIN: u16 = 2;
const VERTICAL_MARGIN: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryField {
    #[default]
    Weight,
    Reps,
    Rpe,
}

impl EntryField {
    pub fn next(self) -> Self {
        match self {
            EntryField::Weight => EntryField::Reps,
            EntryField::Reps => EntryField::Rpe,
            EntryField::Rpe => EntryField::Weight,
        }
    }
}

/// Measurement entry state while a rest window is open.
#[derive(Debug, Clone, Default)]
pub struct EntryForm {
    pub draft: SetDraft,
    pub active: EntryField,
    pub error: Option<String>,
}

impl EntryForm {
    pub fn active_value_mut(&mut self) -> &mut String {
        match self.active {
            EntryField::Weight => &mut self.draft.weight,
            EntryField::Reps => &mut self.draft.reps,
            EntryField::Rpe => &mut self.draft.rpe,
        }
    }
}

fn format_clock(ms: i64) -> String {
    let total_secs = ms / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

fn format_tension(ms: i64) -> String {
    format!("{:.1}s", ms as f64 / 1000.0)
}

fn phase_style(phase: Phase) -> Style {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    match phase {
        Phase::Idle => bold.fg(Color::Gray),
        Phase::Preparation => bold.fg(Color::Yellow),
        Phase::Execution => bold.fg(Color::Red),
        Phase::Rest => bold.fg(Color::Green),
        Phase::Transition => bold.fg(Color::Cyan),
    }
}

pub fn render(frame: &mut Frame, driver: &SessionDriver, form: &EntryForm) {
    let area = frame.area();
    if driver.is_workout_complete() {
        render_summary(frame, driver, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Length(7), // phase banner
            Constraint::Length(3), // prior performance
            Constraint::Min(6),    // entry form
            Constraint::Length(3), // key hints
        ])
        .split(area);

    render_header(frame, driver, chunks[0]);
    render_phase(frame, driver, chunks[1]);
    render_prior(frame, driver, chunks[2]);
    render_entry(frame, driver, form, chunks[3]);
    render_hints(frame, driver, chunks[4]);
}

fn render_header(frame: &mut Frame, driver: &SessionDriver, area: Rect) {
    let progress = driver.machine().progress();
    let slot_count = driver.session().slots.len();
    let target_sets = driver
        .session()
        .slots
        .get(progress.exercise_index)
        .map(|s| s.target_sets)
        .unwrap_or(0);
    let header = Line::from(vec![
        Span::styled(
            driver.template_name().to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw("  ·  "),
        Span::raw(driver.current_exercise_name().to_string()),
        Span::styled(
            format!(
                "  (exercise {}/{}, set {}/{})",
                progress.exercise_index + 1,
                slot_count,
                progress.set_index + 1,
                target_sets
            ),
            Style::default().add_modifier(Modifier::DIM),
        ),
    ]);
    frame.render_widget(
        Paragraph::new(header)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::BOTTOM)),
        area,
    );
}

fn render_phase(frame: &mut Frame, driver: &SessionDriver, area: Rect) {
    let machine = driver.machine();
    let phase = machine.phase();
    let clock_line = match phase {
        Phase::Idle => "press space to arm the set".to_string(),
        Phase::Preparation => {
            let remaining = machine.countdown_remaining_ms().unwrap_or(0);
            format!("starts in {}", (remaining + 999) / 1000)
        }
        Phase::Execution => {
            let elapsed = machine.elapsed_ms().unwrap_or(0);
            format!("under tension {}", format_tension(elapsed))
        }
        Phase::Rest | Phase::Transition => {
            let elapsed = machine.elapsed_ms().unwrap_or(0);
            let target = machine.target_ms().unwrap_or(0);
            format!("{} / {}", format_clock(elapsed), format_clock(target))
        }
    };

    let mut lines = vec![
        Line::from(Span::styled(
            phase.to_string().to_uppercase(),
            phase_style(phase),
        )),
        Line::default(),
        Line::from(Span::styled(
            clock_line,
            Style::default().add_modifier(Modifier::BOLD),
        )),
    ];
    if matches!(phase, Phase::Rest | Phase::Transition) {
        lines.push(Line::from(Span::styled(
            format!(
                "last set {}",
                format_tension(machine.last_execution_ms())
            ),
            Style::default().add_modifier(Modifier::DIM),
        )));
    }

    frame.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL)),
        area,
    );
}

fn render_prior(frame: &mut Frame, driver: &SessionDriver, area: Rect) {
    let text = match driver.prior_measurement() {
        Some(m) => format!(
            "previous: {} kg × {}{}",
            m.weight_kg,
            m.reps,
            m.rpe.map(|r| format!(" @ RPE {r}")).unwrap_or_default()
        ),
        None => "no previous set for this exercise".to_string(),
    };
    frame.render_widget(
        Paragraph::new(Span::styled(
            text,
            Style::default().add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center),
        area,
    );
}

fn render_entry(frame: &mut Frame, driver: &SessionDriver, form: &EntryForm, area: Rect) {
    let machine = driver.machine();
    if machine.phase() != Phase::Rest || machine.set_acknowledged() {
        let note = if machine.set_acknowledged() {
            "set registered, space to continue"
        } else {
            ""
        };
        frame.render_widget(
            Paragraph::new(note).alignment(Alignment::Center),
            area,
        );
        return;
    }

    let field = |label: &str, value: &str, active: bool| {
        let style = if active {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        Line::from(vec![
            Span::styled(format!("{label:>8}: "), Style::default().add_modifier(Modifier::DIM)),
            Span::styled(format!("{value}_"), style),
        ])
    };

    let mut lines = vec![
        field("weight", &form.draft.weight, form.active == EntryField::Weight),
        field("reps", &form.draft.reps, form.active == EntryField::Reps),
        field("rpe", &form.draft.rpe, form.active == EntryField::Rpe),
        Line::from(Span::raw(format!(
            "  failure: {}",
            if form.draft.technical_failure { "yes" } else { "no" }
        ))),
    ];
    if let Some(err) = &form.error {
        lines.push(Line::from(Span::styled(
            err.clone(),
            Style::default().fg(Color::Red),
        )));
    }

    frame.render_widget(
        Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("register set"))
            .wrap(Wrap { trim: true }),
        area,
    );
}

fn render_hints(frame: &mut Frame, driver: &SessionDriver, area: Rect) {
    let hint = match driver.machine().phase() {
        Phase::Idle => "(space) start set  (c)ancel workout  (q)uit",
        Phase::Preparation => "get ready…  (c)ancel  (q)uit",
        Phase::Execution => "(space) end set  (c)ancel  (q)uit",
        Phase::Rest => {
            if driver.machine().set_acknowledged() {
                "(space) next set  (c)ancel  (q)uit"
            } else {
                "(tab) field  (f)ailure  (enter) register  (q)uit"
            }
        }
        Phase::Transition => "(space) next exercise  (c)ancel  (q)uit",
    };
    frame.render_widget(
        Paragraph::new(Span::styled(
            hint,
            Style::default().add_modifier(Modifier::DIM | Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP)),
        area,
    );
}

fn render_summary(frame: &mut Frame, driver: &SessionDriver, area: Rect) {
    let session = driver.session();
    let mut lines = vec![
        Line::from(Span::styled(
            "WORKOUT COMPLETE",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
    ];
    for slot in &session.slots {
        let volume: f64 = slot
            .measurements
            .iter()
            .map(|m| m.weight_kg * f64::from(m.reps))
            .sum();
        lines.push(Line::from(format!(
            "{}: {} sets, {:.0} kg volume",
            slot.exercise_name,
            slot.measurements.len(),
            volume
        )));
    }
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "(q) quit",
        Style::default().add_modifier(Modifier::DIM),
    )));

    frame.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL)),
        area,
    );
}
