use std::path::{Path, PathBuf};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Layout},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{LineGauge, Paragraph},
    Frame,
};

use crate::error::Result;
use crate::fmt::money;
use crate::models::{Label, Overlay};
use crate::pipeline::{analyze, finalize, require_resolved, Analysis};
use crate::reviewer::{review_items, ReviewItem};
use crate::settings::load_settings;
use crate::tui::{money_span, status_span, FOOTER_STYLE, HEADER_STYLE};

enum ReviewState {
    InputLabel,
    ConfirmExclude,
}

struct LabelReviewer {
    items: Vec<ReviewItem>,
    overlay: Overlay,
    title: String,
    current: usize,
    state: ReviewState,
    text_input: String,
    confirm_value: bool,
}

impl LabelReviewer {
    fn new(items: Vec<ReviewItem>, analysis: &Analysis) -> Self {
        let usual = analysis
            .classification
            .usual_amount
            .map(money)
            .unwrap_or_else(|| "n/a".to_string());
        Self {
            items,
            overlay: Overlay::new(),
            title: format!("{}  (usual amount {usual})", analysis.name()),
            current: 0,
            state: ReviewState::InputLabel,
            text_input: String::new(),
            confirm_value: true,
        }
    }

    fn item(&self) -> &ReviewItem {
        &self.items[self.current]
    }

    fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let item = self.item();
        let total = self.items.len();

        let [title_area, progress_area, detail_area, interaction_area, hints_area] =
            Layout::vertical([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(8),
                Constraint::Fill(1),
                Constraint::Length(1),
            ])
            .areas(area);

        frame.render_widget(
            Paragraph::new(Span::styled(self.title.as_str(), HEADER_STYLE)),
            title_area,
        );

        let ratio = if total > 1 {
            self.current as f64 / (total - 1) as f64
        } else {
            1.0
        };
        let gauge = LineGauge::default()
            .label(format!("{} of {}", self.current + 1, total))
            .ratio(ratio)
            .filled_style(Style::default().fg(Color::Green).bold())
            .unfilled_style(Style::default().fg(Color::DarkGray))
            .line_set(ratatui::symbols::line::THICK);
        frame.render_widget(gauge, progress_area);

        let suggestion = item.suggested_label.as_deref().unwrap_or("(none)");
        let mut detail_lines = vec![
            Line::from(""),
            Line::from(format!("  Row:         #{}", item.index)),
            Line::from(format!("  Date:        {}", item.date)),
            Line::from(format!("  Description: {}", item.description)),
            Line::from(vec![Span::raw("  Amount:      "), money_span(item.amount)]),
            Line::from(vec![Span::raw("  Status:      "), status_span(item.status)]),
            Line::from(format!("  Suggested:   {suggestion}")),
        ];
        if item.review_hint {
            detail_lines.push(Line::from(Span::styled(
                "  Small whole-dollar amount: probably a fee. Ctrl+X to exclude.",
                Style::default().fg(Color::Yellow),
            )));
        }
        frame.render_widget(Paragraph::new(detail_lines), detail_area);

        let interaction_lines: Vec<Line> = match self.state {
            ReviewState::InputLabel => {
                vec![Line::from(format!("  Label: {}\u{2588}", self.text_input))]
            }
            ReviewState::ConfirmExclude => {
                let (yes_style, no_style) = if self.confirm_value {
                    (Style::default().fg(Color::White).bg(Color::Blue), Style::default())
                } else {
                    (Style::default(), Style::default().fg(Color::White).bg(Color::Blue))
                };
                vec![Line::from(vec![
                    Span::raw("  Exclude this deposit from the document?  "),
                    Span::styled(" Yes ", yes_style),
                    Span::raw("  "),
                    Span::styled(" No ", no_style),
                ])]
            }
        };
        frame.render_widget(Paragraph::new(interaction_lines), interaction_area);

        let hints = match self.state {
            ReviewState::InputLabel => {
                "Enter=accept, Tab=use suggestion, Ctrl+X=exclude, Esc=skip, Ctrl+C=quit"
            }
            ReviewState::ConfirmExclude => "y/n or Left/Right to toggle, Enter=confirm, Esc=back",
        };
        frame.render_widget(Paragraph::new(hints).style(FOOTER_STYLE), hints_area);
    }

    fn handle_key(&mut self, key: KeyEvent) -> HandleResult {
        match self.state {
            ReviewState::InputLabel => match key.code {
                KeyCode::Char('x') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    self.confirm_value = true;
                    self.state = ReviewState::ConfirmExclude;
                    HandleResult::Continue
                }
                KeyCode::Char(c) => {
                    self.text_input.push(c);
                    HandleResult::Continue
                }
                KeyCode::Backspace => {
                    self.text_input.pop();
                    HandleResult::Continue
                }
                KeyCode::Tab => {
                    self.text_input = self
                        .item()
                        .suggested_label
                        .clone()
                        .unwrap_or_else(|| "For: ".to_string());
                    HandleResult::Continue
                }
                KeyCode::Enter => {
                    let typed = self.text_input.trim().to_string();
                    let label = if typed.is_empty() {
                        self.item().suggested_label.clone()
                    } else {
                        Some(typed)
                    };
                    match label {
                        Some(label) => self.commit(Label::Text(label)),
                        None => HandleResult::Continue,
                    }
                }
                KeyCode::Esc => self.advance(),
                _ => HandleResult::Continue,
            },
            ReviewState::ConfirmExclude => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    self.confirm_value = true;
                    HandleResult::Continue
                }
                KeyCode::Char('n') | KeyCode::Char('N') => {
                    self.confirm_value = false;
                    HandleResult::Continue
                }
                KeyCode::Left | KeyCode::Right => {
                    self.confirm_value = !self.confirm_value;
                    HandleResult::Continue
                }
                KeyCode::Enter if self.confirm_value => self.commit(Label::Exclude),
                KeyCode::Enter | KeyCode::Esc => {
                    self.state = ReviewState::InputLabel;
                    HandleResult::Continue
                }
                _ => HandleResult::Continue,
            },
        }
    }

    fn commit(&mut self, label: Label) -> HandleResult {
        self.overlay.insert(self.item().index, label);
        self.advance()
    }

    fn advance(&mut self) -> HandleResult {
        self.current += 1;
        self.state = ReviewState::InputLabel;
        self.text_input.clear();
        self.confirm_value = true;
        if self.is_done() {
            HandleResult::Done
        } else {
            HandleResult::Continue
        }
    }

    fn is_done(&self) -> bool {
        self.current >= self.items.len()
    }
}

enum HandleResult {
    Continue,
    Done,
}

/// Run the reviewer; `None` when the operator quits early.
fn run_reviewer(mut reviewer: LabelReviewer) -> Result<Option<Overlay>> {
    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        ratatui::restore();
        hook(info);
    }));

    let mut terminal = ratatui::init();

    let result: Result<bool> = loop {
        if let Err(e) = terminal.draw(|frame| reviewer.draw(frame)) {
            break Err(e.into());
        }
        match event::read() {
            Err(e) => break Err(e.into()),
            Ok(Event::Key(key)) => {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
                    break Ok(false);
                }
                if let HandleResult::Done = reviewer.handle_key(key) {
                    break Ok(true);
                }
            }
            _ => {}
        }
    };

    drop(terminal);
    ratatui::restore();
    Ok(result?.then_some(reviewer.overlay))
}

pub fn run(file: &str, output: Option<&str>, save_labels: Option<&str>) -> Result<()> {
    let settings = load_settings();
    let renderer = super::renderer(&settings)?;
    let analysis = analyze(Path::new(file))?;

    let items = review_items(&analysis.classification);
    let overlay = if items.is_empty() {
        println!("Nothing to review.");
        Overlay::new()
    } else {
        println!("{} deposit(s) to review", items.len());
        match run_reviewer(LabelReviewer::new(items, &analysis))? {
            Some(overlay) => overlay,
            None => {
                println!("Review cancelled; nothing written.");
                return Ok(());
            }
        }
    };

    if let Some(path) = save_labels {
        let json = serde_json::to_string_pretty(&overlay)?;
        super::write_output(format!("{json}\n").as_bytes(), Path::new(path))?;
    }

    require_resolved(&analysis, &overlay)?;
    let artifact = finalize(analysis, &overlay, &renderer, renderer.today())?;
    let path = output
        .map(PathBuf::from)
        .unwrap_or_else(|| settings.exports_dir().join(&artifact.filename));
    super::write_output(&artifact.bytes, &path)?;
    println!("Review complete!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Extraction, HeaderInfo, RawTransaction};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn reviewer() -> LabelReviewer {
        let txn = |m: u32, d: u32, a: i64| {
            let date = NaiveDate::from_ymd_opt(2025, m, d).unwrap();
            RawTransaction {
                row: 0,
                date: Some(date),
                date_text: date.format("%m/%d/%Y").to_string(),
                description: "SURPLUS".to_string(),
                amount: Decimal::from(a),
            }
        };
        let analysis = Analysis::from_extraction(Extraction {
            header: HeaderInfo::new(),
            transactions: vec![txn(1, 5, 500), txn(1, 9, 25), txn(1, 20, 500)],
            warnings: vec![],
        });
        LabelReviewer::new(review_items(&analysis.classification), &analysis)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(r: &mut LabelReviewer, s: &str) {
        for c in s.chars() {
            r.handle_key(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn test_enter_accepts_suggestion() {
        let mut r = reviewer();
        assert_eq!(r.item().index, 0);
        r.handle_key(key(KeyCode::Enter));
        assert_eq!(r.overlay[&0].text(), Some("For: December 2024"));
        assert_eq!(r.item().index, 1);
    }

    #[test]
    fn test_enter_without_text_or_suggestion_stays() {
        let mut r = reviewer();
        r.handle_key(key(KeyCode::Esc));
        r.handle_key(key(KeyCode::Enter));
        assert_eq!(r.current, 1);
        assert!(r.overlay.is_empty());
    }

    #[test]
    fn test_typed_label_and_exclude() {
        let mut r = reviewer();
        type_str(&mut r, "For: November 2024");
        r.handle_key(key(KeyCode::Enter));
        assert_eq!(r.overlay[&0].text(), Some("For: November 2024"));

        r.handle_key(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::CONTROL));
        assert!(matches!(r.handle_key(key(KeyCode::Enter)), HandleResult::Done));
        assert!(r.overlay[&1].is_exclude());
    }

    #[test]
    fn test_declined_exclude_returns_to_input() {
        let mut r = reviewer();
        r.handle_key(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::CONTROL));
        r.handle_key(key(KeyCode::Char('n')));
        r.handle_key(key(KeyCode::Enter));
        assert!(matches!(r.state, ReviewState::InputLabel));
        assert!(r.overlay.is_empty());
        assert_eq!(r.current, 0);
    }

    #[test]
    fn test_tab_fills_suggestion() {
        let mut r = reviewer();
        r.handle_key(key(KeyCode::Tab));
        assert_eq!(r.text_input, "For: December 2024");
        r.handle_key(key(KeyCode::Esc));
        r.handle_key(key(KeyCode::Tab));
        assert_eq!(r.text_input, "For: ");
    }
}
