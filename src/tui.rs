use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Span;
use rust_decimal::Decimal;

use crate::fmt::money;
use crate::models::Status;

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Yellow)
    .add_modifier(Modifier::BOLD);

pub const FOOTER_STYLE: Style = Style::new().fg(Color::DarkGray);

pub const AMOUNT_POS_STYLE: Style = Style::new().fg(Color::Rgb(80, 220, 100));
pub const AMOUNT_NEG_STYLE: Style = Style::new().fg(Color::Red);

/// Format an amount as a colored Span. Shows absolute value; color conveys the sign.
pub fn money_span(amount: Decimal) -> Span<'static> {
    let style = if amount.is_sign_negative() {
        AMOUNT_NEG_STYLE
    } else {
        AMOUNT_POS_STYLE
    };
    Span::styled(money(amount.abs()), style)
}

pub fn status_span(status: Status) -> Span<'static> {
    let style = match status {
        Status::AutoOk => Style::new().fg(Color::Green),
        Status::AutoLabeled => Style::new().fg(Color::Yellow),
        Status::NeedsInput => Style::new().fg(Color::Red).add_modifier(Modifier::BOLD),
    };
    Span::styled(status.as_str(), style)
}
