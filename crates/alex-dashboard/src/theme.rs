use ratatui::style::{Color, Modifier, Style};

#[derive(Clone, Copy)]
pub struct Theme {
    pub bg: Color,
    pub surface: Color,
    pub border: Color,
    pub accent: Color,
    pub text: Color,
    pub muted: Color,
    pub ok: Color,
    pub warn: Color,
    pub critical: Color,
}

pub const THEME: Theme = Theme {
    bg: Color::Rgb(26, 11, 16),
    surface: Color::Rgb(20, 8, 12),
    border: Color::Rgb(56, 26, 36),
    accent: Color::Rgb(190, 24, 93),
    text: Color::Rgb(252, 231, 243),
    muted: Color::Rgb(157, 138, 146),
    ok: Color::Rgb(34, 197, 94),
    warn: Color::Rgb(245, 158, 11),
    critical: Color::Rgb(239, 68, 68),
};

pub const TITLE_STYLE: Style = Style::new()
    .fg(Color::Rgb(255, 255, 255))
    .add_modifier(Modifier::BOLD);
pub const SELECTED_STYLE: Style = Style::new()
    .bg(Color::Rgb(190, 24, 93))
    .fg(Color::Rgb(255, 255, 255))
    .add_modifier(Modifier::BOLD);

pub fn block_style() -> Style {
    Style::new().bg(THEME.bg).fg(THEME.text)
}

pub fn border_style() -> Style {
    Style::new().fg(THEME.border)
}

pub fn battery_color(level: i64, charging: bool) -> Color {
    if charging {
        return THEME.ok;
    }
    match level {
        n if n <= 15 => THEME.critical,
        n if n <= 40 => THEME.warn,
        _ => THEME.ok,
    }
}

pub fn age_color(age_secs: i64) -> Color {
    match age_secs {
        n if n < 10 => THEME.ok,
        n if n < 60 => THEME.warn,
        _ => THEME.muted,
    }
}

pub fn role_color(role: &str) -> Color {
    match role.to_ascii_lowercase().as_str() {
        "assistant" | "alex" => THEME.accent,
        "system" => THEME.muted,
        _ => THEME.text,
    }
}
