use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use crossterm::style::Stylize;
use unicode_width::UnicodeWidthStr;

// ═══════════════════════════════════════════════════════════════════════════════
// Clap Styles
// ═══════════════════════════════════════════════════════════════════════════════

pub fn get_styles() -> Styles {
    clap::builder::Styles::styled()
        .usage(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .header(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .literal(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .error(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))))
}

pub mod colors {
    use crossterm::style::Color;

    pub const CYAN: Color = Color::Rgb {
        r: 0,
        g: 255,
        b: 255,
    };
    pub const GREEN: Color = Color::Rgb {
        r: 0,
        g: 255,
        b: 136,
    };
    pub const RED: Color = Color::Rgb {
        r: 255,
        g: 85,
        b: 85,
    };
    pub const DIM: Color = Color::Rgb {
        r: 128,
        g: 128,
        b: 128,
    };
}

pub mod box_chars {
    pub const ROUND_TOP_LEFT: &str = "╭";
    pub const ROUND_TOP_RIGHT: &str = "╮";
    pub const ROUND_BOTTOM_LEFT: &str = "╰";
    pub const ROUND_BOTTOM_RIGHT: &str = "╯";
    pub const SINGLE_HORIZONTAL: &str = "─";
    pub const SINGLE_VERTICAL: &str = "│";
    pub const T_LEFT: &str = "├";
    pub const T_RIGHT: &str = "┤";
    pub const T_TOP: &str = "┬";
    pub const T_BOTTOM: &str = "┴";
    pub const CROSS: &str = "┼";
    pub const CHECK: &str = "✓";
    pub const CROSS_MARK: &str = "✗";
}

pub fn print_success(message: &str) {
    println!(
        " {} {}",
        box_chars::CHECK.to_string().with(colors::GREEN).bold(),
        message.with(colors::GREEN)
    );
}

pub fn print_error(message: &str) {
    println!(
        " {} {}",
        box_chars::CROSS_MARK.to_string().with(colors::RED).bold(),
        message.with(colors::RED)
    );
}

pub fn print_key_value(key: &str, value: &str) {
    println!("  {} {}", format!("{}:", key).with(colors::DIM), value);
}

/// Rank movement label: `NEW`, `-`, `▲3` or `▼2`.
pub fn format_rank_delta(delta: Option<i64>) -> String {
    match delta {
        None => "NEW".to_string(),
        Some(0) => "-".to_string(),
        Some(d) if d > 0 => format!("▲{}", d),
        Some(d) => format!("▼{}", -d),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Table Display
// ═══════════════════════════════════════════════════════════════════════════════

pub struct TableBuilder {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    col_widths: Vec<usize>,
}

impl TableBuilder {
    pub fn new(headers: Vec<&str>) -> Self {
        let col_widths: Vec<usize> = headers.iter().map(|h| h.width()).collect();
        TableBuilder {
            headers: headers.into_iter().map(String::from).collect(),
            rows: Vec::new(),
            col_widths,
        }
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        for (i, cell) in row.iter().enumerate() {
            if i < self.col_widths.len() {
                self.col_widths[i] = self.col_widths[i].max(cell.width());
            }
        }
        self.rows.push(row);
    }

    fn border(&self, left: &str, junction: &str, right: &str) -> String {
        let segments: Vec<String> = self
            .col_widths
            .iter()
            .map(|width| box_chars::SINGLE_HORIZONTAL.repeat(width + 2))
            .collect();
        format!("{}{}{}", left, segments.join(junction), right)
    }

    fn line(&self, cells: &[String]) -> String {
        let mut line = box_chars::SINGLE_VERTICAL.to_string();
        for (i, width) in self.col_widths.iter().enumerate() {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            let padding = width.saturating_sub(cell.width());
            line.push_str(&format!(" {}{} ", cell, " ".repeat(padding)));
            line.push_str(box_chars::SINGLE_VERTICAL);
        }
        line
    }

    /// Plain-text rendering, one line per table row plus borders.
    pub fn render(&self) -> String {
        let mut lines = vec![
            self.border(
                box_chars::ROUND_TOP_LEFT,
                box_chars::T_TOP,
                box_chars::ROUND_TOP_RIGHT,
            ),
            self.line(&self.headers),
            self.border(box_chars::T_LEFT, box_chars::CROSS, box_chars::T_RIGHT),
        ];
        lines.extend(self.rows.iter().map(|row| self.line(row)));
        lines.push(self.border(
            box_chars::ROUND_BOTTOM_LEFT,
            box_chars::T_BOTTOM,
            box_chars::ROUND_BOTTOM_RIGHT,
        ));
        lines.join("\n")
    }

    pub fn print(&self) {
        println!("{}", self.render().with(colors::CYAN));
    }
}
