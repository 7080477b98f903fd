use std::borrow::Cow;
use std::sync::OnceLock;

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Paragraph, Widget, Wrap},
};
use regex::{Captures, Regex};
use tui_markdown as md;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use super::theme;

/// Render markdown (with `$…$` / `$$…$$` math and pipe tables) into owned
/// lines, wrapped to `width` columns. A width of zero disables wrapping.
pub fn render_markdown_lines(source: &str, width: u16) -> Vec<Line<'static>> {
    let source = rewrite_math(source);

    let mut lines: Vec<Line<'static>> = Vec::new();
    for block in split_tables(&source) {
        let rendered = match block {
            Block::Markdown(text) => render_markdown_block(text, width),
            Block::Table(table) => table.render(width),
        };
        if rendered.is_empty() {
            continue;
        }
        if !lines.is_empty() {
            lines.push(Line::default());
        }
        lines.extend(rendered);
    }
    lines
}

fn render_markdown_block(source: &str, width: u16) -> Vec<Line<'static>> {
    if source.trim().is_empty() {
        return Vec::new();
    }
    let text = md::from_str(source);

    let mut lines: Vec<Line<'static>> = if width == 0 {
        text.lines.iter().map(line_to_static).collect()
    } else {
        wrap_rendered(text, width)
    };

    while lines.last().is_some_and(is_blank) {
        lines.pop();
    }
    let leading = lines.iter().take_while(|line| is_blank(line)).count();
    lines.drain(..leading);
    lines
}

/// Lay the text out through a wrapping `Paragraph` and read the rows back, so
/// the result matches what a `Paragraph` of the same width would show.
fn wrap_rendered(text: Text<'_>, width: u16) -> Vec<Line<'static>> {
    let paragraph = Paragraph::new(text).wrap(Wrap { trim: false });
    let height = paragraph.line_count(width).min(u16::MAX as usize) as u16;
    if height == 0 {
        return Vec::new();
    }

    let area = Rect::new(0, 0, width, height);
    let mut scratch = Buffer::empty(area);
    paragraph.render(area, &mut scratch);

    (0..height).map(|y| row_to_line(&scratch, y, width)).collect()
}

fn row_to_line(buffer: &Buffer, y: u16, width: u16) -> Line<'static> {
    let used = (0..width)
        .rev()
        .find(|&x| {
            buffer
                .cell((x, y))
                .is_some_and(|cell| !cell.symbol().trim().is_empty())
        })
        .map_or(0, |x| x + 1);

    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut run = String::new();
    let mut run_style: Option<Style> = None;

    for x in 0..used {
        let Some(cell) = buffer.cell((x, y)) else {
            continue;
        };
        // Trailing half of a wide character.
        if cell.symbol().is_empty() {
            continue;
        }
        let style = cell.style();
        if let Some(current) = run_style {
            if current != style {
                spans.push(Span::styled(std::mem::take(&mut run), current));
                run_style = Some(style);
            }
        } else {
            run_style = Some(style);
        }
        run.push_str(cell.symbol());
    }
    if let Some(style) = run_style {
        spans.push(Span::styled(run, style));
    }

    Line::from(spans)
}

fn line_to_static(line: &Line<'_>) -> Line<'static> {
    Line {
        style: line.style,
        alignment: line.alignment,
        spans: line
            .spans
            .iter()
            .map(|span| Span::styled(span.content.to_string(), span.style))
            .collect(),
    }
}

pub fn is_blank(line: &Line<'_>) -> bool {
    line.spans
        .iter()
        .all(|span| span.content.chars().all(char::is_whitespace))
}

pub fn plain_text(line: &Line<'_>) -> String {
    line.spans
        .iter()
        .map(|span| span.content.as_ref())
        .collect()
}

fn block_math() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\$\$(.+?)\$\$").expect("valid block math regex"))
}

fn inline_math() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Opening `$` must be followed, and closing `$` preceded, by a non-space,
    // and a closing `$` directly before a digit is treated as currency.
    RE.get_or_init(|| {
        Regex::new(r"\$([^\s$](?:[^$\n]*[^\s$])?)\$(\d)?").expect("valid inline math regex")
    })
}

/// Rewrite TeX math into Unicode the terminal can show: `$$…$$` becomes a code
/// block and `$…$` an inline code span. Fenced code blocks and code spans are
/// copied unchanged.
pub fn rewrite_math(source: &str) -> Cow<'_, str> {
    if !source.contains('$') {
        return Cow::Borrowed(source);
    }

    let mut out = String::with_capacity(source.len());
    for segment in code_segments(source) {
        match segment {
            Segment::Code(code) => out.push_str(code),
            Segment::Prose(prose) => out.push_str(&rewrite_prose_math(prose)),
        }
    }
    Cow::Owned(out)
}

fn rewrite_prose_math(prose: &str) -> Cow<'_, str> {
    if !prose.contains('$') {
        return Cow::Borrowed(prose);
    }
    let blocks = block_math().replace_all(prose, |caps: &Captures| {
        format!("\n\n```\n{}\n```\n\n", latex_to_unicode(&caps[1]))
    });
    let inline = inline_math().replace_all(&blocks, |caps: &Captures| {
        if caps.get(2).is_some() {
            caps[0].to_string()
        } else {
            format!("`{}`", latex_to_unicode(&caps[1]))
        }
    });
    Cow::Owned(inline.into_owned())
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Prose(&'a str),
    Code(&'a str),
}

/// Split `source` into prose and code, where code is a fenced block (an
/// unclosed fence runs to the end) or a backtick code span.
fn code_segments(source: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut prose_start = 0;
    let mut fence: Option<(Fence, usize)> = None;
    let mut offset = 0;

    for line in source.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        match fence {
            Some((open, code_start)) => {
                if Fence::parse(line).is_some_and(|close| open.is_closed_by(&close)) {
                    segments.push(Segment::Code(&source[code_start..offset]));
                    prose_start = offset;
                    fence = None;
                }
            }
            None => {
                if let Some(open) = Fence::parse(line) {
                    push_prose(&mut segments, &source[prose_start..line_start]);
                    fence = Some((open, line_start));
                }
            }
        }
    }

    match fence {
        Some((_, code_start)) => segments.push(Segment::Code(&source[code_start..])),
        None => push_prose(&mut segments, &source[prose_start..]),
    }
    segments
}

/// Push `prose`, splitting out backtick code spans. A backtick run without
/// a closing run of the same length is literal text.
fn push_prose<'a>(segments: &mut Vec<Segment<'a>>, prose: &'a str) {
    let mut start = 0;
    let mut pos = 0;
    while let Some(found) = prose[pos..].find('`') {
        let open = pos + found;
        let run = backtick_run(&prose[open..]);
        let after = open + run;
        match closing_run(&prose[after..], run) {
            Some(close) => {
                if open > start {
                    segments.push(Segment::Prose(&prose[start..open]));
                }
                let end = after + close + run;
                segments.push(Segment::Code(&prose[open..end]));
                start = end;
                pos = end;
            }
            None => pos = after,
        }
    }
    if start < prose.len() {
        segments.push(Segment::Prose(&prose[start..]));
    }
}

fn backtick_run(text: &str) -> usize {
    text.bytes().take_while(|&b| b == b'`').count()
}

/// Offset of the next run of exactly `run` backticks.
fn closing_run(text: &str, run: usize) -> Option<usize> {
    let mut pos = 0;
    while let Some(found) = text[pos..].find('`') {
        let at = pos + found;
        let len = backtick_run(&text[at..]);
        if len == run {
            return Some(at);
        }
        pos = at + len;
    }
    None
}

/// Opening or closing line of a fenced code block.
#[derive(Debug, Clone, Copy)]
struct Fence {
    marker: char,
    len: usize,
    bare: bool,
}

impl Fence {
    fn parse(line: &str) -> Option<Self> {
        let rest = line.trim_start_matches(' ');
        if line.len() - rest.len() > 3 {
            return None;
        }
        let marker = rest.chars().next().filter(|ch| matches!(ch, '`' | '~'))?;
        let len = rest.chars().take_while(|&ch| ch == marker).count();
        if len < 3 {
            return None;
        }
        Some(Self {
            marker,
            len,
            bare: rest[len..].trim().is_empty(),
        })
    }

    fn is_closed_by(&self, close: &Fence) -> bool {
        close.bare && close.marker == self.marker && close.len >= self.len
    }
}

enum Block<'a> {
    Markdown(&'a str),
    Table(Table),
}

/// Split out pipe tables (a header row, a delimiter row and body rows)
/// outside fenced code. Everything else stays markdown.
fn split_tables(source: &str) -> Vec<Block<'_>> {
    let lines: Vec<(usize, &str)> = source
        .split_inclusive('\n')
        .scan(0, |offset, line| {
            let start = *offset;
            *offset += line.len();
            Some((start, line))
        })
        .collect();

    let mut blocks = Vec::new();
    let mut markdown_start = 0;
    let mut fence: Option<Fence> = None;
    let mut index = 0;

    while index < lines.len() {
        let (start, line) = lines[index];
        if let Some(open) = fence {
            if Fence::parse(line).is_some_and(|close| open.is_closed_by(&close)) {
                fence = None;
            }
            index += 1;
            continue;
        }
        if let Some(open) = Fence::parse(line) {
            fence = Some(open);
            index += 1;
            continue;
        }

        let table = lines
            .get(index + 1)
            .and_then(|&(_, delimiter)| Table::start(line, delimiter));
        let Some(mut table) = table else {
            index += 1;
            continue;
        };

        let mut next = index + 2;
        while let Some(&(_, row)) = lines.get(next) {
            if row.trim().is_empty() || !row.contains('|') {
                break;
            }
            table.push_row(row);
            next += 1;
        }

        if markdown_start < start {
            blocks.push(Block::Markdown(&source[markdown_start..start]));
        }
        blocks.push(Block::Table(table));
        markdown_start = lines.get(next).map_or(source.len(), |&(offset, _)| offset);
        index = next;
    }

    if markdown_start < source.len() {
        blocks.push(Block::Markdown(&source[markdown_start..]));
    }
    blocks
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnAlign {
    Left,
    Center,
    Right,
}

/// Columns are separated by this many display columns (" │ ").
const COLUMN_GAP: usize = 3;

struct Table {
    aligns: Vec<ColumnAlign>,
    header: Vec<Line<'static>>,
    rows: Vec<Vec<Line<'static>>>,
}

impl Table {
    fn start(header: &str, delimiter: &str) -> Option<Self> {
        if !header.contains('|') || !delimiter.contains('|') {
            return None;
        }
        let aligns = split_cells(delimiter)
            .iter()
            .map(|cell| parse_align(cell))
            .collect::<Option<Vec<_>>>()?;
        let header_cells = split_cells(header);
        if aligns.is_empty() || header_cells.len() != aligns.len() {
            return None;
        }
        Some(Self {
            header: header_cells.iter().map(|cell| cell_line(cell)).collect(),
            aligns,
            rows: Vec::new(),
        })
    }

    fn push_row(&mut self, row: &str) {
        let mut cells: Vec<Line<'static>> =
            split_cells(row).iter().map(|cell| cell_line(cell)).collect();
        cells.resize(self.aligns.len(), Line::default());
        self.rows.push(cells);
    }

    fn render(&self, width: u16) -> Vec<Line<'static>> {
        let widths = self.column_widths(usize::from(width));
        let separator = widths
            .iter()
            .map(|&w| "─".repeat(w))
            .collect::<Vec<_>>()
            .join("─┼─");

        let mut lines = Vec::with_capacity(self.rows.len() + 2);
        lines.push(self.row_line(&self.header, &widths, Modifier::BOLD));
        lines.push(Line::styled(separator, theme::dim()));
        for row in &self.rows {
            lines.push(self.row_line(row, &widths, Modifier::empty()));
        }
        lines
    }

    /// Natural column widths, shrunk widest-first to fit `available`
    /// (zero means unlimited).
    fn column_widths(&self, available: usize) -> Vec<usize> {
        let mut widths: Vec<usize> = (0..self.aligns.len())
            .map(|col| {
                std::iter::once(&self.header)
                    .chain(&self.rows)
                    .map(|row| row[col].width())
                    .max()
                    .unwrap_or(0)
                    .max(3)
            })
            .collect();
        if available == 0 {
            return widths;
        }

        let gaps = COLUMN_GAP * widths.len().saturating_sub(1);
        while widths.iter().sum::<usize>() + gaps > available {
            let Some(widest) = widths
                .iter_mut()
                .filter(|w| **w > 1)
                .max_by_key(|w| **w)
            else {
                break;
            };
            *widest -= 1;
        }
        widths
    }

    fn row_line(
        &self,
        cells: &[Line<'static>],
        widths: &[usize],
        modifier: Modifier,
    ) -> Line<'static> {
        let gap = || Span::styled(" │ ", theme::dim());
        let mut spans = Vec::new();
        for (col, (cell, &width)) in cells.iter().zip(widths).enumerate() {
            if col > 0 {
                spans.push(gap());
            }
            let content = fit_spans(cell, width);
            let used: usize = content.iter().map(Span::width).sum();
            let fill = width.saturating_sub(used);
            let (left, right) = match self.aligns[col] {
                ColumnAlign::Left => (0, fill),
                ColumnAlign::Center => (fill / 2, fill - fill / 2),
                ColumnAlign::Right => (fill, 0),
            };
            if left > 0 {
                spans.push(Span::raw(" ".repeat(left)));
            }
            spans.extend(
                content
                    .into_iter()
                    .map(|span| span.patch_style(Style::default().add_modifier(modifier))),
            );
            if right > 0 {
                spans.push(Span::raw(" ".repeat(right)));
            }
        }
        Line::from(spans)
    }
}

/// Cells of a table row. Outer pipes are optional and `\|` is a literal
/// pipe.
fn split_cells(row: &str) -> Vec<String> {
    let row = row.trim();
    let row = row.strip_prefix('|').unwrap_or(row);
    let row = if row.ends_with('|') && !row.ends_with("\\|") {
        &row[..row.len() - 1]
    } else {
        row
    };

    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut chars = row.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&'|') => {
                cell.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut cell).trim().to_string()),
            _ => cell.push(ch),
        }
    }
    cells.push(cell.trim().to_string());
    cells
}

fn parse_align(cell: &str) -> Option<ColumnAlign> {
    let left = cell.starts_with(':');
    let right = cell.ends_with(':');
    let dashes = cell.trim_start_matches(':').trim_end_matches(':');
    if dashes.is_empty() || !dashes.chars().all(|ch| ch == '-') {
        return None;
    }
    Some(match (left, right) {
        (true, true) => ColumnAlign::Center,
        (false, true) => ColumnAlign::Right,
        _ => ColumnAlign::Left,
    })
}

/// Inline markdown of one cell on a single line.
fn cell_line(cell: &str) -> Line<'static> {
    if !cell.contains(['*', '_', '`', '~', '[']) {
        return Line::raw(cell.to_string());
    }
    let text = md::from_str(cell);
    match text.lines.iter().find(|line| !is_blank(line)) {
        Some(line) => line_to_static(line),
        None => Line::raw(cell.to_string()),
    }
}

/// Spans of `line` cut to `width` columns, ending in `…` when cut.
fn fit_spans(line: &Line<'static>, width: usize) -> Vec<Span<'static>> {
    if line.width() <= width {
        return line.spans.clone();
    }
    let budget = width.saturating_sub(1);
    let mut used = 0;
    let mut spans = Vec::new();
    let mut last_style = Style::default();
    'outer: for span in &line.spans {
        let mut content = String::new();
        for grapheme in span.content.graphemes(true) {
            let grapheme_width = grapheme.width();
            if used + grapheme_width > budget {
                if !content.is_empty() {
                    spans.push(Span::styled(content, span.style));
                }
                last_style = span.style;
                break 'outer;
            }
            used += grapheme_width;
            content.push_str(grapheme);
        }
        last_style = span.style;
        spans.push(Span::styled(content, span.style));
    }
    if width > 0 {
        spans.push(Span::styled("…", last_style));
    }
    spans
}

/// Best-effort TeX to Unicode conversion for common notation: Greek letters,
/// operators, relations, fractions, roots and simple scripts. Unknown commands
/// are left as written.
pub fn latex_to_unicode(expr: &str) -> String {
    let chars: Vec<char> = expr.trim().chars().collect();
    let mut out = String::new();
    let mut pos = 0;
    while pos < chars.len() {
        convert_group(&chars, &mut pos, &mut out);
    }
    out
}

/// Convert until the end of input or the `}` closing the current group.
fn convert_group(chars: &[char], pos: &mut usize, out: &mut String) {
    while *pos < chars.len() {
        let ch = chars[*pos];
        *pos += 1;
        match ch {
            '}' => return,
            '{' => convert_group(chars, pos, out),
            '\\' => {
                let name = read_command(chars, pos);
                apply_command(&name, chars, pos, out);
            }
            '^' | '_' => {
                let argument = read_argument(chars, pos);
                out.push_str(&script(&argument, ch == '^'));
            }
            _ => out.push(ch),
        }
    }
}

fn read_command(chars: &[char], pos: &mut usize) -> String {
    let start = *pos;
    while *pos < chars.len() && chars[*pos].is_ascii_alphabetic() {
        *pos += 1;
    }
    if *pos == start && *pos < chars.len() {
        *pos += 1;
    }
    chars[start..*pos].iter().collect()
}

fn read_argument(chars: &[char], pos: &mut usize) -> String {
    while *pos < chars.len() && chars[*pos] == ' ' {
        *pos += 1;
    }
    let mut out = String::new();
    let Some(&ch) = chars.get(*pos) else {
        return out;
    };
    *pos += 1;
    match ch {
        '{' => convert_group(chars, pos, &mut out),
        '\\' => {
            let name = read_command(chars, pos);
            apply_command(&name, chars, pos, &mut out);
        }
        _ => out.push(ch),
    }
    out
}

fn apply_command(name: &str, chars: &[char], pos: &mut usize, out: &mut String) {
    match name {
        "frac" | "dfrac" | "tfrac" => {
            let numerator = read_argument(chars, pos);
            let denominator = read_argument(chars, pos);
            out.push_str(&parenthesize(&numerator));
            out.push('/');
            out.push_str(&parenthesize(&denominator));
        }
        "sqrt" => {
            let radicand = read_argument(chars, pos);
            out.push('√');
            out.push_str(&parenthesize(&radicand));
        }
        "text" | "textrm" | "mathrm" | "mathbf" | "mathit" | "operatorname" => {
            out.push_str(&read_argument(chars, pos));
        }
        "left" | "right" | "displaystyle" | "big" | "Big" => {}
        "," | ";" | ":" | " " | "quad" | "qquad" => out.push(' '),
        "\\" => out.push('\n'),
        "{" | "}" | "$" | "%" | "&" | "#" | "_" => out.push_str(name),
        _ => match symbol(name) {
            Some(symbol) => out.push_str(symbol),
            None => {
                out.push('\\');
                out.push_str(name);
            }
        },
    }
}

fn parenthesize(part: &str) -> String {
    if part.chars().count() > 1 {
        format!("({part})")
    } else {
        part.to_string()
    }
}

fn script(argument: &str, superscript: bool) -> String {
    let mapped: Option<String> = argument
        .chars()
        .map(|ch| {
            if superscript {
                superscript_char(ch)
            } else {
                subscript_char(ch)
            }
        })
        .collect();
    match mapped {
        Some(mapped) if !mapped.is_empty() => mapped,
        _ => {
            let marker = if superscript { '^' } else { '_' };
            format!("{marker}{}", parenthesize(argument))
        }
    }
}

fn superscript_char(ch: char) -> Option<char> {
    Some(match ch {
        '0' => '⁰',
        '1' => '¹',
        '2' => '²',
        '3' => '³',
        '4' => '⁴',
        '5' => '⁵',
        '6' => '⁶',
        '7' => '⁷',
        '8' => '⁸',
        '9' => '⁹',
        '+' => '⁺',
        '-' => '⁻',
        '=' => '⁼',
        '(' => '⁽',
        ')' => '⁾',
        'n' => 'ⁿ',
        'i' => 'ⁱ',
        _ => return None,
    })
}

fn subscript_char(ch: char) -> Option<char> {
    Some(match ch {
        '0' => '₀',
        '1' => '₁',
        '2' => '₂',
        '3' => '₃',
        '4' => '₄',
        '5' => '₅',
        '6' => '₆',
        '7' => '₇',
        '8' => '₈',
        '9' => '₉',
        '+' => '₊',
        '-' => '₋',
        '=' => '₌',
        '(' => '₍',
        ')' => '₎',
        'a' => 'ₐ',
        'e' => 'ₑ',
        'o' => 'ₒ',
        'x' => 'ₓ',
        'i' => 'ᵢ',
        'j' => 'ⱼ',
        'k' => 'ₖ',
        'n' => 'ₙ',
        _ => return None,
    })
}

fn symbol(name: &str) -> Option<&'static str> {
    Some(match name {
        "alpha" => "α",
        "beta" => "β",
        "gamma" => "γ",
        "delta" => "δ",
        "epsilon" | "varepsilon" => "ε",
        "zeta" => "ζ",
        "eta" => "η",
        "theta" => "θ",
        "kappa" => "κ",
        "lambda" => "λ",
        "mu" => "μ",
        "nu" => "ν",
        "xi" => "ξ",
        "pi" => "π",
        "rho" => "ρ",
        "sigma" => "σ",
        "tau" => "τ",
        "phi" | "varphi" => "φ",
        "chi" => "χ",
        "psi" => "ψ",
        "omega" => "ω",
        "Gamma" => "Γ",
        "Delta" => "Δ",
        "Theta" => "Θ",
        "Lambda" => "Λ",
        "Pi" => "Π",
        "Sigma" => "Σ",
        "Phi" => "Φ",
        "Psi" => "Ψ",
        "Omega" => "Ω",
        "times" => "×",
        "cdot" => "·",
        "div" => "÷",
        "pm" => "±",
        "mp" => "∓",
        "leq" | "le" => "≤",
        "geq" | "ge" => "≥",
        "neq" | "ne" => "≠",
        "approx" => "≈",
        "equiv" => "≡",
        "sim" => "∼",
        "propto" => "∝",
        "infty" => "∞",
        "sum" => "∑",
        "prod" => "∏",
        "int" => "∫",
        "oint" => "∮",
        "partial" => "∂",
        "nabla" => "∇",
        "to" | "rightarrow" => "→",
        "leftarrow" => "←",
        "Rightarrow" | "implies" => "⇒",
        "Leftarrow" => "⇐",
        "leftrightarrow" => "↔",
        "Leftrightarrow" | "iff" => "⇔",
        "in" => "∈",
        "notin" => "∉",
        "subset" => "⊂",
        "subseteq" => "⊆",
        "cup" => "∪",
        "cap" => "∩",
        "emptyset" => "∅",
        "forall" => "∀",
        "exists" => "∃",
        "neg" => "¬",
        "land" | "wedge" => "∧",
        "lor" | "vee" => "∨",
        "ldots" | "dots" => "…",
        "cdots" => "⋯",
        "circ" => "∘",
        "degree" => "°",
        "langle" => "⟨",
        "rangle" => "⟩",
        _ => return None,
    })
}
