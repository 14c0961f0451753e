use crate::table::{Align, Column, SelectionSource};
use crate::ui::app::{App, FocusPanel};
use crate::upload::UploadPhase;
use crate::viewer::ViewerState;
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Gauge, List, ListItem, Paragraph, Row, Table, TableState},
    Frame,
};

// Brand colors
const BRAND_DARK: Color = Color::Rgb(0x1F, 0x2F, 0x3C); // #1f2f3c
const BRAND_ACCENT: Color = Color::Rgb(0x58, 0x6B, 0x71); // #586b71
const BRAND_SELECT_BG: Color = Color::Rgb(0xC3, 0xD3, 0xE0); // #c3d3e0
const BRAND_GREEN: Color = Color::Rgb(0x82, 0x9A, 0x68); // #829a68
const BRAND_ORANGE: Color = Color::Rgb(0x9E, 0x68, 0x3C); // #9e683c
const BRAND_MUTED: Color = Color::Rgb(0x71, 0x65, 0x65); // #716565

// Styles
const HEADER_STYLE: Style = Style::new().fg(BRAND_DARK).add_modifier(Modifier::BOLD);
const SELECTED_STYLE: Style = Style::new()
    .bg(BRAND_SELECT_BG)
    .fg(BRAND_DARK)
    .add_modifier(Modifier::BOLD);
const COUNT_COLOR: Color = BRAND_GREEN;

/// Highlighted items listed in the viewer panel.
const MAX_LISTED_ITEMS: usize = 5;

pub fn draw_dashboard(frame: &mut Frame, app: &App) {
    let chunks = Layout::vertical([
        Constraint::Length(3), // Header
        Constraint::Min(10),   // Main content
        Constraint::Length(3), // Footer
    ])
    .split(frame.area());

    draw_header(frame, chunks[0], app);
    draw_main_content(frame, chunks[1], app);
    draw_footer(frame, chunks[2], app);

    if app.upload.is_open() {
        draw_upload_modal(frame, frame.area(), app);
    }
}

fn draw_header(frame: &mut Frame, area: Rect, app: &App) {
    let model_name = app
        .active_descriptor()
        .map_or("no model", |m| m.name.as_str());
    let title = format!(
        " IFC Quantity Viewer | {} | {} rows | {} selected ",
        model_name,
        app.table.rows().len(),
        app.selection_ids().len()
    );

    let header = Paragraph::new(title)
        .style(HEADER_STYLE)
        .block(Block::default().borders(Borders::ALL));

    frame.render_widget(header, area);
}

fn draw_main_content(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::horizontal([
        Constraint::Percentage(22), // Models
        Constraint::Percentage(78), // Viewer + table
    ])
    .split(area);

    draw_models(frame, chunks[0], app);

    let right = Layout::vertical([
        Constraint::Length(9), // Viewer
        Constraint::Min(6),    // Quantities
    ])
    .split(chunks[1]);

    draw_viewer(frame, right[0], app);
    draw_quantities(frame, right[1], app);
}

fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(BRAND_ORANGE)
    } else {
        Style::default()
    }
}

fn draw_models(frame: &mut Frame, area: Rect, app: &App) {
    let is_focused = app.focus_panel == FocusPanel::Models;
    let models = app.store.models();

    let items: Vec<ListItem> = if app.store.is_loading() {
        vec![ListItem::new(Span::styled(
            "Loading models...",
            Style::default().fg(BRAND_MUTED),
        ))]
    } else {
        models
            .iter()
            .enumerate()
            .map(|(i, model)| {
                let is_cursor = i == app.selected_model;
                let is_active = app.active_model.as_deref() == Some(model.id.as_str());
                let style = if is_cursor && is_focused {
                    SELECTED_STYLE
                } else if is_active {
                    Style::default().add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                let marker = if is_active { " ◄" } else { "" };

                ListItem::new(vec![
                    Line::from(vec![
                        Span::styled(&model.name, style),
                        Span::styled(marker, Style::default().fg(BRAND_ORANGE)),
                    ]),
                    Line::from(Span::styled(
                        format!("  {} elements", model.element_count),
                        Style::default().fg(COUNT_COLOR),
                    )),
                ])
            })
            .collect()
    };

    let mut title = format!(" Models | {} available ", models.len());
    if app.store.can_add() {
        title.push_str("| u Upload ");
    }
    let list = List::new(items).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(border_style(is_focused)),
    );

    frame.render_widget(list, area);
}

fn draw_viewer(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default().title(" Viewer ").borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    match app.viewer.state() {
        ViewerState::LoadingModel { .. } => {
            let gauge = Gauge::default()
                .gauge_style(Style::default().fg(BRAND_ACCENT))
                .label(format!("Loading model {:.0}%", app.viewer.progress() * 100.0))
                .ratio(f64::from(app.viewer.progress()).clamp(0.0, 1.0));
            let rows = Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).split(inner);
            frame.render_widget(gauge, rows[0]);
        }
        ViewerState::ModelLoaded { .. } => {
            frame.render_widget(Paragraph::new(loaded_lines(app)), inner);
        }
        ViewerState::Disposed => {}
        ViewerState::Uninitialized | ViewerState::Initializing | ViewerState::Ready => {
            let message = if app.viewer.is_initialized() {
                "No model loaded"
            } else {
                "Viewer not initialized"
            };
            frame.render_widget(
                Paragraph::new(message).style(Style::default().fg(BRAND_MUTED)),
                inner,
            );
        }
    }
}

fn loaded_lines(app: &App) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    if let Some((key, schema, items)) = app.viewer.loaded_model() {
        let grid = app
            .viewer
            .grid_y()
            .map(|y| format!(" | grid {y:.1} m"))
            .unwrap_or_default();
        lines.push(Line::from(vec![
            Span::styled(key.to_string(), HEADER_STYLE),
            Span::styled(format!(" {schema} | {items} items{grid}"), Style::default().fg(BRAND_MUTED)),
        ]));
    }
    if let Some(camera) = app.viewer.camera() {
        let [px, py, pz] = camera.position;
        let [tx, ty, tz] = camera.target;
        lines.push(Line::from(Span::styled(
            format!("camera ({px}, {py}, {pz}) -> ({tx}, {ty}, {tz})"),
            Style::default().fg(BRAND_MUTED),
        )));
    }

    let highlighted = app.viewer.highlighted_items();
    lines.push(Line::from(Span::styled(
        format!("{} highlighted", highlighted.len()),
        Style::default().fg(COUNT_COLOR),
    )));

    for item in highlighted.iter().take(MAX_LISTED_ITEMS) {
        let storey = item.storey.as_deref().unwrap_or("-");
        lines.push(Line::from(vec![
            Span::styled(format!("#{:<7}", item.express_id), Style::default().fg(BRAND_ORANGE)),
            Span::raw(format!(
                "{} {}",
                item.entity_type,
                item.name.as_deref().unwrap_or("")
            )),
            Span::styled(format!("  {storey}"), Style::default().fg(BRAND_MUTED)),
        ]));
    }
    if highlighted.len() > MAX_LISTED_ITEMS {
        lines.push(Line::from(Span::styled(
            format!("... and {} more", highlighted.len() - MAX_LISTED_ITEMS),
            Style::default().fg(BRAND_MUTED),
        )));
    }
    lines
}

fn aligned(text: String, align: Align) -> Cell<'static> {
    let line = Line::from(text);
    Cell::from(match align {
        Align::Left => line,
        Align::Center => line.alignment(Alignment::Center),
    })
}

fn draw_quantities(frame: &mut Frame, area: Rect, app: &App) {
    let is_focused = app.focus_panel == FocusPanel::Table;
    let columns = app.table.columns();
    let selected_level = app.selection.selected_level();
    let cursor_level = app.cursor_level();

    let header_cells = columns.iter().enumerate().map(|(i, column)| {
        let mut label = column.header().to_string();
        if let Some(sort) = app.sort.filter(|s| s.column == i) {
            label.push_str(if sort.descending { " ▼" } else { " ▲" });
        }
        let level = column.level();
        if level.is_some() && level == selected_level {
            label = format!("● {label}");
        }
        let style = if level.is_some() && level == selected_level {
            SELECTED_STYLE
        } else if is_focused && level.is_some() && level == cursor_level {
            HEADER_STYLE.fg(BRAND_ORANGE)
        } else {
            HEADER_STYLE
        };
        aligned(label, column.align()).style(style)
    });
    let header = Row::new(header_cells).height(1);

    let selected_row = match app.selection.source() {
        SelectionSource::Row(index) => Some(*index),
        _ => None,
    };

    let display = app.display_rows();
    let mut rows: Vec<Row> = display
        .iter()
        .filter_map(|&index| app.table.row(index).map(|row| (index, row)))
        .map(|(index, row)| {
            let cells = columns.iter().map(|column| {
                let cell = aligned(column.cell(row), column.align());
                match column.level() {
                    Some(level) if Some(level) == selected_level && row.levels.count(level) > 0 => {
                        cell.style(Style::default().fg(COUNT_COLOR).add_modifier(Modifier::BOLD))
                    }
                    _ => cell,
                }
            });
            let style = if selected_row == Some(index) {
                SELECTED_STYLE
            } else {
                Style::default()
            };
            Row::new(cells).style(style)
        })
        .collect();

    if !app.table.is_empty() {
        let summary = app.table.summary();
        let cells = columns
            .iter()
            .map(|column| aligned(summary.cell(column), column.align()));
        rows.push(Row::new(cells).style(HEADER_STYLE.fg(BRAND_ACCENT)));
    }

    let widths: Vec<Constraint> = columns.iter().map(|c| Constraint::Length(c.width())).collect();

    let title = if app.table_loading {
        " Quantities (loading...) ".to_string()
    } else if app.table.is_empty() {
        " Quantities (no data) ".to_string()
    } else {
        format!(" Quantities ({} types, {} levels) ", app.table.rows().len(), app.table.levels().len())
    };

    let table = Table::new(rows, widths)
        .header(header)
        .row_highlight_style(if is_focused {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        })
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(border_style(is_focused)),
        );

    let mut state = TableState::default().with_selected(Some(app.selected_row));
    frame.render_stateful_widget(table, area, &mut state);
}

fn draw_footer(frame: &mut Frame, area: Rect, app: &App) {
    let help = match app.focus_panel {
        FocusPanel::Models => " Tab Table | ↑↓ Model | Enter Open | u Upload | q Quit ",
        FocusPanel::Table => {
            " Tab Models | ↑↓ Row | Enter Select row | ←→ Level | Space Select level | s Sort | r Reverse | Esc Clear | q Quit "
        }
    };

    let mut spans = vec![Span::styled(help, Style::default().fg(BRAND_MUTED))];
    if let Some(status) = &app.status {
        spans.push(Span::styled(format!(" {status} "), Style::default().fg(BRAND_ORANGE)));
    }

    let footer = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    frame.render_widget(footer, area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn draw_upload_modal(frame: &mut Frame, area: Rect, app: &App) {
    let area = centered(area, 64, 9);
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(" Upload IFC model ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BRAND_ORANGE));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::vertical([
        Constraint::Length(1), // Path
        Constraint::Length(1), // Count
        Constraint::Length(1),
        Constraint::Length(1), // Progress
        Constraint::Length(1), // Message
        Constraint::Min(0),
        Constraint::Length(1), // Help
    ])
    .split(inner);

    let cursor = if app.upload.is_uploading() { "" } else { "_" };
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("File: ", HEADER_STYLE),
            Span::raw(format!("{}{cursor}", app.upload.input())),
        ])),
        rows[0],
    );
    frame.render_widget(
        Paragraph::new(format!(
            "{}/{} models",
            app.store.models().len(),
            app.store.cap()
        ))
        .style(Style::default().fg(COUNT_COLOR)),
        rows[1],
    );

    let message = match app.upload.phase() {
        UploadPhase::Idle => None,
        UploadPhase::Uploading => Some(Span::styled("Uploading...", Style::default().fg(BRAND_MUTED))),
        UploadPhase::Completed { descriptor, .. } => Some(Span::styled(
            format!("Uploaded {}", descriptor.name),
            Style::default().fg(COUNT_COLOR),
        )),
        UploadPhase::Failed(error) => Some(Span::styled(error.clone(), Style::default().fg(BRAND_ORANGE))),
    };

    if matches!(
        app.upload.phase(),
        UploadPhase::Uploading | UploadPhase::Completed { .. }
    ) {
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(BRAND_ACCENT))
            .percent(app.upload.progress().min(100));
        frame.render_widget(gauge, rows[3]);
    }
    if let Some(message) = message {
        frame.render_widget(Paragraph::new(Line::from(message)), rows[4]);
    }

    frame.render_widget(
        Paragraph::new(" Enter Upload | Esc Close ").style(Style::default().fg(BRAND_MUTED)),
        rows[6],
    );
}
