use crate::dashboard::{Dashboard, Metric};
use crate::gui::error::MonitorError;
use crate::ingest::Event;
use crate::series_window::SeriesWindow;

use crossterm::{
    event::{self, Event as TermEvent, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{block::Title, *},
    Terminal,
};
use std::{
    io::{stdout, Stdout},
    sync::mpsc::Receiver,
    time::{Duration, Instant},
};

const COLORS: [Color; 4] = [Color::Cyan, Color::Yellow, Color::Green, Color::Magenta];

/// Takes over the terminal and draws `dashboard` until the user presses `q`.
/// Events waiting on `rx` are applied once per tick. The dashboard is handed
/// back so the caller can report on it.
pub fn run_live_view(
    mut dashboard: Dashboard,
    rx: Receiver<Event>,
    source: &str,
    tick_rate: Duration,
) -> Result<Dashboard, MonitorError> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;

    let res = live_loop(&mut terminal, &mut dashboard, &rx, source, tick_rate);

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res.map(|_| dashboard)
}

fn live_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    dashboard: &mut Dashboard,
    rx: &Receiver<Event>,
    source: &str,
    tick_rate: Duration,
) -> Result<(), MonitorError> {
    let mut last_tick = Instant::now();
    loop {
        terminal.draw(|f| draw_dashboard(f, dashboard, source))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let TermEvent::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && key.code == KeyCode::Char('q') {
                    return Ok(());
                }
            }
        }
        if last_tick.elapsed() >= tick_rate {
            dashboard.drain(rx);
            last_tick = Instant::now();
        }
    }
}

/// Lays the dashboard out as two rows of three panes: the gas charts on the
/// left, sound directions and status on the right.
pub fn draw_dashboard(f: &mut Frame, dashboard: &Dashboard, source: &str) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(f.size());
    let columns = |area: Rect| {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
            ])
            .split(area)
    };
    let top = columns(rows[0]);
    let bottom = columns(rows[1]);

    let panes = [top[0], top[1], bottom[0], bottom[1]];
    for (i, metric) in Metric::ALL.into_iter().enumerate() {
        draw_series(f, panes[i], metric, dashboard.series(metric), COLORS[i]);
    }
    draw_directions(f, top[2], dashboard);
    draw_status(f, bottom[2], dashboard, source);
}

fn axis_labels(lo: f64, hi: f64) -> Vec<Span<'static>> {
    let mid = (lo + hi) / 2.0;
    [lo, mid, hi]
        .iter()
        .map(|v| Span::from(format!("{:.1}", v)))
        .collect()
}

fn draw_series(f: &mut Frame, area: Rect, metric: Metric, series: &SeriesWindow, color: Color) {
    let data: Vec<(f64, f64)> = series.visible_points().map(|p| (p.x, p.y)).collect();
    let (x_lo, x_hi) = series.visible_x_range();
    let (y_lo, y_hi) = series.visible_y_range();

    let title = match series.latest() {
        Some(p) => format!(" {} {:.1} {} ", metric.name(), p.y, metric.unit()),
        None => format!(" {} ", metric.name()),
    };

    let chart = Chart::new(vec![Dataset::default()
        .name(metric.name())
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(color))
        .data(&data)])
    .block(
        Block::default()
            .title(Title::from(Span::from(title).bold()))
            .borders(Borders::ALL),
    )
    .x_axis(
        Axis::default()
            .title("Time (s)")
            .style(Style::default().fg(Color::Gray))
            .bounds([x_lo, x_hi])
            .labels(axis_labels(x_lo, x_hi)),
    )
    .y_axis(
        Axis::default()
            .title(format!("{} ({})", metric.name(), metric.unit()))
            .style(Style::default().fg(Color::Gray))
            .bounds([y_lo, y_hi])
            .labels(axis_labels(y_lo, y_hi)),
    );

    f.render_widget(chart, area);
}

fn draw_directions(f: &mut Frame, area: Rect, dashboard: &Dashboard) {
    let points: Vec<(f64, f64)> = dashboard
        .directions()
        .iter()
        .map(|p| p.to_cartesian())
        .collect();
    // A faint unit circle so the sources have something to sit on.
    let ring: Vec<(f64, f64)> = (0..64)
        .map(|i| {
            let a = i as f64 / 64.0 * std::f64::consts::TAU;
            (a.cos(), a.sin())
        })
        .collect();

    let chart = Chart::new(vec![
        Dataset::default()
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::DarkGray))
            .data(&ring),
        Dataset::default()
            .name("Sound Directions")
            .marker(symbols::Marker::Block)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::Red))
            .data(&points),
    ])
    .block(
        Block::default()
            .title(Title::from(" Sound Directions ".bold()))
            .borders(Borders::ALL),
    )
    .x_axis(Axis::default().bounds([-1.0, 1.0]))
    .y_axis(Axis::default().bounds([-1.0, 1.0]));

    f.render_widget(chart, area);
}

fn draw_status(f: &mut Frame, area: Rect, dashboard: &Dashboard, source: &str) {
    let state = match dashboard.shutdown() {
        Some(reason) => Line::from(vec![
            " Stopped: ".into(),
            Span::from(reason.to_string()).red().bold(),
        ]),
        None => Line::from(vec![" Receiving ".into(), "live".green().bold()]),
    };
    let text = vec![
        state,
        Line::from(format!(" Source: {}", source)),
        Line::from(format!(" Readings: {}", dashboard.readings())),
        Line::from(format!(" Track batches: {}", dashboard.track_batches())),
        Line::from(format!(" Dropped frames: {}", dashboard.dropped())),
        Line::from(format!(
            " Dynamic sources: {}",
            dashboard.directions().len()
        )),
    ];
    let instructions = Title::from(Line::from(vec![" Quit ".into(), "<Q> ".magenta().bold()]));
    let block = Block::default()
        .title(Title::from(" Monitor ".magenta().bold()).alignment(Alignment::Center))
        .title(
            instructions
                .alignment(Alignment::Center)
                .position(block::Position::Bottom),
        )
        .borders(Borders::ALL);

    f.render_widget(Paragraph::new(text).block(block), area);
}
