//! TUI rendering logic using ratatui.
//!
//! Handles the layout of the run screen and the chart screen, number
//! formatting and color coding.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, Gauge, GraphType, Paragraph},
    Frame,
};

use super::state::{ErrorInfo, Outcome, Screen, TuiState};
use crate::history::{Aggregates, Measurement};

/// Get color for speed value based on thresholds.
///
/// - Green: >= 100 Mbps (fast)
/// - Yellow: 25-100 Mbps (moderate)
/// - Red: < 25 Mbps (slow)
pub fn speed_color(speed_mbps: f64) -> Color {
    if speed_mbps >= 100.0 {
        Color::Green
    } else if speed_mbps >= 25.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

/// Format speed value with 2 decimal places.
pub fn format_speed(speed_mbps: f64) -> String {
    format!("{:.2} Mbps", speed_mbps)
}

/// Format latency value with 2 decimal places.
pub fn format_latency(latency_ms: f64) -> String {
    format!("{:.2} ms", latency_ms)
}

/// Minimal mode threshold in columns.
const MINIMAL_MODE_THRESHOLD: u16 = 60;

const DOWNLOAD_COLOR: Color = Color::Cyan;
const UPLOAD_COLOR: Color = Color::Magenta;
const PING_COLOR: Color = Color::Yellow;

/// Check if minimal mode should be used based on terminal width.
pub fn is_minimal_mode(width: u16) -> bool {
    width < MINIMAL_MODE_THRESHOLD
}

/// Render the TUI to the terminal.
pub fn render_frame(frame: &mut Frame, state: &TuiState) {
    if is_minimal_mode(frame.area().width) {
        render_minimal_frame(frame, state);
        return;
    }

    match state.screen {
        Screen::Run => render_run_screen(frame, state),
        Screen::Chart => render_chart_screen(frame, state),
    }
}

fn render_run_screen(frame: &mut Frame, state: &TuiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Gauge
            Constraint::Length(4), // Server
            Constraint::Length(5), // Results
            Constraint::Length(3), // Averages
            Constraint::Min(8),    // Chart
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_gauge(frame, chunks[0], state);
    render_server(frame, chunks[1], state);
    render_results(frame, chunks[2], state);
    render_averages(frame, chunks[3], state.history.aggregates);
    render_history_chart(frame, chunks[4], &state.history.measurements);
    render_status_bar(frame, chunks[5], state);
}

fn render_chart_screen(frame: &mut Frame, state: &TuiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(8),    // Chart
            Constraint::Length(3), // Averages
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_history_chart(frame, chunks[0], &state.history.measurements);
    render_averages(frame, chunks[1], state.history.aggregates);
    render_status_bar(frame, chunks[2], state);
}

/// Render the minimal mode layout for narrow terminals.
pub fn render_minimal_frame(frame: &mut Frame, state: &TuiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Stage
            Constraint::Length(1), // Server
            Constraint::Length(2), // Result
            Constraint::Min(1),    // Averages
        ])
        .split(frame.area());

    let stage = format!("{:>3}% {}", state.run.percent, state.run.status_label());
    frame.render_widget(
        Paragraph::new(stage).style(Style::default().fg(Color::Yellow)),
        chunks[0],
    );

    if let Some(ref server) = state.run.server {
        frame.render_widget(
            Paragraph::new(server.label()).style(Style::default().fg(Color::Cyan)),
            chunks[1],
        );
    }

    let result = match state.run.outcome {
        Some(Outcome::Completed(ref result)) => Line::from(vec![
            Span::styled(
                format!("↓{:.1} ", result.download_mbps),
                Style::default().fg(speed_color(result.download_mbps)),
            ),
            Span::styled(
                format!("↑{:.1} ", result.upload_mbps),
                Style::default().fg(speed_color(result.upload_mbps)),
            ),
            Span::raw(format!("{:.0}ms", result.ping_ms)),
        ]),
        Some(Outcome::Failed(ref error)) => Line::from(Span::styled(
            error.message.clone(),
            Style::default().fg(Color::Red),
        )),
        _ => Line::default(),
    };
    frame.render_widget(Paragraph::new(result), chunks[2]);

    if let Some(aggregates) = state.history.aggregates {
        let text = format!(
            "avg ↓{:.1} ↑{:.1} {:.0}ms ({})",
            aggregates.download_mbps,
            aggregates.upload_mbps,
            aggregates.ping_ms,
            aggregates.count
        );
        frame.render_widget(
            Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
            chunks[3],
        );
    }
}

/// Render the stage gauge.
pub fn render_gauge(frame: &mut Frame, area: Rect, state: &TuiState) {
    let color = match state.run.outcome {
        Some(Outcome::Completed(_)) => Color::Green,
        Some(Outcome::Failed(_)) => Color::Red,
        Some(Outcome::Aborted) => Color::DarkGray,
        None => Color::Cyan,
    };

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::BOTTOM))
        .gauge_style(Style::default().fg(color))
        .percent(state.run.percent.min(100))
        .label(format!("{}% {}", state.run.percent, state.run.status_label()));

    frame.render_widget(gauge, area);
}

/// Render the server announced for the run.
pub fn render_server(frame: &mut Frame, area: Rect, state: &TuiState) {
    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let label_style = Style::default().fg(Color::White).add_modifier(Modifier::BOLD);
    let value_style = Style::default().fg(Color::Cyan);

    let lines = match state.run.server {
        Some(ref server) => vec![
            Line::from(vec![
                Span::styled("Server: ", label_style),
                Span::styled(
                    format!("{} [{}] {}", server.label(), server.id, server.country),
                    value_style,
                ),
            ]),
            Line::from(vec![
                Span::styled("Distance: ", label_style),
                Span::styled(format!("{:.1} km", server.distance_km), value_style),
                Span::styled("  Latency: ", label_style),
                Span::styled(format_latency(server.latency_ms), value_style),
            ]),
        ],
        None => vec![Line::from(Span::styled(
            "Server: waiting for selection",
            Style::default().fg(Color::DarkGray),
        ))],
    };

    frame.render_widget(Paragraph::new(lines), inner);
}

/// Render the figures of the last run, or why there are none.
pub fn render_results(frame: &mut Frame, area: Rect, state: &TuiState) {
    match state.run.outcome {
        Some(Outcome::Completed(ref result)) => {
            let label_style =
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD);

            let lines = vec![
                Line::from(vec![
                    Span::styled("Download: ", label_style),
                    Span::styled(
                        format_speed(result.download_mbps),
                        Style::default().fg(speed_color(result.download_mbps)),
                    ),
                ]),
                Line::from(vec![
                    Span::styled("Upload:   ", label_style),
                    Span::styled(
                        format_speed(result.upload_mbps),
                        Style::default().fg(speed_color(result.upload_mbps)),
                    ),
                ]),
                Line::from(vec![
                    Span::styled("Ping:     ", label_style),
                    Span::styled(
                        format_latency(result.ping_ms),
                        Style::default().fg(Color::White),
                    ),
                ]),
            ];

            frame.render_widget(
                Paragraph::new(lines).block(Block::default().borders(Borders::BOTTOM)),
                area,
            );
        }
        Some(Outcome::Failed(ref error)) => render_error(frame, area, error),
        Some(Outcome::Aborted) => {
            frame.render_widget(
                Paragraph::new("Test stopped before a result was delivered.")
                    .style(Style::default().fg(Color::DarkGray)),
                area,
            );
        }
        None => {}
    }
}

/// Render the averages line.
pub fn render_averages(frame: &mut Frame, area: Rect, aggregates: Option<Aggregates>) {
    let block = Block::default()
        .borders(Borders::TOP | Borders::BOTTOM)
        .border_style(Style::default().fg(Color::DarkGray));

    let line = match aggregates {
        Some(aggregates) => Line::from(vec![
            Span::styled(
                format!("Averages over {} tests: ", aggregates.count),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("↓ {}  ", format_speed(aggregates.download_mbps)),
                Style::default().fg(DOWNLOAD_COLOR),
            ),
            Span::styled(
                format!("↑ {}  ", format_speed(aggregates.upload_mbps)),
                Style::default().fg(UPLOAD_COLOR),
            ),
            Span::styled(
                format!("ping {}", format_latency(aggregates.ping_ms)),
                Style::default().fg(PING_COLOR),
            ),
        ]),
        None => Line::from(Span::styled(
            "No tests recorded yet",
            Style::default().fg(Color::DarkGray),
        )),
    };

    frame.render_widget(Paragraph::new(line).block(block), area);
}

/// Seconds between the oldest entry and `measurement`.
fn elapsed_secs(measurements: &[Measurement], measurement: &Measurement) -> f64 {
    match measurements.first() {
        Some(first) => (measurement.timestamp - first.timestamp).num_seconds() as f64,
        None => 0.0,
    }
}

/// Points of one series, x being the seconds elapsed since the oldest
/// entry so uneven gaps between tests stay visible.
fn series(
    measurements: &[Measurement],
    pick: fn(&Measurement) -> f64,
) -> Vec<(f64, f64)> {
    measurements
        .iter()
        .map(|measurement| (elapsed_secs(measurements, measurement), pick(measurement)))
        .collect()
}

/// Time labels for the x axis: oldest, midpoint and newest.
fn x_labels(measurements: &[Measurement]) -> Vec<Span<'static>> {
    const LABEL_FORMAT: &str = "%d/%m %H:%M";

    let (Some(first), Some(newest)) = (measurements.first(), measurements.last()) else {
        return Vec::new();
    };

    if newest.timestamp <= first.timestamp {
        return vec![Span::raw(first.timestamp.format(LABEL_FORMAT).to_string())];
    }

    let middle = first.timestamp + (newest.timestamp - first.timestamp) / 2;

    [first.timestamp, middle, newest.timestamp]
        .iter()
        .map(|timestamp| Span::raw(timestamp.format(LABEL_FORMAT).to_string()))
        .collect()
}

/// Upper bound of the y axis, leaving some headroom above the highest
/// point.
fn y_bound(measurements: &[Measurement]) -> f64 {
    let highest = measurements
        .iter()
        .flat_map(|m| [m.download, m.upload, m.ping])
        .fold(0.0, f64::max);

    if highest > 0.0 {
        highest * 1.1
    } else {
        1.0
    }
}

/// Render the history as a line chart: download, upload and ping.
pub fn render_history_chart(frame: &mut Frame, area: Rect, measurements: &[Measurement]) {
    let block = Block::default()
        .title(" History ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    if measurements.is_empty() {
        frame.render_widget(
            Paragraph::new("Run a test to start the history.")
                .style(Style::default().fg(Color::DarkGray))
                .block(block),
            area,
        );
        return;
    }

    let download = series(measurements, |m| m.download);
    let upload = series(measurements, |m| m.upload);
    let ping = series(measurements, |m| m.ping);

    let datasets = vec![
        Dataset::default()
            .name("Download (Mbps)")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(DOWNLOAD_COLOR))
            .data(&download),
        Dataset::default()
            .name("Upload (Mbps)")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(UPLOAD_COLOR))
            .data(&upload),
        Dataset::default()
            .name("Ping (ms)")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(PING_COLOR))
            .data(&ping),
    ];

    let span = download.iter().map(|&(x, _)| x).fold(0.0, f64::max);

    let top = y_bound(measurements);
    let y_labels = vec![
        Span::raw("0"),
        Span::raw(format!("{:.0}", top / 2.0)),
        Span::raw(format!("{:.0}", top)),
    ];

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([0.0, span.max(1.0)])
                .labels(x_labels(measurements)),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([0.0, top])
                .labels(y_labels),
        );

    frame.render_widget(chart, area);
}

/// Render the status bar at the bottom.
pub fn render_status_bar(frame: &mut Frame, area: Rect, state: &TuiState) {
    let hints = match (state.screen, state.run.is_finished() || state.run.stage.is_none()) {
        (Screen::Chart, _) => "q quit",
        (Screen::Run, true) => "r run again · e export · q quit",
        (Screen::Run, false) if state.run.stopping => "q force stop",
        (Screen::Run, false) => "q stop",
    };

    let line = match state.notice {
        Some(ref notice) => Line::from(vec![
            Span::styled(format!("{}  ", notice), Style::default().fg(Color::Yellow)),
            Span::styled(hints, Style::default().fg(Color::DarkGray)),
        ]),
        None => Line::from(Span::styled(hints, Style::default().fg(Color::DarkGray))),
    };

    frame.render_widget(Paragraph::new(line), area);
}

fn render_error(frame: &mut Frame, area: Rect, error: &ErrorInfo) {
    let mut lines = vec![Line::from(Span::styled(
        format!("Error: {}", error.message),
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    ))];

    if let Some(ref suggestion) = error.suggestion {
        lines.push(Line::from(Span::styled(
            format!("Suggestion: {}", suggestion),
            Style::default().fg(Color::Yellow),
        )));
    }

    frame.render_widget(Paragraph::new(lines), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::record::testing::{at, pending};
    use crate::provider::testing::server;
    use crate::runner::{RunEvent, RunFailure, RunResult, SessionUpdate, Stage};
    use proptest::prelude::*;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn render_to_string(state: &TuiState, width: u16, height: u16) -> String {
        let backend = TestBackend::new(width, height);
        let mut terminal = Terminal::new(backend).unwrap();

        terminal.draw(|frame| render_frame(frame, state)).unwrap();

        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer.cell((x, y)).unwrap().symbol());
            }
            text.push('\n');
        }
        text
    }

    fn history(count: usize) -> Vec<Measurement> {
        (0..count)
            .map(|i| {
                let mut entry = pending(10.0 * (i + 1) as f64, 2.0, 15.0);
                entry.timestamp = at(i as u32);
                entry.into_measurement(i as u64 + 1)
            })
            .collect()
    }

    #[test]
    fn test_format_speed_and_latency() {
        assert_eq!(format_speed(93.457), "93.46 Mbps");
        assert_eq!(format_latency(7.0), "7.00 ms");
    }

    #[test]
    fn test_minimal_mode_boundary() {
        assert!(is_minimal_mode(59));
        assert!(!is_minimal_mode(60));
    }

    #[test]
    fn test_y_bound_has_headroom() {
        assert_eq!(y_bound(&[]), 1.0);
        let bound = y_bound(&history(3));
        assert!(bound > 30.0);
    }

    #[test]
    fn test_series_follows_history_order() {
        let points = series(&history(3), |m| m.download);
        assert_eq!(points, [(0.0, 10.0), (60.0, 20.0), (120.0, 30.0)]);
    }

    #[test]
    fn test_series_keeps_uneven_gaps() {
        let mut measurements = history(3);
        measurements[1].timestamp = at(1);
        measurements[2].timestamp = at(45);

        let xs: Vec<f64> = series(&measurements, |m| m.ping)
            .into_iter()
            .map(|(x, _)| x)
            .collect();
        assert_eq!(xs, [0.0, 60.0, 2700.0]);
    }

    #[test]
    fn test_x_labels_span_oldest_to_newest() {
        let mut measurements = history(2);
        measurements[1].timestamp = at(40);

        let labels: Vec<String> =
            x_labels(&measurements).iter().map(|span| span.content.to_string()).collect();
        assert_eq!(labels, ["01/01 10:00", "01/01 10:20", "01/01 10:40"]);

        let single: Vec<String> =
            x_labels(&history(1)).iter().map(|span| span.content.to_string()).collect();
        assert_eq!(single, ["01/01 10:00"]);
        assert!(x_labels(&[]).is_empty());
    }

    #[test]
    fn test_run_screen_shows_server_and_result() {
        let mut state = TuiState::default();
        state.run.apply(&SessionUpdate::Event(RunEvent::ServerSelected(server(
            "CDG", "Paris", "FR",
        ))));
        state.run.apply(&SessionUpdate::Event(RunEvent::Progress(Stage::Complete)));
        state.run.apply(&SessionUpdate::Event(RunEvent::Completed(RunResult {
            download_mbps: 93.41,
            upload_mbps: 40.02,
            ping_ms: 12.5,
            timestamp: at(0),
        })));

        let rendered = render_to_string(&state, 80, 30);

        assert!(rendered.contains("Example (Paris)"));
        assert!(rendered.contains("93.41 Mbps"));
        assert!(rendered.contains("40.02 Mbps"));
        assert!(rendered.contains("Test complete!"));
        assert!(rendered.contains("No tests recorded yet"));
    }

    #[test]
    fn test_run_screen_shows_failure() {
        let mut state = TuiState::default();
        state.run.apply(&SessionUpdate::Event(RunEvent::Failed(RunFailure {
            kind: crate::errors::ErrorKind::Provider,
            message: "connection refused".to_string(),
            suggestion: Some("Check your internet connection".to_string()),
        })));

        let rendered = render_to_string(&state, 80, 30);

        assert!(rendered.contains("Error: connection refused"));
        assert!(rendered.contains("Check your internet connection"));
    }

    #[test]
    fn test_chart_screen_shows_averages() {
        let mut state = TuiState::new(Screen::Chart);
        state.history.measurements = history(3);
        state.history.aggregates = Some(Aggregates {
            download_mbps: 20.0,
            upload_mbps: 2.0,
            ping_ms: 15.0,
            count: 3,
        });

        let rendered = render_to_string(&state, 100, 24);

        assert!(rendered.contains("Averages over 3 tests"));
        assert!(rendered.contains("20.00 Mbps"));
        assert!(rendered.contains("History"));
    }

    #[test]
    fn test_minimal_frame_fits_narrow_terminal() {
        let mut state = TuiState::default();
        state.run.apply(&SessionUpdate::Event(RunEvent::Progress(Stage::Download)));

        let rendered = render_to_string(&state, 40, 6);

        assert!(rendered.contains("50% Testing download..."));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property: speed color thresholds partition the range.
        #[test]
        fn speed_color_thresholds(speed in 0.0f64..10_000.0) {
            let expected = if speed >= 100.0 {
                Color::Green
            } else if speed >= 25.0 {
                Color::Yellow
            } else {
                Color::Red
            };
            prop_assert_eq!(speed_color(speed), expected);
        }

        /// Property: the chart renders for any history length without
        /// panicking, in both layouts.
        #[test]
        fn chart_renders_any_history(count in 0usize..12, width in 20u16..140) {
            let mut state = TuiState::new(Screen::Chart);
            state.history.measurements = history(count);

            let rendered = render_to_string(&state, width, 20);
            prop_assert!(!rendered.is_empty());
        }
    }
}
