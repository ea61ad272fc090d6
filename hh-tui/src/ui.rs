// TUI rendering: membrane voltage, gating variables, f-I curve + status panel.

use std::io::Stdout;

use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    symbols,
    text::Span,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Terminal,
};

use crate::app::App;
use crate::backend::SweepBackend;

fn line<'a>(name: &'a str, color: Color, data: &'a [(f64, f64)]) -> Dataset<'a> {
    Dataset::default()
        .name(name)
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(color))
        .data(data)
}

fn axis<'a>(title: &'a str, bounds: [f64; 2]) -> Axis<'a> {
    Axis::default()
        .title(title)
        .style(Style::default().fg(Color::Gray))
        .bounds(bounds)
        .labels(vec![
            Span::raw(format!("{:.1}", bounds[0])),
            Span::raw(format!("{:.1}", 0.5 * (bounds[0] + bounds[1]))),
            Span::raw(format!("{:.1}", bounds[1])),
        ])
}

/// Draws the UI each frame:
/// - Vm(t) of the most recent sweep point
/// - n, m, h of the same point
/// - f-I curve accumulated so far
/// - Status: progress, last point, run state, controls
pub fn draw<B: SweepBackend>(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &App<B>,
) -> anyhow::Result<()> {
    terminal.draw(|f| {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints(
                [
                    Constraint::Percentage(35),
                    Constraint::Percentage(25),
                    Constraint::Percentage(30),
                    Constraint::Min(3),
                ]
                .as_ref(),
            )
            .split(f.size());

        let vm_chart = Chart::new(vec![line("Vm", Color::Yellow, &app.vm)])
            .block(Block::default().title("Membrane voltage (mV)").borders(Borders::ALL))
            .x_axis(axis("t (ms)", app.time_bounds))
            .y_axis(axis("mV", [-100.0, 60.0]));
        f.render_widget(vm_chart, chunks[0]);

        let gate_chart = Chart::new(vec![
            line("n", Color::Red, &app.gates[0]),
            line("m", Color::Green, &app.gates[1]),
            line("h", Color::Blue, &app.gates[2]),
        ])
        .block(Block::default().title("Gating variables").borders(Borders::ALL))
        .x_axis(axis("t (ms)", app.time_bounds))
        .y_axis(axis("", [0.0, 1.0]));
        f.render_widget(gate_chart, chunks[1]);

        let (a_min, a_max) = app.backend.amplitude_bounds();
        let a_max = if a_max > a_min { a_max } else { a_min + 1.0 };
        let f_max = (app.max_frequency() * 1.1).max(1.0);
        let fi_chart = Chart::new(vec![line("f", Color::Cyan, &app.curve)])
            .block(Block::default().title("f-I curve").borders(Borders::ALL))
            .x_axis(axis("I", [a_min, a_max]))
            .y_axis(axis("f", [0.0, f_max]));
        f.render_widget(fi_chart, chunks[2]);

        let last = match app.last {
            Some(p) => match p.frequency {
                Some(freq) => format!("I = {:.3} → f = {:.2}", p.amplitude, freq),
                None => format!("I = {:.3} → f undefined", p.amplitude),
            },
            None => "no point yet".to_string(),
        };
        let mut status = format!(
            "Point: {}/{} | {} | Running: {} | Controls: [s] Step  [r] Run/Pause  [c] Restart  [q] Quit",
            app.backend.position(),
            app.backend.total(),
            last,
            if app.running { "yes" } else { "no" }
        );
        if let Some(err) = &app.error {
            status.push_str(&format!(" | Error: {}", err));
        }
        let status_widget = Paragraph::new(status)
            .style(Style::default().fg(Color::Cyan))
            .block(Block::default().title("Status").borders(Borders::ALL));
        f.render_widget(status_widget, chunks[3]);
    })?;
    Ok(())
}
