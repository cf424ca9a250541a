use std::time::Duration;

use log::Level;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph};
use ratatui::Frame;

use crate::logbuf::LogLine;
use crate::server::ServerStatus;

pub fn render(frame: &mut Frame, status: &ServerStatus, log: &[LogLine]) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(status.slots.len() as u16 + 2),
            Constraint::Length(6),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    render_header(frame, chunks[0], status);
    render_occupancy(frame, chunks[1], status);
    render_slots(frame, chunks[2], status);
    render_network(frame, chunks[3], status);
    render_log(frame, chunks[4], log);
    render_help(frame, chunks[5]);
}

fn render_header(frame: &mut Frame, area: Rect, status: &ServerStatus) {
    let title = format!(" Arena Server - Uptime: {} ", format_duration(status.uptime));

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let text = format!(
        "{}  |  {}  |  Games: {}  |  Peers: {}  |  Bullets: {}  |  Powerups: {}",
        status.addr, status.phase, status.games_played, status.peers, status.bullets, status.powerups
    );

    let paragraph = Paragraph::new(text)
        .block(block)
        .style(Style::default().fg(Color::White));

    frame.render_widget(paragraph, area);
}

fn render_occupancy(frame: &mut Frame, area: Rect, status: &ServerStatus) {
    let block = Block::default()
        .title(" Slots ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    let total = status.slots.len();
    let taken = status.slots.iter().filter(|s| s.peer.is_some()).count();
    let ratio = if total == 0 { 0.0 } else { taken as f64 / total as f64 };

    let gauge = Gauge::default()
        .block(block)
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(ratio)
        .label(format!("{}/{} slots taken", taken, total));

    frame.render_widget(gauge, area);
}

fn render_slots(frame: &mut Frame, area: Rect, status: &ServerStatus) {
    let block = Block::default()
        .title(" Players ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    let lines: Vec<Line> = status
        .slots
        .iter()
        .map(|slot| {
            let (who, color) = match &slot.peer {
                Some(peer) => (peer.clone(), Color::White),
                None => ("empty".to_string(), Color::DarkGray),
            };
            let hp = slot.hp.map(|hp| format!("{hp} hp")).unwrap_or_default();
            Line::from(vec![
                Span::styled(format!("#{} ", slot.index), Style::default().fg(Color::Gray)),
                Span::styled(format!("{who:<10} "), Style::default().fg(color)),
                Span::styled(hp, Style::default().fg(Color::Yellow)),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_network(frame: &mut Frame, area: Rect, status: &ServerStatus) {
    let block = Block::default()
        .title(" Network ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let net = &status.network;
    let resend = net.resend_percent();
    let lines = vec![
        Line::from(vec![
            Span::styled("Packets: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{} sent / {} recv / {} dropped", net.packets_sent, net.packets_received, net.packets_dropped),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::styled("Bytes: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!(
                    "{} sent / {} recv",
                    format_bytes(net.bytes_sent),
                    format_bytes(net.bytes_received)
                ),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::styled("RTT: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{:.1}ms (+/- {:.1}ms)", net.rtt_ms, net.rtt_variance),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::styled("Resends: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{} ({:.1}%)", net.resends, resend),
                Style::default().fg(if resend > 5.0 { Color::Red } else { Color::White }),
            ),
        ]),
    ];

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_log(frame: &mut Frame, area: Rect, log: &[LogLine]) {
    let block = Block::default()
        .title(" Log ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));

    let visible = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line> = log
        .iter()
        .skip(log.len().saturating_sub(visible))
        .map(|line| {
            let color = match line.level {
                Level::Error => Color::Red,
                Level::Warn => Color::Yellow,
                Level::Info => Color::White,
                Level::Debug | Level::Trace => Color::DarkGray,
            };
            Line::from(Span::styled(line.message.clone(), Style::default().fg(color)))
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .title(" Controls ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let text = Paragraph::new("Press 'q' or ESC to quit")
        .block(block)
        .style(
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        );

    frame.render_widget(text, area);
}

fn format_duration(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{}B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1}GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
