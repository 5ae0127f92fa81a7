//! Rendering of a table snapshot.
//!
//! Rendering is a pure function of the snapshot. Rows follow snapshot order;
//! each shows `name (count)` and the date. The HTML page is an askama
//! template, so event text is escaped on output.

use askama::Template;
use procview_adapters::Channel;
use serde::Serialize;

use crate::services::{TableSnapshot, TableStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRow {
    pub label: String,
    pub date: String,
}

/// What the table should communicate besides its rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ViewState {
    Inactive,
    Waiting,
    Live,
    Disconnected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableView {
    pub channel: Channel,
    pub title: &'static str,
    #[serde(flatten)]
    pub state: ViewState,
    pub rows: Vec<TableRow>,
    pub total_processes: u64,
}

pub fn render(channel: Channel, snapshot: &TableSnapshot) -> TableView {
    let state = match &snapshot.status {
        TableStatus::Inactive => ViewState::Inactive,
        TableStatus::Disconnected { reason } => ViewState::Disconnected {
            reason: reason.clone(),
        },
        TableStatus::Subscribed if snapshot.entries.is_empty() => ViewState::Waiting,
        TableStatus::Subscribed => ViewState::Live,
    };

    TableView {
        channel,
        title: channel.title(),
        state,
        rows: snapshot
            .entries
            .iter()
            .map(|entry| TableRow {
                label: format!("{} ({})", entry.name, entry.n_processes),
                date: entry.date.clone(),
            })
            .collect(),
        total_processes: snapshot.total_processes,
    }
}

impl ViewState {
    fn css_class(&self) -> &'static str {
        match self {
            ViewState::Inactive => "inactive",
            ViewState::Waiting => "waiting",
            ViewState::Live => "live",
            ViewState::Disconnected { .. } => "disconnected",
        }
    }

    fn describe(&self) -> String {
        match self {
            ViewState::Inactive => "Not subscribed".to_string(),
            ViewState::Waiting => "Waiting for events".to_string(),
            ViewState::Live => "Live".to_string(),
            ViewState::Disconnected { reason } => format!("Disconnected: {}", reason),
        }
    }
}

/// Template model for one table section.
struct SectionView<'a> {
    channel: Channel,
    title: &'a str,
    status_class: &'static str,
    status_text: String,
    total_processes: u64,
    rows: &'a [TableRow],
}

impl<'a> From<&'a TableView> for SectionView<'a> {
    fn from(view: &'a TableView) -> Self {
        Self {
            channel: view.channel,
            title: view.title,
            status_class: view.state.css_class(),
            status_text: view.state.describe(),
            total_processes: view.total_processes,
            rows: &view.rows,
        }
    }
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate<'a> {
    sections: Vec<SectionView<'a>>,
}

/// Renders the full dashboard page.
pub fn render_page(views: &[TableView]) -> Result<String, askama::Error> {
    DashboardTemplate {
        sections: views.iter().map(SectionView::from).collect(),
    }
    .render()
}
