//! Central module for organizing the application's HTTP surface.
//!
//! This module holds the state shared by every handler and the dashboard
//! API, which serves the rendered tables and pushes updates to browsers.

pub mod dashboard;

use std::sync::Arc;

use procview_adapters::Channel;

use crate::errors::AppError;
use crate::services::ProcessTable;

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    tables: Arc<Vec<Arc<ProcessTable>>>,
}

impl AppState {
    pub fn new(tables: Vec<Arc<ProcessTable>>) -> Self {
        Self {
            tables: Arc::new(tables),
        }
    }

    pub fn tables(&self) -> &[Arc<ProcessTable>] {
        &self.tables
    }

    /// Looks up a table by its channel's wire name.
    pub fn table(&self, name: &str) -> Result<Arc<ProcessTable>, AppError> {
        let channel: Channel = name.parse()?;
        self.tables
            .iter()
            .find(|table| table.channel() == channel)
            .cloned()
            .ok_or_else(|| AppError::ChannelNotFound(name.to_string()))
    }
}
