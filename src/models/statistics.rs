use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::{Client, ClientInteraction, Stage};

/// Length of the "recent" window, inclusive of its lower bound
pub const RECENT_WINDOW_DAYS: i64 = 30;

/// Start of the recent window ending at `now`
pub fn recent_since(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(RECENT_WINDOW_DAYS)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageCounts {
    pub lead: u64,
    pub in_progress: u64,
    pub active: u64,
}

impl StageCounts {
    pub fn record(&mut self, stage: Stage, count: u64) {
        match stage {
            Stage::Lead => self.lead += count,
            Stage::InProgress => self.in_progress += count,
            Stage::Active => self.active += count,
        }
    }

    pub fn total(&self) -> u64 {
        self.lead + self.in_progress + self.active
    }
}

/// CRM rollup. `funnel` repeats `clients_by_stage` under the name the
/// reporting dashboards read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub total_clients: u64,
    pub clients_by_stage: StageCounts,
    pub recent_clients_30_days: u64,
    pub clients_by_staff: BTreeMap<String, u64>,
    pub total_interactions: u64,
    pub recent_interactions_30_days: u64,
    pub conversion_rate_percentage: f64,
    pub funnel: StageCounts,
}

/// Raw counts a store gathers; everything else in [`Statistics`] derives
/// from them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatisticsCounts {
    pub by_stage: StageCounts,
    pub recent_clients: u64,
    /// Assigned clients per assignee username; unassigned clients are left out
    pub by_staff: BTreeMap<String, u64>,
    pub total_interactions: u64,
    pub recent_interactions: u64,
}

impl StatisticsCounts {
    /// Tally already-loaded rows. Rows created at or after `since` are recent.
    pub fn tally(
        clients: &[Client],
        interactions: &[ClientInteraction],
        since: DateTime<Utc>,
    ) -> Self {
        let mut counts = Self::default();
        for client in clients {
            counts.by_stage.record(client.stage, 1);
            if client.created_at >= since {
                counts.recent_clients += 1;
            }
            if let Some(assignee) = &client.assigned_to_name {
                *counts.by_staff.entry(assignee.clone()).or_default() += 1;
            }
        }

        counts.total_interactions = interactions.len() as u64;
        counts.recent_interactions = interactions
            .iter()
            .filter(|interaction| interaction.created_at >= since)
            .count() as u64;
        counts
    }
}

impl From<StatisticsCounts> for Statistics {
    fn from(counts: StatisticsCounts) -> Self {
        let total_clients = counts.by_stage.total();
        Self {
            total_clients,
            clients_by_stage: counts.by_stage,
            recent_clients_30_days: counts.recent_clients,
            clients_by_staff: counts.by_staff,
            total_interactions: counts.total_interactions,
            recent_interactions_30_days: counts.recent_interactions,
            conversion_rate_percentage: conversion_rate(counts.by_stage.active, total_clients),
            funnel: counts.by_stage,
        }
    }
}

/// Share of ACTIVE clients as a percentage with two decimals; 0 when there
/// are no clients
fn conversion_rate(active: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let percentage = active as f64 / total as f64 * 100.0;
    (percentage * 100.0).round() / 100.0
}
