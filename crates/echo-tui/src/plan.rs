// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Plan section (§4.7): shows only the latest `plan.updated` snapshot, not
//! a history of revisions.

use echo_types::event::{PlanStepStatus, PlanUpdate};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

#[derive(Default)]
pub struct PlanSection {
    latest: Option<PlanUpdate>,
}

impl PlanSection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever snapshot was shown before (§4.7 "latest snapshot only").
    pub fn update(&mut self, plan: PlanUpdate) {
        self.latest = Some(plan);
    }

    pub fn clear(&mut self) {
        self.latest = None;
    }

    pub fn is_visible(&self) -> bool {
        self.latest.is_some()
    }

    /// Height in terminal rows this section needs: one per step plus an
    /// optional explanation line, or `0` with nothing to show.
    pub fn height(&self) -> u16 {
        match &self.latest {
            None => 0,
            Some(p) => {
                let explanation = if p.explanation.is_some() { 1 } else { 0 };
                (p.plan.len() as u16 + explanation).max(1)
            }
        }
    }

    pub fn render_lines(&self) -> Vec<Line<'static>> {
        let Some(plan) = &self.latest else { return Vec::new() };
        let mut lines = Vec::new();
        if let Some(explanation) = &plan.explanation {
            lines.push(Line::from(Span::styled(explanation.clone(), Style::default().fg(Color::Gray))));
        }
        for step in &plan.plan {
            let (marker, style) = match step.status {
                PlanStepStatus::Pending => ("[ ]", Style::default().fg(Color::DarkGray)),
                PlanStepStatus::InProgress => ("[~]", Style::default().fg(Color::Yellow)),
                PlanStepStatus::Completed => ("[x]", Style::default().fg(Color::Green)),
            };
            lines.push(Line::from(vec![
                Span::styled(format!("{marker} "), style),
                Span::raw(step.step.clone()),
            ]));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echo_types::event::PlanStep;

    #[test]
    fn a_later_update_replaces_the_earlier_snapshot_entirely() {
        let mut section = PlanSection::new();
        section.update(PlanUpdate { explanation: None, plan: vec![PlanStep { step: "a".into(), status: PlanStepStatus::Pending }] });
        section.update(PlanUpdate { explanation: None, plan: vec![PlanStep { step: "b".into(), status: PlanStepStatus::Completed }] });
        let lines = section.render_lines();
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn empty_plan_section_is_not_visible() {
        let section = PlanSection::new();
        assert!(!section.is_visible());
        assert_eq!(section.height(), 0);
    }
}
