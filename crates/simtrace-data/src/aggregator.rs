//! Per-episode aggregation and ranking over extracted step records.

use std::collections::BTreeMap;

use simtrace_core::models::{EpisodeSummary, StepRecord};
use simtrace_core::{AnalyzerError, Result};

// ── Aggregation ───────────────────────────────────────────────────────────────

/// Group `steps` by episode id and compute one [`EpisodeSummary`] per
/// episode present, ordered by episode id ascending.
///
/// Episode ids are covered from 0 through the maximum observed; ids with
/// no steps (holes in the numbering) simply yield no row. Fails with
/// `EmptyInput` when `steps` is empty.
pub fn aggregate(steps: &[StepRecord]) -> Result<Vec<EpisodeSummary>> {
    if steps.is_empty() {
        return Err(AnalyzerError::EmptyInput);
    }

    // BTreeMap gives ascending episode ids for free; absent ids have no
    // entry and therefore no summary row.
    let mut groups: BTreeMap<u32, Vec<&StepRecord>> = BTreeMap::new();
    for step in steps {
        groups.entry(step.episode).or_default().push(step);
    }

    Ok(groups
        .into_iter()
        .map(|(episode, group)| summarize(episode, &group))
        .collect())
}

/// Compute the summary row for one episode's steps (in log order).
fn summarize(episode: u32, group: &[&StepRecord]) -> EpisodeSummary {
    let steps = group.iter().map(|s| s.step).max().unwrap_or(0);
    let rewards: f64 = group.iter().map(|s| s.reward).sum();
    let completed = group.iter().map(|s| s.progress).fold(0.0, f64::max);

    let times: Vec<f64> = group.iter().filter_map(|s| s.timestamp_secs()).collect();
    let laptime = if times.is_empty() {
        0.0
    } else {
        let start = times.iter().copied().fold(f64::INFINITY, f64::min);
        let finish = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        finish - start
    };

    let status = group.last().map(|s| s.status.clone()).unwrap_or_default();

    EpisodeSummary {
        episode,
        steps,
        rewards: round_to(rewards, 3),
        completed: round_to(completed, 2),
        laptime: round_to(laptime, 3),
        status,
    }
}

// ── Ranking ───────────────────────────────────────────────────────────────────

/// The first `n` summaries ordered by completion descending, then laptime
/// ascending (the faster lap wins ties on completion).
///
/// The sort is stable: summaries with equal keys keep their input order.
/// `n` larger than the available rows returns all rows. The input slice is
/// not mutated.
pub fn select_top(summaries: &[EpisodeSummary], n: usize) -> Vec<EpisodeSummary> {
    let mut ranked = summaries.to_vec();
    ranked.sort_by(|a, b| {
        b.completed
            .total_cmp(&a.completed)
            .then(a.laptime.total_cmp(&b.laptime))
    });
    ranked.truncate(n);
    ranked
}

/// Round `value` to `places` decimal places.
fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn make_step(
        episode: u32,
        step: u32,
        progress: f64,
        reward: f64,
        timestamp: &str,
        status: &str,
    ) -> StepRecord {
        StepRecord {
            episode,
            step,
            x: 0.0,
            y: 0.0,
            heading: 0.0,
            steering_angle: 0.0,
            speed: 1.0,
            action_taken: 0,
            reward,
            job_completed: false,
            all_wheels_on_track: true,
            progress,
            closest_waypoint_index: 0,
            track_length: 17.6,
            timestamp: timestamp.to_string(),
            status: status.to_string(),
        }
    }

    fn make_summary(episode: u32, completed: f64, laptime: f64) -> EpisodeSummary {
        EpisodeSummary {
            episode,
            steps: 10,
            rewards: 1.0,
            completed,
            laptime,
            status: "lap_complete".to_string(),
        }
    }

    /// The two-episode scenario from the analyzer's reference log.
    fn two_episode_steps() -> Vec<StepRecord> {
        vec![
            make_step(0, 0, 10.0, 1.0, "0.0", "in_progress"),
            make_step(0, 1, 55.0, 2.5, "0.5", "in_progress"),
            make_step(0, 2, 100.0, -0.5, "1.2", "lap_complete"),
            make_step(1, 0, 10.0, 0.1, "0.0", "in_progress"),
            make_step(1, 1, 20.0, 0.2, "0.3", "off_track"),
        ]
    }

    // ── aggregate ─────────────────────────────────────────────────────────────

    #[test]
    fn test_aggregate_two_episodes() {
        let summaries = aggregate(&two_episode_steps()).unwrap();
        assert_eq!(summaries.len(), 2);

        let ep0 = &summaries[0];
        assert_eq!(ep0.episode, 0);
        assert_eq!(ep0.steps, 2);
        assert_eq!(ep0.rewards, 3.0);
        assert_eq!(ep0.completed, 100.0);
        assert_eq!(ep0.laptime, 1.2);
        assert_eq!(ep0.status, "lap_complete");

        let ep1 = &summaries[1];
        assert_eq!(ep1.episode, 1);
        assert_eq!(ep1.steps, 1);
        assert_eq!(ep1.rewards, 0.3);
        assert_eq!(ep1.completed, 20.0);
        assert_eq!(ep1.laptime, 0.3);
        assert_eq!(ep1.status, "off_track");
    }

    #[test]
    fn test_aggregate_empty_input() {
        let err = aggregate(&[]).unwrap_err();
        assert!(matches!(err, AnalyzerError::EmptyInput));
    }

    #[test]
    fn test_aggregate_steps_is_max_step_index() {
        // Steps arrive out of order; the max step field wins.
        let steps = vec![
            make_step(0, 7, 10.0, 0.0, "0.0", "a"),
            make_step(0, 3, 20.0, 0.0, "0.1", "b"),
        ];
        let summaries = aggregate(&steps).unwrap();
        assert_eq!(summaries[0].steps, 7);
    }

    #[test]
    fn test_aggregate_skips_holes_in_episode_ids() {
        let steps = vec![
            make_step(0, 0, 10.0, 0.0, "0.0", "a"),
            make_step(5, 0, 20.0, 0.0, "0.0", "b"),
        ];
        let summaries = aggregate(&steps).unwrap();
        let ids: Vec<u32> = summaries.iter().map(|s| s.episode).collect();
        assert_eq!(ids, vec![0, 5]);
    }

    #[test]
    fn test_aggregate_single_episode() {
        let steps = vec![make_step(4, 0, 33.333, 0.5, "10.0", "in_progress")];
        let summaries = aggregate(&steps).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].episode, 4);
        assert_eq!(summaries[0].laptime, 0.0);
    }

    #[test]
    fn test_aggregate_idempotent() {
        let steps = two_episode_steps();
        let first = aggregate(&steps).unwrap();
        let second = aggregate(&steps).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_aggregate_rounding() {
        let steps = vec![
            make_step(0, 0, 33.3333333, 0.1000004, "0.0", "a"),
            make_step(0, 1, 66.6666666, 0.2000004, "0.0004999", "b"),
        ];
        let summaries = aggregate(&steps).unwrap();
        assert_eq!(summaries[0].rewards, 0.3);
        assert_eq!(summaries[0].completed, 66.67);
        assert_eq!(summaries[0].laptime, 0.0);
    }

    #[test]
    fn test_aggregate_status_is_last_in_log_order() {
        let steps = vec![
            make_step(0, 1, 10.0, 0.0, "0.5", "late"),
            make_step(0, 0, 20.0, 0.0, "0.0", "early"),
        ];
        let summaries = aggregate(&steps).unwrap();
        // Log order decides, not step index or timestamp.
        assert_eq!(summaries[0].status, "early");
    }

    #[test]
    fn test_aggregate_laptime_spans_first_to_last() {
        let steps = vec![
            make_step(0, 0, 1.0, 0.0, "100.25", "a"),
            make_step(0, 1, 2.0, 0.0, "101.5", "b"),
            make_step(0, 2, 3.0, 0.0, "100.75", "c"),
        ];
        let summaries = aggregate(&steps).unwrap();
        assert_eq!(summaries[0].laptime, 1.25);
    }

    // ── select_top ────────────────────────────────────────────────────────────

    #[test]
    fn test_select_top_orders_by_completion_then_laptime() {
        let summaries = vec![
            make_summary(0, 50.0, 10.0),
            make_summary(1, 100.0, 14.0),
            make_summary(2, 100.0, 12.0),
        ];
        let top = select_top(&summaries, 3);
        let ids: Vec<u32> = top.iter().map(|s| s.episode).collect();
        assert_eq!(ids, vec![2, 1, 0]);
    }

    #[test]
    fn test_select_top_is_stable_on_equal_keys() {
        let summaries = vec![
            make_summary(7, 100.0, 12.0),
            make_summary(3, 100.0, 12.0),
            make_summary(9, 100.0, 12.0),
        ];
        let top = select_top(&summaries, 3);
        let ids: Vec<u32> = top.iter().map(|s| s.episode).collect();
        assert_eq!(ids, vec![7, 3, 9]);
    }

    #[test]
    fn test_select_top_n_exceeds_rows() {
        let summaries = vec![make_summary(0, 10.0, 1.0), make_summary(1, 20.0, 1.0)];
        let top = select_top(&summaries, 5);
        assert_eq!(top.len(), 2);
    }

    #[test]
    fn test_select_top_does_not_mutate_input() {
        let summaries = vec![make_summary(0, 10.0, 1.0), make_summary(1, 20.0, 1.0)];
        let before = summaries.clone();
        let _ = select_top(&summaries, 1);
        assert_eq!(summaries, before);
    }

    #[test]
    fn test_select_top_scenario_pick_one() {
        let summaries = aggregate(&two_episode_steps()).unwrap();
        let top = select_top(&summaries, 1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].episode, 0);
    }

    // ── round_to ──────────────────────────────────────────────────────────────

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 3), 1.235);
        assert_eq!(round_to(1.23449, 3), 1.234);
        assert_eq!(round_to(99.999, 2), 100.0);
        assert_eq!(round_to(-0.0005, 3), -0.001);
    }
}
