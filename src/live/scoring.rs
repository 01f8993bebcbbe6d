use std::collections::HashMap;
use std::time::Duration;

use crate::config::ScoringConfig;
use crate::live::protocol::ScoreEntry;
use crate::live::round::Round;

/// Tabulated outcome of a closed round.
#[derive(Debug, Clone)]
pub struct RoundResults {
    pub top_5: Vec<ScoreEntry>,
    pub correct_answers: usize,
    pub total_answers: usize,
    pub correct_option: usize,
}

/// Points for a single answer. Incorrect answers score 0; correct answers
/// scale down linearly with the elapsed fraction of the window, floored at
/// the configured minimum so a late correct answer still counts.
pub fn score_answer(
    config: &ScoringConfig,
    correct: bool,
    elapsed: Duration,
    time_limit: Duration,
) -> u64 {
    if !correct {
        return 0;
    }

    let limit_ms = time_limit.as_millis().max(1);
    let remaining_ms = limit_ms.saturating_sub(elapsed.as_millis());
    let scaled = (config.base_points as u128 * remaining_ms / limit_ms) as u64;

    scaled.max(config.min_correct_points)
}

/// Scores every recorded answer of `round`, folds the awards into the
/// room's cumulative `scores` ledger, and builds the round leaderboard:
/// round points descending, elapsed time ascending as tie-break, top 5.
pub fn tabulate_round(
    config: &ScoringConfig,
    round: &Round,
    scores: &mut HashMap<String, u64>,
) -> RoundResults {
    let mut ranked: Vec<(ScoreEntry, Duration)> = Vec::with_capacity(round.answer_count());
    let mut correct_answers = 0;

    for (player, answer) in round.answers() {
        let correct = answer.option == round.correct_option;
        if correct {
            correct_answers += 1;
        }

        let points = score_answer(config, correct, answer.elapsed, round.time_limit);
        let total = scores.entry(player.clone()).or_insert(0);
        *total += points;

        ranked.push((
            ScoreEntry {
                username: player.clone(),
                points,
                total_score: *total,
            },
            answer.elapsed,
        ));
    }

    ranked.sort_by(|(a, a_elapsed), (b, b_elapsed)| {
        b.points.cmp(&a.points).then(a_elapsed.cmp(b_elapsed))
    });

    RoundResults {
        total_answers: ranked.len(),
        correct_answers,
        correct_option: round.correct_option,
        top_5: ranked.into_iter().take(5).map(|(entry, _)| entry).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::round::Round;
    use tokio::time::advance;

    fn config() -> ScoringConfig {
        ScoringConfig {
            base_points: 1000,
            min_correct_points: 100,
        }
    }

    #[test]
    fn test_incorrect_scores_zero() {
        let points = score_answer(
            &config(),
            false,
            Duration::from_secs(0),
            Duration::from_secs(10),
        );
        assert_eq!(points, 0);
    }

    #[test]
    fn test_instant_correct_scores_base() {
        let points = score_answer(
            &config(),
            true,
            Duration::from_secs(0),
            Duration::from_secs(10),
        );
        assert_eq!(points, 1000);
    }

    #[test]
    fn test_late_correct_scores_at_least_minimum() {
        let points = score_answer(
            &config(),
            true,
            Duration::from_secs(10),
            Duration::from_secs(10),
        );
        assert_eq!(points, 100);
    }

    #[test]
    fn test_faster_never_scores_less() {
        let cfg = config();
        let limit = Duration::from_secs(10);
        let mut previous = u64::MAX;
        for ms in (0..=10_000).step_by(500) {
            let points = score_answer(&cfg, true, Duration::from_millis(ms), limit);
            assert!(points <= previous, "points increased with lateness at {ms}ms");
            previous = points;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tabulate_ranks_and_accumulates() {
        let cfg = config();
        let mut round = Round::new(
            "Q?".to_string(),
            vec!["A".into(), "B".into(), "C".into(), "D".into()],
            1,
            10,
            1,
        )
        .unwrap();

        advance(Duration::from_secs(2)).await;
        round.record_answer("Alice", 1).unwrap();
        advance(Duration::from_secs(7)).await;
        round.record_answer("Bob", 0).unwrap();

        let mut scores = HashMap::from([("Alice".to_string(), 0), ("Bob".to_string(), 0)]);
        let results = tabulate_round(&cfg, &round, &mut scores);

        assert_eq!(results.total_answers, 2);
        assert_eq!(results.correct_answers, 1);
        assert_eq!(results.correct_option, 1);

        assert_eq!(results.top_5[0].username, "Alice");
        assert_eq!(results.top_5[0].points, 800);
        assert_eq!(results.top_5[1].username, "Bob");
        assert_eq!(results.top_5[1].points, 0);

        assert_eq!(scores["Alice"], 800);
        assert_eq!(scores["Bob"], 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tabulate_tie_break_prefers_faster() {
        let cfg = ScoringConfig {
            base_points: 1000,
            min_correct_points: 1000, // flat curve forces a points tie
        };
        let mut round = Round::new("Q?".to_string(), vec!["A".into(), "B".into()], 0, 10, 1).unwrap();

        advance(Duration::from_secs(1)).await;
        round.record_answer("Slowpoke", 0).unwrap();
        // same points, earlier elapsed should still rank first
        let mut fast_round =
            Round::new("Q?".to_string(), vec!["A".into(), "B".into()], 0, 10, 2).unwrap();
        fast_round.record_answer("Quickdraw", 0).unwrap();

        let mut scores = HashMap::new();
        let slow = tabulate_round(&cfg, &round, &mut scores);
        let fast = tabulate_round(&cfg, &fast_round, &mut scores);
        assert_eq!(slow.top_5[0].points, fast.top_5[0].points);

        // now both in one round
        let mut both = Round::new("Q?".to_string(), vec!["A".into(), "B".into()], 0, 10, 3).unwrap();
        both.record_answer("Quickdraw", 0).unwrap();
        advance(Duration::from_secs(4)).await;
        both.record_answer("Slowpoke", 0).unwrap();

        let mut scores = HashMap::new();
        let results = tabulate_round(&cfg, &both, &mut scores);
        assert_eq!(results.top_5[0].username, "Quickdraw");
        assert_eq!(results.top_5[1].username, "Slowpoke");
    }

    #[tokio::test(start_paused = true)]
    async fn test_leaderboard_truncates_to_top_5() {
        let cfg = config();
        let mut round = Round::new("Q?".to_string(), vec!["A".into(), "B".into()], 0, 10, 1).unwrap();

        for i in 0..7 {
            advance(Duration::from_millis(500)).await;
            round.record_answer(&format!("player_{i}"), 0).unwrap();
        }

        let mut scores = HashMap::new();
        let results = tabulate_round(&cfg, &round, &mut scores);
        assert_eq!(results.total_answers, 7);
        assert_eq!(results.top_5.len(), 5);
        // every award still landed in the cumulative ledger
        assert_eq!(scores.len(), 7);
    }
}
