//! Pairwise Elo scoring of the answers given to one question.
//!
//! Every answer is compared against every other answer of the same question. The outcome of
//! a comparison is derived from the votes of the two answers rather than being a plain
//! win/loss, and the final delta of an answer is the mean of its pairwise deltas.

/// Players with fewer games than this are considered inexperienced.
pub const EXPERIENCED_GAMES: i32 = 100;

/// Input to the rating computation for one participant of a game.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerResult {
    pub games_played: i32,
    pub rating_before: f64,
    pub score: f64,
}

impl PlayerResult {
    pub fn new(games_played: i32, rating_before: f64, score: f64) -> Self {
        Self {
            games_played,
            rating_before,
            score,
        }
    }
}

/// Computes one rating delta per result, in the same order as `results`.
pub fn compute_rating_deltas(results: &[PlayerResult]) -> Vec<f64> {
    (0..results.len())
        .map(|own| rating_delta(own, results))
        .collect()
}

/// Mean of the pairwise deltas of `results[own]` against every other result.
///
/// Returns 0 when there is nobody to compare against.
pub fn rating_delta(own: usize, results: &[PlayerResult]) -> f64 {
    let own_result = &results[own];
    let deltas: Vec<f64> = results
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != own)
        .map(|(_, opponent)| elo_delta(own_result, opponent))
        .collect();

    if deltas.is_empty() {
        0.0
    } else {
        deltas.iter().sum::<f64>() / deltas.len() as f64
    }
}

fn elo_delta(own: &PlayerResult, opponent: &PlayerResult) -> f64 {
    let expected = expected_score(own.rating_before, opponent.rating_before);
    let actual = actual_score(own.score, opponent.score);
    k_factor(own.games_played, opponent.games_played) * (actual - expected)
}

/// Standard logistic Elo expectation of the own side.
pub fn expected_score(own_rating: f64, opponent_rating: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent_rating - own_rating) / 400.0))
}

/// Maps a vote comparison to a score in `0.0..=1.0`.
///
/// A higher score is always a full win, otherwise the best result could end up with a
/// negative delta. Within 99% of the opponent is a draw, and less than half of the opponent
/// (measured from its absolute value) is a loss. Between loss and draw the score is linearly
/// interpolated.
pub fn actual_score(my_score: f64, opponent_score: f64) -> f64 {
    if my_score > opponent_score {
        return 1.0;
    }

    // also guards the division below against opponent_score == loss
    if my_score >= 0.99 * opponent_score {
        return 0.5;
    }

    let loss = opponent_score - opponent_score.abs() / 2.0;
    if my_score < loss {
        return 0.0;
    }

    // f(loss) = 0, f(opponent_score) = 0.5
    let k = 0.5 / (opponent_score - loss);
    let m = 0.5 - k * opponent_score;
    k * my_score + m
}

/// Maximum rating change of a single comparison.
///
/// Inexperienced players move fast. Experienced players are stable, even more so against
/// inexperienced opponents.
pub fn k_factor(own_games_played: i32, opponent_games_played: i32) -> f64 {
    if own_games_played < EXPERIENCED_GAMES {
        8.0
    } else if opponent_games_played < EXPERIENCED_GAMES {
        1.0
    } else {
        4.0
    }
}
