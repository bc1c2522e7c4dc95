//! Pure scoring function. See §4.2. Has no knowledge of rooms or players —
//! the Room Manager applies mode/difficulty/power-up multipliers on top of
//! this result.

const BASE_SCORE: i64 = 1000;
const STREAK_BONUS: [i64; 6] = [0, 0, 100, 200, 300, 500];

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ScoreBreakdown {
    pub base: i64,
    pub time_bonus: i64,
    pub streak_bonus: i64,
    pub position_bonus: i64,
    pub total: i64,
}

fn position_bonus(position: u32) -> i64 {
    match position {
        1 => 200,
        2 => 100,
        3 => 50,
        _ => 0,
    }
}

/// `elapsed_ms`/`duration_ms` are wall-clock milliseconds since round start
/// and the round's total duration; `streak` is the player's current streak
/// *before* this answer; `position` is the 1-based finish rank, or any
/// value ≥4 to suppress the position bonus (used for partial-credit
/// sub-answers, which never earn it per §4.5).
pub fn calculate(elapsed_ms: i64, duration_ms: i64, streak: u32, position: u32) -> ScoreBreakdown {
    let time_bonus = if elapsed_ms >= duration_ms || duration_ms <= 0 {
        0
    } else {
        (((duration_ms - elapsed_ms) as f64 / duration_ms as f64) * 2.0 * 1000.0).floor() as i64
    };

    let streak_bonus = STREAK_BONUS[streak.min(5) as usize];
    let position_bonus = position_bonus(position);
    let total = BASE_SCORE + time_bonus + streak_bonus + position_bonus;

    ScoreBreakdown {
        base: BASE_SCORE,
        time_bonus,
        streak_bonus,
        position_bonus,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn zero_elapsed_gives_max_time_bonus() {
        let score = calculate(0, 30_000, 0, 1);
        assert_eq!(score.time_bonus, 2000);
    }

    #[test]
    fn elapsed_past_duration_gives_no_time_bonus() {
        let score = calculate(31_000, 30_000, 0, 1);
        assert_eq!(score.time_bonus, 0);
    }

    #[test]
    fn streak_bonus_caps_at_five() {
        assert_eq!(calculate(0, 30_000, 5, 4).streak_bonus, 500);
        assert_eq!(calculate(0, 30_000, 50, 4).streak_bonus, 500);
    }

    #[test]
    fn position_bonus_only_applies_to_top_three() {
        assert_eq!(calculate(0, 30_000, 0, 1).position_bonus, 200);
        assert_eq!(calculate(0, 30_000, 0, 2).position_bonus, 100);
        assert_eq!(calculate(0, 30_000, 0, 3).position_bonus, 50);
        assert_eq!(calculate(0, 30_000, 0, 4).position_bonus, 0);
    }

    #[test]
    fn total_is_monotonically_non_increasing_in_elapsed() {
        let duration = 30_000;
        let mut last_total = i64::MAX;
        for elapsed in (0..=duration).step_by(1_000) {
            let score = calculate(elapsed, duration, 3, 1);
            assert!(score.total <= last_total, "total increased at elapsed={elapsed}");
            last_total = score.total;
        }
    }
}
