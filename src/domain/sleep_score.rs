const DURATION_POINTS: f64 = 50.0;
const STAGE_POINTS: f64 = 12.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageMinutes {
    pub deep: i64,
    pub rem: i64,
    pub wake: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SleepScoreInput {
    pub minutes_asleep: i64,
    pub efficiency: i64,
    pub stages: Option<StageMinutes>,
}

pub fn compute_sleep_score(input: &SleepScoreInput) -> i64 {
    let total = duration_score(input.minutes_asleep)
        + composition_score(input)
        + restoration_score(input);

    total.round() as i64
}

fn duration_score(minutes_asleep: i64) -> f64 {
    let hours = minutes_asleep as f64 / 60.0;
    if (7.0..=9.0).contains(&hours) {
        DURATION_POINTS
    } else if hours < 7.0 {
        DURATION_POINTS * (hours / 7.0).powf(1.15)
    } else {
        (DURATION_POINTS - (hours - 9.0) * 8.0).max(0.0)
    }
}

fn composition_score(input: &SleepScoreInput) -> f64 {
    let Some(stages) = input.stages else {
        return 20.0;
    };

    let deep_pct = percent_of(stages.deep, input.minutes_asleep);
    let rem_pct = percent_of(stages.rem, input.minutes_asleep);

    band_score(deep_pct, 13.0, 23.0) + band_score(rem_pct, 20.0, 25.0)
}

fn restoration_score(input: &SleepScoreInput) -> f64 {
    let efficiency = input.efficiency as f64 / 100.0;

    match input.stages {
        Some(stages) => {
            let wake_pct = percent_of(stages.wake, input.minutes_asleep);
            efficiency * 15.0 + (10.0 - wake_pct * 2.0).max(0.0)
        }
        None => efficiency * 25.0,
    }
}

fn band_score(pct: f64, low: f64, high: f64) -> f64 {
    if pct < low {
        STAGE_POINTS * (pct / low)
    } else if pct <= high {
        STAGE_POINTS
    } else {
        (STAGE_POINTS - (pct - high) * 1.5).max(0.0)
    }
}

fn percent_of(part: i64, whole: i64) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64 * 100.0
    } else {
        0.0
    }
}
