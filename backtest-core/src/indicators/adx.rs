//! ADX, +DI, -DI — Wilder's Average Directional Index.
//!
//! 1. `+DM`/`-DM` from consecutive highs/lows. 2. Wilder-smooth `+DM`, `-DM`,
//! and `TR`. 3. `+DI = 100 * smoothed(+DM) / smoothed(TR)`, same for `-DI`.
//! 4. `DX = 100 * |+DI - -DI| / (+DI + -DI)`. 5. `ADX` = Wilder-smoothed `DX`.
//! Grounded on the teacher's `indicators::adx::Adx`.

use crate::domain::Candle;
use crate::indicators::atr::{true_range, wilder_smooth};

struct DirectionalMovement {
    plus_di: Vec<f64>,
    minus_di: Vec<f64>,
}

fn directional_movement(candles: &[Candle], period: usize) -> DirectionalMovement {
    let n = candles.len();
    let mut plus_dm = vec![f64::NAN; n];
    let mut minus_dm = vec![f64::NAN; n];

    for i in 1..n {
        let high_diff = candles[i].high - candles[i - 1].high;
        let low_diff = candles[i - 1].low - candles[i].low;
        if candles[i].high.is_nan()
            || candles[i].low.is_nan()
            || candles[i - 1].high.is_nan()
            || candles[i - 1].low.is_nan()
        {
            continue;
        }
        plus_dm[i] = if high_diff > low_diff && high_diff > 0.0 {
            high_diff
        } else {
            0.0
        };
        minus_dm[i] = if low_diff > high_diff && low_diff > 0.0 {
            low_diff
        } else {
            0.0
        };
    }

    let tr = true_range(candles);
    let smooth_tr = wilder_smooth(&tr, period);
    let smooth_plus = wilder_smooth(&plus_dm, period);
    let smooth_minus = wilder_smooth(&minus_dm, period);

    let mut plus_di = vec![f64::NAN; n];
    let mut minus_di = vec![f64::NAN; n];
    for i in 0..n {
        if smooth_tr[i].is_nan() || smooth_tr[i] == 0.0 {
            continue;
        }
        if !smooth_plus[i].is_nan() {
            plus_di[i] = 100.0 * smooth_plus[i] / smooth_tr[i];
        }
        if !smooth_minus[i].is_nan() {
            minus_di[i] = 100.0 * smooth_minus[i] / smooth_tr[i];
        }
    }

    DirectionalMovement { plus_di, minus_di }
}

pub fn plus_di(candles: &[Candle], period: usize) -> Vec<f64> {
    directional_movement(candles, period).plus_di
}

pub fn minus_di(candles: &[Candle], period: usize) -> Vec<f64> {
    directional_movement(candles, period).minus_di
}

pub fn adx(candles: &[Candle], period: usize) -> Vec<f64> {
    let dm = directional_movement(candles, period);
    let n = candles.len();
    let mut dx = vec![f64::NAN; n];
    for i in 0..n {
        if dm.plus_di[i].is_nan() || dm.minus_di[i].is_nan() {
            continue;
        }
        let sum = dm.plus_di[i] + dm.minus_di[i];
        dx[i] = if sum == 0.0 {
            0.0
        } else {
            100.0 * (dm.plus_di[i] - dm.minus_di[i]).abs() / sum
        };
    }
    wilder_smooth(&dx, period)
}
