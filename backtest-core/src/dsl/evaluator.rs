//! The per-bar AST fold evaluator (§4.2).
//!
//! `evaluate` folds a boolean-valued node to `bool`; `evaluate_numeric`
//! folds any node to `f64`, with NaN propagating as "unknown" rather than
//! raising. There is no virtual dispatch — every variant is handled by a
//! single `match`, per the design note "AST as data, not polymorphism".

use thiserror::Error;

use crate::dsl::ast::{ArithOp, AstNode, CompareOp, CrossOp, IndicatorProperty, LogicalOp, PriceField};
use crate::indicators::IndicatorEngine;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("expected a boolean-valued expression, found a numeric node")]
    TypeError,
}

/// Equality tolerance for `Comparison { op: Eq, .. }` (§4.2).
const EQ_EPSILON: f64 = 1e-7;

pub struct Evaluator<'a> {
    engine: &'a IndicatorEngine,
}

impl<'a> Evaluator<'a> {
    pub fn new(engine: &'a IndicatorEngine) -> Self {
        Self { engine }
    }

    /// Top-level boolean evaluation. Fails with `TypeError` when `node` is
    /// not one of the boolean-valued variants (§4.2).
    pub fn evaluate(&self, node: &AstNode, bar_index: usize) -> Result<bool, EvalError> {
        match node {
            AstNode::Comparison { left, op, right } => {
                let l = self.evaluate_numeric(left, bar_index);
                let r = self.evaluate_numeric(right, bar_index);
                Ok(compare(l, *op, r))
            }
            AstNode::CrossComparison { left, op, right } => Ok(self.evaluate_cross(left, *op, right, bar_index)),
            AstNode::LogicalExpression { left, op, right } => match op {
                LogicalOp::And => {
                    if !self.evaluate(left, bar_index)? {
                        Ok(false)
                    } else {
                        self.evaluate(right, bar_index)
                    }
                }
                LogicalOp::Or => {
                    if self.evaluate(left, bar_index)? {
                        Ok(true)
                    } else {
                        self.evaluate(right, bar_index)
                    }
                }
            },
            AstNode::BooleanLiteral { value } => Ok(*value),
            _ => Err(EvalError::TypeError),
        }
    }

    fn evaluate_cross(&self, left: &AstNode, op: CrossOp, right: &AstNode, bar_index: usize) -> bool {
        if bar_index < 1 {
            return false;
        }
        let lc = self.evaluate_numeric(left, bar_index);
        let rc = self.evaluate_numeric(right, bar_index);
        let lp = self.evaluate_numeric(left, bar_index - 1);
        let rp = self.evaluate_numeric(right, bar_index - 1);
        if lc.is_nan() || rc.is_nan() || lp.is_nan() || rp.is_nan() {
            return false;
        }
        match op {
            CrossOp::CrossesAbove => lp <= rp && lc > rc,
            CrossOp::CrossesBelow => lp >= rp && lc < rc,
        }
    }

    /// Numeric evaluation: NaN propagates through arithmetic and indicator
    /// lookups rather than raising; boolean-valued subtrees coerce to
    /// `1.0`/`0.0`.
    pub fn evaluate_numeric(&self, node: &AstNode, bar_index: usize) -> f64 {
        match node {
            AstNode::ArithmeticExpression { left, op, right } => {
                let l = self.evaluate_numeric(left, bar_index);
                let r = self.evaluate_numeric(right, bar_index);
                match op {
                    ArithOp::Add => l + r,
                    ArithOp::Sub => l - r,
                    ArithOp::Mul => l * r,
                    ArithOp::Div => {
                        if r == 0.0 {
                            f64::NAN
                        } else {
                            l / r
                        }
                    }
                }
            }
            AstNode::IndicatorCall { name, params } => self.indicator_value(name, params, bar_index),
            AstNode::PropertyAccess { indicator, property } => self.property_value(indicator, *property, bar_index),
            AstNode::RangeFunctionCall { func, period, skip } => {
                let idx = bar_index.saturating_sub(skip.unwrap_or(0) as usize);
                match func.as_str() {
                    "HIGH_OF" => self.engine.high_of(*period as usize, idx),
                    "LOW_OF" => self.engine.low_of(*period as usize, idx),
                    "RANGE_POSITION" => self.engine.range_position(*period as usize, idx),
                    _ => f64::NAN,
                }
            }
            AstNode::VolumeFunctionCall { func, period } => match func.as_str() {
                "AVG_VOLUME" => self.engine.avg_volume(*period as usize, bar_index),
                _ => f64::NAN,
            },
            AstNode::TimeFunctionCall { func } => match func.as_str() {
                "DAYOFWEEK" => self.engine.day_of_week(bar_index),
                "HOUR" => self.engine.hour(bar_index),
                "DAY" => self.engine.day(bar_index),
                "MONTH" => self.engine.month(bar_index),
                _ => f64::NAN,
            },
            AstNode::MoonFunctionCall => self.engine.moon_phase(bar_index),
            AstNode::HolidayFunctionCall => bool_to_f64(self.engine.is_us_holiday(bar_index)),
            AstNode::FomcFunctionCall => bool_to_f64(self.engine.is_fomc_meeting(bar_index)),
            AstNode::OrderflowFunctionCall { func, period, threshold } => {
                self.orderflow_value(func, *period, *threshold, bar_index)
            }
            AstNode::FundingFunctionCall { func } => match func.as_str() {
                "FUNDING" => self.engine.funding(bar_index),
                "FUNDING_8H" => self.engine.funding_8h(bar_index),
                _ => f64::NAN,
            },
            AstNode::SessionOrderflowFunctionCall { func } => match func.as_str() {
                "TODAY_POC" => self.engine.session_poc(bar_index),
                "TODAY_VAH" => self.engine.session_vah(bar_index),
                "TODAY_VAL" => self.engine.session_val(bar_index),
                "PREV_DAY_POC" => self.engine.prev_day_poc(bar_index),
                "PREV_DAY_VAH" => self.engine.prev_day_vah(bar_index),
                "PREV_DAY_VAL" => self.engine.prev_day_val(bar_index),
                _ => f64::NAN,
            },
            AstNode::OIFunctionCall { func, period } => match func.as_str() {
                "OI" => self.engine.oi(bar_index),
                "OI_CHANGE" => self.engine.oi_change(bar_index),
                "OI_DELTA" => self.engine.oi_delta(period.unwrap_or(1) as usize, bar_index),
                _ => f64::NAN,
            },
            AstNode::PriceReference { field } => self.price_value(*field, bar_index),
            AstNode::NumberLiteral { value } => *value,
            AstNode::BooleanLiteral { value } => bool_to_f64(*value),
            AstNode::Comparison { .. } | AstNode::CrossComparison { .. } | AstNode::LogicalExpression { .. } => {
                self.evaluate(node, bar_index).map(bool_to_f64).unwrap_or(f64::NAN)
            }
        }
    }

    fn price_value(&self, field: PriceField, bar_index: usize) -> f64 {
        match self.engine.candles().get(bar_index) {
            Some(c) => match field {
                PriceField::Open => c.open,
                PriceField::High => c.high,
                PriceField::Low => c.low,
                PriceField::Close | PriceField::Price => c.close,
                PriceField::Volume => c.volume,
            },
            None => f64::NAN,
        }
    }

    fn indicator_value(&self, name: &str, params: &[f64], bar_index: usize) -> f64 {
        let p = |i: usize, default: f64| params.get(i).copied().unwrap_or(default);
        match name {
            "SMA" => self.engine.sma(p(0, 0.0) as usize, bar_index),
            "EMA" => self.engine.ema(p(0, 0.0) as usize, bar_index),
            "RSI" => self.engine.rsi(p(0, 14.0) as usize, bar_index),
            "ATR" => self.engine.atr(p(0, 14.0) as usize, bar_index),
            "ADX" => self.engine.adx(p(0, 14.0) as usize, bar_index),
            "PLUS_DI" => self.engine.plus_di(p(0, 14.0) as usize, bar_index),
            "MINUS_DI" => self.engine.minus_di(p(0, 14.0) as usize, bar_index),
            // Bare call with no `.k`/`.d` property defaults to `%K`.
            "STOCHASTIC" => self.engine.stochastic_k(p(0, 14.0) as usize, p(1, 3.0) as usize, bar_index),
            // Bare call with no `.upper`/`.middle`/`.lower` property defaults to the middle band.
            "BBANDS" => self.engine.bbands_middle(p(0, 20.0) as usize, p(1, 2.0), bar_index),
            // Bare call with no `.line`/`.signal`/`.histogram` property defaults to the MACD line.
            "MACD" => self.engine.macd_line(p(0, 12.0) as usize, p(1, 26.0) as usize, p(2, 9.0) as usize, bar_index),
            _ => f64::NAN,
        }
    }

    fn property_value(&self, indicator: &AstNode, property: IndicatorProperty, bar_index: usize) -> f64 {
        let AstNode::IndicatorCall { name, params } = indicator else {
            return f64::NAN;
        };
        let p = |i: usize, default: f64| params.get(i).copied().unwrap_or(default);
        match (name.as_str(), property) {
            ("STOCHASTIC", IndicatorProperty::K) => self.engine.stochastic_k(p(0, 14.0) as usize, p(1, 3.0) as usize, bar_index),
            ("STOCHASTIC", IndicatorProperty::D) => self.engine.stochastic_d(p(0, 14.0) as usize, p(1, 3.0) as usize, bar_index),
            ("BBANDS", IndicatorProperty::Upper) => self.engine.bbands_upper(p(0, 20.0) as usize, p(1, 2.0), bar_index),
            ("BBANDS", IndicatorProperty::Middle) => self.engine.bbands_middle(p(0, 20.0) as usize, p(1, 2.0), bar_index),
            ("BBANDS", IndicatorProperty::Lower) => self.engine.bbands_lower(p(0, 20.0) as usize, p(1, 2.0), bar_index),
            ("MACD", IndicatorProperty::Line) => {
                self.engine.macd_line(p(0, 12.0) as usize, p(1, 26.0) as usize, p(2, 9.0) as usize, bar_index)
            }
            ("MACD", IndicatorProperty::Signal) => {
                self.engine.macd_signal(p(0, 12.0) as usize, p(1, 26.0) as usize, p(2, 9.0) as usize, bar_index)
            }
            ("MACD", IndicatorProperty::Histogram) => {
                self.engine.macd_histogram(p(0, 12.0) as usize, p(1, 26.0) as usize, p(2, 9.0) as usize, bar_index)
            }
            _ => f64::NAN,
        }
    }

    fn orderflow_value(&self, func: &str, period: Option<u32>, threshold: Option<f64>, bar_index: usize) -> f64 {
        let period = period.unwrap_or(20) as usize;
        let threshold = threshold.unwrap_or(0.0);
        match func {
            "VWAP" => self.engine.vwap(period, bar_index),
            "POC" => self.engine.poc(period, bar_index),
            "VAH" => self.engine.vah(period, bar_index),
            "VAL" => self.engine.val(period, bar_index),
            "DELTA" => self.engine.delta(bar_index),
            "CUM_DELTA" => self.engine.cum_delta(bar_index),
            "WHALE_BUY_VOLUME" => self.engine.whale_buy_volume(threshold, period, bar_index),
            "WHALE_SELL_VOLUME" => self.engine.whale_sell_volume(threshold, period, bar_index),
            "LARGE_TRADE_COUNT" => self.engine.large_trade_count(threshold, period, bar_index),
            _ => f64::NAN,
        }
    }
}

fn compare(left: f64, op: CompareOp, right: f64) -> bool {
    if left.is_nan() || right.is_nan() {
        return false;
    }
    match op {
        CompareOp::Lt => left < right,
        CompareOp::Gt => left > right,
        CompareOp::Le => left <= right,
        CompareOp::Ge => left >= right,
        CompareOp::Eq => (left - right).abs() < EQ_EPSILON,
    }
}

fn bool_to_f64(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Candle;
    use crate::dsl::ast::LogicalOp;

    fn candles() -> Vec<Candle> {
        (0..10)
            .map(|i| Candle {
                timestamp: i as i64 * 60_000,
                open: 100.0 + i as f64,
                high: 101.0 + i as f64,
                low: 99.0 + i as f64,
                close: 100.0 + i as f64,
                volume: 10.0,
            })
            .collect()
    }

    #[test]
    fn comparison_with_nan_operand_is_false() {
        let engine = IndicatorEngine::new(candles());
        let eval = Evaluator::new(&engine);
        let ast = AstNode::cmp(
            AstNode::IndicatorCall { name: "SMA".into(), params: vec![200.0] },
            CompareOp::Gt,
            AstNode::num(0.0),
        );
        assert!(!eval.evaluate(&ast, 5).unwrap());
    }

    #[test]
    fn cross_comparison_false_before_bar_one() {
        let engine = IndicatorEngine::new(candles());
        let eval = Evaluator::new(&engine);
        let ast = AstNode::cross(
            AstNode::price(PriceField::Close),
            CrossOp::CrossesAbove,
            AstNode::num(0.0),
        );
        assert!(!eval.evaluate(&ast, 0).unwrap());
    }

    #[test]
    fn crosses_above_detects_transition() {
        let engine = IndicatorEngine::new(candles());
        let eval = Evaluator::new(&engine);
        // close[i] = 100+i, strictly increasing: close crosses above 104 at bar 5.
        let ast = AstNode::cross(AstNode::price(PriceField::Close), CrossOp::CrossesAbove, AstNode::num(104.0));
        assert!(eval.evaluate(&ast, 5).unwrap());
        assert!(!eval.evaluate(&ast, 6).unwrap());
    }

    #[test]
    fn logical_and_short_circuits_on_false_left() {
        let engine = IndicatorEngine::new(candles());
        let eval = Evaluator::new(&engine);
        let ast = AstNode::logical(
            AstNode::BooleanLiteral { value: false },
            LogicalOp::And,
            AstNode::BooleanLiteral { value: true },
        );
        assert!(!eval.evaluate(&ast, 0).unwrap());
    }

    #[test]
    fn division_by_zero_is_nan_not_panic() {
        let engine = IndicatorEngine::new(candles());
        let eval = Evaluator::new(&engine);
        let ast = AstNode::arith(AstNode::num(1.0), ArithOp::Div, AstNode::num(0.0));
        assert!(eval.evaluate_numeric(&ast, 0).is_nan());
    }

    #[test]
    fn top_level_numeric_node_is_type_error() {
        let engine = IndicatorEngine::new(candles());
        let eval = Evaluator::new(&engine);
        let ast = AstNode::num(1.0);
        assert_eq!(eval.evaluate(&ast, 0), Err(EvalError::TypeError));
    }

    #[test]
    fn equality_uses_epsilon_tolerance() {
        let engine = IndicatorEngine::new(candles());
        let eval = Evaluator::new(&engine);
        let ast = AstNode::cmp(AstNode::num(1.0), CompareOp::Eq, AstNode::num(1.0 + 1e-8));
        assert!(eval.evaluate(&ast, 0).unwrap());
    }
}
