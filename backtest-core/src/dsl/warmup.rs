//! Warmup-period extraction (§4.1 "Warmup extraction").
//!
//! The source system scans the *textual* strategy expression with a
//! regex — `(SMA|EMA|RSI|MACD|BBANDS|HIGH_OF|LOW_OF|AVG_VOLUME|ATR|
//! RANGE_POSITION)\((\d+(,\s*\d+)*)\)` — and takes the max of every
//! integer literal found inside those named functions' parentheses. This
//! reimplementation never sees source text: the entry/zone-exit
//! expression arrives already parsed as an `AstNode` (§1 non-goals: "parser
//! implementation, consumed as AST"). The AST-walk below collects the
//! same set of integers by visiting exactly the node kinds the regex's
//! named functions lower to, so the result is identical for any AST a
//! conforming parser would produce — see DESIGN.md for this Open Question
//! resolution.

use crate::dsl::ast::AstNode;

const DEFAULT_WARMUP: usize = 50;
const WARMUP_MARGIN: usize = 10;

/// The indicator names that contribute to warmup sizing, matching the
/// regex's alternation exactly (ADX/STOCHASTIC/PLUS_DI/MINUS_DI are
/// deliberately excluded, as they were in the source regex).
const WARMUP_INDICATOR_NAMES: &[&str] = &["SMA", "EMA", "RSI", "MACD", "BBANDS", "ATR"];

fn collect_periods(node: &AstNode, out: &mut Vec<u32>) {
    match node {
        AstNode::Comparison { left, right, .. }
        | AstNode::CrossComparison { left, right, .. }
        | AstNode::LogicalExpression { left, right, .. }
        | AstNode::ArithmeticExpression { left, right, .. } => {
            collect_periods(left, out);
            collect_periods(right, out);
        }
        AstNode::IndicatorCall { name, params } => {
            if WARMUP_INDICATOR_NAMES.contains(&name.as_str()) {
                out.extend(params.iter().map(|p| p.round() as u32));
            }
        }
        AstNode::PropertyAccess { indicator, .. } => collect_periods(indicator, out),
        AstNode::RangeFunctionCall { func, period, .. } => {
            if matches!(func.as_str(), "HIGH_OF" | "LOW_OF" | "RANGE_POSITION") {
                out.push(*period);
            }
        }
        AstNode::VolumeFunctionCall { func, period } => {
            if func == "AVG_VOLUME" {
                out.push(*period);
            }
        }
        AstNode::TimeFunctionCall { .. }
        | AstNode::MoonFunctionCall
        | AstNode::HolidayFunctionCall
        | AstNode::FomcFunctionCall
        | AstNode::OrderflowFunctionCall { .. }
        | AstNode::FundingFunctionCall { .. }
        | AstNode::SessionOrderflowFunctionCall { .. }
        | AstNode::OIFunctionCall { .. }
        | AstNode::PriceReference { .. }
        | AstNode::NumberLiteral { .. }
        | AstNode::BooleanLiteral { .. } => {}
    }
}

/// `max(extracted periods) + 10`, or `50` if no warmup-relevant indicator
/// appears in the expression.
pub fn warmup_bars(node: &AstNode) -> usize {
    let mut periods = Vec::new();
    collect_periods(node, &mut periods);
    match periods.into_iter().max() {
        Some(max) => max as usize + WARMUP_MARGIN,
        None => DEFAULT_WARMUP,
    }
}

/// Warmup across an entry AST plus every zone's optional exit AST: the max
/// of each, never less than `DEFAULT_WARMUP`.
pub fn warmup_bars_for_all<'a>(asts: impl IntoIterator<Item = &'a AstNode>) -> usize {
    asts.into_iter()
        .map(warmup_bars)
        .max()
        .unwrap_or(DEFAULT_WARMUP)
        .max(DEFAULT_WARMUP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::ast::{CompareOp, PriceField};

    #[test]
    fn no_indicators_falls_back_to_fifty() {
        let ast = AstNode::cmp(AstNode::price(PriceField::Close), CompareOp::Gt, AstNode::num(100.0));
        assert_eq!(warmup_bars(&ast), 50);
    }

    #[test]
    fn single_indicator_adds_margin() {
        let ast = AstNode::cmp(
            AstNode::IndicatorCall { name: "SMA".into(), params: vec![20.0] },
            CompareOp::Gt,
            AstNode::num(0.0),
        );
        assert_eq!(warmup_bars(&ast), 30);
    }

    #[test]
    fn takes_max_across_nested_indicators() {
        let left = AstNode::IndicatorCall { name: "SMA".into(), params: vec![20.0] };
        let right = AstNode::IndicatorCall { name: "EMA".into(), params: vec![200.0] };
        let ast = AstNode::logical(
            AstNode::cmp(left, CompareOp::Gt, AstNode::num(0.0)),
            crate::dsl::ast::LogicalOp::And,
            AstNode::cmp(right, CompareOp::Gt, AstNode::num(0.0)),
        );
        assert_eq!(warmup_bars(&ast), 210);
    }

    #[test]
    fn macd_multi_param_takes_largest() {
        let ast = AstNode::PropertyAccess {
            indicator: Box::new(AstNode::IndicatorCall {
                name: "MACD".into(),
                params: vec![12.0, 26.0, 9.0],
            }),
            property: crate::dsl::ast::IndicatorProperty::Line,
        };
        let wrapped = AstNode::cmp(ast, CompareOp::Gt, AstNode::num(0.0));
        assert_eq!(warmup_bars(&wrapped), 36);
    }

    #[test]
    fn non_warmup_indicators_excluded_like_source_regex() {
        let ast = AstNode::cmp(
            AstNode::IndicatorCall { name: "ADX".into(), params: vec![14.0] },
            CompareOp::Gt,
            AstNode::num(20.0),
        );
        assert_eq!(warmup_bars(&ast), 50);
    }
}
