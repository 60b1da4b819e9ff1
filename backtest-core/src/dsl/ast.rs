//! The strategy DSL as data (spec §4.2, design note "AST as data, not polymorphism").
//!
//! `AstNode` is a sum type folded over by `evaluator::evaluate`/`evaluate_numeric`;
//! there is no virtual dispatch and no parser here — a parsed AST is a foreign
//! collaborator's output, consumed as-is (spec §1 Non-goals).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossOp {
    CrossesAbove,
    CrossesBelow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Price,
    Volume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndicatorProperty {
    K,
    D,
    Upper,
    Middle,
    Lower,
    Line,
    Signal,
    Histogram,
}

/// A node in the strategy DSL's abstract syntax tree.
///
/// Boolean-valued variants (`Comparison`, `CrossComparison`, `LogicalExpression`,
/// `BooleanLiteral`) are evaluated by `evaluate`; everything else is numeric and
/// evaluated by `evaluate_numeric`. `evaluate` on a numeric-only node is a
/// `TypeError` (spec §4.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AstNode {
    Comparison {
        left: Box<AstNode>,
        op: CompareOp,
        right: Box<AstNode>,
    },
    CrossComparison {
        left: Box<AstNode>,
        op: CrossOp,
        right: Box<AstNode>,
    },
    LogicalExpression {
        left: Box<AstNode>,
        op: LogicalOp,
        right: Box<AstNode>,
    },
    ArithmeticExpression {
        left: Box<AstNode>,
        op: ArithOp,
        right: Box<AstNode>,
    },
    IndicatorCall {
        name: String,
        params: Vec<f64>,
    },
    PropertyAccess {
        indicator: Box<AstNode>,
        property: IndicatorProperty,
    },
    RangeFunctionCall {
        func: String,
        period: u32,
        skip: Option<u32>,
    },
    VolumeFunctionCall {
        func: String,
        period: u32,
    },
    TimeFunctionCall {
        func: String,
    },
    MoonFunctionCall,
    HolidayFunctionCall,
    FomcFunctionCall,
    OrderflowFunctionCall {
        func: String,
        period: Option<u32>,
        /// Notional threshold for `WHALE_*`/`LARGE_TRADE_COUNT`; unused by
        /// the other orderflow functions.
        threshold: Option<f64>,
    },
    FundingFunctionCall {
        func: String,
    },
    SessionOrderflowFunctionCall {
        func: String,
    },
    OIFunctionCall {
        func: String,
        period: Option<u32>,
    },
    PriceReference {
        field: PriceField,
    },
    NumberLiteral {
        value: f64,
    },
    BooleanLiteral {
        value: bool,
    },
}

impl AstNode {
    pub fn cmp(left: AstNode, op: CompareOp, right: AstNode) -> AstNode {
        AstNode::Comparison {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn cross(left: AstNode, op: CrossOp, right: AstNode) -> AstNode {
        AstNode::CrossComparison {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn logical(left: AstNode, op: LogicalOp, right: AstNode) -> AstNode {
        AstNode::LogicalExpression {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn arith(left: AstNode, op: ArithOp, right: AstNode) -> AstNode {
        AstNode::ArithmeticExpression {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn num(value: f64) -> AstNode {
        AstNode::NumberLiteral { value }
    }

    pub fn price(field: PriceField) -> AstNode {
        AstNode::PriceReference { field }
    }
}
