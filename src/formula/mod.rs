/// Formula layer: derive a new curve from saved ones, point by point.
///
/// ```text
///  "C1 + C2 / 2"
///        │
///        ▼
///   identifier scan ──▶ resolve against CurveRegistry (abort on unknown)
///        │
///        ▼
///   parser ──▶ Expr
///        │
///        ▼
///   eval at i = 0..len(first referenced curve)   (failing points dropped)
/// ```

pub mod parser;

use std::collections::HashMap;
use std::sync::OnceLock;

use log::{debug, warn};
use regex::Regex;
use serde::Serialize;

use crate::curves::{CurveRecord, CurveRegistry};
use crate::error::{CoreError, PointError, Result};
use crate::options::XAxisPolicy;

pub use parser::{parse, BinOp, Expr};

/// Label given to every derived curve.
pub const DERIVED_LABEL: &str = "calculated";

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"C\d+").expect("identifier pattern is valid"))
}

/// Curve identifiers in order of appearance, repeats included.
pub fn identifier_tokens(formula: &str) -> Vec<&str> {
    identifier_pattern()
        .find_iter(formula)
        .map(|m| m.as_str())
        .collect()
}

// ---------------------------------------------------------------------------
// DerivedCurve
// ---------------------------------------------------------------------------

/// A sample index that could not be evaluated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedPoint {
    pub index: usize,
    pub error: PointError,
}

/// Transient result of a formula; not stored in the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedCurve {
    pub label: String,
    pub formula: String,
    /// Identifier of the saved curve whose x values were borrowed.
    pub x_source: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub skipped: Vec<SkippedPoint>,
}

impl DerivedCurve {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Evaluate `formula` against the saved curves.
///
/// The number of samples is the length of the curve named by the first
/// identifier. Indices where evaluation fails are left out of the result.
pub fn evaluate(
    formula: &str,
    registry: &CurveRegistry,
    x_axis: XAxisPolicy,
) -> Result<DerivedCurve> {
    let tokens = identifier_tokens(formula);
    let Some(&anchor_id) = tokens.first() else {
        return Err(CoreError::EmptyFormulaAnchor);
    };

    let mut resolved: HashMap<&str, &CurveRecord> = HashMap::new();
    for &id in &tokens {
        let record = registry
            .get(id)
            .ok_or_else(|| CoreError::UnknownCurveIdentifier(id.to_string()))?;
        resolved.insert(id, record);
    }

    let expr = parse(formula)?;

    let anchor = resolved[anchor_id];
    let x_record = match x_axis {
        XAxisPolicy::FirstReferenced => anchor,
        XAxisPolicy::FirstRegistered => registry
            .records()
            .first()
            .ok_or(CoreError::EmptyFormulaAnchor)?,
    };

    let lookup = |id: &str, index: usize| -> std::result::Result<f64, PointError> {
        resolved
            .get(id)
            .and_then(|r| r.y.get(index).copied())
            .ok_or_else(|| PointError::MissingSample {
                curve: id.to_string(),
                index,
            })
    };

    let length = anchor.y.len();
    let mut x = Vec::with_capacity(length);
    let mut y = Vec::with_capacity(length);
    let mut skipped = Vec::new();

    for index in 0..length {
        let point = expr.eval(index, &lookup).and_then(|value| {
            x_record
                .x
                .get(index)
                .map(|&xv| (xv, value))
                .ok_or_else(|| PointError::MissingSample {
                    curve: x_record.id.clone(),
                    index,
                })
        });
        match point {
            Ok((xv, yv)) => {
                x.push(xv);
                y.push(yv);
            }
            Err(error) => {
                debug!("`{formula}` at index {index}: {error}");
                skipped.push(SkippedPoint { index, error });
            }
        }
    }

    if !skipped.is_empty() {
        warn!(
            "`{formula}`: {} of {length} points skipped",
            skipped.len()
        );
    }

    Ok(DerivedCurve {
        label: DERIVED_LABEL.to_string(),
        formula: formula.to_string(),
        x_source: x_record.id.clone(),
        x,
        y,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::data::model::{Column, Table};
    use crate::data::sources::SourceRegistry;

    /// Registry where file `<name>` has columns `t` and `v` with the given values.
    fn registry(curves: &[(&str, Vec<f64>, Vec<f64>)]) -> CurveRegistry {
        let mut sources = SourceRegistry::new();
        sources.add_sources(curves.iter().map(|(name, _, _)| format!("/d/{name}")));

        let mut registry = CurveRegistry::new();
        for (name, t, v) in curves {
            let (t, v) = (t.clone(), v.clone());
            registry
                .save_selection(&sources, &[*name], "t", "v", |path: &Path| {
                    Table::from_columns(
                        path,
                        vec![Column::new("t", t.clone()), Column::new("v", v.clone())],
                    )
                })
                .unwrap();
        }
        registry
    }

    #[test]
    fn scans_identifiers_in_order_with_repeats() {
        assert_eq!(
            identifier_tokens("C2 * (C10 - C2) / 3"),
            vec!["C2", "C10", "C2"]
        );
        assert!(identifier_tokens("1 + 2").is_empty());
    }

    #[test]
    fn adds_two_curves_pointwise() {
        let reg = registry(&[
            ("a.plt", vec![0.0, 1.0, 2.0], vec![1.0, 2.0, 3.0]),
            ("b.plt", vec![5.0, 6.0, 7.0], vec![10.0, 20.0, 30.0]),
        ]);
        let curve = evaluate("C1 + C2", &reg, XAxisPolicy::FirstRegistered).unwrap();
        assert_eq!(curve.y, vec![11.0, 22.0, 33.0]);
        assert_eq!(curve.x, vec![0.0, 1.0, 2.0]);
        assert_eq!(curve.label, "calculated");
        assert!(curve.skipped.is_empty());
    }

    #[test]
    fn unknown_identifier_aborts() {
        let reg = registry(&[("a.plt", vec![0.0], vec![1.0])]);
        let err = evaluate("C1 + C9", &reg, XAxisPolicy::FirstRegistered).unwrap_err();
        match err {
            CoreError::UnknownCurveIdentifier(id) => assert_eq!(id, "C9"),
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn formula_without_identifiers_has_no_anchor() {
        let reg = registry(&[("a.plt", vec![0.0], vec![1.0])]);
        assert!(matches!(
            evaluate("1 + 2", &reg, XAxisPolicy::FirstRegistered),
            Err(CoreError::EmptyFormulaAnchor)
        ));
    }

    #[test]
    fn division_by_zero_drops_only_that_point() {
        let reg = registry(&[
            ("a.plt", vec![0.0, 1.0, 2.0], vec![1.0, 2.0, 3.0]),
            ("b.plt", vec![0.0, 1.0, 2.0], vec![4.0, 0.0, 5.0]),
        ]);
        let curve = evaluate("C1 / C2", &reg, XAxisPolicy::FirstRegistered).unwrap();
        assert_eq!(curve.y, vec![0.25, 0.6]);
        assert_eq!(curve.x, vec![0.0, 2.0]);
        assert_eq!(
            curve.skipped,
            vec![SkippedPoint {
                index: 1,
                error: PointError::DivisionByZero
            }]
        );
    }

    #[test]
    fn length_follows_first_referenced_curve() {
        let reg = registry(&[
            ("a.plt", vec![0.0, 1.0, 2.0, 3.0], vec![1.0, 1.0, 1.0, 1.0]),
            ("b.plt", vec![0.0, 1.0], vec![2.0, 2.0]),
        ]);
        let short_first = evaluate("C2 + C1", &reg, XAxisPolicy::FirstRegistered).unwrap();
        assert_eq!(short_first.y, vec![3.0, 3.0]);

        let long_first = evaluate("C1 + C2", &reg, XAxisPolicy::FirstRegistered).unwrap();
        assert_eq!(long_first.y, vec![3.0, 3.0]);
        assert_eq!(long_first.skipped.len(), 2);
        assert!(matches!(
            long_first.skipped[0].error,
            PointError::MissingSample { ref curve, index: 2 } if curve == "C2"
        ));
    }

    #[test]
    fn x_axis_policy_selects_lending_curve() {
        let reg = registry(&[
            ("a.plt", vec![0.0, 1.0], vec![1.0, 2.0]),
            ("b.plt", vec![7.0, 8.0], vec![3.0, 4.0]),
        ]);
        let registered = evaluate("2 * C2", &reg, XAxisPolicy::FirstRegistered).unwrap();
        assert_eq!(registered.x_source, "C1");
        assert_eq!(registered.x, vec![0.0, 1.0]);

        let referenced = evaluate("2 * C2", &reg, XAxisPolicy::FirstReferenced).unwrap();
        assert_eq!(referenced.x_source, "C2");
        assert_eq!(referenced.x, vec![7.0, 8.0]);
        assert_eq!(referenced.y, vec![6.0, 8.0]);
    }

    #[test]
    fn deeply_nested_formula_is_reported_not_fatal() {
        let reg = registry(&[("a.plt", vec![0.0], vec![1.0])]);
        let formula = format!("{}C1{}", "(".repeat(200_000), ")".repeat(200_000));
        assert!(matches!(
            evaluate(&formula, &reg, XAxisPolicy::FirstRegistered),
            Err(CoreError::MalformedFormula { .. })
        ));
    }

    #[test]
    fn malformed_formula_yields_no_curve() {
        let reg = registry(&[("a.plt", vec![0.0], vec![1.0])]);
        assert!(matches!(
            evaluate("C1 +* 2", &reg, XAxisPolicy::FirstRegistered),
            Err(CoreError::MalformedFormula { .. })
        ));
    }
}
