//! Feature extraction: projecting a transaction row onto the declared
//! feature list.
//!
//! The projection keeps only declared names, so it covers the declared set
//! exactly when its length equals the declared count. A table replaced after
//! the list was set fails that check instead of feeding the model a
//! different schema.

use crate::error::EvaluationError;
use crate::types::table::{Cell, TransactionTable};

/// Feature names used when the caller supplies none.
///
/// `tr_type`, `tr_state`, `tr_currency` and `user_country` are categorical
/// and must be encoded as numbers before the table is loaded; a text cell in
/// any feature column makes the check indeterminate.
pub const DEFAULT_FEATURES: [&str; 10] = [
    "tr_type",
    "tr_state",
    "tr_amount_gbp",
    "tr_currency",
    "user_country",
    "user_age",
    "account_age",
    "tr_day",
    "tr_weekday",
    "tr_hour",
];

/// The subset of a transaction's columns fed to the model, in declared order
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    names: Vec<String>,
    values: Vec<Cell>,
}

impl FeatureRow {
    pub fn new(names: Vec<String>, values: Vec<Cell>) -> Self {
        debug_assert_eq!(names.len(), values.len());
        Self { names, values }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Numeric feature vector in declared order
    pub fn to_f64(&self) -> Result<Vec<f64>, EvaluationError> {
        self.names
            .iter()
            .zip(&self.values)
            .map(|(name, cell)| {
                cell.as_f64().ok_or_else(|| EvaluationError::NonNumericFeature {
                    feature: name.clone(),
                })
            })
            .collect()
    }

    /// Numeric feature vector as `f32`, the ONNX input type
    pub fn to_f32(&self) -> Result<Vec<f32>, EvaluationError> {
        Ok(self.to_f64()?.into_iter().map(|v| v as f32).collect())
    }
}

/// Projects table rows onto a feature list.
pub struct FeatureExtractor<'a> {
    features: &'a [String],
}

impl<'a> FeatureExtractor<'a> {
    pub fn new(features: &'a [String]) -> Self {
        Self { features }
    }

    /// Extract the declared features from one row.
    ///
    /// Declared names absent from the table are dropped from the projection
    /// and then caught by the count check.
    pub fn extract(
        &self,
        table: &TransactionTable,
        row_index: usize,
    ) -> Result<FeatureRow, EvaluationError> {
        let row = table.row(row_index).unwrap_or(&[]);

        let (names, values): (Vec<String>, Vec<Cell>) = self
            .features
            .iter()
            .filter_map(|name| {
                let idx = table.column_index(name)?;
                row.get(idx).map(|cell| (name.clone(), cell.clone()))
            })
            .unzip();

        if names.len() != self.features.len() {
            return Err(EvaluationError::FeatureCountMismatch {
                got: names.len(),
                expected: self.features.len(),
            });
        }

        Ok(FeatureRow::new(names, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TransactionTable {
        TransactionTable::new(
            vec!["tr_id".into(), "amount".into(), "age".into(), "currency".into()],
            vec![vec!["T1".into(), Cell::Number(12.5), Cell::Number(30.0), "GBP".into()]],
        )
    }

    #[test]
    fn test_extract_preserves_declared_order() {
        let features = vec!["age".to_string(), "amount".to_string()];
        let row = FeatureExtractor::new(&features).extract(&table(), 0).unwrap();

        assert_eq!(row.names(), &["age", "amount"]);
        assert_eq!(row.to_f64().unwrap(), vec![30.0, 12.5]);
        assert_eq!(row.to_f32().unwrap(), vec![30.0_f32, 12.5_f32]);
    }

    #[test]
    fn test_missing_column_is_count_mismatch() {
        let features = vec!["age".to_string(), "gone".to_string()];
        let err = FeatureExtractor::new(&features)
            .extract(&table(), 0)
            .unwrap_err();

        assert_eq!(
            err,
            EvaluationError::FeatureCountMismatch {
                got: 1,
                expected: 2
            }
        );
    }

    #[test]
    fn test_text_feature_is_not_numeric() {
        let features = vec!["currency".to_string()];
        let row = FeatureExtractor::new(&features).extract(&table(), 0).unwrap();

        assert!(matches!(
            row.to_f64(),
            Err(EvaluationError::NonNumericFeature { feature }) if feature == "currency"
        ));
    }

    #[test]
    fn test_full_projection_covers_declared_list() {
        let features = vec!["amount".to_string(), "age".to_string(), "amount".to_string()];
        let row = FeatureExtractor::new(&features).extract(&table(), 0).unwrap();

        assert_eq!(row.names(), features.as_slice());
        assert_eq!(row.to_f64().unwrap(), vec![12.5, 30.0, 12.5]);
    }

    #[test]
    fn test_default_feature_count() {
        assert_eq!(DEFAULT_FEATURES.len(), 10);
    }

    #[test]
    fn test_unencoded_categorical_default_feature_is_rejected() {
        let features: Vec<String> = DEFAULT_FEATURES.iter().map(|f| f.to_string()).collect();
        let mut values: Vec<Cell> = vec!["T1".into()];
        values.extend(DEFAULT_FEATURES.iter().map(|f| match *f {
            "tr_currency" => Cell::from("GBP"),
            _ => Cell::Number(1.0),
        }));
        let mut columns = vec!["tr_id".to_string()];
        columns.extend(features.iter().cloned());
        let table = TransactionTable::new(columns, vec![values]);

        let row = FeatureExtractor::new(&features).extract(&table, 0).unwrap();
        assert!(matches!(
            row.to_f64(),
            Err(EvaluationError::NonNumericFeature { feature }) if feature == "tr_currency"
        ));
    }
}
