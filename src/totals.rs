//! Totals derivation and scale application for balance extractions.
//! Filings frequently print the current/non-current breakdown but omit the
//! total line, so missing totals are reconstructed from their components
//! before any scale or KPI work happens.

use std::collections::BTreeMap;

use log::debug;

use crate::schema::{BalanceField, FieldSet, FieldValue};

/// Confidence assumed for a component that has a value but no confidence of
/// its own when a total is derived from it.
pub const DERIVED_COMPONENT_CONFIDENCE: f64 = 0.6;

/// Fill `activos_totales` and `pasivos_totales` when the extraction left them
/// empty but at least one component is present. A missing component counts as
/// 0.0 in the sum; the derived confidence is the minimum over the components.
/// Runs before `apply_scale` so derived totals are scaled exactly once, like
/// every other value.
pub fn derive_balance_totals(fields: &mut BTreeMap<String, FieldValue>) {
    derive_total(
        fields,
        BalanceField::ActivosTotales.key(),
        BalanceField::ActivosCorrientes.key(),
        BalanceField::ActivosNoCorrientes.key(),
    );
    derive_total(
        fields,
        BalanceField::PasivosTotales.key(),
        BalanceField::PasivosCorrientes.key(),
        BalanceField::PasivosNoCorrientes.key(),
    );
}

fn derive_total(
    fields: &mut BTreeMap<String, FieldValue>,
    total_key: &str,
    current_key: &str,
    non_current_key: &str,
) {
    if fields.get(total_key).and_then(|f| f.value).is_some() {
        return;
    }
    let current = fields.get(current_key).cloned().unwrap_or_default();
    let non_current = fields.get(non_current_key).cloned().unwrap_or_default();
    if current.value.is_none() && non_current.value.is_none() {
        return;
    }

    let value = current.value.unwrap_or(0.0) + non_current.value.unwrap_or(0.0);
    let confidence = current
        .confidence
        .unwrap_or(DERIVED_COMPONENT_CONFIDENCE)
        .min(non_current.confidence.unwrap_or(DERIVED_COMPONENT_CONFIDENCE));
    debug!("derived {total_key} = {value} from current/non-current components");

    // The entry keeps whatever evidence pages retrieval already attached to
    // the total's own hints.
    let entry = fields.entry(total_key.to_string()).or_default();
    entry.value = Some(value);
    entry.confidence = Some(confidence);
}

/// Multiply every populated value by the header scale factor. The caller
/// invokes this exactly once per document, after derivation.
pub fn apply_scale(fields: &mut BTreeMap<String, FieldValue>, scale_factor: f64) {
    for field in fields.values_mut() {
        if let Some(value) = field.value.as_mut() {
            *value *= scale_factor;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn value(v: f64, conf: f64) -> FieldValue {
        FieldValue {
            value: Some(v),
            confidence: Some(conf),
            evidence_pages: BTreeSet::new(),
        }
    }

    fn seeded() -> BTreeMap<String, FieldValue> {
        BalanceField::ALL
            .iter()
            .map(|f| (f.key().to_string(), FieldValue::default()))
            .collect()
    }

    #[test]
    fn test_total_derived_from_both_components() {
        let mut fields = seeded();
        fields.insert("activos_corrientes".into(), value(300.0, 0.9));
        fields.insert("activos_no_corrientes".into(), value(200.0, 0.7));
        derive_balance_totals(&mut fields);
        let total = &fields["activos_totales"];
        assert_eq!(total.value, Some(500.0));
        assert_eq!(total.confidence, Some(0.7));
    }

    #[test]
    fn test_total_derived_from_single_component() {
        let mut fields = seeded();
        fields.insert("pasivos_corrientes".into(), value(300.0, 0.8));
        derive_balance_totals(&mut fields);
        let total = &fields["pasivos_totales"];
        assert_eq!(total.value, Some(300.0));
        // The absent component contributes the 0.6 default to the minimum.
        assert_eq!(total.confidence, Some(0.6));
    }

    #[test]
    fn test_extracted_total_is_never_overwritten() {
        let mut fields = seeded();
        fields.insert("activos_totales".into(), value(999.0, 0.95));
        fields.insert("activos_corrientes".into(), value(300.0, 0.9));
        fields.insert("activos_no_corrientes".into(), value(200.0, 0.9));
        derive_balance_totals(&mut fields);
        assert_eq!(fields["activos_totales"].value, Some(999.0));
        assert_eq!(fields["activos_totales"].confidence, Some(0.95));
    }

    #[test]
    fn test_no_components_no_derivation() {
        let mut fields = seeded();
        derive_balance_totals(&mut fields);
        assert_eq!(fields["activos_totales"].value, None);
        assert_eq!(fields["activos_totales"].confidence, None);
    }

    #[test]
    fn test_zero_confidence_component_is_kept() {
        let mut fields = seeded();
        fields.insert("activos_corrientes".into(), value(100.0, 0.0));
        fields.insert("activos_no_corrientes".into(), value(50.0, 0.9));
        derive_balance_totals(&mut fields);
        assert_eq!(fields["activos_totales"].confidence, Some(0.0));
    }

    #[test]
    fn test_derived_total_keeps_its_retrieval_evidence() {
        let mut fields = seeded();
        fields.insert("activos_corrientes".into(), value(300.0, 0.9));
        let total = fields.get_mut("activos_totales").unwrap();
        total.evidence_pages.insert(2);
        derive_balance_totals(&mut fields);
        assert_eq!(fields["activos_totales"].value, Some(300.0));
        assert!(fields["activos_totales"].evidence_pages.contains(&2));
    }

    #[test]
    fn test_scale_applies_to_populated_values_only() {
        let mut fields = seeded();
        fields.insert("activos_totales".into(), value(500.0, 0.9));
        apply_scale(&mut fields, 1000.0);
        assert_eq!(fields["activos_totales"].value, Some(500_000.0));
        assert_eq!(fields["activos_totales"].confidence, Some(0.9));
        assert_eq!(fields["inventarios"].value, None);
    }

    #[test]
    fn test_scale_after_derivation_touches_totals_once() {
        let mut fields = seeded();
        fields.insert("activos_corrientes".into(), value(300.0, 0.9));
        fields.insert("activos_no_corrientes".into(), value(200.0, 0.9));
        derive_balance_totals(&mut fields);
        apply_scale(&mut fields, 1000.0);
        assert_eq!(fields["activos_corrientes"].value, Some(300_000.0));
        assert_eq!(fields["activos_totales"].value, Some(500_000.0));
    }
}
