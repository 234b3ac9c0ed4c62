//! Piecewise-linear KPI scoring over balance amounts. Each indicator maps a
//! ratio onto a 0..100 band used by downstream risk reports; ratios are
//! rounded to 6 decimals, scores to 1. Scoring reads plain amounts and knows
//! nothing about documents, retrieval or completion models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::{BalanceField, FieldSet, FieldValue};

/// Ratio/score pair for one indicator. Both absent when an input is missing
/// or a denominator is zero; both present otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiVal {
    pub ratio: Option<f64>,
    pub score: Option<f64>,
}

/// The six indicators persisted with a balance artifact, in report order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiReport {
    pub liquidez_corriente: KpiVal,
    pub prueba_acida: KpiVal,
    pub endeudamiento: KpiVal,
    pub solvencia: KpiVal,
    pub apalancamiento: KpiVal,
    pub capital_trabajo: KpiVal,
}

fn safe_div(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d),
        _ => None,
    }
}

fn cap_ratio(ratio: f64) -> f64 {
    (ratio * 1e6).round() / 1e6
}

fn round_score(score: f64) -> f64 {
    (score * 10.0).round() / 10.0
}

fn scored(ratio: f64, score: f64) -> KpiVal {
    KpiVal {
        ratio: Some(cap_ratio(ratio)),
        score: Some(round_score(score)),
    }
}

/// Liquidez corriente = activos corrientes / pasivos corrientes.
pub fn liquidez_corriente(
    current_assets: Option<f64>,
    current_liabilities: Option<f64>,
) -> KpiVal {
    let r = match safe_div(current_assets, current_liabilities) {
        Some(r) => r,
        None => return KpiVal::default(),
    };
    let score = if r < 1.0 {
        10.0
    } else if r <= 1.5 {
        50.0 + (r - 1.0) * (20.0 / 0.5)
    } else if r <= 3.0 {
        70.0 + (r - 1.5) * (25.0 / 1.5)
    } else {
        90.0
    };
    scored(r, score)
}

/// Prueba ácida = (activos corrientes - inventarios) / pasivos corrientes.
/// Missing inventories count as zero; missing assets or liabilities make the
/// indicator absent.
pub fn prueba_acida(
    current_assets: Option<f64>,
    inventories: Option<f64>,
    current_liabilities: Option<f64>,
) -> KpiVal {
    let assets = match current_assets {
        Some(assets) => assets,
        None => return KpiVal::default(),
    };
    let quick_assets = assets - inventories.unwrap_or(0.0);
    let r = match safe_div(Some(quick_assets), current_liabilities) {
        Some(r) => r,
        None => return KpiVal::default(),
    };
    let score = if r < 0.6 {
        15.0
    } else if r <= 0.8 {
        40.0 + (r - 0.6) * (20.0 / 0.2)
    } else if r <= 1.2 {
        60.0 + (r - 0.8) * (25.0 / 0.4)
    } else {
        90.0
    };
    scored(r, score)
}

/// Endeudamiento = pasivos totales / activos totales. Lower is better.
pub fn endeudamiento(total_liabilities: Option<f64>, total_assets: Option<f64>) -> KpiVal {
    let r = match safe_div(total_liabilities, total_assets) {
        Some(r) => r,
        None => return KpiVal::default(),
    };
    let score = if r > 0.8 {
        10.0
    } else if r > 0.6 {
        10.0 + (0.8 - r) * (20.0 / 0.2)
    } else if r > 0.4 {
        30.0 + (0.6 - r) * (30.0 / 0.2)
    } else if r > 0.2 {
        60.0 + (0.4 - r) * (25.0 / 0.2)
    } else {
        95.0
    };
    scored(r, score)
}

/// Solvencia = activos totales / pasivos totales.
pub fn solvencia(total_assets: Option<f64>, total_liabilities: Option<f64>) -> KpiVal {
    let r = match safe_div(total_assets, total_liabilities) {
        Some(r) => r,
        None => return KpiVal::default(),
    };
    let score = if r < 1.0 {
        10.0
    } else if r <= 1.5 {
        45.0 + (r - 1.0) * (20.0 / 0.5)
    } else if r <= 2.5 {
        65.0 + (r - 1.5) * (25.0 / 1.0)
    } else {
        92.0
    };
    scored(r, score)
}

/// Apalancamiento = pasivos totales / patrimonio, with patrimonio derived as
/// activos totales - pasivos totales. Absent when equity works out to zero.
pub fn apalancamiento(total_liabilities: Option<f64>, total_assets: Option<f64>) -> KpiVal {
    let (liabilities, assets) = match (total_liabilities, total_assets) {
        (Some(l), Some(a)) if a != 0.0 => (l, a),
        _ => return KpiVal::default(),
    };
    let equity = assets - liabilities;
    if equity == 0.0 {
        return KpiVal::default();
    }
    let r = liabilities / equity;
    let score = if r > 2.0 {
        10.0
    } else if r > 1.0 {
        30.0 + (2.0 - r) * (30.0 / 1.0)
    } else if r > 0.5 {
        60.0 + (1.0 - r) * (25.0 / 0.5)
    } else {
        92.0
    };
    scored(r, score)
}

/// Capital de trabajo = activos corrientes - pasivos corrientes. The "ratio"
/// is the amount itself; the score is a positive/non-positive split.
pub fn capital_trabajo(current_assets: Option<f64>, current_liabilities: Option<f64>) -> KpiVal {
    let (assets, liabilities) = match (current_assets, current_liabilities) {
        (Some(a), Some(l)) => (a, l),
        _ => return KpiVal::default(),
    };
    let working_capital = assets - liabilities;
    let score = if working_capital > 0.0 { 90.0 } else { 30.0 };
    KpiVal {
        ratio: Some(cap_ratio(working_capital)),
        score: Some(score),
    }
}

/// Score all six indicators from a balance field map. Only values
/// participate; confidences and evidence pages are ignored.
pub fn score_fields(fields: &BTreeMap<String, FieldValue>) -> KpiReport {
    let get = |field: BalanceField| fields.get(field.key()).and_then(|f| f.value);
    KpiReport {
        liquidez_corriente: liquidez_corriente(
            get(BalanceField::ActivosCorrientes),
            get(BalanceField::PasivosCorrientes),
        ),
        prueba_acida: prueba_acida(
            get(BalanceField::ActivosCorrientes),
            get(BalanceField::Inventarios),
            get(BalanceField::PasivosCorrientes),
        ),
        endeudamiento: endeudamiento(
            get(BalanceField::PasivosTotales),
            get(BalanceField::ActivosTotales),
        ),
        solvencia: solvencia(
            get(BalanceField::ActivosTotales),
            get(BalanceField::PasivosTotales),
        ),
        apalancamiento: apalancamiento(
            get(BalanceField::PasivosTotales),
            get(BalanceField::ActivosTotales),
        ),
        capital_trabajo: capital_trabajo(
            get(BalanceField::ActivosCorrientes),
            get(BalanceField::PasivosCorrientes),
        ),
    }
}
