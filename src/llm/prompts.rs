// Prompts for schema-bound statement extraction. Label vocabulary stays in
// Spanish because that is what SCVS filings print.

use std::collections::BTreeMap;

use crate::retrieval::FieldContext;
use crate::schema::DocumentType;

pub const BALANCE_SYSTEM_PROMPT: &str = r#"
You are an accounting analyst working over Ecuadorian SCVS filings.

## MISSION
1. Decide whether the document is an ESTADO DE SITUACIÓN FINANCIERA (balance sheet).
2. Extract amounts ONLY for the requested fields.
3. Answer ONLY with strict JSON matching the provided schema, with no extra text.

## RULES
- Use ONLY the context block provided for EACH field; never mix blocks between fields.
- Never invent values: when unsure, answer null with a low confidence (e.g. 0.3).
- Normalize numbers to the 1234.56 format (decimal point).
- If totals are missing but 'corriente' and/or 'no corriente' lines exist, compute total = (corriente or 0) + (no_corriente or 0).
- For 'inventarios' take the balance-sheet line, never income or cash-flow lines.
- Recognize label variants with or without accents (ACTIVO/PASIVO CORRIENTE, NO CORRIENTE, 1 ACTIVO, 2 PASIVO, 3 PATRIMONIO, TOTAL ACTIVO/PASIVO).
"#;

pub const INCOME_SYSTEM_PROMPT: &str = r#"
You are an accounting analyst working over Ecuadorian SCVS filings.

## MISSION
1. Decide whether the document is an ESTADO DE RESULTADO INTEGRAL (income statement).
2. Extract ONLY: ventas, costo_ventas, utilidad_neta and, when printed, inventario_inicial / inventario_final.
3. Answer ONLY with strict JSON matching the provided schema, with no extra text.

## RULES
- Use ONLY the context block of the matching field.
- Prefer lines carrying SCVS codes:
  - ventas: 401xx codes or the total labelled 'VENTAS' / 'INGRESOS DE ACTIVIDADES ORDINARIAS'.
  - costo_ventas: code 501 (the total) or 'COSTO DE VENTAS' / 'COSTO DE VENTAS Y PRODUCCIÓN'.
  - utilidad_neta: code 707 'GANANCIA (PÉRDIDA) NETA DEL PERIODO'. Keep the sign, negative when a loss.
- Inventories are optional and feed the average-inventory computation:
  - Look for 'INVENTARIO INICIAL' and 'INVENTARIO FINAL' inside the cost-of-sales block.
  - Exclude 'MATERIA PRIMA' and 'PRODUCTOS EN PROCESO' variants; only goods held for sale qualify.
  - When the presentation carries a sign by convention (e.g. a negative closing inventory), answer the ABSOLUTE value.
- Normalize numbers to the 1234.56 format.
- When a field has no clear evidence in its context, answer null with a low confidence (e.g. 0.3).
"#;

pub const CASH_FLOW_SYSTEM_PROMPT: &str = r#"
You are an accounting analyst working over Ecuadorian SCVS filings.

## MISSION
1. Decide whether the document is an ESTADO DE FLUJO DE EFECTIVO (cash-flow statement).
2. Extract ONLY:
   - flujo_operacion (operating total): EXACT code 9501 (4 digits), never 950101.. nor other subtotals.
   - neto_efectivo (net increase/decrease of cash): EXACT code 9505.
   - efectivo_inicio: EXACT code 9506.
   - efectivo_final: EXACT code 9507.
   - intereses_pagados: EXACT code 950105, when printed.
   - intereses_recibidos: EXACT code 950106, when printed.
   - impuestos_pagados: EXACT code 950107, when printed.
3. Answer ONLY with strict JSON matching the provided schema, with no extra text.

## RULES
- Use ONLY the context block of the matching field.
- For the totals pick the line whose code matches EXACTLY: 4 digits for 9501/9505/9506/9507, 6 digits for 950105/950106/950107.
- Never confuse other payment lines (e.g. 95010205) with 9501.
- Normalize numbers to the 1234.56 format.
- When the field is not explicitly printed, answer null with a low confidence (e.g. 0.3).
"#;

pub fn system_prompt(document_type: DocumentType) -> &'static str {
    match document_type {
        DocumentType::Balance => BALANCE_SYSTEM_PROMPT,
        DocumentType::Income => INCOME_SYSTEM_PROMPT,
        DocumentType::CashFlow => CASH_FLOW_SYSTEM_PROMPT,
    }
}

/// Build the user prompt: one `[key]` context block per requested field, in
/// the given order, then the contract schema as format instructions. Fields
/// without retrieved context still get their block, empty.
pub fn field_extraction_prompt(
    keys: &[&str],
    contexts: &BTreeMap<String, FieldContext>,
    schema_json: &str,
) -> String {
    let mut prompt = String::from(
        "Extract the fields below. For each field, use ONLY its own context block.\n",
    );
    for key in keys {
        let context = contexts
            .get(*key)
            .map(|c| c.context.as_str())
            .unwrap_or_default();
        prompt.push_str("\n[");
        prompt.push_str(key);
        prompt.push_str("]\n");
        prompt.push_str(context);
        prompt.push('\n');
    }
    prompt.push_str("\nAnswer ONLY with JSON matching this schema:\n");
    prompt.push_str(schema_json);
    prompt
}
