//! Receipt calculation logic
//!
//! Ratios, reactor distribution and multi-receipt aggregation. Everything
//! here is a pure function of its arguments: results are recomputed on
//! demand and never cached.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{
    Chemical, ChemicalFields, ChemicalQuantitySet, RatioSet, ReactorCalculation, Receipt,
};

/// Leading number in the style of `parseFloat`: sign, digits, fraction, exponent
static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?")
        .expect("leading number pattern is valid")
});

/// Parse a chemical quantity as entered by a user.
///
/// Leading whitespace is skipped and the longest numeric prefix is used, so
/// `"12kg"` reads as 12. Empty, non-numeric or non-finite input reads as 0;
/// this never fails, and an invalid entry is indistinguishable from an
/// explicit zero.
pub fn parse_chemical_value(text: &str) -> f64 {
    let value = LEADING_NUMBER
        .find(text.trim_start())
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0);

    if value.is_finite() { value } else { 0.0 }
}

/// Sum of the parsed chemical fields, stored on the receipt as `kilos`
pub fn receipt_kilos(fields: &ChemicalFields) -> f64 {
    fields.quantities().total()
}

/// Each chemical's share of the total. A zero total yields all-zero ratios.
pub fn ratios(values: &ChemicalQuantitySet) -> RatioSet {
    let total = values.total();
    let share = |value: f64| if total > 0.0 { value / total } else { 0.0 };

    RatioSet {
        dmp: share(values.dmp),
        h3po4: share(values.h3po4),
        color: share(values.color),
        yellow: share(values.yellow),
        blue: share(values.blue),
    }
}

/// Distribute `total_input * multiplier` across the chemicals by ratio.
///
/// Returns one entry per chemical in declaration order. Inputs are not
/// validated: negative or zero loads produce zero or negative values.
pub fn distribute(
    values: &ChemicalQuantitySet,
    total_input: f64,
    multiplier: f64,
) -> Vec<ReactorCalculation> {
    let ratios = ratios(values);

    Chemical::ALL
        .iter()
        .map(|&chemical| {
            let ratio = ratios.get(chemical);
            ReactorCalculation {
                chemical,
                original_value: values.get(chemical),
                ratio,
                distributed_value: total_input * ratio * multiplier,
            }
        })
        .collect()
}

/// Sum distributed values per chemical across several distributions.
///
/// Output order is first-seen. `original_value` and `ratio` are those of
/// the first entry seen for each chemical and carry no meaning once summed.
pub fn aggregate(lists: &[Vec<ReactorCalculation>]) -> Vec<ReactorCalculation> {
    let mut combined: Vec<ReactorCalculation> = Vec::new();

    for entry in lists.iter().flatten() {
        match combined.iter_mut().find(|c| c.chemical == entry.chemical) {
            Some(existing) => existing.distributed_value += entry.distributed_value,
            None => combined.push(*entry),
        }
    }

    combined
}

/// Reactor input as gathered from the user
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReactorLoad {
    pub total_input: f64,
    pub multiplier: f64,
}

/// One receipt with its ratios and, optionally, a reactor distribution
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptSummary {
    pub id: String,
    pub name: String,
    pub kilos: f64,
    pub litre: String,
    pub quantities: ChemicalQuantitySet,
    pub ratios: RatioSet,
    pub distribution: Option<(ReactorLoad, Vec<ReactorCalculation>)>,
}

pub fn summarize_receipt(receipt: &Receipt, load: Option<ReactorLoad>) -> ReceiptSummary {
    let quantities = receipt.quantities();

    ReceiptSummary {
        id: receipt.id.clone(),
        name: receipt.name.clone(),
        kilos: receipt.kilos,
        litre: receipt.litre.clone(),
        quantities,
        ratios: ratios(&quantities),
        distribution: load
            .map(|l| (l, distribute(&quantities, l.total_input, l.multiplier))),
    }
}

/// Several receipts distributed with the same load and summed per chemical
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedSummary {
    pub receipts: Vec<(String, f64)>, // (name, kilos)
    pub total_kilos: f64,
    pub load: ReactorLoad,
    pub distribution: Vec<ReactorCalculation>,
    pub distributed_total: f64,
}

pub fn summarize_selection(receipts: &[Receipt], load: ReactorLoad) -> CombinedSummary {
    let per_receipt: Vec<Vec<ReactorCalculation>> = receipts
        .iter()
        .map(|r| distribute(&r.quantities(), load.total_input, load.multiplier))
        .collect();
    let distribution = aggregate(&per_receipt);

    CombinedSummary {
        receipts: receipts.iter().map(|r| (r.name.clone(), r.kilos)).collect(),
        total_kilos: receipts.iter().map(|r| r.kilos).sum(),
        load,
        distributed_total: distribution.iter().map(|c| c.distributed_value).sum(),
        distribution,
    }
}

impl fmt::Display for ReceiptSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} ===", self.name)?;
        writeln!(f, "ID:    {}", self.id)?;
        writeln!(f, "Kilos: {:.3}", self.kilos)?;
        writeln!(f, "Litre: {}", self.litre)?;
        writeln!(f)?;

        writeln!(f, "{:<8} {:>12} {:>8}", "Chemical", "Quantity", "Ratio")?;
        for chemical in Chemical::ALL {
            writeln!(
                f,
                "{:<8} {:>12.3} {:>7.2}%",
                chemical,
                self.quantities.get(chemical),
                self.ratios.get(chemical) * 100.0
            )?;
        }

        if let Some((load, rows)) = &self.distribution {
            writeln!(f)?;
            writeln!(
                f,
                "Reactor: {:.3} x {}",
                load.total_input, load.multiplier
            )?;
            for row in rows {
                writeln!(f, "  {:<8} {:>12.3}", row.chemical, row.distributed_value)?;
            }
        }

        Ok(())
    }
}

impl fmt::Display for CombinedSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Combined Summary ===")?;
        writeln!(f, "Receipts:")?;
        for (name, kilos) in &self.receipts {
            writeln!(f, "  {:<24} {:>12.3} kg", name, kilos)?;
        }
        writeln!(f, "  {:<24} {:>12.3} kg", "Total", self.total_kilos)?;
        writeln!(f)?;

        writeln!(
            f,
            "Reactor: {:.3} x {}",
            self.load.total_input, self.load.multiplier
        )?;
        for row in &self.distribution {
            writeln!(f, "  {:<8} {:>12.3}", row.chemical, row.distributed_value)?;
        }
        writeln!(f, "  {:<8} {:>12.3}", "Total", self.distributed_total)?;

        Ok(())
    }
}
