//! Data models for receipts, chemical quantities and reactor results

use std::fmt;
use std::str::FromStr;

use crate::calculator::parse_chemical_value;
use crate::error::ReceiptError;

/// The five chemicals a receipt is made of, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chemical {
    Dmp,
    H3po4,
    Color,
    Yellow,
    Blue,
}

impl Chemical {
    pub const ALL: [Chemical; 5] = [
        Chemical::Dmp,
        Chemical::H3po4,
        Chemical::Color,
        Chemical::Yellow,
        Chemical::Blue,
    ];

    /// Name used in stored documents and reports
    pub fn name(self) -> &'static str {
        match self {
            Chemical::Dmp => "DMP",
            Chemical::H3po4 => "H3PO4",
            Chemical::Color => "COLOR",
            Chemical::Yellow => "yellow",
            Chemical::Blue => "blue",
        }
    }
}

impl fmt::Display for Chemical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for Chemical {
    type Err = ReceiptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Chemical::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ReceiptError::InvalidField(s.to_string()))
    }
}

/// Chemical quantities exactly as entered, before parsing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChemicalFields {
    pub dmp: String,
    pub h3po4: String,
    pub color: String,
    pub yellow: String,
    pub blue: String,
}

impl ChemicalFields {
    pub fn get(&self, chemical: Chemical) -> &str {
        match chemical {
            Chemical::Dmp => &self.dmp,
            Chemical::H3po4 => &self.h3po4,
            Chemical::Color => &self.color,
            Chemical::Yellow => &self.yellow,
            Chemical::Blue => &self.blue,
        }
    }

    pub fn set(&mut self, chemical: Chemical, value: impl Into<String>) {
        let slot = match chemical {
            Chemical::Dmp => &mut self.dmp,
            Chemical::H3po4 => &mut self.h3po4,
            Chemical::Color => &mut self.color,
            Chemical::Yellow => &mut self.yellow,
            Chemical::Blue => &mut self.blue,
        };
        *slot = value.into();
    }

    /// Parse every field, substituting 0 for anything unparseable
    pub fn quantities(&self) -> ChemicalQuantitySet {
        ChemicalQuantitySet::from_fn(|c| parse_chemical_value(self.get(c)))
    }
}

/// Parsed composition of one receipt
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChemicalQuantitySet {
    pub dmp: f64,
    pub h3po4: f64,
    pub color: f64,
    pub yellow: f64,
    pub blue: f64,
}

impl ChemicalQuantitySet {
    pub fn from_fn(mut f: impl FnMut(Chemical) -> f64) -> Self {
        Self {
            dmp: f(Chemical::Dmp),
            h3po4: f(Chemical::H3po4),
            color: f(Chemical::Color),
            yellow: f(Chemical::Yellow),
            blue: f(Chemical::Blue),
        }
    }

    pub fn get(&self, chemical: Chemical) -> f64 {
        match chemical {
            Chemical::Dmp => self.dmp,
            Chemical::H3po4 => self.h3po4,
            Chemical::Color => self.color,
            Chemical::Yellow => self.yellow,
            Chemical::Blue => self.blue,
        }
    }

    pub fn total(&self) -> f64 {
        Chemical::ALL.iter().map(|&c| self.get(c)).sum()
    }
}

/// Each chemical's fractional share of a quantity set
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RatioSet {
    pub dmp: f64,
    pub h3po4: f64,
    pub color: f64,
    pub yellow: f64,
    pub blue: f64,
}

impl RatioSet {
    pub fn get(&self, chemical: Chemical) -> f64 {
        match chemical {
            Chemical::Dmp => self.dmp,
            Chemical::H3po4 => self.h3po4,
            Chemical::Color => self.color,
            Chemical::Yellow => self.yellow,
            Chemical::Blue => self.blue,
        }
    }

    pub fn sum(&self) -> f64 {
        Chemical::ALL.iter().map(|&c| self.get(c)).sum()
    }
}

/// One chemical's share of a reactor load
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReactorCalculation {
    pub chemical: Chemical,
    pub original_value: f64,
    pub ratio: f64,
    pub distributed_value: f64, // total_input * ratio * multiplier
}

/// A stored receipt
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub id: String,
    pub name: String,
    pub chemicals: ChemicalFields,
    pub kilos: f64, // Derived: sum of the parsed chemical fields
    pub litre: String,
}

impl Receipt {
    pub fn quantities(&self) -> ChemicalQuantitySet {
        self.chemicals.quantities()
    }
}

/// Receipt contents before the store assigns an id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiptDraft {
    pub name: String,
    pub chemicals: ChemicalFields,
    pub litre: String,
}

/// A single editable receipt field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptField {
    Name,
    Chemical(Chemical),
    Litre,
}

impl FromStr for ReceiptField {
    type Err = ReceiptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(ReceiptField::Name),
            "litre" | "liter" => Ok(ReceiptField::Litre),
            _ => s.parse().map(ReceiptField::Chemical),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: String,
}

/// Token issued by a successful sign-in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub uid: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chemical_names_parse_case_insensitively() {
        assert_eq!("dmp".parse::<Chemical>().unwrap(), Chemical::Dmp);
        assert_eq!("h3po4".parse::<Chemical>().unwrap(), Chemical::H3po4);
        assert_eq!("Yellow".parse::<Chemical>().unwrap(), Chemical::Yellow);
        assert!("water".parse::<Chemical>().is_err());
    }

    #[test]
    fn chemical_display_honours_width() {
        assert_eq!(Chemical::H3po4.to_string(), "H3PO4");
        assert_eq!(format!("[{:<6}]", Chemical::Blue), "[blue  ]");
    }

    #[test]
    fn receipt_fields_cover_name_litre_and_chemicals() {
        assert_eq!("name".parse::<ReceiptField>().unwrap(), ReceiptField::Name);
        assert_eq!("Litre".parse::<ReceiptField>().unwrap(), ReceiptField::Litre);
        assert_eq!(
            "COLOR".parse::<ReceiptField>().unwrap(),
            ReceiptField::Chemical(Chemical::Color)
        );
        assert!(matches!(
            "kilos".parse::<ReceiptField>(),
            Err(ReceiptError::InvalidField(_))
        ));
    }

    #[test]
    fn fields_parse_into_quantities() {
        let mut fields = ChemicalFields::default();
        fields.set(Chemical::Dmp, "10");
        fields.set(Chemical::Blue, "2.5");
        fields.set(Chemical::Color, "n/a");

        let q = fields.quantities();
        assert_eq!(q.dmp, 10.0);
        assert_eq!(q.blue, 2.5);
        assert_eq!(q.color, 0.0);
        assert_eq!(q.total(), 12.5);
    }
}
