//! Field identifiers.
//!
//! Fields are named scalar quantities carried by grid nodes. The quantities
//! exchanged between the coupled solvers have dedicated variants; anything else
//! travels as [`Field::Custom`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Field identifier.
///
/// Construction from a name is normalizing: the snake_case name of a
/// well-known field always yields that variant, never `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Field {
    /// Pore pressure in N/m²
    PorePressure,
    /// Void ratio (volume of voids / volume of solids)
    VoidRatio,
    /// Porosity [0, 1]
    Porosity,
    /// Any other named quantity
    Custom(String),
}

impl Field {
    /// Number of well-known fields.
    pub const KNOWN_COUNT: usize = 3;

    /// Get all well-known fields as a slice.
    #[must_use]
    pub const fn known() -> &'static [Field] {
        &[Field::PorePressure, Field::VoidRatio, Field::Porosity]
    }

    /// Create a field from a name.
    #[must_use]
    pub fn named(name: &str) -> Self {
        match name {
            "pore_pressure" => Field::PorePressure,
            "void_ratio" => Field::VoidRatio,
            "porosity" => Field::Porosity,
            other => Field::Custom(other.to_owned()),
        }
    }

    /// The snake_case name of this field.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Field::PorePressure => "pore_pressure",
            Field::VoidRatio => "void_ratio",
            Field::Porosity => "porosity",
            Field::Custom(name) => name,
        }
    }

    /// Check if this is one of the well-known fields.
    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Field::Custom(_))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::named(s))
    }
}

impl From<&str> for Field {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for Field {
    fn from(name: String) -> Self {
        match name.as_str() {
            "pore_pressure" | "void_ratio" | "porosity" => Self::named(&name),
            _ => Field::Custom(name),
        }
    }
}

impl From<Field> for String {
    fn from(field: Field) -> Self {
        match field {
            Field::Custom(name) => name,
            known => known.name().to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_names_normalize() {
        assert_eq!(Field::named("pore_pressure"), Field::PorePressure);
        assert_eq!(Field::from(String::from("void_ratio")), Field::VoidRatio);
        assert_eq!("porosity".parse::<Field>().unwrap(), Field::Porosity);
        assert_eq!(Field::named("data"), Field::Custom("data".into()));
    }

    #[test]
    fn test_display_round_trips_name() {
        for field in Field::known() {
            assert_eq!(Field::named(&field.to_string()), *field);
        }
        assert_eq!(Field::Custom("saturation".into()).to_string(), "saturation");
    }

    #[test]
    fn test_serde_uses_plain_names() {
        let json = serde_json::to_string(&Field::VoidRatio).unwrap();
        assert_eq!(json, "\"void_ratio\"");

        let field: Field = serde_json::from_str("\"pore_pressure\"").unwrap();
        assert_eq!(field, Field::PorePressure);

        let field: Field = serde_json::from_str("\"temperature\"").unwrap();
        assert!(!field.is_known());
    }

    #[test]
    fn test_known_fields_sort_before_custom() {
        let mut fields = vec![
            Field::Custom("aaa".into()),
            Field::Porosity,
            Field::PorePressure,
        ];
        fields.sort();
        assert_eq!(fields[0], Field::PorePressure);
        assert_eq!(fields[2], Field::Custom("aaa".into()));
    }
}
