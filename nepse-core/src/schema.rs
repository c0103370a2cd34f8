//! Output column sets for the merged table.
//!
//! The merged table has grown over time from five columns to eight. Rather
//! than keep one merge routine per layout, a schema is a list of
//! [`OutputColumn`]s and the merger fills whatever the schema asks for.

use serde::{Deserialize, Serialize};

/// One column of the merged output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputColumn {
    Symbol,
    Ltp,
    AvgBonus,
    AvgCash,
    AvgRight,
    YearsCount,
    Eps,
    BookValue,
}

impl OutputColumn {
    /// Literal header text for this column.
    pub fn header(self) -> &'static str {
        match self {
            OutputColumn::Symbol => "Symbol",
            OutputColumn::Ltp => "LTP",
            OutputColumn::AvgBonus => "Avg Bonus (%)",
            OutputColumn::AvgCash => "Avg Cash (%)",
            OutputColumn::AvgRight => "Avg Right (%)",
            OutputColumn::YearsCount => "Years Count",
            OutputColumn::Eps => "EPS",
            OutputColumn::BookValue => "Book Value",
        }
    }
}

/// Named merged-table layouts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputSchema {
    /// Symbol, LTP, average bonus, average cash, years count.
    Basic,
    /// Basic plus average right share, EPS and book value.
    #[default]
    Extended,
}

const BASIC: [OutputColumn; 5] = [
    OutputColumn::Symbol,
    OutputColumn::Ltp,
    OutputColumn::AvgBonus,
    OutputColumn::AvgCash,
    OutputColumn::YearsCount,
];

const EXTENDED: [OutputColumn; 8] = [
    OutputColumn::Symbol,
    OutputColumn::Ltp,
    OutputColumn::AvgBonus,
    OutputColumn::AvgCash,
    OutputColumn::AvgRight,
    OutputColumn::YearsCount,
    OutputColumn::Eps,
    OutputColumn::BookValue,
];

impl OutputSchema {
    pub fn columns(self) -> &'static [OutputColumn] {
        match self {
            OutputSchema::Basic => &BASIC,
            OutputSchema::Extended => &EXTENDED,
        }
    }

    /// The fixed header row of the merged table.
    pub fn header(self) -> Vec<String> {
        self.columns().iter().map(|c| c.header().to_string()).collect()
    }

    /// Whether the fundamentals lookup is read at all.
    pub fn needs_fundamentals(self) -> bool {
        self.columns()
            .iter()
            .any(|c| matches!(c, OutputColumn::Eps | OutputColumn::BookValue))
    }
}

impl std::str::FromStr for OutputSchema {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" | "5" => Ok(OutputSchema::Basic),
            "extended" | "8" => Ok(OutputSchema::Extended),
            other => Err(format!("unknown schema '{other}' (expected basic or extended)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_header() {
        assert_eq!(
            OutputSchema::Basic.header(),
            vec!["Symbol", "LTP", "Avg Bonus (%)", "Avg Cash (%)", "Years Count"]
        );
        assert!(!OutputSchema::Basic.needs_fundamentals());
    }

    #[test]
    fn extended_header() {
        assert_eq!(
            OutputSchema::Extended.header(),
            vec![
                "Symbol",
                "LTP",
                "Avg Bonus (%)",
                "Avg Cash (%)",
                "Avg Right (%)",
                "Years Count",
                "EPS",
                "Book Value"
            ]
        );
        assert!(OutputSchema::Extended.needs_fundamentals());
    }

    #[test]
    fn parses_from_cli_names() {
        assert_eq!("basic".parse::<OutputSchema>().unwrap(), OutputSchema::Basic);
        assert_eq!("Extended".parse::<OutputSchema>().unwrap(), OutputSchema::Extended);
        assert!("wide".parse::<OutputSchema>().is_err());
    }
}
