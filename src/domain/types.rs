//! Reference data enums shared by commands and events.

use serde::{Deserialize, Serialize};

/// Kind of bank account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Checking,
    Savings,
}

/// Banks whose statements can be imported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BankName {
    #[serde(rename = "Deutsche Bank")]
    DeutscheBank,
    #[serde(rename = "N26")]
    N26,
    #[serde(rename = "Millennium bcp")]
    MillenniumBcp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "EUR")]
    Eur,
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "CHF")]
    Chf,
}

/// Format of an imported statement file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Csv,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bank_name_wire_format() {
        let json = serde_json::to_string(&BankName::MillenniumBcp).unwrap();
        assert_eq!(json, r#""Millennium bcp""#);

        let bank: BankName = serde_json::from_str(r#""Deutsche Bank""#).unwrap();
        assert_eq!(bank, BankName::DeutscheBank);
    }

    #[test]
    fn test_currency_and_account_type_wire_format() {
        assert_eq!(serde_json::to_string(&Currency::Eur).unwrap(), r#""EUR""#);
        assert_eq!(
            serde_json::to_string(&AccountType::Savings).unwrap(),
            r#""savings""#
        );
    }
}
