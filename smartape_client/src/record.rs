//! The SmartAPE record as read back from a deployed contract

use crate::abi::format_address;
use crate::contract::linker::address_to_entity_id;
use crate::validation::COORDINATE_SCALE;
use chrono::{DateTime, Utc};
use ethers::types::H160;
use serde::Serialize;
use std::fmt;

/// Certificate validity, as stored by the contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApeStatus {
    Valid,
    Expired,
}

impl ApeStatus {
    /// 0 is valid; any other code is expired
    pub fn from_code(code: i8) -> Self {
        if code == 0 {
            ApeStatus::Valid
        } else {
            ApeStatus::Expired
        }
    }
}

impl fmt::Display for ApeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApeStatus::Valid => f.write_str("valid"),
            ApeStatus::Expired => f.write_str("expired"),
        }
    }
}

/// Why the certificate was issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    NewConstruction,
    ChangedProperty,
    Leased,
    Renovation,
    EnergyRequalification,
    Other(String),
}

impl Reason {
    /// Codes 0 to 4 are fixed; anything else carries the free text
    pub fn from_code(code: i8, other_reason: &str) -> Self {
        match code {
            0 => Reason::NewConstruction,
            1 => Reason::ChangedProperty,
            2 => Reason::Leased,
            3 => Reason::Renovation,
            4 => Reason::EnergyRequalification,
            _ => Reason::Other(other_reason.to_string()),
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::NewConstruction => f.write_str("New construction"),
            Reason::ChangedProperty => f.write_str("Changed property"),
            Reason::Leased => f.write_str("Leased"),
            Reason::Renovation => f.write_str("Renovation"),
            Reason::EnergyRequalification => f.write_str("Energy requalification"),
            Reason::Other(text) => f.write_str(text),
        }
    }
}

/// Values returned by the twelve getters, undecorated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApeRecord {
    pub id: String,
    pub status: ApeStatus,
    /// Milliseconds since the Unix epoch
    pub expiration_ms: i128,
    /// Degrees scaled by 10^8
    pub latitude: i128,
    /// Degrees scaled by 10^8
    pub longitude: i128,
    pub address: String,
    pub year_of_construction: i32,
    pub previous_document: H160,
    pub reason_code: i8,
    pub reason: Reason,
    pub document_hash: String,
    pub hash_algorithm: String,
}

impl ApeRecord {
    pub fn latitude_degrees(&self) -> f64 {
        self.latitude as f64 / COORDINATE_SCALE as f64
    }

    pub fn longitude_degrees(&self) -> f64 {
        self.longitude as f64 / COORDINATE_SCALE as f64
    }

    /// `M/D/YYYY` in UTC; the raw value if it is not a representable date
    pub fn expiration_display(&self) -> String {
        i64::try_from(self.expiration_ms)
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|dt| dt.format("%-m/%-d/%Y").to_string())
            .unwrap_or_else(|| self.expiration_ms.to_string())
    }

    /// `None` when no predecessor was linked
    pub fn previous_display(&self) -> Option<String> {
        if self.previous_document.is_zero() {
            return None;
        }
        Some(match address_to_entity_id(&self.previous_document) {
            Some(id) => id.to_string(),
            None => format_address(&self.previous_document),
        })
    }

    pub fn view(&self) -> ApeRecordView {
        ApeRecordView {
            id: self.id.clone(),
            status: self.status,
            expiration_date: self.expiration_display(),
            expiration_ms: self.expiration_ms,
            latitude: self.latitude_degrees(),
            longitude: self.longitude_degrees(),
            address: self.address.clone(),
            year_of_construction: self.year_of_construction,
            reason: self.reason.to_string(),
            reason_code: self.reason_code,
            previous_document: self.previous_display(),
            document_hash: self.document_hash.clone(),
            hash_algorithm: self.hash_algorithm.clone(),
        }
    }
}

/// Display form of an [`ApeRecord`], for JSON or YAML output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApeRecordView {
    pub id: String,
    pub status: ApeStatus,
    pub expiration_date: String,
    pub expiration_ms: i128,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub year_of_construction: i32,
    pub reason: String,
    pub reason_code: i8,
    pub previous_document: Option<String>,
    pub document_hash: String,
    pub hash_algorithm: String,
}

impl fmt::Display for ApeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ID:                   {}", self.id)?;
        writeln!(f, "Status:               {}", self.status)?;
        writeln!(f, "Expiration date:      {}", self.expiration_display())?;
        writeln!(f, "Latitude:             {}", self.latitude_degrees())?;
        writeln!(f, "Longitude:            {}", self.longitude_degrees())?;
        writeln!(f, "Address:              {}", self.address)?;
        writeln!(f, "Year of construction: {}", self.year_of_construction)?;
        writeln!(f, "Reason:               {}", self.reason)?;
        writeln!(
            f,
            "Previous document:    {}",
            self.previous_display().as_deref().unwrap_or("-")
        )?;
        writeln!(f, "Document hash:        {}", self.document_hash)?;
        write!(f, "Hash algorithm:       {}", self.hash_algorithm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ApeRecord {
        ApeRecord {
            id: "42".to_string(),
            status: ApeStatus::from_code(0),
            expiration_ms: 1_906_156_800_000, // 2030-05-28T00:00:00Z
            latitude: 4_000_000_000,
            longitude: -370_379_000,
            address: "Calle Mayor 1".to_string(),
            year_of_construction: 1998,
            previous_document: H160::zero(),
            reason_code: 0,
            reason: Reason::from_code(0, "ignored"),
            document_hash: "ab".repeat(32),
            hash_algorithm: "SHA-256".to_string(),
        }
    }

    #[test]
    fn test_status_and_coordinates() {
        let r = record();
        assert_eq!(r.status, ApeStatus::Valid);
        assert_eq!(r.status.to_string(), "valid");
        assert_eq!(r.latitude_degrees(), 40.0);
        assert_eq!(r.longitude_degrees(), -3.70379);
        assert_eq!(ApeStatus::from_code(1), ApeStatus::Expired);
        assert_eq!(ApeStatus::from_code(-1), ApeStatus::Expired);
    }

    #[test]
    fn test_reason_mapping() {
        let fixed = [
            "New construction",
            "Changed property",
            "Leased",
            "Renovation",
            "Energy requalification",
        ];
        for (code, text) in fixed.iter().enumerate() {
            assert_eq!(Reason::from_code(code as i8, "other text").to_string(), *text);
        }
        assert_eq!(Reason::from_code(5, "Change of use").to_string(), "Change of use");
        assert_eq!(Reason::from_code(99, "").to_string(), "");
    }

    #[test]
    fn test_expiration_display() {
        let r = record();
        assert_eq!(r.expiration_display(), "5/28/2030");

        let far = ApeRecord {
            expiration_ms: i128::MAX,
            ..record()
        };
        assert_eq!(far.expiration_display(), i128::MAX.to_string());
    }

    #[test]
    fn test_previous_display() {
        assert_eq!(record().previous_display(), None);

        let mut raw = [0u8; 20];
        raw[19] = 0x64;
        let r = ApeRecord {
            previous_document: H160::from_slice(&raw),
            ..record()
        };
        assert_eq!(r.previous_display().as_deref(), Some("0.0.100"));

        let raw = [0x11u8; 20];
        let r = ApeRecord {
            previous_document: H160::from_slice(&raw),
            ..record()
        };
        assert_eq!(
            r.previous_display().as_deref(),
            Some("0x1111111111111111111111111111111111111111")
        );
    }

    #[test]
    fn test_view_serializes() {
        let json = serde_json::to_value(record().view()).unwrap();
        assert_eq!(json["status"], "valid");
        assert_eq!(json["latitude"], 40.0);
        assert_eq!(json["reason"], "New construction");
        assert_eq!(json["expiration_date"], "5/28/2030");
        assert!(json["previous_document"].is_null());
    }
}
