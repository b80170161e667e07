//! Deploy form validation
//!
//! Everything here runs before the first ledger call; a form that fails
//! validation never costs a transaction fee.

use crate::abi::{signed_to_word, ContractFunctionParameters};
use crate::error::ValidationError;
use crate::hashing::DocumentHash;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use ethers::types::U256;
use serde::{Deserialize, Serialize};

/// Decimal places kept for coordinates
pub const COORDINATE_DECIMALS: u32 = 8;
/// On-chain coordinate scale, 10^8
pub const COORDINATE_SCALE: i128 = 100_000_000;

/// Highest reason code the contract's `int8` getter can return
pub const MAX_REASON: u8 = 127;
/// Highest reason code with a fixed description
pub const LAST_FIXED_REASON: u8 = 4;

/// Raw deploy input, as typed by the user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployForm {
    pub id: String,
    pub expiration_date: String,
    pub latitude: String,
    pub longitude: String,
    pub address: String,
    pub year_of_construction: String,
    pub reason: String,
    pub other_reason: String,
    /// Predecessor contract, `0.0.N` or an address; empty for none
    pub previous: String,
}

/// A deploy request that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedApe {
    pub id: String,
    /// Milliseconds since the Unix epoch
    pub expiration_ms: i64,
    /// Degrees scaled by 10^8
    pub latitude: i128,
    /// Degrees scaled by 10^8
    pub longitude: i128,
    pub address: String,
    pub year_of_construction: u32,
    pub reason: u8,
    pub other_reason: String,
    pub previous: Option<String>,
}

impl ValidatedApe {
    /// SmartAPE constructor arguments, in declaration order
    pub fn constructor_parameters(&self, document: &DocumentHash) -> ContractFunctionParameters {
        ContractFunctionParameters::new()
            .add_string(self.id.clone())
            .add_uint256(U256::from(self.expiration_ms as u64))
            .add_uint256(signed_to_word(self.latitude))
            .add_uint256(signed_to_word(self.longitude))
            .add_string(self.address.clone())
            .add_uint32(self.year_of_construction)
            .add_uint8(self.reason)
            .add_string(self.other_reason.clone())
            .add_string(document.hex.clone())
            .add_string(document.algorithm.clone())
    }
}

/// Validate `form` against the current time `now`
pub fn validate(form: &DeployForm, now: DateTime<Utc>) -> Result<ValidatedApe, ValidationError> {
    let id = required("id", &form.id)?;
    if !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidNumber {
            field: "id",
            value: id.to_string(),
        });
    }

    let expiration = parse_expiration(required("expiration_date", &form.expiration_date)?)?;
    if expiration <= now {
        return Err(ValidationError::ExpirationNotInFuture(
            expiration.to_rfc3339_opts(SecondsFormat::Secs, true),
        ));
    }

    let latitude = parse_coordinate("latitude", required("latitude", &form.latitude)?, 90)?;
    let longitude = parse_coordinate("longitude", required("longitude", &form.longitude)?, 180)?;

    let year_text = required("year_of_construction", &form.year_of_construction)?;
    let year: i64 = year_text
        .parse()
        .map_err(|_| ValidationError::InvalidNumber {
            field: "year_of_construction",
            value: year_text.to_string(),
        })?;
    if !(0..=i32::MAX as i64).contains(&year) {
        return Err(ValidationError::OutOfRange {
            field: "year_of_construction",
            value: year.to_string(),
            min: 0,
            max: i32::MAX as i64,
        });
    }

    let reason = parse_reason(&form.reason)?;
    let other_reason = form.other_reason.trim().to_string();
    if reason > LAST_FIXED_REASON && other_reason.is_empty() {
        return Err(ValidationError::MissingOtherReason(reason));
    }

    let previous = Some(form.previous.trim())
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    Ok(ValidatedApe {
        id: id.to_string(),
        expiration_ms: expiration.timestamp_millis(),
        latitude,
        longitude,
        address: form.address.trim().to_string(),
        year_of_construction: year as u32,
        reason,
        other_reason,
        previous,
    })
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ValidationError::Missing { field })
    } else {
        Ok(value)
    }
}

/// `YYYY-MM-DD` (midnight UTC) or RFC 3339
pub fn parse_expiration(value: &str) -> Result<DateTime<Utc>, ValidationError> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .ok_or_else(|| ValidationError::InvalidDate(value.to_string()));
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ValidationError::InvalidDate(value.to_string()))
}

/// Parse a decimal degree string into a value scaled by 10^8, without
/// going through floating point.
pub fn parse_coordinate(
    field: &'static str,
    value: &str,
    max_degrees: i64,
) -> Result<i128, ValidationError> {
    let invalid = || ValidationError::InvalidNumber {
        field,
        value: value.to_string(),
    };

    let (negative, unsigned) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };
    let (whole, frac) = match unsigned.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (unsigned, ""),
    };
    let digits_only = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !digits_only(whole) || !digits_only(frac) {
        return Err(invalid());
    }
    if frac.len() > COORDINATE_DECIMALS as usize {
        return Err(ValidationError::TooPrecise {
            field,
            value: value.to_string(),
            max: COORDINATE_DECIMALS,
        });
    }

    let whole: i128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let frac_scaled: i128 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = COORDINATE_DECIMALS as usize);
        padded.parse().map_err(|_| invalid())?
    };

    let out_of_range = || ValidationError::OutOfRange {
        field,
        value: value.to_string(),
        min: -max_degrees,
        max: max_degrees,
    };
    let magnitude = whole
        .checked_mul(COORDINATE_SCALE)
        .and_then(|w| w.checked_add(frac_scaled))
        .ok_or_else(out_of_range)?;
    if magnitude > max_degrees as i128 * COORDINATE_SCALE {
        return Err(out_of_range());
    }
    Ok(if negative { -magnitude } else { magnitude })
}

fn parse_reason(value: &str) -> Result<u8, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0);
    }
    let reason: i64 = value.parse().map_err(|_| ValidationError::InvalidNumber {
        field: "reason",
        value: value.to_string(),
    })?;
    if !(0..=MAX_REASON as i64).contains(&reason) {
        return Err(ValidationError::OutOfRange {
            field: "reason",
            value: reason.to_string(),
            min: 0,
            max: MAX_REASON as i64,
        });
    }
    Ok(reason as u8)
}
