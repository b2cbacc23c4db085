// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Numeric and set-of-letters parsers for `spec.md` §4.1.
//!
//! Each routine takes a path breadcrumb (the dotted tag path, e.g.
//! `Project.RME.General.Code_Size`) purely so the caller can build a
//! `GenError::XmlSyntax` that names the failing construct, matching the
//! source's "section missing" / "value malformed" two-level distinction.

use crate::error::GenError;
use crate::model::{Addr, MemAttrs};

/// Parses `0x…`/`0X…` hex, bare decimal-looking hex digits are rejected
/// outside that prefix, or the literal `Auto`.
pub fn parse_hex(path: &str, raw: &str) -> Result<Addr, GenError> {
    if raw == "Auto" {
        return Ok(Addr::Auto);
    }
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| {
            GenError::xml(path, format!("{raw} is not a valid hex number"))
        })?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(GenError::xml(path, format!("{raw} is not a valid hex number")));
    }
    // u128 so a 32-bit-overflowing literal still parses before the mod-2^32
    // reduction the spec calls for, instead of erroring out early.
    let value = u128::from_str_radix(digits, 16)
        .map_err(|_| GenError::xml(path, format!("{raw} is not a valid hex number")))?;
    Ok(Addr::Concrete((value % (1u128 << 32)) as u32))
}

/// Parses decimal digits or the literal `Auto`.
pub fn parse_uint(path: &str, raw: &str) -> Result<Addr, GenError> {
    if raw == "Auto" {
        return Ok(Addr::Auto);
    }
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return Err(GenError::xml(
            path,
            format!("{raw} is not a valid unsigned integer"),
        ));
    }
    let value: u64 = raw
        .parse()
        .map_err(|_| GenError::xml(path, format!("{raw} is not a valid unsigned integer")))?;
    if value > u32::MAX as u64 {
        return Err(GenError::xml(path, format!("{raw} does not fit in 32 bits")));
    }
    Ok(Addr::Concrete(value as u32))
}

/// Like [`parse_uint`] but rejects `Auto` — callers that never accept it
/// (stack sizes, priorities, interrupt numbers) use this directly.
pub fn parse_uint_concrete(path: &str, raw: &str) -> Result<u32, GenError> {
    match parse_uint(path, raw)? {
        Addr::Concrete(v) => Ok(v),
        Addr::Auto => Err(GenError::xml(path, "Auto is not permitted here")),
    }
}

/// Parses a set-of-letters memory attribute string: `R`,`W`,`X` (access),
/// `B`,`C`,`S` (bufferable/cacheable/static). At least one access letter
/// must be present.
///
/// The source tests these letters with an inverted `==0` in a few call
/// sites, silently flipping permission flags; this parser tests letter
/// *presence* directly and is the one place §9's documented bug is fixed.
pub fn parse_mem_attrs(path: &str, raw: &str) -> Result<MemAttrs, GenError> {
    let mut attrs = MemAttrs::empty();
    for c in raw.chars() {
        let bit = match c {
            'R' => MemAttrs::R,
            'W' => MemAttrs::W,
            'X' => MemAttrs::X,
            'B' => MemAttrs::BUFFERABLE,
            'C' => MemAttrs::CACHEABLE,
            'S' => MemAttrs::STATIC,
            other => {
                return Err(GenError::xml(
                    path,
                    format!("'{other}' is not a valid memory attribute letter"),
                ))
            }
        };
        attrs |= bit;
    }
    if !attrs.has_access() {
        return Err(GenError::xml(
            path,
            format!("{raw} has no access attribute (R, W, or X)"),
        ));
    }
    Ok(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_accepts_prefixed_digits_and_auto() {
        assert_eq!(parse_hex("x", "0x1000").unwrap(), Addr::Concrete(0x1000));
        assert_eq!(parse_hex("x", "0X1000").unwrap(), Addr::Concrete(0x1000));
        assert_eq!(parse_hex("x", "Auto").unwrap(), Addr::Auto);
    }

    #[test]
    fn hex_rejects_garbage() {
        assert!(parse_hex("x", "1000").is_err());
        assert!(parse_hex("x", "0xZZ").is_err());
        assert!(parse_hex("x", "0x").is_err());
    }

    #[test]
    fn hex_wraps_mod_2_32() {
        assert_eq!(
            parse_hex("x", "0x100000000").unwrap(),
            Addr::Concrete(0)
        );
    }

    #[test]
    fn uint_accepts_decimal_and_auto() {
        assert_eq!(parse_uint("x", "42").unwrap(), Addr::Concrete(42));
        assert_eq!(parse_uint("x", "Auto").unwrap(), Addr::Auto);
        assert!(parse_uint("x", "-1").is_err());
        assert!(parse_uint("x", "4.5").is_err());
    }

    #[test]
    fn mem_attrs_require_access_letter() {
        assert!(parse_mem_attrs("x", "BCS").is_err());
        let a = parse_mem_attrs("x", "RWS").unwrap();
        assert!(a.contains(MemAttrs::R));
        assert!(a.contains(MemAttrs::W));
        assert!(a.contains(MemAttrs::STATIC));
        assert!(!a.contains(MemAttrs::X));
    }

    #[test]
    fn mem_attrs_rejects_unknown_letter() {
        assert!(parse_mem_attrs("x", "RQ").is_err());
    }
}
