//! Address and byte-pattern text parsing.
//!
//! Tokens are single-ASCII-space separated, each one to two hex digits; no
//! whitespace is stripped or nibbles re-paired before parsing.

use anyhow::{bail, Context, Result};

use crate::process::MemoryRegion;

/// Parses a space-separated byte pattern such as `"48 8B 05 00 00 00 00"`
/// into raw bytes, where `00` marks a wildcard byte to the scanner (C5).
/// Every token must parse as one or two hex digits; a malformed token (e.g.
/// a typo'd `??`) fails the whole parse rather than silently matching
/// anything.
pub fn parse_hex_bytes(pattern: &str) -> Result<Vec<u8>> {
    pattern
        .split(' ')
        .filter(|tok| !tok.is_empty())
        .map(|tok| {
            u8::from_str_radix(tok, 16).with_context(|| format!("invalid byte pattern token {tok:?}"))
        })
        .collect()
}

/// Parses a space-separated chain of signed hex offsets, e.g. `"10 -8 1C"`.
pub fn parse_offsets(text: &str) -> Result<Vec<i64>> {
    text.split(' ')
        .filter(|tok| !tok.is_empty())
        .map(|tok| {
            i64::from_str_radix(tok, 16).with_context(|| format!("invalid offset token {tok:?}"))
        })
        .collect()
}

/// Resolves a symbolic address of the form `"module.dll+1A2B"` (offset
/// optional) against a known module table, returning the absolute address or
/// `0` if the module cannot be found. Does *not* strip internal whitespace
/// before splitting on `+` — a module name or offset token is taken verbatim.
pub fn resolve_symbolic(text: &str, modules: &[MemoryRegion]) -> usize {
    let text = text.trim();
    let (module_part, offset_part) = match text.split_once('+') {
        Some((m, o)) => (m, o),
        None => (text, "0"),
    };

    if module_part.is_empty() {
        return 0;
    }

    let offset = match i64::from_str_radix(offset_part.trim(), 16) {
        Ok(v) => v,
        Err(_) => return 0,
    };

    let needle = module_part.trim().to_lowercase();
    let base = modules.iter().find_map(|region| {
        let file = region.image_file.as_ref()?;
        let file_name = file.rsplit(['\\', '/']).next().unwrap_or(file);
        if file_name.to_lowercase() == needle {
            Some(region.base_address)
        } else {
            None
        }
    });

    match base {
        Some(base) => (base as i64 + offset).max(0) as usize,
        None => 0,
    }
}

/// Parses `text` straight to an absolute address, accepting either a bare
/// hex literal (`"7FF6ABCD1000"`) or a symbolic `module+offset` form when
/// `modules` is non-empty.
pub fn parse_address(text: &str, modules: &[MemoryRegion]) -> Result<usize> {
    let trimmed = text.trim();
    if trimmed.contains('+') || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        let addr = resolve_symbolic(trimmed, modules);
        if addr == 0 {
            bail!("could not resolve symbolic address {trimmed:?}");
        }
        Ok(addr)
    } else {
        usize::from_str_radix(trimmed, 16).with_context(|| format!("invalid address {trimmed:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{MemoryProtection, MemoryState, MemoryType};

    #[test]
    fn parses_plain_byte_pattern() {
        assert_eq!(
            parse_hex_bytes("48 8B 05").unwrap(),
            vec![0x48, 0x8B, 0x05]
        );
    }

    #[test]
    fn parses_literal_zero_as_wildcard_byte() {
        assert_eq!(parse_hex_bytes("48 00 05").unwrap(), vec![0x48, 0x00, 0x05]);
    }

    #[test]
    fn rejects_malformed_token() {
        assert!(parse_hex_bytes("48 ZZ 05").is_err());
    }

    #[test]
    fn rejects_question_mark_wildcard_syntax() {
        assert!(parse_hex_bytes("48 ?? 05").is_err());
    }

    #[test]
    fn parses_negative_offsets() {
        assert_eq!(parse_offsets("10 -8 1C").unwrap(), vec![0x10, -0x8, 0x1C]);
    }

    fn module(name: &str, base: usize) -> MemoryRegion {
        MemoryRegion {
            base_address: base,
            size: 0x1000,
            protect: MemoryProtection::default(),
            state: MemoryState::default(),
            type_: MemoryType::Image,
            image_file: Some(format!("C:\\game\\{name}")),
        }
    }

    #[test]
    fn resolves_symbolic_module_offset() {
        let modules = vec![module("game.exe", 0x1_0000_0000)];
        assert_eq!(resolve_symbolic("game.exe+10", &modules), 0x1_0000_0010);
    }

    #[test]
    fn resolves_symbolic_with_no_offset() {
        let modules = vec![module("game.exe", 0x1_0000_0000)];
        assert_eq!(resolve_symbolic("game.exe", &modules), 0x1_0000_0000);
    }

    #[test]
    fn unknown_module_resolves_to_zero() {
        let modules = vec![module("game.exe", 0x1_0000_0000)];
        assert_eq!(resolve_symbolic("other.dll+10", &modules), 0);
    }
}
