use std::collections::{HashMap, HashSet};

use defc_schema::{bits_for_value, EnumDefinition, EnumElement, PrimitiveType, Sentinel};
use lazy_static::lazy_static;
use regex::Regex;

use super::claim_name;
use crate::error::DefError;
use crate::layout::choose_underlying;
use crate::types::SourceFile;
use crate::utils::{error, quote};

lazy_static! {
    static ref TYPE_DIRECTIVE: Regex = Regex::new(r"^type\s+([A-Za-z_][A-Za-z0-9_]*)(?:\s+(flags))?$").unwrap();
    static ref ELEMENT:        Regex = Regex::new(
        r"^([A-Za-z_][A-Za-z0-9_]*)(?:\s*=\s*(0[xX][0-9A-Fa-f]+|\d+))?\s*(?:,\s*(.*))?$"
    ).unwrap();
}

const MAX_FLAGS: usize = 64;

struct Draft {
    name:    String,
    line:    usize,
    value:   Option<u64>,
    comment: String,
}

fn parse_value(text: &str) -> Option<u64> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse::<u64>().ok(),
    }
}

/// Parses an enum body: `NAME[ = value][, comment]` per line and at most one
/// `type <underlying>[ flags]` directive.
pub fn parse_enum(file: &SourceFile) -> Result<EnumDefinition, DefError> {
    let mut declared: Option<(usize, PrimitiveType)> = None;
    let mut is_flags = false;
    let mut drafts   = Vec::new();
    let mut names    = HashSet::new();

    for line in &file.body {
        if let Some(caps) = TYPE_DIRECTIVE.captures(&line.text) {
            if declared.is_some() {
                return Err(error(&file.display, line.number, "The enum type is declared twice"));
            }
            let ty = PrimitiveType::from_name(&caps[1]).ok_or_else(|| DefError::UnknownType {
                file: file.display.clone(),
                line: line.number,
                name: caps[1].to_string(),
            })?;
            if ty.is_signed() {
                return Err(error(
                    &file.display,
                    line.number,
                    &format!("The enum type {} must be unsigned", quote(ty.name())),
                ));
            }
            declared = Some((line.number, ty));
            is_flags = caps.get(2).is_some();
            continue;
        }

        let caps = ELEMENT.captures(&line.text).ok_or_else(|| {
            let reason = if line.text.starts_with(',') || line.text.starts_with('=') {
                "Enum element name is empty".to_string()
            } else {
                format!("Expected NAME[ = value][, comment] but found {}", quote(&line.text))
            };
            error(&file.display, line.number, &reason)
        })?;

        let name = caps[1].to_string();
        if Sentinel::is_reserved(&name) {
            return Err(error(
                &file.display,
                line.number,
                &format!("{} is a reserved element name", quote(&name)),
            ));
        }
        claim_name(&mut names, file, line.number, &name)?;

        let value = match caps.get(2) {
            Some(m) => Some(parse_value(m.as_str()).ok_or_else(|| {
                error(&file.display, line.number, &format!("Invalid value {}", quote(m.as_str())))
            })?),
            None => None,
        };
        drafts.push(Draft {
            name,
            line: line.number,
            value,
            comment: caps.get(3).map_or("", |m| m.as_str().trim()).to_string(),
        });
    }

    let elements = if is_flags {
        flag_elements(file, drafts)?
    } else {
        value_elements(file, drafts)?
    };

    let needed = elements.iter().map(|e| e.value).max().unwrap_or(0);
    let line   = declared.map_or_else(|| file.body.last().map_or(0, |l| l.number), |(l, _)| l);
    let underlying = choose_underlying(file, line, bits_for_value(needed), declared.map(|(_, t)| t))?;

    Ok(EnumDefinition {
        elements,
        is_flags,
        underlying,
        declared: declared.map(|(_, t)| t),
    })
}

/// Value mode: explicit or consecutive values, `VALUE_INVALID` one past the largest.
fn value_elements(file: &SourceFile, drafts: Vec<Draft>) -> Result<Vec<EnumElement>, DefError> {
    let mut elements: Vec<EnumElement> = Vec::with_capacity(drafts.len() + 1);
    let mut used: HashMap<u64, String> = HashMap::new();
    let mut next = 0u64;

    for draft in drafts {
        let value = draft.value.unwrap_or(next);
        if let Some(other) = used.get(&value) {
            return Err(error(
                &file.display,
                draft.line,
                &format!("Value {} is already used by {}", value, quote(other)),
            ));
        }
        used.insert(value, draft.name.clone());
        next = value.checked_add(1).ok_or_else(|| {
            error(&file.display, draft.line, "Enum values must stay below u64::MAX")
        })?;
        elements.push(EnumElement {
            name:     draft.name,
            value,
            comment:  draft.comment,
            sentinel: None,
        });
    }

    let invalid = match elements.iter().map(|e| e.value).max() {
        Some(max) => max + 1,
        None => 0,
    };
    elements.push(EnumElement {
        name:     Sentinel::Invalid.name().to_string(),
        value:    invalid,
        comment:  String::new(),
        sentinel: Some(Sentinel::Invalid),
    });
    Ok(elements)
}

/// Flags mode: `FLAGS_NONE`, one bit per flag in order, then `FLAGS_ALL`.
fn flag_elements(file: &SourceFile, drafts: Vec<Draft>) -> Result<Vec<EnumElement>, DefError> {
    if let Some(draft) = drafts.iter().find(|d| d.value.is_some()) {
        return Err(error(
            &file.display,
            draft.line,
            "Flags enums assign their values implicitly",
        ));
    }
    if drafts.is_empty() {
        let line = file.body.last().map_or(0, |l| l.number);
        return Err(error(&file.display, line, "A flags enum needs at least one flag"));
    }
    if drafts.len() > MAX_FLAGS {
        return Err(error(
            &file.display,
            drafts[MAX_FLAGS].line,
            &format!("A flags enum holds at most {} flags", MAX_FLAGS),
        ));
    }

    let count = drafts.len();
    let mut elements = Vec::with_capacity(count + 2);
    elements.push(EnumElement {
        name:     Sentinel::None.name().to_string(),
        value:    0,
        comment:  String::new(),
        sentinel: Some(Sentinel::None),
    });
    for (i, draft) in drafts.into_iter().enumerate() {
        elements.push(EnumElement {
            name:     draft.name,
            value:    1u64 << i,
            comment:  draft.comment,
            sentinel: None,
        });
    }
    let all = if count == MAX_FLAGS { u64::MAX } else { (1u64 << count) - 1 };
    elements.push(EnumElement {
        name:     Sentinel::All.name().to_string(),
        value:    all,
        comment:  String::new(),
        sentinel: Some(Sentinel::All),
    });
    Ok(elements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::read_definition;
    use std::path::Path;

    fn parse(text: &str) -> Result<EnumDefinition, DefError> {
        let file = read_definition(Path::new("Color.the"), "Color.the", text)?;
        parse_enum(&file)
    }

    #[test]
    fn test_value_mode() {
        let def = parse("RED, the red one\nGREEN\nBLUE\n").unwrap();
        let names: Vec<&str> = def.elements.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["RED", "GREEN", "BLUE", "VALUE_INVALID"]);
        assert_eq!(def.elements[3].value, 3);
        assert_eq!(def.elements[0].comment, "the red one");
        assert_eq!(def.underlying, PrimitiveType::UInt8);
        assert_eq!(def.sentinel_name(), "VALUE_INVALID");
    }

    #[test]
    fn test_explicit_values() {
        let def = parse("LOW = 10\nMID\nHIGH = 0x100\n").unwrap();
        let values: Vec<u64> = def.elements.iter().map(|e| e.value).collect();
        assert_eq!(values, vec![10, 11, 256, 257]);
        assert_eq!(def.underlying, PrimitiveType::UInt16);

        let err = parse("A = 1\nB = 1\n").unwrap_err();
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn test_wide_enum() {
        let body: String = (0..256).map(|i| format!("E{}\n", i)).collect();
        let def = parse(&body).unwrap();
        assert_eq!(def.elements.len(), 257);
        assert_eq!(def.underlying, PrimitiveType::UInt16);
    }

    #[test]
    fn test_flags_mode() {
        let def = parse("type uint8_t flags\nREAD\nWRITE\nEXEC\n").unwrap();
        let values: Vec<(&str, u64)> = def.elements.iter().map(|e| (e.name.as_str(), e.value)).collect();
        assert_eq!(
            values,
            vec![("FLAGS_NONE", 0), ("READ", 1), ("WRITE", 2), ("EXEC", 4), ("FLAGS_ALL", 7)]
        );
        assert!(def.is_flags);
        assert_eq!(def.sentinel_name(), "FLAGS_NONE");
    }

    #[test]
    fn test_flags_limit() {
        let flags: String = (0..64).map(|i| format!("F{}\n", i)).collect();
        let def = parse(&format!("type uint64_t flags\n{}", flags)).unwrap();
        assert_eq!(def.elements.last().map(|e| e.value), Some(u64::MAX));
        assert_eq!(def.elements[64].value, 1u64 << 63);
        assert_eq!(def.underlying, PrimitiveType::UInt64);

        let err = parse(&format!("type uint64_t flags\n{}F64\n", flags)).unwrap_err();
        assert!(matches!(err, DefError::DefinitionSyntax { line: 66, .. }));
    }

    #[test]
    fn test_declared_bool() {
        assert!(matches!(
            parse("type bool\nON\n"),
            Err(DefError::WidthTooSmall { line: 1, .. })
        ));
        assert!(matches!(
            parse("type bool flags\nON\n"),
            Err(DefError::WidthTooSmall { line: 1, .. })
        ));
    }

    #[test]
    fn test_flags_need_a_flag() {
        assert!(parse("type uint8_t flags\n").is_err());
        assert!(parse("type uint8_t flags\nA = 4\n").is_err());
    }

    #[test]
    fn test_declared_too_small() {
        let body: String = (0..300).map(|i| format!("E{}\n", i)).collect();
        let err = parse(&format!("type uint8_t\n{}", body)).unwrap_err();
        assert!(matches!(err, DefError::WidthTooSmall { line: 1, .. }));

        let def = parse("type uint32_t\nA\n").unwrap();
        assert_eq!(def.underlying, PrimitiveType::UInt32);
        assert_eq!(def.declared, Some(PrimitiveType::UInt32));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(parse(", no name\n"), Err(DefError::DefinitionSyntax { line: 1, .. })));
        assert!(matches!(parse("A\nA\n"), Err(DefError::DuplicateName { line: 2, .. })));
        assert!(parse("VALUE_INVALID\n").is_err());
        assert!(parse("type uint8_t\ntype uint16_t\n").is_err());
        assert!(matches!(parse("type float\nA\n"), Err(DefError::UnknownType { .. })));
    }
}
