use std::collections::BTreeMap;

use crate::error::ParseError;

/// Progress is reported roughly every this many bytes of input.
const PROGRESS_STEP_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum StepValue {
    String(String),
    Real(f64),
    Integer(i64),
    Boolean(bool),
    Enum(String),
    Reference(u64),
    List(Vec<StepValue>),
    Null,
    Derived,
}

impl StepValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Self::Real(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_reference(&self) -> Option<u64> {
        match self {
            Self::Reference(id) => Some(*id),
            _ => None,
        }
    }

    /// References inside a list value (e.g. `RelatedElements`).
    #[must_use]
    pub fn references(&self) -> Vec<u64> {
        match self {
            Self::List(items) => items.iter().filter_map(Self::as_reference).collect(),
            Self::Reference(id) => vec![*id],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StepEntity {
    pub id: u64,
    pub entity_type: String,
    pub values: Vec<StepValue>,
}

impl StepEntity {
    #[must_use]
    pub fn value(&self, index: usize) -> Option<&StepValue> {
        self.values.get(index)
    }

    #[must_use]
    pub fn string_at(&self, index: usize) -> Option<&str> {
        self.value(index).and_then(StepValue::as_str)
    }
}

/// Entities of the DATA section, ordered by express ID.
#[derive(Debug, Default)]
pub struct StepFile {
    pub entities: BTreeMap<u64, StepEntity>,
    pub schema: String,
}

impl StepFile {
    pub fn parse(content: &str) -> Result<Self, ParseError> {
        Self::parse_with_progress(content, &mut |_| {})
    }

    /// Parses STEP text, reporting the consumed fraction of the input.
    /// Entities may span several lines; a statement ends at the first `;`
    /// outside a string.
    pub fn parse_with_progress(
        content: &str,
        progress: &mut dyn FnMut(f32),
    ) -> Result<Self, ParseError> {
        let mut file = StepFile::default();
        let mut in_data = false;
        let mut saw_data = false;
        let mut pending = String::new();
        let mut consumed = 0usize;
        let mut next_report = PROGRESS_STEP_BYTES;
        let total = content.len().max(1);

        for raw in content.lines() {
            consumed += raw.len() + 1;
            if consumed >= next_report {
                progress((consumed.min(total) as f32) / total as f32);
                next_report = consumed + PROGRESS_STEP_BYTES;
            }

            if !in_data {
                let line = raw.trim();
                if line.starts_with("FILE_SCHEMA") {
                    file.schema = parse_schema(line).unwrap_or_default();
                } else if line == "DATA;" {
                    in_data = true;
                    saw_data = true;
                }
                continue;
            }

            pending.push_str(raw);
            while let Some(end) = statement_end(&pending) {
                let statement: String = pending.drain(..=end).collect();
                let statement = statement.trim();
                if statement == "ENDSEC;" {
                    in_data = false;
                    break;
                }
                if statement.starts_with('#') {
                    if let Some(entity) = parse_entity_line(statement) {
                        file.entities.insert(entity.id, entity);
                    }
                }
            }
            if !in_data {
                pending.clear();
            }
        }

        if !pending.trim().is_empty() {
            tracing::warn!(bytes = pending.len(), "Unterminated statement at end of DATA");
        }
        if !saw_data {
            return Err(ParseError::InvalidStep {
                message: "missing DATA section".to_string(),
            });
        }

        progress(1.0);
        Ok(file)
    }

    #[must_use]
    pub fn get_entity(&self, id: u64) -> Option<&StepEntity> {
        self.entities.get(&id)
    }

    pub fn entities_of_type<'a>(
        &'a self,
        entity_type: &'a str,
    ) -> impl Iterator<Item = &'a StepEntity> + 'a {
        self.entities
            .values()
            .filter(move |e| e.entity_type == entity_type)
    }
}

/// `FILE_SCHEMA(('IFC4'));` → `IFC4`
fn parse_schema(line: &str) -> Option<String> {
    let start = line.find("('")? + 2;
    let end = line[start..].find('\'')?;
    Some(line[start..start + end].to_string())
}

/// Byte offset of the `;` closing the first statement in `text`.
fn statement_end(text: &str) -> Option<usize> {
    let mut in_string = false;
    for (i, ch) in text.char_indices() {
        match ch {
            '\'' => in_string = !in_string,
            ';' if !in_string => return Some(i),
            _ => {}
        }
    }
    None
}

fn parse_entity_line(line: &str) -> Option<StepEntity> {
    // Format: #123=IFCWALL('guid',#ref,'name',...);
    let line = line.trim_end_matches(';');

    let eq_pos = line.find('=')?;
    let id: u64 = line[1..eq_pos].trim().parse().ok()?;

    let rest = line[eq_pos + 1..].trim();
    let paren_pos = rest.find('(')?;
    if !rest.ends_with(')') {
        return None;
    }
    let entity_type = rest[..paren_pos].trim().to_string();
    let values = parse_values(&rest[paren_pos + 1..rest.len() - 1]);

    Some(StepEntity {
        id,
        entity_type,
        values,
    })
}

fn parse_values(s: &str) -> Vec<StepValue> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut depth = 0usize;

    for ch in s.chars() {
        match ch {
            '\'' if depth == 0 => {
                in_string = !in_string;
                current.push(ch);
            }
            '(' if !in_string => {
                depth += 1;
                current.push(ch);
            }
            ')' if !in_string => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if !in_string && depth == 0 => {
                values.push(parse_single_value(&current));
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if !current.trim().is_empty() {
        values.push(parse_single_value(&current));
    }

    values
}

fn parse_single_value(s: &str) -> StepValue {
    let s = s.trim();

    match s {
        "$" => return StepValue::Null,
        "*" => return StepValue::Derived,
        ".T." => return StepValue::Boolean(true),
        ".F." => return StepValue::Boolean(false),
        _ => {}
    }

    if let Some(id) = s.strip_prefix('#').and_then(|r| r.parse::<u64>().ok()) {
        return StepValue::Reference(id);
    }
    if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') {
        return StepValue::String(decode_step_string(&s[1..s.len() - 1]));
    }
    if s.len() >= 2 && s.starts_with('.') && s.ends_with('.') {
        return StepValue::Enum(s[1..s.len() - 1].to_string());
    }
    if s.starts_with('(') && s.ends_with(')') {
        return StepValue::List(parse_values(&s[1..s.len() - 1]));
    }
    if let Ok(i) = s.parse::<i64>() {
        return StepValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return StepValue::Real(f);
    }
    // Typed value like IFCLENGTHMEASURE(3000.)
    if let Some(paren_pos) = s.find('(') {
        if s.ends_with(')') {
            return parse_single_value(&s[paren_pos + 1..s.len() - 1]);
        }
    }

    StepValue::String(s.to_string())
}

/// Decodes STEP string escapes: `\X2\XXXX\X0\` (UCS-2), `\X\XX` (ISO 8859-1),
/// `\S\c` (high-bit shift), `\\` and `''`.
fn decode_step_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(ch) = rest.chars().next() {
        if let Some(tail) = rest.strip_prefix("\\X2\\") {
            let end = tail.find("\\X0\\").unwrap_or(tail.len());
            for chunk in tail[..end].as_bytes().chunks(4) {
                let code = std::str::from_utf8(chunk)
                    .ok()
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .and_then(char::from_u32);
                if let Some(c) = code {
                    out.push(c);
                }
            }
            rest = tail.get(end + 4..).unwrap_or("");
        } else if let Some(tail) = rest.strip_prefix("\\X\\") {
            let hex = tail.get(..2).unwrap_or(tail);
            if let Ok(code) = u8::from_str_radix(hex, 16) {
                out.push(char::from(code));
            }
            rest = &tail[hex.len()..];
        } else if let Some(tail) = rest.strip_prefix("\\S\\") {
            let mut chars = tail.chars();
            if let Some(c) = chars.next() {
                if let Some(shifted) = u8::try_from(c).ok().map(|b| char::from(b.wrapping_add(128))) {
                    out.push(shifted);
                }
            }
            rest = chars.as_str();
        } else if let Some(tail) = rest.strip_prefix("\\\\") {
            out.push('\\');
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("''") {
            out.push('\'');
            rest = tail;
        } else {
            out.push(ch);
            rest = &rest[ch.len_utf8()..];
        }
    }

    out
}
