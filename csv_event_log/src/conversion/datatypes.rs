//! Attribute datatype inference & repair
//!
//! A raw conversion guesses attribute types independently per row (defaulting
//! to Literal), so one attribute key may end up holding mixed
//! representations. This module unifies each key to the most specific type
//! compatible with every observed value and rewrites the whole log in a
//! second pass.
//!
//! Widening lattice: Boolean ⊑ Discrete ⊑ Continuous ⊑ Literal, with
//! Timestamp disjoint (any conflict involving Timestamp widens to Literal).
//! Literal is the absorbing, most general type.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::engine::parse_tolerant_bool;
use super::errors::DatatypeRepairError;
use super::progress::ConversionProgress;
use crate::event_log::{Attribute, AttributeValue, EventLog};
use crate::utils::date_formats::parse_timestamp;

///
/// Datatype guessed for an attribute key during inference
///
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum InferredType {
    /// Boolean values
    Boolean,
    /// 64-bit integer values
    Discrete,
    /// Double values
    Continuous,
    /// Date-time values
    Timestamp,
    /// String values (most general)
    Literal,
}

impl InferredType {
    /// Widen two observations to the most specific common type
    pub fn widen(self, other: InferredType) -> InferredType {
        use InferredType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Boolean, Discrete) | (Discrete, Boolean) => Discrete,
            (Boolean, Continuous) | (Continuous, Boolean) => Continuous,
            (Discrete, Continuous) | (Continuous, Discrete) => Continuous,
            _ => Literal,
        }
    }
}

/// Attributes under standard extension prefixes are never repaired
fn is_standard_key(key: &str) -> bool {
    key.starts_with("concept:") || key.starts_with("lifecycle:") || key.starts_with("time:")
}

fn is_integer_pattern(s: &str) -> bool {
    let rest = s.strip_prefix(['+', '-']).unwrap_or(s);
    !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit())
}

fn is_float_pattern(s: &str) -> bool {
    s.bytes().any(|b| b.is_ascii_digit())
        && s.bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
}

/// Classify a raw string value into the most specific matching type
///
/// Priority: boolean literal, integer (with overflow fallback to Literal),
/// float, date, else Literal. A bare `0`/`1` deliberately does _not_ count as
/// boolean, so flag-like discrete columns stay discrete.
fn classify_string(s: &str, custom_format: Option<&str>) -> InferredType {
    let trimmed = s.trim();
    if parse_tolerant_bool(trimmed).is_some() {
        return InferredType::Boolean;
    }
    if is_integer_pattern(trimmed) {
        // Matching digits that overflow i64 cannot be stored as Discrete
        return if trimmed.parse::<i64>().is_ok() {
            InferredType::Discrete
        } else {
            InferredType::Literal
        };
    }
    if is_float_pattern(trimmed) && trimmed.parse::<f64>().is_ok() {
        return InferredType::Continuous;
    }
    if parse_timestamp(trimmed, custom_format).is_some() {
        return InferredType::Timestamp;
    }
    InferredType::Literal
}

/// Classify an already-stored value; `None` means the value is exempt from
/// repair (Timestamp attributes and standard-extension keys)
fn classify_value(value: &AttributeValue, custom_format: Option<&str>) -> Option<InferredType> {
    match value {
        AttributeValue::String(s) => Some(classify_string(s, custom_format)),
        AttributeValue::Int(_) => Some(InferredType::Discrete),
        AttributeValue::Float(_) => Some(InferredType::Continuous),
        AttributeValue::Boolean(_) => Some(InferredType::Boolean),
        AttributeValue::Date(_) => None,
        AttributeValue::ID(_) => Some(InferredType::Literal),
    }
}

fn observe(types: &mut HashMap<String, InferredType>, attr: &Attribute, custom_format: Option<&str>) {
    if is_standard_key(&attr.key) {
        return;
    }
    let Some(observed) = classify_value(&attr.value, custom_format) else {
        return;
    };
    types
        .entry(attr.key.clone())
        .and_modify(|current| *current = current.widen(observed))
        .or_insert(observed);
}

///
/// Pass 1: guess the most specific datatype per attribute key compatible with
/// all observed values (trace and event attributes alike)
///
/// The returned map can be reviewed and overridden before being handed to
/// [`apply_attribute_types`]. Increments progress once per case; cancellable
/// between cases.
///
pub fn infer_attribute_types(
    log: &EventLog,
    custom_format: Option<&str>,
    progress: &(impl ConversionProgress + ?Sized),
) -> Result<HashMap<String, InferredType>, DatatypeRepairError> {
    let mut types: HashMap<String, InferredType> = HashMap::new();
    for trace in &log.traces {
        if progress.is_cancelled() {
            return Err(DatatypeRepairError::Cancelled);
        }
        for attr in &trace.attributes {
            observe(&mut types, attr, custom_format);
        }
        for event in &trace.events {
            for attr in &event.attributes {
                observe(&mut types, attr, custom_format);
            }
        }
        progress.increment();
    }
    Ok(types)
}

fn coerce_stored(
    value: &AttributeValue,
    target: InferredType,
    custom_format: Option<&str>,
) -> Result<AttributeValue, ()> {
    use AttributeValue::*;
    Ok(match (value, target) {
        // Boolean observations widened into a numeric type coerce as 0/1
        (String(s), InferredType::Discrete) => match parse_tolerant_bool(s) {
            Some(b) => Int(i64::from(b)),
            None => Int(s.trim().parse().map_err(|_| ())?),
        },
        (String(s), InferredType::Continuous) => match parse_tolerant_bool(s) {
            Some(b) => Float(f64::from(u8::from(b))),
            None => Float(s.trim().parse().map_err(|_| ())?),
        },
        (String(s), InferredType::Boolean) => Boolean(parse_tolerant_bool(s).ok_or(())?),
        (String(s), InferredType::Timestamp) => {
            Date(parse_timestamp(s, custom_format).ok_or(())?)
        }
        (Int(v), InferredType::Continuous) => Float(*v as f64),
        (Int(v), InferredType::Literal) => String(v.to_string()),
        (Float(v), InferredType::Literal) => String(v.to_string()),
        (Boolean(b), InferredType::Discrete) => Int(i64::from(*b)),
        (Boolean(b), InferredType::Continuous) => Float(f64::from(u8::from(*b))),
        (Boolean(b), InferredType::Literal) => String(b.to_string()),
        // Already the resolved representation (or exempt): unchanged
        (v, _) => v.clone(),
    })
}

fn repair_attributes(
    attributes: &mut [Attribute],
    types: &HashMap<String, InferredType>,
    custom_format: Option<&str>,
) -> Result<(), DatatypeRepairError> {
    for attr in attributes {
        if is_standard_key(&attr.key) || matches!(attr.value, AttributeValue::Date(_)) {
            continue;
        }
        let Some(&target) = types.get(&attr.key) else {
            continue;
        };
        match coerce_stored(&attr.value, target, custom_format) {
            Ok(value) => attr.value = value,
            Err(()) => {
                return Err(DatatypeRepairError::CoercionFailed {
                    key: attr.key.clone(),
                    value: format!("{:?}", attr.value),
                });
            }
        }
    }
    Ok(())
}

///
/// Pass 2: rewrite every attribute whose key has a resolved type
///
/// A coercion failure is fatal to the whole repair operation. Increments
/// progress once per case; cancellable between cases.
///
pub fn apply_attribute_types(
    log: &mut EventLog,
    types: &HashMap<String, InferredType>,
    custom_format: Option<&str>,
    progress: &(impl ConversionProgress + ?Sized),
) -> Result<(), DatatypeRepairError> {
    for trace in &mut log.traces {
        if progress.is_cancelled() {
            return Err(DatatypeRepairError::Cancelled);
        }
        repair_attributes(&mut trace.attributes, types, custom_format)?;
        for event in &mut trace.events {
            repair_attributes(&mut event.attributes, types, custom_format)?;
        }
        progress.increment();
    }
    Ok(())
}

///
/// Infer and apply consistent attribute datatypes across the whole log
///
/// Two full passes over all cases; the progress denominator is set to
/// 2 × (number of cases). Returns the resolved type map. Idempotent: running
/// it on an already-repaired log changes nothing.
///
pub fn repair_attribute_datatypes(
    log: &mut EventLog,
    custom_format: Option<&str>,
    progress: &(impl ConversionProgress + ?Sized),
) -> Result<HashMap<String, InferredType>, DatatypeRepairError> {
    progress.set_bounds(0, 2 * log.traces.len() as u64);
    let types = infer_attribute_types(log, custom_format, progress)?;
    apply_attribute_types(log, &types, custom_format, progress)?;
    Ok(types)
}
