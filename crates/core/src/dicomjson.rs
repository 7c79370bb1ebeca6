//! DICOM-JSON value coercion.
//!
//! Converts one decoded attribute into the `Value` array of a DICOM-JSON
//! attribute object. Dispatch goes through the closed [`VrKind`] enum so
//! that adding support for another VR is an exhaustiveness-checked change,
//! not a new branch in a conditional chain.
//!
//! Two wire conventions are deliberate and must not be "fixed":
//! - integer VRs stay JSON numbers, while float VRs are emitted as
//!   culture-invariant decimal strings (existing consumers depend on this
//!   asymmetry);
//! - binary VRs always coerce to an empty array, payload retrieval goes
//!   through bulk-data URIs.

use dicom::core::value::{PrimitiveValue, Value};
use dicom::core::VR;
use serde_json::{json, Value as Json};

/// The coercion category of a value representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VrKind {
    /// PN: component group objects with an `Alphabetic` key
    PersonName,
    /// String-family VRs emitted verbatim
    Text,
    /// Binary integer VRs emitted as JSON numbers
    Integer,
    /// Binary float VRs emitted as decimal strings
    Float,
    /// AT: attribute tag references as `GGGGEEEE` strings
    TagRef,
    /// Bulk binary carriers, never inlined
    Binary,
    /// SQ: handled by the metadata mapper, not the coercer
    Sequence,
}

/// Classify a VR into its coercion category.
pub fn classify(vr: VR) -> VrKind {
    match vr {
        VR::PN => VrKind::PersonName,
        VR::AE
        | VR::AS
        | VR::CS
        | VR::DA
        | VR::DS
        | VR::DT
        | VR::IS
        | VR::LO
        | VR::LT
        | VR::SH
        | VR::ST
        | VR::TM
        | VR::UI => VrKind::Text,
        VR::US | VR::UL | VR::SS | VR::SL | VR::SV | VR::UV => VrKind::Integer,
        VR::FL | VR::FD => VrKind::Float,
        VR::AT => VrKind::TagRef,
        VR::OB | VR::OD | VR::OF | VR::OL | VR::OV | VR::OW | VR::UN | VR::UC | VR::UR
        | VR::UT => VrKind::Binary,
        VR::SQ => VrKind::Sequence,
        // Unknown or future VRs degrade to string coercion.
        _ => VrKind::Text,
    }
}

/// Coerce a decoded attribute value into a DICOM-JSON `Value` array.
///
/// Returns `None` when the value cannot be represented under its VR's
/// coercion rule (the caller omits the attribute) and for sequence values,
/// which the metadata mapper handles recursively.
pub fn coerce<I, P>(vr: VR, value: &Value<I, P>) -> Option<Json> {
    match value {
        Value::Primitive(primitive) => coerce_primitive(vr, primitive),
        Value::Sequence(_) | Value::PixelSequence(_) => None,
    }
}

/// Coerce a primitive value under the given VR.
pub fn coerce_primitive(vr: VR, value: &PrimitiveValue) -> Option<Json> {
    match classify(vr) {
        VrKind::PersonName => {
            let components: Vec<Json> = value
                .to_multi_str()
                .iter()
                .map(|component| component.trim_end())
                .filter(|component| !component.is_empty())
                .map(|component| json!({ "Alphabetic": component }))
                .collect();
            Some(Json::Array(components))
        }
        VrKind::Text => {
            let strings: Vec<Json> = value
                .to_multi_str()
                .iter()
                .map(|s| Json::String(s.trim_end().to_string()))
                .collect();
            Some(Json::Array(strings))
        }
        VrKind::Integer => value.to_multi_int::<i64>().ok().map(|ints| {
            Json::Array(ints.into_iter().map(Json::from).collect())
        }),
        VrKind::Float => value.to_multi_float64().ok().map(|floats| {
            Json::Array(
                floats
                    .into_iter()
                    .map(|f| Json::String(format!("{f}")))
                    .collect(),
            )
        }),
        VrKind::TagRef => match value {
            PrimitiveValue::Tags(tags) => Some(Json::Array(
                tags.iter()
                    .map(|tag| {
                        Json::String(format!("{:04X}{:04X}", tag.group(), tag.element()))
                    })
                    .collect(),
            )),
            other => Some(Json::Array(
                other
                    .to_multi_str()
                    .iter()
                    .map(|s| Json::String(s.trim_end().to_string()))
                    .collect(),
            )),
        },
        VrKind::Binary => Some(Json::Array(Vec::new())),
        VrKind::Sequence => None,
    }
}
