// SPDX-License-Identifier: MIT

//! Conversions between CoreFoundation property-list objects and [`PrefValue`].
//!
//! Ownership stays with the `core-foundation` wrappers, so no manual
//! retain/release happens here.

use std::collections::HashMap;

use core_foundation::{
    array::CFArray,
    base::{CFType, TCFType},
    boolean::CFBoolean,
    data::CFData,
    date::CFDate,
    dictionary::CFDictionary,
    number::CFNumber,
    string::CFString,
};
use core_foundation_sys::number::CFNumberIsFloatType;

use crate::core::{
    error::{PrefError, Result},
    types::PrefValue,
};

fn cfnumber_to_pref(num: &CFNumber) -> PrefValue {
    let is_float = unsafe { CFNumberIsFloatType(num.as_concrete_TypeRef()) } != 0;
    if !is_float && let Some(i) = num.to_i64() {
        return PrefValue::Integer(i);
    }
    match num.to_f64() {
        Some(f) => PrefValue::Float(f),
        None => PrefValue::String("<invalid number>".into()),
    }
}

fn cfdict_to_pref(dict: &CFDictionary<CFType, CFType>) -> PrefValue {
    let (keys, values) = dict.get_keys_and_values();
    let mut map = HashMap::with_capacity(keys.len());
    for (kref, vref) in keys.into_iter().zip(values) {
        if kref.is_null() || vref.is_null() {
            continue;
        }
        let key = unsafe { CFType::wrap_under_get_rule(kref as _) };
        let Some(key) = key.downcast::<CFString>() else {
            continue;
        };
        let value = unsafe { CFType::wrap_under_get_rule(vref as _) };
        map.insert(key.to_string(), cf_to_pref(&value));
    }
    PrefValue::Dictionary(map)
}

/// Converts any property-list object. Unknown types keep their CF description.
pub(crate) fn cf_to_pref(value: &CFType) -> PrefValue {
    if let Some(s) = value.downcast::<CFString>() {
        PrefValue::String(s.to_string())
    } else if let Some(b) = value.downcast::<CFBoolean>() {
        PrefValue::Boolean(b.into())
    } else if let Some(n) = value.downcast::<CFNumber>() {
        cfnumber_to_pref(&n)
    } else if let Some(arr) = value.downcast::<CFArray<CFType>>() {
        PrefValue::Array(arr.iter().map(|item| cf_to_pref(&item)).collect())
    } else if let Some(dict) = value.downcast::<CFDictionary<CFType, CFType>>() {
        cfdict_to_pref(&dict)
    } else if let Some(data) = value.downcast::<CFData>() {
        PrefValue::Data(data.bytes().to_vec())
    } else if let Some(date) = value.downcast::<CFDate>() {
        PrefValue::Date(date.abs_time())
    } else {
        PrefValue::String(format!("{value:?}"))
    }
}

/// Converts a value for CFPreferences.
///
/// Integers above `i64::MAX` and keyed-archiver UIDs have no public
/// CoreFoundation counterpart and are rejected.
pub(crate) fn pref_to_cf(value: &PrefValue) -> Result<CFType> {
    let cf = match value {
        PrefValue::String(s) => CFString::new(s).as_CFType(),
        PrefValue::Integer(i) => CFNumber::from(*i).as_CFType(),
        PrefValue::Unsigned(u) => match i64::try_from(*u) {
            Ok(i) => CFNumber::from(i).as_CFType(),
            Err(_) => return Err(unsupported(value)),
        },
        PrefValue::Float(f) => CFNumber::from(*f).as_CFType(),
        PrefValue::Boolean(b) => CFBoolean::from(*b).as_CFType(),
        PrefValue::Array(items) => {
            let items = items.iter().map(pref_to_cf).collect::<Result<Vec<CFType>>>()?;
            CFArray::from_CFTypes(&items).as_CFType()
        }
        PrefValue::Dictionary(map) => {
            let pairs = map
                .iter()
                .map(|(k, v)| Ok((CFString::new(k), pref_to_cf(v)?)))
                .collect::<Result<Vec<(CFString, CFType)>>>()?;
            CFDictionary::from_CFType_pairs(&pairs).as_CFType()
        }
        PrefValue::Data(data) => CFData::from_buffer(data).as_CFType(),
        PrefValue::Date(dt) => CFDate::new(*dt).as_CFType(),
        PrefValue::Uid(_) => return Err(unsupported(value)),
    };
    Ok(cf)
}

fn unsupported(value: &PrefValue) -> PrefError {
    PrefError::InvalidValue {
        kind: "CFPreferences".into(),
        raw: value.to_string(),
    }
}
