// SPDX-License-Identifier: MIT

//! Raw CFPreferences calls behind [`crate::store::CfStore`].
//!
//! Every write is followed by a synchronize so another process reading the
//! domain sees it immediately.

use core_foundation::{
    base::{CFGetTypeID, CFType, TCFType},
    string::CFString,
};

use core_foundation_sys::{
    array::{CFArrayGetCount, CFArrayGetValueAtIndex, CFArrayRef},
    base::CFRelease,
    preferences::{
        CFPreferencesAppSynchronize, CFPreferencesCopyAppValue, CFPreferencesCopyApplicationList,
        CFPreferencesCopyKeyList, CFPreferencesSetAppValue, kCFPreferencesAnyHost,
        kCFPreferencesCurrentUser,
    },
    string::CFStringGetTypeID,
};

use crate::core::{
    convert::{cf_to_pref, pref_to_cf},
    error::{PrefError, Result},
    types::PrefValue,
};

/// Whether CFPreferences answers at all in this process.
pub(crate) fn cf_available() -> bool {
    list_domains().is_ok()
}

/// List all preference application IDs (domains) for CurrentUser / AnyHost.
pub(crate) fn list_domains() -> Result<Vec<String>> {
    let arr_ref =
        unsafe { CFPreferencesCopyApplicationList(kCFPreferencesCurrentUser, kCFPreferencesAnyHost) };
    Ok(take_strings(arr_ref))
}

/// Keys stored in `domain` for CurrentUser / AnyHost, sorted.
pub(crate) fn key_list(domain: &str) -> Vec<String> {
    let domain_cf = CFString::new(domain);
    let keys_ref = unsafe {
        CFPreferencesCopyKeyList(
            domain_cf.as_concrete_TypeRef(),
            kCFPreferencesCurrentUser,
            kCFPreferencesAnyHost,
        )
    };
    take_strings(keys_ref)
}

/// Collects the strings of a copied CFArray and releases it.
fn take_strings(arr_ref: CFArrayRef) -> Vec<String> {
    if arr_ref.is_null() {
        return Vec::new();
    }
    let mut out = Vec::new();
    unsafe {
        for i in 0..CFArrayGetCount(arr_ref) {
            let val = CFArrayGetValueAtIndex(arr_ref, i);
            if !val.is_null() && CFGetTypeID(val as _) == CFStringGetTypeID() {
                let s = CFString::wrap_under_get_rule(val as _);
                out.push(s.to_string());
            }
        }
        CFRelease(arr_ref as _);
    }
    out.sort();
    out
}

/// Read a single key; `None` when the domain has no value for it.
pub(crate) fn read_pref(domain: &str, key: &str) -> Option<PrefValue> {
    let domain_cf = CFString::new(domain);
    let key_cf = CFString::new(key);
    let raw = unsafe {
        CFPreferencesCopyAppValue(
            key_cf.as_concrete_TypeRef(),
            domain_cf.as_concrete_TypeRef(),
        )
    };
    if raw.is_null() {
        return None;
    }
    let value = unsafe { CFType::wrap_under_create_rule(raw) };
    Some(cf_to_pref(&value))
}

/// Write (set) a single key in a domain and synchronize it to disk.
pub(crate) fn write_pref(domain: &str, key: &str, value: &PrefValue) -> Result<()> {
    let domain_cf = CFString::new(domain);
    let key_cf = CFString::new(key);
    let value_cf = pref_to_cf(value)?;
    unsafe {
        CFPreferencesSetAppValue(
            key_cf.as_concrete_TypeRef(),
            value_cf.as_CFTypeRef(),
            domain_cf.as_concrete_TypeRef(),
        );
    }
    synchronize(&domain_cf, key)
}

/// Delete a single key. Succeeds when the key is already absent.
pub(crate) fn delete_key(domain: &str, key: &str) -> Result<()> {
    let domain_cf = CFString::new(domain);
    let key_cf = CFString::new(key);
    unsafe {
        CFPreferencesSetAppValue(
            key_cf.as_concrete_TypeRef(),
            std::ptr::null(),
            domain_cf.as_concrete_TypeRef(),
        );
    }
    synchronize(&domain_cf, key)
}

fn synchronize(domain_cf: &CFString, key: &str) -> Result<()> {
    if unsafe { CFPreferencesAppSynchronize(domain_cf.as_concrete_TypeRef()) } != 0 {
        Ok(())
    } else {
        Err(PrefError::Backend(format!(
            "CFPreferences failed to synchronize {domain_cf} after writing {key}"
        )))
    }
}
