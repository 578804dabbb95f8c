// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative macros for reducing boilerplate.
//!
//! - [`record!`] — build a [`Record`](crate::Record) from key/value pairs

/// Build a `Record` from `key => value` pairs. Values go through
/// `serde_json::json!`, so literals, expressions, and nested structures
/// all work.
///
/// ```
/// use fluxion_core::record;
/// let r = record! { "message" => "hi", "status" => 200 };
/// assert_eq!(r["status"], 200);
/// ```
#[macro_export]
macro_rules! record {
    () => { $crate::Record::new() };
    ( $($tail:tt)+ ) => {{
        let mut record = $crate::Record::new();
        $crate::__record_entries!(record; $($tail)+);
        record
    }};
}

/// Implementation detail of [`record!`]; not part of the public API.
#[macro_export]
#[doc(hidden)]
macro_rules! __record_entries {
    ($record:ident;) => {};
    ($record:ident; $key:expr => { $($obj:tt)* } $(, $($rest:tt)*)?) => {
        $record.insert($key.to_string(), ::serde_json::json!({ $($obj)* }));
        $crate::__record_entries!($record; $($($rest)*)?);
    };
    ($record:ident; $key:expr => [ $($arr:tt)* ] $(, $($rest:tt)*)?) => {
        $record.insert($key.to_string(), ::serde_json::json!([ $($arr)* ]));
        $crate::__record_entries!($record; $($($rest)*)?);
    };
    ($record:ident; $key:expr => $value:expr $(, $($rest:tt)*)?) => {
        $record.insert($key.to_string(), ::serde_json::json!($value));
        $crate::__record_entries!($record; $($($rest)*)?);
    };
}
