// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! STEP text output
//!
//! `Display` implementations that write values, records and whole files in
//! ISO-10303-21 syntax. Anything written here parses back to an equal value.

use std::fmt;

use crate::binary::BinaryValue;
use crate::escape::encode_string;
use crate::file::StepFile;
use crate::value::{DataEntityRecord, EntityRecord, InstanceBody, TypedParameter, Value};

/// Write a real so that it always lexes as a real: `0.`, `1.5`, `1.E-10`
fn write_real(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    let text = format!("{:?}", value).to_ascii_uppercase();
    let (mantissa, exponent) = match text.split_once('E') {
        Some((m, e)) => (m, Some(e)),
        None => (text.as_str(), None),
    };
    // Drop the trailing zero of "1.0" but keep the point
    let mantissa = match mantissa.strip_suffix(".0") {
        Some(whole) => format!("{}.", whole),
        None if mantissa.contains('.') => mantissa.to_string(),
        None => format!("{}.", mantissa),
    };
    match exponent {
        Some(e) => write!(f, "{}E{}", mantissa, e),
        None => write!(f, "{}", mantissa),
    }
}

/// Comma-separated values inside parentheses
fn write_list(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    f.write_str("(")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{}", item)?;
    }
    f.write_str(")")
}

impl fmt::Display for BinaryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (padding, hex) = self.hex_body();
        write!(f, "\"{}{}\"", padding, hex)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write_real(f, *r),
            Value::String(s) => write!(f, "'{}'", encode_string(s)),
            Value::Binary(b) => write!(f, "{}", b),
            Value::List(items) => write_list(f, items),
            Value::EntityRef(id) => write!(f, "#{}", id),
            Value::Typed(typed) => write!(f, "{}", typed),
            Value::Enumeration(e) => write!(f, ".{}.", e),
            Value::Omitted => f.write_str("$"),
            Value::Inherited => f.write_str("*"),
            Value::Keyword(k) => f.write_str(k),
        }
    }
}

impl fmt::Display for TypedParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.type_name, self.param)
    }
}

impl fmt::Display for EntityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        write_list(f, &self.params)
    }
}

impl fmt::Display for DataEntityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}=", self.id)?;
        match &self.body {
            InstanceBody::Simple(record) => write!(f, "{}", record),
            InstanceBody::Complex(parts) => {
                f.write_str("(")?;
                for part in parts {
                    write!(f, "{}", part)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl fmt::Display for StepFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ISO-10303-21;")?;
        writeln!(f, "HEADER;")?;
        for record in self.header() {
            writeln!(f, "{};", record)?;
        }
        writeln!(f, "ENDSEC;")?;

        for section in self.sections() {
            f.write_str("DATA")?;
            if let Some(params) = &section.parameters {
                write_list(f, params)?;
            }
            writeln!(f, ";")?;
            for id in &section.ids {
                if let Some(record) = self.get(*id) {
                    writeln!(f, "{};", record)?;
                }
            }
            writeln!(f, "ENDSEC;")?;
        }

        writeln!(f, "END-ISO-10303-21;")
    }
}
