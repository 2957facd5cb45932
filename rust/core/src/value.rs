// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parse tree values and entity records

use crate::binary::BinaryValue;
use crate::lexer::TokenKind;

/// STEP parameter value
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// Integer value
    Integer(i64),
    /// Real value
    Real(f64),
    /// Decoded string value
    String(String),
    /// Binary literal
    Binary(BinaryValue),
    /// List of values (possibly empty)
    List(Vec<Value>),
    /// Entity instance name (#123)
    EntityRef(u64),
    /// Select-type value: IFCLABEL('text'), IFCBOOLEAN(.T.)
    Typed(Box<TypedParameter>),
    /// Enumeration value (dots stripped)
    Enumeration(String),
    /// Omitted value: $
    Omitted,
    /// Inherited / derived value: *
    Inherited,
    /// Keyword appearing without a parameter
    Keyword(String),
}

impl Value {
    /// Convert a literal token; `None` for punctuation and keywords
    pub(crate) fn from_literal(kind: TokenKind<'_>) -> Option<Self> {
        Some(match kind {
            TokenKind::Integer(i) => Value::Integer(i),
            TokenKind::Real(r) => Value::Real(r),
            TokenKind::String(s) => Value::String(s.into_owned()),
            TokenKind::Binary(b) => Value::Binary(b),
            TokenKind::EntityRef(id) => Value::EntityRef(id),
            TokenKind::Enumeration(e) => Value::Enumeration(e.to_string()),
            TokenKind::Omitted => Value::Omitted,
            TokenKind::Inherited => Value::Inherited,
            _ => return None,
        })
    }

    /// Get as entity reference
    #[inline]
    pub fn as_entity_ref(&self) -> Option<u64> {
        match self {
            Value::EntityRef(id) => Some(*id),
            _ => None,
        }
    }

    /// Get as string
    #[inline]
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as enumeration name
    #[inline]
    pub fn as_enum(&self) -> Option<&str> {
        match self {
            Value::Enumeration(e) => Some(e),
            _ => None,
        }
    }

    /// Get as float (integers are widened)
    #[inline]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Real(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as integer
    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as list
    #[inline]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get as typed parameter
    #[inline]
    pub fn as_typed(&self) -> Option<&TypedParameter> {
        match self {
            Value::Typed(typed) => Some(typed),
            _ => None,
        }
    }

    /// Check if omitted/inherited
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Omitted | Value::Inherited)
    }

    /// Collect every entity reference, descending into lists and typed values
    pub fn entity_refs(&self) -> Vec<u64> {
        let mut refs = Vec::new();
        self.collect_refs(&mut refs);
        refs
    }

    fn collect_refs(&self, refs: &mut Vec<u64>) {
        match self {
            Value::EntityRef(id) => refs.push(*id),
            Value::List(items) => items.iter().for_each(|v| v.collect_refs(refs)),
            Value::Typed(typed) => typed.param.collect_refs(refs),
            _ => {}
        }
    }
}

/// Value wrapped with its defined type name, e.g. `IFCLENGTHMEASURE(2.5)`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TypedParameter {
    pub type_name: String,
    pub param: Value,
}

impl TypedParameter {
    pub fn new(type_name: impl Into<String>, param: Value) -> Self {
        Self {
            type_name: type_name.into(),
            param,
        }
    }
}

/// Keyword plus parameter list: a header statement or one partial entity record
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityRecord {
    pub name: String,
    pub params: Vec<Value>,
}

impl EntityRecord {
    pub fn new(name: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Get parameter by index
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.params.get(index)
    }
}

/// Header section statement, e.g. `FILE_SCHEMA(('IFC2X3'));`
pub type HeaderEntityRecord = EntityRecord;

/// Right-hand side of an entity instance
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InstanceBody {
    /// `#1=IFCWALL(...);`
    Simple(EntityRecord),
    /// `#1=(A(...)B(...));` - one partial record per supertype
    Complex(Vec<EntityRecord>),
}

/// Data section statement
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataEntityRecord {
    pub id: u64,
    pub body: InstanceBody,
}

impl DataEntityRecord {
    pub fn simple(id: u64, name: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            id,
            body: InstanceBody::Simple(EntityRecord::new(name, params)),
        }
    }

    /// Entity keyword; `None` for complex instances
    pub fn keyword(&self) -> Option<&str> {
        match &self.body {
            InstanceBody::Simple(record) => Some(&record.name),
            InstanceBody::Complex(_) => None,
        }
    }

    /// Parameters of a simple instance; empty for complex instances
    pub fn params(&self) -> &[Value] {
        match &self.body {
            InstanceBody::Simple(record) => &record.params,
            InstanceBody::Complex(_) => &[],
        }
    }

    /// Get parameter of a simple instance by index
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.params().get(index)
    }

    /// Partial records: one for a simple instance, several for a complex one
    pub fn records(&self) -> &[EntityRecord] {
        match &self.body {
            InstanceBody::Simple(record) => std::slice::from_ref(record),
            InstanceBody::Complex(parts) => parts,
        }
    }

    /// Partial record of a complex (or simple) instance by keyword
    pub fn record(&self, name: &str) -> Option<&EntityRecord> {
        self.records().iter().find(|r| r.name == name)
    }

    pub fn is_complex(&self) -> bool {
        matches!(self.body, InstanceBody::Complex(_))
    }
}
