// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # STEP-Lite Core Parser
//!
//! Lexer and grammar for ISO-10303-21 "STEP physical files", the text
//! encoding used by IFC and other EXPRESS-based exchange formats.
//!
//! ## Overview
//!
//! - **Tokenization**: zero-copy scanning built with [nom](https://docs.rs/nom)
//!   and [memchr](https://docs.rs/memchr)
//! - **Escape decoding**: `''`, `\\`, `\X\`, `\X2\`, `\X4\`, `\S\` string escapes
//!   and `"0FF"` binary literals
//! - **Grammar**: recursive descent with one token of lookahead over lists,
//!   typed parameters, simple and complex entity instances
//! - **Assembly**: header records plus an instance-id index ([`StepFile`])
//! - **Writing**: `Display` renders values, records and files back to STEP text
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use step_lite_core::{parse_step_file, Value};
//!
//! let file = parse_step_file(content)?;
//! println!("schema: {:?}", file.schema_identifiers());
//!
//! let app = file.get(5).unwrap();
//! let organization = file.resolve(app.get(0).unwrap()).unwrap();
//! assert_eq!(organization.keyword(), Some("IFCORGANIZATION"));
//! ```
//!
//! ## Single Rules
//!
//! ```rust,ignore
//! use step_lite_core::{parse_list, parse_typed_parameter, Value};
//!
//! assert_eq!(parse_list("(1,3.1415)")?, vec![Value::Integer(1), Value::Real(3.1415)]);
//! assert_eq!(parse_typed_parameter("TEST(100)")?.param, Value::Integer(100));
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization support for parsed data

pub mod binary;
pub mod config;
pub mod error;
pub mod escape;
pub mod file;
pub mod lexer;
pub mod parser;
pub mod value;
pub mod writer;

pub use binary::{decode_binary, BinaryValue};
pub use config::{ParseConfig, DEFAULT_MAX_DEPTH};
pub use error::{Error, Position, Result};
pub use escape::{decode_string, encode_string};
pub use file::{parse_step_file, DataSection, InstanceIndex, StepFile, STANDARD_HEADER_ENTITIES};
pub use lexer::{tokenize, Lexer, Token, TokenKind};
pub use parser::{
    parse_entity_instance, parse_header_entity, parse_keyword, parse_list, parse_syntax_tree,
    parse_typed_parameter, parse_value, Parser, SyntaxTree,
};
pub use value::{
    DataEntityRecord, EntityRecord, HeaderEntityRecord, InstanceBody, TypedParameter, Value,
};
