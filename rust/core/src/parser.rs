// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! STEP grammar
//!
//! Recursive descent over the token stream with one token of lookahead.
//! Each grammar rule is a method on [`Parser`]; the free `parse_*` functions
//! run a single rule and require it to consume the whole input.

use tracing::{debug, trace};

use crate::config::ParseConfig;
use crate::error::{Error, Result};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::value::{DataEntityRecord, EntityRecord, InstanceBody, TypedParameter, Value};

/// A parsed statement with the byte offset where it starts
#[derive(Debug, Clone, PartialEq)]
pub struct Statement<T> {
    pub offset: usize,
    pub node: T,
}

/// One `DATA ... ENDSEC;` section
#[derive(Debug, Clone, PartialEq)]
pub struct DataSectionTree {
    pub offset: usize,
    /// `DATA(('name'),('schema'));` parameters, if present
    pub parameters: Option<Vec<Value>>,
    pub instances: Vec<Statement<DataEntityRecord>>,
}

/// Parse tree of a whole document, before assembly into a `StepFile`
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxTree {
    /// Offset of the HEADER keyword
    pub header_offset: usize,
    pub header: Vec<Statement<EntityRecord>>,
    pub data_sections: Vec<DataSectionTree>,
}

/// Recursive-descent parser over a [`Lexer`]
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    lookahead: Token<'a>,
    config: ParseConfig,
    /// Current nesting of lists and typed parameters
    depth: usize,
}

impl<'a> Parser<'a> {
    /// Create a parser with the default configuration
    pub fn new(input: &'a str) -> Result<Self> {
        Self::with_config(input, ParseConfig::default())
    }

    pub fn with_config(input: &'a str, config: ParseConfig) -> Result<Self> {
        let mut lexer = Lexer::new(input);
        let lookahead = lexer.next_token()?;
        Ok(Self {
            lexer,
            lookahead,
            config,
            depth: 0,
        })
    }

    #[inline]
    fn peek(&self) -> &TokenKind<'a> {
        &self.lookahead.kind
    }

    /// Consume the lookahead token and scan the next one
    fn bump(&mut self) -> Result<Token<'a>> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.lookahead, next))
    }

    fn error(&self, expected: &str) -> Error {
        Error::syntax(
            self.lexer.source(),
            self.lookahead.offset,
            expected,
            self.lookahead.kind.describe(),
        )
    }

    /// Consume a data-less token such as `;` or `(`
    fn expect(&mut self, kind: TokenKind<'a>) -> Result<Token<'a>> {
        if *self.peek() == kind {
            self.bump()
        } else {
            Err(self.error(&kind.describe()))
        }
    }

    /// Enter one level of nesting, failing past `ParseConfig::max_depth`
    fn descend(&mut self) -> Result<()> {
        if self.depth >= self.config.max_depth {
            return Err(self.error(&format!(
                "at most {} levels of nesting",
                self.config.max_depth
            )));
        }
        self.depth += 1;
        Ok(())
    }

    /// Require that the input is exhausted
    pub fn finish(&mut self) -> Result<()> {
        match self.peek() {
            TokenKind::End => Ok(()),
            _ => Err(self.error("end of input")),
        }
    }

    /// keyword := [!]?[A-Z_][A-Z0-9_]*
    pub fn keyword(&mut self) -> Result<&'a str> {
        match *self.peek() {
            TokenKind::Keyword(name) => {
                self.bump()?;
                Ok(name)
            }
            _ => Err(self.error("keyword")),
        }
    }

    /// value := literal | list | typed_parameter | keyword
    pub fn value(&mut self) -> Result<Value> {
        match self.peek() {
            TokenKind::LParen => Ok(Value::List(self.list()?)),
            TokenKind::Keyword(_) => {
                let name = self.keyword()?;
                // KEYWORD '(' is always a typed parameter, never keyword + list
                if *self.peek() == TokenKind::LParen {
                    let param = self.typed_body()?;
                    Ok(Value::Typed(Box::new(TypedParameter::new(name, param))))
                } else {
                    Ok(Value::Keyword(name.to_string()))
                }
            }
            kind if kind.is_literal() => {
                let token = self.bump()?;
                let offset = token.offset;
                Value::from_literal(token.kind).ok_or_else(|| {
                    Error::syntax(self.lexer.source(), offset, "parameter value", "punctuation")
                })
            }
            _ => Err(self.error("parameter value")),
        }
    }

    /// list := '(' [value (',' value)*] ')'
    ///
    /// Nesting is bounded by `ParseConfig::max_depth`.
    pub fn list(&mut self) -> Result<Vec<Value>> {
        self.descend()?;
        let items = self.list_items();
        self.depth -= 1;
        items
    }

    fn list_items(&mut self) -> Result<Vec<Value>> {
        self.expect(TokenKind::LParen)?;
        let mut items = Vec::new();
        if *self.peek() == TokenKind::RParen {
            self.bump()?;
            return Ok(items);
        }

        loop {
            items.push(self.value()?);
            match self.peek() {
                TokenKind::Comma => {
                    self.bump()?;
                }
                TokenKind::RParen => {
                    self.bump()?;
                    return Ok(items);
                }
                _ => return Err(self.error("',' or ')'")),
            }
        }
    }

    /// typed_parameter := keyword '(' value ')'
    pub fn typed_parameter(&mut self) -> Result<TypedParameter> {
        let type_name = self.keyword()?;
        let param = self.typed_body()?;
        Ok(TypedParameter::new(type_name, param))
    }

    /// '(' value ')' after a type name
    fn typed_body(&mut self) -> Result<Value> {
        self.descend()?;
        self.expect(TokenKind::LParen)?;
        let param = self.value()?;
        self.expect(TokenKind::RParen)?;
        self.depth -= 1;
        Ok(param)
    }

    /// header_entity := keyword list ';'
    pub fn header_entity(&mut self) -> Result<EntityRecord> {
        let name = self.keyword()?;
        let params = self.list()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(EntityRecord::new(name, params))
    }

    /// entity_instance := '#' id '=' (keyword list | '(' (keyword list)+ ')') ';'
    pub fn entity_instance(&mut self) -> Result<DataEntityRecord> {
        let id = match *self.peek() {
            TokenKind::EntityRef(0) => return Err(self.error("positive entity instance name")),
            TokenKind::EntityRef(id) => {
                self.bump()?;
                id
            }
            _ => return Err(self.error("entity instance name")),
        };
        self.expect(TokenKind::Equals)?;

        let body = match self.peek() {
            TokenKind::Keyword(_) => {
                let name = self.keyword()?;
                InstanceBody::Simple(EntityRecord::new(name, self.list()?))
            }
            TokenKind::LParen if self.config.complex_entities => {
                self.bump()?;
                let mut parts = Vec::new();
                loop {
                    let name = self.keyword()?;
                    parts.push(EntityRecord::new(name, self.list()?));
                    if *self.peek() == TokenKind::RParen {
                        self.bump()?;
                        break;
                    }
                }
                InstanceBody::Complex(parts)
            }
            TokenKind::LParen => {
                return Err(self.error("entity keyword (complex entity instances are disabled)"));
            }
            _ => return Err(self.error("entity keyword")),
        };
        self.expect(TokenKind::Semicolon)?;

        trace!(id, complex = matches!(body, InstanceBody::Complex(_)), "Parsed entity instance");
        Ok(DataEntityRecord { id, body })
    }

    /// header_section := HEADER ';' header_entity* ENDSEC ';'
    fn header_section(&mut self) -> Result<(usize, Vec<Statement<EntityRecord>>)> {
        let offset = self.expect(TokenKind::Header)?.offset;
        self.expect(TokenKind::Semicolon)?;

        let mut records = Vec::new();
        while matches!(self.peek(), TokenKind::Keyword(_)) {
            let offset = self.lookahead.offset;
            records.push(Statement {
                offset,
                node: self.header_entity()?,
            });
        }
        self.section_end("header entity or ENDSEC")?;

        debug!(records = records.len(), "Parsed header section");
        Ok((offset, records))
    }

    /// data_section := DATA [list] ';' entity_instance* ENDSEC ';'
    fn data_section(&mut self) -> Result<DataSectionTree> {
        let offset = self.expect(TokenKind::Data)?.offset;
        let parameters = match self.peek() {
            TokenKind::LParen => Some(self.list()?),
            _ => None,
        };
        self.expect(TokenKind::Semicolon)?;

        let mut instances = Vec::new();
        while matches!(self.peek(), TokenKind::EntityRef(_)) {
            let offset = self.lookahead.offset;
            instances.push(Statement {
                offset,
                node: self.entity_instance()?,
            });
        }
        self.section_end("entity instance or ENDSEC")?;

        debug!(instances = instances.len(), offset, "Parsed data section");
        Ok(DataSectionTree {
            offset,
            parameters,
            instances,
        })
    }

    /// ENDSEC ';'
    fn section_end(&mut self, expected: &str) -> Result<()> {
        if *self.peek() != TokenKind::EndSec {
            return Err(self.error(expected));
        }
        self.bump()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(())
    }

    /// step_file := ISO-10303-21 ';' header_section data_section+ END-ISO-10303-21 ';'
    pub fn step_file(&mut self) -> Result<SyntaxTree> {
        self.expect(TokenKind::IsoBegin)?;
        self.expect(TokenKind::Semicolon)?;
        let (header_offset, header) = self.header_section()?;

        let mut data_sections = Vec::new();
        loop {
            match self.peek() {
                TokenKind::Data => data_sections.push(self.data_section()?),
                TokenKind::IsoEnd if !data_sections.is_empty() => break,
                _ if data_sections.is_empty() => return Err(self.error("DATA")),
                _ => return Err(self.error("DATA or END-ISO-10303-21")),
            }
        }

        self.expect(TokenKind::IsoEnd)?;
        self.expect(TokenKind::Semicolon)?;
        self.finish()?;

        Ok(SyntaxTree {
            header_offset,
            header,
            data_sections,
        })
    }
}

/// Run one grammar rule over the whole input
fn parse_all<'a, T>(
    input: &'a str,
    config: ParseConfig,
    rule: impl FnOnce(&mut Parser<'a>) -> Result<T>,
) -> Result<T> {
    let mut parser = Parser::with_config(input, config)?;
    let result = rule(&mut parser)?;
    parser.finish()?;
    Ok(result)
}

/// Parse a single parameter value: `#12`, `'text'`, `(1,2)`, `IFCLABEL('x')`
///
/// Lists and typed parameters may nest at most
/// [`DEFAULT_MAX_DEPTH`](crate::config::DEFAULT_MAX_DEPTH) levels deep.
pub fn parse_value(input: &str) -> Result<Value> {
    parse_all(input, ParseConfig::default(), Parser::value)
}

/// Parse a parenthesized list: `()`, `(1,3.1415)`
pub fn parse_list(input: &str) -> Result<Vec<Value>> {
    parse_all(input, ParseConfig::default(), Parser::list)
}

/// Parse a typed parameter: `TEST(100)`
pub fn parse_typed_parameter(input: &str) -> Result<TypedParameter> {
    parse_all(input, ParseConfig::default(), Parser::typed_parameter)
}

/// Parse a lone keyword: `IFCWALL`, `!USER_KEYWORD`
pub fn parse_keyword(input: &str) -> Result<&str> {
    parse_all(input, ParseConfig::default(), Parser::keyword)
}

/// Parse a header statement: `FILE_SCHEMA(('IFC2X3'));`
pub fn parse_header_entity(input: &str) -> Result<EntityRecord> {
    parse_all(input, ParseConfig::default(), Parser::header_entity)
}

/// Parse a complete entity line
/// Example: #123=IFCWALL('guid','owner',$,$,'name',$,$,$);
pub fn parse_entity_instance(input: &str) -> Result<DataEntityRecord> {
    parse_all(input, ParseConfig::default(), Parser::entity_instance)
}

/// Parse a whole document into its syntax tree
pub fn parse_syntax_tree(input: &str, config: ParseConfig) -> Result<SyntaxTree> {
    parse_all(input, config, Parser::step_file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list() {
        assert_eq!(parse_list("()").unwrap(), Vec::<Value>::new());
        assert_eq!(parse_list("( )").unwrap(), Vec::<Value>::new());
    }

    #[test]
    fn test_list() {
        assert_eq!(
            parse_list("('IFC2X3')").unwrap(),
            vec![Value::String("IFC2X3".into())]
        );
        assert_eq!(
            parse_list("(1, 3.1415)").unwrap(),
            vec![Value::Integer(1), Value::Real(3.1415)]
        );
    }

    #[test]
    fn test_nested_list() {
        let items = parse_list("(1,(2,3),4)").unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], Value::Integer(1));
        match &items[1] {
            Value::List(inner) => {
                assert_eq!(inner, &vec![Value::Integer(2), Value::Integer(3)]);
            }
            other => panic!("Expected nested List, got {:?}", other),
        }
        assert_eq!(items[2], Value::Integer(4));

        let deep = parse_value("((((()))))").unwrap();
        let mut depth = 0;
        let mut current = &deep;
        while let Value::List(items) = current {
            depth += 1;
            match items.first() {
                Some(next) => current = next,
                None => break,
            }
        }
        assert_eq!(depth, 5);
    }

    #[test]
    fn test_nesting_limit() {
        let config = ParseConfig::default().with_max_depth(2);
        let mut parser = Parser::with_config("((1))", config).unwrap();
        assert!(parser.list().is_ok());

        let mut parser = Parser::with_config("(((1)))", config).unwrap();
        match parser.list() {
            Err(Error::Syntax { position, expected, .. }) => {
                assert_eq!(position.offset, 2);
                assert_eq!(expected, "at most 2 levels of nesting");
            }
            other => panic!("Expected syntax error, got {:?}", other),
        }

        let mut parser = Parser::with_config("A(B(C(1)))", config).unwrap();
        assert!(matches!(parser.value(), Err(Error::Syntax { .. })));

        // Siblings do not accumulate depth
        let mut parser = Parser::with_config("((1),(2),(3))", config).unwrap();
        assert_eq!(parser.list().unwrap().len(), 3);

        let deep = "(".repeat(100_000);
        assert!(matches!(parse_value(&deep), Err(Error::Syntax { .. })));
    }

    #[test]
    fn test_unbalanced_list() {
        assert!(matches!(parse_list("(1,2"), Err(Error::Syntax { .. })));
        assert!(matches!(parse_list("(1,2))"), Err(Error::Syntax { .. })));
        assert!(matches!(parse_list("(1,)"), Err(Error::Syntax { .. })));
        assert!(matches!(parse_list("(1 2)"), Err(Error::Syntax { .. })));
    }

    #[test]
    fn test_typed_parameter() {
        let typed = parse_typed_parameter("TEST(100)").unwrap();
        assert_eq!(typed.type_name, "TEST");
        assert_eq!(typed.param, Value::Integer(100));

        let typed = parse_typed_parameter("TEST((100, 200))").unwrap();
        assert_eq!(typed.type_name, "TEST");
        assert_eq!(
            typed.param,
            Value::List(vec![Value::Integer(100), Value::Integer(200)])
        );

        assert!(parse_typed_parameter("TEST(1,2)").is_err());
        assert!(parse_typed_parameter("TEST()").is_err());
    }

    #[test]
    fn test_typed_parameter_in_list() {
        let items = parse_list("(IFCBOOLEAN(.T.),IFCLABEL('x'),.NOTDEFINED.)").unwrap();
        assert_eq!(items.len(), 3);
        let first = items[0].as_typed().unwrap();
        assert_eq!(first.type_name, "IFCBOOLEAN");
        assert_eq!(first.param, Value::Enumeration("T".into()));
        assert_eq!(items[1].as_typed().unwrap().param.as_string(), Some("x"));
        assert_eq!(items[2].as_enum(), Some("NOTDEFINED"));
    }

    #[test]
    fn test_bare_keyword_value() {
        assert_eq!(parse_value("UNKNOWN").unwrap(), Value::Keyword("UNKNOWN".into()));
        assert_eq!(
            parse_list("(A,B)").unwrap(),
            vec![Value::Keyword("A".into()), Value::Keyword("B".into())]
        );
    }

    #[test]
    fn test_literal_values() {
        assert_eq!(parse_value("$").unwrap(), Value::Omitted);
        assert_eq!(parse_value("*").unwrap(), Value::Inherited);
        assert_eq!(parse_value("#42").unwrap(), Value::EntityRef(42));
        assert_eq!(parse_value("''''").unwrap(), Value::String("'".into()));
        assert_eq!(parse_value("'x''x'").unwrap(), Value::String("x'x".into()));
        match parse_value("\"0FF\"").unwrap() {
            Value::Binary(bin) => assert_eq!((bin.value(), bin.bits()), (Some(255), 8)),
            other => panic!("Expected binary, got {:?}", other),
        }
    }

    #[test]
    fn test_keywords() {
        for word in ["KEYWORD", "KEYWORD_0", "_KEYWORD_0", "!USER_KEYWORD", "!_USER_KEYWORD"] {
            assert_eq!(parse_keyword(word).unwrap(), word);
        }
        for word in ["0KEYWORD", "KEYWORD.", "KEYWORD!", "Keyword"] {
            assert!(parse_keyword(word).is_err(), "{} should be rejected", word);
        }
        assert!(matches!(parse_keyword("0KEYWORD"), Err(Error::Syntax { .. })));
    }

    #[test]
    fn test_header_entity() {
        let record = parse_header_entity("FILE_SCHEMA(('IFC2X3'));").unwrap();
        assert_eq!(record.name, "FILE_SCHEMA");
        assert_eq!(
            record.params,
            vec![Value::List(vec![Value::String("IFC2X3".into())])]
        );
        assert!(parse_header_entity("FILE_SCHEMA(('IFC2X3'))").is_err());
    }

    #[test]
    fn test_parse_entity() {
        let input = "#123=IFCWALL('guid','owner',$,$,'name',$,$,$);";
        let record = parse_entity_instance(input).unwrap();
        assert_eq!(record.id, 123);
        assert_eq!(record.keyword(), Some("IFCWALL"));
        assert_eq!(record.params().len(), 8);
    }

    #[test]
    fn test_parse_entity_with_nested_list() {
        let record = parse_entity_instance("#9= IFCDIRECTION((0.,0.,1.));").unwrap();
        assert_eq!(record.id, 9);
        assert_eq!(record.params().len(), 1);
        let inner = record.params()[0].as_list().unwrap();
        assert_eq!(inner.len(), 3);
        assert_eq!(inner[2].as_float(), Some(1.0));
    }

    #[test]
    fn test_zero_instance_name() {
        match parse_entity_instance("#0=A();") {
            Err(Error::Syntax { position, expected, found }) => {
                assert_eq!(position.offset, 0);
                assert_eq!(expected, "positive entity instance name");
                assert_eq!(found, "entity reference #0");
            }
            other => panic!("Expected syntax error, got {:?}", other),
        }
        // References to #0 are still values
        assert_eq!(parse_value("#0").unwrap(), Value::EntityRef(0));

        let input = "ISO-10303-21;HEADER;ENDSEC;DATA;#0=A();ENDSEC;END-ISO-10303-21;";
        match parse_syntax_tree(input, ParseConfig::default()) {
            Err(Error::Syntax { position, .. }) => assert_eq!(position.offset, 32),
            other => panic!("Expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_complex_entity() {
        let input = "#10=(NAMED_UNIT(*)PLANE_ANGLE_UNIT()SI_UNIT($,.RADIAN.));";
        let record = parse_entity_instance(input).unwrap();
        assert!(record.is_complex());
        let names: Vec<&str> = record.records().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["NAMED_UNIT", "PLANE_ANGLE_UNIT", "SI_UNIT"]);
        assert_eq!(record.record("SI_UNIT").unwrap().params[1], Value::Enumeration("RADIAN".into()));

        assert!(parse_entity_instance("#10=();").is_err());
    }

    #[test]
    fn test_complex_entity_disabled() {
        let input = "#10=(A(1)B(2));";
        let config = ParseConfig::default().with_complex_entities(false);
        let mut parser = Parser::with_config(input, config).unwrap();
        match parser.entity_instance() {
            Err(Error::Syntax { expected, position, .. }) => {
                assert!(expected.contains("complex"));
                assert_eq!(position.offset, 4);
            }
            other => panic!("Expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_syntax_error_reports_expected_and_found() {
        let err = parse_entity_instance("#1 IFCWALL();").unwrap_err();
        match err {
            Error::Syntax {
                position,
                expected,
                found,
            } => {
                assert_eq!(position.offset, 3);
                assert_eq!(expected, "'='");
                assert_eq!(found, "keyword IFCWALL");
            }
            other => panic!("Expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_syntax_tree() {
        let input = "ISO-10303-21;\nHEADER;\nFILE_SCHEMA(('IFC4'));\nENDSEC;\n\
                     DATA;\n#1=A(1);\nENDSEC;\nDATA(('second'),('IFC4'));\n#2=B(#1);\nENDSEC;\n\
                     END-ISO-10303-21;\n";
        let tree = parse_syntax_tree(input, ParseConfig::default()).unwrap();
        assert_eq!(tree.header_offset, 14);
        assert_eq!(tree.header.len(), 1);
        assert_eq!(tree.data_sections.len(), 2);
        assert!(tree.data_sections[0].parameters.is_none());
        assert_eq!(tree.data_sections[1].parameters.as_ref().map(Vec::len), Some(2));
        assert_eq!(tree.data_sections[1].instances[0].node.id, 2);
    }

    #[test]
    fn test_missing_sections() {
        let no_data = "ISO-10303-21;HEADER;ENDSEC;END-ISO-10303-21;";
        match parse_syntax_tree(no_data, ParseConfig::default()) {
            Err(Error::Syntax { expected, .. }) => assert_eq!(expected, "DATA"),
            other => panic!("Expected syntax error, got {:?}", other),
        }

        let unclosed_header = "ISO-10303-21;HEADER;FILE_NAME();DATA;ENDSEC;END-ISO-10303-21;";
        assert!(matches!(
            parse_syntax_tree(unclosed_header, ParseConfig::default()),
            Err(Error::Syntax { .. })
        ));
    }

    #[test]
    fn test_trailing_input() {
        let input = "ISO-10303-21;HEADER;ENDSEC;DATA;ENDSEC;END-ISO-10303-21;#1=A();";
        assert!(matches!(
            parse_syntax_tree(input, ParseConfig::default()),
            Err(Error::Syntax { .. })
        ));
    }
}
