// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Assembled STEP file
//!
//! Groups the parsed header statements and data instances into a
//! [`StepFile`]: header records in file order plus an instance index.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::config::ParseConfig;
use crate::error::{Error, Position, Result};
use crate::parser::{parse_syntax_tree, SyntaxTree};
use crate::value::{DataEntityRecord, HeaderEntityRecord, Value};

/// Header entities every conforming file carries
pub const STANDARD_HEADER_ENTITIES: [&str; 3] = ["FILE_DESCRIPTION", "FILE_NAME", "FILE_SCHEMA"];

/// Instance index type
pub type InstanceIndex = FxHashMap<u64, DataEntityRecord>;

/// One DATA section: its optional parameters and instance ids in file order
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataSection {
    pub parameters: Option<Vec<Value>>,
    pub ids: Vec<u64>,
}

/// A parsed ISO-10303-21 document
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepFile {
    header: Vec<HeaderEntityRecord>,
    sections: Vec<DataSection>,
    instances: InstanceIndex,
}

impl StepFile {
    /// Parse a complete document with the default configuration
    pub fn parse(content: &str) -> Result<Self> {
        Self::parse_with_config(content, ParseConfig::default())
    }

    pub fn parse_with_config(content: &str, config: ParseConfig) -> Result<Self> {
        let tree = parse_syntax_tree(content, config)?;
        let file = Self::from_syntax_tree(tree, content, config)?;
        debug!(
            content_size = content.len(),
            header_entities = file.header.len(),
            instances = file.instances.len(),
            "Parsed STEP file"
        );
        Ok(file)
    }

    /// Build the file from a syntax tree parsed out of `source`.
    ///
    /// Fails on a repeated instance id, or on a missing standard header
    /// entity when the configuration asks for it.
    pub fn from_syntax_tree(tree: SyntaxTree, source: &str, config: ParseConfig) -> Result<Self> {
        let instance_count: usize = tree.data_sections.iter().map(|s| s.instances.len()).sum();
        let mut instances =
            FxHashMap::with_capacity_and_hasher(instance_count, Default::default());
        let mut sections = Vec::with_capacity(tree.data_sections.len());

        for section in tree.data_sections {
            let mut ids = Vec::with_capacity(section.instances.len());
            for statement in section.instances {
                let id = statement.node.id;
                if instances.insert(id, statement.node).is_some() {
                    return Err(Error::structure(
                        source,
                        statement.offset,
                        format!("duplicate entity instance #{}", id),
                    ));
                }
                ids.push(id);
            }
            sections.push(DataSection {
                parameters: section.parameters,
                ids,
            });
        }

        let file = Self {
            header: tree.header.into_iter().map(|s| s.node).collect(),
            sections,
            instances,
        };

        if config.require_standard_header {
            file.check_standard_header().map_err(|missing| {
                Error::structure(
                    source,
                    tree.header_offset,
                    format!("missing header entity {}", missing),
                )
            })?;
        }

        Ok(file)
    }

    /// Assemble a file directly from records (for writing)
    pub fn from_records(
        header: Vec<HeaderEntityRecord>,
        records: impl IntoIterator<Item = DataEntityRecord>,
    ) -> Result<Self> {
        let mut instances = FxHashMap::default();
        let mut ids = Vec::new();
        for record in records {
            let id = record.id;
            if id == 0 {
                return Err(Error::Structure {
                    position: Position::default(),
                    message: "entity instance names must be positive".to_string(),
                });
            }
            if instances.insert(id, record).is_some() {
                return Err(Error::Structure {
                    position: Position::default(),
                    message: format!("duplicate entity instance #{}", id),
                });
            }
            ids.push(id);
        }
        Ok(Self {
            header,
            sections: vec![DataSection {
                parameters: None,
                ids,
            }],
            instances,
        })
    }

    /// The first missing standard header entity, if any
    pub fn check_standard_header(&self) -> std::result::Result<(), &'static str> {
        match STANDARD_HEADER_ENTITIES
            .iter()
            .copied()
            .find(|name| self.header_entity(name).is_none())
        {
            Some(missing) => Err(missing),
            None => Ok(()),
        }
    }

    /// Header records in file order
    #[inline]
    pub fn header(&self) -> &[HeaderEntityRecord] {
        &self.header
    }

    /// First header record with the given keyword
    pub fn header_entity(&self, name: &str) -> Option<&HeaderEntityRecord> {
        self.header.iter().find(|r| r.name == name)
    }

    /// Schema names from FILE_SCHEMA, e.g. `["IFC2X3"]`
    pub fn schema_identifiers(&self) -> Vec<&str> {
        self.header_entity("FILE_SCHEMA")
            .and_then(|r| r.get(0))
            .and_then(Value::as_list)
            .map(|items| items.iter().filter_map(Value::as_string).collect())
            .unwrap_or_default()
    }

    /// DATA sections in file order
    #[inline]
    pub fn sections(&self) -> &[DataSection] {
        &self.sections
    }

    /// Instance index keyed by id
    #[inline]
    pub fn index(&self) -> &InstanceIndex {
        &self.instances
    }

    /// Number of entity instances
    #[inline]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Look up an instance by id - O(1)
    #[inline]
    pub fn get(&self, id: u64) -> Option<&DataEntityRecord> {
        self.instances.get(&id)
    }

    /// Resolve entity reference (follow #ID)
    /// Returns None for anything that is not a reference or points nowhere
    #[inline]
    pub fn resolve(&self, value: &Value) -> Option<&DataEntityRecord> {
        value.as_entity_ref().and_then(|id| self.get(id))
    }

    /// Resolve a list of entity references, skipping non-references
    pub fn resolve_list(&self, value: &Value) -> Vec<&DataEntityRecord> {
        value
            .as_list()
            .map(|items| items.iter().filter_map(|item| self.resolve(item)).collect())
            .unwrap_or_default()
    }

    /// Instances in file order
    pub fn instances(&self) -> impl Iterator<Item = &DataEntityRecord> + '_ {
        self.sections
            .iter()
            .flat_map(|s| s.ids.iter())
            .filter_map(move |id| self.instances.get(id))
    }

    /// Simple instances with the given keyword, in file order
    pub fn instances_of<'s>(
        &'s self,
        keyword: &'s str,
    ) -> impl Iterator<Item = &'s DataEntityRecord> + 's {
        self.instances().filter(move |r| r.keyword() == Some(keyword))
    }

    /// Count instances by keyword (complex instances count once per partial record)
    pub fn count_by_type(&self) -> FxHashMap<String, usize> {
        let mut counts = FxHashMap::default();
        for record in self.instances.values() {
            for part in record.records() {
                *counts.entry(part.name.clone()).or_insert(0) += 1;
            }
        }
        counts
    }
}

/// Parse a complete document with the default configuration
pub fn parse_step_file(content: &str) -> Result<StepFile> {
    StepFile::parse(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('test'),'2;1');
FILE_NAME('a.ifc','2011-01-17T09:42:14',(''),(''),'','','');
FILE_SCHEMA(('IFC2X3'));
ENDSEC;
DATA;
#1=IFCWALL('a',$);
#2=IFCWALL('b',#1);
#3=(A(1)B(2));
ENDSEC;
END-ISO-10303-21;
";

    #[test]
    fn test_assemble() {
        let file = StepFile::parse(MINIMAL).unwrap();
        assert_eq!(file.header().len(), 3);
        assert_eq!(file.schema_identifiers(), vec!["IFC2X3"]);
        assert_eq!(file.len(), 3);
        assert_eq!(file.sections().len(), 1);
        assert_eq!(file.sections()[0].ids, vec![1, 2, 3]);
        assert!(file.check_standard_header().is_ok());
    }

    #[test]
    fn test_resolve() {
        let file = StepFile::parse(MINIMAL).unwrap();
        let wall = file.get(2).unwrap();
        let target = file.resolve(wall.get(1).unwrap()).unwrap();
        assert_eq!(target.id, 1);
        assert!(file.resolve(&Value::EntityRef(99)).is_none());
        assert!(file.resolve(&Value::Omitted).is_none());

        let refs = Value::List(vec![Value::EntityRef(1), Value::Omitted, Value::EntityRef(3)]);
        let resolved: Vec<u64> = file.resolve_list(&refs).iter().map(|r| r.id).collect();
        assert_eq!(resolved, vec![1, 3]);
    }

    #[test]
    fn test_instances_in_order() {
        let file = StepFile::parse(MINIMAL).unwrap();
        let ids: Vec<u64> = file.instances().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        let walls: Vec<u64> = file.instances_of("IFCWALL").map(|r| r.id).collect();
        assert_eq!(walls, vec![1, 2]);

        let counts = file.count_by_type();
        assert_eq!(counts.get("IFCWALL"), Some(&2));
        assert_eq!(counts.get("A"), Some(&1));
        assert_eq!(counts.get("B"), Some(&1));
    }

    #[test]
    fn test_duplicate_id() {
        let input = "ISO-10303-21;HEADER;ENDSEC;DATA;\n#1=A();\n#1=B();\nENDSEC;END-ISO-10303-21;";
        match StepFile::parse(input) {
            Err(Error::Structure { position, message }) => {
                assert_eq!(position.line, 3);
                assert!(message.contains("#1"));
            }
            other => panic!("Expected structure error, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_id_across_sections() {
        let input = "ISO-10303-21;HEADER;ENDSEC;DATA;#1=A();ENDSEC;DATA;#1=B();ENDSEC;END-ISO-10303-21;";
        assert!(matches!(StepFile::parse(input), Err(Error::Structure { .. })));
    }

    #[test]
    fn test_standard_header_policy() {
        let input = "ISO-10303-21;HEADER;FILE_SCHEMA(('IFC4'));ENDSEC;DATA;ENDSEC;END-ISO-10303-21;";

        // Lenient by default: the consumer decides
        let file = StepFile::parse(input).unwrap();
        assert_eq!(file.check_standard_header(), Err("FILE_DESCRIPTION"));

        let config = ParseConfig::default().with_standard_header(true);
        match StepFile::parse_with_config(input, config) {
            Err(Error::Structure { position, message }) => {
                assert_eq!(position.offset, 13);
                assert!(message.contains("FILE_DESCRIPTION"));
            }
            other => panic!("Expected structure error, got {:?}", other),
        }
    }

    #[test]
    fn test_from_records() {
        let file = StepFile::from_records(
            vec![],
            vec![
                DataEntityRecord::simple(5, "B", vec![]),
                DataEntityRecord::simple(2, "A", vec![]),
            ],
        )
        .unwrap();
        let ids: Vec<u64> = file.instances().map(|r| r.id).collect();
        assert_eq!(ids, vec![5, 2]);

        let duplicate = StepFile::from_records(
            vec![],
            vec![
                DataEntityRecord::simple(1, "A", vec![]),
                DataEntityRecord::simple(1, "B", vec![]),
            ],
        );
        match duplicate {
            Err(Error::Structure { position, message }) => {
                assert_eq!((position.line, position.column), (1, 1));
                assert!(message.contains("#1"));
            }
            other => panic!("Expected structure error, got {:?}", other),
        }

        let zero = StepFile::from_records(vec![], vec![DataEntityRecord::simple(0, "A", vec![])]);
        assert!(matches!(zero, Err(Error::Structure { .. })));
    }
}
