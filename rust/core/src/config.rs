// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parser configuration

/// Default limit on nested lists and typed parameters
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Options controlling what the parser and assembler accept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParseConfig {
    /// Accept complex entity instances: `#1=(A(...)B(...));`
    pub complex_entities: bool,
    /// Fail unless FILE_DESCRIPTION, FILE_NAME and FILE_SCHEMA are present.
    /// Off by default: checking the header is left to the consumer.
    pub require_standard_header: bool,
    /// Deepest nesting of lists and typed parameters before the parse
    /// fails with a syntax error instead of exhausting the stack.
    pub max_depth: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            complex_entities: true,
            require_standard_header: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ParseConfig {
    /// Strict settings: simple instances only, standard header required
    pub fn strict() -> Self {
        Self {
            complex_entities: false,
            require_standard_header: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_complex_entities(mut self, enabled: bool) -> Self {
        self.complex_entities = enabled;
        self
    }

    pub fn with_standard_header(mut self, required: bool) -> Self {
        self.require_standard_header = required;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}
