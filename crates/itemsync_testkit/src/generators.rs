//! Property-based test generators using proptest.
//!
//! Tree operations refer to earlier items by index; the index is taken
//! modulo the number of items that exist when the operation is applied, so
//! every generated sequence is applicable.

use itemsync_protocol::DataType;
use proptest::prelude::*;

/// Strategy for generating any syncable data type.
pub fn data_type_strategy() -> impl Strategy<Value = DataType> {
    prop::sample::select(
        DataType::ALL
            .iter()
            .copied()
            .filter(|data_type| *data_type != DataType::TopLevel)
            .collect::<Vec<_>>(),
    )
}

/// Strategy for generating a non-empty set of syncable data types.
pub fn data_type_set_strategy() -> impl Strategy<Value = Vec<DataType>> {
    prop::collection::btree_set(data_type_strategy(), 1..6)
        .prop_map(|types| types.into_iter().collect())
}

/// Strategy for generating client-defined unique tags.
pub fn client_tag_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9+/]{1,24}").expect("Invalid regex")
}

/// Strategy for generating entity names.
pub fn entity_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 ]{0,32}").expect("Invalid regex")
}

/// A client action on a bookmark tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeOp {
    /// Create a folder under the indexed folder, or under the root.
    CreateFolder {
        /// Parent index; `None` means the root.
        parent: Option<usize>,
    },
    /// Create a bookmark under the indexed folder, or under the root.
    CreateBookmark {
        /// Parent index; `None` means the root.
        parent: Option<usize>,
    },
    /// Rename the indexed item.
    Rename {
        /// Item index.
        target: usize,
        /// New name.
        name: String,
    },
    /// Delete the indexed item.
    Delete {
        /// Item index.
        target: usize,
    },
}

/// Strategy for generating one tree operation.
pub fn tree_op_strategy() -> impl Strategy<Value = TreeOp> {
    prop_oneof![
        3 => prop::option::of(any::<usize>()).prop_map(|parent| TreeOp::CreateFolder { parent }),
        4 => prop::option::of(any::<usize>()).prop_map(|parent| TreeOp::CreateBookmark { parent }),
        2 => (any::<usize>(), entity_name_strategy())
            .prop_map(|(target, name)| TreeOp::Rename { target, name }),
        1 => any::<usize>().prop_map(|target| TreeOp::Delete { target }),
    ]
}

/// Strategy for generating a sequence of tree operations.
pub fn tree_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<TreeOp>> {
    prop::collection::vec(tree_op_strategy(), 1..=max_len.max(1))
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
