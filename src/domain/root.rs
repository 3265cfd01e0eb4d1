//! The root of every business object tree.

use crate::domain::error::DomainResult;
use crate::domain::node::{BomNode, FieldReader, FieldWriter};

/// Reserved key of the root node.
pub const ROOT_KEY: &str = "-- ROOT --";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BomRoot {
    key: String,
}

impl Default for BomRoot {
    fn default() -> Self {
        Self {
            key: ROOT_KEY.to_string(),
        }
    }
}

impl BomNode for BomRoot {
    type Key = String;
    const TYPE_TAG: &'static str = "BomRoot";

    fn key(&self) -> &String {
        &self.key
    }

    fn save(&self, out: &mut FieldWriter) {
        out.write_str(self.key.as_str());
    }

    fn load(input: &mut FieldReader<'_>) -> DomainResult<Self> {
        let key = input.read_str()?;
        if key != ROOT_KEY {
            return Err(input.error(format!("root key must be '{}', found '{}'", ROOT_KEY, key)));
        }
        Ok(Self { key })
    }
}
