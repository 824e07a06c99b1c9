use crate::protocol::FileCategory;

use std::collections::BTreeMap;

/// The selected server path in each file browser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selections {
    paths: BTreeMap<FileCategory, String>,
}

impl Selections {
    pub fn get(&self, category: FileCategory) -> Option<&str> {
        self.paths.get(&category).map(String::as_str)
    }

    pub fn set(&mut self, category: FileCategory, path: impl Into<String>) {
        let path = path.into();
        if path.is_empty() {
            self.paths.remove(&category);
        } else {
            self.paths.insert(category, path);
        }
    }

    pub fn clear(&mut self, category: FileCategory) -> Option<String> {
        self.paths.remove(&category)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FileCategory, &str)> {
        self.paths.iter().map(|(category, path)| (*category, path.as_str()))
    }
}
