use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A message travelling through a route
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    id: Uuid,
    created_at: DateTime<Utc>,
    pub body: String,
    pub headers: BTreeMap<String, String>,
}

impl Exchange {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            body: body.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}
