//! School and class directories.
//!
//! The subject registry only needs to know whether an owning school or
//! class exists and what a class is called. Those lookups are injected as
//! traits rather than resolved through any global model registry.

use crate::model::roster::{School, SchoolClass};
use crate::model::subject::{ClassId, SchoolId};
use crate::model::EntityKind;
use crate::repo::{require_schema, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

/// Class lookups used by subject create and list joins.
pub trait ClassDirectory {
    fn class_exists(&self, id: ClassId) -> RepoResult<bool>;
    fn class_name(&self, id: ClassId) -> RepoResult<Option<String>>;
}

/// School (admin) lookups used by subject create.
pub trait SchoolDirectory {
    fn school_exists(&self, id: SchoolId) -> RepoResult<bool>;
}

/// SQLite-backed school and class directory.
pub struct SqliteDirectory<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDirectory<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        require_schema(conn, &["schools", "classes"])?;
        Ok(Self { conn })
    }

    pub fn create_school(&self, name: &str) -> RepoResult<School> {
        let school = School {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
        };
        self.conn.execute(
            "INSERT INTO schools (uuid, display_name) VALUES (?1, ?2);",
            params![school.id.to_string(), school.name.as_str()],
        )?;
        Ok(school)
    }

    pub fn create_class(&self, school_id: SchoolId, name: &str) -> RepoResult<SchoolClass> {
        if !self.school_exists(school_id)? {
            return Err(RepoError::not_found(EntityKind::School, school_id));
        }

        let class = SchoolClass {
            id: Uuid::new_v4(),
            school_id,
            name: name.trim().to_string(),
        };
        self.conn.execute(
            "INSERT INTO classes (uuid, school_uuid, display_name) VALUES (?1, ?2, ?3);",
            params![
                class.id.to_string(),
                school_id.to_string(),
                class.name.as_str()
            ],
        )?;
        Ok(class)
    }
}

impl ClassDirectory for SqliteDirectory<'_> {
    fn class_exists(&self, id: ClassId) -> RepoResult<bool> {
        Ok(self.class_name(id)?.is_some())
    }

    fn class_name(&self, id: ClassId) -> RepoResult<Option<String>> {
        let name = self
            .conn
            .query_row(
                "SELECT display_name FROM classes WHERE uuid = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name)
    }
}

impl SchoolDirectory for SqliteDirectory<'_> {
    fn school_exists(&self, id: SchoolId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM schools WHERE uuid = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}
