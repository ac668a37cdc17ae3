//! Database migrations.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20260101_000001_create_content_tables;
mod m20260101_000002_create_tag_tables;
mod m20260101_000003_create_membership_tables;
mod m20260101_000004_create_processing_job_table;
mod m20260101_000005_add_content_search_functions;
mod m20260101_000006_add_relationship_sync_trigger;

/// Migrator for running all migrations.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_create_content_tables::Migration),
            Box::new(m20260101_000002_create_tag_tables::Migration),
            Box::new(m20260101_000003_create_membership_tables::Migration),
            Box::new(m20260101_000004_create_processing_job_table::Migration),
            Box::new(m20260101_000005_add_content_search_functions::Migration),
            Box::new(m20260101_000006_add_relationship_sync_trigger::Migration),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_names_are_ordered() {
        let names: Vec<String> = Migrator::migrations()
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(names.len(), 6);
    }
}
