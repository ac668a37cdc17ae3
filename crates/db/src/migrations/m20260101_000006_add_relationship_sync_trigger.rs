//! Keep content_relationships in step with content.parent_content_id.
//!
//! Writes still set `parent_content_id`; the trigger upserts the matching
//! edge, and existing rows are backfilled once.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(
            r"
            CREATE OR REPLACE FUNCTION sync_content_relationship()
            RETURNS TRIGGER
            LANGUAGE plpgsql
            AS $$
            BEGIN
                INSERT INTO content_relationships
                    (id, from_content_id, to_content_id, display_order, created_at)
                VALUES (
                    gen_random_uuid()::text,
                    NEW.parent_content_id,
                    NEW.id,
                    COALESCE((
                        SELECT MAX(r.display_order) + 1
                        FROM content_relationships r
                        WHERE r.from_content_id IS NOT DISTINCT FROM NEW.parent_content_id
                    ), 0),
                    NEW.created_at
                )
                ON CONFLICT (to_content_id) DO UPDATE
                SET from_content_id = EXCLUDED.from_content_id,
                    display_order = EXCLUDED.display_order;
                RETURN NEW;
            END;
            $$;
            ",
        )
        .await?;

        db.execute_unprepared(
            r"
            DROP TRIGGER IF EXISTS trg_sync_content_relationship ON content;
            CREATE TRIGGER trg_sync_content_relationship
            AFTER INSERT OR UPDATE OF parent_content_id ON content
            FOR EACH ROW
            EXECUTE FUNCTION sync_content_relationship();
            ",
        )
        .await?;

        // Backfill edges for rows written before the trigger existed
        db.execute_unprepared(
            r"
            INSERT INTO content_relationships
                (id, from_content_id, to_content_id, display_order, created_at)
            SELECT
                gen_random_uuid()::text,
                c.parent_content_id,
                c.id,
                (ROW_NUMBER() OVER (
                    PARTITION BY c.parent_content_id ORDER BY c.created_at, c.id
                ) - 1)::integer,
                c.created_at
            FROM content c
            ON CONFLICT (to_content_id) DO NOTHING;
            ",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared("DROP TRIGGER IF EXISTS trg_sync_content_relationship ON content;")
            .await?;
        db.execute_unprepared("DROP FUNCTION IF EXISTS sync_content_relationship();")
            .await?;

        Ok(())
    }
}
