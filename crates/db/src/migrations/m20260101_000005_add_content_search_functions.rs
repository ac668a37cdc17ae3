//! Add trigram index and the content search functions.
//!
//! `search_content_fuzzy` ranks by trigram similarity and needs `pg_trgm`;
//! `search_content` is a plain case-insensitive substring match that the
//! repository falls back to when the fuzzy variant is unavailable. Substring
//! matching uses `strpos`, so `%`, `_` and `\` in a query are literal.

use sea_orm_migration::prelude::*;

/// Trigram-ranked search, with a literal substring match as a second arm.
const CREATE_SEARCH_FUZZY: &str = r"
            CREATE OR REPLACE FUNCTION search_content_fuzzy(
                p_group_id TEXT,
                p_query TEXT,
                p_limit INTEGER
            )
            RETURNS SETOF content
            LANGUAGE sql STABLE
            AS $$
                SELECT c.*
                FROM content c
                WHERE c.group_id = p_group_id
                  AND (c.data % p_query OR strpos(lower(c.data), lower(p_query)) > 0)
                ORDER BY similarity(c.data, p_query) DESC, c.created_at DESC
                LIMIT p_limit;
            $$;
            ";

/// Case-insensitive literal substring search.
const CREATE_SEARCH_EXACT: &str = r"
            CREATE OR REPLACE FUNCTION search_content(
                p_group_id TEXT,
                p_query TEXT,
                p_limit INTEGER
            )
            RETURNS SETOF content
            LANGUAGE sql STABLE
            AS $$
                SELECT c.*
                FROM content c
                WHERE c.group_id = p_group_id
                  AND strpos(lower(c.data), lower(p_query)) > 0
                ORDER BY c.created_at DESC
                LIMIT p_limit;
            $$;
            ";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared("CREATE EXTENSION IF NOT EXISTS pg_trgm;")
            .await?;

        db.execute_unprepared(
            r"
            CREATE INDEX IF NOT EXISTS idx_content_data_trgm
            ON content
            USING GIN (data gin_trgm_ops);
            ",
        )
        .await?;

        db.execute_unprepared(CREATE_SEARCH_FUZZY).await?;
        db.execute_unprepared(CREATE_SEARCH_EXACT).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared("DROP FUNCTION IF EXISTS search_content(TEXT, TEXT, INTEGER);")
            .await?;
        db.execute_unprepared(
            "DROP FUNCTION IF EXISTS search_content_fuzzy(TEXT, TEXT, INTEGER);",
        )
        .await?;
        db.execute_unprepared("DROP INDEX IF EXISTS idx_content_data_trgm;")
            .await?;

        Ok(())
    }
}
