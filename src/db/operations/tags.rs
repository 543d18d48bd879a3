use sqlx::{Postgres, Row, Transaction};

/// Creates missing tags and links them to the review, bumping usage counts
/// for tags the review did not already reference.
pub async fn attach_tags(
    tx: &mut Transaction<'_, Postgres>,
    review_id: i64,
    tags: &[String],
    now: &str,
) -> Result<(), sqlx::Error> {
    for name in tags {
        let inserted = sqlx::query(
            r#"INSERT INTO "tags" ("name","count","createdAt","modifiedAt")
               VALUES ($1, 1, $2, $2)
               ON CONFLICT ("name") DO NOTHING
               RETURNING "id""#,
        )
        .bind(name)
        .bind(now)
        .fetch_optional(&mut **tx)
        .await?;

        let tag_id: i64 = match inserted {
            Some(row) => {
                let tag_id = row.try_get("id")?;
                link_tag(tx, review_id, tag_id).await?;
                continue;
            }
            None => {
                let row = sqlx::query(r#"SELECT "id" FROM "tags" WHERE "name" = $1 LIMIT 1"#)
                    .bind(name)
                    .fetch_one(&mut **tx)
                    .await?;
                row.try_get("id")?
            }
        };

        let linked = sqlx::query(
            r#"SELECT 1 AS "one" FROM "tag_objects"
               WHERE "type" = 'review' AND "objectId" = $1 AND "tagId" = $2 LIMIT 1"#,
        )
        .bind(review_id)
        .bind(tag_id)
        .fetch_optional(&mut **tx)
        .await?;

        if linked.is_none() {
            link_tag(tx, review_id, tag_id).await?;
            sqlx::query(
                r#"UPDATE "tags" SET "count" = "count" + 1, "modifiedAt" = $1 WHERE "id" = $2"#,
            )
            .bind(now)
            .bind(tag_id)
            .execute(&mut **tx)
            .await?;
        }
    }

    Ok(())
}

/// Unlinks every tag from the review and decrements their usage counts.
pub async fn detach_tags(
    tx: &mut Transaction<'_, Postgres>,
    review_id: i64,
    now: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE "tags" SET "count" = "count" - 1, "modifiedAt" = $1
           WHERE "id" IN (
               SELECT "tagId" FROM "tag_objects"
               WHERE "type" = 'review' AND "objectId" = $2
           )"#,
    )
    .bind(now)
    .bind(review_id)
    .execute(&mut **tx)
    .await?;

    sqlx::query(r#"DELETE FROM "tag_objects" WHERE "type" = 'review' AND "objectId" = $1"#)
        .bind(review_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

async fn link_tag(
    tx: &mut Transaction<'_, Postgres>,
    review_id: i64,
    tag_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO "tag_objects" ("type","objectId","tagId")
           VALUES ('review', $1, $2)"#,
    )
    .bind(review_id)
    .bind(tag_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
