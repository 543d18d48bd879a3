use sqlx::{PgPool, Row};

#[derive(Debug, Clone)]
pub struct ProductRow {
    pub id: i64,
    pub name: String,
    pub brand_name: Option<String>,
    pub is_display: bool,
}

#[derive(Debug, Clone)]
pub struct GoodsInfo {
    pub goods_count: i32,
    pub min_price: i32,
    pub max_price: i32,
}

pub async fn get_display_product(
    pool: &PgPool,
    product_id: i64,
) -> Result<Option<ProductRow>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT "id","name","brandName","isDisplay"
           FROM "products" WHERE "id" = $1 AND "isDisplay" = TRUE LIMIT 1"#,
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| ProductRow {
        id: r.try_get("id").unwrap_or_default(),
        name: r.try_get("name").unwrap_or_default(),
        brand_name: r.try_get("brandName").ok(),
        is_display: r.try_get("isDisplay").unwrap_or(false),
    }))
}

pub async fn get_goods_info(
    pool: &PgPool,
    product_id: i64,
) -> Result<Option<GoodsInfo>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT "goodsCount","minPrice","maxPrice"
           FROM "product_goods" WHERE "productId" = $1 AND "goodsCount" > 0 LIMIT 1"#,
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| GoodsInfo {
        goods_count: r.try_get("goodsCount").unwrap_or(0),
        min_price: r.try_get("minPrice").unwrap_or(0),
        max_price: r.try_get("maxPrice").unwrap_or(0),
    }))
}
