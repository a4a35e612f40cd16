use sqlx::PgPool;

use crate::dto::HealthDependencyStatus;

pub(super) async fn check_postgres(pool: PgPool) -> HealthDependencyStatus {
    match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&pool).await {
        Ok(_) => HealthDependencyStatus {
            status: "ok",
            detail: None,
        },
        Err(error) => HealthDependencyStatus {
            status: "error",
            detail: Some(error.to_string()),
        },
    }
}

pub(super) async fn check_redis(
    client: Option<redis::Client>,
    required: bool,
) -> HealthDependencyStatus {
    let Some(client) = client else {
        return HealthDependencyStatus {
            status: if required { "error" } else { "disabled" },
            detail: required.then(|| "redis is required but not configured".to_owned()),
        };
    };

    let mut connection = match client.get_multiplexed_async_connection().await {
        Ok(connection) => connection,
        Err(error) => {
            return HealthDependencyStatus {
                status: "error",
                detail: Some(error.to_string()),
            };
        }
    };

    match redis::cmd("PING")
        .query_async::<String>(&mut connection)
        .await
    {
        Ok(_) => HealthDependencyStatus {
            status: "ok",
            detail: None,
        },
        Err(error) => HealthDependencyStatus {
            status: "error",
            detail: Some(error.to_string()),
        },
    }
}
