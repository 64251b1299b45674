use invoice_dashboard::db::{MemoryStore, PgStore, RestStore, RowStore};
use invoice_dashboard::{api, create_pool, AppConfig, Dashboard};
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 使用本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::load()?;
    info!("Starting server with config: {:?}", config);

    // --demo: 使用内置演示数据, 不连接数据库
    let demo = std::env::args().any(|arg| arg == "--demo");
    let dashboard = if demo {
        info!("Demo mode: serving placeholder data from memory");
        Dashboard::single(Arc::new(MemoryStore::placeholder()?))
    } else {
        let pool = create_pool(&config.database).await?;
        info!("Database pool created");

        let sql: Arc<dyn RowStore> = Arc::new(PgStore::new(pool));
        let rest: Arc<dyn RowStore> = match &config.rest {
            Some(rest) => {
                info!("REST store at {}", rest.url);
                Arc::new(RestStore::new(rest))
            }
            None => sql.clone(),
        };
        Dashboard::new(sql, rest)
    };

    let app = api::router(Arc::new(dashboard)).layer(ServiceBuilder::new());

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
