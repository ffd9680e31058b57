//! linchpin 容器 - 简单使用示例
//!
//! 展示构造函数注册、trait 契约、工厂、作用域以及诊断输出。

use std::sync::Arc;

use linchpin::config::ContainerConfig;
use linchpin::container::ServiceLifetime;
use linchpin::logging::{init_logging, LoggingConfig};
use linchpin::{provides, Constructor, Dispose, Injectable, ServiceContainer, ServiceKey};

// 示例服务结构
#[derive(Debug)]
struct AppSettings {
    app_name: String,
}

trait Logger: Send + Sync {
    fn log(&self, message: &str);
}

struct ConsoleLogger {
    settings: Arc<AppSettings>,
}

impl Logger for ConsoleLogger {
    fn log(&self, message: &str) {
        println!("[{}] {}", self.settings.app_name, message);
    }
}

impl Injectable for ConsoleLogger {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|args| {
            Ok(ConsoleLogger {
                settings: args.next::<AppSettings>()?,
            })
        })
        .param::<AppSettings>()]
    }
}

provides!(ConsoleLogger => dyn Logger);

struct DatabaseService {
    logger: Arc<dyn Logger>,
}

impl DatabaseService {
    fn connect(&self) {
        self.logger.log("Connecting to database");
    }
}

impl Injectable for DatabaseService {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|args| {
            Ok(DatabaseService {
                logger: args.next::<dyn Logger>()?,
            })
        })
        .param::<dyn Logger>()]
    }

    fn disposer(this: &Arc<Self>) -> Option<Arc<dyn Dispose>> {
        Some(this.clone())
    }
}

impl Dispose for DatabaseService {
    fn dispose(&self) {
        self.logger.log("Closing database connection");
    }
}

struct RequestContext {
    id: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = ContainerConfig::from_env()?;
    init_logging(LoggingConfig::from_settings(&config.logging)?)?;

    let container = ServiceContainer::with_config(config);

    // 注册服务
    container.register_instance(Arc::new(AppSettings {
        app_name: "linchpin-demo".to_string(),
    }))?;
    container.register::<dyn Logger, ConsoleLogger>(ServiceLifetime::Singleton)?;
    container.register::<DatabaseService, DatabaseService>(ServiceLifetime::Scoped)?;

    let next_id = Arc::new(std::sync::atomic::AtomicU64::new(1));
    container.register_factory::<RequestContext, _>(
        move |_| {
            let id = next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            Ok(Arc::new(RequestContext { id }))
        },
        ServiceLifetime::Transient,
    )?;

    // 解析服务
    let database = container.resolve::<DatabaseService>()?;
    database.connect();

    for _ in 0..2 {
        let request = container.resolve::<RequestContext>()?;
        container
            .resolve::<dyn Logger>()?
            .log(&format!("Handling request {}", request.id));
    }

    // 结束作用域，数据库服务会被释放
    container.clear_scope()?;

    println!();
    println!("{}", container.get_dependency_tree(&ServiceKey::of::<DatabaseService>()));
    println!("{}", container.generate_performance_report());

    container.check_all_services_health();
    println!("{}", container.generate_health_report());
    println!("{}", container.service_statistics().summary());

    container.dispose();
    Ok(())
}
