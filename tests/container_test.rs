//! 容器解析行为的集成测试

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use linchpin::container::ServiceLifetime;
use linchpin::{provides, Constructor, ContainerError, ErrorKind, Injectable, ServiceContainer, ServiceKey};

trait Logger: Send + Sync {
    fn log(&self, message: &str) -> String;
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, message: &str) -> String {
        format!("[console] {message}")
    }
}

impl Injectable for ConsoleLogger {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|_| Ok(ConsoleLogger))]
    }
}

provides!(ConsoleLogger => dyn Logger);

trait EmailService: Send + Sync {
    fn send(&self, to: &str) -> String;
    fn logger(&self) -> Arc<dyn Logger>;
}

struct SmtpEmailService {
    logger: Arc<dyn Logger>,
}

impl EmailService for SmtpEmailService {
    fn send(&self, to: &str) -> String {
        self.logger.log(&format!("mail to {to}"))
    }

    fn logger(&self) -> Arc<dyn Logger> {
        self.logger.clone()
    }
}

impl Injectable for SmtpEmailService {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|args| {
            Ok(SmtpEmailService {
                logger: args.next::<dyn Logger>()?,
            })
        })
        .param::<dyn Logger>()]
    }
}

provides!(SmtpEmailService => dyn EmailService);

trait Greeter: Send + Sync {
    fn greet(&self) -> &'static str;
}

struct English;
struct French;

impl Greeter for English {
    fn greet(&self) -> &'static str {
        "hello"
    }
}

impl Greeter for French {
    fn greet(&self) -> &'static str {
        "bonjour"
    }
}

impl Injectable for English {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|_| Ok(English))]
    }
}

impl Injectable for French {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|_| Ok(French))]
    }
}

provides!(English => dyn Greeter);
provides!(French => dyn Greeter);

// A <-> B 循环
struct Alpha;
struct Beta;

impl Injectable for Alpha {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|args| {
            args.next::<Beta>()?;
            Ok(Alpha)
        })
        .param::<Beta>()]
    }
}

impl Injectable for Beta {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|args| {
            args.next::<Alpha>()?;
            Ok(Beta)
        })
        .param::<Alpha>()]
    }
}

// 菱形：Top -> Left, Top -> Right, Left -> Bottom, Right -> Bottom
struct Bottom;
struct Left(Arc<Bottom>);
struct Right(Arc<Bottom>);
struct Top(Arc<Left>, Arc<Right>);

impl Injectable for Bottom {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|_| Ok(Bottom))]
    }
}

impl Injectable for Left {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|args| Ok(Left(args.next::<Bottom>()?))).param::<Bottom>()]
    }
}

impl Injectable for Right {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|args| Ok(Right(args.next::<Bottom>()?))).param::<Bottom>()]
    }
}

impl Injectable for Top {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![
            Constructor::new(|args| Ok(Top(args.next::<Left>()?, Arc::new(Right(Arc::new(Bottom))))))
                .param::<Left>(),
            Constructor::new(|args| Ok(Top(args.next::<Left>()?, args.next::<Right>()?)))
                .param::<Left>()
                .param::<Right>(),
        ]
    }
}

struct NeedsMissing;
struct Missing;

impl Injectable for NeedsMissing {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|args| {
            args.next::<Missing>()?;
            Ok(NeedsMissing)
        })
        .param::<Missing>()]
    }
}

fn email_container() -> ServiceContainer {
    let container = ServiceContainer::new();
    container
        .register::<dyn Logger, ConsoleLogger>(ServiceLifetime::Singleton)
        .unwrap();
    container
        .register::<dyn EmailService, SmtpEmailService>(ServiceLifetime::Transient)
        .unwrap();
    container
}

#[test]
fn test_singleton_returns_identical_instance() {
    let container = email_container();
    let first = container.resolve::<dyn Logger>().unwrap();
    let second = container.resolve::<dyn Logger>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_transient_returns_distinct_instances_sharing_singleton_dependency() {
    let container = email_container();

    let first = container.resolve::<dyn EmailService>().unwrap();
    let second = container.resolve::<dyn EmailService>().unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first.logger(), &second.logger()));
    assert_eq!(first.send("ops@example.com"), "[console] mail to ops@example.com");
}

#[test]
fn test_reregistration_replaces_descriptor() {
    let container = ServiceContainer::new();
    container
        .register::<dyn Greeter, English>(ServiceLifetime::Singleton)
        .unwrap();
    assert_eq!(container.resolve::<dyn Greeter>().unwrap().greet(), "hello");

    container
        .register::<dyn Greeter, French>(ServiceLifetime::Singleton)
        .unwrap();
    assert_eq!(container.resolve::<dyn Greeter>().unwrap().greet(), "bonjour");
    assert_eq!(
        container
            .get_descriptor(&ServiceKey::of::<dyn Greeter>())
            .unwrap()
            .display_name(),
        "French"
    );
}

#[test]
fn test_unregistered_service() {
    let container = ServiceContainer::new();
    let Err(err) = container.resolve::<dyn Greeter>() else {
        panic!("Greeter was never registered");
    };
    assert_eq!(err.kind(), ErrorKind::NotRegistered);
    assert!(container.try_resolve::<dyn Greeter>().is_none());
}

#[test]
fn test_missing_transitive_dependency_carries_context() {
    let container = ServiceContainer::new();
    container
        .register::<NeedsMissing, NeedsMissing>(ServiceLifetime::Transient)
        .unwrap();

    let Err(err) = container.resolve::<NeedsMissing>() else {
        panic!("Missing is not registered");
    };
    assert_eq!(err.kind(), ErrorKind::NotRegistered);
    assert_eq!(
        err.context(),
        &["resolving Missing required by NeedsMissing".to_string()]
    );
}

#[test]
fn test_runtime_cycle_fails_instead_of_overflowing() {
    let container = ServiceContainer::new();
    container.register::<Alpha, Alpha>(ServiceLifetime::Transient).unwrap();
    container.register::<Beta, Beta>(ServiceLifetime::Transient).unwrap();

    let Err(err) = container.resolve::<Alpha>() else {
        panic!("Alpha and Beta depend on each other");
    };
    match &err {
        ContainerError::CircularDependency { chain, context } => {
            assert_eq!(chain, &vec!["Alpha".to_string(), "Beta".to_string(), "Alpha".to_string()]);
            assert_eq!(
                context,
                &vec![
                    "resolving Alpha required by Beta".to_string(),
                    "resolving Beta required by Alpha".to_string(),
                ]
            );
        }
        other => panic!("expected a circular dependency, got {other:?}"),
    }
    assert!(container.detect_circular_dependencies());
}

#[test]
fn test_diamond_is_acyclic_and_shares_singleton() {
    let container = ServiceContainer::new();
    container.register::<Bottom, Bottom>(ServiceLifetime::Singleton).unwrap();
    container.register::<Left, Left>(ServiceLifetime::Transient).unwrap();
    container.register::<Right, Right>(ServiceLifetime::Transient).unwrap();
    container.register::<Top, Top>(ServiceLifetime::Transient).unwrap();

    assert!(!container.detect_circular_dependencies());

    let top = container.resolve::<Top>().unwrap();
    assert!(Arc::ptr_eq(&top.0 .0, &top.1 .0));

    let graph = container.dependency_graph();
    assert_eq!(
        graph.get_dependencies(&ServiceKey::of::<Top>()),
        vec![ServiceKey::of::<Left>(), ServiceKey::of::<Right>()]
    );
}

#[test]
fn test_dispose_rejects_further_operations() {
    let container = email_container();
    container.resolve::<dyn Logger>().unwrap();
    container.dispose();

    let err = container
        .register::<dyn Greeter, English>(ServiceLifetime::Singleton)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ObjectDisposed);
    let Err(err) = container.resolve::<dyn Logger>() else {
        panic!("resolution after dispose must fail");
    };
    assert_eq!(err.kind(), ErrorKind::ObjectDisposed);

    // 重复释放无效果
    container.dispose();
    assert!(container.is_disposed());
}

#[test]
fn test_clear_scope_keeps_singletons() {
    let container = ServiceContainer::new();
    container
        .register::<dyn Logger, ConsoleLogger>(ServiceLifetime::Singleton)
        .unwrap();
    container
        .register::<dyn Greeter, English>(ServiceLifetime::Scoped)
        .unwrap();

    let logger = container.resolve::<dyn Logger>().unwrap();
    let scoped = container.resolve::<dyn Greeter>().unwrap();
    assert!(Arc::ptr_eq(&scoped, &container.resolve::<dyn Greeter>().unwrap()));

    assert_eq!(container.clear_scope().unwrap(), 1);

    assert!(Arc::ptr_eq(&logger, &container.resolve::<dyn Logger>().unwrap()));
    assert!(!Arc::ptr_eq(&scoped, &container.resolve::<dyn Greeter>().unwrap()));
}

#[test]
fn test_factory_resolves_dependencies_and_records_edges() {
    struct Report {
        logger: Arc<dyn Logger>,
    }

    let container = ServiceContainer::new();
    container
        .register::<dyn Logger, ConsoleLogger>(ServiceLifetime::Singleton)
        .unwrap();
    container
        .register_factory::<Report, _>(
            |resolver| {
                Ok(Arc::new(Report {
                    logger: resolver.resolve::<dyn Logger>()?,
                }))
            },
            ServiceLifetime::Transient,
        )
        .unwrap();

    let report = container.resolve::<Report>().unwrap();
    assert_eq!(report.logger.log("x"), "[console] x");
    assert_eq!(
        container
            .dependency_graph()
            .get_dependencies(&ServiceKey::of::<Report>()),
        vec![ServiceKey::of::<dyn Logger>()]
    );
}

#[test]
fn test_factory_failures() {
    struct Broken;
    struct Forwarding;

    let container = ServiceContainer::new();
    container
        .register_factory::<Broken, _>(
            |_| Err("connection refused".into()),
            ServiceLifetime::Singleton,
        )
        .unwrap();
    container
        .register_factory::<Forwarding, _>(
            |resolver| {
                resolver.resolve::<Missing>()?;
                Ok(Arc::new(Forwarding))
            },
            ServiceLifetime::Transient,
        )
        .unwrap();

    let Err(err) = container.resolve::<Broken>() else {
        panic!("Broken factory always fails");
    };
    assert_eq!(err.kind(), ErrorKind::Construction);
    assert!(err.to_string().contains("connection refused"));

    let Err(err) = container.resolve::<Forwarding>() else {
        panic!("Forwarding needs an unregistered service");
    };
    assert_eq!(err.kind(), ErrorKind::NotRegistered);
    assert_eq!(
        err.context(),
        &["resolving Missing required by Forwarding".to_string()]
    );

    let metrics = container.monitor().metrics(&ServiceKey::of::<Broken>()).unwrap();
    assert_eq!(metrics.error_count, 1);
}

#[test]
fn test_execution_order_and_warm_up() {
    let created = Arc::new(AtomicUsize::new(0));
    let container = ServiceContainer::new();

    let counter = created.clone();
    container
        .register_factory::<u32, _>(
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(1_u32))
            },
            ServiceLifetime::Singleton,
        )
        .unwrap();
    container
        .register_with_order::<dyn Logger, ConsoleLogger>(
            ServiceLifetime::Singleton,
            10,
            0,
            Some("console-logger"),
        )
        .unwrap();
    container
        .register_with_order::<dyn Greeter, English>(ServiceLifetime::Transient, 10, -1, None)
        .unwrap();

    let names: Vec<String> = container
        .registered_services()
        .iter()
        .map(|d| d.display_name())
        .collect();
    assert_eq!(names, vec!["English", "console-logger", "u32"]);

    assert_eq!(container.warm_up().unwrap(), 2);
    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert_eq!(container.service_statistics().active_singletons, 2);
}

#[test]
fn test_resolve_by_key() {
    let container = email_container();
    let key = ServiceKey::of::<dyn Logger>();
    assert!(container.is_key_registered(&key));

    let instance = container.resolve_key(key).unwrap();
    let logger = instance.downcast::<dyn Logger>().unwrap();
    assert!(Arc::ptr_eq(&logger, &container.resolve::<dyn Logger>().unwrap()));
}

#[test]
fn test_dependency_tree_and_reports() {
    let container = email_container();
    container.resolve::<dyn EmailService>().unwrap();
    container.resolve::<dyn EmailService>().unwrap();

    let tree = container.get_dependency_tree(&ServiceKey::of::<dyn EmailService>());
    let lines: Vec<&str> = tree.lines().collect();
    assert!(lines[0].starts_with("SmtpEmailService"));
    assert!(lines[1].starts_with("└── ConsoleLogger"));

    let report = container.generate_performance_report();
    assert!(report.contains("Total resolves: 4"));

    let json: serde_json::Value =
        serde_json::from_str(&container.export_metrics_as_json().unwrap()).unwrap();
    assert_eq!(json["services"].as_array().unwrap().len(), 2);
}

#[test]
fn test_clear_removes_everything() {
    let container = email_container();
    container.resolve::<dyn EmailService>().unwrap();
    container.clear().unwrap();

    assert!(!container.is_registered::<dyn Logger>());
    assert!(container.dependency_graph().is_empty());
    assert_eq!(container.monitor().total_resolves(), 0);
    assert_eq!(container.service_statistics().active_singletons, 0);

    // 清空后仍可继续注册
    container
        .register::<dyn Greeter, English>(ServiceLifetime::Transient)
        .unwrap();
    assert!(container.resolve::<dyn Greeter>().is_ok());
}
