//! 依赖注入容器的集成测试

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use futures_util::future;
use wirebox::infrastructure::container::{ContainerError, ServiceContainer, ServiceLifetime};

trait Plugin: Send + Sync {
    fn name(&self) -> &str;
}

struct NamedPlugin(&'static str);

impl Plugin for NamedPlugin {
    fn name(&self) -> &str {
        self.0
    }
}

struct PluginHost {
    plugins: Vec<Arc<dyn Plugin>>,
}

struct Database {
    url: String,
}

struct Repository {
    db: Arc<Database>,
}

struct Service {
    repository: Arc<Repository>,
}

struct CycleA {
    _b: Arc<CycleB>,
}

struct CycleB {
    _a: Arc<CycleA>,
}

struct Greeting {
    text: String,
}

fn database_container() -> ServiceContainer {
    let container = ServiceContainer::new();
    container
        .register::<Database, _, _>(
            || Arc::new(Database { url: "memory://".to_string() }),
            ServiceLifetime::Singleton,
        )
        .unwrap();
    container
}

#[test]
fn test_singleton_constructed_once_under_contention() {
    let container = ServiceContainer::new();
    let created = Arc::new(AtomicUsize::new(0));
    let created_clone = created.clone();

    container
        .register::<Database, _, _>(
            move || {
                created_clone.fetch_add(1, Ordering::SeqCst);
                // 拉长构造窗口，让其余线程都撞上创建锁
                thread::sleep(Duration::from_millis(20));
                Arc::new(Database { url: "memory://".to_string() })
            },
            ServiceLifetime::Singleton,
        )
        .unwrap();

    let threads = 32;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let container = container.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                container.resolve::<Database>().unwrap()
            })
        })
        .collect();

    let instances: Vec<Arc<Database>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(created.load(Ordering::SeqCst), 1);
    for instance in &instances {
        assert!(Arc::ptr_eq(instance, &instances[0]));
    }
    let stats = container.stats();
    assert_eq!(stats.singleton_cache_misses, 1);
    assert_eq!(stats.singleton_cache_hits, threads as u64 - 1);
}

#[tokio::test]
async fn test_singleton_from_blocking_tasks() {
    let container = database_container();
    container
        .register::<Repository, _, _>(|db: Arc<Database>| Arc::new(Repository { db }), ServiceLifetime::Singleton)
        .unwrap();

    let tasks = (0..50).map(|_| {
        let container = container.clone();
        tokio::task::spawn_blocking(move || container.resolve::<Repository>().unwrap())
    });
    let results = future::join_all(tasks).await;

    let repositories: Vec<Arc<Repository>> = results.into_iter().map(|r| r.unwrap()).collect();
    let first = &repositories[0];
    assert!(repositories.iter().all(|repo| Arc::ptr_eq(repo, first)));
    assert!(Arc::ptr_eq(&first.db, &container.resolve::<Database>().unwrap()));
}

#[test]
fn test_transient_instances_are_distinct() {
    let container = database_container();
    container
        .register::<Repository, _, _>(|db: Arc<Database>| Arc::new(Repository { db }), ServiceLifetime::Transient)
        .unwrap();

    let first = container.resolve::<Repository>().unwrap();
    let second = container.resolve::<Repository>().unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    // 单例依赖仍然共享
    assert!(Arc::ptr_eq(&first.db, &second.db));
    assert_eq!(container.stats().transient_creations, 2);
}

#[test]
fn test_recursive_constructor_chain() {
    let container = database_container();
    container
        .register::<Repository, _, _>(|db: Arc<Database>| Arc::new(Repository { db }), ServiceLifetime::Singleton)
        .unwrap();
    container
        .register::<Service, _, _>(
            |repository: Arc<Repository>| Arc::new(Service { repository }),
            ServiceLifetime::Transient,
        )
        .unwrap();

    let service = container.resolve::<Service>().unwrap();
    assert_eq!(service.repository.db.url, "memory://");
}

#[test]
fn test_tagged_registrations_make_untagged_resolve_ambiguous() {
    let container = ServiceContainer::new();
    container
        .register_tagged::<dyn Plugin, _, _>(
            || -> Arc<dyn Plugin> { Arc::new(NamedPlugin("x-plugin")) },
            ServiceLifetime::Singleton,
            "x",
        )
        .unwrap();
    container
        .register_tagged::<dyn Plugin, _, _>(
            || -> Arc<dyn Plugin> { Arc::new(NamedPlugin("y-plugin")) },
            ServiceLifetime::Singleton,
            "y",
        )
        .unwrap();

    match container.resolve::<dyn Plugin>() {
        Err(ContainerError::Ambiguous { count, .. }) => assert_eq!(count, 2),
        Err(other) => panic!("expected Ambiguous, got {}", other),
        Ok(_) => panic!("expected Ambiguous, got an instance"),
    }

    assert_eq!(container.resolve_tagged::<dyn Plugin>("x").unwrap().name(), "x-plugin");
    assert_eq!(container.resolve_tagged::<dyn Plugin>("y").unwrap().name(), "y-plugin");
    assert!(matches!(
        container.resolve_tagged::<dyn Plugin>("z"),
        Err(ContainerError::NotFound { .. })
    ));
}

#[test]
fn test_single_tagged_registration_is_not_found_untagged() {
    let container = ServiceContainer::new();
    container
        .register_factory_tagged::<Database, _>(
            || Arc::new(Database { url: "replica".to_string() }),
            ServiceLifetime::Singleton,
            "replica",
        )
        .unwrap();

    assert!(matches!(container.resolve::<Database>(), Err(ContainerError::NotFound { .. })));
    assert!(container.is_registered_tagged::<Database>("replica"));
    assert!(!container.is_registered::<Database>());
}

#[test]
fn test_duplicate_key_is_ambiguous() {
    let container = database_container();
    container
        .register::<Database, _, _>(
            || Arc::new(Database { url: "second".to_string() }),
            ServiceLifetime::Singleton,
        )
        .unwrap();

    let err = container.resolve::<Database>().err().unwrap();
    assert!(matches!(err, ContainerError::Ambiguous { count: 2, .. }));
    assert!(err.to_string().contains("specify a tag"));
    assert!(err.is_configuration_error());
}

#[test]
fn test_circular_dependency_detected_and_container_still_usable() {
    let container = ServiceContainer::new();
    container
        .register::<CycleA, _, _>(|b: Arc<CycleB>| Arc::new(CycleA { _b: b }), ServiceLifetime::Singleton)
        .unwrap();
    container
        .register::<CycleB, _, _>(|a: Arc<CycleA>| Arc::new(CycleB { _a: a }), ServiceLifetime::Singleton)
        .unwrap();

    match container.resolve::<CycleA>() {
        Err(ContainerError::Circular { chain, .. }) => {
            assert_eq!(chain.len(), 3);
            assert_eq!(chain.first(), chain.last());
        }
        Err(other) => panic!("expected Circular, got {}", other),
        Ok(_) => panic!("expected Circular, got an instance"),
    }
    assert!(matches!(container.resolve::<CycleB>(), Err(ContainerError::Circular { .. })));

    // 失败后没有残留状态
    assert_eq!(container.stats().active_singletons, 0);
    container
        .register_factory::<Greeting, _>(|| Arc::new(Greeting { text: "hi".to_string() }), ServiceLifetime::Singleton)
        .unwrap();
    assert_eq!(container.resolve::<Greeting>().unwrap().text, "hi");
}

#[test]
fn test_transient_cycle_detected_by_guard_set() {
    let container = ServiceContainer::new();
    container
        .register::<CycleA, _, _>(|b: Arc<CycleB>| Arc::new(CycleA { _b: b }), ServiceLifetime::Transient)
        .unwrap();
    container
        .register::<CycleB, _, _>(|a: Arc<CycleA>| Arc::new(CycleB { _a: a }), ServiceLifetime::Transient)
        .unwrap();

    let err = container.resolve::<CycleB>().err().unwrap();
    let message = err.to_string();
    assert!(message.contains("circular dependency"));
    assert!(message.contains("CycleA"));
}

#[test]
fn test_cycle_entered_from_both_ends_concurrently() {
    let container = ServiceContainer::new();
    container
        .register::<CycleA, _, _>(|b: Arc<CycleB>| Arc::new(CycleA { _b: b }), ServiceLifetime::Singleton)
        .unwrap();
    container
        .register::<CycleB, _, _>(|a: Arc<CycleA>| Arc::new(CycleB { _a: a }), ServiceLifetime::Singleton)
        .unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let from_a = {
        let container = container.clone();
        let barrier = barrier.clone();
        thread::spawn(move || {
            barrier.wait();
            container.resolve::<CycleA>().is_err()
        })
    };
    let from_b = {
        let container = container.clone();
        thread::spawn(move || {
            barrier.wait();
            container.resolve::<CycleB>().is_err()
        })
    };

    assert!(from_a.join().unwrap());
    assert!(from_b.join().unwrap());
}

struct Outer;

/// 在工作线程上解析，超时即视为死锁
fn resolve_within<T: ?Sized + Send + Sync + 'static>(
    container: &ServiceContainer,
    timeout: Duration,
) -> Result<Arc<T>, ContainerError> {
    let (tx, rx) = mpsc::channel();
    let worker = container.clone();
    thread::spawn(move || {
        let _ = tx.send(worker.resolve::<T>());
    });
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(_) => panic!("resolve of {} did not return within {:?}", std::any::type_name::<T>(), timeout),
    }
}

fn assert_reentrant_cycle(result: Result<Arc<Outer>, ContainerError>) {
    match result {
        Err(ContainerError::ConstructionFailed { key, source }) => {
            assert!(key.ends_with("Outer"));
            match source.downcast_ref::<ContainerError>() {
                Some(ContainerError::Circular { chain, .. }) => {
                    assert_eq!(chain.len(), 2);
                    assert!(chain.iter().all(|k| k.ends_with("Outer")));
                }
                _ => panic!("expected a Circular source, got {}", source),
            }
        }
        Err(other) => panic!("expected ConstructionFailed, got {}", other),
        Ok(_) => panic!("expected an error, got an instance"),
    }
}

#[test]
fn test_singleton_resolving_itself_through_handle_is_circular() {
    let container = ServiceContainer::new();
    let handle = container.clone();
    container
        .register::<Outer, _, _>(
            move || -> Result<Arc<Outer>, ContainerError> {
                handle.resolve::<Outer>()?;
                Ok(Arc::new(Outer))
            },
            ServiceLifetime::Singleton,
        )
        .unwrap();

    assert_reentrant_cycle(resolve_within::<Outer>(&container, Duration::from_secs(3)));
    // 失败的构造不留下缓存，链也已清空
    assert_eq!(container.stats().active_singletons, 0);
    container.clear();
}

#[test]
fn test_transient_resolving_itself_through_handle_is_circular() {
    let container = ServiceContainer::new();
    let handle = container.clone();
    container
        .register::<Outer, _, _>(
            move || -> Result<Arc<Outer>, ContainerError> {
                handle.resolve::<Outer>()?;
                Ok(Arc::new(Outer))
            },
            ServiceLifetime::Transient,
        )
        .unwrap();

    assert_reentrant_cycle(resolve_within::<Outer>(&container, Duration::from_secs(3)));
    container.clear();
}

#[test]
fn test_nested_handle_resolve_of_other_type_succeeds() {
    let container = database_container();
    let handle = container.clone();
    container
        .register::<Repository, _, _>(
            move || -> Result<Arc<Repository>, ContainerError> {
                let db = handle.resolve::<Database>()?;
                Ok(Arc::new(Repository { db }))
            },
            ServiceLifetime::Singleton,
        )
        .unwrap();

    let repository = resolve_within::<Repository>(&container, Duration::from_secs(3)).unwrap();
    assert!(Arc::ptr_eq(&repository.db, &container.resolve::<Database>().unwrap()));

    // 另一线程上的同类型解析不被当作循环
    let from_thread = {
        let container = container.clone();
        thread::spawn(move || container.resolve::<Repository>().is_ok())
    };
    assert!(from_thread.join().unwrap());
    container.clear();
}

#[test]
fn test_resolve_all_returns_every_tag_in_order() {
    let container = ServiceContainer::new();
    for tag in ["gamma", "alpha", "beta"] {
        container
            .register_factory_tagged::<dyn Plugin, _>(
                move || -> Arc<dyn Plugin> { Arc::new(NamedPlugin(tag)) },
                ServiceLifetime::Singleton,
                tag,
            )
            .unwrap();
    }

    let first = container.resolve_all::<dyn Plugin>().unwrap();
    let names: Vec<&str> = first.iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["alpha", "beta", "gamma"]);

    let second = container.resolve_all::<dyn Plugin>().unwrap();
    assert_eq!(second.len(), 3);
    for (a, b) in first.iter().zip(second.iter()) {
        assert!(Arc::ptr_eq(a, b));
    }

    assert!(container.resolve_all::<Database>().unwrap().is_empty());
}

#[test]
fn test_resolve_all_includes_every_registration_under_one_key() {
    let container = database_container();
    container
        .register_factory::<Database, _>(|| Arc::new(Database { url: "second".to_string() }), ServiceLifetime::Singleton)
        .unwrap();
    container
        .register_factory_tagged::<Database, _>(
            || Arc::new(Database { url: "replica".to_string() }),
            ServiceLifetime::Transient,
            "replica",
        )
        .unwrap();

    // 单值解析仍然拒绝挑选
    assert!(matches!(container.resolve::<Database>(), Err(ContainerError::Ambiguous { count: 2, .. })));

    let first = container.resolve_all::<Database>().unwrap();
    let urls: Vec<&str> = first.iter().map(|db| db.url.as_str()).collect();
    assert_eq!(urls, vec!["memory://", "second", "replica"]);

    let second = container.resolve_all::<Database>().unwrap();
    assert!(Arc::ptr_eq(&first[0], &second[0]));
    assert!(Arc::ptr_eq(&first[1], &second[1]));
    assert!(!Arc::ptr_eq(&first[0], &first[1]));
    assert!(!Arc::ptr_eq(&first[2], &second[2]));
    assert_eq!(container.stats().active_singletons, 2);
}

#[test]
fn test_collection_parameter_injection() {
    let container = ServiceContainer::new();
    container
        .provide_tagged::<dyn Plugin>(Arc::new(NamedPlugin("audit")), "audit")
        .unwrap();
    container
        .provide_tagged::<dyn Plugin>(Arc::new(NamedPlugin("metrics")), "metrics")
        .unwrap();
    container
        .register::<PluginHost, _, _>(
            |plugins: Vec<Arc<dyn Plugin>>| Arc::new(PluginHost { plugins }),
            ServiceLifetime::Singleton,
        )
        .unwrap();

    let host = container.resolve::<PluginHost>().unwrap();
    let names: Vec<&str> = host.plugins.iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["audit", "metrics"]);
}

#[test]
fn test_unregistered_primitive_parameter_fails_at_registration() {
    let container = ServiceContainer::new();

    let err = container
        .register::<Greeting, _, _>(
            |text: Arc<String>| Arc::new(Greeting { text: text.to_string() }),
            ServiceLifetime::Singleton,
        )
        .unwrap_err();
    assert!(matches!(err, ContainerError::Validation { .. }));
    assert!(!container.is_registered::<Greeting>());

    container
        .register_factory::<String, _>(|| Arc::new("hello".to_string()), ServiceLifetime::Singleton)
        .unwrap();
    container
        .register::<Greeting, _, _>(
            |text: Arc<String>| Arc::new(Greeting { text: text.to_string() }),
            ServiceLifetime::Singleton,
        )
        .unwrap();
    assert_eq!(container.resolve::<Greeting>().unwrap().text, "hello");
}

#[test]
fn test_closed_container_rejects_everything() {
    let container = database_container();
    let _db = container.resolve::<Database>().unwrap();

    container.close();

    assert!(container.is_closed());
    assert!(matches!(container.resolve::<Database>(), Err(ContainerError::Closed)));
    assert!(matches!(container.resolve_all::<Database>(), Err(ContainerError::Closed)));
    assert!(matches!(
        container.register_factory::<Greeting, _>(|| Arc::new(Greeting { text: String::new() }), ServiceLifetime::Transient),
        Err(ContainerError::Closed)
    ));
    assert!(matches!(
        container.provide::<dyn Plugin>(Arc::new(NamedPlugin("late"))),
        Err(ContainerError::Closed)
    ));
    assert!(!container.is_registered::<Database>());
    assert!(container.registered_types().is_empty());
    assert_eq!(container.stats().active_singletons, 0);

    // 重复关闭无副作用
    container.close();
}

#[test]
fn test_provide_requires_trait_object() {
    let container = ServiceContainer::new();

    let err = container
        .provide::<Database>(Arc::new(Database { url: "x".to_string() }))
        .unwrap_err();
    assert!(matches!(err, ContainerError::Validation { .. }));

    let plugin: Arc<dyn Plugin> = Arc::new(NamedPlugin("provided"));
    container.provide::<dyn Plugin>(plugin.clone()).unwrap();

    let resolved = container.resolve::<dyn Plugin>().unwrap();
    assert!(Arc::ptr_eq(&resolved, &plugin));
    assert!(Arc::ptr_eq(&container.must_resolve::<dyn Plugin>(), &plugin));
}

#[test]
fn test_construction_failure_is_not_cached() {
    let container = ServiceContainer::new();
    let fail = Arc::new(AtomicBool::new(true));
    let fail_clone = fail.clone();

    container
        .register::<Database, _, _>(
            move || -> Result<Arc<Database>, std::io::Error> {
                if fail_clone.load(Ordering::SeqCst) {
                    Err(std::io::Error::other("connection refused"))
                } else {
                    Ok(Arc::new(Database { url: "recovered".to_string() }))
                }
            },
            ServiceLifetime::Singleton,
        )
        .unwrap();
    container
        .register::<Repository, _, _>(|db: Arc<Database>| Arc::new(Repository { db }), ServiceLifetime::Transient)
        .unwrap();

    // 参数解析失败的错误原样向上传递
    match container.resolve::<Repository>() {
        Err(ContainerError::ConstructionFailed { key, source }) => {
            assert!(key.ends_with("Database"));
            assert_eq!(source.to_string(), "connection refused");
        }
        Err(other) => panic!("expected ConstructionFailed, got {}", other),
        Ok(_) => panic!("expected ConstructionFailed, got an instance"),
    }
    assert_eq!(container.stats().active_singletons, 0);

    fail.store(false, Ordering::SeqCst);
    assert_eq!(container.resolve::<Repository>().unwrap().db.url, "recovered");
}

#[test]
fn test_missing_dependency_can_be_registered_later() {
    let container = ServiceContainer::new();
    container
        .register::<Repository, _, _>(|db: Arc<Database>| Arc::new(Repository { db }), ServiceLifetime::Singleton)
        .unwrap();

    assert!(matches!(container.resolve::<Repository>(), Err(ContainerError::NotFound { .. })));

    container
        .register_factory::<Database, _>(|| Arc::new(Database { url: "late".to_string() }), ServiceLifetime::Singleton)
        .unwrap();
    assert_eq!(container.resolve::<Repository>().unwrap().db.url, "late");
}

#[test]
fn test_clear_resets_registrations_and_singletons() {
    let container = database_container();
    let before = container.resolve::<Database>().unwrap();

    container.clear();
    assert!(!container.is_registered::<Database>());
    assert!(matches!(container.resolve::<Database>(), Err(ContainerError::NotFound { .. })));

    container
        .register::<Database, _, _>(|| Arc::new(Database { url: "fresh".to_string() }), ServiceLifetime::Singleton)
        .unwrap();
    let after = container.resolve::<Database>().unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(after.url, "fresh");
    assert!(!container.is_closed());
}

#[test]
fn test_clear_during_construction_does_not_cache() {
    let container = ServiceContainer::new();
    let handle = container.clone();
    container
        .register::<Database, _, _>(
            move || {
                handle.clear();
                Arc::new(Database { url: "orphan".to_string() })
            },
            ServiceLifetime::Singleton,
        )
        .unwrap();

    let db = container.resolve::<Database>().unwrap();
    assert_eq!(db.url, "orphan");
    assert!(!container.is_registered::<Database>());
    assert_eq!(container.stats().active_singletons, 0);
    assert!(matches!(container.resolve::<Database>(), Err(ContainerError::NotFound { .. })));
}

#[test]
fn test_must_resolve_tagged() {
    let container = ServiceContainer::new();
    container
        .provide_tagged::<dyn Plugin>(Arc::new(NamedPlugin("primary")), "primary")
        .unwrap();

    assert_eq!(container.must_resolve_tagged::<dyn Plugin>("primary").name(), "primary");

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        container.must_resolve_tagged::<dyn Plugin>("secondary")
    }));
    assert!(outcome.is_err());
}
