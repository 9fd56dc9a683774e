//! 服务容器
//!
//! 注册表由一把结构锁（`RwLock`）保护，单例缓存与创建锁按注册槽位放在 `DashMap` 中，
//! 不相关的类型之间互不阻塞。单例采用双重检查加锁：先查缓存，未命中时取该键的
//! 创建锁，再查一次缓存，仍未命中才真正构造。

use std::any::type_name;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use super::key::{is_trait_object, TypeKey};
use super::provider::{
    Constructor, ConstructorProvider, Dependency, FactoryProvider, Instance,
};
use super::registry::{Registration, Registry};
use super::resolver::Resolver;
use super::stats::{ContainerStats, InnerStats};
use super::ServiceLifetime;
use crate::errors::ContainerError;

/// 单例缓存槽位：注册键加上该注册在键下列表中的下标
type Slot = (TypeKey, usize);

pub(crate) struct ContainerInner {
    /// 结构锁：注册表的所有读写都经过它，`clear` / `close` 在持有写锁期间完成清理
    registry: RwLock<Registry>,
    singletons: DashMap<Slot, Instance>,
    /// 只在单例首次构造期间存在
    creation_locks: DashMap<Slot, Arc<Mutex<()>>>,
    /// 每个线程上正在解析的键，同一线程嵌套的顶层调用共享一条链
    pub(super) in_flight: DashMap<ThreadId, Vec<TypeKey>>,
    /// 每次清空递增；构造开始后发生过清空的单例不写入缓存
    generation: AtomicU64,
    closed: AtomicBool,
    stats: InnerStats,
}

impl ContainerInner {
    fn ensure_open(&self) -> Result<(), ContainerError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(ContainerError::Closed)
        } else {
            Ok(())
        }
    }

    fn add_registration(&self, key: TypeKey, registration: Registration) -> Result<(), ContainerError> {
        self.ensure_open()?;

        let mut registry = self.registry.write();
        // close 可能在等待写锁期间发生
        self.ensure_open()?;

        for (index, dependency) in registration.dependencies.iter().enumerate() {
            let target = dependency.key();
            if !dependency.is_collection() && target.is_primitive() && !registry.contains(&target.untagged()) {
                return Err(ContainerError::validation(
                    &key,
                    format!(
                        "constructor parameter {} is primitive {} and not registered",
                        index,
                        target.type_name()
                    ),
                ));
            }
        }

        debug!(
            key = %key,
            lifetime = %registration.lifetime,
            dependencies = registration.dependencies.len(),
            "service registered"
        );
        registry.append(key, registration);
        Ok(())
    }

    /// 解析一个键，参数递归解析时复用同一个 `resolver`
    pub(crate) fn resolve_instance(
        &self,
        key: &TypeKey,
        resolver: &Resolver<'_>,
    ) -> Result<Instance, ContainerError> {
        self.ensure_open()?;
        let _guard = resolver.enter(key)?;
        self.stats.record_resolution();
        trace!(key = %key, depth = resolver.depth(), "resolving service");

        let (registration, generation) = {
            let registry = self.registry.read();
            let registration = match registry.get(key) {
                [] => {
                    // 未打标签的请求遇到多个带标签的注册：不替调用方挑选
                    let tagged = if key.is_tagged() { 0 } else { registry.keys_of(key).len() };
                    return Err(if tagged > 1 {
                        ContainerError::Ambiguous {
                            key: key.to_string(),
                            type_name: key.type_name().to_string(),
                            count: tagged,
                        }
                    } else {
                        ContainerError::NotFound {
                            key: key.to_string(),
                        }
                    });
                }
                [registration] => registration.clone(),
                list => {
                    return Err(ContainerError::Ambiguous {
                        key: key.to_string(),
                        type_name: key.type_name().to_string(),
                        count: list.len(),
                    })
                }
            };
            (registration, self.generation.load(Ordering::SeqCst))
        };

        self.create((key.clone(), 0), &registration, generation, resolver)
    }

    /// 解析与 `key` 同类型的每一条注册：按标签排序，同一键下按注册顺序
    pub(crate) fn resolve_collection(
        &self,
        key: &TypeKey,
        resolver: &Resolver<'_>,
    ) -> Result<Vec<(TypeKey, Instance)>, ContainerError> {
        self.ensure_open()?;
        let (entries, generation) = {
            let registry = self.registry.read();
            (registry.entries_of(key), self.generation.load(Ordering::SeqCst))
        };

        let mut instances = Vec::with_capacity(entries.iter().map(|(_, list)| list.len()).sum());
        for (key, registrations) in entries {
            for (index, registration) in registrations.iter().enumerate() {
                let _guard = resolver.enter(&key)?;
                self.stats.record_resolution();
                trace!(key = %key, index, depth = resolver.depth(), "resolving collection entry");
                let instance = self.create((key.clone(), index), registration, generation, resolver)?;
                instances.push((key.clone(), instance));
            }
        }
        Ok(instances)
    }

    fn create(
        &self,
        slot: Slot,
        registration: &Registration,
        generation: u64,
        resolver: &Resolver<'_>,
    ) -> Result<Instance, ContainerError> {
        match registration.lifetime {
            ServiceLifetime::Singleton => self.resolve_singleton(slot, registration, generation, resolver),
            ServiceLifetime::Transient => {
                self.stats.record_transient();
                registration.provider.create(resolver, &slot.0)
            }
        }
    }

    fn resolve_singleton(
        &self,
        slot: Slot,
        registration: &Registration,
        generation: u64,
        resolver: &Resolver<'_>,
    ) -> Result<Instance, ContainerError> {
        if let Some(instance) = self.cached(&slot) {
            self.stats.record_hit();
            return Ok(instance);
        }

        let key = &slot.0;
        // 创建锁会一直持有到依赖全部构造完成，
        // 所以先在声明的依赖图上排除循环，避免两个线程从环的两端互相等待
        self.check_acyclic(key, resolver)?;

        let lock = self
            .creation_locks
            .entry(slot.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        let _creation = lock.lock();

        if let Some(instance) = self.cached(&slot) {
            self.stats.record_hit();
            self.creation_locks.remove(&slot);
            return Ok(instance);
        }

        self.stats.record_miss();
        let instance = registration.provider.create(resolver, key)?;
        {
            // 读锁与 clear / close 的写锁互斥，检查和写入之间不会被清空
            let _registry = self.registry.read();
            self.ensure_open()?;
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!(key = %key, "container cleared during construction, singleton not cached");
                return Ok(instance);
            }
            self.singletons.insert(slot.clone(), Arc::clone(&instance));
        }
        self.creation_locks.remove(&slot);
        debug!(key = %key, index = slot.1, "singleton created");
        Ok(instance)
    }

    fn cached(&self, slot: &Slot) -> Option<Instance> {
        self.singletons.get(slot).map(|entry| Arc::clone(entry.value()))
    }

    fn check_acyclic(&self, key: &TypeKey, resolver: &Resolver<'_>) -> Result<(), ContainerError> {
        let registry = self.registry.read();
        // 解析链的最后一个就是 key 本身
        let mut path = resolver.chain();
        path.pop();

        let mut finished = HashSet::new();
        match find_cycle(&registry, key, &mut path, &mut finished) {
            Some(cycle) => {
                let repeated = cycle.last().unwrap_or(key).to_string();
                Err(ContainerError::Circular {
                    key: repeated,
                    chain: cycle.iter().map(ToString::to_string).collect(),
                })
            }
            None => Ok(()),
        }
    }

    /// 调用方持有注册表写锁
    fn purge(&self, registry: &mut Registry) {
        registry.clear();
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.singletons.clear();
        self.creation_locks.clear();
    }
}

/// 在声明的依赖图上做深度优先搜索，返回第一个发现的环
fn find_cycle(
    registry: &Registry,
    key: &TypeKey,
    path: &mut Vec<TypeKey>,
    finished: &mut HashSet<TypeKey>,
) -> Option<Vec<TypeKey>> {
    if let Some(start) = path.iter().position(|k| k == key) {
        let mut cycle = path[start..].to_vec();
        cycle.push(key.clone());
        return Some(cycle);
    }
    if finished.contains(key) {
        return None;
    }

    path.push(key.clone());
    for registration in registry.get(key) {
        for dependency in registration.dependencies.iter() {
            for target in registry.targets(dependency) {
                if let Some(cycle) = find_cycle(registry, &target, path, finished) {
                    return Some(cycle);
                }
            }
        }
    }
    path.pop();
    finished.insert(key.clone());
    None
}

/// 依赖注入容器
///
/// 克隆得到的是同一个容器的共享句柄。由组合根（启动代码）创建并负责关闭，
/// 再显式传给需要它的代码。
#[derive(Clone)]
pub struct ServiceContainer {
    inner: Arc<ContainerInner>,
}

impl ServiceContainer {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                registry: RwLock::new(Registry::default()),
                singletons: DashMap::new(),
                creation_locks: DashMap::new(),
                in_flight: DashMap::new(),
                generation: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                stats: InnerStats::default(),
            }),
        }
    }

    /// 注册构造函数，参数在解析时递归注入
    ///
    /// 原始类型参数（如 `Arc<String>`）必须已有未打标签的注册，否则立即返回
    /// [`ContainerError::Validation`]。
    pub fn register<T, Args, C>(&self, constructor: C, lifetime: ServiceLifetime) -> Result<(), ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
        Args: 'static,
        C: Constructor<T, Args>,
    {
        self.register_tagged::<T, Args, C>(constructor, lifetime, "")
    }

    /// 带标签注册构造函数
    pub fn register_tagged<T, Args, C>(
        &self,
        constructor: C,
        lifetime: ServiceLifetime,
        tag: &str,
    ) -> Result<(), ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
        Args: 'static,
        C: Constructor<T, Args>,
    {
        let dependencies: Arc<[Dependency]> = C::dependencies().into();
        let registration = Registration {
            provider: Arc::new(ConstructorProvider::<T, Args, C>::new(constructor)),
            lifetime,
            dependencies,
        };
        self.inner.add_registration(TypeKey::tagged::<T>(tag), registration)
    }

    /// 注册无参数工厂，解析时直接调用
    pub fn register_factory<T, F>(&self, factory: F, lifetime: ServiceLifetime) -> Result<(), ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        self.register_factory_tagged::<T, F>(factory, lifetime, "")
    }

    pub fn register_factory_tagged<T, F>(
        &self,
        factory: F,
        lifetime: ServiceLifetime,
        tag: &str,
    ) -> Result<(), ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        let registration = Registration {
            provider: Arc::new(FactoryProvider::<T, F>::new(factory)),
            lifetime,
            dependencies: Arc::from(Vec::new()),
        };
        self.inner.add_registration(TypeKey::tagged::<T>(tag), registration)
    }

    /// 把已构造好的实例绑定为 trait object 类型的单例
    ///
    /// 只接受 `dyn Trait`；具体类型应当注册构造函数。
    pub fn provide<T>(&self, instance: Arc<T>) -> Result<(), ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.provide_tagged::<T>(instance, "")
    }

    pub fn provide_tagged<T>(&self, instance: Arc<T>, tag: &str) -> Result<(), ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.inner.ensure_open()?;
        if !is_trait_object::<T>() {
            return Err(ContainerError::validation(
                TypeKey::tagged::<T>(tag),
                "provide is only for trait-object types (dyn Trait); register a constructor for concrete types",
            ));
        }
        self.register_factory_tagged::<T, _>(move || Arc::clone(&instance), ServiceLifetime::Singleton, tag)
    }

    /// 解析未打标签的 `T`
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ContainerError> {
        self.inner.ensure_open()?;
        Resolver::new(&self.inner).resolve::<T>()
    }

    pub fn resolve_tagged<T: ?Sized + Send + Sync + 'static>(&self, tag: &str) -> Result<Arc<T>, ContainerError> {
        self.inner.ensure_open()?;
        Resolver::new(&self.inner).resolve_tagged::<T>(tag)
    }

    /// 解析 `T` 的所有注册，按标签排序，同一键下的多条注册各占一项；已创建的单例会被复用
    pub fn resolve_all<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>, ContainerError> {
        self.inner.ensure_open()?;
        Resolver::new(&self.inner).resolve_all::<T>()
    }

    /// 解析失败时 panic，只应在组合根中使用
    ///
    /// # Panics
    ///
    /// 当 [`resolve`](Self::resolve) 返回错误时。
    #[track_caller]
    pub fn must_resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Arc<T> {
        match self.resolve::<T>() {
            Ok(service) => service,
            Err(err) => panic!("failed to resolve {}: {}", type_name::<T>(), err),
        }
    }

    /// # Panics
    ///
    /// 当 [`resolve_tagged`](Self::resolve_tagged) 返回错误时。
    #[track_caller]
    pub fn must_resolve_tagged<T: ?Sized + Send + Sync + 'static>(&self, tag: &str) -> Arc<T> {
        match self.resolve_tagged::<T>(tag) {
            Ok(service) => service,
            Err(err) => panic!("failed to resolve {}:{}: {}", type_name::<T>(), tag, err),
        }
    }

    pub fn is_registered<T: ?Sized + 'static>(&self) -> bool {
        self.is_registered_tagged::<T>("")
    }

    pub fn is_registered_tagged<T: ?Sized + 'static>(&self, tag: &str) -> bool {
        self.inner.registry.read().contains(&TypeKey::tagged::<T>(tag))
    }

    /// 所有注册键的规范字符串，已排序
    pub fn registered_types(&self) -> Vec<String> {
        self.inner.registry.read().names()
    }

    pub fn stats(&self) -> ContainerStats {
        let registered = self.inner.registry.read().len();
        self.inner.stats.snapshot(registered, self.inner.singletons.len())
    }

    pub fn reset_stats(&self) {
        self.inner.stats.reset();
    }

    /// 清空注册、单例缓存和创建锁，主要用于测试隔离
    pub fn clear(&self) {
        let mut registry = self.inner.registry.write();
        self.inner.purge(&mut registry);
        debug!("container cleared");
    }

    /// 永久关闭容器；之后所有注册和解析都返回 [`ContainerError::Closed`]
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        let mut registry = self.inner.registry.write();
        self.inner.purge(&mut registry);
        debug!("container closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

impl Default for ServiceContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContainer")
            .field("registered_services", &self.inner.registry.read().len())
            .field("active_singletons", &self.inner.singletons.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
