//! 构造方式（recipe）与类型擦除
//!
//! 构造函数是普通的 `Fn(A1, ..., An) -> R`：每个参数实现 [`Inject`]，
//! 由容器递归解析；返回值实现 [`Constructed`]，即 `Arc<T>` 或
//! `Result<Arc<T>, E>`。注册时这些信息被擦除成 [`ErasedProvider`]，
//! 解析时再在类型化的边界上向下转型。

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use super::key::TypeKey;
use super::resolver::Resolver;
use crate::errors::{BoxError, ContainerError};

/// 类型擦除后的实例，内部保存的是 `Arc<T>`
pub(crate) type Instance = Arc<dyn Any + Send + Sync>;

/// 构造函数声明的一个依赖
#[derive(Debug, Clone)]
pub struct Dependency {
    key: TypeKey,
    collection: bool,
}

impl Dependency {
    /// 单个实例依赖（未打标签）
    pub fn single(key: TypeKey) -> Self {
        Self {
            key,
            collection: false,
        }
    }

    /// 集合依赖：该类型在所有标签下的全部注册
    pub fn collection(key: TypeKey) -> Self {
        Self {
            key,
            collection: true,
        }
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    pub fn is_collection(&self) -> bool {
        self.collection
    }
}

/// 可以作为构造函数参数注入的类型
pub trait Inject: Sized + 'static {
    /// 注册时用于校验和依赖图分析的描述
    fn dependency() -> Dependency;

    /// 在当前解析调用树中取得参数值
    fn inject(resolver: &Resolver<'_>) -> Result<Self, ContainerError>;
}

impl<T: ?Sized + Send + Sync + 'static> Inject for Arc<T> {
    fn dependency() -> Dependency {
        Dependency::single(TypeKey::of::<T>())
    }

    fn inject(resolver: &Resolver<'_>) -> Result<Self, ContainerError> {
        resolver.resolve::<T>()
    }
}

impl<T: ?Sized + Send + Sync + 'static> Inject for Vec<Arc<T>> {
    fn dependency() -> Dependency {
        Dependency::collection(TypeKey::of::<T>())
    }

    fn inject(resolver: &Resolver<'_>) -> Result<Self, ContainerError> {
        resolver.resolve_all::<T>()
    }
}

/// 构造函数的返回值：`Arc<T>`，或者第二个分量可能携带错误的 `Result<Arc<T>, E>`
pub trait Constructed<T: ?Sized> {
    fn into_service(self) -> Result<Arc<T>, BoxError>;
}

impl<T: ?Sized> Constructed<T> for Arc<T> {
    fn into_service(self) -> Result<Arc<T>, BoxError> {
        Ok(self)
    }
}

impl<T: ?Sized, E> Constructed<T> for Result<Arc<T>, E>
where
    E: Into<BoxError>,
{
    fn into_service(self) -> Result<Arc<T>, BoxError> {
        self.map_err(Into::into)
    }
}

/// 参数可递归解析的构造函数
///
/// 为参数个数 0 到 8 的 `Fn` 实现；`Args` 是参数元组，仅用于区分实现。
pub trait Constructor<T: ?Sized, Args>: Send + Sync + 'static {
    /// 按参数顺序列出依赖
    fn dependencies() -> Vec<Dependency>;

    fn construct(&self, resolver: &Resolver<'_>, key: &TypeKey) -> Result<Arc<T>, ContainerError>;
}

macro_rules! impl_constructor {
    ($($arg:ident $var:ident),*) => {
        impl<T, F, R, $($arg,)*> Constructor<T, ($($arg,)*)> for F
        where
            T: ?Sized + Send + Sync + 'static,
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: Constructed<T>,
            $($arg: Inject,)*
        {
            fn dependencies() -> Vec<Dependency> {
                vec![$(<$arg as Inject>::dependency()),*]
            }

            #[allow(unused_variables)]
            fn construct(&self, resolver: &Resolver<'_>, key: &TypeKey) -> Result<Arc<T>, ContainerError> {
                $(let $var = <$arg as Inject>::inject(resolver)?;)*
                (self)($($var),*)
                    .into_service()
                    .map_err(|source| ContainerError::ConstructionFailed {
                        key: key.to_string(),
                        source,
                    })
            }
        }
    };
}

impl_constructor!();
impl_constructor!(A1 a1);
impl_constructor!(A1 a1, A2 a2);
impl_constructor!(A1 a1, A2 a2, A3 a3);
impl_constructor!(A1 a1, A2 a2, A3 a3, A4 a4);
impl_constructor!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5);
impl_constructor!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6);
impl_constructor!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7);
impl_constructor!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7, A8 a8);

/// 类型擦除的服务提供者
pub(crate) trait ErasedProvider: Send + Sync {
    fn create(&self, resolver: &Resolver<'_>, key: &TypeKey) -> Result<Instance, ContainerError>;
}

/// 反射式构造：先解析参数再调用
pub(crate) struct ConstructorProvider<T: ?Sized, Args, C> {
    constructor: C,
    _phantom: PhantomData<fn(Args) -> Arc<T>>,
}

impl<T: ?Sized, Args, C> ConstructorProvider<T, Args, C> {
    pub(crate) fn new(constructor: C) -> Self {
        Self {
            constructor,
            _phantom: PhantomData,
        }
    }
}

impl<T, Args, C> ErasedProvider for ConstructorProvider<T, Args, C>
where
    T: ?Sized + Send + Sync + 'static,
    Args: 'static,
    C: Constructor<T, Args>,
{
    fn create(&self, resolver: &Resolver<'_>, key: &TypeKey) -> Result<Instance, ContainerError> {
        let service = self.constructor.construct(resolver, key)?;
        Ok(Arc::new(service))
    }
}

/// 直接工厂：无参数，不经过递归解析
pub(crate) struct FactoryProvider<T: ?Sized, F> {
    factory: F,
    _phantom: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized, F> FactoryProvider<T, F> {
    pub(crate) fn new(factory: F) -> Self {
        Self {
            factory,
            _phantom: PhantomData,
        }
    }
}

impl<T, F> ErasedProvider for FactoryProvider<T, F>
where
    T: ?Sized + Send + Sync + 'static,
    F: Fn() -> Arc<T> + Send + Sync + 'static,
{
    fn create(&self, _resolver: &Resolver<'_>, _key: &TypeKey) -> Result<Instance, ContainerError> {
        Ok(Arc::new((self.factory)()))
    }
}

/// 把擦除后的实例还原成 `Arc<T>`
pub(crate) fn downcast<T: ?Sized + Send + Sync + 'static>(
    instance: &Instance,
    key: &TypeKey,
) -> Result<Arc<T>, ContainerError> {
    instance
        .downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or_else(|| {
            ContainerError::validation(
                key,
                format!("resolved instance is not a {}", std::any::type_name::<T>()),
            )
        })
}
