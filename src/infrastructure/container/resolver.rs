//! 解析调用树的上下文
//!
//! 正在解析的键按线程记录在容器上：同一线程里嵌套发起的顶层 `resolve`
//! （例如构造函数持有容器句柄再次解析）看到的是同一条链，
//! 因此 A -> B -> A 无论经由参数注入还是句柄调用都会报告循环依赖，
//! 而不同线程并发解析同一类型互不干扰。键由 [`ResolutionGuard`] 在所有退出路径上移除。

use std::sync::Arc;
use std::thread::{self, ThreadId};

use dashmap::DashMap;

use super::key::TypeKey;
use super::provider::downcast;
use super::service_container::ContainerInner;
use crate::errors::ContainerError;

pub struct Resolver<'c> {
    container: &'c ContainerInner,
    thread: ThreadId,
}

impl<'c> Resolver<'c> {
    pub(crate) fn new(container: &'c ContainerInner) -> Self {
        Self {
            container,
            thread: thread::current().id(),
        }
    }

    /// 解析未打标签的 `T`
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ContainerError> {
        self.resolve_key(&TypeKey::of::<T>())
    }

    /// 解析带标签的 `T`
    pub fn resolve_tagged<T: ?Sized + Send + Sync + 'static>(
        &self,
        tag: &str,
    ) -> Result<Arc<T>, ContainerError> {
        self.resolve_key(&TypeKey::tagged::<T>(tag))
    }

    /// 解析 `T` 的每一条注册，同一键下的多条注册各占一项
    pub fn resolve_all<T: ?Sized + Send + Sync + 'static>(
        &self,
    ) -> Result<Vec<Arc<T>>, ContainerError> {
        self.container
            .resolve_collection(&TypeKey::of::<T>(), self)?
            .iter()
            .map(|(key, instance)| downcast::<T>(instance, key))
            .collect()
    }

    /// 当前线程上的嵌套深度
    pub fn depth(&self) -> usize {
        self.container
            .in_flight
            .get(&self.thread)
            .map_or(0, |chain| chain.len())
    }

    fn resolve_key<T: ?Sized + Send + Sync + 'static>(
        &self,
        key: &TypeKey,
    ) -> Result<Arc<T>, ContainerError> {
        let instance = self.container.resolve_instance(key, self)?;
        downcast::<T>(&instance, key)
    }

    /// 标记 `key` 进入解析；若已在当前线程的解析链上则报告循环依赖
    pub(crate) fn enter(&self, key: &TypeKey) -> Result<ResolutionGuard<'c>, ContainerError> {
        let mut in_flight = self.container.in_flight.entry(self.thread).or_default();
        if in_flight.contains(key) {
            let mut chain: Vec<String> = in_flight.iter().map(ToString::to_string).collect();
            chain.push(key.to_string());
            return Err(ContainerError::Circular {
                key: key.to_string(),
                chain,
            });
        }
        in_flight.push(key.clone());
        Ok(ResolutionGuard {
            in_flight: &self.container.in_flight,
            thread: self.thread,
        })
    }

    /// 当前解析链（不含尚未进入的键）
    pub(crate) fn chain(&self) -> Vec<TypeKey> {
        self.container
            .in_flight
            .get(&self.thread)
            .map(|chain| chain.clone())
            .unwrap_or_default()
    }
}

/// 离开作用域时把键移出当前线程的链，无论解析成功还是失败
pub(crate) struct ResolutionGuard<'c> {
    in_flight: &'c DashMap<ThreadId, Vec<TypeKey>>,
    thread: ThreadId,
}

impl Drop for ResolutionGuard<'_> {
    fn drop(&mut self) {
        let emptied = match self.in_flight.get_mut(&self.thread) {
            Some(mut chain) => {
                chain.pop();
                chain.is_empty()
            }
            None => false,
        };
        if emptied {
            self.in_flight.remove_if(&self.thread, |_, chain| chain.is_empty());
        }
    }
}
