//! 注册表：类型键 -> 注册列表

use std::collections::HashMap;
use std::sync::Arc;

use super::key::TypeKey;
use super::provider::{Dependency, ErasedProvider};
use super::ServiceLifetime;

/// 一条注册
#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) provider: Arc<dyn ErasedProvider>,
    pub(crate) lifetime: ServiceLifetime,
    /// 构造函数声明的依赖；直接工厂为空
    pub(crate) dependencies: Arc<[Dependency]>,
}

#[derive(Default)]
pub(crate) struct Registry {
    lists: HashMap<TypeKey, Vec<Registration>>,
}

impl Registry {
    pub(crate) fn append(&mut self, key: TypeKey, registration: Registration) {
        self.lists.entry(key).or_default().push(registration);
    }

    pub(crate) fn get(&self, key: &TypeKey) -> &[Registration] {
        self.lists.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub(crate) fn contains(&self, key: &TypeKey) -> bool {
        !self.get(key).is_empty()
    }

    /// 与 `key` 类型相同的所有注册键，按标签排序（未打标签的排在最前）
    pub(crate) fn keys_of(&self, key: &TypeKey) -> Vec<TypeKey> {
        let mut keys: Vec<TypeKey> = self
            .lists
            .iter()
            .filter(|(k, list)| k.type_id() == key.type_id() && !list.is_empty())
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort_by(|a, b| a.tag().cmp(b.tag()));
        keys
    }

    /// 与 `key` 类型相同的每个注册键及其完整注册列表，顺序同 [`keys_of`](Self::keys_of)
    pub(crate) fn entries_of(&self, key: &TypeKey) -> Vec<(TypeKey, Vec<Registration>)> {
        self.keys_of(key)
            .into_iter()
            .map(|k| {
                let list = self.get(&k).to_vec();
                (k, list)
            })
            .collect()
    }

    /// 依赖边指向的注册键
    pub(crate) fn targets(&self, dependency: &Dependency) -> Vec<TypeKey> {
        if dependency.is_collection() {
            self.keys_of(dependency.key())
        } else {
            vec![dependency.key().untagged()]
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.lists.len()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lists.keys().map(ToString::to_string).collect();
        names.sort();
        names
    }

    pub(crate) fn clear(&mut self) {
        self.lists.clear();
    }
}
