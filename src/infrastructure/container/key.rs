//! 服务键：类型标识 + 可选标签

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// 标识一个注册项
///
/// 两个键相等当且仅当 `TypeId` 和标签完全一致；`type_name` 只用于错误信息。
/// 空标签表示默认（未打标签的）注册。
#[derive(Clone)]
pub struct TypeKey {
    type_id: TypeId,
    type_name: &'static str,
    tag: String,
}

impl TypeKey {
    /// 未打标签的键
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::tagged::<T>("")
    }

    /// 带标签的键
    pub fn tagged<T: ?Sized + 'static>(tag: &str) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            tag: tag.to_string(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn is_tagged(&self) -> bool {
        !self.tag.is_empty()
    }

    /// 同一类型的未标签键
    pub fn untagged(&self) -> Self {
        Self {
            type_id: self.type_id,
            type_name: self.type_name,
            tag: String::new(),
        }
    }

    /// 是否为原始类型（布尔、字符、数值、字符串）
    ///
    /// 原始类型作为构造参数时，容器无法区分“注入字面量”和“解析依赖”，
    /// 因此要求它们必须先有自己的注册。
    pub fn is_primitive(&self) -> bool {
        let primitives = [
            TypeId::of::<bool>(),
            TypeId::of::<char>(),
            TypeId::of::<i8>(),
            TypeId::of::<i16>(),
            TypeId::of::<i32>(),
            TypeId::of::<i64>(),
            TypeId::of::<i128>(),
            TypeId::of::<isize>(),
            TypeId::of::<u8>(),
            TypeId::of::<u16>(),
            TypeId::of::<u32>(),
            TypeId::of::<u64>(),
            TypeId::of::<u128>(),
            TypeId::of::<usize>(),
            TypeId::of::<f32>(),
            TypeId::of::<f64>(),
            TypeId::of::<String>(),
            TypeId::of::<str>(),
            TypeId::of::<&'static str>(),
        ];
        primitives.contains(&self.type_id)
    }
}

/// `T` 是否为 trait object（`dyn Trait`）
///
/// trait object 的引用是胖指针，并且类型名以 `dyn ` 开头；
/// 切片和 `str` 同样是胖指针，所以两个条件都要满足。
pub(crate) fn is_trait_object<T: ?Sized + 'static>() -> bool {
    std::mem::size_of::<&T>() == 2 * std::mem::size_of::<usize>()
        && type_name::<T>().starts_with("dyn ")
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.tag == other.tag
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.tag.hash(state);
    }
}

/// 规范字符串：无标签时为类型名，否则为 `类型名:标签`
impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tag.is_empty() {
            write!(f, "{}", self.type_name)
        } else {
            write!(f, "{}:{}", self.type_name, self.tag)
        }
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self)
    }
}
