//! 用户仓储与用户服务

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::email::{EmailMessage, EmailService};
use crate::errors::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub name: String,
}

/// 进程内的用户表
#[derive(Default)]
pub struct Database {
    users: RwLock<BTreeMap<u64, User>>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }
}

pub trait UserRepository: Send + Sync {
    fn create(&self, email: &str, name: &str) -> Result<User, AppError>;

    fn find_by_id(&self, id: u64) -> Option<User>;

    fn find_by_email(&self, email: &str) -> Option<User>;

    fn count(&self) -> usize;
}

pub struct InMemoryUserRepository {
    db: Arc<Database>,
}

impl InMemoryUserRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl UserRepository for InMemoryUserRepository {
    fn create(&self, email: &str, name: &str) -> Result<User, AppError> {
        let email = email.trim().to_ascii_lowercase();
        let mut users = self.db.users.write();
        if users.values().any(|user| user.email == email) {
            return Err(AppError::Generic(format!("user with email {} already exists", email)));
        }

        let id = users.keys().next_back().map_or(1, |last| last + 1);
        let user = User {
            id,
            email,
            name: name.to_string(),
        };
        users.insert(id, user.clone());
        Ok(user)
    }

    fn find_by_id(&self, id: u64) -> Option<User> {
        self.db.users.read().get(&id).cloned()
    }

    fn find_by_email(&self, email: &str) -> Option<User> {
        let email = email.trim().to_ascii_lowercase();
        self.db.users.read().values().find(|user| user.email == email).cloned()
    }

    fn count(&self) -> usize {
        self.db.users.read().len()
    }
}

/// 用户注册流程：写入仓储后发送欢迎邮件
pub struct UserService {
    repository: Arc<dyn UserRepository>,
    email: Arc<dyn EmailService>,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>, email: Arc<dyn EmailService>) -> Self {
        Self { repository, email }
    }

    pub fn register(&self, email: &str, name: &str) -> Result<User, AppError> {
        if !email.contains('@') {
            return Err(AppError::Generic(format!("'{}' is not an email address", email)));
        }

        let user = self.repository.create(email, name)?;
        self.email.send(&EmailMessage::new(
            &user.email,
            "Welcome",
            &format!("Hello {}, your account is ready.", user.name),
        ))?;

        info!(user_id = user.id, "user registered");
        Ok(user)
    }

    pub fn find(&self, id: u64) -> Option<User> {
        self.repository.find_by_id(id)
    }

    pub fn repository(&self) -> &Arc<dyn UserRepository> {
        &self.repository
    }
}
